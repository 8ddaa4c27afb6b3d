/// End-to-end active-learning rounds on a synthetic pool
use std::sync::Arc;

use candle_core::{DType, Device, Tensor};
use candle_nn::{linear, Module, VarBuilder, VarMap};

use al_pool::data::lazy::Lazy;
use al_pool::data::registry::DatasetBundle;
use al_pool::data::{BatchLoader, RawDataset, RawItem};
use al_pool::training::{build_optimizer, resolve_loss};
use al_pool::{
    ALDataset, DatasetRegistry, Embedding, FeatureExtractor, LabelType, Split, TrainerConfig,
    TransformDataset,
};

/// Two interleaved Gaussian-ish blobs, deterministic per index.
struct Blobs {
    n: usize,
    dim: usize,
}

impl RawDataset for Blobs {
    fn len(&self) -> usize {
        self.n
    }

    fn get(&self, index: usize) -> al_pool::Result<RawItem> {
        let device = Device::Cpu;
        let class = (index % 2) as f32;
        let features: Vec<f32> = (0..self.dim)
            .map(|j| {
                let jitter = ((index * 31 + j * 7) % 13) as f32 / 13.0 - 0.5;
                class * 2.0 - 1.0 + jitter
            })
            .collect();
        Ok(RawItem::new(
            Tensor::from_vec(features, self.dim, &device)?,
            Tensor::new(&[(index % 2) as u32], &device)?,
        ))
    }
}

/// "Feature extractor" that materializes the view's inputs row by row, the
/// way a backbone's penultimate layer would.
struct IdentityExtractor;

impl FeatureExtractor for IdentityExtractor {
    fn get_feature(
        &mut self,
        view: &TransformDataset,
        split: Split,
        epoch: usize,
        _use_strong: bool,
    ) -> al_pool::Result<Embedding> {
        log::debug!("extracting {} features at epoch {}", split, epoch);
        let mut rows = Vec::with_capacity(view.len());
        for i in 0..view.len() {
            rows.push(view.get(i)?.input.primary().clone());
        }
        Ok(Embedding::Single(Tensor::stack(&rows, 0)?))
    }
}

fn register_blobs(registry: &mut DatasetRegistry) {
    registry.register(
        "blobs",
        LabelType::MultiClass,
        Box::new(|args| {
            let dim = args["dim"].as_u64().unwrap_or(8) as usize;
            let split = |n: usize| -> al_pool::Result<TransformDataset> {
                Ok(TransformDataset::plain(Arc::new(Blobs { n, dim })))
            };
            let labels_of = |n: usize| -> Lazy<Tensor> {
                Lazy::pending(move || {
                    let labels: Vec<u32> = (0..n as u32).map(|i| i % 2).collect();
                    Ok(Tensor::from_vec(labels, n, &Device::Cpu)?)
                })
            };
            Ok(DatasetBundle {
                train: split(100)?,
                val: split(20)?,
                test: split(20)?,
                train_labels: labels_of(100),
                val_labels: labels_of(20),
                test_labels: labels_of(20),
                num_classes: 2,
                classnames: vec!["neg".to_string(), "pos".to_string()],
            })
        }),
    );
}

fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let mut registry = DatasetRegistry::new();
    register_blobs(&mut registry);

    let args = serde_json::json!({ "dim": 8 });
    let (label_type, bundle) = registry.build("blobs", &args)?;
    let mut pool = ALDataset::new(bundle, label_type)?;

    log::info!("pool: {} train examples, {} classes", pool.len(), pool.num_classes());

    let mut extractor = IdentityExtractor;
    let trainer_config = TrainerConfig {
        optim_name: "SGD".to_string(),
        lr: 0.1,
        momentum: 0.9,
        ..Default::default()
    };
    trainer_config.validate()?;

    // Seed round: a handful of random-ish queries, then two AL rounds.
    pool.update_labeled_idxs(&[3, 14, 15, 92, 65]);

    for round in 0..2 {
        pool.update_embedding_dataset(round, &mut extractor, false)?;
        let (train_ds, val_ds, _test_ds) = pool.get_embedding_datasets()?;
        log::info!(
            "round {}: dim={}, labeled={}, unlabeled={}",
            round,
            pool.get_embedding_dim()?,
            pool.num_labeled()?,
            pool.unlabeled_idxs()?.len()
        );

        // Fit a linear probe on the normalized embeddings.
        let device = Device::Cpu;
        let varmap = VarMap::new();
        let vb = VarBuilder::from_varmap(&varmap, DType::F32, &device);
        let probe = linear(pool.get_embedding_dim()?, pool.num_classes(), vb.pp("probe"))?;

        let loss_fn = resolve_loss(&trainer_config)?;
        let mut optimizer = build_optimizer(&trainer_config, varmap.all_vars())?;

        let mut loader = BatchLoader::new(train_ds, 16, true);
        for epoch in 0..3 {
            let mut total = 0.0f32;
            let mut batches = 0usize;
            loader.reset();
            while let Some((inputs, labels)) = loader.next_batch()? {
                let logits = probe.forward(&inputs)?;
                let loss = loss_fn(&logits, &labels)?;
                optimizer.backward_step(&loss)?;
                total += loss.to_scalar::<f32>()?;
                batches += 1;
            }
            log::info!("  epoch {}: avg loss {:.4}", epoch, total / batches as f32);
        }

        log::info!("  val split holds {} examples", val_ds.len());

        // Pretend the query strategy picked three more examples.
        let next: Vec<usize> = pool.unlabeled_idxs()?.into_iter().take(3).collect();
        pool.update_labeled_idxs(&next);
    }

    log::info!(
        "done: {} labeled ({:?} ...)",
        pool.num_labeled()?,
        &pool.labeled_idxs()?[..5]
    );

    Ok(())
}

/// Active-learning dataset: splits, embeddings, and the labeled-index tracker
///
/// [`ALDataset`] is the aggregate the rest of a benchmark run hangs off:
/// trainers read its embedding datasets, query strategies read and extend its
/// labeled-index tracker, and a feature extractor refreshes its embeddings
/// between rounds.
use std::collections::HashSet;

use candle_core::Tensor;

use crate::data::lazy::{Lazy, Stat};
use crate::data::registry::DatasetBundle;
use crate::data::transform::TransformDataset;
use crate::data::{Embedding, LabelType, Split};
use crate::{MemoryDataset, PoolError, Result};

/// Produces an embedding matrix for a dataset view.
///
/// External collaborator: given a view, a split tag, the current training
/// epoch, and a strong/weak flag, return an embedding row-aligned with the
/// view's iteration order. `&mut self` because extractors are stateful (the
/// backing model advances between rounds).
pub trait FeatureExtractor {
    fn get_feature(
        &mut self,
        view: &TransformDataset,
        split: Split,
        epoch: usize,
        use_strong: bool,
    ) -> Result<Embedding>;
}

/// Dataset for active learning.
///
/// Holds the train/val/test data and their embeddings, and tracks which
/// training examples have been labeled so far.
///
/// Embeddings start uninitialized and are populated by
/// [`ALDataset::update_embedding_dataset`]; later calls overwrite them in
/// place. Normalization statistics are computed from the training embedding
/// on the first [`ALDataset::get_embedding_datasets`] call and frozen from
/// then on, so normalization stays stable round-to-round even as embeddings
/// are recomputed with an updated model.
pub struct ALDataset {
    train: TransformDataset,
    val: TransformDataset,
    test: TransformDataset,
    label_type: LabelType,
    num_classes: usize,
    classnames: Vec<String>,
    train_emb: Option<Embedding>,
    val_emb: Option<Embedding>,
    test_emb: Option<Embedding>,
    train_labels: Lazy<Tensor>,
    val_labels: Lazy<Tensor>,
    test_labels: Lazy<Tensor>,
    emb_mean: Stat,
    emb_std: Stat,
    /// Labeled training indices in chronological query order. Never
    /// deduplicated; callers must not submit an index twice.
    labeled: Option<Vec<usize>>,
}

impl ALDataset {
    /// Build the pool from a constructed [`DatasetBundle`].
    ///
    /// `classnames` must have `num_classes` entries, or `num_classes + 1`
    /// when an "others" bucket was folded in upstream.
    pub fn new(bundle: DatasetBundle, label_type: LabelType) -> Result<Self> {
        let DatasetBundle {
            train,
            val,
            test,
            train_labels,
            val_labels,
            test_labels,
            num_classes,
            classnames,
        } = bundle;

        if classnames.len() != num_classes && classnames.len() != num_classes + 1 {
            return Err(PoolError::Dataset(format!(
                "expected {} (or {}) classnames, got {}",
                num_classes,
                num_classes + 1,
                classnames.len()
            )));
        }

        Ok(Self {
            train,
            val,
            test,
            label_type,
            num_classes,
            classnames,
            train_emb: None,
            val_emb: None,
            test_emb: None,
            train_labels,
            val_labels,
            test_labels,
            emb_mean: Stat::default_mean(),
            emb_std: Stat::default_std(),
            labeled: None,
        })
    }

    /// Replace the default mean/std reducers.
    ///
    /// Only meaningful before the first [`ALDataset::get_embedding_datasets`]
    /// call; after that the statistics are frozen.
    pub fn with_normalization(mut self, mean: Stat, std: Stat) -> Self {
        self.emb_mean = mean;
        self.emb_std = std;
        self
    }

    /// Refresh the embeddings of all three splits from `extractor`.
    ///
    /// Splits are processed in train, val, test order with no transactional
    /// guarantee: a failure on val leaves the train embedding updated and
    /// val/test stale. Callers must treat a partial failure as invalidating
    /// the whole round.
    pub fn update_embedding_dataset(
        &mut self,
        epoch: usize,
        extractor: &mut dyn FeatureExtractor,
        use_strong: bool,
    ) -> Result<()> {
        for split in Split::ALL {
            let view = match split {
                Split::Train => &self.train,
                Split::Val => &self.val,
                Split::Test => &self.test,
            };
            log::debug!("extracting {} embeddings (epoch {})", split, epoch);
            let emb = extractor.get_feature(view, split, epoch, use_strong)?;
            let slot = match split {
                Split::Train => &mut self.train_emb,
                Split::Val => &mut self.val_emb,
                Split::Test => &mut self.test_emb,
            };
            *slot = Some(emb);
        }
        log::info!("embeddings updated (epoch {})", epoch);
        Ok(())
    }

    /// Record newly queried indices, in order, after the existing ones.
    ///
    /// Concatenation, not union: no dedup and no range validation.
    pub fn update_labeled_idxs(&mut self, new_idxs: &[usize]) {
        match &mut self.labeled {
            Some(idxs) => idxs.extend_from_slice(new_idxs),
            None => self.labeled = Some(new_idxs.to_vec()),
        }
    }

    /// Normalized (embedding, label) datasets for train, val, test.
    ///
    /// Realizes lazy labels, and on the first call only, the normalization
    /// statistics from the training embedding (its weak component when
    /// paired). Every split is normalized as `(emb - mean) / std`. A
    /// zero-variance dimension divides by zero and produces non-finite
    /// values; the extractor must not emit constant dimensions.
    pub fn get_embedding_datasets(
        &mut self,
    ) -> Result<(MemoryDataset, MemoryDataset, MemoryDataset)> {
        let (train_emb, val_emb, test_emb) =
            match (&self.train_emb, &self.val_emb, &self.test_emb) {
                (Some(train), Some(val), Some(test)) => {
                    (train.clone(), val.clone(), test.clone())
                }
                _ => return Err(PoolError::Uninitialized("embedding")),
            };

        let train_labels = self.train_labels.force()?.clone();
        let val_labels = self.val_labels.force()?.clone();
        let test_labels = self.test_labels.force()?.clone();

        let mean = self.emb_mean.force(train_emb.primary())?.clone();
        let std = self.emb_std.force(train_emb.primary())?.clone();
        let normalize =
            |emb: &Tensor| emb.broadcast_sub(&mean)?.broadcast_div(&std);

        Ok((
            MemoryDataset::new(train_emb.map(normalize)?, train_labels, self.num_classes)?,
            MemoryDataset::new(val_emb.map(normalize)?, val_labels, self.num_classes)?,
            MemoryDataset::new(test_emb.map(normalize)?, test_labels, self.num_classes)?,
        ))
    }

    /// Dimension of the embedding.
    pub fn get_embedding_dim(&self) -> Result<usize> {
        self.train_emb
            .as_ref()
            .ok_or(PoolError::Uninitialized("embedding"))?
            .feature_dim()
    }

    /// The raw (input, label) views for train, val, test.
    pub fn get_input_datasets(&self) -> (&TransformDataset, &TransformDataset, &TransformDataset) {
        (&self.train, &self.val, &self.test)
    }

    /// Length of the training split.
    pub fn len(&self) -> usize {
        self.train.len()
    }

    pub fn is_empty(&self) -> bool {
        self.train.is_empty()
    }

    pub fn num_classes(&self) -> usize {
        self.num_classes
    }

    pub fn classnames(&self) -> &[String] {
        &self.classnames
    }

    pub fn label_type(&self) -> LabelType {
        self.label_type
    }

    /// Number of labeled examples in the pool.
    pub fn num_labeled(&self) -> Result<usize> {
        Ok(self.labeled_idxs()?.len())
    }

    /// Labeled indices in chronological order.
    pub fn labeled_idxs(&self) -> Result<&[usize]> {
        self.labeled
            .as_deref()
            .ok_or(PoolError::Uninitialized("labeled index tracker"))
    }

    /// Indices of the unlabeled examples.
    ///
    /// Set-derived: duplicate-free and in no particular order.
    pub fn unlabeled_idxs(&self) -> Result<Vec<usize>> {
        let labeled: HashSet<usize> = self.labeled_idxs()?.iter().copied().collect();
        Ok((0..self.len()).filter(|i| !labeled.contains(i)).collect())
    }

    /// The training labels, realizing the lazy producer if needed.
    pub fn get_train_labels(&mut self) -> Result<&Tensor> {
        self.train_labels.force()
    }
}

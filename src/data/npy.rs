/// On-disk raw dataset backed by NumPy .npy files
///
/// A split directory holds `inputs.npy` (`f32`, `[N, D]`), `labels.npy`
/// (`i64`, `[N]`), and a `meta.json` sidecar with class bookkeeping. This is
/// the built-in source the registry ships with; richer loaders live outside
/// the crate.
use std::fs::File;
use std::io::BufReader;
use std::path::Path;
use std::sync::Arc;

use candle_core::{Device, Tensor};
use ndarray::{Array1, Array2};
use ndarray_npy::ReadNpyExt;
use serde::{Deserialize, Serialize};

use super::lazy::Lazy;
use super::registry::{DatasetBundle, DatasetRegistry};
use super::transform::TransformDataset;
use super::{LabelType, RawDataset, RawItem};
use crate::{PoolError, Result};

/// Sidecar metadata from meta.json
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct NpyMetadata {
    pub num_classes: usize,
    pub classnames: Vec<String>,
    #[serde(default)]
    pub description: String,
}

/// Raw dataset loaded from .npy files
pub struct NpySource {
    inputs: Tensor, // [N, D]
    labels: Tensor, // [N]
    metadata: NpyMetadata,
}

impl NpySource {
    /// Load from a directory containing inputs.npy, labels.npy and meta.json
    pub fn from_directory<P: AsRef<Path>>(path: P) -> Result<Self> {
        let dir = path.as_ref();
        let device = Device::Cpu;

        log::info!("loading npy dataset from {:?}", dir);

        let metadata: NpyMetadata = {
            let file = File::open(dir.join("meta.json"))?;
            serde_json::from_reader(BufReader::new(file))?
        };

        let inputs_path = dir.join("inputs.npy");
        let inputs = <Array2<f32> as ReadNpyExt>::read_npy(File::open(&inputs_path)?)
            .map_err(|e| {
                PoolError::Dataset(format!("failed to read {:?}: {}", inputs_path, e))
            })?;

        let labels_path = dir.join("labels.npy");
        let labels = <Array1<i64> as ReadNpyExt>::read_npy(File::open(&labels_path)?)
            .map_err(|e| {
                PoolError::Dataset(format!("failed to read {:?}: {}", labels_path, e))
            })?;

        if inputs.nrows() != labels.len() {
            return Err(PoolError::Dataset(format!(
                "inputs and labels must have the same length: {} != {}",
                inputs.nrows(),
                labels.len()
            )));
        }

        let (n, d) = inputs.dim();
        log::info!(
            "loaded {} examples, dim {}, {} classes ({})",
            n,
            d,
            metadata.num_classes,
            metadata.description
        );

        let inputs = Tensor::from_vec(inputs.into_raw_vec(), (n, d), &device)?;
        let labels_u32: Vec<u32> = labels.iter().map(|&x| x as u32).collect();
        let labels = Tensor::from_vec(labels_u32, n, &device)?;

        Ok(Self {
            inputs,
            labels,
            metadata,
        })
    }

    pub fn metadata(&self) -> &NpyMetadata {
        &self.metadata
    }

    /// All labels, `[N]` u32.
    pub fn labels(&self) -> &Tensor {
        &self.labels
    }
}

impl RawDataset for NpySource {
    fn len(&self) -> usize {
        // Alignment was checked at load.
        self.labels.dims()[0]
    }

    fn get(&self, index: usize) -> Result<RawItem> {
        Ok(RawItem::new(
            self.inputs.get(index)?,
            self.labels.get(index)?,
        ))
    }
}

/// Register the built-in npy dataset under the name "npy".
///
/// The constructor expects `{"root": <dir>}` and loads `train/`, `val/` and
/// `test/` subdirectories of `root`.
pub fn register_npy_dataset(registry: &mut DatasetRegistry) {
    registry.register(
        "npy",
        LabelType::MultiClass,
        Box::new(|args| {
            let root = args["root"].as_str().ok_or_else(|| {
                PoolError::Config("npy: missing string arg \"root\"".to_string())
            })?;
            let root = Path::new(root);

            let train = NpySource::from_directory(root.join("train"))?;
            let val = NpySource::from_directory(root.join("val"))?;
            let test = NpySource::from_directory(root.join("test"))?;

            let meta = train.metadata().clone();
            for (split, source) in [("val", &val), ("test", &test)] {
                if source.metadata().num_classes != meta.num_classes {
                    return Err(PoolError::Dataset(format!(
                        "{} split declares {} classes, train declares {}",
                        split,
                        source.metadata().num_classes,
                        meta.num_classes
                    )));
                }
            }

            let train_labels = Lazy::ready(train.labels().clone());
            let val_labels = Lazy::ready(val.labels().clone());
            let test_labels = Lazy::ready(test.labels().clone());

            Ok(DatasetBundle {
                train: TransformDataset::plain(Arc::new(train)),
                val: TransformDataset::plain(Arc::new(val)),
                test: TransformDataset::plain(Arc::new(test)),
                train_labels,
                val_labels,
                test_labels,
                num_classes: meta.num_classes,
                classnames: meta.classnames,
            })
        }),
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::{arr1, arr2};
    use ndarray_npy::write_npy;
    use std::fs;
    use std::path::PathBuf;

    fn fixture_dir(name: &str) -> PathBuf {
        let dir = std::env::temp_dir()
            .join("al-pool-npy-tests")
            .join(format!("{}-{}", name, std::process::id()));
        fs::remove_dir_all(&dir).ok();
        fs::create_dir_all(&dir).unwrap();
        dir
    }

    fn write_split(dir: &Path, n: usize, d: usize, num_classes: usize) {
        fs::create_dir_all(dir).unwrap();
        let inputs =
            Array2::from_shape_fn((n, d), |(i, j)| (i * d + j) as f32);
        let labels = Array1::from_shape_fn(n, |i| (i % num_classes) as i64);
        write_npy(dir.join("inputs.npy"), &inputs).unwrap();
        write_npy(dir.join("labels.npy"), &labels).unwrap();
        let meta = NpyMetadata {
            num_classes,
            classnames: (0..num_classes).map(|c| format!("class{}", c)).collect(),
            description: "fixture".to_string(),
        };
        fs::write(
            dir.join("meta.json"),
            serde_json::to_string(&meta).unwrap(),
        )
        .unwrap();
    }

    #[test]
    fn loads_and_indexes() -> Result<()> {
        let dir = fixture_dir("load");
        write_split(&dir, 4, 3, 2);

        let source = NpySource::from_directory(&dir)?;
        assert_eq!(source.len(), 4);
        assert_eq!(source.metadata().num_classes, 2);

        let item = source.get(1)?;
        assert_eq!(item.input.to_vec1::<f32>()?, vec![3.0, 4.0, 5.0]);
        assert_eq!(item.label.to_scalar::<u32>()?, 1);
        assert!(item.extras.is_empty());
        Ok(())
    }

    #[test]
    fn out_of_range_read_fails() -> Result<()> {
        let dir = fixture_dir("range");
        write_split(&dir, 2, 2, 2);
        let source = NpySource::from_directory(&dir)?;
        assert!(source.get(2).is_err());
        Ok(())
    }

    #[test]
    fn shape_mismatch_fails_at_load() {
        let dir = fixture_dir("mismatch");
        let inputs = arr2(&[[0.0f32, 1.0], [2.0, 3.0], [4.0, 5.0]]);
        let labels = arr1(&[0i64, 1]);
        write_npy(dir.join("inputs.npy"), &inputs).unwrap();
        write_npy(dir.join("labels.npy"), &labels).unwrap();
        fs::write(
            dir.join("meta.json"),
            r#"{"num_classes": 2, "classnames": ["a", "b"]}"#,
        )
        .unwrap();

        assert!(matches!(
            NpySource::from_directory(&dir),
            Err(PoolError::Dataset(_))
        ));
    }

    #[test]
    fn registry_constructor_builds_bundle() -> Result<()> {
        let root = fixture_dir("bundle");
        write_split(&root.join("train"), 6, 2, 2);
        write_split(&root.join("val"), 2, 2, 2);
        write_split(&root.join("test"), 2, 2, 2);

        let mut registry = DatasetRegistry::new();
        register_npy_dataset(&mut registry);

        let args = serde_json::json!({ "root": root.to_str().unwrap() });
        let (label_type, mut bundle) = registry.build("npy", &args)?;
        assert_eq!(label_type, LabelType::MultiClass);
        assert_eq!(bundle.train.len(), 6);
        assert_eq!(bundle.val.len(), 2);
        assert_eq!(bundle.test.len(), 2);
        assert_eq!(bundle.num_classes, 2);
        assert_eq!(bundle.classnames, vec!["class0", "class1"]);
        assert_eq!(
            bundle.train_labels.force()?.to_vec1::<u32>()?,
            vec![0, 1, 0, 1, 0, 1]
        );
        Ok(())
    }

    #[test]
    fn missing_root_arg_is_a_config_error() {
        let mut registry = DatasetRegistry::new();
        register_npy_dataset(&mut registry);
        let err = registry.build("npy", &serde_json::Value::Null);
        assert!(matches!(err, Err(PoolError::Config(_))));
    }
}

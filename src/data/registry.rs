/// Dataset registry: name -> (label type, constructor)
///
/// An explicit registry object rather than an ambient global map, so
/// construction order is deterministic and tests can build isolated
/// registries.
use std::collections::HashMap;

use candle_core::Tensor;

use super::lazy::Lazy;
use super::transform::TransformDataset;
use super::LabelType;
use crate::{PoolError, Result};

/// What a dataset constructor returns: three transform-wrapped splits, their
/// label cells, and class bookkeeping.
pub struct DatasetBundle {
    pub train: TransformDataset,
    pub val: TransformDataset,
    pub test: TransformDataset,
    pub train_labels: Lazy<Tensor>,
    pub val_labels: Lazy<Tensor>,
    pub test_labels: Lazy<Tensor>,
    pub num_classes: usize,
    pub classnames: Vec<String>,
}

/// Builds a [`DatasetBundle`] from free-form JSON arguments.
pub type Constructor = Box<dyn Fn(&serde_json::Value) -> Result<DatasetBundle> + Send + Sync>;

/// Mapping from dataset name to its label type and constructor.
pub struct DatasetRegistry {
    entries: HashMap<String, (LabelType, Constructor)>,
}

impl DatasetRegistry {
    pub fn new() -> Self {
        Self {
            entries: HashMap::new(),
        }
    }

    /// Register `constructor` under `name`. Re-registering an existing name
    /// overwrites it; last registration wins.
    pub fn register(
        &mut self,
        name: impl Into<String>,
        label_type: LabelType,
        constructor: Constructor,
    ) {
        let name = name.into();
        if self.entries.contains_key(&name) {
            log::debug!("dataset {:?} re-registered, previous entry replaced", name);
        }
        self.entries.insert(name, (label_type, constructor));
    }

    /// Look up a registered dataset.
    pub fn lookup(&self, name: &str) -> Option<(LabelType, &Constructor)> {
        self.entries
            .get(name)
            .map(|(label_type, ctor)| (*label_type, ctor))
    }

    /// Construct the dataset registered under `name`.
    pub fn build(&self, name: &str, args: &serde_json::Value) -> Result<(LabelType, DatasetBundle)> {
        let (label_type, ctor) = self.lookup(name).ok_or_else(|| {
            PoolError::Config(format!("dataset {:?} is not registered", name))
        })?;
        let bundle = ctor(args)?;
        Ok((label_type, bundle))
    }

    /// Registered dataset names, unordered.
    pub fn names(&self) -> Vec<&str> {
        self.entries.keys().map(String::as_str).collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Default for DatasetRegistry {
    fn default() -> Self {
        Self::new()
    }
}

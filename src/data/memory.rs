/// In-memory dataset over already-materialized tensors
///
/// Backs the per-round embedding datasets handed to trainers: once
/// embeddings are computed there is nothing left to transform, so reads are
/// plain row lookups.
use candle_core::Tensor;

use super::{Embedding, Example, Input};
use crate::{PoolError, Result};

/// Random-access dataset over an input matrix (or weak/strong pair) and a
/// row-aligned label tensor.
pub struct MemoryDataset {
    inputs: Embedding,
    labels: Tensor,
    num_classes: usize,
    return_indices: bool,
}

impl MemoryDataset {
    /// Build a dataset, checking input/label alignment up front.
    ///
    /// Fails with a length-mismatch error at construction, not at first
    /// access; for paired inputs both components must match the labels.
    pub fn new(inputs: Embedding, labels: Tensor, num_classes: usize) -> Result<Self> {
        let n_labels = labels.dim(0)?;
        match &inputs {
            Embedding::Single(x) => {
                if x.dim(0)? != n_labels {
                    return Err(PoolError::Dataset(format!(
                        "inputs and labels must have the same length: {} != {}",
                        x.dim(0)?,
                        n_labels
                    )));
                }
            }
            Embedding::Paired(weak, strong) => {
                if weak.dim(0)? != n_labels || strong.dim(0)? != n_labels {
                    return Err(PoolError::Dataset(format!(
                        "paired inputs and labels must have the same length: ({}, {}) != {}",
                        weak.dim(0)?,
                        strong.dim(0)?,
                        n_labels
                    )));
                }
            }
        }
        Ok(Self {
            inputs,
            labels,
            num_classes,
            return_indices: false,
        })
    }

    /// Number of examples.
    pub fn len(&self) -> usize {
        // Alignment was checked at construction.
        self.labels.dims()[0]
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Retrieve the example at `index`.
    pub fn get(&self, index: usize) -> Result<Example> {
        let input = match &self.inputs {
            Embedding::Single(x) => Input::Single(x.get(index)?),
            Embedding::Paired(weak, strong) => {
                Input::Paired(weak.get(index)?, strong.get(index)?)
            }
        };
        let label = self.labels.get(index)?;
        let index = self.return_indices.then_some(index);
        Ok(Example {
            input,
            label,
            index,
        })
    }

    /// The full input matrix.
    ///
    /// Fails when the dataset holds a weak/strong pair; callers must
    /// destructure [`MemoryDataset::paired_inputs`] explicitly in that case.
    pub fn inputs(&self) -> Result<&Tensor> {
        match &self.inputs {
            Embedding::Single(x) => Ok(x),
            Embedding::Paired(..) => Err(PoolError::Dataset(
                "dataset holds paired inputs; use paired_inputs()".to_string(),
            )),
        }
    }

    /// Both input components, in (weak, strong) order.
    pub fn paired_inputs(&self) -> Result<(&Tensor, &Tensor)> {
        match &self.inputs {
            Embedding::Paired(weak, strong) => Ok((weak, strong)),
            Embedding::Single(_) => Err(PoolError::Dataset(
                "dataset holds a single input matrix; use inputs()".to_string(),
            )),
        }
    }

    /// The full label tensor.
    pub fn labels(&self) -> &Tensor {
        &self.labels
    }

    pub fn num_classes(&self) -> usize {
        self.num_classes
    }

    pub fn set_return_indices(&mut self, return_indices: bool) {
        self.return_indices = return_indices;
    }
}

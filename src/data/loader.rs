/// Mini-batch iteration over an in-memory dataset
use candle_core::Tensor;
use rand::seq::SliceRandom;

use super::memory::MemoryDataset;
use crate::{PoolError, Result};

/// Shuffling batch iterator over a [`MemoryDataset`].
///
/// Yields `(inputs, labels)` pairs gathered row-wise; the final batch of an
/// epoch may be short. Only single-view datasets can be batched — for a
/// weak/strong pair, destructure the views and batch each on its own.
pub struct BatchLoader {
    dataset: MemoryDataset,
    batch_size: usize,
    indices: Vec<usize>,
    cursor: usize,
    shuffle: bool,
}

impl BatchLoader {
    pub fn new(dataset: MemoryDataset, batch_size: usize, shuffle: bool) -> Self {
        let mut indices: Vec<usize> = (0..dataset.len()).collect();
        if shuffle {
            indices.shuffle(&mut rand::thread_rng());
        }
        Self {
            dataset,
            batch_size,
            indices,
            cursor: 0,
            shuffle,
        }
    }

    /// Next `(inputs, labels)` batch, or `None` at the end of the epoch.
    pub fn next_batch(&mut self) -> Result<Option<(Tensor, Tensor)>> {
        if self.cursor >= self.indices.len() {
            return Ok(None);
        }

        let inputs = self.dataset.inputs().map_err(|_| {
            PoolError::Dataset(
                "cannot batch paired inputs; batch each view separately".to_string(),
            )
        })?;

        let end = (self.cursor + self.batch_size).min(self.indices.len());
        let batch: Vec<u32> = self.indices[self.cursor..end]
            .iter()
            .map(|&i| i as u32)
            .collect();
        self.cursor = end;

        let ids = Tensor::from_vec(batch.clone(), batch.len(), inputs.device())?;
        let input_batch = inputs.index_select(&ids, 0)?;
        let label_batch = self.dataset.labels().index_select(&ids, 0)?;

        Ok(Some((input_batch, label_batch)))
    }

    /// Reset for a new epoch, reshuffling if enabled.
    pub fn reset(&mut self) {
        self.cursor = 0;
        if self.shuffle {
            self.indices.shuffle(&mut rand::thread_rng());
        }
    }

    /// Number of batches per epoch.
    pub fn num_batches(&self) -> usize {
        (self.dataset.len() + self.batch_size - 1) / self.batch_size
    }

    pub fn dataset(&self) -> &MemoryDataset {
        &self.dataset
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::Embedding;
    use candle_core::Device;

    fn dataset(n: usize) -> Result<MemoryDataset> {
        let device = Device::Cpu;
        let inputs: Vec<f32> = (0..n * 2).map(|v| v as f32).collect();
        let labels: Vec<u32> = (0..n as u32).collect();
        MemoryDataset::new(
            Embedding::Single(Tensor::from_vec(inputs, (n, 2), &device)?),
            Tensor::from_vec(labels, n, &device)?,
            n,
        )
    }

    #[test]
    fn covers_every_row_exactly_once() -> Result<()> {
        let mut loader = BatchLoader::new(dataset(10)?, 3, true);
        assert_eq!(loader.num_batches(), 4);

        let mut seen = Vec::new();
        let mut batches = 0;
        while let Some((inputs, labels)) = loader.next_batch()? {
            assert_eq!(inputs.dim(0)?, labels.dim(0)?);
            seen.extend(labels.to_vec1::<u32>()?);
            batches += 1;
        }
        assert_eq!(batches, 4);
        seen.sort_unstable();
        assert_eq!(seen, (0..10).collect::<Vec<u32>>());
        Ok(())
    }

    #[test]
    fn unshuffled_batches_preserve_order() -> Result<()> {
        let mut loader = BatchLoader::new(dataset(5)?, 2, false);

        let (inputs, labels) = loader.next_batch()?.unwrap();
        assert_eq!(inputs.dims(), &[2, 2]);
        assert_eq!(labels.to_vec1::<u32>()?, vec![0, 1]);

        let (_, labels) = loader.next_batch()?.unwrap();
        assert_eq!(labels.to_vec1::<u32>()?, vec![2, 3]);

        // Final short batch, then exhaustion.
        let (inputs, labels) = loader.next_batch()?.unwrap();
        assert_eq!(inputs.dims(), &[1, 2]);
        assert_eq!(labels.to_vec1::<u32>()?, vec![4]);
        assert!(loader.next_batch()?.is_none());

        loader.reset();
        let (_, labels) = loader.next_batch()?.unwrap();
        assert_eq!(labels.to_vec1::<u32>()?, vec![0, 1]);
        Ok(())
    }

    #[test]
    fn paired_inputs_cannot_be_batched() -> Result<()> {
        let device = Device::Cpu;
        let x = Tensor::zeros((3, 2), candle_core::DType::F32, &device)?;
        let labels = Tensor::zeros(3, candle_core::DType::U32, &device)?;
        let ds = MemoryDataset::new(Embedding::Paired(x.clone(), x), labels, 2)?;

        let mut loader = BatchLoader::new(ds, 2, false);
        assert!(matches!(loader.next_batch(), Err(PoolError::Dataset(_))));
        Ok(())
    }
}

//! al-pool - dataset and embedding bookkeeping for active-learning benchmarks
//!
//! Tracks a pool of examples through an active-learning loop: raw inputs and
//! labels, embeddings recomputed across training epochs, and the growing set
//! of indices a query strategy has revealed to the learner.
//!
//! # Architecture
//!
//! - [`TransformDataset`]: wraps a raw source and applies swappable
//!   input/target transforms, optionally producing weak/strong views
//! - [`MemoryDataset`]: random access over already-materialized tensors
//! - [`DatasetRegistry`]: name -> (label type, constructor) lookup
//! - [`ALDataset`]: owns the three splits, drives embedding extraction,
//!   and tracks labeled indices
//!
//! # Example
//!
//! ```ignore
//! use al_pool::{ALDataset, DatasetRegistry, LabelType};
//!
//! let (label_type, bundle) = registry.build("npy", &args)?;
//! let mut pool = ALDataset::new(bundle, label_type)?;
//! pool.update_embedding_dataset(0, &mut extractor, false)?;
//! let (train, val, test) = pool.get_embedding_datasets()?;
//! ```

pub mod config;
pub mod data;
pub mod pool;
pub mod training;

// Re-export commonly used items
pub use config::TrainerConfig;
pub use data::memory::MemoryDataset;
pub use data::registry::{DatasetBundle, DatasetRegistry};
pub use data::transform::{Transform, TransformDataset};
pub use data::{Embedding, Example, Input, LabelType, Split};
pub use pool::{ALDataset, FeatureExtractor};

/// Library error types
#[derive(Debug, thiserror::Error)]
pub enum PoolError {
    #[error("Candle error: {0}")]
    Candle(#[from] candle_core::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Dataset error: {0}")]
    Dataset(String),

    #[error("{0} is not initialized")]
    Uninitialized(&'static str),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, PoolError>;

/// Dataset substrate for the active-learning pool
pub mod lazy;
pub mod loader;
pub mod memory;
pub mod npy;
pub mod registry;
pub mod transform;

pub use lazy::{Lazy, Stat};
pub use loader::BatchLoader;
pub use memory::MemoryDataset;
pub use npy::NpySource;
pub use registry::{DatasetBundle, DatasetRegistry};
pub use transform::{Compose, Transform, TransformDataset};

use candle_core::Tensor;

/// Formats of label.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum LabelType {
    MultiClass,
    MultiLabel,
}

/// The three dataset splits, always iterated in this order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Split {
    Train,
    Val,
    Test,
}

impl Split {
    pub const ALL: [Split; 3] = [Split::Train, Split::Val, Split::Test];

    pub fn as_str(&self) -> &'static str {
        match self {
            Split::Train => "train",
            Split::Val => "val",
            Split::Test => "test",
        }
    }
}

impl std::fmt::Display for Split {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One item as produced by a raw source.
///
/// `extras` carries whatever auxiliary fields the source attaches beyond
/// (input, label); see [`TransformDataset`] for how they are handled.
#[derive(Debug, Clone)]
pub struct RawItem {
    pub input: Tensor,
    pub label: Tensor,
    pub extras: Vec<Tensor>,
}

impl RawItem {
    pub fn new(input: Tensor, label: Tensor) -> Self {
        Self {
            input,
            label,
            extras: Vec::new(),
        }
    }
}

/// A finite, ordered, indexable collection of (input, label) items.
///
/// Implementations must be `Send + Sync`; readers may pull items from worker
/// threads. Out-of-range access is the source's own error, propagated
/// unchanged.
pub trait RawDataset: Send + Sync {
    /// Total number of items.
    fn len(&self) -> usize;

    /// Whether the source is empty.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Retrieve the item at `index`.
    fn get(&self, index: usize) -> crate::Result<RawItem>;
}

/// Per-item input: a single view, or a weak/strong augmented pair.
#[derive(Debug, Clone)]
pub enum Input {
    Single(Tensor),
    Paired(Tensor, Tensor),
}

impl Input {
    /// The single view, or the weak view of a pair.
    pub fn primary(&self) -> &Tensor {
        match self {
            Input::Single(t) => t,
            Input::Paired(weak, _) => weak,
        }
    }
}

/// The item type every dataset view in this crate produces.
///
/// `index` is populated only when the producing dataset has
/// `return_indices` set.
#[derive(Debug, Clone)]
pub struct Example {
    pub input: Input,
    pub label: Tensor,
    pub index: Option<usize>,
}

/// Per-split embedding matrix, `(split_size, embedding_dim)` per component.
///
/// `Paired` holds weak/strong views extracted from the same split, row-aligned
/// with each other.
#[derive(Debug, Clone)]
pub enum Embedding {
    Single(Tensor),
    Paired(Tensor, Tensor),
}

impl Embedding {
    /// The single matrix, or the weak component of a pair.
    pub fn primary(&self) -> &Tensor {
        match self {
            Embedding::Single(t) => t,
            Embedding::Paired(weak, _) => weak,
        }
    }

    /// Number of rows (split size).
    pub fn rows(&self) -> crate::Result<usize> {
        Ok(self.primary().dim(0)?)
    }

    /// Feature dimension.
    pub fn feature_dim(&self) -> crate::Result<usize> {
        Ok(self.primary().dim(1)?)
    }

    /// Apply `f` to every component, preserving the variant.
    pub fn map<F>(&self, mut f: F) -> crate::Result<Embedding>
    where
        F: FnMut(&Tensor) -> candle_core::Result<Tensor>,
    {
        Ok(match self {
            Embedding::Single(t) => Embedding::Single(f(t)?),
            Embedding::Paired(a, b) => Embedding::Paired(f(a)?, f(b)?),
        })
    }
}

/// Lazily-realized values for labels and normalization statistics
///
/// Label arrays and normalization statistics may arrive either as concrete
/// tensors or as producers to be run on first use.
use candle_core::Tensor;

use crate::{PoolError, Result};

type Producer<T> = Box<dyn FnOnce() -> Result<T> + Send>;

enum LazyState<T> {
    Ready(T),
    Pending(Producer<T>),
    /// The producer ran and failed; it cannot run again.
    Spent,
}

/// A value that is either present or produced on first access.
///
/// `force` memoizes: the producer runs at most once. A failed producer leaves
/// the cell spent and every later access reports that.
pub struct Lazy<T> {
    state: LazyState<T>,
}

impl<T> Lazy<T> {
    /// A cell that already holds its value.
    pub fn ready(value: T) -> Self {
        Self {
            state: LazyState::Ready(value),
        }
    }

    /// A cell that will run `producer` on first access.
    pub fn pending<F>(producer: F) -> Self
    where
        F: FnOnce() -> Result<T> + Send + 'static,
    {
        Self {
            state: LazyState::Pending(Box::new(producer)),
        }
    }

    /// Realize the value, running the producer if it has not run yet.
    pub fn force(&mut self) -> Result<&T> {
        match std::mem::replace(&mut self.state, LazyState::Spent) {
            LazyState::Ready(value) => {
                self.state = LazyState::Ready(value);
            }
            LazyState::Pending(producer) => {
                let value = producer()?;
                self.state = LazyState::Ready(value);
            }
            LazyState::Spent => {
                return Err(PoolError::Dataset(
                    "lazy producer failed on an earlier access".to_string(),
                ));
            }
        }
        match &self.state {
            LazyState::Ready(value) => Ok(value),
            _ => unreachable!("state was just set to Ready"),
        }
    }

    /// Whether the value has been realized.
    pub fn is_ready(&self) -> bool {
        matches!(self.state, LazyState::Ready(_))
    }
}

impl<T: std::fmt::Debug> std::fmt::Debug for Lazy<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.state {
            LazyState::Ready(value) => f.debug_tuple("Lazy::Ready").field(value).finish(),
            LazyState::Pending(_) => f.write_str("Lazy::Pending"),
            LazyState::Spent => f.write_str("Lazy::Spent"),
        }
    }
}

type ReducerFn = Box<dyn Fn(&Tensor) -> candle_core::Result<Tensor> + Send>;

/// A per-dimension normalization statistic over an embedding matrix.
///
/// Either a concrete vector, or a reducer run against the training embedding
/// exactly once; the result is frozen for the lifetime of the owner even when
/// the embedding it was computed from is later replaced.
pub enum Stat {
    Ready(Tensor),
    Reducer(ReducerFn),
}

impl Stat {
    /// Column mean, `[n, d] -> [d]`.
    pub fn default_mean() -> Self {
        Stat::Reducer(Box::new(|emb| emb.mean(0)))
    }

    /// Column population standard deviation, `[n, d] -> [d]`.
    pub fn default_std() -> Self {
        Stat::Reducer(Box::new(|emb| {
            let mean = emb.mean(0)?;
            emb.broadcast_sub(&mean)?.sqr()?.mean(0)?.sqrt()
        }))
    }

    /// A fixed statistic vector.
    pub fn fixed(value: Tensor) -> Self {
        Stat::Ready(value)
    }

    /// A custom reducer, `[n, d] -> [d]`.
    pub fn reducer<F>(f: F) -> Self
    where
        F: Fn(&Tensor) -> candle_core::Result<Tensor> + Send + 'static,
    {
        Stat::Reducer(Box::new(f))
    }

    /// Realize the statistic from `emb`, freezing it on first call.
    pub fn force(&mut self, emb: &Tensor) -> Result<&Tensor> {
        if let Stat::Reducer(f) = self {
            let value = f(emb)?;
            *self = Stat::Ready(value);
        }
        match self {
            Stat::Ready(value) => Ok(value),
            Stat::Reducer(_) => unreachable!("reducer was just replaced"),
        }
    }

    /// Whether the statistic has been computed.
    pub fn is_ready(&self) -> bool {
        matches!(self, Stat::Ready(_))
    }
}

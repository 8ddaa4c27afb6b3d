/// Training-side plumbing: config-driven factories and optimizers

pub mod factory;
pub mod sgd;

pub use factory::{build_optimizer, resolve_loss, resolve_pred, LossFn, PredFn, TrainOptimizer};
pub use sgd::{MomentumSgd, SgdConfig};

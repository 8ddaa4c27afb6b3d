/// Config-driven loss, prediction, and optimizer factories
use candle_core::{Tensor, Var, D};
use candle_nn::optim::Optimizer;
use candle_nn::{loss, ops, AdamW, ParamsAdamW};

use super::sgd::{MomentumSgd, SgdConfig};
use crate::config::TrainerConfig;
use crate::{PoolError, Result};

/// `(logits, targets) -> loss`
pub type LossFn = fn(&Tensor, &Tensor) -> candle_core::Result<Tensor>;

/// `logits -> probabilities`
pub type PredFn = fn(&Tensor) -> candle_core::Result<Tensor>;

fn softmax_last(logits: &Tensor) -> candle_core::Result<Tensor> {
    ops::softmax(logits, D::Minus1)
}

fn sigmoid(logits: &Tensor) -> candle_core::Result<Tensor> {
    ops::sigmoid(logits)
}

/// Resolve the configured loss function.
pub fn resolve_loss(config: &TrainerConfig) -> Result<LossFn> {
    match config.loss_fn.as_str() {
        "Cross Entropy" => Ok(loss::cross_entropy),
        "Binary Cross Entropy" => Ok(loss::binary_cross_entropy_with_logit),
        other => Err(PoolError::Config(format!("{:?} loss is unknown", other))),
    }
}

/// Resolve the configured prediction function.
pub fn resolve_pred(config: &TrainerConfig) -> Result<PredFn> {
    match config.pred_fn.as_str() {
        "Softmax" => Ok(softmax_last),
        "Sigmoid" => Ok(sigmoid),
        other => Err(PoolError::Config(format!(
            "{:?} prediction function is unknown",
            other
        ))),
    }
}

/// Optimizer built from a [`TrainerConfig`].
pub enum TrainOptimizer {
    Adam(AdamW),
    Sgd(MomentumSgd),
}

impl TrainOptimizer {
    /// Backward pass plus parameter update.
    pub fn backward_step(&mut self, loss: &Tensor) -> candle_core::Result<()> {
        match self {
            TrainOptimizer::Adam(opt) => opt.backward_step(loss),
            TrainOptimizer::Sgd(opt) => opt.backward_step(loss),
        }
    }

    pub fn learning_rate(&self) -> f64 {
        match self {
            TrainOptimizer::Adam(opt) => opt.learning_rate(),
            TrainOptimizer::Sgd(opt) => opt.learning_rate(),
        }
    }

    pub fn set_learning_rate(&mut self, lr: f64) {
        match self {
            TrainOptimizer::Adam(opt) => opt.set_learning_rate(lr),
            TrainOptimizer::Sgd(opt) => opt.set_learning_rate(lr),
        }
    }
}

/// Build the configured optimizer over `vars`.
pub fn build_optimizer(config: &TrainerConfig, vars: Vec<Var>) -> Result<TrainOptimizer> {
    match config.optim_name.as_str() {
        "Adam" => {
            let (beta1, beta2) = config.betas.unwrap_or((0.9, 0.999));
            let params = ParamsAdamW {
                lr: config.lr,
                beta1,
                beta2,
                weight_decay: config.wd,
                ..Default::default()
            };
            Ok(TrainOptimizer::Adam(AdamW::new(vars, params)?))
        }
        "SGD" => {
            let params = SgdConfig {
                lr: config.lr,
                weight_decay: config.wd,
                momentum: config.momentum,
                nesterov: config.nesterov,
            };
            Ok(TrainOptimizer::Sgd(MomentumSgd::new(vars, params)?))
        }
        other => Err(PoolError::Config(format!(
            "{:?} optimizer is unknown",
            other
        ))),
    }
}

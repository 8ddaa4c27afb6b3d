/// SGD with momentum and Nesterov acceleration
///
/// candle-nn ships a plain SGD; benchmark configs also ask for momentum and
/// Nesterov variants, so this implements the full update rule behind the
/// same `Optimizer` interface.
use candle_core::backprop::GradStore;
use candle_core::{Result, Tensor, Var};
use candle_nn::optim::Optimizer;
use std::collections::HashMap;

/// SGD configuration
#[derive(Debug, Clone)]
pub struct SgdConfig {
    /// Learning rate
    pub lr: f64,
    /// Weight decay coefficient (L2, folded into the gradient)
    pub weight_decay: f64,
    /// Momentum coefficient; 0 disables the velocity buffer
    pub momentum: f64,
    /// Nesterov acceleration; requires momentum > 0
    pub nesterov: bool,
}

impl Default for SgdConfig {
    fn default() -> Self {
        Self {
            lr: 1e-2,
            weight_decay: 0.0,
            momentum: 0.0,
            nesterov: false,
        }
    }
}

/// SGD optimizer with optional momentum
///
/// Velocity update: `v = momentum * v + grad`; the applied step is `v`, or
/// `grad + momentum * v` under Nesterov.
pub struct MomentumSgd {
    vars: Vec<Var>,
    config: SgdConfig,
    velocity: HashMap<usize, Tensor>,
}

impl Optimizer for MomentumSgd {
    type Config = SgdConfig;

    fn new(vars: Vec<Var>, config: SgdConfig) -> Result<Self> {
        if config.nesterov && config.momentum <= 0.0 {
            return Err(candle_core::Error::Msg(
                "Nesterov momentum requires momentum > 0".to_string(),
            ));
        }
        Ok(Self {
            vars,
            config,
            velocity: HashMap::new(),
        })
    }

    fn step(&mut self, grads: &GradStore) -> Result<()> {
        for (i, var) in self.vars.iter().enumerate() {
            let grad = match grads.get(var) {
                Some(grad) => grad,
                None => continue,
            };

            let grad = if self.config.weight_decay > 0.0 {
                (grad + (var.as_tensor() * self.config.weight_decay)?)?
            } else {
                grad.clone()
            };

            let update = if self.config.momentum > 0.0 {
                let v = match self.velocity.get(&i) {
                    Some(v) => ((v * self.config.momentum)? + &grad)?,
                    None => grad.clone(),
                };
                self.velocity.insert(i, v.clone());
                if self.config.nesterov {
                    (&grad + (v * self.config.momentum)?)?
                } else {
                    v
                }
            } else {
                grad
            };

            var.set(&(var.as_tensor() - (update * self.config.lr)?)?)?;
        }
        Ok(())
    }

    fn learning_rate(&self) -> f64 {
        self.config.lr
    }

    fn set_learning_rate(&mut self, lr: f64) {
        self.config.lr = lr;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use candle_core::Device;

    fn scalar_var(value: f32) -> Result<Var> {
        Var::new(&[value], &Device::Cpu)
    }

    fn value_of(var: &Var) -> Result<f32> {
        Ok(var.as_tensor().to_vec1::<f32>()?[0])
    }

    #[test]
    fn plain_sgd_step() -> Result<()> {
        let var = scalar_var(2.0)?;
        let config = SgdConfig {
            lr: 0.1,
            ..Default::default()
        };
        let mut opt = MomentumSgd::new(vec![var.clone()], config)?;

        // loss = x^2, grad = 2x = 4
        let loss = var.as_tensor().sqr()?.sum_all()?;
        let grads = loss.backward()?;
        opt.step(&grads)?;

        assert!((value_of(&var)? - 1.6).abs() < 1e-6);
        Ok(())
    }

    #[test]
    fn momentum_accumulates_velocity() -> Result<()> {
        let var = scalar_var(2.0)?;
        let config = SgdConfig {
            lr: 0.1,
            momentum: 0.9,
            ..Default::default()
        };
        let mut opt = MomentumSgd::new(vec![var.clone()], config)?;

        // Step 1: g = 4, v = 4, x = 2 - 0.4 = 1.6
        let grads = var.as_tensor().sqr()?.sum_all()?.backward()?;
        opt.step(&grads)?;
        assert!((value_of(&var)? - 1.6).abs() < 1e-5);

        // Step 2: g = 3.2, v = 0.9 * 4 + 3.2 = 6.8, x = 1.6 - 0.68 = 0.92
        let grads = var.as_tensor().sqr()?.sum_all()?.backward()?;
        opt.step(&grads)?;
        assert!((value_of(&var)? - 0.92).abs() < 1e-5);
        Ok(())
    }

    #[test]
    fn nesterov_without_momentum_is_rejected() -> Result<()> {
        let var = scalar_var(1.0)?;
        let config = SgdConfig {
            nesterov: true,
            momentum: 0.0,
            ..Default::default()
        };
        assert!(MomentumSgd::new(vec![var], config).is_err());
        Ok(())
    }

    #[test]
    fn lr_is_adjustable() -> Result<()> {
        let var = scalar_var(1.0)?;
        let mut opt = MomentumSgd::new(vec![var], SgdConfig::default())?;
        assert_eq!(opt.learning_rate(), 1e-2);
        opt.set_learning_rate(5e-3);
        assert_eq!(opt.learning_rate(), 5e-3);
        Ok(())
    }
}

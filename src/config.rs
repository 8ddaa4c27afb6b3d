/// Trainer configuration
///
/// Names are resolved to concrete loss/prediction/optimizer builders by
/// `training::factory`.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct TrainerConfig {
    /// Loss function: "Cross Entropy" or "Binary Cross Entropy"
    pub loss_fn: String,

    /// Prediction function: "Softmax" or "Sigmoid"
    pub pred_fn: String,

    /// Optimizer: "Adam" or "SGD"
    pub optim_name: String,

    /// Learning rate
    pub lr: f64,

    /// Weight decay
    #[serde(default)]
    pub wd: f64,

    /// Adam (beta1, beta2); optimizer defaults apply when absent
    #[serde(default)]
    pub betas: Option<(f64, f64)>,

    /// SGD momentum
    #[serde(default)]
    pub momentum: f64,

    /// SGD Nesterov momentum
    #[serde(default)]
    pub nesterov: bool,
}

impl Default for TrainerConfig {
    fn default() -> Self {
        Self {
            loss_fn: "Cross Entropy".to_string(),
            pred_fn: "Softmax".to_string(),
            optim_name: "Adam".to_string(),
            lr: 1e-3,
            wd: 0.0,
            betas: None,
            momentum: 0.0,
            nesterov: false,
        }
    }
}

impl TrainerConfig {
    /// Validate configuration
    pub fn validate(&self) -> crate::Result<()> {
        if self.lr <= 0.0 {
            return Err(crate::PoolError::Config("lr must be > 0".to_string()));
        }

        if !["Cross Entropy", "Binary Cross Entropy"].contains(&self.loss_fn.as_str()) {
            return Err(crate::PoolError::Config(format!(
                "{:?} loss is unknown",
                self.loss_fn
            )));
        }

        if !["Softmax", "Sigmoid"].contains(&self.pred_fn.as_str()) {
            return Err(crate::PoolError::Config(format!(
                "{:?} prediction function is unknown",
                self.pred_fn
            )));
        }

        if !["Adam", "SGD"].contains(&self.optim_name.as_str()) {
            return Err(crate::PoolError::Config(format!(
                "{:?} optimizer is unknown",
                self.optim_name
            )));
        }

        if self.nesterov && self.momentum <= 0.0 {
            return Err(crate::PoolError::Config(
                "Nesterov momentum requires momentum > 0".to_string(),
            ));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        assert!(TrainerConfig::default().validate().is_ok());
    }

    #[test]
    fn unknown_names_are_rejected() {
        let config = TrainerConfig {
            optim_name: "Adagrad".to_string(),
            ..Default::default()
        };
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("Adagrad"));

        let config = TrainerConfig {
            loss_fn: "Hinge".to_string(),
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn nesterov_requires_momentum() {
        let config = TrainerConfig {
            optim_name: "SGD".to_string(),
            nesterov: true,
            momentum: 0.0,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn deserializes_with_defaults() {
        let json = r#"{
            "loss_fn": "Binary Cross Entropy",
            "pred_fn": "Sigmoid",
            "optim_name": "SGD",
            "lr": 0.01,
            "momentum": 0.9
        }"#;

        let config: TrainerConfig = serde_json::from_str(json).unwrap();
        assert_eq!(config.wd, 0.0);
        assert_eq!(config.momentum, 0.9);
        assert!(!config.nesterov);
        assert!(config.betas.is_none());
        assert!(config.validate().is_ok());
    }
}

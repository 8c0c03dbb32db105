use crate::{EngineConfig, loss::LossKind};

/// The lifecycle of a `TrajPredEngine`.
///
/// Transitions are linear: `NotStarted` → `Training` ⇄ `Validating` → `Completed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    NotStarted,
    Training,
    Validating,
    Completed,
}

/// The training stage an epoch belongs to, which decides the loss.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Pretrain,
    Main,
}

impl Stage {
    /// Returns the stage of a 1-based `epoch`: epochs below `pretrain_epochs` pretrain.
    pub fn for_epoch(epoch: usize, pretrain_epochs: usize) -> Self {
        if epoch < pretrain_epochs {
            Stage::Pretrain
        } else {
            Stage::Main
        }
    }

    /// The loss used when the configured one isn't recognized.
    pub fn default_loss(self) -> LossKind {
        match self {
            Stage::Pretrain => LossKind::Mse,
            Stage::Main => LossKind::Nll,
        }
    }

    pub fn configured_loss(self, config: &EngineConfig) -> &str {
        match self {
            Stage::Pretrain => &config.pretrain_loss,
            Stage::Main => &config.train_loss,
        }
    }

    pub fn fallback_warning(self) -> &'static str {
        match self {
            Stage::Pretrain => "[Error] Unrecognized pretrain loss, using MSE by default",
            Stage::Main => "[Error] Unrecognized train loss, using NLL by default",
        }
    }

    /// Resolves the loss of this stage.
    ///
    /// # Returns
    /// The loss to use, and the warning to report when it's a fallback.
    pub fn select_loss(self, config: &EngineConfig) -> (LossKind, Option<&'static str>) {
        match self.configured_loss(config).parse() {
            Ok(kind) => (kind, None),
            Err(_) => (self.default_loss(), Some(self.fallback_warning())),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::num::NonZeroUsize;

    use super::*;

    fn config(pretrain_loss: &str, train_loss: &str) -> EngineConfig {
        let mut config = EngineConfig::new("run", 2, 3, NonZeroUsize::MIN);
        config.pretrain_loss = pretrain_loss.into();
        config.train_loss = train_loss.into();
        config
    }

    #[test]
    fn first_epochs_pretrain() {
        assert_eq!(Stage::for_epoch(1, 3), Stage::Pretrain);
        assert_eq!(Stage::for_epoch(2, 3), Stage::Pretrain);
        assert_eq!(Stage::for_epoch(3, 3), Stage::Main);
        assert_eq!(Stage::for_epoch(1, 0), Stage::Main);
    }

    #[test]
    fn a_single_pretrain_epoch_never_pretrains() {
        assert_eq!(Stage::for_epoch(1, 1), Stage::Main);
        assert_eq!(Stage::for_epoch(2, 1), Stage::Main);
    }

    #[test]
    fn recognized_losses_are_used_as_is() {
        let config = config("NLL", "MSE");
        assert_eq!(Stage::Pretrain.select_loss(&config), (LossKind::Nll, None));
        assert_eq!(Stage::Main.select_loss(&config), (LossKind::Mse, None));
    }

    #[test]
    fn unrecognized_losses_fall_back_per_stage() {
        let config = config("L1", "huber");

        let (kind, warning) = Stage::Pretrain.select_loss(&config);
        assert_eq!(kind, LossKind::Mse);
        assert_eq!(
            warning,
            Some("[Error] Unrecognized pretrain loss, using MSE by default")
        );

        let (kind, warning) = Stage::Main.select_loss(&config);
        assert_eq!(kind, LossKind::Nll);
        assert_eq!(
            warning,
            Some("[Error] Unrecognized train loss, using NLL by default")
        );
    }
}

use std::{fs, mem, path::Path, path::PathBuf};

use log::{debug, info, warn};

use super::{
    horizon::{HorizonAccumulator, HorizonReport},
    persist,
    phase::{Phase, Stage},
};
use crate::{
    EngineConfig, EngineErr, Result, RunningMetrics,
    arch::TrajPredictor,
    data::{BatchLoader, TrajBatch},
    engine::{Engine, EngineState, Event},
    loss::{LossKind, masked_mse_test, masked_nll_test},
    optimization::{Optimizer, Params},
    report::ProgressReporter,
};

/// Everything a training run mutates, shared by the trainer and the evaluator loops.
struct TrainState<P, O> {
    net: P,
    optimizer: O,
    params: Params,
    config: EngineConfig,
    metrics: RunningMetrics,
    reporter: Option<Box<dyn ProgressReporter>>,

    n_iterations: usize,
    epoch: usize,
    stage: Stage,
    phase: Phase,
    horizons: Option<HorizonAccumulator>,
}

impl<P, O> TrainState<P, O>
where
    P: TrajPredictor,
    O: Optimizer,
{
    fn start_epoch(&mut self, epoch: usize) {
        self.epoch = epoch;
        self.stage = Stage::for_epoch(epoch, self.config.pretrain_epochs);
        debug!("epoch {epoch} uses the {:?} stage", self.stage);
    }

    /// Resolves the loss of the current stage, reporting the fallback if there's one.
    fn current_loss(&mut self) -> LossKind {
        let (kind, warning) = self.stage.select_loss(&self.config);
        if let Some(warning) = warning {
            self.signal_error(warning);
        }

        kind
    }

    fn train_batch(&mut self, batch: TrajBatch<P::Input>) -> Result<f32> {
        self.net.set_train(true);

        let pred = self.net.predict(self.params.values(), &batch.inputs)?;
        let kind = self.current_loss();
        let loss = kind.compute(pred.view(), batch.fut.view(), batch.op_mask.view())?;

        self.params.zero_grad();
        let (values, grad) = self.params.split_mut();
        self.net.backward(values, grad, loss.grad.view())?;
        self.params.step(&mut self.optimizer)?;

        self.metrics.record_train(loss.value);
        debug!("epoch {} {kind} train loss: {}", self.epoch, loss.value);

        Ok(loss.value)
    }

    fn eval_batch(&mut self, batch: TrajBatch<P::Input>) -> Result<f32> {
        self.net.set_train(false);

        let pred = self.net.predict(self.params.values(), &batch.inputs)?;
        let kind = self.current_loss();
        let loss = kind.compute(pred.view(), batch.fut.view(), batch.op_mask.view())?;

        if let Some(horizons) = self.horizons.as_mut() {
            let (fut, op_mask) = (batch.fut.view(), batch.op_mask.view());
            let mse = masked_mse_test(pred.view(), fut, op_mask)?;
            let nll = masked_nll_test(pred.view(), fut, op_mask)?;
            horizons.add(&mse, &nll);
        }

        self.metrics.record_val(loss.value);
        Ok(loss.value)
    }

    fn eval_step(&mut self, _: &EngineState, batch: TrajBatch<P::Input>) -> Result<f32> {
        self.eval_batch(batch)
    }

    fn validate<V>(&mut self, val_loader: &mut V) -> Result<()>
    where
        V: BatchLoader<Batch = TrajBatch<P::Input>>,
    {
        let previous = mem::replace(&mut self.phase, Phase::Validating);

        let evaluator: Engine<Self, TrajBatch<P::Input>> = Engine::new(Self::eval_step);
        let result = evaluator.run(self, val_loader, 1);
        self.phase = previous;
        result?;

        self.report_epoch();
        self.metrics.zero_train_loss();

        Ok(())
    }

    fn report_epoch(&mut self) {
        let epoch = self.epoch;
        let max_epochs = self.config.max_epochs();
        let train = self.metrics.avg_train_loss;
        let val = self.metrics.avg_val_loss;

        if self.config.eval_only {
            let canvas = format!("\nEPOCH {epoch}: Test loss: {val}");
            match self.reporter.as_mut() {
                Some(reporter) => reporter.signal_canvas(&canvas),
                None => info!("{}", canvas.trim_start()),
            }
            return;
        }

        let label = format!("{epoch}/{max_epochs} Epochs");
        let bar = (epoch as f32 / max_epochs as f32 * 100.).max(1.);
        let canvas = format!("\nEPOCH {epoch}: Train loss: {train}  Val loss: {val}");

        match self.reporter.as_mut() {
            Some(reporter) => {
                reporter.signal_bot_label(&label);
                reporter.signal_bot_bar(bar);
                reporter.signal_canvas(&canvas);
            }
            None => {
                info!("{label}");
                info!("{bar}");
                info!("{}", canvas.trim_start());
            }
        }
    }

    fn zero_metrics(&mut self, iteration: usize) {
        self.metrics.reset_val_counter();

        if !self.config.eval_only {
            if let Some(reporter) = self.reporter.as_mut() {
                let n = self.n_iterations;
                let i = iteration % n;
                reporter.signal_top_label(&format!("{i}/{n} Iterations"));
                reporter.signal_top_bar(i as f32 / n as f32 * 100.);
            }
        }

        self.metrics.zero_val_loss();
    }

    fn save_model(&self) -> Result<PathBuf> {
        fs::create_dir_all(&self.config.save_dir)?;

        let path = self.config.weights_path();
        persist::save_params(&path, &self.config.name, self.params.values())?;
        info!("Model saved {}.", path.display());

        Ok(path)
    }

    fn signal_error(&mut self, text: &str) {
        warn!("{text}");
        if let Some(reporter) = self.reporter.as_mut() {
            reporter.signal_error(text);
        }
    }
}

/// The context of the trainer loop: the run state and the loader its validations go through.
struct Trainer<'e, P, O, V> {
    state: &'e mut TrainState<P, O>,
    val_loader: &'e mut V,
}

impl<'e, P, O, V> Trainer<'e, P, O, V>
where
    P: TrajPredictor,
    O: Optimizer,
    V: BatchLoader<Batch = TrajBatch<P::Input>>,
{
    fn train_step(&mut self, _: &EngineState, batch: TrajBatch<P::Input>) -> Result<f32> {
        self.state.train_batch(batch)
    }

    fn start_epoch(&mut self, engine: &EngineState) -> Result<()> {
        self.state.start_epoch(engine.epoch);
        Ok(())
    }

    fn zero_metrics(&mut self, engine: &EngineState) -> Result<()> {
        self.state.zero_metrics(engine.iteration);
        Ok(())
    }

    fn validate(&mut self, _: &EngineState) -> Result<()> {
        self.state.validate(&mut *self.val_loader)
    }

    fn save_model(&mut self, _: &EngineState) -> Result<()> {
        self.state.save_model()?;
        Ok(())
    }
}

/// The training controller of a trajectory predictor.
///
/// Runs `pretrain_epochs + train_epochs` epochs. Epochs numbered below
/// `pretrain_epochs` use the pretrain loss and the rest the main one. Every
/// epoch is validated and the parameters are persisted once the run completes.
pub struct TrajPredEngine<P, O, T, V> {
    state: TrainState<P, O>,
    train_loader: T,
    val_loader: V,
}

impl<P, O, T, V> TrajPredEngine<P, O, T, V>
where
    P: TrajPredictor,
    O: Optimizer,
    T: BatchLoader<Batch = TrajBatch<P::Input>>,
    V: BatchLoader<Batch = TrajBatch<P::Input>>,
{
    /// Creates a new `TrajPredEngine` with zeroed parameters.
    ///
    /// # Arguments
    /// * `net` - The predictor to train.
    /// * `optimizer` - The optimizer applied after every training batch.
    /// * `train_loader` - The training batches.
    /// * `val_loader` - The validation batches.
    /// * `config` - The run configuration.
    /// * `reporter` - Where progress goes, the log is used when there's none.
    ///
    /// # Returns
    /// A new `TrajPredEngine` instance, or an error if the config is invalid or the training loader is empty.
    pub fn new(
        net: P,
        optimizer: O,
        train_loader: T,
        val_loader: V,
        config: EngineConfig,
        reporter: Option<Box<dyn ProgressReporter>>,
    ) -> Result<Self> {
        config.validate()?;

        if train_loader.is_empty() {
            return Err(EngineErr::EmptyLoader { what: "training" });
        }

        if config.cuda {
            warn!("cuda was requested but there's no GPU backend, running on the CPU");
        }

        let len = train_loader.len();
        let n_iterations = len.max(len / config.batch_size.get());
        let params = Params::zeros(net.size());

        let state = TrainState {
            net,
            optimizer,
            params,
            config,
            metrics: RunningMetrics::default(),
            reporter,
            n_iterations,
            epoch: 0,
            stage: Stage::Main,
            phase: Phase::NotStarted,
            horizons: None,
        };

        Ok(Self {
            state,
            train_loader,
            val_loader,
        })
    }

    /// Replaces the zeroed initial parameters.
    ///
    /// # Arguments
    /// * `values` - The parameters, as many as the predictor's size.
    pub fn with_params(mut self, values: Vec<f32>) -> Result<Self> {
        self.state.params.set_values(values)?;
        Ok(self)
    }

    /// Runs the whole training, or a single pass in eval-only mode.
    ///
    /// # Returns
    /// The final state of the trainer loop.
    pub fn start(&mut self) -> Result<EngineState> {
        let max_epochs = self.state.config.max_epochs();
        let n = self.state.n_iterations;
        if let Some(reporter) = self.state.reporter.as_mut() {
            reporter.signal_bot_label(&format!("0/{max_epochs} Epochs"));
            reporter.signal_top_label(&format!("0/{n} Iterations"));
        }

        let epochs = if self.state.config.eval_only { 1 } else { max_epochs };
        info!(
            "starting {} for {epochs} epochs of {n} iterations",
            self.state.config.name
        );

        let mut trainer: Engine<Trainer<'_, P, O, V>, TrajBatch<P::Input>> =
            Engine::new(Trainer::train_step);
        trainer
            .add_event_handler(Event::EpochStarted, Trainer::start_epoch)
            .add_event_handler(Event::IterationCompleted, Trainer::zero_metrics)
            .add_event_handler(Event::EpochCompleted, Trainer::validate)
            .add_event_handler(Event::Completed, Trainer::save_model);

        self.state.phase = Phase::Training;
        let mut ctx = Trainer {
            state: &mut self.state,
            val_loader: &mut self.val_loader,
        };
        let engine_state = trainer.run(&mut ctx, &mut self.train_loader, epochs)?;
        self.state.phase = Phase::Completed;

        Ok(engine_state)
    }

    /// Evaluates the predictor over the validation loader.
    ///
    /// # Returns
    /// The per-horizon RMSE and negative log likelihood.
    pub fn evaluate(&mut self) -> Result<HorizonReport> {
        if let Some(reporter) = self.state.reporter.as_mut() {
            reporter.signal_top_label("Evaluating");
        }

        self.state.horizons = Some(HorizonAccumulator::default());

        let evaluator: Engine<TrainState<P, O>, TrajBatch<P::Input>> =
            Engine::new(TrainState::eval_step);
        let result = evaluator.run(&mut self.state, &mut self.val_loader, 1);
        let horizons = self.state.horizons.take().unwrap_or_default();
        result?;

        Ok(horizons.finish())
    }

    /// Processes one training batch in the current stage.
    ///
    /// # Returns
    /// The batch loss.
    pub fn train_batch(&mut self, batch: TrajBatch<P::Input>) -> Result<f32> {
        self.state.train_batch(batch)
    }

    /// Processes one validation batch in the current stage, without touching the parameters.
    ///
    /// # Returns
    /// The batch loss.
    pub fn eval_batch(&mut self, batch: TrajBatch<P::Input>) -> Result<f32> {
        self.state.eval_batch(batch)
    }

    /// Runs a validation pass and reports the epoch's losses.
    pub fn validate(&mut self) -> Result<()> {
        self.state.validate(&mut self.val_loader)
    }

    /// Resets the validation metrics and reports the iteration progress.
    pub fn zero_metrics(&mut self, iteration: usize) {
        self.state.zero_metrics(iteration);
    }

    pub fn zero_train_loss(&mut self) {
        self.state.metrics.zero_train_loss();
    }

    pub fn zero_val_loss(&mut self) {
        self.state.metrics.zero_val_loss();
    }

    /// Writes the parameters to the configured weights path.
    ///
    /// # Returns
    /// The path written to.
    pub fn save_model(&self) -> Result<PathBuf> {
        self.state.save_model()
    }

    /// Restores parameters written by `save_model`.
    pub fn load_model<Q: AsRef<Path>>(&mut self, path: Q) -> Result<()> {
        let values = persist::load_params(path.as_ref())?;
        self.state.params.set_values(values)?;
        info!("Model loaded {}.", path.as_ref().display());
        Ok(())
    }

    pub fn net(&self) -> &P {
        &self.state.net
    }

    pub fn params(&self) -> &[f32] {
        self.state.params.values()
    }

    pub fn metrics(&self) -> &RunningMetrics {
        &self.state.metrics
    }

    pub fn config(&self) -> &EngineConfig {
        &self.state.config
    }

    pub fn phase(&self) -> Phase {
        self.state.phase
    }

    /// Returns the stage of the current epoch, `Main` before the first one.
    pub fn stage(&self) -> Stage {
        self.state.stage
    }

    pub fn epoch(&self) -> usize {
        self.state.epoch
    }

    pub fn n_iterations(&self) -> usize {
        self.state.n_iterations
    }
}

#[cfg(test)]
mod tests {
    use std::num::NonZeroUsize;

    use ndarray::Array3;

    use super::*;
    use crate::{
        arch::LinearPredictor,
        optimization::GradientDescent,
        report::{ChannelReporter, ProgressEvent},
    };

    type Batch = TrajBatch<Array3<f32>>;
    type TestEngine = TrajPredEngine<LinearPredictor, GradientDescent, Vec<Batch>, Vec<Batch>>;

    fn batch(shift: f32) -> Batch {
        let hist = Array3::from_shape_fn((2, 2, 2), |(t, b, c)| shift + 0.1 * (t + b + c) as f32);
        let fut = Array3::from_shape_fn((3, 2, 2), |(t, b, c)| {
            shift + 0.2 * (t + b) as f32 - 0.1 * c as f32
        });
        let op_mask = Array3::ones((3, 2, 2));
        TrajBatch::new(hist, fut, op_mask).unwrap()
    }

    fn config(dir: &Path) -> EngineConfig {
        let mut config = EngineConfig::new("unit", 1, 1, NonZeroUsize::new(2).unwrap());
        config.save_dir = dir.to_path_buf();
        config
    }

    fn engine(config: EngineConfig, reporter: Option<Box<dyn ProgressReporter>>) -> TestEngine {
        let net = LinearPredictor::new(2, 3);
        let optimizer = GradientDescent::new(0.01);
        TrajPredEngine::new(
            net,
            optimizer,
            vec![batch(0.0), batch(0.5), batch(1.0)],
            vec![batch(0.2), batch(0.7)],
            config,
            reporter,
        )
        .unwrap()
    }

    #[test]
    fn n_iterations_is_the_train_loader_length() {
        let dir = tempfile::tempdir().unwrap();
        let engine = engine(config(dir.path()), None);
        assert_eq!(engine.n_iterations(), 3);
        assert_eq!(engine.phase(), Phase::NotStarted);
    }

    #[test]
    fn rejects_an_empty_train_loader() {
        let dir = tempfile::tempdir().unwrap();
        let result = TestEngine::new(
            LinearPredictor::new(2, 3),
            GradientDescent::new(0.01),
            Vec::new(),
            vec![batch(0.0)],
            config(dir.path()),
            None,
        );
        assert!(matches!(result, Err(EngineErr::EmptyLoader { .. })));
    }

    #[test]
    fn train_batch_updates_params_and_metrics() {
        let dir = tempfile::tempdir().unwrap();
        let mut engine = engine(config(dir.path()), None);
        let before = engine.params().to_vec();

        let loss = engine.train_batch(batch(0.3)).unwrap();
        assert!(loss.is_finite());
        assert_ne!(engine.params(), before.as_slice());
        assert_eq!(engine.metrics().avg_train_loss, loss);
        assert_eq!(engine.metrics().total_train_loss, loss as f64);
        assert!(engine.net().is_train());
    }

    #[test]
    fn eval_batch_leaves_params_alone() {
        let dir = tempfile::tempdir().unwrap();
        let mut engine = engine(config(dir.path()), None);
        let before = engine.params().to_vec();

        engine.eval_batch(batch(0.3)).unwrap();
        engine.eval_batch(batch(0.6)).unwrap();
        assert_eq!(engine.params(), before.as_slice());
        assert_eq!(engine.metrics().val_batch_count(), 3);
        assert!(!engine.net().is_train());

        engine.zero_metrics(1);
        assert_eq!(engine.metrics().val_batch_count(), 1);
        assert_eq!(engine.metrics().avg_val_loss, 0.0);
    }

    #[test]
    fn validate_reports_and_resets_the_train_average() {
        let dir = tempfile::tempdir().unwrap();
        let (reporter, mut rx) = ChannelReporter::new();
        let mut engine = engine(config(dir.path()), Some(Box::new(reporter)));

        engine.train_batch(batch(0.1)).unwrap();
        engine.validate().unwrap();
        assert_eq!(engine.metrics().avg_train_loss, 0.0);
        assert_eq!(engine.phase(), Phase::NotStarted);

        let events: Vec<_> = std::iter::from_fn(|| rx.try_recv().ok()).collect();
        assert_eq!(events[0], ProgressEvent::BotLabel("0/2 Epochs".into()));
        assert_eq!(events[1], ProgressEvent::BotBar(1.0));
        assert!(matches!(
            &events[2],
            ProgressEvent::Canvas(text) if text.starts_with("\nEPOCH 0: Train loss: ")
        ));
    }

    #[test]
    fn failed_validation_keeps_the_phase() {
        let dir = tempfile::tempdir().unwrap();
        let hist = Array3::zeros((4, 2, 2));
        let fut = Array3::zeros((3, 2, 2));
        let bad = TrajBatch::new(hist, fut, Array3::ones((3, 2, 2))).unwrap();

        let mut engine = TestEngine::new(
            LinearPredictor::new(2, 3),
            GradientDescent::new(0.01),
            vec![batch(0.0)],
            vec![bad],
            config(dir.path()),
            None,
        )
        .unwrap();

        assert!(engine.validate().is_err());
        assert_eq!(engine.phase(), Phase::NotStarted);
    }

    #[test]
    fn zero_metrics_reports_iteration_progress() {
        let dir = tempfile::tempdir().unwrap();
        let (reporter, mut rx) = ChannelReporter::new();
        let mut engine = engine(config(dir.path()), Some(Box::new(reporter)));

        engine.zero_metrics(4);
        assert_eq!(rx.try_recv(), Ok(ProgressEvent::TopLabel("1/3 Iterations".into())));
        assert!(matches!(
            rx.try_recv(),
            Ok(ProgressEvent::TopBar(percent)) if (percent - 100.0 / 3.0).abs() < 1e-4
        ));
    }

    #[test]
    fn start_runs_every_epoch_and_saves() {
        let dir = tempfile::tempdir().unwrap();
        let mut engine = engine(config(dir.path()), None);

        let state = engine.start().unwrap();
        assert_eq!(state.epoch, 2);
        assert_eq!(state.iteration, 6);
        assert_eq!(engine.epoch(), 2);
        assert_eq!(engine.stage(), Stage::Main);
        assert_eq!(engine.phase(), Phase::Completed);
        assert!(dir.path().join("unit").is_file());
    }

    #[test]
    fn evaluate_reports_every_horizon() {
        let dir = tempfile::tempdir().unwrap();
        let mut engine = engine(config(dir.path()), None);
        engine.start().unwrap();

        let report = engine.evaluate().unwrap();
        assert_eq!(report.rmse.len(), 3);
        assert_eq!(report.nll.len(), 3);
        assert!(report.rmse.iter().all(|v| v.is_finite() && *v >= 0.0));
    }
}

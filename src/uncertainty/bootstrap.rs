//! # Bootstrap Analysis
//!
//! A bootstrap run computes a result once from unperturbed data, then repeats the
//! identical computation against resampled inputs to build an empirical
//! distribution of the result. The exact result becomes the center of the final
//! [`ValueWithError`]; the resampled ensemble supplies its spread.
//!
//! Callers specialise the computation by implementing [`BootstrapAnalysis`] (or
//! wrapping a closure with [`from_fn`]). The loop itself is sequential: every
//! iteration draws from the same [`Sampler`] and appends to the same sample list.

use log::{debug, info, warn};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use thiserror::Error;

use super::sampling::{Sampler, SamplingStrategy};
use super::value::ValueWithError;
use crate::config::FitSettings;
use crate::error::Result;

/// Errors that can occur during a bootstrap run
#[derive(Error, Debug, Clone, PartialEq)]
pub enum BootstrapError {
    #[error("Bootstrap run produced no successful samples out of {attempted} iterations")]
    NoSuccessfulSamples { attempted: usize, cancelled: bool },

    #[error("Bootstrap iteration count must be positive")]
    InvalidIterationCount,

    #[error("Bootstrap run executed without being started")]
    NotStarted,

    #[error("Expected {expected} values per bootstrap result, got {actual}")]
    WidthMismatch { expected: usize, actual: usize },
}

/// Which pass of a bootstrap run is being computed.
pub enum ComputeMode<'a> {
    /// The single pass over the unperturbed data.
    Exact,

    /// A resampled pass; every uncertain input should be drawn from the sampler.
    Sampled(&'a mut Sampler),
}

impl ComputeMode<'_> {
    /// Whether this is the exact pass.
    pub fn is_exact(&self) -> bool {
        matches!(self, ComputeMode::Exact)
    }

    /// Value of an uncertain input for this pass: the value itself in the exact
    /// pass, a draw from the sampler otherwise.
    pub fn draw(&mut self, input: &ValueWithError) -> f64 {
        match self {
            ComputeMode::Exact => input.value(),
            ComputeMode::Sampled(sampler) => sampler.sample(input),
        }
    }
}

/// A computation that can be repeated against resampled inputs.
pub trait BootstrapAnalysis {
    /// Result of one pass.
    type Output;

    /// Run one pass.
    ///
    /// An error from the exact pass aborts the run. An error from a sampled pass
    /// drops that iteration only.
    fn compute(&mut self, mode: ComputeMode<'_>) -> Result<Self::Output>;
}

/// Adapter implementing [`BootstrapAnalysis`] for a closure.
pub struct FnAnalysis<F> {
    func: F,
}

/// Wrap a closure as a [`BootstrapAnalysis`].
pub fn from_fn<T, F>(func: F) -> FnAnalysis<F>
where
    F: FnMut(ComputeMode<'_>) -> Result<T>,
{
    FnAnalysis { func }
}

impl<T, F> BootstrapAnalysis for FnAnalysis<F>
where
    F: FnMut(ComputeMode<'_>) -> Result<T>,
{
    type Output = T;

    fn compute(&mut self, mode: ComputeMode<'_>) -> Result<T> {
        (self.func)(mode)
    }
}

/// Configuration of a bootstrap run.
#[derive(Debug, Clone, PartialEq)]
pub struct BootstrapConfig {
    /// Number of resampled iterations. Default: 1000
    pub iterations: usize,

    /// How uncertain inputs are perturbed. Default: Gaussian
    pub strategy: SamplingStrategy,

    /// Seed for the run's generator; `None` seeds from the OS. Default: None
    pub seed: Option<u64>,
}

impl Default for BootstrapConfig {
    fn default() -> Self {
        Self {
            iterations: 1000,
            strategy: SamplingStrategy::Gaussian,
            seed: None,
        }
    }
}

impl BootstrapConfig {
    /// Build a configuration from fit settings.
    pub fn from_settings(settings: &FitSettings) -> Self {
        Self {
            iterations: settings.bootstrap_iterations,
            strategy: settings.sampling.into(),
            seed: settings.seed,
        }
    }

    /// Replace the sampling strategy.
    pub fn with_strategy(mut self, strategy: SamplingStrategy) -> Self {
        self.strategy = strategy;
        self
    }

    /// Replace the iteration count.
    pub fn with_iterations(mut self, iterations: usize) -> Self {
        self.iterations = iterations;
        self
    }

    /// Replace the seed.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }
}

/// Shared cancellation flag for one run.
///
/// Cloning the handle shares the flag. The loop checks it between iterations
/// only, so an in-flight pass always completes.
#[derive(Debug, Clone, Default)]
pub struct CancellationHandle {
    flag: Arc<AtomicBool>,
}

impl CancellationHandle {
    /// Create a lowered flag.
    pub fn new() -> Self {
        Self::default()
    }

    /// Raise the flag.
    pub fn cancel(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    /// Whether the flag is raised.
    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }

    fn reset(&self) {
        self.flag.store(false, Ordering::SeqCst);
    }
}

/// Progress of a run, reported after every resampled iteration.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Progress {
    /// Iterations completed so far.
    pub iteration: usize,
    /// Configured number of iterations.
    pub total: usize,
    /// `iteration / total`.
    pub fraction: f64,
}

/// Callback receiving [`Progress`] reports.
pub type ProgressCallback = Box<dyn FnMut(Progress) + Send>;

/// Per-run context: cancellation flag and progress sink.
///
/// Each run gets its own context, so concurrent analyses never share state.
#[derive(Default)]
pub struct RunContext {
    cancellation: CancellationHandle,
    progress: Option<ProgressCallback>,
}

impl RunContext {
    /// Context with a fresh flag and no progress reporting.
    pub fn new() -> Self {
        Self::default()
    }

    /// Context sharing an existing cancellation flag.
    pub fn with_cancellation(cancellation: CancellationHandle) -> Self {
        Self {
            cancellation,
            progress: None,
        }
    }

    /// Attach a progress callback.
    pub fn on_progress<F>(mut self, callback: F) -> Self
    where
        F: FnMut(Progress) + Send + 'static,
    {
        self.progress = Some(Box::new(callback));
        self
    }

    /// Handle to raise the run's cancellation flag.
    pub fn cancellation_handle(&self) -> CancellationHandle {
        self.cancellation.clone()
    }

    /// Whether cancellation was requested.
    pub fn is_cancelled(&self) -> bool {
        self.cancellation.is_cancelled()
    }

    /// Forward a progress report to the callback, if any.
    pub fn report_progress(&mut self, iteration: usize, total: usize) {
        if let Some(callback) = self.progress.as_mut() {
            let fraction = if total == 0 {
                1.0
            } else {
                iteration as f64 / total as f64
            };
            callback(Progress {
                iteration,
                total,
                fraction,
            });
        }
    }
}

/// Lifecycle of a [`BootstrapRunner`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BootstrapState {
    /// No run started yet.
    Idle,
    /// A run is in progress.
    Running,
    /// The last run performed every configured iteration.
    Completed,
    /// The last run stopped early on request.
    Cancelled,
}

/// Outcome of a bootstrap run.
#[derive(Debug, Clone)]
pub struct BootstrapRun<T> {
    exact: T,
    samples: Vec<T>,
    completed_iterations: usize,
    requested_iterations: usize,
    cancelled: bool,
    elapsed: Duration,
}

impl<T> BootstrapRun<T> {
    /// Result of the exact pass.
    pub fn exact(&self) -> &T {
        &self.exact
    }

    /// Results of the successful resampled passes, in order.
    pub fn samples(&self) -> &[T] {
        &self.samples
    }

    /// Number of resampled iterations performed, including dropped ones.
    pub fn completed_iterations(&self) -> usize {
        self.completed_iterations
    }

    /// Number of resampled iterations that were dropped after failing.
    pub fn failed_iterations(&self) -> usize {
        self.completed_iterations - self.samples.len()
    }

    /// Configured iteration count.
    pub fn requested_iterations(&self) -> usize {
        self.requested_iterations
    }

    /// Whether the run stopped on a cancellation request.
    pub fn was_cancelled(&self) -> bool {
        self.cancelled
    }

    /// Wall-clock duration of the run.
    pub fn elapsed(&self) -> Duration {
        self.elapsed
    }

    /// Final state of the run.
    pub fn state(&self) -> BootstrapState {
        if self.cancelled {
            BootstrapState::Cancelled
        } else {
            BootstrapState::Completed
        }
    }

    /// Reduce the run to one [`ValueWithError`], centered on the exact result.
    ///
    /// # Errors
    ///
    /// Returns [`BootstrapError::NoSuccessfulSamples`] if no resampled pass succeeded.
    pub fn reduce<F>(&self, extract: F) -> Result<ValueWithError>
    where
        F: Fn(&T) -> f64,
    {
        self.ensure_samples()?;
        let values: Vec<f64> = self.samples.iter().map(&extract).collect();
        Ok(ValueWithError::from_samples_with_mean(&values, extract(&self.exact)))
    }

    /// Reduce a run whose result is a fixed-width vector of scalars into one
    /// [`ValueWithError`] per component.
    ///
    /// # Errors
    ///
    /// Returns [`BootstrapError::NoSuccessfulSamples`] for an empty run and
    /// [`BootstrapError::WidthMismatch`] if a sample has a different width than
    /// the exact result.
    pub fn reduce_components<F>(&self, extract: F) -> Result<Vec<ValueWithError>>
    where
        F: Fn(&T) -> Vec<f64>,
    {
        self.ensure_samples()?;
        let exact = extract(&self.exact);
        let mut columns: Vec<Vec<f64>> = vec![Vec::with_capacity(self.samples.len()); exact.len()];
        for sample in &self.samples {
            let row = extract(sample);
            if row.len() != exact.len() {
                return Err(BootstrapError::WidthMismatch {
                    expected: exact.len(),
                    actual: row.len(),
                }
                .into());
            }
            for (column, value) in columns.iter_mut().zip(row) {
                column.push(value);
            }
        }

        Ok(columns
            .iter()
            .zip(exact)
            .map(|(column, center)| ValueWithError::from_samples_with_mean(column, center))
            .collect())
    }

    /// Split into exact result and samples.
    pub fn into_parts(self) -> (T, Vec<T>) {
        (self.exact, self.samples)
    }

    fn ensure_samples(&self) -> Result<()> {
        if self.samples.is_empty() {
            return Err(BootstrapError::NoSuccessfulSamples {
                attempted: self.completed_iterations,
                cancelled: self.cancelled,
            }
            .into());
        }
        Ok(())
    }
}

/// Drives bootstrap runs and tracks their lifecycle.
#[derive(Debug, Clone)]
pub struct BootstrapRunner {
    config: BootstrapConfig,
    state: BootstrapState,
    started_at: Option<Instant>,
}

impl BootstrapRunner {
    /// Create an idle runner.
    pub fn new(config: BootstrapConfig) -> Self {
        Self {
            config,
            state: BootstrapState::Idle,
            started_at: None,
        }
    }

    /// Current lifecycle state.
    pub fn state(&self) -> BootstrapState {
        self.state
    }

    /// The run configuration.
    pub fn config(&self) -> &BootstrapConfig {
        &self.config
    }

    /// Enter `Running`: lower the context's cancellation flag and timestamp the
    /// start.
    ///
    /// A cancellation requested after `start` returns is honoured by the following
    /// [`execute`](Self::execute), which is how a run handed to another thread
    /// stays cancellable from the moment its handle exists.
    ///
    /// # Errors
    ///
    /// Fails if the iteration count is zero.
    pub fn start(&mut self, ctx: &RunContext) -> Result<()> {
        if self.config.iterations == 0 {
            return Err(BootstrapError::InvalidIterationCount.into());
        }
        ctx.cancellation.reset();
        self.state = BootstrapState::Running;
        self.started_at = Some(Instant::now());
        Ok(())
    }

    /// Execute one run: [`start`](Self::start) followed by [`execute`](Self::execute).
    ///
    /// # Errors
    ///
    /// Fails if the iteration count is zero, if the exact pass fails, or if no
    /// resampled pass succeeds.
    pub fn run<A>(&mut self, analysis: &mut A, ctx: &mut RunContext) -> Result<BootstrapRun<A::Output>>
    where
        A: BootstrapAnalysis,
    {
        self.start(ctx)?;
        self.execute(analysis, ctx)
    }

    /// Perform a started run without touching the cancellation flag.
    ///
    /// Computes the exact result, then up to `iterations` resampled passes. After
    /// each pass progress is reported and the flag checked; a raised flag ends the
    /// run early.
    ///
    /// # Errors
    ///
    /// Fails with [`BootstrapError::NotStarted`] unless the runner is `Running`,
    /// if the exact pass fails, or if no resampled pass succeeds.
    pub fn execute<A>(&mut self, analysis: &mut A, ctx: &mut RunContext) -> Result<BootstrapRun<A::Output>>
    where
        A: BootstrapAnalysis,
    {
        let start = match (self.state, self.started_at) {
            (BootstrapState::Running, Some(start)) => start,
            _ => return Err(BootstrapError::NotStarted.into()),
        };
        let total = self.config.iterations;
        info!("Starting bootstrap run with {} iterations", total);

        let exact = match analysis.compute(ComputeMode::Exact) {
            Ok(exact) => exact,
            Err(err) => {
                self.state = BootstrapState::Completed;
                return Err(err);
            }
        };

        let mut sampler = Sampler::new(self.config.strategy.clone(), self.config.seed);
        let mut samples = Vec::with_capacity(total);
        let mut completed = 0;
        let mut cancelled = false;

        while completed < total {
            match analysis.compute(ComputeMode::Sampled(&mut sampler)) {
                Ok(sample) => samples.push(sample),
                Err(err) => debug!("Dropping bootstrap iteration {}: {}", completed + 1, err),
            }
            completed += 1;
            ctx.report_progress(completed, total);

            if ctx.is_cancelled() {
                cancelled = completed < total;
                break;
            }
        }

        let elapsed = start.elapsed();
        self.state = if cancelled {
            warn!("Bootstrap run cancelled after {} of {} iterations", completed, total);
            BootstrapState::Cancelled
        } else {
            BootstrapState::Completed
        };

        if samples.is_empty() {
            return Err(BootstrapError::NoSuccessfulSamples {
                attempted: completed,
                cancelled,
            }
            .into());
        }

        info!(
            "Bootstrap run finished: {} samples from {} iterations in {:?}",
            samples.len(),
            completed,
            elapsed
        );

        Ok(BootstrapRun {
            exact,
            samples,
            completed_iterations: completed,
            requested_iterations: total,
            cancelled,
            elapsed,
        })
    }
}

/// Run a bootstrap analysis with a fresh runner.
pub fn run_bootstrap<A>(
    analysis: &mut A,
    config: BootstrapConfig,
    ctx: &mut RunContext,
) -> Result<BootstrapRun<A::Output>>
where
    A: BootstrapAnalysis,
{
    BootstrapRunner::new(config).run(analysis, ctx)
}

//! Background execution of bootstrap analyses.
//!
//! [`perform_analysis`] moves an analysis onto a worker thread and reports back
//! through a channel of [`AnalysisEvent`]s: one `Started`, any number of
//! `Progress`, and exactly one `Finished`, whether the run succeeded, failed or
//! was cancelled. The caller keeps a [`CancellationHandle`] to stop the run at the
//! next iteration boundary. The run is started before the worker is spawned, so a
//! cancellation issued as soon as [`perform_analysis`] returns is honoured.

use log::error;
use std::panic::{self, AssertUnwindSafe};
use std::sync::mpsc::{self, Receiver, Sender};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use crate::error::{ItcFitError, Result};
use crate::uncertainty::{
    BootstrapAnalysis, BootstrapConfig, BootstrapError, BootstrapRun, BootstrapRunner,
    CancellationHandle, Progress, RunContext,
};

/// Final report of an analysis.
#[derive(Debug)]
pub struct AnalysisOutcome<R> {
    /// The reduced result, or a human-readable failure message.
    pub result: std::result::Result<R, String>,
    /// Resampled iterations performed before the run ended, failed ones included.
    pub completed_iterations: usize,
    /// Wall-clock time of the whole analysis.
    pub elapsed: Duration,
    /// Whether the run stopped on a cancellation request.
    pub cancelled: bool,
}

/// Events emitted by a running analysis.
#[derive(Debug)]
pub enum AnalysisEvent<R> {
    /// The worker has started.
    Started,
    /// A resampled iteration finished.
    Progress(Progress),
    /// The analysis ended. Sent exactly once.
    Finished(AnalysisOutcome<R>),
}

/// Handle to an analysis running on a worker thread.
pub struct AnalysisHandle<R> {
    events: Receiver<AnalysisEvent<R>>,
    cancellation: CancellationHandle,
    worker: JoinHandle<()>,
}

impl<R> AnalysisHandle<R> {
    /// Receiver for the analysis events.
    pub fn events(&self) -> &Receiver<AnalysisEvent<R>> {
        &self.events
    }

    /// Request cancellation; takes effect before the next iteration.
    pub fn cancel(&self) {
        self.cancellation.cancel();
    }

    /// A clone of the cancellation handle.
    pub fn cancellation_handle(&self) -> CancellationHandle {
        self.cancellation.clone()
    }

    /// Block until the analysis finishes and return its outcome, discarding
    /// intermediate events.
    pub fn wait(self) -> Result<AnalysisOutcome<R>> {
        let mut outcome = None;
        for event in self.events.iter() {
            if let AnalysisEvent::Finished(finished) = event {
                outcome = Some(finished);
            }
        }
        self.worker
            .join()
            .map_err(|_| ItcFitError::Other("analysis worker panicked".to_string()))?;
        outcome.ok_or_else(|| ItcFitError::Other("analysis ended without a result".to_string()))
    }
}

/// Start an analysis on a worker thread.
///
/// `reduce` turns the finished bootstrap run into the caller's result type, for
/// example by calling [`BootstrapRun::reduce`] on the fitted quantity.
pub fn perform_analysis<A, R, F>(mut analysis: A, config: BootstrapConfig, reduce: F) -> AnalysisHandle<R>
where
    A: BootstrapAnalysis + Send + 'static,
    A::Output: Send,
    R: Send + 'static,
    F: FnOnce(&BootstrapRun<A::Output>) -> Result<R> + Send + 'static,
{
    let (sender, events) = mpsc::channel();
    let cancellation = CancellationHandle::new();

    let progress_sender: Sender<AnalysisEvent<R>> = sender.clone();
    let mut ctx = RunContext::with_cancellation(cancellation.clone()).on_progress(move |p| {
        let _ = progress_sender.send(AnalysisEvent::Progress(p));
    });
    let mut runner = BootstrapRunner::new(config);
    let started = runner.start(&ctx);

    let worker = thread::spawn(move || {
        let clock = Instant::now();
        let _ = sender.send(AnalysisEvent::Started);

        let outcome = panic::catch_unwind(AssertUnwindSafe(|| -> Result<(Result<R>, usize, bool)> {
            started?;
            match runner.execute(&mut analysis, &mut ctx) {
                Ok(run) => Ok((reduce(&run), run.completed_iterations(), run.was_cancelled())),
                Err(err) => match &err {
                    ItcFitError::Bootstrap(BootstrapError::NoSuccessfulSamples { attempted, cancelled }) => {
                        let (attempted, cancelled) = (*attempted, *cancelled);
                        Ok((Err(err), attempted, cancelled))
                    }
                    _ => Err(err),
                },
            }
        }));

        let (result, completed_iterations, cancelled) = match outcome {
            Ok(Ok((result, completed_iterations, cancelled))) => (result, completed_iterations, cancelled),
            Ok(Err(err)) => (Err(err), 0, false),
            Err(_) => (Err(ItcFitError::Other("analysis panicked".to_string())), 0, false),
        };
        if let Err(err) = &result {
            error!("Analysis failed: {}", err);
        }

        let _ = sender.send(AnalysisEvent::Finished(AnalysisOutcome {
            result: result.map_err(|err| err.to_string()),
            completed_iterations,
            elapsed: clock.elapsed(),
            cancelled,
        }));
    });

    AnalysisHandle {
        events,
        cancellation,
        worker,
    }
}

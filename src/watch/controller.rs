use std::future::Future;
use std::io;
use std::path::PathBuf;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Instant;

use crossbeam::channel::{Receiver, RecvTimeoutError, Sender};
use parking_lot::Mutex;

use crate::config::WatchSettings;
use crate::orchestrator::{self, ContentHash, Orchestrator, ProcessOutcome, Snapshot};
use super::state::Debouncer;

#[derive(Debug)]
pub enum JobOutcome {
    /// The contents on disk were this process's own last write.
    Suppressed,
    Processed(ProcessOutcome),
}

impl JobOutcome {
    fn written(&self) -> Option<ContentHash> {
        match self {
            JobOutcome::Processed(ProcessOutcome::Rewritten(hash)) => Some(*hash),
            _ => None,
        }
    }
}

/// Sent to an optional observer each time a path finishes processing.
#[derive(Debug)]
pub struct WatchReport {
    pub path: PathBuf,
    pub outcome: JobOutcome,
}

enum Signal {
    Touched(PathBuf),
    Removed(PathBuf),
    Finished(WatchReport),
    Shutdown,
}

struct Job {
    path: PathBuf,
    last_written: Option<ContentHash>,
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct SweepSummary {
    pub rewritten: usize,
    pub unchanged: usize,
    pub failed: usize,
}

pub struct Controller {
    orchestrator: Arc<Orchestrator>,
    settings: WatchSettings,
    debouncer: Debouncer,
}

impl Controller {
    pub fn new(orchestrator: Orchestrator, settings: WatchSettings) -> Self {
        Self {
            orchestrator: Arc::new(orchestrator),
            settings,
            debouncer: Debouncer::new(settings.debounce),
        }
    }

    /// Processes every file found at startup once, remembering what was
    /// written so the resulting notifications are recognised later.
    pub fn sweep(&mut self, paths: &[PathBuf]) -> SweepSummary {
        let mut summary = SweepSummary::default();
        for path in paths {
            match self.orchestrator.process(path) {
                ProcessOutcome::Rewritten(hash) => {
                    summary.rewritten += 1;
                    self.debouncer.seed(path.clone(), hash);
                }
                ProcessOutcome::Unchanged => summary.unchanged += 1,
                ProcessOutcome::Failed(_) => summary.failed += 1,
            }
        }
        tracing::info!(
            "initial scan complete: {} rewritten, {} unchanged, {} failed",
            summary.rewritten,
            summary.unchanged,
            summary.failed
        );
        summary
    }

    /// Starts the intake thread and the worker pool.
    pub fn spawn(self, reports: Option<Sender<WatchReport>>) -> ControllerHandle {
        let (signal_tx, signal_rx) = crossbeam::channel::unbounded();
        let (job_tx, job_rx) = crossbeam::channel::unbounded();

        let mut threads = Vec::with_capacity(self.settings.workers + 1);
        for _ in 0..self.settings.workers {
            let orchestrator = Arc::clone(&self.orchestrator);
            let jobs = job_rx.clone();
            let signals = signal_tx.clone();
            threads.push(thread::spawn(move || {
                worker_thread(&orchestrator, jobs, signals);
            }));
        }

        let debouncer = self.debouncer;
        threads.push(thread::spawn(move || {
            intake_thread(debouncer, signal_rx, job_tx, reports);
        }));

        ControllerHandle {
            signals: signal_tx,
            threads: Mutex::new(threads),
        }
    }
}

fn intake_thread(
    mut debouncer: Debouncer,
    signal_rx: Receiver<Signal>,
    job_tx: Sender<Job>,
    reports: Option<Sender<WatchReport>>,
) {
    loop {
        let signal = match debouncer.next_deadline() {
            Some(deadline) => match signal_rx.recv_deadline(deadline) {
                Ok(signal) => Some(signal),
                Err(RecvTimeoutError::Timeout) => None,
                Err(RecvTimeoutError::Disconnected) => break,
            },
            None => match signal_rx.recv() {
                Ok(signal) => Some(signal),
                Err(_) => break,
            },
        };

        let now = Instant::now();
        match signal {
            Some(Signal::Touched(path)) => debouncer.touch(path, now),
            Some(Signal::Removed(path)) => debouncer.forget(&path),
            Some(Signal::Finished(report)) => {
                if debouncer.finish(&report.path, report.outcome.written(), now) {
                    let path = report.path.display();
                    tracing::debug!("{} changed while processing, queued again", path);
                }
                if let Some(reports) = &reports {
                    let _ = reports.send(report);
                }
            }
            Some(Signal::Shutdown) => break,
            None => {}
        }

        for (path, last_written) in debouncer.take_due(now) {
            if job_tx.send(Job { path, last_written }).is_err() {
                return;
            }
        }
    }
    tracing::debug!("watch intake stopped");
}

fn worker_thread(orchestrator: &Orchestrator, job_rx: Receiver<Job>, signal_tx: Sender<Signal>) {
    for job in job_rx.iter() {
        let outcome = match Snapshot::read(&job.path) {
            Ok(snapshot) if Some(snapshot.hash) == job.last_written => {
                tracing::debug!("ignoring own write to {}", job.path.display());
                JobOutcome::Suppressed
            }
            Ok(snapshot) => {
                JobOutcome::Processed(orchestrator.process_snapshot(&job.path, snapshot))
            }
            Err(e) => JobOutcome::Processed(orchestrator::conclude(&job.path, Err(e))),
        };
        let report = WatchReport {
            path: job.path,
            outcome,
        };
        if signal_tx.send(Signal::Finished(report)).is_err() {
            break;
        }
    }
}

/// Feeds filesystem notifications into a running controller.
#[derive(Clone)]
pub struct Notifier {
    signals: Sender<Signal>,
}

impl Notifier {
    pub fn touch(&self, path: PathBuf) {
        let _ = self.signals.send(Signal::Touched(path));
    }

    pub fn remove(&self, path: PathBuf) {
        let _ = self.signals.send(Signal::Removed(path));
    }
}

pub struct ControllerHandle {
    signals: Sender<Signal>,
    threads: Mutex<Vec<JoinHandle<()>>>,
}

impl ControllerHandle {
    pub fn touch(&self, path: PathBuf) {
        let _ = self.signals.send(Signal::Touched(path));
    }

    pub fn notifier(&self) -> Notifier {
        Notifier {
            signals: self.signals.clone(),
        }
    }

    /// Stops taking events and waits for in-flight jobs to finish.
    pub fn shutdown(&self) {
        let _ = self.signals.send(Signal::Shutdown);
        for handle in self.threads.lock().drain(..) {
            if handle.join().is_err() {
                tracing::error!("watch thread panicked");
            }
        }
    }
}

impl ControllerHandle {
    /// Blocks the calling thread until `stop` resolves, then shuts down.
    pub fn run_until<F>(&self, stop: F) -> io::Result<()>
    where
        F: Future<Output = io::Result<()>>,
    {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()?;
        let stopped = runtime.block_on(stop);
        self.shutdown();
        stopped
    }
}

impl Drop for ControllerHandle {
    fn drop(&mut self) {
        self.shutdown();
    }
}

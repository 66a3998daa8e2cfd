//! Job executor: carries chunk jobs off the scheduler thread

use tokio::sync::mpsc;

use crate::core::Error;
use crate::streaming::job::{ChunkJob, CompletedJob};
use crate::streaming::StreamingDeps;

enum Mode {
    /// Jobs run on the caller's thread at submit time. Zero-worker
    /// configurations use this; it also makes tests deterministic.
    Inline,
    /// Jobs run on a dedicated runtime's blocking pool
    Pool(tokio::runtime::Runtime),
}

/// Runs chunk jobs and reports completions without ever blocking the
/// scheduler. Submitted jobs already hold their chunk's resolution lock;
/// the executor's only contract is that each job runs exactly once and
/// its completion record eventually comes back through [`poll_completed`].
///
/// [`poll_completed`]: JobExecutor::poll_completed
pub struct JobExecutor {
    mode: Mode,
    in_flight: usize,
    completed_tx: mpsc::UnboundedSender<CompletedJob>,
    completed_rx: mpsc::UnboundedReceiver<CompletedJob>,
}

impl JobExecutor {
    /// Build an executor with `workers` blocking threads, or an inline
    /// executor when `workers` is zero.
    pub fn new(workers: usize) -> Result<Self, Error> {
        let mode = if workers == 0 {
            Mode::Inline
        } else {
            let runtime = tokio::runtime::Builder::new_multi_thread()
                .worker_threads(1)
                .max_blocking_threads(workers)
                .thread_name("terrain-worker")
                .build()
                .map_err(Error::Io)?;
            Mode::Pool(runtime)
        };
        let (completed_tx, completed_rx) = mpsc::unbounded_channel();
        Ok(Self {
            mode,
            in_flight: 0,
            completed_tx,
            completed_rx,
        })
    }

    /// Number of submitted jobs whose completion has not been polled yet
    pub fn in_flight(&self) -> usize {
        self.in_flight
    }

    pub fn submit(&mut self, job: ChunkJob, deps: &StreamingDeps) {
        self.in_flight += 1;
        match &self.mode {
            Mode::Inline => {
                let done = job.run(deps);
                let _ = self.completed_tx.send(done);
            }
            Mode::Pool(runtime) => {
                let tx = self.completed_tx.clone();
                let deps = deps.clone();
                runtime.spawn_blocking(move || {
                    let done = job.run(&deps);
                    let _ = tx.send(done);
                });
            }
        }
    }

    /// Drain every completion that has arrived so far, never blocking
    pub fn poll_completed(&mut self) -> Vec<CompletedJob> {
        let mut done = Vec::new();
        while let Ok(job) = self.completed_rx.try_recv() {
            done.push(job);
        }
        self.in_flight -= done.len();
        done
    }
}

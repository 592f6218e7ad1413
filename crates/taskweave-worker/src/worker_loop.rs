//! The worker's single control loop: heartbeat, report, poll, execute, sleep.

use crate::coordinator::Coordinator;
use crate::executor::{ExecutorState, TaskExecutor};
use std::time::Duration;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

pub struct WorkerLoop {
    coordinator: Coordinator,
    executor: TaskExecutor,
    heartbeat_interval: Duration,
    poll_interval: Duration,
    last_heartbeat: Option<Instant>,
}

impl WorkerLoop {
    pub fn new(
        coordinator: Coordinator,
        executor: TaskExecutor,
        heartbeat_interval: Duration,
        poll_interval: Duration,
    ) -> Self {
        Self {
            coordinator,
            executor,
            heartbeat_interval,
            poll_interval,
            last_heartbeat: None,
        }
    }

    pub fn coordinator(&self) -> &Coordinator {
        &self.coordinator
    }

    pub fn coordinator_mut(&mut self) -> &mut Coordinator {
        &mut self.coordinator
    }

    pub fn executor(&self) -> &TaskExecutor {
        &self.executor
    }

    fn heartbeat_due(&self) -> bool {
        match self.last_heartbeat {
            None => true,
            Some(at) => at.elapsed() > self.heartbeat_interval,
        }
    }

    /// One iteration without the trailing sleep. Returns the terminal state
    /// of the task executed this cycle, if any.
    pub async fn run_cycle(&mut self) -> Option<ExecutorState> {
        if !self.coordinator.is_registered() {
            warn!("Worker not registered, skipping cycle");
            return None;
        }

        if self.heartbeat_due() && self.coordinator.heartbeat().await {
            self.last_heartbeat = Some(Instant::now());
        }

        if self.executor.state() != ExecutorState::Idle {
            return None;
        }

        if let Err(e) = self.coordinator.report_available().await {
            warn!("Failed to report available status: {}", e);
        }

        let task = match self.coordinator.poll_assigned().await {
            Ok(Some(task)) => task,
            Ok(None) => {
                debug!("No tasks assigned");
                return None;
            }
            Err(e) => {
                warn!("Failed to poll tasks: {}", e);
                return None;
            }
        };

        Some(self.executor.execute(&task, &mut self.coordinator).await)
    }

    /// Run until `shutdown` is cancelled. A task in flight always finishes
    /// before the loop exits.
    pub async fn run(&mut self, shutdown: CancellationToken) {
        info!(
            "Worker {} running (heartbeat every {:?}, poll every {:?})",
            self.coordinator.name(),
            self.heartbeat_interval,
            self.poll_interval
        );

        while !shutdown.is_cancelled() {
            self.run_cycle().await;

            tokio::select! {
                _ = shutdown.cancelled() => break,
                _ = tokio::time::sleep(self.poll_interval) => {}
            }
        }

        info!("Worker {} stopped", self.coordinator.name());
    }
}

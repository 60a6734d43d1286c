use super::error::SystemError;
use crate::heartbeat_actor::{Heartbeat, HeartbeatActor, HeartbeatProxy};
use crate::model::Job;
use crate::plugins::{PendingMessages, PendingMessagesPlugin};
use crate::pool_actor::{PoolActor, WorkerPool, WorkerPoolProxy};
use crate::worker_actor::WorkerProxy;
use actor_runtime::{
    Definition, RingBufferMailboxPlugin, Stage, StageConfig, RING_BUFFER_MAILBOX,
};
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

const QUERY_TIMEOUT: Duration = Duration::from_secs(5);

/// Settings for [`ProcessingSystem::start`].
#[derive(Debug, Clone)]
pub struct SystemConfig {
    pub stage: StageConfig,
    pub workers: usize,
    /// Slots per worker mailbox. Workers use the ring buffer mailbox.
    pub worker_mailbox_size: usize,
    pub heartbeat_interval: Duration,
}

impl Default for SystemConfig {
    fn default() -> Self {
        Self {
            stage: StageConfig::named("processing"),
            workers: 3,
            worker_mailbox_size: 256,
            heartbeat_interval: Duration::from_millis(100),
        }
    }
}

/// Summary returned by [`ProcessingSystem::shutdown`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShutdownReport {
    pub processed: Vec<(String, u64)>,
    pub beats: u64,
    pub dead_letters: u64,
}

/// The runtime orchestrator for the job processing sample.
///
/// `ProcessingSystem` is responsible for:
/// - **Stage Setup**: Starting a stage with the ring buffer and pending-messages plugins
/// - **Actor Wiring**: Creating the worker pool (which creates its workers) and the heartbeat
/// - **Graceful Shutdown**: Stopping the heartbeat, collecting a report, terminating the stage
///
/// # Example
///
/// ```ignore
/// let system = ProcessingSystem::start(SystemConfig::default()).await?;
///
/// system.submit(Job::new(1, "thumbnail"));
/// let report = system.shutdown().await?;
/// ```
pub struct ProcessingSystem {
    stage: Stage,
    pool: WorkerPoolProxy,
    heartbeat: HeartbeatProxy,
    pending: Arc<PendingMessages>,
}

impl ProcessingSystem {
    /// Starts the stage and all actors. The heartbeat is already beating on return.
    pub async fn start(config: SystemConfig) -> Result<Self, SystemError> {
        let plugin = PendingMessagesPlugin::new();
        let pending = plugin.observer();

        let stage = Stage::builder(config.stage)
            .with_plugin(RingBufferMailboxPlugin::with_size(config.worker_mailbox_size))
            .with_plugin(plugin)
            .start()
            .await?;

        let pool = stage.actor_for::<dyn WorkerPool, _>(
            Definition::has(PoolActor::with_workers(
                config.workers,
                Some(RING_BUFFER_MAILBOX),
            ))
            .named("pool"),
        )?;
        let heartbeat = stage
            .actor_for::<dyn Heartbeat, _>(Definition::has(HeartbeatActor::new()).named("heartbeat"))?;
        heartbeat.start_beating(config.heartbeat_interval);

        info!(stage = stage.name(), workers = config.workers, "Processing system started");
        Ok(Self {
            stage,
            pool,
            heartbeat,
            pending,
        })
    }

    pub fn stage(&self) -> &Stage {
        &self.stage
    }

    pub fn pool(&self) -> &WorkerPoolProxy {
        &self.pool
    }

    pub fn heartbeat(&self) -> &HeartbeatProxy {
        &self.heartbeat
    }

    pub fn pending(&self) -> &PendingMessages {
        &self.pending
    }

    /// Routes `job` to the next worker.
    pub fn submit(&self, job: Job) {
        self.pool.process(job);
    }

    pub async fn workers(&self) -> Result<Vec<WorkerProxy>, SystemError> {
        self.pool
            .workers()
            .outcome_within(QUERY_TIMEOUT)
            .await
            .map_err(SystemError::query("WorkerPool::workers"))
    }

    /// Jobs completed per worker, in routing order.
    pub async fn processed(&self) -> Result<Vec<(String, u64)>, SystemError> {
        let mut processed = Vec::new();
        for worker in self.workers().await? {
            let name = worker
                .worker_name()
                .outcome_within(QUERY_TIMEOUT)
                .await
                .map_err(SystemError::query("Worker::worker_name"))?;
            let completed = worker
                .completed()
                .outcome_within(QUERY_TIMEOUT)
                .await
                .map_err(SystemError::query("Worker::completed"))?;
            processed.push((name, completed));
        }
        Ok(processed)
    }

    /// Stops the heartbeat, reports what happened and terminates the stage.
    pub async fn shutdown(self) -> Result<ShutdownReport, SystemError> {
        info!("Shutting down processing system...");

        self.heartbeat
            .stop_beating()
            .outcome_within(QUERY_TIMEOUT)
            .await
            .map_err(SystemError::query("Heartbeat::stop_beating"))?;
        let beats = self
            .heartbeat
            .beats()
            .outcome_within(QUERY_TIMEOUT)
            .await
            .map_err(SystemError::query("Heartbeat::beats"))?;
        let processed = self.processed().await?;

        self.stage.terminate().await;

        let report = ShutdownReport {
            processed,
            beats,
            dead_letters: self.stage.dead_letters().total(),
        };
        info!(?report, "Processing system shut down");
        Ok(report)
    }
}

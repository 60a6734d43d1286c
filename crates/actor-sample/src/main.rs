//! # Actor Runtime Sample
//!
//! A small job processing system running on the actor runtime.
//!
//! ## Core Components
//!
//! - **[worker_actor](actor_sample::worker_actor)**: Workers that process jobs one at a time.
//! - **[pool_actor](actor_sample::pool_actor)**: A round-robin router actor in front of the workers.
//! - **[heartbeat_actor](actor_sample::heartbeat_actor)**: An actor driven by the stage scheduler.
//! - **[plugins](actor_sample::plugins)**: A stage plugin that observes mailbox depth.
//! - **[lifecycle](actor_sample::lifecycle)**: Orchestration of startup and shutdown.
//!
//! ## Quick Start
//!
//! The entry point below:
//! 1.  Starts the [`ProcessingSystem`](actor_sample::lifecycle::ProcessingSystem).
//! 2.  Submits a batch of jobs through the pool.
//! 3.  Shuts down and logs who processed what.

use actor_runtime::tracing::setup_tracing;
use actor_runtime::Proxy;
use actor_sample::lifecycle::{ProcessingSystem, SystemConfig, SystemError};
use actor_sample::model::Job;
use std::time::Duration;
use tracing::{info, Instrument};

const JOBS: u64 = 30;

#[tokio::main]
async fn main() -> Result<(), SystemError> {
    setup_tracing();

    info!("Starting job processing sample");
    let system = ProcessingSystem::start(SystemConfig::default()).await?;

    let span = tracing::info_span!("submission", jobs = JOBS);
    async {
        for id in 0..JOBS {
            system.submit(Job::new(id, format!("payload-{id}")));
        }
        info!("Jobs submitted");
    }
    .instrument(span)
    .await;

    // Give the heartbeat a few beats.
    tokio::time::sleep(Duration::from_millis(350)).await;

    for (worker, depth) in system
        .workers()
        .await?
        .iter()
        .map(|worker| (worker.address().clone(), system.pending().depth(worker.address())))
    {
        info!(%worker, ?depth, "Worker mailbox");
    }

    let report = system.shutdown().await?;
    for (worker, processed) in &report.processed {
        info!(worker = %worker, processed, "Worker summary");
    }
    info!(
        beats = report.beats,
        dead_letters = report.dead_letters,
        "Sample completed successfully"
    );
    Ok(())
}

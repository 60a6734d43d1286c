//! # Worker Actor
//!
//! The routee behind the [`WorkerPool`](crate::pool_actor::WorkerPool). Each worker
//! processes the jobs routed to it one at a time and can report how many it finished.
//!
//! ## Usage
//!
//! ```rust
//! use actor_runtime::{Definition, Stage, StageConfig};
//! use actor_sample::model::Job;
//! use actor_sample::worker_actor::{Worker, WorkerActor};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let stage = Stage::builder(StageConfig::named("docs")).start().await?;
//!     let worker = stage.actor_for::<dyn Worker, _>(Definition::has(WorkerActor::named("w1")))?;
//!
//!     worker.process(Job::new(1, "resize"));
//!     assert_eq!(worker.completed().outcome().await?, 1);
//!
//!     stage.terminate().await;
//!     Ok(())
//! }
//! ```

use crate::model::Job;
use actor_runtime::{actor_protocol, Actor, Completes, Context};
use tracing::{debug, info};

actor_protocol! {
    /// Processes jobs one at a time.
    pub trait Worker {
        fn process(&mut self, job: Job);
        fn completed(&mut self) -> Completes<u64>;
        fn worker_name(&mut self) -> Completes<String>;
    }
}

pub struct WorkerActor {
    name: String,
    completed: u64,
    checksum: u64,
}

impl WorkerActor {
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            completed: 0,
            checksum: 0,
        }
    }
}

impl Actor for WorkerActor {
    fn stopped(&mut self, context: &Context<Self>) {
        info!(
            worker = %self.name,
            address = %context.address(),
            completed = self.completed,
            checksum = self.checksum,
            "Worker stopped"
        );
    }
}

impl Worker for WorkerActor {
    fn process(&mut self, job: Job) {
        let checksum = job.checksum();
        self.checksum ^= checksum;
        self.completed += 1;
        debug!(worker = %self.name, job = %job.id, checksum, "Job processed");
    }

    fn completed(&mut self) -> Completes<u64> {
        Completes::with(self.completed)
    }

    fn worker_name(&mut self) -> Completes<String> {
        Completes::with(self.name.clone())
    }
}

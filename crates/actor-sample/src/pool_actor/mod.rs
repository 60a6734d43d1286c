//! # Worker Pool Actor
//!
//! A router actor that spreads jobs across [`Worker`](crate::worker_actor::Worker)s in
//! round-robin order.
//!
//! The pool creates its initial workers from a [`RouterSpecification`] when it starts,
//! and more can join or leave later through [`WorkerPool::subscribe`] and
//! [`WorkerPool::unsubscribe`]. Because routee changes and routed calls are messages on
//! the pool's own mailbox, they never race with each other.
//!
//! ```text
//! caller ── process(job) ──▶ [pool mailbox] ──▶ Router ──▶ worker-0
//!                                                      ├──▶ worker-1
//!                                                      └──▶ worker-2
//! ```

use crate::model::Job;
use crate::worker_actor::{Worker, WorkerActor, WorkerProxy};
use actor_runtime::{
    actor_protocol, Actor, Completes, Context, Definition, Proxy, Routee, Router,
    RouterSpecification,
};
use tracing::{error, info};

actor_protocol! {
    /// Routes worker calls to the pool's routees.
    pub trait WorkerPool {
        fn subscribe(&mut self, worker: WorkerProxy);
        fn unsubscribe(&mut self, worker: WorkerProxy);
        fn process(&mut self, job: Job);
        fn worker_name(&mut self) -> Completes<String>;
        fn workers(&mut self) -> Completes<Vec<WorkerProxy>>;
    }
}

pub struct PoolActor {
    router: Router<WorkerProxy>,
    specification: Option<RouterSpecification<WorkerActor>>,
}

impl PoolActor {
    /// A pool that starts `size` workers named `worker-0`, `worker-1`, ...
    ///
    /// Workers use `mailbox` when given, otherwise the stage default.
    pub fn with_workers(size: usize, mailbox: Option<&str>) -> Self {
        let mailbox = mailbox.map(str::to_string);
        Self {
            router: Router::round_robin(),
            specification: Some(RouterSpecification::new(size, move |index| {
                let name = format!("worker-{index}");
                let definition = Definition::has(WorkerActor::named(name.clone())).named(name);
                match &mailbox {
                    Some(mailbox) => definition.with_mailbox(mailbox.clone()),
                    None => definition,
                }
            })),
        }
    }

    /// A pool without workers; subscribe them later.
    pub fn empty() -> Self {
        Self {
            router: Router::round_robin(),
            specification: None,
        }
    }
}

impl Actor for PoolActor {
    fn started(&mut self, context: &Context<Self>) {
        let Some(specification) = self.specification.take() else {
            return;
        };
        match self
            .router
            .populate::<dyn Worker, WorkerActor>(context.stage(), &specification)
        {
            Ok(()) => info!(workers = self.router.len(), "Worker pool populated"),
            Err(e) => error!(error = %e, "Failed to populate worker pool"),
        }
    }
}

impl WorkerPool for PoolActor {
    fn subscribe(&mut self, worker: WorkerProxy) {
        self.router.subscribe(Routee::of(worker));
    }

    fn unsubscribe(&mut self, worker: WorkerProxy) {
        self.router.unsubscribe(worker.address());
    }

    fn process(&mut self, job: Job) {
        self.router.dispatch_command(|worker| worker.process(job.clone()));
    }

    fn worker_name(&mut self) -> Completes<String> {
        self.router.dispatch_query(|worker| worker.worker_name())
    }

    fn workers(&mut self) -> Completes<Vec<WorkerProxy>> {
        Completes::with(
            self.router
                .routees()
                .iter()
                .map(|routee| routee.proxy().clone())
                .collect(),
        )
    }
}

use actor_runtime::{
    actor_protocol, Actor, Broadcast, Completes, CompletesError, Context, Definition, Proxy,
    Routee, Router, RouterSpecification, Stage, StageConfig,
};
use std::time::Duration;

const WAIT: Duration = Duration::from_secs(5);

// --- Test Protocols ---

actor_protocol! {
    pub trait Worker {
        fn work(&mut self, job: u64);
        fn worker_name(&mut self) -> Completes<String>;
        fn jobs(&mut self) -> Completes<Vec<u64>>;
    }
}

actor_protocol! {
    pub trait WorkerPool {
        fn subscribe(&mut self, worker: WorkerProxy);
        fn unsubscribe(&mut self, worker: WorkerProxy);
        fn work(&mut self, job: u64);
        fn worker_name(&mut self) -> Completes<String>;
    }
}

// --- Test Actors ---

struct WorkerActor {
    name: String,
    jobs: Vec<u64>,
}

impl WorkerActor {
    fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            jobs: Vec::new(),
        }
    }
}

impl Actor for WorkerActor {}

impl Worker for WorkerActor {
    fn work(&mut self, job: u64) {
        self.jobs.push(job);
    }

    fn worker_name(&mut self) -> Completes<String> {
        Completes::with(self.name.clone())
    }

    fn jobs(&mut self) -> Completes<Vec<u64>> {
        Completes::with(self.jobs.clone())
    }
}

struct PoolActor {
    router: Router<WorkerProxy>,
    specification: Option<RouterSpecification<WorkerActor>>,
}

impl PoolActor {
    fn empty() -> Self {
        Self {
            router: Router::round_robin(),
            specification: None,
        }
    }
}

impl Actor for PoolActor {
    fn started(&mut self, context: &Context<Self>) {
        if let Some(specification) = self.specification.take() {
            self.router
                .populate::<dyn Worker, WorkerActor>(context.stage(), &specification)
                .unwrap();
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

    fn work(&mut self, job: u64) {
        self.router.dispatch_command(|worker| worker.work(job));
    }

    fn worker_name(&mut self) -> Completes<String> {
        self.router.dispatch_query(|worker| worker.worker_name())
    }
}

// --- Helpers ---

async fn stage(name: &str) -> Stage {
    actor_runtime::tracing::try_setup_tracing();
    Stage::builder(StageConfig::named(name).with_pool_size(2))
        .start()
        .await
        .unwrap()
}

fn worker(stage: &Stage, name: &str) -> WorkerProxy {
    stage
        .actor_for::<dyn Worker, _>(Definition::has(WorkerActor::named(name)).named(name))
        .unwrap()
}

async fn names(pool: &WorkerPoolProxy, count: usize) -> Vec<String> {
    let answers: Vec<_> = (0..count).map(|_| pool.worker_name()).collect();
    let mut names = Vec::new();
    for answer in answers {
        names.push(answer.outcome_within(WAIT).await.unwrap());
    }
    names
}

// --- Tests ---

#[tokio::test]
async fn test_round_robin_visits_routees_in_subscription_order() {
    let stage = stage("round-robin").await;
    let pool: WorkerPoolProxy = stage
        .actor_for::<dyn WorkerPool, _>(Definition::has(PoolActor::empty()))
        .unwrap();

    let first = worker(&stage, "R1");
    let second = worker(&stage, "R2");
    let third = worker(&stage, "R3");
    pool.subscribe(first.clone());
    pool.subscribe(second.clone());
    pool.subscribe(third.clone());

    assert_eq!(names(&pool, 4).await, vec!["R1", "R2", "R3", "R1"]);

    pool.unsubscribe(second);
    assert_eq!(names(&pool, 2).await, vec!["R3", "R1"]);

    stage.terminate().await;
}

#[tokio::test]
async fn test_unsubscribing_a_visited_routee_keeps_the_rotation() {
    let stage = stage("round-robin-removal").await;
    let pool: WorkerPoolProxy = stage
        .actor_for::<dyn WorkerPool, _>(Definition::has(PoolActor::empty()))
        .unwrap();

    let first = worker(&stage, "R1");
    pool.subscribe(first.clone());
    pool.subscribe(worker(&stage, "R2"));
    pool.subscribe(worker(&stage, "R3"));

    assert_eq!(names(&pool, 2).await, vec!["R1", "R2"]);

    pool.unsubscribe(first);
    assert_eq!(names(&pool, 3).await, vec!["R3", "R2", "R3"]);

    stage.terminate().await;
}

#[tokio::test]
async fn test_duplicate_subscription_is_ignored() {
    let stage = stage("duplicates").await;
    let pool: WorkerPoolProxy = stage
        .actor_for::<dyn WorkerPool, _>(Definition::has(PoolActor::empty()))
        .unwrap();

    let only = worker(&stage, "only");
    pool.subscribe(only.clone());
    pool.subscribe(only.clone());

    assert_eq!(names(&pool, 3).await, vec!["only", "only", "only"]);
    stage.terminate().await;
}

#[tokio::test]
async fn test_empty_router_fails_queries_and_drops_commands() {
    let stage = stage("empty-router").await;
    let pool: WorkerPoolProxy = stage
        .actor_for::<dyn WorkerPool, _>(Definition::has(PoolActor::empty()))
        .unwrap();

    pool.work(1);
    let answer = pool.worker_name().outcome_within(WAIT).await;
    assert_eq!(answer, Err(CompletesError::NoRoutees));
    assert!(stage.dead_letters().is_empty());
    stage.terminate().await;
}

#[tokio::test]
async fn test_router_populates_from_specification() {
    let stage = stage("populate").await;
    let pool: WorkerPoolProxy = stage
        .actor_for::<dyn WorkerPool, _>(Definition::has(PoolActor {
            router: Router::round_robin(),
            specification: Some(RouterSpecification::new(3, |index| {
                Definition::has(WorkerActor::named(format!("worker-{index}")))
            })),
        }))
        .unwrap();

    assert_eq!(
        names(&pool, 3).await,
        vec!["worker-0", "worker-1", "worker-2"]
    );
    assert_eq!(stage.actor_count(), 4);
    stage.terminate().await;
}

#[tokio::test]
async fn test_commands_spread_across_routees() {
    let stage = stage("spread").await;
    let pool: WorkerPoolProxy = stage
        .actor_for::<dyn WorkerPool, _>(Definition::has(PoolActor::empty()))
        .unwrap();
    let workers: Vec<_> = ["a", "b"].iter().map(|name| worker(&stage, name)).collect();
    for worker in &workers {
        pool.subscribe(worker.clone());
    }

    for job in 0..6 {
        pool.work(job);
    }
    // Flush the pool's mailbox so every job has been forwarded.
    names(&pool, 2).await;

    let a = workers[0].jobs().outcome_within(WAIT).await.unwrap();
    let b = workers[1].jobs().outcome_within(WAIT).await.unwrap();
    assert_eq!(a, vec![0, 2, 4]);
    assert_eq!(b, vec![1, 3, 5]);
    stage.terminate().await;
}

#[tokio::test]
async fn test_broadcast_reaches_every_routee() {
    let stage = stage("broadcast").await;
    let mut router: Router<WorkerProxy, Broadcast> = Router::new(Broadcast);
    for name in ["x", "y", "z"] {
        router.subscribe(Routee::of(worker(&stage, name)));
    }

    router.dispatch_command(|worker| worker.work(42));

    for routee in router.routees() {
        let jobs = routee.proxy().jobs().outcome_within(WAIT).await.unwrap();
        assert_eq!(jobs, vec![42]);
    }
    stage.terminate().await;
}

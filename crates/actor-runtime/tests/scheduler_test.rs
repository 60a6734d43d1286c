use actor_runtime::{
    actor_protocol, Actor, ActorError, Cancellable, Completes, Context, DeadLetterReason,
    Definition, Proxy, Repeat, Scheduled, ScheduledProxy, Stage, StageConfig,
};
use std::time::Duration;

const WAIT: Duration = Duration::from_secs(5);

actor_protocol! {
    pub trait Ticker {
        fn start_ticking(&mut self, interval_ms: u64, times: Option<u32>);
        fn stop_ticking(&mut self) -> Completes<bool>;
        fn timer(&mut self) -> Completes<Option<Cancellable>>;
        fn ticks(&mut self) -> Completes<Vec<(String, u64)>>;
    }
}

#[derive(Default)]
struct TickerActor {
    context: Option<Context<TickerActor>>,
    timer: Option<Cancellable>,
    ticks: Vec<(String, u64)>,
}

impl Actor for TickerActor {
    fn started(&mut self, context: &Context<Self>) {
        self.context = Some(context.clone());
    }
}

impl Ticker for TickerActor {
    fn start_ticking(&mut self, interval_ms: u64, times: Option<u32>) {
        let Some(context) = &self.context else {
            return;
        };
        let Some(target) = context.self_as::<dyn Scheduled<String>>() else {
            return;
        };
        let repeat = times.map(Repeat::Times).unwrap_or(Repeat::Forever);
        let interval = Duration::from_millis(interval_ms);
        self.timer = context
            .scheduler()
            .schedule(target, "tick".to_string(), interval, interval, repeat)
            .ok();
    }

    fn stop_ticking(&mut self) -> Completes<bool> {
        let cancelled = self.timer.take().map(|timer| timer.cancel()).unwrap_or(false);
        Completes::with(cancelled)
    }

    fn timer(&mut self) -> Completes<Option<Cancellable>> {
        Completes::with(self.timer.clone())
    }

    fn ticks(&mut self) -> Completes<Vec<(String, u64)>> {
        Completes::with(self.ticks.clone())
    }
}

impl Scheduled<String> for TickerActor {
    fn interval_signal(&mut self, data: String, firing: u64) {
        self.ticks.push((data, firing));
    }
}

async fn stage(name: &str) -> Stage {
    actor_runtime::tracing::try_setup_tracing();
    Stage::builder(StageConfig::named(name).with_pool_size(2))
        .start()
        .await
        .unwrap()
}

async fn ticks(ticker: &TickerProxy) -> Vec<(String, u64)> {
    ticker.ticks().outcome_within(WAIT).await.unwrap()
}

#[tokio::test]
async fn test_repeat_times_delivers_exactly_that_many_ordered_signals() {
    let stage = stage("repeat").await;
    let ticker: TickerProxy = stage
        .actor_for::<dyn Ticker, _>(Definition::has(TickerActor::default()))
        .unwrap();

    ticker.start_ticking(10, Some(3));
    tokio::time::sleep(Duration::from_millis(200)).await;

    let expected: Vec<_> = (1..=3).map(|firing| ("tick".to_string(), firing)).collect();
    assert_eq!(ticks(&ticker).await, expected);
    assert_eq!(stage.scheduler().active_timers(), 0);

    // An exhausted timer cannot be cancelled again.
    assert!(!ticker.stop_ticking().outcome_within(WAIT).await.unwrap());
    stage.terminate().await;
}

#[tokio::test]
async fn test_no_signal_is_delivered_after_cancel() {
    let stage = stage("cancel").await;
    let ticker: TickerProxy = stage
        .actor_for::<dyn Ticker, _>(Definition::has(TickerActor::default()))
        .unwrap();

    ticker.start_ticking(5, None);
    tokio::time::timeout(WAIT, async {
        while ticks(&ticker).await.len() < 2 {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .unwrap();

    assert!(ticker.stop_ticking().outcome_within(WAIT).await.unwrap());
    let at_cancel = ticks(&ticker).await;

    tokio::time::sleep(Duration::from_millis(60)).await;
    assert_eq!(ticks(&ticker).await, at_cancel);
    let firings: Vec<u64> = at_cancel.iter().map(|(_, firing)| *firing).collect();
    assert_eq!(firings, (1..=firings.len() as u64).collect::<Vec<_>>());
    stage.terminate().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_cancel_racing_a_firing_timer_stops_signals() {
    let stage = stage("cancel-race").await;
    let ticker: TickerProxy = stage
        .actor_for::<dyn Ticker, _>(Definition::has(TickerActor::default()))
        .unwrap();

    for round in 0..50u64 {
        ticker.start_ticking(1, None);
        let timer = ticker
            .timer()
            .outcome_within(WAIT)
            .await
            .unwrap()
            .expect("timer scheduled");
        tokio::time::sleep(Duration::from_micros(500 * (round % 5))).await;

        let cancelled = tokio::spawn(async move { timer.cancel() }).await.unwrap();
        assert!(cancelled);

        // The query queues behind every signal enqueued before `cancel` returned.
        let at_cancel = ticks(&ticker).await.len();
        tokio::time::sleep(Duration::from_millis(3)).await;
        assert_eq!(ticks(&ticker).await.len(), at_cancel, "round {round}");
    }

    assert_eq!(stage.scheduler().active_timers(), 0);
    stage.terminate().await;
}

#[tokio::test]
async fn test_signals_to_a_stopped_actor_become_dead_letters() {
    let stage = stage("stopped-target").await;
    let target: ScheduledProxy<String> = stage
        .actor_for::<dyn Scheduled<String>, _>(Definition::has(TickerActor::default()))
        .unwrap();

    target.stop();
    tokio::time::timeout(WAIT, async {
        while !target.is_stopped() {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .unwrap();

    stage
        .scheduler()
        .schedule(
            target.clone(),
            "late".to_string(),
            Duration::from_millis(1),
            Duration::from_millis(5),
            Repeat::Times(3),
        )
        .unwrap();
    tokio::time::timeout(WAIT, async {
        while stage.scheduler().active_timers() > 0 {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .unwrap();

    let records = stage.dead_letters().records_for(target.address());
    assert_eq!(records.len(), 3);
    for record in &records {
        assert_eq!(record.representation(), "Scheduled::interval_signal(D, u64)");
        assert_eq!(record.reason(), DeadLetterReason::ActorStopped);
    }
    stage.terminate().await;
}

#[tokio::test]
async fn test_invalid_schedules_are_rejected() {
    let stage = stage("invalid").await;
    let target: ScheduledProxy<String> = stage
        .actor_for::<dyn Scheduled<String>, _>(Definition::has(TickerActor::default()))
        .unwrap();
    let scheduler = stage.scheduler();

    let never = scheduler.schedule(
        target.clone(),
        "x".to_string(),
        Duration::ZERO,
        Duration::from_millis(10),
        Repeat::Times(0),
    );
    assert!(matches!(never, Err(ActorError::InvalidSchedule(_))));

    let spin = scheduler.schedule_every(
        target.clone(),
        "x".to_string(),
        Duration::ZERO,
        Duration::ZERO,
    );
    assert!(matches!(spin, Err(ActorError::InvalidSchedule(_))));

    let once = scheduler.schedule_once(target, "x".to_string(), Duration::from_millis(1));
    assert!(once.is_ok());
    stage.terminate().await;
}

#[tokio::test]
async fn test_terminate_cancels_outstanding_timers() {
    let stage = stage("terminate-timers").await;
    let target: ScheduledProxy<String> = stage
        .actor_for::<dyn Scheduled<String>, _>(Definition::has(TickerActor::default()))
        .unwrap();

    let timer = stage
        .scheduler()
        .schedule_every(
            target.clone(),
            "x".to_string(),
            Duration::from_secs(60),
            Duration::from_secs(60),
        )
        .unwrap();
    assert_eq!(stage.scheduler().active_timers(), 1);

    stage.terminate().await;

    assert!(timer.is_cancelled());
    assert_eq!(stage.scheduler().active_timers(), 0);
    let refused = stage
        .scheduler()
        .schedule_once(target, "x".to_string(), Duration::ZERO);
    assert!(matches!(refused, Err(ActorError::StageTerminated)));
}

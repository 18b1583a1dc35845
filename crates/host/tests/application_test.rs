//! Integration tests for the application context.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use tokio::time::timeout;

use ticklane_events::{Event, SubscribeOptions};
use ticklane_host::{Application, HostConfig, TicklaneConfig};
use ticklane_scheduler::{CallbackFault, Disposable, ExecutionContext, FaultSink, TimeUnit};

#[derive(Default)]
struct RecordingSink {
    faults: Mutex<Vec<CallbackFault>>,
}

impl FaultSink for RecordingSink {
    fn report(&self, fault: CallbackFault) {
        self.faults.lock().unwrap().push(fault);
    }
}

#[derive(Debug, Clone)]
struct Announce(String);

impl Event for Announce {}

#[derive(Default)]
struct Flag(AtomicBool);

impl Disposable for Flag {
    fn dispose(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    fn is_disposed(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

fn config(owner: &str) -> TicklaneConfig {
    TicklaneConfig {
        owner: owner.into(),
        host: HostConfig {
            tick_millis: 10,
            worker_threads: 2,
            thread_name: format!("{owner}-main"),
            shutdown_timeout_ms: 2000,
        },
    }
}

fn wait_for(what: &str, cond: impl Fn() -> bool) {
    let deadline = Instant::now() + Duration::from_secs(10);
    while !cond() {
        assert!(Instant::now() < deadline, "timed out waiting for {what}");
        std::thread::sleep(Duration::from_millis(5));
    }
}

#[test]
fn exposes_both_schedulers_and_owner() {
    let app = Application::start(&config("app-basics")).unwrap();
    assert_eq!(app.owner(), "app-basics");
    assert_eq!(app.confined().context(), ExecutionContext::Confined);
    assert_eq!(app.free_threaded().context(), ExecutionContext::FreeThreaded);
    assert_eq!(app.confined().converter().tick_millis(), 10);
    app.shutdown();
    assert!(app.is_shut_down());
}

#[test]
fn shutdown_disposes_tracked_work_then_stops_host() {
    let app = Application::start(&config("app-shutdown")).unwrap();
    let worker = Arc::new(app.confined().new_worker());
    app.track(Arc::clone(&worker));

    let runs = Arc::new(AtomicUsize::new(0));
    let r = Arc::clone(&runs);
    let handle = worker
        .schedule_at_fixed_rate(
            move || {
                r.fetch_add(1, Ordering::SeqCst);
            },
            0,
            10,
            TimeUnit::Milliseconds,
        )
        .unwrap();
    wait_for("first run", || runs.load(Ordering::SeqCst) >= 1);

    let flag = Arc::new(Flag::default());
    app.track(Arc::clone(&flag));

    app.shutdown();
    app.shutdown();
    assert!(worker.is_disposed());
    assert!(handle.is_cancelled());
    assert!(flag.is_disposed());
    assert!(app.host().is_shutting_down());
}

#[test]
fn tracking_after_shutdown_disposes_immediately() {
    let app = Application::start(&config("app-late")).unwrap();
    app.shutdown();

    let flag = Arc::new(Flag::default());
    app.track(Arc::clone(&flag));
    assert!(flag.is_disposed());
}

#[test]
fn subscriptions_are_released_at_shutdown() {
    let app = Application::start(&config("app-subs")).unwrap();
    let subscription = app.subscribe(SubscribeOptions::default(), |_: &mut Announce| {});
    assert_eq!(app.events().subscriber_count::<Announce>(), 1);

    app.shutdown();
    assert!(subscription.is_disposed());
    assert_eq!(app.events().subscriber_count::<Announce>(), 0);
}

#[test]
fn faults_reach_the_installed_sink() {
    let sink = Arc::new(RecordingSink::default());
    let app = Application::start_with_faults(&config("app-faults"), sink.clone()).unwrap();

    app.events()
        .subscribe(SubscribeOptions::default(), |_: &mut Announce| panic!("bad subscriber"));
    let events = app.events().clone();
    app.confined()
        .new_worker()
        .schedule_now(move || {
            events.dispatch(&mut Announce("hello".into()));
        })
        .unwrap();

    wait_for("fault", || !sink.faults.lock().unwrap().is_empty());
    let fault = sink.faults.lock().unwrap()[0].clone();
    assert_eq!(fault.message, "bad subscriber");
    assert!(fault.origin.contains("Announce"));
    app.shutdown();
}

#[test]
fn invalid_config_fails_to_start() {
    let mut cfg = config("app-invalid");
    cfg.owner = String::new();
    let err = Application::start(&cfg).unwrap_err();
    assert!(err.to_string().contains("owner"));
}

#[tokio::test]
async fn event_dispatched_on_tick_thread_reaches_stream() {
    let app = Application::start(&config("app-stream")).unwrap();
    let mut stream = app.observe::<Announce>(SubscribeOptions::default());

    let events = app.events().clone();
    let host = Arc::clone(app.host());
    app.confined()
        .new_worker()
        .schedule_after(
            move || {
                let origin = if host.is_tick_thread() { "tick" } else { "elsewhere" };
                events.dispatch(&mut Announce(origin.into()));
            },
            20,
            TimeUnit::Milliseconds,
        )
        .unwrap();

    let event = timeout(Duration::from_secs(5), stream.next())
        .await
        .expect("timed out")
        .unwrap();
    assert_eq!(event.0, "tick");

    app.shutdown();
    assert!(stream.subscription().is_disposed());
    assert!(stream.next().await.is_none());
}

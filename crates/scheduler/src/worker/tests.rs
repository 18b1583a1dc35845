use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{mpsc, Arc, Mutex};
use std::thread;

use crate::error::SchedulerError;
use crate::facade::Scheduler;
use crate::host::HostError;
use crate::policy::ExecutionContext;
use crate::testing::{HostEntry, ManualHost};
use crate::tick::{TickConverter, TimeUnit};

fn confined() -> (Arc<ManualHost>, Scheduler) {
    let host = Arc::new(ManualHost::new());
    let scheduler = Scheduler::confined(host.clone(), "test");
    (host, scheduler)
}

fn free_threaded() -> (Arc<ManualHost>, Scheduler) {
    let host = Arc::new(ManualHost::new());
    let scheduler = Scheduler::free_threaded(host.clone(), "test");
    (host, scheduler)
}

fn counter() -> (Arc<AtomicUsize>, impl Fn() + Send + Sync + Clone + 'static) {
    let count = Arc::new(AtomicUsize::new(0));
    let c = Arc::clone(&count);
    (count, move || {
        c.fetch_add(1, Ordering::SeqCst);
    })
}

#[test]
fn schedule_after_converts_delay_to_ticks() {
    let (host, scheduler) = confined();
    let worker = scheduler.new_worker();

    worker.schedule_after(|| {}, 100, TimeUnit::Milliseconds).unwrap();

    let submissions = host.submissions();
    assert_eq!(submissions.len(), 1);
    assert_eq!(submissions[0].entry, HostEntry::RunAfter);
    assert_eq!(submissions[0].delay, 2);
    assert_eq!(submissions[0].period, None);
}

#[test]
fn fixed_rate_converts_delay_and_period() {
    let (host, scheduler) = confined();
    let worker = scheduler.new_worker();

    worker
        .schedule_at_fixed_rate(|| {}, 0, 1000, TimeUnit::Milliseconds)
        .unwrap();

    let submission = host.submissions()[0];
    assert_eq!(submission.entry, HostEntry::RunPeriodic { confined: true });
    assert_eq!(submission.delay, 0);
    assert_eq!(submission.period, Some(20));
}

#[test]
fn confined_policy_uses_confined_entry_points() {
    let (host, scheduler) = confined();
    assert_eq!(scheduler.context(), ExecutionContext::Confined);
    let worker = scheduler.new_worker();

    worker.schedule_now(|| {}).unwrap();
    worker.schedule_after(|| {}, 1, TimeUnit::Seconds).unwrap();
    worker.schedule_at_fixed_rate(|| {}, 1, 1, TimeUnit::Seconds).unwrap();

    let entries: Vec<_> = host.submissions().iter().map(|s| s.entry).collect();
    assert_eq!(
        entries,
        vec![
            HostEntry::RunNow,
            HostEntry::RunAfter,
            HostEntry::RunPeriodic { confined: true },
        ]
    );
    assert!(entries.iter().all(|e| e.is_confined()));
}

#[test]
fn free_threaded_policy_uses_off_thread_entry_points() {
    let (host, scheduler) = free_threaded();
    let worker = scheduler.new_worker();
    assert_eq!(worker.context(), ExecutionContext::FreeThreaded);

    worker.schedule_now(|| {}).unwrap();
    worker.schedule_after(|| {}, 1, TimeUnit::Seconds).unwrap();
    worker.schedule_at_fixed_rate(|| {}, 1, 1, TimeUnit::Seconds).unwrap();

    let entries: Vec<_> = host.submissions().iter().map(|s| s.entry).collect();
    assert_eq!(
        entries,
        vec![
            HostEntry::RunNowOffConfinedThread,
            HostEntry::RunAfterOffConfinedThread,
            HostEntry::RunPeriodic { confined: false },
        ]
    );
    assert!(entries.iter().all(|e| !e.is_confined()));
}

#[test]
fn callbacks_run_on_their_tick() {
    let (host, scheduler) = confined();
    let worker = scheduler.new_worker();
    let (count, bump) = counter();

    worker.schedule_after(bump, 150, TimeUnit::Milliseconds).unwrap();

    host.advance(2);
    assert_eq!(count.load(Ordering::SeqCst), 0);
    host.advance(1);
    assert_eq!(count.load(Ordering::SeqCst), 1);
}

#[test]
fn zero_delay_runs_on_next_tick_not_inline() {
    let (host, scheduler) = confined();
    let worker = scheduler.new_worker();
    let (count, bump) = counter();

    worker.schedule_now(bump.clone()).unwrap();
    worker.schedule_after(bump, 10, TimeUnit::Milliseconds).unwrap();
    assert_eq!(count.load(Ordering::SeqCst), 0);

    host.advance(1);
    assert_eq!(count.load(Ordering::SeqCst), 2);
}

#[test]
fn run_pending_drains_due_work_without_advancing() {
    let (host, scheduler) = confined();
    let worker = scheduler.new_worker();
    let (count, bump) = counter();

    worker.schedule_now(bump.clone()).unwrap();
    worker.schedule_after(bump, 50, TimeUnit::Milliseconds).unwrap();

    host.run_pending();
    assert_eq!(count.load(Ordering::SeqCst), 1);
    assert_eq!(host.current_tick(), 0);
    assert_eq!(host.pending(), 1);

    host.advance(1);
    assert_eq!(count.load(Ordering::SeqCst), 2);
}

#[test]
fn same_tick_callbacks_run_in_submission_order() {
    let (host, scheduler) = confined();
    let worker = scheduler.new_worker();
    let order = Arc::new(Mutex::new(Vec::new()));

    for (label, delay) in [("late", 100u64), ("a", 50), ("b", 50), ("c", 60)] {
        let order = Arc::clone(&order);
        worker
            .schedule_after(move || order.lock().unwrap().push(label), delay, TimeUnit::Milliseconds)
            .unwrap();
    }

    host.advance(2);
    assert_eq!(*order.lock().unwrap(), vec!["a", "b", "c", "late"]);
}

#[test]
fn periodic_task_repeats_until_cancelled() {
    let (host, scheduler) = confined();
    let worker = scheduler.new_worker();
    let (count, bump) = counter();

    let handle = worker
        .schedule_at_fixed_rate(bump, 50, 100, TimeUnit::Milliseconds)
        .unwrap();

    host.advance(1);
    assert_eq!(count.load(Ordering::SeqCst), 1);
    host.advance(4);
    assert_eq!(count.load(Ordering::SeqCst), 3);

    handle.cancel();
    host.advance(10);
    assert_eq!(count.load(Ordering::SeqCst), 3);
    assert!(handle.is_cancelled());
}

#[test]
fn cancelled_one_shot_never_runs() {
    let (host, scheduler) = confined();
    let worker = scheduler.new_worker();
    let (count, bump) = counter();

    let handle = worker.schedule_after(bump, 100, TimeUnit::Milliseconds).unwrap();
    host.advance(1);
    handle.cancel();
    host.advance(5);

    assert_eq!(count.load(Ordering::SeqCst), 0);
    assert!(handle.is_cancelled());
    assert_eq!(host.pending(), 0);
}

#[test]
fn cancel_is_idempotent() {
    let (host, scheduler) = confined();
    let worker = scheduler.new_worker();

    let handle = worker.schedule_now(|| {}).unwrap();
    let clone = handle.clone();
    handle.cancel();
    handle.cancel();
    clone.cancel();

    assert_eq!(host.cancel_count(handle.task_ref()), 1);
    assert!(clone.is_cancelled());
}

#[test]
fn is_cancelled_waits_for_in_flight_invocation() {
    let (host, scheduler) = confined();
    let worker = scheduler.new_worker();
    let (started_tx, started_rx) = mpsc::channel();
    let (release_tx, release_rx) = mpsc::channel::<()>();

    let handle = worker
        .schedule_at_fixed_rate(
            move || {
                started_tx.send(()).ok();
                release_rx.recv().ok();
            },
            0,
            50,
            TimeUnit::Milliseconds,
        )
        .unwrap();

    let ticker = {
        let host = Arc::clone(&host);
        thread::spawn(move || host.advance(1))
    };

    started_rx.recv().unwrap();
    handle.cancel();
    assert!(handle.cancel_requested());
    assert!(!handle.is_cancelled(), "invocation still in flight");

    release_tx.send(()).unwrap();
    ticker.join().unwrap();

    assert!(handle.is_cancelled());
    host.advance(3);
    assert_eq!(host.executions().len(), 1);
}

#[test]
fn dispose_cancels_every_tracked_handle_once() {
    let (host, scheduler) = confined();
    let worker = scheduler.new_worker();
    let (count, bump) = counter();

    let mut handles = Vec::new();
    for i in 0..10 {
        handles.push(
            worker
                .schedule_after(bump.clone(), 50 * (i + 1), TimeUnit::Milliseconds)
                .unwrap(),
        );
    }
    // One handle cancelled individually before disposal.
    handles[3].cancel();
    assert_eq!(worker.tracked(), 10);

    worker.dispose();
    worker.dispose();

    assert!(worker.is_disposed());
    assert_eq!(worker.tracked(), 0);
    for handle in &handles {
        assert_eq!(host.cancel_count(handle.task_ref()), 1);
        assert!(handle.is_cancelled());
    }

    host.advance(20);
    assert_eq!(count.load(Ordering::SeqCst), 0);
}

#[test]
fn schedule_after_dispose_fails() {
    let (host, scheduler) = confined();
    let worker = scheduler.new_worker();
    worker.dispose();

    assert!(matches!(worker.schedule_now(|| {}), Err(SchedulerError::Disposed)));
    assert!(matches!(
        worker.schedule_after(|| {}, 1, TimeUnit::Seconds),
        Err(SchedulerError::Disposed)
    ));
    assert!(matches!(
        worker.schedule_at_fixed_rate(|| {}, 0, 1, TimeUnit::Seconds),
        Err(SchedulerError::Disposed)
    ));
    assert!(host.submissions().is_empty());
}

#[test]
fn host_rejection_propagates_and_tracks_nothing() {
    let (host, scheduler) = free_threaded();
    let worker = scheduler.new_worker();
    host.set_shutting_down(true);

    let err = worker.schedule_now(|| {}).unwrap_err();
    assert!(matches!(err, SchedulerError::Rejected(HostError::ShuttingDown)));
    assert_eq!(worker.tracked(), 0);
    assert!(!worker.is_disposed());

    host.set_shutting_down(false);
    worker.schedule_now(|| {}).unwrap();
    assert_eq!(worker.tracked(), 1);
}

#[test]
fn workers_are_independent() {
    let (host, scheduler) = confined();
    let first = scheduler.new_worker();
    let second = scheduler.new_worker();
    let (count, bump) = counter();

    first.schedule_now(bump.clone()).unwrap();
    second.schedule_now(bump).unwrap();
    first.dispose();

    assert!(!second.is_disposed());
    assert_eq!(second.tracked(), 1);
    host.advance(1);
    assert_eq!(count.load(Ordering::SeqCst), 1);
}

#[test]
fn callback_may_schedule_follow_up_work() {
    let (host, scheduler) = confined();
    let worker = Arc::new(scheduler.new_worker());
    let (count, bump) = counter();

    let inner = Arc::clone(&worker);
    worker
        .schedule_now(move || {
            inner.schedule_now(bump).unwrap();
        })
        .unwrap();

    host.advance(1);
    assert_eq!(count.load(Ordering::SeqCst), 0, "follow-up runs on the next tick");
    host.advance(1);
    assert_eq!(count.load(Ordering::SeqCst), 1);
    assert_eq!(worker.tracked(), 2);
}

#[test]
fn max_period_saturates_and_later_work_still_runs() {
    let host = Arc::new(ManualHost::new());
    let scheduler =
        Scheduler::confined(host.clone(), "test").with_converter(TickConverter::new(1).unwrap());
    let worker = scheduler.new_worker();
    let (repeats, bump_repeat) = counter();
    let (later, bump_later) = counter();

    worker
        .schedule_at_fixed_rate(bump_repeat, 0, u64::MAX, TimeUnit::Milliseconds)
        .unwrap();
    worker
        .schedule_after(bump_later, 2, TimeUnit::Milliseconds)
        .unwrap();
    assert_eq!(host.submissions()[0].period, Some(u64::MAX));

    host.advance(2);
    assert_eq!(repeats.load(Ordering::SeqCst), 1);
    assert_eq!(later.load(Ordering::SeqCst), 1);
    assert_eq!(host.pending(), 1, "repeat parked at the last tick");
}

#[test]
fn panicking_callback_unwinds_without_losing_the_batch() {
    let (host, scheduler) = confined();
    let worker = scheduler.new_worker();
    let (count, bump) = counter();

    let failing = worker.schedule_now(|| panic!("callback failed")).unwrap();
    worker.schedule_now(bump).unwrap();

    let result = panic::catch_unwind(AssertUnwindSafe(|| host.advance(1)));
    assert!(result.is_err());
    assert_eq!(count.load(Ordering::SeqCst), 0);
    assert_eq!(host.pending(), 1);

    failing.cancel();
    assert!(failing.is_cancelled(), "running flag cleared after the panic");

    host.run_pending();
    assert_eq!(count.load(Ordering::SeqCst), 1);
    assert_eq!(host.pending(), 0);
}

#[test]
fn finished_one_shots_stay_tracked_until_dispose() {
    let (host, scheduler) = confined();
    let worker = scheduler.new_worker();
    let (count, bump) = counter();

    for _ in 0..3 {
        worker.schedule_now(bump.clone()).unwrap();
    }
    host.advance(1);
    assert_eq!(count.load(Ordering::SeqCst), 3);
    assert_eq!(worker.tracked(), 3);

    worker.dispose();
    assert_eq!(worker.tracked(), 0);
}

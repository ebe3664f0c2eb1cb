use std::error::Error;
use std::sync::Arc;
use std::time::Duration;

use assetpipe::task::TaskSpec;
use assetpipe::types::OverlapBehaviour;
use assetpipe::watch::{
    Debouncer, DueBatch, FlightDecision, FlightTracker, WatchBinding, WatchCommand, WatchCore,
    WatchSpec, WatchState,
};
use assetpipe_test_utils::builders::leaf_task;
use tokio::time::Instant;

type TestResult = Result<(), Box<dyn Error>>;

const WINDOW: Duration = Duration::from_millis(100);

fn ms(n: u64) -> Duration {
    Duration::from_millis(n)
}

fn spec_with(tasks: Vec<Arc<TaskSpec>>) -> WatchSpec {
    WatchSpec {
        name: "watch".into(),
        bindings: tasks.into_iter().map(WatchBinding::for_task).collect(),
        debounce: WINDOW,
    }
}

fn styles() -> Arc<TaskSpec> {
    Arc::new(leaf_task("styles", &["src/styles/**/*.scss"], "dist/css", vec![]))
}

fn scripts() -> Arc<TaskSpec> {
    Arc::new(leaf_task("scripts", &["src/js/**/*.js"], "dist/js", vec![]))
}

fn ran(commands: &[WatchCommand]) -> Vec<(&str, usize, bool)> {
    commands
        .iter()
        .map(|c| match c {
            WatchCommand::Run { task, events } => (task.name(), *events, false),
            WatchCommand::Restart { task, events } => (task.name(), *events, true),
        })
        .collect()
}

#[test]
fn debouncer_fires_once_after_the_last_event() {
    let t0 = Instant::now();
    let mut d = Debouncer::new(WINDOW);

    d.record(0, t0);
    d.record(0, t0 + ms(40));
    d.record(0, t0 + ms(80));

    // The window restarts with every event.
    assert_eq!(d.next_deadline(), Some(t0 + ms(180)));
    assert!(d.take_due(t0 + ms(150)).is_empty());
    assert_eq!(
        d.take_due(t0 + ms(180)),
        vec![DueBatch {
            binding: 0,
            events: 3
        }]
    );
    assert!(d.is_empty());
    assert_eq!(d.next_deadline(), None);
}

#[test]
fn debouncer_tracks_bindings_independently() {
    let t0 = Instant::now();
    let mut d = Debouncer::new(WINDOW);

    d.record(1, t0);
    d.record(0, t0 + ms(50));

    assert_eq!(d.next_deadline(), Some(t0 + ms(100)));
    assert_eq!(
        d.take_due(t0 + ms(100)),
        vec![DueBatch {
            binding: 1,
            events: 1
        }]
    );
    assert_eq!(
        d.take_due(t0 + ms(500)),
        vec![DueBatch {
            binding: 0,
            events: 1
        }]
    );
}

#[test]
fn flight_tracker_queues_one_rerun_and_coalesces_the_rest() {
    let mut f = FlightTracker::new();

    assert_eq!(f.request("styles", OverlapBehaviour::Queue), FlightDecision::Start);
    assert_eq!(f.request("styles", OverlapBehaviour::Queue), FlightDecision::Queued);
    assert_eq!(f.request("styles", OverlapBehaviour::Queue), FlightDecision::Coalesced);
    assert!(f.is_running("styles"));

    // First finish hands back the queued rerun; the task stays running.
    assert!(f.finish("styles"));
    assert!(f.is_running("styles"));
    assert!(!f.finish("styles"));
    assert!(f.is_idle());

    // Finishing an unknown task is a no-op.
    assert!(!f.finish("scripts"));
}

#[test]
fn flight_tracker_restarts_under_cancel() {
    let mut f = FlightTracker::new();

    assert_eq!(f.request("images", OverlapBehaviour::Cancel), FlightDecision::Start);
    assert_eq!(f.request("images", OverlapBehaviour::Cancel), FlightDecision::Restart);
    assert_eq!(f.in_flight(), 1);
    assert!(!f.finish("images"));
    assert!(f.is_idle());
}

#[test]
fn flight_tracker_drop_pending_keeps_in_flight_runs() {
    let mut f = FlightTracker::new();
    f.request("a", OverlapBehaviour::Queue);
    f.request("a", OverlapBehaviour::Queue);
    f.request("b", OverlapBehaviour::Queue);

    assert_eq!(f.drop_pending(), 1);
    assert_eq!(f.in_flight(), 2);
    assert!(!f.finish("a"));
}

#[test]
fn burst_of_changes_yields_one_run() {
    let t0 = Instant::now();
    let mut core = WatchCore::new(spec_with(vec![styles(), scripts()]));
    assert_eq!(core.state(), WatchState::Idle);

    // Not started yet: events are ignored.
    assert_eq!(core.on_path("src/styles/main.scss", t0), 0);
    core.start();
    assert_eq!(core.state(), WatchState::Watching);

    for i in 0..5 {
        assert_eq!(core.on_path("src/styles/main.scss", t0 + ms(i * 10)), 1);
    }
    assert_eq!(core.on_path("README.md", t0 + ms(45)), 0);

    assert!(core.on_tick(t0 + ms(100)).is_empty());
    let commands = core.on_tick(t0 + ms(140));
    assert_eq!(ran(&commands), vec![("styles", 5, false)]);
    assert_eq!(core.state(), WatchState::Triggering);

    assert!(core.on_task_finished("styles").is_empty());
    assert_eq!(core.state(), WatchState::Watching);
}

#[test]
fn change_during_a_run_queues_exactly_one_rerun() {
    let t0 = Instant::now();
    let mut core = WatchCore::new(spec_with(vec![styles()]));
    core.start();

    core.on_path("src/styles/a.scss", t0);
    assert_eq!(ran(&core.on_tick(t0 + WINDOW)), vec![("styles", 1, false)]);

    // Two separate bursts while the first run is still going.
    core.on_path("src/styles/a.scss", t0 + ms(150));
    assert!(core.on_tick(t0 + ms(250)).is_empty());
    core.on_path("src/styles/b.scss", t0 + ms(300));
    assert!(core.on_tick(t0 + ms(400)).is_empty());

    let rerun = core.on_task_finished("styles");
    assert_eq!(ran(&rerun), vec![("styles", 0, false)]);
    assert_eq!(core.state(), WatchState::Triggering);

    assert!(core.on_task_finished("styles").is_empty());
    assert_eq!(core.state(), WatchState::Watching);
}

#[test]
fn cancel_overlap_restarts_the_running_task() -> TestResult {
    let t0 = Instant::now();
    let images = Arc::new(
        TaskSpec::builder(
            "images",
            assetpipe::task::PathSet::new(["src/images/**/*"])?,
            "dist/images",
        )
        .overlap(OverlapBehaviour::Cancel)
        .build(),
    );
    let mut core = WatchCore::new(spec_with(vec![images]));
    core.start();

    core.on_path("src/images/a.png", t0);
    assert_eq!(ran(&core.on_tick(t0 + WINDOW)), vec![("images", 1, false)]);

    core.on_path("src/images/b.png", t0 + ms(120));
    core.on_path("src/images/c.png", t0 + ms(130));
    assert_eq!(ran(&core.on_tick(t0 + ms(230))), vec![("images", 2, true)]);

    // Only one run is tracked, and nothing is queued behind it.
    assert_eq!(core.in_flight(), 1);
    assert!(core.on_task_finished("images").is_empty());
    assert_eq!(core.in_flight(), 0);
    Ok(())
}

#[test]
fn bindings_sharing_a_task_request_it_once() -> TestResult {
    let t0 = Instant::now();
    let styles = styles();
    let spec = WatchSpec {
        name: "watch".into(),
        bindings: vec![
            WatchBinding::for_task(styles.clone()),
            WatchBinding::new(
                assetpipe::task::PathSet::new(["src/styles/vars/*.json"])?,
                styles,
            ),
        ],
        debounce: WINDOW,
    };
    let mut core = WatchCore::new(spec);
    core.start();

    core.on_path("src/styles/main.scss", t0);
    core.on_path("src/styles/vars/colors.json", t0);
    assert_eq!(ran(&core.on_tick(t0 + WINDOW)), vec![("styles", 1, false)]);
    assert_eq!(core.in_flight(), 1);
    Ok(())
}

#[test]
fn stop_discards_pending_batches_and_queued_reruns() {
    let t0 = Instant::now();
    let mut core = WatchCore::new(spec_with(vec![styles(), scripts()]));
    core.start();

    core.on_path("src/styles/a.scss", t0);
    core.on_tick(t0 + WINDOW);
    core.on_path("src/styles/a.scss", t0 + ms(110));
    core.on_tick(t0 + ms(210));
    core.on_path("src/js/app.js", t0 + ms(220));
    assert!(core.next_deadline().is_some());

    core.stop();
    assert_eq!(core.state(), WatchState::Stopped);
    assert_eq!(core.next_deadline(), None);
    assert_eq!(core.on_path("src/js/app.js", t0 + ms(400)), 0);
    assert!(core.on_tick(t0 + ms(1000)).is_empty());

    // The in-flight run finishes normally, without its queued rerun.
    assert_eq!(core.in_flight(), 1);
    assert!(core.on_task_finished("styles").is_empty());
    assert_eq!(core.in_flight(), 0);
    assert_eq!(core.state(), WatchState::Stopped);
}

use std::error::Error;
use std::sync::Arc;
use std::time::Duration;

use assetpipe::errors::PipelineError;
use assetpipe::fs::mock::MockFileSystem;
use assetpipe::graph::{ExecContext, TaskGraph, TaskGraphBuilder, Unit, execute_plan};
use assetpipe::runner::Runner;
use assetpipe::task::{Rename, Transform};
use assetpipe_test_utils::builders::leaf_task;
use assetpipe_test_utils::fakes::{ConcurrencyProbe, FakeTransform};
use assetpipe_test_utils::{RecordingObserver, init_tracing, mock_context, with_timeout};

type TestResult = Result<(), Box<dyn Error>>;

fn project_fs() -> MockFileSystem {
    let fs = MockFileSystem::new();
    fs.add_file("./src/styles/main.scss", "body { color: red; }");
    fs.add_file("./src/js/app.js", "console.log('app');");
    fs.add_file("./src/js/util.js", "export const x = 1;");
    fs.add_file("./src/images/logo.jpg", vec![0xFF, 0xD8, 0xFF, 0xE0]);
    fs
}

fn build_graph() -> Result<TaskGraph, PipelineError> {
    let rename: Arc<dyn Transform> = Arc::new(Rename::new(r"\.scss$", ".css").expect("valid regex"));
    TaskGraphBuilder::new()
        .task(leaf_task(
            "styles",
            &["src/styles/**/*.scss"],
            "dist/css",
            vec![FakeTransform::uppercase("sass").into_arc(), rename],
        ))
        .task(leaf_task(
            "scripts",
            &["src/js/**/*.js"],
            "dist/js",
            vec![FakeTransform::identity("uglify").into_arc()],
        ))
        .task(leaf_task(
            "images",
            &["src/images/**/*.{jpg,jpeg,png,gif,svg}"],
            "dist/images",
            vec![FakeTransform::identity("imagemin").into_arc()],
        ))
        .task(leaf_task("copy", &["src/**/*.html"], "dist", vec![]))
        .parallel("build", ["styles", "scripts", "images", "copy"])
        .default_task("build")
        .build()
}

#[tokio::test]
async fn build_writes_expected_file_counts() -> TestResult {
    init_tracing();

    let fs = project_fs();
    let observer = RecordingObserver::new();
    let graph = build_graph()?;
    let runner = Runner::new(graph, mock_context(&fs, observer.clone()));

    let report = with_timeout(runner.run("build")).await?;

    assert_eq!(report.files_written("styles"), 1);
    assert_eq!(report.files_written("scripts"), 2);
    assert_eq!(report.files_written("images"), 1);
    assert_eq!(report.files_written("copy"), 0);
    assert_eq!(report.total_files_written(), 4);

    assert_eq!(
        fs.contents("./dist/css/main.css"),
        Some(b"BODY { COLOR: RED; }".to_vec())
    );
    assert!(fs.contents("./dist/js/util.js").is_some());
    assert!(fs.contents("./dist/images/logo.jpg").is_some());

    assert_eq!(observer.files_written("scripts"), 2);
    assert_eq!(observer.started("copy"), 1);
    Ok(())
}

#[tokio::test]
async fn default_alias_resolves_to_configured_entry() -> TestResult {
    let graph = build_graph()?;
    let plan = graph.resolve("default")?;
    assert_eq!(plan.name(), "build");
    assert_eq!(plan.leaf_names(), vec!["styles", "scripts", "images", "copy"]);
    Ok(())
}

#[tokio::test]
async fn unknown_names_fail_instead_of_returning_empty_plans() -> TestResult {
    let graph = build_graph()?;
    match graph.resolve("deploy") {
        Err(PipelineError::UnknownTask(name)) => assert_eq!(name, "deploy"),
        other => panic!("expected UnknownTask, got {other:?}"),
    }

    let without_default = TaskGraphBuilder::new()
        .task(leaf_task("a", &["src/**/*.js"], "dist", vec![]))
        .build()?;
    assert!(matches!(
        without_default.resolve("default"),
        Err(PipelineError::UnknownTask(name)) if name == "default"
    ));

    let fs = project_fs();
    let runner = Runner::new(build_graph()?, mock_context(&fs, RecordingObserver::new()));
    assert!(matches!(
        runner.run("nope").await,
        Err(PipelineError::UnknownTask(_))
    ));
    // Nothing ran.
    assert!(fs.snapshot_under("./dist").is_empty());
    Ok(())
}

#[tokio::test]
async fn sequence_failure_prevents_later_steps_from_starting() -> TestResult {
    init_tracing();

    let fs = project_fs();
    let observer = RecordingObserver::new();
    let c_stage = FakeTransform::identity("c-stage");

    let graph = TaskGraphBuilder::new()
        .task(leaf_task("a", &["src/js/*.js"], "dist/a", vec![]))
        .task(leaf_task(
            "b",
            &["src/js/*.js"],
            "dist/b",
            vec![FakeTransform::failing("b-stage", "boom").into_arc()],
        ))
        .task(leaf_task(
            "c",
            &["src/js/*.js"],
            "dist/c",
            vec![c_stage.clone().into_arc()],
        ))
        .series("chain", ["a", "b", "c"])
        .build()?;

    let runner = Runner::new(graph, mock_context(&fs, observer.clone()));
    let err = with_timeout(runner.run("chain"))
        .await
        .expect_err("chain must fail");

    match &err {
        PipelineError::SequenceAborted {
            group,
            step,
            index,
            source,
        } => {
            assert_eq!(group, "chain");
            assert_eq!(step, "b");
            assert_eq!(*index, 1);
            assert!(matches!(
                source.as_ref(),
                PipelineError::Transform { task, stage, .. } if task == "b" && stage == "b-stage"
            ));
        }
        other => panic!("expected SequenceAborted, got {other:?}"),
    }

    assert_eq!(c_stage.calls(), 0);
    assert_eq!(observer.started("c"), 0);
    assert_eq!(observer.files_written("a"), 2);
    Ok(())
}

#[tokio::test]
async fn parallel_group_reports_every_member_failure() -> TestResult {
    init_tracing();

    let fs = project_fs();
    let observer = RecordingObserver::new();

    let graph = TaskGraphBuilder::new()
        .task(leaf_task(
            "styles",
            &["src/styles/**/*.scss"],
            "dist/css",
            vec![FakeTransform::failing_on("sass", "main.scss").into_arc()],
        ))
        .task(leaf_task("scripts", &["src/js/**/*.js"], "dist/js", vec![]))
        .task(leaf_task(
            "images",
            &["src/images/**/*"],
            "dist/images",
            vec![FakeTransform::failing("imagemin", "corrupt jpeg").into_arc()],
        ))
        .parallel("build", ["styles", "scripts", "images"])
        .build()?;

    let runner = Runner::new(graph, mock_context(&fs, observer.clone()));
    let err = with_timeout(runner.run("build"))
        .await
        .expect_err("build must fail");

    let PipelineError::Parallel {
        group,
        total,
        failures,
    } = &err
    else {
        panic!("expected Parallel, got {err:?}");
    };
    assert_eq!(group, "build");
    assert_eq!(*total, 3);
    assert_eq!(failures.len(), 2);

    // Failures are reported in declaration order, attributed to file + stage.
    match &failures[0] {
        PipelineError::Transform {
            task, stage, file, ..
        } => {
            assert_eq!(task, "styles");
            assert_eq!(stage, "sass");
            assert_eq!(
                file.as_deref(),
                Some(std::path::Path::new("./src/styles/main.scss"))
            );
        }
        other => panic!("unexpected failure {other:?}"),
    }
    assert!(matches!(&failures[1], PipelineError::Transform { task, .. } if task == "images"));

    // The healthy sibling still ran to completion.
    assert_eq!(observer.files_written("scripts"), 2);
    assert_eq!(err.leaf_errors().len(), 2);
    Ok(())
}

fn fail_fast_graph(late: &FakeTransform) -> Result<TaskGraph, PipelineError> {
    TaskGraphBuilder::new()
        .task(leaf_task(
            "bad",
            &["src/js/*.js"],
            "dist/bad",
            vec![
                FakeTransform::failing("lint", "syntax error")
                    .with_delay(Duration::from_millis(30))
                    .into_arc(),
            ],
        ))
        .task(leaf_task(
            "slow",
            &["src/js/*.js"],
            "dist/slow",
            vec![
                FakeTransform::identity("slow")
                    .with_delay(Duration::from_millis(150))
                    .into_arc(),
            ],
        ))
        .task(leaf_task(
            "late",
            &["src/js/*.js"],
            "dist/late",
            vec![late.clone().into_arc()],
        ))
        .parallel("build", [Unit::from("bad"), Unit::sequential(["slow", "late"])])
        .build()
}

#[tokio::test]
async fn fail_fast_skips_units_that_have_not_started() -> TestResult {
    init_tracing();

    let fs = project_fs();
    let observer = RecordingObserver::new();
    let late = FakeTransform::identity("late");
    let runner = Runner::new(fail_fast_graph(&late)?, mock_context(&fs, observer.clone()))
        .fail_fast(true);

    let err = with_timeout(runner.run("build"))
        .await
        .expect_err("bad must fail the group");

    assert_eq!(err.leaf_errors().len(), 1);
    assert_eq!(late.calls(), 0);
    assert_eq!(observer.skipped("late"), 1);
    // Already running when the flag tripped, so it finished.
    assert_eq!(observer.files_written("slow"), 2);
    Ok(())
}

#[tokio::test]
async fn without_fail_fast_independent_units_still_run() -> TestResult {
    let fs = project_fs();
    let observer = RecordingObserver::new();
    let late = FakeTransform::identity("late");
    let runner = Runner::new(fail_fast_graph(&late)?, mock_context(&fs, observer.clone()));

    let err = with_timeout(runner.run("build")).await.expect_err("bad fails");
    assert_eq!(err.leaf_errors().len(), 1);
    assert_eq!(late.calls(), 1);
    assert_eq!(observer.skipped("late"), 0);
    Ok(())
}

#[tokio::test]
async fn anonymous_nested_groups_are_named_after_their_parent() -> TestResult {
    let late = FakeTransform::identity("late");
    let graph = fail_fast_graph(&late)?;
    let plan = graph.resolve("build")?;
    let names: Vec<&str> = plan.units().iter().map(|u| u.name()).collect();
    assert_eq!(names, vec!["bad", "build[1]"]);
    Ok(())
}

#[tokio::test]
async fn max_parallel_bounds_concurrent_leaf_tasks() -> TestResult {
    init_tracing();

    let probe = ConcurrencyProbe::new();
    let mut builder = TaskGraphBuilder::new();
    let mut names = Vec::new();
    for i in 0..4 {
        let name = format!("t{i}");
        builder = builder.task(leaf_task(
            &name,
            &["src/js/*.js"],
            &format!("dist/{name}"),
            vec![
                FakeTransform::identity("work")
                    .with_delay(Duration::from_millis(50))
                    .with_probe(probe.clone())
                    .into_arc(),
            ],
        ));
        names.push(name);
    }
    let graph = builder.parallel("all", names).build()?;

    let fs = project_fs();
    let ctx = ExecContext::new(mock_context(&fs, RecordingObserver::new())).max_parallel(2);
    let report = with_timeout(execute_plan(graph.resolve("all")?, ctx)).await?;

    assert_eq!(report.tasks.len(), 4);
    assert!(probe.peak() <= 2, "peak concurrency was {}", probe.peak());
    Ok(())
}

#[tokio::test]
async fn parallel_output_matches_any_sequential_order() -> TestResult {
    let graph = build_graph()?;
    let members = ["styles", "scripts", "images", "copy"];

    let parallel_fs = project_fs();
    Runner::new(graph.clone(), mock_context(&parallel_fs, RecordingObserver::new()))
        .run("build")
        .await?;
    let expected = parallel_fs.snapshot_under("./dist");
    assert_eq!(expected.len(), 4);

    let orders: [[usize; 4]; 3] = [[0, 1, 2, 3], [3, 2, 1, 0], [2, 0, 3, 1]];
    for order in orders {
        let fs = project_fs();
        let runner = Runner::new(graph.clone(), mock_context(&fs, RecordingObserver::new()));
        for idx in order {
            runner.run(members[idx]).await?;
        }
        assert_eq!(fs.snapshot_under("./dist"), expected, "order {order:?}");
    }
    Ok(())
}

#[tokio::test]
async fn rerunning_on_unchanged_sources_is_idempotent() -> TestResult {
    let fs = project_fs();
    let runner = Runner::new(build_graph()?, mock_context(&fs, RecordingObserver::new()));

    runner.run("build").await?;
    let first = fs.snapshot_under("./dist");
    runner.run("build").await?;
    let second = fs.snapshot_under("./dist");

    assert_eq!(first, second);
    Ok(())
}

#[tokio::test]
async fn dry_run_description_lists_every_unit() -> TestResult {
    let late = FakeTransform::identity("late");
    let graph = fail_fast_graph(&late)?;
    let text = graph.resolve("build")?.describe();

    assert!(text.starts_with("build (parallel)"));
    assert!(text.contains("build[1] (series)"));
    assert!(text.contains("late"));
    Ok(())
}

use std::error::Error;
use std::fs;
use std::path::Path;
use std::time::Duration;

use assetpipe::config::{load_and_validate, project_root};
use assetpipe::errors::PipelineError;
use assetpipe::runner::Runner;
use assetpipe::types::Mode;
use assetpipe_test_utils::init_tracing;
use tempfile::TempDir;
use tokio::time::{Instant, sleep};

type TestResult = Result<(), Box<dyn Error>>;

const CONFIG: &str = r#"
[config]
dest = "dist"
default = "build"
debounce_ms = 50

[task.styles]
src = ["src/styles/**/*.scss"]
dest = "css"
transforms = [
  { kind = "command", name = "upper", cmd = "tr a-z A-Z" },
  { kind = "rename", from = "\\.scss$", to = ".css" },
]

[task.scripts]
src = ["src/js/**/*.js", "!src/js/vendor/**"]
dest = "js"
transforms = [
  { kind = "concat", output = "bundle.js" },
]

[task.html]
src = ["src/*.html"]

[group.build]
parallel = ["styles", "scripts", "html"]

[group.dev]
series = ["styles", "watch"]

[watch.watch]
bind = [{ task = "styles" }]
"#;

fn write(root: &Path, rel: &str, contents: &str) -> std::io::Result<()> {
    let path = root.join(rel);
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::write(path, contents)
}

fn project() -> Result<TempDir, Box<dyn Error>> {
    let dir = tempfile::tempdir()?;
    let root = dir.path();
    write(root, "Assetpipe.toml", CONFIG)?;
    write(root, "src/styles/main.scss", "body { color: red; }")?;
    write(root, "src/styles/partials/nav.scss", "nav { }")?;
    write(root, "src/js/a.js", "a();")?;
    write(root, "src/js/b.js", "b();")?;
    write(root, "src/js/vendor/lib.js", "lib();")?;
    write(root, "src/index.html", "<html></html>")?;
    Ok(dir)
}

fn runner_for(dir: &TempDir, mode: Mode) -> Result<Runner, Box<dyn Error>> {
    let config_path = dir.path().join("Assetpipe.toml");
    let cfg = load_and_validate(&config_path)?;
    let root = project_root(&config_path, &cfg);
    Ok(Runner::from_config(&cfg, root, mode)?)
}

#[cfg(unix)]
#[tokio::test]
async fn build_runs_external_commands_and_writes_outputs() -> TestResult {
    init_tracing();
    let dir = project()?;
    let runner = runner_for(&dir, Mode::Development)?;

    let report = runner.run("default").await?;
    assert_eq!(report.files_written("styles"), 2);
    assert_eq!(report.files_written("scripts"), 1);
    assert_eq!(report.files_written("html"), 1);

    let dist = dir.path().join("dist");
    assert_eq!(
        fs::read_to_string(dist.join("css/main.css"))?,
        "BODY { COLOR: RED; }"
    );
    assert_eq!(fs::read_to_string(dist.join("css/partials/nav.css"))?, "NAV { }");
    assert_eq!(fs::read_to_string(dist.join("js/bundle.js"))?, "a();\nb();");
    assert_eq!(
        fs::read_to_string(dist.join("index.html"))?,
        "<html></html>"
    );
    assert!(!dist.join("js/lib.js").exists());
    Ok(())
}

#[cfg(unix)]
#[tokio::test]
async fn command_failure_names_the_task_stage_and_file() -> TestResult {
    let dir = tempfile::tempdir()?;
    write(
        dir.path(),
        "Assetpipe.toml",
        r#"
        [task.styles]
        src = ["src/*.scss"]
        transforms = [{ kind = "command", name = "sass", cmd = "echo 'Undefined variable' >&2; exit 3" }]
        "#,
    )?;
    write(dir.path(), "src/main.scss", "a { color: $brand; }")?;

    let runner = runner_for(&dir, Mode::Development)?;
    let err = runner.run("styles").await.unwrap_err();

    match err {
        PipelineError::Transform {
            task,
            stage,
            file,
            source,
        } => {
            assert_eq!(task, "styles");
            assert_eq!(stage, "sass");
            let file = file.expect("failing file is attributed");
            assert!(file.ends_with("src/main.scss"), "got {file:?}");
            let msg = source.to_string();
            assert!(msg.contains("exited with code 3"), "got {msg}");
            assert!(msg.contains("Undefined variable"), "got {msg}");
        }
        other => panic!("expected Transform, got {other:?}"),
    }
    assert!(!dir.path().join("dist/main.scss").exists());
    Ok(())
}

#[cfg(unix)]
#[tokio::test]
async fn sourcemaps_written_by_tools_land_next_to_outputs() -> TestResult {
    let dir = tempfile::tempdir()?;
    write(
        dir.path(),
        "Assetpipe.toml",
        r#"
        [config]
        sourcemap_dir = "maps"

        [task.styles]
        src = ["src/*.scss"]
        dest = "css"
        transforms = [{ kind = "command", name = "sass", cmd = "cat; printf '{\"file\":\"%s\"}' {file} > {map}" }]
        "#,
    )?;
    write(dir.path(), "src/main.scss", "a{}")?;

    let runner = runner_for(&dir, Mode::Development)?;
    runner.run("styles").await?;

    let css = dir.path().join("dist/css");
    assert_eq!(fs::read_to_string(css.join("main.scss"))?, "a{}");
    assert_eq!(
        fs::read_to_string(css.join("maps/main.scss.map"))?,
        r#"{"file":"src/main.scss"}"#
    );
    Ok(())
}

#[cfg(unix)]
#[tokio::test]
async fn file_placeholder_names_the_source_relative_to_the_project_root() -> TestResult {
    let dir = tempfile::tempdir()?;
    write(
        dir.path(),
        "Assetpipe.toml",
        r#"
        [task.styles]
        src = ["src/styles/**/*.scss"]
        dest = "css"
        transforms = [
          { kind = "rename", from = "\\.scss$", to = ".css" },
          { kind = "command", name = "cat", cmd = "test -f Assetpipe.toml && cat {file}" },
        ]
        "#,
    )?;
    write(dir.path(), "src/styles/a.scss", "a { }")?;
    write(dir.path(), "src/styles/nested/b.scss", "b { }")?;

    // The process cwd is not the project root here.
    assert_ne!(std::env::current_dir()?, dir.path());
    let runner = runner_for(&dir, Mode::Development)?;
    let report = runner.run("styles").await?;
    assert_eq!(report.files_written("styles"), 2);

    let css = dir.path().join("dist/css");
    assert_eq!(fs::read_to_string(css.join("a.css"))?, "a { }");
    assert_eq!(fs::read_to_string(css.join("nested/b.css"))?, "b { }");
    Ok(())
}

#[cfg(unix)]
#[tokio::test]
async fn symlinked_directories_are_not_followed() -> TestResult {
    let dir = tempfile::tempdir()?;
    write(
        dir.path(),
        "Assetpipe.toml",
        r#"
        [task.styles]
        src = ["src/styles/**/*.scss"]
        dest = "css"
        "#,
    )?;
    write(dir.path(), "src/styles/main.scss", "a{}")?;
    std::os::unix::fs::symlink("..", dir.path().join("src/styles/loop"))?;

    let runner = runner_for(&dir, Mode::Development)?;
    let report = tokio::time::timeout(Duration::from_secs(10), runner.run("styles")).await??;
    assert_eq!(report.files_written("styles"), 1);
    assert!(dir.path().join("dist/css/main.scss").exists());
    assert!(!dir.path().join("dist/css/loop").exists());
    Ok(())
}

#[tokio::test]
async fn production_mode_skips_optimisers_marked_passthrough() -> TestResult {
    let dir = tempfile::tempdir()?;
    write(
        dir.path(),
        "Assetpipe.toml",
        r#"
        [task.images]
        src = ["src/images/*.png"]
        dest = "images"
        production = "passthrough"
        transforms = [{ kind = "command", name = "imagemin", cmd = "exit 1" }]
        "#,
    )?;
    write(dir.path(), "src/images/logo.png", "PNG")?;

    let prod = runner_for(&dir, Mode::Production)?;
    let report = prod.run("images").await?;
    assert_eq!(report.files_written("images"), 1);
    assert_eq!(
        fs::read_to_string(dir.path().join("dist/images/logo.png"))?,
        "PNG"
    );

    let dev = runner_for(&dir, Mode::Development)?;
    assert!(dev.run("images").await.is_err());
    Ok(())
}

async fn wait_for_contents(path: &Path, expected: &str, deadline: Instant) -> bool {
    while Instant::now() < deadline {
        if fs::read_to_string(path).is_ok_and(|c| c == expected) {
            return true;
        }
        sleep(Duration::from_millis(50)).await;
    }
    false
}

#[cfg(unix)]
#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn dev_builds_then_rebuilds_on_change_until_shutdown() -> TestResult {
    init_tracing();
    let dir = project()?;
    let runner = runner_for(&dir, Mode::Development)?;
    let ctx = runner.exec_context();
    let shutdown = ctx.clone();

    let run = tokio::spawn(async move { runner.run_with("dev", ctx).await });

    let out = dir.path().join("dist/css/main.css");
    let deadline = Instant::now() + Duration::from_secs(10);
    assert!(
        wait_for_contents(&out, "BODY { COLOR: RED; }", deadline).await,
        "initial build did not happen"
    );

    // The watcher may still be registering; keep touching the source
    // until the rebuilt output shows up.
    let source = dir.path().join("src/styles/main.scss");
    let mut rebuilt = false;
    while Instant::now() < deadline {
        fs::write(&source, "body { color: blue; }")?;
        if wait_for_contents(&out, "BODY { COLOR: BLUE; }", Instant::now() + Duration::from_millis(500)).await {
            rebuilt = true;
            break;
        }
    }
    assert!(rebuilt, "watcher did not rebuild styles");

    shutdown.request_shutdown();
    let report = tokio::time::timeout(Duration::from_secs(10), run).await???;

    assert!(report.ran("styles"));
    assert_eq!(report.watches.len(), 1);
    let (name, summary) = &report.watches[0];
    assert_eq!(name, "watch");
    assert!(summary.runs >= 1);
    assert_eq!(summary.failures, 0);
    Ok(())
}

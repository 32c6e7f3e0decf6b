// tests/dev_run.rs

mod common;

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::oneshot;

use assetpipe::config::ConfigFile;
use assetpipe::dag::compose_pipeline;
use assetpipe::engine::orchestrator::{DevOptions, Project};
use assetpipe::engine::run_dev;
use assetpipe::errors::AssetpipeError;
use assetpipe::fs::RealFileSystem;
use assetpipe::types::{Mode, NotifyAction, TaskKind};
use assetpipe::watch::build_rules_from_config;
use assetpipe_test_utils::FakeRunner;
use assetpipe_test_utils::builders::{ConfigFileBuilder, TaskConfigBuilder, WatchRuleBuilder};
use tempfile::TempDir;

use crate::common::{init_tracing, with_timeout, write_tree};

fn dev_config() -> ConfigFile {
    ConfigFileBuilder::new()
        .debounce_ms(50)
        .with_task(
            "styles",
            TaskConfigBuilder::new(TaskKind::Style)
                .src("sass/style.scss")
                .dest("css")
                .rename("style.min.css")
                .build(),
        )
        .with_task("html", TaskConfigBuilder::copy("*.html", "").build())
        .with_watch(
            WatchRuleBuilder::new("styles")
                .path("sass/**/*.scss")
                .run("styles")
                .notify(NotifyAction::Inject)
                .build(),
        )
        .build()
}

fn options() -> DevOptions {
    DevOptions {
        host: "127.0.0.1".to_string(),
        port: 0,
        debounce: Duration::from_millis(50),
    }
}

async fn wait_until(cond: impl Fn() -> bool) {
    with_timeout(async {
        while !cond() {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
}

fn seed(dir: &TempDir) {
    write_tree(
        &dir.path().join("source"),
        &[
            ("sass/style.scss", b"a { color: red }"),
            ("index.html", b"<body></body>"),
        ],
    );
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn source_change_reruns_its_rule_until_shutdown() {
    init_tracing();
    let dir = tempfile::tempdir().unwrap();
    seed(&dir);

    let cfg = dev_config();
    let project = Project::from_config(dir.path(), &cfg);
    let pipeline = Arc::new(compose_pipeline(&cfg, Mode::Dev).unwrap());
    let rules = build_rules_from_config(&cfg).unwrap();
    let runner = Arc::new(FakeRunner::new());

    let (stop, stopped) = oneshot::channel::<()>();
    let dev = {
        let runner = Arc::clone(&runner);
        let project = project.clone();
        tokio::spawn(async move {
            run_dev(
                pipeline,
                rules,
                &project,
                &options(),
                runner,
                Arc::new(RealFileSystem),
                async move {
                    let _ = stopped.await;
                },
            )
            .await
        })
    };

    // Initial pipeline, then give the watcher time to register.
    wait_until(|| runner.count("styles") == 1 && runner.count("html") == 1).await;
    tokio::time::sleep(Duration::from_millis(300)).await;

    write_tree(
        &project.source_root,
        &[("sass/a.scss", b"b { color: blue }")],
    );
    wait_until(|| runner.count("styles") >= 2).await;
    assert_eq!(runner.count("html"), 1);

    stop.send(()).unwrap();
    with_timeout(dev).await.unwrap().unwrap();
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn fatal_failure_in_the_initial_build_ends_the_dev_run() {
    init_tracing();
    let dir = tempfile::tempdir().unwrap();
    seed(&dir);

    let cfg = dev_config();
    let project = Project::from_config(dir.path(), &cfg);
    let pipeline = Arc::new(compose_pipeline(&cfg, Mode::Dev).unwrap());
    let rules = build_rules_from_config(&cfg).unwrap();
    let runner = Arc::new(FakeRunner::new().failing("html"));

    let result = with_timeout(run_dev(
        pipeline,
        rules,
        &project,
        &options(),
        runner,
        Arc::new(RealFileSystem),
        std::future::pending(),
    ))
    .await;

    match result {
        Err(AssetpipeError::TaskFailed { task, .. }) => assert_eq!(task, "html"),
        other => panic!("expected fatal task failure, got {other:?}"),
    }
}

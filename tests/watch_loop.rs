// tests/watch_loop.rs

mod common;

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use assetpipe::config::ConfigFile;
use assetpipe::dag::compose_pipeline;
use assetpipe::engine::{CoreRuntime, Runtime, RuntimeEvent};
use assetpipe::errors::{AssetpipeError, Result};
use assetpipe::serve::ReloadNotifier;
use assetpipe::types::{Mode, NotifyAction, TaskKind};
use assetpipe::watch::build_rules_from_config;
use assetpipe_test_utils::builders::{ConfigFileBuilder, TaskConfigBuilder, WatchRuleBuilder};
use assetpipe_test_utils::{FakeRunner, RecordingNotifier};

use crate::common::{init_tracing, with_timeout};

fn dev_config() -> ConfigFile {
    ConfigFileBuilder::new()
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
        .with_watch(
            WatchRuleBuilder::new("markup")
                .path("*.html")
                .run("html")
                .notify(NotifyAction::Reload)
                .build(),
        )
        .build()
}

struct Harness {
    tx: mpsc::Sender<RuntimeEvent>,
    notifier: RecordingNotifier,
    runner: Arc<FakeRunner>,
    handle: JoinHandle<Result<()>>,
}

impl Harness {
    fn start(runner: FakeRunner) -> Self {
        let cfg = dev_config();
        let pipeline = Arc::new(compose_pipeline(&cfg, Mode::Dev).unwrap());
        let rules = build_rules_from_config(&cfg).unwrap();
        let core = CoreRuntime::new(&rules, ["styles".to_string()]);

        let (tx, rx) = mpsc::channel(16);
        let runner = Arc::new(runner);
        let notifier = RecordingNotifier::new();
        let shared: Arc<dyn ReloadNotifier> = Arc::new(notifier.clone());
        let runtime = Runtime::new(core, pipeline, rx, tx.clone(), Arc::clone(&runner), shared);
        let handle = tokio::spawn(runtime.run());

        Self {
            tx,
            notifier,
            runner,
            handle,
        }
    }

    async fn trigger(&self, rule: &str) {
        self.tx
            .send(RuntimeEvent::RuleTriggered {
                rule: rule.to_string(),
            })
            .await
            .unwrap();
    }

    async fn shutdown(self) -> Result<()> {
        self.tx.send(RuntimeEvent::ShutdownRequested).await.unwrap();
        with_timeout(self.handle).await.unwrap()
    }
}

#[tokio::test]
async fn style_changes_inject_and_markup_changes_reload() {
    init_tracing();
    let h = Harness::start(FakeRunner::new());

    h.trigger("styles").await;
    with_timeout(h.notifier.wait_for(1)).await;
    h.trigger("markup").await;
    with_timeout(h.notifier.wait_for(2)).await;

    assert_eq!(
        h.notifier.actions(),
        vec![NotifyAction::Inject, NotifyAction::Reload]
    );
    assert_eq!(h.runner.executed(), vec!["styles", "html"]);
    h.shutdown().await.unwrap();
}

#[tokio::test]
async fn triggers_during_a_run_coalesce_into_one_rerun() {
    init_tracing();
    let h = Harness::start(FakeRunner::new().with_task_delay("html", Duration::from_millis(100)));

    h.trigger("markup").await;
    tokio::time::sleep(Duration::from_millis(10)).await;
    h.trigger("markup").await;
    h.trigger("markup").await;

    with_timeout(h.notifier.wait_for(2)).await;
    tokio::time::sleep(Duration::from_millis(250)).await;

    assert_eq!(h.runner.count("html"), 2);
    assert_eq!(
        h.notifier.actions(),
        vec![NotifyAction::Reload, NotifyAction::Reload]
    );
    h.shutdown().await.unwrap();
}

#[tokio::test]
async fn failed_style_keeps_the_loop_alive_without_notifying() {
    init_tracing();
    let h = Harness::start(FakeRunner::new().failing("styles"));

    h.trigger("styles").await;
    h.trigger("markup").await;
    with_timeout(h.notifier.wait_for(1)).await;

    assert_eq!(h.notifier.actions(), vec![NotifyAction::Reload]);
    assert_eq!(h.runner.count("styles"), 1);
    h.shutdown().await.unwrap();
}

#[tokio::test]
async fn fatal_failure_ends_the_loop() {
    init_tracing();
    let h = Harness::start(FakeRunner::new().failing("html"));

    h.trigger("markup").await;
    let result = with_timeout(h.handle).await.unwrap();

    match result {
        Err(AssetpipeError::TaskFailed { task, .. }) => assert_eq!(task, "html"),
        other => panic!("expected fatal task failure, got {other:?}"),
    }
    assert!(h.notifier.actions().is_empty());
}

async fn wait_until(cond: impl Fn() -> bool) {
    with_timeout(async {
        while !cond() {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
}

#[tokio::test]
async fn panicking_task_is_reported_as_a_fatal_failure() {
    init_tracing();
    let h = Harness::start(FakeRunner::new().panicking("html"));

    h.trigger("markup").await;
    let result = with_timeout(h.handle).await.unwrap();

    match result {
        Err(AssetpipeError::TaskFailed { task, message }) => {
            assert_eq!(task, "html");
            assert!(message.contains("panicked"), "{message}");
        }
        other => panic!("expected fatal task failure, got {other:?}"),
    }
    assert!(h.notifier.actions().is_empty());
}

#[tokio::test]
async fn panicking_recoverable_task_can_run_again() {
    init_tracing();
    let h = Harness::start(FakeRunner::new().panicking("styles"));

    h.trigger("styles").await;
    wait_until(|| h.runner.count("styles") == 1).await;

    h.trigger("markup").await;
    with_timeout(h.notifier.wait_for(1)).await;

    h.trigger("styles").await;
    wait_until(|| h.runner.count("styles") == 2).await;

    assert_eq!(h.notifier.actions(), vec![NotifyAction::Reload]);
    h.shutdown().await.unwrap();
}

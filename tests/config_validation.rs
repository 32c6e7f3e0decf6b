// tests/config_validation.rs

mod common;

use assetpipe::config::{default_config, parse_str};
use assetpipe::config::ConfigFile;
use assetpipe::errors::AssetpipeError;
use assetpipe::types::{Mode, NotifyAction, TaskKind};
use assetpipe_test_utils::builders::{ConfigFileBuilder, TaskConfigBuilder, WatchRuleBuilder};

fn expect_config_error(result: assetpipe::errors::Result<ConfigFile>, needle: &str) {
    match result {
        Err(AssetpipeError::ConfigError(msg)) => {
            assert!(msg.contains(needle), "unexpected message: {msg}")
        }
        other => panic!("expected config error containing {needle:?}, got {other:?}"),
    }
}

#[test]
fn builtin_pipeline_is_valid() {
    let cfg = default_config().unwrap();
    assert_eq!(cfg.config_section().source, "source");
    assert_eq!(cfg.config_section().build, "build");
    assert_eq!(cfg.server_section().port, 3000);
    assert_eq!(cfg.watch_rules().len(), 3);
    assert!(cfg.tasks().contains_key("clean"));
}

#[test]
fn unknown_dependency_is_rejected() {
    let result = ConfigFileBuilder::new()
        .with_task("a", TaskConfigBuilder::copy("*.html", "").after("missing").build())
        .try_build();
    expect_config_error(result, "unknown dependency 'missing'");
}

#[test]
fn cycles_are_rejected() {
    let result = ConfigFileBuilder::new()
        .with_task("a", TaskConfigBuilder::copy("a/*", "a").after("b").build())
        .with_task("b", TaskConfigBuilder::copy("b/*", "b").after("a").build())
        .try_build();
    assert!(matches!(result, Err(AssetpipeError::DagCycle(_))));
}

#[test]
fn dest_may_not_escape_the_build_dir() {
    let result = ConfigFileBuilder::new()
        .with_task("a", TaskConfigBuilder::copy("*.html", "../outside").build())
        .try_build();
    expect_config_error(result, "escapes the build directory");
}

#[test]
fn only_negated_sources_are_rejected() {
    let result = ConfigFileBuilder::new()
        .with_task("a", TaskConfigBuilder::new(TaskKind::Copy).src("!*.html").build())
        .try_build();
    expect_config_error(result, "non-negated `src`");
}

#[test]
fn nested_source_and_build_are_rejected() {
    let result = ConfigFileBuilder::new()
        .source("site")
        .build_dir("site/out")
        .with_task("a", TaskConfigBuilder::copy("*.html", "").build())
        .try_build();
    expect_config_error(result, "must not contain each other");
}

#[test]
fn watch_rules_must_run_dev_tasks() {
    let result = ConfigFileBuilder::new()
        .with_task(
            "images",
            TaskConfigBuilder::new(TaskKind::Image)
                .src("img/*.png")
                .dest("img")
                .only_in(Mode::Build)
                .build(),
        )
        .with_watch(WatchRuleBuilder::new("img").path("img/*.png").run("images").build())
        .try_build();
    expect_config_error(result, "disabled in dev mode");
}

#[test]
fn watch_rules_cannot_run_clean() {
    let result = ConfigFileBuilder::new()
        .with_task("clean", TaskConfigBuilder::clean().build())
        .with_watch(WatchRuleBuilder::new("all").path("**").run("clean").build())
        .try_build();
    expect_config_error(result, "cannot run clean task");
}

#[test]
fn duplicate_rule_names_are_rejected() {
    let rule = WatchRuleBuilder::new("pages")
        .path("*.html")
        .run("html")
        .notify(NotifyAction::Reload)
        .build();
    let result = ConfigFileBuilder::new()
        .with_task("html", TaskConfigBuilder::copy("*.html", "").build())
        .with_watch(rule.clone())
        .with_watch(rule)
        .try_build();
    expect_config_error(result, "used more than once");
}

#[test]
fn unknown_fields_fail_to_parse() {
    let toml = r#"
[task.html]
kind = "copy"
src = ["*.html"]
cmd = "echo"
"#;
    assert!(matches!(parse_str(toml), Err(AssetpipeError::TomlError(_))));
}

#[test]
fn toml_round_trips_into_a_valid_config() {
    let toml = r#"
[config]
debounce_ms = 250

[task.html]
kind = "copy"
src = ["*.html"]

[[watch]]
paths = ["*.html"]
run = ["html"]
notify = "reload"
"#;
    let cfg = ConfigFile::try_from(parse_str(toml).unwrap()).unwrap();
    assert_eq!(cfg.config_section().debounce_ms, 250);
    assert_eq!(cfg.watch_rules()[0].label(0), "watch[0]");
    assert_eq!(cfg.watch_rules()[0].notify, NotifyAction::Reload);
}

// src/lib.rs

pub mod cli;
pub mod config;
pub mod dag;
pub mod engine;
pub mod errors;
pub mod exec;
pub mod fs;
pub mod logging;
pub mod patterns;
pub mod serve;
pub mod transform;
pub mod types;
pub mod watch;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Result;
use tracing::{debug, info};

use crate::cli::CliArgs;
use crate::config::model::ConfigFile;
use crate::dag::{Pipeline, compose_pipeline};
use crate::engine::orchestrator::{DevOptions, Project};
use crate::engine::{run_build, run_dev};
use crate::exec::TransformRunner;
use crate::fs::{FileSystem, RealFileSystem};
use crate::types::Mode;
use crate::watch::build_rules_from_config;

/// High-level entry point used by `main.rs`.
///
/// This wires together:
/// - config resolution and validation
/// - pipeline composition for the selected mode (before any file is touched)
/// - the one-shot build, or the dev run (build, preview server, watcher)
/// - Ctrl-C handling
pub async fn run(args: CliArgs) -> Result<()> {
    let explicit = args.config.as_deref().map(Path::new);
    let (cfg, config_path) = config::resolve(explicit)?;
    let root = project_root(config_path.as_deref());
    let project = Project::from_config(&root, &cfg);
    let mode = args.mode();

    // Compose every mode so a broken `build` pipeline is caught during `dev`
    // too; only the selected one runs.
    let mut selected: Option<Pipeline> = None;
    for m in Mode::ALL {
        let pipeline = compose_pipeline(&cfg, m)?;
        if m == mode {
            selected = Some(pipeline);
        }
    }
    let pipeline = selected.ok_or_else(|| anyhow::anyhow!("no pipeline composed for {mode}"))?;

    if args.dry_run {
        print_dry_run(&cfg, &project, &pipeline);
        return Ok(());
    }

    let fs: Arc<dyn FileSystem> = Arc::new(RealFileSystem);
    let runner = Arc::new(TransformRunner::new(
        project.source_root.clone(),
        project.build_root.clone(),
        Arc::clone(&fs),
    ));

    match mode {
        Mode::Build => {
            run_build(&pipeline, runner).await?;
        }
        Mode::Dev => {
            let rules = build_rules_from_config(&cfg)?;
            let options = DevOptions::from_config(&cfg, args.port);
            let shutdown = async {
                if let Err(e) = tokio::signal::ctrl_c().await {
                    eprintln!("failed to listen for Ctrl+C: {e}");
                    std::future::pending::<()>().await;
                }
            };
            run_dev(
                Arc::new(pipeline),
                rules,
                &project,
                &options,
                runner,
                fs,
                shutdown,
            )
            .await?;
        }
    }

    Ok(())
}

/// Figure out the project root that `source` and `build` are relative to.
///
/// - If the config path has a non-empty parent (e.g. "site/Assetpipe.toml"),
///   we use that directory.
/// - Otherwise (bare file name, or the built-in config) we fall back to the
///   current working directory.
fn project_root(config_path: Option<&Path>) -> PathBuf {
    match config_path.and_then(Path::parent) {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")),
    }
}

/// Dry-run output: resolved paths, the composed stages and watch rules.
fn print_dry_run(cfg: &ConfigFile, project: &Project, pipeline: &Pipeline) {
    println!("assetpipe dry-run");
    println!("  source = {}", project.source_root.display());
    println!("  build  = {}", project.build_root.display());
    println!();
    print!("{pipeline}");

    if pipeline.mode == Mode::Dev && !cfg.watch_rules().is_empty() {
        println!();
        println!("watch rules ({}):", cfg.watch_rules().len());
        for (idx, rule) in cfg.watch_rules().iter().enumerate() {
            println!(
                "  - {}: {:?} -> {:?} (notify: {:?}{})",
                rule.label(idx),
                rule.paths,
                rule.run,
                rule.notify,
                if rule.use_hash { ", use_hash" } else { "" }
            );
        }
    }

    debug!("dry-run complete (no execution)");
    info!(mode = %pipeline.mode, "dry-run finished");
}

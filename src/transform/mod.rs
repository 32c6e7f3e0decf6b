// src/transform/mod.rs

//! The fixed registry of file transforms.
//!
//! A transform is pure: it receives the already-read (and, if the task has a
//! filter command, already-filtered) inputs of one task and returns the
//! outputs to write. It never touches the filesystem; the runner in
//! [`crate::exec`] does that and places each output under the task's `dest`.

pub mod image;
pub mod sprite;
pub mod style;

use crate::dag::Task;
use crate::errors::{AssetpipeError, Result};
use crate::types::TaskKind;

/// One file flowing through a transform.
///
/// For inputs `rel` is relative to the source dir; for outputs it is relative
/// to the task's `dest`, before `rename` is applied.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Asset {
    pub rel: String,
    pub bytes: Vec<u8>,
}

impl Asset {
    pub fn new(rel: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            rel: rel.into(),
            bytes,
        }
    }
}

/// Run the transform bound to `task.kind` over `inputs`.
pub fn apply(task: &Task, inputs: Vec<Asset>) -> Result<Vec<Asset>> {
    match task.kind {
        TaskKind::Clean => Err(AssetpipeError::transform(
            &task.name,
            "clean tasks have no file transform",
        )),
        TaskKind::Copy => Ok(inputs
            .into_iter()
            .map(|a| Asset::new(task.placed_input(&a.rel), a.bytes))
            .collect()),
        TaskKind::Style => {
            let mut outputs = Vec::with_capacity(inputs.len() * 2);
            for a in inputs {
                let placed = task.placed_input(&a.rel);
                let final_path = task.output_path(&placed);
                let file_name = final_path.rsplit('/').next().unwrap_or(&final_path);
                let compiled = style::compile(&a.rel, &a.bytes, file_name)
                    .map_err(|e| AssetpipeError::transform(&task.name, e))?;
                outputs.push(Asset::new(
                    format!("{placed}{}", style::SOURCE_MAP_SUFFIX),
                    compiled.map,
                ));
                outputs.push(Asset::new(placed, compiled.css));
            }
            Ok(outputs)
        }
        TaskKind::Image => inputs
            .into_iter()
            .map(|a| {
                let optimized = image::optimize(&a.rel, &a.bytes)
                    .map_err(|e| AssetpipeError::transform(&task.name, e))?;
                Ok(Asset::new(task.placed_input(&a.rel), optimized))
            })
            .collect(),
        TaskKind::Webp => inputs
            .into_iter()
            .map(|a| {
                let webp = image::to_webp(&a.rel, &a.bytes)
                    .map_err(|e| AssetpipeError::transform(&task.name, e))?;
                Ok(Asset::new(task.placed_input(&a.rel), webp))
            })
            .collect(),
        TaskKind::Sprite => {
            if inputs.is_empty() {
                return Ok(Vec::new());
            }
            let sprite = sprite::pack(&inputs)
                .map_err(|e| AssetpipeError::transform(&task.name, e))?;
            Ok(vec![Asset::new(
                crate::dag::outputs::DEFAULT_SPRITE_NAME,
                sprite,
            )])
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::default_config;

    fn task(name: &str) -> Task {
        let cfg = default_config().unwrap();
        Task::from_config(name, &cfg.tasks()[name]).unwrap()
    }

    #[test]
    fn copy_keeps_bytes_and_strips_base() {
        let out = apply(
            &task("copy"),
            vec![Asset::new("fonts/a.woff2", b"font".to_vec())],
        )
        .unwrap();
        assert_eq!(out, vec![Asset::new("fonts/a.woff2", b"font".to_vec())]);

        let out = apply(
            &task("scripts"),
            vec![Asset::new("js/app.js", b"x".to_vec())],
        )
        .unwrap();
        assert_eq!(out[0].rel, "app.js");
    }

    #[test]
    fn style_errors_name_the_task() {
        let bad = apply(
            &task("styles"),
            vec![Asset::new("sass/style.scss", vec![0xff, 0xfe, 0x00])],
        );
        match bad {
            Err(AssetpipeError::Transform { task, .. }) => assert_eq!(task, "styles"),
            other => panic!("expected transform error, got {other:?}"),
        }
    }

    #[test]
    fn styles_come_with_a_source_map() {
        let styles = task("styles");
        let out = apply(
            &styles,
            vec![Asset::new("sass/style.scss", b"a { color: red }".to_vec())],
        )
        .unwrap();
        let paths: Vec<String> = out.iter().map(|a| styles.output_path(&a.rel)).collect();
        assert_eq!(paths, vec!["css/style.min.css.map", "css/style.min.css"]);

        let css = String::from_utf8(out[1].bytes.clone()).unwrap();
        assert!(css.ends_with("/*# sourceMappingURL=style.min.css.map */\n"), "{css}");
    }

    #[test]
    fn empty_sprite_input_writes_nothing() {
        assert!(apply(&task("sprite"), Vec::new()).unwrap().is_empty());
    }
}

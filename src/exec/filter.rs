// src/exec/filter.rs

//! External filter commands.
//!
//! A task's `filter` is a shell command that reads one input file on stdin
//! and writes the transformed file to stdout (e.g. a Sass compiler or a JS
//! minifier). It runs with the source directory as working directory and
//! the absolute input path in `ASSETPIPE_INPUT`.

use std::path::Path;
use std::process::Stdio;

use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::{debug, info};

use crate::errors::{AssetpipeError, Result};

/// Environment variable holding the absolute path of the filtered file.
pub const FILTER_INPUT_ENV: &str = "ASSETPIPE_INPUT";

fn shell(cmd_str: &str) -> Command {
    if cfg!(windows) {
        let mut c = Command::new("cmd");
        c.arg("/C").arg(cmd_str);
        c
    } else {
        let mut c = Command::new("sh");
        c.arg("-c").arg(cmd_str);
        c
    }
}

/// Pipe `input` through `cmd_str` and return its stdout.
///
/// A non-zero exit status fails with [`AssetpipeError::FilterCommand`],
/// carrying the last lines of stderr. The child is killed when the returned
/// future is dropped, so aborting the task stops the filter too.
pub async fn run_filter(
    task: &str,
    cmd_str: &str,
    cwd: &Path,
    input_path: &Path,
    input: Vec<u8>,
) -> Result<Vec<u8>> {
    let failure = |message: String| AssetpipeError::FilterCommand {
        task: task.to_string(),
        cmd: cmd_str.to_string(),
        message,
    };

    info!(task, cmd = %cmd_str, path = %input_path.display(), "running filter command");

    let mut cmd = shell(cmd_str);
    cmd.current_dir(cwd)
        .env(FILTER_INPUT_ENV, input_path)
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);

    let mut child = cmd
        .spawn()
        .map_err(|e| failure(format!("spawning process: {e}")))?;

    // Feed stdin concurrently; a filter that produces output before reading
    // all of its input would otherwise deadlock on a full pipe.
    let mut stdin = child
        .stdin
        .take()
        .ok_or_else(|| failure("stdin was not captured".to_string()))?;
    let feeder = tokio::spawn(async move {
        let res = stdin.write_all(&input).await;
        drop(stdin);
        res
    });

    let output = child
        .wait_with_output()
        .await
        .map_err(|e| failure(format!("waiting for process: {e}")))?;

    if let Ok(Err(e)) = feeder.await {
        // A filter may legitimately exit without reading everything.
        debug!(task, error = %e, "filter closed stdin early");
    }

    let stderr = String::from_utf8_lossy(&output.stderr);
    for line in stderr.lines() {
        debug!(task, "stderr: {}", line);
    }

    if !output.status.success() {
        let code = output.status.code().unwrap_or(-1);
        let tail: Vec<&str> = stderr.lines().rev().take(5).collect();
        let tail: Vec<&str> = tail.into_iter().rev().collect();
        return Err(failure(format!(
            "exit code {code}{}{}",
            if tail.is_empty() { "" } else { ": " },
            tail.join(" | ")
        )));
    }

    Ok(output.stdout)
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[tokio::test]
    async fn stdin_is_piped_to_stdout() {
        let out = run_filter(
            "scripts",
            "tr a-z A-Z",
            Path::new("."),
            &PathBuf::from("/tmp/app.js"),
            b"let x = 1;".to_vec(),
        )
        .await
        .unwrap();
        assert_eq!(out, b"LET X = 1;");
    }

    #[tokio::test]
    async fn input_path_is_exported() {
        let out = run_filter(
            "styles",
            "printf %s \"$ASSETPIPE_INPUT\"",
            Path::new("."),
            &PathBuf::from("/src/sass/style.scss"),
            Vec::new(),
        )
        .await
        .unwrap();
        assert_eq!(out, b"/src/sass/style.scss");
    }

    #[tokio::test]
    async fn non_zero_exit_reports_stderr() {
        let err = run_filter(
            "styles",
            "echo 'Error: expected ;' >&2; exit 3",
            Path::new("."),
            &PathBuf::from("style.scss"),
            b"a {".to_vec(),
        )
        .await
        .unwrap_err();
        match err {
            AssetpipeError::FilterCommand { task, message, .. } => {
                assert_eq!(task, "styles");
                assert!(message.contains("exit code 3"), "{message}");
                assert!(message.contains("expected ;"), "{message}");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }
}

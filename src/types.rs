use std::fmt;
use std::str::FromStr;

use serde::Deserialize;

/// Which pipeline shape to compose.
///
/// - `Build`: one-shot production build (image optimization enabled).
/// - `Dev`: build once, then serve and watch (plain image copy instead of
///   optimization).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    Build,
    Dev,
}

impl Mode {
    pub const ALL: [Mode; 2] = [Mode::Build, Mode::Dev];
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Mode::Build => f.write_str("build"),
            Mode::Dev => f.write_str("dev"),
        }
    }
}

impl FromStr for Mode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "build" => Ok(Mode::Build),
            "dev" => Ok(Mode::Dev),
            other => Err(format!("invalid mode: {other} (expected \"build\" or \"dev\")")),
        }
    }
}

/// The fixed registry of transforms a task can be bound to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskKind {
    /// Remove the whole build directory.
    Clean,
    /// Passthrough copy, optionally piped through a filter command.
    Copy,
    /// Parse, vendor-prefix and minify a style sheet.
    Style,
    /// Re-encode jpeg/png and strip svg noise.
    Image,
    /// Derive lossless `.webp` variants of raster images.
    Webp,
    /// Pack svg icons into a single sprite of `<symbol>`s.
    Sprite,
}

impl fmt::Display for TaskKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            TaskKind::Clean => "clean",
            TaskKind::Copy => "copy",
            TaskKind::Style => "style",
            TaskKind::Image => "image",
            TaskKind::Webp => "webp",
            TaskKind::Sprite => "sprite",
        };
        f.write_str(s)
    }
}

/// Post-action of a watch rule once its tasks have finished.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum NotifyAction {
    /// Do not notify preview clients.
    #[default]
    None,
    /// Re-request style sheets in place; no page reload.
    Inject,
    /// Full page reload.
    Reload,
}

// src/patterns.rs

//! Glob pattern sets with `!`-negation, shared by task sources, declared task
//! outputs and watch rules.
//!
//! All matching happens on forward-slash paths relative to some root (the
//! source directory for inputs and watch rules, the build directory for
//! outputs). `*` never crosses a `/`; use `**` for that.

use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use globset::{Glob, GlobBuilder, GlobSet, GlobSetBuilder};

use crate::fs::FileSystem;

/// A compiled list of include globs plus `!`-prefixed exclusions.
///
/// An exclusion also covers everything below it, so `!img/icons` excludes
/// `img/icons/logo.svg` just like `!img/icons/**` would.
#[derive(Clone)]
pub struct PatternSet {
    include: Vec<String>,
    exclude: Vec<String>,
    include_set: GlobSet,
    exclude_set: Option<GlobSet>,
}

impl fmt::Debug for PatternSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PatternSet")
            .field("include", &self.include)
            .field("exclude", &self.exclude)
            .finish_non_exhaustive()
    }
}

impl PatternSet {
    /// Compile raw patterns as written in the config.
    pub fn new<S: AsRef<str>>(patterns: &[S]) -> Result<Self> {
        let mut include = Vec::new();
        let mut exclude = Vec::new();

        for raw in patterns {
            let raw = raw.as_ref().trim();
            match raw.strip_prefix('!') {
                Some(neg) => exclude.push(normalize_pattern(neg)),
                None => include.push(normalize_pattern(raw)),
            }
        }

        let include_set = build_globset(include.iter().map(String::as_str))
            .context("building include globset")?;

        let exclude_set = if exclude.is_empty() {
            None
        } else {
            let with_children: Vec<String> = exclude
                .iter()
                .flat_map(|p| [p.clone(), format!("{}/**", p.trim_end_matches('/'))])
                .collect();
            Some(
                build_globset(with_children.iter().map(String::as_str))
                    .context("building exclude globset")?,
            )
        };

        Ok(Self {
            include,
            exclude,
            include_set,
            exclude_set,
        })
    }

    /// Include patterns (without the `!` ones).
    pub fn includes(&self) -> &[String] {
        &self.include
    }

    /// Exclusion patterns, stored without their leading `!`.
    pub fn excludes(&self) -> &[String] {
        &self.exclude
    }

    /// True if `rel_path` matches an include pattern and no exclusion.
    pub fn is_match(&self, rel_path: &str) -> bool {
        if !self.include_set.is_match(rel_path) {
            return false;
        }
        !self.is_excluded(rel_path)
    }

    /// True if `rel_path` is covered by one of the exclusions.
    pub fn is_excluded(&self, rel_path: &str) -> bool {
        self.exclude_set
            .as_ref()
            .is_some_and(|set| set.is_match(rel_path))
    }

    /// The "glob parent" of the first include pattern: the leading literal
    /// directories, used as default base for relative output paths.
    pub fn base(&self) -> String {
        self.include
            .first()
            .map(|p| glob_parent(p))
            .unwrap_or_default()
    }
}

/// Strip `./` prefixes so `./sass/*.scss` and `sass/*.scss` behave the same.
pub fn normalize_pattern(pattern: &str) -> String {
    let mut p = pattern.trim();
    while let Some(rest) = p.strip_prefix("./") {
        p = rest;
    }
    p.to_string()
}

/// Compile one glob with `*` not crossing path separators.
pub fn compile_glob(pattern: &str) -> Result<Glob> {
    GlobBuilder::new(pattern)
        .literal_separator(true)
        .build()
        .with_context(|| format!("invalid glob pattern: {pattern}"))
}

fn build_globset<'a>(patterns: impl Iterator<Item = &'a str>) -> Result<GlobSet> {
    let mut builder = GlobSetBuilder::new();
    for pat in patterns {
        builder.add(compile_glob(pat)?);
    }
    Ok(builder.build()?)
}

/// Whether a single path component contains glob syntax.
pub fn has_glob_meta(component: &str) -> bool {
    component.contains(['*', '?', '[', '{'])
}

/// Leading literal directory components of a pattern.
///
/// `sass/style.scss` → `sass`, `img/**/*.png` → `img`, `*.html` → ``.
pub fn glob_parent(pattern: &str) -> String {
    let comps: Vec<&str> = pattern.split('/').filter(|c| !c.is_empty()).collect();
    let literal_len = comps
        .iter()
        .position(|c| has_glob_meta(c))
        .unwrap_or(comps.len().saturating_sub(1));
    comps[..literal_len].join("/")
}

/// Convert `path` into a forward-slash string relative to `root`.
pub fn relative_slash(root: &Path, path: &Path) -> Option<String> {
    let rel = path.strip_prefix(root).ok()?;
    Some(rel.to_string_lossy().replace('\\', "/"))
}

/// Collect all files under `root` matching `set`, sorted by relative path.
///
/// Only the glob parents of the include patterns are walked, so a pattern
/// like `img/**/*.png` never scans `fonts/`.
pub fn collect_matching_files(
    fs: &dyn FileSystem,
    root: &Path,
    set: &PatternSet,
) -> Result<Vec<(PathBuf, String)>> {
    let mut found: BTreeMap<String, PathBuf> = BTreeMap::new();

    let mut starts: Vec<String> = set.includes().iter().map(|p| glob_parent(p)).collect();
    starts.sort();
    starts.dedup();

    for start in starts {
        let start_dir = if start.is_empty() {
            root.to_path_buf()
        } else {
            root.join(&start)
        };
        if !fs.is_dir(&start_dir) {
            continue;
        }

        let mut stack = vec![start_dir];
        while let Some(dir) = stack.pop() {
            for path in fs.read_dir(&dir)? {
                if fs.is_dir(&path) {
                    stack.push(path);
                } else if fs.is_file(&path) {
                    if let Some(rel) = relative_slash(root, &path) {
                        if set.is_match(&rel) {
                            found.insert(rel, path);
                        }
                    }
                }
            }
        }
    }

    Ok(found.into_iter().map(|(rel, abs)| (abs, rel)).collect())
}

// src/dag/outputs.rs

//! Declared task outputs and the static overlap test used at composition time.
//!
//! Two tasks of one parallel stage must never write the same path. That is
//! proven on the declared output globs only, before any file is read or
//! written. The test is conservative: when in doubt, patterns overlap.

use std::collections::BTreeSet;

use crate::patterns::{PatternSet, compile_glob, glob_parent, has_glob_meta};
use crate::transform::style::SOURCE_MAP_SUFFIX;
use crate::types::TaskKind;

/// Output file name of a sprite task without `rename`.
pub const DEFAULT_SPRITE_NAME: &str = "sprite.svg";

/// File extension a transform gives its outputs, if it changes it.
pub fn output_extension(kind: TaskKind) -> Option<&'static str> {
    match kind {
        TaskKind::Style => Some("css"),
        TaskKind::Webp => Some("webp"),
        _ => None,
    }
}

/// Join a build-relative directory and a relative path with `/`.
pub fn join_rel(dest: &str, rel: &str) -> String {
    let dest = dest.trim_matches('/');
    let dest = dest.strip_prefix("./").unwrap_or(dest);
    if dest.is_empty() || dest == "." {
        rel.to_string()
    } else {
        format!("{dest}/{rel}")
    }
}

/// Strip `base/` from the front of a source-relative path or pattern.
pub fn strip_base<'a>(rel: &'a str, base: &str) -> &'a str {
    let base = base.trim_matches('/');
    if base.is_empty() || base == "." {
        return rel;
    }
    rel.strip_prefix(base)
        .and_then(|rest| rest.strip_prefix('/'))
        .unwrap_or(rel)
}

/// Replace the extension of the last path component.
///
/// Works on plain paths and on patterns: `*.{jpg,png}` → `*.webp`.
pub fn with_extension(rel: &str, ext: &str) -> String {
    let (dir, file) = match rel.rfind('/') {
        Some(idx) => (&rel[..=idx], &rel[idx + 1..]),
        None => ("", rel),
    };
    let search_end = file.find('{').unwrap_or(file.len());
    let stem = match file[..search_end].rfind('.') {
        Some(dot) => &file[..dot],
        None => file,
    };
    format!("{dir}{stem}.{ext}")
}

/// Output globs a task declares when `outputs` is not configured.
///
/// Mirrors how the runner places files: strip `base`, change the extension
/// for style/webp, apply `rename`, prefix `dest`. Style tasks also declare the
/// source map written next to each sheet.
pub fn derive_outputs(
    kind: TaskKind,
    src: &PatternSet,
    base: &str,
    dest: &str,
    rename: Option<&str>,
) -> Vec<String> {
    match kind {
        TaskKind::Clean => return vec!["**".to_string()],
        TaskKind::Sprite => {
            return vec![join_rel(dest, rename.unwrap_or(DEFAULT_SPRITE_NAME))];
        }
        _ => {}
    }

    let with_map = |outputs: Vec<String>| -> Vec<String> {
        if kind != TaskKind::Style {
            return outputs;
        }
        outputs
            .into_iter()
            .flat_map(|o| {
                let map = format!("{o}{SOURCE_MAP_SUFFIX}");
                [o, map]
            })
            .collect()
    };

    if let Some(rename) = rename {
        return with_map(vec![join_rel(dest, rename)]);
    }

    let ext = output_extension(kind);
    let place = |pattern: &str| {
        let rel = strip_base(pattern, base);
        let last = rel.rsplit('/').next().unwrap_or(rel);
        let rel = match ext {
            Some(ext) if last.contains('.') || has_glob_meta(last) => with_extension(rel, ext),
            _ => rel.to_string(),
        };
        join_rel(dest, &rel)
    };

    let mut outputs = with_map(src.includes().iter().map(|p| place(p)).collect());
    outputs.extend(
        with_map(src.excludes().iter().map(|p| place(p)).collect())
            .into_iter()
            .map(|p| format!("!{p}")),
    );
    outputs
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Segment<'a> {
    Literal(&'a str),
    Glob(&'a str),
    AnyDepth,
}

fn segments(pattern: &str) -> Vec<Segment<'_>> {
    pattern
        .split('/')
        .filter(|c| !c.is_empty() && *c != ".")
        .map(|c| {
            if c == "**" {
                Segment::AnyDepth
            } else if has_glob_meta(c) {
                Segment::Glob(c)
            } else {
                Segment::Literal(c)
            }
        })
        .collect()
}

fn is_literal(pattern: &str) -> bool {
    segments(pattern)
        .iter()
        .all(|s| matches!(s, Segment::Literal(_)))
}

/// Extensions a single-component glob can produce, if that is knowable:
/// `*.css` → {css}, `*.{jpg,png}` → {jpg, png}; `*.css*` → unknown.
fn extension_set(component: &str) -> Option<BTreeSet<String>> {
    let search_end = component.find('{').unwrap_or(component.len());
    let dot = component[..search_end].rfind('.')?;
    let ext = &component[dot + 1..];

    if let Some(inner) = ext.strip_prefix('{').and_then(|e| e.strip_suffix('}')) {
        if inner.contains(['*', '?', '[', '{', '}']) {
            return None;
        }
        return Some(inner.split(',').map(|e| e.to_ascii_lowercase()).collect());
    }

    if has_glob_meta(ext) {
        None
    } else {
        Some(BTreeSet::from([ext.to_ascii_lowercase()]))
    }
}

fn segment_overlap(a: Segment<'_>, b: Segment<'_>) -> bool {
    match (a, b) {
        (Segment::Literal(x), Segment::Literal(y)) => x == y,
        (Segment::Literal(lit), Segment::Glob(glob)) | (Segment::Glob(glob), Segment::Literal(lit)) => {
            match compile_glob(glob) {
                Ok(g) => g.compile_matcher().is_match(lit),
                Err(_) => true,
            }
        }
        (Segment::Glob(x), Segment::Glob(y)) => match (extension_set(x), extension_set(y)) {
            (Some(ex), Some(ey)) => !ex.is_disjoint(&ey),
            _ => true,
        },
        (Segment::AnyDepth, _) | (_, Segment::AnyDepth) => true,
    }
}

fn sequence_overlap(a: &[Segment<'_>], b: &[Segment<'_>]) -> bool {
    match (a.first(), b.first()) {
        (None, None) => true,
        (Some(Segment::AnyDepth), _) => {
            sequence_overlap(&a[1..], b) || (!b.is_empty() && sequence_overlap(a, &b[1..]))
        }
        (_, Some(Segment::AnyDepth)) => {
            sequence_overlap(a, &b[1..]) || (!a.is_empty() && sequence_overlap(&a[1..], b))
        }
        (None, Some(_)) | (Some(_), None) => false,
        (Some(x), Some(y)) => segment_overlap(*x, *y) && sequence_overlap(&a[1..], &b[1..]),
    }
}

/// Whether two single output globs may describe a common path.
pub fn patterns_may_overlap(a: &str, b: &str) -> bool {
    sequence_overlap(&segments(a), &segments(b))
}

/// Whether every path `pattern` can produce is excluded by `other`.
fn covered_by_exclusion(pattern: &str, other: &PatternSet) -> bool {
    if is_literal(pattern) {
        return other.is_excluded(pattern);
    }
    let parent = glob_parent(pattern);
    !parent.is_empty() && other.is_excluded(&parent)
}

/// Find a pair of include patterns of `a` and `b` that may describe the same
/// path, returning a human-readable witness.
pub fn find_overlap(a: &PatternSet, b: &PatternSet) -> Option<String> {
    for pa in a.includes() {
        for pb in b.includes() {
            if !patterns_may_overlap(pa, pb) {
                continue;
            }
            if covered_by_exclusion(pa, b) || covered_by_exclusion(pb, a) {
                continue;
            }
            let witness = if is_literal(pa) {
                format!("'{pa}'")
            } else if is_literal(pb) {
                format!("'{pb}'")
            } else {
                format!("'{pa}' / '{pb}'")
            };
            return Some(witness);
        }
    }
    None
}

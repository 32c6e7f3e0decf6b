// src/watch/event_handler.rs

//! Turn a debounced batch of changed paths into rule triggers.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use crate::engine::RuleName;
use crate::watch::hash::ContentFilter;
use crate::watch::patterns::WatchRule;

/// Convert a path into a string relative to `root`, with forward slashes.
///
/// Falls back to canonicalized paths when the event path uses a different
/// absolute prefix for the same directory (symlinks, `/private/var` on
/// macOS). Returns `None` if the path is not below `root`.
pub fn relative_str(root: &Path, path: &Path) -> Option<String> {
    if let Some(rel) = crate::patterns::relative_slash(root, path) {
        return Some(rel);
    }
    let root_canon = root.canonicalize().ok()?;
    // The file itself may be gone; canonicalize its directory instead.
    let path_canon = match path.canonicalize() {
        Ok(p) => p,
        Err(_) => path.parent()?.canonicalize().ok()?.join(path.file_name()?),
    };
    crate::patterns::relative_slash(&root_canon, &path_canon)
}

/// Rules fired by one batch, each at most once, in declaration order.
///
/// For a path matched only by `use_hash` rules whose content did not change,
/// nothing fires. The content filter is consulted at most once per path.
pub fn rules_for_batch(
    root: &Path,
    paths: &BTreeSet<PathBuf>,
    rules: &[WatchRule],
    filter: &mut ContentFilter,
) -> Vec<RuleName> {
    let mut fired: BTreeSet<usize> = BTreeSet::new();

    for path in paths {
        let Some(rel) = relative_str(root, path) else {
            warn!(path = %path.display(), root = %root.display(), "could not relativize event path");
            continue;
        };

        let matching: Vec<usize> = rules
            .iter()
            .enumerate()
            .filter(|(_, r)| r.matches(&rel))
            .map(|(idx, _)| idx)
            .collect();
        if matching.is_empty() {
            continue;
        }

        let content_changed = if matching.iter().any(|&idx| rules[idx].use_hash()) {
            filter.changed(path)
        } else {
            true
        };

        for idx in matching {
            if rules[idx].use_hash() && !content_changed {
                debug!(rule = %rules[idx].name(), path = %rel, "content unchanged; skipping");
                continue;
            }
            debug!(rule = %rules[idx].name(), path = %rel, "path matched watch rule");
            fired.insert(idx);
        }
    }

    fired
        .into_iter()
        .map(|idx| rules[idx].name().to_string())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use crate::config::default_config;
    use crate::fs::mock::MockFileSystem;
    use crate::watch::patterns::build_rules_from_config;

    fn batch(paths: &[&str]) -> BTreeSet<PathBuf> {
        paths.iter().map(PathBuf::from).collect()
    }

    #[test]
    fn each_rule_fires_once_per_batch() {
        let rules = build_rules_from_config(&default_config().unwrap()).unwrap();
        let mut filter = ContentFilter::new(Arc::new(MockFileSystem::new()));

        let fired = rules_for_batch(
            Path::new("/site/source"),
            &batch(&[
                "/site/source/index.html",
                "/site/source/sass/a.scss",
                "/site/source/sass/blocks/b.scss",
                "/site/source/img/logo.png",
            ]),
            &rules,
            &mut filter,
        );
        assert_eq!(fired, vec!["styles", "markup"]);
    }

    #[test]
    fn paths_outside_root_are_ignored() {
        let rules = build_rules_from_config(&default_config().unwrap()).unwrap();
        let mut filter = ContentFilter::new(Arc::new(MockFileSystem::new()));
        let fired = rules_for_batch(
            Path::new("/site/source"),
            &batch(&["/elsewhere/index.html"]),
            &rules,
            &mut filter,
        );
        assert!(fired.is_empty());
    }

    #[test]
    fn hashed_rule_skips_unchanged_content() {
        use crate::config::model::WatchRuleConfig;
        use crate::types::NotifyAction;

        let fs = MockFileSystem::new();
        fs.add_file("/s/fonts/a.woff2", b"font".to_vec());
        let rule = WatchRule::from_config(
            0,
            &WatchRuleConfig {
                name: Some("fonts".to_string()),
                paths: vec!["fonts/*".to_string()],
                run: vec!["copy".to_string()],
                notify: NotifyAction::Reload,
                use_hash: true,
            },
        )
        .unwrap();
        let rules = vec![rule];
        let mut filter = ContentFilter::new(Arc::new(fs.clone()));
        filter.seed(Path::new("/s"), &rules).unwrap();

        let paths = batch(&["/s/fonts/a.woff2"]);
        assert!(rules_for_batch(Path::new("/s"), &paths, &rules, &mut filter).is_empty());

        fs.add_file("/s/fonts/a.woff2", b"font v2".to_vec());
        assert_eq!(
            rules_for_batch(Path::new("/s"), &paths, &rules, &mut filter),
            vec!["fonts"]
        );
    }
}

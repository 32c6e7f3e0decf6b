// src/transform/sprite.rs

//! Pack icon SVGs into one sprite of `<symbol>` elements.
//!
//! Each icon becomes `<symbol id="<file stem>">` carrying the icon's
//! `viewBox`; pages reference it with `<use href="sprite.svg#<stem>">`.

use std::collections::BTreeSet;
use std::sync::LazyLock;

use regex::Regex;

use super::Asset;
use super::image::optimize_svg;

static SVG_ROOT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?s)<svg\b([^>]*?)(/?)>").expect("valid svg root regex")
});
static VIEW_BOX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"\bviewBox\s*=\s*("[^"]*"|'[^']*')"#).expect("valid viewBox regex")
});

fn file_stem(rel: &str) -> &str {
    let name = rel.rsplit('/').next().unwrap_or(rel);
    name.rsplit_once('.').map(|(stem, _)| stem).unwrap_or(name)
}

/// Turn one icon into a `<symbol>`.
fn symbol(icon: &Asset) -> Result<String, String> {
    let cleaned = optimize_svg(&icon.rel, &icon.bytes)?;
    let text = String::from_utf8(cleaned).map_err(|e| format!("{}: {e}", icon.rel))?;

    let root = SVG_ROOT
        .captures(&text)
        .ok_or_else(|| format!("{}: no <svg> element", icon.rel))?;
    let whole = root.get(0).map(|m| m.range()).unwrap_or_default();
    let attrs = root.get(1).map(|m| m.as_str()).unwrap_or_default();
    let self_closing = root.get(2).is_some_and(|m| !m.as_str().is_empty());

    let inner = if self_closing {
        ""
    } else {
        let body = &text[whole.end..];
        let close = body
            .rfind("</svg>")
            .ok_or_else(|| format!("{}: unterminated <svg> element", icon.rel))?;
        &body[..close]
    };

    let id = file_stem(&icon.rel);
    let view_box = VIEW_BOX
        .captures(attrs)
        .and_then(|c| c.get(1))
        .map(|m| format!(" viewBox={}", m.as_str()))
        .unwrap_or_default();

    Ok(format!("<symbol id=\"{id}\"{view_box}>{inner}</symbol>"))
}

/// Pack `icons` (sorted by path for stable output). Duplicate stems are
/// rejected since they would produce duplicate ids.
pub fn pack(icons: &[Asset]) -> Result<Vec<u8>, String> {
    let mut sorted: Vec<&Asset> = icons.iter().collect();
    sorted.sort_by(|a, b| a.rel.cmp(&b.rel));

    let mut ids = BTreeSet::new();
    let mut out = String::from("<svg xmlns=\"http://www.w3.org/2000/svg\">");
    for icon in sorted {
        let id = file_stem(&icon.rel);
        if !ids.insert(id) {
            return Err(format!("duplicate icon id '{id}' ({})", icon.rel));
        }
        out.push_str(&symbol(icon)?);
    }
    out.push_str("</svg>");
    Ok(out.into_bytes())
}

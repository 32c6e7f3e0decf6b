// src/transform/style.rs

//! Style sheets: parse, vendor-prefix for the supported browsers and minify.
//!
//! Preprocessing (e.g. Sass) is not done here; a task's `filter` command runs
//! first and hands plain CSS to [`compile`]. An inline source map left in that
//! CSS (`sass --embed-source-map`) is folded into the map written next to the
//! output, so it points back at the original sources.

use lightningcss::stylesheet::{MinifyOptions, ParserOptions, PrinterOptions, StyleSheet};
use lightningcss::targets::{Browsers, Targets};
use parcel_sourcemap::SourceMap;

/// Suffix of the source map written next to each compiled sheet.
pub const SOURCE_MAP_SUFFIX: &str = ".map";

/// A compiled sheet and its source map.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompiledStyle {
    /// Minified CSS ending in a `sourceMappingURL` comment.
    pub css: Vec<u8>,
    /// Source map JSON (version 3).
    pub map: Vec<u8>,
}

/// Encode a browser version the way lightningcss expects it.
const fn version(major: u32, minor: u32) -> u32 {
    (major << 16) | (minor << 8)
}

/// Oldest browsers the generated CSS has to support; older engines need
/// vendor prefixes, which lightningcss adds when printing.
pub fn browser_targets() -> Targets {
    Targets::from(Browsers {
        chrome: Some(version(80, 0)),
        edge: Some(version(88, 0)),
        firefox: Some(version(78, 0)),
        safari: Some(version(12, 0)),
        ios_saf: Some(version(12, 0)),
        samsung: Some(version(12, 0)),
        ..Browsers::default()
    })
}

/// Compile one style sheet to minified, prefixed CSS.
///
/// `filename` is the source-relative input path recorded in the map;
/// `output_name` is the file name the CSS is written under, used for the
/// `sourceMappingURL` comment.
pub fn compile(filename: &str, source: &[u8], output_name: &str) -> Result<CompiledStyle, String> {
    let code = std::str::from_utf8(source)
        .map_err(|e| format!("{filename} is not valid UTF-8: {e}"))?;

    let mut source_map = SourceMap::new("/");
    let source_index = source_map.add_source(filename);
    source_map
        .set_source_content(source_index as usize, code)
        .map_err(|e| format!("{filename}: source map: {e}"))?;

    let mut sheet = StyleSheet::parse(
        code,
        ParserOptions {
            filename: filename.to_string(),
            source_index,
            ..ParserOptions::default()
        },
    )
    .map_err(|e| format!("{filename}: {e}"))?;

    let targets = browser_targets();
    sheet
        .minify(MinifyOptions {
            targets,
            ..MinifyOptions::default()
        })
        .map_err(|e| format!("{filename}: {e}"))?;

    let printed = sheet
        .to_css(PrinterOptions {
            minify: true,
            source_map: Some(&mut source_map),
            targets,
            ..PrinterOptions::default()
        })
        .map_err(|e| format!("{filename}: {e}"))?;

    if let Some(url) = sheet.source_map_url(0) {
        fold_inline_map(&mut source_map, filename, url);
    }

    let map = source_map
        .to_json(None)
        .map_err(|e| format!("{filename}: source map: {e}"))?;

    let mut css = printed.code;
    css.push_str(&format!(
        "\n/*# sourceMappingURL={output_name}{SOURCE_MAP_SUFFIX} */\n"
    ));

    Ok(CompiledStyle {
        css: css.into_bytes(),
        map: map.into_bytes(),
    })
}

/// Point `map` through an inline map left by the preprocessor. Anything other
/// than a readable `data:` URL is ignored and the map stays on the filtered CSS.
fn fold_inline_map(map: &mut SourceMap, filename: &str, url: &str) {
    if !url.starts_with("data:") {
        return;
    }
    match SourceMap::from_data_url("/", url) {
        Ok(mut input) => {
            if let Err(e) = map.extends(&mut input) {
                tracing::warn!(file = filename, error = %e, "could not fold inline source map");
            }
        }
        Err(e) => tracing::warn!(file = filename, error = %e, "unreadable inline source map"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn compile_str(css: &str) -> String {
        let out = compile("style.css", css.as_bytes(), "style.min.css").unwrap();
        String::from_utf8(out.css).unwrap()
    }

    #[test]
    fn output_is_minified() {
        let css = compile_str("a {\n  color: #ff0000;\n}\n\n/* note */\nb { margin: 0px; }\n");
        let (rules, trailer) = css.split_once('\n').unwrap();
        assert!(!rules.contains("note"));
        assert!(rules.contains("a{color:red}"));
        assert_eq!(trailer, "/*# sourceMappingURL=style.min.css.map */\n");
    }

    #[test]
    fn source_map_names_the_input() {
        let out = compile("sass/style.scss", b"a { color: red }", "style.min.css").unwrap();
        let map = SourceMap::from_json("/", std::str::from_utf8(&out.map).unwrap()).unwrap();
        let sources = map.get_sources();
        assert_eq!(sources.len(), 1);
        assert!(sources[0].ends_with("sass/style.scss"), "{sources:?}");
        assert!(!map.get_mappings().is_empty());
    }

    #[test]
    fn external_map_urls_are_left_alone() {
        let out = compile(
            "style.css",
            b"a { color: red }\n/*# sourceMappingURL=style.css.map */\n",
            "style.min.css",
        )
        .unwrap();
        let map = SourceMap::from_json("/", std::str::from_utf8(&out.map).unwrap()).unwrap();
        assert_eq!(map.get_sources().len(), 1);
    }

    #[test]
    fn old_targets_get_vendor_prefixes() {
        let css = compile_str(".box { user-select: none; }");
        assert!(css.contains("-webkit-user-select:none"), "{css}");
    }

    #[test]
    fn invalid_selector_is_rejected() {
        let err = compile("broken.css", b"a[ { color: red }", "broken.css").unwrap_err();
        assert!(err.starts_with("broken.css"));
    }

    #[test]
    fn same_input_gives_same_bytes() {
        let src = b".a { display: flex } .b { transition: all 1s }";
        assert_eq!(
            compile("s.css", src, "s.css").unwrap(),
            compile("s.css", src, "s.css").unwrap()
        );
    }
}

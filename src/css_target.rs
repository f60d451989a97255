//! cssTarget Resolution for Sveltesheet
//!
//! Stages 3 and 4: a tag carrying a `{ ...cssTarget }` style spread loses the
//! spread, and the scope attribute injected earlier is widened to include the
//! ids forwarded by the parent (`dataSveltesheetIds`).
//!
//! Both stages patch the literal text written by the injectors, so they must
//! run after `inject`.

use lazy_static::lazy_static;
use regex::{Captures, Regex};

use crate::inject::{
    COMPONENT_ATTRIBUTE_PREFIX, INHERITED_IDS_IDENT, JS_WHITESPACE, TAG_ATTRIBUTE_PREFIX,
};
use crate::scanner::find_balanced_brace_end;

lazy_static! {
    static ref CSS_TARGET_RE: Regex = Regex::new(&format!(
        r"\{{[{}]*\.\.\.[^}}]*cssTarget[^}}]*\}}",
        JS_WHITESPACE
    ))
    .unwrap();
    // Whole opening tag containing a `{ ...cssTarget }` spread
    static ref TAG_WITH_CSS_TARGET_RE: Regex = Regex::new(&format!(
        r"<[a-z][^>]*\{{[{}]*\.\.\.[^}}]*cssTarget[^}}]*\}}[^>]*>",
        JS_WHITESPACE
    ))
    .unwrap();
    static ref COMPONENT_WITH_CSS_TARGET_RE: Regex = Regex::new(&format!(
        r"<[A-Z][^>]*\{{[{}]*\.\.\.[^}}]*cssTarget[^}}]*\}}[^>]*>",
        JS_WHITESPACE
    ))
    .unwrap();
}

/// True when `text` contains a `{ ...expr }` spread mentioning `cssTarget`.
pub fn has_css_target_spread(text: &str) -> bool {
    CSS_TARGET_RE.is_match(text)
}

/// Byte ranges of every cssTarget spread the resolver stages would remove
/// from `text`, whether or not it sits in attribute position.
pub fn css_target_spread_ranges(text: &str) -> Vec<(usize, usize)> {
    CSS_TARGET_RE
        .find_iter(text)
        .map(|m| (m.start(), m.end()))
        .collect()
}

/// Remove every cssTarget spread from `tag`, together with the whitespace
/// separating it from the previous attribute.
///
/// A spread of the shorthand form `{...{cssTarget}}` is removed up to its
/// balanced closing brace so no stray `}` is left in the tag.
fn strip_css_target_spreads(tag: &str) -> String {
    let mut out = String::with_capacity(tag.len());
    let mut pos = 0;

    while let Some(m) = CSS_TARGET_RE.find_at(tag, pos) {
        let end = match find_balanced_brace_end(tag, m.start()) {
            Some(balanced) if balanced >= m.end() => balanced,
            _ => m.end(),
        };
        out.push_str(tag[pos..m.start()].trim_end());
        pos = end;
    }

    out.push_str(&tag[pos..]);
    out
}

/// Rewrite the first occurrence of `prefix` so its template literal starts
/// with the inherited ids, then drop every cssTarget spread.
fn merge_inherited_ids(tag: &str, prefix: &str) -> String {
    let merged_prefix = format!("{}${{{}}} ", prefix, INHERITED_IDS_IDENT);
    let merged = tag.replacen(prefix, &merged_prefix, 1);
    strip_css_target_spreads(&merged)
}

fn resolve_with(code: &str, pattern: &Regex, prefix: &str) -> (String, usize) {
    let mut resolved = 0;
    let out = pattern.replace_all(code, |caps: &Captures| {
        resolved += 1;
        merge_inherited_ids(&caps[0], prefix)
    });
    (out.into_owned(), resolved)
}

// ═══════════════════════════════════════════════════════════════════════════════
// STAGE 3: NATIVE ELEMENTS
// ═══════════════════════════════════════════════════════════════════════════════

/// Merge forwarded ids into lowercase tags that declare a cssTarget spread.
pub fn resolve_tag_css_target(code: &str) -> String {
    resolve_tag_css_target_counted(code).0
}

pub(crate) fn resolve_tag_css_target_counted(code: &str) -> (String, usize) {
    resolve_with(code, &TAG_WITH_CSS_TARGET_RE, TAG_ATTRIBUTE_PREFIX)
}

// ═══════════════════════════════════════════════════════════════════════════════
// STAGE 4: COMPONENTS
// ═══════════════════════════════════════════════════════════════════════════════

/// Merge forwarded ids into uppercase tags that declare a cssTarget spread.
pub fn resolve_component_css_target(code: &str) -> String {
    resolve_component_css_target_counted(code).0
}

pub(crate) fn resolve_component_css_target_counted(code: &str) -> (String, usize) {
    resolve_with(code, &COMPONENT_WITH_CSS_TARGET_RE, COMPONENT_ATTRIBUTE_PREFIX)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_has_css_target_spread() {
        assert!(has_css_target_spread("<div {...{cssTarget}}>"));
        assert!(has_css_target_spread("<div { ...props.cssTarget }>"));
        assert!(!has_css_target_spread("<div {...rest}>"));
        assert!(!has_css_target_spread("<div cssTarget={x}>"));
        assert!(has_css_target_spread("<div {\u{FEFF}...cssTarget}>"));
    }

    #[test]
    fn test_spread_ranges_include_quoted_text() {
        let text = "<div title=\"{...cssTarget} here\" {...{cssTarget}}>";
        let ranges = css_target_spread_ranges(text);
        assert_eq!(ranges.len(), 2);
        assert_eq!(&text[ranges[0].0..ranges[0].1], "{...cssTarget}");
        assert_eq!(ranges[1].0, text.find("{...{").unwrap());
    }

    #[test]
    fn test_tag_css_target_merges_and_strips() {
        let input = "<div data-sveltesheet-ids={`${svelteCssRuntimeId}`} {...{cssTarget}}>";
        assert_eq!(
            resolve_tag_css_target(input),
            "<div data-sveltesheet-ids={`${dataSveltesheetIds} ${svelteCssRuntimeId}`}>"
        );
    }

    #[test]
    fn test_tag_without_spread_untouched() {
        let input = "<div data-sveltesheet-ids={`${svelteCssRuntimeId}`} {...rest}>";
        assert_eq!(resolve_tag_css_target(input), input);
    }

    #[test]
    fn test_tag_stage_ignores_components() {
        let input = "<Foo dataSveltesheetIds={`c1 ${svelteCssRuntimeId}`} {...{cssTarget}}>";
        assert_eq!(resolve_tag_css_target(input), input);
    }

    #[test]
    fn test_component_css_target_merges_and_strips() {
        let input = "<Foo dataSveltesheetIds={`c1 ${svelteCssRuntimeId}`} { ...cssTarget }>";
        assert_eq!(
            resolve_component_css_target(input),
            "<Foo dataSveltesheetIds={`${dataSveltesheetIds} c1 ${svelteCssRuntimeId}`}>"
        );
    }

    #[test]
    fn test_spread_between_attributes_keeps_separator() {
        let input =
            "<b data-sveltesheet-ids={`${svelteCssRuntimeId}`} {...{cssTarget}} class=\"x\">";
        assert_eq!(
            resolve_tag_css_target(input),
            "<b data-sveltesheet-ids={`${dataSveltesheetIds} ${svelteCssRuntimeId}`} class=\"x\">"
        );
    }

    #[test]
    fn test_every_spread_in_tag_is_removed() {
        let input =
            "<p data-sveltesheet-ids={`${svelteCssRuntimeId}`} {...{cssTarget}} {...a.cssTarget}>";
        let (out, count) = resolve_tag_css_target_counted(input);
        assert_eq!(count, 1);
        assert!(!out.contains("cssTarget"));
        assert_eq!(out.matches("${dataSveltesheetIds} ").count(), 1);
    }

    #[test]
    fn test_dollar_in_tag_is_not_expanded() {
        let input = "<a data-sveltesheet-ids={`${svelteCssRuntimeId}`} href=\"$1\" {...{cssTarget}}>";
        let out = resolve_tag_css_target(input);
        assert!(out.contains("href=\"$1\""));
    }
}

//! Attribute Injection for Sveltesheet
//!
//! Stages 1 and 2 of the preprocessor: every native opening tag receives a
//! `data-sveltesheet-ids` binding, every component opening tag receives a
//! `dataSveltesheetIds` binding carrying its instance id.

use lazy_static::lazy_static;
use regex::Regex;

use crate::InstanceIds;

// ═══════════════════════════════════════════════════════════════════════════════
// EMITTED SHAPES
// ═══════════════════════════════════════════════════════════════════════════════

/// Free variable holding the scope id of the current render.
pub const RUNTIME_ID_IDENT: &str = "svelteCssRuntimeId";

/// Free variable holding the scope ids forwarded by a parent through `cssTarget`.
pub const INHERITED_IDS_IDENT: &str = "dataSveltesheetIds";

/// Attribute name bound on native elements.
pub const TAG_ATTRIBUTE_NAME: &str = "data-sveltesheet-ids";

/// Attribute name bound on components.
pub const COMPONENT_ATTRIBUTE_NAME: &str = "dataSveltesheetIds";

/// Text opening the template literal of the native element attribute.
pub const TAG_ATTRIBUTE_PREFIX: &str = "data-sveltesheet-ids={`";

/// Text opening the template literal of the component attribute.
pub const COMPONENT_ATTRIBUTE_PREFIX: &str = "dataSveltesheetIds={`";

/// Full attribute appended to native elements.
pub const TAG_ATTRIBUTE: &str = "data-sveltesheet-ids={`${svelteCssRuntimeId}`}";

/// Native tags that never receive a scope attribute.
const SKIPPED_TAGS: &[&str] = &["<script", "<style"];

/// Regex class body for ECMAScript `\s`. Rust's `\s` also matches U+0085
/// and misses U+FEFF, which would shift where attributes land.
pub(crate) const JS_WHITESPACE: &str =
    r"\t\n\x0B\f\r \xA0\x{1680}\x{2000}-\x{200A}\x{2028}\x{2029}\x{202F}\x{205F}\x{3000}\x{FEFF}";

lazy_static! {
    static ref LOWERCASE_TAG_RE: Regex =
        Regex::new(&format!(r"<[a-z][^/>{}]*", JS_WHITESPACE)).unwrap();
    static ref UPPERCASE_TAG_RE: Regex =
        Regex::new(&format!(r"<[A-Z][^/>{}]*", JS_WHITESPACE)).unwrap();
}

pub(crate) fn is_js_whitespace(c: char) -> bool {
    matches!(
        c,
        '\t' | '\n'
            | '\u{0B}'
            | '\u{0C}'
            | '\r'
            | ' '
            | '\u{A0}'
            | '\u{1680}'
            | '\u{2000}'..='\u{200A}'
            | '\u{2028}'
            | '\u{2029}'
            | '\u{202F}'
            | '\u{205F}'
            | '\u{3000}'
            | '\u{FEFF}'
    )
}

/// Build the attribute appended to a component tag.
pub fn component_attribute(instance_id: &str) -> String {
    format!(
        "{}{} ${{{}}}`}}",
        COMPONENT_ATTRIBUTE_PREFIX, instance_id, RUNTIME_ID_IDENT
    )
}

// ═══════════════════════════════════════════════════════════════════════════════
// TAG OPENINGS
// ═══════════════════════════════════════════════════════════════════════════════

/// Byte ranges of every `<name` opening matched by `pattern` that is directly
/// followed by whitespace or `>`.
///
/// The tag name class excludes whitespace, `/` and `>`, so when the character
/// after a greedy match is anything else no shorter prefix can qualify either.
/// The search then resumes one byte past the `<`, leaving the rest of the
/// candidate open for a later match.
fn find_tag_openings(code: &str, pattern: &Regex) -> Vec<(usize, usize)> {
    let mut openings = Vec::new();
    let mut pos = 0;

    while let Some(m) = pattern.find_at(code, pos) {
        let terminated = code[m.end()..]
            .chars()
            .next()
            .map(|c| is_js_whitespace(c) || c == '>')
            .unwrap_or(false);

        if terminated {
            openings.push((m.start(), m.end()));
            pos = m.end();
        } else {
            // `<` is one byte wide
            pos = m.start() + 1;
        }
    }

    openings
}

/// Rebuild `code`, passing each accepted opening through `rewrite`.
fn rewrite_openings<F>(code: &str, pattern: &Regex, mut rewrite: F) -> (String, usize)
where
    F: FnMut(&str) -> Option<String>,
{
    let mut out = String::with_capacity(code.len());
    let mut last = 0;
    let mut rewritten = 0;

    for (start, end) in find_tag_openings(code, pattern) {
        let opening = &code[start..end];
        out.push_str(&code[last..start]);
        match rewrite(opening) {
            Some(replacement) => {
                out.push_str(&replacement);
                rewritten += 1;
            }
            None => out.push_str(opening),
        }
        last = end;
    }

    out.push_str(&code[last..]);
    (out, rewritten)
}

// ═══════════════════════════════════════════════════════════════════════════════
// STAGE 1: NATIVE ELEMENTS
// ═══════════════════════════════════════════════════════════════════════════════

/// Append the scope attribute to every lowercase opening tag except
/// `<script` and `<style`.
pub fn inject_tag_attributes(code: &str) -> String {
    inject_tag_attributes_counted(code).0
}

pub(crate) fn inject_tag_attributes_counted(code: &str) -> (String, usize) {
    rewrite_openings(code, &LOWERCASE_TAG_RE, |tag| {
        if SKIPPED_TAGS.contains(&tag) {
            None
        } else {
            Some(format!("{} {}", tag, TAG_ATTRIBUTE))
        }
    })
}

// ═══════════════════════════════════════════════════════════════════════════════
// STAGE 2: COMPONENTS
// ═══════════════════════════════════════════════════════════════════════════════

/// Append the instance-scoped attribute to every uppercase opening tag.
/// Components missing from `instance_ids` get an empty instance id.
pub fn inject_component_attributes(code: &str, instance_ids: &InstanceIds) -> String {
    inject_component_attributes_counted(code, instance_ids).0
}

pub(crate) fn inject_component_attributes_counted(
    code: &str,
    instance_ids: &InstanceIds,
) -> (String, usize) {
    rewrite_openings(code, &UPPERCASE_TAG_RE, |component| {
        let name = &component[1..];
        let instance_id = instance_ids.get(name).map(String::as_str).unwrap_or("");
        Some(format!("{} {}", component, component_attribute(instance_id)))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_component_attribute_shape() {
        assert_eq!(
            component_attribute("c1"),
            "dataSveltesheetIds={`c1 ${svelteCssRuntimeId}`}"
        );
        assert_eq!(
            component_attribute(""),
            "dataSveltesheetIds={` ${svelteCssRuntimeId}`}"
        );
    }

    #[test]
    fn test_tag_attribute_matches_prefix() {
        assert!(TAG_ATTRIBUTE.starts_with(TAG_ATTRIBUTE_PREFIX));
        assert!(TAG_ATTRIBUTE.starts_with(TAG_ATTRIBUTE_NAME));
        assert!(TAG_ATTRIBUTE.contains(RUNTIME_ID_IDENT));
        assert!(COMPONENT_ATTRIBUTE_PREFIX.starts_with(COMPONENT_ATTRIBUTE_NAME));
        assert_eq!(COMPONENT_ATTRIBUTE_NAME, INHERITED_IDS_IDENT);
    }

    #[test]
    fn test_find_openings_requires_terminator() {
        let code = "<div><span/><p";
        let openings = find_tag_openings(code, &LOWERCASE_TAG_RE);
        assert_eq!(openings, vec![(0, 4)]);
    }

    #[test]
    fn test_find_openings_resumes_inside_rejected_candidate() {
        // `<a<b/` is rejected as a whole, `<b/` is rejected too, `<c>` survives
        let code = "<a<b/ <c>";
        let openings = find_tag_openings(code, &LOWERCASE_TAG_RE);
        assert_eq!(openings, vec![(6, 8)]);
    }

    #[test]
    fn test_byte_order_mark_terminates_tag_name() {
        let out = inject_tag_attributes("<div\u{FEFF}>");
        assert_eq!(out, "<div data-sveltesheet-ids={`${svelteCssRuntimeId}`}\u{FEFF}>");
    }

    #[test]
    fn test_next_line_belongs_to_tag_name() {
        // U+0085 is not whitespace for the framework's compiler
        let out = inject_tag_attributes("<div\u{85}>");
        assert_eq!(out, "<div\u{85} data-sveltesheet-ids={`${svelteCssRuntimeId}`}>");
        assert!(!is_js_whitespace('\u{85}'));
        assert!(is_js_whitespace('\u{2003}'));
    }

    #[test]
    fn test_find_openings_multibyte_text() {
        let code = "é<div>ü<span >";
        let openings = find_tag_openings(code, &LOWERCASE_TAG_RE);
        assert_eq!(openings.len(), 2);
        assert_eq!(&code[openings[0].0..openings[0].1], "<div");
        assert_eq!(&code[openings[1].0..openings[1].1], "<span");
    }
}

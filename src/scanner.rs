//! Tag Scanner for Sveltesheet
//!
//! A minimal tag-aware lexer over template source. It recognizes opening
//! tags, walks their attribute span with brace, quote and template-literal
//! tracking, and records the spreads it meets. The rewriting stages stay
//! pattern based; the scanner feeds strict validation and reporting.

use serde::{Deserialize, Serialize};

use crate::inject::is_js_whitespace;
use crate::validate::SourceLocation;

// ═══════════════════════════════════════════════════════════════════════════════
// TYPES
// ═══════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum TagKind {
    /// Lowercase name, a native HTML element
    Element,
    /// Uppercase name, a sub-component
    Component,
}

/// A `{ ...expr }` group found at the top level of a tag's attributes.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct SpreadSpan {
    pub start: usize,
    pub end: usize,
    /// Expression text after the `...`
    pub expression: String,
    pub nested_braces: bool,
    pub mentions_css_target: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TagSpan {
    pub name: String,
    pub kind: TagKind,
    pub start: usize,
    /// Byte offset just past the closing `>`, or the end of input when unclosed
    pub end: usize,
    pub location: SourceLocation,
    pub closed: bool,
    pub self_closing: bool,
    pub multiline: bool,
    /// A `>` appears inside one of the tag's brace expressions
    pub angle_in_braces: bool,
    /// A `>` appears inside a quoted attribute value
    pub angle_in_quotes: bool,
    pub spreads: Vec<SpreadSpan>,
}

impl TagSpan {
    pub fn text<'a>(&self, source: &'a str) -> &'a str {
        &source[self.start..self.end]
    }

    pub fn has_css_target_spread(&self) -> bool {
        self.spreads.iter().any(|s| s.mentions_css_target)
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// BRACE MATCHING
// ═══════════════════════════════════════════════════════════════════════════════

/// Find the end of a balanced brace expression starting at byte `start`,
/// skipping over strings and template literals.
/// Returns the byte offset after the closing brace, or None if unbalanced.
pub fn find_balanced_brace_end(source: &str, start: usize) -> Option<usize> {
    let bytes = source.as_bytes();
    if bytes.get(start) != Some(&b'{') {
        return None;
    }

    let mut depth = 0usize;
    let mut i = start;
    let mut in_string: Option<u8> = None;
    let mut in_template_literal = false;
    let mut template_brace_depth = 0usize;

    // Only ASCII delimiters are inspected, so byte-wise stepping never
    // splits a multi-byte character at a delimiter position.
    while i < bytes.len() {
        let c = bytes[i];

        if c == b'\\' && i + 1 < bytes.len() {
            i += 2;
            continue;
        }

        if let Some(quote) = in_string {
            if c == quote {
                in_string = None;
            }
            i += 1;
            continue;
        }

        if in_template_literal {
            if c == b'`' && template_brace_depth == 0 {
                in_template_literal = false;
            } else if c == b'$' && bytes.get(i + 1) == Some(&b'{') {
                template_brace_depth += 1;
                i += 2;
                continue;
            } else if c == b'}' && template_brace_depth > 0 {
                template_brace_depth -= 1;
            }
            i += 1;
            continue;
        }

        match c {
            b'"' | b'\'' => in_string = Some(c),
            b'`' => in_template_literal = true,
            b'{' => depth += 1,
            b'}' => {
                depth -= 1;
                if depth == 0 {
                    return Some(i + 1);
                }
            }
            _ => {}
        }

        i += 1;
    }

    None
}

// ═══════════════════════════════════════════════════════════════════════════════
// SCANNING
// ═══════════════════════════════════════════════════════════════════════════════

fn is_name_terminator(c: char) -> bool {
    is_js_whitespace(c) || c == '/' || c == '>'
}

fn location_at(source: &str, offset: usize) -> SourceLocation {
    let before = &source[..offset];
    let line = before.matches('\n').count() as u32 + 1;
    let line_start = before.rfind('\n').map(|i| i + 1).unwrap_or(0);
    let column = source[line_start..offset].chars().count() as u32 + 1;
    SourceLocation { line, column }
}

fn spread_at(source: &str, start: usize, end: usize, nested_braces: bool) -> Option<SpreadSpan> {
    let inner = source[start + 1..end - 1].trim_start();
    let expression = inner.strip_prefix("...")?;
    Some(SpreadSpan {
        start,
        end,
        expression: expression.trim().to_string(),
        nested_braces,
        mentions_css_target: expression.contains("cssTarget"),
    })
}

/// Scan a single opening tag whose `<` sits at `start`.
fn scan_tag(source: &str, start: usize) -> Option<TagSpan> {
    let bytes = source.as_bytes();
    let first = *bytes.get(start + 1)?;
    let kind = if first.is_ascii_lowercase() {
        TagKind::Element
    } else if first.is_ascii_uppercase() {
        TagKind::Component
    } else {
        return None;
    };

    let mut i = source[start + 1..]
        .find(is_name_terminator)
        .map(|n| start + 1 + n)
        .unwrap_or(bytes.len());
    let name = source[start + 1..i].to_string();

    let mut tag = TagSpan {
        name,
        kind,
        start,
        end: bytes.len(),
        location: location_at(source, start),
        closed: false,
        self_closing: false,
        multiline: false,
        angle_in_braces: false,
        angle_in_quotes: false,
        spreads: Vec::new(),
    };

    let mut in_string: Option<u8> = None;
    while i < bytes.len() {
        let c = bytes[i];

        if c == b'\n' {
            tag.multiline = true;
        }

        if let Some(quote) = in_string {
            if c == quote {
                in_string = None;
            } else if c == b'>' {
                tag.angle_in_quotes = true;
            }
            i += 1;
            continue;
        }

        match c {
            b'"' | b'\'' => in_string = Some(c),
            b'{' => {
                let Some(end) = find_balanced_brace_end(source, i) else {
                    // Unbalanced: the tag runs to the end of input
                    tag.multiline |= source[i..].contains('\n');
                    return Some(tag);
                };
                let group = &source[i..end];
                tag.multiline |= group.contains('\n');
                tag.angle_in_braces |= group.contains('>');
                let nested = group[1..group.len() - 1].contains('{');
                if let Some(spread) = spread_at(source, i, end, nested) {
                    tag.spreads.push(spread);
                }
                i = end;
                continue;
            }
            b'>' => {
                tag.closed = true;
                tag.self_closing = i > start && bytes[i - 1] == b'/';
                tag.end = i + 1;
                return Some(tag);
            }
            _ => {}
        }

        i += 1;
    }

    Some(tag)
}

/// Scan every opening tag in `source`, in order of appearance.
///
/// Closing tags, comments and `<` followed by a non-letter are skipped.
/// Text between tags is not interpreted, so a `<x` inside a text brace
/// expression is reported as a tag like the rewriting stages would see it.
pub fn scan_tags(source: &str) -> Vec<TagSpan> {
    let bytes = source.as_bytes();
    let mut tags = Vec::new();
    let mut i = 0;

    while i < bytes.len() {
        if bytes[i] == b'<' {
            if let Some(tag) = scan_tag(source, i) {
                i = tag.end.max(i + 1);
                tags.push(tag);
                continue;
            }
        }
        i += 1;
    }

    tags
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_find_balanced_brace() {
        assert_eq!(find_balanced_brace_end("{hello}", 0), Some(7));
        assert_eq!(find_balanced_brace_end("{a + b}", 0), Some(7));
        assert_eq!(find_balanced_brace_end("{obj.map(x => x)}", 0), Some(17));
        assert_eq!(
            find_balanced_brace_end("{'string with { brace'}", 0),
            Some(23)
        );
        assert_eq!(find_balanced_brace_end("{`a ${b} c`}", 0), Some(12));
        assert_eq!(find_balanced_brace_end("{...{cssTarget}}", 0), Some(16));
        assert_eq!(find_balanced_brace_end("{unclosed", 0), None);
        assert_eq!(find_balanced_brace_end("x{}", 0), None);
    }

    #[test]
    fn test_scan_simple_tags() {
        let tags = scan_tags("<div class=\"a\"><Foo /></div>");
        assert_eq!(tags.len(), 2);
        assert_eq!(tags[0].name, "div");
        assert_eq!(tags[0].kind, TagKind::Element);
        assert!(tags[0].closed);
        assert_eq!(tags[1].name, "Foo");
        assert_eq!(tags[1].kind, TagKind::Component);
        assert!(tags[1].self_closing);
    }

    #[test]
    fn test_scan_skips_closing_and_comments() {
        let tags = scan_tags("<!-- <p> --></span>< b>");
        // The comment body still contains `<p>`, which the rewriting stages also see
        assert_eq!(tags.len(), 1);
        assert_eq!(tags[0].name, "p");
    }

    #[test]
    fn test_scan_records_spreads() {
        let source = "<div {...rest} { ...{cssTarget} } on:click={() => go()}>";
        let tags = scan_tags(source);
        assert_eq!(tags.len(), 1);
        let tag = &tags[0];
        assert_eq!(tag.spreads.len(), 2);
        assert_eq!(tag.spreads[0].expression, "rest");
        assert!(!tag.spreads[0].mentions_css_target);
        assert!(tag.spreads[1].mentions_css_target);
        assert!(tag.spreads[1].nested_braces);
        assert!(tag.angle_in_braces);
        assert_eq!(tag.text(source), source);
    }

    #[test]
    fn test_scan_multiline_and_location() {
        let source = "<p>\n  <Card\n    {...cssTarget}>";
        let tags = scan_tags(source);
        assert_eq!(tags.len(), 2);
        assert!(!tags[0].multiline);
        assert_eq!(tags[1].location, SourceLocation { line: 2, column: 3 });
        assert!(tags[1].multiline);
        assert!(tags[1].has_css_target_spread());
    }

    #[test]
    fn test_scan_quoted_angle_does_not_close() {
        let source = "<a title=\"x > y\" href=\"/\">";
        let tags = scan_tags(source);
        assert_eq!(tags[0].end, source.len());
        assert!(tags[0].angle_in_quotes);
        assert!(!tags[0].angle_in_braces);
    }

    #[test]
    fn test_scan_name_stops_at_js_whitespace() {
        let tags = scan_tags("<Card\u{FEFF}{...cssTarget}><b\u{85}>");
        assert_eq!(tags[0].name, "Card");
        assert!(tags[0].has_css_target_spread());
        assert_eq!(tags[1].name, "b\u{85}");
    }
}

#[cfg(feature = "napi")]
use napi_derive::napi;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::css_target::css_target_spread_ranges;
use crate::inject::{COMPONENT_ATTRIBUTE_NAME, TAG_ATTRIBUTE_NAME};
use crate::scanner::{scan_tags, TagKind, TagSpan};
use crate::InstanceIds;

// ═══════════════════════════════════════════════════════════════════════════════
// DIAGNOSTIC CODES
// ═══════════════════════════════════════════════════════════════════════════════

pub const ERR_RESERVED_ATTRIBUTE: &str = "SVS001";
pub const ERR_NESTED_CSS_TARGET: &str = "SVS002";
pub const ERR_ANGLE_IN_CSS_TARGET_TAG: &str = "SVS003";
pub const ERR_MULTILINE_CSS_TARGET_TAG: &str = "SVS004";
pub const ERR_UNKNOWN_COMPONENT_INSTANCE: &str = "SVS005";
pub const ERR_STRAY_CSS_TARGET: &str = "SVS006";

fn get_guarantee(code: &str) -> &'static str {
    match code {
        ERR_RESERVED_ATTRIBUTE => "Every tag receives exactly one scope attribute.",
        ERR_NESTED_CSS_TARGET => "A cssTarget spread is removed entirely from its tag.",
        ERR_ANGLE_IN_CSS_TARGET_TAG => {
            "A tag carrying a cssTarget spread is rewritten as a whole."
        }
        ERR_MULTILINE_CSS_TARGET_TAG => {
            "A tag carrying a cssTarget spread is rewritten as a whole."
        }
        ERR_UNKNOWN_COMPONENT_INSTANCE => {
            "Every component instance is scoped by its own instance id."
        }
        ERR_STRAY_CSS_TARGET => "Attribute values and expressions reach the output unchanged.",
        _ => "Unknown invariant.",
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// COMPILER ERROR
// ═══════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq, Eq)]
#[cfg_attr(feature = "napi", napi(object))]
#[serde(rename_all = "camelCase")]
pub struct SourceLocation {
    pub line: u32,
    pub column: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "napi", napi(object))]
#[serde(rename_all = "camelCase")]
pub struct CompilerError {
    pub code: String,
    pub error_type: String,
    pub message: String,
    pub guarantee: String,
    pub file: String,
    pub line: u32,
    pub column: u32,
    pub context: Option<String>,
    pub hints: Vec<String>,
}

impl CompilerError {
    pub fn new(code: &str, message: &str, file: &str, line: u32, column: u32) -> Self {
        Self::with_details(code, message, file, line, column, None, vec![])
    }

    pub fn with_details(
        code: &str,
        message: &str,
        file: &str,
        line: u32,
        column: u32,
        context: Option<String>,
        hints: Vec<String>,
    ) -> Self {
        CompilerError {
            code: code.to_string(),
            error_type: "UNSUPPORTED_TAG_SHAPE".to_string(),
            message: message.to_string(),
            guarantee: get_guarantee(code).to_string(),
            file: file.to_string(),
            line,
            column,
            context,
            hints,
        }
    }

    fn at_tag(code: &str, message: String, file: &str, tag: &TagSpan, source: &str) -> Self {
        Self::with_details(
            code,
            &message,
            file,
            tag.location.line,
            tag.location.column,
            Some(tag.text(source).to_string()),
            vec![],
        )
    }

    fn hint(mut self, hint: &str) -> Self {
        self.hints.push(hint.to_string());
        self
    }
}

impl fmt::Display for CompilerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{}] {} ({}:{}:{})",
            self.code, self.message, self.file, self.line, self.column
        )
    }
}

impl std::error::Error for CompilerError {}

// ═══════════════════════════════════════════════════════════════════════════════
// VALIDATION
// ═══════════════════════════════════════════════════════════════════════════════

/// `{cssTarget}` object shorthand, the one nested form the resolver removes cleanly.
fn is_shorthand_css_target(expression: &str) -> bool {
    let compact: String = expression.chars().filter(|c| !c.is_whitespace()).collect();
    compact == "{cssTarget}"
}

fn check_tag(
    tag: &TagSpan,
    source: &str,
    instance_ids: &InstanceIds,
    file: &str,
    errors: &mut Vec<CompilerError>,
) {
    let text = tag.text(source);

    let reserved = match tag.kind {
        TagKind::Element => TAG_ATTRIBUTE_NAME,
        TagKind::Component => COMPONENT_ATTRIBUTE_NAME,
    };
    if text.contains(&format!("{}=", reserved)) {
        errors.push(
            CompilerError::at_tag(
                ERR_RESERVED_ATTRIBUTE,
                format!("<{}> already carries the reserved attribute `{}`.", tag.name, reserved),
                file,
                tag,
                source,
            )
            .hint("The preprocessor must run exactly once per source."),
        );
    }

    if tag.kind == TagKind::Component && !instance_ids.contains_key(&tag.name) {
        errors.push(CompilerError::at_tag(
            ERR_UNKNOWN_COMPONENT_INSTANCE,
            format!("Component <{}> has no instance id.", tag.name),
            file,
            tag,
            source,
        ));
    }

    // The resolver patterns also match spread text inside quoted values and
    // inside ordinary brace expressions
    let stray = css_target_spread_ranges(text).into_iter().find(|&(offset, _)| {
        let at = tag.start + offset;
        !tag
            .spreads
            .iter()
            .any(|s| s.mentions_css_target && s.start <= at && at < s.end)
    });
    if let Some((from, to)) = stray {
        errors.push(
            CompilerError::at_tag(
                ERR_STRAY_CSS_TARGET,
                format!(
                    "<{}> contains `{}` outside an attribute spread; it would be removed.",
                    tag.name,
                    &text[from..to]
                ),
                file,
                tag,
                source,
            )
            .hint("Rename the text or move it out of the tag."),
        );
    }

    if !tag.has_css_target_spread() {
        return;
    }

    if let Some(spread) = tag
        .spreads
        .iter()
        .find(|s| s.mentions_css_target && s.nested_braces && !is_shorthand_css_target(&s.expression))
    {
        errors.push(
            CompilerError::at_tag(
                ERR_NESTED_CSS_TARGET,
                format!(
                    "cssTarget spread `{{...{}}}` on <{}> contains nested braces.",
                    spread.expression, tag.name
                ),
                file,
                tag,
                source,
            )
            .hint("Bind the object to a variable and spread that instead."),
        );
    }

    if tag.angle_in_braces || tag.angle_in_quotes {
        let place = if tag.angle_in_braces {
            "an expression"
        } else {
            "a quoted value"
        };
        errors.push(
            CompilerError::at_tag(
                ERR_ANGLE_IN_CSS_TARGET_TAG,
                format!(
                    "<{}> carries a cssTarget spread and {} containing `>`.",
                    tag.name, place
                ),
                file,
                tag,
                source,
            )
            .hint("Move arrow functions and comparisons out of this tag's attributes."),
        );
    }

    if tag.multiline {
        errors.push(CompilerError::at_tag(
            ERR_MULTILINE_CSS_TARGET_TAG,
            format!("<{}> carries a cssTarget spread and spans several lines.", tag.name),
            file,
            tag,
            source,
        ));
    }
}

/// Report every tag whose shape the rewriting stages cannot handle faithfully.
///
/// `<script` and `<style` are exempt: their tags are never rewritten.
pub fn validate_source(
    source: &str,
    instance_ids: &InstanceIds,
    file: &str,
) -> Vec<CompilerError> {
    let mut errors = Vec::new();

    for tag in scan_tags(source) {
        if tag.name == "script" || tag.name == "style" {
            continue;
        }
        check_tag(&tag, source, instance_ids, file, &mut errors);
    }

    errors
}

//! # Sveltesheet Native Preprocessor
//!
//! Injects scoped-styling attributes into component markup before it reaches
//! the Svelte compiler, so the sveltesheet runtime can match CSS rules to the
//! element instances that rendered them.
//!
//! ## Pipeline
//!
//! Four textual stages, each consuming the previous stage's output:
//!
//! 1. Native elements get `` data-sveltesheet-ids={`${svelteCssRuntimeId}`} ``
//!    (`<script` and `<style` excluded).
//! 2. Components get `` dataSveltesheetIds={`<instanceId> ${svelteCssRuntimeId}`} ``.
//! 3. Native elements with a `{ ...cssTarget }` spread drop the spread and
//!    prefix their attribute with `${dataSveltesheetIds} `.
//! 4. Same as 3 for components.
//!
//! `svelteCssRuntimeId` and `dataSveltesheetIds` are free variables bound by
//! the surrounding generated module.
//!
//! The pipeline is total: malformed markup yields best-effort output. Strict
//! mode (`PreprocessOptions::strict`) scans tags first and rejects the shapes
//! the stages are known to mishandle.

#[cfg(feature = "napi")]
use napi_derive::napi;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

mod css_target;
mod inject;
mod scanner;
mod validate;


pub use css_target::{has_css_target_spread, resolve_component_css_target, resolve_tag_css_target};
pub use inject::{
    component_attribute, inject_component_attributes, inject_tag_attributes,
    COMPONENT_ATTRIBUTE_NAME, COMPONENT_ATTRIBUTE_PREFIX, INHERITED_IDS_IDENT, RUNTIME_ID_IDENT,
    TAG_ATTRIBUTE, TAG_ATTRIBUTE_NAME, TAG_ATTRIBUTE_PREFIX,
};
pub use scanner::{find_balanced_brace_end, scan_tags, SpreadSpan, TagKind, TagSpan};
pub use validate::*;

/// Component tag name (as written in markup) to instance id.
pub type InstanceIds = HashMap<String, String>;

// ═══════════════════════════════════════════════════════════════════════════════
// OPTIONS & RESULT
// ═══════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PreprocessOptions {
    /// Reject tag shapes the rewriting stages cannot handle instead of
    /// producing best-effort output
    pub strict: bool,
    /// Used in diagnostics only
    pub file_path: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "napi", napi(object))]
#[serde(rename_all = "camelCase")]
pub struct PreprocessResult {
    pub code: String,
    pub tags_scoped: u32,
    pub components_scoped: u32,
    pub css_targets_resolved: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PreprocessInput {
    pub file_path: String,
    pub code: String,
    #[serde(default)]
    pub instance_ids: InstanceIds,
}

// ═══════════════════════════════════════════════════════════════════════════════
// ENTRY POINTS
// ═══════════════════════════════════════════════════════════════════════════════

fn run_pipeline(code: &str, instance_ids: &InstanceIds) -> PreprocessResult {
    let (code, tags_scoped) = inject::inject_tag_attributes_counted(code);
    let (code, components_scoped) =
        inject::inject_component_attributes_counted(&code, instance_ids);
    let (code, tag_targets) = css_target::resolve_tag_css_target_counted(&code);
    let (code, component_targets) = css_target::resolve_component_css_target_counted(&code);

    PreprocessResult {
        code,
        tags_scoped: tags_scoped as u32,
        components_scoped: components_scoped as u32,
        css_targets_resolved: (tag_targets + component_targets) as u32,
    }
}

/// Scope every tag in `code`. Never fails; unmatched input passes through.
pub fn add_attributes_to_tags(code: &str, instance_ids: &InstanceIds) -> String {
    run_pipeline(code, instance_ids).code
}

/// Scope every tag in `code`, validating tag shapes first when
/// `options.strict` is set. The first diagnostic becomes the error.
pub fn preprocess(
    code: &str,
    instance_ids: &InstanceIds,
    options: &PreprocessOptions,
) -> Result<PreprocessResult, CompilerError> {
    if options.strict {
        let mut errors = validate_source(code, instance_ids, &options.file_path);
        for err in &errors {
            log::warn!("[Sveltesheet] {}", err);
        }
        if !errors.is_empty() {
            return Err(errors.swap_remove(0));
        }
    }

    let result = run_pipeline(code, instance_ids);
    log::debug!(
        "[Sveltesheet] {}: scoped {} tags, {} components, resolved {} cssTargets",
        options.file_path,
        result.tags_scoped,
        result.components_scoped,
        result.css_targets_resolved
    );
    Ok(result)
}

/// Preprocess many sources in parallel. Results keep the input order.
pub fn preprocess_batch(
    inputs: &[PreprocessInput],
    options: &PreprocessOptions,
) -> Vec<Result<PreprocessResult, CompilerError>> {
    inputs
        .par_iter()
        .map(|input| {
            let file_options = PreprocessOptions {
                file_path: input.file_path.clone(),
                ..options.clone()
            };
            preprocess(&input.code, &input.instance_ids, &file_options)
        })
        .collect()
}

// ═══════════════════════════════════════════════════════════════════════════════
// NAPI
// ═══════════════════════════════════════════════════════════════════════════════

#[cfg(feature = "napi")]
fn parse_instance_ids(instance_ids_json: &str) -> napi::Result<InstanceIds> {
    if instance_ids_json.trim().is_empty() {
        return Ok(InstanceIds::new());
    }
    serde_json::from_str(instance_ids_json)
        .map_err(|e| napi::Error::from_reason(format!("Invalid instance ids: {}", e)))
}

#[cfg(feature = "napi")]
fn parse_options(options_json: &str) -> napi::Result<PreprocessOptions> {
    if options_json.trim().is_empty() {
        return Ok(PreprocessOptions::default());
    }
    serde_json::from_str(options_json)
        .map_err(|e| napi::Error::from_reason(format!("Invalid options: {}", e)))
}

#[cfg(feature = "napi")]
#[napi]
pub fn add_attributes_to_tags_native(code: String, instance_ids_json: String) -> napi::Result<String> {
    let instance_ids = parse_instance_ids(&instance_ids_json)?;
    Ok(add_attributes_to_tags(&code, &instance_ids))
}

#[cfg(feature = "napi")]
#[napi]
pub fn preprocess_native(
    code: String,
    instance_ids_json: String,
    options_json: String,
) -> napi::Result<PreprocessResult> {
    let instance_ids = parse_instance_ids(&instance_ids_json)?;
    let options = parse_options(&options_json)?;
    preprocess(&code, &instance_ids, &options).map_err(|e| napi::Error::from_reason(e.to_string()))
}

#[cfg(feature = "napi")]
#[napi]
pub fn preprocess_batch_native(inputs_json: String, options_json: String) -> napi::Result<String> {
    let inputs: Vec<PreprocessInput> = serde_json::from_str(&inputs_json)
        .map_err(|e| napi::Error::from_reason(format!("Invalid inputs: {}", e)))?;
    let options = parse_options(&options_json)?;

    let results: Vec<serde_json::Value> = preprocess_batch(&inputs, &options)
        .into_iter()
        .map(|r| match r {
            Ok(result) => serde_json::json!({ "ok": result }),
            Err(err) => serde_json::json!({ "error": err }),
        })
        .collect();

    serde_json::to_string(&results).map_err(|e| napi::Error::from_reason(e.to_string()))
}

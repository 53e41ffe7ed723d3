//! Argument parsing and formatting helpers for the `pdfsign` binary.

use anyhow::{anyhow, Context, Result};
use pdfsign_core::models::{annotation_type, annotation_types, AnnotationRow, PlacementData};
use pdfsign_worker::OrchestratorStatus;

/// Truncate to `max_len` characters, appending "..." if truncated.
pub fn truncate_description(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else {
        let kept: String = s.chars().take(max_len.saturating_sub(3)).collect();
        format!("{}...", kept)
    }
}

/// Parse `<type>=<value>` or `<type>@<organization number>=<value>`.
///
/// `<type>` is a registry key or a German or English type name.
pub fn parse_annotation(arg: &str) -> Result<AnnotationRow> {
    let (kind, value) = arg
        .split_once('=')
        .ok_or_else(|| anyhow!("Annotation must look like <type>=<value>: {}", arg))?;
    let (kind, organization) = match kind.split_once('@') {
        Some((kind, organization)) => (kind.trim(), Some(organization.trim())),
        None => (kind.trim(), None),
    };

    let registered = annotation_type(kind)
        .or_else(|| {
            annotation_types().iter().find(|t| {
                t.name.de.eq_ignore_ascii_case(kind) || t.name.en.eq_ignore_ascii_case(kind)
            })
        })
        .ok_or_else(|| anyhow!("Unknown annotation type: {}", kind))?;

    if value.trim().is_empty() {
        return Err(anyhow!("Annotation value for {} is empty", kind));
    }

    let row = AnnotationRow::new(registered.key, value.trim());
    Ok(match organization.filter(|o| !o.is_empty()) {
        Some(number) => row.with_organization(number, ""),
        None => row,
    })
}

/// Parse and validate a placement captured by the canvas (camelCase JSON).
pub fn parse_placement(json: &str) -> Result<PlacementData> {
    let placement: PlacementData =
        serde_json::from_str(json).context("Placement is not valid JSON")?;
    placement.validate()?;
    Ok(placement)
}

/// One-line progress summary.
pub fn summarize(status: &OrchestratorStatus) -> String {
    let mut line = format!(
        "{} flow: {} queued, {} signed, {} failed",
        status.flow, status.queued, status.signed, status.failed
    );
    if let Some(name) = &status.in_flight {
        line.push_str(&format!(", uploading {}", name));
    }
    if status.needs_placement > 0 {
        line.push_str(&format!(", {} need manual placement", status.needs_placement));
    }
    line
}

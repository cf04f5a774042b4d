//! Result rendering for stdout.

use std::collections::BTreeMap;

use anyhow::Context;
use serde::Serialize;

use crate::args::OutputFormat;

/// Results keyed by `owner/repo`, in name order.
pub type Report<T> = BTreeMap<String, Vec<T>>;

/// Renders `report` in `format`, or `None` when no repository has results.
pub fn render<T: Serialize>(report: &Report<T>, format: OutputFormat) -> anyhow::Result<Option<String>> {
    if report.values().all(Vec::is_empty) {
        return Ok(None);
    }
    let text = match format {
        OutputFormat::Json => serde_json::to_string_pretty(report).context("unable to serialise output as JSON")?,
        OutputFormat::Yaml => serde_yaml::to_string(report).context("unable to serialise output as YAML")?,
    };
    Ok(Some(text))
}

//! Report rendering and output.
//!
//! Templates are Mustache. The view exposes `count` and `generatedAt` at the
//! top level and a `domains` list whose items carry the per-record fields
//! (`domain`, `name`, `daysLeft`, `class`, ...). Variables are HTML-escaped
//! and missing ones render as empty strings.

use crate::{errors::ReportError, DomainRecord};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::path::Path;
use tracing::info;

pub const DEFAULT_TEMPLATE: &str = r#"<!DOCTYPE html>
<html lang="en">
<head>
  <meta charset="utf-8">
  <title>Domain expiration</title>
  <style>
    body { font-family: sans-serif; margin: 2em; }
    td, th { padding: 0.3em 1em; text-align: left; }
    .past { background: #333; color: #fff; }
    .urgent { background: #f66; }
    .soon { background: #fc6; }
    .recent { background: #9cf; }
    .ok { background: #9e9; }
  </style>
</head>
<body>
  <h1>Domain expiration</h1>
  <p>{{count}} domains, generated {{generatedAt}}</p>
  <table>
    <tr><th>Domain</th><th>Name</th><th>Expires</th><th>Days left</th><th>Updated</th></tr>
    {{#domains}}
    <tr class="{{class}}">
      <td><a href="{{url}}">{{domain}}</a></td>
      <td title="{{description}}">{{name}}</td>
      <td>{{expirationDay}}</td>
      <td>{{daysLeft}}</td>
      <td>{{updatedDay}}</td>
    </tr>
    {{/domains}}
  </table>
</body>
</html>
"#;

/// Most urgent first; ties keep list order.
pub fn sort_by_days_left(records: &mut [DomainRecord]) {
    records.sort_by_key(|record| record.days_left);
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ReportView {
    generated_at: String,
    count: String,
    domains: Vec<RecordView>,
}

/// Display strings for one record; unset values render empty.
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct RecordView {
    domain: String,
    name: String,
    description: String,
    url: String,
    registrar: String,
    expiration_date: String,
    expiration_day: String,
    expiration_raw: String,
    updated_date: String,
    updated_day: String,
    days_left: String,
    days_since_update: String,
    class: String,
}

impl From<&DomainRecord> for RecordView {
    fn from(record: &DomainRecord) -> Self {
        let optional = |value: &Option<String>| value.clone().unwrap_or_default();
        let day = |date: DateTime<Utc>| date.format("%Y-%m-%d").to_string();

        Self {
            domain: record.entry.domain.clone(),
            name: optional(&record.entry.name),
            description: optional(&record.entry.description),
            url: optional(&record.entry.url),
            registrar: record.registrar.clone(),
            expiration_date: record.expiration_date.to_rfc3339(),
            expiration_day: day(record.expiration_date),
            expiration_raw: record.expiration_raw.clone(),
            updated_date: record.updated_date.map(|d| d.to_rfc3339()).unwrap_or_default(),
            updated_day: record.updated_date.map(day).unwrap_or_default(),
            days_left: record.days_left.to_string(),
            days_since_update: record.days_since_update.map(|d| d.to_string()).unwrap_or_default(),
            class: record.urgency_class.to_string(),
        }
    }
}

pub fn render(template: &str, records: &[DomainRecord], generated_at: DateTime<Utc>) -> Result<String, ReportError> {
    let template = mustache::compile_str(template).map_err(|e| ReportError::Template(e.to_string()))?;

    let view = ReportView {
        generated_at: generated_at.format("%Y-%m-%d %H:%M UTC").to_string(),
        count: records.len().to_string(),
        domains: records.iter().map(RecordView::from).collect(),
    };

    template
        .render_to_string(&view)
        .map_err(|e| ReportError::Template(e.to_string()))
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct JsonReport<'a> {
    generated_at: DateTime<Utc>,
    count: usize,
    domains: &'a [DomainRecord],
}

pub fn render_json(records: &[DomainRecord], generated_at: DateTime<Utc>) -> Result<String, ReportError> {
    let report = JsonReport {
        generated_at,
        count: records.len(),
        domains: records,
    };
    Ok(serde_json::to_string_pretty(&report)?)
}

pub async fn write_report(path: &Path, contents: &str) -> Result<(), ReportError> {
    let write_error = |source| ReportError::Write {
        path: path.to_path_buf(),
        source,
    };

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent).await.map_err(write_error)?;
    }
    tokio::fs::write(path, contents).await.map_err(write_error)?;

    info!("Report written to {}", path.display());
    Ok(())
}

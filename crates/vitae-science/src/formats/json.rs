use chrono::SecondsFormat;
use serde::Serialize;
use serde_json::ser::PrettyFormatter;
use serde_json::{Map, Value};
use vitae_core::{DataEntry, DataGroup, PublicationEntry, VitaeError};

use super::{AssembledEntry, CategoryGroup, RenderContext, total_count};
use crate::error::{Result, ScienceError};

/// Publications document: `_meta` plus one array per category, all three
/// always present. `None` when there is nothing to export.
pub fn publications_document(groups: &[CategoryGroup<'_>], ctx: &RenderContext<'_>) -> Option<Value> {
    let total = total_count(groups);
    if total == 0 {
        return None;
    }
    let mut doc = Map::new();
    doc.insert("_meta".into(), meta("orcid-publications", ctx, total));
    for group in groups {
        let items = group.entries.iter().map(publication_value).collect();
        doc.insert(group.category.json_key().into(), Value::Array(items));
    }
    Some(Value::Object(doc))
}

fn publication_value(assembled: &AssembledEntry<'_>) -> Value {
    let e: &PublicationEntry = assembled.entry;
    let mut item = Map::new();
    item.insert("title".into(), e.title.plain.clone().into());
    item.insert("type".into(), e.category.as_str().into());
    item.insert("raw_type".into(), e.raw_type.clone().into());
    insert_opt(&mut item, "year", e.year);
    insert_opt(&mut item, "month", e.month);
    if !e.authors.is_empty() {
        item.insert("authors".into(), e.authors.clone().into());
    }
    insert_opt(&mut item, "authors_short", assembled.authors_short.clone());
    insert_opt(&mut item, "venue", e.venue.clone());
    insert_opt(&mut item, "volume", e.volume.clone());
    insert_opt(&mut item, "issue", e.issue.clone());
    insert_opt(&mut item, "pages", e.pages.clone());
    insert_opt(&mut item, "publisher", e.publisher.clone());
    insert_opt(&mut item, "doi", e.doi.clone());
    insert_opt(&mut item, "doi_url", assembled.doi_url.clone());
    insert_opt(&mut item, "url", e.url.clone());
    insert_opt(&mut item, "abstract", e.abstract_text.clone());
    if !e.external_ids.is_empty() {
        let ids: Map<String, Value> = e
            .external_ids
            .iter()
            .map(|(k, v)| (k.clone(), Value::from(v.clone())))
            .collect();
        item.insert("external_ids".into(), Value::Object(ids));
    }
    item.insert("put_code".into(), e.source_put_code.clone().into());
    Value::Object(item)
}

/// Data document: `_meta` plus one key per non-empty section.
pub fn data_document(groups: &[DataGroup], ctx: &RenderContext<'_>) -> Option<Value> {
    let total: usize = groups.iter().map(|g| g.entries.len()).sum();
    if total == 0 {
        return None;
    }
    let mut doc = Map::new();
    doc.insert("_meta".into(), meta("orcid-data", ctx, total));
    for group in groups.iter().filter(|g| !g.entries.is_empty()) {
        let items = group.entries.iter().map(data_value).collect();
        doc.insert(group.section.json_key().into(), Value::Array(items));
    }
    Some(Value::Object(doc))
}

fn data_value(entry: &DataEntry) -> Value {
    let mut item = Map::new();
    insert_opt(&mut item, "text", entry.text.as_ref().map(|t| t.plain.clone()));
    insert_opt(&mut item, "organization", entry.organization.clone());
    insert_opt(&mut item, "location", entry.location.clone());
    insert_opt(&mut item, "role", entry.role.clone());
    insert_opt(&mut item, "department", entry.department.clone());
    insert_opt(&mut item, "type", entry.kind.clone());
    insert_opt(&mut item, "value", entry.value.clone());
    insert_opt(&mut item, "url", entry.url.clone());
    insert_opt(&mut item, "start_year", entry.start_year);
    insert_opt(&mut item, "end_year", entry.end_year);
    Value::Object(item)
}

fn meta(section: &str, ctx: &RenderContext<'_>, total: usize) -> Value {
    let mut meta = Map::new();
    meta.insert("section".into(), section.into());
    meta.insert("orcid_id".into(), ctx.orcid.as_str().into());
    meta.insert(
        "generated_at".into(),
        ctx.generated_at.to_rfc3339_opts(SecondsFormat::Secs, true).into(),
    );
    meta.insert("total_count".into(), total.into());
    Value::Object(meta)
}

fn insert_opt<T: Into<Value>>(item: &mut Map<String, Value>, key: &str, value: Option<T>) {
    if let Some(value) = value {
        item.insert(key.to_string(), value.into());
    }
}

/// Serialize with `indent` spaces per level, newline-terminated.
pub fn to_pretty_string(doc: &Value, indent: usize) -> Result<String> {
    let indent = " ".repeat(indent);
    let mut buf = Vec::new();
    let mut ser = serde_json::Serializer::with_formatter(&mut buf, PrettyFormatter::with_indent(indent.as_bytes()));
    doc.serialize(&mut ser).map_err(VitaeError::from)?;
    let mut text = String::from_utf8(buf).map_err(|e| ScienceError::Parse(e.to_string()))?;
    text.push('\n');
    Ok(text)
}

pub fn render_publications(
    groups: &[CategoryGroup<'_>],
    ctx: &RenderContext<'_>,
    indent: usize,
) -> Result<Option<String>> {
    publications_document(groups, ctx)
        .map(|doc| to_pretty_string(&doc, indent))
        .transpose()
}

pub fn render_data(groups: &[DataGroup], ctx: &RenderContext<'_>, indent: usize) -> Result<Option<String>> {
    data_document(groups, ctx)
        .map(|doc| to_pretty_string(&doc, indent))
        .transpose()
}

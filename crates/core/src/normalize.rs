//! Converts each search source's raw payload into a canonical id set plus a
//! lookup from canonical id to the entries that carry it.

use std::{collections::HashMap, sync::LazyLock};

use regex::Regex;
use serde_json::Value;

use crate::error::MalformedSourceError;

// One or more trailing `_<index>` groups. Stripping all of them keeps
// canonicalization idempotent, at a cost: a base id that itself ends in
// digits loses them too, so visual `movie_2023_0` canonicalizes to `movie`
// and no longer meets metadata id `movie_2023`. Use `_\d+$` to strip a
// single group instead.
static SEGMENT_SUFFIX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?:_\d+)+$").expect("segment suffix pattern is valid"));

/// Strip the trailing `_<index>` sub-segment suffix from an identifier.
pub fn canonicalize(id: &str) -> String {
    SEGMENT_SUFFIX.replace(id, "").into_owned()
}

/// Textual form of an identifier value. Strings are taken verbatim, numbers
/// and booleans are coerced, anything else is not an identifier.
pub fn identifier_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        Value::Null | Value::Array(_) | Value::Object(_) => None,
    }
}

/// Canonical form of an arbitrary identifier value. Values that cannot be
/// read as an identifier canonicalize to the empty string.
pub fn canonicalize_value(value: &Value) -> String {
    identifier_text(value)
        .map(|text| canonicalize(&text))
        .unwrap_or_default()
}

/// A source payload as received.
#[derive(Debug, Clone, PartialEq)]
pub enum RawResultSet {
    /// Vector index shape: one inner list per query in the batch.
    Batched {
        ids: Vec<Vec<Value>>,
        metadatas: Option<Vec<Vec<Value>>>,
    },
    /// Relational store shape: `[{"id", "title"}, ...]`.
    Flat(Vec<Value>),
}

impl RawResultSet {
    pub fn empty_batched() -> Self {
        RawResultSet::Batched {
            ids: Vec::new(),
            metadatas: None,
        }
    }

    /// Parse a vector index response. Missing or null `ids`, a null body and
    /// an empty list all parse to an empty batch.
    pub fn batched_from_value(
        source_name: &'static str,
        value: Value,
    ) -> Result<Self, MalformedSourceError> {
        let mut object = match value {
            Value::Null => return Ok(Self::empty_batched()),
            Value::Array(items) if items.is_empty() => return Ok(Self::empty_batched()),
            Value::Object(object) => object,
            other => return Err(unexpected(source_name, "an object with `ids`", &other)),
        };

        let ids = match object.remove("ids") {
            None | Some(Value::Null) => return Ok(Self::empty_batched()),
            Some(value) => nested_lists(source_name, "ids", value)?,
        };

        let metadatas = match object.remove("metadatas") {
            None | Some(Value::Null) => None,
            Some(value) => Some(nested_lists(source_name, "metadatas", value)?),
        };

        Ok(RawResultSet::Batched { ids, metadatas })
    }

    /// Parse a relational store response.
    pub fn flat_from_value(
        source_name: &'static str,
        value: Value,
    ) -> Result<Self, MalformedSourceError> {
        match value {
            Value::Null => Ok(RawResultSet::Flat(Vec::new())),
            Value::Array(records) => Ok(RawResultSet::Flat(records)),
            other => Err(unexpected(source_name, "a list of records", &other)),
        }
    }
}

fn nested_lists(
    source_name: &'static str,
    field: &'static str,
    value: Value,
) -> Result<Vec<Vec<Value>>, MalformedSourceError> {
    let outer = match value {
        Value::Array(outer) => outer,
        other => return Err(unexpected(source_name, field_shape(field), &other)),
    };

    outer
        .into_iter()
        .map(|inner| match inner {
            Value::Array(items) => Ok(items),
            other => Err(unexpected(source_name, field_shape(field), &other)),
        })
        .collect()
}

fn field_shape(field: &'static str) -> &'static str {
    match field {
        "ids" => "`ids` as a list of lists",
        _ => "`metadatas` as a list of lists",
    }
}

fn unexpected(
    source_name: &'static str,
    expected: &'static str,
    found: &Value,
) -> MalformedSourceError {
    let found = match found {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "a list",
        Value::Object(_) => "an object",
    };
    MalformedSourceError::UnexpectedShape {
        source_name,
        expected,
        found: found.to_string(),
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SourceEntry {
    pub original_id: String,
    pub canonical_id: String,
    pub metadata: Value,
}

/// Canonical view of one source, built once per request.
#[derive(Debug, Clone, Default)]
pub struct NormalizedSource {
    entries: Vec<SourceEntry>,
    canonical_order: Vec<String>,
    groups: HashMap<String, Vec<usize>>,
}

impl NormalizedSource {
    pub fn from_entries(entries: impl IntoIterator<Item = SourceEntry>) -> Self {
        let mut source = Self::default();
        for entry in entries {
            source.push(entry);
        }
        source
    }

    fn push(&mut self, entry: SourceEntry) {
        let index = self.entries.len();
        match self.groups.get_mut(&entry.canonical_id) {
            Some(group) => group.push(index),
            None => {
                self.canonical_order.push(entry.canonical_id.clone());
                self.groups.insert(entry.canonical_id.clone(), vec![index]);
            }
        }
        self.entries.push(entry);
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn contains(&self, canonical_id: &str) -> bool {
        self.groups.contains_key(canonical_id)
    }

    /// Canonical ids in the order they were first discovered.
    pub fn canonical_ids(&self) -> impl Iterator<Item = &str> {
        self.canonical_order.iter().map(String::as_str)
    }

    /// First entry discovered for a canonical id.
    pub fn lookup(&self, canonical_id: &str) -> Option<&SourceEntry> {
        self.groups
            .get(canonical_id)
            .and_then(|group| group.first())
            .map(|&index| &self.entries[index])
    }

    /// Every entry sharing a canonical id, in discovery order.
    pub fn entries_for<'a>(
        &'a self,
        canonical_id: &str,
    ) -> impl Iterator<Item = &'a SourceEntry> + use<'a> {
        self.groups
            .get(canonical_id)
            .into_iter()
            .flatten()
            .map(|&index| &self.entries[index])
    }

    pub fn entries(&self) -> &[SourceEntry] {
        &self.entries
    }
}

/// Build the canonical view of a raw payload.
///
/// Batched payloads are flattened pairwise; when metadatas are present they
/// must align with ids batch by batch and item by item. Flat records use
/// their `id` verbatim as the canonical id; records without one are skipped.
pub fn normalize(
    source_name: &'static str,
    raw: RawResultSet,
) -> Result<NormalizedSource, MalformedSourceError> {
    match raw {
        RawResultSet::Batched { ids, metadatas } => normalize_batched(source_name, ids, metadatas),
        RawResultSet::Flat(records) => Ok(normalize_flat(source_name, records)),
    }
}

fn normalize_batched(
    source_name: &'static str,
    ids: Vec<Vec<Value>>,
    metadatas: Option<Vec<Vec<Value>>>,
) -> Result<NormalizedSource, MalformedSourceError> {
    if let Some(metadatas) = &metadatas {
        if metadatas.len() != ids.len() {
            return Err(MalformedSourceError::MisalignedBatchCount {
                source_name,
                ids: ids.len(),
                metadatas: metadatas.len(),
            });
        }
        for (batch, (id_batch, metadata_batch)) in ids.iter().zip(metadatas).enumerate() {
            if id_batch.len() != metadata_batch.len() {
                return Err(MalformedSourceError::MisalignedBatch {
                    source_name,
                    batch,
                    ids: id_batch.len(),
                    metadatas: metadata_batch.len(),
                });
            }
        }
    }

    let mut metadata_batches = metadatas.map(|batches| batches.into_iter());
    let mut source = NormalizedSource::default();

    for id_batch in ids {
        let metadata_batch = metadata_batches.as_mut().and_then(|batches| batches.next());
        let mut metadata_items = metadata_batch.map(|batch| batch.into_iter());

        for id in id_batch {
            let metadata = metadata_items
                .as_mut()
                .and_then(|items| items.next())
                .unwrap_or(Value::Null);
            let original_id = identifier_text(&id).unwrap_or_else(|| id.to_string());

            source.push(SourceEntry {
                canonical_id: canonicalize_value(&id),
                original_id,
                metadata,
            });
        }
    }

    Ok(source)
}

fn normalize_flat(source_name: &'static str, records: Vec<Value>) -> NormalizedSource {
    let mut source = NormalizedSource::default();

    for record in records {
        let Some(id) = record.get("id").and_then(identifier_text) else {
            tracing::warn!(source = source_name, record = %record, "skipping record without id");
            continue;
        };

        source.push(SourceEntry {
            original_id: id.clone(),
            canonical_id: id,
            metadata: record,
        });
    }

    source
}

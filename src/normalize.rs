//! Maps loosely-keyed records from the record service onto fixed field names.

use std::collections::{BTreeMap, HashMap};

use serde_json::Value;
use tracing::debug;

pub type RawRecord = serde_json::Map<String, Value>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    /// Join or lookup key: trimmed and lowercased.
    Identity,
    /// Shown to people as-is.
    Display,
    Number,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FieldDefault {
    Text(&'static str),
    Number(f64),
}

#[derive(Debug, Clone, Copy)]
pub struct FieldSpec {
    pub name: &'static str,
    pub aliases: &'static [&'static str],
    pub kind: FieldKind,
    pub default: FieldDefault,
}

impl FieldSpec {
    pub const fn identity(name: &'static str, aliases: &'static [&'static str]) -> Self {
        Self {
            name,
            aliases,
            kind: FieldKind::Identity,
            default: FieldDefault::Text(""),
        }
    }

    pub const fn display(
        name: &'static str,
        aliases: &'static [&'static str],
        default: &'static str,
    ) -> Self {
        Self {
            name,
            aliases,
            kind: FieldKind::Display,
            default: FieldDefault::Text(default),
        }
    }

    pub const fn number(
        name: &'static str,
        aliases: &'static [&'static str],
        default: f64,
    ) -> Self {
        Self {
            name,
            aliases,
            kind: FieldKind::Number,
            default: FieldDefault::Number(default),
        }
    }

    fn default_value(&self) -> FieldValue {
        match self.default {
            FieldDefault::Text(text) => FieldValue::Text(text.to_string()),
            FieldDefault::Number(value) => FieldValue::Number(value),
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct Schema {
    pub entity: &'static str,
    pub fields: &'static [FieldSpec],
}

#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    Text(String),
    Number(f64),
}

impl FieldValue {
    fn to_json(&self) -> Value {
        match self {
            FieldValue::Text(text) => Value::String(text.clone()),
            FieldValue::Number(value) => serde_json::Number::from_f64(*value)
                .map(Value::Number)
                .unwrap_or_else(|| Value::from(0)),
        }
    }
}

/// A record carrying exactly the fields its schema declares.
#[derive(Debug, Clone, PartialEq)]
pub struct CanonicalRecord {
    fields: BTreeMap<&'static str, FieldValue>,
}

impl CanonicalRecord {
    /// Text value of a field, or `""` for unknown and numeric fields.
    pub fn text(&self, name: &str) -> &str {
        match self.fields.get(name) {
            Some(FieldValue::Text(text)) => text,
            _ => "",
        }
    }

    pub fn number(&self, name: &str) -> f64 {
        match self.fields.get(name) {
            Some(FieldValue::Number(value)) => *value,
            _ => 0.0,
        }
    }

    /// Converts back into a raw record keyed by canonical names.
    pub fn to_raw(&self) -> RawRecord {
        self.fields
            .iter()
            .map(|(name, value)| (name.to_string(), value.to_json()))
            .collect()
    }
}

/// Trims and lowercases a join key. Every side of a join goes through here.
pub fn normalize_key(value: &str) -> String {
    value.trim().to_lowercase()
}

fn fold_alias(key: &str) -> String {
    key.chars()
        .filter(|c| !c.is_whitespace() && *c != '_' && *c != '-')
        .flat_map(char::to_lowercase)
        .collect()
}

pub fn normalize(schema: &Schema, raw: &RawRecord) -> CanonicalRecord {
    // Keys differing only in case or separators fold together; a blank one
    // must not shadow a filled one.
    let mut folded: HashMap<String, &Value> = HashMap::with_capacity(raw.len());
    for (key, value) in raw.iter().filter(|(_, value)| is_present(value)) {
        folded.entry(fold_alias(key)).or_insert(value);
    }

    let fields = schema
        .fields
        .iter()
        .map(|spec| {
            let value = std::iter::once(spec.name)
                .chain(spec.aliases.iter().copied())
                .find_map(|alias| folded.get(&fold_alias(alias)).copied())
                .and_then(|value| convert(spec.kind, value))
                .unwrap_or_else(|| spec.default_value());
            (spec.name, value)
        })
        .collect();

    CanonicalRecord { fields }
}

fn is_present(value: &Value) -> bool {
    match value {
        Value::Null | Value::Array(_) | Value::Object(_) => false,
        Value::String(text) => !text.trim().is_empty(),
        Value::Bool(_) | Value::Number(_) => true,
    }
}

fn convert(kind: FieldKind, value: &Value) -> Option<FieldValue> {
    let text = match value {
        Value::String(text) => text.clone(),
        Value::Number(number) => number.to_string(),
        Value::Bool(flag) => flag.to_string(),
        _ => return None,
    };

    match kind {
        FieldKind::Identity => Some(FieldValue::Text(normalize_key(&text))),
        FieldKind::Display => Some(FieldValue::Text(text)),
        FieldKind::Number => parse_number(value).map(FieldValue::Number),
    }
}

fn parse_number(value: &Value) -> Option<f64> {
    let parsed = match value {
        Value::Number(number) => number.as_f64(),
        Value::String(text) => text
            .chars()
            .filter(|c| !matches!(c, ',' | '₹' | '$') && !c.is_whitespace())
            .collect::<String>()
            .parse::<f64>()
            .ok(),
        _ => None,
    };
    parsed.filter(|value| value.is_finite())
}

/// An entity that can be built from a normalized record.
pub trait Entity: Sized {
    const SCHEMA: Schema;

    fn from_canonical(record: &CanonicalRecord) -> Self;

    fn from_raw(raw: &RawRecord) -> Self {
        Self::from_canonical(&normalize(&Self::SCHEMA, raw))
    }
}

pub fn decode_all<T: Entity>(raws: &[RawRecord]) -> Vec<T> {
    debug!(entity = T::SCHEMA.entity, count = raws.len(), "normalizing records");
    raws.iter().map(T::from_raw).collect()
}

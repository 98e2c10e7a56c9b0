use bson::{Bson, Document, oid::ObjectId};
use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde_json::{Map, Value};

use super::QueryError;
use crate::envelope::json_to_bson;
use crate::resource::{FieldKind, ResourceSchema};

/// Condition on a single allow-listed field.
#[derive(Debug, Clone, PartialEq)]
pub enum FilterCondition {
    Equality(Bson),
    Range { gte: Option<Bson>, lte: Option<Bson> },
    In(Vec<Bson>),
}

impl FilterCondition {
    pub fn to_bson(&self) -> Bson {
        match self {
            FilterCondition::Equality(value) => value.clone(),
            FilterCondition::Range { gte, lte } => {
                let mut range = Document::new();
                if let Some(gte) = gte {
                    range.insert("$gte", gte.clone());
                }
                if let Some(lte) = lte {
                    range.insert("$lte", lte.clone());
                }
                Bson::Document(range)
            }
            FilterCondition::In(values) => {
                let mut set = Document::new();
                set.insert("$in", Bson::Array(values.clone()));
                Bson::Document(set)
            }
        }
    }
}

/// Filter whose values are already store-native, in request key order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NormalizedFilter {
    conditions: Vec<(String, FilterCondition)>,
}

impl NormalizedFilter {
    pub fn is_empty(&self) -> bool {
        self.conditions.is_empty()
    }

    pub fn len(&self) -> usize {
        self.conditions.len()
    }

    pub fn get(&self, field: &str) -> Option<&FilterCondition> {
        self.conditions
            .iter()
            .find(|(key, _)| key == field)
            .map(|(_, condition)| condition)
    }

    /// Sets `field`, replacing any condition the caller supplied for it.
    pub fn insert(&mut self, field: impl Into<String>, condition: FilterCondition) {
        let field = field.into();
        match self.conditions.iter_mut().find(|(key, _)| *key == field) {
            Some(slot) => slot.1 = condition,
            None => self.conditions.push((field, condition)),
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &FilterCondition)> {
        self.conditions.iter().map(|(k, c)| (k.as_str(), c))
    }

    pub fn to_document(&self) -> Document {
        self.conditions
            .iter()
            .map(|(key, condition)| (key.clone(), condition.to_bson()))
            .collect()
    }
}

/// Coerces client filter values into store-native types, rejecting keys the
/// resource does not allow.
pub struct FilterNormalizer<'a> {
    resource: &'a ResourceSchema,
}

impl<'a> FilterNormalizer<'a> {
    pub fn new(resource: &'a ResourceSchema) -> Self {
        Self { resource }
    }

    pub fn normalize(&self, raw: &Map<String, Value>) -> Result<NormalizedFilter, QueryError> {
        let mut filter = NormalizedFilter::default();
        for (key, value) in raw {
            let field = self
                .resource
                .filter_field(key)
                .ok_or_else(|| QueryError::DisallowedFilterField(key.clone()))?;
            let kind = if is_id_key(key) { FieldKind::Id } else { field.kind };
            filter.insert(key.clone(), parse_condition(key, kind, value)?);
        }
        Ok(filter)
    }
}

fn is_id_key(key: &str) -> bool {
    key == "_id" || key.ends_with("._id")
}

fn parse_condition(key: &str, kind: FieldKind, value: &Value) -> Result<FilterCondition, QueryError> {
    let operators = match value {
        Value::Object(map) if map.keys().any(|k| k.starts_with('$')) => map,
        other => return Ok(FilterCondition::Equality(coerce(key, kind, other)?)),
    };

    let mut gte = None;
    let mut lte = None;
    let mut members = None;
    for (operator, operand) in operators {
        match operator.as_str() {
            "$gte" => gte = coerce_bound(key, kind, operand)?,
            "$lte" => lte = coerce_bound(key, kind, operand)?,
            "$in" => {
                let Value::Array(items) = operand else {
                    return Err(unsupported(key, "$in"));
                };
                members = Some(
                    items
                        .iter()
                        .map(|item| coerce(key, kind, item))
                        .collect::<Result<Vec<_>, _>>()?,
                );
            }
            other => return Err(unsupported(key, other)),
        }
    }

    match (members, gte, lte) {
        (Some(values), None, None) => Ok(FilterCondition::In(values)),
        (Some(_), _, _) => Err(unsupported(key, "$in")),
        (None, None, None) if kind == FieldKind::Date => Err(QueryError::InvalidDateRange {
            field: key.to_string(),
            value: Value::Object(operators.clone()).to_string(),
        }),
        (None, None, None) => Err(unsupported(key, "$gte")),
        (None, gte, lte) => Ok(FilterCondition::Range { gte, lte }),
    }
}

/// Range bounds treat `null` and `""` as "no bound".
fn coerce_bound(key: &str, kind: FieldKind, value: &Value) -> Result<Option<Bson>, QueryError> {
    match value {
        Value::Null => Ok(None),
        Value::String(s) if s.is_empty() => Ok(None),
        other => coerce(key, kind, other).map(Some),
    }
}

fn coerce(key: &str, kind: FieldKind, value: &Value) -> Result<Bson, QueryError> {
    match kind {
        FieldKind::Value => Ok(json_to_bson(value)),
        FieldKind::Id => match value {
            Value::Null => Ok(Bson::Null),
            Value::String(s) => ObjectId::parse_str(s)
                .map(Bson::ObjectId)
                .map_err(|_| QueryError::InvalidIdentifier {
                    field: key.to_string(),
                    value: s.clone(),
                }),
            other => Err(QueryError::InvalidIdentifier {
                field: key.to_string(),
                value: other.to_string(),
            }),
        },
        FieldKind::Date => {
            let invalid = || QueryError::InvalidDateRange {
                field: key.to_string(),
                value: value.to_string(),
            };
            match value {
                Value::Null => Ok(Bson::Null),
                Value::String(s) => parse_date(s).map(Bson::DateTime).ok_or_else(invalid),
                Value::Number(n) => n
                    .as_i64()
                    .map(|millis| Bson::DateTime(bson::DateTime::from_millis(millis)))
                    .ok_or_else(invalid),
                _ => Err(invalid()),
            }
        }
    }
}

/// Accepts RFC 3339, a naive `YYYY-MM-DDTHH:MM:SS[.f]` (read as UTC) or a bare
/// `YYYY-MM-DD` (midnight UTC).
pub fn parse_date(raw: &str) -> Option<bson::DateTime> {
    let raw = raw.trim();
    let parsed: DateTime<Utc> = if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        dt.with_timezone(&Utc)
    } else if let Ok(naive) = NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f") {
        naive.and_utc()
    } else {
        NaiveDate::parse_from_str(raw, "%Y-%m-%d")
            .ok()?
            .and_hms_opt(0, 0, 0)?
            .and_utc()
    };
    Some(bson::DateTime::from_chrono(parsed))
}

fn unsupported(key: &str, operator: &str) -> QueryError {
    QueryError::UnsupportedOperator {
        field: key.to_string(),
        operator: operator.to_string(),
    }
}

/// Parses a path/body identifier, reporting which field carried it.
pub fn parse_id(field: &str, raw: &str) -> Result<ObjectId, QueryError> {
    ObjectId::parse_str(raw.trim()).map_err(|_| QueryError::InvalidIdentifier {
        field: field.to_string(),
        value: raw.to_string(),
    })
}

//! Write-side counterpart of filter coercion: identifier and date fields a
//! resource filters on are stored as ObjectId / datetime, so that equality
//! and range filters over them actually match.

use bson::{Bson, Document};

use super::{FieldKind, FilterField, ResourceSchema};
use crate::query::{QueryError, parse_date, parse_id};

pub(crate) fn coerce_for_write(schema: &ResourceSchema, mut document: Document) -> Result<Document, QueryError> {
    for field in schema.filter_fields {
        if field.kind == FieldKind::Value {
            continue;
        }
        let segments: Vec<&str> = field.name.split('.').collect();
        let Some((head, rest)) = segments.split_first() else {
            continue;
        };
        if let Some(value) = document.get_mut(*head) {
            coerce_at(value, rest, field)?;
        }
    }
    Ok(document)
}

fn coerce_at(value: &mut Bson, path: &[&str], field: &FilterField) -> Result<(), QueryError> {
    if let Bson::Array(items) = value {
        return items.iter_mut().try_for_each(|item| coerce_at(item, path, field));
    }
    match path.split_first() {
        None => coerce_leaf(value, field),
        Some((head, rest)) => match value {
            Bson::Document(inner) => match inner.get_mut(*head) {
                Some(child) => coerce_at(child, rest, field),
                None => Ok(()),
            },
            _ => Ok(()),
        },
    }
}

fn coerce_leaf(value: &mut Bson, field: &FilterField) -> Result<(), QueryError> {
    let Bson::String(raw) = value else {
        return Ok(());
    };
    let coerced = match field.kind {
        FieldKind::Id => Bson::ObjectId(parse_id(field.name, raw)?),
        FieldKind::Date if raw.trim().is_empty() => Bson::Null,
        FieldKind::Date => match parse_date(raw) {
            Some(date) => Bson::DateTime(date),
            None => {
                return Err(QueryError::InvalidDateRange {
                    field: field.name.to_string(),
                    value: raw.clone(),
                });
            }
        },
        FieldKind::Value => return Ok(()),
    };
    *value = coerced;
    Ok(())
}

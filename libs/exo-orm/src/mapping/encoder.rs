// Copyright Exograph, Inc. All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file at the root of this repository.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

//! Flattening records into column values, the inverse of [`RowMapper`](super::RowMapper).

use crate::asql::SelectMode;
use crate::schema::{Field, FieldKind, ScalarType};
use crate::{FieldValue, MappingError, OrmError, Record, Schema, SchemaError, SqlValue};

use super::coerce::encode_enum;

/// Values for the table columns of a record, in column order. Foreign keys contribute the key of
/// the record they refer to.
pub fn encode_record(schema: &Schema, record: &Record) -> Result<Vec<SqlValue>, OrmError> {
    let entity = schema.get_entity(record.entity());
    check_arity(schema, record)?;

    let mut values = Vec::with_capacity(entity.column_count());
    for (field, value) in entity.fields.iter().zip(record.values()) {
        let path = format!("{}.{}", entity.name, field.name);
        values.extend(encode_field(schema, field, value, &path)?);
    }
    Ok(values)
}

/// Values for the columns of one field
pub fn encode_field(
    schema: &Schema,
    field: &Field,
    value: &FieldValue,
    path: &str,
) -> Result<Vec<SqlValue>, OrmError> {
    if value.is_null() {
        return Ok(vec![SqlValue::Null; field.width()]);
    }

    let mismatch = |expected: String| {
        OrmError::from(MappingError::TypeMismatch {
            path: path.to_string(),
            expected,
            actual: describe(value).to_string(),
        })
    };

    match (&field.kind, value) {
        (FieldKind::Scalar(ScalarType::Enum(enum_type)), FieldValue::Enum(variant)) => {
            Ok(vec![encode_enum(variant, enum_type, path)?])
        }
        (FieldKind::Scalar(_), FieldValue::Scalar(value)) => Ok(vec![value.clone()]),
        (FieldKind::Scalar(typ), _) => Err(mismatch(typ.to_string())),

        (FieldKind::Converted(name), value) => {
            let converter = schema.converter(name).ok_or_else(|| {
                SchemaError::UnknownConverter {
                    field: path.to_string(),
                    converter: name.clone(),
                }
            })?;
            let values = converter.to_columns(value).map_err(|message| MappingError::Converter {
                path: path.to_string(),
                message,
            })?;
            if values.len() != field.width() {
                return Err(MappingError::Converter {
                    path: path.to_string(),
                    message: format!("produced {} value(s), expected {}", values.len(), field.width()),
                }
                .into());
            }
            Ok(values)
        }

        (FieldKind::Inline(_), FieldValue::Record(record)) => encode_record(schema, record),
        (FieldKind::Inline(target), _) => Err(mismatch(schema.get_entity(*target).name.clone())),

        (FieldKind::ForeignKey(_) | FieldKind::Ref(_), FieldValue::Record(record)) => {
            primary_key_values(schema, record)
        }
        (FieldKind::ForeignKey(_) | FieldKind::Ref(_), FieldValue::Ref(reference)) => {
            Ok(match reference.key() {
                Some(key) => key.to_vec(),
                None => vec![SqlValue::Null; field.width()],
            })
        }
        // A bare key
        (FieldKind::ForeignKey(_) | FieldKind::Ref(_), FieldValue::Scalar(key))
            if field.width() == 1 =>
        {
            Ok(vec![key.clone()])
        }
        (FieldKind::ForeignKey(target) | FieldKind::Ref(target), _) => {
            Err(mismatch(schema.get_entity(*target).name.clone()))
        }
    }
}

/// Values in the shape of a full select of the record's entity: foreign keys contribute every
/// column of the record they refer to, which must therefore be present (or null).
pub fn encode_full(schema: &Schema, record: &Record) -> Result<Vec<SqlValue>, OrmError> {
    let entity = schema.get_entity(record.entity());
    check_arity(schema, record)?;

    let mut values = vec![];
    for (field, value) in entity.fields.iter().zip(record.values()) {
        let path = format!("{}.{}", entity.name, field.name);

        match (&field.kind, value) {
            (FieldKind::Inline(_) | FieldKind::ForeignKey(_), FieldValue::Record(nested)) => {
                values.extend(encode_full(schema, nested)?);
            }
            (FieldKind::Inline(target) | FieldKind::ForeignKey(target), FieldValue::Null) => {
                let width = schema.row_plan(*target, SelectMode::Full)?.width;
                values.extend(std::iter::repeat_n(SqlValue::Null, width));
            }
            (FieldKind::ForeignKey(_), FieldValue::Ref(reference)) => {
                let nested = reference.fetch()?.ok_or_else(|| {
                    OrmError::Usage(format!("`{path}` holds a null reference"))
                })?;
                values.extend(encode_full(schema, &nested)?);
            }
            _ => values.extend(encode_field(schema, field, value, &path)?),
        }
    }
    Ok(values)
}

/// The primary key values of a record
pub fn primary_key_values(schema: &Schema, record: &Record) -> Result<Vec<SqlValue>, OrmError> {
    let entity = schema.get_entity(record.entity());
    let index = entity
        .pk_field_index()
        .ok_or_else(|| SchemaError::MissingPrimaryKey(entity.name.clone()))?;
    let field = &entity.fields[index];
    let value = record.value(index).unwrap_or(&FieldValue::Null);

    encode_field(
        schema,
        field,
        value,
        &format!("{}.{}", entity.name, field.name),
    )
}

fn check_arity(schema: &Schema, record: &Record) -> Result<(), OrmError> {
    let entity = schema.get_entity(record.entity());
    if record.values().len() != entity.fields.len() {
        return Err(OrmError::Usage(format!(
            "Record for `{}` has {} value(s) for {} field(s)",
            entity.name,
            record.values().len(),
            entity.fields.len()
        )));
    }
    Ok(())
}

fn describe(value: &FieldValue) -> &'static str {
    match value {
        FieldValue::Null => "null",
        FieldValue::Scalar(value) => value.type_name(),
        FieldValue::Enum(_) => "enum",
        FieldValue::Record(_) => "record",
        FieldValue::Ref(_) => "reference",
    }
}

// Copyright Exograph, Inc. All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file at the root of this repository.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

use chrono::NaiveTime;
use uuid::Uuid;

use crate::schema::{EnumEncoding, EnumType, ScalarType};
use crate::{FieldValue, MappingError, SqlValue};

/// Convert a non-null raw value to the field value for `typ`. `path` names the field in errors.
pub fn coerce(value: &SqlValue, typ: &ScalarType, path: &str) -> Result<FieldValue, MappingError> {
    let mismatch = || MappingError::TypeMismatch {
        path: path.to_string(),
        expected: typ.to_string(),
        actual: value.type_name().to_string(),
    };

    let scalar = match (typ, value) {
        (ScalarType::Enum(enum_type), value) => return coerce_enum(value, enum_type, path),

        (ScalarType::Boolean, SqlValue::Boolean(v)) => SqlValue::Boolean(*v),
        (ScalarType::Boolean, SqlValue::Int(v @ (0 | 1))) => SqlValue::Boolean(*v == 1),
        (ScalarType::Boolean, SqlValue::BigInt(v @ (0 | 1))) => SqlValue::Boolean(*v == 1),

        (ScalarType::Int, SqlValue::Int(v)) => SqlValue::Int(*v),
        (ScalarType::Int, SqlValue::BigInt(v)) => {
            SqlValue::Int(i32::try_from(*v).map_err(|_| mismatch())?)
        }

        (ScalarType::BigInt, SqlValue::Int(v)) => SqlValue::BigInt(i64::from(*v)),
        (ScalarType::BigInt, SqlValue::BigInt(v)) => SqlValue::BigInt(*v),

        (ScalarType::Double, SqlValue::Double(v)) => SqlValue::Double(*v),
        (ScalarType::Double, SqlValue::Int(v)) => SqlValue::Double(f64::from(*v)),
        (ScalarType::Double, SqlValue::BigInt(v)) => SqlValue::Double(*v as f64),

        (ScalarType::Text, SqlValue::Text(v)) => SqlValue::Text(v.clone()),

        (ScalarType::Date, SqlValue::Date(v)) => SqlValue::Date(*v),
        (ScalarType::Date, SqlValue::Timestamp(v)) => SqlValue::Date(v.date()),

        (ScalarType::Timestamp, SqlValue::Timestamp(v)) => SqlValue::Timestamp(*v),
        (ScalarType::Timestamp, SqlValue::Date(v)) => SqlValue::Timestamp(v.and_time(NaiveTime::MIN)),

        (ScalarType::Uuid, SqlValue::Uuid(v)) => SqlValue::Uuid(*v),
        (ScalarType::Uuid, SqlValue::Text(v)) => {
            SqlValue::Uuid(Uuid::parse_str(v).map_err(|_| mismatch())?)
        }

        (ScalarType::Bytes, SqlValue::Bytes(v)) => SqlValue::Bytes(v.clone()),

        _ => return Err(mismatch()),
    };

    Ok(FieldValue::Scalar(scalar))
}

fn coerce_enum(
    value: &SqlValue,
    enum_type: &EnumType,
    path: &str,
) -> Result<FieldValue, MappingError> {
    let invalid = |value: String| MappingError::InvalidEnum {
        path: path.to_string(),
        enum_name: enum_type.name.clone(),
        value,
    };

    let variant = match (enum_type.encoding, value) {
        (EnumEncoding::Name, SqlValue::Text(name)) => enum_type
            .variants
            .iter()
            .find(|variant| *variant == name)
            .ok_or_else(|| invalid(name.clone()))?,
        (EnumEncoding::Ordinal, SqlValue::Text(ordinal)) => ordinal
            .trim()
            .parse::<usize>()
            .ok()
            .and_then(|index| enum_type.variants.get(index))
            .ok_or_else(|| invalid(ordinal.clone()))?,
        (EnumEncoding::Ordinal, SqlValue::Int(ordinal)) => usize::try_from(*ordinal)
            .ok()
            .and_then(|index| enum_type.variants.get(index))
            .ok_or_else(|| invalid(ordinal.to_string()))?,
        (EnumEncoding::Ordinal, SqlValue::BigInt(ordinal)) => usize::try_from(*ordinal)
            .ok()
            .and_then(|index| enum_type.variants.get(index))
            .ok_or_else(|| invalid(ordinal.to_string()))?,
        (_, value) => {
            return Err(MappingError::TypeMismatch {
                path: path.to_string(),
                expected: format!("enum {}", enum_type.name),
                actual: value.type_name().to_string(),
            });
        }
    };

    Ok(FieldValue::Enum(variant.clone()))
}

/// The raw value of an enum variant, in the type's encoding
pub(crate) fn encode_enum(
    variant: &str,
    enum_type: &EnumType,
    path: &str,
) -> Result<SqlValue, MappingError> {
    let index = enum_type
        .variants
        .iter()
        .position(|v| v == variant)
        .ok_or_else(|| MappingError::InvalidEnum {
            path: path.to_string(),
            enum_name: enum_type.name.clone(),
            value: variant.to_string(),
        })?;

    Ok(match enum_type.encoding {
        EnumEncoding::Name => SqlValue::Text(variant.to_string()),
        EnumEncoding::Ordinal => SqlValue::Text(index.to_string()),
    })
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;

    use super::*;

    #[test]
    fn numeric_widening() {
        assert_eq!(
            coerce(&SqlValue::Int(7), &ScalarType::BigInt, "A.n"),
            Ok(FieldValue::Scalar(SqlValue::BigInt(7)))
        );
        assert_eq!(
            coerce(&SqlValue::BigInt(7), &ScalarType::Int, "A.n"),
            Ok(FieldValue::Scalar(SqlValue::Int(7)))
        );
        assert_eq!(
            coerce(&SqlValue::BigInt(i64::MAX), &ScalarType::Int, "A.n"),
            Err(MappingError::TypeMismatch {
                path: "A.n".to_string(),
                expected: "int".to_string(),
                actual: "bigint".to_string()
            })
        );
        assert_eq!(
            coerce(&SqlValue::Int(1), &ScalarType::Boolean, "A.b"),
            Ok(FieldValue::Scalar(SqlValue::Boolean(true)))
        );
    }

    #[test]
    fn dates_and_timestamps() {
        let date = NaiveDate::from_ymd_opt(2024, 3, 1).unwrap();
        let midnight = date.and_hms_opt(0, 0, 0).unwrap();

        assert_eq!(
            coerce(&SqlValue::Date(date), &ScalarType::Timestamp, "A.t"),
            Ok(FieldValue::Scalar(SqlValue::Timestamp(midnight)))
        );
        assert_eq!(
            coerce(
                &SqlValue::Timestamp(date.and_hms_opt(13, 5, 0).unwrap()),
                &ScalarType::Date,
                "A.d"
            ),
            Ok(FieldValue::Scalar(SqlValue::Date(date)))
        );
    }

    #[test]
    fn enums_by_name_and_ordinal() {
        let by_name = ScalarType::Enum(EnumType::new("Status", &["OPEN", "PAID"]));
        let by_ordinal = ScalarType::Enum(
            EnumType::new("Status", &["OPEN", "PAID"]).with_encoding(EnumEncoding::Ordinal),
        );

        assert_eq!(
            coerce(&SqlValue::from("PAID"), &by_name, "Invoice.status"),
            Ok(FieldValue::Enum("PAID".to_string()))
        );
        assert_eq!(
            coerce(&SqlValue::from("1"), &by_ordinal, "Invoice.status"),
            Ok(FieldValue::Enum("PAID".to_string()))
        );
        assert_eq!(
            coerce(&SqlValue::from("7"), &by_ordinal, "Invoice.status"),
            Err(MappingError::InvalidEnum {
                path: "Invoice.status".to_string(),
                enum_name: "Status".to_string(),
                value: "7".to_string()
            })
        );
        assert!(coerce(&SqlValue::from("x"), &by_ordinal, "Invoice.status").is_err());
    }

    #[test]
    fn enum_encoding() {
        let enum_type =
            EnumType::new("Status", &["OPEN", "PAID"]).with_encoding(EnumEncoding::Ordinal);
        assert_eq!(
            encode_enum("PAID", &enum_type, "Invoice.status"),
            Ok(SqlValue::from("1"))
        );
        assert!(encode_enum("LOST", &enum_type, "Invoice.status").is_err());
    }
}

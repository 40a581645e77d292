// Copyright Exograph, Inc. All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file at the root of this repository.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

use std::fmt::Display;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ScalarType {
    Boolean,
    Int,
    BigInt,
    Double,
    Text,
    Date,
    Timestamp,
    Uuid,
    Bytes,
    Enum(EnumType),
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EnumType {
    pub name: String,
    pub variants: Vec<String>,
    #[serde(default)]
    pub encoding: EnumEncoding,
}

/// How an enum is stored in its column
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum EnumEncoding {
    /// The variant name, such as `SHIPPED`
    #[default]
    Name,
    /// The zero-based variant index as a numeral string, such as `"2"`
    Ordinal,
}

impl EnumType {
    pub fn new(name: impl Into<String>, variants: &[&str]) -> Self {
        Self {
            name: name.into(),
            variants: variants.iter().map(|v| v.to_string()).collect(),
            encoding: EnumEncoding::Name,
        }
    }

    pub fn with_encoding(self, encoding: EnumEncoding) -> Self {
        Self { encoding, ..self }
    }
}

impl Display for ScalarType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ScalarType::Boolean => write!(f, "boolean"),
            ScalarType::Int => write!(f, "int"),
            ScalarType::BigInt => write!(f, "bigint"),
            ScalarType::Double => write!(f, "double"),
            ScalarType::Text => write!(f, "text"),
            ScalarType::Date => write!(f, "date"),
            ScalarType::Timestamp => write!(f, "timestamp"),
            ScalarType::Uuid => write!(f, "uuid"),
            ScalarType::Bytes => write!(f, "bytes"),
            ScalarType::Enum(enum_type) => write!(f, "enum {}", enum_type.name),
        }
    }
}

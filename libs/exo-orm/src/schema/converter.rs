// Copyright Exograph, Inc. All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file at the root of this repository.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

use std::fmt::Debug;

use crate::{FieldValue, SqlValue};

use super::ScalarType;

/// One physical column produced by a [`Converter`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConvertedColumn {
    /// Appended to the field's column name; an empty suffix uses the field's name as is
    pub suffix: String,
    pub typ: ScalarType,
}

impl ConvertedColumn {
    pub fn new(suffix: impl Into<String>, typ: ScalarType) -> Self {
        Self {
            suffix: suffix.into(),
            typ,
        }
    }
}

/// Maps one field value to a fixed number of physical columns and back.
pub trait Converter: Debug + Send + Sync {
    fn columns(&self) -> Vec<ConvertedColumn>;

    /// Combine the raw column values (exactly `columns().len()` of them) into the field's value
    fn from_columns(&self, values: &[SqlValue]) -> Result<FieldValue, String>;

    /// Split a field value into its raw column values
    fn to_columns(&self, value: &FieldValue) -> Result<Vec<SqlValue>, String>;
}

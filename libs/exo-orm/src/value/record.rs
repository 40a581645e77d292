// Copyright Exograph, Inc. All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file at the root of this repository.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

use std::sync::Arc;

use crate::{EntityId, Schema};

use super::{Ref, SqlValue};

/// The value of one field of a reconstructed entity.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum FieldValue {
    Null,
    Scalar(SqlValue),
    /// An enum variant, always held by name regardless of how it is stored
    Enum(String),
    /// A nested composite (inline or joined through a foreign key)
    Record(Arc<Record>),
    /// A deferred reference to another entity
    Ref(Ref),
}

impl FieldValue {
    pub fn scalar(value: impl Into<SqlValue>) -> Self {
        match value.into() {
            SqlValue::Null => FieldValue::Null,
            value => FieldValue::Scalar(value),
        }
    }

    pub fn record(record: Record) -> Self {
        FieldValue::Record(Arc::new(record))
    }

    pub fn is_null(&self) -> bool {
        matches!(self, FieldValue::Null)
    }

    pub fn as_scalar(&self) -> Option<&SqlValue> {
        match self {
            FieldValue::Scalar(value) => Some(value),
            _ => None,
        }
    }

    pub fn as_record(&self) -> Option<&Arc<Record>> {
        match self {
            FieldValue::Record(record) => Some(record),
            _ => None,
        }
    }

    pub fn as_reference(&self) -> Option<&Ref> {
        match self {
            FieldValue::Ref(reference) => Some(reference),
            _ => None,
        }
    }
}

/// An immutable instance of an entity: one value per declared field, in declaration order.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Record {
    entity: EntityId,
    values: Vec<FieldValue>,
}

impl Record {
    pub fn new(entity: EntityId, values: Vec<FieldValue>) -> Self {
        Self { entity, values }
    }

    pub fn entity(&self) -> EntityId {
        self.entity
    }

    pub fn values(&self) -> &[FieldValue] {
        &self.values
    }

    pub fn value(&self, index: usize) -> Option<&FieldValue> {
        self.values.get(index)
    }

    /// Look up a field value by name
    pub fn get(&self, schema: &Schema, field_name: &str) -> Option<&FieldValue> {
        let index = schema.get_entity(self.entity).field_index(field_name)?;
        self.values.get(index)
    }
}

// Copyright Exograph, Inc. All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file at the root of this repository.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

use std::ops::Range;

use serde::{Deserialize, Serialize};

use super::ScalarType;

/// Index of an entity in its [`Schema`](super::Schema)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EntityId(pub(crate) usize);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum EntityKind {
    /// Backed by a table; requires exactly one primary key field
    #[default]
    Table,
    /// A view or other read-only column set; the primary key is optional
    Projection,
    /// Embedded into the entities that use it; has no table of its own
    Inline,
}

#[derive(Debug, Clone, PartialEq)]
pub enum FieldKind {
    Scalar(ScalarType),
    /// Embedded composite, its columns live in the host's table
    Inline(EntityId),
    /// Composite linked through a foreign key; its own columns are the target's key
    ForeignKey(EntityId),
    /// Lazy reference; its own columns are the target's key
    Ref(EntityId),
    /// Backed by the named converter
    Converted(String),
}

#[derive(Debug, Clone)]
pub struct Field {
    pub name: String,
    pub kind: FieldKind,
    pub primary_key: bool,
    pub nullable: bool,
    pub auto_generated: bool,
    pub insertable: bool,
    pub updatable: bool,
    pub(crate) column_names: Vec<String>,
    /// Range of this field's columns in the owning entity's column list
    pub(crate) columns: Range<usize>,
}

impl Field {
    pub fn columns(&self) -> Range<usize> {
        self.columns.clone()
    }

    pub fn width(&self) -> usize {
        self.columns.len()
    }

    /// The entity this field composes or refers to
    pub fn target(&self) -> Option<EntityId> {
        match &self.kind {
            FieldKind::Inline(id) | FieldKind::ForeignKey(id) | FieldKind::Ref(id) => Some(*id),
            _ => None,
        }
    }

    /// Whether this field is stored as the key of another entity
    pub fn is_foreign_key(&self) -> bool {
        matches!(self.kind, FieldKind::ForeignKey(_) | FieldKind::Ref(_))
    }
}

/// A physical column, after flattening inline composites, foreign keys and converters.
#[derive(Debug, Clone, PartialEq)]
pub struct Column {
    pub name: String,
    pub typ: ScalarType,
    pub nullable: bool,
    pub primary_key: bool,
    pub foreign_key: bool,
    pub auto_generated: bool,
    pub insertable: bool,
    pub updatable: bool,
    /// Dot-separated path of the field (through inline composites) this column belongs to
    pub field_path: String,
}

#[derive(Debug)]
pub struct Entity {
    pub name: String,
    /// Table name; for inline entities this is only informational
    pub table_name: String,
    pub kind: EntityKind,
    pub fields: Vec<Field>,
    pub(crate) columns: Vec<Column>,
}

impl Entity {
    pub fn field(&self, name: &str) -> Option<&Field> {
        self.fields.iter().find(|field| field.name == name)
    }

    pub fn field_index(&self, name: &str) -> Option<usize> {
        self.fields.iter().position(|field| field.name == name)
    }

    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    pub fn column_count(&self) -> usize {
        self.columns.len()
    }

    pub fn field_columns(&self, field: &Field) -> &[Column] {
        &self.columns[field.columns()]
    }

    pub fn pk_field_index(&self) -> Option<usize> {
        self.fields.iter().position(|field| field.primary_key)
    }

    pub fn pk_field(&self) -> Option<&Field> {
        self.pk_field_index().map(|index| &self.fields[index])
    }

    /// The primary key columns, empty when there is no primary key
    pub fn pk_columns(&self) -> &[Column] {
        match self.pk_field() {
            Some(field) => self.field_columns(field),
            None => &[],
        }
    }
}

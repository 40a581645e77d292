// Copyright Exograph, Inc. All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file at the root of this repository.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

//! Declarative description of entity types. A [`SchemaSpec`] is turned into an immutable,
//! validated [`Schema`] by [`SchemaSpec::to_schema`].

use std::sync::Arc;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::SchemaError;

use super::{Converter, EntityKind, NamingStrategy, ScalarType, Schema};

#[derive(Debug, Default, Serialize, Deserialize)]
pub struct SchemaSpec {
    pub entities: Vec<EntitySpec>,
    #[serde(skip)]
    pub naming: NamingStrategy,
    #[serde(skip)]
    pub converters: IndexMap<String, Arc<dyn Converter>>,
}

impl SchemaSpec {
    pub fn new(entities: Vec<EntitySpec>) -> Self {
        Self {
            entities,
            ..Default::default()
        }
    }

    pub fn with_naming(self, naming: NamingStrategy) -> Self {
        Self { naming, ..self }
    }

    pub fn with_converter(mut self, name: impl Into<String>, converter: Arc<dyn Converter>) -> Self {
        self.converters.insert(name.into(), converter);
        self
    }

    /// Resolve entity references, validate every entity, and compute physical columns.
    pub fn to_schema(self) -> Result<Schema, SchemaError> {
        Schema::build(self)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntitySpec {
    pub name: String,
    #[serde(default)]
    pub kind: EntityKind,
    /// Overrides the table name the naming strategy would derive
    #[serde(default)]
    pub table: Option<String>,
    pub fields: Vec<FieldSpec>,
}

impl EntitySpec {
    pub fn table(name: impl Into<String>, fields: Vec<FieldSpec>) -> Self {
        Self {
            name: name.into(),
            kind: EntityKind::Table,
            table: None,
            fields,
        }
    }

    pub fn projection(name: impl Into<String>, fields: Vec<FieldSpec>) -> Self {
        Self {
            kind: EntityKind::Projection,
            ..Self::table(name, fields)
        }
    }

    pub fn inline(name: impl Into<String>, fields: Vec<FieldSpec>) -> Self {
        Self {
            kind: EntityKind::Inline,
            ..Self::table(name, fields)
        }
    }

    pub fn with_table_name(self, table: impl Into<String>) -> Self {
        Self {
            table: Some(table.into()),
            ..self
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum FieldTypeSpec {
    Scalar(ScalarType),
    /// Another entity by name. An inline entity is embedded; a table or projection is linked
    /// through a foreign key.
    Composite(String),
    /// A lazily fetched reference to another entity by name
    Ref(String),
    /// A field backed by the named converter
    Converted(String),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldSpec {
    pub name: String,
    pub typ: FieldTypeSpec,
    #[serde(default)]
    pub primary_key: bool,
    #[serde(default)]
    pub foreign_key: bool,
    #[serde(default)]
    pub nullable: bool,
    #[serde(default)]
    pub auto_generated: bool,
    #[serde(default = "default_true")]
    pub insertable: bool,
    #[serde(default = "default_true")]
    pub updatable: bool,
    /// Explicit column names, replacing the derived ones
    #[serde(default)]
    pub columns: Vec<String>,
}

fn default_true() -> bool {
    true
}

impl FieldSpec {
    fn new(name: impl Into<String>, typ: FieldTypeSpec) -> Self {
        Self {
            name: name.into(),
            typ,
            primary_key: false,
            foreign_key: false,
            nullable: false,
            auto_generated: false,
            insertable: true,
            updatable: true,
            columns: vec![],
        }
    }

    pub fn scalar(name: impl Into<String>, typ: ScalarType) -> Self {
        Self::new(name, FieldTypeSpec::Scalar(typ))
    }

    pub fn composite(name: impl Into<String>, entity: impl Into<String>) -> Self {
        Self::new(name, FieldTypeSpec::Composite(entity.into()))
    }

    /// A composite linked through a foreign key
    pub fn foreign_key(name: impl Into<String>, entity: impl Into<String>) -> Self {
        Self {
            foreign_key: true,
            ..Self::composite(name, entity)
        }
    }

    pub fn reference(name: impl Into<String>, entity: impl Into<String>) -> Self {
        Self {
            foreign_key: true,
            ..Self::new(name, FieldTypeSpec::Ref(entity.into()))
        }
    }

    pub fn converted(name: impl Into<String>, converter: impl Into<String>) -> Self {
        Self::new(name, FieldTypeSpec::Converted(converter.into()))
    }

    pub fn pk(self) -> Self {
        Self {
            primary_key: true,
            ..self
        }
    }

    pub fn nullable(self) -> Self {
        Self {
            nullable: true,
            ..self
        }
    }

    /// Generated by the database: skipped in inserts and updates
    pub fn auto_generated(self) -> Self {
        Self {
            auto_generated: true,
            insertable: false,
            updatable: false,
            ..self
        }
    }

    pub fn read_only(self) -> Self {
        Self {
            insertable: false,
            updatable: false,
            ..self
        }
    }

    pub fn with_columns(self, columns: &[&str]) -> Self {
        Self {
            columns: columns.iter().map(|c| c.to_string()).collect(),
            ..self
        }
    }
}

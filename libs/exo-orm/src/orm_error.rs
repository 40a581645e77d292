// Copyright Exograph, Inc. All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file at the root of this repository.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum OrmError {
    #[error("Alias: {0}")]
    Alias(#[from] AliasError),

    #[error("Join: {0}")]
    Join(#[from] JoinError),

    #[error("Schema: {0}")]
    Schema(#[from] SchemaError),

    #[error("Mapping: {0}")]
    Mapping(#[from] MappingError),

    #[error("Parameter: {0}")]
    Parameter(#[from] ParameterError),

    #[error("Usage: {0}")]
    Usage(String),

    #[error("Persistence: {0}")]
    Persistence(#[source] Box<dyn std::error::Error + Send + Sync + 'static>),

    #[error("{0} {1}")]
    WithContext(String, #[source] Box<OrmError>),
}

impl OrmError {
    pub fn with_context(self, context: String) -> OrmError {
        OrmError::WithContext(context, Box::new(self))
    }

    pub fn persistence(error: impl std::error::Error + Send + Sync + 'static) -> OrmError {
        OrmError::Persistence(Box::new(error))
    }

    /// The innermost error, skipping over any context wrappers
    pub fn root(&self) -> &OrmError {
        match self {
            OrmError::WithContext(_, inner) => inner.root(),
            _ => self,
        }
    }
}

pub trait WithContext {
    fn with_context(self, context: String) -> Self;
}

impl<T> WithContext for Result<T, OrmError> {
    fn with_context(self, context: String) -> Result<T, OrmError> {
        self.map_err(|e| e.with_context(context))
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AliasError {
    #[error("Ambiguous reference to `{table}`; specify one of the paths: {}", .paths.join(", "))]
    Ambiguous { table: String, paths: Vec<String> },

    #[error("No alias found for `{table}`{}", .path.as_ref().map(|p| format!(" at path `{p}`")).unwrap_or_default())]
    NotFound { table: String, path: Option<String> },

    #[error("`{table}` is already registered at path `{path}` in this scope")]
    DuplicatePath { table: String, path: String },

    #[error("Alias `{alias}` is already in use in this scope (requested for `{table}`)")]
    AliasInUse { alias: String, table: String },

    #[error("`{alias}` is not a live alias of `{table}`")]
    UnknownAlias { table: String, alias: String },

    #[error("Alias naming strategy failed for `{table}`: {reason}")]
    InvalidStrategyAlias { table: String, reason: String },
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum JoinError {
    #[error("No matching foreign key between `{from}` and `{to}`")]
    NoRelation { from: String, to: String },

    #[error("Ambiguous relation between `{from}` and `{to}`: {}", .fields.join(", "))]
    AmbiguousRelation {
        from: String,
        to: String,
        fields: Vec<String>,
    },

    #[error(
        "PK/FK column count mismatch for `{field}`: {fk_columns} foreign key column(s), {pk_columns} primary key column(s)"
    )]
    ColumnCountMismatch {
        field: String,
        fk_columns: usize,
        pk_columns: usize,
    },
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SchemaError {
    #[error("Entity `{0}` is defined more than once")]
    DuplicateEntity(String),

    #[error("Unknown entity `{0}`")]
    UnknownEntity(String),

    #[error("Unknown converter `{converter}` used by `{field}`")]
    UnknownConverter { field: String, converter: String },

    #[error("Cyclic composition: {}", .0.join(" -> "))]
    Cycle(Vec<String>),

    #[error("`{entity}` declares more than one primary key: {}", .fields.join(", "))]
    MultiplePrimaryKeys { entity: String, fields: Vec<String> },

    #[error("`{0}` has no primary key")]
    MissingPrimaryKey(String),

    #[error("`{field}` refers to `{target}`, whose primary key is compound")]
    CompoundForeignKey { field: String, target: String },

    #[error("Converter-backed field `{0}` cannot be a primary or foreign key")]
    ConverterKey(String),

    #[error("Invalid foreign key `{field}`: {reason}")]
    InvalidForeignKey { field: String, reason: String },

    #[error(
        "Foreign key `{field}` declares {fk_columns} column(s) for a key of {pk_columns} column(s)"
    )]
    ForeignKeyColumnCount {
        field: String,
        fk_columns: usize,
        pk_columns: usize,
    },

    #[error("Inline type `{entity}` cannot declare a primary key (`{field}`)")]
    InlinePrimaryKey { entity: String, field: String },

    #[error("Unknown field `{field}` in `{entity}`")]
    UnknownField { entity: String, field: String },
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MappingError {
    #[error("Row for `{entity}` has {actual} column(s), expected {expected}")]
    ColumnCount {
        entity: String,
        expected: usize,
        actual: usize,
    },

    #[error("Null value for non-nullable `{path}`")]
    NullValue { path: String },

    #[error("Invalid value `{value}` for enum `{enum_name}` at `{path}`")]
    InvalidEnum {
        path: String,
        enum_name: String,
        value: String,
    },

    #[error("Cannot convert {actual} to {expected} at `{path}`")]
    TypeMismatch {
        path: String,
        expected: String,
        actual: String,
    },

    #[error("Converter failed at `{path}`: {message}")]
    Converter { path: String, message: String },
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ParameterError {
    #[error("Positional parameters must start at 1 (lowest index is {0})")]
    PositionalStart(usize),

    #[error("Positional parameter {0} is missing")]
    PositionalGap(usize),

    #[error("Named parameter `{0}` is bound to two different values")]
    ConflictingNamed(String),

    #[error("Positional parameter {0} is bound to two different values")]
    ConflictingPositional(usize),

    #[error("Positional and named parameters cannot be mixed in one statement")]
    MixedStyles,

    #[error("No value for bind variable `{0}`")]
    UnboundVariable(String),
}

// Copyright Exograph, Inc. All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file at the root of this repository.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

//! Query compilation and result mapping for an object-relational mapper.
//!
//! A query is a sequence of typed [`asql::Element`]s. [`transform::TemplateCompiler`] resolves
//! their table references to aliases, infers joins from the schema's foreign keys and renders SQL
//! with its parameters. Rows coming back are turned into [`Record`]s by
//! [`mapping::RowMapper`], usually through a [`mapping::ResultStream`].

#[macro_use]
pub mod sql;

pub mod asql;
pub mod config;
pub mod mapping;
pub mod schema;
pub mod transform;

mod orm_error;
mod value;

pub use config::{CompileOptions, StatementObserver};
pub use orm_error::{
    AliasError, JoinError, MappingError, OrmError, ParameterError, SchemaError, WithContext,
};
pub use schema::{EntityId, Schema};
pub use value::{FieldValue, Record, Ref, RefFetcher, SqlValue};

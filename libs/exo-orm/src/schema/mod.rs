// Copyright Exograph, Inc. All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file at the root of this repository.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

//! The static schema model: entity types, their fields and the physical columns they flatten to.

mod converter;
mod entity;
mod model;
mod naming;
mod scalar_type;
mod spec;
mod validation;

pub use converter::{ConvertedColumn, Converter};
pub use entity::{Column, Entity, EntityId, EntityKind, Field, FieldKind};
pub use model::Schema;
pub use naming::{
    AliasNameResolver, ColumnNameResolver, NamingStrategy, SnakeCaseNaming, TableNameResolver,
    default_alias,
};
pub use scalar_type::{EnumEncoding, EnumType, ScalarType};
pub use spec::{EntitySpec, FieldSpec, FieldTypeSpec, SchemaSpec};

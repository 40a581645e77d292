// Copyright Exograph, Inc. All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file at the root of this repository.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

//! The compile phase: turns a sequence of elements into SQL text and parameters, resolving
//! aliases across scopes and inferring joins from foreign keys.

mod alias_resolver;
mod column_path;
mod compiler;
mod emit;
mod join_path;
mod table_use;

#[cfg(test)]
pub(crate) mod test_util;

pub use alias_resolver::{AliasEntry, AliasResolver, ScopeId};
pub use column_path::{ResolvedColumns, field_columns, find_field, join_path, resolve_column};
pub use compiler::{CompiledStatement, Safety, TemplateCompiler};
pub use join_path::{Relation, build_join_condition, find_relation, foreign_keys};
pub use table_use::TableUse;

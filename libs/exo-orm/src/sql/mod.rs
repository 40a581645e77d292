// Copyright Exograph, Inc. All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file at the root of this repository.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

//! Low-level SQL building blocks. Everything here renders into a [`SQLBuilder`]; nothing here
//! knows about aliases scopes or templates.

#[macro_use]
#[cfg(test)]
pub(crate) mod test_util;

mod column;
mod dialect;
mod expression_builder;
mod join;
mod param;
mod predicate;
mod sql_builder;
mod table;

pub use column::Column;
pub use dialect::Dialect;
pub use expression_builder::ExpressionBuilder;
pub use join::{ColumnEquality, Join, JoinCondition, JoinKind};
pub use param::{ParamSlot, ParamStyle, Parameters};
pub use predicate::{CompareOp, Predicate};
pub use sql_builder::{ConditionKey, SQLBuilder};
pub use table::Table;

pub(crate) use param::collect_parameters;

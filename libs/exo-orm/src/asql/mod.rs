// Copyright Exograph, Inc. All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file at the root of this repository.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

//! Typed query elements, as produced by a template front end, and the immutable template that
//! holds them.

mod element;
mod template;

pub use element::{
    ColumnRef, Element, JoinElement, JoinOn, JoinTarget, Operator, Param, ScopeFilter, SelectMode,
    SetClause, TableRef, ValuesClause, WhereClause, WhereTarget,
};
pub use template::QueryTemplate;

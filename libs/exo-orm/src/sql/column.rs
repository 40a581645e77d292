// Copyright Exograph, Inc. All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file at the root of this repository.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

use super::{ExpressionBuilder, ParamSlot, SQLBuilder};

/// A column-like concept: anything that can stand on either side of a comparison.
#[derive(Debug, Clone, PartialEq)]
pub enum Column {
    /// A physical column, qualified by its table's alias (or table name)
    Physical { qualifier: String, name: String },
    /// A literal value, mapped to a placeholder to avoid SQL injection
    Param(ParamSlot),
    Null,
}

impl Column {
    pub fn physical(qualifier: impl Into<String>, name: impl Into<String>) -> Self {
        Self::Physical {
            qualifier: qualifier.into(),
            name: name.into(),
        }
    }
}

impl ExpressionBuilder for Column {
    fn build(&self, builder: &mut SQLBuilder) {
        match self {
            Column::Physical { qualifier, name } => builder.push_column(qualifier, name),
            Column::Param(param) => builder.push_param(param.clone()),
            Column::Null => builder.push_str("NULL"),
        }
    }
}

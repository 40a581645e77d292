// Copyright Exograph, Inc. All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file at the root of this repository.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

use super::{ExpressionBuilder, SQLBuilder};

/// A physical table with its alias, as in `"orders" AS "_o"`.
#[derive(Debug, Clone, PartialEq)]
pub struct Table {
    pub name: String,
    /// Empty when the table is referred to by its own name
    pub alias: String,
}

impl Table {
    pub fn new(name: impl Into<String>, alias: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            alias: alias.into(),
        }
    }
}

impl ExpressionBuilder for Table {
    fn build(&self, builder: &mut SQLBuilder) {
        builder.push_identifier(&self.name);

        // This avoids unnecessary aliasing like `SELECT * FROM orders AS orders`
        if !self.alias.is_empty() && self.alias != self.name {
            builder.push_str(" AS ");
            builder.push_identifier(&self.alias);
        }
    }
}

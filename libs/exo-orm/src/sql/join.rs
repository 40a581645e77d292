// Copyright Exograph, Inc. All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file at the root of this repository.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

use maybe_owned::MaybeOwned;
use serde::{Deserialize, Serialize};

use super::{Column, ExpressionBuilder, SQLBuilder, Table};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum JoinKind {
    Inner,
    Left,
    Right,
    Full,
    Cross,
}

impl JoinKind {
    pub(crate) fn keyword(&self) -> &'static str {
        match self {
            JoinKind::Inner => "INNER JOIN",
            JoinKind::Left => "LEFT JOIN",
            JoinKind::Right => "RIGHT JOIN",
            JoinKind::Full => "FULL JOIN",
            JoinKind::Cross => "CROSS JOIN",
        }
    }
}

/// `child.fk_column = parent.pk_column`
#[derive(Debug, Clone, PartialEq)]
pub struct ColumnEquality {
    pub left: Column,
    pub right: Column,
}

impl ExpressionBuilder for ColumnEquality {
    fn build(&self, builder: &mut SQLBuilder) {
        self.left.build(builder);
        builder.push_str(" = ");
        self.right.build(builder);
    }
}

/// The ON condition derived from a foreign key: one equality per key column, conjoined with AND
/// in declaration order.
#[derive(Debug, Clone, PartialEq)]
pub struct JoinCondition {
    pub equalities: Vec<ColumnEquality>,
}

impl ExpressionBuilder for JoinCondition {
    fn build(&self, builder: &mut SQLBuilder) {
        builder.push_elems(&self.equalities, " AND ");
    }
}

/// Represents a join to a table, such as `LEFT JOIN "customers" AS "_c" ON "_o"."customer_id" = "_c"."id"`.
#[derive(Debug, PartialEq)]
pub struct Join<'a> {
    kind: JoinKind,
    table: Table,
    /// Absent for cross joins and for conditions rendered by the caller
    condition: Option<MaybeOwned<'a, JoinCondition>>,
}

impl<'a> Join<'a> {
    pub fn new(
        kind: JoinKind,
        table: Table,
        condition: Option<MaybeOwned<'a, JoinCondition>>,
    ) -> Self {
        Join {
            kind,
            table,
            condition,
        }
    }

    pub fn table(&self) -> &Table {
        &self.table
    }
}

impl ExpressionBuilder for Join<'_> {
    /// Build expression of the form `<kind> JOIN <table> ON <condition>`.
    fn build(&self, builder: &mut SQLBuilder) {
        builder.push_str(self.kind.keyword());
        builder.push_space();
        self.table.build(builder);
        if let Some(condition) = &self.condition {
            builder.push_str(" ON ");
            condition.build(builder);
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::sql::Dialect;

    use super::*;

    #[test]
    fn basic_join() {
        let condition = JoinCondition {
            equalities: vec![ColumnEquality {
                left: Column::physical("_o", "customer_id"),
                right: Column::physical("_c", "id"),
            }],
        };
        let join = Join::new(
            JoinKind::Left,
            Table::new("customers", "_c"),
            Some((&condition).into()),
        );

        assert_binding!(
            join.to_sql(Dialect::Postgres),
            r#"LEFT JOIN "customers" AS "_c" ON "_o"."customer_id" = "_c"."id""#
        );
    }

    #[test]
    fn compound_condition() {
        let condition = JoinCondition {
            equalities: vec![
                ColumnEquality {
                    left: Column::physical("_l", "order_id"),
                    right: Column::physical("_o", "id"),
                },
                ColumnEquality {
                    left: Column::physical("_l", "region"),
                    right: Column::physical("_o", "region"),
                },
            ],
        };
        let join = Join::new(JoinKind::Inner, Table::new("orders", "_o"), Some(condition.into()));

        assert_binding!(
            join.to_sql(Dialect::MySql),
            "INNER JOIN `orders` AS `_o` ON `_l`.`order_id` = `_o`.`id` AND `_l`.`region` = `_o`.`region`"
        );
    }
}

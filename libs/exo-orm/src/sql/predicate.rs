// Copyright Exograph, Inc. All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file at the root of this repository.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

use super::{Column, ExpressionBuilder, ParamSlot, SQLBuilder};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompareOp {
    Eq,
    Neq,
    Lt,
    Lte,
    Gt,
    Gte,
    Like,
}

impl CompareOp {
    fn sql(&self) -> &'static str {
        match self {
            CompareOp::Eq => "=",
            CompareOp::Neq => "<>",
            CompareOp::Lt => "<",
            CompareOp::Lte => "<=",
            CompareOp::Gt => ">",
            CompareOp::Gte => ">=",
            CompareOp::Like => "LIKE",
        }
    }
}

/// A predicate is a boolean expression that can be used in a WHERE clause.
#[derive(Debug, PartialEq, Clone)]
pub enum Predicate {
    True,
    False,
    Compare(Column, CompareOp, Column),
    In(Column, Vec<Column>),
    NotIn(Column, Vec<Column>),
    Between(Column, Column, Column),
    IsNull(Column),
    IsNotNull(Column),

    // Prefer Predicate::and(), which simplifies the clause
    And(Box<Predicate>, Box<Predicate>),
    // Prefer Predicate::or(), which simplifies the clause
    Or(Box<Predicate>, Box<Predicate>),
    Not(Box<Predicate>),
}

impl Predicate {
    /// Compare two columns and reduce to a simpler predicate if possible.
    pub fn eq(lhs: Column, rhs: Column) -> Predicate {
        if lhs == rhs {
            Predicate::True
        } else {
            match param_eq(&lhs, &rhs) {
                Some(false) => Predicate::False,
                _ => Predicate::Compare(lhs, CompareOp::Eq, rhs),
            }
        }
    }

    pub fn compare(lhs: Column, op: CompareOp, rhs: Column) -> Predicate {
        match op {
            CompareOp::Eq => Self::eq(lhs, rhs),
            op => Predicate::Compare(lhs, op, rhs),
        }
    }

    /// `lhs IN (...)`; an empty list matches nothing
    pub fn in_list(lhs: Column, rhs: Vec<Column>) -> Predicate {
        if rhs.is_empty() {
            Predicate::False
        } else {
            Predicate::In(lhs, rhs)
        }
    }

    /// `lhs NOT IN (...)`; an empty list matches everything
    pub fn not_in_list(lhs: Column, rhs: Vec<Column>) -> Predicate {
        if rhs.is_empty() {
            Predicate::True
        } else {
            Predicate::NotIn(lhs, rhs)
        }
    }

    /// Logical and of two predicates, reducing to a simpler predicate if possible.
    pub fn and(lhs: Predicate, rhs: Predicate) -> Predicate {
        match (lhs, rhs) {
            (Predicate::False, _) | (_, Predicate::False) => Predicate::False,
            (Predicate::True, rhs) => rhs,
            (lhs, Predicate::True) => lhs,
            (lhs, rhs) if lhs == rhs => lhs,
            (lhs, rhs) => Predicate::And(Box::new(lhs), Box::new(rhs)),
        }
    }

    /// Logical or of two predicates, reducing to a simpler predicate if possible.
    pub fn or(lhs: Predicate, rhs: Predicate) -> Predicate {
        match (lhs, rhs) {
            (Predicate::True, _) | (_, Predicate::True) => Predicate::True,
            (Predicate::False, rhs) => rhs,
            (lhs, Predicate::False) => lhs,
            (lhs, rhs) if lhs == rhs => lhs,
            (lhs, rhs) => Predicate::Or(Box::new(lhs), Box::new(rhs)),
        }
    }

    pub fn and_all(predicates: impl IntoIterator<Item = Predicate>) -> Predicate {
        predicates.into_iter().fold(Predicate::True, Predicate::and)
    }

    pub fn or_all(predicates: impl IntoIterator<Item = Predicate>) -> Predicate {
        predicates.into_iter().fold(Predicate::False, Predicate::or)
    }
}

impl std::ops::Not for Predicate {
    type Output = Predicate;

    fn not(self) -> Self::Output {
        match self {
            Predicate::True => Predicate::False,
            Predicate::False => Predicate::True,
            Predicate::IsNull(column) => Predicate::IsNotNull(column),
            Predicate::IsNotNull(column) => Predicate::IsNull(column),
            Predicate::In(lhs, rhs) => Predicate::NotIn(lhs, rhs),
            Predicate::NotIn(lhs, rhs) => Predicate::In(lhs, rhs),
            predicate => Predicate::Not(Box::new(predicate)),
        }
    }
}

/// Compare two literal parameters so that a predicate can be reduced before reaching the
/// database. Returns `None` if either side is not a literal.
fn param_eq(lhs: &Column, rhs: &Column) -> Option<bool> {
    match (lhs, rhs) {
        (Column::Param(ParamSlot::Anonymous(v1)), Column::Param(ParamSlot::Anonymous(v2))) => {
            Some(v1 == v2)
        }
        _ => None,
    }
}

impl ExpressionBuilder for Predicate {
    /// Build a predicate into a SQL string.
    fn build(&self, builder: &mut SQLBuilder) {
        match self {
            Predicate::True => builder.push_str("TRUE"),
            Predicate::False => builder.push_str("FALSE"),
            Predicate::Compare(lhs, op, rhs) => {
                match (op, rhs) {
                    (CompareOp::Eq, Column::Null) => {
                        lhs.build(builder);
                        builder.push_str(" IS NULL");
                    }
                    (CompareOp::Neq, Column::Null) => {
                        lhs.build(builder);
                        builder.push_str(" IS NOT NULL");
                    }
                    _ => relational_combine(lhs, rhs, op.sql(), builder),
                }
            }
            Predicate::In(lhs, rhs) => list_combine(lhs, rhs, "IN", builder),
            Predicate::NotIn(lhs, rhs) => list_combine(lhs, rhs, "NOT IN", builder),
            Predicate::Between(column, low, high) => {
                column.build(builder);
                builder.push_str(" BETWEEN ");
                low.build(builder);
                builder.push_str(" AND ");
                high.build(builder);
            }
            Predicate::IsNull(column) => {
                column.build(builder);
                builder.push_str(" IS NULL");
            }
            Predicate::IsNotNull(column) => {
                column.build(builder);
                builder.push_str(" IS NOT NULL");
            }
            Predicate::And(lhs, rhs) => logical_combine(lhs, rhs, "AND", builder),
            Predicate::Or(lhs, rhs) => logical_combine(lhs, rhs, "OR", builder),
            Predicate::Not(predicate) => {
                builder.push_str("NOT(");
                predicate.build(builder);
                builder.push(')');
            }
        }
    }
}

/// Combine two expressions with a relational operator.
fn relational_combine<E1: ExpressionBuilder, E2: ExpressionBuilder>(
    left: &E1,
    right: &E2,
    op: &'static str,
    builder: &mut SQLBuilder,
) {
    left.build(builder);
    builder.push_space();
    builder.push_str(op);
    builder.push_space();
    right.build(builder);
}

fn list_combine(left: &Column, right: &[Column], op: &'static str, builder: &mut SQLBuilder) {
    left.build(builder);
    builder.push_space();
    builder.push_str(op);
    builder.push_str(" (");
    builder.push_elems(right, ", ");
    builder.push(')');
}

/// Combine two expressions with a logical binary operator.
fn logical_combine<E1: ExpressionBuilder, E2: ExpressionBuilder>(
    left: &E1,
    right: &E2,
    op: &'static str,
    builder: &mut SQLBuilder,
) {
    builder.push('(');
    left.build(builder);
    builder.push_space();
    builder.push_str(op);
    builder.push_space();
    right.build(builder);
    builder.push(')');
}

// Copyright Exograph, Inc. All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file at the root of this repository.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

use serde::{Deserialize, Serialize};

use crate::sql::JoinKind;
use crate::{EntityId, FieldValue, Record, SqlValue};

/// Which columns a select list covers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SelectMode {
    /// Every column, recursing into composites linked through foreign keys
    Full,
    /// Primary key columns only
    Pk,
    /// The entity's own columns; foreign-key composites are represented by their key columns
    Nested,
}

/// Which alias scopes a lookup may consult
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ScopeFilter {
    /// The current scope only
    Inner,
    /// Enclosing scopes only
    Outer,
    /// The current scope, then enclosing ones; the nearest match wins
    #[default]
    Cascade,
}

/// An occurrence of a table. Without a path, the lookup must resolve to a single occurrence.
#[derive(Debug, Clone, PartialEq)]
pub struct TableRef {
    pub entity: EntityId,
    pub path: Option<String>,
    pub scope: ScopeFilter,
}

impl TableRef {
    pub fn new(entity: EntityId) -> Self {
        Self {
            entity,
            path: None,
            scope: ScopeFilter::default(),
        }
    }

    pub fn at(self, path: impl Into<String>) -> Self {
        Self {
            path: Some(path.into()),
            ..self
        }
    }

    pub fn in_scope(self, scope: ScopeFilter) -> Self {
        Self { scope, ..self }
    }
}

/// A reference to a field's column(s). `field` is a dot-separated path through inline
/// composites, such as `home.street`. For an inline entity, `path` selects which occurrence of it
/// is meant.
#[derive(Debug, Clone, PartialEq)]
pub struct ColumnRef {
    pub entity: EntityId,
    pub field: String,
    pub path: Option<String>,
    pub scope: ScopeFilter,
}

impl ColumnRef {
    pub fn new(entity: EntityId, field: impl Into<String>) -> Self {
        Self {
            entity,
            field: field.into(),
            path: None,
            scope: ScopeFilter::default(),
        }
    }

    pub fn at(self, path: impl Into<String>) -> Self {
        Self {
            path: Some(path.into()),
            ..self
        }
    }

    pub fn in_scope(self, scope: ScopeFilter) -> Self {
        Self { scope, ..self }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Element {
    /// Literal SQL, emitted verbatim
    Sql(String),
    /// The column list of an entity occurrence
    Select {
        entity: EntityId,
        mode: SelectMode,
        path: Option<String>,
    },
    /// The root table of a query, followed by the joins its foreign keys imply (emitted only if
    /// referenced) when `auto_join` is set
    From {
        entity: EntityId,
        alias: Option<String>,
        auto_join: bool,
    },
    /// A table with its alias, as in a comma-separated FROM list
    Table {
        entity: EntityId,
        alias: Option<String>,
        path: Option<String>,
    },
    /// Just the alias of a table occurrence (or its name when it has no alias)
    Alias(TableRef),
    Column(ColumnRef),
    Join(JoinElement),
    /// `table (columns)` for the insertable columns
    Insert { entity: EntityId },
    Values(ValuesClause),
    Update {
        entity: EntityId,
        alias: Option<String>,
    },
    Set(SetClause),
    Delete {
        entity: EntityId,
        alias: Option<String>,
    },
    Where(WhereClause),
    Param(Param),
    /// A parenthesized query in its own alias scope
    Subquery {
        elements: Vec<Element>,
        /// Whether the subquery may refer to the enclosing query's aliases
        correlated: bool,
    },
}

impl Element {
    pub fn sql(sql: impl Into<String>) -> Self {
        Element::Sql(sql.into())
    }

    pub fn select(entity: EntityId, mode: SelectMode) -> Self {
        Element::Select {
            entity,
            mode,
            path: None,
        }
    }

    /// `From` with automatic joins
    pub fn from_entity(entity: EntityId) -> Self {
        Element::From {
            entity,
            alias: None,
            auto_join: true,
        }
    }

    pub fn column(entity: EntityId, field: impl Into<String>) -> Self {
        Element::Column(ColumnRef::new(entity, field))
    }

    pub fn value(value: impl Into<SqlValue>) -> Self {
        Element::Param(Param::Value(value.into()))
    }

    pub fn where_object(target: WhereTarget, operator: Operator, operands: Vec<FieldValue>) -> Self {
        Element::Where(WhereClause::Object {
            target,
            operator,
            operands,
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct JoinElement {
    pub kind: JoinKind,
    pub target: JoinTarget,
    pub alias: Option<String>,
    /// Path to register the joined occurrence at; derived from the relation when absent
    pub path: Option<String>,
    pub on: JoinOn,
    /// Automatic joins are emitted only if the joined alias is referenced
    pub auto: bool,
}

impl JoinElement {
    /// A join on the foreign key between the query's root and `entity`
    pub fn relation(kind: JoinKind, entity: EntityId) -> Self {
        Self {
            kind,
            target: JoinTarget::Entity(entity),
            alias: None,
            path: None,
            on: JoinOn::Relation { source: None },
            auto: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum JoinTarget {
    Entity(EntityId),
    /// A derived table whose rows have the shape of `entity`
    Subquery {
        entity: EntityId,
        elements: Vec<Element>,
        correlated: bool,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub enum JoinOn {
    /// Infer the condition from the foreign key between `source` (the query root when absent)
    /// and the target
    Relation { source: Option<TableRef> },
    Template(Vec<Element>),
    None,
}

#[derive(Debug, Clone, PartialEq)]
pub enum SetClause {
    /// `column = ?` for every updatable column, valued from the record
    Record(Record),
    /// `column = :column` for every updatable column, bound per record later
    BindVars { entity: EntityId },
}

#[derive(Debug, Clone, PartialEq)]
pub enum ValuesClause {
    Records(Vec<Record>),
    BindVars { entity: EntityId },
}

#[derive(Debug, Clone, PartialEq)]
pub enum WhereClause {
    Template(Vec<Element>),
    Object {
        target: WhereTarget,
        operator: Operator,
        operands: Vec<FieldValue>,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub enum WhereTarget {
    Column(ColumnRef),
    /// Compare an entity occurrence by its primary key
    Entity(TableRef),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Operator {
    Eq,
    Neq,
    Lt,
    Lte,
    Gt,
    Gte,
    Like,
    In,
    NotIn,
    Between,
    IsNull,
    IsNotNull,
}

impl Operator {
    /// Number of operands the operator takes; `None` for any number
    pub fn arity(&self) -> Option<usize> {
        match self {
            Operator::In | Operator::NotIn => None,
            Operator::Between => Some(2),
            Operator::IsNull | Operator::IsNotNull => Some(0),
            _ => Some(1),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Param {
    /// 1-based
    Positional(usize, SqlValue),
    Named(String, SqlValue),
    Value(SqlValue),
}

// Copyright Exograph, Inc. All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file at the root of this repository.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

//! Rendering of each element kind. Clause elements (`Select`, `From`, `Where`, ...) render their
//! own keyword; reference elements (`Column`, `Alias`, `Param`, ...) render just themselves.

mod dml;
mod from;
mod select;
mod where_clause;

use crate::asql::{Element, Param, TableRef};
use crate::sql::{ExpressionBuilder, ParamSlot, Table};
use crate::{EntityId, OrmError};

use super::ScopeId;
use super::compiler::Compilation;

impl Compilation<'_> {
    /// Emit elements in order. Consecutive structural elements are separated by a space; literal
    /// SQL is emitted verbatim, with no space added on either side.
    pub(in crate::transform) fn emit(&mut self, elements: &[Element]) -> Result<(), OrmError> {
        let mut previous_literal = true;

        for element in elements {
            let literal = matches!(element, Element::Sql(_));
            let separate = !literal && !previous_literal;

            match element {
                // The separator belongs to the join, which may be dropped
                Element::Join(join) if join.auto => self.emit_join(join, separate)?,
                element => {
                    if separate {
                        self.builder.push_space();
                    }
                    self.emit_element(element)?;
                }
            }
            previous_literal = literal;
        }
        Ok(())
    }

    fn emit_element(&mut self, element: &Element) -> Result<(), OrmError> {
        match element {
            Element::Sql(sql) => self.builder.push_str(sql),
            Element::Select { entity, mode, path } => {
                self.emit_select(*entity, *mode, path.as_deref())?
            }
            Element::From {
                entity, auto_join, ..
            } => self.emit_from(*entity, *auto_join)?,
            Element::Table { entity, path, .. } => {
                let table = self.table_at(*entity, path.as_deref().unwrap_or(""))?;
                table.build(&mut self.builder);
            }
            Element::Alias(table) => self.emit_alias(table)?,
            Element::Column(column) => self.emit_column(column)?,
            Element::Join(join) => self.emit_join(join, false)?,
            Element::Insert { entity } => self.emit_insert(*entity),
            Element::Values(values) => self.emit_values(values)?,
            Element::Update { entity, .. } => self.emit_update(*entity)?,
            Element::Set(set) => self.emit_set(set)?,
            Element::Delete { entity, .. } => self.emit_delete(*entity)?,
            Element::Where(clause) => self.emit_where(clause)?,
            Element::Param(param) => self.builder.push_param(match param {
                Param::Positional(index, value) => ParamSlot::Positional(*index, value.clone()),
                Param::Named(name, value) => ParamSlot::Named(name.clone(), value.clone()),
                Param::Value(value) => ParamSlot::Anonymous(value.clone()),
            }),
            Element::Subquery { elements, .. } => self.emit_subquery(elements)?,
        }
        Ok(())
    }

    /// `(...)`, compiled in the scope registration created for it
    fn emit_subquery(&mut self, elements: &[Element]) -> Result<(), OrmError> {
        let scope = self.next_subquery()?;

        self.resolver.enter_scope(scope);
        self.builder.push('(');
        let result = self.emit(elements);
        self.builder.push(')');
        self.resolver.pop_scope();

        result
    }

    fn next_subquery(&mut self) -> Result<ScopeId, OrmError> {
        self.subqueries
            .pop_front()
            .ok_or_else(|| OrmError::Usage("Subquery was not registered".to_string()))
    }

    fn emit_alias(&mut self, table: &TableRef) -> Result<(), OrmError> {
        let (_, entry) = self
            .resolver
            .find_binding(table.entity, table.path.as_deref(), table.scope)?;
        let alias = entry.alias.clone();

        self.resolver.use_alias(table.entity, &alias, table.scope)?;
        let qualifier = self.resolver.qualifier(table.entity, &alias);
        self.builder.push_identifier(qualifier);
        Ok(())
    }

    /// The occurrence of `entity` registered at `path` in the current scope, as a table with its
    /// alias
    fn table_at(&self, entity: EntityId, path: &str) -> Result<Table, OrmError> {
        let (_, entry) =
            self.resolver
                .find_binding(entity, Some(path), crate::asql::ScopeFilter::Inner)?;
        Ok(Table::new(
            &self.schema.get_entity(entity).table_name,
            &entry.alias,
        ))
    }
}

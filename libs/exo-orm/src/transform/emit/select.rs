// Copyright Exograph, Inc. All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file at the root of this repository.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

use crate::asql::{ColumnRef, ScopeFilter, SelectMode};
use crate::schema::FieldKind;
use crate::sql::Column;
use crate::transform::column_path::{join_path, resolve_column};
use crate::transform::compiler::Compilation;
use crate::{EntityId, OrmError};

impl Compilation<'_> {
    /// `SELECT` and the column list of an occurrence. The columns line up with the row plan of the
    /// same entity and mode.
    pub(super) fn emit_select(
        &mut self,
        entity: EntityId,
        mode: SelectMode,
        path: Option<&str>,
    ) -> Result<(), OrmError> {
        let (_, entry) = self
            .resolver
            .find_binding(entity, path, ScopeFilter::Cascade)?;
        let (path, alias) = (entry.path.clone(), entry.alias.clone());

        let mut columns = vec![];
        self.select_columns(entity, &path, &alias, mode, &mut columns)?;

        self.builder.push_str("SELECT ");
        self.builder.push_elems(&columns, ", ");
        Ok(())
    }

    fn select_columns(
        &mut self,
        entity: EntityId,
        path: &str,
        alias: &str,
        mode: SelectMode,
        columns: &mut Vec<Column>,
    ) -> Result<(), OrmError> {
        self.resolver
            .use_alias(entity, alias, ScopeFilter::Cascade)?;
        let qualifier = self.resolver.qualifier(entity, alias);
        let physical = |column: &crate::schema::Column| Column::physical(&qualifier, &column.name);

        match mode {
            SelectMode::Pk => {
                columns.extend(self.schema.require_pk_columns(entity)?.iter().map(physical));
            }
            SelectMode::Nested => {
                columns.extend(self.schema.get_entity(entity).columns().iter().map(physical));
            }
            SelectMode::Full => {
                self.full_columns(entity, entity, path, "", 0, &qualifier, columns)?;
            }
        }
        Ok(())
    }

    /// Columns of `current` (the occurrence's entity, or an inline composite within it at
    /// `prefix`), with the columns of each foreign-key composite taken from its joined occurrence
    #[allow(clippy::too_many_arguments)]
    fn full_columns(
        &mut self,
        entity: EntityId,
        current: EntityId,
        path: &str,
        prefix: &str,
        offset: usize,
        qualifier: &str,
        columns: &mut Vec<Column>,
    ) -> Result<(), OrmError> {
        let schema = self.schema;
        let host_columns = schema.get_entity(entity).columns();

        for field in &schema.get_entity(current).fields {
            let range = offset + field.columns().start..offset + field.columns().end;

            match field.kind {
                FieldKind::Inline(inline) => {
                    let prefix = join_path(prefix, &field.name);
                    self.full_columns(entity, inline, path, &prefix, range.start, qualifier, columns)?;
                }
                FieldKind::ForeignKey(target) => {
                    let target_path = join_path(path, &join_path(prefix, &field.name));
                    let (_, entry) = self.resolver.find_binding(
                        target,
                        Some(&target_path),
                        ScopeFilter::Cascade,
                    )?;
                    let alias = entry.alias.clone();
                    self.select_columns(target, &target_path, &alias, SelectMode::Full, columns)?;
                }
                _ => columns.extend(
                    host_columns[range]
                        .iter()
                        .map(|column| Column::physical(qualifier, &column.name)),
                ),
            }
        }
        Ok(())
    }

    /// The qualified column(s) of a field, separated by commas
    pub(super) fn emit_column(&mut self, column: &ColumnRef) -> Result<(), OrmError> {
        let resolved = resolve_column(self.schema, &mut self.resolver, column)?;
        let columns: Vec<_> = resolved
            .columns
            .iter()
            .map(|column| Column::physical(&resolved.qualifier, &column.name))
            .collect();

        self.builder.push_elems(&columns, ", ");
        Ok(())
    }
}

// Copyright Exograph, Inc. All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file at the root of this repository.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

use tracing::trace;

use crate::asql::{JoinElement, JoinOn, JoinTarget, ScopeFilter};
use crate::sql::{ConditionKey, ExpressionBuilder, Join, SQLBuilder};
use crate::transform::compiler::Compilation;
use crate::transform::join_path::build_join_condition;
use crate::{EntityId, OrmError};

impl Compilation<'_> {
    /// `FROM table AS alias`, followed by the automatic joins planned for it. Each of those is
    /// kept only if its alias ends up referenced.
    pub(super) fn emit_from(&mut self, entity: EntityId, auto_join: bool) -> Result<(), OrmError> {
        let table = self.table_at(entity, "")?;
        self.builder.push_str("FROM ");
        table.build(&mut self.builder);

        if auto_join {
            let joins = self.auto_joins.pop_front().unwrap_or_default();
            trace!(count = joins.len(), "Planned automatic joins");

            for auto_join in joins {
                let key = ConditionKey {
                    scope: auto_join.scope,
                    alias: auto_join.qualifier,
                };
                let join = Join::new(
                    auto_join.kind,
                    auto_join.table,
                    Some(auto_join.condition.into()),
                );
                self.builder.push_conditional(key, |builder| {
                    builder.push_space();
                    join.build(builder);
                });
            }
        }
        Ok(())
    }

    /// An explicit join. Automatic ones go into a conditional fragment instead of the statement,
    /// along with the space separating them from what precedes when `separate` is set.
    pub(super) fn emit_join(&mut self, join: &JoinElement, separate: bool) -> Result<(), OrmError> {
        if !join.auto {
            if separate {
                self.builder.push_space();
            }
            return self.emit_join_body(join).map(|_| ());
        }

        let dialect = self.builder.dialect();
        let outer = std::mem::replace(&mut self.builder, SQLBuilder::new(dialect));
        if separate {
            self.builder.push_space();
        }
        let result = self.emit_join_body(join);
        let fragment = std::mem::replace(&mut self.builder, outer);

        let qualifier = result?;
        let key = ConditionKey {
            scope: self.resolver.current_scope(),
            alias: qualifier,
        };
        self.builder.push_conditional_fragment(key, fragment);
        Ok(())
    }

    /// `KIND JOIN target AS alias ON condition`. Returns what qualifies the joined occurrence.
    fn emit_join_body(&mut self, join: &JoinElement) -> Result<String, OrmError> {
        let schema = self.schema;
        let dialect = self.builder.dialect();
        self.builder.push_str(join.kind.keyword());
        self.builder.push_space();

        let target = match &join.target {
            JoinTarget::Entity(entity) => {
                self.builder
                    .push_str(dialect.quote_identifier(&schema.get_entity(*entity).table_name));
                *entity
            }
            JoinTarget::Subquery {
                entity, elements, ..
            } => {
                self.emit_subquery(elements)?;
                *entity
            }
        };

        let path = self
            .join_paths
            .pop_front()
            .ok_or_else(|| OrmError::Usage("Join was not registered".to_string()))?;
        let (_, entry) = self
            .resolver
            .find_binding(target, Some(&path), ScopeFilter::Inner)?;
        let alias = entry.alias.clone();
        let qualifier = self.resolver.qualifier(target, &alias);

        let table_name = &schema.get_entity(target).table_name;
        if matches!(join.target, JoinTarget::Subquery { .. }) || &qualifier != table_name {
            self.builder.push_str(" AS ");
            self.builder.push_identifier(&qualifier);
        }

        match &join.on {
            JoinOn::Relation { source } => {
                let (source_entity, _, source_alias) = self.relation_source(source.as_ref())?;
                let source_qualifier = self.resolver.qualifier(source_entity, &source_alias);
                let condition = build_join_condition(
                    schema,
                    source_entity,
                    &source_qualifier,
                    target,
                    &qualifier,
                )?;

                if join.auto {
                    self.resolver
                        .table_use_mut()
                        .add_precedes(&source_qualifier, &qualifier);
                } else {
                    self.resolver
                        .use_alias(source_entity, &source_alias, ScopeFilter::Cascade)?;
                    self.resolver.use_alias(target, &alias, ScopeFilter::Inner)?;
                }

                self.builder.push_str(" ON ");
                condition.build(&mut self.builder);
            }
            JoinOn::Template(elements) if join.auto => {
                let scope = self.resolver.current_scope();
                let before = self.resolver.table_use(scope).referenced().clone();
                self.builder.push_str(" ON ");
                self.emit(elements)?;
                self.resolver
                    .table_use_mut()
                    .defer_references(&before, &qualifier);
            }
            JoinOn::Template(elements) => {
                self.builder.push_str(" ON ");
                self.emit(elements)?;
            }
            JoinOn::None => {}
        }

        Ok(qualifier)
    }
}

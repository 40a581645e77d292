// Copyright Exograph, Inc. All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file at the root of this repository.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

use std::collections::{HashMap, VecDeque};
use std::sync::LazyLock;

use indexmap::IndexMap;
use regex::Regex;
use tracing::{debug, instrument};

use crate::asql::{Element, JoinElement, JoinOn, JoinTarget, QueryTemplate, TableRef, WhereClause};
use crate::config::CompileOptions;
use crate::mapping::encode_record;
use crate::sql::{JoinCondition, JoinKind, Parameters, SQLBuilder, Table, collect_parameters};
use crate::{EntityId, OrmError, ParameterError, Record, Schema, SqlValue};

use super::column_path::join_path;
use super::join_path::{eager_foreign_keys, find_relation};
use super::{AliasResolver, ScopeId};

static WHERE_KEYWORD: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\bwhere\b").expect("Invalid regex"));

/// Whether the execution layer may run a statement as is
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Safety {
    Safe,
    /// An UPDATE or DELETE without a WHERE clause; affects every row
    MissingWhere,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CompiledStatement {
    pub sql: String,
    pub parameters: Parameters,
    /// Named placeholders to be supplied per record with [`CompiledStatement::bind`]
    pub bind_vars: Vec<String>,
    pub safety: Safety,
    pub(crate) bind_entity: Option<EntityId>,
}

impl CompiledStatement {
    /// Fail for unsafe statements, unless the caller explicitly allows them
    pub fn ensure_safe(&self, allow_unsafe: bool) -> Result<(), OrmError> {
        match self.safety {
            Safety::MissingWhere if !allow_unsafe => Err(OrmError::Usage(
                "UPDATE or DELETE without a WHERE clause affects every row".to_string(),
            )),
            _ => Ok(()),
        }
    }

    /// The named values for one record of a batch: the statement's named parameters plus each
    /// bind variable, taken from the record's column of the same name
    pub fn bind(
        &self,
        schema: &Schema,
        record: &Record,
    ) -> Result<IndexMap<String, SqlValue>, OrmError> {
        let mut values = match &self.parameters {
            Parameters::Named(values) => values.clone(),
            Parameters::Positional(values) if values.is_empty() => IndexMap::new(),
            Parameters::Positional(_) => {
                return Err(OrmError::Usage(
                    "Only statements with named parameters can be bound to records".to_string(),
                ));
            }
        };

        if let Some(entity) = self.bind_entity {
            if record.entity() != entity {
                return Err(OrmError::Usage(format!(
                    "Statement binds `{}` records, got `{}`",
                    schema.get_entity(entity).name,
                    schema.get_entity(record.entity()).name
                )));
            }
        }

        let columns = schema.get_entity(record.entity()).columns();
        let encoded = encode_record(schema, record)?;

        for name in &self.bind_vars {
            let index = columns
                .iter()
                .position(|column| &column.name == name)
                .ok_or_else(|| ParameterError::UnboundVariable(name.clone()))?;
            values.insert(name.clone(), encoded[index].clone());
        }

        Ok(values)
    }
}

/// Compiles query templates against a schema
#[derive(Debug)]
pub struct TemplateCompiler<'s> {
    schema: &'s Schema,
    options: &'s CompileOptions,
}

impl<'s> TemplateCompiler<'s> {
    pub fn new(schema: &'s Schema, options: &'s CompileOptions) -> Self {
        Self { schema, options }
    }

    pub fn compile(&self, template: &QueryTemplate) -> Result<CompiledStatement, OrmError> {
        self.compile_elements(&template.to_elements())
    }

    #[instrument(skip_all, fields(elements = elements.len()))]
    pub fn compile_elements(&self, elements: &[Element]) -> Result<CompiledStatement, OrmError> {
        let mut compilation = Compilation::new(self.schema, self.options);

        // Aliases are all bound before anything is emitted, since a select list refers to tables
        // that appear after it
        compilation.register(elements)?;
        compilation.resolver.enter_scope(ScopeId::ROOT);
        compilation.emit(elements)?;

        let Compilation {
            resolver,
            builder,
            bind_entity,
            ..
        } = compilation;

        let style = builder.param_style()?;
        let dialect = builder.dialect();
        let (sql, slots) = builder.finish(style, |key| {
            let required = resolver.table_use(key.scope).is_join_required(&key.alias);
            if !required {
                tracing::trace!(alias = %key.alias, "Suppressed unreferenced automatic join");
            }
            required
        });
        let (parameters, bind_vars) = collect_parameters(slots, style, dialect)?;

        let mut statement = CompiledStatement {
            sql,
            parameters,
            bind_vars,
            safety: safety_of(elements),
            bind_entity,
        };

        if self.options.reject_unsafe_statements {
            statement.ensure_safe(false)?;
        }

        for observer in &self.options.observers {
            observer.on_compiled(&mut statement)?;
        }

        debug!(sql = %statement.sql, parameters = statement.parameters.len(), "Compiled statement");

        Ok(statement)
    }
}

fn safety_of(elements: &[Element]) -> Safety {
    let modifies = elements
        .iter()
        .any(|element| matches!(element, Element::Update { .. } | Element::Delete { .. }));
    let filtered = elements.iter().any(|element| match element {
        Element::Where(_) => true,
        Element::Sql(sql) => WHERE_KEYWORD.is_match(sql),
        _ => false,
    });

    if modifies && !filtered {
        Safety::MissingWhere
    } else {
        Safety::Safe
    }
}

/// A join inferred from a foreign key of a `From` table, emitted only if referenced
#[derive(Debug)]
pub(super) struct AutoJoin {
    pub(super) scope: ScopeId,
    pub(super) kind: JoinKind,
    pub(super) table: Table,
    /// What qualifies the joined table's columns
    pub(super) qualifier: String,
    pub(super) condition: JoinCondition,
}

/// State of one compile call. Registration and emission walk the elements in the same order;
/// whatever registration derives for a nested construct is queued and taken back by emission.
pub(super) struct Compilation<'s> {
    pub(super) schema: &'s Schema,
    pub(super) resolver: AliasResolver<'s>,
    pub(super) builder: SQLBuilder,
    /// Root entity of each scope: the first table registered in it
    pub(super) roots: HashMap<ScopeId, EntityId>,
    pub(super) subqueries: VecDeque<ScopeId>,
    pub(super) auto_joins: VecDeque<Vec<AutoJoin>>,
    pub(super) join_paths: VecDeque<String>,
    pub(super) bind_entity: Option<EntityId>,
}

impl<'s> Compilation<'s> {
    fn new(schema: &'s Schema, options: &CompileOptions) -> Self {
        Self {
            schema,
            resolver: AliasResolver::new(schema),
            builder: SQLBuilder::new(options.dialect),
            roots: HashMap::new(),
            subqueries: VecDeque::new(),
            auto_joins: VecDeque::new(),
            join_paths: VecDeque::new(),
            bind_entity: None,
        }
    }

    pub(super) fn register(&mut self, elements: &[Element]) -> Result<(), OrmError> {
        for element in elements {
            match element {
                Element::From {
                    entity,
                    alias,
                    auto_join,
                } => {
                    let alias = self.register_table(*entity, alias.as_deref(), "")?;
                    if *auto_join {
                        let mut joins = vec![];
                        let qualifier = self.resolver.qualifier(*entity, &alias);
                        self.plan_auto_joins(*entity, "", &qualifier, None, &mut joins)?;
                        self.auto_joins.push_back(joins);
                    }
                }
                Element::Table {
                    entity,
                    alias,
                    path,
                } => {
                    self.register_table(*entity, alias.as_deref(), path.as_deref().unwrap_or(""))?;
                }
                Element::Update { entity, alias } | Element::Delete { entity, alias } => {
                    self.register_table(*entity, Some(alias.as_deref().unwrap_or("")), "")?;
                }
                Element::Insert { entity } => {
                    self.register_table(*entity, Some(""), "")?;
                }
                Element::Join(join) => self.register_join(join)?,
                Element::Subquery {
                    elements,
                    correlated,
                } => self.register_subquery(elements, *correlated)?,
                Element::Where(WhereClause::Template(elements)) => self.register(elements)?,
                _ => {}
            }
        }
        Ok(())
    }

    /// Register a table occurrence with the given alias, or a generated one. Returns the alias.
    fn register_table(
        &mut self,
        entity: EntityId,
        alias: Option<&str>,
        path: &str,
    ) -> Result<String, OrmError> {
        let alias = match alias {
            Some(alias) => {
                self.resolver.set_alias(entity, alias, path)?;
                alias.to_string()
            }
            None => self.resolver.generate_alias(entity, path)?,
        };

        self.roots
            .entry(self.resolver.current_scope())
            .or_insert(entity);
        Ok(alias)
    }

    fn register_subquery(&mut self, elements: &[Element], correlated: bool) -> Result<(), OrmError> {
        let scope = self.resolver.push_scope(correlated);
        self.subqueries.push_back(scope);
        let result = self.register(elements);
        self.resolver.pop_scope();
        result
    }

    fn register_join(&mut self, join: &JoinElement) -> Result<(), OrmError> {
        let target = match &join.target {
            JoinTarget::Entity(entity) => *entity,
            JoinTarget::Subquery {
                entity,
                elements,
                correlated,
            } => {
                self.register_subquery(elements, *correlated)?;
                *entity
            }
        };

        let path = self.join_path(join, target)?;
        self.register_table(target, join.alias.as_deref(), &path)?;
        self.join_paths.push_back(path);

        if let JoinOn::Template(elements) = &join.on {
            self.register(elements)?;
        }
        Ok(())
    }

    /// The path a joined occurrence is registered at: explicit, or the source's path extended by
    /// the foreign key leading to the target, or else the alias (table name without one)
    fn join_path(&self, join: &JoinElement, target: EntityId) -> Result<String, OrmError> {
        if let Some(path) = &join.path {
            return Ok(path.clone());
        }

        if let JoinOn::Relation { source } = &join.on {
            let (source_entity, source_path, _) = self.relation_source(source.as_ref())?;
            if let Ok(relation) = find_relation(self.schema, source_entity, target) {
                if relation.is_child(source_entity) {
                    return Ok(join_path(&source_path, &relation.field_path));
                }
            }
        }

        Ok(join
            .alias
            .clone()
            .unwrap_or_else(|| self.schema.get_entity(target).table_name.clone()))
    }

    /// Entity, path and alias of the source side of a relation join; the scope's root table when
    /// no source is given
    pub(super) fn relation_source(
        &self,
        source: Option<&TableRef>,
    ) -> Result<(EntityId, String, String), OrmError> {
        let (entity, path, filter) = match source {
            Some(source) => (source.entity, source.path.as_deref(), source.scope),
            None => {
                let root = self
                    .roots
                    .get(&self.resolver.current_scope())
                    .copied()
                    .ok_or_else(|| {
                        OrmError::Usage("A relation join needs a preceding table".to_string())
                    })?;
                (root, Some(""), crate::asql::ScopeFilter::Inner)
            }
        };

        let (_, entry) = self.resolver.find_binding(entity, path, filter)?;
        Ok((entity, entry.path.clone(), entry.alias.clone()))
    }

    /// Plan joins for every eager foreign key reachable from an occurrence, depth first. Joins
    /// below a nullable key (or below a left join) are left joins.
    fn plan_auto_joins(
        &mut self,
        entity: EntityId,
        path: &str,
        qualifier: &str,
        parent: Option<(&str, JoinKind)>,
        joins: &mut Vec<AutoJoin>,
    ) -> Result<(), OrmError> {
        for relation in eager_foreign_keys(self.schema, entity) {
            let target_path = join_path(path, &relation.field_path);
            let alias = self.resolver.generate_alias(relation.parent, &target_path)?;
            let target_qualifier = self.resolver.qualifier(relation.parent, &alias);

            let kind = match parent {
                Some((_, JoinKind::Left)) => JoinKind::Left,
                _ if relation.nullable => JoinKind::Left,
                _ => JoinKind::Inner,
            };
            let condition = relation.condition(self.schema, qualifier, &target_qualifier)?;

            if let Some((parent_qualifier, _)) = parent {
                self.resolver
                    .table_use_mut()
                    .add_precedes(parent_qualifier, &target_qualifier);
            }

            joins.push(AutoJoin {
                scope: self.resolver.current_scope(),
                kind,
                table: Table::new(&self.schema.get_entity(relation.parent).table_name, &alias),
                qualifier: target_qualifier.clone(),
                condition,
            });

            self.plan_auto_joins(
                relation.parent,
                &target_path,
                &target_qualifier,
                Some((target_qualifier.as_str(), kind)),
                joins,
            )?;
        }
        Ok(())
    }
}

// Copyright Exograph, Inc. All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file at the root of this repository.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

use std::collections::HashSet;

use tracing::trace;

use crate::asql::ScopeFilter;
use crate::schema::default_alias;
use crate::{AliasError, EntityId, Schema};

use super::TableUse;

/// Identifies an alias scope (the top-level query or one of its subqueries) within one
/// compilation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ScopeId(usize);

impl ScopeId {
    pub const ROOT: ScopeId = ScopeId(0);
}

/// One occurrence of a table in a scope
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AliasEntry {
    pub entity: EntityId,
    /// Dot-separated field path from the query root; empty for the root itself
    pub path: String,
    /// Empty when the occurrence is referred to by its table name
    pub alias: String,
}

#[derive(Debug)]
struct Scope {
    parent: Option<ScopeId>,
    /// Whether lookups may continue into the parent
    correlated: bool,
    entries: Vec<AliasEntry>,
    table_use: TableUse,
}

/// Binds table occurrences to aliases across nested scopes, and records which occurrences the
/// statement refers to.
#[derive(Debug)]
pub struct AliasResolver<'s> {
    schema: &'s Schema,
    scopes: Vec<Scope>,
    current: ScopeId,
}

impl<'s> AliasResolver<'s> {
    pub fn new(schema: &'s Schema) -> Self {
        Self {
            schema,
            scopes: vec![Scope {
                parent: None,
                correlated: false,
                entries: vec![],
                table_use: TableUse::default(),
            }],
            current: ScopeId::ROOT,
        }
    }

    pub fn current_scope(&self) -> ScopeId {
        self.current
    }

    /// Create a child of the current scope and make it current
    pub fn push_scope(&mut self, correlated: bool) -> ScopeId {
        let id = ScopeId(self.scopes.len());
        self.scopes.push(Scope {
            parent: Some(self.current),
            correlated,
            entries: vec![],
            table_use: TableUse::default(),
        });
        self.current = id;
        id
    }

    /// Re-enter a scope created earlier with [`Self::push_scope`]
    pub fn enter_scope(&mut self, scope: ScopeId) {
        self.current = scope;
    }

    pub fn pop_scope(&mut self) {
        if let Some(parent) = self.scopes[self.current.0].parent {
            self.current = parent;
        }
    }

    pub fn table_use(&self, scope: ScopeId) -> &TableUse {
        &self.scopes[scope.0].table_use
    }

    pub fn table_use_mut(&mut self) -> &mut TableUse {
        &mut self.scopes[self.current.0].table_use
    }

    /// Derive a fresh alias for the occurrence of `entity` at `path` and register it in the
    /// current scope. The alias differs from every alias live in the current scope or its
    /// ancestors.
    pub fn generate_alias(&mut self, entity: EntityId, path: &str) -> Result<String, AliasError> {
        self.ensure_unregistered(entity, path)?;

        let table = self.schema.get_entity(entity);
        let strategy = self.schema.naming().alias.clone();
        let mut proposed = HashSet::new();
        let mut attempt = 0;

        let alias = loop {
            let candidate = match &strategy {
                Some(strategy) => strategy.alias(table, path, attempt),
                None => default_alias(&table.name, attempt),
            };

            if candidate.is_empty() {
                return Err(AliasError::InvalidStrategyAlias {
                    table: table.name.clone(),
                    reason: "empty alias".to_string(),
                });
            }
            if !proposed.insert(candidate.clone()) {
                return Err(AliasError::InvalidStrategyAlias {
                    table: table.name.clone(),
                    reason: format!("alias `{candidate}` proposed twice"),
                });
            }
            if !self.is_alias_live(&candidate) {
                break candidate;
            }
            attempt += 1;
        };

        trace!(table = %table.name, path, alias, "Generated alias");
        self.register(entity, path, alias.clone());
        Ok(alias)
    }

    /// Register an explicit alias. An empty alias means the occurrence is referred to by its table
    /// name.
    pub fn set_alias(&mut self, entity: EntityId, alias: &str, path: &str) -> Result<(), AliasError> {
        self.ensure_unregistered(entity, path)?;

        let scope = &self.scopes[self.current.0];
        let key = self.key_of(entity, alias);
        if let Some(existing) = scope
            .entries
            .iter()
            .find(|entry| self.key_of(entry.entity, &entry.alias) == key && entry.entity != entity)
        {
            return Err(AliasError::AliasInUse {
                alias: key.to_string(),
                table: self.schema.get_entity(existing.entity).name.clone(),
            });
        }

        self.register(entity, path, alias.to_string());
        Ok(())
    }

    /// The alias bound to `entity` (at `path`, if given) in the scopes `filter` allows. An empty
    /// alias means the table name is to be used.
    pub fn find_alias(
        &self,
        entity: EntityId,
        path: Option<&str>,
        filter: ScopeFilter,
    ) -> Result<String, AliasError> {
        self.find_binding(entity, path, filter)
            .map(|(_, entry)| entry.alias.clone())
    }

    /// Like [`Self::find_alias`], but returns the whole entry and its scope. Scopes are searched
    /// nearest first; the first scope with any match decides, and more than one match there is
    /// ambiguous.
    pub fn find_binding(
        &self,
        entity: EntityId,
        path: Option<&str>,
        filter: ScopeFilter,
    ) -> Result<(ScopeId, &AliasEntry), AliasError> {
        for scope in self.visible_scopes(filter) {
            let matches: Vec<&AliasEntry> = self.scopes[scope.0]
                .entries
                .iter()
                .filter(|entry| {
                    entry.entity == entity && path.is_none_or(|path| entry.path == path)
                })
                .collect();

            match matches.as_slice() {
                [] => continue,
                [entry] => return Ok((scope, entry)),
                entries => {
                    return Err(AliasError::Ambiguous {
                        table: self.schema.get_entity(entity).name.clone(),
                        paths: sorted_paths(entries.iter().map(|entry| entry.path.clone())),
                    });
                }
            }
        }

        Err(AliasError::NotFound {
            table: self.schema.get_entity(entity).name.clone(),
            path: path.map(str::to_string),
        })
    }

    /// Check that `alias` is a live binding of `entity` in the scopes `filter` allows, and record
    /// the occurrence as referenced in the scope that owns it. Returns the owning scope.
    pub fn use_alias(
        &mut self,
        entity: EntityId,
        alias: &str,
        filter: ScopeFilter,
    ) -> Result<ScopeId, AliasError> {
        let key = self.key_of(entity, alias).to_string();

        let owner = self.visible_scopes(filter).into_iter().find(|scope| {
            self.scopes[scope.0]
                .entries
                .iter()
                .any(|entry| entry.entity == entity && self.key_of(entry.entity, &entry.alias) == key)
        });

        match owner {
            Some(scope) => {
                self.scopes[scope.0].table_use.mark_referenced(&key);
                Ok(scope)
            }
            None => Err(AliasError::UnknownAlias {
                table: self.schema.get_entity(entity).name.clone(),
                alias: alias.to_string(),
            }),
        }
    }

    /// What qualifies columns of an occurrence: its alias, or its table name when it has none
    pub fn qualifier(&self, entity: EntityId, alias: &str) -> String {
        self.key_of(entity, alias).to_string()
    }

    /// Entries visible under `filter`, nearest scope first
    pub fn visible_entries(&self, filter: ScopeFilter) -> Vec<(ScopeId, &AliasEntry)> {
        self.visible_scopes(filter)
            .into_iter()
            .flat_map(|scope| {
                self.scopes[scope.0]
                    .entries
                    .iter()
                    .map(move |entry| (scope, entry))
            })
            .collect()
    }

    pub(super) fn visible_scopes(&self, filter: ScopeFilter) -> Vec<ScopeId> {
        let mut scopes = vec![];
        let mut next = Some(self.current);
        let mut nearest = true;

        while let Some(id) = next {
            let scope = &self.scopes[id.0];
            match filter {
                ScopeFilter::Inner => {
                    scopes.push(id);
                    break;
                }
                ScopeFilter::Outer if nearest => {}
                ScopeFilter::Outer | ScopeFilter::Cascade => scopes.push(id),
            }

            if !scope.correlated {
                break;
            }
            next = scope.parent;
            nearest = false;
        }

        scopes
    }

    fn key_of<'a>(&'a self, entity: EntityId, alias: &'a str) -> &'a str {
        if alias.is_empty() {
            &self.schema.get_entity(entity).table_name
        } else {
            alias
        }
    }

    fn ensure_unregistered(&self, entity: EntityId, path: &str) -> Result<(), AliasError> {
        let scope = &self.scopes[self.current.0];
        if scope
            .entries
            .iter()
            .any(|entry| entry.entity == entity && entry.path == path)
        {
            return Err(AliasError::DuplicatePath {
                table: self.schema.get_entity(entity).name.clone(),
                path: path.to_string(),
            });
        }
        Ok(())
    }

    /// Whether an alias is bound in the current scope or any ancestor, correlated or not
    fn is_alias_live(&self, alias: &str) -> bool {
        let mut next = Some(self.current);
        while let Some(id) = next {
            let scope = &self.scopes[id.0];
            if scope
                .entries
                .iter()
                .any(|entry| self.key_of(entry.entity, &entry.alias) == alias)
            {
                return true;
            }
            next = scope.parent;
        }
        false
    }

    fn register(&mut self, entity: EntityId, path: &str, alias: String) {
        self.scopes[self.current.0].entries.push(AliasEntry {
            entity,
            path: path.to_string(),
            alias,
        });
    }
}

/// Paths ordered by depth (number of segments), then lexically
pub(super) fn sorted_paths(paths: impl Iterator<Item = String>) -> Vec<String> {
    let mut paths: Vec<String> = paths.collect();
    paths.sort_by(|a, b| {
        depth(a)
            .cmp(&depth(b))
            .then_with(|| a.cmp(b))
    });
    paths.dedup();
    paths
}

fn depth(path: &str) -> usize {
    if path.is_empty() {
        0
    } else {
        path.split('.').count()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use crate::schema::{
        AliasNameResolver, Entity, EntitySpec, FieldSpec, NamingStrategy, ScalarType, SchemaSpec,
    };

    use super::super::test_util::TestSetup;
    use super::*;

    #[test]
    fn generated_aliases_get_numeric_suffixes() {
        let schema = SchemaSpec::new(vec![EntitySpec::table(
            "X",
            vec![FieldSpec::scalar("id", ScalarType::Int).pk()],
        )])
        .to_schema()
        .unwrap();
        let x = schema.entity_id("X").unwrap();

        let mut resolver = AliasResolver::new(&schema);
        let aliases: Vec<_> = ["a", "b", "c"]
            .iter()
            .map(|path| resolver.generate_alias(x, path).unwrap())
            .collect();

        assert_eq!(aliases, vec!["_x", "_x1", "_x2"]);
    }

    #[test]
    fn generated_aliases_avoid_ancestor_scopes() {
        TestSetup::with_setup(|TestSetup { schema, order, .. }| {
            let mut resolver = AliasResolver::new(&schema);
            assert_eq!(resolver.generate_alias(order, "").unwrap(), "_o");

            // Not correlated, but the outer alias is still live in the statement
            resolver.push_scope(false);
            assert_eq!(resolver.generate_alias(order, "").unwrap(), "_o1");
            resolver.pop_scope();

            assert_eq!(resolver.current_scope(), ScopeId::ROOT);
        })
    }

    #[test]
    fn two_paths_require_a_path() {
        TestSetup::with_setup(|TestSetup { schema, city, .. }| {
            let mut resolver = AliasResolver::new(&schema);
            let home = resolver.generate_alias(city, "home.city").unwrap();
            let work = resolver.generate_alias(city, "work.city").unwrap();
            assert_ne!(home, work);

            assert_eq!(
                resolver.find_alias(city, None, ScopeFilter::Cascade),
                Err(AliasError::Ambiguous {
                    table: "City".to_string(),
                    paths: vec!["home.city".to_string(), "work.city".to_string()]
                })
            );
            assert_eq!(
                resolver.find_alias(city, Some("home.city"), ScopeFilter::Cascade),
                Ok(home)
            );
            assert_eq!(
                resolver.find_alias(city, Some("work.city"), ScopeFilter::Cascade),
                Ok(work)
            );
        })
    }

    #[test]
    fn nearest_scope_wins() {
        TestSetup::with_setup(|TestSetup { schema, customer, .. }| {
            let mut resolver = AliasResolver::new(&schema);
            resolver.generate_alias(customer, "").unwrap();
            resolver.generate_alias(customer, "other").unwrap();

            resolver.push_scope(true);
            let inner = resolver.generate_alias(customer, "").unwrap();

            assert_eq!(
                resolver.find_alias(customer, None, ScopeFilter::Cascade),
                Ok(inner.clone())
            );
            assert_eq!(
                resolver.find_alias(customer, None, ScopeFilter::Inner),
                Ok(inner)
            );
            assert!(matches!(
                resolver.find_alias(customer, None, ScopeFilter::Outer),
                Err(AliasError::Ambiguous { .. })
            ));
            assert_eq!(
                resolver.find_alias(customer, Some("other"), ScopeFilter::Outer),
                Ok("_c1".to_string())
            );
        })
    }

    #[test]
    fn uncorrelated_scope_hides_parent() {
        TestSetup::with_setup(|TestSetup { schema, customer, .. }| {
            let mut resolver = AliasResolver::new(&schema);
            resolver.generate_alias(customer, "").unwrap();
            resolver.push_scope(false);

            assert_eq!(
                resolver.find_alias(customer, None, ScopeFilter::Cascade),
                Err(AliasError::NotFound {
                    table: "Customer".to_string(),
                    path: None
                })
            );
        })
    }

    #[test]
    fn explicit_aliases() {
        TestSetup::with_setup(|TestSetup { schema, customer, order, .. }| {
            let mut resolver = AliasResolver::new(&schema);
            resolver.set_alias(customer, "c", "").unwrap();

            assert_eq!(
                resolver.set_alias(customer, "c2", ""),
                Err(AliasError::DuplicatePath {
                    table: "Customer".to_string(),
                    path: "".to_string()
                })
            );
            assert_eq!(
                resolver.set_alias(order, "c", ""),
                Err(AliasError::AliasInUse {
                    alias: "c".to_string(),
                    table: "Customer".to_string()
                })
            );
            // Same table at another path may reuse the alias string
            resolver.set_alias(customer, "c", "other").unwrap();

            // An empty alias reverts to the table name
            resolver.set_alias(order, "", "").unwrap();
            assert_eq!(
                resolver.find_alias(order, None, ScopeFilter::Inner),
                Ok("".to_string())
            );
            assert_eq!(resolver.qualifier(order, ""), "orders");
        })
    }

    #[test]
    fn use_alias_marks_the_owning_scope() {
        TestSetup::with_setup(|TestSetup { schema, customer, order, .. }| {
            let mut resolver = AliasResolver::new(&schema);
            let outer = resolver.generate_alias(customer, "").unwrap();
            resolver.push_scope(true);
            resolver.generate_alias(order, "").unwrap();

            assert_eq!(
                resolver.use_alias(customer, &outer, ScopeFilter::Cascade),
                Ok(ScopeId::ROOT)
            );
            assert!(resolver.table_use(ScopeId::ROOT).is_referenced(&outer));

            assert_eq!(
                resolver.use_alias(customer, &outer, ScopeFilter::Inner),
                Err(AliasError::UnknownAlias {
                    table: "Customer".to_string(),
                    alias: outer
                })
            );
        })
    }

    #[derive(Debug)]
    struct Stubborn;

    impl AliasNameResolver for Stubborn {
        fn alias(&self, _entity: &Entity, _path: &str, _attempt: usize) -> String {
            "t".to_string()
        }
    }

    #[test]
    fn strategy_repeating_a_taken_alias_fails() {
        let schema = SchemaSpec::new(vec![EntitySpec::table(
            "Item",
            vec![FieldSpec::scalar("id", ScalarType::Int).pk()],
        )])
        .with_naming(NamingStrategy {
            alias: Some(Arc::new(Stubborn)),
            ..NamingStrategy::default()
        })
        .to_schema()
        .unwrap();
        let item = schema.entity_id("Item").unwrap();

        let mut resolver = AliasResolver::new(&schema);
        assert_eq!(resolver.generate_alias(item, "a").unwrap(), "t");
        assert!(matches!(
            resolver.generate_alias(item, "b"),
            Err(AliasError::InvalidStrategyAlias { .. })
        ));
    }

    #[test]
    fn paths_sort_by_depth() {
        assert_eq!(
            sorted_paths(
                ["b.c", "z", "a.b.c", "a"]
                    .into_iter()
                    .map(str::to_string)
            ),
            vec!["a", "z", "b.c", "a.b.c"]
        );
    }
}

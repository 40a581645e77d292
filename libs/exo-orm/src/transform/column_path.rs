// Copyright Exograph, Inc. All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file at the root of this repository.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

//! Resolution of field paths (`home.street`) to physical columns, and of column references to the
//! table occurrence that holds them.

use std::ops::Range;

use crate::asql::ColumnRef;
use crate::schema::{Column, EntityKind, Field, FieldKind};
use crate::{AliasError, EntityId, OrmError, Schema, SchemaError};

use super::alias_resolver::{AliasResolver, ScopeId, sorted_paths};

/// Columns of a field path, as a range of the entity's column list. Each segment but the last
/// must name an inline composite.
pub fn field_columns(
    schema: &Schema,
    entity: EntityId,
    field_path: &str,
) -> Result<Range<usize>, SchemaError> {
    let root = schema.get_entity(entity);
    let unknown = || SchemaError::UnknownField {
        entity: root.name.clone(),
        field: field_path.to_string(),
    };

    let mut current = root;
    let mut offset = 0;
    let mut segments = field_path.split('.').peekable();

    while let Some(segment) = segments.next() {
        let field = current.field(segment).ok_or_else(unknown)?;

        if segments.peek().is_none() {
            let columns = field.columns();
            return Ok(offset + columns.start..offset + columns.end);
        }

        match field.kind {
            FieldKind::Inline(target) => {
                offset += field.columns().start;
                current = schema.get_entity(target);
            }
            _ => return Err(unknown()),
        }
    }

    Err(unknown())
}

/// Paths (relative to `host`) at which the inline type `inline` is embedded
pub fn inline_occurrences(schema: &Schema, host: EntityId, inline: EntityId) -> Vec<String> {
    let mut paths = vec![];
    collect_inline_occurrences(schema, host, inline, "", &mut paths);
    paths
}

fn collect_inline_occurrences(
    schema: &Schema,
    host: EntityId,
    inline: EntityId,
    prefix: &str,
    paths: &mut Vec<String>,
) {
    for field in &schema.get_entity(host).fields {
        if let FieldKind::Inline(target) = field.kind {
            let path = join_path(prefix, &field.name);
            if target == inline {
                paths.push(path.clone());
            }
            collect_inline_occurrences(schema, target, inline, &path, paths);
        }
    }
}

/// The field a dot-separated path leads to
pub fn find_field<'s>(
    schema: &'s Schema,
    entity: EntityId,
    field_path: &str,
) -> Result<&'s Field, SchemaError> {
    let root = schema.get_entity(entity);
    let mut current = root;
    let mut segments = field_path.split('.').peekable();

    while let Some(segment) = segments.next() {
        let field = current.field(segment);
        match (field, segments.peek()) {
            (Some(field), None) => return Ok(field),
            (Some(Field { kind: FieldKind::Inline(target), .. }), Some(_)) => {
                current = schema.get_entity(*target);
            }
            _ => break,
        }
    }

    Err(SchemaError::UnknownField {
        entity: root.name.clone(),
        field: field_path.to_string(),
    })
}

pub fn join_path(prefix: &str, segment: &str) -> String {
    if prefix.is_empty() {
        segment.to_string()
    } else if segment.is_empty() {
        prefix.to_string()
    } else {
        format!("{prefix}.{segment}")
    }
}

/// A column reference resolved to its table occurrence
#[derive(Debug)]
pub struct ResolvedColumns<'s> {
    pub scope: ScopeId,
    pub table: EntityId,
    /// Alias of the occurrence; empty when it goes by its table name
    pub alias: String,
    pub qualifier: String,
    /// Path of the field within `table`
    pub field_path: String,
    pub columns: &'s [Column],
}

/// Resolve a column reference and record its table occurrence as referenced. A reference to an
/// inline type is resolved through the tables embedding it; `path` then names the occurrence
/// (`home` or `work` for the two addresses of a person).
pub fn resolve_column<'s>(
    schema: &'s Schema,
    resolver: &mut AliasResolver<'s>,
    column: &ColumnRef,
) -> Result<ResolvedColumns<'s>, OrmError> {
    let entity = schema.get_entity(column.entity);

    let (table, alias, field_path) = if entity.kind == EntityKind::Inline {
        resolve_inline_host(schema, resolver, column)?
    } else {
        let (_, entry) =
            resolver.find_binding(column.entity, column.path.as_deref(), column.scope)?;
        (entry.entity, entry.alias.clone(), column.field.clone())
    };

    let range = field_columns(schema, table, &field_path)?;
    let scope = resolver.use_alias(table, &alias, column.scope)?;

    Ok(ResolvedColumns {
        scope,
        table,
        qualifier: resolver.qualifier(table, &alias),
        alias,
        field_path,
        columns: &schema.get_entity(table).columns()[range],
    })
}

fn resolve_inline_host(
    schema: &Schema,
    resolver: &AliasResolver<'_>,
    column: &ColumnRef,
) -> Result<(EntityId, String, String), OrmError> {
    let entries = resolver.visible_entries(column.scope);

    for scope_entries in entries.chunk_by(|(a, _), (b, _)| a == b) {
        // (table, alias, occurrence path relative to the table, absolute path)
        let candidates: Vec<(EntityId, &str, String, String)> = scope_entries
            .iter()
            .flat_map(|(_, entry)| {
                inline_occurrences(schema, entry.entity, column.entity)
                    .into_iter()
                    .map(|occurrence| {
                        let absolute = join_path(&entry.path, &occurrence);
                        (entry.entity, entry.alias.as_str(), occurrence, absolute)
                    })
            })
            .filter(|(_, _, _, absolute)| {
                column.path.as_deref().is_none_or(|path| path == absolute)
            })
            .collect();

        match candidates.as_slice() {
            [] => continue,
            [(table, alias, occurrence, _)] => {
                return Ok((
                    *table,
                    alias.to_string(),
                    join_path(occurrence, &column.field),
                ));
            }
            candidates => {
                return Err(AliasError::Ambiguous {
                    table: schema.get_entity(column.entity).name.clone(),
                    paths: sorted_paths(candidates.iter().map(|(.., absolute)| absolute.clone())),
                }
                .into());
            }
        }
    }

    Err(AliasError::NotFound {
        table: schema.get_entity(column.entity).name.clone(),
        path: column.path.clone(),
    }
    .into())
}

#[cfg(test)]
mod tests {
    use crate::asql::ScopeFilter;

    use super::super::test_util::TestSetup;
    use super::*;

    #[test]
    fn field_paths_through_inline_composites() {
        TestSetup::with_setup(|TestSetup { schema, person, .. }| {
            assert_eq!(field_columns(&schema, person, "name"), Ok(1..2));
            assert_eq!(field_columns(&schema, person, "home"), Ok(2..4));
            assert_eq!(field_columns(&schema, person, "work.city"), Ok(5..6));
            assert_eq!(
                field_columns(&schema, person, "name.first"),
                Err(SchemaError::UnknownField {
                    entity: "Person".to_string(),
                    field: "name.first".to_string()
                })
            );
        })
    }

    #[test]
    fn unqualified_inline_column_is_ambiguous() {
        TestSetup::with_setup(|TestSetup { schema, person, address, .. }| {
            let mut resolver = AliasResolver::new(&schema);
            resolver.generate_alias(person, "").unwrap();

            let err = resolve_column(
                &schema,
                &mut resolver,
                &ColumnRef::new(address, "street"),
            )
            .unwrap_err();
            assert!(matches!(
                err,
                OrmError::Alias(AliasError::Ambiguous { ref table, ref paths })
                    if table == "Address" && paths == &["home".to_string(), "work".to_string()]
            ));

            let work = resolve_column(
                &schema,
                &mut resolver,
                &ColumnRef::new(address, "street").at("work"),
            )
            .unwrap();
            assert_eq!(work.qualifier, "_p");
            assert_eq!(work.columns[0].name, "work_street");
            assert!(resolver.table_use(ScopeId::ROOT).is_referenced("_p"));
        })
    }

    #[test]
    fn column_of_unbound_table() {
        TestSetup::with_setup(|TestSetup { schema, order, customer, .. }| {
            let mut resolver = AliasResolver::new(&schema);
            resolver.generate_alias(order, "").unwrap();

            let err = resolve_column(
                &schema,
                &mut resolver,
                &ColumnRef::new(customer, "name").in_scope(ScopeFilter::Inner),
            )
            .unwrap_err();
            assert!(matches!(err, OrmError::Alias(AliasError::NotFound { .. })));
        })
    }
}

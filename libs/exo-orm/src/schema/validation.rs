// Copyright Exograph, Inc. All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file at the root of this repository.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

use crate::SchemaError;

use super::{EntityId, EntityKind, FieldKind, Schema};

pub(super) fn validate_entity(schema: &Schema, id: EntityId) -> Result<(), SchemaError> {
    check_cycles(schema, id, &mut vec![])?;
    check_primary_key(schema, id)?;
    check_foreign_keys(schema, id)
}

/// No entity may reappear along a path of inline or foreign-key composition. Lazy references
/// do not count, since they are never expanded eagerly.
fn check_cycles(schema: &Schema, id: EntityId, stack: &mut Vec<EntityId>) -> Result<(), SchemaError> {
    stack.push(id);

    for field in &schema.get_entity(id).fields {
        if let FieldKind::Inline(target) | FieldKind::ForeignKey(target) = field.kind {
            if stack.contains(&target) {
                let mut path: Vec<_> = stack
                    .iter()
                    .map(|id| schema.get_entity(*id).name.clone())
                    .collect();
                path.push(schema.get_entity(target).name.clone());
                return Err(SchemaError::Cycle(path));
            }
            check_cycles(schema, target, stack)?;
        }
    }

    stack.pop();
    Ok(())
}

fn check_primary_key(schema: &Schema, id: EntityId) -> Result<(), SchemaError> {
    let entity = schema.get_entity(id);
    let pk_fields: Vec<_> = entity.fields.iter().filter(|f| f.primary_key).collect();

    if entity.kind == EntityKind::Inline {
        return match pk_fields.first() {
            Some(field) => Err(SchemaError::InlinePrimaryKey {
                entity: entity.name.clone(),
                field: field.name.clone(),
            }),
            None => Ok(()),
        };
    }

    match pk_fields.as_slice() {
        [] if entity.kind == EntityKind::Table => {
            Err(SchemaError::MissingPrimaryKey(entity.name.clone()))
        }
        [] => Ok(()),
        [field] => match field.kind {
            FieldKind::Scalar(_) | FieldKind::Inline(_) => Ok(()),
            FieldKind::Converted(_) => Err(SchemaError::ConverterKey(format!(
                "{}.{}",
                entity.name, field.name
            ))),
            FieldKind::ForeignKey(_) | FieldKind::Ref(_) => Err(SchemaError::InvalidForeignKey {
                field: format!("{}.{}", entity.name, field.name),
                reason: "a primary key cannot refer to another entity".to_string(),
            }),
        },
        fields => Err(SchemaError::MultiplePrimaryKeys {
            entity: entity.name.clone(),
            fields: fields.iter().map(|f| f.name.clone()).collect(),
        }),
    }
}

/// Foreign keys and references must target an entity with exactly one scalar primary key.
/// Inline composites are checked as part of their hosts.
fn check_foreign_keys(schema: &Schema, id: EntityId) -> Result<(), SchemaError> {
    let entity = schema.get_entity(id);

    for field in &entity.fields {
        let target = match field.kind {
            FieldKind::ForeignKey(target) | FieldKind::Ref(target) => target,
            FieldKind::Inline(target) => {
                check_foreign_keys(schema, target)?;
                continue;
            }
            _ => continue,
        };

        let qualified_name = format!("{}.{}", entity.name, field.name);
        let target_entity = schema.get_entity(target);
        let target_pks: Vec<_> = target_entity
            .fields
            .iter()
            .filter(|f| f.primary_key)
            .collect();

        match target_pks.as_slice() {
            [] => {
                return Err(SchemaError::InvalidForeignKey {
                    field: qualified_name,
                    reason: format!("`{}` has no primary key", target_entity.name),
                });
            }
            [pk] => {
                if let FieldKind::Inline(_) = pk.kind {
                    return Err(SchemaError::CompoundForeignKey {
                        field: qualified_name,
                        target: target_entity.name.clone(),
                    });
                }
                // The key is a single scalar column from here on
                if !field.column_names.is_empty() && field.column_names.len() != 1 {
                    return Err(SchemaError::ForeignKeyColumnCount {
                        field: qualified_name,
                        fk_columns: field.column_names.len(),
                        pk_columns: 1,
                    });
                }
            }
            _ => {
                return Err(SchemaError::MultiplePrimaryKeys {
                    entity: target_entity.name.clone(),
                    fields: target_pks.iter().map(|f| f.name.clone()).collect(),
                });
            }
        }
    }

    Ok(())
}

// Copyright Exograph, Inc. All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file at the root of this repository.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

use std::ops::Range;

use crate::schema::FieldKind;
use crate::sql::{Column, ColumnEquality, JoinCondition};
use crate::{EntityId, JoinError, Schema};

use super::column_path::join_path;

/// A foreign key relating two entities
#[derive(Debug, Clone, PartialEq)]
pub struct Relation {
    /// The entity holding the foreign key
    pub child: EntityId,
    /// The entity whose primary key is referred to
    pub parent: EntityId,
    /// Path of the foreign key field in the child, through inline composites
    pub field_path: String,
    /// The foreign key's columns in the child's column list
    pub columns: Range<usize>,
    /// Whether the key may be null (directly, or through an enclosing inline composite)
    pub nullable: bool,
}

impl Relation {
    /// Whether `entity` is the side holding the foreign key
    pub fn is_child(&self, entity: EntityId) -> bool {
        self.child == entity
    }

    /// `child.fk = parent.pk` for each key column, in declaration order
    pub fn condition(
        &self,
        schema: &Schema,
        child_qualifier: &str,
        parent_qualifier: &str,
    ) -> Result<JoinCondition, JoinError> {
        let fk_columns = &schema.get_entity(self.child).columns()[self.columns.clone()];
        let pk_columns = schema.get_entity(self.parent).pk_columns();

        if fk_columns.len() != pk_columns.len() {
            return Err(JoinError::ColumnCountMismatch {
                field: format!("{}.{}", schema.get_entity(self.child).name, self.field_path),
                fk_columns: fk_columns.len(),
                pk_columns: pk_columns.len(),
            });
        }

        Ok(JoinCondition {
            equalities: fk_columns
                .iter()
                .zip(pk_columns)
                .map(|(fk, pk)| ColumnEquality {
                    left: Column::physical(child_qualifier, &fk.name),
                    right: Column::physical(parent_qualifier, &pk.name),
                })
                .collect(),
        })
    }
}

/// Find the single foreign key between two entities, in either direction. For a self join only
/// `from`'s foreign keys count, so the joined occurrence is the one referred to.
pub fn find_relation(schema: &Schema, from: EntityId, to: EntityId) -> Result<Relation, JoinError> {
    let mut candidates = foreign_keys(schema, from, to);
    if from != to {
        candidates.extend(foreign_keys(schema, to, from));
    }

    match candidates.len() {
        0 => Err(JoinError::NoRelation {
            from: schema.get_entity(from).name.clone(),
            to: schema.get_entity(to).name.clone(),
        }),
        1 => Ok(candidates.remove(0)),
        _ => Err(JoinError::AmbiguousRelation {
            from: schema.get_entity(from).name.clone(),
            to: schema.get_entity(to).name.clone(),
            fields: candidates
                .iter()
                .map(|relation| {
                    format!(
                        "{}.{}",
                        schema.get_entity(relation.child).name,
                        relation.field_path
                    )
                })
                .collect(),
        }),
    }
}

/// Build the ON condition joining `to_qualifier` (an occurrence of `to`) to `from_qualifier`
pub fn build_join_condition(
    schema: &Schema,
    from: EntityId,
    from_qualifier: &str,
    to: EntityId,
    to_qualifier: &str,
) -> Result<JoinCondition, JoinError> {
    let relation = find_relation(schema, from, to)?;

    if relation.is_child(from) {
        relation.condition(schema, from_qualifier, to_qualifier)
    } else {
        relation.condition(schema, to_qualifier, from_qualifier)
    }
}

/// Foreign key and reference fields of `child` (including those inside inline composites) that
/// refer to `parent`
pub fn foreign_keys(schema: &Schema, child: EntityId, parent: EntityId) -> Vec<Relation> {
    let mut relations = vec![];
    collect_foreign_keys(schema, child, child, Some(parent), "", 0, &mut relations);
    relations
}

/// Foreign key fields of `child` linking composites eagerly (lazy references excluded), in
/// declaration order
pub fn eager_foreign_keys(schema: &Schema, child: EntityId) -> Vec<Relation> {
    let mut relations = vec![];
    collect_foreign_keys(schema, child, child, None, "", 0, &mut relations);
    relations
}

/// With no `parent`, collects eager foreign keys to any entity
fn collect_foreign_keys(
    schema: &Schema,
    child: EntityId,
    current: EntityId,
    parent: Option<EntityId>,
    prefix: &str,
    offset: usize,
    relations: &mut Vec<Relation>,
) {
    for field in &schema.get_entity(current).fields {
        let columns = field.columns();
        match field.kind {
            FieldKind::ForeignKey(target) | FieldKind::Ref(target)
                if parent.is_none_or(|parent| parent == target)
                    && (parent.is_some() || !matches!(field.kind, FieldKind::Ref(_))) =>
            {
                let columns = offset + columns.start..offset + columns.end;
                relations.push(Relation {
                    child,
                    parent: target,
                    field_path: join_path(prefix, &field.name),
                    nullable: schema.get_entity(child).columns()[columns.clone()]
                        .iter()
                        .any(|column| column.nullable),
                    columns,
                });
            }
            FieldKind::Inline(inline) => collect_foreign_keys(
                schema,
                child,
                inline,
                parent,
                &join_path(prefix, &field.name),
                offset + columns.start,
                relations,
            ),
            _ => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::schema::{EntitySpec, FieldSpec, ScalarType, SchemaSpec};
    use crate::sql::{Dialect, ExpressionBuilder};
    use crate::SchemaError;

    use super::super::test_util::TestSetup;
    use super::*;

    #[test]
    fn single_foreign_key_either_direction() {
        TestSetup::with_setup(|TestSetup { schema, order, customer, .. }| {
            let forward = build_join_condition(&schema, order, "_o", customer, "_c").unwrap();
            let backward = build_join_condition(&schema, customer, "_c", order, "_o").unwrap();

            assert_eq!(forward, backward);
            assert_binding!(
                forward.to_sql(Dialect::Postgres),
                r#""_o"."customer_id" = "_c"."id""#
            );
        })
    }

    #[test]
    fn foreign_key_inside_inline_composite() {
        TestSetup::with_setup(|TestSetup { schema, person, city, .. }| {
            assert_eq!(
                find_relation(&schema, person, city),
                Err(JoinError::AmbiguousRelation {
                    from: "Person".to_string(),
                    to: "City".to_string(),
                    fields: vec!["Person.home.city".to_string(), "Person.work.city".to_string()]
                })
            );

            let home = &foreign_keys(&schema, person, city)[0];
            assert_eq!(home.columns, 3..4);
            assert!(!home.nullable);

            let eager: Vec<_> = eager_foreign_keys(&schema, person)
                .into_iter()
                .map(|relation| (relation.field_path, relation.nullable))
                .collect();
            assert_eq!(
                eager,
                vec![("home.city".to_string(), false), ("work.city".to_string(), true)]
            );
        })
    }

    #[test]
    fn no_relation() {
        TestSetup::with_setup(|TestSetup { schema, order, city, .. }| {
            assert_eq!(
                build_join_condition(&schema, order, "_o", city, "_c"),
                Err(JoinError::NoRelation {
                    from: "Order".to_string(),
                    to: "City".to_string()
                })
            );
        })
    }

    #[test]
    fn foreign_keys_in_both_directions() {
        let schema = SchemaSpec::new(vec![
            EntitySpec::table(
                "Team",
                vec![
                    FieldSpec::scalar("id", ScalarType::Int).pk(),
                    FieldSpec::reference("captain", "Player").nullable(),
                ],
            ),
            EntitySpec::table(
                "Player",
                vec![
                    FieldSpec::scalar("id", ScalarType::Int).pk(),
                    FieldSpec::foreign_key("team", "Team"),
                ],
            ),
        ])
        .to_schema()
        .unwrap();
        let team = schema.entity_id("Team").unwrap();
        let player = schema.entity_id("Player").unwrap();

        assert!(matches!(
            find_relation(&schema, team, player),
            Err(JoinError::AmbiguousRelation { fields, .. })
                if fields == vec!["Team.captain".to_string(), "Player.team".to_string()]
        ));
    }

    #[test]
    fn self_join_uses_the_referring_side() {
        TestSetup::with_setup(|TestSetup { schema, employee, .. }| {
            let condition = build_join_condition(&schema, employee, "_e", employee, "_e1").unwrap();
            assert_binding!(
                condition.to_sql(Dialect::Ansi),
                r#""_e"."manager_id" = "_e1"."id""#
            );
        })
    }

    #[test]
    fn key_column_count_mismatch() {
        // A key that does not line up with the referenced primary key never reaches join building
        let result = SchemaSpec::new(vec![
            EntitySpec::table("Customer", vec![FieldSpec::scalar("id", ScalarType::Int).pk()]),
            EntitySpec::table(
                "Order",
                vec![
                    FieldSpec::scalar("id", ScalarType::Int).pk(),
                    FieldSpec::foreign_key("customer", "Customer")
                        .with_columns(&["customer_id", "customer_region"]),
                ],
            ),
        ])
        .to_schema();

        assert_eq!(
            result.unwrap_err(),
            SchemaError::ForeignKeyColumnCount {
                field: "Order.customer".to_string(),
                fk_columns: 2,
                pk_columns: 1
            }
        );
    }
}

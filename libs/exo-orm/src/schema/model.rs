// Copyright Exograph, Inc. All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file at the root of this repository.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

use std::collections::HashMap;
use std::ops::Range;
use std::sync::{Arc, OnceLock};

use indexmap::IndexMap;
use tracing::debug;

use crate::SchemaError;
use crate::asql::SelectMode;
use crate::mapping::{PlanCache, RowPlan};

use super::{
    Column, Converter, Entity, EntityId, EntityKind, Field, FieldKind, NamingStrategy, ScalarType,
    spec::{EntitySpec, FieldSpec, FieldTypeSpec, SchemaSpec},
    validation,
};

/// The immutable, validated model of all entity types. Shared freely across threads; the caches
/// it holds are populated on first use.
#[derive(Debug)]
pub struct Schema {
    entities: Vec<Entity>,
    ids: HashMap<String, EntityId>,
    converters: IndexMap<String, Arc<dyn Converter>>,
    naming: NamingStrategy,
    validation: Vec<OnceLock<Result<(), SchemaError>>>,
    pub(crate) plans: PlanCache,
}

impl Schema {
    pub(super) fn build(spec: SchemaSpec) -> Result<Schema, SchemaError> {
        let SchemaSpec {
            entities: entity_specs,
            naming,
            converters,
        } = spec;

        let mut ids = HashMap::new();
        for (index, entity_spec) in entity_specs.iter().enumerate() {
            if ids
                .insert(entity_spec.name.clone(), EntityId(index))
                .is_some()
            {
                return Err(SchemaError::DuplicateEntity(entity_spec.name.clone()));
            }
        }

        let entities = entity_specs
            .iter()
            .map(|entity_spec| {
                let fields = entity_spec
                    .fields
                    .iter()
                    .map(|field_spec| {
                        resolve_field(entity_spec, field_spec, &entity_specs, &ids, &converters)
                    })
                    .collect::<Result<Vec<_>, _>>()?;

                Ok(Entity {
                    name: entity_spec.name.clone(),
                    table_name: entity_spec
                        .table
                        .clone()
                        .unwrap_or_else(|| naming.table.table_name(&entity_spec.name)),
                    kind: entity_spec.kind,
                    fields,
                    columns: vec![],
                })
            })
            .collect::<Result<Vec<_>, SchemaError>>()?;

        let mut schema = Schema {
            validation: entities.iter().map(|_| OnceLock::new()).collect(),
            entities,
            ids,
            converters,
            naming,
            plans: PlanCache::default(),
        };

        for index in 0..schema.entities.len() {
            schema.validate(EntityId(index))?;
        }

        // Columns depend only on validated field kinds, so they can be laid out in any order
        let layouts: Vec<_> = (0..schema.entities.len())
            .map(|index| layout_entity(&schema, EntityId(index)))
            .collect();

        for (entity, (columns, ranges)) in schema.entities.iter_mut().zip(layouts) {
            for (field, range) in entity.fields.iter_mut().zip(ranges) {
                field.columns = range;
            }
            entity.columns = columns;
        }

        debug!(entities = schema.entities.len(), "Built schema");

        Ok(schema)
    }

    pub fn get_entity(&self, id: EntityId) -> &Entity {
        &self.entities[id.0]
    }

    pub fn get_entity_id(&self, name: &str) -> Option<EntityId> {
        self.ids.get(name).copied()
    }

    pub fn entity_id(&self, name: &str) -> Result<EntityId, SchemaError> {
        self.get_entity_id(name)
            .ok_or_else(|| SchemaError::UnknownEntity(name.to_string()))
    }

    pub fn entities(&self) -> impl Iterator<Item = (EntityId, &Entity)> {
        self.entities
            .iter()
            .enumerate()
            .map(|(index, entity)| (EntityId(index), entity))
    }

    pub fn converter(&self, name: &str) -> Option<&Arc<dyn Converter>> {
        self.converters.get(name)
    }

    pub fn naming(&self) -> &NamingStrategy {
        &self.naming
    }

    /// Validate an entity (and everything it composes). The outcome is computed once and
    /// cached; concurrent first callers wait for the same result.
    pub fn validate(&self, id: EntityId) -> Result<(), SchemaError> {
        self.validation[id.0]
            .get_or_init(|| validation::validate_entity(self, id))
            .clone()
    }

    /// The slot layout of rows selected for `id` in `mode`, built once and cached
    pub fn row_plan(&self, id: EntityId, mode: SelectMode) -> Result<Arc<RowPlan>, SchemaError> {
        self.plans.get_or_build(self, id, mode)
    }

    /// Primary key columns of an entity, failing for entities that have none
    pub fn require_pk_columns(&self, id: EntityId) -> Result<&[Column], SchemaError> {
        let entity = self.get_entity(id);
        match entity.pk_columns() {
            [] => Err(SchemaError::MissingPrimaryKey(entity.name.clone())),
            columns => Ok(columns),
        }
    }
}

fn resolve_field(
    entity_spec: &EntitySpec,
    field_spec: &FieldSpec,
    entity_specs: &[EntitySpec],
    ids: &HashMap<String, EntityId>,
    converters: &IndexMap<String, Arc<dyn Converter>>,
) -> Result<Field, SchemaError> {
    let qualified_name = format!("{}.{}", entity_spec.name, field_spec.name);

    let target_of = |name: &String| -> Result<(EntityId, EntityKind), SchemaError> {
        let id = ids
            .get(name)
            .copied()
            .ok_or_else(|| SchemaError::UnknownEntity(name.clone()))?;
        Ok((id, entity_specs[id.0].kind))
    };

    let kind = match &field_spec.typ {
        FieldTypeSpec::Scalar(typ) => {
            if field_spec.foreign_key {
                return Err(SchemaError::InvalidForeignKey {
                    field: qualified_name,
                    reason: "a scalar field cannot be a foreign key".to_string(),
                });
            }
            FieldKind::Scalar(typ.clone())
        }
        FieldTypeSpec::Composite(name) => match target_of(name)? {
            (id, EntityKind::Inline) => {
                if field_spec.foreign_key {
                    return Err(SchemaError::InvalidForeignKey {
                        field: qualified_name,
                        reason: format!("inline type `{name}` has no key to refer to"),
                    });
                }
                FieldKind::Inline(id)
            }
            (id, _) => FieldKind::ForeignKey(id),
        },
        FieldTypeSpec::Ref(name) => match target_of(name)? {
            (_, EntityKind::Inline) => {
                return Err(SchemaError::InvalidForeignKey {
                    field: qualified_name,
                    reason: format!("inline type `{name}` cannot be referenced"),
                });
            }
            (id, _) => FieldKind::Ref(id),
        },
        FieldTypeSpec::Converted(name) => {
            if !converters.contains_key(name) {
                return Err(SchemaError::UnknownConverter {
                    field: qualified_name,
                    converter: name.clone(),
                });
            }
            if field_spec.primary_key || field_spec.foreign_key {
                return Err(SchemaError::ConverterKey(qualified_name));
            }
            FieldKind::Converted(name.clone())
        }
    };

    Ok(Field {
        name: field_spec.name.clone(),
        kind,
        primary_key: field_spec.primary_key,
        nullable: field_spec.nullable,
        auto_generated: field_spec.auto_generated,
        insertable: field_spec.insertable,
        updatable: field_spec.updatable,
        column_names: field_spec.columns.clone(),
        columns: 0..0,
    })
}

/// Flags and naming inherited from the inline composites enclosing a field
#[derive(Clone, Default)]
struct Enclosing {
    segments: Vec<String>,
    path: Vec<String>,
    nullable: bool,
    primary_key: bool,
    auto_generated: bool,
    read_only: bool,
}

fn layout_entity(schema: &Schema, id: EntityId) -> (Vec<Column>, Vec<Range<usize>>) {
    let mut columns = vec![];
    let enclosing = Enclosing::default();

    let ranges = schema
        .get_entity(id)
        .fields
        .iter()
        .map(|field| {
            let start = columns.len();
            push_field_columns(schema, field, &enclosing, &mut columns);
            start..columns.len()
        })
        .collect();

    (columns, ranges)
}

fn push_field_columns(
    schema: &Schema,
    field: &Field,
    enclosing: &Enclosing,
    columns: &mut Vec<Column>,
) {
    let field_path = enclosing
        .path
        .iter()
        .map(String::as_str)
        .chain(std::iter::once(field.name.as_str()))
        .collect::<Vec<_>>()
        .join(".");

    let column = |name: String, typ: ScalarType| Column {
        name,
        typ,
        nullable: enclosing.nullable || field.nullable,
        primary_key: enclosing.primary_key || field.primary_key,
        foreign_key: field.is_foreign_key(),
        auto_generated: enclosing.auto_generated || field.auto_generated,
        insertable: !enclosing.read_only && field.insertable,
        updatable: !enclosing.read_only && field.updatable,
        field_path: field_path.clone(),
    };

    let derived_name = |extra: Option<&str>| {
        let segments: Vec<&str> = enclosing
            .segments
            .iter()
            .map(String::as_str)
            .chain(std::iter::once(field.name.as_str()))
            .chain(extra)
            .collect();
        schema.naming.column.column_name(&segments)
    };

    match &field.kind {
        FieldKind::Scalar(typ) => {
            let name = field
                .column_names
                .first()
                .cloned()
                .unwrap_or_else(|| derived_name(None));
            columns.push(column(name, typ.clone()));
        }
        FieldKind::Converted(converter) => {
            if let Some(converter) = schema.converter(converter) {
                for (index, converted) in converter.columns().into_iter().enumerate() {
                    let name = field.column_names.get(index).cloned().unwrap_or_else(|| {
                        if converted.suffix.is_empty() {
                            derived_name(None)
                        } else {
                            derived_name(Some(&converted.suffix))
                        }
                    });
                    columns.push(column(name, converted.typ));
                }
            }
        }
        FieldKind::Inline(target) => {
            let mut segments = enclosing.segments.clone();
            match field.column_names.first() {
                Some(prefix) => segments = vec![prefix.clone()],
                None => segments.push(field.name.clone()),
            }
            let mut path = enclosing.path.clone();
            path.push(field.name.clone());

            let inner = Enclosing {
                segments,
                path,
                nullable: enclosing.nullable || field.nullable,
                primary_key: enclosing.primary_key || field.primary_key,
                auto_generated: enclosing.auto_generated || field.auto_generated,
                read_only: enclosing.read_only || (!field.insertable && !field.updatable),
            };

            for inner_field in &schema.get_entity(*target).fields {
                push_field_columns(schema, inner_field, &inner, columns);
            }
        }
        FieldKind::ForeignKey(target) | FieldKind::Ref(target) => {
            if let Some((pk_name, pk_type)) = key_column_definition(schema, *target) {
                let name = field
                    .column_names
                    .first()
                    .cloned()
                    .unwrap_or_else(|| derived_name(Some(&pk_name)));
                columns.push(column(name, pk_type));
            }
        }
    }
}

/// Name and type of the single primary key column of a foreign key target. Validation guarantees
/// the key is one scalar field.
fn key_column_definition(schema: &Schema, target: EntityId) -> Option<(String, ScalarType)> {
    let pk_field = schema.get_entity(target).pk_field()?;
    match &pk_field.kind {
        FieldKind::Scalar(typ) => {
            let name = pk_field
                .column_names
                .first()
                .cloned()
                .unwrap_or_else(|| schema.naming.column.column_name(&[&pk_field.name]));
            Some((name, typ.clone()))
        }
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use crate::schema::{EntitySpec, FieldSpec, ScalarType, SchemaSpec};
    use crate::transform::test_util::TestSetup;

    use super::*;

    #[test]
    fn flattens_inline_and_foreign_key_columns() {
        TestSetup::with_setup(|TestSetup { schema, person, order, .. }| {
            let person = schema.get_entity(person);
            let names: Vec<_> = person.columns().iter().map(|c| c.name.as_str()).collect();
            assert_eq!(
                names,
                vec![
                    "id",
                    "name",
                    "home_street",
                    "home_city_id",
                    "work_street",
                    "work_city_id"
                ]
            );
            assert_eq!(person.field("home").unwrap().columns(), 2..4);
            assert_eq!(person.columns()[3].field_path, "home.city");
            assert!(person.columns()[4].nullable);

            let order = schema.get_entity(order);
            assert_eq!(order.table_name, "orders");
            assert_eq!(order.columns()[1].name, "customer_id");
            assert!(order.columns()[1].foreign_key);
        })
    }

    #[test]
    fn explicit_column_names_win() {
        let schema = SchemaSpec::new(vec![EntitySpec::table(
            "Customer",
            vec![
                FieldSpec::scalar("id", ScalarType::Int)
                    .pk()
                    .with_columns(&["customer_pk"]),
                FieldSpec::scalar("fullName", ScalarType::Text),
            ],
        )])
        .to_schema()
        .unwrap();

        let customer = schema.get_entity(schema.entity_id("Customer").unwrap());
        assert_eq!(customer.table_name, "customer");
        assert_eq!(customer.columns()[0].name, "customer_pk");
        assert_eq!(customer.columns()[1].name, "full_name");
    }

    #[test]
    fn duplicate_and_unknown_entities() {
        let duplicate = SchemaSpec::new(vec![
            EntitySpec::table("A", vec![FieldSpec::scalar("id", ScalarType::Int).pk()]),
            EntitySpec::table("A", vec![FieldSpec::scalar("id", ScalarType::Int).pk()]),
        ])
        .to_schema();
        assert_eq!(
            duplicate.unwrap_err(),
            SchemaError::DuplicateEntity("A".to_string())
        );

        let unknown = SchemaSpec::new(vec![EntitySpec::table(
            "A",
            vec![
                FieldSpec::scalar("id", ScalarType::Int).pk(),
                FieldSpec::foreign_key("b", "B"),
            ],
        )])
        .to_schema();
        assert_eq!(unknown.unwrap_err(), SchemaError::UnknownEntity("B".to_string()));
    }

    #[test]
    fn unknown_converter() {
        let result = SchemaSpec::new(vec![EntitySpec::table(
            "Product",
            vec![
                FieldSpec::scalar("id", ScalarType::Int).pk(),
                FieldSpec::converted("price", "money"),
            ],
        )])
        .to_schema();

        assert_eq!(
            result.unwrap_err(),
            SchemaError::UnknownConverter {
                field: "Product.price".to_string(),
                converter: "money".to_string()
            }
        );
    }
}

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
use std::sync::{Arc, RwLock};

use crate::asql::SelectMode;
use crate::schema::{Converter, FieldKind, ScalarType};
use crate::{EntityId, Schema, SchemaError};

/// How the slots of a row map to the fields of an entity, for one select mode
#[derive(Debug)]
pub struct RowPlan {
    pub entity: EntityId,
    pub fields: Vec<FieldPlan>,
    /// Number of slots the plan consumes
    pub width: usize,
}

#[derive(Debug)]
pub enum FieldPlan {
    Scalar {
        name: String,
        typ: ScalarType,
        nullable: bool,
    },
    Converted {
        name: String,
        converter: Arc<dyn Converter>,
        width: usize,
        nullable: bool,
    },
    /// A nested record built from a contiguous run of slots: an inline composite, or (in full
    /// mode) the joined target of a foreign key
    Composite {
        name: String,
        plan: Arc<RowPlan>,
        nullable: bool,
    },
    /// A deferred reference built from the target's key slots
    Ref {
        name: String,
        target: EntityId,
        key_types: Vec<ScalarType>,
        nullable: bool,
    },
}

impl FieldPlan {
    pub fn name(&self) -> &str {
        match self {
            FieldPlan::Scalar { name, .. }
            | FieldPlan::Converted { name, .. }
            | FieldPlan::Composite { name, .. }
            | FieldPlan::Ref { name, .. } => name,
        }
    }

    pub fn width(&self) -> usize {
        match self {
            FieldPlan::Scalar { .. } => 1,
            FieldPlan::Converted { width, .. } => *width,
            FieldPlan::Composite { plan, .. } => plan.width,
            FieldPlan::Ref { key_types, .. } => key_types.len(),
        }
    }
}

impl RowPlan {
    fn build(schema: &Schema, id: EntityId, mode: SelectMode) -> Result<RowPlan, SchemaError> {
        let entity = schema.get_entity(id);

        let fields: Vec<_> = match mode {
            SelectMode::Pk => {
                let pk = entity
                    .pk_field()
                    .ok_or_else(|| SchemaError::MissingPrimaryKey(entity.name.clone()))?;
                vec![pk]
            }
            SelectMode::Full | SelectMode::Nested => entity.fields.iter().collect(),
        };

        let fields = fields
            .into_iter()
            .map(|field| {
                let name = field.name.clone();
                let nullable = field.nullable;

                Ok(match &field.kind {
                    FieldKind::Scalar(typ) => FieldPlan::Scalar {
                        name,
                        typ: typ.clone(),
                        nullable,
                    },
                    FieldKind::Converted(converter) => FieldPlan::Converted {
                        name,
                        converter: schema
                            .converter(converter)
                            .cloned()
                            .ok_or_else(|| SchemaError::UnknownConverter {
                                field: format!("{}.{}", entity.name, field.name),
                                converter: converter.clone(),
                            })?,
                        width: field.width(),
                        nullable,
                    },
                    FieldKind::Inline(target) => {
                        // A compound key is read as the inline type's own columns
                        let inline_mode = match mode {
                            SelectMode::Pk => SelectMode::Nested,
                            mode => mode,
                        };
                        FieldPlan::Composite {
                            name,
                            plan: Arc::new(RowPlan::build(schema, *target, inline_mode)?),
                            nullable,
                        }
                    }
                    FieldKind::ForeignKey(target) if mode == SelectMode::Full => {
                        FieldPlan::Composite {
                            name,
                            plan: schema.row_plan(*target, SelectMode::Full)?,
                            nullable,
                        }
                    }
                    FieldKind::ForeignKey(target) | FieldKind::Ref(target) => FieldPlan::Ref {
                        name,
                        target: *target,
                        key_types: schema
                            .require_pk_columns(*target)?
                            .iter()
                            .map(|column| column.typ.clone())
                            .collect(),
                        nullable,
                    },
                })
            })
            .collect::<Result<Vec<_>, SchemaError>>()?;

        Ok(RowPlan {
            entity: id,
            width: fields.iter().map(FieldPlan::width).sum(),
            fields,
        })
    }

    /// Index of the primary key field and its slots
    pub fn pk_slots(&self, schema: &Schema) -> Option<(usize, Range<usize>)> {
        let pk_name = &schema.get_entity(self.entity).pk_field()?.name;
        let mut offset = 0;

        for (index, field) in self.fields.iter().enumerate() {
            if field.name() == pk_name {
                return Some((index, offset..offset + field.width()));
            }
            offset += field.width();
        }
        None
    }
}

/// Row plans per entity and select mode, built on first use
#[derive(Debug, Default)]
pub(crate) struct PlanCache {
    plans: RwLock<HashMap<(EntityId, SelectMode), Arc<RowPlan>>>,
}

impl PlanCache {
    pub(crate) fn get_or_build(
        &self,
        schema: &Schema,
        entity: EntityId,
        mode: SelectMode,
    ) -> Result<Arc<RowPlan>, SchemaError> {
        let key = (entity, mode);

        if let Some(plan) = self
            .plans
            .read()
            .ok()
            .and_then(|plans| plans.get(&key).cloned())
        {
            return Ok(plan);
        }

        // Built outside the lock; a concurrent builder produces an identical plan and the first
        // one stored wins
        let plan = Arc::new(RowPlan::build(schema, entity, mode)?);

        Ok(match self.plans.write() {
            Ok(mut plans) => plans.entry(key).or_insert(plan).clone(),
            Err(_) => plan,
        })
    }
}

#[cfg(test)]
mod tests {
    use crate::transform::test_util::TestSetup;

    use super::*;

    #[test]
    fn widths_per_mode() {
        TestSetup::with_setup(|TestSetup { schema, order, person, .. }| {
            assert_eq!(schema.row_plan(order, SelectMode::Full).unwrap().width, 3);
            assert_eq!(schema.row_plan(order, SelectMode::Nested).unwrap().width, 2);
            assert_eq!(schema.row_plan(order, SelectMode::Pk).unwrap().width, 1);

            // id, name, home (street, city (id, name)), work (street, city (id, name))
            assert_eq!(schema.row_plan(person, SelectMode::Full).unwrap().width, 8);
            assert_eq!(schema.row_plan(person, SelectMode::Nested).unwrap().width, 6);
        })
    }

    #[test]
    fn plans_are_cached() {
        TestSetup::with_setup(|TestSetup { schema, order, .. }| {
            let first = schema.row_plan(order, SelectMode::Full).unwrap();
            let second = schema.row_plan(order, SelectMode::Full).unwrap();
            assert!(Arc::ptr_eq(&first, &second));
        })
    }

    #[test]
    fn primary_key_slots() {
        TestSetup::with_setup(|TestSetup { schema, flight, airport, .. }| {
            let plan = schema.row_plan(flight, SelectMode::Full).unwrap();
            assert_eq!(plan.pk_slots(&schema), Some((0, 0..1)));

            let airport_plan = schema.row_plan(airport, SelectMode::Nested).unwrap();
            assert_eq!(airport_plan.pk_slots(&schema), Some((0, 0..1)));
        })
    }
}

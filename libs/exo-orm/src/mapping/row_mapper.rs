// Copyright Exograph, Inc. All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file at the root of this repository.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

use std::sync::Arc;

use crate::asql::SelectMode;
use crate::schema::ScalarType;
use crate::{
    EntityId, FieldValue, MappingError, OrmError, Record, Ref, RefFetcher, Schema, SqlValue,
};

use super::{FieldPlan, Interner, RowPlan, coerce};

/// Rebuilds records from flat rows, following the entity's row plan for the select mode the rows
/// were produced with.
#[derive(Clone)]
pub struct RowMapper<'s> {
    schema: &'s Schema,
    fetcher: Option<Arc<dyn RefFetcher>>,
}

impl std::fmt::Debug for RowMapper<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RowMapper")
            .field("fetcher", &self.fetcher.is_some())
            .finish_non_exhaustive()
    }
}

impl<'s> RowMapper<'s> {
    pub fn new(schema: &'s Schema) -> Self {
        Self {
            schema,
            fetcher: None,
        }
    }

    /// Fetcher given to every reference the mapper creates
    pub fn with_fetcher(self, fetcher: Arc<dyn RefFetcher>) -> Self {
        Self {
            fetcher: Some(fetcher),
            ..self
        }
    }

    /// Build the record a `mode` select of `entity` produced. Nested records pass through
    /// `interner`; the returned record itself does not.
    pub fn map_row(
        &self,
        row: &[SqlValue],
        entity: EntityId,
        mode: SelectMode,
        interner: &mut Interner,
    ) -> Result<Record, OrmError> {
        if mode == SelectMode::Pk {
            return Err(OrmError::Usage(
                "Rows of primary key selects map to references; use map_ref".to_string(),
            ));
        }

        let plan = self.checked_plan(row, entity, mode)?;
        let mut cursor = 0;
        let values = self.map_fields(
            &plan,
            row,
            &mut cursor,
            &self.schema.get_entity(entity).name,
            interner,
        )?;

        Ok(Record::new(entity, values))
    }

    /// Build a reference to the entity a row describes, reading only its primary key slots
    pub fn map_ref(
        &self,
        row: &[SqlValue],
        entity: EntityId,
        mode: SelectMode,
    ) -> Result<Ref, OrmError> {
        let plan = self.checked_plan(row, entity, mode)?;
        let target = self.schema.get_entity(entity);
        let (_, slots) = plan
            .pk_slots(self.schema)
            .ok_or_else(|| crate::SchemaError::MissingPrimaryKey(target.name.clone()))?;

        let key_types: Vec<ScalarType> = self
            .schema
            .require_pk_columns(entity)?
            .iter()
            .map(|column| column.typ.clone())
            .collect();

        let path = match target.pk_field() {
            Some(pk) => format!("{}.{}", target.name, pk.name),
            None => target.name.clone(),
        };

        Ok(self.make_ref(&row[slots], entity, &key_types, false, &path)?)
    }

    fn checked_plan(
        &self,
        row: &[SqlValue],
        entity: EntityId,
        mode: SelectMode,
    ) -> Result<Arc<RowPlan>, OrmError> {
        let plan = self.schema.row_plan(entity, mode)?;

        if row.len() != plan.width {
            return Err(MappingError::ColumnCount {
                entity: self.schema.get_entity(entity).name.clone(),
                expected: plan.width,
                actual: row.len(),
            }
            .into());
        }
        Ok(plan)
    }

    fn map_fields(
        &self,
        plan: &RowPlan,
        row: &[SqlValue],
        cursor: &mut usize,
        path: &str,
        interner: &mut Interner,
    ) -> Result<Vec<FieldValue>, MappingError> {
        plan.fields
            .iter()
            .map(|field| {
                let width = field.width();
                let slots = &row[*cursor..*cursor + width];
                let field_path = format!("{path}.{}", field.name());

                let value = match field {
                    FieldPlan::Scalar { typ, nullable, .. } => match &slots[0] {
                        SqlValue::Null if *nullable => FieldValue::Null,
                        SqlValue::Null => return Err(MappingError::NullValue { path: field_path }),
                        value => coerce(value, typ, &field_path)?,
                    },

                    FieldPlan::Converted {
                        converter,
                        nullable,
                        ..
                    } => {
                        let value = converter.from_columns(slots).map_err(|message| {
                            MappingError::Converter {
                                path: field_path.clone(),
                                message,
                            }
                        })?;
                        if value.is_null() && !nullable {
                            return Err(MappingError::NullValue { path: field_path });
                        }
                        value
                    }

                    FieldPlan::Composite {
                        plan: nested,
                        nullable,
                        ..
                    } => {
                        if *nullable && slots.iter().all(SqlValue::is_null) {
                            FieldValue::Null
                        } else {
                            let mut nested_cursor = 0;
                            let values = self.map_fields(
                                nested,
                                slots,
                                &mut nested_cursor,
                                &field_path,
                                interner,
                            )?;
                            FieldValue::Record(interner.intern(Record::new(nested.entity, values)))
                        }
                    }

                    FieldPlan::Ref {
                        target,
                        key_types,
                        nullable,
                        ..
                    } => FieldValue::Ref(self.make_ref(
                        slots,
                        *target,
                        key_types,
                        *nullable,
                        &field_path,
                    )?),
                };

                *cursor += width;
                Ok(value)
            })
            .collect()
    }

    fn make_ref(
        &self,
        slots: &[SqlValue],
        target: EntityId,
        key_types: &[ScalarType],
        nullable: bool,
        path: &str,
    ) -> Result<Ref, MappingError> {
        if slots.iter().all(SqlValue::is_null) {
            return if nullable {
                Ok(Ref::null(target))
            } else {
                Err(MappingError::NullValue {
                    path: path.to_string(),
                })
            };
        }

        let key = slots
            .iter()
            .zip(key_types)
            .map(|(value, typ)| match value {
                SqlValue::Null => Err(MappingError::NullValue {
                    path: path.to_string(),
                }),
                value => match coerce(value, typ, path)? {
                    FieldValue::Scalar(value) => Ok(value),
                    FieldValue::Enum(variant) => Ok(SqlValue::Text(variant)),
                    _ => Err(MappingError::TypeMismatch {
                        path: path.to_string(),
                        expected: typ.to_string(),
                        actual: value.type_name().to_string(),
                    }),
                },
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Ref::new(target, key, self.fetcher.clone()))
    }
}

#[cfg(test)]
mod tests {
    use crate::transform::test_util::TestSetup;

    use super::*;

    #[test]
    fn full_row_builds_the_joined_record() {
        TestSetup::with_setup(|TestSetup { schema, order, customer, .. }| {
            let mapper = RowMapper::new(&schema);
            let record = mapper
                .map_row(
                    &[SqlValue::Int(1), SqlValue::Int(42), SqlValue::from("Ada")],
                    order,
                    SelectMode::Full,
                    &mut Interner::default(),
                )
                .unwrap();

            assert_eq!(
                record,
                Record::new(
                    order,
                    vec![
                        FieldValue::scalar(1),
                        FieldValue::record(Record::new(
                            customer,
                            vec![FieldValue::scalar(42), FieldValue::scalar("Ada")]
                        ))
                    ]
                )
            );
        })
    }

    #[test]
    fn nested_row_builds_a_reference() {
        TestSetup::with_setup(|TestSetup { schema, order, customer, .. }| {
            let mapper = RowMapper::new(&schema);
            let record = mapper
                .map_row(
                    &[SqlValue::Int(1), SqlValue::Int(42)],
                    order,
                    SelectMode::Nested,
                    &mut Interner::default(),
                )
                .unwrap();

            let reference = record.get(&schema, "customer").unwrap().as_reference().unwrap();
            assert_eq!(reference.entity(), customer);
            assert_eq!(reference.key(), Some(&[SqlValue::Int(42)][..]));
            assert!(!reference.is_loaded());
        })
    }

    #[test]
    fn column_count_checked_first() {
        TestSetup::with_setup(|TestSetup { schema, order, .. }| {
            let mapper = RowMapper::new(&schema);
            let mut interner = Interner::default();

            let err = mapper
                .map_row(&[SqlValue::Null], order, SelectMode::Full, &mut interner)
                .unwrap_err();
            assert!(matches!(
                err,
                OrmError::Mapping(MappingError::ColumnCount {
                    expected: 3,
                    actual: 1,
                    ..
                })
            ));
            assert!(interner.is_empty());
        })
    }

    #[test]
    fn null_in_required_nested_field() {
        TestSetup::with_setup(|TestSetup { schema, order, .. }| {
            let err = RowMapper::new(&schema)
                .map_row(
                    &[SqlValue::Int(1), SqlValue::Int(42), SqlValue::Null],
                    order,
                    SelectMode::Full,
                    &mut Interner::default(),
                )
                .unwrap_err();

            assert!(matches!(
                err,
                OrmError::Mapping(MappingError::NullValue { path }) if path == "Order.customer.name"
            ));
        })
    }

    #[test]
    fn nullable_composites_collapse_to_null() {
        TestSetup::with_setup(|TestSetup { schema, person, .. }| {
            let row = [
                SqlValue::Int(1),
                SqlValue::from("Ada"),
                SqlValue::from("Main St"),
                SqlValue::Int(7),
                SqlValue::Null,
                SqlValue::Null,
            ];
            let record = RowMapper::new(&schema)
                .map_row(&row, person, SelectMode::Nested, &mut Interner::default())
                .unwrap();

            assert!(record.get(&schema, "home").unwrap().as_record().is_some());
            assert_eq!(record.get(&schema, "work"), Some(&FieldValue::Null));

            // A partially null work address is not collapsed
            let mut partial = row.clone();
            partial[4] = SqlValue::from("Elm St");
            let err = RowMapper::new(&schema)
                .map_row(&partial, person, SelectMode::Nested, &mut Interner::default())
                .unwrap_err();
            assert!(matches!(
                err,
                OrmError::Mapping(MappingError::NullValue { path }) if path == "Person.work.city"
            ));
        })
    }

    #[test]
    fn null_references() {
        TestSetup::with_setup(|TestSetup { schema, employee, order, .. }| {
            let mapper = RowMapper::new(&schema);
            let mut interner = Interner::default();

            let record = mapper
                .map_row(
                    &[SqlValue::Int(1), SqlValue::from("Ada"), SqlValue::Null],
                    employee,
                    SelectMode::Nested,
                    &mut interner,
                )
                .unwrap();
            assert!(record.get(&schema, "manager").unwrap().as_reference().unwrap().is_null());

            let err = mapper
                .map_row(
                    &[SqlValue::Int(1), SqlValue::Null],
                    order,
                    SelectMode::Nested,
                    &mut interner,
                )
                .unwrap_err();
            assert!(matches!(
                err,
                OrmError::Mapping(MappingError::NullValue { path }) if path == "Order.customer"
            ));
        })
    }

    #[test]
    fn repeated_nested_records_are_shared() {
        TestSetup::with_setup(|TestSetup { schema, order, .. }| {
            let mapper = RowMapper::new(&schema);
            let mut interner = Interner::default();

            let rows = [
                [SqlValue::Int(1), SqlValue::Int(42), SqlValue::from("Ada")],
                [SqlValue::Int(2), SqlValue::Int(42), SqlValue::from("Ada")],
            ];
            let records: Vec<_> = rows
                .iter()
                .map(|row| mapper.map_row(row, order, SelectMode::Full, &mut interner).unwrap())
                .collect();

            let first = records[0].get(&schema, "customer").unwrap().as_record().unwrap();
            let second = records[1].get(&schema, "customer").unwrap().as_record().unwrap();
            assert!(Arc::ptr_eq(first, second));
            assert_eq!(interner.len(), 1);
        })
    }

    #[test]
    fn references_from_full_rows() {
        TestSetup::with_setup(|TestSetup { schema, flight, .. }| {
            // id, origin (code, name), destination (code, name)
            let row = [
                SqlValue::Int(9),
                SqlValue::from("SFO"),
                SqlValue::from("San Francisco"),
                SqlValue::Null,
                SqlValue::Null,
            ];
            let reference = RowMapper::new(&schema)
                .map_ref(&row, flight, SelectMode::Full)
                .unwrap();
            assert_eq!(reference.key(), Some(&[SqlValue::Int(9)][..]));

            assert!(matches!(
                RowMapper::new(&schema).map_row(
                    &row,
                    flight,
                    SelectMode::Pk,
                    &mut Interner::default()
                ),
                Err(OrmError::Usage(_))
            ));
        })
    }
}

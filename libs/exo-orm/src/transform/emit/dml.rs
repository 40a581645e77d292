// Copyright Exograph, Inc. All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file at the root of this repository.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

use crate::asql::{SetClause, ValuesClause};
use crate::mapping::encode_record;
use crate::schema::Column;
use crate::sql::{ExpressionBuilder, ParamSlot, SQLBuilder};
use crate::transform::compiler::Compilation;
use crate::{EntityId, OrmError, Record};

fn is_insertable(column: &Column) -> bool {
    column.insertable && !column.auto_generated
}

fn is_updatable(column: &Column) -> bool {
    column.updatable && !column.primary_key && !column.auto_generated
}

impl Compilation<'_> {
    /// `INSERT INTO table (columns)`
    pub(super) fn emit_insert(&mut self, entity: EntityId) {
        let entity = self.schema.get_entity(entity);

        self.builder.push_str("INSERT INTO ");
        self.builder.push_identifier(&entity.table_name);
        self.builder.push_str(" (");
        self.builder.push_iter(
            entity.columns().iter().filter(|c| is_insertable(c)).collect::<Vec<_>>().into_iter(),
            ", ",
            |builder, column| builder.push_identifier(&column.name),
        );
        self.builder.push(')');
    }

    /// `VALUES (...), (...)`, one tuple per record, or a single tuple of bind variables
    pub(super) fn emit_values(&mut self, values: &ValuesClause) -> Result<(), OrmError> {
        self.builder.push_str("VALUES ");

        match values {
            ValuesClause::Records(records) => {
                if records.is_empty() {
                    return Err(OrmError::Usage("VALUES needs at least one record".to_string()));
                }

                let tuples = records
                    .iter()
                    .map(|record| self.column_values(record, is_insertable))
                    .collect::<Result<Vec<_>, _>>()?;

                self.builder.push_iter(tuples.into_iter(), ", ", |builder, tuple| {
                    builder.push('(');
                    builder.push_iter(tuple.into_iter(), ", ", SQLBuilder::push_param);
                    builder.push(')');
                });
            }
            ValuesClause::BindVars { entity } => {
                self.bind_entity = Some(*entity);
                let columns = self.schema.get_entity(*entity).columns();

                self.builder.push('(');
                self.builder.push_iter(
                    columns.iter().filter(|c| is_insertable(c)).collect::<Vec<_>>().into_iter(),
                    ", ",
                    |builder, column| builder.push_param(ParamSlot::BindVar(column.name.clone())),
                );
                self.builder.push(')');
            }
        }
        Ok(())
    }

    /// `UPDATE table AS alias`
    pub(super) fn emit_update(&mut self, entity: EntityId) -> Result<(), OrmError> {
        let table = self.table_at(entity, "")?;
        self.builder.push_str("UPDATE ");
        table.build(&mut self.builder);
        Ok(())
    }

    /// `SET column = ?, ...` over the updatable columns. Primary keys are never set.
    pub(super) fn emit_set(&mut self, set: &SetClause) -> Result<(), OrmError> {
        let (entity, params) = match set {
            SetClause::Record(record) => {
                (record.entity(), self.column_values(record, is_updatable)?)
            }
            SetClause::BindVars { entity } => {
                self.bind_entity = Some(*entity);
                let params = self
                    .schema
                    .get_entity(*entity)
                    .columns()
                    .iter()
                    .filter(|c| is_updatable(c))
                    .map(|column| ParamSlot::BindVar(column.name.clone()))
                    .collect();
                (*entity, params)
            }
        };

        let columns: Vec<_> = self
            .schema
            .get_entity(entity)
            .columns()
            .iter()
            .filter(|c| is_updatable(c))
            .zip(params)
            .collect();

        if columns.is_empty() {
            return Err(OrmError::Usage(format!(
                "`{}` has no updatable columns",
                self.schema.get_entity(entity).name
            )));
        }

        self.builder.push_str("SET ");
        self.builder.without_fully_qualified_column_names(|builder| {
            builder.push_iter(columns.into_iter(), ", ", |builder, (column, param)| {
                builder.push_column("", column.name.as_str());
                builder.push_str(" = ");
                builder.push_param(param);
            });
        });
        Ok(())
    }

    /// `DELETE FROM table AS alias`
    pub(super) fn emit_delete(&mut self, entity: EntityId) -> Result<(), OrmError> {
        let table = self.table_at(entity, "")?;
        self.builder.push_str("DELETE FROM ");
        table.build(&mut self.builder);
        Ok(())
    }

    /// Parameters for the record's columns that pass `include`, in column order
    fn column_values(
        &self,
        record: &Record,
        include: fn(&Column) -> bool,
    ) -> Result<Vec<ParamSlot>, OrmError> {
        let columns = self.schema.get_entity(record.entity()).columns();
        let values = encode_record(self.schema, record)?;

        Ok(columns
            .iter()
            .zip(values)
            .filter(|(column, _)| include(column))
            .map(|(_, value)| ParamSlot::Anonymous(value))
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use crate::asql::{Element, Operator, TableRef, WhereTarget};
    use crate::config::CompileOptions;
    use crate::transform::Safety;
    use crate::transform::test_util::{TestSetup, compile, compile_with};
    use crate::{FieldValue, Ref, SqlValue};

    use super::*;

    fn customer_record(customer: EntityId, id: i32, name: &str) -> Record {
        Record::new(customer, vec![FieldValue::scalar(id), FieldValue::scalar(name)])
    }

    fn by_key(entity: EntityId, key: i32) -> Element {
        Element::where_object(
            WhereTarget::Entity(TableRef::new(entity)),
            Operator::Eq,
            vec![FieldValue::scalar(key)],
        )
    }

    #[test]
    fn insert_skips_generated_columns() {
        TestSetup::with_setup(|TestSetup { schema, order, customer, .. }| {
            let order_record = |id: i32| {
                Record::new(
                    order,
                    vec![
                        FieldValue::scalar(id),
                        FieldValue::record(customer_record(customer, 42, "Ada")),
                    ],
                )
            };

            let statement = compile(
                &schema,
                vec![
                    Element::Insert { entity: order },
                    Element::Values(ValuesClause::Records(vec![order_record(1), order_record(2)])),
                ],
            )
            .unwrap();

            assert_statement!(
                statement,
                r#"INSERT INTO "orders" ("customer_id") VALUES (?), (?)"#,
                42,
                42
            );
        })
    }

    #[test]
    fn batch_insert_with_bind_variables() {
        TestSetup::with_setup(|TestSetup { schema, customer, order, .. }| {
            let statement = compile(
                &schema,
                vec![
                    Element::Insert { entity: customer },
                    Element::Values(ValuesClause::BindVars { entity: customer }),
                ],
            )
            .unwrap();

            assert_eq!(
                statement.sql,
                r#"INSERT INTO "customers" ("id", "name") VALUES (:id, :name)"#
            );
            assert_eq!(statement.bind_vars, vec!["id", "name"]);

            let values = statement
                .bind(&schema, &customer_record(customer, 7, "Ada"))
                .unwrap();
            assert_eq!(values["id"], SqlValue::Int(7));
            assert_eq!(values["name"], SqlValue::from("Ada"));

            let wrong_entity = statement.bind(
                &schema,
                &Record::new(order, vec![FieldValue::scalar(1), FieldValue::Null]),
            );
            assert!(matches!(wrong_entity, Err(OrmError::Usage(_))));
        })
    }

    #[test]
    fn update_encodes_converters_enums_and_references() {
        TestSetup::with_setup(|TestSetup { schema, invoice, customer, .. }| {
            let record = Record::new(
                invoice,
                vec![
                    FieldValue::scalar(1),
                    FieldValue::scalar("12.5 EUR"),
                    FieldValue::Enum("PAID".to_string()),
                    FieldValue::Null,
                    FieldValue::Ref(Ref::new(customer, vec![SqlValue::Int(3)], None)),
                ],
            );

            let statement = compile(
                &schema,
                vec![
                    Element::Update {
                        entity: invoice,
                        alias: Some("i".to_string()),
                    },
                    Element::Set(SetClause::Record(record)),
                    by_key(invoice, 1),
                ],
            )
            .unwrap();

            assert_statement!(
                statement.clone(),
                r#"UPDATE "invoices" AS "i" SET "total_amount" = ?, "total_currency" = ?, "status" = ?, "issued" = ?, "customer_id" = ? WHERE "i"."id" = ?"#,
                12.5,
                "EUR",
                "1",
                SqlValue::Null,
                3,
                1
            );
            assert_eq!(statement.safety, Safety::Safe);
        })
    }

    #[test]
    fn update_with_bind_variables_and_named_key() {
        TestSetup::with_setup(|TestSetup { schema, customer, .. }| {
            let statement = compile(
                &schema,
                vec![
                    Element::Update {
                        entity: customer,
                        alias: None,
                    },
                    Element::Set(SetClause::BindVars { entity: customer }),
                    Element::sql(" WHERE "),
                    Element::column(customer, "id"),
                    Element::sql(" = "),
                    Element::Param(crate::asql::Param::Named(
                        "key".to_string(),
                        SqlValue::Int(7),
                    )),
                ],
            )
            .unwrap();

            assert_eq!(
                statement.sql,
                r#"UPDATE "customers" SET "name" = :name WHERE "customers"."id" = :key"#
            );
            assert_eq!(statement.safety, Safety::Safe);

            let values = statement
                .bind(&schema, &customer_record(customer, 7, "Grace"))
                .unwrap();
            assert_eq!(
                values.into_iter().collect::<Vec<_>>(),
                vec![
                    ("key".to_string(), SqlValue::Int(7)),
                    ("name".to_string(), SqlValue::from("Grace"))
                ]
            );
        })
    }

    #[test]
    fn unfiltered_delete_is_flagged() {
        TestSetup::with_setup(|TestSetup { schema, customer, .. }| {
            let delete = || Element::Delete {
                entity: customer,
                alias: Some("c".to_string()),
            };

            let statement = compile(&schema, vec![delete()]).unwrap();
            assert_statement!(statement.clone(), r#"DELETE FROM "customers" AS "c""#);
            assert_eq!(statement.safety, Safety::MissingWhere);
            assert!(statement.ensure_safe(true).is_ok());
            assert!(matches!(statement.ensure_safe(false), Err(OrmError::Usage(_))));

            let rejected = compile_with(
                &schema,
                &CompileOptions::default().rejecting_unsafe_statements(),
                vec![delete()],
            );
            assert!(matches!(rejected, Err(OrmError::Usage(_))));

            let filtered = compile(&schema, vec![delete(), by_key(customer, 3)]).unwrap();
            assert_statement!(
                filtered.clone(),
                r#"DELETE FROM "customers" AS "c" WHERE "c"."id" = ?"#,
                3
            );
            assert_eq!(filtered.safety, Safety::Safe);

            let literal = compile(&schema, vec![delete(), Element::sql(" where 1 = 1")]).unwrap();
            assert_eq!(literal.safety, Safety::Safe);
        })
    }

    #[test]
    fn update_never_sets_generated_keys() {
        TestSetup::with_setup(|TestSetup { schema, order, .. }| {
            // The key is generated and never set; only the customer remains
            let statement = compile(
                &schema,
                vec![
                    Element::Update {
                        entity: order,
                        alias: None,
                    },
                    Element::Set(SetClause::Record(Record::new(
                        order,
                        vec![FieldValue::scalar(1), FieldValue::scalar(42)],
                    ))),
                    by_key(order, 1),
                ],
            )
            .unwrap();

            assert_statement!(
                statement,
                r#"UPDATE "orders" SET "customer_id" = ? WHERE "orders"."id" = ?"#,
                42,
                1
            );
        })
    }
}

// Copyright Exograph, Inc. All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file at the root of this repository.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

#![cfg(test)]

use std::sync::Arc;

use crate::schema::{
    ConvertedColumn, Converter, EntitySpec, EnumEncoding, EnumType, FieldSpec, ScalarType,
    SchemaSpec,
};
use crate::asql::{Element, QueryTemplate};
use crate::config::CompileOptions;
use crate::{EntityId, FieldValue, OrmError, Schema, SqlValue};

use super::{CompiledStatement, TemplateCompiler};

pub struct TestSetup {
    pub schema: Schema,

    pub customer: EntityId,
    pub order: EntityId,
    pub city: EntityId,
    pub address: EntityId,
    pub person: EntityId,
    pub employee: EntityId,
    pub airport: EntityId,
    pub flight: EntityId,
    pub invoice: EntityId,
    pub shipment: EntityId,
}

/// Stores an amount and its currency in two columns; the field value is `"<amount> <currency>"`
#[derive(Debug)]
pub struct MoneyConverter;

impl Converter for MoneyConverter {
    fn columns(&self) -> Vec<ConvertedColumn> {
        vec![
            ConvertedColumn::new("amount", ScalarType::Double),
            ConvertedColumn::new("currency", ScalarType::Text),
        ]
    }

    fn from_columns(&self, values: &[SqlValue]) -> Result<FieldValue, String> {
        match values {
            [SqlValue::Null, SqlValue::Null] => Ok(FieldValue::Null),
            [SqlValue::Double(amount), SqlValue::Text(currency)] => {
                Ok(FieldValue::scalar(format!("{amount} {currency}")))
            }
            _ => Err(format!("invalid money columns {values:?}")),
        }
    }

    fn to_columns(&self, value: &FieldValue) -> Result<Vec<SqlValue>, String> {
        let text = match value.as_scalar() {
            Some(SqlValue::Text(text)) => text,
            _ => return Err(format!("not a money value: {value:?}")),
        };
        let (amount, currency) = text
            .split_once(' ')
            .ok_or_else(|| format!("not a money value: {text}"))?;
        let amount: f64 = amount.parse().map_err(|_| format!("invalid amount {amount}"))?;

        Ok(vec![SqlValue::Double(amount), SqlValue::from(currency)])
    }
}

impl TestSetup {
    pub fn with_setup(test_fn: impl Fn(TestSetup)) {
        let id = || FieldSpec::scalar("id", ScalarType::Int).pk();
        let name = || FieldSpec::scalar("name", ScalarType::Text);

        let schema = SchemaSpec::new(vec![
            EntitySpec::table("Customer", vec![id(), name()]).with_table_name("customers"),
            EntitySpec::table(
                "Order",
                vec![id().auto_generated(), FieldSpec::foreign_key("customer", "Customer")],
            )
            .with_table_name("orders"),
            EntitySpec::table("City", vec![id(), name()]).with_table_name("cities"),
            EntitySpec::inline(
                "Address",
                vec![
                    FieldSpec::scalar("street", ScalarType::Text),
                    FieldSpec::foreign_key("city", "City"),
                ],
            ),
            EntitySpec::table(
                "Person",
                vec![
                    id(),
                    name(),
                    FieldSpec::composite("home", "Address"),
                    FieldSpec::composite("work", "Address").nullable(),
                ],
            )
            .with_table_name("people"),
            EntitySpec::table(
                "Employee",
                vec![
                    id(),
                    name(),
                    FieldSpec::reference("manager", "Employee").nullable(),
                ],
            )
            .with_table_name("employees"),
            EntitySpec::table(
                "Airport",
                vec![FieldSpec::scalar("code", ScalarType::Text).pk(), name()],
            )
            .with_table_name("airports"),
            EntitySpec::table(
                "Flight",
                vec![
                    id(),
                    FieldSpec::foreign_key("origin", "Airport"),
                    FieldSpec::foreign_key("destination", "Airport").nullable(),
                ],
            )
            .with_table_name("flights"),
            EntitySpec::table(
                "Invoice",
                vec![
                    id(),
                    FieldSpec::converted("total", "money"),
                    FieldSpec::scalar(
                        "status",
                        ScalarType::Enum(
                            EnumType::new("Status", &["OPEN", "PAID"])
                                .with_encoding(EnumEncoding::Ordinal),
                        ),
                    ),
                    FieldSpec::scalar("issued", ScalarType::Date).nullable(),
                    FieldSpec::reference("customer", "Customer"),
                ],
            )
            .with_table_name("invoices"),
            EntitySpec::table(
                "Shipment",
                vec![id(), FieldSpec::foreign_key("order", "Order").nullable()],
            )
            .with_table_name("shipments"),
        ])
        .with_converter("money", Arc::new(MoneyConverter))
        .to_schema()
        .unwrap();

        let entity = |name: &str| schema.entity_id(name).unwrap();

        test_fn(TestSetup {
            customer: entity("Customer"),
            order: entity("Order"),
            city: entity("City"),
            address: entity("Address"),
            person: entity("Person"),
            employee: entity("Employee"),
            airport: entity("Airport"),
            flight: entity("Flight"),
            invoice: entity("Invoice"),
            shipment: entity("Shipment"),
            schema,
        })
    }
}

/// Compile with the default options
pub fn compile(schema: &Schema, elements: Vec<Element>) -> Result<CompiledStatement, OrmError> {
    compile_with(schema, &CompileOptions::default(), elements)
}

pub fn compile_with(
    schema: &Schema,
    options: &CompileOptions,
    elements: Vec<Element>,
) -> Result<CompiledStatement, OrmError> {
    TemplateCompiler::new(schema, options).compile(&QueryTemplate::new(elements))
}

/// `From` without automatic joins
pub fn from(entity: EntityId) -> Element {
    Element::From {
        entity,
        alias: None,
        auto_join: false,
    }
}

// Copyright Exograph, Inc. All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file at the root of this repository.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

use crate::asql::{Operator, WhereClause, WhereTarget};
use crate::mapping::{encode_field, primary_key_values};
use crate::sql::{Column, CompareOp, ExpressionBuilder, ParamSlot, Predicate};
use crate::transform::column_path::{find_field, resolve_column};
use crate::transform::compiler::Compilation;
use crate::{FieldValue, OrmError, SqlValue};

impl Compilation<'_> {
    pub(super) fn emit_where(&mut self, clause: &WhereClause) -> Result<(), OrmError> {
        self.builder.push_str("WHERE ");

        match clause {
            WhereClause::Template(elements) => self.emit(elements),
            WhereClause::Object {
                target,
                operator,
                operands,
            } => {
                let predicate = self.object_predicate(target, *operator, operands)?;
                predicate.build(&mut self.builder);
                Ok(())
            }
        }
    }

    /// The predicate comparing a column (or an entity, by its key) with the operands
    fn object_predicate(
        &mut self,
        target: &WhereTarget,
        operator: Operator,
        operands: &[FieldValue],
    ) -> Result<Predicate, OrmError> {
        if let Some(arity) = operator.arity() {
            if operands.len() != arity {
                return Err(OrmError::Usage(format!(
                    "{operator:?} takes {arity} operand(s), got {}",
                    operands.len()
                )));
            }
        }

        let schema = self.schema;
        let (columns, values) = match target {
            WhereTarget::Column(column) => {
                let resolved = resolve_column(schema, &mut self.resolver, column)?;
                let field = find_field(schema, resolved.table, &resolved.field_path)?;
                let path = format!(
                    "{}.{}",
                    schema.get_entity(resolved.table).name,
                    resolved.field_path
                );

                let values = operands
                    .iter()
                    .map(|operand| encode_field(schema, field, operand, &path))
                    .collect::<Result<Vec<_>, _>>()?;
                let columns: Vec<Column> = resolved
                    .columns
                    .iter()
                    .map(|column| Column::physical(&resolved.qualifier, &column.name))
                    .collect();
                (columns, values)
            }
            WhereTarget::Entity(table) => {
                let (_, entry) =
                    self.resolver
                        .find_binding(table.entity, table.path.as_deref(), table.scope)?;
                let alias = entry.alias.clone();
                self.resolver.use_alias(table.entity, &alias, table.scope)?;
                let qualifier = self.resolver.qualifier(table.entity, &alias);

                let entity = schema.get_entity(table.entity);
                let pk_field = entity
                    .pk_field()
                    .ok_or_else(|| crate::SchemaError::MissingPrimaryKey(entity.name.clone()))?;
                let path = format!("{}.{}", entity.name, pk_field.name);

                let values = operands
                    .iter()
                    .map(|operand| match operand {
                        FieldValue::Record(record) => primary_key_values(schema, record),
                        FieldValue::Ref(reference) => Ok(match reference.key() {
                            Some(key) => key.to_vec(),
                            None => vec![SqlValue::Null; pk_field.width()],
                        }),
                        operand => encode_field(schema, pk_field, operand, &path),
                    })
                    .collect::<Result<Vec<_>, _>>()?;
                let columns: Vec<Column> = schema
                    .require_pk_columns(table.entity)?
                    .iter()
                    .map(|column| Column::physical(&qualifier, &column.name))
                    .collect();
                (columns, values)
            }
        };

        if let Some(mismatch) = values.iter().find(|value| value.len() != columns.len()) {
            return Err(OrmError::Usage(format!(
                "Operand has {} value(s) for {} column(s)",
                mismatch.len(),
                columns.len()
            )));
        }

        let orders_values = matches!(
            operator,
            Operator::Lt
                | Operator::Lte
                | Operator::Gt
                | Operator::Gte
                | Operator::Like
                | Operator::Between
        );
        if orders_values && values.iter().flatten().any(SqlValue::is_null) {
            return Err(OrmError::Usage(format!(
                "{operator:?} cannot compare with NULL"
            )));
        }

        let operands: Vec<Vec<Column>> = values
            .into_iter()
            .map(|values| values.into_iter().map(literal).collect())
            .collect();

        match columns.as_slice() {
            [column] => Ok(single_column_predicate(
                column.clone(),
                operator,
                operands.into_iter().flatten().collect(),
            )),
            _ => multi_column_predicate(columns, operator, operands),
        }
    }
}

fn literal(value: SqlValue) -> Column {
    match value {
        SqlValue::Null => Column::Null,
        value => Column::Param(ParamSlot::Anonymous(value)),
    }
}

fn compare_op(operator: Operator) -> Option<CompareOp> {
    match operator {
        Operator::Eq => Some(CompareOp::Eq),
        Operator::Neq => Some(CompareOp::Neq),
        Operator::Lt => Some(CompareOp::Lt),
        Operator::Lte => Some(CompareOp::Lte),
        Operator::Gt => Some(CompareOp::Gt),
        Operator::Gte => Some(CompareOp::Gte),
        Operator::Like => Some(CompareOp::Like),
        _ => None,
    }
}

/// Operands are already checked against the operator's arity
fn single_column_predicate(column: Column, operator: Operator, mut operands: Vec<Column>) -> Predicate {
    if let Some(op) = compare_op(operator) {
        return Predicate::compare(column, op, operands.remove(0));
    }

    match operator {
        Operator::In => Predicate::in_list(column, operands),
        Operator::NotIn => Predicate::not_in_list(column, operands),
        Operator::Between => {
            let high = operands.remove(1);
            let low = operands.remove(0);
            Predicate::Between(column, low, high)
        }
        Operator::IsNull => Predicate::IsNull(column),
        _ => Predicate::IsNotNull(column),
    }
}

/// Compound keys compare column by column
fn multi_column_predicate(
    columns: Vec<Column>,
    operator: Operator,
    operands: Vec<Vec<Column>>,
) -> Result<Predicate, OrmError> {
    let equal = |operand: Vec<Column>| {
        Predicate::and_all(
            columns
                .iter()
                .cloned()
                .zip(operand)
                .map(|(column, value)| Predicate::eq(column, value)),
        )
    };

    match operator {
        Operator::Eq => Ok(operands.into_iter().map(equal).fold(Predicate::True, Predicate::and)),
        Operator::Neq => Ok(!Predicate::and_all(operands.into_iter().map(equal))),
        Operator::In => Ok(Predicate::or_all(operands.into_iter().map(equal))),
        Operator::NotIn => Ok(!Predicate::or_all(operands.into_iter().map(equal))),
        Operator::IsNull => Ok(Predicate::and_all(
            columns.iter().cloned().map(Predicate::IsNull),
        )),
        Operator::IsNotNull => Ok(Predicate::or_all(
            columns.iter().cloned().map(Predicate::IsNotNull),
        )),
        operator => Err(OrmError::Usage(format!(
            "{operator:?} is not supported on a compound key"
        ))),
    }
}

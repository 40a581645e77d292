// Copyright Exograph, Inc. All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file at the root of this repository.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

use std::collections::BTreeMap;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::{ParameterError, SqlValue};

use super::Dialect;

/// A parameter as pushed into the builder, before placeholders are rendered.
#[derive(Debug, Clone, PartialEq)]
pub enum ParamSlot {
    /// A value with no user-visible identity (object predicates, set clauses, values lists)
    Anonymous(SqlValue),
    /// A 1-based positional parameter from the template
    Positional(usize, SqlValue),
    Named(String, SqlValue),
    /// A named placeholder whose value is supplied later, one record at a time
    BindVar(String),
}

impl ParamSlot {
    pub fn value(&self) -> Option<&SqlValue> {
        match self {
            ParamSlot::Anonymous(value)
            | ParamSlot::Positional(_, value)
            | ParamSlot::Named(_, value) => Some(value),
            ParamSlot::BindVar(_) => None,
        }
    }

    pub fn name(&self) -> Option<&str> {
        match self {
            ParamSlot::Named(name, _) | ParamSlot::BindVar(name) => Some(name),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ParamStyle {
    /// `?`
    Positional,
    /// `:name`
    Named,
}

/// Parameter values of a compiled statement, already coerced for the dialect
#[derive(Debug, Clone, PartialEq)]
pub enum Parameters {
    /// One value per `?`, in order of appearance
    Positional(Vec<SqlValue>),
    /// One value per distinct name; bind variables are supplied separately
    Named(IndexMap<String, SqlValue>),
}

impl Parameters {
    pub fn len(&self) -> usize {
        match self {
            Parameters::Positional(values) => values.len(),
            Parameters::Named(values) => values.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn positional(&self) -> Option<&[SqlValue]> {
        match self {
            Parameters::Positional(values) => Some(values),
            Parameters::Named(_) => None,
        }
    }

    pub fn named(&self) -> Option<&IndexMap<String, SqlValue>> {
        match self {
            Parameters::Named(values) => Some(values),
            Parameters::Positional(_) => None,
        }
    }
}

/// Validate the rendered parameters and collect their values. Returns the values and the names
/// of any bind variables, in order of first appearance.
pub(crate) fn collect_parameters(
    slots: Vec<ParamSlot>,
    style: ParamStyle,
    dialect: Dialect,
) -> Result<(Parameters, Vec<String>), ParameterError> {
    match style {
        ParamStyle::Positional => {
            let mut indexed: BTreeMap<usize, SqlValue> = BTreeMap::new();
            let mut values = Vec::with_capacity(slots.len());

            for slot in slots {
                match slot {
                    ParamSlot::Anonymous(value) => values.push(value),
                    ParamSlot::Positional(index, value) => {
                        if let Some(existing) = indexed.get(&index) {
                            if existing != &value {
                                return Err(ParameterError::ConflictingPositional(index));
                            }
                        } else {
                            indexed.insert(index, value.clone());
                        }
                        values.push(value);
                    }
                    ParamSlot::Named(..) | ParamSlot::BindVar(_) => {
                        return Err(ParameterError::MixedStyles);
                    }
                }
            }

            if let Some(lowest) = indexed.keys().next().copied() {
                if lowest != 1 {
                    return Err(ParameterError::PositionalStart(lowest));
                }
            }
            if let Some(highest) = indexed.keys().next_back().copied() {
                if let Some(missing) = (1..=highest).find(|index| !indexed.contains_key(index)) {
                    return Err(ParameterError::PositionalGap(missing));
                }
            }

            Ok((
                Parameters::Positional(values.into_iter().map(|v| dialect.coerce(v)).collect()),
                vec![],
            ))
        }
        ParamStyle::Named => {
            let mut values: IndexMap<String, SqlValue> = IndexMap::new();
            let mut bind_vars: Vec<String> = vec![];

            for slot in slots {
                match slot {
                    ParamSlot::Named(name, value) => {
                        if bind_vars.contains(&name) {
                            return Err(ParameterError::ConflictingNamed(name));
                        }
                        let value = dialect.coerce(value);
                        match values.get(&name) {
                            Some(existing) if existing != &value => {
                                return Err(ParameterError::ConflictingNamed(name));
                            }
                            Some(_) => {}
                            None => {
                                values.insert(name, value);
                            }
                        }
                    }
                    ParamSlot::BindVar(name) => {
                        if values.contains_key(&name) {
                            return Err(ParameterError::ConflictingNamed(name));
                        }
                        if !bind_vars.contains(&name) {
                            bind_vars.push(name);
                        }
                    }
                    // The builder names anonymous parameters when rendering in named style
                    ParamSlot::Anonymous(_) | ParamSlot::Positional(..) => {
                        return Err(ParameterError::MixedStyles);
                    }
                }
            }

            Ok((Parameters::Named(values), bind_vars))
        }
    }
}

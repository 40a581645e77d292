// Copyright Exograph, Inc. All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file at the root of this repository.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

use serde::{Deserialize, Serialize};

use crate::SqlValue;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Dialect {
    #[default]
    Ansi,
    Postgres,
    MySql,
}

impl Dialect {
    pub fn quote_char(&self) -> char {
        match self {
            Dialect::Ansi | Dialect::Postgres => '"',
            Dialect::MySql => '`',
        }
    }

    /// Quote an identifier, doubling any embedded quote characters
    pub fn quote_identifier(&self, identifier: &str) -> String {
        let quote = self.quote_char();
        let mut quoted = String::with_capacity(identifier.len() + 2);
        quoted.push(quote);
        for c in identifier.chars() {
            if c == quote {
                quoted.push(quote);
            }
            quoted.push(c);
        }
        quoted.push(quote);
        quoted
    }

    /// Adjust a parameter value to what the dialect's drivers accept
    pub fn coerce(&self, value: SqlValue) -> SqlValue {
        match (self, value) {
            (Dialect::MySql, SqlValue::Boolean(b)) => SqlValue::Int(b as i32),
            (Dialect::MySql, SqlValue::Uuid(uuid)) => SqlValue::Text(uuid.to_string()),
            (_, value) => value,
        }
    }
}

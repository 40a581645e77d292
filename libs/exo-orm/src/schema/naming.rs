// Copyright Exograph, Inc. All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file at the root of this repository.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

use std::fmt::Debug;
use std::sync::Arc;

use heck::ToSnakeCase;

use super::Entity;

pub trait TableNameResolver: Debug + Send + Sync {
    fn table_name(&self, entity_name: &str) -> String;
}

pub trait ColumnNameResolver: Debug + Send + Sync {
    /// Name the column for a field. `segments` holds the names of any enclosing inline fields,
    /// then the field's own name, then (for foreign keys and converters) the target column's
    /// name or the converter's suffix.
    fn column_name(&self, segments: &[&str]) -> String;
}

pub trait AliasNameResolver: Debug + Send + Sync {
    /// Propose an alias for the occurrence of `entity` at `path`. `attempt` starts at 0 and
    /// increases each time the previous proposal collided with a live alias.
    fn alias(&self, entity: &Entity, path: &str, attempt: usize) -> String;
}

#[derive(Debug, Clone)]
pub struct NamingStrategy {
    pub table: Arc<dyn TableNameResolver>,
    pub column: Arc<dyn ColumnNameResolver>,
    /// When absent, aliases are derived from the entity name's capitals (see [`default_alias`])
    pub alias: Option<Arc<dyn AliasNameResolver>>,
}

impl Default for NamingStrategy {
    fn default() -> Self {
        Self {
            table: Arc::new(SnakeCaseNaming),
            column: Arc::new(SnakeCaseNaming),
            alias: None,
        }
    }
}

/// `OrderLine` -> `order_line`; `home`, `street` -> `home_street`
#[derive(Debug, Clone, Copy, Default)]
pub struct SnakeCaseNaming;

impl TableNameResolver for SnakeCaseNaming {
    fn table_name(&self, entity_name: &str) -> String {
        entity_name.to_snake_case()
    }
}

impl ColumnNameResolver for SnakeCaseNaming {
    fn column_name(&self, segments: &[&str]) -> String {
        segments
            .iter()
            .map(|segment| segment.to_snake_case())
            .collect::<Vec<_>>()
            .join("_")
    }
}

/// Alias made of the lowercased capitals of the entity name, prefixed with `_` so that it does not
/// clash with aliases users pick: `OrderLine` -> `_ol`, then `_ol1`, `_ol2`, ... on collision.
pub fn default_alias(entity_name: &str, attempt: usize) -> String {
    let mut initials: String = entity_name
        .chars()
        .filter(|c| c.is_uppercase())
        .flat_map(char::to_lowercase)
        .collect();

    if initials.is_empty() {
        initials = entity_name
            .chars()
            .find(|c| c.is_alphanumeric())
            .map(|c| c.to_lowercase().collect())
            .unwrap_or_else(|| "t".to_string());
    }

    if attempt == 0 {
        format!("_{initials}")
    } else {
        format!("_{initials}{attempt}")
    }
}

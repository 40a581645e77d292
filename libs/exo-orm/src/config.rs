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

use serde::{Deserialize, Serialize};

use crate::OrmError;
use crate::sql::Dialect;
use crate::transform::CompiledStatement;

/// Sees (and may rewrite) every statement a compile call produces. Observers are passed per call
/// in [`CompileOptions`].
pub trait StatementObserver: Debug + Send + Sync {
    fn on_compiled(&self, statement: &mut CompiledStatement) -> Result<(), OrmError>;
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct CompileOptions {
    pub dialect: Dialect,
    /// Fail compilation of UPDATE and DELETE statements without a WHERE clause instead of just
    /// flagging them
    pub reject_unsafe_statements: bool,
    /// Run in order after compilation
    #[serde(skip)]
    pub observers: Vec<Arc<dyn StatementObserver>>,
}

impl CompileOptions {
    pub fn new(dialect: Dialect) -> Self {
        Self {
            dialect,
            ..Self::default()
        }
    }

    pub fn rejecting_unsafe_statements(self) -> Self {
        Self {
            reject_unsafe_statements: true,
            ..self
        }
    }

    pub fn with_observer(mut self, observer: Arc<dyn StatementObserver>) -> Self {
        self.observers.push(observer);
        self
    }
}

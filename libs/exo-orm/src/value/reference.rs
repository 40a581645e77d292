// Copyright Exograph, Inc. All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file at the root of this repository.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

use std::hash::{Hash, Hasher};
use std::sync::{Arc, OnceLock};

use crate::{EntityId, OrmError};

use super::{Record, SqlValue};

/// Loads the entity a [`Ref`] points to. Implemented by the execution layer, which typically
/// issues a primary-key query.
pub trait RefFetcher: Send + Sync {
    fn fetch(&self, entity: EntityId, key: &[SqlValue]) -> Result<Record, OrmError>;
}

/// A deferred reference to an entity, identified by its primary key.
///
/// The referenced record is fetched on the first call to [`Ref::fetch`] and cached in the shared
/// state, so clones of the same placeholder observe the same loaded record. Fetching concurrently
/// from several threads may issue more than one round trip; callers that care must serialize
/// access themselves.
#[derive(Clone)]
pub struct Ref {
    entity: EntityId,
    /// `None` for a null reference
    key: Option<Vec<SqlValue>>,
    state: Arc<RefState>,
}

struct RefState {
    fetcher: Option<Arc<dyn RefFetcher>>,
    loaded: OnceLock<Arc<Record>>,
}

impl Ref {
    pub fn new(entity: EntityId, key: Vec<SqlValue>, fetcher: Option<Arc<dyn RefFetcher>>) -> Self {
        Self {
            entity,
            key: Some(key),
            state: Arc::new(RefState {
                fetcher,
                loaded: OnceLock::new(),
            }),
        }
    }

    pub fn null(entity: EntityId) -> Self {
        Self {
            entity,
            key: None,
            state: Arc::new(RefState {
                fetcher: None,
                loaded: OnceLock::new(),
            }),
        }
    }

    /// A reference whose target is already known, such as one built from a joined row
    pub fn loaded(entity: EntityId, key: Vec<SqlValue>, record: Arc<Record>) -> Self {
        let reference = Self::new(entity, key, None);
        let _ = reference.state.loaded.set(record);
        reference
    }

    pub fn entity(&self) -> EntityId {
        self.entity
    }

    pub fn key(&self) -> Option<&[SqlValue]> {
        self.key.as_deref()
    }

    pub fn is_null(&self) -> bool {
        self.key.is_none()
    }

    pub fn is_loaded(&self) -> bool {
        self.state.loaded.get().is_some()
    }

    /// Materialize the referenced record. A null reference yields `None` without fetching.
    /// A failed fetch is not cached, so a later call retries.
    pub fn fetch(&self) -> Result<Option<Arc<Record>>, OrmError> {
        let Some(key) = &self.key else {
            return Ok(None);
        };

        if let Some(record) = self.state.loaded.get() {
            return Ok(Some(record.clone()));
        }

        let fetcher = self.state.fetcher.as_ref().ok_or_else(|| {
            OrmError::Usage("Reference has no fetcher and was not loaded".to_string())
        })?;

        let record = Arc::new(fetcher.fetch(self.entity, key)?);
        Ok(Some(self.state.loaded.get_or_init(|| record).clone()))
    }
}

// Identity of a reference is its target, not its load state.
impl PartialEq for Ref {
    fn eq(&self, other: &Self) -> bool {
        self.entity == other.entity && self.key == other.key
    }
}

impl Eq for Ref {}

impl Hash for Ref {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.entity.hash(state);
        self.key.hash(state);
    }
}

impl std::fmt::Debug for Ref {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Ref")
            .field("entity", &self.entity)
            .field("key", &self.key)
            .field("loaded", &self.is_loaded())
            .finish()
    }
}

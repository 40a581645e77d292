// Copyright Exograph, Inc. All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file at the root of this repository.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

use std::sync::Arc;

use indexmap::IndexSet;

use crate::Record;

/// Collapses structurally equal nested records to one shared instance. One interner serves one
/// result stream and is dropped (or cleared) with it.
#[derive(Debug, Default)]
pub struct Interner {
    records: IndexSet<Arc<Record>>,
}

impl Interner {
    pub fn intern(&mut self, record: Record) -> Arc<Record> {
        if let Some(existing) = self.records.get(&record) {
            return existing.clone();
        }
        let record = Arc::new(record);
        self.records.insert(record.clone());
        record
    }

    /// Index of an interned record, stable for the life of the interner
    pub fn index_of(&self, record: &Record) -> Option<usize> {
        self.records.get_index_of(record)
    }

    pub fn get(&self, index: usize) -> Option<&Arc<Record>> {
        self.records.get_index(index)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn clear(&mut self) {
        self.records.clear();
    }
}

#[cfg(test)]
mod tests {
    use crate::schema::EntityId;
    use crate::FieldValue;

    use super::*;

    #[test]
    fn equal_records_share_an_instance() {
        let mut interner = Interner::default();
        let record = || Record::new(EntityId(0), vec![FieldValue::scalar(42), FieldValue::scalar("Ada")]);

        let first = interner.intern(record());
        let second = interner.intern(record());
        let other = interner.intern(Record::new(EntityId(0), vec![FieldValue::scalar(7), FieldValue::Null]));

        assert!(Arc::ptr_eq(&first, &second));
        assert!(!Arc::ptr_eq(&first, &other));
        assert_eq!(interner.len(), 2);
        assert_eq!(interner.index_of(&record()), Some(0));
        assert!(Arc::ptr_eq(interner.get(0).unwrap(), &first));
    }
}

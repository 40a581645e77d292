// Copyright Exograph, Inc. All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file at the root of this repository.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

use tracing::{debug, warn};

use crate::asql::SelectMode;
use crate::{EntityId, OrmError, Record, Ref, SqlValue};

use super::{Interner, RowMapper};

/// The cursor of an executed statement, as provided by the execution layer
pub trait RowSource {
    /// The next row, or `None` once the rows are exhausted
    fn next_row(&mut self) -> Result<Option<Vec<SqlValue>>, OrmError>;

    /// Release the cursor. Called exactly once per stream.
    fn close(&mut self) -> Result<(), OrmError>;
}

/// Turns raw rows into stream items
pub trait RowDecoder {
    type Item;

    fn decode(&mut self, row: Vec<SqlValue>) -> Result<Self::Item, OrmError>;

    /// Drop any per-stream state; called when the stream closes
    fn release(&mut self) {}
}

/// Produces the raw column values of each row
#[derive(Debug, Default)]
pub struct RawDecoder;

impl RowDecoder for RawDecoder {
    type Item = Vec<SqlValue>;

    fn decode(&mut self, row: Vec<SqlValue>) -> Result<Self::Item, OrmError> {
        Ok(row)
    }
}

/// Produces records, sharing equal nested records across the rows of the stream
#[derive(Debug)]
pub struct RecordDecoder<'s> {
    mapper: RowMapper<'s>,
    entity: EntityId,
    mode: SelectMode,
    interner: Interner,
}

impl<'s> RecordDecoder<'s> {
    pub fn new(mapper: RowMapper<'s>, entity: EntityId, mode: SelectMode) -> Self {
        Self {
            mapper,
            entity,
            mode,
            interner: Interner::default(),
        }
    }
}

impl RowDecoder for RecordDecoder<'_> {
    type Item = Record;

    fn decode(&mut self, row: Vec<SqlValue>) -> Result<Self::Item, OrmError> {
        self.mapper
            .map_row(&row, self.entity, self.mode, &mut self.interner)
    }

    fn release(&mut self) {
        self.interner.clear();
    }
}

/// Produces a reference per row, from the row's primary key
#[derive(Debug)]
pub struct RefDecoder<'s> {
    mapper: RowMapper<'s>,
    entity: EntityId,
    mode: SelectMode,
}

impl<'s> RefDecoder<'s> {
    pub fn new(mapper: RowMapper<'s>, entity: EntityId, mode: SelectMode) -> Self {
        Self {
            mapper,
            entity,
            mode,
        }
    }
}

impl RowDecoder for RefDecoder<'_> {
    type Item = Ref;

    fn decode(&mut self, row: Vec<SqlValue>) -> Result<Self::Item, OrmError> {
        self.mapper.map_ref(&row, self.entity, self.mode)
    }
}

/// A pull-based stream of decoded rows. The source is closed exactly once: when the rows run out,
/// when decoding fails, on an explicit [`ResultStream::close`], or when the stream is dropped.
/// Reading from a closed stream is an error; only a stream that ran out of rows ends quietly
/// when used as an [`Iterator`].
pub struct ResultStream<S: RowSource, D: RowDecoder> {
    source: S,
    decoder: D,
    closed: bool,
    exhausted: bool,
}

impl<S: RowSource, D: RowDecoder> ResultStream<S, D> {
    pub fn new(source: S, decoder: D) -> Self {
        Self {
            source,
            decoder,
            closed: false,
            exhausted: false,
        }
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    pub fn next_item(&mut self) -> Result<Option<D::Item>, OrmError> {
        if self.closed {
            return Err(OrmError::Usage("Result stream is closed".to_string()));
        }

        let row = match self.source.next_row() {
            Ok(Some(row)) => row,
            Ok(None) => {
                self.exhausted = true;
                self.close()?;
                return Ok(None);
            }
            Err(err) => {
                self.close_after_failure();
                return Err(err);
            }
        };

        match self.decoder.decode(row) {
            Ok(item) => Ok(Some(item)),
            Err(err) => {
                self.close_after_failure();
                Err(err)
            }
        }
    }

    /// Release the source. Closing an already closed stream does nothing.
    pub fn close(&mut self) -> Result<(), OrmError> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;
        self.decoder.release();
        debug!("Closing result stream");
        self.source.close()
    }

    /// Read the remaining items, then close
    pub fn collect_all(mut self) -> Result<Vec<D::Item>, OrmError> {
        let mut items = vec![];
        while let Some(item) = self.next_item()? {
            items.push(item);
        }
        Ok(items)
    }

    fn close_after_failure(&mut self) {
        if let Err(err) = self.close() {
            warn!(%err, "Failed to close result stream after an error");
        }
    }
}

/// Iteration ends once the rows run out. Reading on after an explicit close, or after a failure
/// closed the stream, yields a usage error.
impl<S: RowSource, D: RowDecoder> Iterator for ResultStream<S, D> {
    type Item = Result<D::Item, OrmError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.exhausted {
            return None;
        }
        self.next_item().transpose()
    }
}

impl<S: RowSource, D: RowDecoder> Drop for ResultStream<S, D> {
    fn drop(&mut self) {
        if !self.closed {
            if let Err(err) = self.close() {
                warn!(%err, "Failed to close abandoned result stream");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use crate::transform::test_util::TestSetup;
    use crate::{FieldValue, MappingError};

    use super::*;

    struct VecSource {
        rows: std::vec::IntoIter<Vec<SqlValue>>,
        closes: Arc<AtomicUsize>,
    }

    impl VecSource {
        fn new(rows: Vec<Vec<SqlValue>>, closes: Arc<AtomicUsize>) -> Self {
            Self {
                rows: rows.into_iter(),
                closes,
            }
        }
    }

    impl RowSource for VecSource {
        fn next_row(&mut self) -> Result<Option<Vec<SqlValue>>, OrmError> {
            Ok(self.rows.next())
        }

        fn close(&mut self) -> Result<(), OrmError> {
            self.closes.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    fn order_rows() -> Vec<Vec<SqlValue>> {
        vec![
            vec![SqlValue::Int(1), SqlValue::Int(42), SqlValue::from("Ada")],
            vec![SqlValue::Int(2), SqlValue::Int(42), SqlValue::from("Ada")],
        ]
    }

    #[test]
    fn exhausting_closes_once() {
        TestSetup::with_setup(|TestSetup { schema, order, .. }| {
            let closes = Arc::new(AtomicUsize::new(0));
            let mut stream = ResultStream::new(
                VecSource::new(order_rows(), closes.clone()),
                RecordDecoder::new(RowMapper::new(&schema), order, SelectMode::Full),
            );

            let records: Vec<_> = stream.by_ref().collect::<Result<_, _>>().unwrap();
            assert_eq!(records.len(), 2);
            assert!(stream.is_closed());
            assert!(stream.next().is_none());

            stream.close().unwrap();
            drop(stream);
            assert_eq!(closes.load(Ordering::SeqCst), 1);
        })
    }

    #[test]
    fn reading_after_close_fails() {
        let closes = Arc::new(AtomicUsize::new(0));
        let mut stream = ResultStream::new(VecSource::new(order_rows(), closes.clone()), RawDecoder);

        assert_eq!(stream.next_item().unwrap().unwrap().len(), 3);
        stream.close().unwrap();

        assert!(matches!(stream.next_item(), Err(OrmError::Usage(_))));
        assert!(matches!(stream.next(), Some(Err(OrmError::Usage(_)))));
        assert_eq!(closes.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn iterating_after_a_failure_fails() {
        TestSetup::with_setup(|TestSetup { schema, order, .. }| {
            let mut stream = ResultStream::new(
                VecSource::new(vec![vec![SqlValue::Int(1)]], Arc::default()),
                RecordDecoder::new(RowMapper::new(&schema), order, SelectMode::Full),
            );

            assert!(matches!(stream.next(), Some(Err(OrmError::Mapping(_)))));
            assert!(matches!(stream.next(), Some(Err(OrmError::Usage(_)))));
        })
    }

    #[test]
    fn abandoned_stream_closes_on_drop() {
        let closes = Arc::new(AtomicUsize::new(0));
        {
            let mut stream =
                ResultStream::new(VecSource::new(order_rows(), closes.clone()), RawDecoder);
            stream.next_item().unwrap();
        }
        assert_eq!(closes.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn decode_failure_closes() {
        TestSetup::with_setup(|TestSetup { schema, order, .. }| {
            let closes = Arc::new(AtomicUsize::new(0));
            let mut stream = ResultStream::new(
                VecSource::new(vec![vec![SqlValue::Int(1)]], closes.clone()),
                RecordDecoder::new(RowMapper::new(&schema), order, SelectMode::Full),
            );

            assert!(matches!(
                stream.next_item(),
                Err(OrmError::Mapping(MappingError::ColumnCount { .. }))
            ));
            assert!(stream.is_closed());
            assert_eq!(closes.load(Ordering::SeqCst), 1);
        })
    }

    #[test]
    fn references_per_row() {
        TestSetup::with_setup(|TestSetup { schema, order, .. }| {
            let stream = ResultStream::new(
                VecSource::new(order_rows(), Arc::default()),
                RefDecoder::new(RowMapper::new(&schema), order, SelectMode::Full),
            );

            let keys: Vec<_> = stream
                .collect_all()
                .unwrap()
                .iter()
                .map(|reference| reference.key().unwrap().to_vec())
                .collect();
            assert_eq!(keys, vec![vec![SqlValue::Int(1)], vec![SqlValue::Int(2)]]);
        })
    }

    #[test]
    fn nested_records_shared_across_rows() {
        TestSetup::with_setup(|TestSetup { schema, order, .. }| {
            let records = ResultStream::new(
                VecSource::new(order_rows(), Arc::default()),
                RecordDecoder::new(RowMapper::new(&schema), order, SelectMode::Full),
            )
            .collect_all()
            .unwrap();

            let customers: Vec<_> = records
                .iter()
                .map(|record| match record.get(&schema, "customer") {
                    Some(FieldValue::Record(customer)) => customer.clone(),
                    other => panic!("unexpected {other:?}"),
                })
                .collect();
            assert!(Arc::ptr_eq(&customers[0], &customers[1]));
        })
    }
}

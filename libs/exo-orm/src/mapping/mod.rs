// Copyright Exograph, Inc. All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file at the root of this repository.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

//! The decode phase: rebuilding records from flat rows, and the reverse flattening used to bind
//! records as parameters.

mod coerce;
mod encoder;
mod interner;
mod plan;
mod row_mapper;
mod stream;

pub use coerce::coerce;
pub use encoder::{encode_field, encode_full, encode_record, primary_key_values};
pub use interner::Interner;
pub use plan::{FieldPlan, RowPlan};
pub use row_mapper::RowMapper;
pub use stream::{RawDecoder, RecordDecoder, RefDecoder, ResultStream, RowDecoder, RowSource};

pub(crate) use plan::PlanCache;

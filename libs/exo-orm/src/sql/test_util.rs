// Copyright Exograph, Inc. All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file at the root of this repository.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

//! Test assertions to check SQL statements and parameters.

/// Assert that the given parameter values match the expected ones.
///
/// # Usage:
/// ```no_run
/// assert_params!(actual_params, expected_param1, expected_param2, ...);
/// ```
macro_rules! assert_params {
    ($actual_params:expr) => {
        assert!($actual_params.is_empty(), "Extra actual parameters");
    };
    ($actual_params:expr, $($expected_param:expr),+ $(,)?) => {
        let expected_params: Vec<$crate::SqlValue> = vec![$($expected_param.into()),+];
        assert_eq!($actual_params, expected_params, "Parameter mismatch");
    };
}

/// Assert on a `(sql, params)` pair, such as the one returned by `ExpressionBuilder::to_sql`.
macro_rules! assert_binding {
    ($actual:expr, $expected_stmt:expr $(,)?) => {
        let (actual_stmt, actual_params) = $actual;
        assert_eq!(actual_stmt, $expected_stmt);
        assert_params!(actual_params);
    };
    ($actual:expr, $expected_stmt:expr, $($rest:expr),+ $(,)?) => {
        let (actual_stmt, actual_params) = $actual;
        assert_eq!(actual_stmt, $expected_stmt);
        assert_params!(actual_params, $($rest),+);
    };
}

/// Assert on a compiled statement with positional parameters.
macro_rules! assert_statement {
    ($actual:expr, $expected_stmt:expr $(,)?) => {
        let actual = $actual;
        assert_eq!(actual.sql, $expected_stmt);
        assert!(actual.parameters.is_empty(), "Extra actual parameters");
    };
    ($actual:expr, $expected_stmt:expr, $($rest:expr),+ $(,)?) => {
        let actual = $actual;
        assert_eq!(actual.sql, $expected_stmt);
        assert_params!(actual.parameters.positional().unwrap().to_vec(), $($rest),+);
    };
}

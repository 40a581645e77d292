// Copyright Exograph, Inc. All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file at the root of this repository.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

use crate::transform::ScopeId;
use crate::{ParameterError, SqlValue};

use super::{Dialect, ExpressionBuilder, ParamSlot, ParamStyle};

/// Identifies a fragment whose emission is decided only once the whole statement has been
/// built (an automatic join, kept only if its alias ends up referenced).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ConditionKey {
    pub scope: ScopeId,
    pub alias: String,
}

#[derive(Debug)]
enum Piece {
    Text(String),
    Param(ParamSlot),
    Conditional { key: ConditionKey, pieces: Vec<Piece> },
}

pub struct SQLBuilder {
    /// The SQL being built, with parameters and conditional fragments kept apart until the end
    pieces: Vec<Piece>,
    dialect: Dialect,
    /// Indicates if column name should be rendered with the table alias i.e. "alias"."col" instead
    /// of "col" (not wanted in SET clauses and INSERT column lists)
    fully_qualify_column_names: bool,
}

impl SQLBuilder {
    pub fn new(dialect: Dialect) -> Self {
        Self {
            pieces: Vec::new(),
            dialect,
            fully_qualify_column_names: true,
        }
    }

    pub fn dialect(&self) -> Dialect {
        self.dialect
    }

    /// Push a string
    pub fn push_str<T: AsRef<str>>(&mut self, s: T) {
        match self.pieces.last_mut() {
            Some(Piece::Text(text)) => text.push_str(s.as_ref()),
            _ => self.pieces.push(Piece::Text(s.as_ref().to_string())),
        }
    }

    /// Push a character
    pub fn push(&mut self, c: char) {
        match self.pieces.last_mut() {
            Some(Piece::Text(text)) => text.push(c),
            _ => self.pieces.push(Piece::Text(c.to_string())),
        }
    }

    /// Push an identifier quoted the way the dialect expects. Without the quotes, an identifier
    /// with uppercase letters would be interpreted the same as its lowercase form.
    pub fn push_identifier<T: AsRef<str>>(&mut self, s: T) {
        let quoted = self.dialect.quote_identifier(s.as_ref());
        self.push_str(quoted);
    }

    /// Push a column. Push `<qualifier>.<column_name>` if in fully_qualify_column_names mode,
    /// otherwise just `<column_name>`.
    pub fn push_column<T: AsRef<str>>(&mut self, qualifier: T, column_name: T) {
        if self.fully_qualify_column_names {
            self.push_identifier(qualifier);
            self.push('.');
        }
        self.push_identifier(column_name);
    }

    /// Push a space. This is a common operation, so it is provided as a separate method.
    pub fn push_space(&mut self) {
        self.push(' ');
    }

    /// Push a parameter. Its placeholder is rendered once the parameter style of the whole
    /// statement is known.
    pub fn push_param(&mut self, param: ParamSlot) {
        self.pieces.push(Piece::Param(param));
    }

    /// Push elements of an iterator, separated by `sep`. The `push_elem` function provides
    /// the flexibility to map the elements (compared to [`SQLBuilder::push_elems`], which assumes
    /// that the elements implement [`ExpressionBuilder`]).
    pub fn push_iter<T>(
        &mut self,
        iter: impl ExactSizeIterator<Item = T>,
        sep: &str,
        push_elem: impl Fn(&mut Self, T),
    ) {
        let len = iter.len();
        for (i, item) in iter.enumerate() {
            push_elem(self, item);

            if i < len - 1 {
                self.push_str(sep);
            }
        }
    }

    /// Push elements of a slice, separated by `sep`.
    pub fn push_elems<T: ExpressionBuilder>(&mut self, elems: &[T], sep: &str) {
        self.push_iter(elems.iter(), sep, |builder, elem| {
            elem.build(builder);
        });
    }

    /// Build a fragment that is emitted only if `keep` (passed to [`SQLBuilder::finish`]) accepts
    /// its key. Parameters pushed inside the fragment are dropped along with it.
    pub fn push_conditional<F, R>(&mut self, key: ConditionKey, func: F) -> R
    where
        F: FnOnce(&mut Self) -> R,
    {
        let outer = std::mem::take(&mut self.pieces);
        let ret = func(self);
        let pieces = std::mem::replace(&mut self.pieces, outer);
        self.pieces.push(Piece::Conditional { key, pieces });
        ret
    }

    /// Append everything built into `fragment` as one conditional fragment (see
    /// [`SQLBuilder::push_conditional`])
    pub fn push_conditional_fragment(&mut self, key: ConditionKey, fragment: SQLBuilder) {
        self.pieces.push(Piece::Conditional {
            key,
            pieces: fragment.pieces,
        });
    }

    /// Execute the given function with the [`Self::fully_qualify_column_names`] flag set to false.
    /// This takes a closure, so that we can restore the original value of the flag after
    /// executing the function.
    pub fn without_fully_qualified_column_names<F, R>(&mut self, func: F) -> R
    where
        F: FnOnce(&mut Self) -> R,
    {
        let cur_fully_qualify_column_names = self.fully_qualify_column_names;
        self.fully_qualify_column_names = false;
        let ret = func(self);
        self.fully_qualify_column_names = cur_fully_qualify_column_names;
        ret
    }

    /// The placeholder style implied by the parameters pushed so far: named as soon as any
    /// named parameter or bind variable is present, positional otherwise.
    pub fn param_style(&self) -> Result<ParamStyle, ParameterError> {
        fn scan(pieces: &[Piece], positional: &mut bool, named: &mut bool) {
            for piece in pieces {
                match piece {
                    Piece::Param(ParamSlot::Positional(..)) => *positional = true,
                    Piece::Param(ParamSlot::Named(..) | ParamSlot::BindVar(_)) => *named = true,
                    Piece::Conditional { pieces, .. } => scan(pieces, positional, named),
                    _ => {}
                }
            }
        }

        let (mut positional, mut named) = (false, false);
        scan(&self.pieces, &mut positional, &mut named);

        match (positional, named) {
            (true, true) => Err(ParameterError::MixedStyles),
            (_, true) => Ok(ParamStyle::Named),
            _ => Ok(ParamStyle::Positional),
        }
    }

    /// Render the SQL string and the parameters in order of appearance. Anonymous parameters are
    /// named `_p1`, `_p2`, ... in named style. Calling this method should be the final step in
    /// building an SQL expression, and thus this builder consumes `self`.
    pub fn finish(
        self,
        style: ParamStyle,
        keep: impl Fn(&ConditionKey) -> bool,
    ) -> (String, Vec<ParamSlot>) {
        let mut renderer = Renderer {
            style,
            sql: String::new(),
            params: Vec::new(),
            anonymous_count: 0,
        };
        renderer.render(self.pieces, &keep);
        (renderer.sql, renderer.params)
    }

    /// Get the SQL string with positional placeholders and the parameter values, keeping every
    /// conditional fragment.
    pub fn into_sql(self) -> (String, Vec<SqlValue>) {
        let (sql, params) = self.finish(ParamStyle::Positional, |_| true);
        (
            sql,
            params
                .into_iter()
                .filter_map(|param| param.value().cloned())
                .collect(),
        )
    }
}

struct Renderer {
    style: ParamStyle,
    sql: String,
    params: Vec<ParamSlot>,
    anonymous_count: usize,
}

impl Renderer {
    fn render(&mut self, pieces: Vec<Piece>, keep: &impl Fn(&ConditionKey) -> bool) {
        for piece in pieces {
            match piece {
                Piece::Text(text) => self.sql.push_str(&text),
                Piece::Param(param) => self.render_param(param),
                Piece::Conditional { key, pieces } => {
                    if keep(&key) {
                        self.render(pieces, keep)
                    }
                }
            }
        }
    }

    fn render_param(&mut self, param: ParamSlot) {
        match self.style {
            ParamStyle::Positional => {
                self.sql.push('?');
                self.params.push(param);
            }
            ParamStyle::Named => {
                let param = match param {
                    ParamSlot::Anonymous(value) => {
                        self.anonymous_count += 1;
                        ParamSlot::Named(format!("_p{}", self.anonymous_count), value)
                    }
                    param => param,
                };
                self.sql.push(':');
                self.sql.push_str(param.name().unwrap_or_default());
                self.params.push(param);
            }
        }
    }
}

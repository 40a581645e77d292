// Copyright Exograph, Inc. All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file at the root of this repository.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

use std::collections::{BTreeSet, HashMap, HashSet};

/// Which table occurrences of one alias scope were referenced, and which automatic joins were
/// added on behalf of which others. Occurrences are keyed by their alias (the table name when
/// the occurrence has no alias).
#[derive(Debug, Default)]
pub struct TableUse {
    referenced: HashSet<String>,
    /// Automatic join alias -> aliases of the automatic joins that depend on it
    precedes: HashMap<String, BTreeSet<String>>,
}

impl TableUse {
    pub fn mark_referenced(&mut self, alias: &str) {
        self.referenced.insert(alias.to_string());
    }

    pub fn is_referenced(&self, alias: &str) -> bool {
        self.referenced.contains(alias)
    }

    pub fn referenced(&self) -> &HashSet<String> {
        &self.referenced
    }

    /// Turn the references recorded since `before` into dependencies of the automatic join for
    /// `alias`: what its ON condition mentions is needed only if the join itself is.
    pub fn defer_references(&mut self, before: &HashSet<String>, alias: &str) {
        let recorded: Vec<String> = self.referenced.difference(before).cloned().collect();
        for reference in recorded {
            self.referenced.remove(&reference);
            if reference != alias {
                self.add_precedes(&reference, alias);
            }
        }
    }

    /// Record that the join for `dependent` is attached to the join for `alias`, so `alias` must
    /// be emitted whenever `dependent` is.
    pub fn add_precedes(&mut self, alias: &str, dependent: &str) {
        self.precedes
            .entry(alias.to_string())
            .or_default()
            .insert(dependent.to_string());
    }

    /// An automatic join is required if its alias was referenced, or if a join that depends on it
    /// is required.
    pub fn is_join_required(&self, alias: &str) -> bool {
        self.is_join_required_inner(alias, &mut HashSet::new())
    }

    fn is_join_required_inner<'a>(&'a self, alias: &'a str, visited: &mut HashSet<&'a str>) -> bool {
        if !visited.insert(alias) {
            return false;
        }
        if self.is_referenced(alias) {
            return true;
        }

        self.precedes.get(alias).is_some_and(|dependents| {
            dependents
                .iter()
                .any(|dependent| self.is_join_required_inner(dependent, visited))
        })
    }
}

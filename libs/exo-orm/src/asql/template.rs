// Copyright Exograph, Inc. All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file at the root of this repository.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

use std::sync::Arc;

use super::Element;

/// An immutable sequence of elements. Adding an element returns a new template that shares
/// every earlier element with the original, so partially built templates can be forked and
/// handed to other threads freely.
#[derive(Debug, Clone, Default)]
pub struct QueryTemplate {
    last: Option<Arc<Node>>,
}

#[derive(Debug)]
struct Node {
    element: Element,
    previous: Option<Arc<Node>>,
    len: usize,
}

impl QueryTemplate {
    pub fn new(elements: impl IntoIterator<Item = Element>) -> Self {
        QueryTemplate::default().with_all(elements)
    }

    pub fn len(&self) -> usize {
        self.last.as_ref().map(|node| node.len).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.last.is_none()
    }

    #[must_use]
    pub fn with(&self, element: Element) -> Self {
        QueryTemplate {
            last: Some(Arc::new(Node {
                element,
                previous: self.last.clone(),
                len: self.len() + 1,
            })),
        }
    }

    #[must_use]
    pub fn with_all(&self, elements: impl IntoIterator<Item = Element>) -> Self {
        elements
            .into_iter()
            .fold(self.clone(), |template, element| template.with(element))
    }

    /// The elements, first to last
    pub fn elements(&self) -> Vec<&Element> {
        let mut elements = Vec::with_capacity(self.len());
        let mut current = self.last.as_deref();
        while let Some(node) = current {
            elements.push(&node.element);
            current = node.previous.as_deref();
        }
        elements.reverse();
        elements
    }

    pub fn to_elements(&self) -> Vec<Element> {
        self.elements().into_iter().cloned().collect()
    }
}

//! Traversal orders over the candidate elements of a file.

use crate::source::CodeElement;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use tracing::trace;

/// Byte offsets of a method declaration in its file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct CodePosition {
    pub start: usize,
    pub end: usize,
}

/// Metadata about the method enclosing a candidate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MethodInfo {
    pub signature: String,
    pub start_line: usize,
    pub end_line: usize,
    pub code_position: CodePosition,
}

impl MethodInfo {
    pub fn of(method: &CodeElement) -> Self {
        Self {
            signature: method
                .signature
                .clone()
                .unwrap_or_else(|| method.simple_name().to_string()),
            start_line: method.position.line,
            end_line: method.position.end_line,
            code_position: CodePosition {
                start: method.position.source_start,
                end: method.position.source_end,
            },
        }
    }
}

/// A candidate paired with its enclosing method.
#[derive(Debug, Clone, PartialEq)]
pub struct Element<'t> {
    pub code: &'t CodeElement,
    pub method: MethodInfo,
}

impl<'t> Element<'t> {
    pub fn new(code: &'t CodeElement, method: MethodInfo) -> Self {
        Self { code, method }
    }

    pub fn line(&self) -> usize {
        self.code.position.line
    }
}

/// One-pass sequence of candidate elements.
///
/// `next_element` returns `None` for a candidate whose line is filtered out;
/// callers keep pulling until `has_next` is false.
pub trait ElementsSelector<'t> {
    fn has_next(&self) -> bool;
    fn next_element(&mut self) -> Option<Element<'t>>;
}

/// Visits candidates in the order they were given.
pub struct OrderedSelection<'t, F> {
    elements: std::vec::IntoIter<Element<'t>>,
    is_line_to_mutate: F,
}

impl<'t, F> OrderedSelection<'t, F>
where
    F: Fn(usize) -> bool,
{
    pub fn new(elements: Vec<Element<'t>>, is_line_to_mutate: F) -> Self {
        Self {
            elements: elements.into_iter(),
            is_line_to_mutate,
        }
    }
}

impl<'t, F> ElementsSelector<'t> for OrderedSelection<'t, F>
where
    F: Fn(usize) -> bool,
{
    fn has_next(&self) -> bool {
        !self.elements.as_slice().is_empty()
    }

    fn next_element(&mut self) -> Option<Element<'t>> {
        let element = self.elements.next()?;
        gate(element, &self.is_line_to_mutate)
    }
}

/// Visits every candidate exactly once, in random order.
pub struct RandomSelection<'t, F> {
    remaining: Vec<Element<'t>>,
    rng: StdRng,
    is_line_to_mutate: F,
}

impl<'t, F> RandomSelection<'t, F>
where
    F: Fn(usize) -> bool,
{
    /// A seed makes the visiting order reproducible.
    pub fn new(elements: Vec<Element<'t>>, is_line_to_mutate: F, seed: Option<u64>) -> Self {
        let rng = match seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        Self {
            remaining: elements,
            rng,
            is_line_to_mutate,
        }
    }
}

impl<'t, F> ElementsSelector<'t> for RandomSelection<'t, F>
where
    F: Fn(usize) -> bool,
{
    fn has_next(&self) -> bool {
        !self.remaining.is_empty()
    }

    fn next_element(&mut self) -> Option<Element<'t>> {
        if self.remaining.is_empty() {
            return None;
        }
        let index = self.rng.gen_range(0..self.remaining.len());
        let element = self.remaining.swap_remove(index);
        gate(element, &self.is_line_to_mutate)
    }
}

fn gate<'t, F>(element: Element<'t>, is_line_to_mutate: &F) -> Option<Element<'t>>
where
    F: Fn(usize) -> bool,
{
    if is_line_to_mutate(element.line()) {
        Some(element)
    } else {
        trace!(line = element.line(), "line not selected, skipping element");
        None
    }
}

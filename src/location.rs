use crate::source::{CodeElement, NodeKind};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use thiserror::Error;

/// Raised when an element has no expression that can be masked.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("unhandled element of type {node_type} at line {line}")]
pub struct UnhandledElement {
    pub node_type: NodeKind,
    pub line: usize,
}

/// A maskable location inside a statement.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MBertLocation {
    pub mutant_id: usize,
    pub node_type: NodeKind,
    pub line: usize,
    pub end_line: usize,
    /// Byte offsets of `masked_code` in the file, end inclusive.
    pub source_start: usize,
    pub source_end: usize,
    pub masked_code: String,
    pub fingerprint: String,
}

/// Converts a program element into a location record.
pub trait LocationFactory {
    fn create_location(
        &self,
        mutant_id: usize,
        element: &CodeElement,
    ) -> Result<MBertLocation, UnhandledElement>;
}

/// Masks the expression carried by a statement: the initializer of a local
/// variable, the assigned value, the returned or thrown value, the condition of
/// a branch or loop, or the whole call / unary expression.
#[derive(Debug, Default, Clone, Copy)]
pub struct MBertLocationFactory;

impl MBertLocationFactory {
    pub fn new() -> Self {
        Self
    }
}

impl LocationFactory for MBertLocationFactory {
    fn create_location(
        &self,
        mutant_id: usize,
        element: &CodeElement,
    ) -> Result<MBertLocation, UnhandledElement> {
        let unhandled = || UnhandledElement {
            node_type: element.kind,
            line: element.position.line,
        };

        let (offset, len) = masked_range(element).ok_or_else(unhandled)?;
        let masked_code = element.text[offset..offset + len].to_string();
        let source_start = element.position.source_start + offset;
        let line = element.position.line + element.text[..offset].matches('\n').count();
        let end_line = line + masked_code.matches('\n').count();

        Ok(MBertLocation {
            mutant_id,
            node_type: element.kind,
            line,
            end_line,
            source_start,
            source_end: source_start + len - 1,
            fingerprint: fingerprint(element.kind, line, &masked_code),
            masked_code,
        })
    }
}

fn fingerprint(node_type: NodeKind, line: usize, masked_code: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(format!("{}:{}:{}", node_type, line, masked_code).as_bytes());
    format!("{:x}", hasher.finalize())
}

/// Byte range `(offset, len)` of the maskable expression inside the element text.
fn masked_range(element: &CodeElement) -> Option<(usize, usize)> {
    let text = element.text.as_str();
    let body_end = text.trim_end_matches(|c: char| c == ';' || c == '{' || c.is_whitespace()).len();

    let range = match element.kind {
        NodeKind::LocalVariable | NodeKind::Assignment => {
            let eq = assignment_operator_end(&text[..body_end])?;
            (eq, body_end)
        }
        NodeKind::Return | NodeKind::Throw => {
            let keyword_end = text
                .find(|c: char| !c.is_ascii_alphabetic())
                .unwrap_or(body_end);
            (keyword_end.min(body_end), body_end)
        }
        NodeKind::If | NodeKind::While | NodeKind::Switch => parenthesized(text)?,
        NodeKind::For => for_condition(text)?,
        NodeKind::Invocation | NodeKind::UnaryOperator => (0, body_end),
        NodeKind::Method
        | NodeKind::Constructor
        | NodeKind::Break
        | NodeKind::Continue
        | NodeKind::Block
        | NodeKind::Unknown => return None,
    };

    trim_range(text, range)
}

fn trim_range(text: &str, (start, end): (usize, usize)) -> Option<(usize, usize)> {
    if start >= end {
        return None;
    }
    let slice = &text[start..end];
    let trimmed = slice.trim();
    if trimmed.is_empty() {
        return None;
    }
    let lead = slice.len() - slice.trim_start().len();
    Some((start + lead, trimmed.len()))
}

/// Offset just past the first assignment operator outside brackets.
fn assignment_operator_end(text: &str) -> Option<usize> {
    let bytes = text.as_bytes();
    let mut depth = 0i32;
    for (i, &b) in bytes.iter().enumerate() {
        match b {
            b'(' | b'[' | b'<' => depth += 1,
            b')' | b']' | b'>' => depth -= 1,
            b'=' if depth <= 0 => {
                let next = bytes.get(i + 1).copied();
                let prev = if i > 0 { bytes[i - 1] } else { b' ' };
                if next == Some(b'=') || matches!(prev, b'=' | b'!') {
                    continue;
                }
                return Some(i + 1);
            }
            _ => {}
        }
    }
    None
}

/// Range of the contents of the first balanced parenthesis group.
fn parenthesized(text: &str) -> Option<(usize, usize)> {
    let open = text.find('(')?;
    let mut depth = 0i32;
    for (i, c) in text[open..].char_indices() {
        match c {
            '(' => depth += 1,
            ')' => {
                depth -= 1;
                if depth == 0 {
                    return Some((open + 1, open + i));
                }
            }
            _ => {}
        }
    }
    None
}

/// The condition of a classic `for`, or the iterable of an enhanced `for`.
fn for_condition(text: &str) -> Option<(usize, usize)> {
    let (start, end) = parenthesized(text)?;
    let header = &text[start..end];

    let separators: Vec<usize> = header.match_indices(';').map(|(i, _)| i).collect();
    if let [first, second] = separators.as_slice() {
        return Some((start + first + 1, start + second));
    }

    let colon = header.find(" : ").map(|i| i + 3).or_else(|| header.find(':').map(|i| i + 1))?;
    Some((start + colon, end))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::SourcePosition;

    fn element(kind: NodeKind, text: &str) -> CodeElement {
        CodeElement {
            id: 1,
            kind,
            name: None,
            signature: None,
            text: text.to_string(),
            position: SourcePosition {
                line: 10,
                end_line: 10,
                column: 5,
                end_column: 5 + text.len(),
                source_start: 100,
                source_end: 100 + text.len() - 1,
            },
            parent: Some(0),
        }
    }

    fn masked(kind: NodeKind, text: &str) -> Option<String> {
        MBertLocationFactory::new()
            .create_location(0, &element(kind, text))
            .ok()
            .map(|location| location.masked_code)
    }

    #[test]
    fn test_masks_expressions_by_kind() {
        assert_eq!(masked(NodeKind::LocalVariable, "int sum = a + 1;").as_deref(), Some("a + 1"));
        assert_eq!(masked(NodeKind::Assignment, "total += rest.get(i);").as_deref(), Some("rest.get(i)"));
        assert_eq!(masked(NodeKind::Return, "return x == y;").as_deref(), Some("x == y"));
        assert_eq!(masked(NodeKind::If, "if (a > (b + 1)) {").as_deref(), Some("a > (b + 1)"));
        assert_eq!(masked(NodeKind::For, "for (int i = 0; i < n; i++) {").as_deref(), Some("i < n"));
        assert_eq!(masked(NodeKind::For, "for (String s : names) {").as_deref(), Some("names"));
        assert_eq!(masked(NodeKind::Invocation, "log.info(msg);").as_deref(), Some("log.info(msg)"));
        assert_eq!(masked(NodeKind::UnaryOperator, "count++;").as_deref(), Some("count++"));
    }

    #[test]
    fn test_generic_declaration_masks_initializer() {
        assert_eq!(
            masked(NodeKind::LocalVariable, "Map<String, Integer> m = new HashMap<>();").as_deref(),
            Some("new HashMap<>()")
        );
    }

    #[test]
    fn test_unhandled_kinds() {
        let factory = MBertLocationFactory::new();
        for (kind, text) in [
            (NodeKind::Break, "break;"),
            (NodeKind::Continue, "continue;"),
            (NodeKind::Block, "try {"),
            (NodeKind::Return, "return;"),
            (NodeKind::LocalVariable, "int x;"),
            (NodeKind::For, "for (;;) {"),
        ] {
            let err = factory.create_location(0, &element(kind, text)).unwrap_err();
            assert_eq!(err.node_type, kind);
            assert_eq!(err.line, 10);
        }
    }

    #[test]
    fn test_location_offsets_and_fingerprint() {
        let factory = MBertLocationFactory::new();
        let location = factory
            .create_location(15, &element(NodeKind::Return, "return value;"))
            .unwrap();

        assert_eq!(location.mutant_id, 15);
        assert_eq!(location.source_start, 107);
        assert_eq!(location.source_end, 111);
        assert_eq!(location.line, 10);
        assert_eq!(location.fingerprint.len(), 64);

        let again = factory
            .create_location(20, &element(NodeKind::Return, "return value;"))
            .unwrap();
        assert_eq!(location.fingerprint, again.fingerprint);
    }
}

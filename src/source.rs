//! Program-element trees and the heuristic Java parser that builds them.
//!
//! The parser is intentionally shallow: it blanks comments, matches braces and
//! classifies each statement of a method body with a handful of patterns. It
//! recovers enough structure (classes, methods, statements and their spans) to
//! drive location selection without a full Java front-end.

use crate::error::Result;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs;

/// Syntactic category of a program element.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum NodeKind {
    Method,
    Constructor,
    LocalVariable,
    Assignment,
    Return,
    If,
    For,
    While,
    Switch,
    Invocation,
    Throw,
    Break,
    Continue,
    UnaryOperator,
    Block,
    Unknown,
}

impl NodeKind {
    pub fn is_executable(&self) -> bool {
        matches!(self, NodeKind::Method | NodeKind::Constructor)
    }
}

impl fmt::Display for NodeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self)
    }
}

/// Span of an element inside its file. Lines and columns are 1-based,
/// offsets are byte offsets with `source_end` inclusive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct SourcePosition {
    pub line: usize,
    pub end_line: usize,
    pub column: usize,
    pub end_column: usize,
    pub source_start: usize,
    pub source_end: usize,
}

impl SourcePosition {
    /// Position covering whole lines, for trees built by hand.
    pub fn lines(line: usize, end_line: usize) -> Self {
        Self {
            line,
            end_line,
            ..Self::default()
        }
    }

    pub fn contains_line(&self, line: usize) -> bool {
        self.line <= line && line <= self.end_line
    }

    fn encloses(&self, other: &SourcePosition) -> bool {
        if self.source_start == self.source_end && other.source_start == other.source_end {
            // hand-built trees carry no offsets
            return self.line <= other.line && other.end_line <= self.end_line;
        }
        self.source_start <= other.source_start && other.source_end <= self.source_end
    }
}

pub type ElementId = usize;

/// A method or statement recovered from the source file.
#[derive(Debug, Clone, PartialEq)]
pub struct CodeElement {
    pub id: ElementId,
    pub kind: NodeKind,
    pub name: Option<String>,
    pub signature: Option<String>,
    pub text: String,
    pub position: SourcePosition,
    /// Enclosing method, for statements.
    pub parent: Option<ElementId>,
}

impl CodeElement {
    pub fn simple_name(&self) -> &str {
        self.name.as_deref().unwrap_or("")
    }

    pub fn position(&self) -> &SourcePosition {
        &self.position
    }

    pub fn is_executable(&self) -> bool {
        self.kind.is_executable()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ClassDecl {
    pub qualified_name: String,
    pub position: SourcePosition,
}

impl ClassDecl {
    pub fn qualified_name(&self) -> &str {
        &self.qualified_name
    }
}

/// Classes and elements of one file, in document order.
#[derive(Debug, Clone, Default)]
pub struct ElementTree {
    pub path: String,
    classes: Vec<ClassDecl>,
    elements: Vec<CodeElement>,
}

impl ElementTree {
    pub fn new(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            ..Self::default()
        }
    }

    pub fn find_classes(&self) -> &[ClassDecl] {
        &self.classes
    }

    pub fn get(&self, id: ElementId) -> Option<&CodeElement> {
        self.elements.get(id)
    }

    pub fn find_elements<P>(&self, predicate: P) -> Vec<&CodeElement>
    where
        P: Fn(&CodeElement) -> bool,
    {
        self.elements.iter().filter(|e| predicate(*e)).collect()
    }

    /// Elements lying inside `class`, nested types included.
    pub fn find_elements_in<P>(&self, class: &ClassDecl, predicate: P) -> Vec<&CodeElement>
    where
        P: Fn(&CodeElement) -> bool,
    {
        self.find_elements(|e| class.position.encloses(&e.position) && predicate(e))
    }

    pub fn statements_of(&self, method: ElementId) -> Vec<&CodeElement> {
        self.find_elements(|e| e.parent == Some(method))
    }

    pub fn add_class(&mut self, qualified_name: impl Into<String>, position: SourcePosition) -> usize {
        self.classes.push(ClassDecl {
            qualified_name: qualified_name.into(),
            position,
        });
        self.classes.len() - 1
    }

    pub fn add_method(
        &mut self,
        kind: NodeKind,
        name: impl Into<String>,
        signature: impl Into<String>,
        text: impl Into<String>,
        position: SourcePosition,
    ) -> ElementId {
        self.push(CodeElement {
            id: self.elements.len(),
            kind,
            name: Some(name.into()),
            signature: Some(signature.into()),
            text: text.into(),
            position,
            parent: None,
        })
    }

    pub fn add_statement(
        &mut self,
        method: ElementId,
        kind: NodeKind,
        text: impl Into<String>,
        position: SourcePosition,
    ) -> ElementId {
        self.push(CodeElement {
            id: self.elements.len(),
            kind,
            name: None,
            signature: None,
            text: text.into(),
            position,
            parent: Some(method),
        })
    }

    fn push(&mut self, element: CodeElement) -> ElementId {
        let id = element.id;
        self.elements.push(element);
        id
    }

    fn close_class(&mut self, index: usize, end: &SourcePosition) {
        if let Some(class) = self.classes.get_mut(index) {
            close_span(&mut class.position, end);
        }
    }

    fn close_element(&mut self, id: ElementId, end: &SourcePosition) {
        if let Some(element) = self.elements.get_mut(id) {
            close_span(&mut element.position, end);
        }
    }
}

fn close_span(position: &mut SourcePosition, end: &SourcePosition) {
    position.end_line = end.end_line;
    position.end_column = end.end_column;
    position.source_end = end.source_end;
}

/// Produces the element tree of a source file.
pub trait SourceParser {
    fn parse(&self, path: &str) -> Result<ElementTree>;
}

/// Brace-matching parser for Java sources.
pub struct JavaSourceParser {
    package_pattern: Regex,
    type_pattern: Regex,
    method_pattern: Regex,
    annotation_pattern: Regex,
    prefix_pattern: Regex,
    case_arrow_pattern: Regex,
    local_variable_pattern: Regex,
    assignment_pattern: Regex,
    unary_pattern: Regex,
}

impl JavaSourceParser {
    pub fn new() -> Result<Self> {
        Ok(Self {
            package_pattern: Regex::new(r"^\s*package\s+([\w$.]+)\s*;")?,
            type_pattern: Regex::new(r"(?:^|\s)(class|interface|enum|record)\s+([A-Za-z_$][\w$]*)")?,
            method_pattern: Regex::new(
                r"^(?:(?:public|protected|private|static|final|abstract|synchronized|native|default|strictfp)\s+)*(?:<[^(]*>\s*)?(?:([\w$.<>\[\]?, ]+?)\s+)?([A-Za-z_$][\w$]*)\s*\(([^()]*)\)\s*(?:\[\s*\])*\s*(?:throws\s+[\w$.,\s<>]+)?;?$",
            )?,
            annotation_pattern: Regex::new(r"@[\w$.]+(?:\s*\([^()]*\))?")?,
            prefix_pattern: Regex::new(
                r"^(?:else\b\s*|case\s+[^:;]+?\s*(?:->|:)\s*|default\s*(?:->|:)\s*|[A-Za-z_$][\w$]*\s*:\s*)",
            )?,
            case_arrow_pattern: Regex::new(r"^(?:case\s+.+|default)\s*->$")?,
            local_variable_pattern: Regex::new(
                r"^(?:final\s+)?[A-Za-z_$][\w$.]*(?:\s*<[^=;]*>)?(?:\s*\[\s*\])*\s+[A-Za-z_$][\w$]*\s*(?:=|;|,|\[)",
            )?,
            assignment_pattern: Regex::new(r"^[\w$.\[\]]+\s*(?:[+\-*/%&|^]|<<|>>>?)?=[^=]")?,
            unary_pattern: Regex::new(r"^(?:(?:\+\+|--)[\w$.\[\]]+|[\w$.\[\]]+(?:\+\+|--))\s*;?$")?,
        })
    }

    pub fn parse_source(&self, path: &str, source: &str) -> Result<ElementTree> {
        let (clean, structural) = blank_comments(source);
        let mut scanner = Scanner {
            parser: self,
            clean: &clean,
            structural: &structural,
            lines: LineIndex::new(&structural),
            tree: ElementTree::new(path),
            frames: Vec::new(),
            package: None,
        };

        let mut seg_start = 0;
        let mut paren_depth = 0usize;
        let mut inline_depth = 0usize;

        for (i, ch) in structural.char_indices() {
            match ch {
                '(' => paren_depth += 1,
                ')' => paren_depth = paren_depth.saturating_sub(1),
                '{' | '}' | ';' if paren_depth > 0 => {}
                '{' if inline_depth > 0 => inline_depth += 1,
                '}' if inline_depth > 0 => inline_depth -= 1,
                ';' if inline_depth > 0 => {}
                '{' => {
                    if scanner.open_scope(seg_start, i) {
                        seg_start = i + 1;
                    } else {
                        inline_depth = 1;
                    }
                }
                '}' => {
                    scanner.close_scope(i);
                    seg_start = i + 1;
                }
                ';' => {
                    scanner.end_statement(seg_start, i);
                    seg_start = i + 1;
                }
                _ => {}
            }
        }

        Ok(scanner.tree)
    }

    fn classify_statement(&self, text: &str) -> NodeKind {
        let keyword: String = text
            .chars()
            .take_while(|c| c.is_ascii_alphanumeric() || *c == '_')
            .collect();

        match keyword.as_str() {
            "if" => return NodeKind::If,
            "for" => return NodeKind::For,
            "while" => return NodeKind::While,
            "switch" => return NodeKind::Switch,
            "return" | "yield" => return NodeKind::Return,
            "throw" => return NodeKind::Throw,
            "break" => return NodeKind::Break,
            "continue" => return NodeKind::Continue,
            "do" | "try" | "catch" | "finally" | "synchronized" | "else" => return NodeKind::Block,
            "assert" => return NodeKind::Unknown,
            _ => {}
        }

        if self.unary_pattern.is_match(text) {
            NodeKind::UnaryOperator
        } else if self.local_variable_pattern.is_match(text) && !text.starts_with("new ") {
            NodeKind::LocalVariable
        } else if self.assignment_pattern.is_match(text) {
            NodeKind::Assignment
        } else if text.contains('(') {
            NodeKind::Invocation
        } else {
            NodeKind::Unknown
        }
    }

    /// Length of any `else`, `case ...:` or label prefix ahead of a statement.
    fn statement_prefix_len(&self, text: &str) -> usize {
        let mut consumed = 0;
        while let Some(m) = self.prefix_pattern.find(&text[consumed..]) {
            let rest = &text[consumed + m.end()..];
            if m.as_str().trim_end().ends_with(':') && rest.starts_with(':') {
                break;
            }
            consumed += m.end();
        }
        consumed
    }

    fn strip_annotations(&self, header: &str) -> String {
        let stripped = self.annotation_pattern.replace_all(header, " ");
        stripped.split_whitespace().collect::<Vec<_>>().join(" ")
    }
}

impl SourceParser for JavaSourceParser {
    fn parse(&self, path: &str) -> Result<ElementTree> {
        let source = fs::read_to_string(path)?;
        self.parse_source(path, &source)
    }
}

enum Frame {
    Type {
        class: Option<usize>,
        qualified_name: String,
        simple_name: String,
    },
    Method(ElementId),
    Block(ElementId),
    Opaque,
}

struct Scanner<'a> {
    parser: &'a JavaSourceParser,
    clean: &'a str,
    structural: &'a str,
    lines: LineIndex,
    tree: ElementTree,
    frames: Vec<Frame>,
    package: Option<String>,
}

struct MethodHeader {
    kind: NodeKind,
    name: String,
    signature: String,
}

impl<'a> Scanner<'a> {
    /// Handles a `{`. Returns false when the brace belongs to an expression
    /// (anonymous class, lambda body, array initializer) that the current
    /// statement should swallow.
    fn open_scope(&mut self, seg_start: usize, brace: usize) -> bool {
        let structural = self.structural;
        let header_start = skip_whitespace(structural, seg_start, brace);
        let header = structural[header_start..brace].trim_end();

        let frame = match self.frames.last() {
            None | Some(Frame::Type { .. }) => self.open_type_member(header, header_start, brace),
            Some(Frame::Method(method)) | Some(Frame::Block(method)) => {
                let method = *method;
                // labels, `else` and case labels ahead of the construct
                let construct = &header[self.parser.statement_prefix_len(header)..];
                if construct.is_empty() || self.parser.case_arrow_pattern.is_match(header) {
                    Frame::Block(method)
                } else if is_control_header(construct) {
                    self.add_statement(method, header_start, brace);
                    Frame::Block(method)
                } else {
                    return false;
                }
            }
            Some(Frame::Opaque) => Frame::Opaque,
        };
        self.frames.push(frame);
        true
    }

    fn open_type_member(&mut self, header: &str, start: usize, brace: usize) -> Frame {
        let normalized = self.parser.strip_annotations(header);
        let (outer_name, outer_simple) = match self.frames.last() {
            Some(Frame::Type {
                qualified_name,
                simple_name,
                ..
            }) => (Some(qualified_name.clone()), Some(simple_name.clone())),
            _ => (None, None),
        };

        if let Some(captures) = self.parser.type_pattern.captures(&normalized) {
            let name = captures[2].to_string();
            let qualified_name = match (&outer_name, &self.package) {
                (Some(outer), _) => format!("{}${}", outer, name),
                (None, Some(package)) => format!("{}.{}", package, name),
                (None, None) => name.clone(),
            };
            let class = if &captures[1] == "interface" {
                None
            } else {
                let position = self.lines.span(start, brace);
                Some(self.tree.add_class(qualified_name.clone(), position))
            };
            return Frame::Type {
                class,
                qualified_name,
                simple_name: name,
            };
        }

        if let Some(simple) = outer_simple {
            if let Some(header) = self.method_header(&normalized, &simple) {
                let id = self.add_method(header, start, brace);
                return Frame::Method(id);
            }
        }
        Frame::Opaque
    }

    fn close_scope(&mut self, brace: usize) {
        let end = self.lines.span(brace, brace);
        match self.frames.pop() {
            Some(Frame::Method(id)) => self.tree.close_element(id, &end),
            Some(Frame::Type {
                class: Some(index), ..
            }) => self.tree.close_class(index, &end),
            _ => {}
        }
    }

    fn end_statement(&mut self, seg_start: usize, semicolon: usize) {
        match self.frames.last() {
            None => {
                let structural = self.structural;
                let segment = &structural[seg_start..=semicolon];
                if let Some(captures) = self.parser.package_pattern.captures(segment) {
                    self.package = Some(captures[1].to_string());
                }
            }
            Some(Frame::Type { simple_name, .. }) => {
                // bodiless declarations: abstract and interface methods
                let simple = simple_name.clone();
                let start = skip_whitespace(self.structural, seg_start, semicolon);
                let normalized = self
                    .parser
                    .strip_annotations(&self.structural[start..=semicolon]);
                if let Some(header) = self.method_header(&normalized, &simple) {
                    self.add_method(header, start, semicolon);
                }
            }
            Some(Frame::Method(method)) | Some(Frame::Block(method)) => {
                let method = *method;
                self.add_statement(method, seg_start, semicolon);
            }
            Some(Frame::Opaque) => {}
        }
    }

    fn method_header(&self, header: &str, class_name: &str) -> Option<MethodHeader> {
        let captures = self.parser.method_pattern.captures(header)?;
        let name = captures[2].to_string();
        if is_keyword(&name) {
            return None;
        }

        let kind = match captures.get(1).map(|m| m.as_str().trim()) {
            None if name == class_name => NodeKind::Constructor,
            None => return None,
            Some(return_type) if is_keyword(return_type) || return_type.contains('=') => return None,
            Some(_) => NodeKind::Method,
        };

        let parameter_types: Vec<String> = split_parameters(&captures[3])
            .into_iter()
            .filter_map(|parameter| parameter_type(&parameter))
            .collect();

        Some(MethodHeader {
            kind,
            signature: format!("{}({})", name, parameter_types.join(",")),
            name,
        })
    }

    fn add_method(&mut self, header: MethodHeader, start: usize, end: usize) -> ElementId {
        let position = self.lines.span(start, end);
        let text = self.clean[start..end].trim().to_string();
        self.tree
            .add_method(header.kind, header.name, header.signature, text, position)
    }

    fn add_statement(&mut self, method: ElementId, seg_start: usize, end: usize) {
        let (clean, structural) = (self.clean, self.structural);
        let mut start = skip_whitespace(structural, seg_start, end);
        start += self.parser.statement_prefix_len(&structural[start..=end]);
        start = skip_whitespace(structural, start, end);

        let statement = structural[start..=end].trim();
        if statement.is_empty() || statement == ";" || statement == "{" {
            return;
        }

        let kind = self.parser.classify_statement(statement);
        let last = end_of_text(structural, start, end);
        let position = self.lines.span(start, last);
        let text = clean[start..=last].to_string();
        self.tree.add_statement(method, kind, text, position);
    }
}

fn is_control_header(header: &str) -> bool {
    let keyword: String = header
        .trim_start_matches(|c: char| c == '}' || c.is_whitespace())
        .chars()
        .take_while(|c| c.is_ascii_alphanumeric())
        .collect();
    matches!(
        keyword.as_str(),
        "if" | "else" | "for" | "while" | "switch" | "do" | "try" | "catch" | "finally" | "synchronized" | "case" | "default"
    ) || header.ends_with(':')
}

fn is_keyword(word: &str) -> bool {
    matches!(
        word,
        "if" | "for" | "while" | "switch" | "catch" | "synchronized" | "return" | "new" | "else" | "throw" | "do" | "try"
    )
}

/// Splits a parameter list on commas outside generic brackets.
fn split_parameters(parameters: &str) -> Vec<String> {
    let mut result = Vec::new();
    let mut current = String::new();
    let mut depth = 0usize;
    for ch in parameters.chars() {
        match ch {
            '<' => {
                depth += 1;
                current.push(ch);
            }
            '>' => {
                depth = depth.saturating_sub(1);
                current.push(ch);
            }
            ',' if depth == 0 => result.push(std::mem::take(&mut current)),
            _ => current.push(ch),
        }
    }
    if !current.trim().is_empty() {
        result.push(current);
    }
    result
}

fn parameter_type(parameter: &str) -> Option<String> {
    let parameter = parameter.trim().trim_start_matches("final ").trim();
    let split = parameter.rfind(|c: char| c.is_whitespace())?;
    let type_name: String = parameter[..split]
        .chars()
        .filter(|c| !c.is_whitespace())
        .collect();
    if type_name.is_empty() {
        None
    } else {
        Some(type_name)
    }
}

fn skip_whitespace(text: &str, from: usize, limit: usize) -> usize {
    text[from..limit]
        .char_indices()
        .find(|(_, c)| !c.is_whitespace())
        .map(|(offset, _)| from + offset)
        .unwrap_or(limit)
}

/// Last non-whitespace byte offset in `text[start..=end]`.
fn end_of_text(text: &str, start: usize, end: usize) -> usize {
    text[start..=end]
        .char_indices()
        .rev()
        .find(|(_, c)| !c.is_whitespace())
        .map(|(offset, _)| start + offset)
        .unwrap_or(end)
}

struct LineIndex {
    starts: Vec<usize>,
}

impl LineIndex {
    fn new(text: &str) -> Self {
        let mut starts = vec![0];
        starts.extend(text.match_indices('\n').map(|(i, _)| i + 1));
        Self { starts }
    }

    fn line_of(&self, offset: usize) -> usize {
        self.starts.partition_point(|&start| start <= offset)
    }

    fn column_of(&self, offset: usize, line: usize) -> usize {
        offset - self.starts[line - 1] + 1
    }

    fn span(&self, start: usize, end: usize) -> SourcePosition {
        let line = self.line_of(start);
        let end_line = self.line_of(end);
        SourcePosition {
            line,
            end_line,
            column: self.column_of(start, line),
            end_column: self.column_of(end, end_line),
            source_start: start,
            source_end: end,
        }
    }
}

/// Returns `(clean, structural)` copies of `source` with the same byte layout:
/// comments are blanked in both, and string/char literal contents are also
/// blanked in `structural` so braces and semicolons inside them are ignored.
fn blank_comments(source: &str) -> (String, String) {
    #[derive(Clone, Copy, PartialEq)]
    enum State {
        Code,
        LineComment,
        BlockComment,
        Str,
        Char,
        TextBlock,
    }

    fn blank(out: &mut String, c: char) {
        if c == '\n' {
            out.push('\n');
        } else {
            out.extend(std::iter::repeat(' ').take(c.len_utf8()));
        }
    }

    let chars: Vec<char> = source.chars().collect();
    let mut clean = String::with_capacity(source.len());
    let mut structural = String::with_capacity(source.len());
    let mut state = State::Code;
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];
        let next = chars.get(i + 1).copied();
        let triple_quote = c == '"' && next == Some('"') && chars.get(i + 2) == Some(&'"');

        match state {
            State::Code => {
                if c == '/' && (next == Some('/') || next == Some('*')) {
                    state = if next == Some('/') {
                        State::LineComment
                    } else {
                        State::BlockComment
                    };
                    for out in [&mut clean, &mut structural] {
                        blank(out, c);
                        blank(out, '*');
                    }
                    i += 2;
                    continue;
                }
                if triple_quote {
                    clean.push_str("\"\"\"");
                    structural.push_str("\"\"\"");
                    state = State::TextBlock;
                    i += 3;
                    continue;
                }
                if c == '"' {
                    state = State::Str;
                } else if c == '\'' {
                    state = State::Char;
                }
                clean.push(c);
                structural.push(c);
            }
            State::LineComment => {
                if c == '\n' {
                    state = State::Code;
                }
                blank(&mut clean, c);
                blank(&mut structural, c);
            }
            State::BlockComment => {
                if c == '*' && next == Some('/') {
                    for out in [&mut clean, &mut structural] {
                        blank(out, '*');
                        blank(out, '/');
                    }
                    state = State::Code;
                    i += 2;
                    continue;
                }
                blank(&mut clean, c);
                blank(&mut structural, c);
            }
            State::Str | State::Char | State::TextBlock => {
                if c == '\\' {
                    clean.push(c);
                    blank(&mut structural, c);
                    if let Some(escaped) = next {
                        clean.push(escaped);
                        blank(&mut structural, escaped);
                    }
                    i += 2;
                    continue;
                }
                if state == State::TextBlock && triple_quote {
                    clean.push_str("\"\"\"");
                    structural.push_str("\"\"\"");
                    state = State::Code;
                    i += 3;
                    continue;
                }
                let closes = (state == State::Str && c == '"')
                    || (state == State::Char && c == '\'')
                    || (state != State::TextBlock && c == '\n');
                if closes {
                    state = State::Code;
                    clean.push(c);
                    structural.push(c);
                } else {
                    clean.push(c);
                    blank(&mut structural, c);
                }
            }
        }
        i += 1;
    }

    (clean, structural)
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"package org.example;

import java.util.List;

/**
 * Calculator { with braces in docs }
 */
public class Calculator {
    private int total = 0;

    public Calculator(int start) {
        this.total = start;
    }

    // adds values; returns the new total
    @Override
    public int add(int a, final List<Integer> rest) {
        int sum = a + 1;
        for (int i = 0; i < rest.size(); i++) {
            sum += rest.get(i);
        }
        if (sum > 10) {
            log("big; {");
        } else {
            sum--;
        }
        return sum;
    }

    abstract void reset();

    static class Inner {
        void run() {
            Runnable r = () -> {
                System.out.println("x");
            };
            r.run();
        }
    }
}
"#;

    fn parse(source: &str) -> ElementTree {
        JavaSourceParser::new()
            .unwrap()
            .parse_source("Calculator.java", source)
            .unwrap()
    }

    #[test]
    fn test_blank_comments_keeps_layout() {
        let source = "int a = 1; // note {\n/* ; */ String s = \"a;b\";\n";
        let (clean, structural) = blank_comments(source);

        assert_eq!(clean.len(), source.len());
        assert_eq!(structural.len(), source.len());
        assert!(!clean.contains("note"));
        assert!(clean.contains("\"a;b\""));
        assert!(!structural.contains("a;b"));
        assert_eq!(clean.lines().count(), source.lines().count());
    }

    #[test]
    fn test_finds_classes_with_qualified_names() {
        let tree = parse(SAMPLE);
        let names: Vec<&str> = tree
            .find_classes()
            .iter()
            .map(|c| c.qualified_name())
            .collect();

        assert_eq!(names, vec!["org.example.Calculator", "org.example.Calculator$Inner"]);
        let outer = &tree.find_classes()[0];
        assert_eq!(outer.position.line, 8);
        assert_eq!(outer.position.end_line, 40);
    }

    #[test]
    fn test_finds_methods_and_signatures() {
        let tree = parse(SAMPLE);
        let methods = tree.find_elements(|e| e.is_executable());
        let signatures: Vec<&str> = methods
            .iter()
            .map(|m| m.signature.as_deref().unwrap())
            .collect();

        assert_eq!(
            signatures,
            vec!["Calculator(int)", "add(int,List<Integer>)", "reset()", "run()"]
        );
        assert_eq!(methods[0].kind, NodeKind::Constructor);

        let add = methods[1];
        assert_eq!(add.simple_name(), "add");
        assert_eq!(add.position.line, 16);
        assert_eq!(add.position.end_line, 28);
    }

    #[test]
    fn test_statements_are_classified() {
        let tree = parse(SAMPLE);
        let add = tree.find_elements(|e| e.simple_name() == "add")[0];
        let statements: Vec<(usize, NodeKind)> = tree
            .statements_of(add.id)
            .iter()
            .map(|s| (s.position.line, s.kind))
            .collect();

        assert_eq!(
            statements,
            vec![
                (18, NodeKind::LocalVariable),
                (19, NodeKind::For),
                (20, NodeKind::Assignment),
                (22, NodeKind::If),
                (23, NodeKind::Invocation),
                (25, NodeKind::UnaryOperator),
                (27, NodeKind::Return),
            ]
        );
    }

    #[test]
    fn test_lambda_body_is_part_of_statement() {
        let tree = parse(SAMPLE);
        let run = tree.find_elements(|e| e.simple_name() == "run")[0];
        let statements = tree.statements_of(run.id);

        assert_eq!(statements.len(), 2);
        assert_eq!(statements[0].kind, NodeKind::LocalVariable);
        assert_eq!(statements[0].position.line, 34);
        assert_eq!(statements[0].position.end_line, 36);
        assert_eq!(statements[1].kind, NodeKind::Invocation);
    }

    #[test]
    fn test_labeled_loops_keep_their_body() {
        let source = "class L {\n  void f(int[] xs) {\n    outer:\n    for (int x : xs) {\n      g(x);\n    }\n    h();\n  }\n  void k(int[] xs) {\n    inner: for (int x : xs) { g(x); }\n    h();\n  }\n}\n";
        let tree = parse(source);

        for (name, expected) in [
            ("f", vec![(4, NodeKind::For), (5, NodeKind::Invocation), (7, NodeKind::Invocation)]),
            ("k", vec![(10, NodeKind::For), (10, NodeKind::Invocation), (11, NodeKind::Invocation)]),
        ] {
            let method = tree.find_elements(|e| e.simple_name() == name)[0];
            let statements = tree.statements_of(method.id);
            let found: Vec<(usize, NodeKind)> = statements.iter().map(|s| (s.position.line, s.kind)).collect();

            assert_eq!(found, expected, "statements of {}", name);
            assert_eq!(statements[0].text, "for (int x : xs) {");
            assert_eq!(statements[1].text, "g(x);");
            assert_eq!(statements[2].text, "h();");
        }
    }

    #[test]
    fn test_no_class_in_interface_file() {
        let tree = parse("package a;\npublic interface Shape {\n    double area();\n}\n");
        assert!(tree.find_classes().is_empty());
    }

    #[test]
    fn test_case_labels_are_stripped() {
        let source = "class S {\n  int f(int x) {\n    switch (x) {\n      case 1: return 2;\n      default: x = 3;\n    }\n    return x;\n  }\n}\n";
        let tree = parse(source);
        let f = tree.find_elements(|e| e.simple_name() == "f")[0];
        let statements = tree.statements_of(f.id);

        assert_eq!(statements[0].kind, NodeKind::Switch);
        assert_eq!(statements[1].kind, NodeKind::Return);
        assert_eq!(statements[1].text, "return 2;");
        assert_eq!(statements[2].kind, NodeKind::Assignment);
        assert_eq!(statements[2].text, "x = 3;");
    }
}

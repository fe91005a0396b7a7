//! Per-file selection requests and the location loop that drives them.

use crate::collector::LocationsCollector;
use crate::error::Result;
use crate::location::LocationFactory;
use crate::selection::{Element, ElementsSelector, MethodInfo, OrderedSelection, RandomSelection};
use crate::source::{CodeElement, SourceParser};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Every accepted location reserves this many mutant ids.
pub const MUTANT_ID_STRIDE: usize = 5;

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MethodRequest {
    method_name: String,
}

impl MethodRequest {
    pub fn new(method_name: impl Into<String>) -> Self {
        Self {
            method_name: method_name.into(),
        }
    }

    pub fn method_name(&self) -> &str {
        &self.method_name
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum SelectionMode {
    #[default]
    Ordered,
    Random,
}

impl SelectionMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            SelectionMode::Ordered => "ordered",
            SelectionMode::Random => "random",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AbortReason {
    NoClassFound,
    NoMethodFound,
}

/// How a `locate_tokens` pass ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LocateOutcome {
    Aborted(AbortReason),
    QuotaReached { emitted: usize },
    Exhausted { emitted: usize },
}

impl LocateOutcome {
    pub fn emitted(&self) -> usize {
        match self {
            LocateOutcome::Aborted(_) => 0,
            LocateOutcome::QuotaReached { emitted } | LocateOutcome::Exhausted { emitted } => *emitted,
        }
    }
}

/// Line restriction shared between a request and its selector.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LineFilter {
    lines: BTreeSet<usize>,
}

impl LineFilter {
    pub fn allows(&self, line: usize) -> bool {
        self.lines.is_empty() || self.lines.contains(&line)
    }
}

/// Selection criteria for one source file plus its mutant-id counter.
#[derive(Debug, Clone, PartialEq)]
pub struct FileRequest {
    file_path: String,
    methods_to_mutate: Vec<MethodRequest>,
    lines_to_mutate: BTreeSet<usize>,
    exclude_file_request: Option<Arc<FileRequest>>,
    next_mutant_id: usize,
    random_seed: Option<u64>,
}

impl FileRequest {
    pub fn new(
        file_path: impl Into<String>,
        methods: Vec<MethodRequest>,
        lines: impl IntoIterator<Item = usize>,
    ) -> Self {
        Self {
            file_path: file_path.into(),
            methods_to_mutate: methods,
            lines_to_mutate: lines.into_iter().collect(),
            exclude_file_request: None,
            next_mutant_id: 0,
            random_seed: None,
        }
    }

    pub fn set_exclude_file_request(&mut self, exclude: Arc<FileRequest>) {
        self.exclude_file_request = Some(exclude);
    }

    pub fn with_random_seed(mut self, seed: u64) -> Self {
        self.random_seed = Some(seed);
        self
    }

    pub fn file_path(&self) -> &str {
        &self.file_path
    }

    pub fn lines_to_mutate(&self) -> &BTreeSet<usize> {
        &self.lines_to_mutate
    }

    pub fn methods_to_mutate(&self) -> &[MethodRequest] {
        &self.methods_to_mutate
    }

    pub fn next_mutant_id(&self) -> usize {
        self.next_mutant_id
    }

    /// Continues numbering from `next_mutant_id`, e.g. where the previous
    /// file of a run stopped.
    pub fn set_next_mutant_id(&mut self, next_mutant_id: usize) {
        self.next_mutant_id = next_mutant_id;
    }

    fn is_exhaustive(&self) -> bool {
        self.methods_to_mutate.is_empty()
            && self.lines_to_mutate.is_empty()
            && self.exclude_file_request.is_none()
    }

    /// Whether `method` may contribute candidates. An exclusion request that
    /// rejects the method vetoes it before the method and line filters run.
    pub fn is_method_to_mutate(&self, method: &CodeElement) -> bool {
        if self.is_exhaustive() {
            return true;
        }
        if let Some(exclude) = &self.exclude_file_request {
            if !exclude.is_method_to_mutate(method) {
                return false;
            }
        }
        if self
            .methods_to_mutate
            .iter()
            .any(|m| m.method_name() == method.simple_name())
        {
            return true;
        }
        let position = method.position();
        self.lines_to_mutate
            .iter()
            .any(|&line| position.contains_line(line))
    }

    pub fn is_line_to_mutate(&self, line: usize) -> bool {
        self.line_filter().allows(line)
    }

    pub fn line_filter(&self) -> LineFilter {
        LineFilter {
            lines: self.lines_to_mutate.clone(),
        }
    }

    /// True when a quota is set and that many locations were accepted.
    pub fn number_of_tokens_achieved(&self, number_of_tokens: Option<usize>) -> bool {
        number_of_tokens.is_some_and(|n| self.next_mutant_id / MUTANT_ID_STRIDE >= n)
    }

    /// Collects mutation locations of the file into `collector`.
    ///
    /// `number_of_tokens` caps the number of accepted locations; `None` means
    /// no limit. Files without a class or without an eligible method are
    /// skipped with a warning and leave the collector untouched.
    pub fn locate_tokens<P, F, C>(
        &mut self,
        parser: &P,
        factory: &F,
        collector: &mut C,
        number_of_tokens: Option<usize>,
        selection_mode: SelectionMode,
    ) -> Result<LocateOutcome>
    where
        P: SourceParser + ?Sized,
        F: LocationFactory + ?Sized,
        C: LocationsCollector + ?Sized,
    {
        let tree = parser.parse(&self.file_path)?;

        let Some(class) = tree.find_classes().first() else {
            warn!(file = %self.file_path, "ignored file: no class found");
            return Ok(LocateOutcome::Aborted(AbortReason::NoClassFound));
        };

        let methods = tree.find_elements_in(class, |e| e.is_executable() && self.is_method_to_mutate(e));
        if methods.is_empty() {
            warn!(file = %self.file_path, "ignored file: no method found");
            return Ok(LocateOutcome::Aborted(AbortReason::NoMethodFound));
        }

        let elements: Vec<Element<'_>> = methods
            .iter()
            .flat_map(|method| {
                let info = MethodInfo::of(method);
                tree.statements_of(method.id)
                    .into_iter()
                    .map(move |code| Element::new(code, info.clone()))
            })
            .collect();

        info!(
            file = %self.file_path,
            methods = methods.len(),
            candidates = elements.len(),
            mode = ?selection_mode,
            "locating tokens"
        );

        if self.number_of_tokens_achieved(number_of_tokens) {
            return Ok(LocateOutcome::QuotaReached { emitted: 0 });
        }

        let line_filter = self.line_filter();
        let is_line_to_mutate = move |line: usize| line_filter.allows(line);
        let mut selector: Box<dyn ElementsSelector<'_> + '_> = match selection_mode {
            SelectionMode::Ordered => Box::new(OrderedSelection::new(elements, is_line_to_mutate)),
            SelectionMode::Random => Box::new(RandomSelection::new(
                elements,
                is_line_to_mutate,
                self.random_seed,
            )),
        };

        let class_name = class.qualified_name();
        let mut emitted = 0;

        while selector.has_next() {
            let Some(element) = selector.next_element() else {
                continue;
            };

            match factory.create_location(self.next_mutant_id, element.code) {
                Ok(location) => {
                    collector.add_location(
                        &self.file_path,
                        class_name,
                        &element.method,
                        element.line(),
                        location,
                    );
                    self.next_mutant_id += MUTANT_ID_STRIDE;
                    emitted += 1;

                    if self.number_of_tokens_achieved(number_of_tokens) {
                        debug!(file = %self.file_path, emitted, "quota reached");
                        return Ok(LocateOutcome::QuotaReached { emitted });
                    }
                }
                Err(unhandled) => {
                    collector.add_unhandled_mutation(unhandled.node_type);
                    warn!(file = %self.file_path, "{}", unhandled);
                }
            }
        }

        Ok(LocateOutcome::Exhausted { emitted })
    }
}

impl fmt::Display for FileRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let methods: Vec<&str> = self.methods_to_mutate.iter().map(|m| m.method_name()).collect();
        write!(
            f,
            "FileRequest{{file_path='{}', methods_to_mutate={:?}, lines_to_mutate={:?}, mutant_id={}",
            self.file_path, methods, self.lines_to_mutate, self.next_mutant_id
        )?;
        match &self.exclude_file_request {
            Some(exclude) => write!(f, ", excluding_request={}}}", exclude),
            None => write!(f, ", excluding_request=null}}"),
        }
    }
}

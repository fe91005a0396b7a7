//! # MBERT Locator
//!
//! Picks the code elements of Java sources that a masked-language-model
//! mutation engine should mask, and records them as mutation locations.
//!
//! This library provides functionality to:
//! - Describe per-file requests restricted by method names, lines and
//!   recursive exclusion requests
//! - Walk the eligible statements in source order or in a (seedable) random order
//! - Turn each statement into a masked location with a reserved block of mutant ids
//! - Collect locations into a JSON report or a SQLite database
//!
//! ## Example
//!
//! ```rust,no_run
//! use mbert_locator::prelude::*;
//!
//! fn main() -> Result<()> {
//!     let parser = JavaSourceParser::new()?;
//!     let factory = MBertLocationFactory::new();
//!     let mut collector = JsonLocationsCollector::new();
//!
//!     let mut request = FileRequest::new(
//!         "src/main/java/org/example/Shop.java",
//!         vec![MethodRequest::new("price")],
//!         [],
//!     );
//!     let outcome = request.locate_tokens(
//!         &parser,
//!         &factory,
//!         &mut collector,
//!         Some(10),
//!         SelectionMode::Ordered,
//!     )?;
//!
//!     println!("{} locations", outcome.emitted());
//!     collector.write_json(std::path::Path::new("locations.json"))?;
//!     Ok(())
//! }
//! ```

pub mod collector;
pub mod config;
pub mod discovery;
pub mod error;
pub mod git_changes;
pub mod location;
pub mod request;
pub mod selection;
pub mod source;
pub mod sqlite;

pub use error::{LocatorError, Result};

/// Re-export commonly used types
pub mod prelude {
    pub use crate::collector::{JsonLocationsCollector, LocationsCollector};
    pub use crate::error::{LocatorError, Result};
    pub use crate::location::{LocationFactory, MBertLocation, MBertLocationFactory};
    pub use crate::request::{FileRequest, LocateOutcome, MethodRequest, SelectionMode};
    pub use crate::selection::{ElementsSelector, OrderedSelection, RandomSelection};
    pub use crate::source::{JavaSourceParser, SourceParser};
}

//! External verification and search collaborators for weekforge.
//!
//! - [`LinkChecker`]: multi-round link verification with paywall awareness
//! - [`DatasetChecker`]: dataset reference extraction and probing
//! - [`TavilySearch`]: web search for sections that need current material
//!
//! The checkers share a [`UrlProbe`] so that tests can script HTTP outcomes.

pub mod datasets;
pub mod links;
pub mod probe;
pub mod search;

pub use datasets::{DatasetChecker, DatasetRef, extract_datasets};
pub use links::LinkChecker;
pub use probe::{HttpProbe, ProbeOutcome, UrlProbe};
pub use search::TavilySearch;

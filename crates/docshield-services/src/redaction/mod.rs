//! Sensitive-data detection: the rule catalog, the pattern library and the
//! text scanner.

pub mod catalog;
pub mod library;
pub mod scanner;

pub use library::{CompiledRule, PatternLibrary, RuleSelection, SelectedRule};
pub use scanner::{ContentScanner, PatternMatch, RedactedSpan, TextScanResult, MERGED_TOKEN};

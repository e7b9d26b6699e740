//! Output formatters.
//!
//! - [`text`]: colored, grouped output for terminals
//! - [`json`]: plain data for scripting
//!
//! ```no_run
//! use foldupe::output::text::write_summary;
//! use foldupe::snapshot::SnapshotStore;
//!
//! let store = SnapshotStore::new("/tmp/foldupe");
//! if let Some(dupes) = store.load_dupeset_or_discard() {
//!     write_summary(&mut std::io::stdout(), &dupes).unwrap();
//! }
//! ```

pub mod json;
pub mod text;

pub use json::{
    write_json, JsonCandidate, JsonComparison, JsonOutputError, JsonScanOutput, JsonScanSummary,
    JsonSideBySide,
};

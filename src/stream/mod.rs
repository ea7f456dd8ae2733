//! Searchable stream plumbing for subprocess output.
//!
//! `searchable` holds the append-only queryable buffer; `merge` combines two
//! chunk channels into one arrival-ordered channel; `decode` turns raw bytes
//! into text across arbitrary chunk boundaries.

pub(crate) mod decode;
pub mod merge;
pub mod searchable;

pub use searchable::SearchableStream;

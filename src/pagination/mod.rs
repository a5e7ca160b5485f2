//! Pagination module
//!
//! Supports: offset (`skip` / `totalRecords`) and cursor (`nextPageToken`)
//!
//! # Overview
//!
//! The protocol is detected from the first response. Depending on the
//! caller's [`PaginationMode`] the engine returns that page alone or keeps
//! requesting pages, merging them into one response whose metadata
//! reflects the combined result.

mod engine;
mod types;

pub use engine::{execute_paged, paginate};
pub use types::{NextPage, PageAccumulator, PagePlacement, PageStyle, PaginationMode};

#[cfg(test)]
mod tests;

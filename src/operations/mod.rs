//! Operations module
//!
//! A static table maps each logical operation to its HTTP shape, and
//! [`QuickbaseClient`] exposes one method per entry. All of them run
//! through the shared [`RequestExecutor`](crate::http::RequestExecutor).

mod client;
pub mod table;

pub use client::{Call, QuickbaseClient};
pub use table::{find, BodyKind, OperationSpec, Param, OPERATIONS};

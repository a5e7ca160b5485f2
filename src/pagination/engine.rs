//! Page driver
//!
//! Pages are fetched strictly in sequence through the executor, so every
//! page gets the same auth, retry and alias handling as a single call. An
//! error on any page fails the whole call.

use super::types::{PageAccumulator, PagePlacement, PaginationMode};
use crate::error::Result;
use crate::http::{ApiRequest, RequestExecutor};
use crate::types::JsonValue;
use tracing::debug;

/// Execute a request honouring the pagination mode.
///
/// `placement` is `None` for operations that cannot page; those always
/// return a single response.
pub async fn execute_paged(
    executor: &RequestExecutor,
    request: ApiRequest,
    mode: PaginationMode,
    placement: Option<PagePlacement>,
) -> Result<JsonValue> {
    match (mode.resolve(executor.config().auto_paginate), placement) {
        (Some(limit), Some(placement)) => paginate(executor, request, limit, placement).await,
        _ => executor.execute(request).await,
    }
}

/// Fetch pages until the data runs out or `limit` records are collected
pub async fn paginate(
    executor: &RequestExecutor,
    request: ApiRequest,
    limit: Option<usize>,
    placement: PagePlacement,
) -> Result<JsonValue> {
    let first = executor.execute(request.clone()).await?;
    let mut acc = match PageAccumulator::start(first, limit) {
        Ok(acc) => acc,
        Err(unpaged) => return Ok(unpaged),
    };

    let mut pages = 1u32;
    loop {
        let next = acc.next_page().clone();
        if next.is_done() {
            break;
        }

        let mut page_request = request.clone();
        next.apply(&mut page_request, placement)?;
        pages += 1;
        debug!(
            operation = %request.operation,
            page = pages,
            collected = acc.len(),
            next = ?next,
            "Fetching next page"
        );

        let page = executor.execute(page_request).await?;
        acc.push(page);
    }

    debug!(operation = %request.operation, pages, records = acc.len(), "Pagination complete");
    Ok(acc.finish())
}


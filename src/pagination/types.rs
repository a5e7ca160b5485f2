//! Pagination types
//!
//! Two protocols are recognised from the first page:
//!
//! - offset: `metadata.{totalRecords, numRecords, skip}` with a `data` array
//! - cursor: `metadata.nextPageToken` with one top-level array

use crate::error::{Error, Result};
use crate::http::ApiRequest;
use crate::types::{JsonObject, JsonValue};
use serde_json::json;

/// Caller's choice for one call
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PaginationMode {
    /// Single page, unless the client auto-paginates
    #[default]
    Default,
    /// Always a single page, even with auto-pagination on
    NoPaginate,
    /// Every page
    All,
    /// Pages until this many records are collected
    Limit(usize),
}

impl PaginationMode {
    /// Effective record limit, `None` for a single page.
    /// `Some(None)` means every page.
    pub fn resolve(self, auto_paginate: bool) -> Option<Option<usize>> {
        match self {
            PaginationMode::NoPaginate => None,
            PaginationMode::Default if auto_paginate => Some(None),
            PaginationMode::Default => None,
            PaginationMode::All => Some(None),
            PaginationMode::Limit(limit) => Some(Some(limit)),
        }
    }
}

/// Where an operation accepts its next-page cursor
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PagePlacement {
    /// In the JSON body (`options.skip` or `nextPageToken`)
    Body,
    /// As a query parameter (`skip` or `nextPageToken`)
    Query,
}

/// Protocol detected from a response
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PageStyle {
    /// `metadata.totalRecords` / `skip` / `numRecords` over `data`
    Offset,
    /// `metadata.nextPageToken` over the named list
    Cursor {
        /// Top-level array holding the page's items
        list_key: String,
    },
    /// Not paginated
    Unpaged,
}

impl PageStyle {
    /// Detect the protocol from a response body
    pub fn detect(body: &JsonValue) -> Self {
        let Some(metadata) = body.get("metadata").and_then(JsonValue::as_object) else {
            return PageStyle::Unpaged;
        };

        if metadata.contains_key("totalRecords")
            && body.get("data").is_some_and(JsonValue::is_array)
        {
            return PageStyle::Offset;
        }

        if metadata.contains_key("nextPageToken") {
            let list_key = body.as_object().and_then(|obj| {
                obj.iter()
                    .find(|(key, value)| *key != "metadata" && value.is_array())
                    .map(|(key, _)| key.clone())
            });
            if let Some(list_key) = list_key {
                return PageStyle::Cursor { list_key };
            }
        }

        PageStyle::Unpaged
    }

    fn list_key(&self) -> Option<&str> {
        match self {
            PageStyle::Offset => Some("data"),
            PageStyle::Cursor { list_key } => Some(list_key),
            PageStyle::Unpaged => None,
        }
    }
}

/// Where the next page starts
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NextPage {
    /// Offset for the next request
    Skip(u64),
    /// Cursor for the next request
    Token(String),
    /// No more pages
    Done,
}

impl NextPage {
    /// Compute the continuation from one page.
    ///
    /// `requested_skip` is the offset the page was fetched with; the page's
    /// own `metadata.skip` takes precedence when present.
    pub fn from_page(style: &PageStyle, page: &JsonValue, requested_skip: u64) -> Self {
        let metadata = page.get("metadata");
        let meta_u64 = |key: &str| metadata.and_then(|m| m.get(key)).and_then(JsonValue::as_u64);

        match style {
            PageStyle::Offset => {
                let listed = page
                    .get("data")
                    .and_then(JsonValue::as_array)
                    .map_or(0, Vec::len) as u64;
                let num_records = meta_u64("numRecords").unwrap_or(listed);
                let skip = meta_u64("skip").unwrap_or(requested_skip);
                let total = meta_u64("totalRecords").unwrap_or(0);

                if num_records == 0 || skip + num_records >= total {
                    NextPage::Done
                } else {
                    NextPage::Skip(skip + num_records)
                }
            }
            PageStyle::Cursor { list_key } => {
                let empty = page
                    .get(list_key.as_str())
                    .and_then(JsonValue::as_array)
                    .map_or(true, Vec::is_empty);
                let token = metadata
                    .and_then(|m| m.get("nextPageToken"))
                    .and_then(JsonValue::as_str)
                    .unwrap_or_default();

                if empty || token.is_empty() {
                    NextPage::Done
                } else {
                    NextPage::Token(token.to_string())
                }
            }
            PageStyle::Unpaged => NextPage::Done,
        }
    }

    /// Check if this is a done result
    pub fn is_done(&self) -> bool {
        matches!(self, Self::Done)
    }

    /// Write the continuation into a request
    pub fn apply(&self, request: &mut ApiRequest, placement: PagePlacement) -> Result<()> {
        match (self, placement) {
            (NextPage::Done, _) => {}
            (NextPage::Skip(skip), PagePlacement::Query) => request.set_query("skip", skip.to_string()),
            (NextPage::Token(token), PagePlacement::Query) => {
                request.set_query("nextPageToken", token.clone());
            }
            (NextPage::Skip(skip), PagePlacement::Body) => {
                let body = body_object(request)?;
                let options = body
                    .entry("options")
                    .or_insert_with(|| json!({}))
                    .as_object_mut()
                    .ok_or_else(|| Error::config("request body 'options' must be an object"))?;
                options.insert("skip".to_string(), json!(skip));
            }
            (NextPage::Token(token), PagePlacement::Body) => {
                body_object(request)?.insert("nextPageToken".to_string(), json!(token));
            }
        }
        Ok(())
    }
}

fn body_object(request: &mut ApiRequest) -> Result<&mut JsonObject> {
    request
        .body
        .get_or_insert_with(|| json!({}))
        .as_object_mut()
        .ok_or_else(|| Error::config("paginated request body must be a JSON object"))
}

/// Records collected across pages plus the first page's envelope
#[derive(Debug, Clone)]
pub struct PageAccumulator {
    style: PageStyle,
    envelope: JsonValue,
    records: Vec<JsonValue>,
    limit: Option<usize>,
    next: NextPage,
    offset: u64,
    trimmed: bool,
}

impl PageAccumulator {
    /// Start from the first page. Returns the page back if it is not paginated.
    pub fn start(first: JsonValue, limit: Option<usize>) -> std::result::Result<Self, JsonValue> {
        let style = PageStyle::detect(&first);
        if style == PageStyle::Unpaged {
            return Err(first);
        }

        let mut acc = Self {
            style,
            envelope: first,
            records: Vec::new(),
            limit,
            next: NextPage::Done,
            offset: 0,
            trimmed: false,
        };
        acc.next = NextPage::from_page(&acc.style, &acc.envelope, 0);
        let first_records = acc.take_records_from_envelope();
        acc.append(first_records);
        Ok(acc)
    }

    /// Detected protocol
    pub fn style(&self) -> &PageStyle {
        &self.style
    }

    /// Records collected so far
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Whether nothing has been collected
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Continuation for the next request, `Done` once finished
    pub fn next_page(&self) -> &NextPage {
        &self.next
    }

    /// Add a following page
    pub fn push(&mut self, mut page: JsonValue) {
        if let NextPage::Skip(skip) = self.next {
            self.offset = skip;
        }
        self.next = NextPage::from_page(&self.style, &page, self.offset);
        if let (PageStyle::Cursor { .. }, Some(token)) = (&self.style, next_token(&page)) {
            set_metadata(&mut self.envelope, "nextPageToken", json!(token));
        }

        let records = self
            .style
            .list_key()
            .and_then(|key| page.get_mut(key))
            .and_then(JsonValue::as_array_mut)
            .map(std::mem::take)
            .unwrap_or_default();
        self.append(records);
    }

    /// Merged response: first page's envelope with every collected record
    pub fn finish(mut self) -> JsonValue {
        let count = self.records.len();
        if let Some(key) = self.style.list_key() {
            if let Some(obj) = self.envelope.as_object_mut() {
                obj.insert(key.to_string(), JsonValue::Array(self.records));
            }
        }

        match self.style {
            PageStyle::Offset => set_metadata(&mut self.envelope, "numRecords", json!(count)),
            PageStyle::Cursor { .. } if self.trimmed => {
                set_metadata(&mut self.envelope, "nextPageToken", json!(""));
            }
            _ => {}
        }
        self.envelope
    }

    fn take_records_from_envelope(&mut self) -> Vec<JsonValue> {
        self.style
            .list_key()
            .and_then(|key| self.envelope.get_mut(key))
            .and_then(JsonValue::as_array_mut)
            .map(std::mem::take)
            .unwrap_or_default()
    }

    fn append(&mut self, records: Vec<JsonValue>) {
        self.records.extend(records);
        if let Some(limit) = self.limit {
            if self.records.len() >= limit {
                self.trimmed = self.records.len() > limit;
                self.records.truncate(limit);
                self.next = NextPage::Done;
            }
        }
    }
}

fn next_token(page: &JsonValue) -> Option<&str> {
    page.get("metadata")?.get("nextPageToken")?.as_str()
}

fn set_metadata(envelope: &mut JsonValue, key: &str, value: JsonValue) {
    if let Some(metadata) = envelope.get_mut("metadata").and_then(JsonValue::as_object_mut) {
        metadata.insert(key.to_string(), value);
    }
}

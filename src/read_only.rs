//! Read-only request classification
//!
//! Pure functions deciding whether a prospective request may run on a
//! client configured read-only. Evaluation order:
//!
//! 1. explicit blocklist of requests that mutate despite being `GET`s
//! 2. `GET` is allowed
//! 3. allow-listed `POST` endpoints that only read (filters in the body)
//! 4. everything else is blocked
//!
//! Legacy XML actions are checked against a separate allow-list.

use crate::error::{Error, Result};
use crate::types::Method;

/// `GET` endpoints with side effects. `*` matches one path segment.
const BLOCKED: &[(Method, &str)] = &[
    (Method::GET, "/docTemplates/*/generate"),
    (Method::GET, "/solutions/*/torecord"),
    (Method::GET, "/solutions/fromrecord"),
    (Method::GET, "/solutions/*/fromrecord"),
];

/// `POST` endpoints that only read
const READ_ONLY_POSTS: &[&str] = &[
    "/records/query",
    "/reports/*/run",
    "/formula/run",
    "/audit",
    "/users",
    "/analytics/events/summaries",
];

/// Legacy XML actions that only read
const READ_ONLY_XML_ACTIONS: &[&str] = &[
    "API_Authenticate",
    "API_DoQuery",
    "API_DoQueryCount",
    "API_FindDBByName",
    "API_GenResultsTable",
    "API_GetAncestorInfo",
    "API_GetAppDTMInfo",
    "API_GetDBInfo",
    "API_GetDBPage",
    "API_GetDBVar",
    "API_GetGroupRole",
    "API_GetNumRecords",
    "API_GetRecordAsHTML",
    "API_GetRecordInfo",
    "API_GetRoleInfo",
    "API_GetSchema",
    "API_GetUserInfo",
    "API_GetUserRole",
    "API_GetUsersInGroup",
    "API_GrantedDBs",
    "API_GrantedDBsForGroup",
    "API_GrantedGroups",
    "API_ListDBPages",
    "API_UserRoles",
];

/// Whether the request would be blocked in read-only mode
pub fn is_blocked(method: Method, path: &str) -> bool {
    let path = normalize(path);

    if BLOCKED
        .iter()
        .any(|(m, pattern)| *m == method && matches_pattern(pattern, path))
    {
        return true;
    }

    match method {
        Method::GET => false,
        Method::POST => !READ_ONLY_POSTS
            .iter()
            .any(|pattern| matches_pattern(pattern, path)),
        Method::PUT | Method::PATCH | Method::DELETE => true,
    }
}

/// Fail with [`Error::ReadOnly`] if the request is blocked
pub fn check(method: Method, path: &str) -> Result<()> {
    if is_blocked(method, path) {
        Err(Error::read_only_path(method.as_str(), normalize(path)))
    } else {
        Ok(())
    }
}

/// Whether a legacy XML action is blocked in read-only mode
pub fn is_xml_action_blocked(action: &str) -> bool {
    !READ_ONLY_XML_ACTIONS
        .iter()
        .any(|allowed| allowed.eq_ignore_ascii_case(action))
}

/// Fail with [`Error::ReadOnly`] naming the XML action if it is blocked
pub fn check_xml_action(action: &str) -> Result<()> {
    if is_xml_action_blocked(action) {
        Err(Error::read_only_action(action))
    } else {
        Ok(())
    }
}

/// Strip query string and trailing slash
fn normalize(path: &str) -> &str {
    let path = path.split('?').next().unwrap_or(path);
    match path.strip_suffix('/') {
        Some(stripped) if !stripped.is_empty() => stripped,
        _ => path,
    }
}

fn matches_pattern(pattern: &str, path: &str) -> bool {
    let mut pattern_segments = pattern.split('/').filter(|s| !s.is_empty());
    let mut path_segments = path.split('/').filter(|s| !s.is_empty());
    loop {
        match (pattern_segments.next(), path_segments.next()) {
            (None, None) => return true,
            (Some(p), Some(s)) if p == "*" || p == s => {}
            _ => return false,
        }
    }
}

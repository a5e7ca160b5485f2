//! Static operation table
//!
//! Every public REST operation is declared once here: method, path
//! template, accepted parameters and how it pages. The client's typed
//! methods and the by-name dispatcher both build requests from these.

use crate::error::{Error, Result};
use crate::http::ApiRequest;
use crate::pagination::PagePlacement;
use crate::types::{JsonValue, Method};

/// A query parameter an operation accepts
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Param {
    /// Parameter name as sent on the wire
    pub name: &'static str,
    /// Whether the call fails without it
    pub required: bool,
}

macro_rules! req {
    ($name:literal) => {
        Param {
            name: $name,
            required: true,
        }
    };
}

macro_rules! opt {
    ($name:literal) => {
        Param {
            name: $name,
            required: false,
        }
    };
}

/// Whether an operation takes a JSON body
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BodyKind {
    None,
    Optional,
    Required,
}

/// Declaration of one REST operation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OperationSpec {
    /// Logical name, e.g. `runQuery`
    pub name: &'static str,
    pub method: Method,
    /// Path template relative to the base URL
    pub path: &'static str,
    /// Placeholders in `path`, in order
    pub path_params: &'static [&'static str],
    pub query_params: &'static [Param],
    pub body: BodyKind,
    /// Where the next-page cursor goes; `None` for operations that never page
    pub pagination: Option<PagePlacement>,
}

impl OperationSpec {
    const fn new(name: &'static str, method: Method, path: &'static str) -> Self {
        Self {
            name,
            method,
            path,
            path_params: &[],
            query_params: &[],
            body: BodyKind::None,
            pagination: None,
        }
    }

    const fn path_params(mut self, params: &'static [&'static str]) -> Self {
        self.path_params = params;
        self
    }

    const fn query(mut self, params: &'static [Param]) -> Self {
        self.query_params = params;
        self
    }

    const fn body(mut self, body: BodyKind) -> Self {
        self.body = body;
        self
    }

    const fn paged(mut self, placement: PagePlacement) -> Self {
        self.pagination = Some(placement);
        self
    }

    /// Empty request for this operation
    pub fn request(&self) -> ApiRequest {
        ApiRequest::new(self.name, self.method, self.path)
    }

    /// Build a request from a JSON parameter object.
    ///
    /// Path and query parameters are looked up by name, `body` becomes the
    /// JSON body and `dbid` sets the explicit resource id. Unknown keys are
    /// rejected.
    pub fn build(&self, params: &JsonValue) -> Result<ApiRequest> {
        let empty = serde_json::Map::new();
        let params = match params {
            JsonValue::Null => &empty,
            JsonValue::Object(map) => map,
            _ => {
                return Err(Error::config(format!(
                    "{}: parameters must be a JSON object",
                    self.name
                )))
            }
        };

        if let Some(unknown) = params.keys().find(|key| !self.accepts(key)) {
            return Err(Error::config(format!(
                "{}: unknown parameter '{unknown}' (accepted: {})",
                self.name,
                self.accepted().join(", ")
            )));
        }

        let mut request = self.request();

        for name in self.path_params {
            let value = params
                .get(*name)
                .ok_or_else(|| Error::missing_field(format!("{}.{name}", self.name)))?;
            request = request.path_param(*name, scalar(self.name, name, value)?);
        }

        for param in self.query_params {
            match params.get(param.name) {
                Some(value) => request = request.query(param.name, scalar(self.name, param.name, value)?),
                None if param.required => {
                    return Err(Error::missing_field(format!("{}.{}", self.name, param.name)))
                }
                None => {}
            }
        }

        match (params.get("body"), self.body) {
            (Some(body), _) => request = request.json(body.clone()),
            (None, BodyKind::Required) => {
                return Err(Error::missing_field(format!("{}.body", self.name)))
            }
            (None, _) => {}
        }

        if let Some(dbid) = params.get("dbid") {
            request = request.dbid(scalar(self.name, "dbid", dbid)?);
        }

        Ok(request)
    }

    fn accepts(&self, key: &str) -> bool {
        key == "dbid"
            || (key == "body" && self.body != BodyKind::None)
            || self.path_params.contains(&key)
            || self.query_params.iter().any(|p| p.name == key)
    }

    fn accepted(&self) -> Vec<&'static str> {
        let mut names: Vec<&'static str> = self.path_params.to_vec();
        names.extend(self.query_params.iter().map(|p| p.name));
        if self.body != BodyKind::None {
            names.push("body");
        }
        names.push("dbid");
        names
    }
}

fn scalar(operation: &str, name: &str, value: &JsonValue) -> Result<String> {
    match value {
        JsonValue::String(s) => Ok(s.clone()),
        JsonValue::Number(n) => Ok(n.to_string()),
        JsonValue::Bool(b) => Ok(b.to_string()),
        _ => Err(Error::config(format!(
            "{operation}.{name} must be a string, number or boolean"
        ))),
    }
}

/// Look up an operation by name
pub fn find(name: &str) -> Option<&'static OperationSpec> {
    OPERATIONS.iter().find(|op| op.name == name)
}

// ============================================================================
// Apps
// ============================================================================

pub const CREATE_APP: OperationSpec = OperationSpec::new("createApp", Method::POST, "/apps")
    .body(BodyKind::Required);
pub const GET_APP: OperationSpec =
    OperationSpec::new("getApp", Method::GET, "/apps/{appId}").path_params(&["appId"]);
pub const UPDATE_APP: OperationSpec = OperationSpec::new("updateApp", Method::POST, "/apps/{appId}")
    .path_params(&["appId"])
    .body(BodyKind::Required);
pub const DELETE_APP: OperationSpec =
    OperationSpec::new("deleteApp", Method::DELETE, "/apps/{appId}")
        .path_params(&["appId"])
        .body(BodyKind::Required);
pub const GET_APP_EVENTS: OperationSpec =
    OperationSpec::new("getAppEvents", Method::GET, "/apps/{appId}/events").path_params(&["appId"]);
pub const COPY_APP: OperationSpec = OperationSpec::new("copyApp", Method::POST, "/apps/{appId}/copy")
    .path_params(&["appId"])
    .body(BodyKind::Required);

// ============================================================================
// Tables and relationships
// ============================================================================

pub const CREATE_TABLE: OperationSpec = OperationSpec::new("createTable", Method::POST, "/tables")
    .query(&[req!("appId")])
    .body(BodyKind::Required);
pub const GET_APP_TABLES: OperationSpec =
    OperationSpec::new("getAppTables", Method::GET, "/tables").query(&[req!("appId")]);
pub const GET_TABLE: OperationSpec = OperationSpec::new("getTable", Method::GET, "/tables/{tableId}")
    .path_params(&["tableId"])
    .query(&[req!("appId")]);
pub const UPDATE_TABLE: OperationSpec =
    OperationSpec::new("updateTable", Method::POST, "/tables/{tableId}")
        .path_params(&["tableId"])
        .query(&[req!("appId")])
        .body(BodyKind::Required);
pub const DELETE_TABLE: OperationSpec =
    OperationSpec::new("deleteTable", Method::DELETE, "/tables/{tableId}")
        .path_params(&["tableId"])
        .query(&[req!("appId")]);
pub const GET_RELATIONSHIPS: OperationSpec =
    OperationSpec::new("getRelationships", Method::GET, "/tables/{tableId}/relationships")
        .path_params(&["tableId"])
        .query(&[opt!("skip")]);
pub const CREATE_RELATIONSHIP: OperationSpec =
    OperationSpec::new("createRelationship", Method::POST, "/tables/{tableId}/relationship")
        .path_params(&["tableId"])
        .body(BodyKind::Required);
pub const UPDATE_RELATIONSHIP: OperationSpec = OperationSpec::new(
    "updateRelationship",
    Method::POST,
    "/tables/{tableId}/relationship/{relationshipId}",
)
.path_params(&["tableId", "relationshipId"])
.body(BodyKind::Optional);
pub const DELETE_RELATIONSHIP: OperationSpec = OperationSpec::new(
    "deleteRelationship",
    Method::DELETE,
    "/tables/{tableId}/relationship/{relationshipId}",
)
.path_params(&["tableId", "relationshipId"]);

// ============================================================================
// Reports
// ============================================================================

pub const GET_TABLE_REPORTS: OperationSpec =
    OperationSpec::new("getTableReports", Method::GET, "/reports").query(&[req!("tableId")]);
pub const GET_REPORT: OperationSpec =
    OperationSpec::new("getReport", Method::GET, "/reports/{reportId}")
        .path_params(&["reportId"])
        .query(&[req!("tableId")]);
pub const RUN_REPORT: OperationSpec =
    OperationSpec::new("runReport", Method::POST, "/reports/{reportId}/run")
        .path_params(&["reportId"])
        .query(&[req!("tableId"), opt!("skip"), opt!("top")])
        .body(BodyKind::Optional)
        .paged(PagePlacement::Query);

// ============================================================================
// Fields
// ============================================================================

pub const GET_FIELDS: OperationSpec = OperationSpec::new("getFields", Method::GET, "/fields")
    .query(&[req!("tableId"), opt!("includeFieldPerms")]);
pub const CREATE_FIELD: OperationSpec = OperationSpec::new("createField", Method::POST, "/fields")
    .query(&[req!("tableId")])
    .body(BodyKind::Required);
pub const DELETE_FIELDS: OperationSpec =
    OperationSpec::new("deleteFields", Method::DELETE, "/fields")
        .query(&[req!("tableId")])
        .body(BodyKind::Required);
pub const GET_FIELD: OperationSpec = OperationSpec::new("getField", Method::GET, "/fields/{fieldId}")
    .path_params(&["fieldId"])
    .query(&[req!("tableId"), opt!("includeFieldPerms")]);
pub const UPDATE_FIELD: OperationSpec =
    OperationSpec::new("updateField", Method::POST, "/fields/{fieldId}")
        .path_params(&["fieldId"])
        .query(&[req!("tableId")])
        .body(BodyKind::Required);
pub const GET_FIELDS_USAGE: OperationSpec =
    OperationSpec::new("getFieldsUsage", Method::GET, "/fields/usage")
        .query(&[req!("tableId"), opt!("skip"), opt!("top")]);
pub const GET_FIELD_USAGE: OperationSpec =
    OperationSpec::new("getFieldUsage", Method::GET, "/fields/usage/{fieldId}")
        .path_params(&["fieldId"])
        .query(&[req!("tableId")]);

// ============================================================================
// Formulas and records
// ============================================================================

pub const RUN_FORMULA: OperationSpec =
    OperationSpec::new("runFormula", Method::POST, "/formula/run").body(BodyKind::Required);
pub const UPSERT: OperationSpec =
    OperationSpec::new("upsert", Method::POST, "/records").body(BodyKind::Required);
pub const DELETE_RECORDS: OperationSpec =
    OperationSpec::new("deleteRecords", Method::DELETE, "/records").body(BodyKind::Required);
pub const RUN_QUERY: OperationSpec = OperationSpec::new("runQuery", Method::POST, "/records/query")
    .body(BodyKind::Required)
    .paged(PagePlacement::Body);

// ============================================================================
// Auth and user tokens
// ============================================================================

pub const GET_TEMP_TOKEN_DBID: OperationSpec =
    OperationSpec::new("getTempTokenDBID", Method::GET, "/auth/temporary/{dbid}")
        .path_params(&["dbid"]);
pub const EXCHANGE_SSO_TOKEN: OperationSpec =
    OperationSpec::new("exchangeSsoToken", Method::POST, "/auth/oauth/token")
        .body(BodyKind::Required);
pub const CLONE_USER_TOKEN: OperationSpec =
    OperationSpec::new("cloneUserToken", Method::POST, "/usertoken/clone").body(BodyKind::Required);
pub const TRANSFER_USER_TOKEN: OperationSpec =
    OperationSpec::new("transferUserToken", Method::POST, "/usertoken/transfer")
        .body(BodyKind::Required);
pub const DEACTIVATE_USER_TOKEN: OperationSpec =
    OperationSpec::new("deactivateUserToken", Method::POST, "/usertoken/deactivate");
pub const DELETE_USER_TOKEN: OperationSpec =
    OperationSpec::new("deleteUserToken", Method::DELETE, "/usertoken");

// ============================================================================
// Files
// ============================================================================

pub const DOWNLOAD_FILE: OperationSpec = OperationSpec::new(
    "downloadFile",
    Method::GET,
    "/files/{tableId}/{recordId}/{fieldId}/{versionNumber}",
)
.path_params(&["tableId", "recordId", "fieldId", "versionNumber"]);
pub const DELETE_FILE: OperationSpec = OperationSpec::new(
    "deleteFile",
    Method::DELETE,
    "/files/{tableId}/{recordId}/{fieldId}/{versionNumber}",
)
.path_params(&["tableId", "recordId", "fieldId", "versionNumber"]);

// ============================================================================
// Users and groups
// ============================================================================

pub const GET_USERS: OperationSpec = OperationSpec::new("getUsers", Method::POST, "/users")
    .query(&[opt!("accountId")])
    .body(BodyKind::Optional)
    .paged(PagePlacement::Body);
pub const DENY_USERS: OperationSpec = OperationSpec::new("denyUsers", Method::PUT, "/users/deny")
    .query(&[opt!("accountId")])
    .body(BodyKind::Required);
pub const DENY_USERS_AND_GROUPS: OperationSpec = OperationSpec::new(
    "denyUsersAndGroups",
    Method::PUT,
    "/users/deny/{shouldDeleteFromGroups}",
)
.path_params(&["shouldDeleteFromGroups"])
.query(&[opt!("accountId")])
.body(BodyKind::Required);
pub const UNDENY_USERS: OperationSpec =
    OperationSpec::new("undenyUsers", Method::PUT, "/users/undeny")
        .query(&[opt!("accountId")])
        .body(BodyKind::Required);
pub const ADD_MEMBERS_TO_GROUP: OperationSpec =
    OperationSpec::new("addMembersToGroup", Method::POST, "/groups/{gid}/members")
        .path_params(&["gid"])
        .body(BodyKind::Required);
pub const REMOVE_MEMBERS_FROM_GROUP: OperationSpec =
    OperationSpec::new("removeMembersFromGroup", Method::DELETE, "/groups/{gid}/members")
        .path_params(&["gid"])
        .body(BodyKind::Required);
pub const ADD_MANAGERS_TO_GROUP: OperationSpec =
    OperationSpec::new("addManagersToGroup", Method::POST, "/groups/{gid}/managers")
        .path_params(&["gid"])
        .body(BodyKind::Required);
pub const REMOVE_MANAGERS_FROM_GROUP: OperationSpec =
    OperationSpec::new("removeManagersFromGroup", Method::DELETE, "/groups/{gid}/managers")
        .path_params(&["gid"])
        .body(BodyKind::Required);
pub const ADD_SUBGROUPS_TO_GROUP: OperationSpec =
    OperationSpec::new("addSubgroupsToGroup", Method::POST, "/groups/{gid}/subgroups")
        .path_params(&["gid"])
        .body(BodyKind::Required);
pub const REMOVE_SUBGROUPS_FROM_GROUP: OperationSpec =
    OperationSpec::new("removeSubgroupsFromGroup", Method::DELETE, "/groups/{gid}/subgroups")
        .path_params(&["gid"])
        .body(BodyKind::Required);

// ============================================================================
// Audit, analytics, documents
// ============================================================================

pub const AUDIT: OperationSpec =
    OperationSpec::new("audit", Method::POST, "/audit").body(BodyKind::Required);
pub const PLATFORM_ANALYTIC_READS: OperationSpec =
    OperationSpec::new("platformAnalyticReads", Method::GET, "/analytics/reads")
        .query(&[opt!("day")]);
pub const PLATFORM_ANALYTIC_EVENT_SUMMARIES: OperationSpec = OperationSpec::new(
    "platformAnalyticEventSummaries",
    Method::POST,
    "/analytics/events/summaries",
)
.query(&[opt!("accountId")])
.body(BodyKind::Required);
pub const GENERATE_DOCUMENT: OperationSpec =
    OperationSpec::new("generateDocument", Method::GET, "/docTemplates/{templateId}/generate")
        .path_params(&["templateId"])
        .query(&[
            req!("tableId"),
            opt!("recordId"),
            req!("filename"),
            opt!("format"),
            opt!("margin"),
            opt!("unit"),
            opt!("pageSize"),
            opt!("orientation"),
            opt!("realm"),
        ]);

// ============================================================================
// Solutions
// ============================================================================

pub const EXPORT_SOLUTION: OperationSpec =
    OperationSpec::new("exportSolution", Method::GET, "/solutions/{solutionId}")
        .path_params(&["solutionId"]);
pub const EXPORT_SOLUTION_TO_RECORD: OperationSpec =
    OperationSpec::new("exportSolutionToRecord", Method::GET, "/solutions/{solutionId}/torecord")
        .path_params(&["solutionId"])
        .query(&[req!("tableId"), req!("fieldId")]);
pub const CREATE_SOLUTION_FROM_RECORD: OperationSpec =
    OperationSpec::new("createSolutionFromRecord", Method::GET, "/solutions/fromrecord")
        .query(&[req!("tableId"), req!("fieldId"), req!("recordId")]);
pub const UPDATE_SOLUTION_TO_RECORD: OperationSpec = OperationSpec::new(
    "updateSolutionToRecord",
    Method::GET,
    "/solutions/{solutionId}/fromrecord",
)
.path_params(&["solutionId"])
.query(&[req!("tableId"), req!("fieldId"), req!("recordId")]);

// ============================================================================
// Trustees
// ============================================================================

pub const GET_TRUSTEES: OperationSpec =
    OperationSpec::new("getTrustees", Method::GET, "/app/{appId}/trustees").path_params(&["appId"]);
pub const ADD_TRUSTEES: OperationSpec =
    OperationSpec::new("addTrustees", Method::POST, "/app/{appId}/trustees")
        .path_params(&["appId"])
        .body(BodyKind::Required);
pub const REMOVE_TRUSTEES: OperationSpec =
    OperationSpec::new("removeTrustees", Method::DELETE, "/app/{appId}/trustees")
        .path_params(&["appId"])
        .body(BodyKind::Required);
pub const UPDATE_TRUSTEES: OperationSpec =
    OperationSpec::new("updateTrustees", Method::PATCH, "/app/{appId}/trustees")
        .path_params(&["appId"])
        .body(BodyKind::Required);

/// Every declared operation
pub static OPERATIONS: &[OperationSpec] = &[
    CREATE_APP,
    GET_APP,
    UPDATE_APP,
    DELETE_APP,
    GET_APP_EVENTS,
    COPY_APP,
    CREATE_TABLE,
    GET_APP_TABLES,
    GET_TABLE,
    UPDATE_TABLE,
    DELETE_TABLE,
    GET_RELATIONSHIPS,
    CREATE_RELATIONSHIP,
    UPDATE_RELATIONSHIP,
    DELETE_RELATIONSHIP,
    GET_TABLE_REPORTS,
    GET_REPORT,
    RUN_REPORT,
    GET_FIELDS,
    CREATE_FIELD,
    DELETE_FIELDS,
    GET_FIELD,
    UPDATE_FIELD,
    GET_FIELDS_USAGE,
    GET_FIELD_USAGE,
    RUN_FORMULA,
    UPSERT,
    DELETE_RECORDS,
    RUN_QUERY,
    GET_TEMP_TOKEN_DBID,
    EXCHANGE_SSO_TOKEN,
    CLONE_USER_TOKEN,
    TRANSFER_USER_TOKEN,
    DEACTIVATE_USER_TOKEN,
    DELETE_USER_TOKEN,
    DOWNLOAD_FILE,
    DELETE_FILE,
    GET_USERS,
    DENY_USERS,
    DENY_USERS_AND_GROUPS,
    UNDENY_USERS,
    ADD_MEMBERS_TO_GROUP,
    REMOVE_MEMBERS_FROM_GROUP,
    ADD_MANAGERS_TO_GROUP,
    REMOVE_MANAGERS_FROM_GROUP,
    ADD_SUBGROUPS_TO_GROUP,
    REMOVE_SUBGROUPS_FROM_GROUP,
    AUDIT,
    PLATFORM_ANALYTIC_READS,
    PLATFORM_ANALYTIC_EVENT_SUMMARIES,
    GENERATE_DOCUMENT,
    EXPORT_SOLUTION,
    EXPORT_SOLUTION_TO_RECORD,
    CREATE_SOLUTION_FROM_RECORD,
    UPDATE_SOLUTION_TO_RECORD,
    GET_TRUSTEES,
    ADD_TRUSTEES,
    REMOVE_TRUSTEES,
    UPDATE_TRUSTEES,
];

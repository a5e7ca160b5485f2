//! Typed client
//!
//! [`QuickbaseClient`] has one method per declared operation. Each returns
//! a [`Call`] that can be adjusted (pagination, extra query parameters,
//! headers, explicit dbid, timeout) and then awaited.

use super::table::{self, OperationSpec, OPERATIONS};
use crate::auth::{build_strategy, TicketStore};
use crate::config::{ClientConfig, ResolvedConfig};
use crate::error::{Error, Result};
use crate::http::{ApiRequest, RequestExecutor};
use crate::pagination::{execute_paged, PagePlacement, PaginationMode};
use crate::types::JsonValue;
use futures::future::{BoxFuture, FutureExt};
use std::future::IntoFuture;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

/// One pending operation
#[must_use = "a Call does nothing until awaited"]
pub struct Call<'a> {
    executor: &'a RequestExecutor,
    request: ApiRequest,
    pagination: Option<PagePlacement>,
    mode: PaginationMode,
}

impl<'a> Call<'a> {
    fn new(executor: &'a RequestExecutor, spec: &OperationSpec, request: ApiRequest) -> Self {
        Self {
            executor,
            request,
            pagination: spec.pagination,
            mode: PaginationMode::Default,
        }
    }

    /// Fetch every page
    pub fn all(mut self) -> Self {
        self.mode = PaginationMode::All;
        self
    }

    /// Fetch pages until `limit` records are collected
    pub fn paginate(mut self, limit: usize) -> Self {
        self.mode = PaginationMode::Limit(limit);
        self
    }

    /// Return a single page even when the client auto-paginates
    pub fn no_paginate(mut self) -> Self {
        self.mode = PaginationMode::NoPaginate;
        self
    }

    pub fn query(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.request.set_query(key, value);
        self
    }

    pub fn header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.request = self.request.header(key, value);
        self
    }

    /// Authenticate against this table or app, overriding what the request implies
    pub fn dbid(mut self, dbid: impl Into<String>) -> Self {
        self.request = self.request.dbid(dbid);
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.request = self.request.timeout(timeout);
        self
    }

    /// Replace the JSON body
    pub fn body(mut self, body: JsonValue) -> Self {
        self.request = self.request.json(body);
        self
    }

    /// The request as it will be handed to the executor
    pub fn request(&self) -> &ApiRequest {
        &self.request
    }

    pub fn mode(&self) -> PaginationMode {
        self.mode
    }

    /// Run the call
    pub async fn send(self) -> Result<JsonValue> {
        execute_paged(self.executor, self.request, self.mode, self.pagination).await
    }
}

impl<'a> IntoFuture for Call<'a> {
    type Output = Result<JsonValue>;
    type IntoFuture = BoxFuture<'a, Result<JsonValue>>;

    fn into_future(self) -> Self::IntoFuture {
        self.send().boxed()
    }
}

/// Client for one realm
#[derive(Clone)]
pub struct QuickbaseClient {
    executor: Arc<RequestExecutor>,
}

impl QuickbaseClient {
    /// Resolve the configuration and build the auth strategy
    pub async fn new(config: ClientConfig) -> Result<Self> {
        Self::connect(config, None).await
    }

    /// Like [`QuickbaseClient::new`], persisting tickets to `store`
    pub async fn with_ticket_store(config: ClientConfig, store: Arc<dyn TicketStore>) -> Result<Self> {
        Self::connect(config, Some(store)).await
    }

    async fn connect(config: ClientConfig, store: Option<Arc<dyn TicketStore>>) -> Result<Self> {
        let (resolved, auth) = config.resolve()?;
        let http = RequestExecutor::http_client()?;
        let strategy = build_strategy(auth, &resolved, http.clone(), store).await?;

        info!(
            realm = %resolved.realm_hostname,
            auth = %strategy.kind(),
            read_only = resolved.read_only,
            "Quickbase client ready"
        );

        Ok(Self {
            executor: Arc::new(RequestExecutor::new(Arc::new(resolved), strategy, http)),
        })
    }

    pub fn config(&self) -> &ResolvedConfig {
        self.executor.config()
    }

    pub fn executor(&self) -> &RequestExecutor {
        &self.executor
    }

    /// Every operation this client can dispatch
    pub fn operations() -> &'static [OperationSpec] {
        OPERATIONS
    }

    /// Dispatch by operation name with a JSON parameter object.
    ///
    /// ```rust,ignore
    /// let page = client
    ///     .call("runQuery", json!({"body": {"from": "orders", "select": [3]}}))?
    ///     .all()
    ///     .await?;
    /// ```
    pub fn call(&self, name: &str, params: &JsonValue) -> Result<Call<'_>> {
        let spec = table::find(name).ok_or_else(|| {
            let names: Vec<String> = OPERATIONS.iter().map(|op| op.name.to_string()).collect();
            let suggestion = crate::schema::suggest(name, &names);
            Error::config(match suggestion {
                Some(s) => format!("Unknown operation '{name}'. Did you mean '{s}'?"),
                None => format!("Unknown operation '{name}'"),
            })
        })?;
        Ok(Call::new(&self.executor, spec, spec.build(params)?))
    }

    /// Raw legacy XML call; returns the response text once `errcode` is checked
    pub async fn execute_xml(&self, action: &str, dbid: &str, inner_xml: &str) -> Result<String> {
        self.executor.execute_xml(action, dbid, inner_xml).await
    }

    fn start(&self, spec: &OperationSpec) -> Call<'_> {
        Call::new(&self.executor, spec, spec.request())
    }

    fn start_with(&self, spec: &OperationSpec, build: impl FnOnce(ApiRequest) -> ApiRequest) -> Call<'_> {
        Call::new(&self.executor, spec, build(spec.request()))
    }

    // ------------------------------------------------------------------------
    // Apps
    // ------------------------------------------------------------------------

    pub fn create_app(&self, body: JsonValue) -> Call<'_> {
        self.start_with(&table::CREATE_APP, |r| r.json(body))
    }

    pub fn get_app(&self, app_id: impl Into<String>) -> Call<'_> {
        self.start_with(&table::GET_APP, |r| r.path_param("appId", app_id))
    }

    pub fn update_app(&self, app_id: impl Into<String>, body: JsonValue) -> Call<'_> {
        self.start_with(&table::UPDATE_APP, |r| r.path_param("appId", app_id).json(body))
    }

    pub fn delete_app(&self, app_id: impl Into<String>, body: JsonValue) -> Call<'_> {
        self.start_with(&table::DELETE_APP, |r| r.path_param("appId", app_id).json(body))
    }

    pub fn get_app_events(&self, app_id: impl Into<String>) -> Call<'_> {
        self.start_with(&table::GET_APP_EVENTS, |r| r.path_param("appId", app_id))
    }

    pub fn copy_app(&self, app_id: impl Into<String>, body: JsonValue) -> Call<'_> {
        self.start_with(&table::COPY_APP, |r| r.path_param("appId", app_id).json(body))
    }

    // ------------------------------------------------------------------------
    // Tables and relationships
    // ------------------------------------------------------------------------

    pub fn create_table(&self, app_id: impl Into<String>, body: JsonValue) -> Call<'_> {
        self.start_with(&table::CREATE_TABLE, |r| r.query("appId", app_id).json(body))
    }

    pub fn get_app_tables(&self, app_id: impl Into<String>) -> Call<'_> {
        self.start_with(&table::GET_APP_TABLES, |r| r.query("appId", app_id))
    }

    pub fn get_table(&self, app_id: impl Into<String>, table_id: impl Into<String>) -> Call<'_> {
        self.start_with(&table::GET_TABLE, |r| {
            r.path_param("tableId", table_id).query("appId", app_id)
        })
    }

    pub fn update_table(
        &self,
        app_id: impl Into<String>,
        table_id: impl Into<String>,
        body: JsonValue,
    ) -> Call<'_> {
        self.start_with(&table::UPDATE_TABLE, |r| {
            r.path_param("tableId", table_id).query("appId", app_id).json(body)
        })
    }

    pub fn delete_table(&self, app_id: impl Into<String>, table_id: impl Into<String>) -> Call<'_> {
        self.start_with(&table::DELETE_TABLE, |r| {
            r.path_param("tableId", table_id).query("appId", app_id)
        })
    }

    /// Relationships where `table_id` is the child table
    pub fn get_relationships(&self, table_id: impl Into<String>) -> Call<'_> {
        self.start_with(&table::GET_RELATIONSHIPS, |r| r.path_param("tableId", table_id))
    }

    pub fn create_relationship(&self, table_id: impl Into<String>, body: JsonValue) -> Call<'_> {
        self.start_with(&table::CREATE_RELATIONSHIP, |r| {
            r.path_param("tableId", table_id).json(body)
        })
    }

    pub fn update_relationship(&self, table_id: impl Into<String>, relationship_id: u64) -> Call<'_> {
        self.start_with(&table::UPDATE_RELATIONSHIP, |r| {
            r.path_param("tableId", table_id)
                .path_param("relationshipId", relationship_id.to_string())
        })
    }

    pub fn delete_relationship(&self, table_id: impl Into<String>, relationship_id: u64) -> Call<'_> {
        self.start_with(&table::DELETE_RELATIONSHIP, |r| {
            r.path_param("tableId", table_id)
                .path_param("relationshipId", relationship_id.to_string())
        })
    }

    // ------------------------------------------------------------------------
    // Reports
    // ------------------------------------------------------------------------

    pub fn get_table_reports(&self, table_id: impl Into<String>) -> Call<'_> {
        self.start_with(&table::GET_TABLE_REPORTS, |r| r.query("tableId", table_id))
    }

    pub fn get_report(&self, table_id: impl Into<String>, report_id: impl Into<String>) -> Call<'_> {
        self.start_with(&table::GET_REPORT, |r| {
            r.path_param("reportId", report_id).query("tableId", table_id)
        })
    }

    /// Run a saved report. Pages through the `skip` query parameter.
    pub fn run_report(&self, table_id: impl Into<String>, report_id: impl Into<String>) -> Call<'_> {
        self.start_with(&table::RUN_REPORT, |r| {
            r.path_param("reportId", report_id).query("tableId", table_id)
        })
    }

    // ------------------------------------------------------------------------
    // Fields
    // ------------------------------------------------------------------------

    pub fn get_fields(&self, table_id: impl Into<String>) -> Call<'_> {
        self.start_with(&table::GET_FIELDS, |r| r.query("tableId", table_id))
    }

    pub fn create_field(&self, table_id: impl Into<String>, body: JsonValue) -> Call<'_> {
        self.start_with(&table::CREATE_FIELD, |r| r.query("tableId", table_id).json(body))
    }

    pub fn delete_fields(&self, table_id: impl Into<String>, body: JsonValue) -> Call<'_> {
        self.start_with(&table::DELETE_FIELDS, |r| r.query("tableId", table_id).json(body))
    }

    pub fn get_field(&self, table_id: impl Into<String>, field_id: u64) -> Call<'_> {
        self.start_with(&table::GET_FIELD, |r| {
            r.path_param("fieldId", field_id.to_string())
                .query("tableId", table_id)
        })
    }

    pub fn update_field(&self, table_id: impl Into<String>, field_id: u64, body: JsonValue) -> Call<'_> {
        self.start_with(&table::UPDATE_FIELD, |r| {
            r.path_param("fieldId", field_id.to_string())
                .query("tableId", table_id)
                .json(body)
        })
    }

    pub fn get_fields_usage(&self, table_id: impl Into<String>) -> Call<'_> {
        self.start_with(&table::GET_FIELDS_USAGE, |r| r.query("tableId", table_id))
    }

    pub fn get_field_usage(&self, table_id: impl Into<String>, field_id: u64) -> Call<'_> {
        self.start_with(&table::GET_FIELD_USAGE, |r| {
            r.path_param("fieldId", field_id.to_string())
                .query("tableId", table_id)
        })
    }

    // ------------------------------------------------------------------------
    // Formulas and records
    // ------------------------------------------------------------------------

    pub fn run_formula(&self, body: JsonValue) -> Call<'_> {
        self.start_with(&table::RUN_FORMULA, |r| r.json(body))
    }

    /// Insert or update records. `to` and field keys may be aliases.
    pub fn upsert(&self, body: JsonValue) -> Call<'_> {
        self.start_with(&table::UPSERT, |r| r.json(body))
    }

    pub fn delete_records(&self, body: JsonValue) -> Call<'_> {
        self.start_with(&table::DELETE_RECORDS, |r| r.json(body))
    }

    /// Query records. Pages through `options.skip` in the body.
    pub fn run_query(&self, body: JsonValue) -> Call<'_> {
        self.start_with(&table::RUN_QUERY, |r| r.json(body))
    }

    // ------------------------------------------------------------------------
    // Auth and user tokens
    // ------------------------------------------------------------------------

    pub fn get_temp_token_dbid(&self, dbid: impl Into<String>) -> Call<'_> {
        let dbid = dbid.into();
        self.start_with(&table::GET_TEMP_TOKEN_DBID, |r| {
            r.path_param("dbid", dbid.clone()).dbid(dbid)
        })
    }

    pub fn exchange_sso_token(&self, body: JsonValue) -> Call<'_> {
        self.start_with(&table::EXCHANGE_SSO_TOKEN, |r| r.json(body))
    }

    pub fn clone_user_token(&self, body: JsonValue) -> Call<'_> {
        self.start_with(&table::CLONE_USER_TOKEN, |r| r.json(body))
    }

    pub fn transfer_user_token(&self, body: JsonValue) -> Call<'_> {
        self.start_with(&table::TRANSFER_USER_TOKEN, |r| r.json(body))
    }

    pub fn deactivate_user_token(&self) -> Call<'_> {
        self.start(&table::DEACTIVATE_USER_TOKEN)
    }

    pub fn delete_user_token(&self) -> Call<'_> {
        self.start(&table::DELETE_USER_TOKEN)
    }

    // ------------------------------------------------------------------------
    // Files
    // ------------------------------------------------------------------------

    pub fn download_file(
        &self,
        table_id: impl Into<String>,
        record_id: u64,
        field_id: u64,
        version: u64,
    ) -> Call<'_> {
        self.start_with(&table::DOWNLOAD_FILE, |r| {
            file_path(r, table_id.into(), record_id, field_id, version)
        })
    }

    pub fn delete_file(
        &self,
        table_id: impl Into<String>,
        record_id: u64,
        field_id: u64,
        version: u64,
    ) -> Call<'_> {
        self.start_with(&table::DELETE_FILE, |r| {
            file_path(r, table_id.into(), record_id, field_id, version)
        })
    }

    // ------------------------------------------------------------------------
    // Users and groups
    // ------------------------------------------------------------------------

    /// Users in the account. Pages through `nextPageToken` in the body.
    pub fn get_users(&self) -> Call<'_> {
        self.start_with(&table::GET_USERS, |r| r.json(serde_json::json!({})))
    }

    pub fn deny_users(&self, user_ids: JsonValue) -> Call<'_> {
        self.start_with(&table::DENY_USERS, |r| r.json(user_ids))
    }

    pub fn deny_users_and_groups(&self, remove_from_groups: bool, user_ids: JsonValue) -> Call<'_> {
        self.start_with(&table::DENY_USERS_AND_GROUPS, |r| {
            r.path_param("shouldDeleteFromGroups", remove_from_groups.to_string())
                .json(user_ids)
        })
    }

    pub fn undeny_users(&self, user_ids: JsonValue) -> Call<'_> {
        self.start_with(&table::UNDENY_USERS, |r| r.json(user_ids))
    }

    pub fn add_members_to_group(&self, gid: u64, user_ids: JsonValue) -> Call<'_> {
        self.group(&table::ADD_MEMBERS_TO_GROUP, gid, user_ids)
    }

    pub fn remove_members_from_group(&self, gid: u64, user_ids: JsonValue) -> Call<'_> {
        self.group(&table::REMOVE_MEMBERS_FROM_GROUP, gid, user_ids)
    }

    pub fn add_managers_to_group(&self, gid: u64, user_ids: JsonValue) -> Call<'_> {
        self.group(&table::ADD_MANAGERS_TO_GROUP, gid, user_ids)
    }

    pub fn remove_managers_from_group(&self, gid: u64, user_ids: JsonValue) -> Call<'_> {
        self.group(&table::REMOVE_MANAGERS_FROM_GROUP, gid, user_ids)
    }

    pub fn add_subgroups_to_group(&self, gid: u64, group_ids: JsonValue) -> Call<'_> {
        self.group(&table::ADD_SUBGROUPS_TO_GROUP, gid, group_ids)
    }

    pub fn remove_subgroups_from_group(&self, gid: u64, group_ids: JsonValue) -> Call<'_> {
        self.group(&table::REMOVE_SUBGROUPS_FROM_GROUP, gid, group_ids)
    }

    fn group(&self, spec: &OperationSpec, gid: u64, body: JsonValue) -> Call<'_> {
        self.start_with(spec, |r| r.path_param("gid", gid.to_string()).json(body))
    }

    // ------------------------------------------------------------------------
    // Audit, analytics, documents
    // ------------------------------------------------------------------------

    pub fn audit(&self, body: JsonValue) -> Call<'_> {
        self.start_with(&table::AUDIT, |r| r.json(body))
    }

    pub fn platform_analytic_reads(&self) -> Call<'_> {
        self.start(&table::PLATFORM_ANALYTIC_READS)
    }

    pub fn platform_analytic_event_summaries(&self, body: JsonValue) -> Call<'_> {
        self.start_with(&table::PLATFORM_ANALYTIC_EVENT_SUMMARIES, |r| r.json(body))
    }

    /// Render a document template. Blocked on read-only clients.
    pub fn generate_document(
        &self,
        template_id: u64,
        table_id: impl Into<String>,
        filename: impl Into<String>,
    ) -> Call<'_> {
        self.start_with(&table::GENERATE_DOCUMENT, |r| {
            r.path_param("templateId", template_id.to_string())
                .query("tableId", table_id)
                .query("filename", filename)
        })
    }

    // ------------------------------------------------------------------------
    // Solutions
    // ------------------------------------------------------------------------

    pub fn export_solution(&self, solution_id: impl Into<String>) -> Call<'_> {
        self.start_with(&table::EXPORT_SOLUTION, |r| r.path_param("solutionId", solution_id))
    }

    pub fn export_solution_to_record(
        &self,
        solution_id: impl Into<String>,
        table_id: impl Into<String>,
        field_id: u64,
    ) -> Call<'_> {
        self.start_with(&table::EXPORT_SOLUTION_TO_RECORD, |r| {
            r.path_param("solutionId", solution_id)
                .query("tableId", table_id)
                .query("fieldId", field_id.to_string())
        })
    }

    pub fn create_solution_from_record(
        &self,
        table_id: impl Into<String>,
        field_id: u64,
        record_id: u64,
    ) -> Call<'_> {
        self.start_with(&table::CREATE_SOLUTION_FROM_RECORD, |r| {
            r.query("tableId", table_id)
                .query("fieldId", field_id.to_string())
                .query("recordId", record_id.to_string())
        })
    }

    pub fn update_solution_to_record(
        &self,
        solution_id: impl Into<String>,
        table_id: impl Into<String>,
        field_id: u64,
        record_id: u64,
    ) -> Call<'_> {
        self.start_with(&table::UPDATE_SOLUTION_TO_RECORD, |r| {
            r.path_param("solutionId", solution_id)
                .query("tableId", table_id)
                .query("fieldId", field_id.to_string())
                .query("recordId", record_id.to_string())
        })
    }

    // ------------------------------------------------------------------------
    // Trustees
    // ------------------------------------------------------------------------

    pub fn get_trustees(&self, app_id: impl Into<String>) -> Call<'_> {
        self.start_with(&table::GET_TRUSTEES, |r| r.path_param("appId", app_id))
    }

    pub fn add_trustees(&self, app_id: impl Into<String>, body: JsonValue) -> Call<'_> {
        self.start_with(&table::ADD_TRUSTEES, |r| r.path_param("appId", app_id).json(body))
    }

    pub fn remove_trustees(&self, app_id: impl Into<String>, body: JsonValue) -> Call<'_> {
        self.start_with(&table::REMOVE_TRUSTEES, |r| r.path_param("appId", app_id).json(body))
    }

    pub fn update_trustees(&self, app_id: impl Into<String>, body: JsonValue) -> Call<'_> {
        self.start_with(&table::UPDATE_TRUSTEES, |r| r.path_param("appId", app_id).json(body))
    }
}

fn file_path(request: ApiRequest, table_id: String, record_id: u64, field_id: u64, version: u64) -> ApiRequest {
    request
        .path_param("tableId", table_id)
        .path_param("recordId", record_id.to_string())
        .path_param("fieldId", field_id.to_string())
        .path_param("versionNumber", version.to_string())
}

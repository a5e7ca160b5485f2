//! CLI runner - executes commands

use crate::cli::commands::{Cli, Commands, OutputFormat};
use crate::config::{AuthDef, ClientConfig};
use crate::error::{Error, Result, ResultExt};
use crate::operations::{BodyKind, QuickbaseClient, OPERATIONS};
use crate::read_only;
use crate::types::{JsonValue, Method};
use serde_json::json;
use std::fs;
use std::path::Path;
use tracing::debug;

/// CLI runner
pub struct Runner {
    cli: Cli,
}

impl Runner {
    /// Create a new runner
    pub fn new(cli: Cli) -> Self {
        Self { cli }
    }

    /// Run the CLI command
    pub async fn run(&self) -> Result<()> {
        match &self.cli.command {
            Commands::Call {
                operation,
                params,
                params_file,
                all,
                limit,
                no_paginate,
            } => {
                let params = load_params(params.as_deref(), params_file.as_deref())?;
                self.call(operation, &params, *all, *limit, *no_paginate)
                    .await
            }
            Commands::Xml {
                action,
                dbid,
                inner,
            } => self.xml(action, dbid, inner).await,
            Commands::Operations => self.list_operations(),
            Commands::CheckReadOnly { method, path } => self.check_read_only(*method, path),
            Commands::Validate => self.validate(),
        }
    }

    /// Config file if given, otherwise `--realm` / `--user-token` (or their env vars)
    fn load_config(&self) -> Result<ClientConfig> {
        let mut config = if let Some(path) = &self.cli.config {
            debug!(path = %path.display(), "Loading config file");
            ClientConfig::from_file(path)?
        } else {
            let realm = self.cli.realm.clone().ok_or_else(|| {
                Error::config("No config file given and QB_REALM / --realm is not set")
            })?;
            let token = self.cli.user_token.clone().ok_or_else(|| {
                Error::config("No config file given and QB_USER_TOKEN / --user-token is not set")
            })?;
            ClientConfig::builder(realm, AuthDef::UserToken { token }).build()
        };

        if self.cli.read_only {
            config.read_only = true;
        }
        Ok(config)
    }

    async fn client(&self) -> Result<QuickbaseClient> {
        QuickbaseClient::new(self.load_config()?).await
    }

    async fn call(
        &self,
        operation: &str,
        params: &JsonValue,
        all: bool,
        limit: Option<usize>,
        no_paginate: bool,
    ) -> Result<()> {
        let client = self.client().await?;
        let mut call = client.call(operation, params)?;
        if all {
            call = call.all();
        } else if let Some(limit) = limit {
            call = call.paginate(limit);
        } else if no_paginate {
            call = call.no_paginate();
        }

        let response = call.await?;
        self.output(&response);
        Ok(())
    }

    async fn xml(&self, action: &str, dbid: &str, inner: &str) -> Result<()> {
        let client = self.client().await?;
        let text = client.execute_xml(action, dbid, inner).await?;
        println!("{text}");
        Ok(())
    }

    fn list_operations(&self) -> Result<()> {
        for op in OPERATIONS {
            match self.cli.format {
                OutputFormat::Json => {
                    let query: Vec<JsonValue> = op
                        .query_params
                        .iter()
                        .map(|p| json!({"name": p.name, "required": p.required}))
                        .collect();
                    self.output(&json!({
                        "name": op.name,
                        "method": op.method.as_str(),
                        "path": op.path,
                        "pathParams": op.path_params,
                        "queryParams": query,
                        "body": op.body != BodyKind::None,
                        "paginated": op.pagination.is_some(),
                    }));
                }
                OutputFormat::Pretty => println!("{:<32} {:<7} {}", op.name, op.method.as_str(), op.path),
            }
        }
        Ok(())
    }

    fn check_read_only(&self, method: Method, path: &str) -> Result<()> {
        let blocked = read_only::is_blocked(method, path);
        self.output(&json!({
            "method": method.as_str(),
            "path": path,
            "blocked": blocked,
        }));
        Ok(())
    }

    fn validate(&self) -> Result<()> {
        let config = self.load_config()?;
        let (resolved, auth) = config.resolve()?;
        let tables = resolved
            .schema
            .as_ref()
            .map(|schema| schema.table_alias_list())
            .unwrap_or_default();

        self.output(&json!({
            "valid": true,
            "realmHostname": resolved.realm_hostname,
            "baseUrl": resolved.base_url,
            "auth": auth.kind().to_string(),
            "readOnly": resolved.read_only,
            "autoPaginate": resolved.auto_paginate,
            "throttle": resolved.throttle.is_some(),
            "schemaTables": tables,
        }));
        Ok(())
    }

    fn output(&self, value: &JsonValue) {
        match self.cli.format {
            OutputFormat::Json => println!("{}", serde_json::to_string(value).unwrap_or_default()),
            OutputFormat::Pretty => {
                println!("{}", serde_json::to_string_pretty(value).unwrap_or_default());
            }
        }
    }
}

/// Inline JSON takes precedence over a file; no parameters means `{}`
fn load_params(inline: Option<&str>, file: Option<&Path>) -> Result<JsonValue> {
    if let Some(json_str) = inline {
        return serde_json::from_str(json_str)
            .map_err(|e| Error::config(format!("Invalid --params JSON: {e}")));
    }

    if let Some(path) = file {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read params file {}", path.display()))?;
        return serde_json::from_str(&content)
            .with_context(|| format!("Invalid params JSON in {}", path.display()));
    }

    Ok(json!({}))
}

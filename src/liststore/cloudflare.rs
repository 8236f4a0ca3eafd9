//! Cloudflare-backed list store.
//!
//! Maps the [`ListStore`](super::ListStore) capability onto the
//! Cloudflare v4 REST API: an account-level IP list plus a zone
//! firewall rule that allows traffic from addresses on it.

use std::time::Duration;

use chrono::{DateTime, Utc};
use reqwest::Method;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::json;

use super::{ListStore, ListStoreError, RemoteListEntry};
use crate::config::CloudflareConfig;

const API_BASE: &str = "https://api.cloudflare.com/client/v4";
const LIST_NAME: &str = "allowgate";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(15);

/// Typed response envelope shared by every v4 endpoint.
#[derive(Debug, Deserialize)]
struct Envelope<T> {
    success: bool,
    result: Option<T>,
    #[serde(default)]
    errors: Vec<ApiMessage>,
}

#[derive(Debug, Deserialize)]
struct ApiMessage {
    message: String,
}

#[derive(Debug, Deserialize)]
struct Identified {
    id: String,
}

#[derive(Debug, Deserialize)]
struct RulesList {
    id: String,
    name: String,
    kind: String,
}

#[derive(Debug, Deserialize)]
struct ListItem {
    id: String,
    ip: String,
    #[serde(default)]
    comment: Option<String>,
    #[serde(default)]
    created_on: Option<String>,
}

#[derive(Debug, Deserialize)]
struct BulkOperation {
    #[serde(default)]
    operation_id: Option<String>,
}

#[derive(Debug, Deserialize)]
struct FirewallRule {
    id: String,
    #[serde(default)]
    filter: Option<FirewallFilter>,
}

#[derive(Debug, Deserialize)]
struct FirewallFilter {
    #[serde(default)]
    expression: Option<String>,
}

/// Production list store over the Cloudflare API.
pub struct CloudflareListStore {
    client: reqwest::Client,
    token: String,
    account_id: String,
    list_id: String,
}

impl CloudflareListStore {
    /// Resolve the account, list, and firewall rule this service will
    /// operate on, creating the list and rule when absent.
    ///
    /// Any failure here is a startup error; the service refuses to run
    /// half-wired.
    pub async fn connect(config: &CloudflareConfig) -> Result<Self, ListStoreError> {
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()?;

        let mut store = Self {
            client,
            token: config.token.clone(),
            account_id: config.account_id.clone(),
            list_id: config.list_id.clone(),
        };

        if store.account_id.is_empty() {
            store.account_id = store.discover_account_id().await?;
            tracing::info!(account_id = %store.account_id, "Resolved Cloudflare account");
        }

        if store.list_id.is_empty() {
            store.list_id = store.discover_or_create_list().await?;
            tracing::info!(list_id = %store.list_id, "Resolved Cloudflare IP list");

            let zone_id = store.discover_zone_id(&config.zone).await?;
            store.ensure_firewall_rule(&zone_id).await?;
        }

        Ok(store)
    }

    async fn discover_account_id(&self) -> Result<String, ListStoreError> {
        let accounts: Vec<Identified> = self.request(Method::GET, "accounts", None).await?;
        accounts
            .into_iter()
            .next()
            .map(|account| account.id)
            .ok_or_else(|| {
                ListStoreError::Bootstrap("no accounts visible to the API token".to_string())
            })
    }

    async fn discover_zone_id(&self, zone: &str) -> Result<String, ListStoreError> {
        let path = format!("zones?name={zone}");
        let zones: Vec<Identified> = self.request(Method::GET, &path, None).await?;
        zones
            .into_iter()
            .next()
            .map(|z| z.id)
            .ok_or_else(|| ListStoreError::Bootstrap(format!("invalid zone: {zone}")))
    }

    async fn discover_or_create_list(&self) -> Result<String, ListStoreError> {
        let path = format!("accounts/{}/rules/lists", self.account_id);
        let lists: Vec<RulesList> = self.request(Method::GET, &path, None).await?;

        if let Some(list) = lists
            .iter()
            .find(|list| list.name == LIST_NAME && list.kind == "ip")
        {
            return Ok(list.id.clone());
        }

        let body = json!({
            "name": LIST_NAME,
            "kind": "ip",
            "description": "Managed by allowgate",
        });
        let created: Identified = self.request(Method::POST, &path, Some(body)).await?;
        tracing::info!(list_id = %created.id, "Created Cloudflare IP list");
        Ok(created.id)
    }

    /// Make sure the zone has a firewall rule allowing traffic from the
    /// list; without it the list grants nothing.
    async fn ensure_firewall_rule(&self, zone_id: &str) -> Result<(), ListStoreError> {
        let path = format!("zones/{zone_id}/firewall/rules");
        let rules: Vec<FirewallRule> = self.request(Method::GET, &path, None).await?;

        let expression = format!("(ip.src in ${LIST_NAME})");
        let references_list = rules.iter().any(|rule| {
            rule.filter
                .as_ref()
                .and_then(|filter| filter.expression.as_deref())
                .map(|expr| expr.contains(&format!("${LIST_NAME}")))
                .unwrap_or(false)
        });
        if references_list {
            return Ok(());
        }

        let body = json!([{
            "action": "allow",
            "description": "Allow addresses on the allowgate list",
            "filter": { "expression": expression, "paused": false },
        }]);
        let created: Vec<FirewallRule> = self.request(Method::POST, &path, Some(body)).await?;
        if let Some(rule) = created.first() {
            tracing::info!(rule_id = %rule.id, "Created zone firewall rule");
        }
        Ok(())
    }

    fn items_path(&self) -> String {
        format!(
            "accounts/{}/rules/lists/{}/items",
            self.account_id, self.list_id
        )
    }

    async fn request<T: DeserializeOwned>(
        &self,
        method: Method,
        path: &str,
        body: Option<serde_json::Value>,
    ) -> Result<T, ListStoreError> {
        let url = format!("{API_BASE}/{path}");
        let mut request = self
            .client
            .request(method, &url)
            .bearer_auth(&self.token);
        if let Some(body) = body {
            request = request.json(&body);
        }

        let response = request.send().await?;
        let status = response.status();
        let envelope: Envelope<T> = response
            .json()
            .await
            .map_err(|err| ListStoreError::Decode(err.to_string()))?;

        if !envelope.success {
            let message = if envelope.errors.is_empty() {
                "unknown error".to_string()
            } else {
                envelope
                    .errors
                    .iter()
                    .map(|e| e.message.as_str())
                    .collect::<Vec<_>>()
                    .join(" | ")
            };
            return Err(ListStoreError::Api {
                status: status.as_u16(),
                message,
            });
        }

        envelope
            .result
            .ok_or_else(|| ListStoreError::Decode(format!("missing result for {path}")))
    }
}

#[async_trait::async_trait]
impl ListStore for CloudflareListStore {
    async fn list_entries(&self) -> Result<Vec<RemoteListEntry>, ListStoreError> {
        let items: Vec<ListItem> = self.request(Method::GET, &self.items_path(), None).await?;

        let mut entries = Vec::with_capacity(items.len());
        for item in items {
            let created_at = match item
                .created_on
                .as_deref()
                .map(DateTime::parse_from_rfc3339)
            {
                Some(Ok(ts)) => ts.with_timezone(&Utc),
                _ => {
                    tracing::warn!(
                        id = %item.id,
                        ip = %item.ip,
                        "List item has no parseable creation time, skipping"
                    );
                    continue;
                }
            };
            entries.push(RemoteListEntry {
                id: item.id,
                ip: item.ip,
                label: item.comment.unwrap_or_default(),
                created_at,
            });
        }
        Ok(entries)
    }

    async fn add_entry(&self, ip: &str, label: &str) -> Result<String, ListStoreError> {
        let body = json!([{ "ip": ip, "comment": label }]);
        let operation: BulkOperation = self
            .request(Method::POST, &self.items_path(), Some(body))
            .await?;
        Ok(operation.operation_id.unwrap_or_default())
    }

    async fn remove_entries(&self, ids: &[String]) -> Result<(), ListStoreError> {
        let body = json!({
            "items": ids.iter().map(|id| json!({ "id": id })).collect::<Vec<_>>(),
        });
        let result: Result<BulkOperation, ListStoreError> = self
            .request(Method::DELETE, &self.items_path(), Some(body))
            .await;

        match result {
            Ok(_) => Ok(()),
            // Another actor may have removed the entry between our list
            // and delete calls; that is not a failure.
            Err(ListStoreError::Api { status: 404, .. }) => {
                tracing::debug!("Delete batch targeted ids that are already gone");
                Ok(())
            }
            Err(err) => Err(err),
        }
    }
}

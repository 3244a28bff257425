//! Meta Graph API adapter
//!
//! Implements the platform read/write traits over the Graph API's REST
//! surface. All numeric fields arrive as strings and are parsed leniently
//! (missing or malformed values become zero, matching what the platform UI
//! shows for inactive units). Reads carry a small bounded retry with
//! doubling backoff; writes are attempted exactly once so a failed pause or
//! budget update is never double-applied.

use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use tracing::{debug, warn};
use url::Url;

use super::{ActionCount, ActionValue, InsightsRow, PlatformReadApi, PlatformWriteApi};
use crate::error::{PlatformError, PlatformResult};
use crate::models::{AdUnit, BudgetField, BudgetGroup, InsightsWindow, UnitStatus};

/// Configuration for the Graph API client.
#[derive(Debug, Clone)]
pub struct GraphConfig {
    /// API origin, overridable for tests.
    pub api_base: String,
    /// Versioned path segment, e.g. `v21.0`.
    pub api_version: String,
    /// Bearer token with `ads_management` scope.
    pub access_token: String,
    /// Ad account identifier, with or without the `act_` prefix.
    pub account_id: String,
    /// Per-request timeout.
    pub request_timeout: Duration,
    /// Connection establishment timeout.
    pub connect_timeout: Duration,
    /// Extra attempts for idempotent reads after the first failure.
    pub read_retries: u32,
    /// Backoff before the first read retry; doubles per attempt.
    pub retry_initial_backoff: Duration,
}

impl Default for GraphConfig {
    fn default() -> Self {
        Self {
            api_base: "https://graph.facebook.com".to_string(),
            api_version: "v21.0".to_string(),
            access_token: String::new(),
            account_id: String::new(),
            request_timeout: Duration::from_secs(30),
            connect_timeout: Duration::from_secs(10),
            read_retries: 2,
            retry_initial_backoff: Duration::from_millis(500),
        }
    }
}

/// HTTP client for the Graph API.
pub struct GraphClient {
    config: GraphConfig,
    http: Client,
}

impl GraphClient {
    pub fn new(config: GraphConfig) -> Result<Self> {
        let http = Client::builder()
            .timeout(config.request_timeout)
            .connect_timeout(config.connect_timeout)
            .build()
            .context("Failed to create HTTP client")?;

        // Fail fast on an unparseable base URL instead of erroring every call.
        Url::parse(&config.api_base).context("Invalid Graph API base URL")?;

        Ok(Self { config, http })
    }

    /// The account identifier as configured.
    pub fn account_id(&self) -> &str {
        &self.config.account_id
    }

    /// Account path segment with the `act_` prefix the API requires.
    fn account_path(&self) -> String {
        if self.config.account_id.starts_with("act_") {
            self.config.account_id.clone()
        } else {
            format!("act_{}", self.config.account_id)
        }
    }

    /// Build a versioned endpoint URL with the access token attached.
    fn endpoint(&self, path: &str) -> PlatformResult<Url> {
        let raw = format!(
            "{}/{}/{}",
            self.config.api_base.trim_end_matches('/'),
            self.config.api_version,
            path
        );
        let mut url =
            Url::parse(&raw).map_err(|e| PlatformError::read("endpoint", e))?;
        url.query_pairs_mut()
            .append_pair("access_token", &self.config.access_token);
        Ok(url)
    }

    /// GET a JSON document, retrying transport failures and 5xx responses.
    async fn get_json<T: DeserializeOwned>(
        &self,
        url: Url,
        context: &'static str,
    ) -> PlatformResult<T> {
        let mut backoff = self.config.retry_initial_backoff;

        for attempt in 0..=self.config.read_retries {
            match self.execute_get(url.clone()).await {
                Ok(body) => {
                    return serde_json::from_str(&body).map_err(|e| {
                        PlatformError::read(context, format!("invalid response body: {e}"))
                    });
                }
                Err(GetError::Retryable(message)) => {
                    if attempt == self.config.read_retries {
                        return Err(PlatformError::read(context, message));
                    }
                    warn!(
                        context,
                        attempt = attempt + 1,
                        backoff_ms = backoff.as_millis() as u64,
                        error = %message,
                        "Read failed, retrying"
                    );
                    tokio::time::sleep(backoff).await;
                    backoff *= 2;
                }
                Err(GetError::Terminal(message)) => {
                    return Err(PlatformError::read(context, message));
                }
            }
        }

        unreachable!("retry loop returns on the final attempt")
    }

    async fn execute_get(&self, url: Url) -> Result<String, GetError> {
        let response = self
            .http
            .get(url)
            .send()
            .await
            .map_err(|e| GetError::Retryable(e.to_string()))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| GetError::Retryable(e.to_string()))?;

        if status.is_success() {
            Ok(body)
        } else if status.is_server_error() {
            Err(GetError::Retryable(format!(
                "HTTP {}: {}",
                status.as_u16(),
                graph_error_message(&body)
            )))
        } else {
            Err(GetError::Terminal(format!(
                "HTTP {}: {}",
                status.as_u16(),
                graph_error_message(&body)
            )))
        }
    }

    /// POST form parameters. Never retried: a timed-out write may have been
    /// applied, and blind re-application could double a budget update.
    async fn post_form(
        &self,
        url: Url,
        params: &[(&str, String)],
        context: &'static str,
    ) -> PlatformResult<()> {
        let response = self
            .http
            .post(url)
            .form(params)
            .send()
            .await
            .map_err(|e| PlatformError::write(context, e))?;

        let status = response.status();
        if status.is_success() {
            return Ok(());
        }

        let body = response.text().await.unwrap_or_default();
        Err(PlatformError::write(
            context,
            format!(
                "HTTP {}: {}",
                status.as_u16(),
                graph_error_message(&body)
            ),
        ))
    }
}

enum GetError {
    Retryable(String),
    Terminal(String),
}

#[async_trait]
impl PlatformReadApi for GraphClient {
    async fn list_active_units(&self) -> PlatformResult<Vec<AdUnit>> {
        let mut url = self.endpoint(&format!("{}/ads", self.account_path()))?;
        url.query_pairs_mut()
            .append_pair(
                "fields",
                "id,name,adset_id,campaign_id,status,effective_status",
            )
            .append_pair("effective_status", r#"["ACTIVE"]"#)
            .append_pair("limit", "100");

        let mut units = Vec::new();
        loop {
            let page: Page<AdDto> = self.get_json(url, "list_active_units").await?;
            units.extend(page.data.into_iter().map(AdDto::into_unit));

            match page.paging.and_then(|p| p.next) {
                Some(next) => {
                    url = Url::parse(&next)
                        .map_err(|e| PlatformError::read("list_active_units", e))?;
                }
                None => break,
            }
        }

        debug!(count = units.len(), "Listed active units");
        Ok(units)
    }

    async fn get_insights(
        &self,
        unit_id: &str,
        window: InsightsWindow,
    ) -> PlatformResult<InsightsRow> {
        let mut url = self.endpoint(&format!("{unit_id}/insights"))?;
        url.query_pairs_mut().append_pair(
            "fields",
            "impressions,clicks,spend,ctr,cpc,actions,action_values",
        );
        apply_window(&mut url, window);

        let page: Page<InsightsDto> = self.get_json(url, "get_insights").await?;
        let row = page
            .data
            .into_iter()
            .next()
            .ok_or_else(|| PlatformError::MetricsUnavailable {
                unit_id: unit_id.to_string(),
            })?;

        Ok(row.into_row())
    }

    async fn get_budget_group(&self, adset_id: &str) -> PlatformResult<BudgetGroup> {
        let mut url = self.endpoint(adset_id)?;
        url.query_pairs_mut()
            .append_pair("fields", "id,name,daily_budget,lifetime_budget");

        let dto: AdSetDto = self.get_json(url, "get_budget_group").await?;
        Ok(dto.into_group())
    }
}

#[async_trait]
impl PlatformWriteApi for GraphClient {
    async fn set_status(&self, unit_id: &str, status: UnitStatus) -> PlatformResult<()> {
        let url = self.endpoint(unit_id)?;
        self.post_form(
            url,
            &[("status", status.as_str().to_string())],
            "set_status",
        )
        .await
    }

    async fn set_budget(
        &self,
        adset_id: &str,
        field: BudgetField,
        amount: u64,
    ) -> PlatformResult<()> {
        let url = self.endpoint(adset_id)?;
        self.post_form(url, &[(field.as_str(), amount.to_string())], "set_budget")
            .await
    }
}

/// Append the time-window query parameters for an insights request.
fn apply_window(url: &mut Url, window: InsightsWindow) {
    match window {
        InsightsWindow::Today => {
            url.query_pairs_mut().append_pair("date_preset", "today");
        }
        InsightsWindow::TrailingDays(days) => {
            let until = Utc::now().date_naive();
            let since = until - chrono::Days::new(u64::from(days));
            let range = format!(
                r#"{{"since":"{}","until":"{}"}}"#,
                since.format("%Y-%m-%d"),
                until.format("%Y-%m-%d")
            );
            url.query_pairs_mut().append_pair("time_range", &range);
        }
    }
}

/// Extract the human-readable message from a Graph error body, falling back
/// to the (truncated) raw body.
fn graph_error_message(body: &str) -> String {
    serde_json::from_str::<GraphErrorBody>(body)
        .ok()
        .and_then(|b| b.error)
        .and_then(|e| e.message)
        .unwrap_or_else(|| body.trim().chars().take(200).collect())
}

// Wire DTOs. Counts and currency amounts are string-encoded on the wire.

#[derive(Debug, Deserialize)]
struct GraphErrorBody {
    error: Option<GraphErrorDto>,
}

#[derive(Debug, Deserialize)]
struct GraphErrorDto {
    message: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Page<T> {
    #[serde(default = "Vec::new")]
    data: Vec<T>,
    paging: Option<Paging>,
}

#[derive(Debug, Deserialize)]
struct Paging {
    next: Option<String>,
}

#[derive(Debug, Deserialize)]
struct AdDto {
    id: String,
    #[serde(default)]
    name: String,
    #[serde(default)]
    adset_id: String,
    #[serde(default)]
    campaign_id: String,
    #[serde(default)]
    status: String,
    #[serde(default)]
    effective_status: String,
}

impl AdDto {
    fn into_unit(self) -> AdUnit {
        AdUnit {
            id: self.id,
            name: self.name,
            adset_id: self.adset_id,
            campaign_id: self.campaign_id,
            status: self.status,
            effective_status: self.effective_status,
        }
    }
}

#[derive(Debug, Deserialize)]
struct InsightsDto {
    impressions: Option<String>,
    clicks: Option<String>,
    spend: Option<String>,
    ctr: Option<String>,
    cpc: Option<String>,
    #[serde(default)]
    actions: Vec<ActionDto>,
    #[serde(default)]
    action_values: Vec<ActionDto>,
}

impl InsightsDto {
    fn into_row(self) -> InsightsRow {
        InsightsRow {
            impressions: parse_count(self.impressions.as_deref()),
            clicks: parse_count(self.clicks.as_deref()),
            spend: parse_amount(self.spend.as_deref()),
            ctr: parse_amount(self.ctr.as_deref()),
            cpc: parse_amount(self.cpc.as_deref()),
            actions: self
                .actions
                .into_iter()
                .map(|a| ActionCount {
                    value: parse_count(a.value.as_deref()),
                    action_type: a.action_type,
                })
                .collect(),
            action_values: self
                .action_values
                .into_iter()
                .map(|a| ActionValue {
                    value: parse_amount(a.value.as_deref()),
                    action_type: a.action_type,
                })
                .collect(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct ActionDto {
    action_type: String,
    value: Option<String>,
}

#[derive(Debug, Deserialize)]
struct AdSetDto {
    id: String,
    #[serde(default)]
    name: String,
    daily_budget: Option<String>,
    lifetime_budget: Option<String>,
}

impl AdSetDto {
    fn into_group(self) -> BudgetGroup {
        BudgetGroup {
            id: self.id,
            name: self.name,
            daily_budget: parse_count(self.daily_budget.as_deref()),
            lifetime_budget: parse_count(self.lifetime_budget.as_deref()),
        }
    }
}

fn parse_count(value: Option<&str>) -> u64 {
    value.and_then(|s| s.parse().ok()).unwrap_or(0)
}

fn parse_amount(value: Option<&str>) -> f64 {
    value.and_then(|s| s.parse().ok()).unwrap_or(0.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::Matcher;

    fn test_client(server: &mockito::ServerGuard) -> GraphClient {
        GraphClient::new(GraphConfig {
            api_base: server.url(),
            access_token: "test-token".to_string(),
            account_id: "123".to_string(),
            read_retries: 2,
            retry_initial_backoff: Duration::from_millis(5),
            ..GraphConfig::default()
        })
        .unwrap()
    }

    #[tokio::test]
    async fn test_list_active_units_parses_page() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/v21.0/act_123/ads")
            .match_query(Matcher::Any)
            .with_status(200)
            .with_body(
                r#"{"data":[{"id":"ad1","name":"Summer sale","adset_id":"as1","campaign_id":"c1","status":"ACTIVE","effective_status":"ACTIVE"}]}"#,
            )
            .create_async()
            .await;

        let client = test_client(&server);
        let units = client.list_active_units().await.unwrap();

        mock.assert_async().await;
        assert_eq!(units.len(), 1);
        assert_eq!(units[0].id, "ad1");
        assert_eq!(units[0].name, "Summer sale");
        assert_eq!(units[0].adset_id, "as1");
        assert_eq!(units[0].effective_status, "ACTIVE");
    }

    #[tokio::test]
    async fn test_insights_parses_string_numerics() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/v21.0/ad1/insights")
            .match_query(Matcher::Any)
            .with_status(200)
            .with_body(
                r#"{"data":[{"impressions":"2000","clicks":"40","spend":"8000","ctr":"2.0","cpc":"200","actions":[{"action_type":"purchase","value":"4"},{"action_type":"link_click","value":"40"}],"action_values":[{"action_type":"purchase","value":"40000"}]}]}"#,
            )
            .create_async()
            .await;

        let client = test_client(&server);
        let row = client
            .get_insights("ad1", InsightsWindow::Today)
            .await
            .unwrap();

        assert_eq!(row.impressions, 2000);
        assert_eq!(row.clicks, 40);
        assert_eq!(row.spend, 8000.0);
        assert_eq!(row.ctr, 2.0);
        assert_eq!(row.actions.len(), 2);
        assert_eq!(row.action_values[0].value, 40_000.0);
    }

    #[tokio::test]
    async fn test_insights_empty_data_is_metrics_unavailable() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/v21.0/ad9/insights")
            .match_query(Matcher::Any)
            .with_status(200)
            .with_body(r#"{"data":[]}"#)
            .create_async()
            .await;

        let client = test_client(&server);
        let err = client
            .get_insights("ad9", InsightsWindow::Today)
            .await
            .unwrap_err();

        assert!(err.is_metrics_unavailable());
    }

    #[tokio::test]
    async fn test_budget_group_parses_string_budgets() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/v21.0/as1")
            .match_query(Matcher::Any)
            .with_status(200)
            .with_body(
                r#"{"id":"as1","name":"Prospecting","daily_budget":"10000","lifetime_budget":"0"}"#,
            )
            .create_async()
            .await;

        let client = test_client(&server);
        let group = client.get_budget_group("as1").await.unwrap();

        assert_eq!(group.daily_budget, 10_000);
        assert_eq!(group.lifetime_budget, 0);
        assert_eq!(
            group.active_budget(),
            Some((BudgetField::Daily, 10_000))
        );
    }

    #[tokio::test]
    async fn test_set_status_posts_paused() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/v21.0/ad1")
            .match_query(Matcher::Any)
            .match_body(Matcher::UrlEncoded("status".into(), "PAUSED".into()))
            .with_status(200)
            .with_body(r#"{"success":true}"#)
            .expect(1)
            .create_async()
            .await;

        let client = test_client(&server);
        client.set_status("ad1", UnitStatus::Paused).await.unwrap();

        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_set_budget_writes_requested_field() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/v21.0/as1")
            .match_query(Matcher::Any)
            .match_body(Matcher::UrlEncoded(
                "lifetime_budget".into(),
                "75000".into(),
            ))
            .with_status(200)
            .with_body(r#"{"success":true}"#)
            .expect(1)
            .create_async()
            .await;

        let client = test_client(&server);
        client
            .set_budget("as1", BudgetField::Lifetime, 75_000)
            .await
            .unwrap();

        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_reads_retry_on_server_error() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/v21.0/act_123/ads")
            .match_query(Matcher::Any)
            .with_status(500)
            .with_body(r#"{"error":{"message":"transient"}}"#)
            .expect(3)
            .create_async()
            .await;

        let client = test_client(&server);
        let err = client.list_active_units().await.unwrap_err();

        mock.assert_async().await;
        assert!(err.to_string().contains("transient"));
    }

    #[tokio::test]
    async fn test_client_error_is_not_retried() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/v21.0/act_123/ads")
            .match_query(Matcher::Any)
            .with_status(400)
            .with_body(r#"{"error":{"message":"Invalid OAuth access token","type":"OAuthException","code":190}}"#)
            .expect(1)
            .create_async()
            .await;

        let client = test_client(&server);
        let err = client.list_active_units().await.unwrap_err();

        mock.assert_async().await;
        assert!(err.to_string().contains("Invalid OAuth access token"));
    }

    #[test]
    fn test_graph_error_message_fallback() {
        assert_eq!(graph_error_message("not json"), "not json");
        assert_eq!(
            graph_error_message(r#"{"error":{"message":"boom"}}"#),
            "boom"
        );
    }

    #[test]
    fn test_lenient_numeric_parsing() {
        assert_eq!(parse_count(Some("42")), 42);
        assert_eq!(parse_count(Some("")), 0);
        assert_eq!(parse_count(None), 0);
        assert_eq!(parse_amount(Some("1.5")), 1.5);
        assert_eq!(parse_amount(Some("garbage")), 0.0);
    }
}

use reqwest::Client;
use serde::Deserialize;
use serde_json::Value;
use std::time::Duration;
use tracing::{instrument, warn};

use super::base::PageSource;
use crate::config::SearchConfig;
use crate::error::{Result, ScoutError};
use crate::types::{QueryPlan, RawRecord, SourceKind};

/// Free-text places search endpoint used for keyword plans
pub struct PlacesSearchSource {
    client: Client,
    endpoint: String,
    api_key: Option<String>,
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    results: Vec<Value>,
}

impl PlacesSearchSource {
    pub fn new(endpoint: &str, api_key: Option<String>, timeout: Duration) -> Result<Self> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            endpoint: endpoint.to_string(),
            api_key,
        })
    }

    /// Build from configuration, reading the API key from the named environment variable
    pub fn from_config(config: &SearchConfig) -> Result<Self> {
        let api_key = match &config.api_key_env {
            Some(var) => match std::env::var(var) {
                Ok(key) => Some(key),
                Err(_) => {
                    warn!(var = %var, "Search API key variable not set, querying without a key");
                    None
                }
            },
            None => None,
        };
        Self::new(
            &config.endpoint,
            api_key,
            Duration::from_secs(config.request_timeout_secs),
        )
    }

    /// Free-text query: keyword followed by the jurisdiction
    pub fn query_text(plan: &QueryPlan) -> String {
        let mut query = plan.value.trim().to_string();
        if let Some(city) = &plan.jurisdiction.city {
            query.push(' ');
            query.push_str(city);
        }
        query.push(' ');
        query.push_str(&plan.jurisdiction.state);
        query
    }

    pub fn parse_response(body: &str) -> Result<Vec<RawRecord>> {
        let response: SearchResponse = serde_json::from_str(body)?;
        Ok(response
            .results
            .into_iter()
            .filter(Value::is_object)
            .map(|payload| RawRecord::new(SourceKind::Search, payload))
            .collect())
    }
}

#[async_trait::async_trait]
impl PageSource for PlacesSearchSource {
    fn source_kind(&self) -> SourceKind {
        SourceKind::Search
    }

    #[instrument(skip(self, plan), fields(plan = %plan.label()))]
    async fn fetch(&self, plan: &QueryPlan, offset: u32, limit: u32) -> Result<Vec<RawRecord>> {
        let mut request = self.client.get(&self.endpoint).query(&[
            ("q", Self::query_text(plan)),
            ("offset", offset.to_string()),
            ("limit", limit.to_string()),
        ]);
        if let Some(key) = &self.api_key {
            request = request.header("X-Api-Key", key);
        }

        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(ScoutError::api(format!("search returned HTTP {}", status)));
        }
        let body = response.text().await?;
        Self::parse_response(&body)
    }
}

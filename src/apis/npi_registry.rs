use reqwest::Client;
use serde::Deserialize;
use serde_json::Value;
use std::time::Duration;
use tracing::{debug, instrument};

use super::base::PageSource;
use crate::constants::NPI_API_VERSION;
use crate::error::{Result, ScoutError};
use crate::types::{QueryPlan, RawRecord, SourceKind, StrategyKind};

const USER_AGENT: &str = concat!("provider_scout/", env!("CARGO_PKG_VERSION"));

/// NPPES NPI Registry search API
pub struct NpiRegistrySource {
    client: Client,
    base_url: String,
}

#[derive(Debug, Deserialize)]
struct NpiResponse {
    #[serde(default)]
    results: Vec<Value>,
    #[serde(rename = "Errors", default)]
    errors: Vec<NpiError>,
}

#[derive(Debug, Deserialize)]
struct NpiError {
    #[serde(default)]
    description: String,
    #[serde(default)]
    field: Option<String>,
}

impl NpiRegistrySource {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(USER_AGENT)
            .build()?;
        Ok(Self {
            client,
            base_url: base_url.to_string(),
        })
    }

    /// Registry query parameters for one page of a plan
    pub fn query_params(plan: &QueryPlan, offset: u32, limit: u32) -> Vec<(&'static str, String)> {
        let mut params = vec![
            ("version", NPI_API_VERSION.to_string()),
            ("state", plan.jurisdiction.state.clone()),
        ];

        // A postal code is narrower than the city, so the city is left out
        if plan.kind != StrategyKind::Postal {
            if let Some(city) = &plan.jurisdiction.city {
                params.push(("city", city.clone()));
            }
        }

        match plan.kind {
            StrategyKind::Taxonomy => {
                params.push(("taxonomy_description", plan.value.clone()));
            }
            StrategyKind::Keyword => {
                params.push(("enumeration_type", "NPI-2".to_string()));
                params.push(("organization_name", wildcard(&plan.value)));
            }
            StrategyKind::Postal => {
                params.push(("postal_code", plan.value.clone()));
            }
            StrategyKind::OfficialName => {
                params.push(("enumeration_type", "NPI-2".to_string()));
                params.push(("last_name", plan.value.clone()));
            }
        }

        params.push(("limit", limit.to_string()));
        params.push(("skip", offset.to_string()));
        params
    }

    /// Parse a registry response body into raw records
    pub fn parse_response(body: &str) -> Result<Vec<RawRecord>> {
        let response: NpiResponse = serde_json::from_str(body)?;
        if let Some(first) = response.errors.first() {
            return Err(ScoutError::api(format!(
                "registry rejected query: {} (field: {})",
                first.description,
                first.field.as_deref().unwrap_or("-")
            )));
        }
        Ok(response
            .results
            .into_iter()
            .map(|payload| RawRecord::new(SourceKind::Registry, payload))
            .collect())
    }
}

/// The registry only supports trailing wildcards
fn wildcard(value: &str) -> String {
    let trimmed = value.trim().trim_end_matches('*');
    format!("{}*", trimmed)
}

#[async_trait::async_trait]
impl PageSource for NpiRegistrySource {
    fn source_kind(&self) -> SourceKind {
        SourceKind::Registry
    }

    #[instrument(skip(self, plan), fields(plan = %plan.label()))]
    async fn fetch(&self, plan: &QueryPlan, offset: u32, limit: u32) -> Result<Vec<RawRecord>> {
        let params = Self::query_params(plan, offset, limit);
        let response = self.client.get(&self.base_url).query(&params).send().await?;

        let status = response.status();
        if !status.is_success() {
            return Err(ScoutError::api(format!("registry returned HTTP {}", status)));
        }

        let body = response.text().await?;
        let records = Self::parse_response(&body)?;
        debug!(offset, limit, records = records.len(), "Registry page parsed");
        Ok(records)
    }
}

//! Optional HTTP advisory service.
//!
//! Failures never leave this module as errors to the engine: the caller
//! gets [`Advice::Unavailable`] and a warning in the log.

use std::time::Duration;

use chrono::{DateTime, Utc};
use reqwest::Client;
use serde::{Deserialize, Serialize};

use crate::error::{EngineError, Result};
use crate::types::TradingPair;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Insights {
    pub recommendation: String,
    pub confidence: f64,
    pub reasoning: String,
    #[serde(default = "Utc::now")]
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Advice {
    Recommendation(Insights),
    Unavailable,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct AdviceRequest<'a> {
    market_data: &'a [TradingPair],
}

pub struct AdvisorClient {
    client: Client,
    endpoint: String,
}

impl AdvisorClient {
    pub fn new(endpoint: impl Into<String>, timeout: Duration) -> Result<Self> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            endpoint: endpoint.into(),
        })
    }

    pub async fn request_insights(&self, pairs: &[TradingPair]) -> Result<Insights> {
        let response = self
            .client
            .post(&self.endpoint)
            .json(&AdviceRequest { market_data: pairs })
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(EngineError::Advisor(format!("advisor returned {}", status)));
        }

        let insights: Insights = response.json().await?;
        if !(0.0..=100.0).contains(&insights.confidence) {
            return Err(EngineError::Advisor(format!(
                "confidence out of range: {}",
                insights.confidence
            )));
        }
        Ok(insights)
    }
}

pub async fn recommend(client: Option<&AdvisorClient>, pairs: &[TradingPair]) -> Advice {
    let Some(client) = client else {
        return Advice::Unavailable;
    };
    match client.request_insights(pairs).await {
        Ok(insights) => Advice::Recommendation(insights),
        Err(e) => {
            log::warn!("no recommendation available: {}", e);
            Advice::Unavailable
        }
    }
}

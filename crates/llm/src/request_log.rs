//! The per-call audit row (§3.1 `LLMRequestLog`) and its append-only sink. Every
//! `generate_content` call appends one row regardless of success or failure, so this is
//! kept separate from [`crate::client::LlmClient`] rather than folded into its return type.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::RwLock;
use uuid::Uuid;

use crate::Provider;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmRequestLog {
    pub request_id: Uuid,
    pub operation: String,
    pub provider: String,
    pub model: String,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub duration_ms: i64,
    pub status_code: Option<u16>,
    pub prompt: Option<String>,
    pub system_instruction: Option<String>,
    pub raw_request_json: serde_json::Value,
    pub raw_response_json: Option<serde_json::Value>,
    pub generated_text: Option<String>,
    pub input_tokens: u32,
    pub output_tokens: u32,
    pub cached_content_token_count: u32,
    pub thinking_tokens: u32,
    pub total_tokens: u32,
    pub total_cost: f64,
    pub turn_id: Option<Uuid>,
}

impl LlmRequestLog {
    pub fn duration(start: DateTime<Utc>, end: DateTime<Utc>) -> i64 {
        (end - start).num_milliseconds()
    }
}

pub trait RequestLogSink: Send + Sync {
    fn append(&self, entry: LlmRequestLog);
    fn all(&self) -> Vec<LlmRequestLog>;
}

#[derive(Debug, Default)]
pub struct InMemoryRequestLogSink {
    entries: RwLock<Vec<LlmRequestLog>>,
}

impl InMemoryRequestLogSink {
    pub fn new() -> Self {
        Self::default()
    }
}

impl RequestLogSink for InMemoryRequestLogSink {
    fn append(&self, entry: LlmRequestLog) {
        self.entries.write().unwrap().push(entry);
    }

    fn all(&self) -> Vec<LlmRequestLog> {
        self.entries.read().unwrap().clone()
    }
}

/// Flat per-million-token price table, in dollars. Only the two providers the request
/// builder targets are priced; an unknown model falls back to the provider's cheapest tier
/// rather than failing the call, since a missing price must never block persistence of an
/// otherwise-successful turn.
fn price_per_million(provider: Provider, model: &str) -> (f64, f64) {
    match (provider, model) {
        (Provider::Gemini, m) if m.contains("flash") => (0.30, 2.50),
        (Provider::Gemini, _) => (1.25, 10.00),
        (Provider::Claude, m) if m.contains("haiku") => (1.00, 5.00),
        (Provider::Claude, m) if m.contains("opus") => (15.00, 75.00),
        (Provider::Claude, _) => (3.00, 15.00),
    }
}

pub fn compute_cost(provider: Provider, model: &str, input_tokens: u32, output_tokens: u32) -> f64 {
    let (input_price, output_price) = price_per_million(provider, model);
    let input_cost = (input_tokens as f64 / 1_000_000.0) * input_price;
    let output_cost = (output_tokens as f64 / 1_000_000.0) * output_price;
    input_cost + output_cost
}

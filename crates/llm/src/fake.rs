//! A scripted [`crate::LlmClient`] for tests, standing in for the out-of-scope transport.

use std::collections::VecDeque;
use std::sync::Mutex;

use anyhow::Result;
use async_trait::async_trait;
use loom_config::CancelToken;
use uuid::Uuid;

use crate::client::{GenerateOutcome, LlmClient, ProviderRequest};

/// Returns queued responses in order, looping the last one once the queue is drained.
/// Embeddings are deterministic hashes of the input text so cosine-similarity tests over
/// them are reproducible without wiring up a real embedding model.
pub struct FakeLlmClient {
    responses: Mutex<VecDeque<String>>,
}

impl FakeLlmClient {
    pub fn with_responses(responses: Vec<String>) -> Self {
        Self {
            responses: Mutex::new(responses.into_iter().collect()),
        }
    }

    fn next_response(&self) -> String {
        let mut queue = self.responses.lock().unwrap();
        match queue.pop_front() {
            Some(text) => {
                if queue.is_empty() {
                    queue.push_back(text.clone());
                }
                text
            }
            None => String::new(),
        }
    }
}

#[async_trait]
impl LlmClient for FakeLlmClient {
    async fn generate_content(
        &self,
        _request: ProviderRequest,
        _technical: bool,
        _turn_id: Option<Uuid>,
        cancel: &CancelToken,
    ) -> Result<GenerateOutcome> {
        if cancel.is_cancelled() {
            anyhow::bail!("generation cancelled");
        }
        let text = self.next_response();
        Ok(GenerateOutcome { success: !text.is_empty(), text })
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        Ok(texts.iter().map(|text| deterministic_embedding(text)).collect())
    }

    async fn count_tokens(&self, text: &str) -> Result<usize> {
        Ok(text.split_whitespace().count())
    }
}

fn deterministic_embedding(text: &str) -> Vec<f32> {
    let mut vector = vec![0.0_f32; 8];
    for (i, byte) in text.bytes().enumerate() {
        vector[i % 8] += byte as f32;
    }
    let norm: f32 = vector.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm > 0.0 {
        for value in vector.iter_mut() {
            *value /= norm;
        }
    }
    vector
}

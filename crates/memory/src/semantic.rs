//! The Semantic Retriever (§4.4): query transformation, batch-size-1 embedding, per-type
//! vector search, and per-type token-budget selection. Failures at any step are logged and
//! yield an empty map rather than failing the pipeline.

use std::collections::HashMap;

use loom_config::{CancelToken, Settings};
use loom_llm::{LlmClient, Provider};
use loom_thinker::transform_query;
use loom_tools::VectorStore;
use tracing::warn;
use uuid::Uuid;

use crate::entities::{Availability, ContextData, ContextDataType};
use crate::relational::RelationalStore;

const SEMANTIC_TYPES: [ContextDataType; 4] = [
    ContextDataType::Quote,
    ContextDataType::PersonaVoiceSample,
    ContextDataType::Memory,
    ContextDataType::Insight,
];

fn search_k(data_type: ContextDataType, k_base: usize, quote_search_k_factor: usize) -> usize {
    match data_type {
        ContextDataType::Quote | ContextDataType::PersonaVoiceSample => k_base * quote_search_k_factor,
        _ => k_base,
    }
}

/// Token-budget selection over ranked candidates (already sorted descending by similarity):
/// includes an item iff its known `token_count` fits the remaining budget, or the accumulator
/// is still zero (so the top-ranked item is always included when any candidate exists).
/// Stops at the first item that doesn't fit.
fn select_within_budget(ranked: Vec<ContextData>, budget: i64) -> Vec<ContextData> {
    if budget <= 0 {
        return Vec::new();
    }

    let mut accumulated: i64 = 0;
    let mut selected = Vec::new();

    for item in ranked {
        let Some(token_count) = item.token_count else { break };
        let token_count = token_count as i64;
        if token_count == 0 {
            break;
        }

        if accumulated == 0 || accumulated + token_count <= budget {
            accumulated += token_count;
            selected.push(item);
        } else {
            break;
        }
    }

    selected
}

#[allow(clippy::too_many_arguments)]
pub async fn retrieve<S: VectorStore>(
    relational: &dyn RelationalStore,
    vectors: &loom_tools::VectorCollectionManager<S>,
    llm: &dyn LlmClient,
    provider: Provider,
    settings: &Settings<'_>,
    profile_id: Uuid,
    input: &str,
    context_window: &str,
    k_base: usize,
    quote_search_k_factor: usize,
    cancel: &CancelToken,
) -> HashMap<ContextDataType, Vec<ContextData>> {
    let mut results = HashMap::new();

    let query = if settings.semantic_use_llm_query_transformation() {
        match transform_query(llm, provider, &settings.technical_model(), input, context_window, cancel).await {
            Ok(query) => query,
            Err(err) => {
                warn!(error = %err, "query transformation failed, falling back to raw input");
                input.to_string()
            }
        }
    } else {
        input.to_string()
    };

    let embedding = match llm.embed_batch(&[query]).await {
        Ok(mut batch) if !batch.is_empty() => batch.remove(0),
        Ok(_) => {
            warn!("embedding call returned no vectors");
            return results;
        }
        Err(err) => {
            warn!(error = %err, "embedding call failed, semantic retrieval disabled for this turn");
            return results;
        }
    };

    for data_type in SEMANTIC_TYPES {
        let budget = settings.semantic_token_quota(data_type.as_str());
        if budget <= 0 {
            continue;
        }

        let k = search_k(data_type, k_base, quote_search_k_factor);
        let hits = match vectors.search(data_type.as_str(), &embedding, k).await {
            Ok(hits) => hits,
            Err(err) => {
                warn!(error = %err, data_type = data_type.as_str(), "vector search failed");
                continue;
            }
        };

        let mut ranked = Vec::new();
        for hit in hits {
            match relational.get_context_data(hit.id).await {
                Ok(Some(item)) if item.is_enabled && !item.is_archived && item.profile_id == profile_id && item.availability == Availability::Semantic => {
                    ranked.push(item);
                }
                Ok(_) => {}
                Err(err) => warn!(error = %err, id = %hit.id, "failed to load semantic candidate"),
            }
        }

        let selected = select_within_budget(ranked, budget);
        if !selected.is_empty() {
            results.insert(data_type, selected);
        }
    }

    results
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entities::ContextData;

    fn candidate(token_count: u32) -> ContextData {
        let mut item = ContextData::new(Uuid::new_v4(), "quote", "content", ContextDataType::Quote, Availability::Semantic);
        item.token_count = Some(token_count);
        item.in_vector_db = true;
        item
    }

    #[test]
    fn budget_enforcement_includes_top_ranked_and_excludes_overflow() {
        let ranked = vec![candidate(1500), candidate(1500), candidate(1000)];
        let selected = select_within_budget(ranked, 3000);
        assert_eq!(selected.len(), 2);
    }

    #[test]
    fn always_includes_at_least_one_item_even_over_budget() {
        let ranked = vec![candidate(5000)];
        let selected = select_within_budget(ranked, 100);
        assert_eq!(selected.len(), 1);
    }

    #[test]
    fn zero_budget_selects_nothing() {
        let ranked = vec![candidate(10)];
        let selected = select_within_budget(ranked, 0);
        assert!(selected.is_empty());
    }

    #[test]
    fn unknown_token_count_stops_selection() {
        let mut unknown = candidate(0);
        unknown.token_count = None;
        let ranked = vec![unknown, candidate(100)];
        let selected = select_within_budget(ranked, 1000);
        assert!(selected.is_empty());
    }
}

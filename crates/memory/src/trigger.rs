//! The Trigger Matcher (§4.3): keyword scan over recent turn inputs plus the current input.

use chrono::Utc;

use crate::entities::{ContextData, Turn};

const DEFAULT_LOOKBACK_TURNS: u32 = 3;
const DEFAULT_MIN_MATCH_COUNT: u32 = 1;

fn is_word_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_'
}

/// `true` iff `needle` occurs in `haystack` (both already lowercased) bounded by non-word
/// characters on both sides, so `"sun"` matches `"the sun is out"` but not `"sunny day"`.
fn contains_word_boundary(haystack: &str, needle: &str) -> bool {
    if needle.is_empty() {
        return false;
    }

    let haystack_bytes = haystack.as_bytes();
    let needle_len = needle.len();
    let mut search_from = 0;

    while let Some(relative_offset) = haystack[search_from..].find(needle) {
        let start = search_from + relative_offset;
        let end = start + needle_len;

        let before_ok = start == 0 || !is_word_char(haystack_bytes[start - 1] as char);
        let after_ok = end >= haystack_bytes.len() || !is_word_char(haystack_bytes[end] as char);

        if before_ok && after_ok {
            return true;
        }
        search_from = start + 1;
        if search_from >= haystack.len() {
            break;
        }
    }
    false
}

fn scan_text(recent_inputs: &[String], current_input: &str, additional_words: &str) -> String {
    let mut joined = recent_inputs.join(" ");
    joined.push(' ');
    joined.push_str(current_input);
    if !additional_words.is_empty() {
        joined.push(' ');
        joined.push_str(additional_words);
    }
    joined.to_lowercase()
}

fn distinct_keyword_matches(keywords_csv: &str, text: &str) -> u32 {
    keywords_csv
        .split(',')
        .map(|k| k.trim().to_lowercase())
        .filter(|k| !k.is_empty())
        .filter(|k| contains_word_boundary(text, k))
        .count() as u32
}

/// Evaluates every `Trigger` entry against the scan window. Qualifying entries have
/// `trigger_count` incremented and `last_triggered_at` set; the returned vector contains only
/// the entries that qualified (already mutated), ready for the caller to persist and add to
/// state.
pub fn match_triggers(
    triggers: &[ContextData],
    recent_turns: &[Turn],
    current_input: &str,
    additional_words: &str,
) -> Vec<ContextData> {
    let mut qualified = Vec::new();

    for trigger in triggers {
        let Some(keywords) = trigger.trigger_keywords.as_deref() else { continue };
        let lookback = trigger.trigger_lookback_turns.unwrap_or(DEFAULT_LOOKBACK_TURNS) as usize;
        let min_match = trigger.trigger_min_match_count.unwrap_or(DEFAULT_MIN_MATCH_COUNT);

        let recent_inputs: Vec<String> = recent_turns
            .iter()
            .rev()
            .take(lookback)
            .map(|t| t.input.clone())
            .collect();

        let text = scan_text(&recent_inputs, current_input, additional_words);
        let matches = distinct_keyword_matches(keywords, &text);

        if matches >= min_match {
            let mut hit = trigger.clone();
            hit.trigger_count += 1;
            hit.last_triggered_at = Some(Utc::now());
            qualified.push(hit);
        }
    }

    qualified
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entities::{Availability, ContextDataType};
    use uuid::Uuid;

    fn memory_trigger(keywords: &str) -> ContextData {
        let mut item = ContextData::new(Uuid::new_v4(), "trigger", "content", ContextDataType::Memory, Availability::Trigger);
        item.trigger_keywords = Some(keywords.to_string());
        item
    }

    #[test]
    fn qualifies_on_single_keyword_match() {
        let trigger = memory_trigger("rain,sun");
        let turns = vec![];
        let qualified = match_triggers(&[trigger.clone()], &turns, "The sun is out today", "");
        assert_eq!(qualified.len(), 1);
        assert_eq!(qualified[0].trigger_count, 1);
        assert!(qualified[0].last_triggered_at.is_some());
    }

    #[test]
    fn does_not_match_substring_inside_another_word() {
        let trigger = memory_trigger("sun");
        let turns = vec![];
        let qualified = match_triggers(&[trigger], &turns, "a sunny afternoon", "");
        assert!(qualified.is_empty());
    }

    #[test]
    fn requires_min_match_count() {
        let mut trigger = memory_trigger("rain,sun,wind");
        trigger.trigger_min_match_count = Some(2);
        let turns = vec![];
        let qualified = match_triggers(&[trigger], &turns, "it is sunny today", "");
        assert!(qualified.is_empty());

        let mut trigger = memory_trigger("rain,sun,wind");
        trigger.trigger_min_match_count = Some(2);
        let qualified = match_triggers(&[trigger], &turns, "rain and sun together", "");
        assert_eq!(qualified.len(), 1);
    }

    #[test]
    fn scans_lookback_turns() {
        let trigger = memory_trigger("eclipse");
        let mut old_turn = Turn::new(Uuid::new_v4(), "did you see the eclipse");
        old_turn.created_at = Utc::now();
        let turns = vec![old_turn];
        let qualified = match_triggers(&[trigger], &turns, "anything new?", "");
        assert_eq!(qualified.len(), 1);
    }
}

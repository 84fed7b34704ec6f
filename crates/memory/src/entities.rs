//! The entities of §3.1, scoped to a `Profile`. Grounded on the shape of the teacher's
//! `schema::MemoryEntry` (plain `Serialize`/`Deserialize` structs, a `Uuid` id, a
//! `chrono::DateTime<Utc>` timestamp) generalized from one entity to the full entity set the
//! pipeline needs.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Profile {
    pub id: Uuid,
    pub name: String,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub last_activated_at: Option<DateTime<Utc>>,
}

impl Profile {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            is_active: false,
            created_at: Utc::now(),
            last_activated_at: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    pub id: Uuid,
    pub number: u32,
    pub name: String,
    pub is_active: bool,
    pub profile_id: Uuid,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Turn {
    pub id: Uuid,
    pub session_id: Uuid,
    pub input: String,
    pub json_input: String,
    pub response: String,
    pub stripped_turn: String,
    pub display_response: String,
    pub accepted: bool,
    pub created_at: DateTime<Utc>,
}

impl Turn {
    pub fn new(session_id: Uuid, input: impl Into<String>) -> Self {
        let input = input.into();
        Self {
            id: Uuid::new_v4(),
            session_id,
            json_input: input.clone(),
            input,
            response: String::new(),
            stripped_turn: String::new(),
            display_response: String::new(),
            accepted: true,
            created_at: Utc::now(),
        }
    }

    /// Splits `response` at the first occurrence of `separator`, keeping only the portion
    /// before it as the user-visible text. The full `response` (including anything after the
    /// separator) is preserved for `strippedTurn`/auditing.
    pub fn compute_display_response(&mut self, separator: &str) {
        self.display_response = match self.response.split_once(separator) {
            Some((visible, _)) => visible.to_string(),
            None => self.response.clone(),
        };
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SystemMessageType {
    Persona,
    Perception,
    Technical,
    ContextFile,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SystemMessage {
    pub id: Uuid,
    pub name: String,
    pub content: String,
    pub message_type: SystemMessageType,
    pub is_active: bool,
    pub is_archived: bool,
    pub version: u32,
    pub parent_id: Option<Uuid>,
    pub attached_to_personas: Vec<Uuid>,
    pub attached_to_perceptions: Vec<Uuid>,
    pub is_user_profile: bool,
    pub profile_id: Uuid,
}

impl SystemMessage {
    pub fn new(profile_id: Uuid, name: impl Into<String>, content: impl Into<String>, message_type: SystemMessageType) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            content: content.into(),
            message_type,
            is_active: true,
            is_archived: false,
            version: 1,
            parent_id: None,
            attached_to_personas: Vec::new(),
            attached_to_perceptions: Vec::new(),
            is_user_profile: false,
            profile_id,
        }
    }

    /// The root id of this row's version family: itself if it has no parent.
    pub fn family_root(&self) -> Uuid {
        self.parent_id.unwrap_or(self.id)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ContextDataType {
    Quote,
    PersonaVoiceSample,
    Memory,
    Insight,
    CharacterProfile,
    Generic,
}

impl ContextDataType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ContextDataType::Quote => "Quote",
            ContextDataType::PersonaVoiceSample => "PersonaVoiceSample",
            ContextDataType::Memory => "Memory",
            ContextDataType::Insight => "Insight",
            ContextDataType::CharacterProfile => "CharacterProfile",
            ContextDataType::Generic => "Generic",
        }
    }

    pub fn supports_manual(&self) -> bool {
        !matches!(self, ContextDataType::PersonaVoiceSample)
    }

    pub fn supports_semantic(&self) -> bool {
        matches!(
            self,
            ContextDataType::Quote | ContextDataType::PersonaVoiceSample | ContextDataType::Memory | ContextDataType::Insight
        )
    }

    pub fn supports_trigger(&self) -> bool {
        matches!(
            self,
            ContextDataType::Memory | ContextDataType::Insight | ContextDataType::CharacterProfile | ContextDataType::Generic
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Availability {
    AlwaysOn,
    Manual,
    Semantic,
    Trigger,
    Archive,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContextData {
    pub id: Uuid,
    pub profile_id: Uuid,
    pub name: String,
    pub content: String,
    pub data_type: ContextDataType,
    pub availability: Availability,
    pub token_count: Option<u32>,
    pub token_count_updated_at: Option<DateTime<Utc>>,
    pub is_enabled: bool,
    pub is_archived: bool,
    pub sort_order: i32,

    // Trigger fields.
    pub trigger_keywords: Option<String>,
    pub trigger_lookback_turns: Option<u32>,
    pub trigger_min_match_count: Option<u32>,
    pub trigger_count: u32,
    pub last_triggered_at: Option<DateTime<Utc>>,

    // Manual override fields.
    pub use_next_turn_only: bool,
    pub use_every_turn: bool,
    pub previous_availability: Option<Availability>,

    // Semantic bookkeeping.
    pub in_vector_db: bool,
    pub tags: Vec<String>,
    pub relevance_score: f32,

    // Source pointers.
    pub source_session_id: Option<Uuid>,
    pub speaker: Option<String>,
    pub path: Option<String>,
    pub nonverbal_behavior: Option<String>,

    pub is_user: bool,
}

impl ContextData {
    pub fn new(profile_id: Uuid, name: impl Into<String>, content: impl Into<String>, data_type: ContextDataType, availability: Availability) -> Self {
        Self {
            id: Uuid::new_v4(),
            profile_id,
            name: name.into(),
            content: content.into(),
            data_type,
            availability,
            token_count: None,
            token_count_updated_at: None,
            is_enabled: true,
            is_archived: false,
            sort_order: 0,
            trigger_keywords: None,
            trigger_lookback_turns: None,
            trigger_min_match_count: None,
            trigger_count: 0,
            last_triggered_at: None,
            use_next_turn_only: false,
            use_every_turn: false,
            previous_availability: None,
            in_vector_db: false,
            tags: Vec::new(),
            relevance_score: 0.0,
            source_session_id: None,
            speaker: None,
            path: None,
            nonverbal_behavior: None,
            is_user: false,
        }
    }

    /// `true` iff this entry was sourced from a live session rather than canon material.
    pub fn is_dynamic(&self) -> bool {
        self.source_session_id.is_some()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Flag {
    pub id: Uuid,
    pub profile_id: Uuid,
    pub value: String,
    pub active: bool,
    pub constant: bool,
    pub last_used_at: Option<DateTime<Utc>>,
}

impl Flag {
    pub fn new(profile_id: Uuid, value: impl Into<String>, constant: bool) -> Self {
        Self {
            id: Uuid::new_v4(),
            profile_id,
            value: value.into(),
            active: true,
            constant,
            last_used_at: None,
        }
    }
}

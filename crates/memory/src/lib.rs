//! Entities, the relational-store collaborator, and the three context-data retrieval
//! components (§3, §4.1-§4.4): the Context Data Store and its availability matrix, the
//! manual-override state machine, the Trigger Matcher, and the Semantic Retriever.

pub mod context_store;
pub mod entities;
pub mod id_store;
pub mod manual_override;
pub mod queries;
pub mod relational;
pub mod semantic;
pub mod system_message;
pub mod trigger;

pub use context_store::{AvailabilityChangeOutcome, ContextDataStore};
pub use entities::{
    Availability, ContextData, ContextDataType, Flag, Profile, Session, SystemMessage, SystemMessageType, Turn,
};
pub use relational::{InMemoryRelationalStore, RelationalStore};
pub use system_message::{delete_system_message_family, update_system_message};

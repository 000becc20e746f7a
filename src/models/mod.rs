pub mod conflict;
pub mod fact;
pub mod record;
pub mod registry;
pub mod scene;

pub use conflict::{ConflictKey, ConflictKind, ConflictRecord, ConflictStatus};
pub use fact::{EntityFacts, ExtractedFact, Provenance};
pub use record::{DismissedConflict, EntityRecord, StoredAttribute, MANUAL_OVERRIDE_SCENE};
pub use registry::{EntityKind, LlmOptIn, Registry, RegistryEntry};
pub use scene::{split_front_matter, SceneDocument};

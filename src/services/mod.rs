pub mod classifier;
pub mod conflicts;
pub mod engine;
pub mod reconcile;
pub mod serializer;

pub use classifier::{
    AnthropicClassifier, AttributeClassifier, ClassifierEntity, ClassifierRequest, NoopClassifier,
};
pub use conflicts::{ConflictLog, MergeSummary};
pub use engine::{ContinuityEngine, CorpusReport, ScanFailure, ScanReport};
pub use reconcile::{reconcile, Change, ReconcileOutcome};
pub use serializer::EntityQueue;

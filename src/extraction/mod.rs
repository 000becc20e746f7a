//! Extraction pipeline: segmentation, resolution, pattern matching and the
//! two extraction tiers.

pub mod patterns;
pub mod resolver;
pub mod segmenter;
pub mod tier1;
pub mod tier2;

pub use resolver::resolve;
pub use segmenter::{split_paragraphs, Paragraph};
pub use tier1::{Tier1Extractor, Tier1Output};
pub use tier2::{merge_tier2, ClassifierResponse};

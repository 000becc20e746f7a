#![allow(dead_code)]

pub mod builders;
pub mod harness;

// Re-export commonly used test utilities
pub use builders::{scene, scene_at, standard_registry, RegistryBuilder};
pub use harness::{config_with_radius, memory_engine, TestHarness};

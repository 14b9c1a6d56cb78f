// src/analyze/mod.rs
//! AI situation report: result types, generator adapter, signature cache.

pub mod ai_adapter;
pub mod cache;
pub mod types;

pub use ai_adapter::{build_generator_from_config, AnalysisGenerator, GenerationError, GenerationRequest};
pub use cache::{AnalysisCache, AnalysisOutcome};
pub use types::{AnalysisResult, RiskLevel};

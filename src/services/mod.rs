// ContractLens Core Services
// Extraction, segmentation, rule-based annotation and optional enrichment

pub mod audit;
pub mod classifier;
pub mod config_store;
pub mod enrichment;
pub mod entities;
pub mod extraction;
pub mod pipeline;
pub mod providers;
pub mod risk;
pub mod rules;
pub mod segmenter;
pub mod text_processor;

pub use audit::{AuditError, AuditEvent, AuditSink, JsonlAuditSink, TracingAuditSink};
pub use classifier::ClauseClassifier;
pub use config_store::*;
pub use enrichment::{resolve_enricher, Enricher, EnrichmentError, LlmEnricher, OfflineEnricher};
pub use entities::EntityScanner;
pub use extraction::{ExtractionError, ExtractionStrategy, TextExtractor};
pub use pipeline::{ask, ContractPipeline, PipelineError};
pub use providers::{parse_provider, ProviderClient, ProviderError, ProviderKind};
pub use risk::RiskEvaluator;
pub use rules::{CompiledRules, RuleTables};
pub use segmenter::{BlockSplitter, ClauseSegmenter};

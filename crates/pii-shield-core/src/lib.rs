pub mod anonymizer;
pub mod config;
pub mod deanonymizer;
pub mod detection;
pub mod error;
pub mod mapping;
pub mod service;
pub mod token;

#[cfg(test)]
mod test_support;

#[cfg(test)]
pub mod integration_tests;

pub use anonymizer::{category_counts, AnonymizeResult, Anonymizer, DetectedItem};
pub use config::{
    Config, DetectionConfig, MappingConfig, ServerConfig, StoreBackend, StoreFailurePolicy,
    TokenMode, TokenizerConfig,
};
pub use deanonymizer::{Deanonymized, Deanonymizer};
pub use detection::{PatternRegistry, PiiCategory, RawMatch};
pub use error::PiiError;
pub use mapping::{
    open_store, MappingStatistics, MappingStore, MemoryMappingStore, SqliteMappingStore,
    TokenMapping,
};
pub use service::{AnonymizeResponse, DeanonymizeResponse, PiiService};
pub use token::{contains_tokens, distinct_tokens, parse_tokens, TokenCodec};

//! Facade wiring detection, tokens and storage from one `Config`

use crate::anonymizer::{AnonymizeResult, Anonymizer, DetectedItem};
use crate::config::{Config, StoreFailurePolicy};
use crate::deanonymizer::{Deanonymized, Deanonymizer};
use crate::detection::{PatternRegistry, RawMatch};
use crate::error::{PiiError, Result};
use crate::mapping::{open_store, MappingStatistics, MappingStore};
use crate::token::TokenCodec;
use serde::Serialize;
use std::sync::Arc;
use tracing::info;

#[derive(Clone)]
pub struct PiiService {
    anonymizer: Anonymizer,
    deanonymizer: Deanonymizer,
    store: Arc<dyn MappingStore>,
}

impl PiiService {
    /// Fails with `Configuration` when keyed mode has no secret.
    pub fn from_config(config: &Config) -> Result<Self> {
        let registry = PatternRegistry::from_config(&config.detection)?;
        let codec = TokenCodec::from_config(&config.tokenizer)?;
        let store = open_store(&config.mapping)?;

        info!(
            "PII service ready: {:?} tokens, {} store, order {:?}",
            codec.mode(),
            store.backend_name(),
            registry.order()
        );

        Ok(Self::new(
            registry,
            codec,
            store,
            config.mapping.on_store_failure,
        ))
    }

    pub fn new(
        registry: PatternRegistry,
        codec: TokenCodec,
        store: Arc<dyn MappingStore>,
        on_store_failure: StoreFailurePolicy,
    ) -> Self {
        Self {
            anonymizer: Anonymizer::new(registry, codec, store.clone(), on_store_failure),
            deanonymizer: Deanonymizer::new(store.clone()),
            store,
        }
    }

    pub fn anonymize(&self, text: &str) -> Result<AnonymizeResult> {
        self.anonymizer.anonymize(text)
    }

    pub fn deanonymize(&self, text: &str) -> Result<Deanonymized> {
        if text.is_empty() {
            return Err(PiiError::Validation("text must not be empty".to_string()));
        }
        self.deanonymizer.deanonymize(text)
    }

    /// Preview without tokenizing or writing anything.
    pub fn detect(&self, text: &str) -> Vec<RawMatch> {
        self.anonymizer.registry().detect(text)
    }

    pub fn statistics(&self) -> Result<MappingStatistics> {
        self.store.statistics()
    }

    /// Ends a volatile session; on the durable backend this purges the table.
    pub fn clear_mappings(&self) -> Result<usize> {
        self.store.clear()
    }

    pub fn store(&self) -> &Arc<dyn MappingStore> {
        &self.store
    }
}

/// Wire shape of an anonymize call. Errors are carried, never raised.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AnonymizeResponse {
    pub success: bool,
    pub anonymized_text: String,
    pub items: Vec<DetectedItem>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_kind: Option<&'static str>,
}

impl AnonymizeResponse {
    pub fn from_result(result: &Result<AnonymizeResult>) -> Self {
        match result {
            Ok(result) => Self {
                success: true,
                anonymized_text: result.anonymized_text.clone(),
                items: result.items.clone(),
                error: None,
                error_kind: None,
            },
            Err(e) => Self::failure(e),
        }
    }

    pub fn failure(err: &PiiError) -> Self {
        Self {
            success: false,
            anonymized_text: String::new(),
            items: Vec::new(),
            error: Some(err.to_string()),
            error_kind: Some(err.kind()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeanonymizeResponse {
    pub success: bool,
    pub text: String,
    pub tokens_processed: usize,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub unresolved: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_kind: Option<&'static str>,
}

impl DeanonymizeResponse {
    pub fn from_result(result: &Result<Deanonymized>) -> Self {
        match result {
            Ok(restored) => Self {
                success: true,
                text: restored.text.clone(),
                tokens_processed: restored.tokens_processed,
                unresolved: restored.unresolved.clone(),
                error: None,
                error_kind: None,
            },
            Err(e) => Self::failure(e),
        }
    }

    pub fn failure(err: &PiiError) -> Self {
        Self {
            success: false,
            text: String::new(),
            tokens_processed: 0,
            unresolved: Vec::new(),
            error: Some(err.to_string()),
            error_kind: Some(err.kind()),
        }
    }
}

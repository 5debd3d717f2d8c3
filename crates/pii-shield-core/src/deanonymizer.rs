//! Restores original values in place of tokens

use crate::error::Result;
use crate::mapping::MappingStore;
use crate::token::{distinct_tokens, replace_tokens};
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Deanonymized {
    pub text: String,
    /// Distinct tokens found in the input.
    pub tokens_processed: usize,
    /// Tokens with no stored mapping, left verbatim in `text`.
    pub unresolved: Vec<String>,
}

#[derive(Clone)]
pub struct Deanonymizer {
    store: Arc<dyn MappingStore>,
}

impl Deanonymizer {
    pub fn new(store: Arc<dyn MappingStore>) -> Self {
        Self { store }
    }

    /// Token-free text is returned as-is without touching the store. A
    /// missing mapping is a per-token miss; only a failing store is an error.
    pub fn deanonymize(&self, text: &str) -> Result<Deanonymized> {
        let tokens = distinct_tokens(text);
        if tokens.is_empty() {
            return Ok(Deanonymized {
                text: text.to_string(),
                tokens_processed: 0,
                unresolved: Vec::new(),
            });
        }

        debug!("Deanonymizing {} distinct PII tokens", tokens.len());
        let mut resolved = HashMap::with_capacity(tokens.len());
        let mut unresolved = Vec::new();

        for token in &tokens {
            match self.store.get(token)? {
                Some(original) => {
                    resolved.insert(token.clone(), original);
                }
                None => {
                    warn!("No mapping found for token: {}", token);
                    unresolved.push(token.clone());
                }
            }
        }

        info!(
            "Deanonymized {} of {} tokens",
            resolved.len(),
            tokens.len()
        );

        Ok(Deanonymized {
            text: replace_tokens(text, &resolved),
            tokens_processed: tokens.len(),
            unresolved,
        })
    }
}

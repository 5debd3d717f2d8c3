//! Detection + substitution of PII with tokens
//!
//! Categories are applied one after another against a single working
//! buffer. Each category rescans the buffer as left by the previous one,
//! and spans already holding a token are never matched again, so a value
//! is claimed by exactly one category: the first in the configured order.

use crate::config::StoreFailurePolicy;
use crate::detection::{PatternRegistry, PiiCategory, RawMatch};
use crate::error::{PiiError, Result};
use crate::mapping::{MappingStore, TokenMapping};
use crate::token::{token_spans, TokenCodec};
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// One PII occurrence. Offsets are byte offsets into the anonymized text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DetectedItem {
    pub category: PiiCategory,
    pub original_value: String,
    pub token: String,
    pub start_offset: usize,
    pub end_offset: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AnonymizeResult {
    pub anonymized_text: String,
    pub items: Vec<DetectedItem>,
}

/// Per-category tally of detected items.
pub fn category_counts(items: &[DetectedItem]) -> BTreeMap<PiiCategory, usize> {
    items.iter().fold(BTreeMap::new(), |mut acc, item| {
        *acc.entry(item.category).or_insert(0) += 1;
        acc
    })
}

#[derive(Clone)]
pub struct Anonymizer {
    registry: PatternRegistry,
    codec: TokenCodec,
    store: Arc<dyn MappingStore>,
    on_store_failure: StoreFailurePolicy,
}

impl Anonymizer {
    pub fn new(
        registry: PatternRegistry,
        codec: TokenCodec,
        store: Arc<dyn MappingStore>,
        on_store_failure: StoreFailurePolicy,
    ) -> Self {
        Self {
            registry,
            codec,
            store,
            on_store_failure,
        }
    }

    pub fn registry(&self) -> &PatternRegistry {
        &self.registry
    }

    pub fn anonymize(&self, text: &str) -> Result<AnonymizeResult> {
        if text.trim().is_empty() {
            return Err(PiiError::Validation("text must not be empty".to_string()));
        }

        let mut working = text.to_string();
        let mut items: Vec<DetectedItem> = Vec::new();

        for matcher in self.registry.matchers() {
            let protected = token_spans(&working);
            let matches: Vec<RawMatch> = matcher
                .find_all(&working)
                .into_iter()
                .filter(|m| !protected.iter().any(|&(s, e)| m.start < e && s < m.end))
                .collect();
            if matches.is_empty() {
                continue;
            }

            let mut rebuilt = String::with_capacity(working.len());
            let mut last_end = 0;
            let mut pass_items = Vec::with_capacity(matches.len());
            // (end of the replaced span in `working`, length delta it introduced)
            let mut shifts: Vec<(usize, isize)> = Vec::with_capacity(matches.len());

            for m in matches {
                let token = self.codec.make_token(m.category, &m.value);
                if let Err(e) = self.store.put(&TokenMapping::new(&token, &m.value)) {
                    match self.on_store_failure {
                        StoreFailurePolicy::Abort => {
                            error!("Failed to store {} mapping, aborting: {}", m.category, e);
                            return Err(e);
                        }
                        StoreFailurePolicy::Skip => {
                            warn!("Failed to store {} mapping, leaving value in place: {}", m.category, e);
                            continue;
                        }
                    }
                }

                rebuilt.push_str(&working[last_end..m.start]);
                let start_offset = rebuilt.len();
                rebuilt.push_str(&token);
                debug!(
                    "Replaced {} at {}-{} with {}",
                    m.category, m.start, m.end, token
                );

                shifts.push((m.end, token.len() as isize - m.value.len() as isize));
                pass_items.push(DetectedItem {
                    category: m.category,
                    original_value: m.value,
                    token,
                    start_offset,
                    end_offset: rebuilt.len(),
                });
                last_end = m.end;
            }

            if pass_items.is_empty() {
                continue;
            }
            rebuilt.push_str(&working[last_end..]);

            // Items from earlier passes sit wholly before or after each new
            // substitution, so only the deltas to their left apply.
            for item in &mut items {
                let delta: isize = shifts
                    .iter()
                    .filter(|(end, _)| *end <= item.start_offset)
                    .map(|(_, d)| d)
                    .sum();
                item.start_offset = item.start_offset.saturating_add_signed(delta);
                item.end_offset = item.end_offset.saturating_add_signed(delta);
            }

            items.extend(pass_items);
            working = rebuilt;
        }

        items.sort_by_key(|item| item.start_offset);
        info!("PII anonymization completed: {} items detected", items.len());

        Ok(AnonymizeResult {
            anonymized_text: working,
            items,
        })
    }
}

//! Deterministic token derivation and token scanning
//!
//! Tokens have the shape `<PII_{CATEGORY}_{fingerprint}>` where the
//! fingerprint is eight lowercase hex characters derived from
//! `CATEGORY:value`. The same pair always yields the same token, so a
//! mapping written by one call can be resolved by any later call.

use crate::config::{TokenMode, TokenizerConfig};
use crate::detection::PiiCategory;
use crate::error::{PiiError, Result};
use hmac::{Hmac, Mac};
use regex::Regex;
use sha2::Sha256;
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::OnceLock;

const FINGERPRINT_LEN: usize = 8;

fn token_regex() -> &'static Regex {
    static TOKEN_RE: OnceLock<Regex> = OnceLock::new();
    TOKEN_RE.get_or_init(|| {
        Regex::new(r"<PII_([A-Z_]+)_([a-f0-9]{8})>").expect("token pattern is a valid regex")
    })
}

#[derive(Clone)]
enum Signer {
    Hmac(Hmac<Sha256>),
    Rolling,
}

#[derive(Clone)]
pub struct TokenCodec {
    signer: Signer,
}

impl fmt::Debug for TokenCodec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenCodec")
            .field("mode", &self.mode())
            .finish()
    }
}

impl TokenCodec {
    pub fn from_config(config: &TokenizerConfig) -> Result<Self> {
        match config.mode {
            TokenMode::Keyed => {
                let secret = config
                    .secret
                    .as_deref()
                    .ok_or_else(|| PiiError::missing_setting("tokenizer.secret"))?;
                Self::keyed(secret.as_bytes())
            }
            TokenMode::Demo => Ok(Self::demo()),
        }
    }

    pub fn keyed(secret: &[u8]) -> Result<Self> {
        if secret.is_empty() {
            return Err(PiiError::missing_setting("tokenizer.secret"));
        }
        let mac = Hmac::<Sha256>::new_from_slice(secret)
            .map_err(|_| PiiError::Configuration("tokenizer.secret is unusable".to_string()))?;
        Ok(Self {
            signer: Signer::Hmac(mac),
        })
    }

    /// Unkeyed codec. Anyone can recompute these fingerprints.
    pub fn demo() -> Self {
        Self {
            signer: Signer::Rolling,
        }
    }

    pub fn mode(&self) -> TokenMode {
        match self.signer {
            Signer::Hmac(_) => TokenMode::Keyed,
            Signer::Rolling => TokenMode::Demo,
        }
    }

    pub fn make_token(&self, category: PiiCategory, value: &str) -> String {
        let payload = format!("{}:{}", category.as_str(), value);
        let fingerprint = match &self.signer {
            Signer::Hmac(mac) => {
                let mut mac = mac.clone();
                mac.update(payload.as_bytes());
                let mut digest = hex::encode(mac.finalize().into_bytes());
                digest.truncate(FINGERPRINT_LEN);
                digest
            }
            Signer::Rolling => rolling_fingerprint(&payload),
        };
        format!("<PII_{}_{}>", category.as_str(), fingerprint)
    }
}

// 32-bit `h * 31 + unit` over UTF-16 code units.
fn rolling_fingerprint(payload: &str) -> String {
    let hash = payload.encode_utf16().fold(0i32, |h, unit| {
        h.wrapping_shl(5).wrapping_sub(h).wrapping_add(i32::from(unit))
    });
    format!("{:08x}", hash.unsigned_abs())
}

pub fn contains_tokens(text: &str) -> bool {
    token_regex().is_match(text)
}

/// Every token occurrence, in order of appearance.
pub fn parse_tokens(text: &str) -> Vec<String> {
    token_regex()
        .find_iter(text)
        .map(|m| m.as_str().to_string())
        .collect()
}

/// Distinct tokens in order of first appearance.
pub fn distinct_tokens(text: &str) -> Vec<String> {
    let mut seen = HashSet::new();
    parse_tokens(text)
        .into_iter()
        .filter(|token| seen.insert(token.clone()))
        .collect()
}

/// Byte spans of every token in `text`.
pub fn token_spans(text: &str) -> Vec<(usize, usize)> {
    token_regex()
        .find_iter(text)
        .map(|m| (m.start(), m.end()))
        .collect()
}

/// Single-pass substitution of resolved tokens. Tokens missing from
/// `resolved` are left verbatim, and restored values are never rescanned.
pub fn replace_tokens(text: &str, resolved: &HashMap<String, String>) -> String {
    token_regex()
        .replace_all(text, |caps: &regex::Captures<'_>| {
            let token = &caps[0];
            resolved
                .get(token)
                .cloned()
                .unwrap_or_else(|| token.to_string())
        })
        .into_owned()
}

pub fn token_category(token: &str) -> Option<PiiCategory> {
    let caps = token_regex().captures(token)?;
    if caps.get(0)?.as_str() != token {
        return None;
    }
    caps.get(1)?.as_str().parse().ok()
}

//! PII detection using an ordered set of regex recognizers

use crate::config::DetectionConfig;
use crate::error::{PiiError, Result};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PiiCategory {
    Email,
    Phone,
    NationalId,
    CreditCard,
    Name,
    Address,
}

impl PiiCategory {
    pub const ALL: [PiiCategory; 6] = [
        PiiCategory::Email,
        PiiCategory::Phone,
        PiiCategory::NationalId,
        PiiCategory::CreditCard,
        PiiCategory::Name,
        PiiCategory::Address,
    ];

    /// Most specific shapes first: a 16-digit card or a labelled cédula
    /// must be claimed before the bare 10-digit phone pattern sees it.
    pub const DEFAULT_ORDER: [PiiCategory; 6] = [
        PiiCategory::Email,
        PiiCategory::CreditCard,
        PiiCategory::NationalId,
        PiiCategory::Phone,
        PiiCategory::Name,
        PiiCategory::Address,
    ];

    /// Tag used verbatim inside tokens.
    pub fn as_str(&self) -> &'static str {
        match self {
            PiiCategory::Email => "EMAIL",
            PiiCategory::Phone => "PHONE",
            PiiCategory::NationalId => "NATIONAL_ID",
            PiiCategory::CreditCard => "CREDIT_CARD",
            PiiCategory::Name => "NAME",
            PiiCategory::Address => "ADDRESS",
        }
    }

    /// User-facing label for confirmation screens.
    pub fn label(&self) -> &'static str {
        match self {
            PiiCategory::Email => "Correo Electrónico",
            PiiCategory::Phone => "Teléfono",
            PiiCategory::NationalId => "Cédula",
            PiiCategory::CreditCard => "Tarjeta de Crédito",
            PiiCategory::Name => "Nombre",
            PiiCategory::Address => "Dirección",
        }
    }

    pub fn default_pattern(&self) -> &'static str {
        match self {
            PiiCategory::Email => r"\b[A-Za-z0-9._%+-]+@[A-Za-z0-9.-]+\.[A-Za-z]{2,}\b",
            PiiCategory::Phone => {
                r"(?:\+?57[\s-]?)?(?:\d{3}[-.\s]?\d{3}[-.\s]?\d{4}|\d{10})\b"
            }
            PiiCategory::NationalId => {
                r"(?i)\b(?:CC|C\.C\.?|C[eé]dula)\s*:?\s*\d{6,12}\b"
            }
            PiiCategory::CreditCard => r"\b(?:\d{4}[-\s]?){3}\d{4}\b",
            PiiCategory::Name => concat!(
                r"\b(?:Sr\.|Sra\.|Dr\.|Dra\.|Abogado|Abogada|Ing\.|Lic\.)\s+",
                r"[A-ZÁÉÍÓÚÑ][a-záéíóúñ]+",
                r"(?:(?: +(?:de|del|la|las|los))* +[A-ZÁÉÍÓÚÑ][a-záéíóúñ]+)*",
            ),
            PiiCategory::Address => concat!(
                r"(?i)\b(?:Calle|Carrera|Avenida|Diagonal|Transversal|Av\.|Cra\.|Cr\.|Cl\.|Kr\.|Dg\.|Tv\.)",
                r"\s+\d+[A-Za-z]?",
                r"(?:\s*(?:#|No\.?|N°)\s*\d+[A-Za-z]?(?:\s*-\s*\d+)?)?",
                r"(?:\s+(?:Sur|Norte|Este|Oeste)\b)?",
                r"(?:\s*(?:Apto\.?|Apartamento|Oficina|Of\.|Interior|Int\.|Torre|Casa)\s*\d+[A-Za-z]?)?",
            ),
        }
    }
}

impl fmt::Display for PiiCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PiiCategory {
    type Err = PiiError;

    fn from_str(s: &str) -> Result<Self> {
        PiiCategory::ALL
            .iter()
            .copied()
            .find(|c| c.as_str() == s)
            .ok_or_else(|| PiiError::Validation(format!("unknown PII category '{}'", s)))
    }
}

/// One match in the scanned text. Offsets are byte offsets.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RawMatch {
    pub category: PiiCategory,
    pub value: String,
    pub start: usize,
    pub end: usize,
}

impl RawMatch {
    fn overlaps(&self, start: usize, end: usize) -> bool {
        self.start < end && start < self.end
    }
}

#[derive(Clone)]
pub struct PatternMatcher {
    category: PiiCategory,
    regex: Regex,
}

impl PatternMatcher {
    pub fn new(category: PiiCategory, pattern: &str) -> Result<Self> {
        let regex = Regex::new(pattern).map_err(|e| {
            PiiError::Configuration(format!("invalid regex pattern for {}: {}", category, e))
        })?;
        Ok(Self { category, regex })
    }

    pub fn category(&self) -> PiiCategory {
        self.category
    }

    /// All non-overlapping matches, left to right, with surrounding
    /// whitespace trimmed off.
    pub fn find_all(&self, text: &str) -> Vec<RawMatch> {
        self.regex
            .find_iter(text)
            .filter_map(|mat| {
                let raw = mat.as_str();
                let trimmed = raw.trim();
                if trimmed.is_empty() {
                    return None;
                }
                let start = mat.start() + (raw.len() - raw.trim_start().len());
                Some(RawMatch {
                    category: self.category,
                    value: trimmed.to_string(),
                    start,
                    end: start + trimmed.len(),
                })
            })
            .collect()
    }
}

#[derive(Clone)]
pub struct PatternRegistry {
    matchers: Vec<PatternMatcher>,
}

impl PatternRegistry {
    pub fn from_config(config: &DetectionConfig) -> Result<Self> {
        let mut matchers = Vec::with_capacity(config.order.len());

        for category in &config.order {
            let pattern = config
                .patterns
                .get(category)
                .map(String::as_str)
                .unwrap_or_else(|| category.default_pattern());
            matchers.push(PatternMatcher::new(*category, pattern)?);
            debug!("Loaded regex pattern for {}: {}", category, pattern);
        }

        Ok(Self { matchers })
    }

    /// Matchers in precedence order.
    pub fn matchers(&self) -> &[PatternMatcher] {
        &self.matchers
    }

    pub fn order(&self) -> Vec<PiiCategory> {
        self.matchers.iter().map(PatternMatcher::category).collect()
    }

    /// Read-only preview over the untouched text. A span already claimed by
    /// an earlier category is not reported again by a later one.
    pub fn detect(&self, text: &str) -> Vec<RawMatch> {
        let mut claimed: Vec<RawMatch> = Vec::new();

        for matcher in &self.matchers {
            let fresh: Vec<RawMatch> = matcher
                .find_all(text)
                .into_iter()
                .filter(|m| !claimed.iter().any(|c| c.overlaps(m.start, m.end)))
                .collect();
            claimed.extend(fresh);
        }

        claimed.sort_by_key(|m| m.start);
        claimed
    }
}

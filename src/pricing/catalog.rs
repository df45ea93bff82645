//! Static pricing catalog.

use crate::{Error, ErrorContext, Result};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

/// Category of content a model produces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Modality {
    Text,
    Image,
    Audio,
    Video,
}

impl Modality {
    pub fn as_str(&self) -> &'static str {
        match self {
            Modality::Text => "text",
            Modality::Image => "image",
            Modality::Audio => "audio",
            Modality::Video => "video",
        }
    }
}

impl fmt::Display for Modality {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Modality {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "text" => Ok(Modality::Text),
            "image" => Ok(Modality::Image),
            "audio" => Ok(Modality::Audio),
            "video" => Ok(Modality::Video),
            other => Err(Error::validation_with_context(
                format!("unknown modality '{}'", other),
                ErrorContext::new()
                    .with_details("expected one of: text, image, audio, video")
                    .with_source("modality"),
            )),
        }
    }
}

/// Pricing for one sellable (backend, model) unit.
///
/// Prices are per million units of input/output; `context_limit` is the
/// maximum combined units the model accepts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelPricing {
    pub backend: String,
    pub model: String,
    pub modality: Modality,
    pub input_price_per_million: Decimal,
    pub output_price_per_million: Decimal,
    pub context_limit: u64,
}

impl ModelPricing {
    pub fn new(
        backend: &str,
        model: &str,
        modality: Modality,
        input_price_per_million: Decimal,
        output_price_per_million: Decimal,
    ) -> Self {
        Self {
            backend: backend.into(),
            model: model.into(),
            modality,
            input_price_per_million,
            output_price_per_million,
            context_limit: u64::MAX,
        }
    }

    pub fn with_context_limit(mut self, limit: u64) -> Self {
        self.context_limit = limit;
        self
    }

    /// Stable identifier, `"backend/model"`.
    pub fn id(&self) -> String {
        model_id(&self.backend, &self.model)
    }

    fn validate(&self, index: usize) -> Result<()> {
        let field = |name: &str| format!("catalog[{}].{}", index, name);
        if self.backend.trim().is_empty() || self.backend.contains('/') {
            return Err(Error::configuration_with_context(
                "backend name must be non-empty and must not contain '/'",
                ErrorContext::new()
                    .with_field_path(field("backend"))
                    .with_source("pricing_catalog"),
            ));
        }
        if self.model.trim().is_empty() {
            return Err(Error::configuration_with_context(
                "model name must be non-empty",
                ErrorContext::new()
                    .with_field_path(field("model"))
                    .with_source("pricing_catalog"),
            ));
        }
        for (name, price) in [
            ("input_price_per_million", self.input_price_per_million),
            ("output_price_per_million", self.output_price_per_million),
        ] {
            if price.is_sign_negative() && !price.is_zero() {
                return Err(Error::configuration_with_context(
                    format!("price must be >= 0 for {}", self.id()),
                    ErrorContext::new()
                        .with_field_path(field(name))
                        .with_details(price.to_string())
                        .with_source("pricing_catalog"),
                ));
            }
        }
        Ok(())
    }
}

pub(crate) fn model_id(backend: &str, model: &str) -> String {
    format!("{}/{}", backend, model)
}

/// Backend part of a `"backend/model"` identifier.
pub fn backend_of(model_id: &str) -> &str {
    model_id.split_once('/').map(|(b, _)| b).unwrap_or(model_id)
}

/// Immutable, ordered pricing catalog.
///
/// Load order is preserved and is the tie-break order for every ranking.
#[derive(Debug, Clone, Default)]
pub struct PricingCatalog {
    entries: Vec<ModelPricing>,
    index: HashMap<String, usize>,
}

impl PricingCatalog {
    pub fn new(entries: Vec<ModelPricing>) -> Result<Self> {
        let mut index = HashMap::with_capacity(entries.len());
        for (i, entry) in entries.iter().enumerate() {
            entry.validate(i)?;
            if index.insert(entry.id(), i).is_some() {
                return Err(Error::configuration_with_context(
                    format!("duplicate catalog entry '{}'", entry.id()),
                    ErrorContext::new()
                        .with_field_path(format!("catalog[{}]", i))
                        .with_source("pricing_catalog"),
                ));
            }
        }
        Ok(Self { entries, index })
    }

    pub fn get(&self, model_id: &str) -> Option<&ModelPricing> {
        self.index.get(model_id).map(|&i| &self.entries[i])
    }

    pub fn contains(&self, model_id: &str) -> bool {
        self.index.contains_key(model_id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &ModelPricing> {
        self.entries.iter()
    }

    pub fn by_modality(&self, modality: Modality) -> impl Iterator<Item = &ModelPricing> {
        self.entries.iter().filter(move |e| e.modality == modality)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

//! ReasoningService - tiered entry point for generative calls.
//!
//! The pipeline assumes two quality tiers: a fast/cheap model for
//! exploratory breadth (probe generation, quick classification) and a
//! higher-quality model for judgment (evaluation, profile delta
//! extraction). The service owns one backend per tier and exposes a single
//! structured-generation contract.

use std::sync::Arc;
use tracing::{debug, warn};

use crate::backend::traits::{CompletionRequest, ReasoningBackend, ReasoningError};
use crate::structured::{parse_structured, Structured};

/// Which backend a call should use.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QualityTier {
    /// Cheap and fast; breadth over judgment
    Fast,
    /// Higher-quality; used when the output feeds decisions
    Quality,
}

impl QualityTier {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Fast => "fast",
            Self::Quality => "quality",
        }
    }
}

/// Tiered reasoning service.
pub struct ReasoningService {
    fast: Arc<dyn ReasoningBackend>,
    quality: Arc<dyn ReasoningBackend>,
}

impl ReasoningService {
    /// Create a service with distinct backends per tier.
    pub fn new(fast: Arc<dyn ReasoningBackend>, quality: Arc<dyn ReasoningBackend>) -> Self {
        Self { fast, quality }
    }

    /// Create a service that uses one backend for both tiers.
    pub fn single(backend: Arc<dyn ReasoningBackend>) -> Self {
        Self {
            fast: Arc::clone(&backend),
            quality: backend,
        }
    }

    /// Backend for a tier, falling back to the other tier's backend when the
    /// preferred one is down.
    async fn backend_for(&self, tier: QualityTier) -> Result<&dyn ReasoningBackend, ReasoningError> {
        let (preferred, alternate) = match tier {
            QualityTier::Fast => (&self.fast, &self.quality),
            QualityTier::Quality => (&self.quality, &self.fast),
        };

        if preferred.is_available().await {
            return Ok(preferred.as_ref());
        }
        if !Arc::ptr_eq(preferred, alternate) && alternate.is_available().await {
            warn!(
                tier = tier.as_str(),
                preferred = preferred.id(),
                alternate = alternate.id(),
                "Preferred backend unavailable, using alternate tier"
            );
            return Ok(alternate.as_ref());
        }

        Err(ReasoningError::Unavailable(format!(
            "no backend available for tier {}",
            tier.as_str()
        )))
    }

    /// Generate structured output matching `T`.
    ///
    /// Transport failures propagate as errors; schema drift does not - the
    /// result degrades through [`Structured`] tiers instead, so callers
    /// always get a usable `T` once the backend answered at all.
    pub async fn generate<T>(
        &self,
        tier: QualityTier,
        system_prompt: &str,
        user_prompt: &str,
    ) -> Result<Structured<T>, ReasoningError>
    where
        T: serde::de::DeserializeOwned + serde::Serialize + Default,
    {
        let backend = self.backend_for(tier).await?;

        let request = CompletionRequest::user(user_prompt)
            .with_system(system_prompt)
            .with_max_tokens(2048)
            .with_temperature(if tier == QualityTier::Fast { 0.9 } else { 0.4 })
            .with_json_output();

        let completion = backend.complete(request).await?;
        let structured = parse_structured::<T>(&completion.content);

        match &structured {
            Structured::Valid(_) => {
                debug!(backend = backend.id(), tier = tier.as_str(), "Structured output valid");
            }
            Structured::Recovered { warnings, .. } => {
                warn!(
                    backend = backend.id(),
                    tier = tier.as_str(),
                    warnings = warnings.len(),
                    "Structured output recovered with defaults"
                );
            }
            Structured::Fallback(_) => {
                warn!(
                    backend = backend.id(),
                    tier = tier.as_str(),
                    "Structured output unusable, falling back to defaults"
                );
            }
        }

        Ok(structured)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::MockBackend;
    use serde::{Deserialize, Serialize};

    #[derive(Debug, Default, Serialize, Deserialize)]
    struct Probe {
        #[serde(default)]
        prompts: Vec<String>,
    }

    #[tokio::test]
    async fn test_generate_valid() {
        let backend = Arc::new(MockBackend::default().with_response(r#"{"prompts": ["p1"]}"#));
        let service = ReasoningService::single(backend);

        let result = service
            .generate::<Probe>(QualityTier::Fast, "system", "user")
            .await
            .unwrap();

        assert!(result.is_valid());
        assert_eq!(result.inner().prompts, vec!["p1"]);
    }

    #[tokio::test]
    async fn test_generate_falls_back_across_tiers() {
        let fast = Arc::new(MockBackend::new("fast").with_available(false));
        let quality = Arc::new(MockBackend::new("quality").with_response(r#"{"prompts": []}"#));
        let service = ReasoningService::new(fast, quality);

        let result = service
            .generate::<Probe>(QualityTier::Fast, "system", "user")
            .await
            .unwrap();
        assert!(result.is_valid());
    }

    #[tokio::test]
    async fn test_generate_unavailable() {
        let backend = Arc::new(MockBackend::default().with_available(false));
        let service = ReasoningService::single(backend);

        let result = service
            .generate::<Probe>(QualityTier::Quality, "system", "user")
            .await;
        assert!(matches!(result, Err(ReasoningError::Unavailable(_))));
    }
}

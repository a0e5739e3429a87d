//! Deterministic mock provider for credential-less operation and tests.

use emergency_line_report_models::EMBEDDING_DIM;

use crate::{AiError, AiProvider, Transcription};

/// A provider that answers every capability with deterministic canned
/// output. Identical inputs always produce identical embeddings, so
/// similarity search stays exercisable in development environments.
pub struct MockProvider;

impl MockProvider {
    /// Creates a new mock provider.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

impl Default for MockProvider {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl AiProvider for MockProvider {
    async fn transcribe(&self, _audio: &[u8]) -> Result<Transcription, AiError> {
        Ok(Transcription {
            text: "Reporte de prueba generado sin credenciales del proveedor de voz.".to_string(),
            confidence: 0.0,
        })
    }

    async fn extract_emergency(&self, transcript: &str) -> Result<serde_json::Value, AiError> {
        Ok(serde_json::json!({
            "emergencyType": "Otro",
            "subtype": null,
            "location": "Sin ubicación determinada",
            "coordinates": null,
            "municipality": "Medellín",
            "severity": "Media",
            "affectedInfrastructure": [],
            "estimatedImpact": transcript,
            "immediateActions": []
        }))
    }

    async fn embed(&self, text: &str) -> Result<Vec<f32>, AiError> {
        Ok(deterministic_embedding(text))
    }

    async fn complete(&self, _system_prompt: &str, _user_prompt: &str) -> Result<String, AiError> {
        Ok(
            "Modo de demostración: no hay credenciales de IA configuradas, por lo que no es \
             posible generar una respuesta fundamentada en los reportes."
                .to_string(),
        )
    }
}

/// Hashes text into a unit-length pseudo-embedding.
///
/// FNV-1a seeds an xorshift generator per dimension block; the result is
/// L2-normalized so cosine similarity behaves like the real embedding
/// space (identical text scores 1.0 against itself).
fn deterministic_embedding(text: &str) -> Vec<f32> {
    let mut seed: u64 = 0xcbf2_9ce4_8422_2325;
    for byte in text.bytes() {
        seed ^= u64::from(byte);
        seed = seed.wrapping_mul(0x0100_0000_01b3);
    }
    // An all-zero seed would freeze the generator
    if seed == 0 {
        seed = 0x9e37_79b9_7f4a_7c15;
    }

    let mut state = seed;
    let mut embedding = Vec::with_capacity(EMBEDDING_DIM);
    for _ in 0..EMBEDDING_DIM {
        state ^= state << 13;
        state ^= state >> 7;
        state ^= state << 17;
        #[allow(clippy::cast_precision_loss)]
        let value = (state >> 40) as f32 / (1u32 << 24) as f32 - 0.5;
        embedding.push(value);
    }

    let norm = embedding.iter().map(|v| v * v).sum::<f32>().sqrt();
    if norm > 0.0 {
        for value in &mut embedding {
            *value /= norm;
        }
    }

    embedding
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn embedding_has_fixed_dimensionality() {
        assert_eq!(deterministic_embedding("deslizamiento").len(), EMBEDDING_DIM);
    }

    #[test]
    fn identical_text_embeds_identically() {
        assert_eq!(
            deterministic_embedding("deslizamiento en Bello"),
            deterministic_embedding("deslizamiento en Bello")
        );
    }

    #[test]
    fn different_text_embeds_differently() {
        assert_ne!(
            deterministic_embedding("deslizamiento en Bello"),
            deterministic_embedding("inundación en Itagüí")
        );
    }

    #[test]
    fn embedding_is_unit_length() {
        let embedding = deterministic_embedding("grieta en el puente");
        let norm = embedding.iter().map(|v| v * v).sum::<f32>().sqrt();
        assert!((norm - 1.0).abs() < 1e-4);
    }

    #[tokio::test]
    async fn mock_extraction_is_schema_complete() {
        let provider = MockProvider::new();
        let value = provider.extract_emergency("texto").await.unwrap();
        let outcome = crate::extraction::parse_extraction(&value);
        assert!(outcome.is_complete());
    }
}

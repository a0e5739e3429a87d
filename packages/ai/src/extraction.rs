//! The fixed extraction schema and its validation.
//!
//! The extractor model returns one JSON object per transcript. Parsing is
//! deliberately separate from the provider call: a response missing required
//! fields is a *degraded* extraction, not a failure — the report is still
//! persisted, flagged for review, because dropping a citizen-submitted
//! report over a model hiccup is worse than storing it incomplete.

use emergency_line_report_models::{Coordinates, EmergencyType, Severity};

/// Fields the extractor must fill for an extraction to count as complete.
const REQUIRED_FIELDS: &[&str] = &["emergencyType", "location", "municipality", "severity"];

/// The structured emergency record extracted from a transcript.
#[derive(Debug, Clone, PartialEq)]
pub struct ExtractedEmergency {
    /// Canonical emergency type.
    pub emergency_type: EmergencyType,
    /// Free-text subtype.
    pub subtype: Option<String>,
    /// Location as described by the reporter.
    pub location_text: Option<String>,
    /// Geocoordinates, when the model could determine them.
    pub coordinates: Option<Coordinates>,
    /// Comuna or corregimiento.
    pub municipality: Option<String>,
    /// Assigned severity.
    pub severity: Severity,
    /// Affected infrastructure elements.
    pub affected_infrastructure: Vec<String>,
    /// Free-text impact estimate.
    pub estimated_impact: Option<String>,
    /// Recommended immediate actions.
    pub immediate_actions: Vec<String>,
}

/// The result of validating the extractor's output against the schema.
#[derive(Debug, Clone, PartialEq)]
pub struct ExtractionOutcome {
    /// The extracted record, with conservative defaults where fields were
    /// missing.
    pub record: ExtractedEmergency,
    /// Required fields the extractor failed to fill. Empty means the
    /// extraction is complete.
    pub missing: Vec<&'static str>,
}

impl ExtractionOutcome {
    /// Whether every required field was filled.
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.missing.is_empty()
    }
}

/// Builds the extraction prompt for one transcript.
///
/// The vocabulary is the DAGRD field vocabulary — the model answers with
/// the Spanish labels, which [`parse_extraction`] normalizes into the
/// canonical enums.
#[must_use]
pub fn build_extraction_prompt(transcript: &str) -> String {
    format!(
        r#"Eres un analista de emergencias de infraestructura en Medellín. Analiza esta transcripción de un reporte de emergencia y extrae la información en formato JSON.

IMPORTANTE: Reconoce términos locales como "loma", "ladera", "quebrada", comunas (Popular, Santa Cruz, etc.) y corregimientos (San Antonio de Prado, Altavista, etc.).

Esquema JSON requerido:
{{
  "emergencyType": "Deslizamiento | Inundación | Colapso Vial | Daño Estructural | Grieta | Otro",
  "subtype": "subtipo específico o null",
  "location": "dirección o descripción completa del lugar",
  "coordinates": {{"lat": número, "lng": número}} o null,
  "municipality": "nombre de la comuna o corregimiento",
  "severity": "Baja | Media | Alta | Crítica",
  "affectedInfrastructure": ["vía", "vivienda", etc.] o [],
  "estimatedImpact": "1-2 frases concisas" o null,
  "immediateActions": ["acción recomendada", etc.] o []
}}

Transcripción: {transcript}"#
    )
}

/// Validates the extractor's raw JSON output against the fixed schema.
///
/// Every required field that is missing or empty is recorded in
/// [`ExtractionOutcome::missing`] and replaced with a conservative default
/// (`Other` type, `Medium` severity, `None` text fields).
#[must_use]
pub fn parse_extraction(value: &serde_json::Value) -> ExtractionOutcome {
    let mut missing = Vec::new();

    let emergency_type = match non_empty_str(value, "emergencyType") {
        Some(label) => EmergencyType::from_label(label),
        None => {
            missing.push("emergencyType");
            EmergencyType::Other
        }
    };

    let location_text = non_empty_str(value, "location").map(ToString::to_string);
    if location_text.is_none() {
        missing.push("location");
    }

    let municipality = non_empty_str(value, "municipality").map(ToString::to_string);
    if municipality.is_none() {
        missing.push("municipality");
    }

    let severity = match non_empty_str(value, "severity") {
        Some(label) => Severity::from_label(label),
        None => {
            missing.push("severity");
            Severity::Medium
        }
    };

    debug_assert!(missing.iter().all(|f| REQUIRED_FIELDS.contains(f)));

    let coordinates = value.get("coordinates").and_then(|c| {
        let lat = c.get("lat").and_then(serde_json::Value::as_f64)?;
        let lng = c.get("lng").and_then(serde_json::Value::as_f64)?;
        Some(Coordinates { lat, lng })
    });

    ExtractionOutcome {
        record: ExtractedEmergency {
            emergency_type,
            subtype: non_empty_str(value, "subtype").map(ToString::to_string),
            location_text,
            coordinates,
            municipality,
            severity,
            affected_infrastructure: string_list(value, "affectedInfrastructure"),
            estimated_impact: non_empty_str(value, "estimatedImpact").map(ToString::to_string),
            immediate_actions: string_list(value, "immediateActions"),
        },
        missing,
    }
}

/// Returns the field as a non-empty trimmed string, if present.
fn non_empty_str<'a>(value: &'a serde_json::Value, field: &str) -> Option<&'a str> {
    value
        .get(field)
        .and_then(serde_json::Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
}

/// Returns the field as a list of strings, dropping non-string entries.
fn string_list(value: &serde_json::Value, field: &str) -> Vec<String> {
    value
        .get(field)
        .and_then(serde_json::Value::as_array)
        .map(|xs| {
            xs.iter()
                .filter_map(serde_json::Value::as_str)
                .map(ToString::to_string)
                .collect()
        })
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn complete_extraction_parses() {
        let value = serde_json::json!({
            "emergencyType": "Deslizamiento",
            "subtype": "Deslizamiento de ladera",
            "location": "Calle 20 con Carrera 38, sector La Loma",
            "coordinates": {"lat": 6.338, "lng": -75.558},
            "municipality": "Bello",
            "severity": "Alta",
            "affectedInfrastructure": ["vía", "vivienda"],
            "estimatedImpact": "Vía bloqueada, dos viviendas en riesgo",
            "immediateActions": ["Evacuar viviendas", "Enviar maquinaria"]
        });

        let outcome = parse_extraction(&value);

        assert!(outcome.is_complete());
        assert_eq!(outcome.record.emergency_type, EmergencyType::Landslide);
        assert_eq!(outcome.record.municipality.as_deref(), Some("Bello"));
        assert_eq!(outcome.record.severity, Severity::High);
        assert_eq!(outcome.record.affected_infrastructure.len(), 2);
        let coords = outcome.record.coordinates.unwrap();
        assert!((coords.lat - 6.338).abs() < 1e-9);
    }

    #[test]
    fn missing_required_fields_are_degraded_not_dropped() {
        let value = serde_json::json!({
            "emergencyType": "Inundación",
            "severity": "Media"
        });

        let outcome = parse_extraction(&value);

        assert!(!outcome.is_complete());
        assert_eq!(outcome.missing, vec!["location", "municipality"]);
        // The partial record is still usable
        assert_eq!(outcome.record.emergency_type, EmergencyType::Flood);
        assert_eq!(outcome.record.severity, Severity::Medium);
        assert!(outcome.record.location_text.is_none());
    }

    #[test]
    fn empty_object_is_fully_degraded() {
        let outcome = parse_extraction(&serde_json::json!({}));

        assert_eq!(outcome.missing.len(), REQUIRED_FIELDS.len());
        assert_eq!(outcome.record.emergency_type, EmergencyType::Other);
        assert_eq!(outcome.record.severity, Severity::Medium);
    }

    #[test]
    fn empty_strings_count_as_missing() {
        let value = serde_json::json!({
            "emergencyType": "",
            "location": "  ",
            "municipality": "Bello",
            "severity": "Alta"
        });

        let outcome = parse_extraction(&value);

        assert_eq!(outcome.missing, vec!["emergencyType", "location"]);
    }

    #[test]
    fn malformed_coordinates_are_ignored() {
        let value = serde_json::json!({
            "emergencyType": "Grieta",
            "location": "Puente de la 4 Sur",
            "municipality": "El Poblado",
            "severity": "Baja",
            "coordinates": {"lat": "six point three"}
        });

        let outcome = parse_extraction(&value);

        assert!(outcome.is_complete());
        assert!(outcome.record.coordinates.is_none());
    }

    #[test]
    fn prompt_embeds_the_transcript() {
        let prompt = build_extraction_prompt("deslizamiento en Bello");
        assert!(prompt.contains("deslizamiento en Bello"));
        assert!(prompt.contains("emergencyType"));
    }
}

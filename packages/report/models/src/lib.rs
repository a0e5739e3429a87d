#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions)]

//! Emergency report taxonomy types and lifecycle state definitions.
//!
//! This crate defines the canonical emergency type and severity taxonomy used
//! across the entire emergency-line system, plus the report, intervention,
//! and alert-dispatch state machines. The extraction layer normalizes the
//! Spanish field-report vocabulary ("Deslizamiento", "Alta", ...) into these
//! canonical enums; the UI translates back at the display boundary.

use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display, EnumString};

/// Dimensionality of the embedding vectors stored alongside each report.
///
/// Must match the embedding model used at ingestion time — querying with a
/// vector from a different model silently degrades similarity quality.
pub const EMBEDDING_DIM: usize = 1536;

/// A WGS84 point attached to a report or historical record.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinates {
    /// Latitude.
    pub lat: f64,
    /// Longitude.
    pub lng: f64,
}

/// Canonical infrastructure emergency types.
///
/// Each variant carries the Spanish labels used by field reporters so the
/// extraction output can be normalized leniently via [`EmergencyType::from_label`].
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    AsRefStr,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum EmergencyType {
    /// Slope failure or mass movement ("Deslizamiento")
    Landslide,
    /// Overflow or stormwater flooding ("Inundación")
    Flood,
    /// Road surface or roadbed collapse ("Colapso Vial")
    RoadCollapse,
    /// Damage to buildings or built structures ("Daño Estructural")
    StructuralDamage,
    /// Fissures in ground or structures ("Grieta")
    Crack,
    /// Reports that don't map to any other type
    Other,
}

impl EmergencyType {
    /// Normalizes a free-form extraction label into a canonical type.
    ///
    /// Accepts both the canonical `SCREAMING_SNAKE_CASE` names and the
    /// Spanish labels the extractor produces. Unrecognized labels map to
    /// [`Self::Other`] rather than failing — a report with an odd label is
    /// still a report.
    #[must_use]
    pub fn from_label(label: &str) -> Self {
        if let Ok(parsed) = label.trim().parse::<Self>() {
            return parsed;
        }

        let folded = fold_label(label);
        match folded.as_str() {
            s if s.contains("deslizamiento") || s.contains("derrumbe") => Self::Landslide,
            s if s.contains("inundacion") || s.contains("lluvias") => Self::Flood,
            s if s.contains("colapso") || s.contains("malla vial") => Self::RoadCollapse,
            s if s.contains("estructural") => Self::StructuralDamage,
            s if s.contains("grieta") || s.contains("fisura") => Self::Crack,
            _ => Self::Other,
        }
    }

    /// Returns all variants of this enum.
    #[must_use]
    pub const fn all() -> &'static [Self] {
        &[
            Self::Landslide,
            Self::Flood,
            Self::RoadCollapse,
            Self::StructuralDamage,
            Self::Crack,
            Self::Other,
        ]
    }
}

/// Severity level for an emergency report, from 1 (low) to 4 (critical).
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    AsRefStr,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum Severity {
    /// Level 1: no immediate risk to people ("Baja")
    Low = 1,
    /// Level 2: localized damage, monitoring required ("Media")
    Medium = 2,
    /// Level 3: risk to people or essential infrastructure ("Alta")
    High = 3,
    /// Level 4: lives in danger, immediate response ("Crítica")
    Critical = 4,
}

impl Severity {
    /// Returns the numeric value of this severity level.
    #[must_use]
    pub const fn value(self) -> u8 {
        self as u8
    }

    /// Creates a severity level from a numeric value.
    ///
    /// # Errors
    ///
    /// Returns an error if the value is not in the range 1-4.
    pub const fn from_value(value: u8) -> Result<Self, InvalidSeverityError> {
        match value {
            1 => Ok(Self::Low),
            2 => Ok(Self::Medium),
            3 => Ok(Self::High),
            4 => Ok(Self::Critical),
            _ => Err(InvalidSeverityError { value }),
        }
    }

    /// Normalizes a free-form extraction label into a canonical severity.
    ///
    /// Accepts canonical names and the Spanish labels ("Baja", "Media",
    /// "Alta", "Crítica"). Unrecognized labels map to [`Self::Medium`] —
    /// never drop a report over a label, and never silently inflate it to
    /// critical either.
    #[must_use]
    pub fn from_label(label: &str) -> Self {
        if let Ok(parsed) = label.trim().parse::<Self>() {
            return parsed;
        }

        match fold_label(label).as_str() {
            "baja" | "low" => Self::Low,
            "media" | "medium" | "moderada" => Self::Medium,
            "alta" | "high" => Self::High,
            "critica" | "critical" => Self::Critical,
            _ => Self::Medium,
        }
    }

    /// Returns all variants of this enum.
    #[must_use]
    pub const fn all() -> &'static [Self] {
        &[Self::Low, Self::Medium, Self::High, Self::Critical]
    }
}

/// Error returned when attempting to create a [`Severity`] from an invalid
/// numeric value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InvalidSeverityError {
    /// The invalid severity value that was provided.
    pub value: u8,
}

impl std::fmt::Display for InvalidSeverityError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "invalid severity value {}: expected 1-4", self.value)
    }
}

impl std::error::Error for InvalidSeverityError {}

/// Lifecycle state of an emergency report.
///
/// Transitions are forward-only: `Pending` -> `InProgress` -> `Resolved`.
/// There is no reopen operation, so a transition to a lower-ranked state
/// must be rejected by the store.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    AsRefStr,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum ReportStatus {
    /// Freshly ingested, awaiting triage.
    Pending,
    /// At least one intervention has been assigned.
    InProgress,
    /// Field work completed and verified.
    Resolved,
}

impl ReportStatus {
    /// Position of this state in the forward-only lifecycle.
    #[must_use]
    pub const fn rank(self) -> u8 {
        match self {
            Self::Pending => 0,
            Self::InProgress => 1,
            Self::Resolved => 2,
        }
    }

    /// Whether a transition from `self` to `next` is allowed.
    ///
    /// Same-state updates are permitted (idempotent PATCH), regressions are
    /// not.
    #[must_use]
    pub const fn can_transition_to(self, next: Self) -> bool {
        next.rank() >= self.rank()
    }
}

/// Lifecycle state of an intervention, forward-only like [`ReportStatus`].
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    AsRefStr,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum InterventionStatus {
    /// Assigned but not yet started.
    Pending,
    /// Personnel on site.
    InProgress,
    /// Work finished.
    Completed,
}

impl InterventionStatus {
    /// Position of this state in the forward-only lifecycle.
    #[must_use]
    pub const fn rank(self) -> u8 {
        match self {
            Self::Pending => 0,
            Self::InProgress => 1,
            Self::Completed => 2,
        }
    }

    /// Whether a transition from `self` to `next` is allowed.
    #[must_use]
    pub const fn can_transition_to(self, next: Self) -> bool {
        next.rank() >= self.rank()
    }
}

/// Delivery state of a single alert dispatch.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    AsRefStr,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum DispatchState {
    /// Created, delivery not yet attempted.
    Pending,
    /// Delivery attempt succeeded.
    Sent,
    /// Delivery attempt failed; other dispatches are unaffected.
    Failed,
}

/// Contact channel for alert delivery.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    AsRefStr,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum AlertChannel {
    /// Notification by email.
    Email,
    /// Notification by WhatsApp text message.
    Whatsapp,
}

/// Lowercases a label and strips the accents that appear in the Spanish
/// emergency vocabulary, so matching is insensitive to both.
fn fold_label(label: &str) -> String {
    label
        .trim()
        .to_lowercase()
        .chars()
        .map(|c| match c {
            'á' => 'a',
            'é' => 'e',
            'í' => 'i',
            'ó' => 'o',
            'ú' => 'u',
            'ñ' => 'n',
            _ => c,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn emergency_type_from_spanish_labels() {
        assert_eq!(
            EmergencyType::from_label("Deslizamiento"),
            EmergencyType::Landslide
        );
        assert_eq!(EmergencyType::from_label("Inundación"), EmergencyType::Flood);
        assert_eq!(
            EmergencyType::from_label("Colapso Vial"),
            EmergencyType::RoadCollapse
        );
        assert_eq!(
            EmergencyType::from_label("Afectación Malla Vial"),
            EmergencyType::RoadCollapse
        );
        assert_eq!(
            EmergencyType::from_label("Daño Estructural"),
            EmergencyType::StructuralDamage
        );
        assert_eq!(
            EmergencyType::from_label("Afectación por Lluvias"),
            EmergencyType::Flood
        );
        assert_eq!(EmergencyType::from_label("grieta en el muro"), EmergencyType::Crack);
    }

    #[test]
    fn emergency_type_from_canonical_name() {
        assert_eq!(EmergencyType::from_label("LANDSLIDE"), EmergencyType::Landslide);
        assert_eq!(
            EmergencyType::from_label("STRUCTURAL_DAMAGE"),
            EmergencyType::StructuralDamage
        );
    }

    #[test]
    fn unknown_label_maps_to_other() {
        assert_eq!(EmergencyType::from_label("plaga de abejas"), EmergencyType::Other);
        assert_eq!(EmergencyType::from_label(""), EmergencyType::Other);
    }

    #[test]
    fn severity_from_spanish_labels() {
        assert_eq!(Severity::from_label("Baja"), Severity::Low);
        assert_eq!(Severity::from_label("Media"), Severity::Medium);
        assert_eq!(Severity::from_label("Alta"), Severity::High);
        assert_eq!(Severity::from_label("Crítica"), Severity::Critical);
        assert_eq!(Severity::from_label("CRITICA"), Severity::Critical);
    }

    #[test]
    fn unknown_severity_defaults_to_medium() {
        assert_eq!(Severity::from_label("??"), Severity::Medium);
    }

    #[test]
    fn severity_from_value_roundtrip() {
        for v in 1..=4u8 {
            let severity = Severity::from_value(v).unwrap();
            assert_eq!(severity.value(), v);
        }
        assert!(Severity::from_value(0).is_err());
        assert!(Severity::from_value(5).is_err());
    }

    #[test]
    fn report_status_forward_only() {
        use ReportStatus::{InProgress, Pending, Resolved};

        assert!(Pending.can_transition_to(InProgress));
        assert!(Pending.can_transition_to(Resolved));
        assert!(InProgress.can_transition_to(Resolved));

        // Same-state updates are idempotent
        assert!(Resolved.can_transition_to(Resolved));

        // No reopen operation exists
        assert!(!Resolved.can_transition_to(Pending));
        assert!(!Resolved.can_transition_to(InProgress));
        assert!(!InProgress.can_transition_to(Pending));
    }

    #[test]
    fn intervention_status_forward_only() {
        use InterventionStatus::{Completed, InProgress, Pending};

        assert!(Pending.can_transition_to(InProgress));
        assert!(InProgress.can_transition_to(Completed));
        assert!(!Completed.can_transition_to(Pending));
    }

    #[test]
    fn enum_string_roundtrip() {
        for t in EmergencyType::all() {
            assert_eq!(t.as_ref().parse::<EmergencyType>().unwrap(), *t);
        }
        for s in Severity::all() {
            assert_eq!(s.as_ref().parse::<Severity>().unwrap(), *s);
        }
    }
}

//! Rule-based triage of the current patient record.
//!
//! Every view derives its colours, copy and emergency affordances from the
//! level returned here, so severity never disagrees between screens.

use serde::{Deserialize, Serialize};

use crate::models::PatientData;

/// Caregiver-facing severity, ordered from least to most severe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TriageLevel {
    Stable,
    Warning,
    Emergency,
}

impl TriageLevel {
    /// Two-state view used by displays without an "attention" state.
    pub fn binary(self) -> TriageLevel {
        match self {
            TriageLevel::Emergency => TriageLevel::Emergency,
            TriageLevel::Warning | TriageLevel::Stable => TriageLevel::Stable,
        }
    }

    pub fn risk_number(self) -> u8 {
        match self {
            TriageLevel::Stable => 1,
            TriageLevel::Warning => 2,
            TriageLevel::Emergency => 3,
        }
    }

    pub fn is_emergency(self) -> bool {
        self == TriageLevel::Emergency
    }

    pub fn headline(self) -> &'static str {
        match self {
            TriageLevel::Stable => "Condition stable",
            TriageLevel::Warning => "Needs attention",
            TriageLevel::Emergency => "Immediate response needed",
        }
    }

    pub fn action(self) -> &'static str {
        match self {
            TriageLevel::Stable => "Keep observing at home with the current care routine.",
            TriageLevel::Warning => {
                "Check breathing rate changes and lip colour frequently."
            }
            TriageLevel::Emergency => "Call emergency services or go to a paediatric ER now.",
        }
    }
}

/// Thresholds of the classifier. `p_peak_measured > p_peak_threshold` is
/// always an emergency and is not configurable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TriagePolicy {
    pub emergency_spo2_below: u8,
    pub emergency_rr_above: u16,
    pub warning_spo2_below: u8,
    pub warning_rr_above: u16,
}

impl Default for TriagePolicy {
    fn default() -> Self {
        Self {
            emergency_spo2_below: 90,
            emergency_rr_above: 40,
            warning_spo2_below: 95,
            warning_rr_above: 30,
        }
    }
}

impl TriagePolicy {
    /// The stricter-SpO2 variant used by the standalone triage card.
    pub fn triage_screen() -> Self {
        Self {
            warning_spo2_below: 94,
            ..Self::default()
        }
    }

    pub fn classify(&self, patient: &PatientData) -> TriageLevel {
        let v = &patient.vitals;

        if v.spo2 < self.emergency_spo2_below
            || v.rr > self.emergency_rr_above
            || v.p_peak_measured > v.p_peak_threshold
        {
            return TriageLevel::Emergency;
        }

        if v.spo2 < self.warning_spo2_below || v.rr > self.warning_rr_above {
            return TriageLevel::Warning;
        }

        TriageLevel::Stable
    }

    /// Human-readable list of every rule the record currently trips.
    pub fn reasons(&self, patient: &PatientData) -> Vec<String> {
        let v = &patient.vitals;
        let mut reasons = Vec::new();

        if v.spo2 < self.emergency_spo2_below {
            reasons.push(format!("Low oxygen saturation: {}%", v.spo2));
        } else if v.spo2 < self.warning_spo2_below {
            reasons.push(format!("Oxygen saturation below target: {}%", v.spo2));
        }

        if v.rr > self.emergency_rr_above {
            reasons.push(format!("Very fast breathing: {} breaths/min", v.rr));
        } else if v.rr > self.warning_rr_above {
            reasons.push(format!("Fast breathing: {} breaths/min", v.rr));
        }

        if v.p_peak_measured > v.p_peak_threshold {
            reasons.push(format!(
                "Peak pressure {} cmH2O above limit {} cmH2O",
                v.p_peak_measured, v.p_peak_threshold
            ));
        }

        reasons
    }

    pub fn summarize(&self, patient: &PatientData) -> TriageSummary {
        let level = self.classify(patient);
        TriageSummary {
            level,
            display_level: level.binary(),
            risk_level: level.risk_number(),
            emergency: level.is_emergency(),
            headline: level.binary().headline().to_string(),
            action: level.binary().action().to_string(),
            reasons: self.reasons(patient),
        }
    }
}

/// Classify with the canonical thresholds.
pub fn classify(patient: &PatientData) -> TriageLevel {
    TriagePolicy::default().classify(patient)
}

/// View model of the triage card.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TriageSummary {
    pub level: TriageLevel,
    pub display_level: TriageLevel,
    pub risk_level: u8,
    pub emergency: bool,
    pub headline: String,
    pub action: String,
    pub reasons: Vec<String>,
}

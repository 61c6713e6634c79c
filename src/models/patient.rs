use rand::seq::SliceRandom;
use rand::Rng;
use serde::{Deserialize, Serialize};

/// Candidate display names for the demo child.
pub const CHILD_NAMES: &[&str] = &[
    "Subin", "Minseong", "Jiwoo", "Harin", "Doyun", "Yujin", "Seojun", "Yerin",
];

/// Static descriptors of the child, fixed for a session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PatientIdentity {
    pub name: String,
    pub age: u8,
    #[serde(alias = "emrDiagnosis")]
    pub diagnosis: String,
    pub compliance: String,
}

impl Default for PatientIdentity {
    fn default() -> Self {
        Self {
            name: CHILD_NAMES[0].to_string(),
            age: 3,
            diagnosis: "Bronchopulmonary dysplasia (BPD), home ventilation".to_string(),
            compliance: "Low (stiff lungs)".to_string(),
        }
    }
}

/// Live readings from the pulse oximeter and the home ventilator.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Vitals {
    /// Blood oxygen saturation, percent.
    pub spo2: u8,
    /// Respiratory rate, breaths/min.
    pub rr: u16,
    /// Peak airway pressure, cmH2O.
    pub p_peak_measured: f64,
    /// Peak pressure alarm limit, cmH2O.
    pub p_peak_threshold: f64,
    /// Driving pressure, cmH2O.
    pub p_drive_measured: f64,
    /// Tidal volume, mL.
    pub vtidal_measured: f64,
    pub vtidal_target: f64,
    /// Breath rate set on the ventilator.
    pub rate_setting: u16,
    /// Breath rate triggered by the patient.
    pub patient_rate: u16,
}

impl Vitals {
    pub const DANGER: Vitals = Vitals {
        spo2: 88,
        rr: 42,
        p_peak_measured: 32.0,
        p_peak_threshold: 30.0,
        p_drive_measured: 18.0,
        vtidal_measured: 45.0,
        vtidal_target: 60.0,
        rate_setting: 20,
        patient_rate: 42,
    };

    pub const SAFE: Vitals = Vitals {
        spo2: 98,
        rr: 24,
        p_peak_measured: 22.0,
        p_peak_threshold: 30.0,
        p_drive_measured: 12.0,
        vtidal_measured: 60.0,
        vtidal_target: 60.0,
        rate_setting: 20,
        patient_rate: 24,
    };
}

/// The shared patient record: identity plus the current vitals.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PatientData {
    #[serde(flatten)]
    pub identity: PatientIdentity,
    #[serde(flatten)]
    pub vitals: Vitals,
}

impl PatientData {
    pub fn new(identity: PatientIdentity, vitals: Vitals) -> Self {
        Self { identity, vitals }
    }
}

impl Default for PatientData {
    fn default() -> Self {
        Self::new(PatientIdentity::default(), Vitals::DANGER)
    }
}

/// Picks a display name, avoiding `exclude` whenever another candidate exists.
pub fn pick_child_name<R: Rng + ?Sized>(rng: &mut R, exclude: Option<&str>) -> String {
    let candidates: Vec<&str> = match exclude {
        Some(current) if CHILD_NAMES.len() > 1 => CHILD_NAMES
            .iter()
            .copied()
            .filter(|name| *name != current)
            .collect(),
        _ => CHILD_NAMES.to_vec(),
    };

    candidates
        .choose(rng)
        .map(|name| name.to_string())
        .unwrap_or_else(|| "our child".to_string())
}

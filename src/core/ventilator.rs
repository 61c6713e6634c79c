use serde::Serialize;

use crate::models::PatientData;

const DRIVE_PRESSURE_LIMIT: f64 = 15.0;
const TIDAL_VOLUME_OVERSHOOT: f64 = 1.2;
const RESPIRATORY_RATE_LIMIT: u16 = 40;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum GaugeStatus {
    Normal,
    Warning,
    Danger,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Gauge {
    pub value: f64,
    pub unit: &'static str,
    pub status: GaugeStatus,
    pub detail: String,
}

/// Ventilator-detail view: one gauge per reading.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VentilatorReport {
    pub peak_pressure: Gauge,
    pub drive_pressure: Gauge,
    pub tidal_volume: Gauge,
    pub respiratory_rate: Gauge,
    pub pressure_alarm: bool,
}

impl VentilatorReport {
    pub fn from_patient(patient: &PatientData) -> Self {
        let v = &patient.vitals;

        let peak_status = if v.p_peak_measured > v.p_peak_threshold {
            GaugeStatus::Danger
        } else {
            GaugeStatus::Normal
        };

        let drive_status = if v.p_drive_measured > DRIVE_PRESSURE_LIMIT {
            GaugeStatus::Warning
        } else {
            GaugeStatus::Normal
        };

        let tidal_status = if v.vtidal_measured > v.vtidal_target * TIDAL_VOLUME_OVERSHOOT {
            GaugeStatus::Warning
        } else {
            GaugeStatus::Normal
        };

        let rr_status = if v.rr > RESPIRATORY_RATE_LIMIT {
            GaugeStatus::Danger
        } else {
            GaugeStatus::Normal
        };

        Self {
            peak_pressure: Gauge {
                value: v.p_peak_measured,
                unit: "cmH2O",
                status: peak_status,
                detail: format!("limit {} cmH2O", v.p_peak_threshold),
            },
            drive_pressure: Gauge {
                value: v.p_drive_measured,
                unit: "cmH2O",
                status: drive_status,
                detail: format!("reference {DRIVE_PRESSURE_LIMIT} cmH2O"),
            },
            tidal_volume: Gauge {
                value: v.vtidal_measured,
                unit: "mL",
                status: tidal_status,
                detail: format!("target {} mL", v.vtidal_target),
            },
            respiratory_rate: Gauge {
                value: f64::from(v.rr),
                unit: "bpm",
                status: rr_status,
                detail: format!("set {} / patient {}", v.rate_setting, v.patient_rate),
            },
            pressure_alarm: peak_status == GaugeStatus::Danger,
        }
    }
}

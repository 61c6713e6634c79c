use crate::core::triage::TriagePolicy;
use crate::models::PatientData;

/// Plain-text patient summary handed to the advice service with every question.
pub fn patient_context(patient: &PatientData, policy: &TriagePolicy) -> String {
    let id = &patient.identity;
    let v = &patient.vitals;
    let level = policy.classify(patient);

    let mut context = format!(
        "[Patient profile]\n\
         - Name: {} ({} y)\n\
         - Diagnosis: {}\n\
         - Lung compliance: {}\n\n\
         [Real-time vitals]\n\
         - SpO2: {}% (target >= {}%, danger < {}%)\n\
         - Respiratory rate: {} breaths/min\n\
         - Ventilator: P-Peak {} cmH2O (limit {}), P-Drive {} cmH2O\n\
         - Tidal volume: {} mL (target {} mL)\n\
         - Rate: set {} / patient {}\n\
         - Triage level: {:?}",
        id.name,
        id.age,
        id.diagnosis,
        id.compliance,
        v.spo2,
        policy.warning_spo2_below,
        policy.emergency_spo2_below,
        v.rr,
        v.p_peak_measured,
        v.p_peak_threshold,
        v.p_drive_measured,
        v.vtidal_measured,
        v.vtidal_target,
        v.rate_setting,
        v.patient_rate,
        level,
    );

    for reason in policy.reasons(patient) {
        context.push_str("\n- Alert: ");
        context.push_str(&reason);
    }

    context
}

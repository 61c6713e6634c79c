use criterion::{black_box, criterion_group, criterion_main, Criterion};

use pediair::core::simulator::{SimulationMode, Waveform};
use pediair::core::triage::TriagePolicy;
use pediair::core::ventilator::VentilatorReport;
use pediair::models::{PatientData, PatientIdentity, Vitals};

fn classify_benchmark(c: &mut Criterion) {
    let policy = TriagePolicy::default();
    let danger = PatientData::default();
    let safe = PatientData::new(PatientIdentity::default(), Vitals::SAFE);

    c.bench_function("classify_danger", |b| {
        b.iter(|| policy.classify(black_box(&danger)))
    });
    c.bench_function("classify_safe", |b| b.iter(|| policy.classify(black_box(&safe))));
    c.bench_function("summarize_danger", |b| {
        b.iter(|| policy.summarize(black_box(&danger)))
    });
    c.bench_function("ventilator_report", |b| {
        b.iter(|| VentilatorReport::from_patient(black_box(&danger)))
    });
}

fn waveform_benchmark(c: &mut Criterion) {
    c.bench_function("safe_waveform_100_ticks", |b| {
        b.iter(|| {
            let mut waveform = Waveform::new(SimulationMode::Safe);
            let mut spo2 = waveform.baseline().spo2;
            for _ in 0..100 {
                spo2 = waveform.advance(black_box(spo2));
            }
            spo2
        })
    });
}

criterion_group!(benches, classify_benchmark, waveform_benchmark);
criterion_main!(benches);

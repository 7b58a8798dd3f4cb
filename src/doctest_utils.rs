// Internal utilities for documentation tests
// Builds small in-memory recordings so doctests don't need files on disk

use chrono::NaiveDate;

use crate::{Annotation, AnnotationSignal, EdfError, EdfFile, FileHeader, Result, Signal, SignalHeader, StandardSignal};

/// Three one-second records: a 10 Hz EEG sine at 64 Hz plus an annotation signal.
pub fn sample_file() -> Result<EdfFile> {
    let start = NaiveDate::from_ymd_opt(2024, 3, 15)
        .and_then(|date| date.and_hms_opt(22, 30, 0))
        .ok_or_else(|| EdfError::MalformedHeader("invalid sample start time".to_string()))?;

    let mut header = FileHeader::new(start, 1.0);
    header.patient_id = "DOC001 M 01-JAN-1990 Test_Patient".to_string();
    header.recording_id = "Startdate 15-MAR-2024 DOC-1 Tech Demo_Device".to_string();
    header.record_count = 3;

    let eeg = SignalHeader {
        label: "EEG Fp1".to_string(),
        transducer: "AgAgCl cup electrodes".to_string(),
        physical_dimension: "uV".to_string(),
        physical_min: -200.0,
        physical_max: 200.0,
        digital_min: -2048,
        digital_max: 2047,
        prefilter: "HP:0.1Hz LP:70Hz".to_string(),
        samples_per_record: 64,
        reserved: String::new(),
    };

    let samples = (0..64 * header.record_count)
        .map(|i| {
            let t = i as f64 / 64.0;
            50.0 * (2.0 * std::f64::consts::PI * 10.0 * t).sin()
        })
        .collect();

    let mut annotations = AnnotationSignal::new(SignalHeader::new_annotation(60));
    let mut entries: Vec<Annotation> = (0..header.record_count)
        .map(|i| Annotation::timekeeping(header.record_onset(i)))
        .collect();
    entries.insert(1, Annotation::new(0.5, None, "Lights off"));
    entries.push(Annotation::new(2.25, Some(1.5), "Arousal"));
    annotations.distribute(entries, header.record_count, header.record_duration);

    Ok(EdfFile::new(
        header,
        vec![Signal::Standard(StandardSignal::with_samples(eeg, samples)), Signal::Annotation(annotations)],
    ))
}

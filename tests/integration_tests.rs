use chrono::NaiveDate;
use edfcodec::header::write_header;
use edfcodec::{
    decode, decode_with_options, encode, Annotation, AnnotationSignal, DecodeOptions, EdfError, EdfFile, EdfReader,
    EdfWriter, FileHeader, FileType, RecordData, Signal, SignalHeader, StandardSignal,
};
use std::io::Cursor;

// 测试日志初始化（可重复调用）
fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

// 创建测试信号的辅助函数
fn create_test_eeg_signal() -> SignalHeader {
    SignalHeader {
        label: "EEG Fpz-Cz".to_string(),
        transducer: "AgAgCl electrodes".to_string(),
        physical_dimension: "uV".to_string(),
        physical_min: -200.0,
        physical_max: 200.0,
        digital_min: -2048,
        digital_max: 2047,
        prefilter: "HP:0.1Hz LP:70Hz".to_string(),
        samples_per_record: 100,
        reserved: String::new(),
    }
}

fn create_test_ecg_signal() -> SignalHeader {
    SignalHeader {
        label: "ECG Lead II".to_string(),
        transducer: "Chest electrodes".to_string(),
        physical_dimension: "mV".to_string(),
        physical_min: -5.0,
        physical_max: 5.0,
        digital_min: -32768,
        digital_max: 32767,
        prefilter: "HP:0.1Hz LP:100Hz".to_string(),
        samples_per_record: 25,
        reserved: String::new(),
    }
}

fn create_test_header(reserved: &str, record_count: usize) -> FileHeader {
    let start = NaiveDate::from_ymd_opt(2002, 3, 2).unwrap().and_hms_opt(13, 45, 7).unwrap();
    let mut header = FileHeader::new(start, 1.0);
    header.patient_id = "MCH-0234567 F 02-MAY-1951 Haagse_Harry".to_string();
    header.recording_id = "Startdate 02-MAR-2002 PSG-1234/2002 NN Telemetry03".to_string();
    header.reserved = reserved.to_string();
    header.record_count = record_count;
    header
}

/// EEG at 100 Hz, ECG at 25 Hz and an annotation signal, `records` seconds long.
fn create_test_file(records: usize) -> EdfFile {
    let header = create_test_header("EDF+C", records);

    let eeg = (0..100 * records)
        .map(|i| {
            let t = i as f64 / 100.0;
            50.0 * (2.0 * std::f64::consts::PI * 10.0 * t).sin() + 5.0 * (2.0 * std::f64::consts::PI * 50.0 * t).sin()
        })
        .collect();
    let ecg = (0..25 * records).map(|i| if i % 25 == 0 { 1.5 } else { -0.1 }).collect();

    let mut annotations = AnnotationSignal::new(SignalHeader::new_annotation(80));
    let mut entries: Vec<Annotation> = (0..records).map(|i| Annotation::timekeeping(i as f64)).collect();
    entries.push(Annotation::new(0.5, None, "Lights off"));
    entries.push(Annotation::new(1.25, Some(30.0), "Sleep stage W"));
    entries.push(Annotation::new(1.25, Some(30.0), "Movement"));
    entries.sort_by(|a, b| a.onset.total_cmp(&b.onset).then(b.description.is_empty().cmp(&a.description.is_empty())));
    annotations.distribute(entries, records, 1.0);

    EdfFile::new(
        header,
        vec![
            Signal::Standard(StandardSignal::with_samples(create_test_eeg_signal(), eeg)),
            Signal::Standard(StandardSignal::with_samples(create_test_ecg_signal(), ecg)),
            Signal::Annotation(annotations),
        ],
    )
}

#[test]
fn test_basic_write_read_cycle() {
    init_logging();
    let file = create_test_file(5);

    let mut bytes = Vec::new();
    encode(&file, &mut bytes).unwrap();
    assert_eq!(bytes.len(), 4 * 256 + 5 * (200 + 50 + 80));

    let decoded = decode(Cursor::new(&bytes)).unwrap();
    assert_eq!(decoded.header(), file.header());
    assert_eq!(decoded.header().file_type(), FileType::EdfPlusContinuous);
    assert_eq!(decoded.signal_headers(), file.signal_headers());

    // 量化误差不超过半个数字单位
    for index in 0..2 {
        let original = file.signal(index).unwrap().as_standard().unwrap();
        let restored = decoded.signal(index).unwrap().as_standard().unwrap();
        let header = original.header();
        let step = (header.physical_max - header.physical_min) / (header.digital_max - header.digital_min) as f64;

        assert_eq!(restored.samples().len(), original.samples().len());
        for (got, want) in restored.samples().iter().zip(original.samples()) {
            assert!((got - want).abs() <= step / 2.0 + 1e-9, "{} vs {}", got, want);
        }
    }

    // 注释按记录分组完整保留
    assert_eq!(decoded.signal(2).unwrap(), file.signal(2).unwrap());
    let events: Vec<String> = decoded
        .annotations()
        .filter(|a| !a.is_timekeeping())
        .map(|a| a.description)
        .collect();
    assert_eq!(events, ["Lights off", "Sleep stage W", "Movement"]);

    // 第二次编码逐字节一致
    let mut again = Vec::new();
    encode(&decoded, &mut again).unwrap();
    assert_eq!(again, bytes);
}

#[test]
fn test_header_field_layout() {
    let mut bytes = Vec::new();
    encode(&create_test_file(2), &mut bytes).unwrap();

    assert_eq!(&bytes[0..8], b"0       ");
    assert_eq!(&bytes[8..19], b"MCH-0234567");
    assert_eq!(&bytes[168..176], b"02.03.02");
    assert_eq!(&bytes[176..184], b"13.45.07");
    assert_eq!(&bytes[184..192], b"1024    ");
    assert_eq!(&bytes[192..197], b"EDF+C");
    assert_eq!(&bytes[236..244], b"2       ");
    assert_eq!(&bytes[244..252], b"1       ");
    assert_eq!(&bytes[252..256], b"3   ");

    // 信号头按字段存储
    assert_eq!(&bytes[256..272], b"EEG Fpz-Cz      ");
    assert_eq!(&bytes[272..288], b"ECG Lead II     ");
    assert_eq!(&bytes[288..304], b"EDF Annotations ");

    // 第一个数据记录的注释块以计时 TAL 开头
    let annotation_block = 1024 + 200 + 50;
    assert_eq!(&bytes[annotation_block..annotation_block + 5], b"+0\x14\x14\x00");
}

#[test]
fn test_plain_edf_without_annotations() {
    init_logging();
    let mut header = create_test_header("", 3);
    header.patient_id = "anonymous".to_string();
    let samples = (0..75).map(|i| i as f64 * 0.01).collect();
    let file = EdfFile::new(
        header,
        vec![Signal::Standard(StandardSignal::with_samples(create_test_ecg_signal(), samples))],
    );

    let mut bytes = Vec::new();
    encode(&file, &mut bytes).unwrap();
    let decoded = decode(bytes.as_slice()).unwrap();

    assert_eq!(decoded.header().file_type(), FileType::Edf);
    assert_eq!(decoded.header().patient().code, "anonymous");
    assert_eq!(decoded.annotations().count(), 0);
    assert_eq!(decoded.signal(0).unwrap().record_count(), 3);
}

#[test]
fn test_discontinuous_file_rejected_before_any_record() {
    let mut bytes = Vec::new();
    encode(&create_test_file(2), &mut bytes).unwrap();
    bytes[192..197].copy_from_slice(b"EDF+D");
    // 去掉所有数据记录：若读取了记录会得到截断错误
    bytes.truncate(1024);

    match decode(Cursor::new(bytes)) {
        Err(EdfError::UnsupportedFeature(message)) => assert_eq!(message, "EDF+D timekeeping"),
        other => panic!("unexpected result: {:?}", other.map(|f| f.header().clone())),
    }
}

#[test]
fn test_malformed_header_fields() {
    let mut bytes = Vec::new();
    encode(&create_test_file(1), &mut bytes).unwrap();

    let mut bad_duration = bytes.clone();
    bad_duration[244..252].copy_from_slice(b"one     ");
    assert!(matches!(decode(bad_duration.as_slice()), Err(EdfError::MalformedHeader(_))));

    let mut bad_header_bytes = bytes.clone();
    bad_header_bytes[184..192].copy_from_slice(b"768     ");
    assert!(matches!(decode(bad_header_bytes.as_slice()), Err(EdfError::MalformedHeader(_))));

    let mut bad_date = bytes.clone();
    bad_date[168..176].copy_from_slice(b"31.02.02");
    assert!(matches!(decode(bad_date.as_slice()), Err(EdfError::MalformedHeader(_))));

    let mut unknown_records = bytes.clone();
    unknown_records[236..244].copy_from_slice(b"-1      ");
    assert!(matches!(decode(unknown_records.as_slice()), Err(EdfError::UnsupportedFeature(_))));

    let mut bdf = bytes;
    bdf[0] = 0xff;
    assert!(matches!(decode(bdf.as_slice()), Err(EdfError::UnsupportedFeature(_))));
}

#[test]
fn test_truncated_stream() {
    let mut bytes = Vec::new();
    encode(&create_test_file(3), &mut bytes).unwrap();
    bytes.truncate(bytes.len() - 10);

    assert!(matches!(decode(bytes.as_slice()), Err(EdfError::MalformedHeader(_))));

    // 头部本身被截断时是 I/O 错误
    assert!(matches!(decode(&bytes[..100]), Err(EdfError::Io(_))));
}

#[test]
fn test_logarithmic_signal_is_unsupported() {
    let mut signal = create_test_eeg_signal();
    signal.prefilter = "sign*LN[sign*(uV-0.1)/0.5]".to_string();
    let signals = [signal];

    // 写入端直接拒绝
    assert!(matches!(
        EdfWriter::new(Vec::new(), &create_test_header("", 0), &signals),
        Err(EdfError::UnsupportedFeature(_))
    ));

    // 读取端同样拒绝
    let mut bytes = Vec::new();
    write_header(&mut bytes, &create_test_header("", 0), &signals).unwrap();
    assert!(matches!(decode(bytes.as_slice()), Err(EdfError::UnsupportedFeature(_))));
}

#[test]
fn test_digital_vs_physical_values() {
    let mut signal = create_test_eeg_signal();
    signal.samples_per_record = 4;
    let mut bytes = Vec::new();
    write_header(&mut bytes, &create_test_header("", 1), &[signal]).unwrap();
    for digital in [-2048i16, 0, 2047, 3000] {
        bytes.extend_from_slice(&digital.to_le_bytes());
    }

    let file = decode(bytes.as_slice()).unwrap();
    let samples = file.signal(0).unwrap().as_standard().unwrap().samples().to_vec();
    assert_eq!(samples[0], -200.0);
    assert!((samples[1] - 0.0488).abs() < 1e-4);
    assert_eq!(samples[2], 200.0);
    // 默认外推超出数字范围的样本
    assert!(samples[3] > 290.0);

    let clamped = decode_with_options(bytes.as_slice(), DecodeOptions::default().with_clamp_to_digital_range(true))
        .unwrap();
    assert_eq!(clamped.signal(0).unwrap().as_standard().unwrap().samples()[3], 200.0);
}

#[test]
fn test_overshoot_survives_reencoding() {
    let mut signal = create_test_eeg_signal();
    signal.samples_per_record = 4;
    let mut bytes = Vec::new();
    write_header(&mut bytes, &create_test_header("", 1), &[signal]).unwrap();
    for digital in [-2048i16, 0, 2047, 3000] {
        bytes.extend_from_slice(&digital.to_le_bytes());
    }

    let first = decode(bytes.as_slice()).unwrap();
    let overshoot = first.signal(0).unwrap().as_standard().unwrap().samples()[3];
    assert!((overshoot - 293.0891).abs() < 1e-3);

    let mut again = Vec::new();
    encode(&first, &mut again).unwrap();
    assert_eq!(again, bytes);

    let second = decode(again.as_slice()).unwrap();
    assert_eq!(second.signal(0).unwrap().as_standard().unwrap().samples()[3], overshoot);
}

#[test]
fn test_oversized_data_record_is_rejected() {
    // 头部声明的记录远超内存上限：应返回错误而不是尝试分配
    let mut signal = create_test_eeg_signal();
    signal.samples_per_record = 99_999_999;
    let signals = vec![signal; 4096];
    let mut bytes = Vec::new();
    write_header(&mut bytes, &create_test_header("", 1), &signals).unwrap();
    assert_eq!(bytes.len(), 4097 * 256);

    match decode(bytes.as_slice()) {
        Err(EdfError::MalformedHeader(message)) => assert!(message.contains("exceeds")),
        other => panic!("unexpected result: {:?}", other.map(|f| f.header().clone())),
    }
}

#[test]
fn test_non_finite_physical_range_is_rejected() {
    let mut bytes = Vec::new();
    encode(&create_test_file(1), &mut bytes).unwrap();

    // 物理最小值列：256 + 3 * (16 + 80 + 8)
    let column = 256 + 3 * 104;
    for text in [b"nan     ", b"inf     "] {
        let mut bad = bytes.clone();
        bad[column..column + 8].copy_from_slice(text);
        assert!(matches!(decode(bad.as_slice()), Err(EdfError::MalformedHeader(_))));
    }
}

#[test]
fn test_path_helpers() {
    init_logging();
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("study.edf");

    let file = create_test_file(4);
    file.save(&path).unwrap();

    let opened = EdfFile::open(&path).unwrap();
    assert_eq!(opened.header(), file.header());
    assert_eq!(opened.signal(2).unwrap(), file.signal(2).unwrap());

    let strict = EdfFile::open_with_options(&path, DecodeOptions::default().with_strict_timekeeping(true)).unwrap();
    assert_eq!(strict.header().record_count, 4);

    let mut reader = EdfReader::open(&path).unwrap();
    assert_eq!(reader.record_size(), 200 + 50 + 80);
    assert!(reader.read_record().unwrap());

    assert!(matches!(EdfFile::open(dir.path().join("missing.edf")), Err(EdfError::Io(_))));
}

#[test]
fn test_streaming_writer_to_disk() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("streamed.edf");
    let header = create_test_header("EDF+C", 2);
    let signals = [create_test_ecg_signal(), SignalHeader::new_annotation(20)];

    let mut writer = EdfWriter::create(&path, &header, &signals).unwrap();
    for record in 0..2 {
        let annotations = [Annotation::timekeeping(record as f64)];
        writer
            .write_record(&[RecordData::Samples(&[0.5; 25]), RecordData::Annotations(&annotations)])
            .unwrap();
    }
    writer.finish().unwrap();

    let file = EdfFile::open(&path).unwrap();
    let samples = file.signal(0).unwrap().as_standard().unwrap().samples();
    assert_eq!(samples.len(), 50);
    assert!(samples.iter().all(|s| (s - 0.5).abs() < 1e-3));
}

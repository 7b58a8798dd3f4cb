use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use crate::error::{EdfError, Result};
use crate::header::{record_size, write_header, FileHeader, FileType, SignalHeader};
use crate::tal::{self, Annotation, Tal};

/// Content of one signal inside one data record.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum RecordData<'a> {
    /// Physical values of a standard signal, exactly `samples_per_record` of them.
    Samples(&'a [f64]),
    /// Annotations carried by an `EDF Annotations` signal in this record.
    /// Consecutive entries with the same onset and duration share one TAL.
    Annotations(&'a [Annotation]),
    /// TALs written exactly as given.
    Tals(&'a [Tal]),
}

/// Encoding behaviour that is not fixed by the format itself.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EncodeOptions {
    /// Clamp samples into the digital range instead of letting them
    /// extrapolate up to the 16-bit limits.
    pub clamp_to_digital_range: bool,
}

impl EncodeOptions {
    pub fn with_clamp_to_digital_range(mut self, clamp: bool) -> Self {
        self.clamp_to_digital_range = clamp;
        self
    }
}

/// Record-by-record EDF/EDF+ encoder.
///
/// The header is written by the constructor, so the record count must be
/// known up front. [`finish`](EdfWriter::finish) checks that exactly that many
/// records were written.
///
/// # Examples
///
/// ```rust
/// use chrono::NaiveDate;
/// use edfcodec::{Annotation, EdfWriter, FileHeader, RecordData, SignalHeader};
///
/// let start = NaiveDate::from_ymd_opt(2024, 5, 1).unwrap().and_hms_opt(9, 0, 0).unwrap();
/// let mut header = FileHeader::new(start, 1.0);
/// header.record_count = 2;
///
/// let mut eeg = SignalHeader::new_annotation(0);
/// eeg.label = "EEG Fp1".to_string();
/// eeg.physical_dimension = "uV".to_string();
/// eeg.physical_min = -200.0;
/// eeg.physical_max = 200.0;
/// eeg.digital_min = -2048;
/// eeg.digital_max = 2047;
/// eeg.samples_per_record = 4;
///
/// let signals = [eeg, SignalHeader::new_annotation(40)];
/// let mut writer = EdfWriter::new(Vec::new(), &header, &signals)?;
///
/// for record in 0..2 {
///     let onset = record as f64;
///     let annotations = [Annotation::timekeeping(onset), Annotation::new(onset + 0.5, None, "Blink")];
///     writer.write_record(&[
///         RecordData::Samples(&[0.0, 10.0, 20.0, 10.0]),
///         RecordData::Annotations(&annotations),
///     ])?;
/// }
///
/// let bytes = writer.finish()?;
/// assert_eq!(bytes.len(), 3 * 256 + 2 * (8 + 40));
/// # Ok::<(), edfcodec::EdfError>(())
/// ```
pub struct EdfWriter<W: Write> {
    writer: W,
    signals: Vec<SignalHeader>,
    options: EncodeOptions,
    record_count: usize,
    records_written: usize,
    buffer: Vec<u8>,
}

impl EdfWriter<BufWriter<File>> {
    /// Creates (or truncates) a file on disk and writes the header into it.
    pub fn create<P: AsRef<Path>>(path: P, header: &FileHeader, signals: &[SignalHeader]) -> Result<Self> {
        let file = File::create(path)?;
        EdfWriter::new(BufWriter::new(file), header, signals)
    }
}

impl<W: Write> EdfWriter<W> {
    /// Validates the signals and writes the complete header.
    ///
    /// # Errors
    ///
    /// * `EdfError::InvalidCharacter` - a header text is not printable ASCII
    /// * `EdfError::MalformedHeader` - a value does not fit its field
    /// * `EdfError::UnsupportedFeature` - EDF+D files or logarithmic signals
    pub fn new(writer: W, header: &FileHeader, signals: &[SignalHeader]) -> Result<Self> {
        EdfWriter::with_options(writer, header, signals, EncodeOptions::default())
    }

    pub fn with_options(
        mut writer: W,
        header: &FileHeader,
        signals: &[SignalHeader],
        options: EncodeOptions,
    ) -> Result<Self> {
        if header.file_type() == FileType::EdfPlusDiscontinuous {
            return Err(EdfError::UnsupportedFeature("EDF+D timekeeping".to_string()));
        }

        for (index, signal) in signals.iter().enumerate() {
            signal.validate(index)?;
        }

        let record_size = record_size(signals)?;
        write_header(&mut writer, header, signals)?;

        log::debug!(
            "EDF header written: type={:?}, records={}, record_size={}, signals={}",
            header.file_type(),
            header.record_count,
            record_size,
            signals.len()
        );

        Ok(EdfWriter {
            writer,
            signals: signals.to_vec(),
            options,
            record_count: header.record_count,
            records_written: 0,
            buffer: Vec::with_capacity(record_size),
        })
    }

    pub fn records_written(&self) -> usize {
        self.records_written
    }

    /// Encodes and writes one data record, one entry per signal in header order.
    ///
    /// The record is assembled completely before anything is written, so a
    /// rejected record leaves the output untouched.
    pub fn write_record(&mut self, record: &[RecordData<'_>]) -> Result<()> {
        if self.records_written >= self.record_count {
            return Err(EdfError::MalformedHeader(format!(
                "header declares {} data records, no room for another",
                self.record_count
            )));
        }

        if record.len() != self.signals.len() {
            return Err(EdfError::MalformedHeader(format!(
                "data record has {} blocks but the header declares {} signals",
                record.len(),
                self.signals.len()
            )));
        }

        self.buffer.clear();
        for (index, (signal, data)) in self.signals.iter().zip(record).enumerate() {
            match *data {
                RecordData::Samples(samples) if !signal.is_annotation() => {
                    if samples.len() != signal.samples_per_record {
                        return Err(EdfError::MalformedHeader(format!(
                            "signal {} ('{}') expects {} samples per record, got {}",
                            index,
                            signal.label,
                            signal.samples_per_record,
                            samples.len()
                        )));
                    }
                    for &physical in samples {
                        // 两种转换都限制在 16 位范围内
                        let digital = if self.options.clamp_to_digital_range {
                            signal.to_digital_clamped(physical)
                        } else {
                            signal.to_digital(physical)
                        };
                        self.buffer.extend_from_slice(&(digital as i16).to_le_bytes());
                    }
                }
                RecordData::Annotations(annotations) if signal.is_annotation() => {
                    let block = tal::encode_block(annotations, signal.bytes_per_record())?;
                    self.buffer.extend_from_slice(&block);
                }
                RecordData::Tals(tals) if signal.is_annotation() => {
                    let block = tal::encode_tals(tals, signal.bytes_per_record())?;
                    self.buffer.extend_from_slice(&block);
                }
                _ => {
                    return Err(EdfError::MalformedHeader(format!(
                        "signal {} ('{}') got data of the wrong kind",
                        index, signal.label
                    )))
                }
            }
        }

        self.writer.write_all(&self.buffer)?;
        log::trace!("wrote data record {} ({} bytes)", self.records_written, self.buffer.len());
        self.records_written += 1;
        Ok(())
    }

    /// Flushes and returns the inner writer.
    ///
    /// Fails if fewer records were written than the header declares.
    pub fn finish(mut self) -> Result<W> {
        if self.records_written != self.record_count {
            return Err(EdfError::MalformedHeader(format!(
                "header declares {} data records but {} were written",
                self.record_count, self.records_written
            )));
        }

        self.writer.flush()?;
        Ok(self.writer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn header(record_count: usize) -> FileHeader {
        let start = NaiveDate::from_ymd_opt(2021, 6, 30).unwrap().and_hms_opt(23, 59, 59).unwrap();
        let mut header = FileHeader::new(start, 0.5);
        header.record_count = record_count;
        header
    }

    fn ecg() -> SignalHeader {
        let mut signal = SignalHeader::new_annotation(0);
        signal.label = "ECG".to_string();
        signal.physical_dimension = "mV".to_string();
        signal.physical_min = -5.0;
        signal.physical_max = 5.0;
        signal.digital_min = -32768;
        signal.digital_max = 32767;
        signal.samples_per_record = 3;
        signal
    }

    #[test]
    fn test_record_layout() {
        let signals = [ecg(), SignalHeader::new_annotation(16)];
        let mut writer = EdfWriter::new(Vec::new(), &header(1), &signals).unwrap();
        let annotations = [Annotation::timekeeping(0.0)];
        writer
            .write_record(&[RecordData::Samples(&[-5.0, 5.0, 100.0]), RecordData::Annotations(&annotations)])
            .unwrap();
        let bytes = writer.finish().unwrap();

        let record = &bytes[3 * 256..];
        assert_eq!(record.len(), 6 + 16);
        assert_eq!(&record[0..2], &(-32768i16).to_le_bytes());
        assert_eq!(&record[2..4], &32767i16.to_le_bytes());
        // 超出 16 位范围的值被限制
        assert_eq!(&record[4..6], &32767i16.to_le_bytes());
        assert_eq!(&record[6..], b"+0\x14\x14\x00\x00\x00\x00\x00\x00\x00\x00\x00\x00\x00\x00");
    }

    fn narrow_ecg() -> SignalHeader {
        let mut signal = ecg();
        signal.digital_min = -2048;
        signal.digital_max = 2047;
        signal
    }

    #[test]
    fn test_overshoot_extrapolates_unless_clamped() {
        let signal = narrow_ecg();
        let overshoot = signal.to_physical(3000);

        let mut writer = EdfWriter::new(Vec::new(), &header(1), &[signal.clone()]).unwrap();
        writer.write_record(&[RecordData::Samples(&[overshoot, 0.0, -100.0])]).unwrap();
        let bytes = writer.finish().unwrap();
        let record = &bytes[2 * 256..];
        assert_eq!(&record[0..2], &3000i16.to_le_bytes());
        assert_eq!(&record[4..6], &(-32768i16).to_le_bytes());

        let options = EncodeOptions::default().with_clamp_to_digital_range(true);
        let mut writer = EdfWriter::with_options(Vec::new(), &header(1), &[signal], options).unwrap();
        writer.write_record(&[RecordData::Samples(&[overshoot, 0.0, -100.0])]).unwrap();
        let bytes = writer.finish().unwrap();
        let record = &bytes[2 * 256..];
        assert_eq!(&record[0..2], &2047i16.to_le_bytes());
        assert_eq!(&record[4..6], &(-2048i16).to_le_bytes());
    }

    #[test]
    fn test_explicit_tals_are_written_as_given() {
        let signals = [SignalHeader::new_annotation(40)];
        let tals = [
            Tal { onset: 0.0, duration: None, descriptions: vec![String::new()] },
            Tal { onset: 0.0, duration: None, descriptions: vec!["Recording starts".to_string()] },
        ];
        let mut writer = EdfWriter::new(Vec::new(), &header(1), &signals).unwrap();
        writer.write_record(&[RecordData::Tals(&tals)]).unwrap();
        let bytes = writer.finish().unwrap();

        let expected: &[u8] = b"+0\x14\x14\x00+0\x14Recording starts\x14\x00";
        assert_eq!(&bytes[2 * 256..2 * 256 + expected.len()], expected);
    }

    #[test]
    fn test_oversized_record_is_rejected_before_writing() {
        let mut signal = ecg();
        signal.samples_per_record = 99_999_999;
        let mut out = Vec::new();
        assert!(matches!(
            EdfWriter::new(&mut out, &header(1), &[signal.clone(), signal]),
            Err(EdfError::MalformedHeader(_))
        ));
        assert!(out.is_empty());
    }

    #[test]
    fn test_wrong_sample_count_is_rejected() {
        let mut writer = EdfWriter::new(Vec::new(), &header(1), &[ecg()]).unwrap();
        let err = writer.write_record(&[RecordData::Samples(&[0.0, 0.0])]).unwrap_err();
        assert!(matches!(err, EdfError::MalformedHeader(_)));
        assert_eq!(writer.records_written(), 0);
    }

    #[test]
    fn test_wrong_data_kind_is_rejected() {
        let mut writer = EdfWriter::new(Vec::new(), &header(1), &[ecg()]).unwrap();
        let err = writer.write_record(&[RecordData::Annotations(&[])]).unwrap_err();
        assert!(matches!(err, EdfError::MalformedHeader(_)));
    }

    #[test]
    fn test_record_count_is_enforced() {
        let mut writer = EdfWriter::new(Vec::new(), &header(1), &[ecg()]).unwrap();
        writer.write_record(&[RecordData::Samples(&[0.0; 3])]).unwrap();
        assert!(writer.write_record(&[RecordData::Samples(&[0.0; 3])]).is_err());

        let short = EdfWriter::new(Vec::new(), &header(2), &[ecg()]).unwrap();
        assert!(matches!(short.finish(), Err(EdfError::MalformedHeader(_))));
    }

    #[test]
    fn test_discontinuous_header_is_rejected() {
        let mut header = header(0);
        header.reserved = "EDF+D".to_string();
        assert!(matches!(
            EdfWriter::new(Vec::new(), &header, &[ecg()]),
            Err(EdfError::UnsupportedFeature(_))
        ));
    }

    #[test]
    fn test_invalid_header_text_is_rejected() {
        let mut signal = ecg();
        signal.physical_dimension = "µV".to_string();
        assert!(matches!(
            EdfWriter::new(Vec::new(), &header(0), &[signal]),
            Err(EdfError::InvalidCharacter { .. })
        ));
    }
}

use std::io::{Read, Write};

use chrono::{Datelike, Duration, NaiveDate, NaiveDateTime, NaiveTime, Timelike};

use crate::error::{EdfError, Result};
use crate::field;
use crate::{ANNOTATION_LABEL, HEADER_BLOCK_SIZE, MAX_RECORD_SIZE, MAX_SIGNALS};

/// File subtype, taken from the first bytes of the reserved field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileType {
    /// Plain EDF, no timekeeping convention.
    Edf,
    /// EDF+C: records are contiguous in time.
    EdfPlusContinuous,
    /// EDF+D: every record carries its own start time.
    EdfPlusDiscontinuous,
}

impl FileType {
    pub fn from_reserved(reserved: &str) -> Self {
        if reserved.starts_with("EDF+C") {
            FileType::EdfPlusContinuous
        } else if reserved.starts_with("EDF+D") {
            FileType::EdfPlusDiscontinuous
        } else {
            FileType::Edf
        }
    }

    pub fn is_edf_plus(&self) -> bool {
        !matches!(self, FileType::Edf)
    }
}

/// The global part of the header (first 256 bytes).
///
/// Header byte count and signal count are derived from the signals on write
/// and are therefore not stored.
///
/// # Examples
///
/// ```rust
/// use chrono::NaiveDate;
/// use edfcodec::{FileHeader, FileType};
///
/// let start = NaiveDate::from_ymd_opt(2024, 3, 15).unwrap().and_hms_opt(22, 30, 0).unwrap();
/// let mut header = FileHeader::new(start, 30.0);
/// header.reserved = "EDF+C".to_string();
/// header.record_count = 4;
///
/// assert_eq!(header.file_type(), FileType::EdfPlusContinuous);
/// assert_eq!(header.record_onset(2), 60.0);
/// assert_eq!(
///     header.record_start(3)?,
///     NaiveDate::from_ymd_opt(2024, 3, 15).unwrap().and_hms_opt(22, 31, 30).unwrap()
/// );
/// # Ok::<(), edfcodec::EdfError>(())
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct FileHeader {
    pub version: String,
    pub patient_id: String,
    pub recording_id: String,
    pub start_date: NaiveDate,
    pub start_time: NaiveTime,
    pub reserved: String,
    pub record_count: usize,
    /// Seconds covered by one data record.
    pub record_duration: f64,
}

impl FileHeader {
    /// Creates an anonymized EDF+C header with no records.
    pub fn new(start: NaiveDateTime, record_duration: f64) -> Self {
        FileHeader {
            version: "0".to_string(),
            patient_id: "X X X X".to_string(),
            recording_id: "Startdate X X X X".to_string(),
            start_date: start.date(),
            start_time: start.time(),
            reserved: "EDF+C".to_string(),
            record_count: 0,
            record_duration,
        }
    }

    pub fn file_type(&self) -> FileType {
        FileType::from_reserved(&self.reserved)
    }

    pub fn start_datetime(&self) -> NaiveDateTime {
        self.start_date.and_time(self.start_time)
    }

    /// Seconds from recording start to the start of record `index`.
    pub fn record_onset(&self, index: usize) -> f64 {
        index as f64 * self.record_duration
    }

    /// Nominal start time of record `index`.
    pub fn record_start(&self, index: usize) -> Result<NaiveDateTime> {
        let nanos = (self.record_onset(index) * 1e9).round() as i64;
        self.start_datetime()
            .checked_add_signed(Duration::nanoseconds(nanos))
            .ok_or_else(|| EdfError::MalformedHeader(format!("start time of record {} is out of range", index)))
    }

    pub fn duration(&self) -> f64 {
        self.record_onset(self.record_count)
    }

    /// EDF+ patient subfields. Missing subfields are empty strings.
    pub fn patient(&self) -> PatientInfo {
        let parts: Vec<&str> = self.patient_id.split_whitespace().collect();

        PatientInfo {
            code: parts.first().unwrap_or(&"").to_string(),
            sex: parts.get(1).unwrap_or(&"").to_string(),
            birthdate: parts.get(2).unwrap_or(&"").to_string(),
            name: parts.get(3).unwrap_or(&"").to_string(),
            additional: parts.get(4..).map(|s| s.join(" ")).unwrap_or_default(),
        }
    }

    /// EDF+ recording subfields, or `None` if the field does not start with `Startdate`.
    pub fn recording(&self) -> Option<RecordingInfo> {
        let parts: Vec<&str> = self.recording_id.split_whitespace().collect();
        if parts.first() != Some(&"Startdate") {
            return None;
        }

        Some(RecordingInfo {
            startdate: parts.get(1).unwrap_or(&"").to_string(),
            admin_code: parts.get(2).unwrap_or(&"").to_string(),
            technician: parts.get(3).unwrap_or(&"").to_string(),
            equipment: parts.get(4).unwrap_or(&"").to_string(),
            additional: parts.get(5..).map(|s| s.join(" ")).unwrap_or_default(),
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PatientInfo {
    pub code: String,
    pub sex: String,
    pub birthdate: String,
    pub name: String,
    pub additional: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordingInfo {
    pub startdate: String,
    pub admin_code: String,
    pub technician: String,
    pub equipment: String,
    pub additional: String,
}

/// Per-channel header (256 bytes per signal, stored field by field).
#[derive(Debug, Clone, PartialEq)]
pub struct SignalHeader {
    pub label: String,
    pub transducer: String,
    pub physical_dimension: String,
    pub physical_min: f64,
    pub physical_max: f64,
    pub digital_min: i32,
    pub digital_max: i32,
    pub prefilter: String,
    pub samples_per_record: usize,
    pub reserved: String,
}

impl SignalHeader {
    /// Header of an `EDF Annotations` signal holding `bytes_per_record` TAL bytes per record.
    ///
    /// Odd byte counts are rounded up to whole 2-byte samples.
    pub fn new_annotation(bytes_per_record: usize) -> Self {
        SignalHeader {
            label: ANNOTATION_LABEL.to_string(),
            transducer: String::new(),
            physical_dimension: String::new(),
            physical_min: -1.0,
            physical_max: 1.0,
            digital_min: -32768,
            digital_max: 32767,
            prefilter: String::new(),
            samples_per_record: bytes_per_record.div_ceil(2),
            reserved: String::new(),
        }
    }

    pub fn is_annotation(&self) -> bool {
        self.label.trim_end() == ANNOTATION_LABEL
    }

    /// Size of this signal's block inside one data record.
    pub fn bytes_per_record(&self) -> usize {
        self.samples_per_record * 2
    }

    /// Whether the prefiltering field declares the EDF logarithmic transformation.
    pub fn is_log_transformed(&self) -> bool {
        self.prefilter.to_ascii_uppercase().contains("LN[")
    }

    /// Converts a digital sample to physical units.
    ///
    /// Values outside the digital range are extrapolated. A degenerate physical
    /// range maps every sample to `physical_min`.
    ///
    /// ```rust
    /// use edfcodec::SignalHeader;
    ///
    /// let mut signal = SignalHeader::new_annotation(0);
    /// signal.label = "EEG C3".to_string();
    /// signal.digital_min = -2048;
    /// signal.digital_max = 2047;
    /// signal.physical_min = -200.0;
    /// signal.physical_max = 200.0;
    ///
    /// assert_eq!(signal.to_physical(-2048), -200.0);
    /// assert_eq!(signal.to_physical(2047), 200.0);
    /// assert!((signal.to_physical(0) - 0.0488).abs() < 1e-4);
    /// ```
    pub fn to_physical(&self, digital: i32) -> f64 {
        let digital_span = self.digital_max as f64 - self.digital_min as f64;
        if digital_span == 0.0 || self.physical_min == self.physical_max {
            return self.physical_min;
        }

        let t = (digital as f64 - self.digital_min as f64) / digital_span;
        self.physical_min + t * (self.physical_max - self.physical_min)
    }

    /// Converts a physical value to the nearest 16-bit sample.
    ///
    /// Values outside the physical range extrapolate past the digital range
    /// up to the `i16` limits, so a decoded overshoot encodes back to the same
    /// raw sample.
    ///
    /// ```rust
    /// use edfcodec::SignalHeader;
    ///
    /// let mut signal = SignalHeader::new_annotation(0);
    /// signal.label = "EEG C3".to_string();
    /// signal.digital_min = -2048;
    /// signal.digital_max = 2047;
    /// signal.physical_min = -200.0;
    /// signal.physical_max = 200.0;
    ///
    /// assert_eq!(signal.to_digital(signal.to_physical(3000)), 3000);
    /// assert_eq!(signal.to_digital_clamped(signal.to_physical(3000)), 2047);
    /// assert_eq!(signal.to_digital(1e9), i16::MAX as i32);
    /// ```
    pub fn to_digital(&self, physical: f64) -> i32 {
        let physical_span = self.physical_max - self.physical_min;
        if physical_span == 0.0 || !physical.is_finite() {
            return self.digital_min;
        }

        let t = (physical - self.physical_min) / physical_span;
        let digital = self.digital_min as f64 + t * (self.digital_max as f64 - self.digital_min as f64);
        (digital.round() as i64).clamp(i16::MIN as i64, i16::MAX as i64) as i32
    }

    /// Like [`to_digital`](SignalHeader::to_digital), then clamped into the digital range.
    pub fn to_digital_clamped(&self, physical: f64) -> i32 {
        let (low, high) = self.digital_bounds();
        self.to_digital(physical).clamp(low, high)
    }

    /// Digital range ordered low to high.
    pub fn digital_bounds(&self) -> (i32, i32) {
        (self.digital_min.min(self.digital_max), self.digital_min.max(self.digital_max))
    }

    /// Checks the calibration of a standard signal. Annotation signals always pass.
    pub fn validate(&self, index: usize) -> Result<()> {
        if self.is_annotation() {
            return Ok(());
        }

        if self.is_log_transformed() {
            return Err(EdfError::UnsupportedFeature(format!(
                "logarithmic transformation on signal {} ('{}')",
                index, self.label
            )));
        }

        if !self.physical_min.is_finite() || !self.physical_max.is_finite() {
            return Err(EdfError::MalformedHeader(format!(
                "signal {} ('{}') has a non-finite physical range {}..{}",
                index, self.label, self.physical_min, self.physical_max
            )));
        }

        if self.digital_min == self.digital_max {
            return Err(EdfError::MalformedHeader(format!(
                "signal {} ('{}') has digital minimum equal to digital maximum ({})",
                index, self.label, self.digital_min
            )));
        }

        let i16_range = i16::MIN as i32..=i16::MAX as i32;
        if !i16_range.contains(&self.digital_min) || !i16_range.contains(&self.digital_max) {
            return Err(EdfError::MalformedHeader(format!(
                "signal {} ('{}') digital range {}..{} exceeds 16 bits",
                index, self.label, self.digital_min, self.digital_max
            )));
        }

        if self.digital_min > self.digital_max {
            log::warn!(
                "signal {} ('{}') has digital minimum {} above digital maximum {}",
                index, self.label, self.digital_min, self.digital_max
            );
        }

        if self.physical_min == self.physical_max {
            log::warn!(
                "signal {} ('{}') has a constant physical range ({}); samples decode to that value",
                index, self.label, self.physical_min
            );
        }

        Ok(())
    }
}

/// Size in bytes of one data record holding every signal's block.
///
/// Fails with `MalformedHeader` on overflow or when the record would exceed
/// [`MAX_RECORD_SIZE`].
pub fn record_size(signals: &[SignalHeader]) -> Result<usize> {
    let mut total: usize = 0;
    for (index, signal) in signals.iter().enumerate() {
        let size = signal
            .samples_per_record
            .checked_mul(2)
            .and_then(|bytes| total.checked_add(bytes))
            .filter(|&size| size <= MAX_RECORD_SIZE);

        total = size.ok_or_else(|| {
            EdfError::MalformedHeader(format!(
                "data record exceeds {} bytes at signal {} ('{}', {} samples per record)",
                MAX_RECORD_SIZE, index, signal.label, signal.samples_per_record
            ))
        })?;
    }
    Ok(total)
}

/// Reads the global header and all signal headers.
pub fn read_header<R: Read>(reader: &mut R) -> Result<(FileHeader, Vec<SignalHeader>)> {
    let version = field::read_text(reader, 8)?;
    if !version.starts_with('0') {
        return Err(EdfError::UnsupportedFeature(format!("file version {:?}", version)));
    }

    let patient_id = field::read_text(reader, 80)?;
    let recording_id = field::read_text(reader, 80)?;
    let date_text = field::read_text(reader, 8)?;
    let time_text = field::read_text(reader, 8)?;
    let (start_date, start_time) = parse_datetime(&date_text, &time_text)?;

    let header_bytes: usize = field::read_number(reader, 8, "number of header bytes")?;
    let reserved = field::read_text(reader, 44)?;

    let record_count: i64 = field::read_number(reader, 8, "number of data records")?;
    if record_count == -1 {
        return Err(EdfError::UnsupportedFeature("unknown number of data records (-1)".to_string()));
    }
    let record_count = usize::try_from(record_count)
        .map_err(|_| EdfError::MalformedHeader(format!("negative number of data records: {}", record_count)))?;

    let record_duration: f64 = field::read_number(reader, 8, "duration of a data record")?;
    if !record_duration.is_finite() || record_duration < 0.0 {
        return Err(EdfError::MalformedHeader(format!("invalid data record duration: {}", record_duration)));
    }

    let signal_count: usize = field::read_number(reader, 4, "number of signals")?;
    if signal_count == 0 || signal_count > MAX_SIGNALS {
        return Err(EdfError::MalformedHeader(format!("invalid number of signals: {}", signal_count)));
    }

    let expected_bytes = (signal_count + 1) * HEADER_BLOCK_SIZE;
    if header_bytes != expected_bytes {
        return Err(EdfError::MalformedHeader(format!(
            "header declares {} bytes but {} signals need {}",
            header_bytes, signal_count, expected_bytes
        )));
    }

    let signals = read_signal_headers(reader, signal_count)?;

    let header = FileHeader {
        version,
        patient_id,
        recording_id,
        start_date,
        start_time,
        reserved,
        record_count,
        record_duration,
    };

    log::debug!(
        "EDF header parsed: type={:?}, records={}, record_duration={}, signals={}",
        header.file_type(),
        header.record_count,
        header.record_duration,
        signals.len()
    );

    Ok((header, signals))
}

fn read_column<R: Read, T>(
    reader: &mut R,
    count: usize,
    mut read: impl FnMut(&mut R) -> Result<T>,
) -> Result<Vec<T>> {
    (0..count).map(|_| read(&mut *reader)).collect()
}

/// 信号头按字段存储：先是所有标签，再是所有传感器，依此类推
fn read_signal_headers<R: Read>(reader: &mut R, count: usize) -> Result<Vec<SignalHeader>> {
    let labels = read_column(reader, count, |r| field::read_text(r, 16))?;
    let transducers = read_column(reader, count, |r| field::read_text(r, 80))?;
    let dimensions = read_column(reader, count, |r| field::read_text(r, 8))?;
    let physical_mins = read_column(reader, count, |r| field::read_number::<_, f64>(r, 8, "physical minimum"))?;
    let physical_maxs = read_column(reader, count, |r| field::read_number::<_, f64>(r, 8, "physical maximum"))?;
    let digital_mins = read_column(reader, count, |r| field::read_number::<_, i32>(r, 8, "digital minimum"))?;
    let digital_maxs = read_column(reader, count, |r| field::read_number::<_, i32>(r, 8, "digital maximum"))?;
    let prefilters = read_column(reader, count, |r| field::read_text(r, 80))?;
    let samples = read_column(reader, count, |r| field::read_number::<_, usize>(r, 8, "number of samples per record"))?;
    let reserved = read_column(reader, count, |r| field::read_text(r, 32))?;

    let mut signals = Vec::with_capacity(count);
    for i in 0..count {
        signals.push(SignalHeader {
            label: labels[i].clone(),
            transducer: transducers[i].clone(),
            physical_dimension: dimensions[i].clone(),
            physical_min: physical_mins[i],
            physical_max: physical_maxs[i],
            digital_min: digital_mins[i],
            digital_max: digital_maxs[i],
            prefilter: prefilters[i].clone(),
            samples_per_record: samples[i],
            reserved: reserved[i].clone(),
        });
    }

    Ok(signals)
}

/// Writes the global header followed by the signal headers.
pub fn write_header<W: Write>(writer: &mut W, header: &FileHeader, signals: &[SignalHeader]) -> Result<()> {
    if signals.is_empty() || signals.len() > MAX_SIGNALS {
        return Err(EdfError::MalformedHeader(format!("invalid number of signals: {}", signals.len())));
    }

    let year = header.start_date.year();
    if !(1985..=2084).contains(&year) {
        return Err(EdfError::MalformedHeader(format!("start year {} cannot be stored in a dd.mm.yy field", year)));
    }

    let date_text = format!(
        "{:02}.{:02}.{:02}",
        header.start_date.day(),
        header.start_date.month(),
        year % 100
    );
    let time_text = format!(
        "{:02}.{:02}.{:02}",
        header.start_time.hour(),
        header.start_time.minute(),
        header.start_time.second()
    );
    let header_bytes = (signals.len() + 1) * HEADER_BLOCK_SIZE;

    field::write_text(writer, &header.version, 8, "version")?;
    field::write_text(writer, &header.patient_id, 80, "patient identification")?;
    field::write_text(writer, &header.recording_id, 80, "recording identification")?;
    field::write_text(writer, &date_text, 8, "start date")?;
    field::write_text(writer, &time_text, 8, "start time")?;
    field::write_number(writer, header_bytes as f64, 8, "number of header bytes")?;
    field::write_text(writer, &header.reserved, 44, "reserved")?;
    field::write_number(writer, header.record_count as f64, 8, "number of data records")?;
    field::write_number(writer, header.record_duration, 8, "duration of a data record")?;
    field::write_number(writer, signals.len() as f64, 4, "number of signals")?;

    for signal in signals {
        field::write_text(writer, &signal.label, 16, "label")?;
    }
    for signal in signals {
        field::write_text(writer, &signal.transducer, 80, "transducer type")?;
    }
    for signal in signals {
        field::write_text(writer, &signal.physical_dimension, 8, "physical dimension")?;
    }
    for signal in signals {
        field::write_number(writer, signal.physical_min, 8, "physical minimum")?;
    }
    for signal in signals {
        field::write_number(writer, signal.physical_max, 8, "physical maximum")?;
    }
    for signal in signals {
        field::write_number(writer, signal.digital_min as f64, 8, "digital minimum")?;
    }
    for signal in signals {
        field::write_number(writer, signal.digital_max as f64, 8, "digital maximum")?;
    }
    for signal in signals {
        field::write_text(writer, &signal.prefilter, 80, "prefiltering")?;
    }
    for signal in signals {
        field::write_number(writer, signal.samples_per_record as f64, 8, "number of samples per record")?;
    }
    for signal in signals {
        field::write_text(writer, &signal.reserved, 32, "signal reserved")?;
    }

    Ok(())
}

/// 解析日期 "dd.mm.yy" 和时间 "hh.mm.ss"
fn parse_datetime(date_text: &str, time_text: &str) -> Result<(NaiveDate, NaiveTime)> {
    let [day, month, yy] = split_triplet(date_text, "start date")?;
    let year = if yy >= 85 { 1900 + yy } else { 2000 + yy };

    let start_date = NaiveDate::from_ymd_opt(year as i32, month, day)
        .ok_or_else(|| EdfError::MalformedHeader(format!("invalid start date: {:?}", date_text)))?;

    let [hour, minute, second] = split_triplet(time_text, "start time")?;
    let start_time = NaiveTime::from_hms_opt(hour, minute, second)
        .ok_or_else(|| EdfError::MalformedHeader(format!("invalid start time: {:?}", time_text)))?;

    Ok((start_date, start_time))
}

fn split_triplet(text: &str, name: &str) -> Result<[u32; 3]> {
    let parts: Vec<&str> = text.split('.').collect();
    if parts.len() != 3 {
        return Err(EdfError::MalformedHeader(format!("{} is not in dd.dd.dd form: {:?}", name, text)));
    }

    Ok([
        field::parse_number(parts[0], name)?,
        field::parse_number(parts[1], name)?,
        field::parse_number(parts[2], name)?,
    ])
}

use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;

use crate::error::{EdfError, Result};
use crate::file::EdfFile;
use crate::header::{read_header, record_size, FileHeader, FileType};
use crate::signal::{allocate_signals, Block, Signal};

/// Onsets closer than this are considered equal by the timekeeping check.
const TIMEKEEPING_TOLERANCE: f64 = 1e-6;

/// Decoding behaviour that is not fixed by the format itself.
///
/// # Examples
///
/// ```rust
/// use edfcodec::DecodeOptions;
///
/// let options = DecodeOptions::default()
///     .with_strict_timekeeping(true)
///     .with_clamp_to_digital_range(true);
///
/// assert!(options.strict_timekeeping);
/// assert!(options.clamp_to_digital_range);
/// ```
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DecodeOptions {
    /// Fail with `TimingMismatch` when an EDF+C timekeeping annotation
    /// disagrees with the computed record start. Otherwise the mismatch is
    /// only logged.
    pub strict_timekeeping: bool,
    /// Clamp raw samples into the digital range before calibration instead
    /// of extrapolating.
    pub clamp_to_digital_range: bool,
}

impl DecodeOptions {
    pub fn with_strict_timekeeping(mut self, strict: bool) -> Self {
        self.strict_timekeeping = strict;
        self
    }

    pub fn with_clamp_to_digital_range(mut self, clamp: bool) -> Self {
        self.clamp_to_digital_range = clamp;
        self
    }
}

/// Record-by-record EDF/EDF+ decoder over any byte stream.
///
/// The header is read and validated by the constructor. Every call to
/// [`read_record`](EdfReader::read_record) then decodes exactly one data
/// record, so a caller can stop between records at any time.
///
/// # Examples
///
/// ```rust
/// use std::io::Cursor;
/// use edfcodec::{EdfReader, encode};
///
/// # let file = edfcodec::doctest_utils::sample_file()?;
/// # let mut bytes = Vec::new();
/// # encode(&file, &mut bytes)?;
/// let mut reader = EdfReader::new(Cursor::new(bytes))?;
/// println!("{} records of {} s", reader.header().record_count, reader.header().record_duration);
///
/// let cancelled = false;
/// while !cancelled && reader.read_record()? {
///     println!("record {} decoded", reader.records_read() - 1);
/// }
///
/// let file = reader.into_file();
/// assert_eq!(file.signals().len(), 2);
/// # Ok::<(), edfcodec::EdfError>(())
/// ```
pub struct EdfReader<R: Read> {
    reader: R,
    header: FileHeader,
    signals: Vec<Signal>,
    options: DecodeOptions,
    /// 每个数据记录的大小（字节）
    record_size: usize,
    records_read: usize,
    buffer: Vec<u8>,
    /// 第一个记录的计时注释起点
    first_onset: Option<f64>,
}

impl EdfReader<BufReader<File>> {
    /// Opens a file on disk with default options.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = File::open(path)?;
        EdfReader::new(BufReader::new(file))
    }
}

impl<R: Read> EdfReader<R> {
    pub fn new(reader: R) -> Result<Self> {
        EdfReader::with_options(reader, DecodeOptions::default())
    }

    /// Reads the header and allocates one signal per signal header.
    ///
    /// # Errors
    ///
    /// * `EdfError::MalformedHeader` - unparsable field or inconsistent counts
    /// * `EdfError::UnsupportedFeature` - EDF+D files, logarithmic signals,
    ///   unknown record count
    pub fn with_options(mut reader: R, options: DecodeOptions) -> Result<Self> {
        let (header, signal_headers) = read_header(&mut reader)?;

        if header.file_type() == FileType::EdfPlusDiscontinuous {
            return Err(EdfError::UnsupportedFeature("EDF+D timekeeping".to_string()));
        }

        for (index, signal) in signal_headers.iter().enumerate() {
            signal.validate(index)?;
        }

        let record_size = record_size(&signal_headers)?;
        let signals = allocate_signals(signal_headers);

        Ok(EdfReader {
            reader,
            header,
            signals,
            options,
            record_size,
            records_read: 0,
            buffer: Vec::new(),
            first_onset: None,
        })
    }

    pub fn header(&self) -> &FileHeader {
        &self.header
    }

    /// Signals with every record decoded so far.
    pub fn signals(&self) -> &[Signal] {
        &self.signals
    }

    pub fn options(&self) -> DecodeOptions {
        self.options
    }

    pub fn records_read(&self) -> usize {
        self.records_read
    }

    /// Bytes in one data record across all signals.
    pub fn record_size(&self) -> usize {
        self.record_size
    }

    /// Decodes the next data record.
    ///
    /// Returns `Ok(false)` once all declared records have been read. A record
    /// is committed to the signals only after every block in it decoded, so
    /// an error leaves the signals exactly as they were after the previous
    /// record.
    pub fn read_record(&mut self) -> Result<bool> {
        let index = self.records_read;
        if index >= self.header.record_count {
            return Ok(false);
        }

        let start = self.header.record_start(index)?;
        log::trace!("reading data record {} (starts {})", index, start);

        // 缓冲区随实际读到的数据增长，不按头部声明的大小预先分配
        self.buffer.clear();
        (&mut self.reader).take(self.record_size as u64).read_to_end(&mut self.buffer)?;
        if self.buffer.len() < self.record_size {
            return Err(EdfError::MalformedHeader(format!(
                "stream ends inside data record {} of {}",
                index, self.header.record_count
            )));
        }

        let mut blocks = Vec::with_capacity(self.signals.len());
        let mut offset = 0;
        for signal in &self.signals {
            let len = signal.header().bytes_per_record();
            blocks.push(signal.decode_block(&self.buffer[offset..offset + len], &self.options)?);
            offset += len;
        }

        if self.header.file_type() == FileType::EdfPlusContinuous {
            self.check_timekeeping(index, &blocks)?;
        }

        for (signal, block) in self.signals.iter_mut().zip(blocks) {
            signal.commit(block);
        }
        self.records_read += 1;

        Ok(true)
    }

    /// Compares the record's timekeeping annotation with the start computed
    /// from the first record's onset.
    fn check_timekeeping(&mut self, index: usize, blocks: &[Block]) -> Result<()> {
        let first_annotations = blocks.iter().find_map(|block| match block {
            Block::Tals(tals) => Some(tals),
            Block::Samples(_) => None,
        });
        // EDF+C 文件没有注释信号时不检查
        let Some(tals) = first_annotations else {
            return Ok(());
        };

        let Some(timekeeping) = tals.first().filter(|tal| tal.is_timekeeping()) else {
            let message = format!("data record {} has no timekeeping annotation", index);
            if self.options.strict_timekeeping {
                return Err(EdfError::malformed_annotation(0, message));
            }
            log::warn!("{}", message);
            return Ok(());
        };

        let base = *self.first_onset.get_or_insert(timekeeping.onset - self.header.record_onset(index));
        let expected = base + self.header.record_onset(index);
        if (timekeeping.onset - expected).abs() <= TIMEKEEPING_TOLERANCE {
            return Ok(());
        }

        if self.options.strict_timekeeping {
            return Err(EdfError::TimingMismatch {
                record: index,
                expected,
                found: timekeeping.onset,
            });
        }
        log::warn!(
            "data record {} timekeeping annotation says {}s, expected {}s",
            index, timekeeping.onset, expected
        );
        Ok(())
    }

    /// Decodes all remaining records and returns the complete file.
    pub fn read_to_end(mut self) -> Result<EdfFile> {
        while self.read_record()? {}
        log::debug!("decoded {} data records", self.records_read);
        Ok(self.into_file())
    }

    /// Returns what has been decoded so far, e.g. after a caller stopped early.
    ///
    /// The header still declares the full record count; use
    /// [`records_read`](EdfReader::records_read) to see how many are present.
    pub fn into_file(self) -> EdfFile {
        EdfFile::new(self.header, self.signals)
    }
}

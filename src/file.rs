use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::Path;

use crate::error::{EdfError, Result};
use crate::header::{FileHeader, SignalHeader};
use crate::reader::{DecodeOptions, EdfReader};
use crate::signal::Signal;
use crate::tal::Annotation;
use crate::writer::EdfWriter;

/// A decoded recording: the header plus one signal per signal header.
///
/// The number of signals is fixed when the file is built. Their content can
/// be changed through [`signals_mut`](EdfFile::signals_mut), and
/// [`write_to`](EdfFile::write_to) checks that every signal holds exactly
/// `header().record_count` records before writing anything.
///
/// # Examples
///
/// ```rust
/// use std::io::Cursor;
/// use edfcodec::EdfFile;
///
/// let file = edfcodec::doctest_utils::sample_file()?;
///
/// let mut bytes = Vec::new();
/// file.write_to(&mut bytes)?;
/// let decoded = EdfFile::read_from(Cursor::new(bytes))?;
///
/// assert_eq!(decoded.header(), file.header());
/// for annotation in decoded.annotations().filter(|a| !a.is_timekeeping()) {
///     println!("{:+}s {}", annotation.onset, annotation.description);
/// }
/// # Ok::<(), edfcodec::EdfError>(())
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct EdfFile {
    header: FileHeader,
    signals: Vec<Signal>,
}

impl EdfFile {
    pub fn new(header: FileHeader, signals: Vec<Signal>) -> Self {
        EdfFile { header, signals }
    }

    pub fn header(&self) -> &FileHeader {
        &self.header
    }

    pub fn header_mut(&mut self) -> &mut FileHeader {
        &mut self.header
    }

    pub fn signals(&self) -> &[Signal] {
        &self.signals
    }

    /// Mutable access to the signals. The slice cannot grow or shrink.
    pub fn signals_mut(&mut self) -> &mut [Signal] {
        &mut self.signals
    }

    pub fn signal(&self, index: usize) -> Result<&Signal> {
        self.signals.get(index).ok_or(EdfError::InvalidSignalIndex(index))
    }

    pub fn signal_mut(&mut self, index: usize) -> Result<&mut Signal> {
        self.signals.get_mut(index).ok_or(EdfError::InvalidSignalIndex(index))
    }

    /// First signal with the given label, ignoring trailing spaces.
    pub fn signal_by_label(&self, label: &str) -> Option<&Signal> {
        self.signals.iter().find(|s| s.label().trim_end() == label.trim_end())
    }

    pub fn signal_headers(&self) -> Vec<SignalHeader> {
        self.signals.iter().map(|s| s.header().clone()).collect()
    }

    /// Annotations of every annotation signal, signal by signal, in record order.
    pub fn annotations(&self) -> impl Iterator<Item = Annotation> + '_ {
        self.signals
            .iter()
            .filter_map(Signal::as_annotation)
            .flat_map(|signal| signal.annotations())
    }

    /// Decodes a complete file from `reader` with default options.
    pub fn read_from<R: Read>(reader: R) -> Result<Self> {
        EdfReader::new(reader)?.read_to_end()
    }

    pub fn read_from_with_options<R: Read>(reader: R, options: DecodeOptions) -> Result<Self> {
        EdfReader::with_options(reader, options)?.read_to_end()
    }

    /// Encodes the file into `writer` and returns it.
    ///
    /// Record counts are checked against the header before the first byte is
    /// written.
    pub fn write_to<W: Write>(&self, writer: W) -> Result<W> {
        let record_count = self.header.record_count;
        for (index, signal) in self.signals.iter().enumerate() {
            if !signal.holds_records(record_count) {
                return Err(EdfError::MalformedHeader(format!(
                    "signal {} ('{}') holds {} data records, header declares {}",
                    index,
                    signal.label(),
                    signal.record_count(),
                    record_count
                )));
            }
        }

        let mut writer = EdfWriter::new(writer, &self.header, &self.signal_headers())?;
        for index in 0..record_count {
            let record = self
                .signals
                .iter()
                .map(|signal| signal.record_data(index))
                .collect::<Result<Vec<_>>>()?;
            writer.write_record(&record)?;
        }

        writer.finish()
    }

    /// Opens and decodes a file on disk.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use edfcodec::EdfFile;
    ///
    /// # let dir = std::env::temp_dir().join(format!("edfcodec-doc-{}", std::process::id()));
    /// # std::fs::create_dir_all(&dir)?;
    /// # let path = dir.join("night.edf");
    /// # edfcodec::doctest_utils::sample_file()?.save(&path)?;
    /// let file = EdfFile::open(&path)?;
    /// println!("{} signals, {:.1} s", file.signals().len(), file.header().duration());
    /// # std::fs::remove_dir_all(&dir).ok();
    /// # Ok::<(), edfcodec::EdfError>(())
    /// ```
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        EdfReader::open(path)?.read_to_end()
    }

    /// Encodes the file to disk, replacing any existing file.
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let file = File::create(path)?;
        self.write_to(BufWriter::new(file))?;
        Ok(())
    }

    /// Opens a file on disk with explicit decoding options.
    pub fn open_with_options<P: AsRef<Path>>(path: P, options: DecodeOptions) -> Result<Self> {
        let file = File::open(path)?;
        EdfFile::read_from_with_options(BufReader::new(file), options)
    }
}

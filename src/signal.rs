use crate::error::{EdfError, Result};
use crate::header::SignalHeader;
use crate::reader::DecodeOptions;
use crate::tal::{self, Annotation, Tal};
use crate::writer::RecordData;

/// One channel of the file, chosen by the label of its header.
#[derive(Debug, Clone, PartialEq)]
pub enum Signal {
    Standard(StandardSignal),
    Annotation(AnnotationSignal),
}

/// Numeric waveform stored as calibrated physical values.
#[derive(Debug, Clone, PartialEq)]
pub struct StandardSignal {
    header: SignalHeader,
    samples: Vec<f64>,
}

/// `EDF Annotations` channel. TALs stay grouped by data record, with their
/// boundaries, so each block re-encodes to the same bytes.
#[derive(Debug, Clone, PartialEq)]
pub struct AnnotationSignal {
    header: SignalHeader,
    records: Vec<Vec<Tal>>,
}

/// Decoded content of one signal block, committed once the whole record decoded.
#[derive(Debug)]
pub(crate) enum Block {
    Samples(Vec<f64>),
    Tals(Vec<Tal>),
}

/// Builds one empty signal per header, keeping header order.
pub fn allocate_signals(headers: Vec<SignalHeader>) -> Vec<Signal> {
    headers.into_iter().map(Signal::from_header).collect()
}

impl Signal {
    pub fn from_header(header: SignalHeader) -> Self {
        if header.is_annotation() {
            Signal::Annotation(AnnotationSignal::new(header))
        } else {
            Signal::Standard(StandardSignal::new(header))
        }
    }

    pub fn header(&self) -> &SignalHeader {
        match self {
            Signal::Standard(signal) => &signal.header,
            Signal::Annotation(signal) => &signal.header,
        }
    }

    pub fn label(&self) -> &str {
        &self.header().label
    }

    pub fn is_annotation(&self) -> bool {
        matches!(self, Signal::Annotation(_))
    }

    pub fn as_standard(&self) -> Option<&StandardSignal> {
        match self {
            Signal::Standard(signal) => Some(signal),
            Signal::Annotation(_) => None,
        }
    }

    pub fn as_standard_mut(&mut self) -> Option<&mut StandardSignal> {
        match self {
            Signal::Standard(signal) => Some(signal),
            Signal::Annotation(_) => None,
        }
    }

    pub fn as_annotation(&self) -> Option<&AnnotationSignal> {
        match self {
            Signal::Annotation(signal) => Some(signal),
            Signal::Standard(_) => None,
        }
    }

    pub fn as_annotation_mut(&mut self) -> Option<&mut AnnotationSignal> {
        match self {
            Signal::Annotation(signal) => Some(signal),
            Signal::Standard(_) => None,
        }
    }

    /// Number of complete data records held.
    pub fn record_count(&self) -> usize {
        match self {
            Signal::Standard(signal) => signal.record_count(),
            Signal::Annotation(signal) => signal.records.len(),
        }
    }

    /// Whether the signal holds exactly `count` data records and nothing more.
    pub fn holds_records(&self, count: usize) -> bool {
        match self {
            Signal::Standard(signal) => signal.samples.len() == count * signal.header.samples_per_record,
            Signal::Annotation(signal) => signal.records.len() == count,
        }
    }

    pub(crate) fn decode_block(&self, bytes: &[u8], options: &DecodeOptions) -> Result<Block> {
        match self {
            Signal::Standard(signal) => Ok(Block::Samples(signal.decode_block(bytes, options.clamp_to_digital_range))),
            Signal::Annotation(_) => Ok(Block::Tals(tal::parse_tals(bytes)?)),
        }
    }

    pub(crate) fn commit(&mut self, block: Block) {
        match (self, block) {
            (Signal::Standard(signal), Block::Samples(samples)) => signal.samples.extend(samples),
            (Signal::Annotation(signal), Block::Tals(tals)) => signal.records.push(tals),
            // 块由同一信号的 decode_block 生成
            (signal, block) => unreachable!("block {:?} does not belong to signal '{}'", block, signal.label()),
        }
    }

    /// Data of record `index`, borrowed for the writer.
    pub fn record_data(&self, index: usize) -> Result<RecordData<'_>> {
        let data = match self {
            Signal::Standard(signal) => signal.record(index).map(RecordData::Samples),
            Signal::Annotation(signal) => signal.record(index).map(RecordData::Tals),
        };

        data.ok_or_else(|| {
            EdfError::MalformedHeader(format!(
                "signal '{}' holds {} data records, record {} requested",
                self.label(),
                self.record_count(),
                index
            ))
        })
    }
}

impl StandardSignal {
    pub fn new(header: SignalHeader) -> Self {
        StandardSignal { header, samples: Vec::new() }
    }

    pub fn with_samples(header: SignalHeader, samples: Vec<f64>) -> Self {
        StandardSignal { header, samples }
    }

    pub fn header(&self) -> &SignalHeader {
        &self.header
    }

    /// Physical values of all decoded records, in order.
    pub fn samples(&self) -> &[f64] {
        &self.samples
    }

    pub fn samples_mut(&mut self) -> &mut Vec<f64> {
        &mut self.samples
    }

    pub fn record_count(&self) -> usize {
        match self.header.samples_per_record {
            0 => 0,
            n => self.samples.len() / n,
        }
    }

    /// Samples of record `index`, if complete.
    pub fn record(&self, index: usize) -> Option<&[f64]> {
        let n = self.header.samples_per_record;
        self.samples.get(index * n..(index + 1) * n)
    }

    /// Converts a block of little-endian 16-bit samples to physical values.
    fn decode_block(&self, bytes: &[u8], clamp: bool) -> Vec<f64> {
        let (low, high) = self.header.digital_bounds();

        bytes
            .chunks_exact(2)
            .map(|pair| {
                let digital = i16::from_le_bytes([pair[0], pair[1]]) as i32;
                let digital = if clamp { digital.clamp(low, high) } else { digital };
                self.header.to_physical(digital)
            })
            .collect()
    }
}

impl AnnotationSignal {
    pub fn new(header: SignalHeader) -> Self {
        AnnotationSignal { header, records: Vec::new() }
    }

    pub fn header(&self) -> &SignalHeader {
        &self.header
    }

    /// TALs grouped by the data record that carries them.
    pub fn records(&self) -> &[Vec<Tal>] {
        &self.records
    }

    pub fn record(&self, index: usize) -> Option<&[Tal]> {
        self.records.get(index).map(Vec::as_slice)
    }

    /// Annotations of record `index`, one per description.
    pub fn record_annotations(&self, index: usize) -> Option<Vec<Annotation>> {
        self.record(index).map(|tals| tals.iter().flat_map(Tal::annotations).collect())
    }

    /// All annotations in file order, timekeeping entries included.
    pub fn annotations(&self) -> impl Iterator<Item = Annotation> + '_ {
        self.records.iter().flatten().flat_map(Tal::annotations)
    }

    pub fn annotation_count(&self) -> usize {
        self.records.iter().flatten().map(Tal::annotation_count).sum()
    }

    /// Timekeeping TAL of record `index`, if the record starts with one.
    pub fn timekeeping(&self, index: usize) -> Option<&Tal> {
        self.records
            .get(index)
            .and_then(|record| record.first())
            .filter(|tal| tal.is_timekeeping())
    }

    /// Appends the annotations of the next data record. Consecutive entries
    /// with the same onset and duration share one TAL.
    pub fn push_record(&mut self, annotations: Vec<Annotation>) {
        self.records.push(Tal::group(&annotations));
    }

    /// Appends the next data record with explicit TAL boundaries.
    pub fn push_tals(&mut self, tals: Vec<Tal>) {
        self.records.push(tals);
    }

    /// Replaces the content with `annotations` spread over `record_count` records.
    ///
    /// An annotation goes to the record whose window `[i * d, (i + 1) * d)`
    /// contains its onset; earlier onsets land in the first record and later
    /// ones in the last.
    ///
    /// ```rust
    /// use edfcodec::{Annotation, AnnotationSignal, SignalHeader};
    ///
    /// let mut signal = AnnotationSignal::new(SignalHeader::new_annotation(60));
    /// signal.distribute(
    ///     vec![
    ///         Annotation::new(0.5, None, "Lights off"),
    ///         Annotation::new(2.25, Some(1.0), "Arousal"),
    ///         Annotation::new(9.0, None, "Lights on"),
    ///     ],
    ///     3,
    ///     1.0,
    /// );
    ///
    /// assert_eq!(signal.records()[0].len(), 1);
    /// assert_eq!(signal.records()[1].len(), 0);
    /// assert_eq!(signal.records()[2].len(), 2);
    /// ```
    pub fn distribute(&mut self, annotations: Vec<Annotation>, record_count: usize, record_duration: f64) {
        let mut buckets = vec![Vec::new(); record_count];
        if record_count > 0 {
            for annotation in annotations {
                let index = if record_duration > 0.0 && annotation.onset > 0.0 {
                    ((annotation.onset / record_duration).floor() as usize).min(record_count - 1)
                } else {
                    0
                };
                buckets[index].push(annotation);
            }
        }

        self.records = buckets.iter().map(|bucket| Tal::group(bucket)).collect();
    }
}

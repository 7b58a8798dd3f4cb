//! # EDF/EDF+ codec for Rust
//!
//! Reads and writes European Data Format files: a fixed-width ASCII header
//! followed by fixed-size data records holding 16-bit samples per signal and
//! Time-stamped Annotation Lists (TALs) in `EDF Annotations` signals.
//!
//! Plain EDF and EDF+C (continuous) files are supported. EDF+D
//! (discontinuous) files are detected and rejected with
//! [`EdfError::UnsupportedFeature`].
//!
//! ## Quick Start
//!
//! ### Decoding
//!
//! ```rust
//! use std::io::Cursor;
//! use edfcodec::{decode, encode, Result};
//!
//! fn main() -> Result<()> {
//!     # let mut bytes = Vec::new();
//!     # encode(&edfcodec::doctest_utils::sample_file()?, &mut bytes)?;
//!     let file = decode(Cursor::new(bytes))?;
//!
//!     println!("Start: {}", file.header().start_datetime());
//!     println!("Type: {:?}", file.header().file_type());
//!     for signal in file.signals() {
//!         if let Some(standard) = signal.as_standard() {
//!             println!("{}: {} samples", signal.label(), standard.samples().len());
//!         }
//!     }
//!     for annotation in file.annotations().filter(|a| !a.is_timekeeping()) {
//!         println!("{:+}s {}", annotation.onset, annotation.description);
//!     }
//!     Ok(())
//! }
//! ```
//!
//! ### Encoding
//!
//! ```rust
//! use chrono::NaiveDate;
//! use edfcodec::{
//!     encode, Annotation, AnnotationSignal, EdfFile, FileHeader, Result, Signal, SignalHeader, StandardSignal,
//! };
//!
//! fn main() -> Result<()> {
//!     let start = NaiveDate::from_ymd_opt(2024, 1, 8).unwrap().and_hms_opt(21, 15, 0).unwrap();
//!     let mut header = FileHeader::new(start, 1.0);
//!     header.record_count = 2;
//!
//!     let mut ecg = SignalHeader::new_annotation(0);
//!     ecg.label = "ECG".to_string();
//!     ecg.physical_dimension = "mV".to_string();
//!     ecg.physical_min = -5.0;
//!     ecg.physical_max = 5.0;
//!     ecg.digital_min = -32768;
//!     ecg.digital_max = 32767;
//!     ecg.samples_per_record = 128;
//!
//!     let samples = (0..256).map(|i| (i as f64 / 128.0).sin()).collect();
//!
//!     let mut annotations = AnnotationSignal::new(SignalHeader::new_annotation(60));
//!     annotations.distribute(
//!         vec![
//!             Annotation::timekeeping(0.0),
//!             Annotation::new(0.4, None, "R wave"),
//!             Annotation::timekeeping(1.0),
//!         ],
//!         header.record_count,
//!         header.record_duration,
//!     );
//!
//!     let file = EdfFile::new(
//!         header,
//!         vec![Signal::Standard(StandardSignal::with_samples(ecg, samples)), Signal::Annotation(annotations)],
//!     );
//!
//!     let mut bytes = Vec::new();
//!     encode(&file, &mut bytes)?;
//!     assert_eq!(bytes.len(), 3 * 256 + 2 * (256 + 60));
//!     Ok(())
//! }
//! ```
//!
//! ## Physical vs Digital Values
//!
//! Samples are stored as 16-bit integers and mapped linearly between the
//! digital and physical range of their signal:
//!
//! ```rust
//! use edfcodec::SignalHeader;
//!
//! let mut signal = SignalHeader::new_annotation(0);
//! signal.label = "Test Signal".to_string();
//! signal.physical_min = -100.0;
//! signal.physical_max = 100.0;
//! signal.digital_min = -32768;
//! signal.digital_max = 32767;
//!
//! let physical_value = signal.to_physical(16384);
//! assert!((physical_value - 50.0).abs() < 0.1);
//!
//! let digital_output = signal.to_digital(25.0);
//! assert!((digital_output - 8192).abs() <= 1);
//! ```
//!
//! ## Logging
//!
//! The crate logs through the [`log`](https://docs.rs/log) facade: `debug!`
//! for header summaries, `trace!` per data record and `warn!` for
//! recoverable calibration or timekeeping problems.

pub mod error;
pub mod field;
pub mod header;
pub mod tal;
pub mod signal;
pub mod reader;
pub mod writer;
pub mod file;

#[doc(hidden)]
pub mod doctest_utils; // For internal doctest support

use std::io::{Read, Write};

// Re-export main types for convenience
pub use error::{EdfError, Result};
pub use header::{FileHeader, FileType, PatientInfo, RecordingInfo, SignalHeader};
pub use tal::{Annotation, Tal};
pub use signal::{allocate_signals, AnnotationSignal, Signal, StandardSignal};
pub use reader::{DecodeOptions, EdfReader};
pub use writer::{EdfWriter, EncodeOptions, RecordData};
pub use file::EdfFile;

// Important constants
/// Label that marks a signal as an annotation signal.
pub const ANNOTATION_LABEL: &str = "EDF Annotations";
/// Size of the global header and of each signal header.
pub const HEADER_BLOCK_SIZE: usize = 256;
pub const MAX_SIGNALS: usize = 4096;
/// Largest data record accepted, in bytes across all signals.
pub const MAX_RECORD_SIZE: usize = 128 * 1024 * 1024;

/// Decodes a complete file from a byte stream with default options.
pub fn decode<R: Read>(reader: R) -> Result<EdfFile> {
    EdfFile::read_from(reader)
}

pub fn decode_with_options<R: Read>(reader: R, options: DecodeOptions) -> Result<EdfFile> {
    EdfFile::read_from_with_options(reader, options)
}

/// Encodes `file` into a byte stream. The caller owns the stream.
pub fn encode<W: Write>(file: &EdfFile, writer: W) -> Result<()> {
    file.write_to(writer)?;
    Ok(())
}

/// Library version
///
/// Returns the current version of the edfcodec library.
///
/// # Examples
///
/// ```rust
/// let version = edfcodec::version();
/// assert!(!version.is_empty());
/// assert!(version.contains('.'));
/// ```
pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

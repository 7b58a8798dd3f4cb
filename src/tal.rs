//! Time-stamped Annotation Lists (TALs) inside an `EDF Annotations` signal.
//!
//! One annotation block holds zero or more TALs followed by null padding:
//!
//! ```text
//! +Onset[\x15Duration]\x14Description\x14[Description\x14...]\x00
//! ```
//!
//! A TAL whose first description is empty is a timekeeping TAL: its onset is
//! the start of the data record it lives in.

use crate::error::{EdfError, Result};

const DURATION_MARK: u8 = 0x15;
const DESCRIPTION_MARK: u8 = 0x14;
const TAL_END: u8 = 0x00;

/// One annotation entry. Several descriptions sharing an onset and duration
/// become separate entries.
#[derive(Debug, Clone, PartialEq)]
pub struct Annotation {
    /// Seconds relative to the recording start.
    pub onset: f64,
    /// Seconds; `None` when the TAL has no duration field.
    pub duration: Option<f64>,
    pub description: String,
}

impl Annotation {
    pub fn new(onset: f64, duration: Option<f64>, description: &str) -> Self {
        Annotation {
            onset,
            duration,
            description: description.to_string(),
        }
    }

    /// Timekeeping entry marking the start of a data record.
    pub fn timekeeping(onset: f64) -> Self {
        Annotation::new(onset, None, "")
    }

    pub fn duration_seconds(&self) -> f64 {
        self.duration.unwrap_or(0.0)
    }

    pub fn is_timekeeping(&self) -> bool {
        self.description.is_empty()
    }
}

/// One TAL as stored in the block: an onset, an optional duration and the
/// descriptions sharing them.
///
/// An empty `descriptions` list is the bare `+Onset\x14\x00` form, which reads
/// as a single timekeeping entry.
#[derive(Debug, Clone, PartialEq)]
pub struct Tal {
    pub onset: f64,
    pub duration: Option<f64>,
    pub descriptions: Vec<String>,
}

impl Tal {
    /// Groups consecutive annotations with the same onset and duration into one TAL each.
    pub fn group(annotations: &[Annotation]) -> Vec<Tal> {
        let mut tals: Vec<Tal> = Vec::new();

        for annotation in annotations {
            match tals.last_mut() {
                Some(tal) if tal.onset == annotation.onset && tal.duration == annotation.duration => {
                    tal.descriptions.push(annotation.description.clone());
                }
                _ => tals.push(Tal {
                    onset: annotation.onset,
                    duration: annotation.duration,
                    descriptions: vec![annotation.description.clone()],
                }),
            }
        }

        tals
    }

    /// One entry per description.
    pub fn annotations(&self) -> impl Iterator<Item = Annotation> + '_ {
        static BARE: [String; 1] = [String::new()];
        let descriptions = if self.descriptions.is_empty() { &BARE[..] } else { &self.descriptions[..] };

        descriptions
            .iter()
            .map(move |description| Annotation::new(self.onset, self.duration, description))
    }

    pub fn annotation_count(&self) -> usize {
        self.descriptions.len().max(1)
    }

    /// Whether the first description is empty.
    pub fn is_timekeeping(&self) -> bool {
        self.descriptions.first().map_or(true, String::is_empty)
    }
}

/// Parses one annotation block of a data record.
///
/// ```rust
/// use edfcodec::tal::parse_block;
///
/// let annotations = parse_block(b"+180\x15120\x14Sleep stage W\x14\x00\x00\x00")?;
/// assert_eq!(annotations.len(), 1);
/// assert_eq!(annotations[0].onset, 180.0);
/// assert_eq!(annotations[0].duration, Some(120.0));
/// assert_eq!(annotations[0].description, "Sleep stage W");
/// # Ok::<(), edfcodec::EdfError>(())
/// ```
pub fn parse_block(block: &[u8]) -> Result<Vec<Annotation>> {
    let tals = parse_tals(block)?;
    Ok(tals.iter().flat_map(Tal::annotations).collect())
}

/// Parses one annotation block keeping the TAL boundaries.
pub fn parse_tals(block: &[u8]) -> Result<Vec<Tal>> {
    let mut tals = Vec::new();
    let mut pos = 0;

    while pos < block.len() {
        // TAL 之间以及块末尾的 0x00 都是填充
        if block[pos] == TAL_END {
            pos += 1;
            continue;
        }
        tals.push(parse_tal(block, &mut pos)?);
    }

    Ok(tals)
}

fn parse_tal(block: &[u8], pos: &mut usize) -> Result<Tal> {
    let onset = scan_number(block, pos, true)?;

    let duration = if peek(block, *pos)? == DURATION_MARK {
        *pos += 1;
        Some(scan_number(block, pos, false)?)
    } else {
        None
    };

    expect_byte(block, pos, DESCRIPTION_MARK)?;

    let mut descriptions = Vec::new();
    loop {
        if peek(block, *pos)? == TAL_END {
            *pos += 1;
            break;
        }

        descriptions.push(scan_description(block, pos)?);

        match peek(block, *pos)? {
            DESCRIPTION_MARK => *pos += 1,
            // description closed by the terminator itself
            TAL_END => {
                *pos += 1;
                break;
            }
            other => {
                return Err(EdfError::malformed_annotation(
                    *pos,
                    format!("unexpected byte 0x{:02x} after description", other),
                ))
            }
        }
    }

    Ok(Tal { onset, duration, descriptions })
}

fn peek(block: &[u8], pos: usize) -> Result<u8> {
    block
        .get(pos)
        .copied()
        .ok_or(EdfError::TruncatedAnnotation { position: pos })
}

fn expect_byte(block: &[u8], pos: &mut usize, expected: u8) -> Result<()> {
    let found = peek(block, *pos)?;
    if found != expected {
        return Err(EdfError::malformed_annotation(
            *pos,
            format!("expected 0x{:02x}, found 0x{:02x}", expected, found),
        ));
    }
    *pos += 1;
    Ok(())
}

fn scan_digits(block: &[u8], pos: &mut usize) -> Result<usize> {
    let start = *pos;
    while peek(block, *pos)?.is_ascii_digit() {
        *pos += 1;
    }
    Ok(*pos - start)
}

/// `[sign] DIGIT+ ['.' DIGIT+]`, sign required for onsets.
fn scan_number(block: &[u8], pos: &mut usize, signed: bool) -> Result<f64> {
    let start = *pos;

    if signed {
        match peek(block, *pos)? {
            b'+' | b'-' => *pos += 1,
            other => {
                return Err(EdfError::malformed_annotation(
                    start,
                    format!("onset must start with '+' or '-', found 0x{:02x}", other),
                ))
            }
        }
    }

    if scan_digits(block, pos)? == 0 {
        return Err(EdfError::malformed_annotation(*pos, "expected a digit"));
    }
    if peek(block, *pos)? == b'.' {
        *pos += 1;
        if scan_digits(block, pos)? == 0 {
            return Err(EdfError::malformed_annotation(*pos, "expected a digit after '.'"));
        }
    }

    // 只包含符号、数字和小数点，必然是 ASCII
    let text = String::from_utf8_lossy(&block[start..*pos]);
    text.parse()
        .map_err(|_| EdfError::malformed_annotation(start, format!("invalid number {:?}", text)))
}

/// Description text: bytes 9..=13 and everything from 32 upwards, UTF-8 encoded.
fn scan_description(block: &[u8], pos: &mut usize) -> Result<String> {
    let start = *pos;
    loop {
        let byte = peek(block, *pos)?;
        if byte >= 32 || (9..=13).contains(&byte) {
            *pos += 1;
        } else {
            break;
        }
    }

    String::from_utf8(block[start..*pos].to_vec())
        .map_err(|_| EdfError::malformed_annotation(start, "description is not valid UTF-8"))
}

/// Encodes the annotations of one data record into a block of exactly `block_len` bytes.
///
/// Consecutive annotations with the same onset and duration share one TAL.
/// The remainder of the block is filled with 0x00.
///
/// ```rust
/// use edfcodec::{tal, Annotation};
///
/// let block = tal::encode_block(&[Annotation::timekeeping(180.0)], 8)?;
/// assert_eq!(block, b"+180\x14\x14\x00\x00");
/// # Ok::<(), edfcodec::EdfError>(())
/// ```
pub fn encode_block(annotations: &[Annotation], block_len: usize) -> Result<Vec<u8>> {
    encode_tals(&Tal::group(annotations), block_len)
}

/// Encodes TALs as given, one after the other, padded to `block_len` bytes.
pub fn encode_tals(tals: &[Tal], block_len: usize) -> Result<Vec<u8>> {
    let mut block = Vec::with_capacity(block_len);
    for tal in tals {
        write_tal(&mut block, tal)?;
    }

    if block.len() > block_len {
        return Err(EdfError::malformed_annotation(
            block_len,
            format!("annotations need {} bytes but the record block holds {}", block.len(), block_len),
        ));
    }

    block.resize(block_len, TAL_END);
    Ok(block)
}

fn write_tal(block: &mut Vec<u8>, tal: &Tal) -> Result<()> {
    let position = block.len();

    if !tal.onset.is_finite() {
        return Err(EdfError::malformed_annotation(position, format!("onset {} is not finite", tal.onset)));
    }
    block.extend_from_slice(format!("{:+}", tal.onset).as_bytes());

    if let Some(duration) = tal.duration {
        if !duration.is_finite() || duration < 0.0 {
            return Err(EdfError::malformed_annotation(position, format!("invalid duration {}", duration)));
        }
        block.push(DURATION_MARK);
        block.extend_from_slice(duration.to_string().as_bytes());
    }

    block.push(DESCRIPTION_MARK);
    for description in &tal.descriptions {
        if let Some(bad) = description.bytes().find(|&b| b < 32 && !(9..=13).contains(&b)) {
            return Err(EdfError::malformed_annotation(
                position,
                format!("description {:?} contains control byte 0x{:02x}", description, bad),
            ));
        }
        block.extend_from_slice(description.as_bytes());
        block.push(DESCRIPTION_MARK);
    }
    block.push(TAL_END);

    Ok(())
}

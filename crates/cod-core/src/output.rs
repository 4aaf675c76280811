//! Helpers for presenting and persisting results.
//!
//! Results of hundreds of millions of digits are written in fixed-size
//! fragments so no second full-size copy of the string is ever built.

use std::io::{self, Write};
use std::time::{SystemTime, UNIX_EPOCH};

/// Default fragment size, in characters, for writing a result.
pub const DEFAULT_CHUNK_CHARS: usize = 100_000;

/// First line of every result file, followed by an empty line.
pub const PI_FILE_HEADER: &str = "Circumference Over Diameter Pi file\n\n";

/// Label printed before the digits, on the console and in result files.
pub const RESULT_PREFIX: &str = "Pi: ";

/// Suffix of every result file name.
pub const PI_FILE_SUFFIX: &str = " - Pi.txt";

// ============================================================================
// Chunked Iterator
// ============================================================================

/// Iterator over consecutive fragments of a string.
///
/// Each fragment holds `chunk_chars` characters, except possibly the last.
/// Fragments borrow from the source, so iterating allocates nothing.
///
/// # Example
/// ```
/// use cod_core::DigitChunks;
///
/// let chunks: Vec<&str> = DigitChunks::new("3.14159", 3).collect();
/// assert_eq!(chunks, vec!["3.1", "415", "9"]);
/// ```
pub struct DigitChunks<'a> {
    rest: &'a str,
    chunk_chars: usize,
}

impl<'a> DigitChunks<'a> {
    /// Creates an iterator over `text` in fragments of `chunk_chars` characters.
    ///
    /// A `chunk_chars` of 0 is treated as [`DEFAULT_CHUNK_CHARS`].
    pub fn new(text: &'a str, chunk_chars: usize) -> Self {
        let chunk_chars = if chunk_chars == 0 {
            DEFAULT_CHUNK_CHARS
        } else {
            chunk_chars
        };
        Self {
            rest: text,
            chunk_chars,
        }
    }
}

impl<'a> Iterator for DigitChunks<'a> {
    type Item = &'a str;

    fn next(&mut self) -> Option<Self::Item> {
        if self.rest.is_empty() {
            return None;
        }
        // Over an ASCII prefix the byte index is the char index.
        let fast = self.chunk_chars.min(self.rest.len());
        let split = if self.rest.as_bytes()[..fast].is_ascii() {
            fast
        } else {
            self.rest
                .char_indices()
                .nth(self.chunk_chars)
                .map_or(self.rest.len(), |(i, _)| i)
        };
        let (head, tail) = self.rest.split_at(split);
        self.rest = tail;
        Some(head)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        if self.rest.is_empty() {
            return (0, Some(0));
        }
        let max = self.rest.len().div_ceil(self.chunk_chars);
        let min = self.rest.len().div_ceil(self.chunk_chars.saturating_mul(4));
        (min, Some(max))
    }
}

/// Writes `text` to `out` fragment by fragment.
pub fn write_chunked<W: Write>(out: &mut W, text: &str, chunk_chars: usize) -> io::Result<()> {
    for chunk in DigitChunks::new(text, chunk_chars) {
        out.write_all(chunk.as_bytes())?;
    }
    out.flush()
}

/// Writes a complete result file body: header, then the labelled result on
/// its own newline-terminated line.
pub fn write_pi_file<W: Write>(out: &mut W, pi: &str) -> io::Result<()> {
    out.write_all(PI_FILE_HEADER.as_bytes())?;
    out.write_all(RESULT_PREFIX.as_bytes())?;
    write_chunked(out, pi, DEFAULT_CHUNK_CHARS)?;
    out.write_all(b"\n")
}

// ============================================================================
// Naming and Inspection
// ============================================================================

/// Builds the name of a result file from its creation time.
///
/// The format is `"<secs>.<micros> - Pi.txt"`, seconds since the Unix epoch
/// with six fractional digits. It contains no `:`, so it is valid on every
/// common filesystem.
///
/// # Example
/// ```
/// use std::time::{Duration, UNIX_EPOCH};
/// use cod_core::pi_file_name;
///
/// let t = UNIX_EPOCH + Duration::from_micros(1_700_000_000_000_042);
/// assert_eq!(pi_file_name(t), "1700000000.000042 - Pi.txt");
/// ```
pub fn pi_file_name(timestamp: SystemTime) -> String {
    let since_epoch = timestamp.duration_since(UNIX_EPOCH).unwrap_or_default();
    format!(
        "{}.{:06}{}",
        since_epoch.as_secs(),
        since_epoch.subsec_micros(),
        PI_FILE_SUFFIX
    )
}

/// Returns the last `n` characters of `text`, with newlines shown as `\n`.
///
/// Used to spot-check the tail of a result file without printing it whole.
pub fn last_chars(text: &str, n: usize) -> String {
    let start = if n == 0 {
        text.len()
    } else {
        text.char_indices()
            .rev()
            .nth(n - 1)
            .map_or(0, |(i, _)| i)
    };
    text[start..].replace('\n', "\\n")
}

//! Change-bitmap decoding
//!
//! A change bitmap records, one bit per data page, whether the page was
//! modified since a reference point. It lives next to the data file:
//!
//! ```text
//! 16385_ptrack        # bitmap for segment 0 (pages 0..131072)
//! 16385_ptrack.1      # bitmap for segment 1 (pages 131072..)
//! ```
//!
//! # Format
//!
//! The bitmap file is a sequence of 8192-byte pages. Every page starts with
//! a 24-byte header followed by 8168 body bytes. Bits are taken from body
//! bytes in file order, least-significant bit first, so body byte `i` bit
//! `j` describes data page `page_base + i * 8 + j`.
//!
//! Since a little-endian `u64` load preserves exactly that order, bodies
//! are unpacked eight bytes at a time straight into bitmap words.
//!
//! # Segments
//!
//! Each data segment contributes exactly as many bits as it has pages
//! (capped at [`PAGES_PER_SEGMENT`]). Segment bit ranges are concatenated
//! in segment order with no gaps.

use std::fs::{self, File};
use std::io::{self, BufReader};
use std::path::Path;

use byteorder::{ByteOrder, LittleEndian};
use pageaudit_core::{
    bitmap_path, pages_for_len, segment_path, Error, Result, BITMAP_PAGE_BODY_SIZE,
    BITMAP_PAGE_HEADER_SIZE, PAGES_PER_SEGMENT, PAGE_SIZE,
};
use tracing::debug;

use crate::snapshot::read_full;

const WORDS_PER_BITMAP_PAGE: usize = BITMAP_PAGE_BODY_SIZE / 8;

/// Decoded change bitmap of one relation
///
/// Bits beyond `len` are always zero.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Bitmap {
    words: Vec<u64>,
    len: u64,
}

impl Bitmap {
    /// Create an empty bitmap
    pub fn new() -> Self {
        Bitmap::default()
    }

    /// Build a bitmap from individual flags
    pub fn from_bits<I: IntoIterator<Item = bool>>(bits: I) -> Self {
        let mut bitmap = Bitmap::new();
        for bit in bits {
            if bitmap.len % 64 == 0 {
                bitmap.words.push(0);
            }
            if bit {
                let last = bitmap.words.len() - 1;
                bitmap.words[last] |= 1 << (bitmap.len % 64);
            }
            bitmap.len += 1;
        }
        bitmap
    }

    /// Decode raw bitmap file content
    ///
    /// Returns `None` if the content is not a whole number of pages.
    pub fn from_map_bytes(bytes: &[u8]) -> Option<Self> {
        if bytes.len() % PAGE_SIZE != 0 {
            return None;
        }
        let mut bitmap = Bitmap::new();
        for page in bytes.chunks_exact(PAGE_SIZE) {
            bitmap.push_map_page(page);
        }
        Some(bitmap)
    }

    /// Number of pages covered
    pub fn len(&self) -> u64 {
        self.len
    }

    /// True if no pages are covered
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Flag of one page, `None` if the page is not covered
    pub fn get(&self, page: u64) -> Option<bool> {
        if page >= self.len {
            return None;
        }
        Some((self.words[(page / 64) as usize] >> (page % 64)) & 1 == 1)
    }

    /// Flag of one page, treating uncovered pages as unchanged
    pub fn is_set(&self, page: u64) -> bool {
        self.get(page).unwrap_or(false)
    }

    /// Number of pages flagged as changed
    pub fn count_ones(&self) -> u64 {
        self.words.iter().map(|w| u64::from(w.count_ones())).sum()
    }

    /// Indices of all pages flagged as changed, ascending
    pub fn set_pages(&self) -> Vec<u64> {
        let mut pages = Vec::with_capacity(self.count_ones() as usize);
        for (index, &word) in self.words.iter().enumerate() {
            let mut rest = word;
            while rest != 0 {
                let bit = rest.trailing_zeros() as u64;
                pages.push(index as u64 * 64 + bit);
                rest &= rest - 1;
            }
        }
        pages
    }

    /// Flags as a `0`/`1` sequence in page order
    pub fn to_bits(&self) -> Vec<u8> {
        (0..self.len).map(|page| u8::from(self.is_set(page))).collect()
    }

    /// Iterate flags in page order
    pub fn iter(&self) -> impl Iterator<Item = bool> + '_ {
        (0..self.len).map(move |page| self.is_set(page))
    }

    /// Drop every page at or beyond `len`
    pub fn truncate(&mut self, len: u64) {
        if len >= self.len {
            return;
        }
        self.len = len;
        self.words.truncate(len.div_ceil(64) as usize);
        let rem = len % 64;
        if rem != 0 {
            if let Some(last) = self.words.last_mut() {
                *last &= (1u64 << rem) - 1;
            }
        }
    }

    /// Append another bitmap's pages after this one's
    pub fn append(&mut self, other: &Bitmap) {
        let shift = (self.len % 64) as u32;
        if shift == 0 {
            self.words.extend_from_slice(&other.words);
        } else {
            for &word in &other.words {
                let last = self.words.len() - 1;
                self.words[last] |= word << shift;
                self.words.push(word >> (64 - shift));
            }
        }
        self.len += other.len;
        self.words.truncate(self.len.div_ceil(64) as usize);
    }

    /// Unpack the body of one bitmap-file page
    fn push_map_page(&mut self, page: &[u8]) {
        let mut words = [0u64; WORDS_PER_BITMAP_PAGE];
        LittleEndian::read_u64_into(&page[BITMAP_PAGE_HEADER_SIZE..], &mut words);
        let body = Bitmap {
            words: words.to_vec(),
            len: (BITMAP_PAGE_BODY_SIZE * 8) as u64,
        };
        self.append(&body);
    }
}

/// Decode a single bitmap file, every bit it holds
///
/// # Errors
///
/// - `NotFound`: the file does not exist
/// - `MisalignedBitmap`: the file size is not a multiple of the page size
/// - `Io`: the file could not be read
pub fn decode_bitmap_file(path: &Path) -> Result<Bitmap> {
    let file = match File::open(path) {
        Ok(file) => file,
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            return Err(Error::NotFound {
                path: path.to_path_buf(),
            })
        }
        Err(e) => return Err(Error::io(path, e)),
    };
    let size = file.metadata().map_err(|e| Error::io(path, e))?.len();
    if size % PAGE_SIZE as u64 != 0 {
        return Err(Error::MisalignedBitmap {
            path: path.to_path_buf(),
            size,
        });
    }

    let mut reader = BufReader::new(file);
    let mut page = vec![0u8; PAGE_SIZE];
    let mut bitmap = Bitmap::new();
    loop {
        let n = read_full(&mut reader, &mut page).map_err(|e| Error::io(path, e))?;
        if n == 0 {
            break;
        }
        if n < PAGE_SIZE {
            // File shrank after the size check
            return Err(Error::MisalignedBitmap {
                path: path.to_path_buf(),
                size: size - (PAGE_SIZE - n) as u64,
            });
        }
        bitmap.push_map_page(&page);
    }

    debug!(target: "pageaudit::bitmap", path = %path.display(), pages = bitmap.len(), "Decoded bitmap file");
    Ok(bitmap)
}

/// Decode the change bitmap of a relation, across all of its segments
///
/// A zero-length relation has no tracked pages and yields an empty bitmap
/// whether or not a companion exists.
///
/// # Errors
///
/// - `NotFound`: a non-empty segment has no bitmap companion
/// - `MisalignedBitmap`: a companion is not page aligned
/// - `Corruption`: a companion covers fewer pages than its segment holds
/// - `Io`: the data file or a companion could not be read
pub fn decode(data_file: &Path) -> Result<Bitmap> {
    let base_len = fs::metadata(data_file)
        .map_err(|e| Error::io(data_file, e))?
        .len();
    if base_len == 0 {
        debug!(target: "pageaudit::bitmap", path = %data_file.display(), "Empty relation, no tracked pages");
        return Ok(Bitmap::new());
    }

    let mut bitmap = Bitmap::new();
    let mut segment = 0u64;
    loop {
        let data_path = segment_path(data_file, segment);
        let segment_len = match fs::metadata(&data_path) {
            Ok(metadata) => metadata.len(),
            Err(e) if segment > 0 && e.kind() == io::ErrorKind::NotFound => break,
            Err(e) => return Err(Error::io(&data_path, e)),
        };
        let pages = pages_for_len(segment_len).min(PAGES_PER_SEGMENT);

        if pages > 0 {
            let map_path = bitmap_path(data_file, segment);
            let mut segment_bits = decode_bitmap_file(&map_path)?;
            if segment_bits.len() < pages {
                return Err(Error::Corruption(format!(
                    "{} tracks {} pages but segment {} of {} has {} pages",
                    map_path.display(),
                    segment_bits.len(),
                    segment,
                    data_file.display(),
                    pages
                )));
            }
            segment_bits.truncate(pages);
            bitmap.append(&segment_bits);
        }

        segment += 1;
    }

    debug!(
        target: "pageaudit::bitmap",
        path = %data_file.display(),
        segments = segment,
        pages = bitmap.len(),
        changed = bitmap.count_ones(),
        "Decoded relation bitmap"
    );
    Ok(bitmap)
}

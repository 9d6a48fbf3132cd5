//! Relation-level page digests
//!
//! A relation larger than one segment is split across `<file>`,
//! `<file>.1`, `<file>.2`, ... with [`PAGES_PER_SEGMENT`] pages each. The
//! functions here address such a relation by its logical page numbers,
//! which continue across segment boundaries.

use std::collections::BTreeMap;
use std::fs::{self, File};
use std::io::{self, BufReader};
use std::path::Path;

use pageaudit_core::{
    pages_for_len, segment_path, Digest, Error, Result, PAGES_PER_SEGMENT, PAGE_SIZE,
};

use crate::snapshot::read_full;

/// Total number of pages over all existing segments of a relation
pub fn relation_page_count(data_file: &Path) -> Result<u64> {
    let mut total = 0;
    let mut segment = 0u64;
    loop {
        let path = segment_path(data_file, segment);
        match fs::metadata(&path) {
            Ok(metadata) => total += pages_for_len(metadata.len()),
            Err(e) if segment > 0 && e.kind() == io::ErrorKind::NotFound => break,
            Err(e) => return Err(Error::io(&path, e)),
        }
        segment += 1;
    }
    Ok(total)
}

/// Digest the first `size_in_pages` logical pages of a relation
///
/// Reads `<file>` for pages `0..131072`, `<file>.1` for the next 131072 and
/// so on. A missing segment that should hold pages fails with `Io`.
pub fn relation_page_digests(data_file: &Path, size_in_pages: u64) -> Result<BTreeMap<u64, Digest>> {
    let mut digests = BTreeMap::new();
    let mut page = vec![0u8; PAGE_SIZE];
    let mut next = 0u64;
    let mut segment = 0u64;

    while next < size_in_pages {
        let path = segment_path(data_file, segment);
        let file = File::open(&path).map_err(|e| Error::io(&path, e))?;
        let mut reader = BufReader::new(file);
        let end = (next + PAGES_PER_SEGMENT).min(size_in_pages);

        while next < end {
            let n = read_full(&mut reader, &mut page).map_err(|e| Error::io(&path, e))?;
            if n == 0 {
                return Err(Error::Corruption(format!(
                    "{} ends before page {} of {}",
                    path.display(),
                    next,
                    size_in_pages
                )));
            }
            digests.insert(next, Digest::of_page(&page[..n]));
            next += 1;
        }

        segment += 1;
    }

    Ok(digests)
}

use std::io::{Read, Seek};

use crate::cursor::WindowedCursor;
use crate::error::{IoOp, OverjoinError, Result};
use crate::util;

/// Block size used when streaming both inputs for comparison.
pub const COMPARE_BLOCK_SIZE: usize = 256 * 1024;

/// Outcome of a byte-for-byte comparison of two regions.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MatchInfo {
    /// Length of the run of equal bytes ending at the last compared position.
    pub matching_bytes: u64,
    pub total_bytes: u64,
}

impl MatchInfo {
    /// Every compared byte matched.
    pub fn is_exact(&self) -> bool {
        self.matching_bytes == self.total_bytes
    }

    /// Trailing run as a percentage of the compared bytes.
    pub fn confidence(&self) -> f64 {
        if self.total_bytes == 0 {
            return 0.0;
        }
        self.matching_bytes as f64 * 100.0 / self.total_bytes as f64
    }
}

/// Confirms checksum candidates by re-reading both files.
#[derive(Debug, Clone)]
pub struct MatchValidator {
    block_size: usize,
}

impl Default for MatchValidator {
    fn default() -> Self {
        Self::new(COMPARE_BLOCK_SIZE)
    }
}

impl MatchValidator {
    pub fn new(block_size: usize) -> Self {
        Self {
            block_size: block_size.max(1),
        }
    }

    /// Compare file1's footer with the window of file2 ending at `candidate`.
    ///
    /// Both streams run forward until either ends, so the footer is compared
    /// in full. Requires `candidate >= window`.
    pub fn validate<R1, R2>(
        &self,
        file1: &mut WindowedCursor<R1>,
        file2: &mut WindowedCursor<R2>,
        candidate: u64,
    ) -> Result<MatchInfo>
    where
        R1: Read + Seek,
        R2: Read + Seek,
    {
        let window = file1.window() as u64;
        let footer_start = file1.total_length() - window;
        self.compare_from(file1, footer_start, file2, candidate - window)
    }

    /// Compare the whole region where file2 could overlap file1 for a join at
    /// `join`: file1's last `min(join, length1)` bytes against the same number
    /// of file2 bytes ending at `join`.
    ///
    /// The trailing run is the length of the exact overlap; the ratio is the
    /// confidence that file2 really continues file1.
    pub fn measure_overlap<R1, R2>(
        &self,
        file1: &mut WindowedCursor<R1>,
        file2: &mut WindowedCursor<R2>,
        join: u64,
    ) -> Result<MatchInfo>
    where
        R1: Read + Seek,
        R2: Read + Seek,
    {
        let length1 = file1.total_length();
        let overlap = join.min(length1);
        self.compare_from(file1, length1 - overlap, file2, join - overlap)
    }

    fn compare_from<R1, R2>(
        &self,
        file1: &mut WindowedCursor<R1>,
        start1: u64,
        file2: &mut WindowedCursor<R2>,
        start2: u64,
    ) -> Result<MatchInfo>
    where
        R1: Read + Seek,
        R2: Read + Seek,
    {
        let name1 = file1.name().to_string();
        let name2 = file2.name().to_string();
        let first = file1.reader_at(start1)?;
        let second = file2.reader_at(start2)?;
        compare_streams(first, &name1, second, &name2, self.block_size)
    }
}

/// Stream two readers side by side in blocks until either one ends.
pub fn compare_streams<A: Read, B: Read>(
    first: &mut A,
    first_name: &str,
    second: &mut B,
    second_name: &str,
    block_size: usize,
) -> Result<MatchInfo> {
    let mut buf1 = vec![0u8; block_size];
    let mut buf2 = vec![0u8; block_size];
    let mut info = MatchInfo::default();

    loop {
        let read1 = util::read_block(first, &mut buf1)
            .map_err(|e| OverjoinError::io(IoOp::Read, first_name, e))?;
        let read2 = util::read_block(second, &mut buf2)
            .map_err(|e| OverjoinError::io(IoOp::Read, second_name, e))?;
        let length = read1.min(read2);

        info.total_bytes += length as u64;
        for (a, b) in buf1[..length].iter().zip(&buf2[..length]) {
            if a == b {
                info.matching_bytes += 1;
            } else {
                info.matching_bytes = 0;
            }
        }

        if read1 < block_size || read2 < block_size {
            break;
        }
    }

    Ok(info)
}

use std::fs::File;
use std::io::{Read, Seek};
use std::ops::ControlFlow;

use crate::cursor::WindowedCursor;
use crate::error::{OverjoinError, Result};
use crate::validate::{MatchInfo, MatchValidator};

/// A validated join point.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Join {
    /// Offset in file2 just past the copy of file1's footer. file2 is
    /// appended to file1 from here.
    pub offset: u64,
    /// Footer comparison that confirmed the join.
    pub footer: MatchInfo,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchOutcome {
    Found(Join),
    /// file2 was scanned to the end without a validated candidate.
    NotFound,
    /// The progress callback asked to stop at `position`.
    Interrupted { position: u64 },
}

/// Scans file2 for the last `window` bytes of file1.
///
/// The footer of file1 is hashed once; file2 is then rolled forward one byte
/// at a time and every checksum collision is checked byte-for-byte before it
/// is accepted. Collisions that fail the check are skipped and the scan goes
/// on from the next byte.
pub struct OverlapSearch<R1 = File, R2 = File> {
    file1: WindowedCursor<R1>,
    file2: WindowedCursor<R2>,
    validator: MatchValidator,
    min_overlap: u64,
    rejected: u64,
}

impl<R1: Read + Seek, R2: Read + Seek> OverlapSearch<R1, R2> {
    /// Both cursors must share the same window length.
    pub fn new(file1: WindowedCursor<R1>, file2: WindowedCursor<R2>, min_overlap: u64) -> Self {
        debug_assert_eq!(file1.window(), file2.window());
        Self {
            file1,
            file2,
            validator: MatchValidator::default(),
            min_overlap,
            rejected: 0,
        }
    }

    #[cfg(test)]
    pub fn run(&mut self) -> Result<SearchOutcome> {
        self.run_with_progress(|_| ControlFlow::Continue(()))
    }

    /// Run the search, calling `progress` with file2's position each time another
    /// block of file2 has been scanned. Returning `Break` stops the search.
    pub fn run_with_progress<F>(&mut self, mut progress: F) -> Result<SearchOutcome>
    where
        F: FnMut(u64) -> ControlFlow<()>,
    {
        self.prime_footer()?;
        self.file2.seek(0)?;
        self.rejected = 0;

        let step = self.file2.capacity() as u64;
        let mut next_report = step;

        while !self.file2.at_end() {
            self.file2.advance()?;
            let position = self.file2.position();

            if position >= next_report {
                next_report += step;
                if progress(position).is_break() {
                    tracing::info!(position, "overlap search interrupted");
                    return Ok(SearchOutcome::Interrupted { position });
                }
            }

            if !self.file2.checksum().matches(self.file1.checksum()) {
                continue;
            }
            if position < self.min_overlap {
                tracing::debug!(
                    position,
                    min_overlap = self.min_overlap,
                    "candidate below minimum overlap"
                );
                continue;
            }

            let footer = self
                .validator
                .validate(&mut self.file1, &mut self.file2, position)?;
            if footer.is_exact() {
                tracing::info!(
                    offset = position,
                    rejected = self.rejected,
                    "found join point"
                );
                return Ok(SearchOutcome::Found(Join {
                    offset: position,
                    footer,
                }));
            }

            self.rejected += 1;
            tracing::debug!(
                position,
                matching = footer.matching_bytes,
                total = footer.total_bytes,
                "checksum collision rejected"
            );
        }

        tracing::info!(
            file = %self.file2.name(),
            rejected = self.rejected,
            "no overlap found"
        );
        Ok(SearchOutcome::NotFound)
    }

    /// Hash the last `window` bytes of file1.
    fn prime_footer(&mut self) -> Result<()> {
        let window = self.file1.window();
        let length = self.file1.total_length();
        if length < window as u64 {
            return Err(OverjoinError::InputTooShort {
                name: self.file1.name().to_string(),
                length,
                window,
            });
        }

        self.file1.seek(length - window as u64)?;
        for _ in 0..window {
            self.file1.advance()?;
        }
        tracing::debug!(
            file = %self.file1.name(),
            length,
            window,
            checksum = self.file1.checksum().digest(),
            "primed footer"
        );
        Ok(())
    }

    /// Compare the whole overlap region implied by `join`; see
    /// `MatchValidator::measure_overlap`.
    pub fn measure_overlap(&mut self, join: &Join) -> Result<MatchInfo> {
        self.validator
            .measure_overlap(&mut self.file1, &mut self.file2, join.offset)
    }

    /// Checksum collisions that failed validation during the last run.
    pub fn rejected_candidates(&self) -> u64 {
        self.rejected
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rolling_checksum::RollingChecksum;
    use proptest::prelude::*;
    use std::io::Cursor;
    use std::path::Path;

    type MemSearch = OverlapSearch<Cursor<Vec<u8>>, Cursor<Vec<u8>>>;

    fn mem_search(file1: &[u8], file2: &[u8], window: usize, capacity: usize) -> MemSearch {
        let c1 = WindowedCursor::new(Cursor::new(file1.to_vec()), "file1", window, capacity).unwrap();
        let c2 = WindowedCursor::new(Cursor::new(file2.to_vec()), "file2", window, capacity).unwrap();
        OverlapSearch::new(c1, c2, window as u64)
    }

    fn noise(len: usize, seed: u32) -> Vec<u8> {
        let mut x = seed;
        (0..len)
            .map(|_| {
                x = x.wrapping_mul(1_103_515_245).wrapping_add(12_345);
                (x >> 16) as u8
            })
            .collect()
    }

    fn found(outcome: SearchOutcome) -> Join {
        match outcome {
            SearchOutcome::Found(join) => join,
            other => panic!("expected a join, got {other:?}"),
        }
    }

    #[test]
    fn test_finds_shifted_tail() {
        let mut search = mem_search(b"ABCDEFGH", b"XYZDEFGHIJK", 4, 4);
        let join = found(search.run().unwrap());
        assert_eq!(join.offset, 8);
        assert_eq!(
            join.footer,
            MatchInfo {
                matching_bytes: 4,
                total_bytes: 4
            }
        );

        let overlap = search.measure_overlap(&join).unwrap();
        assert_eq!(overlap.matching_bytes, 5);
        assert_eq!(overlap.total_bytes, 8);
        assert_eq!(join.offset - overlap.matching_bytes, 3);
    }

    #[test]
    fn test_file1_shorter_than_window() {
        let mut search = mem_search(b"abc", b"abcdefgh", 4, 8);
        let err = search.run().unwrap_err();
        assert!(err.is_config());
        assert!(matches!(
            err,
            OverjoinError::InputTooShort {
                length: 3,
                window: 4,
                ..
            }
        ));
    }

    #[test]
    fn test_no_overlap() {
        let mut search = mem_search(b"the first file", b"something else entirely", 4, 8);
        assert_eq!(search.run().unwrap(), SearchOutcome::NotFound);
    }

    #[test]
    fn test_empty_file2() {
        let mut search = mem_search(b"abcdef", b"", 4, 8);
        assert_eq!(search.run().unwrap(), SearchOutcome::NotFound);
    }

    #[test]
    fn test_collision_is_rejected_and_scan_resumes() {
        // Base 1 reduces the checksum to a byte sum, so permutations collide.
        let mut search = mem_search(b"ABCDEFGH", b"xxHGFEyyy", 4, 4);
        search.file1.set_checksum(RollingChecksum::with_base(4, 1));
        search.file2.set_checksum(RollingChecksum::with_base(4, 1));

        assert_eq!(search.run().unwrap(), SearchOutcome::NotFound);
        assert_eq!(search.rejected_candidates(), 1);
    }

    #[test]
    fn test_collision_before_real_match() {
        let mut search = mem_search(b"ABCDEFGH", b"HGFE--EFGHtail", 4, 5);
        search.file1.set_checksum(RollingChecksum::with_base(4, 1));
        search.file2.set_checksum(RollingChecksum::with_base(4, 1));

        let join = found(search.run().unwrap());
        assert_eq!(join.offset, 10);
        assert_eq!(search.rejected_candidates(), 1);
    }

    #[test]
    fn test_min_overlap_skips_early_candidate() {
        let file1 = b"abcdWXYZ";
        let file2 = b"WXYZ1234WXYZtail";

        let mut search = mem_search(file1, file2, 4, 8);
        assert_eq!(found(search.run().unwrap()).offset, 4);

        let c1 = WindowedCursor::new(Cursor::new(file1.to_vec()), "file1", 4, 8).unwrap();
        let c2 = WindowedCursor::new(Cursor::new(file2.to_vec()), "file2", 4, 8).unwrap();
        let mut search = OverlapSearch::new(c1, c2, 8);
        assert_eq!(found(search.run().unwrap()).offset, 12);

        let c1 = WindowedCursor::new(Cursor::new(file1.to_vec()), "file1", 4, 8).unwrap();
        let c2 = WindowedCursor::new(Cursor::new(file2.to_vec()), "file2", 4, 8).unwrap();
        let mut search = OverlapSearch::new(c1, c2, 13);
        assert_eq!(search.run().unwrap(), SearchOutcome::NotFound);
    }

    #[test]
    fn test_rerun_gives_same_result() {
        let mut search = mem_search(b"0123456789", b"__456789abc", 4, 4);
        let first = search.run().unwrap();
        let second = search.run().unwrap();
        assert_eq!(first, second);
        assert_eq!(found(first).offset, 8);
    }

    #[test]
    fn test_progress_can_interrupt() {
        let file1: Vec<u8> = (0..64u8).collect();
        let file2 = vec![0xEEu8; 1000];
        let mut search = mem_search(&file1, &file2, 8, 16);

        let mut calls = Vec::new();
        let outcome = search
            .run_with_progress(|position| {
                calls.push(position);
                if calls.len() == 3 {
                    ControlFlow::Break(())
                } else {
                    ControlFlow::Continue(())
                }
            })
            .unwrap();

        assert_eq!(calls, vec![16, 32, 48]);
        assert_eq!(outcome, SearchOutcome::Interrupted { position: 48 });
    }

    #[test]
    fn test_search_over_files() {
        let dir = tempfile::tempdir().unwrap();
        let segment1 = noise(20_000, 7);
        // Last header byte differs from file1 so the overlap run starts exactly at 6.
        let mut segment2 = b"HEADE".to_vec();
        segment2.push(segment1[14_999] ^ 0xFF);
        segment2.extend_from_slice(&segment1[15_000..]);
        segment2.extend_from_slice(b"fresh log lines");

        let p1 = dir.path().join("part1.log");
        let p2 = dir.path().join("part2.log");
        std::fs::write(&p1, &segment1).unwrap();
        std::fs::write(&p2, &segment2).unwrap();

        let open = |p: &Path| WindowedCursor::open(p, 512, 1024).unwrap();
        let mut search = OverlapSearch::new(open(&p1), open(&p2), 512);
        let join = found(search.run().unwrap());
        assert_eq!(join.offset, 6 + 5_000);

        let overlap = search.measure_overlap(&join).unwrap();
        assert_eq!(overlap.matching_bytes, 5_000);
    }

    proptest! {
        #[test]
        fn planted_footer_is_always_found(
            file1 in proptest::collection::vec(any::<u8>(), 8..200),
            prefix in proptest::collection::vec(any::<u8>(), 0..300),
            suffix in proptest::collection::vec(any::<u8>(), 0..50),
            window in 1usize..8,
        ) {
            let footer = &file1[file1.len() - window..];
            let mut file2 = prefix.clone();
            file2.extend_from_slice(footer);
            file2.extend_from_slice(&suffix);
            let planted = (prefix.len() + window) as u64;

            let mut search = mem_search(&file1, &file2, window, window + 2);
            match search.run().unwrap() {
                SearchOutcome::Found(join) => {
                    prop_assert!(join.offset <= planted);
                    prop_assert!(join.footer.is_exact());
                    let start = (join.offset as usize) - window;
                    prop_assert_eq!(&file2[start..join.offset as usize], footer);
                }
                other => prop_assert!(false, "planted footer missed: {:?}", other),
            }
        }
    }
}

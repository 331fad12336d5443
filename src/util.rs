use anyhow::{Context, Result};
use std::io::{self, Read};
use std::path::Path;

/// Fill `buf` from `reader`, stopping early only at end of stream.
/// Returns the number of bytes read; less than `buf.len()` means EOF.
pub fn read_block<R: Read + ?Sized>(reader: &mut R, buf: &mut [u8]) -> io::Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        match reader.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        }
    }
    Ok(filled)
}

/// True if `output` already exists and resolves to the same file as `input`.
pub fn same_file(input: &Path, output: &Path) -> Result<bool> {
    if !output.exists() {
        return Ok(false);
    }
    let input = input
        .canonicalize()
        .with_context(|| format!("Failed to canonicalize path: {}", input.display()))?;
    let output = output
        .canonicalize()
        .with_context(|| format!("Failed to canonicalize path: {}", output.display()))?;
    Ok(input == output)
}

/// In-memory `Read + Seek` that can fail reads from a given offset and can
/// report a longer length than it actually serves.
#[cfg(test)]
pub(crate) struct FlakyReader {
    data: Vec<u8>,
    pos: u64,
    fail_from: u64,
    claimed_len: u64,
}

#[cfg(test)]
impl FlakyReader {
    pub(crate) fn new(data: Vec<u8>) -> Self {
        let claimed_len = data.len() as u64;
        Self {
            data,
            pos: 0,
            fail_from: u64::MAX,
            claimed_len,
        }
    }

    /// Every read at or past `offset` fails; reads before it stop short of it.
    pub(crate) fn failing_from(mut self, offset: u64) -> Self {
        self.fail_from = offset;
        self
    }

    /// Report `len` from `seek(End(0))` regardless of the data held.
    pub(crate) fn claiming_len(mut self, len: u64) -> Self {
        self.claimed_len = len;
        self
    }
}

#[cfg(test)]
impl Read for FlakyReader {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if self.pos >= self.fail_from {
            return Err(io::Error::new(io::ErrorKind::Other, "device error"));
        }
        let limit = self.fail_from.min(self.data.len() as u64);
        let available = limit.saturating_sub(self.pos) as usize;
        let n = available.min(buf.len());
        if n == 0 {
            return Ok(0);
        }
        let start = self.pos as usize;
        buf[..n].copy_from_slice(&self.data[start..start + n]);
        self.pos += n as u64;
        Ok(n)
    }
}

#[cfg(test)]
impl std::io::Seek for FlakyReader {
    fn seek(&mut self, pos: std::io::SeekFrom) -> io::Result<u64> {
        use std::io::SeekFrom;
        let target = match pos {
            SeekFrom::Start(n) => Some(n),
            SeekFrom::End(d) => self.claimed_len.checked_add_signed(d),
            SeekFrom::Current(d) => self.pos.checked_add_signed(d),
        };
        self.pos = target.ok_or_else(|| io::Error::new(io::ErrorKind::InvalidInput, "bad seek"))?;
        Ok(self.pos)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Hands out at most `step` bytes per call and interrupts every other call.
    struct Trickle<'a> {
        data: &'a [u8],
        step: usize,
        interrupt: bool,
    }

    impl Read for Trickle<'_> {
        fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            self.interrupt = !self.interrupt;
            if self.interrupt {
                return Err(io::Error::new(io::ErrorKind::Interrupted, "again"));
            }
            let n = self.step.min(buf.len()).min(self.data.len());
            buf[..n].copy_from_slice(&self.data[..n]);
            self.data = &self.data[n..];
            Ok(n)
        }
    }

    #[test]
    fn test_read_block_fills_across_short_reads() {
        let data: Vec<u8> = (0..100u8).collect();
        let mut reader = Trickle {
            data: &data,
            step: 7,
            interrupt: false,
        };
        let mut buf = [0u8; 64];
        assert_eq!(read_block(&mut reader, &mut buf).unwrap(), 64);
        assert_eq!(&buf[..], &data[..64]);
        assert_eq!(read_block(&mut reader, &mut buf).unwrap(), 36);
        assert_eq!(&buf[..36], &data[64..]);
        assert_eq!(read_block(&mut reader, &mut buf).unwrap(), 0);
    }

    #[test]
    fn test_read_block_surfaces_hard_errors() {
        let mut reader = FlakyReader::new((0..32u8).collect()).failing_from(10);
        let mut buf = [0u8; 8];
        assert_eq!(read_block(&mut reader, &mut buf).unwrap(), 8);
        let err = read_block(&mut reader, &mut buf).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::Other);
    }

    #[test]
    fn test_same_file_detection() {
        let dir = tempfile::tempdir().unwrap();
        let a = dir.path().join("a.bin");
        let b = dir.path().join("b.bin");
        std::fs::write(&a, b"a").unwrap();
        std::fs::write(&b, b"b").unwrap();

        assert!(same_file(&a, &a).unwrap());
        assert!(same_file(&a, &dir.path().join(".").join("a.bin")).unwrap());
        assert!(!same_file(&a, &b).unwrap());
        assert!(!same_file(&a, &dir.path().join("missing.bin")).unwrap());
    }
}

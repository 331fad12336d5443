use std::fs::File;
use std::io::{self, Read, Seek, SeekFrom};
use std::path::Path;

use crate::error::{IoOp, OverjoinError, Result};
use crate::rolling_checksum::RollingChecksum;
use crate::util;

/// Reject window lengths the cursor cannot serve lookback for.
pub fn check_window(window: usize, capacity: usize) -> Result<()> {
    if window == 0 {
        return Err(OverjoinError::ZeroWindow);
    }
    if window > capacity {
        return Err(OverjoinError::WindowExceedsBuffer { window, capacity });
    }
    Ok(())
}

/// Forward-only reader over a seekable stream that keeps a rolling checksum of
/// the last `window` bytes in step with its position.
///
/// Data is read in blocks of `capacity` bytes into `current`; the block before
/// it stays in `previous`, so any lookback of up to `window <= capacity` bytes
/// is served from memory even right after a refill.
pub struct WindowedCursor<R = File> {
    reader: R,
    name: String,
    total_length: u64,
    capacity: usize,
    current: Vec<u8>,
    previous: Vec<u8>,
    /// Absolute offset of `current[0]`.
    block_offset: u64,
    /// Index of the next unconsumed byte in `current`.
    in_block: usize,
    /// Valid bytes in `current`.
    block_len: usize,
    checksum: RollingChecksum,
}

impl WindowedCursor<File> {
    pub fn open(path: &Path, window: usize, capacity: usize) -> Result<Self> {
        check_window(window, capacity)?;
        let name = path.display().to_string();
        let file = File::open(path).map_err(|e| OverjoinError::io(IoOp::Open, &name, e))?;
        Self::new(file, name, window, capacity)
    }
}

impl<R: Read + Seek> WindowedCursor<R> {
    /// Wrap an already open stream. `name` is only used in errors and logs.
    pub fn new(mut reader: R, name: impl Into<String>, window: usize, capacity: usize) -> Result<Self> {
        check_window(window, capacity)?;
        let name = name.into();
        let total_length = reader
            .seek(SeekFrom::End(0))
            .map_err(|e| OverjoinError::io(IoOp::Stat, &name, e))?;

        let mut cursor = Self {
            reader,
            name,
            total_length,
            capacity,
            current: vec![0; capacity],
            previous: vec![0; capacity],
            block_offset: 0,
            in_block: 0,
            block_len: 0,
            checksum: RollingChecksum::new(window),
        };
        cursor.seek(0)?;
        Ok(cursor)
    }

    /// Reposition to `offset`, dropping both buffers and the checksum.
    pub fn seek(&mut self, offset: u64) -> Result<()> {
        self.reader
            .seek(SeekFrom::Start(offset))
            .map_err(|e| OverjoinError::io(IoOp::Seek, &self.name, e))?;
        self.block_offset = offset;
        self.in_block = 0;
        self.block_len = 0;
        self.checksum.reset();
        Ok(())
    }

    /// Byte `back` positions behind the current position; `get_byte(0)` is the
    /// next byte `advance` will consume.
    ///
    /// `back` must not exceed the window, the bytes it reaches must have been
    /// read since the last seek, and `back == 0` needs an unconsumed byte in
    /// `current`. `advance` upholds all three.
    fn get_byte(&self, back: usize) -> u8 {
        match self.in_block.checked_sub(back) {
            Some(index) => self.current[index],
            None => self.previous[self.capacity - (back - self.in_block)],
        }
    }

    /// Consume one byte and roll it into the checksum.
    pub fn advance(&mut self) -> Result<()> {
        if self.at_end() {
            return Err(OverjoinError::EndOfScan {
                name: self.name.clone(),
            });
        }
        if self.in_block >= self.block_len {
            self.refill()?;
        }

        let outgoing = if self.checksum.is_primed() {
            self.get_byte(self.checksum.window())
        } else {
            0
        };
        let incoming = self.get_byte(0);
        self.checksum.update(outgoing, incoming);
        self.in_block += 1;
        Ok(())
    }

    /// Rotate `current` into `previous` and read the next block.
    ///
    /// Seeks explicitly first: the validator borrows the underlying reader
    /// between refills and leaves it wherever it stopped.
    fn refill(&mut self) -> Result<()> {
        self.block_offset += self.block_len as u64;
        self.in_block = 0;
        std::mem::swap(&mut self.current, &mut self.previous);

        self.reader
            .seek(SeekFrom::Start(self.block_offset))
            .map_err(|e| OverjoinError::io(IoOp::Seek, &self.name, e))?;
        self.block_len = util::read_block(&mut self.reader, &mut self.current)
            .map_err(|e| OverjoinError::io(IoOp::Read, &self.name, e))?;

        tracing::trace!(
            file = %self.name,
            offset = self.block_offset,
            bytes = self.block_len,
            "refilled block"
        );

        // Only the block ending at `total_length` may be short; lookback into
        // `previous` relies on every earlier block being full.
        let end = self.block_offset + self.block_len as u64;
        if self.block_len < self.capacity && end < self.total_length {
            let e = io::Error::new(io::ErrorKind::UnexpectedEof, "file truncated during scan");
            return Err(OverjoinError::io(IoOp::Read, &self.name, e));
        }
        Ok(())
    }

    /// Seek the underlying reader to `offset` and lend it out for bulk reads.
    ///
    /// Cursor state is untouched: the next refill seeks back on its own.
    pub fn reader_at(&mut self, offset: u64) -> Result<&mut R> {
        self.reader
            .seek(SeekFrom::Start(offset))
            .map_err(|e| OverjoinError::io(IoOp::Seek, &self.name, e))?;
        Ok(&mut self.reader)
    }

    pub fn at_end(&self) -> bool {
        self.position() >= self.total_length
    }
}

impl<R> WindowedCursor<R> {
    pub fn position(&self) -> u64 {
        self.block_offset + self.in_block as u64
    }

    pub fn total_length(&self) -> u64 {
        self.total_length
    }

    pub fn window(&self) -> usize {
        self.checksum.window()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn checksum(&self) -> &RollingChecksum {
        &self.checksum
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    #[cfg(test)]
    pub(crate) fn set_checksum(&mut self, checksum: RollingChecksum) {
        self.checksum = checksum;
    }
}

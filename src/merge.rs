use std::fs::File;
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::Path;

use crate::error::{IoOp, OverjoinError, Result};
use crate::util;

/// Transfer buffer size for the merge copy.
pub const TRANSFER_BUFFER_SIZE: usize = 256 * 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MergeSummary {
    pub file1_bytes: u64,
    pub file2_bytes: u64,
    /// BLAKE3 of everything written.
    pub blake3: blake3::Hash,
}

impl MergeSummary {
    pub fn bytes_written(&self) -> u64 {
        self.file1_bytes + self.file2_bytes
    }
}

/// Write file1 followed by file2 from `join` onward into `output`, which is
/// created or truncated.
pub fn merge_files(file1: &Path, file2: &Path, join: u64, output: &Path) -> Result<MergeSummary> {
    let name1 = file1.display().to_string();
    let name2 = file2.display().to_string();
    let out_name = output.display().to_string();

    let mut in1 = File::open(file1).map_err(|e| OverjoinError::io(IoOp::Open, &name1, e))?;
    let mut in2 = File::open(file2).map_err(|e| OverjoinError::io(IoOp::Open, &name2, e))?;
    let mut out = File::create(output).map_err(|e| OverjoinError::io(IoOp::Open, &out_name, e))?;

    let summary = write_merged(&mut in1, &name1, &mut in2, &name2, join, &mut out, &out_name)?;
    tracing::debug!(
        output = %out_name,
        bytes = summary.bytes_written(),
        blake3 = %summary.blake3.to_hex(),
        "wrote merged file"
    );
    Ok(summary)
}

/// Stream the merge between arbitrary readers and a writer.
pub fn write_merged<R1, R2, W>(
    file1: &mut R1,
    file1_name: &str,
    file2: &mut R2,
    file2_name: &str,
    join: u64,
    out: &mut W,
    out_name: &str,
) -> Result<MergeSummary>
where
    R1: Read + Seek,
    R2: Read + Seek,
    W: Write,
{
    let mut buf = vec![0u8; TRANSFER_BUFFER_SIZE];
    let mut hasher = blake3::Hasher::new();

    file1
        .seek(SeekFrom::Start(0))
        .map_err(|e| OverjoinError::io(IoOp::Seek, file1_name, e))?;
    let file1_bytes = copy_segment(file1, file1_name, out, out_name, &mut hasher, &mut buf)?;

    file2
        .seek(SeekFrom::Start(join))
        .map_err(|e| OverjoinError::io(IoOp::Seek, file2_name, e))?;
    let file2_bytes = copy_segment(file2, file2_name, out, out_name, &mut hasher, &mut buf)?;

    out.flush()
        .map_err(|e| OverjoinError::io(IoOp::Write, out_name, e))?;

    Ok(MergeSummary {
        file1_bytes,
        file2_bytes,
        blake3: hasher.finalize(),
    })
}

fn copy_segment<R: Read, W: Write>(
    reader: &mut R,
    name: &str,
    out: &mut W,
    out_name: &str,
    hasher: &mut blake3::Hasher,
    buf: &mut [u8],
) -> Result<u64> {
    let mut copied: u64 = 0;
    loop {
        let n = util::read_block(reader, buf).map_err(|e| OverjoinError::io(IoOp::Read, name, e))?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
        out.write_all(&buf[..n])
            .map_err(|e| OverjoinError::io(IoOp::Write, out_name, e))?;
        copied += n as u64;
        if n < buf.len() {
            break;
        }
    }
    Ok(copied)
}

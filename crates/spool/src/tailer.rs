//! Byte-offset transcript tailing.
//!
//! Each tick reads newly appended bytes from every known transcript,
//! bounded to [`MAX_LINES_PER_TICK`] complete lines per file with 64 KiB
//! buffered reads. Oversized lines (> 2 MiB) are dropped with the cursor
//! advanced past them; a trailing line without its newline yet is left
//! for the next tick.

use std::io::{BufRead, BufReader, Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};

use sk_domain::error::{Error, Result};

pub const MAX_LINES_PER_TICK: usize = 200;
pub const MAX_LINE_BYTES: u64 = 2 * 1024 * 1024;
const READ_CHUNK_BYTES: usize = 64 * 1024;

/// Result of one tail pass over a single file.
#[derive(Debug, Default)]
pub struct LineBatch {
    pub lines: Vec<String>,
    /// Cursor after the last fully consumed line.
    pub new_offset: u64,
    /// Complete lines dropped for exceeding [`MAX_LINE_BYTES`].
    pub dropped_oversized: usize,
}

enum LineRead {
    Complete { consumed: u64, line: String },
    Oversized { consumed: u64 },
    /// Trailing bytes with no newline yet — do not consume.
    Partial,
    Eof,
}

fn read_one_line<R: BufRead>(reader: &mut R) -> Result<LineRead> {
    let mut buf = Vec::new();
    let n = reader
        .by_ref()
        .take(MAX_LINE_BYTES + 1)
        .read_until(b'\n', &mut buf)
        .map_err(Error::Io)? as u64;

    if n == 0 {
        return Ok(LineRead::Eof);
    }

    if buf.last() == Some(&b'\n') {
        // The take() cap guarantees content here is at most MAX_LINE_BYTES.
        buf.pop();
        if buf.last() == Some(&b'\r') {
            buf.pop();
        }
        return Ok(LineRead::Complete {
            consumed: n,
            line: String::from_utf8_lossy(&buf).into_owned(),
        });
    }

    if n > MAX_LINE_BYTES {
        // Past the cap without a newline: scan forward for the terminator
        // in bounded chunks so memory stays flat.
        let mut consumed = n;
        let mut scratch = Vec::with_capacity(READ_CHUNK_BYTES);
        loop {
            scratch.clear();
            let m = reader
                .by_ref()
                .take(READ_CHUNK_BYTES as u64)
                .read_until(b'\n', &mut scratch)
                .map_err(Error::Io)? as u64;
            if m == 0 {
                // Newline not written yet; retry the whole line next tick.
                return Ok(LineRead::Partial);
            }
            consumed += m;
            if scratch.last() == Some(&b'\n') {
                return Ok(LineRead::Oversized { consumed });
            }
        }
    }

    Ok(LineRead::Partial)
}

/// Read up to `max_lines` new complete lines starting at `offset`.
///
/// A file that shrank below the cursor (rotation, truncation) resets the
/// cursor to the new end without emitting lines.
pub fn read_new_lines(path: &Path, offset: u64, max_lines: usize) -> Result<LineBatch> {
    let file = match std::fs::File::open(path) {
        Ok(f) => f,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Ok(LineBatch {
                new_offset: offset,
                ..Default::default()
            })
        }
        Err(e) => return Err(Error::Io(e)),
    };

    let len = file.metadata().map_err(Error::Io)?.len();
    if len < offset {
        return Ok(LineBatch {
            new_offset: len,
            ..Default::default()
        });
    }
    if len == offset {
        return Ok(LineBatch {
            new_offset: offset,
            ..Default::default()
        });
    }

    let mut reader = BufReader::with_capacity(READ_CHUNK_BYTES, file);
    reader.seek(SeekFrom::Start(offset)).map_err(Error::Io)?;

    let mut batch = LineBatch {
        new_offset: offset,
        ..Default::default()
    };

    while batch.lines.len() < max_lines {
        match read_one_line(&mut reader)? {
            LineRead::Complete { consumed, line } => {
                batch.new_offset += consumed;
                batch.lines.push(line);
            }
            LineRead::Oversized { consumed } => {
                batch.new_offset += consumed;
                batch.dropped_oversized += 1;
            }
            LineRead::Partial | LineRead::Eof => break,
        }
    }

    Ok(batch)
}

/// Whether a transcript path should be ignored (archived or deleted copies).
pub fn is_ignored_transcript(path: &Path) -> bool {
    match path.file_name().and_then(|n| n.to_str()) {
        Some(name) => name.contains(".deleted.") || name.contains(".bak."),
        None => true,
    }
}

/// Discover transcript files under `<state_dir>/agents/*/sessions/*.jsonl`.
pub fn discover_transcripts(state_dir: &Path) -> Vec<PathBuf> {
    let mut out = Vec::new();
    let agents_dir = state_dir.join("agents");
    let Ok(agents) = std::fs::read_dir(&agents_dir) else {
        return out;
    };
    for agent in agents.flatten() {
        let sessions = agent.path().join("sessions");
        let Ok(entries) = std::fs::read_dir(&sessions) else {
            continue;
        };
        for entry in entries.flatten() {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) == Some("jsonl")
                && !is_ignored_transcript(&path)
            {
                out.push(path);
            }
        }
    }
    out.sort();
    out
}

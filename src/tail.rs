// tail.rs
use crate::error::Result;
use camino::Utf8Path;
use encoding_rs::{CoderResult, Decoder, Encoding};
use std::io::SeekFrom;
use std::sync::Mutex;
use tokio::fs::File;
use tokio::io::{AsyncReadExt, AsyncSeekExt};

/// Reusable read buffer shared by every tail read in a runtime
///
/// Sized at twice the configured chunk size — the widest window a read can
/// ask for — and reallocated lazily only when the chunk size changes.
pub struct TailBuffer {
    buf: Vec<u8>,
    chunk_size: usize,
}

impl TailBuffer {
    pub(crate) fn new() -> Self {
        Self {
            buf: Vec::new(),
            chunk_size: 0,
        }
    }

    fn ensure(&mut self, chunk_size: usize) {
        if self.chunk_size != chunk_size {
            self.buf = vec![0u8; 2 * chunk_size];
            self.chunk_size = chunk_size;
        }
    }
}

/// Stateful byte→text converter for one encoding
///
/// Keeps partial multi-byte sequences between reads, so a character split
/// across two chunk-aligned reads reconstructs correctly. Must be reset
/// before reuse on an unrelated file, which drops any pending state.
pub struct TextDecoder {
    encoding: &'static Encoding,
    inner: Decoder,
}

impl TextDecoder {
    pub fn new(encoding: &'static Encoding) -> Self {
        Self {
            encoding,
            inner: encoding.new_decoder(),
        }
    }

    /// Drops pending multi-byte state
    pub fn reset(&mut self) {
        self.inner = self.encoding.new_decoder();
    }

    /// Decodes a chunk without finalizing; malformed sequences become
    /// replacement characters
    pub fn decode(&mut self, bytes: &[u8]) -> String {
        let capacity = self
            .inner
            .max_utf8_buffer_length(bytes.len())
            .unwrap_or(bytes.len() * 3 + 4);
        let mut out = String::with_capacity(capacity);
        let mut pos = 0;
        loop {
            let (result, read, _had_errors) =
                self.inner.decode_to_string(&bytes[pos..], &mut out, false);
            pos += read;
            match result {
                CoderResult::InputEmpty => break,
                CoderResult::OutputFull => out.reserve(capacity.max(16)),
            }
        }
        out
    }
}

/// Reads the newly-grown tail of `file` past `offset`, decoded
///
/// A missing offset reads the whole tail window. `remaining = size − offset`
/// decides the window: nothing left (the file shrank below the offset, or
/// the offset sits exactly at EOF) returns empty text; a tail larger than
/// one chunk reads a window of `remaining % chunk + chunk` bytes ending
/// exactly at EOF; otherwise exactly the remaining bytes from `offset`. Only
/// the bytes actually read are decoded, so a file shrinking mid-read still
/// yields well-formed output. The handle is released on every exit path.
pub(crate) async fn last_chunk(
    buffer: &tokio::sync::Mutex<TailBuffer>,
    chunk_size: usize,
    file: &Utf8Path,
    decoder: &Mutex<TextDecoder>,
    offset: Option<u64>,
) -> Result<String> {
    let offset = offset.unwrap_or(0);
    let chunk = chunk_size as u64;

    let mut handle = File::open(file).await?;
    let size = handle.metadata().await?.len();
    if size <= offset {
        return Ok(String::new());
    }
    let remaining = size - offset;

    let (read_len, read_pos) = if remaining > chunk {
        let window = (remaining % chunk) + chunk;
        (window as usize, size - window)
    } else {
        (remaining as usize, offset)
    };

    let mut shared = buffer.lock().await;
    shared.ensure(chunk_size);

    handle.seek(SeekFrom::Start(read_pos)).await?;
    let mut filled = 0;
    while filled < read_len {
        let n = handle.read(&mut shared.buf[filled..read_len]).await?;
        if n == 0 {
            break;
        }
        filled += n;
    }

    let text = decoder.lock().unwrap().decode(&shared.buf[..filled]);
    Ok(text)
}

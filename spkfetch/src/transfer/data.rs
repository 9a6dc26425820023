//! The data connection: stream the artifact into a local file.

use std::path::Path;

use bytes::BytesMut;
use log::{debug, trace};
use memchr::memchr;
use tokio::fs::File;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWriteExt, BufWriter};
use tokio::time::Instant;

use crate::channel::StepTimeout;
use crate::error::{Result, TransferError};
use crate::request::Format;

const READ_CHUNK: usize = 16 * 1024;

/// Converts network line endings (CRLF) to LF across chunk boundaries.
#[derive(Debug, Default)]
pub(crate) struct LineEndings {
    pending_cr: bool,
}

impl LineEndings {
    /// Decode `chunk`, appending to `out`. A trailing CR is held back
    /// until the next chunk shows whether an LF follows.
    pub(crate) fn decode(&mut self, chunk: &[u8], out: &mut Vec<u8>) {
        let mut rest = chunk;
        if self.pending_cr && !rest.is_empty() {
            self.pending_cr = false;
            if rest[0] != b'\n' {
                out.push(b'\r');
            }
        }

        while let Some(pos) = memchr(b'\r', rest) {
            out.extend_from_slice(&rest[..pos]);
            match rest.get(pos + 1) {
                Some(b'\n') => {
                    out.push(b'\n');
                    rest = &rest[pos + 2..];
                }
                Some(_) => {
                    out.push(b'\r');
                    rest = &rest[pos + 1..];
                }
                None => {
                    self.pending_cr = true;
                    rest = &[];
                }
            }
        }
        out.extend_from_slice(rest);
    }

    /// Flush a CR held back at end of stream.
    pub(crate) fn finish(&mut self, out: &mut Vec<u8>) {
        if std::mem::take(&mut self.pending_cr) {
            out.push(b'\r');
        }
    }
}

/// Copy `stream` to a new file at `path` until the peer closes it.
///
/// Text-format transfers have their line endings converted. The whole
/// copy must finish within `timeout`. Returns the number of bytes written.
pub(crate) async fn receive<R>(
    mut stream: R,
    path: &Path,
    format: Format,
    timeout: StepTimeout,
) -> Result<u64>
where
    R: AsyncRead + Unpin,
{
    let deadline = timeout.deadline_from(Instant::now());
    let mut file = BufWriter::new(File::create(path).await?);
    let mut endings = (format == Format::Transfer).then(LineEndings::default);
    let mut decoded = Vec::new();
    let mut written = 0u64;

    loop {
        let mut chunk = BytesMut::with_capacity(READ_CHUNK);
        let read = stream.read_buf(&mut chunk);
        let n = match deadline {
            Some(deadline) => tokio::time::timeout_at(deadline, read).await.map_err(|_| {
                TransferError::DataConnection {
                    reply: format!("transfer did not complete within {timeout}"),
                }
            })??,
            None => read.await?,
        };
        if n == 0 {
            break;
        }
        trace!("data: received {n} bytes");

        let bytes = match endings.as_mut() {
            Some(endings) => {
                decoded.clear();
                endings.decode(&chunk, &mut decoded);
                decoded.as_slice()
            }
            None => &chunk[..],
        };
        file.write_all(bytes).await?;
        written += bytes.len() as u64;
    }

    if let Some(endings) = endings.as_mut() {
        decoded.clear();
        endings.finish(&mut decoded);
        file.write_all(&decoded).await?;
        written += decoded.len() as u64;
    }

    file.flush().await?;
    file.into_inner().sync_all().await?;
    debug!("data: wrote {written} bytes to {}", path.display());
    Ok(written)
}

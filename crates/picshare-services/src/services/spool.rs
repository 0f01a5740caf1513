//! Tee an upload stream into a private spool while it is being stored.
//!
//! The upload reader belongs to the request and is gone once the response is
//! sent. The spool keeps a copy that background extraction can read later:
//! in memory up to a threshold, in an anonymous temp file beyond it.
//!
//! The read side only hands chunks over a channel. A blocking-pool task owns
//! the [`SpooledTempFile`] and does all of its writes, so file I/O never runs
//! on a runtime worker thread.

use std::io::{self, Write};
use std::pin::Pin;
use std::task::{ready, Context, Poll};

use tempfile::SpooledTempFile;
use tokio::io::{AsyncRead, ReadBuf};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

pub struct SpoolingReader<'a> {
    inner: &'a mut (dyn AsyncRead + Send + Unpin),
    chunks: Option<mpsc::UnboundedSender<Vec<u8>>>,
    writer: JoinHandle<io::Result<SpooledTempFile>>,
    spooled_bytes: u64,
}

impl<'a> SpoolingReader<'a> {
    /// Must be called inside a Tokio runtime.
    pub fn new(inner: &'a mut (dyn AsyncRead + Send + Unpin), max_memory_bytes: usize) -> Self {
        let (chunks, mut rx) = mpsc::unbounded_channel::<Vec<u8>>();
        let writer = tokio::task::spawn_blocking(move || {
            let mut spool = SpooledTempFile::new(max_memory_bytes);
            while let Some(chunk) = rx.blocking_recv() {
                spool.write_all(&chunk)?;
            }
            spool.flush()?;
            Ok(spool)
        });

        SpoolingReader {
            inner,
            chunks: Some(chunks),
            writer,
            spooled_bytes: 0,
        }
    }

    /// Number of bytes handed to the spool so far.
    pub fn spooled_bytes(&self) -> u64 {
        self.spooled_bytes
    }

    /// Wait for the writer to drain and return the spooled copy, or the error
    /// that stopped spooling.
    ///
    /// A spool failure never fails the read side; the caller decides what a
    /// missing copy means.
    pub async fn finish(self) -> io::Result<SpooledTempFile> {
        let SpoolingReader { chunks, writer, .. } = self;
        // Closing the channel ends the writer loop.
        drop(chunks);
        match writer.await {
            Ok(result) => result,
            Err(e) => Err(io::Error::other(e)),
        }
    }
}

impl AsyncRead for SpoolingReader<'_> {
    fn poll_read(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        let this = &mut *self;
        let before = buf.filled().len();
        ready!(Pin::new(&mut *this.inner).poll_read(cx, buf))?;

        let fresh = &buf.filled()[before..];
        if fresh.is_empty() {
            return Poll::Ready(Ok(()));
        }
        let sent = this.chunks.as_ref().map(|chunks| chunks.send(fresh.to_vec()).is_ok());
        match sent {
            Some(true) => this.spooled_bytes += fresh.len() as u64,
            Some(false) => {
                // The writer stopped early; `finish` reports why.
                tracing::warn!("Upload spool writer stopped, dropping copy");
                this.chunks = None;
            }
            None => {}
        }
        Poll::Ready(Ok(()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{Read, Seek, SeekFrom};
    use tokio::io::AsyncReadExt;

    async fn spool_through(data: &[u8], max_memory_bytes: usize) -> (Vec<u8>, SpooledTempFile) {
        let mut source = data;
        let mut reader = SpoolingReader::new(&mut source, max_memory_bytes);
        let mut forwarded = Vec::new();
        reader.read_to_end(&mut forwarded).await.unwrap();
        assert_eq!(reader.spooled_bytes(), data.len() as u64);
        (forwarded, reader.finish().await.unwrap())
    }

    fn contents(spool: &mut SpooledTempFile) -> Vec<u8> {
        spool.seek(SeekFrom::Start(0)).unwrap();
        let mut copy = Vec::new();
        spool.read_to_end(&mut copy).unwrap();
        copy
    }

    #[tokio::test]
    async fn test_copy_matches_forwarded_bytes_in_memory() {
        let data = b"small upload".to_vec();
        let (forwarded, mut spool) = spool_through(&data, 1024).await;
        assert_eq!(forwarded, data);
        assert!(!spool.is_rolled());
        assert_eq!(contents(&mut spool), data);
    }

    #[tokio::test(flavor = "current_thread")]
    async fn test_large_uploads_spill_to_disk() {
        let data: Vec<u8> = (0..100_000u32).map(|i| (i % 253) as u8).collect();
        let (forwarded, mut spool) = spool_through(&data, 4096).await;
        assert_eq!(forwarded, data);
        assert!(spool.is_rolled());
        assert_eq!(contents(&mut spool), data);
    }

    #[tokio::test]
    async fn test_many_small_reads_keep_their_order() {
        let data: Vec<u8> = (0..10_000u32).map(|i| (i % 251) as u8).collect();
        let mut source = &data[..];
        let mut reader = SpoolingReader::new(&mut source, 512);

        let mut forwarded = Vec::new();
        let mut buf = [0u8; 7];
        loop {
            let n = reader.read(&mut buf).await.unwrap();
            if n == 0 {
                break;
            }
            forwarded.extend_from_slice(&buf[..n]);
        }

        let mut spool = reader.finish().await.unwrap();
        assert_eq!(forwarded, data);
        assert_eq!(contents(&mut spool), data);
    }

    #[tokio::test]
    async fn test_empty_upload_gives_empty_spool() {
        let (forwarded, mut spool) = spool_through(b"", 16).await;
        assert!(forwarded.is_empty());
        assert!(contents(&mut spool).is_empty());
    }
}

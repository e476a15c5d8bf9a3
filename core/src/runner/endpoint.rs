//! Deferred stage endpoints.
//!
//! Process stages only get real pipe handles once spawned, but the linker claims endpoints
//! before anything runs. A slot is filled at spawn time; dropping an unfilled slot resolves
//! the pending side the way an unconnected pipe behaves.

use std::io;

use futures::FutureExt;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::sync::oneshot;

use super::traits::{BoxReader, BoxWriter, PendingReader, PendingWriter};

pub struct ReaderSlot(oneshot::Sender<BoxReader>);

pub struct WriterSlot(oneshot::Sender<BoxWriter>);

impl ReaderSlot {
    pub fn fill<R>(self, rd: R)
    where
        R: AsyncRead + Unpin + Send + 'static,
    {
        // Receiver gone means the relay was never spawned; nothing to deliver to.
        let _ = self.0.send(Box::new(rd));
    }
}

impl WriterSlot {
    pub fn fill<W>(self, wr: W)
    where
        W: AsyncWrite + Unpin + Send + 'static,
    {
        let _ = self.0.send(Box::new(wr));
    }
}

/// An output endpoint that reads as end-of-stream if its slot is dropped unfilled.
pub fn deferred_reader() -> (ReaderSlot, PendingReader) {
    let (tx, rx) = oneshot::channel::<BoxReader>();
    let pending = async move {
        match rx.await {
            Ok(rd) => Ok(rd),
            Err(_) => Ok(Box::new(tokio::io::empty()) as BoxReader),
        }
    }
    .boxed();
    (ReaderSlot(tx), pending)
}

/// An input endpoint that fails with `BrokenPipe` if its slot is dropped unfilled.
pub fn deferred_writer() -> (WriterSlot, PendingWriter) {
    let (tx, rx) = oneshot::channel::<BoxWriter>();
    let pending = async move {
        rx.await.map_err(|_| {
            io::Error::new(io::ErrorKind::BrokenPipe, "stage input was never connected")
        })
    }
    .boxed();
    (WriterSlot(tx), pending)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};

    #[tokio::test]
    async fn filled_slots_deliver_handles() {
        let (rslot, pending_rd) = deferred_reader();
        let (wslot, pending_wr) = deferred_writer();
        let (a, b) = tokio::io::duplex(64);
        rslot.fill(a);
        wslot.fill(b);

        let mut wr = pending_wr.await.unwrap();
        wr.write_all(b"ping").await.unwrap();
        drop(wr);

        let mut rd = pending_rd.await.unwrap();
        let mut got = Vec::new();
        rd.read_to_end(&mut got).await.unwrap();
        assert_eq!(got, b"ping");
    }

    #[tokio::test]
    async fn dropped_reader_slot_is_end_of_stream() {
        let (slot, pending) = deferred_reader();
        drop(slot);

        let mut rd = pending.await.unwrap();
        let mut got = Vec::new();
        assert_eq!(rd.read_to_end(&mut got).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn dropped_writer_slot_is_broken_pipe() {
        let (slot, pending) = deferred_writer();
        drop(slot);

        let err = pending.await.err().expect("expected broken pipe");
        assert_eq!(err.kind(), io::ErrorKind::BrokenPipe);
    }
}

//! Single-consumer encoder thread.
//!
//! [`RbdWriter`] is a plain owned state machine. When several producers need
//! to feed one stream, [`EncoderActor`] moves the writer onto its own thread
//! and funnels owned chunks to it through a bounded channel, so stripe order
//! and offsets follow the order in which chunks are received.

use std::io::Write;
use std::thread::{self, JoinHandle};

use crossbeam_channel::{bounded, Sender};
use tracing::debug;

use crate::error::{Error, Result};
use crate::rbd::{EncodeStats, RbdWriter};

/// Cloneable sending side of an [`EncoderActor`].
#[derive(Clone)]
pub struct EncoderHandle {
    sender: Sender<Vec<u8>>,
}

impl EncoderHandle {
    /// Queues a chunk for encoding, blocking while the channel is full.
    ///
    /// # Errors
    ///
    /// Fails once the encoder thread has stopped, usually because an earlier
    /// chunk failed to encode. The underlying error is reported by
    /// [`EncoderActor::finish`].
    pub fn send(&self, chunk: Vec<u8>) -> Result<()> {
        self.sender
            .send(chunk)
            .map_err(|_| Error::encoder("encoder thread has stopped"))
    }
}

/// An [`RbdWriter`] running on a dedicated thread.
///
/// # Example
///
/// ```
/// use rbdconv_core::actor::EncoderActor;
/// use rbdconv_core::rbd::RbdWriter;
///
/// let writer = RbdWriter::with_order(Vec::new(), 8192, 12).unwrap();
/// let actor = EncoderActor::spawn(writer, 4);
///
/// let handle = actor.handle();
/// handle.send(vec![1u8; 4096]).unwrap();
/// handle.send(vec![2u8; 4096]).unwrap();
/// drop(handle);
///
/// let (_output, stats) = actor.finish().unwrap();
/// assert_eq!(stats.records, 2);
/// ```
pub struct EncoderActor<W: Write + Send + 'static> {
    sender: Sender<Vec<u8>>,
    thread: JoinHandle<Result<(W, EncodeStats)>>,
}

impl<W: Write + Send + 'static> EncoderActor<W> {
    /// Starts the encoder thread with room for `capacity` queued chunks.
    pub fn spawn(mut writer: RbdWriter<W>, capacity: usize) -> Self {
        let (sender, receiver) = bounded::<Vec<u8>>(capacity.max(1));

        let thread = thread::spawn(move || {
            for chunk in receiver {
                writer.write_data(&chunk)?;
            }
            debug!("encoder channel closed, finishing stream");
            writer.finish()
        });

        Self { sender, thread }
    }

    /// Returns a new handle for sending chunks.
    pub fn handle(&self) -> EncoderHandle {
        EncoderHandle {
            sender: self.sender.clone(),
        }
    }

    /// Closes the channel, waits for all queued chunks and finishes the stream.
    ///
    /// Every [`EncoderHandle`] must be dropped first; the thread only finishes
    /// once all senders are gone.
    pub fn finish(self) -> Result<(W, EncodeStats)> {
        drop(self.sender);
        self.thread
            .join()
            .map_err(|_| Error::encoder("encoder thread panicked"))?
    }
}

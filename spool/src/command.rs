//! Loop handoff channel.
//!
//! Every event loop owns a multi-producer single-consumer in-queue. Work
//! that must touch loop-owned connection state (outbound writes, wake-ups,
//! closes) is posted here from whatever thread produced it and executed by
//! the loop between reads. Per-sender ordering is preserved; nothing is
//! promised between senders.

use std::fmt;

use bytes::Bytes;
use crossbeam_channel::{unbounded, Receiver, Sender, TryRecvError};

use crate::error::Error;

/// Loop-unique identifier of a connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConnId(pub u64);

/// Work posted to an owning loop.
pub enum Command {
    /// Write already-encoded bytes to a connection's transport.
    ///
    /// Encoding happened in the poster's context so encode errors surfaced
    /// there; the loop only performs the transport write.
    Write { conn: ConnId, data: Bytes },

    /// Invoke the user's wake callback for a connection.
    Wake { conn: ConnId },

    /// Release a connection.
    Close { conn: ConnId },

    /// Arbitrary deferred work executed in loop context.
    Run(Box<dyn FnOnce() + Send>),
}

impl fmt::Debug for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Command::Write { conn, data } => f
                .debug_struct("Write")
                .field("conn", conn)
                .field("len", &data.len())
                .finish(),
            Command::Wake { conn } => f.debug_struct("Wake").field("conn", conn).finish(),
            Command::Close { conn } => f.debug_struct("Close").field("conn", conn).finish(),
            Command::Run(_) => f.write_str("Run(..)"),
        }
    }
}

/// Cloneable producer half of a loop's in-queue.
#[derive(Clone)]
pub struct LoopSender {
    tx: Sender<Command>,
}

impl LoopSender {
    /// Post a command to the owning loop.
    pub fn send(&self, command: Command) -> Result<(), Error> {
        self.tx.send(command).map_err(|_| Error::LoopGone)
    }
}

/// Consumer half of a loop's in-queue; held by the loop alone.
pub struct LoopQueue {
    rx: Receiver<Command>,
}

impl LoopQueue {
    /// Non-blocking pop of the next pending command.
    pub fn try_recv(&self) -> Result<Command, TryRecvError> {
        self.rx.try_recv()
    }

    /// Number of commands waiting.
    pub fn pending(&self) -> usize {
        self.rx.len()
    }
}

/// Create the in-queue for one loop.
pub fn loop_channel() -> (LoopSender, LoopQueue) {
    let (tx, rx) = unbounded();
    (LoopSender { tx }, LoopQueue { rx })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_per_sender_ordering() {
        let (tx, queue) = loop_channel();
        for i in 0..10u64 {
            tx.send(Command::Wake { conn: ConnId(i) }).unwrap();
        }
        for i in 0..10u64 {
            match queue.try_recv().unwrap() {
                Command::Wake { conn } => assert_eq!(conn, ConnId(i)),
                other => panic!("unexpected command {:?}", other),
            }
        }
        assert!(queue.try_recv().is_err());
    }

    #[test]
    fn test_multi_producer() {
        let (tx, queue) = loop_channel();
        let handles: Vec<_> = (0..4u64)
            .map(|sender| {
                let tx = tx.clone();
                std::thread::spawn(move || {
                    for _ in 0..100 {
                        tx.send(Command::Wake {
                            conn: ConnId(sender),
                        })
                        .unwrap();
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }
        assert_eq!(queue.pending(), 400);
    }

    #[test]
    fn test_send_after_loop_gone() {
        let (tx, queue) = loop_channel();
        drop(queue);
        assert!(matches!(
            tx.send(Command::Close { conn: ConnId(1) }),
            Err(Error::LoopGone)
        ));
    }
}

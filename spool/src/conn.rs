//! Connection shell.
//!
//! A [`Conn`] owns everything tied to one peer: the transport handle, the
//! two-tier read buffer, a reference to the server codec, the user context
//! slot and the peer addresses. It is owned and mutated by exactly one
//! event loop; code running anywhere else talks to it through a cheap
//! [`ConnHandle`] that posts commands onto the owning loop's in-queue.

use std::any::Any;
use std::io::{self, Write};
use std::net::{SocketAddr, TcpStream, UdpSocket};
use std::sync::Arc;

use bytes::Bytes;
use spool_codec::{Codec, CodecError, ConnBuffer};

use crate::command::{Command, ConnId, LoopSender};
use crate::error::{Error, Result};

/// Owned transport handle: a connected stream, or the server's shared
/// packet socket paired with this peer's address.
#[derive(Debug)]
pub(crate) enum Transport {
    Stream(TcpStream),
    Packet {
        socket: Arc<UdpSocket>,
        peer: SocketAddr,
    },
}

/// Per-peer connection state, exclusively owned by one event loop.
pub struct Conn {
    id: ConnId,
    context: Option<Box<dyn Any + Send>>,
    transport: Option<Transport>,
    codec: Arc<dyn Codec>,
    buffer: Option<ConnBuffer>,
    local_addr: Option<SocketAddr>,
    remote_addr: Option<SocketAddr>,
    closed: bool,
    loop_tx: LoopSender,
}

impl Conn {
    pub(crate) fn new_stream(
        id: ConnId,
        stream: TcpStream,
        codec: Arc<dyn Codec>,
        loop_tx: LoopSender,
    ) -> Self {
        let local_addr = stream.local_addr().ok();
        let remote_addr = stream.peer_addr().ok();
        Self {
            id,
            context: None,
            transport: Some(Transport::Stream(stream)),
            codec,
            buffer: Some(ConnBuffer::new()),
            local_addr,
            remote_addr,
            closed: false,
            loop_tx,
        }
    }

    pub(crate) fn new_packet(
        id: ConnId,
        socket: Arc<UdpSocket>,
        peer: SocketAddr,
        codec: Arc<dyn Codec>,
        loop_tx: LoopSender,
    ) -> Self {
        let local_addr = socket.local_addr().ok();
        Self {
            id,
            context: None,
            transport: Some(Transport::Packet { socket, peer }),
            codec,
            buffer: Some(ConnBuffer::new()),
            local_addr,
            remote_addr: Some(peer),
            closed: false,
            loop_tx,
        }
    }

    /// This connection's loop-unique id.
    pub fn id(&self) -> ConnId {
        self.id
    }

    /// Whether the connection has been released.
    pub fn is_closed(&self) -> bool {
        self.closed
    }

    /// The server codec framing this connection.
    pub fn codec(&self) -> &Arc<dyn Codec> {
        &self.codec
    }

    /// The user context, if one was set.
    pub fn context(&self) -> Option<&(dyn Any + Send)> {
        self.context.as_deref()
    }

    /// Mutable access to the user context.
    pub fn context_mut(&mut self) -> Option<&mut (dyn Any + Send)> {
        self.context.as_deref_mut()
    }

    /// Replace the user context.
    pub fn set_context(&mut self, context: impl Any + Send) {
        self.context = Some(Box::new(context));
    }

    /// Local address of the transport.
    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.local_addr
    }

    /// Remote peer address.
    pub fn remote_addr(&self) -> Option<SocketAddr> {
        self.remote_addr
    }

    /// Bytes currently buffered and not yet consumed by the codec.
    pub fn buffered_len(&self) -> usize {
        self.buffer.as_ref().map_or(0, ConnBuffer::len)
    }

    /// The read buffer, for codecs and loop glue.
    pub fn buffer_mut(&mut self) -> Option<&mut ConnBuffer> {
        self.buffer.as_mut()
    }

    /// Drop everything buffered for this connection.
    pub fn reset_buffer(&mut self) {
        if let Some(buffer) = self.buffer.as_mut() {
            buffer.reset();
        }
    }

    /// A cheap cross-thread handle to this connection.
    pub fn handle(&self) -> ConnHandle {
        let packet = match &self.transport {
            Some(Transport::Packet { socket, peer }) => Some((Arc::clone(socket), *peer)),
            _ => None,
        };
        ConnHandle {
            id: self.id,
            codec: Arc::clone(&self.codec),
            loop_tx: self.loop_tx.clone(),
            packet,
        }
    }

    /// Encode `buf` in the caller's context and post the write to the
    /// owning loop.
    ///
    /// Encode errors surface here, synchronously; transport errors from the
    /// eventual write go to the loop's error hook instead.
    pub fn async_write(&self, buf: &[u8]) -> Result<()> {
        if self.closed {
            return Err(Error::Closed);
        }
        let data = self.codec.encode(buf)?;
        self.loop_tx.send(Command::Write {
            conn: self.id,
            data,
        })
    }

    /// Write a datagram directly through the shared packet socket.
    ///
    /// Packet writes are atomic, so no loop handoff is needed.
    pub fn send_to(&self, buf: &[u8]) -> Result<()> {
        match &self.transport {
            Some(Transport::Packet { socket, peer }) => {
                socket.send_to(buf, *peer)?;
                Ok(())
            }
            _ => Err(Error::NotPacket),
        }
    }

    /// Post a wake-up; the loop will invoke the wake callback.
    pub fn wake(&self) -> Result<()> {
        if self.closed {
            return Err(Error::Closed);
        }
        self.loop_tx.send(Command::Wake { conn: self.id })
    }

    /// Post a close; the loop will release the connection.
    pub fn close(&self) -> Result<()> {
        if self.closed {
            return Err(Error::Closed);
        }
        self.loop_tx.send(Command::Close { conn: self.id })
    }

    pub(crate) fn fill(&mut self, data: &[u8]) {
        if let Some(buffer) = self.buffer.as_mut() {
            buffer.fill(data);
        }
    }

    pub(crate) fn spill(&mut self) {
        if let Some(buffer) = self.buffer.as_mut() {
            buffer.spill();
        }
    }

    pub(crate) fn decode_frame(&mut self) -> std::result::Result<Bytes, CodecError> {
        let codec = Arc::clone(&self.codec);
        match self.buffer.as_mut() {
            Some(buffer) => codec.decode(buffer),
            // released mid-drain; report "nothing to decode"
            None => Err(CodecError::UnexpectedEof),
        }
    }

    pub(crate) fn transport_write(&mut self, data: &[u8]) -> io::Result<()> {
        match self.transport.as_mut() {
            Some(Transport::Stream(stream)) => stream.write_all(data),
            Some(Transport::Packet { socket, peer }) => {
                socket.send_to(data, *peer).map(|_| ())
            }
            None => Err(io::Error::new(
                io::ErrorKind::NotConnected,
                "transport released",
            )),
        }
    }

    /// Hand buffers back to their pools and clear per-peer state.
    pub(crate) fn release(&mut self) {
        self.closed = true;
        self.buffer = None;
        self.context = None;
        self.local_addr = None;
        self.remote_addr = None;
        self.transport = None;
    }
}

impl std::fmt::Debug for Conn {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Conn")
            .field("id", &self.id)
            .field("local_addr", &self.local_addr)
            .field("remote_addr", &self.remote_addr)
            .field("closed", &self.closed)
            .field("buffered", &self.buffered_len())
            .finish()
    }
}

/// Cheap cloneable handle for talking to a loop-owned connection from any
/// thread.
///
/// All mutation goes through the owning loop's in-queue; the handle itself
/// never touches connection state.
#[derive(Clone)]
pub struct ConnHandle {
    id: ConnId,
    codec: Arc<dyn Codec>,
    loop_tx: LoopSender,
    packet: Option<(Arc<UdpSocket>, SocketAddr)>,
}

impl ConnHandle {
    /// The target connection's id.
    pub fn id(&self) -> ConnId {
        self.id
    }

    /// Encode in this thread's context and post the write.
    pub fn async_write(&self, buf: &[u8]) -> Result<()> {
        let data = self.codec.encode(buf)?;
        self.loop_tx.send(Command::Write {
            conn: self.id,
            data,
        })
    }

    /// Write a datagram directly through the shared packet socket.
    pub fn send_to(&self, buf: &[u8]) -> Result<()> {
        match &self.packet {
            Some((socket, peer)) => {
                socket.send_to(buf, *peer)?;
                Ok(())
            }
            None => Err(Error::NotPacket),
        }
    }

    /// Post a wake-up to the owning loop.
    pub fn wake(&self) -> Result<()> {
        self.loop_tx.send(Command::Wake { conn: self.id })
    }

    /// Post a close to the owning loop.
    pub fn close(&self) -> Result<()> {
        self.loop_tx.send(Command::Close { conn: self.id })
    }
}

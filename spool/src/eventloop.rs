//! The loop's codec-facing half.
//!
//! The OS-level notifier (epoll/kqueue/IOCP) and listener live outside this
//! crate; what lives here is everything the notifier glue calls into once
//! it has accepted a peer or read bytes: attaching connections, driving the
//! codec to fixpoint per read, and draining the in-queue of commands posted
//! from other threads.
//!
//! One `EventLoop` is single-threaded by construction: it owns its
//! connections outright and nothing else can reach them except through the
//! in-queue.

use std::collections::HashMap;
use std::net::{SocketAddr, TcpStream, UdpSocket};
use std::sync::Arc;

use bytes::Bytes;
use crossbeam_channel::TryRecvError;
use spool_codec::Codec;
use tracing::{debug, error, trace, warn};

use crate::command::{loop_channel, Command, ConnId, LoopQueue, LoopSender};
use crate::config::LoopConfig;
use crate::conn::{Conn, ConnHandle};
use crate::error::Error;
use crate::handler::{Action, EventHandler};

/// One event loop's connection registry and in-queue consumer.
pub struct EventLoop {
    conns: HashMap<ConnId, Conn>,
    queue: LoopQueue,
    tx: LoopSender,
    handler: Arc<dyn EventHandler>,
    codec: Arc<dyn Codec>,
    command_batch: usize,
    next_id: u64,
}

impl EventLoop {
    /// Create a loop serving `handler` with `codec` framing.
    pub fn new(
        handler: Arc<dyn EventHandler>,
        codec: Arc<dyn Codec>,
        config: &LoopConfig,
    ) -> Self {
        let (tx, queue) = loop_channel();
        Self {
            conns: HashMap::new(),
            queue,
            tx,
            handler,
            codec,
            command_batch: config.command_batch,
            next_id: 0,
        }
    }

    /// Producer half of this loop's in-queue.
    pub fn sender(&self) -> LoopSender {
        self.tx.clone()
    }

    /// Number of attached connections.
    pub fn conn_count(&self) -> usize {
        self.conns.len()
    }

    /// A cross-thread handle to an attached connection.
    pub fn handle(&self, id: ConnId) -> Option<ConnHandle> {
        self.conns.get(&id).map(Conn::handle)
    }

    /// The loop-owned connection itself, for notifier glue.
    pub fn conn_mut(&mut self, id: ConnId) -> Option<&mut Conn> {
        self.conns.get_mut(&id)
    }

    /// Attach an accepted stream to this loop.
    pub fn attach_stream(&mut self, stream: TcpStream) -> ConnId {
        let id = self.next_conn_id();
        let conn = Conn::new_stream(id, stream, Arc::clone(&self.codec), self.tx.clone());
        debug!(conn = id.0, peer = ?conn.remote_addr(), "stream connection attached");
        self.attach(id, conn)
    }

    /// Attach a packet peer sharing the server's UDP socket.
    pub fn attach_packet(&mut self, socket: Arc<UdpSocket>, peer: SocketAddr) -> ConnId {
        let id = self.next_conn_id();
        let conn = Conn::new_packet(id, socket, peer, Arc::clone(&self.codec), self.tx.clone());
        debug!(conn = id.0, peer = %peer, "packet connection attached");
        self.attach(id, conn)
    }

    /// Feed bytes the notifier read from a connection's transport.
    ///
    /// Lands the bytes in the scratch buffer, drives decode to fixpoint
    /// (one `on_data` per complete frame), then spills any leftover into
    /// the inbound ring.
    pub fn on_readable(&mut self, id: ConnId, data: &[u8]) {
        let Some(conn) = self.conns.get_mut(&id) else {
            trace!(conn = id.0, "read for detached connection dropped");
            return;
        };
        conn.fill(data);
        self.drain_decode(id);
    }

    /// Drain up to the configured batch of pending commands.
    ///
    /// Returns the number of commands executed. Commands aimed at already
    /// released connections are consumed and ignored.
    pub fn poll_commands(&mut self) -> usize {
        let mut handled = 0;
        for _ in 0..self.command_batch {
            match self.queue.try_recv() {
                Ok(command) => {
                    self.execute(command);
                    handled += 1;
                }
                Err(TryRecvError::Empty) => break,
                Err(TryRecvError::Disconnected) => {
                    warn!("loop in-queue disconnected");
                    break;
                }
            }
        }
        handled
    }

    /// Release a connection: invoke `on_closed`, return its buffers to the
    /// pools, drop the transport.
    pub fn close_conn(&mut self, id: ConnId) {
        match self.conns.remove(&id) {
            Some(mut conn) => {
                debug!(conn = id.0, "closing connection");
                let handler = Arc::clone(&self.handler);
                handler.on_closed(&mut conn);
                conn.release();
            }
            None => trace!(conn = id.0, "close for detached connection ignored"),
        }
    }

    fn next_conn_id(&mut self) -> ConnId {
        self.next_id += 1;
        ConnId(self.next_id)
    }

    fn attach(&mut self, id: ConnId, mut conn: Conn) -> ConnId {
        let handler = Arc::clone(&self.handler);
        let (out, action) = handler.on_opened(&mut conn);
        self.conns.insert(id, conn);
        self.react(id, out, action);
        id
    }

    fn drain_decode(&mut self, id: ConnId) {
        let handler = Arc::clone(&self.handler);
        loop {
            let step = {
                let Some(conn) = self.conns.get_mut(&id) else {
                    return;
                };
                match conn.decode_frame() {
                    Ok(frame) => Ok(handler.on_data(conn, frame)),
                    Err(err) => Err(err),
                }
            };
            match step {
                Ok((out, action)) => {
                    if !self.react(id, out, action) {
                        return;
                    }
                }
                Err(err) if err.is_incomplete() => break,
                Err(err) => {
                    error!(conn = id.0, error = %err, "decode failed, closing connection");
                    self.close_conn(id);
                    return;
                }
            }
        }
        if let Some(conn) = self.conns.get_mut(&id) {
            conn.spill();
        }
    }

    /// Apply a callback's result; returns whether the connection is still
    /// attached.
    fn react(&mut self, id: ConnId, out: Option<Bytes>, action: Action) -> bool {
        if let Some(out) = out {
            if !self.write_now(id, &out) {
                return false;
            }
        }
        match action {
            Action::None => self.conns.contains_key(&id),
            Action::Close => {
                self.close_conn(id);
                false
            }
        }
    }

    /// Encode and write in loop context. Encode and transport failures both
    /// land in the loop's error hook and close the connection.
    fn write_now(&mut self, id: ConnId, frame: &[u8]) -> bool {
        let result = {
            let Some(conn) = self.conns.get_mut(&id) else {
                return false;
            };
            let codec = Arc::clone(conn.codec());
            codec
                .encode(frame)
                .map_err(Error::from)
                .and_then(|wire| conn.transport_write(&wire).map_err(Error::from))
        };
        match result {
            Ok(()) => true,
            Err(err) => {
                error!(conn = id.0, error = %err, "loop write failed, closing connection");
                self.close_conn(id);
                false
            }
        }
    }

    fn execute(&mut self, command: Command) {
        match command {
            Command::Write { conn, data } => {
                let Some(c) = self.conns.get_mut(&conn) else {
                    trace!(conn = conn.0, "write for closed connection dropped");
                    return;
                };
                if let Err(err) = c.transport_write(&data) {
                    error!(conn = conn.0, error = %err, "transport write failed");
                    self.close_conn(conn);
                }
            }
            Command::Wake { conn } => {
                let handler = Arc::clone(&self.handler);
                let (out, action) = {
                    let Some(c) = self.conns.get_mut(&conn) else {
                        trace!(conn = conn.0, "wake for closed connection dropped");
                        return;
                    };
                    handler.on_wake(c)
                };
                self.react(conn, out, action);
            }
            Command::Close { conn } => self.close_conn(conn),
            Command::Run(work) => work(),
        }
    }
}

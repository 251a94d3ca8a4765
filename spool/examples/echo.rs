//! Line-based echo server on a minimal single-threaded accept/read pump.
//!
//! The pump stands in for the OS notifier: it polls the listener and each
//! connection's stream in non-blocking mode, hands freshly read bytes to
//! the loop, and drains the loop's command queue every iteration.
//!
//! Try it:
//!
//! ```text
//! cargo run --example echo
//! nc 127.0.0.1 9000
//! ```

use std::io::{ErrorKind, Read};
use std::net::{TcpListener, TcpStream};
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use spool::{Action, Conn, ConnId, EventHandler, EventLoop, LineCodec, SpoolConfig};
use tracing::info;

struct Echo;

impl EventHandler for Echo {
    fn on_opened(&self, conn: &mut Conn) -> (Option<Bytes>, Action) {
        info!(peer = ?conn.remote_addr(), "connected");
        (Some(Bytes::from_static(b"spool echo; lines come right back")), Action::None)
    }

    fn on_data(&self, _conn: &mut Conn, frame: Bytes) -> (Option<Bytes>, Action) {
        if frame.as_ref() == b"quit" {
            return (Some(Bytes::from_static(b"bye")), Action::Close);
        }
        (Some(frame), Action::None)
    }

    fn on_closed(&self, conn: &mut Conn) {
        info!(peer = ?conn.remote_addr(), "disconnected");
    }
}

fn main() -> std::io::Result<()> {
    tracing_subscriber::fmt().init();

    let config = SpoolConfig::default();
    config.validate().expect("default config is valid");
    let _ = config.buffer.apply();

    let listener = TcpListener::bind("127.0.0.1:9000")?;
    listener.set_nonblocking(true)?;
    info!(addr = %listener.local_addr()?, "listening");

    let mut event_loop = EventLoop::new(
        Arc::new(Echo),
        Arc::new(LineCodec),
        &config.event_loop,
    );

    // pump-owned read halves; the loop owns the write halves
    let mut readers: Vec<(ConnId, TcpStream)> = Vec::new();
    let mut buf = [0u8; 4096];

    loop {
        match listener.accept() {
            Ok((stream, _)) => {
                stream.set_nonblocking(true)?;
                let reader = stream.try_clone()?;
                let id = event_loop.attach_stream(stream);
                readers.push((id, reader));
            }
            Err(err) if err.kind() == ErrorKind::WouldBlock => {}
            Err(err) => return Err(err),
        }

        readers.retain_mut(|(id, reader)| match reader.read(&mut buf) {
            Ok(0) => {
                event_loop.close_conn(*id);
                false
            }
            Ok(n) => {
                event_loop.on_readable(*id, &buf[..n]);
                event_loop.conn_mut(*id).is_some()
            }
            Err(err) if err.kind() == ErrorKind::WouldBlock => true,
            Err(_) => {
                event_loop.close_conn(*id);
                false
            }
        });

        event_loop.poll_commands();
        std::thread::sleep(Duration::from_millis(1));
    }
}

//! User event callbacks.

use bytes::Bytes;

use crate::conn::Conn;

/// What the loop should do with the connection after a callback returns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Action {
    /// Keep serving the connection.
    #[default]
    None,
    /// Release the connection once the callback returns.
    Close,
}

/// The application's connection logic.
///
/// Callbacks are always invoked from the owning event loop and never
/// reentrantly, so a handler sees each connection's state single-threaded.
/// Bytes returned from a callback are encoded with the connection's codec
/// and written out by the loop; to write from outside a callback, use a
/// [`crate::ConnHandle`].
pub trait EventHandler: Send + Sync {
    /// A connection was attached to its loop.
    fn on_opened(&self, _conn: &mut Conn) -> (Option<Bytes>, Action) {
        (None, Action::None)
    }

    /// One complete frame arrived.
    fn on_data(&self, conn: &mut Conn, frame: Bytes) -> (Option<Bytes>, Action);

    /// The connection is being released. Buffers are still attached here;
    /// they return to their pools right after this callback.
    fn on_closed(&self, _conn: &mut Conn) {}

    /// A wake-up posted via [`crate::ConnHandle::wake`] reached the loop.
    fn on_wake(&self, _conn: &mut Conn) -> (Option<Bytes>, Action) {
        (None, Action::None)
    }
}

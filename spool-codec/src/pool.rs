//! Buffer pools.
//!
//! Connections borrow their scratch buffer and inbound ring from these pools
//! on attach and hand them back on close, so steady-state traffic causes no
//! per-connection heap churn. Pools are thread-safe free lists; everything
//! else in this crate is loop-local.
//!
//! A process-wide default pool of each kind is kept behind a `OnceCell` and
//! can be sized once at startup via [`init_default_pools`] before any
//! connection is attached.

use bytes::BytesMut;
use once_cell::sync::OnceCell;
use parking_lot::Mutex;

use crate::ring::{RingBuffer, DEFAULT_RING_CAPACITY};

/// Default capacity of a freshly acquired scratch buffer.
pub const DEFAULT_SCRATCH_CAPACITY: usize = 4096;

/// Default number of buffers each pool keeps parked.
pub const DEFAULT_POOL_RETAINED: usize = 256;

/// Buffers whose capacity grew past this multiple of the pool's configured
/// capacity are dropped on release instead of parked.
const OVERSIZE_FACTOR: usize = 4;

static SCRATCH_POOL: OnceCell<BufferPool> = OnceCell::new();
static RING_POOL: OnceCell<RingPool> = OnceCell::new();

/// Free list of growable scratch buffers.
pub struct BufferPool {
    free: Mutex<Vec<BytesMut>>,
    capacity: usize,
    max_retained: usize,
}

impl BufferPool {
    /// Create a pool handing out buffers of `capacity` bytes and parking at
    /// most `max_retained` of them.
    pub fn new(capacity: usize, max_retained: usize) -> Self {
        Self {
            free: Mutex::new(Vec::new()),
            capacity,
            max_retained,
        }
    }

    /// Take a cleared buffer from the pool, allocating if none is parked.
    pub fn acquire(&self) -> BytesMut {
        if let Some(buf) = self.free.lock().pop() {
            return buf;
        }
        BytesMut::with_capacity(self.capacity)
    }

    /// Return a buffer to the pool.
    ///
    /// Oversize buffers are dropped so one burst cannot pin memory for the
    /// lifetime of the process.
    pub fn release(&self, mut buf: BytesMut) {
        if buf.capacity() == 0 || buf.capacity() > self.capacity * OVERSIZE_FACTOR {
            return;
        }
        buf.clear();
        let mut free = self.free.lock();
        if free.len() < self.max_retained {
            free.push(buf);
        }
    }

    /// Number of buffers currently parked.
    pub fn parked(&self) -> usize {
        self.free.lock().len()
    }
}

/// Free list of inbound ring buffers.
pub struct RingPool {
    free: Mutex<Vec<RingBuffer>>,
    capacity: usize,
    max_retained: usize,
}

impl RingPool {
    /// Create a pool handing out rings of `capacity` bytes and parking at
    /// most `max_retained` of them.
    pub fn new(capacity: usize, max_retained: usize) -> Self {
        Self {
            free: Mutex::new(Vec::new()),
            capacity,
            max_retained,
        }
    }

    /// Take a reset ring from the pool, allocating if none is parked.
    pub fn acquire(&self) -> RingBuffer {
        if let Some(ring) = self.free.lock().pop() {
            return ring;
        }
        RingBuffer::with_capacity(self.capacity)
    }

    /// Return a ring to the pool.
    pub fn release(&self, mut ring: RingBuffer) {
        if ring.capacity() == 0 || ring.capacity() > self.capacity * OVERSIZE_FACTOR {
            return;
        }
        ring.reset();
        let mut free = self.free.lock();
        if free.len() < self.max_retained {
            free.push(ring);
        }
    }

    /// Number of rings currently parked.
    pub fn parked(&self) -> usize {
        self.free.lock().len()
    }
}

/// Size the process-wide default pools.
///
/// Must be called before the first connection acquires a buffer; returns
/// `Err` if the defaults are already in use (either a prior call, or lazy
/// initialisation has happened).
pub fn init_default_pools(
    scratch_capacity: usize,
    ring_capacity: usize,
    max_retained: usize,
) -> Result<(), PoolsAlreadyInitialized> {
    SCRATCH_POOL
        .set(BufferPool::new(scratch_capacity, max_retained))
        .map_err(|_| PoolsAlreadyInitialized)?;
    RING_POOL
        .set(RingPool::new(ring_capacity, max_retained))
        .map_err(|_| PoolsAlreadyInitialized)
}

/// Error returned when [`init_default_pools`] races with prior use.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PoolsAlreadyInitialized;

impl std::fmt::Display for PoolsAlreadyInitialized {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("default buffer pools are already initialized")
    }
}

impl std::error::Error for PoolsAlreadyInitialized {}

/// The process-wide scratch-buffer pool.
pub fn default_buffer_pool() -> &'static BufferPool {
    SCRATCH_POOL.get_or_init(|| BufferPool::new(DEFAULT_SCRATCH_CAPACITY, DEFAULT_POOL_RETAINED))
}

/// The process-wide ring-buffer pool.
pub fn default_ring_pool() -> &'static RingPool {
    RING_POOL.get_or_init(|| RingPool::new(DEFAULT_RING_CAPACITY, DEFAULT_POOL_RETAINED))
}

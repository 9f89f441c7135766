//! ringcore - lock-free and wait-free concurrency primitives for latency-sensitive services

pub mod active;
pub mod constants;
pub mod error;
pub mod mem;
pub mod mpmc;
pub mod mpsc;
pub mod mvcc;
pub mod ring;
pub mod seqlock;
pub mod sync;
pub mod timer_wheel;
pub mod wordlock;

pub use active::Active;
pub use error::{Error, Result};
pub use mem::{HeapMemory, MemorySpace, SharedMemory};
pub use mpmc::MpmcQueue;
pub use mpsc::{IntrusiveMpscQueue, Link, NonIntrusiveMpscQueue};
pub use mvcc::{Mvcc, Snapshot};
pub use ring::{Codec, Ring, RingConfig};
pub use seqlock::SeqLock;
pub use sync::{Monitor, SpinLock, TaskHandle};
pub use timer_wheel::TimerWheel;
pub use wordlock::WordLock;

/// Version information.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

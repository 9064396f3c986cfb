//! Transport layer
//!
//! This module provides everything between the raw byte stream and the
//! connection coordinator:
//!
//! - **Framing**: [`encode`] / [`FrameDecoder`], the size-header protocol
//!   that rebuilds messages larger than one read chunk
//! - **Connection state**: [`ConnectionState`] and [`Role`]
//! - **Stream transport**: [`StreamTransport`], a chunk-capped [`Transport`](crate::core::Transport)
//!   over any tokio byte stream
//! - **Adapters**: [`TcpAdapter`] (feature `tcp`) and the in-memory
//!   [`MemoryNetwork`] (feature `memory`)
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────┐
//! │        Link (coordinator)               │
//! ├─────────────────────────────────────────┤
//! │   Session / Acceptor / Initiator        │
//! ├─────────────────────────────────────────┤
//! │         Transport Layer                 │  ← This module
//! │   framing, state, stream adapters       │
//! ├─────────────────────────────────────────┤
//! │     RFCOMM socket / TCP / memory        │
//! └─────────────────────────────────────────┘
//! ```

mod connection;
pub mod frame;
#[cfg(any(test, feature = "memory"))]
pub mod memory;
mod stream;
#[cfg(feature = "tcp")]
pub mod tcp;

pub use connection::{ConnectionState, Role};
pub use frame::{Frame, FrameDecoder, encode};
#[cfg(any(test, feature = "memory"))]
pub use memory::{MemoryAdapter, MemoryNetwork, MemoryPeer, MemoryTransport};
pub use stream::StreamTransport;
#[cfg(feature = "tcp")]
pub use tcp::{TcpAdapter, TcpPeer};

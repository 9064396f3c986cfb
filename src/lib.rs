//! # rfcomm-link
//!
//! Single-peer messaging over an RFCOMM-style duplex byte stream.
//!
//! One end hosts (listens for a peer), the other dials. Exactly one
//! connection is live at a time. Because a single read from the underlying
//! socket returns at most a small chunk, messages longer than that are sent
//! behind an 18-byte size header and reassembled on the other side.
//!
//! ## Feature Flags
//!
//! - `tcp` (default): [`TcpAdapter`](transport::TcpAdapter), a TCP stand-in
//!   for the radio
//! - `memory` (default): [`MemoryNetwork`](transport::MemoryNetwork), an
//!   in-process adapter network with failure injection
//!
//! ## Modules
//!
//! - [`core`]: Constants, errors, addresses, events and collaborator traits
//! - [`transport`]: Frame codec, connection state and stream adapters
//! - [`link`]: The connection coordinator and its configuration
//!
//! ## Example Usage
//!
//! ```rust,no_run
//! use rfcomm_link::prelude::*;
//! use rfcomm_link::transport::{MemoryNetwork, MemoryPeer};
//!
//! # async fn run() {
//! let network = MemoryNetwork::new();
//! let address = PeerAddress::parse("00:1A:7D:DA:71:13").unwrap();
//! let link = Link::new(network.adapter(address, "host"), LinkConfig::default());
//!
//! let (tx, mut events) = tokio::sync::mpsc::unbounded_channel::<LinkEvent<MemoryPeer>>();
//! link.set_listener(tx);
//! link.start_as_host().await;
//!
//! while let Some(event) = events.recv().await {
//!     match event {
//!         LinkEvent::Connected(peer) => println!("connected to {}", peer.name),
//!         LinkEvent::MessageReceived(bytes) => link.write(&bytes).await,
//!         _ => {}
//!     }
//! }
//! # }
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![cfg_attr(docsrs, feature(doc_cfg))]

// Core module (always included)
pub mod core;

// Framing, state and adapters
pub mod transport;

// Connection coordinator
pub mod link;

// Worker tasks driven by the coordinator
mod client;
mod server;
mod session;

/// Prelude module for convenient imports.
pub mod prelude {
    pub use crate::core::*;

    pub use crate::link::{Link, LinkConfig, LinkConfigBuilder};
    pub use crate::transport::{ConnectionState, Role};
}

// Re-export commonly used items at crate root
pub use crate::core::{LinkError, LinkEvent, LinkListener, LinkResult, PeerAddress};
pub use crate::link::{Link, LinkConfig, LinkConfigBuilder};
pub use crate::transport::{ConnectionState, Role};

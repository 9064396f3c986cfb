//! Core types: constants, errors, addresses, events and collaborator traits.

mod address;
pub mod constants;
mod error;
mod event;
mod service;
mod traits;

pub use address::PeerAddress;
pub use error::{AddressError, FrameError, LinkError, LinkResult};
pub use event::{LinkEvent, LinkListener};
pub use service::ServiceRecord;
pub use traits::{Adapter, Connector, ServiceListener, Transport};

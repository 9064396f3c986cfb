//! Connection coordinator
//!
//! [`Link`] is the public face of the crate: it runs the single-connection
//! state machine over an [`Adapter`](crate::core::Adapter), owns the
//! acceptor, initiator and session tasks, and reports everything as
//! [`LinkEvent`](crate::core::LinkEvent)s.

mod config;
pub(crate) mod dispatch;
#[allow(clippy::module_inception)]
mod link;
pub(crate) mod signal;

pub use config::{LinkConfig, LinkConfigBuilder};
pub use link::Link;

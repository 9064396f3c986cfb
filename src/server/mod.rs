//! Host side: the accept loop.
//!
//! The [`Acceptor`] owns the listening endpoint while the link is waiting for
//! a peer and hands every accepted connection to the coordinator.

mod acceptor;

pub(crate) use acceptor::Acceptor;

//! Client side: the single connect attempt.

mod initiator;

pub(crate) use initiator::Initiator;

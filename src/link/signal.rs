//! Internal notifications from worker tasks to the coordinator.
//!
//! Acceptor, Initiator and Session tasks never touch the coordinator state
//! directly. They report what happened here and the coordinator's driver
//! applies it under the state lock, discarding reports from tasks that are no
//! longer current.

use crate::core::Transport;
use crate::transport::Role;

/// Identifies one spawned worker task.
pub(crate) type TaskId = u64;

pub(crate) enum Signal<P> {
    /// The acceptor took an incoming connection.
    Accepted {
        task: TaskId,
        transport: Box<dyn Transport>,
        peer: P,
    },
    /// The accept primitive failed while the acceptor was still wanted.
    AcceptFailed { task: TaskId },
    /// The initiator's connect attempt succeeded.
    Dialed {
        task: TaskId,
        transport: Box<dyn Transport>,
        peer: P,
    },
    /// The initiator's connect attempt failed.
    DialFailed { task: TaskId },
    /// A session's read loop ended on end of stream or error.
    Lost { task: TaskId, role: Role },
}

impl<P> Signal<P> {
    pub(crate) fn task(&self) -> TaskId {
        match self {
            Self::Accepted { task, .. }
            | Self::AcceptFailed { task }
            | Self::Dialed { task, .. }
            | Self::DialFailed { task }
            | Self::Lost { task, .. } => *task,
        }
    }
}

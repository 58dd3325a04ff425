//! Crate-wide error type. Structural misuse of the tree is an error the
//! caller gets back; draw failures abort the current frame.

use thiserror::Error;

use crate::tree::NodeId;
use crate::window::WindowId;

#[derive(Debug, Error)]
pub enum Error {
    /// The referenced node was destroyed (or never existed).
    #[error("node {0:?} has been destroyed")]
    NodeDestroyed(NodeId),

    /// A node can have at most one parent; detach it first.
    #[error("node {0:?} is already attached to a parent")]
    AlreadyAttached(NodeId),

    #[error("node {child:?} is not a child of {parent:?}")]
    NotAChild { parent: NodeId, child: NodeId },

    #[error("layout engine error: {0}")]
    Layout(#[from] taffy::TaffyError),

    /// A draw command failed against the surface; the frame was aborted.
    #[error("draw failed: {0}")]
    Draw(String),

    #[error("unknown window {0}")]
    UnknownWindow(WindowId),
}

pub type Result<T> = std::result::Result<T, Error>;

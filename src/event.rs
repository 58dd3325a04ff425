//! Pointer events: hit-testing descent and dispatch into the reactive cells.
//!
//! Resolution walks down from the root; at each level the first child (in
//! insertion order) whose absolute box contains the point wins and the walk
//! descends into it. When no child contains the point the current node is the
//! target, so the root catches everything inside its own box. Box edges are
//! inclusive and children stacked later never shadow an earlier hit.

use tracing::trace;

use crate::error::Result;
use crate::tree::{NodeId, Tree};
use crate::types::{Point, Rect};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PointerKind {
    Down,
    Up,
    Move,
}

/// A pointer event in window coordinates.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PointerEvent {
    pub kind: PointerKind,
    pub x: f32,
    pub y: f32,
}

impl PointerEvent {
    pub fn down(x: f32, y: f32) -> Self {
        Self { kind: PointerKind::Down, x, y }
    }

    pub fn up(x: f32, y: f32) -> Self {
        Self { kind: PointerKind::Up, x, y }
    }

    pub fn moved(x: f32, y: f32) -> Self {
        Self { kind: PointerKind::Move, x, y }
    }
}

/// The node currently under the pointer, with the move event that put it
/// there.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HoverTarget {
    pub node: NodeId,
    pub event: PointerEvent,
}

impl Tree {
    /// Resolve the event's target under `root` and feed it into the target's
    /// cells: down stores the event in `clicked`, up clears it, move retargets
    /// the session hover pointer (skipping the write when the target is
    /// unchanged, so subscribers fire once per enter). Returns the target.
    ///
    /// Cell writes happen after the tree borrow is released, so subscribers
    /// are free to edit the tree or enqueue paints.
    pub fn dispatch(&self, root: NodeId, event: PointerEvent) -> Result<NodeId> {
        let (target, clicked, hover, hover_changed) = {
            let inner = self.inner.borrow();
            let mut current = root;
            inner.node(current)?;
            loop {
                let children = inner.node(current)?.children.clone();
                let hit = children.into_iter().find(|&child| {
                    let Ok(node) = inner.node(child) else { return false };
                    let position = node.position.unwrap_or(Point::ZERO);
                    let Ok((width, height)) = inner.engine.computed_size(node.handle) else {
                        return false;
                    };
                    Rect::new(position.x, position.y, width, height).contains(event.x, event.y)
                });
                match hit {
                    Some(child) => current = child,
                    None => break,
                }
            }
            let node = inner.node(current)?;
            let hover = inner.hovered.clone();
            let hover_changed = hover.get().map(|t| t.node) != Some(current);
            (current, node.clicked.clone(), hover, hover_changed)
        };

        trace!(?target, kind = ?event.kind, x = event.x, y = event.y, "pointer dispatched");
        match event.kind {
            PointerKind::Down => clicked.set(Some(event)),
            PointerKind::Up => clicked.set(None),
            PointerKind::Move => {
                if hover_changed {
                    hover.set(Some(HoverTarget { node: target, event }));
                }
            }
        }
        Ok(target)
    }
}

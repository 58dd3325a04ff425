//! Node tree - the retained data model the whole pipeline operates on.
//!
//! Nodes live in an arena owned by [`Tree`]; a [`NodeId`] is an index into it.
//! Every node owns exactly one layout engine handle, and every tree edit
//! (append, remove, teardown) mirrors into the engine inside the same
//! operation, so the two trees are order-isomorphic at all times: the child at
//! `children[i]` is the engine child at index `i`.
//!
//! `Tree` is a cheap handle over shared single-threaded state. Style cells are
//! handed out by value ([`Tree::style`]) so application code can mutate them
//! without holding any borrow on the tree; the relayout subscriptions
//! installed by [`Tree::setup_layout`](crate::layout) re-enter the tree from
//! those callbacks.

use std::cell::RefCell;
use std::collections::VecDeque;
use std::rc::Rc;

use tracing::{debug, trace};

use crate::error::{Error, Result};
use crate::event::{HoverTarget, PointerEvent};
use crate::layout::LayoutEngine;
use crate::render::DrawCommand;
use crate::signals::{derived, signal, Derived, Signal, Subscription};
use crate::style::Style;
use crate::types::{Point, Rect};

// =============================================================================
// Ids and variants
// =============================================================================

/// Arena index of a node. Stable for the node's lifetime; invalid after the
/// node is destroyed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeId(pub(crate) usize);

/// Node variant payload. Paint dispatch is an exhaustive match over this, so
/// adding a variant fails to compile until every dispatcher handles it.
#[derive(Debug, Clone, PartialEq)]
pub enum NodeKind {
    Container,
    Text { content: String },
    Image { src: String },
    Path { data: String },
}

impl NodeKind {
    pub(crate) fn name(&self) -> &'static str {
        match self {
            NodeKind::Container => "container",
            NodeKind::Text { .. } => "text",
            NodeKind::Image { .. } => "image",
            NodeKind::Path { .. } => "path",
        }
    }
}

pub(crate) struct NodeData {
    /// Process-unique id, for logging and debugging. Never reused.
    pub(crate) uid: u64,
    pub(crate) kind: NodeKind,
    pub(crate) style: Signal<Style>,
    /// Exclusively owned handle into the layout engine's mirrored tree.
    pub(crate) handle: taffy::NodeId,
    /// Absolute position; `None` until the first layout pass reaches the node.
    pub(crate) position: Option<Point>,
    /// Last pointer-down event, or `None` after release.
    pub(crate) clicked: Signal<Option<PointerEvent>>,
    /// Derived from the session hover pointer by identity comparison.
    pub(crate) hovered: Derived<bool>,
    pub(crate) parent: Option<NodeId>,
    /// Insertion order defines both paint order and engine child order.
    pub(crate) children: Vec<NodeId>,
    pub(crate) style_sub: Option<Subscription>,
}

// =============================================================================
// Tree
// =============================================================================

pub(crate) struct TreeInner {
    pub(crate) nodes: Vec<Option<NodeData>>,
    free: Vec<usize>,
    next_uid: u64,
    pub(crate) engine: LayoutEngine,
    /// Deferred draw commands, drained once per frame.
    pub(crate) queue: VecDeque<DrawCommand>,
    /// Session-wide hover pointer; at most one node is hovered at any instant.
    pub(crate) hovered: Signal<Option<HoverTarget>>,
    /// Viewport recorded by the last root layout; the fallback constraining
    /// box for style mutations on the root.
    pub(crate) viewport: Option<(f32, f32)>,
    /// Origin the root is anchored at. Defaults to (0, 0).
    pub(crate) origin: Point,
    /// Set once setup_layout has run; newly attached subtrees then get their
    /// style subscriptions installed on attach.
    pub(crate) reactive: bool,
}

/// Handle to a node tree (one per window). Clones share the same tree.
#[derive(Clone)]
pub struct Tree {
    pub(crate) inner: Rc<RefCell<TreeInner>>,
}

impl Default for Tree {
    fn default() -> Self {
        Self::new()
    }
}

impl Tree {
    pub fn new() -> Self {
        Self {
            inner: Rc::new(RefCell::new(TreeInner {
                nodes: Vec::new(),
                free: Vec::new(),
                next_uid: 0,
                engine: LayoutEngine::new(),
                queue: VecDeque::new(),
                hovered: signal(None),
                viewport: None,
                origin: Point::ZERO,
                reactive: false,
            })),
        }
    }

    // =========================================================================
    // Factories
    // =========================================================================

    pub fn container(&self, style: Style) -> Result<NodeId> {
        self.create(NodeKind::Container, style)
    }

    pub fn text(&self, content: impl Into<String>, style: Style) -> Result<NodeId> {
        self.create(NodeKind::Text { content: content.into() }, style)
    }

    pub fn image(&self, src: impl Into<String>, style: Style) -> Result<NodeId> {
        self.create(NodeKind::Image { src: src.into() }, style)
    }

    pub fn path(&self, data: impl Into<String>, style: Style) -> Result<NodeId> {
        self.create(NodeKind::Path { data: data.into() }, style)
    }

    fn create(&self, kind: NodeKind, style: Style) -> Result<NodeId> {
        let mut inner = self.inner.borrow_mut();
        // The engine handle is allocated with the initial style applied, so
        // the mirrored trees never observe a node without directives.
        let handle = inner.engine.new_handle(&style)?;

        let index = match inner.free.pop() {
            Some(index) => index,
            None => {
                inner.nodes.push(None);
                inner.nodes.len() - 1
            }
        };
        let id = NodeId(index);
        let uid = inner.next_uid;
        inner.next_uid += 1;

        let hover = inner.hovered.clone();
        let hover_for_derived = hover.clone();
        let hovered = derived(&[&hover], move || {
            hover_for_derived.get().map(|t| t.node) == Some(id)
        });

        inner.nodes[index] = Some(NodeData {
            uid,
            kind,
            style: signal(style),
            handle,
            position: None,
            clicked: signal(None),
            hovered,
            parent: None,
            children: Vec::new(),
            style_sub: None,
        });
        trace!(uid, ?id, "node created");
        Ok(id)
    }

    // =========================================================================
    // Tree edits (always mirrored into the layout engine)
    // =========================================================================

    /// Append `child` as the last child of `parent` and queue a repaint of the
    /// parent's subtree.
    pub fn append_child(&self, parent: NodeId, child: NodeId) -> Result<()> {
        let new_subtree = {
            let mut inner = self.inner.borrow_mut();
            if inner.node(child)?.parent.is_some() {
                return Err(Error::AlreadyAttached(child));
            }
            let parent_handle = inner.node(parent)?.handle;
            let child_handle = inner.node(child)?.handle;
            let index = inner.node(parent)?.children.len();
            inner.engine.insert_child(parent_handle, child_handle, index)?;
            inner.node_mut(parent)?.children.push(child);
            inner.node_mut(child)?.parent = Some(parent);

            inner.paint_subtree(parent)?;
            if inner.reactive {
                inner.subtree(child)?
            } else {
                Vec::new()
            }
        };
        for id in new_subtree {
            self.install_style_subscription(id)?;
        }
        Ok(())
    }

    /// Remove `child` from `parent` and destroy it together with all of its
    /// descendants. Their engine handles are released in the same operation.
    pub fn remove_child(&self, parent: NodeId, child: NodeId) -> Result<()> {
        let hover_reset = {
            let mut inner = self.inner.borrow_mut();
            let position = inner
                .node(parent)?
                .children
                .iter()
                .position(|&c| c == child)
                .ok_or(Error::NotAChild { parent, child })?;
            let parent_handle = inner.node(parent)?.handle;
            let child_handle = inner.node(child)?.handle;

            inner.node_mut(parent)?.children.remove(position);
            inner.node_mut(child)?.parent = None;
            inner.engine.remove_child(parent_handle, child_handle)?;

            let hover_reset = inner.destroy_subtree(child)?;
            inner.paint_subtree(parent)?;
            hover_reset
        };
        if let Some(hover) = hover_reset {
            hover.set(None);
        }
        Ok(())
    }

    /// Destroy `root` and its whole subtree, clear the draw queue, and reset
    /// the hover pointer. This is the window-close teardown path.
    pub fn teardown(&self, root: NodeId) -> Result<()> {
        let hover_reset = {
            let mut inner = self.inner.borrow_mut();
            if let Some(parent) = inner.node(root)?.parent {
                let parent_handle = inner.node(parent)?.handle;
                let root_handle = inner.node(root)?.handle;
                inner.node_mut(parent)?.children.retain(|&c| c != root);
                inner.engine.remove_child(parent_handle, root_handle)?;
            }
            let destroyed = inner.node(root)?.uid;
            let hover_reset = inner.destroy_subtree(root)?;
            inner.queue.clear();
            debug!(uid = destroyed, "tree torn down");
            // Always reset the session hover pointer on teardown so it can
            // never refer to a freed handle.
            Some(hover_reset.unwrap_or_else(|| inner.hovered.clone()))
        };
        if let Some(hover) = hover_reset {
            hover.set(None);
        }
        Ok(())
    }

    // =========================================================================
    // Accessors
    // =========================================================================

    /// The node's reactive style cell. Mutating it is the sole trigger for
    /// relayout.
    pub fn style(&self, id: NodeId) -> Result<Signal<Style>> {
        Ok(self.inner.borrow().node(id)?.style.clone())
    }

    /// Convenience for `style(id)?.set(style)`.
    pub fn set_style(&self, id: NodeId, style: Style) -> Result<()> {
        let cell = self.style(id)?;
        cell.set(style);
        Ok(())
    }

    /// Last pointer-down event on the node, or `None` after release.
    pub fn clicked(&self, id: NodeId) -> Result<Signal<Option<PointerEvent>>> {
        Ok(self.inner.borrow().node(id)?.clicked.clone())
    }

    /// Derived flag: is this node the current hover target?
    pub fn hovered(&self, id: NodeId) -> Result<Derived<bool>> {
        Ok(self.inner.borrow().node(id)?.hovered.clone())
    }

    /// The session-wide hover pointer (at most one target at any instant).
    pub fn hover_signal(&self) -> Signal<Option<HoverTarget>> {
        self.inner.borrow().hovered.clone()
    }

    /// Absolute position, `None` before the first layout pass.
    pub fn position(&self, id: NodeId) -> Result<Option<Point>> {
        Ok(self.inner.borrow().node(id)?.position)
    }

    /// Absolute box: position plus the engine-computed size.
    pub fn layout_box(&self, id: NodeId) -> Result<Rect> {
        let inner = self.inner.borrow();
        let node = inner.node(id)?;
        let position = node.position.unwrap_or(Point::ZERO);
        let (width, height) = inner.engine.computed_size(node.handle)?;
        Ok(Rect::new(position.x, position.y, width, height))
    }

    pub fn parent(&self, id: NodeId) -> Result<Option<NodeId>> {
        Ok(self.inner.borrow().node(id)?.parent)
    }

    pub fn children(&self, id: NodeId) -> Result<Vec<NodeId>> {
        Ok(self.inner.borrow().node(id)?.children.clone())
    }

    pub fn kind(&self, id: NodeId) -> Result<NodeKind> {
        Ok(self.inner.borrow().node(id)?.kind.clone())
    }

    /// Anchor for the root's absolute position.
    pub fn set_origin(&self, origin: Point) {
        self.inner.borrow_mut().origin = origin;
    }

    /// Number of live nodes.
    pub fn len(&self) -> usize {
        let inner = self.inner.borrow();
        inner.nodes.iter().filter(|slot| slot.is_some()).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Engine-side child handles of a node, in engine order. Exposed so the
    /// tree/engine isomorphism is checkable from the outside.
    pub fn engine_children(&self, id: NodeId) -> Result<Vec<taffy::NodeId>> {
        let inner = self.inner.borrow();
        let handle = inner.node(id)?.handle;
        inner.engine.children(handle)
    }

    /// Engine handle of a node (for isomorphism checks in tests).
    pub fn engine_handle(&self, id: NodeId) -> Result<taffy::NodeId> {
        Ok(self.inner.borrow().node(id)?.handle)
    }

    /// Indented textual dump of a subtree, for logs and debugging.
    pub fn dump(&self, root: NodeId) -> Result<String> {
        let inner = self.inner.borrow();
        let mut out = String::new();
        let mut stack = vec![(root, 0usize)];
        while let Some((id, depth)) = stack.pop() {
            let node = inner.node(id)?;
            let position = node.position.unwrap_or(Point::ZERO);
            let (width, height) = inner.engine.computed_size(node.handle).unwrap_or((0.0, 0.0));
            out.push_str(&format!(
                "{}{}#{} pos=({}, {}) size={}x{}\n",
                "  ".repeat(depth),
                node.kind.name(),
                node.uid,
                position.x,
                position.y,
                width,
                height,
            ));
            for &child in node.children.iter().rev() {
                stack.push((child, depth + 1));
            }
        }
        Ok(out)
    }
}

// =============================================================================
// Inner helpers
// =============================================================================

impl TreeInner {
    pub(crate) fn node(&self, id: NodeId) -> Result<&NodeData> {
        self.nodes
            .get(id.0)
            .and_then(|slot| slot.as_ref())
            .ok_or(Error::NodeDestroyed(id))
    }

    pub(crate) fn node_mut(&mut self, id: NodeId) -> Result<&mut NodeData> {
        self.nodes
            .get_mut(id.0)
            .and_then(|slot| slot.as_mut())
            .ok_or(Error::NodeDestroyed(id))
    }

    /// Pre-order traversal of a subtree.
    pub(crate) fn subtree(&self, root: NodeId) -> Result<Vec<NodeId>> {
        let mut out = Vec::new();
        let mut stack = vec![root];
        while let Some(id) = stack.pop() {
            out.push(id);
            let node = self.node(id)?;
            for &child in node.children.iter().rev() {
                stack.push(child);
            }
        }
        Ok(out)
    }

    /// Free a subtree: cancel subscriptions, release engine handles, return
    /// slots to the pool. Returns the hover signal if the hover target was
    /// among the destroyed nodes, so the caller can reset it outside the
    /// borrow.
    fn destroy_subtree(&mut self, root: NodeId) -> Result<Option<Signal<Option<HoverTarget>>>> {
        let ids = self.subtree(root)?;
        let hover_target = self.hovered.get().map(|t| t.node);
        let mut hover_hit = false;
        for id in ids {
            let data = self.nodes[id.0]
                .take()
                .ok_or(Error::NodeDestroyed(id))?;
            if let Some(sub) = data.style_sub {
                sub.cancel();
            }
            self.engine.free(data.handle)?;
            self.free.push(id.0);
            if hover_target == Some(id) {
                hover_hit = true;
            }
            trace!(uid = data.uid, "node destroyed");
        }
        Ok(if hover_hit { Some(self.hovered.clone()) } else { None })
    }
}

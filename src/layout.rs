//! Layout orchestration over the flexbox engine.
//!
//! The engine mirrors the node tree one handle per node and is the single
//! source of truth for computed geometry. [`LayoutEngine`] wraps it with the
//! change tracking the pipeline needs: a pending set of style-dirtied handles
//! plus a per-handle snapshot of the last observed box, which together answer
//! "did the last solve move this node" without walking anything twice.
//!
//! The per-frame flow after a solve is a single pre-order pass
//! ([`TreeInner::flush_positions`]): refresh absolute positions, acknowledge
//! fresh layouts, and queue paints for exactly the nodes whose box changed.
//! Descendants of a moved node inherit the refresh even when their own local
//! box is unchanged, since absolute position is accumulated parent-down.

use std::collections::{HashMap, HashSet};

use taffy::{AvailableSpace, Size, TaffyTree};
use tracing::{debug, trace};

use crate::error::Result;
use crate::style::Style;
use crate::tree::{NodeId, Tree, TreeInner};
use crate::types::{BorderWidths, Point};

// =============================================================================
// Engine facade
// =============================================================================

/// Computed box of one handle, in parent-relative coordinates.
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct LayoutBox {
    pub(crate) x: f32,
    pub(crate) y: f32,
    pub(crate) width: f32,
    pub(crate) height: f32,
    pub(crate) border: BorderWidths,
}

pub(crate) struct LayoutEngine {
    taffy: TaffyTree<()>,
    /// Handles whose style changed since they were last acknowledged.
    pending: HashSet<taffy::NodeId>,
    /// Last acknowledged box per handle, for move detection across solves.
    snapshots: HashMap<taffy::NodeId, (f32, f32, f32, f32)>,
    /// Constraining box recorded per solve anchor, reused when a scoped
    /// relayout has to run the solver from the anchor.
    constraints: HashMap<taffy::NodeId, (f32, f32)>,
}

impl LayoutEngine {
    pub(crate) fn new() -> Self {
        Self {
            taffy: TaffyTree::new(),
            pending: HashSet::new(),
            snapshots: HashMap::new(),
            constraints: HashMap::new(),
        }
    }

    pub(crate) fn new_handle(&mut self, style: &Style) -> Result<taffy::NodeId> {
        let handle = self.taffy.new_leaf(style.to_taffy())?;
        self.pending.insert(handle);
        Ok(handle)
    }

    pub(crate) fn set_style(&mut self, handle: taffy::NodeId, style: &Style) -> Result<()> {
        self.taffy.set_style(handle, style.to_taffy())?;
        self.pending.insert(handle);
        Ok(())
    }

    pub(crate) fn insert_child(
        &mut self,
        parent: taffy::NodeId,
        child: taffy::NodeId,
        index: usize,
    ) -> Result<()> {
        self.taffy.insert_child_at_index(parent, index, child)?;
        // Structural edits dirty the parent so the next solve is not gated
        // away as up to date.
        self.pending.insert(parent);
        Ok(())
    }

    pub(crate) fn remove_child(&mut self, parent: taffy::NodeId, child: taffy::NodeId) -> Result<()> {
        self.taffy.remove_child(parent, child)?;
        self.pending.insert(parent);
        Ok(())
    }

    /// Release a handle and all tracking state attached to it.
    pub(crate) fn free(&mut self, handle: taffy::NodeId) -> Result<()> {
        self.taffy.remove(handle)?;
        self.pending.remove(&handle);
        self.snapshots.remove(&handle);
        self.constraints.remove(&handle);
        Ok(())
    }

    pub(crate) fn children(&self, handle: taffy::NodeId) -> Result<Vec<taffy::NodeId>> {
        Ok(self.taffy.children(handle)?)
    }

    pub(crate) fn computed_box(&self, handle: taffy::NodeId) -> Result<LayoutBox> {
        let layout = self.taffy.layout(handle)?;
        Ok(LayoutBox {
            x: layout.location.x,
            y: layout.location.y,
            width: layout.size.width,
            height: layout.size.height,
            border: BorderWidths {
                top: layout.border.top,
                right: layout.border.right,
                bottom: layout.border.bottom,
                left: layout.border.left,
            },
        })
    }

    pub(crate) fn computed_size(&self, handle: taffy::NodeId) -> Result<(f32, f32)> {
        let layout = self.taffy.layout(handle)?;
        Ok((layout.size.width, layout.size.height))
    }

    /// Did the last solve produce a box this handle has not acknowledged yet?
    /// Also true for style-dirtied handles the solver has not visited.
    pub(crate) fn has_new_layout(&self, handle: taffy::NodeId) -> Result<bool> {
        if self.pending.contains(&handle) {
            return Ok(true);
        }
        let current = self.current_box(handle)?;
        Ok(self.snapshots.get(&handle) != Some(&current))
    }

    /// Acknowledge the current box; `has_new_layout` reads false until the
    /// next change.
    pub(crate) fn mark_seen(&mut self, handle: taffy::NodeId) -> Result<()> {
        let current = self.current_box(handle)?;
        self.snapshots.insert(handle, current);
        self.pending.remove(&handle);
        Ok(())
    }

    fn current_box(&self, handle: taffy::NodeId) -> Result<(f32, f32, f32, f32)> {
        let layout = self.taffy.layout(handle)?;
        Ok((
            layout.location.x,
            layout.location.y,
            layout.size.width,
            layout.size.height,
        ))
    }

    /// Run the solver for `handle` constrained to `width` x `height`, but only
    /// when the computed box disagrees with the request or dirty styles are
    /// outstanding. Running it when nothing changed is wasted work, not an
    /// error, so the gate is allowed to be conservative.
    ///
    /// The solver is always anchored at the topmost ancestor: a mid-tree node
    /// cannot be solved in isolation without breaking the geometry around it.
    pub(crate) fn solve(&mut self, handle: taffy::NodeId, width: f32, height: f32) -> Result<()> {
        let computed = self.computed_size(handle)?;
        if self.pending.is_empty() && computed == (width, height) {
            trace!("layout solve skipped, geometry up to date");
            return Ok(());
        }

        let anchor = self.root_of(handle);
        let (avail_w, avail_h) = if anchor == handle {
            self.constraints.insert(anchor, (width, height));
            (width, height)
        } else {
            self.constraints.get(&anchor).copied().unwrap_or((width, height))
        };
        debug!(width = avail_w, height = avail_h, "layout solve");
        self.taffy.compute_layout(
            anchor,
            Size {
                width: AvailableSpace::Definite(avail_w),
                height: AvailableSpace::Definite(avail_h),
            },
        )?;
        Ok(())
    }

    fn root_of(&self, handle: taffy::NodeId) -> taffy::NodeId {
        let mut current = handle;
        while let Some(parent) = self.taffy.parent(current) {
            current = parent;
        }
        current
    }
}

// =============================================================================
// Orchestration
// =============================================================================

impl TreeInner {
    /// Solve layout for a subtree and flush the results: refresh absolute
    /// positions and queue paints for every node whose box changed. Records
    /// the viewport when `node` is a root. Returns the nodes painted.
    pub(crate) fn run_layout(
        &mut self,
        node: NodeId,
        width: f32,
        height: f32,
    ) -> Result<Vec<NodeId>> {
        let data = self.node(node)?;
        let handle = data.handle;
        if data.parent.is_none() {
            self.viewport = Some((width, height));
        }
        self.engine.solve(handle, width, height)?;
        self.flush_positions(node)
    }

    /// Pre-order pass turning fresh engine output into absolute positions and
    /// queued paints. A node is refreshed when its own layout is new or when
    /// its parent moved; it is painted when refreshing actually changed its
    /// box.
    pub(crate) fn flush_positions(&mut self, start: NodeId) -> Result<Vec<NodeId>> {
        let mut painted = Vec::new();
        let mut stack = vec![(start, false)];
        while let Some((id, parent_moved)) = stack.pop() {
            let (handle, parent, children) = {
                let node = self.node(id)?;
                (node.handle, node.parent, node.children.clone())
            };
            let has_new = self.engine.has_new_layout(handle)?;
            let mut moved = false;

            if has_new || parent_moved {
                let parent_position = match parent {
                    Some(p) => self.node(p)?.position.unwrap_or(self.origin),
                    None => self.origin,
                };
                let local = self.engine.computed_box(handle)?;
                let absolute = Point::new(parent_position.x + local.x, parent_position.y + local.y);

                let node = self.node_mut(id)?;
                moved = node.position != Some(absolute);
                node.position = Some(absolute);

                if has_new {
                    self.engine.mark_seen(handle)?;
                }
                if has_new || moved {
                    trace!(
                        x = absolute.x,
                        y = absolute.y,
                        width = local.width,
                        height = local.height,
                        "position flushed"
                    );
                    self.paint_node(id)?;
                    painted.push(id);
                }
            }

            for &child in children.iter().rev() {
                stack.push((child, moved));
            }
        }
        Ok(painted)
    }

    /// Relayout scoped to one node after its style cell changed. The
    /// constraining box is the parent's computed size, falling back to the
    /// recorded viewport for roots. Guarantees at least one repaint of the
    /// node even when the edit was purely visual and nothing moved.
    ///
    /// Mutating the style of a detached root before any layout has run is a
    /// programming error and fails fast.
    pub(crate) fn style_changed(&mut self, id: NodeId) -> Result<()> {
        let (handle, parent) = {
            let node = self.node(id)?;
            (node.handle, node.parent)
        };
        let style = self.node(id)?.style.get();
        self.engine.set_style(handle, &style)?;

        let (width, height) = match parent {
            Some(p) => {
                let parent_handle = self.node(p)?.handle;
                self.engine.computed_size(parent_handle)?
            }
            None => self
                .viewport
                .expect("style mutated on a detached node before any layout pass"),
        };
        self.engine.solve(handle, width, height)?;
        // The solve is anchored at the root and can move siblings of the
        // edited node, so the flush starts there too.
        let mut root = id;
        while let Some(parent) = self.node(root)?.parent {
            root = parent;
        }
        let painted = self.flush_positions(root)?;
        if !painted.contains(&id) {
            self.paint_node(id)?;
        }
        Ok(())
    }
}

impl Tree {
    /// Compute layout for `node` constrained to `width` x `height` and flush
    /// the results into absolute positions and queued paints.
    pub fn layout(&self, node: NodeId, width: f32, height: f32) -> Result<()> {
        self.inner.borrow_mut().run_layout(node, width, height)?;
        Ok(())
    }

    /// One-time activation of a subtree: run the initial layout pass, then
    /// install a style subscription on every node so that any later style
    /// mutation triggers a scoped relayout on its own. Nodes attached after
    /// this call are subscribed on attach.
    pub fn setup_layout(&self, root: NodeId, width: f32, height: f32) -> Result<()> {
        let ids = {
            let mut inner = self.inner.borrow_mut();
            inner.run_layout(root, width, height)?;
            inner.reactive = true;
            inner.subtree(root)?
        };
        for id in ids {
            self.install_style_subscription(id)?;
        }
        debug!(width, height, "layout activated");
        Ok(())
    }

    /// Subscribe a node's style cell to the relayout pipeline. Idempotent.
    pub(crate) fn install_style_subscription(&self, id: NodeId) -> Result<()> {
        let cell = {
            let mut inner = self.inner.borrow_mut();
            let node = inner.node_mut(id)?;
            if node.style_sub.is_some() {
                return Ok(());
            }
            node.style.clone()
        };
        // The callback holds a weak reference so subscriptions never keep the
        // tree alive; a fired callback after teardown is a no-op.
        let weak = std::rc::Rc::downgrade(&self.inner);
        let sub = cell.subscribe(move |_| {
            if let Some(inner) = weak.upgrade() {
                if let Err(err) = inner.borrow_mut().style_changed(id) {
                    panic!("relayout after style mutation failed: {err}");
                }
            }
        });
        self.inner.borrow_mut().node_mut(id)?.style_sub = Some(sub);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::style::Style;
    use crate::types::{Dimension, Edges, FlexDirection};

    fn sized(width: f32, height: f32) -> Style {
        Style {
            width: Dimension::Length(width),
            height: Dimension::Length(height),
            ..Default::default()
        }
    }

    #[test]
    fn test_positions_accumulate_from_parent() {
        let tree = Tree::new();
        let root = tree
            .container(Style {
                padding: Edges::all(10.0),
                ..sized(200.0, 100.0)
            })
            .unwrap();
        let child = tree.container(sized(50.0, 50.0)).unwrap();
        let grandchild = tree.container(sized(20.0, 20.0)).unwrap();
        tree.append_child(root, child).unwrap();
        tree.append_child(child, grandchild).unwrap();

        tree.layout(root, 200.0, 100.0).unwrap();

        assert_eq!(tree.position(root).unwrap(), Some(Point::new(0.0, 0.0)));
        assert_eq!(tree.position(child).unwrap(), Some(Point::new(10.0, 10.0)));
        assert_eq!(
            tree.position(grandchild).unwrap(),
            Some(Point::new(10.0, 10.0))
        );
    }

    #[test]
    fn test_column_direction_stacks_children() {
        let tree = Tree::new();
        let root = tree.container(sized(100.0, 100.0)).unwrap();
        let a = tree.container(sized(40.0, 30.0)).unwrap();
        let b = tree.container(sized(40.0, 30.0)).unwrap();
        tree.append_child(root, a).unwrap();
        tree.append_child(root, b).unwrap();

        tree.layout(root, 100.0, 100.0).unwrap();

        assert_eq!(tree.position(a).unwrap(), Some(Point::new(0.0, 0.0)));
        assert_eq!(tree.position(b).unwrap(), Some(Point::new(0.0, 30.0)));
    }

    #[test]
    fn test_row_direction_after_style_change() {
        let tree = Tree::new();
        let root = tree.container(sized(100.0, 100.0)).unwrap();
        let a = tree.container(sized(40.0, 30.0)).unwrap();
        let b = tree.container(sized(40.0, 30.0)).unwrap();
        tree.append_child(root, a).unwrap();
        tree.append_child(root, b).unwrap();
        tree.setup_layout(root, 100.0, 100.0).unwrap();

        let style = tree.style(root).unwrap();
        style.set(Style {
            flex_direction: FlexDirection::Row,
            ..sized(100.0, 100.0)
        });

        assert_eq!(tree.position(a).unwrap(), Some(Point::new(0.0, 0.0)));
        assert_eq!(tree.position(b).unwrap(), Some(Point::new(40.0, 0.0)));
    }

    #[test]
    fn test_resize_moves_descendants() {
        let tree = Tree::new();
        let root = tree
            .container(Style {
                align_items: crate::types::AlignItems::FlexEnd,
                ..sized(100.0, 100.0)
            })
            .unwrap();
        let child = tree.container(sized(20.0, 20.0)).unwrap();
        tree.append_child(root, child).unwrap();

        tree.setup_layout(root, 100.0, 100.0).unwrap();
        assert_eq!(tree.position(child).unwrap(), Some(Point::new(80.0, 0.0)));

        let style = tree.style(root).unwrap();
        style.set(Style {
            align_items: crate::types::AlignItems::FlexEnd,
            ..sized(200.0, 100.0)
        });
        assert_eq!(tree.position(child).unwrap(), Some(Point::new(180.0, 0.0)));
    }

    #[test]
    fn test_equal_style_set_does_not_repaint() {
        let tree = Tree::new();
        let root = tree.container(sized(100.0, 100.0)).unwrap();
        tree.setup_layout(root, 100.0, 100.0).unwrap();
        let mut surface = crate::surface::RecordingSurface::new();
        tree.process_draw_queue(&mut surface).unwrap();
        surface.ops.clear();

        let style = tree.style(root).unwrap();
        style.set(sized(100.0, 100.0));

        tree.process_draw_queue(&mut surface).unwrap();
        assert!(surface.ops.is_empty());
        assert_eq!(tree.queued_draw_commands(), 0);
    }

    #[test]
    fn test_visual_style_change_repaints_without_moving() {
        let tree = Tree::new();
        let root = tree.container(sized(100.0, 100.0)).unwrap();
        let a = tree.container(sized(40.0, 30.0)).unwrap();
        let b = tree.container(sized(40.0, 30.0)).unwrap();
        tree.append_child(root, a).unwrap();
        tree.append_child(root, b).unwrap();
        tree.setup_layout(root, 100.0, 100.0).unwrap();
        let mut surface = crate::surface::RecordingSurface::new();
        tree.process_draw_queue(&mut surface).unwrap();

        let before = tree.position(b).unwrap();
        let style = tree.style(a).unwrap();
        style.set(Style {
            background_color: Some(crate::types::Rgba::rgb(200, 40, 40)),
            ..sized(40.0, 30.0)
        });

        // The sibling did not move and exactly one repaint was queued.
        assert_eq!(tree.position(b).unwrap(), before);
        assert_eq!(tree.queued_draw_commands(), 1);
    }

    #[test]
    fn test_subscription_survives_reattach_order() {
        let tree = Tree::new();
        let root = tree.container(sized(100.0, 100.0)).unwrap();
        tree.setup_layout(root, 100.0, 100.0).unwrap();

        // Attached after activation: gets its subscription on attach.
        let late = tree.container(sized(10.0, 10.0)).unwrap();
        tree.append_child(root, late).unwrap();
        let style = tree.style(late).unwrap();
        style.set(sized(25.0, 25.0));

        assert_eq!(tree.layout_box(late).unwrap().width, 25.0);
    }
}

//! Paint dispatch: node variants into draw commands.
//!
//! Painting a node snapshots its absolute box and style, builds commands that
//! own those snapshots, and enqueues them. Commands never read the tree, so
//! later tree edits cannot change what an already-queued frame draws.
//!
//! Every variant paints background first, then border, then its own content.

use tracing::trace;

use crate::error::Result;
use crate::signals::Signal;
use crate::style::Style;
use crate::surface::{Font, Surface};
use crate::tree::{NodeId, NodeKind, Tree, TreeInner};
use crate::types::{BorderWidths, Dimension, Rect, Rgba};

impl TreeInner {
    /// Build and enqueue the draw commands for one node. Nodes that have not
    /// been through a layout pass yet have no position and paint nothing;
    /// the first layout flush paints them at their real coordinates.
    pub(crate) fn paint_node(&mut self, id: NodeId) -> Result<()> {
        let (kind, style, rect, border) = {
            let node = self.node(id)?;
            let Some(position) = node.position else {
                return Ok(());
            };
            let local = self.engine.computed_box(node.handle)?;
            let rect = Rect::new(position.x, position.y, local.width, local.height);
            (node.kind.clone(), node.style.get(), rect, local.border)
        };
        trace!(kind = kind.name(), x = rect.x, y = rect.y, "paint");

        self.enqueue_box(rect, border, &style);
        match kind {
            NodeKind::Container => {}
            NodeKind::Text { content } => self.enqueue_text(rect, &style, content),
            NodeKind::Image { src } => self.enqueue_image(rect, src),
            NodeKind::Path { data } => self.enqueue_path(rect, &style, data),
        }
        Ok(())
    }

    /// Background fill plus border, one command. Border widths come from the
    /// engine's computed box; the style only supplies color and radius.
    fn enqueue_box(&mut self, rect: Rect, border: BorderWidths, style: &Style) {
        let background = style.background_color;
        let radius = style.border_radius;
        let border_color = style.border_color.unwrap_or(Rgba::BLACK);
        if background.is_none() && !border.any() {
            return;
        }
        self.queue.push_back(Box::new(move |surface| {
            if let Some(background) = background {
                if radius > 0.0 {
                    surface.fill_round_rect(rect, radius, background)?;
                } else {
                    surface.fill_rect(rect, background)?;
                }
            }
            if border.any() {
                paint_border(surface, rect, border, radius, border_color)?;
            }
            Ok(())
        }));
    }

    fn enqueue_text(&mut self, rect: Rect, style: &Style, content: String) {
        let font = Font::new(style.effective_font_family(), style.effective_font_size());
        let color = style.color.unwrap_or(Rgba::BLACK);
        self.queue.push_back(Box::new(move |surface| {
            // Prime the surface's font state, then draw baselined one font
            // size below the top edge.
            surface.measure_text(&content, &font);
            surface.fill_text(&content, rect.x, rect.y + font.size, &font, color)
        }));
    }

    fn enqueue_image(&mut self, rect: Rect, src: String) {
        self.queue
            .push_back(Box::new(move |surface| surface.draw_image(&src, rect)));
    }

    fn enqueue_path(&mut self, rect: Rect, style: &Style, data: String) {
        let color = style.color.unwrap_or(Rgba::BLACK);
        self.queue.push_back(Box::new(move |surface| {
            trace_path_data(surface, &data, rect.x, rect.y);
            surface.fill_path(color)
        }));
    }

    /// Repaint a whole subtree in pre-order (parents under children).
    pub(crate) fn paint_subtree(&mut self, root: NodeId) -> Result<()> {
        for id in self.subtree(root)? {
            self.paint_node(id)?;
        }
        Ok(())
    }
}

/// Border drawing. Square corners are four filled edge strips; rounded
/// corners are an even-odd fill between the outer and the inset round rect.
fn paint_border(
    surface: &mut dyn Surface,
    rect: Rect,
    border: BorderWidths,
    radius: f32,
    color: Rgba,
) -> Result<()> {
    if radius > 0.0 {
        let inner = Rect::new(
            rect.x + border.left,
            rect.y + border.top,
            (rect.width - border.left - border.right).max(0.0),
            (rect.height - border.top - border.bottom).max(0.0),
        );
        let inner_radius = (radius - border.top.max(border.left)).max(0.0);
        surface.begin_path();
        surface.round_rect(rect, radius);
        surface.round_rect(inner, inner_radius);
        surface.fill_path_even_odd(color)?;
        return Ok(());
    }
    if border.top > 0.0 {
        surface.fill_rect(Rect::new(rect.x, rect.y, rect.width, border.top), color)?;
    }
    if border.bottom > 0.0 {
        surface.fill_rect(
            Rect::new(rect.x, rect.y + rect.height - border.bottom, rect.width, border.bottom),
            color,
        )?;
    }
    if border.left > 0.0 {
        surface.fill_rect(Rect::new(rect.x, rect.y, border.left, rect.height), color)?;
    }
    if border.right > 0.0 {
        surface.fill_rect(
            Rect::new(rect.x + rect.width - border.right, rect.y, border.right, rect.height),
            color,
        )?;
    }
    Ok(())
}

/// Minimal absolute-command path tracer: M, L, H, V and Z, with whitespace or
/// comma separated coordinates, translated by the node's position. Unknown
/// commands and trailing garbage are skipped.
fn trace_path_data(surface: &mut dyn Surface, data: &str, dx: f32, dy: f32) {
    surface.begin_path();
    fn next_number(tokens: &mut std::str::SplitWhitespace<'_>) -> Option<f32> {
        tokens.next().and_then(|t| t.parse::<f32>().ok())
    }

    let normalized = data.replace(',', " ");
    let mut tokens = normalized.split_whitespace();
    let mut x = 0.0f32;
    let mut y = 0.0f32;
    while let Some(token) = tokens.next() {
        match token {
            "M" => {
                let (Some(nx), Some(ny)) = (next_number(&mut tokens), next_number(&mut tokens))
                else {
                    break;
                };
                x = nx;
                y = ny;
                surface.move_to(dx + x, dy + y);
            }
            "L" => {
                let (Some(nx), Some(ny)) = (next_number(&mut tokens), next_number(&mut tokens))
                else {
                    break;
                };
                x = nx;
                y = ny;
                surface.line_to(dx + x, dy + y);
            }
            "H" => {
                let Some(nx) = next_number(&mut tokens) else { break };
                x = nx;
                surface.line_to(dx + x, dy + y);
            }
            "V" => {
                let Some(ny) = next_number(&mut tokens) else { break };
                y = ny;
                surface.line_to(dx + x, dy + y);
            }
            "Z" | "z" => surface.close_path(),
            _ => {}
        }
    }
}

impl Tree {
    /// Queue a repaint of a node and its subtree without touching layout.
    pub fn paint(&self, root: NodeId) -> Result<()> {
        self.inner.borrow_mut().paint_subtree(root)
    }

    /// Measure every text node against `surface` and write the measured
    /// width and line height into its style cell. With subscriptions active
    /// this triggers the scoped relayouts; run it before the initial
    /// [`setup_layout`](Tree::setup_layout) to seed text dimensions without
    /// paying a relayout per node.
    pub fn measure_text(&self, surface: &mut dyn Surface) -> Result<()> {
        let updates: Vec<(Signal<Style>, Style)> = {
            let inner = self.inner.borrow();
            let mut updates = Vec::new();
            for slot in inner.nodes.iter().flatten() {
                let NodeKind::Text { content } = &slot.kind else { continue };
                let style = slot.style.get();
                let font = Font::new(style.effective_font_family(), style.effective_font_size());
                let width = surface.measure_text(content, &font);
                let measured = Style {
                    width: Dimension::Length(width),
                    height: Dimension::Length(font.size),
                    ..style.clone()
                };
                if measured != style {
                    updates.push((slot.style.clone(), measured));
                }
            }
            updates
        };
        for (cell, style) in updates {
            cell.set(style);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::surface::{RecordingSurface, SurfaceOp};
    use crate::types::Edges;

    fn painted_ops(tree: &Tree) -> Vec<SurfaceOp> {
        let mut surface = RecordingSurface::new();
        tree.process_draw_queue(&mut surface).unwrap();
        surface.ops
    }

    fn block(width: f32, height: f32) -> Style {
        Style {
            width: Dimension::Length(width),
            height: Dimension::Length(height),
            ..Default::default()
        }
    }

    #[test]
    fn test_container_paints_background_then_border() {
        let tree = Tree::new();
        let node = tree
            .container(Style {
                background_color: Some(Rgba::rgb(10, 20, 30)),
                border: BorderWidths::all(2.0),
                border_color: Some(Rgba::rgb(255, 0, 0)),
                ..block(100.0, 50.0)
            })
            .unwrap();
        tree.layout(node, 100.0, 50.0).unwrap();

        let ops = painted_ops(&tree);
        assert!(matches!(
            ops[0],
            SurfaceOp::FillRect { rect: Rect { width: 100.0, height: 50.0, .. }, color }
                if color == Rgba::rgb(10, 20, 30)
        ));
        // Four edge strips follow the background.
        assert_eq!(ops.len(), 5);
        assert!(ops[1..]
            .iter()
            .all(|op| matches!(op, SurfaceOp::FillRect { color, .. } if *color == Rgba::rgb(255, 0, 0))));
    }

    #[test]
    fn test_rounded_border_uses_even_odd_fill() {
        let tree = Tree::new();
        let node = tree
            .container(Style {
                border: BorderWidths::all(4.0),
                border_radius: 8.0,
                ..block(100.0, 50.0)
            })
            .unwrap();
        tree.layout(node, 100.0, 50.0).unwrap();

        let ops = painted_ops(&tree);
        assert!(matches!(ops[0], SurfaceOp::BeginPath));
        assert!(matches!(ops[1], SurfaceOp::RoundRect { radius: 8.0, .. }));
        assert!(matches!(ops[2], SurfaceOp::RoundRect { radius: 4.0, .. }));
        assert!(matches!(ops[3], SurfaceOp::FillPathEvenOdd { .. }));
    }

    #[test]
    fn test_text_baseline_offset() {
        let tree = Tree::new();
        let node = tree
            .text(
                "hello",
                Style {
                    font_size: Some(20.0),
                    color: Some(Rgba::WHITE),
                    ..block(60.0, 20.0)
                },
            )
            .unwrap();
        tree.layout(node, 60.0, 20.0).unwrap();

        let ops = painted_ops(&tree);
        assert!(ops.iter().any(|op| matches!(
            op,
            SurfaceOp::FillText { text, x, y, .. }
                if text == "hello" && *x == 0.0 && *y == 20.0
        )));
    }

    #[test]
    fn test_image_paints_into_its_box() {
        let tree = Tree::new();
        let root = tree
            .container(Style {
                padding: Edges::all(5.0),
                ..block(100.0, 100.0)
            })
            .unwrap();
        let image = tree.image("logo.png", block(32.0, 32.0)).unwrap();
        tree.append_child(root, image).unwrap();
        tree.layout(root, 100.0, 100.0).unwrap();

        let ops = painted_ops(&tree);
        assert!(ops.iter().any(|op| matches!(
            op,
            SurfaceOp::DrawImage { src, rect }
                if src == "logo.png" && rect.x == 5.0 && rect.y == 5.0 && rect.width == 32.0
        )));
    }

    #[test]
    fn test_path_commands_translate_by_position() {
        let tree = Tree::new();
        let root = tree
            .container(Style {
                padding: Edges::all(10.0),
                ..block(100.0, 100.0)
            })
            .unwrap();
        let path = tree
            .path("M 0 0 L 10 0 V 10 H 0 Z", block(10.0, 10.0))
            .unwrap();
        tree.append_child(root, path).unwrap();
        tree.layout(root, 100.0, 100.0).unwrap();

        let ops = painted_ops(&tree);
        let start = ops
            .iter()
            .position(|op| matches!(op, SurfaceOp::BeginPath))
            .unwrap();
        assert!(matches!(ops[start + 1], SurfaceOp::MoveTo { x: 10.0, y: 10.0 }));
        assert!(matches!(ops[start + 2], SurfaceOp::LineTo { x: 20.0, y: 10.0 }));
        assert!(matches!(ops[start + 3], SurfaceOp::LineTo { x: 20.0, y: 20.0 }));
        assert!(matches!(ops[start + 4], SurfaceOp::LineTo { x: 10.0, y: 20.0 }));
        assert!(matches!(ops[start + 5], SurfaceOp::ClosePath));
        assert!(matches!(ops[start + 6], SurfaceOp::FillPath { .. }));
    }

    #[test]
    fn test_measure_text_sets_style_dimensions() {
        let tree = Tree::new();
        let node = tree
            .text(
                "hello",
                Style {
                    font_size: Some(10.0),
                    ..Default::default()
                },
            )
            .unwrap();

        let mut surface = RecordingSurface::new();
        tree.measure_text(&mut surface).unwrap();

        let style = tree.style(node).unwrap().get();
        // RecordingSurface measures roughly 0.6 * size per character; the
        // product is not exact in f32, so compare with a tolerance.
        let Dimension::Length(width) = style.width else {
            panic!("measured width not applied: {:?}", style.width);
        };
        assert!((width - 30.0).abs() < 1e-3, "width {width}");
        assert_eq!(style.height, Dimension::Length(10.0));
    }

    #[test]
    fn test_append_before_layout_queues_no_paint() {
        let tree = Tree::new();
        let root = tree
            .container(Style {
                background_color: Some(Rgba::rgb(10, 10, 10)),
                ..block(100.0, 100.0)
            })
            .unwrap();
        let child = tree
            .container(Style {
                background_color: Some(Rgba::rgb(20, 20, 20)),
                ..block(10.0, 10.0)
            })
            .unwrap();
        tree.append_child(root, child).unwrap();

        // No layout pass has run, so there is no position to paint at.
        assert_eq!(tree.queued_draw_commands(), 0);

        tree.layout(root, 100.0, 100.0).unwrap();
        let ops = painted_ops(&tree);
        assert_eq!(ops.len(), 2);
        assert!(matches!(
            ops[1],
            SurfaceOp::FillRect { rect, .. } if rect.x == 0.0 && rect.y == 0.0
        ));
    }

    #[test]
    fn test_nodes_without_visuals_queue_nothing_for_box() {
        let tree = Tree::new();
        let node = tree.container(block(10.0, 10.0)).unwrap();
        tree.layout(node, 10.0, 10.0).unwrap();
        assert_eq!(tree.queued_draw_commands(), 0);
    }
}

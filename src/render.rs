//! Deferred draw queue.
//!
//! Paint never draws inline: every paint request appends commands to a FIFO
//! queue that the frame step drains against a [`Surface`](crate::surface).
//! Draining runs to exhaustion, so commands enqueued while the queue is
//! draining (a command repainting another node, a subscriber reacting
//! mid-frame) still run in the same frame. A failing command aborts the frame
//! and discards whatever was still queued; nodes repaint on their next change.

use tracing::{trace, warn};

use crate::error::Result;
use crate::surface::Surface;
use crate::tree::Tree;

/// One deferred draw step. Commands capture everything they need by value so
/// running them never touches the tree.
pub type DrawCommand = Box<dyn FnOnce(&mut dyn Surface) -> Result<()>>;

impl Tree {
    /// Append a command to the back of the draw queue.
    pub fn enqueue_draw_command(&self, command: DrawCommand) {
        self.inner.borrow_mut().queue.push_back(command);
    }

    /// Number of commands currently queued.
    pub fn queued_draw_commands(&self) -> usize {
        self.inner.borrow().queue.len()
    }

    /// Drain the queue front-to-back until it is empty. The tree borrow is
    /// released around each command, so commands may enqueue further work.
    pub fn process_draw_queue(&self, surface: &mut dyn Surface) -> Result<()> {
        let mut ran = 0usize;
        loop {
            let command = self.inner.borrow_mut().queue.pop_front();
            let Some(command) = command else { break };
            if let Err(err) = command(surface) {
                let dropped = {
                    let mut inner = self.inner.borrow_mut();
                    let dropped = inner.queue.len();
                    inner.queue.clear();
                    dropped
                };
                warn!(%err, dropped, "draw command failed, frame aborted");
                return Err(err);
            }
            ran += 1;
        }
        if ran > 0 {
            trace!(ran, "draw queue drained");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use crate::surface::{RecordingSurface, SurfaceOp};
    use crate::types::{Rect, Rgba};

    fn fill(rect: Rect) -> DrawCommand {
        Box::new(move |surface| surface.fill_rect(rect, Rgba::BLACK))
    }

    #[test]
    fn test_commands_run_in_fifo_order() {
        let tree = Tree::new();
        tree.enqueue_draw_command(fill(Rect::new(1.0, 0.0, 1.0, 1.0)));
        tree.enqueue_draw_command(fill(Rect::new(2.0, 0.0, 1.0, 1.0)));
        tree.enqueue_draw_command(fill(Rect::new(3.0, 0.0, 1.0, 1.0)));

        let mut surface = RecordingSurface::new();
        tree.process_draw_queue(&mut surface).unwrap();

        let xs: Vec<f32> = surface
            .ops
            .iter()
            .map(|op| match op {
                SurfaceOp::FillRect { rect, .. } => rect.x,
                other => panic!("unexpected op {other:?}"),
            })
            .collect();
        assert_eq!(xs, vec![1.0, 2.0, 3.0]);
    }

    #[test]
    fn test_drain_runs_commands_enqueued_mid_frame() {
        let tree = Tree::new();
        let tree_for_command = tree.clone();
        tree.enqueue_draw_command(Box::new(move |surface| {
            tree_for_command.enqueue_draw_command(fill(Rect::new(9.0, 0.0, 1.0, 1.0)));
            surface.fill_rect(Rect::new(1.0, 0.0, 1.0, 1.0), Rgba::BLACK)
        }));

        let mut surface = RecordingSurface::new();
        tree.process_draw_queue(&mut surface).unwrap();

        assert_eq!(surface.ops.len(), 2);
        assert_eq!(tree.queued_draw_commands(), 0);
    }

    #[test]
    fn test_failure_aborts_frame_and_clears_queue() {
        let tree = Tree::new();
        tree.enqueue_draw_command(fill(Rect::new(1.0, 0.0, 1.0, 1.0)));
        tree.enqueue_draw_command(Box::new(|_| Err(Error::Draw("context lost".into()))));
        tree.enqueue_draw_command(fill(Rect::new(3.0, 0.0, 1.0, 1.0)));

        let mut surface = RecordingSurface::new();
        let result = tree.process_draw_queue(&mut surface);

        assert!(matches!(result, Err(Error::Draw(_))));
        // The command before the failure ran; the one after was discarded.
        assert_eq!(surface.ops.len(), 1);
        assert_eq!(tree.queued_draw_commands(), 0);
    }
}

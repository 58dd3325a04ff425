//! Windows: one node tree per window, driven by host lifecycle events.
//!
//! A [`Window`] binds a [`Tree`] root to a viewport: construction runs the
//! initial layout activation, resize re-solves against the new viewport,
//! pointer events feed the dispatcher, and [`Window::render`] drains the draw
//! queue into a surface once per frame. [`Windows`] is the flat registry a
//! host event loop addresses windows through.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::{Error, Result};
use crate::event::PointerEvent;
use crate::surface::Surface;
use crate::tree::{NodeId, Tree};
use crate::types::{Rect, Rgba};

/// Registry identifier for a window. Never reused within a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct WindowId(pub u32);

impl std::fmt::Display for WindowId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "window-{}", self.0)
    }
}

/// Host lifecycle and input events, in window coordinates.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum WindowEvent {
    Setup,
    Resize { width: f32, height: f32 },
    Frame,
    PointerDown { x: f32, y: f32 },
    PointerUp { x: f32, y: f32 },
    PointerMove { x: f32, y: f32 },
    Close,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WindowOptions {
    pub title: String,
    pub background: Rgba,
}

impl Default for WindowOptions {
    fn default() -> Self {
        Self {
            title: String::new(),
            background: Rgba::BLACK,
        }
    }
}

pub struct Window {
    tree: Tree,
    root: NodeId,
    width: f32,
    height: f32,
    options: WindowOptions,
    open: bool,
}

impl Window {
    /// Bind `root` to a viewport and activate its reactive layout. A window
    /// background command is queued so the first frame clears the surface.
    pub fn new(tree: Tree, root: NodeId, width: f32, height: f32, options: WindowOptions) -> Result<Self> {
        let window = Self { tree, root, width, height, options, open: true };
        window.enqueue_background();
        window.tree.setup_layout(root, width, height)?;
        debug!(title = %window.options.title, width, height, "window opened");
        Ok(window)
    }

    pub fn tree(&self) -> &Tree {
        &self.tree
    }

    pub fn root(&self) -> NodeId {
        self.root
    }

    pub fn is_open(&self) -> bool {
        self.open
    }

    pub fn title(&self) -> &str {
        &self.options.title
    }

    pub fn size(&self) -> (f32, f32) {
        (self.width, self.height)
    }

    fn enqueue_background(&self) {
        let rect = Rect::new(0.0, 0.0, self.width, self.height);
        let background = self.options.background;
        self.tree
            .enqueue_draw_command(Box::new(move |surface| surface.fill_rect(rect, background)));
    }

    /// Feed one host event into the tree. Events on a closed window are
    /// dropped.
    pub fn handle_event(&mut self, event: WindowEvent) -> Result<()> {
        if !self.open {
            warn!(?event, "event on closed window dropped");
            return Ok(());
        }
        match event {
            WindowEvent::Setup => {
                debug!(title = %self.options.title, "window setup");
            }
            WindowEvent::Resize { width, height } => {
                self.width = width;
                self.height = height;
                // A resize invalidates everything on screen: re-solve against
                // the new viewport and repaint the whole tree over a fresh
                // background.
                self.enqueue_background();
                self.tree.layout(self.root, width, height)?;
                self.tree.paint(self.root)?;
            }
            WindowEvent::Frame => {}
            WindowEvent::PointerDown { x, y } => {
                self.tree.dispatch(self.root, PointerEvent::down(x, y))?;
            }
            WindowEvent::PointerUp { x, y } => {
                self.tree.dispatch(self.root, PointerEvent::up(x, y))?;
            }
            WindowEvent::PointerMove { x, y } => {
                self.tree.dispatch(self.root, PointerEvent::moved(x, y))?;
            }
            WindowEvent::Close => self.close(),
        }
        Ok(())
    }

    /// Drain the draw queue into `surface`. Call once per frame.
    pub fn render(&mut self, surface: &mut dyn Surface) -> Result<()> {
        self.tree.process_draw_queue(surface)
    }

    /// Tear the tree down and drop all pending draw work. Idempotent.
    pub fn close(&mut self) {
        if !self.open {
            return;
        }
        self.open = false;
        if let Err(err) = self.tree.teardown(self.root) {
            warn!(%err, "window teardown failed");
        }
        debug!(title = %self.options.title, "window closed");
    }
}

/// Flat registry of open windows, addressed by [`WindowId`].
#[derive(Default)]
pub struct Windows {
    windows: HashMap<WindowId, Window>,
    next_id: u32,
}

impl Windows {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn create(
        &mut self,
        tree: Tree,
        root: NodeId,
        width: f32,
        height: f32,
        options: WindowOptions,
    ) -> Result<WindowId> {
        let id = WindowId(self.next_id);
        self.next_id += 1;
        let window = Window::new(tree, root, width, height, options)?;
        self.windows.insert(id, window);
        Ok(id)
    }

    pub fn get(&self, id: WindowId) -> Option<&Window> {
        self.windows.get(&id)
    }

    pub fn get_mut(&mut self, id: WindowId) -> Option<&mut Window> {
        self.windows.get_mut(&id)
    }

    pub fn handle_event(&mut self, id: WindowId, event: WindowEvent) -> Result<()> {
        let window = self.windows.get_mut(&id).ok_or(Error::UnknownWindow(id))?;
        window.handle_event(event)?;
        // Closed windows leave the registry immediately.
        if !window.is_open() {
            self.windows.remove(&id);
        }
        Ok(())
    }

    pub fn render(&mut self, id: WindowId, surface: &mut dyn Surface) -> Result<()> {
        self.windows
            .get_mut(&id)
            .ok_or(Error::UnknownWindow(id))?
            .render(surface)
    }

    /// Close and remove one window.
    pub fn close(&mut self, id: WindowId) -> Result<()> {
        let mut window = self.windows.remove(&id).ok_or(Error::UnknownWindow(id))?;
        window.close();
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.windows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.windows.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::style::Style;
    use crate::surface::{RecordingSurface, SurfaceOp};
    use crate::types::Dimension;

    fn sized_root(tree: &Tree, width: f32, height: f32) -> NodeId {
        tree.container(Style {
            width: Dimension::Length(width),
            height: Dimension::Length(height),
            background_color: Some(Rgba::rgb(30, 30, 30)),
            ..Default::default()
        })
        .unwrap()
    }

    #[test]
    fn test_first_frame_paints_background_then_tree() {
        let tree = Tree::new();
        let root = sized_root(&tree, 100.0, 80.0);
        let mut window =
            Window::new(tree, root, 100.0, 80.0, WindowOptions::default()).unwrap();

        let mut surface = RecordingSurface::new();
        window.render(&mut surface).unwrap();

        assert!(matches!(
            surface.ops[0],
            SurfaceOp::FillRect { rect, color }
                if rect.width == 100.0 && rect.height == 80.0 && color == Rgba::BLACK
        ));
        assert!(surface.ops.len() > 1);
    }

    #[test]
    fn test_resize_relayouts_and_repaints() {
        let tree = Tree::new();
        let root = tree
            .container(Style {
                background_color: Some(Rgba::rgb(30, 30, 30)),
                width: Dimension::Percent(100.0),
                height: Dimension::Percent(100.0),
                ..Default::default()
            })
            .unwrap();
        let mut window =
            Window::new(tree.clone(), root, 100.0, 80.0, WindowOptions::default()).unwrap();
        let mut surface = RecordingSurface::new();
        window.render(&mut surface).unwrap();

        window
            .handle_event(WindowEvent::Resize { width: 200.0, height: 80.0 })
            .unwrap();
        assert_eq!(window.size(), (200.0, 80.0));
        assert_eq!(tree.layout_box(root).unwrap().width, 200.0);

        surface.ops.clear();
        window.render(&mut surface).unwrap();
        assert!(!surface.ops.is_empty());
    }

    #[test]
    fn test_pointer_events_route_to_tree() {
        let tree = Tree::new();
        let root = sized_root(&tree, 100.0, 80.0);
        let mut window =
            Window::new(tree.clone(), root, 100.0, 80.0, WindowOptions::default()).unwrap();

        window
            .handle_event(WindowEvent::PointerDown { x: 10.0, y: 10.0 })
            .unwrap();
        assert!(tree.clicked(root).unwrap().get().is_some());
        window
            .handle_event(WindowEvent::PointerUp { x: 10.0, y: 10.0 })
            .unwrap();
        assert!(tree.clicked(root).unwrap().get().is_none());
    }

    #[test]
    fn test_close_tears_down_and_ignores_later_events() {
        let tree = Tree::new();
        let root = sized_root(&tree, 100.0, 80.0);
        let mut window =
            Window::new(tree.clone(), root, 100.0, 80.0, WindowOptions::default()).unwrap();

        window.handle_event(WindowEvent::Close).unwrap();
        assert!(!window.is_open());
        assert!(tree.is_empty());

        // Dropped, not an error.
        window
            .handle_event(WindowEvent::PointerDown { x: 1.0, y: 1.0 })
            .unwrap();
        window.close();
    }

    #[test]
    fn test_registry_addresses_windows_by_id() {
        let mut windows = Windows::new();
        let tree_a = Tree::new();
        let root_a = sized_root(&tree_a, 100.0, 80.0);
        let tree_b = Tree::new();
        let root_b = sized_root(&tree_b, 50.0, 50.0);

        let a = windows
            .create(tree_a, root_a, 100.0, 80.0, WindowOptions {
                title: "main".into(),
                ..Default::default()
            })
            .unwrap();
        let b = windows
            .create(tree_b, root_b, 50.0, 50.0, WindowOptions::default())
            .unwrap();
        assert_ne!(a, b);
        assert_eq!(windows.len(), 2);
        assert_eq!(windows.get(a).unwrap().title(), "main");

        windows.close(a).unwrap();
        assert_eq!(windows.len(), 1);
        assert!(matches!(
            windows.handle_event(a, WindowEvent::Frame),
            Err(Error::UnknownWindow(_))
        ));
    }

    #[test]
    fn test_close_event_removes_from_registry() {
        let mut windows = Windows::new();
        let tree = Tree::new();
        let root = sized_root(&tree, 100.0, 80.0);
        let id = windows
            .create(tree, root, 100.0, 80.0, WindowOptions::default())
            .unwrap();

        windows.handle_event(id, WindowEvent::Close).unwrap();
        assert!(windows.is_empty());
    }
}

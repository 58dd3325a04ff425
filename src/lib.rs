//! Reactive retained-mode UI tree for desktop rendering.
//!
//! The pipeline: a retained node tree (containers, text, images, vector
//! paths) whose styles live in reactive cells; a flexbox engine mirroring the
//! tree and solving geometry; a position flush that accumulates absolute
//! coordinates and queues paints for exactly what changed; pointer dispatch
//! into per-node click and hover cells; and a deferred FIFO draw queue
//! drained against a [`Surface`] once per frame.
//!
//! ```
//! use cinder_ui::{Style, Tree, Dimension, Rgba, RecordingSurface};
//!
//! let tree = Tree::new();
//! let root = tree.container(Style {
//!     width: Dimension::Length(200.0),
//!     height: Dimension::Length(100.0),
//!     background_color: Some(Rgba::rgb(30, 30, 30)),
//!     ..Default::default()
//! }).unwrap();
//! let label = tree.text("hello", Style::default()).unwrap();
//! tree.append_child(root, label).unwrap();
//!
//! tree.setup_layout(root, 200.0, 100.0).unwrap();
//! let mut surface = RecordingSurface::new();
//! tree.process_draw_queue(&mut surface).unwrap();
//! ```

pub mod error;
pub mod event;
mod layout;
mod paint;
pub mod render;
pub mod signals;
pub mod style;
pub mod surface;
pub mod tree;
pub mod types;
pub mod window;

pub use error::{Error, Result};
pub use event::{HoverTarget, PointerEvent, PointerKind};
pub use render::DrawCommand;
pub use signals::{derived, signal, Derived, Signal, Subscription};
pub use style::Style;
pub use surface::{Font, RecordingSurface, Surface, SurfaceOp};
pub use tree::{NodeId, NodeKind, Tree};
pub use types::{
    AlignContent, AlignItems, BorderWidths, Dimension, Edges, FlexDirection, FlexWrap, Gap,
    JustifyContent, Point, PositionType, Rect, Rgba,
};
pub use window::{Window, WindowEvent, WindowId, WindowOptions, Windows};

//! Raster surface boundary.
//!
//! The pipeline never draws directly; queued draw commands are the only
//! callers of [`Surface`]. Backends implement this trait over a real 2D
//! context; [`RecordingSurface`] implements it over an op log and is what the
//! test suite (and any headless embedding) uses.

use crate::error::{Error, Result};
use crate::types::{Rect, Rgba};

/// Font selection for text metrics and drawing.
#[derive(Debug, Clone, PartialEq)]
pub struct Font {
    pub family: String,
    pub size: f32,
}

impl Font {
    pub fn new(family: impl Into<String>, size: f32) -> Self {
        Self { family: family.into(), size }
    }
}

/// Opaque 2D drawing target.
///
/// Mirrors the primitive set of a canvas-style context: rectangle fills and
/// strokes, a current path with fill/stroke terminators, text metrics and
/// drawing, and a save/restore/translate transform stack.
pub trait Surface {
    fn fill_rect(&mut self, rect: Rect, color: Rgba) -> Result<()>;
    fn stroke_rect(&mut self, rect: Rect, width: f32, color: Rgba) -> Result<()>;
    fn fill_round_rect(&mut self, rect: Rect, radius: f32, color: Rgba) -> Result<()>;

    fn begin_path(&mut self);
    fn move_to(&mut self, x: f32, y: f32);
    fn line_to(&mut self, x: f32, y: f32);
    fn close_path(&mut self);
    /// Append a rounded rectangle to the current path.
    fn round_rect(&mut self, rect: Rect, radius: f32);
    fn fill_path(&mut self, color: Rgba) -> Result<()>;
    /// Fill the current path with the even-odd rule (used for border rings).
    fn fill_path_even_odd(&mut self, color: Rgba) -> Result<()>;
    fn stroke_path(&mut self, width: f32, color: Rgba) -> Result<()>;

    /// Advance width of `text` in the given font.
    fn measure_text(&mut self, text: &str, font: &Font) -> f32;
    fn fill_text(&mut self, text: &str, x: f32, y: f32, font: &Font, color: Rgba) -> Result<()>;

    fn draw_image(&mut self, src: &str, rect: Rect) -> Result<()>;

    fn save(&mut self);
    fn restore(&mut self);
    fn translate(&mut self, dx: f32, dy: f32);
}

// =============================================================================
// Recording surface
// =============================================================================

/// One recorded surface operation.
#[derive(Debug, Clone, PartialEq)]
pub enum SurfaceOp {
    FillRect { rect: Rect, color: Rgba },
    StrokeRect { rect: Rect, width: f32, color: Rgba },
    FillRoundRect { rect: Rect, radius: f32, color: Rgba },
    BeginPath,
    MoveTo { x: f32, y: f32 },
    LineTo { x: f32, y: f32 },
    ClosePath,
    RoundRect { rect: Rect, radius: f32 },
    FillPath { color: Rgba },
    FillPathEvenOdd { color: Rgba },
    StrokePath { width: f32, color: Rgba },
    FillText { text: String, x: f32, y: f32, color: Rgba },
    DrawImage { src: String, rect: Rect },
    Save,
    Restore,
    Translate { dx: f32, dy: f32 },
}

/// Surface that records every operation instead of rasterizing.
///
/// Text metrics are synthesized as `0.6 * font_size` per character, which is
/// close enough to a real proportional font for layout tests. `fail_on_op`
/// makes the Nth mutating operation return an error, for exercising the
/// frame-abort path.
#[derive(Default)]
pub struct RecordingSurface {
    pub ops: Vec<SurfaceOp>,
    pub fail_on_op: Option<usize>,
}

impl RecordingSurface {
    pub fn new() -> Self {
        Self::default()
    }

    fn record(&mut self, op: SurfaceOp) -> Result<()> {
        if let Some(n) = self.fail_on_op {
            if self.ops.len() >= n {
                return Err(Error::Draw(format!("injected failure at op {n}")));
            }
        }
        self.ops.push(op);
        Ok(())
    }

    /// Record an op that cannot fail (path building, transforms).
    fn record_infallible(&mut self, op: SurfaceOp) {
        self.ops.push(op);
    }
}

impl Surface for RecordingSurface {
    fn fill_rect(&mut self, rect: Rect, color: Rgba) -> Result<()> {
        self.record(SurfaceOp::FillRect { rect, color })
    }

    fn stroke_rect(&mut self, rect: Rect, width: f32, color: Rgba) -> Result<()> {
        self.record(SurfaceOp::StrokeRect { rect, width, color })
    }

    fn fill_round_rect(&mut self, rect: Rect, radius: f32, color: Rgba) -> Result<()> {
        self.record(SurfaceOp::FillRoundRect { rect, radius, color })
    }

    fn begin_path(&mut self) {
        self.record_infallible(SurfaceOp::BeginPath);
    }

    fn move_to(&mut self, x: f32, y: f32) {
        self.record_infallible(SurfaceOp::MoveTo { x, y });
    }

    fn line_to(&mut self, x: f32, y: f32) {
        self.record_infallible(SurfaceOp::LineTo { x, y });
    }

    fn close_path(&mut self) {
        self.record_infallible(SurfaceOp::ClosePath);
    }

    fn round_rect(&mut self, rect: Rect, radius: f32) {
        self.record_infallible(SurfaceOp::RoundRect { rect, radius });
    }

    fn fill_path(&mut self, color: Rgba) -> Result<()> {
        self.record(SurfaceOp::FillPath { color })
    }

    fn fill_path_even_odd(&mut self, color: Rgba) -> Result<()> {
        self.record(SurfaceOp::FillPathEvenOdd { color })
    }

    fn stroke_path(&mut self, width: f32, color: Rgba) -> Result<()> {
        self.record(SurfaceOp::StrokePath { width, color })
    }

    fn measure_text(&mut self, text: &str, font: &Font) -> f32 {
        text.chars().count() as f32 * font.size * 0.6
    }

    fn fill_text(&mut self, text: &str, x: f32, y: f32, _font: &Font, color: Rgba) -> Result<()> {
        self.record(SurfaceOp::FillText { text: text.to_string(), x, y, color })
    }

    fn draw_image(&mut self, src: &str, rect: Rect) -> Result<()> {
        self.record(SurfaceOp::DrawImage { src: src.to_string(), rect })
    }

    fn save(&mut self) {
        self.record_infallible(SurfaceOp::Save);
    }

    fn restore(&mut self) {
        self.record_infallible(SurfaceOp::Restore);
    }

    fn translate(&mut self, dx: f32, dy: f32) {
        self.record_infallible(SurfaceOp::Translate { dx, dy });
    }
}

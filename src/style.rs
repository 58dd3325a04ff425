//! Style model - a plain, serializable record of visual and layout properties.
//!
//! The layout half translates into taffy directives through [`Style::to_taffy`],
//! a pure function with no tree access. The visual half (colors, typography,
//! corner radius) is consumed only by the paint dispatcher; the layout engine
//! never sees it, which is why a purely visual edit cannot move any box.

use serde::{Deserialize, Serialize};

use crate::types::{
    AlignContent, AlignItems, BorderWidths, Dimension, Edges, FlexDirection, FlexWrap, Gap,
    JustifyContent, PositionType, Rgba,
};

/// Font size used when a text node's style does not set one.
pub const DEFAULT_FONT_SIZE: f32 = 16.0;

/// Font family used when a text node's style does not set one.
pub const DEFAULT_FONT_FAMILY: &str = "Arial";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Style {
    // Flex container
    pub flex_direction: FlexDirection,
    pub flex_wrap: FlexWrap,
    pub justify_content: JustifyContent,
    pub align_items: AlignItems,
    pub align_content: AlignContent,

    // Flex item
    pub flex_grow: f32,
    pub flex_shrink: f32,
    pub flex_basis: Dimension,

    // Dimensions
    pub width: Dimension,
    pub height: Dimension,
    pub min_width: Dimension,
    pub min_height: Dimension,
    pub max_width: Dimension,
    pub max_height: Dimension,
    pub aspect_ratio: Option<f32>,

    // Spacing
    pub padding: Edges,
    pub margin: Edges,
    pub border: BorderWidths,
    pub gap: Gap,

    // Positioning
    pub position: PositionType,
    pub inset: Edges,

    // Visual (ignored by the layout engine)
    pub color: Option<Rgba>,
    pub background_color: Option<Rgba>,
    pub border_color: Option<Rgba>,
    pub border_radius: f32,
    pub font_family: Option<String>,
    pub font_size: Option<f32>,
}

impl Default for Style {
    fn default() -> Self {
        Self {
            flex_direction: FlexDirection::default(),
            flex_wrap: FlexWrap::default(),
            justify_content: JustifyContent::default(),
            align_items: AlignItems::default(),
            align_content: AlignContent::default(),
            flex_grow: 0.0,
            flex_shrink: 1.0,
            flex_basis: Dimension::Auto,
            width: Dimension::Auto,
            height: Dimension::Auto,
            min_width: Dimension::Auto,
            min_height: Dimension::Auto,
            max_width: Dimension::Auto,
            max_height: Dimension::Auto,
            aspect_ratio: None,
            padding: Edges::default(),
            // Auto margins absorb free space in flexbox; the default must be
            // zero so unstyled nodes pack from the container origin.
            margin: Edges::all(0.0),
            border: BorderWidths::default(),
            gap: Gap::default(),
            position: PositionType::default(),
            inset: Edges {
                top: Dimension::Auto,
                right: Dimension::Auto,
                bottom: Dimension::Auto,
                left: Dimension::Auto,
            },
            color: None,
            background_color: None,
            border_color: None,
            border_radius: 0.0,
            font_family: None,
            font_size: None,
        }
    }
}

impl Style {
    /// Effective font size for text painting and measurement.
    pub fn effective_font_size(&self) -> f32 {
        self.font_size.unwrap_or(DEFAULT_FONT_SIZE)
    }

    /// Effective font family for text painting and measurement.
    pub fn effective_font_family(&self) -> &str {
        self.font_family.as_deref().unwrap_or(DEFAULT_FONT_FAMILY)
    }

    /// Translate the layout half of this style into taffy directives.
    pub fn to_taffy(&self) -> taffy::Style {
        taffy::Style {
            display: taffy::Display::Flex,
            position: to_taffy_position(self.position),
            inset: to_taffy_lpa_rect(self.inset),

            flex_direction: to_taffy_flex_direction(self.flex_direction),
            flex_wrap: to_taffy_flex_wrap(self.flex_wrap),
            justify_content: Some(to_taffy_justify_content(self.justify_content)),
            align_items: Some(to_taffy_align_items(self.align_items)),
            align_content: Some(to_taffy_align_content(self.align_content)),

            flex_grow: self.flex_grow,
            flex_shrink: self.flex_shrink,
            flex_basis: to_taffy_dimension(self.flex_basis),

            size: taffy::Size {
                width: to_taffy_dimension(self.width),
                height: to_taffy_dimension(self.height),
            },
            min_size: taffy::Size {
                width: to_taffy_dimension(self.min_width),
                height: to_taffy_dimension(self.min_height),
            },
            max_size: taffy::Size {
                width: to_taffy_dimension(self.max_width),
                height: to_taffy_dimension(self.max_height),
            },
            aspect_ratio: self.aspect_ratio,

            margin: to_taffy_lpa_rect(self.margin),
            padding: to_taffy_lp_rect(self.padding),
            border: taffy::Rect {
                top: taffy::LengthPercentage::Length(self.border.top),
                right: taffy::LengthPercentage::Length(self.border.right),
                bottom: taffy::LengthPercentage::Length(self.border.bottom),
                left: taffy::LengthPercentage::Length(self.border.left),
            },
            gap: taffy::Size {
                width: taffy::LengthPercentage::Length(self.gap.column),
                height: taffy::LengthPercentage::Length(self.gap.row),
            },

            ..Default::default()
        }
    }
}

// =============================================================================
// Directive conversion
// =============================================================================

fn to_taffy_dimension(dim: Dimension) -> taffy::Dimension {
    match dim {
        Dimension::Auto => taffy::Dimension::Auto,
        Dimension::Length(px) => taffy::Dimension::Length(px),
        Dimension::Percent(p) => taffy::Dimension::Percent(p / 100.0),
    }
}

fn to_taffy_lpa(dim: Dimension) -> taffy::LengthPercentageAuto {
    match dim {
        Dimension::Auto => taffy::LengthPercentageAuto::Auto,
        Dimension::Length(px) => taffy::LengthPercentageAuto::Length(px),
        Dimension::Percent(p) => taffy::LengthPercentageAuto::Percent(p / 100.0),
    }
}

/// Padding has no auto in the box model; Auto collapses to zero.
fn to_taffy_lp(dim: Dimension) -> taffy::LengthPercentage {
    match dim {
        Dimension::Auto => taffy::LengthPercentage::Length(0.0),
        Dimension::Length(px) => taffy::LengthPercentage::Length(px),
        Dimension::Percent(p) => taffy::LengthPercentage::Percent(p / 100.0),
    }
}

fn to_taffy_lpa_rect(edges: Edges) -> taffy::Rect<taffy::LengthPercentageAuto> {
    taffy::Rect {
        top: to_taffy_lpa(edges.top),
        right: to_taffy_lpa(edges.right),
        bottom: to_taffy_lpa(edges.bottom),
        left: to_taffy_lpa(edges.left),
    }
}

fn to_taffy_lp_rect(edges: Edges) -> taffy::Rect<taffy::LengthPercentage> {
    taffy::Rect {
        top: to_taffy_lp(edges.top),
        right: to_taffy_lp(edges.right),
        bottom: to_taffy_lp(edges.bottom),
        left: to_taffy_lp(edges.left),
    }
}

fn to_taffy_position(position: PositionType) -> taffy::Position {
    match position {
        PositionType::Relative => taffy::Position::Relative,
        PositionType::Absolute => taffy::Position::Absolute,
    }
}

fn to_taffy_flex_direction(dir: FlexDirection) -> taffy::FlexDirection {
    match dir {
        FlexDirection::Column => taffy::FlexDirection::Column,
        FlexDirection::Row => taffy::FlexDirection::Row,
        FlexDirection::ColumnReverse => taffy::FlexDirection::ColumnReverse,
        FlexDirection::RowReverse => taffy::FlexDirection::RowReverse,
    }
}

fn to_taffy_flex_wrap(wrap: FlexWrap) -> taffy::FlexWrap {
    match wrap {
        FlexWrap::NoWrap => taffy::FlexWrap::NoWrap,
        FlexWrap::Wrap => taffy::FlexWrap::Wrap,
        FlexWrap::WrapReverse => taffy::FlexWrap::WrapReverse,
    }
}

fn to_taffy_justify_content(justify: JustifyContent) -> taffy::JustifyContent {
    match justify {
        JustifyContent::FlexStart => taffy::JustifyContent::FlexStart,
        JustifyContent::Center => taffy::JustifyContent::Center,
        JustifyContent::FlexEnd => taffy::JustifyContent::FlexEnd,
        JustifyContent::SpaceBetween => taffy::JustifyContent::SpaceBetween,
        JustifyContent::SpaceAround => taffy::JustifyContent::SpaceAround,
        JustifyContent::SpaceEvenly => taffy::JustifyContent::SpaceEvenly,
    }
}

fn to_taffy_align_items(align: AlignItems) -> taffy::AlignItems {
    match align {
        AlignItems::Stretch => taffy::AlignItems::Stretch,
        AlignItems::FlexStart => taffy::AlignItems::FlexStart,
        AlignItems::Center => taffy::AlignItems::Center,
        AlignItems::FlexEnd => taffy::AlignItems::FlexEnd,
        AlignItems::Baseline => taffy::AlignItems::Baseline,
    }
}

fn to_taffy_align_content(align: AlignContent) -> taffy::AlignContent {
    match align {
        AlignContent::Stretch => taffy::AlignContent::Stretch,
        AlignContent::FlexStart => taffy::AlignContent::FlexStart,
        AlignContent::Center => taffy::AlignContent::Center,
        AlignContent::FlexEnd => taffy::AlignContent::FlexEnd,
        AlignContent::SpaceBetween => taffy::AlignContent::SpaceBetween,
        AlignContent::SpaceAround => taffy::AlignContent::SpaceAround,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dimension_conversion() {
        assert!(matches!(
            to_taffy_dimension(Dimension::Auto),
            taffy::Dimension::Auto
        ));
        assert!(matches!(
            to_taffy_dimension(Dimension::Length(50.0)),
            taffy::Dimension::Length(px) if px == 50.0
        ));
        // Percent 50% -> 0.5
        if let taffy::Dimension::Percent(p) = to_taffy_dimension(Dimension::Percent(50.0)) {
            assert!((p - 0.5).abs() < 1e-6);
        } else {
            panic!("expected Percent variant");
        }
    }

    #[test]
    fn test_padding_auto_collapses_to_zero() {
        assert!(matches!(
            to_taffy_lp(Dimension::Auto),
            taffy::LengthPercentage::Length(px) if px == 0.0
        ));
    }

    #[test]
    fn test_to_taffy_carries_box_model() {
        let style = Style {
            width: Dimension::Length(200.0),
            padding: Edges::all(10.0),
            border: BorderWidths::all(2.0),
            gap: Gap { row: 4.0, column: 6.0 },
            ..Default::default()
        };
        let taffy_style = style.to_taffy();

        assert!(matches!(
            taffy_style.size.width,
            taffy::Dimension::Length(px) if px == 200.0
        ));
        assert!(matches!(
            taffy_style.padding.left,
            taffy::LengthPercentage::Length(px) if px == 10.0
        ));
        assert!(matches!(
            taffy_style.border.top,
            taffy::LengthPercentage::Length(px) if px == 2.0
        ));
        assert!(matches!(
            taffy_style.gap.width,
            taffy::LengthPercentage::Length(px) if px == 6.0
        ));
    }

    #[test]
    fn test_visual_properties_do_not_reach_the_engine() {
        let plain = Style::default();
        let tinted = Style {
            background_color: Some(Rgba::RED),
            color: Some(Rgba::WHITE),
            border_radius: 8.0,
            ..Default::default()
        };
        // Layout directives are identical when only visual fields differ.
        assert_eq!(format!("{:?}", plain.to_taffy()), format!("{:?}", tinted.to_taffy()));
    }

    #[test]
    fn test_default_margin_is_zero_not_auto() {
        let taffy_style = Style::default().to_taffy();
        for edge in [
            taffy_style.margin.top,
            taffy_style.margin.right,
            taffy_style.margin.bottom,
            taffy_style.margin.left,
        ] {
            assert!(matches!(edge, taffy::LengthPercentageAuto::Length(px) if px == 0.0));
        }
        // Inset keeps Auto so absolutely positioned nodes stay unconstrained
        // until the caller pins an edge.
        assert!(matches!(
            taffy_style.inset.top,
            taffy::LengthPercentageAuto::Auto
        ));
    }

    #[test]
    fn test_effective_font_defaults() {
        let style = Style::default();
        assert_eq!(style.effective_font_size(), DEFAULT_FONT_SIZE);
        assert_eq!(style.effective_font_family(), DEFAULT_FONT_FAMILY);
    }

}

//! Drawing types for trade annotations.

use replay_core::Timeframe;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Unique identifier for a drawing. Stored as a UUID string.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DrawingId(String);

impl DrawingId {
    /// Generate a new unique drawing ID.
    pub fn new() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for DrawingId {
    fn default() -> Self {
        Self::new()
    }
}

impl From<&str> for DrawingId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl fmt::Display for DrawingId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A point in chart space: display time (unix seconds) and price.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DrawingPoint {
    pub time: i64,
    pub price: f64,
}

impl DrawingPoint {
    pub fn new(time: i64, price: f64) -> Self {
        Self { time, price }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DrawingKind {
    /// Trendline between two points.
    Line,
    /// Horizontal level through one point.
    Horizontal,
    #[serde(rename = "rect")]
    Rectangle,
    Text,
    Fib,
}

impl DrawingKind {
    /// Number of points a complete drawing of this kind has.
    pub fn point_count(&self) -> usize {
        match self {
            DrawingKind::Horizontal | DrawingKind::Text => 1,
            DrawingKind::Line | DrawingKind::Rectangle | DrawingKind::Fib => 2,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LineStyle {
    #[default]
    Solid,
    Dashed,
    Dotted,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TextSize {
    S,
    M,
    L,
}

/// One retracement level of a fib drawing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FibLevel {
    pub value: f64,
    pub active: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub opacity: Option<f64>,
}

impl FibLevel {
    pub fn new(value: f64) -> Self {
        Self {
            value,
            active: true,
            color: None,
            opacity: None,
        }
    }
}

/// Default retracement levels for new fib drawings.
pub const DEFAULT_FIB_LEVELS: [f64; 7] = [0.0, 0.236, 0.382, 0.5, 0.618, 0.786, 1.0];

/// Default color for drawings.
pub const DEFAULT_DRAWING_COLOR: &str = "#2962ff";

/// Visual style of a drawing. Unset fields fall back to renderer defaults.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DrawingStyle {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub line_width: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub line_style: Option<LineStyle>,
    /// Line opacity, 0-100.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub opacity: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text_color: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text_size: Option<TextSize>,
    /// Anchor of the label inside the shape ("tl", "mc", "br", ...).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text_position: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub border_color: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub border_opacity: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fill_color: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fill_opacity: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fib_levels: Option<Vec<FibLevel>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extend_lines: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub show_prices: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub show_trendline: Option<bool>,
    /// Timeframe labels the drawing shows on; `None` means all.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub visible_timeframes: Option<Vec<String>>,
}

impl DrawingStyle {
    /// Overlay every field set in `other` onto this style.
    pub fn merge(&mut self, other: &DrawingStyle) {
        macro_rules! take {
            ($($field:ident),*) => {
                $(if other.$field.is_some() { self.$field = other.$field.clone(); })*
            };
        }
        take!(
            color,
            line_width,
            line_style,
            opacity,
            text_color,
            text_size,
            text_position,
            border_color,
            border_opacity,
            fill_color,
            fill_opacity,
            fib_levels,
            extend_lines,
            show_prices,
            show_trendline,
            visible_timeframes
        );
    }
}

/// One annotation owned by a trade.
///
/// Serialized as the camelCase JSON object the trade store keeps in its
/// `drawings` column.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DrawingObject {
    pub id: DrawingId,
    #[serde(rename = "type")]
    pub kind: DrawingKind,
    pub p1: DrawingPoint,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub p2: Option<DrawingPoint>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(flatten)]
    pub style: DrawingStyle,
}

impl DrawingObject {
    pub fn new(kind: DrawingKind, p1: DrawingPoint) -> Self {
        let mut style = DrawingStyle {
            color: Some(DEFAULT_DRAWING_COLOR.to_string()),
            line_width: Some(2.0),
            ..Default::default()
        };
        if kind == DrawingKind::Fib {
            style.fib_levels = Some(DEFAULT_FIB_LEVELS.iter().copied().map(FibLevel::new).collect());
        }
        Self {
            id: DrawingId::new(),
            kind,
            p1,
            p2: None,
            text: None,
            style,
        }
    }

    /// Two-point drawing (line, rectangle, fib).
    pub fn between(kind: DrawingKind, p1: DrawingPoint, p2: DrawingPoint) -> Self {
        let mut drawing = Self::new(kind, p1);
        drawing.p2 = Some(p2);
        drawing
    }

    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.text = Some(text.into());
        self
    }

    /// All points of the drawing in order.
    pub fn points(&self) -> Vec<DrawingPoint> {
        std::iter::once(self.p1).chain(self.p2).collect()
    }

    /// True once the drawing has every point its kind needs.
    pub fn is_complete(&self) -> bool {
        self.points().len() >= self.kind.point_count()
    }

    /// Move every point by the given delta.
    pub fn translate(&mut self, dt: i64, dprice: f64) {
        self.p1.time += dt;
        self.p1.price += dprice;
        if let Some(p2) = self.p2.as_mut() {
            p2.time += dt;
            p2.price += dprice;
        }
    }

    /// Whether the drawing should render on a viewport of `timeframe`.
    pub fn is_visible_on(&self, timeframe: Timeframe) -> bool {
        match &self.style.visible_timeframes {
            None => true,
            Some(labels) => labels
                .iter()
                .any(|label| label.parse::<Timeframe>().ok() == Some(timeframe)),
        }
    }
}

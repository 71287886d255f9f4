//! Trade annotations: drawing state, undo history and save scheduling.

pub mod history;
pub mod persistence;
pub mod types;

pub use history::History;
pub use persistence::PendingWrite;
pub use types::{
    DrawingId, DrawingKind, DrawingObject, DrawingPoint, DrawingStyle, FibLevel, LineStyle,
    TextSize, DEFAULT_DRAWING_COLOR, DEFAULT_FIB_LEVELS,
};

use replay_config::{AlignmentConfig, AnnotationConfig};
use replay_core::CandleBar;
use tokio::time::Instant;

use crate::viewport::snap_point;

/// Available drawing tools.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DrawingTool {
    #[default]
    None,
    Select,
    Line,
    Horizontal,
    Rectangle,
    Text,
    Fib,
}

impl DrawingTool {
    /// Kind of drawing this tool creates, if any.
    pub fn kind(&self) -> Option<DrawingKind> {
        match self {
            DrawingTool::None | DrawingTool::Select => None,
            DrawingTool::Line => Some(DrawingKind::Line),
            DrawingTool::Horizontal => Some(DrawingKind::Horizontal),
            DrawingTool::Rectangle => Some(DrawingKind::Rectangle),
            DrawingTool::Text => Some(DrawingKind::Text),
            DrawingTool::Fib => Some(DrawingKind::Fib),
        }
    }

    pub fn is_drawing_tool(&self) -> bool {
        self.kind().is_some()
    }
}

type Snapshot = Vec<DrawingObject>;

/// The drawings of one trade plus their undo history and pending save.
///
/// Completed edits are recorded in history and saved immediately. Undo and
/// redo only arm the debounce so a burst of changes ends in one write. A shape
/// being drawn or dragged lives outside history until it is committed.
#[derive(Debug)]
pub struct AnnotationLayer {
    history: History<Snapshot>,
    pending: PendingWrite<Snapshot>,
    live: Option<DrawingObject>,
    pub tool: DrawingTool,
    pub selected: Option<DrawingId>,
    /// Snap new points to the nearest bar's O/H/L/C.
    pub magnet_enabled: bool,
    magnet_tolerance_secs: i64,
}

impl AnnotationLayer {
    /// Create a layer over the drawings already saved for a trade.
    pub fn new(saved: Vec<DrawingObject>, annotations: &AnnotationConfig, alignment: &AlignmentConfig) -> Self {
        Self {
            pending: PendingWrite::new(saved.clone(), annotations.debounce()),
            history: History::new(saved),
            live: None,
            tool: DrawingTool::None,
            selected: None,
            magnet_enabled: false,
            magnet_tolerance_secs: alignment.magnet_tolerance_secs,
        }
    }

    /// Committed drawings.
    pub fn drawings(&self) -> &[DrawingObject] {
        self.history.present()
    }

    /// Drawing currently being placed or dragged.
    pub fn live(&self) -> Option<&DrawingObject> {
        self.live.as_ref()
    }

    /// Committed drawings with the live shape laid over them.
    pub fn rendered(&self) -> impl Iterator<Item = &DrawingObject> {
        let live = self.live.as_ref();
        let is_new = live.is_some_and(|l| self.get(&l.id).is_none());
        self.drawings()
            .iter()
            .map(move |d| match live {
                Some(l) if l.id == d.id => l,
                _ => d,
            })
            .chain(live.filter(|_| is_new))
    }

    pub fn get(&self, id: &DrawingId) -> Option<&DrawingObject> {
        self.drawings().iter().find(|d| &d.id == id)
    }

    pub fn set_tool(&mut self, tool: DrawingTool) {
        self.tool = tool;
        if tool != DrawingTool::Select {
            self.selected = None;
        }
    }

    pub fn toggle_magnet(&mut self) {
        self.magnet_enabled = !self.magnet_enabled;
    }

    pub fn select(&mut self, id: Option<DrawingId>) {
        self.selected = id.filter(|id| self.get(id).is_some());
    }

    /// Snap a point when the magnet is on.
    pub fn snap(&self, point: DrawingPoint, bars: &[CandleBar]) -> DrawingPoint {
        if !self.magnet_enabled {
            return point;
        }
        snap_point(point, bars, self.magnet_tolerance_secs)
    }

    /// Finish a drawing. Replaces an in-progress drawing with the same id.
    pub fn commit_draw(&mut self, drawing: DrawingObject) {
        self.live = None;
        let mut next = self.drawings().to_vec();
        match next.iter_mut().find(|d| d.id == drawing.id) {
            Some(existing) => *existing = drawing,
            None => next.push(drawing),
        }
        self.record(next);
    }

    /// Update a drawing while it is being dragged or placed.
    ///
    /// Neither history nor the saved state changes until [`Self::commit_draw`].
    pub fn update_in_progress(&mut self, drawing: DrawingObject) {
        self.live = Some(drawing);
    }

    /// Drop the live shape, leaving the committed drawings as they were.
    pub fn cancel_in_progress(&mut self) -> bool {
        self.live.take().is_some()
    }

    pub fn delete(&mut self, id: &DrawingId) -> bool {
        if self.get(id).is_none() {
            return false;
        }
        let next = self.drawings().iter().filter(|d| &d.id != id).cloned().collect();
        if self.selected.as_ref() == Some(id) {
            self.selected = None;
        }
        if self.live.as_ref().is_some_and(|l| &l.id == id) {
            self.live = None;
        }
        self.record(next);
        true
    }

    pub fn delete_selected(&mut self) -> bool {
        match self.selected.clone() {
            Some(id) => self.delete(&id),
            None => false,
        }
    }

    pub fn set_color(&mut self, id: &DrawingId, color: &str) -> bool {
        self.edit(id, |d| d.style.color = Some(color.to_string()))
    }

    pub fn set_width(&mut self, id: &DrawingId, width: f64) -> bool {
        self.edit(id, |d| d.style.line_width = Some(width))
    }

    /// Overlay the set fields of `style` onto a drawing.
    pub fn apply_style(&mut self, id: &DrawingId, style: &DrawingStyle) -> bool {
        self.edit(id, |d| d.style.merge(style))
    }

    pub fn clear_all(&mut self) -> bool {
        if self.drawings().is_empty() {
            return false;
        }
        self.selected = None;
        self.live = None;
        self.record(Vec::new());
        true
    }

    pub fn undo(&mut self) -> bool {
        self.live = None;
        let moved = self.history.undo();
        if moved {
            self.pending.schedule(self.drawings().to_vec());
        }
        moved
    }

    pub fn redo(&mut self) -> bool {
        self.live = None;
        let moved = self.history.redo();
        if moved {
            self.pending.schedule(self.drawings().to_vec());
        }
        moved
    }

    pub fn can_undo(&self) -> bool {
        self.history.can_undo()
    }

    pub fn can_redo(&self) -> bool {
        self.history.can_redo()
    }

    /// When the next save is due, if any.
    pub fn next_deadline(&self) -> Option<Instant> {
        self.pending.deadline()
    }

    /// Snapshot to save now, if one is due.
    pub fn poll_write(&mut self, now: Instant) -> Option<Vec<DrawingObject>> {
        self.pending.take_due(now)
    }

    /// Unsaved snapshot to flush before the layer goes away.
    pub fn teardown_write(&mut self) -> Option<Vec<DrawingObject>> {
        let current = self.drawings().to_vec();
        self.pending.take_for_teardown(&current)
    }

    pub fn mark_persisted(&mut self, drawings: Vec<DrawingObject>) {
        self.pending.mark_persisted(drawings);
    }

    fn edit(&mut self, id: &DrawingId, f: impl FnOnce(&mut DrawingObject)) -> bool {
        let mut next = self.drawings().to_vec();
        let Some(drawing) = next.iter_mut().find(|d| &d.id == id) else {
            return false;
        };
        f(drawing);
        self.record(next);
        true
    }

    fn record(&mut self, next: Snapshot) {
        self.pending.commit(next.clone());
        self.history.record_action(next);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn layer() -> AnnotationLayer {
        AnnotationLayer::new(Vec::new(), &AnnotationConfig::default(), &AlignmentConfig::default())
    }

    fn line() -> DrawingObject {
        DrawingObject::between(DrawingKind::Line, DrawingPoint::new(0, 1.0), DrawingPoint::new(60, 2.0))
    }

    #[tokio::test(start_paused = true)]
    async fn test_commit_draw_saves_immediately() {
        let mut layer = layer();
        let drawing = line();
        layer.commit_draw(drawing.clone());

        assert_eq!(layer.drawings(), &[drawing.clone()]);
        assert_eq!(layer.poll_write(Instant::now()), Some(vec![drawing]));
        assert!(layer.can_undo());
    }

    #[tokio::test(start_paused = true)]
    async fn test_undo_after_drawing_restores_empty() {
        let mut layer = layer();
        let mut drawing = line();
        let partial = drawing.clone();
        layer.update_in_progress(partial.clone());
        drawing.p2 = Some(DrawingPoint::new(120, 3.0));
        layer.update_in_progress(drawing.clone());

        assert!(layer.drawings().is_empty());
        assert_eq!(layer.rendered().collect::<Vec<_>>(), vec![&drawing]);

        layer.commit_draw(drawing.clone());
        assert!(layer.live().is_none());
        assert_eq!(layer.drawings(), &[drawing]);

        assert!(layer.undo());
        assert!(layer.drawings().is_empty());
        assert!(!layer.can_undo());
    }

    #[tokio::test(start_paused = true)]
    async fn test_undo_after_move_restores_original() {
        let mut layer = layer();
        let original = line();
        layer.commit_draw(original.clone());

        let mut moved = original.clone();
        moved.translate(60, 0.5);
        layer.update_in_progress(moved.clone());
        assert_eq!(layer.drawings(), &[original.clone()]);
        assert_eq!(layer.rendered().collect::<Vec<_>>(), vec![&moved]);

        moved.translate(60, 0.5);
        layer.update_in_progress(moved.clone());
        layer.commit_draw(moved.clone());
        assert_eq!(layer.drawings(), &[moved]);

        assert!(layer.undo());
        assert_eq!(layer.drawings(), &[original]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_drag_without_commit_is_not_saved() {
        let mut layer = layer();
        layer.update_in_progress(line());

        assert_eq!(layer.next_deadline(), None);
        tokio::time::advance(std::time::Duration::from_secs(2)).await;
        assert_eq!(layer.poll_write(Instant::now()), None);
        assert_eq!(layer.teardown_write(), None);

        assert!(layer.cancel_in_progress());
        assert_eq!(layer.rendered().count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_undo_is_debounced() {
        let mut layer = layer();
        let drawing = line();
        layer.commit_draw(drawing.clone());
        let saved = layer.poll_write(Instant::now()).unwrap();
        layer.mark_persisted(saved);

        assert!(layer.undo());
        assert_eq!(layer.poll_write(Instant::now()), None);

        tokio::time::advance(std::time::Duration::from_secs(1)).await;
        assert_eq!(layer.poll_write(Instant::now()), Some(Vec::new()));
    }

    #[tokio::test(start_paused = true)]
    async fn test_style_edits() {
        let mut layer = layer();
        let drawing = line();
        let id = drawing.id.clone();
        layer.commit_draw(drawing);

        assert!(layer.set_color(&id, "#00ff00"));
        assert!(layer.set_width(&id, 4.0));
        assert!(layer.apply_style(
            &id,
            &DrawingStyle {
                line_style: Some(LineStyle::Dotted),
                ..Default::default()
            }
        ));

        let style = &layer.get(&id).unwrap().style;
        assert_eq!(style.color.as_deref(), Some("#00ff00"));
        assert_eq!(style.line_width, Some(4.0));
        assert_eq!(style.line_style, Some(LineStyle::Dotted));

        assert!(!layer.set_color(&DrawingId::from("missing"), "#fff"));

        layer.undo();
        assert_eq!(layer.get(&id).unwrap().style.line_style, None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_delete_and_clear() {
        let mut layer = layer();
        let a = line();
        let b = line();
        layer.commit_draw(a.clone());
        layer.commit_draw(b.clone());

        layer.set_tool(DrawingTool::Select);
        layer.select(Some(a.id.clone()));
        assert!(layer.delete_selected());
        assert_eq!(layer.drawings(), &[b]);
        assert!(layer.selected.is_none());

        assert!(layer.clear_all());
        assert!(layer.drawings().is_empty());
        assert!(!layer.clear_all());

        layer.undo();
        assert_eq!(layer.drawings().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_teardown_flushes_unsaved() {
        let mut layer = layer();
        assert_eq!(layer.teardown_write(), None);

        let drawing = line();
        layer.commit_draw(drawing.clone());
        let saved = layer.poll_write(Instant::now()).unwrap();
        layer.mark_persisted(saved);
        assert!(layer.undo());
        assert_eq!(layer.teardown_write(), Some(Vec::new()));
    }

    #[test]
    fn test_select_unknown_id() {
        let mut layer = layer();
        layer.select(Some(DrawingId::from("nope")));
        assert!(layer.selected.is_none());
    }

    #[test]
    fn test_snap_only_with_magnet() {
        let mut layer = layer();
        let bars = vec![CandleBar::new(60, 10.0, 12.0, 9.0, 11.0)];
        let point = DrawingPoint::new(70, 11.8);

        assert_eq!(layer.snap(point, &bars), point);
        layer.toggle_magnet();
        assert_eq!(layer.snap(point, &bars), DrawingPoint::new(60, 12.0));
    }
}

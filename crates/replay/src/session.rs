//! Per-trade replay session.
//!
//! A session owns everything one open trade needs: the raw 1-minute series,
//! the alignment derived from it, the replay cursor, the annotation layer and
//! the chart viewports. Remote fetches run as spawned tasks that report back
//! over a channel tagged with the session generation; completions from an
//! older generation are dropped.

use candle_api::CandleQuery;
use replay_config::Config;
use replay_core::{CandleBar, CandleStore, SeriesKey, Timeframe};
use replay_sync::{CandleSource, SyncCoordinator, SyncOutcome, SyncSettings};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::time::Instant;

use crate::alignment::{local_tz_offset_seconds, AlignmentState};
use crate::drawing::{AnnotationLayer, DrawingObject};
use crate::error::{ReplayError, Result};
use crate::playback::PlaybackTimer;
use crate::replay::ReplayController;
use crate::trade::{ChartSurface, Patch, TimeRange, Trade, TradePatch, TradeStore, ViewLayout};
use crate::viewport::{
    backfill_window, go_to_trade_range, initial_fetch_window, should_backfill, ViewportId,
};

/// Completions and timer ticks delivered to a session.
#[derive(Debug)]
pub enum SessionEvent {
    PlaybackTick { generation: u64, epoch: u64 },
    BackfillLoaded { generation: u64, bars: Vec<CandleBar> },
    BackfillFailed { generation: u64, error: String },
    BackfillCooldownElapsed { generation: u64 },
}

impl SessionEvent {
    pub fn generation(&self) -> u64 {
        match self {
            SessionEvent::PlaybackTick { generation, .. }
            | SessionEvent::BackfillLoaded { generation, .. }
            | SessionEvent::BackfillFailed { generation, .. }
            | SessionEvent::BackfillCooldownElapsed { generation } => *generation,
        }
    }
}

/// Shared collaborators of every session.
#[derive(Clone)]
pub struct SessionContext {
    pub source: Arc<dyn CandleSource>,
    pub store: Arc<dyn TradeStore>,
    pub config: Config,
    /// Local UTC offset used by the alignment heuristic.
    pub tz_offset_seconds: i64,
}

impl SessionContext {
    pub fn new(source: Arc<dyn CandleSource>, store: Arc<dyn TradeStore>, config: Config) -> Self {
        Self {
            source,
            store,
            config,
            tz_offset_seconds: local_tz_offset_seconds(),
        }
    }

    pub fn with_tz_offset(mut self, seconds: i64) -> Self {
        self.tz_offset_seconds = seconds;
        self
    }
}

struct Viewport {
    surface: Box<dyn ChartSurface>,
    timeframe: Timeframe,
}

/// Replay of one trade.
pub struct ReplaySession {
    ctx: SessionContext,
    trade: Trade,
    key: SeriesKey,
    /// Raw bars as fetched. Alignment is applied on the way to the charts.
    candles: CandleStore,
    alignment: AlignmentState,
    controller: ReplayController,
    annotations: AnnotationLayer,
    main: Viewport,
    secondary: Option<Viewport>,
    generation: u64,
    fetching_more: bool,
    timer: PlaybackTimer,
    events_tx: mpsc::UnboundedSender<SessionEvent>,
    events_rx: mpsc::UnboundedReceiver<SessionEvent>,
}

impl ReplaySession {
    /// Open a trade: load it, fetch its initial window, align and frame it.
    pub async fn open(
        ctx: SessionContext,
        trade_id: &str,
        surface: Box<dyn ChartSurface>,
        timeframe: Timeframe,
    ) -> Result<Self> {
        let trade = ctx.store.get_trade(trade_id).await?;
        let (events_tx, events_rx) = mpsc::unbounded_channel();

        let mut session = Self {
            annotations: AnnotationLayer::new(
                trade.drawings.clone(),
                &ctx.config.annotations,
                &ctx.config.alignment,
            ),
            controller: ReplayController::new(&ctx.config.replay),
            key: SeriesKey::base(trade.instrument.as_str()),
            trade,
            candles: CandleStore::new(),
            alignment: AlignmentState::identity(),
            main: Viewport { surface, timeframe },
            secondary: None,
            generation: 0,
            fetching_more: false,
            timer: PlaybackTimer::new(),
            events_tx,
            events_rx,
            ctx,
        };
        session.load().await?;
        Ok(session)
    }

    /// Reset per-trade state and fetch the initial window.
    async fn load(&mut self) -> Result<()> {
        self.generation += 1;
        self.timer.stop();
        self.fetching_more = false;
        self.controller = ReplayController::new(&self.ctx.config.replay);
        self.candles.clear();
        self.alignment = AlignmentState::identity();
        self.key = SeriesKey::base(self.trade.instrument.as_str());
        self.annotations = AnnotationLayer::new(
            self.trade.drawings.clone(),
            &self.ctx.config.annotations,
            &self.ctx.config.alignment,
        );

        let (from, to) = initial_fetch_window(self.trade.exit_time, self.main.timeframe);
        log::info!(
            "Loading {} for trade {} [{}, {}]",
            self.trade.instrument,
            self.trade.id,
            from,
            to
        );
        let query = CandleQuery::new(self.trade.instrument.as_str(), from, to, Timeframe::Min1);
        let bars = match self.ctx.source.fetch(&query).await {
            Ok(bars) => bars,
            Err(e) => {
                log::error!("Replay data fetch failed for {}: {}", self.trade.id, e);
                self.render();
                return Err(e.into());
            }
        };

        self.candles.merge_into(&self.key, &bars);
        if self.candles.get(&self.key).is_empty() {
            self.render();
            return Err(ReplayError::NoData(self.trade.instrument.clone()));
        }

        self.alignment = AlignmentState::detect(
            self.candles.get(&self.key),
            self.trade.entry_time(),
            self.trade.entry_price,
            self.ctx.tz_offset_seconds,
            self.ctx.config.alignment.sanity_threshold_secs,
        );

        self.render();
        self.go_to_trade();
        Ok(())
    }

    pub fn trade(&self) -> &Trade {
        &self.trade
    }

    pub fn alignment(&self) -> &AlignmentState {
        &self.alignment
    }

    pub fn controller(&self) -> &ReplayController {
        &self.controller
    }

    pub fn annotations(&self) -> &AnnotationLayer {
        &self.annotations
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn is_fetching_more(&self) -> bool {
        self.fetching_more
    }

    pub fn layout(&self) -> ViewLayout {
        if self.secondary.is_some() {
            ViewLayout::Split
        } else {
            ViewLayout::Single
        }
    }

    /// Raw cached bars of the trade's instrument.
    pub fn raw_bars(&self) -> &[CandleBar] {
        self.candles.get(&self.key)
    }

    /// Aligned 1-minute bars, uncut.
    pub fn base_bars(&self) -> Vec<CandleBar> {
        self.alignment.apply_all(self.candles.get(&self.key))
    }

    pub fn timeframe(&self, viewport: ViewportId) -> Option<Timeframe> {
        self.viewport(viewport).map(|vp| vp.timeframe)
    }

    /// Bars a viewport currently shows.
    pub fn display_bars(&self, viewport: ViewportId) -> Vec<CandleBar> {
        match self.viewport(viewport) {
            Some(vp) => self.controller.display_bars(&self.base_bars(), vp.timeframe),
            None => Vec::new(),
        }
    }

    /// Drawings shown on a viewport.
    pub fn visible_drawings(&self, viewport: ViewportId) -> Vec<&DrawingObject> {
        let Some(timeframe) = self.timeframe(viewport) else {
            return Vec::new();
        };
        self.annotations
            .rendered()
            .filter(|d| d.is_visible_on(timeframe))
            .collect()
    }

    fn viewport(&self, id: ViewportId) -> Option<&Viewport> {
        match id {
            ViewportId::Main => Some(&self.main),
            ViewportId::Secondary => self.secondary.as_ref(),
        }
    }

    fn viewport_mut(&mut self, id: ViewportId) -> Option<&mut Viewport> {
        match id {
            ViewportId::Main => Some(&mut self.main),
            ViewportId::Secondary => self.secondary.as_mut(),
        }
    }

    /// Push the current bars to every viewport.
    pub fn render(&mut self) {
        let base = self.base_bars();
        let main = self.controller.display_bars(&base, self.main.timeframe);
        self.main.surface.set_data(&main);

        if let Some(secondary) = self.secondary.as_mut() {
            let bars = if secondary.timeframe == self.main.timeframe {
                main
            } else {
                self.controller.display_bars(&base, secondary.timeframe)
            };
            secondary.surface.set_data(&bars);
        }
    }

    /// Frame the trade in every viewport, honouring saved ranges.
    pub fn go_to_trade(&mut self) {
        if self.candles.get(&self.key).is_empty() {
            return;
        }
        let config = &self.ctx.config.replay;
        let main = go_to_trade_range(ViewportId::Main, &self.trade, &self.alignment, config);
        self.main.surface.set_visible_range(main);

        if let Some(secondary) = self.secondary.as_mut() {
            let range =
                go_to_trade_range(ViewportId::Secondary, &self.trade, &self.alignment, config);
            secondary.surface.set_visible_range(range);
        }
    }

    /// Show a second viewport. Defaults to the trade's saved timeframe.
    pub fn attach_secondary(&mut self, surface: Box<dyn ChartSurface>, timeframe: Option<Timeframe>) {
        let timeframe = timeframe
            .or(self.trade.mini_view_secondary_timeframe)
            .unwrap_or(Timeframe::Hour1);
        self.secondary = Some(Viewport { surface, timeframe });
        self.render();

        if !self.candles.get(&self.key).is_empty() {
            let range = go_to_trade_range(
                ViewportId::Secondary,
                &self.trade,
                &self.alignment,
                &self.ctx.config.replay,
            );
            if let Some(secondary) = self.secondary.as_mut() {
                secondary.surface.set_visible_range(range);
            }
        }
    }

    pub fn detach_secondary(&mut self) -> Option<Box<dyn ChartSurface>> {
        self.secondary.take().map(|vp| vp.surface)
    }

    pub fn set_timeframe(&mut self, viewport: ViewportId, timeframe: Timeframe) {
        if let Some(vp) = self.viewport_mut(viewport) {
            vp.timeframe = timeframe;
            self.render();
        }
    }

    /// React to a viewport scroll. Returns true if a backfill was started.
    pub fn on_visible_range_changed(&mut self, viewport: ViewportId, range: TimeRange) -> bool {
        if self.fetching_more {
            return false;
        }
        let Some(timeframe) = self.timeframe(viewport) else {
            return false;
        };
        let Some(first_raw) = self.candles.oldest_time(&self.key) else {
            return false;
        };

        let base = self.base_bars();
        if !should_backfill(range, &base, self.ctx.config.replay.backfill_quartile) {
            return false;
        }

        let lookback = self.ctx.config.replay.backfill_lookback_secs(timeframe.label());
        let (from, to) = backfill_window(first_raw, lookback);
        let query = CandleQuery::new(self.trade.instrument.as_str(), from, to, Timeframe::Min1)
            .cache_only();

        log::debug!("Backfilling {} [{}, {}]", self.trade.instrument, from, to);
        self.fetching_more = true;

        let source = self.ctx.source.clone();
        let tx = self.events_tx.clone();
        let generation = self.generation;
        tokio::spawn(async move {
            let event = match source.fetch(&query).await {
                Ok(bars) => SessionEvent::BackfillLoaded { generation, bars },
                Err(e) => SessionEvent::BackfillFailed {
                    generation,
                    error: e.to_string(),
                },
            };
            let _ = tx.send(event);
        });
        true
    }

    /// Apply one event. Events from an older generation are ignored.
    ///
    /// Returns true if the event was applied.
    pub fn handle_event(&mut self, event: SessionEvent) -> bool {
        if event.generation() != self.generation {
            log::debug!(
                "Dropping stale event from generation {} (now {})",
                event.generation(),
                self.generation
            );
            return false;
        }

        match event {
            SessionEvent::PlaybackTick { epoch, .. } => {
                if epoch != self.timer.epoch() || !self.timer.is_running() {
                    log::debug!("Dropping tick from timer epoch {}", epoch);
                    return false;
                }
                let base = self.base_bars();
                if self.controller.tick(&base) {
                    self.render();
                }
                if !self.controller.playing {
                    self.timer.stop();
                }
            }
            SessionEvent::BackfillLoaded { bars, .. } => {
                let added = self.candles.merge_into(&self.key, &bars);
                log::debug!("Backfill added {} bars", added);
                if added > 0 {
                    self.render();
                }
                self.start_cooldown();
            }
            SessionEvent::BackfillFailed { error, .. } => {
                log::warn!("Failed to load more data: {}", error);
                self.start_cooldown();
            }
            SessionEvent::BackfillCooldownElapsed { .. } => {
                self.fetching_more = false;
            }
        }
        true
    }

    fn start_cooldown(&self) {
        let tx = self.events_tx.clone();
        let generation = self.generation;
        let cooldown = self.ctx.config.replay.backfill_cooldown();
        tokio::spawn(async move {
            tokio::time::sleep(cooldown).await;
            let _ = tx.send(SessionEvent::BackfillCooldownElapsed { generation });
        });
    }

    /// Wait for the next event or annotation save deadline and process it.
    pub async fn pump(&mut self) {
        let deadline = self.annotations.next_deadline();
        let save_due = async move {
            match deadline {
                Some(deadline) => tokio::time::sleep_until(deadline).await,
                None => std::future::pending().await,
            }
        };

        tokio::select! {
            Some(event) = self.events_rx.recv() => {
                self.handle_event(event);
            }
            _ = save_due => {
                self.flush_annotations().await;
            }
        }
    }

    pub fn play(&mut self) -> bool {
        if !self.controller.play() {
            return false;
        }
        self.timer
            .start(self.controller.speed_ms, self.generation, self.events_tx.clone());
        true
    }

    pub fn pause(&mut self) {
        self.controller.pause();
        self.timer.stop();
    }

    /// Change playback speed. Re-arms the timer while playing.
    pub fn set_speed(&mut self, speed_ms: u64) -> u64 {
        let speed = self.controller.set_speed(speed_ms);
        if self.controller.playing {
            self.timer.start(speed, self.generation, self.events_tx.clone());
        }
        speed
    }

    pub fn step_forward(&mut self) -> bool {
        let moved = self.controller.step_forward(&self.base_bars());
        if moved {
            self.render();
        }
        moved
    }

    pub fn step_backward(&mut self) -> bool {
        let moved = self.controller.step_backward(&self.base_bars());
        if moved {
            self.render();
        }
        moved
    }

    /// Cut the charts at a display time.
    pub fn cut(&mut self, time: i64) {
        self.controller.cut(time);
        self.render();
    }

    pub fn go_live(&mut self) {
        self.controller.go_live();
        self.timer.stop();
        self.render();
    }

    /// Fetch everything between the newest cached bar and now.
    pub async fn bridge_gap(&mut self) -> Result<SyncOutcome> {
        let coordinator = SyncCoordinator::new(
            self.ctx.source.clone(),
            SyncSettings::from(&self.ctx.config.sync),
        );
        let outcome = coordinator
            .sync_incremental(&mut self.candles, &self.trade.instrument)
            .await
            .map_err(|e| ReplayError::Fetch(format!("{e:#}")))?;
        if matches!(outcome, SyncOutcome::Synced { stored, .. } if stored > 0) {
            self.render();
        }
        Ok(outcome)
    }

    /// Edit the drawings and save any change that is due right away.
    pub async fn edit_annotations<R>(&mut self, edit: impl FnOnce(&mut AnnotationLayer) -> R) -> R {
        let result = edit(&mut self.annotations);
        self.flush_annotations().await;
        result
    }

    /// Write the pending drawings if their deadline has passed.
    pub async fn flush_annotations(&mut self) -> bool {
        match self.annotations.poll_write(Instant::now()) {
            Some(drawings) => self.persist_drawings(drawings).await,
            None => false,
        }
    }

    async fn persist_drawings(&mut self, drawings: Vec<DrawingObject>) -> bool {
        match self
            .ctx
            .store
            .update_trade_drawings(&self.trade.id, &drawings)
            .await
        {
            Ok(()) => {
                log::debug!("Saved {} drawings for {}", drawings.len(), self.trade.id);
                self.trade.drawings = drawings.clone();
                self.annotations.mark_persisted(drawings);
                true
            }
            Err(e) => {
                log::error!("Failed to save drawings for {}: {}", self.trade.id, e);
                false
            }
        }
    }

    /// Save the current viewport ranges and layout to the trade.
    pub async fn save_view(&mut self) -> Result<()> {
        let mut patch = TradePatch {
            mini_view_layout: Patch::Set(self.layout()),
            ..Default::default()
        };
        if let Some(range) = self.main.surface.visible_range() {
            patch.mini_view_range = Patch::Set(range);
        }
        if let Some(secondary) = &self.secondary {
            patch.mini_view_secondary_timeframe = Patch::Set(secondary.timeframe);
            if let Some(range) = secondary.surface.visible_range() {
                patch.mini_view_secondary_range = Patch::Set(range);
            }
        }
        self.update_trade(patch).await
    }

    /// Forget the saved view and frame the trade again.
    pub async fn clear_view(&mut self) -> Result<()> {
        let patch = TradePatch {
            mini_view_range: Patch::Clear,
            mini_view_secondary_range: Patch::Clear,
            mini_view_layout: Patch::Clear,
            mini_view_secondary_timeframe: Patch::Clear,
        };
        self.update_trade(patch).await?;
        self.go_to_trade();
        Ok(())
    }

    async fn update_trade(&mut self, patch: TradePatch) -> Result<()> {
        if let Err(e) = self.ctx.store.update_trade(&self.trade.id, patch.clone()).await {
            log::error!("Failed to save view for {}: {}", self.trade.id, e);
            return Err(e.into());
        }
        patch.apply_to(&mut self.trade);
        Ok(())
    }

    /// Replace the open trade. Unsaved drawings of the old one are flushed.
    pub async fn switch_trade(&mut self, trade_id: &str) -> Result<()> {
        self.flush_on_teardown().await;
        let trade = self.ctx.store.get_trade(trade_id).await?;
        self.trade = trade;
        self.load().await
    }

    /// Stop playback, drop pending completions and flush unsaved drawings.
    pub async fn close(mut self) {
        self.generation += 1;
        self.timer.stop();
        self.flush_on_teardown().await;
    }

    async fn flush_on_teardown(&mut self) {
        if let Some(drawings) = self.annotations.teardown_write() {
            self.persist_drawings(drawings).await;
        }
    }
}

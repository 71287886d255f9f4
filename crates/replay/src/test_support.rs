//! In-memory collaborators for session tests.

use async_trait::async_trait;
use candle_api::CandleQuery;
use replay_core::CandleBar;
use replay_sync::{CandleSource, FetchError};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use crate::drawing::DrawingObject;
use crate::trade::{ChartSurface, StoreError, TimeRange, Trade, TradePatch, TradeStore};

/// Serves bars from a fixed series and records every query.
#[derive(Default)]
pub struct MockSource {
    pub bars: Mutex<Vec<CandleBar>>,
    pub calls: Mutex<Vec<CandleQuery>>,
    pub fail: AtomicBool,
}

impl MockSource {
    pub fn new(bars: Vec<CandleBar>) -> Arc<Self> {
        Arc::new(Self {
            bars: Mutex::new(bars),
            ..Default::default()
        })
    }

    pub fn calls(&self) -> Vec<CandleQuery> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl CandleSource for MockSource {
    async fn fetch(&self, query: &CandleQuery) -> Result<Vec<CandleBar>, FetchError> {
        self.calls.lock().unwrap().push(query.clone());
        if self.fail.load(Ordering::SeqCst) {
            return Err(FetchError::Remote(candle_api::Error::Timeout));
        }
        Ok(self
            .bars
            .lock()
            .unwrap()
            .iter()
            .filter(|bar| bar.time >= query.from && bar.time <= query.to)
            .copied()
            .collect())
    }
}

/// Holds trades in memory and records drawing writes.
#[derive(Default)]
pub struct MockStore {
    pub trades: Mutex<Vec<Trade>>,
    pub drawing_writes: Mutex<Vec<Vec<DrawingObject>>>,
    pub patches: Mutex<Vec<TradePatch>>,
    pub fail_saves: AtomicBool,
}

impl MockStore {
    pub fn new(trades: Vec<Trade>) -> Arc<Self> {
        Arc::new(Self {
            trades: Mutex::new(trades),
            ..Default::default()
        })
    }

    pub fn writes(&self) -> Vec<Vec<DrawingObject>> {
        self.drawing_writes.lock().unwrap().clone()
    }
}

#[async_trait]
impl TradeStore for MockStore {
    async fn get_trade(&self, id: &str) -> Result<Trade, StoreError> {
        self.trades
            .lock()
            .unwrap()
            .iter()
            .find(|t| t.id == id)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(id.to_string()))
    }

    async fn update_trade(&self, id: &str, patch: TradePatch) -> Result<(), StoreError> {
        if self.fail_saves.load(Ordering::SeqCst) {
            return Err(StoreError::Backend("offline".into()));
        }
        self.patches.lock().unwrap().push(patch.clone());
        let mut trades = self.trades.lock().unwrap();
        let trade = trades
            .iter_mut()
            .find(|t| t.id == id)
            .ok_or_else(|| StoreError::NotFound(id.to_string()))?;
        patch.apply_to(trade);
        Ok(())
    }

    async fn update_trade_drawings(
        &self,
        id: &str,
        drawings: &[DrawingObject],
    ) -> Result<(), StoreError> {
        if self.fail_saves.load(Ordering::SeqCst) {
            return Err(StoreError::Backend("offline".into()));
        }
        self.drawing_writes.lock().unwrap().push(drawings.to_vec());
        if let Some(trade) = self.trades.lock().unwrap().iter_mut().find(|t| t.id == id) {
            trade.drawings = drawings.to_vec();
        }
        Ok(())
    }
}

#[derive(Debug, Default)]
pub struct SurfaceState {
    pub data: Vec<CandleBar>,
    pub visible: Option<TimeRange>,
    pub set_data_calls: usize,
}

/// Chart surface whose state stays readable after it is boxed.
#[derive(Clone, Default)]
pub struct MockSurface(pub Arc<Mutex<SurfaceState>>);

impl MockSurface {
    pub fn new() -> (Box<dyn ChartSurface>, Arc<Mutex<SurfaceState>>) {
        let surface = MockSurface::default();
        let state = surface.0.clone();
        (Box::new(surface), state)
    }
}

impl ChartSurface for MockSurface {
    fn set_data(&mut self, bars: &[CandleBar]) {
        let mut state = self.0.lock().unwrap();
        state.data = bars.to_vec();
        state.set_data_calls += 1;
    }

    fn visible_range(&self) -> Option<TimeRange> {
        self.0.lock().unwrap().visible
    }

    fn set_visible_range(&mut self, range: TimeRange) {
        self.0.lock().unwrap().visible = Some(range);
    }
}

/// Flat minute bars closing at `close`.
pub fn minute_bars(start: i64, count: i64, close: f64) -> Vec<CandleBar> {
    (0..count)
        .map(|i| CandleBar::new(start + i * 60, close, close + 0.5, close - 0.5, close))
        .collect()
}

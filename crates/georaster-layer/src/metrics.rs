//! Render metrics collection.
//!
//! A [`RenderMetrics`] is shared (`Arc`) between a layer and every tile task
//! it spawns. Counters are kept locally for snapshots and mirrored to the
//! `metrics` facade for whatever recorder the host installs.

use metrics::{counter, histogram};
use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;
use tokio::sync::RwLock;

/// Metrics collector for tile renders.
#[derive(Debug)]
pub struct RenderMetrics {
    /// Tile lifecycle counts
    pub tiles_started: AtomicU64,
    pub tiles_completed: AtomicU64,
    pub tiles_failed: AtomicU64,
    /// Tiles finished without sampling because they miss the raster
    pub tiles_skipped: AtomicU64,

    /// Sampling stats
    pub cells_sampled: AtomicU64,
    pub cells_painted: AtomicU64,
    pub provider_fetches: AtomicU64,
    pub provider_errors: AtomicU64,

    /// Timing stats (microseconds)
    render_times: RwLock<TimingStats>,
    fetch_times: RwLock<TimingStats>,
}

#[derive(Debug, Default)]
struct TimingStats {
    count: u64,
    total_us: u64,
    min_us: u64,
    max_us: u64,
    last_us: u64,
}

impl TimingStats {
    fn record(&mut self, duration_us: u64) {
        self.count += 1;
        self.total_us += duration_us;
        self.last_us = duration_us;
        if self.min_us == 0 || duration_us < self.min_us {
            self.min_us = duration_us;
        }
        if duration_us > self.max_us {
            self.max_us = duration_us;
        }
    }

    fn avg_ms(&self) -> f64 {
        if self.count == 0 {
            0.0
        } else {
            (self.total_us as f64 / self.count as f64) / 1000.0
        }
    }

    fn max_ms(&self) -> f64 {
        self.max_us as f64 / 1000.0
    }
}

impl RenderMetrics {
    pub fn new() -> Self {
        Self {
            tiles_started: AtomicU64::new(0),
            tiles_completed: AtomicU64::new(0),
            tiles_failed: AtomicU64::new(0),
            tiles_skipped: AtomicU64::new(0),
            cells_sampled: AtomicU64::new(0),
            cells_painted: AtomicU64::new(0),
            provider_fetches: AtomicU64::new(0),
            provider_errors: AtomicU64::new(0),
            render_times: RwLock::new(TimingStats::default()),
            fetch_times: RwLock::new(TimingStats::default()),
        }
    }

    pub fn record_tile_started(&self) {
        self.tiles_started.fetch_add(1, Ordering::Relaxed);
        counter!("georaster_tiles_total").increment(1);
    }

    pub fn record_tile_failed(&self) {
        self.tiles_failed.fetch_add(1, Ordering::Relaxed);
        counter!("georaster_tile_errors_total").increment(1);
    }

    pub fn record_tile_skipped(&self) {
        self.tiles_skipped.fetch_add(1, Ordering::Relaxed);
        counter!("georaster_tiles_skipped_total").increment(1);
    }

    /// Record a completed tile render
    pub async fn record_render(&self, duration_us: u64, sampled: u64, painted: u64) {
        self.tiles_completed.fetch_add(1, Ordering::Relaxed);
        self.cells_sampled.fetch_add(sampled, Ordering::Relaxed);
        self.cells_painted.fetch_add(painted, Ordering::Relaxed);
        counter!("georaster_cells_painted_total").increment(painted);
        histogram!("georaster_tile_render_ms").record(duration_us as f64 / 1000.0);

        let mut times = self.render_times.write().await;
        times.record(duration_us);
    }

    /// Record a windowed provider read
    pub async fn record_fetch(&self, duration_us: u64, success: bool) {
        self.provider_fetches.fetch_add(1, Ordering::Relaxed);
        counter!("georaster_provider_fetches_total").increment(1);
        if !success {
            self.provider_errors.fetch_add(1, Ordering::Relaxed);
            counter!("georaster_provider_errors_total").increment(1);
        }
        histogram!("georaster_provider_fetch_ms").record(duration_us as f64 / 1000.0);

        let mut times = self.fetch_times.write().await;
        times.record(duration_us);
    }

    /// Get a snapshot of current metrics
    pub async fn snapshot(&self) -> MetricsSnapshot {
        let render = self.render_times.read().await;
        let fetch = self.fetch_times.read().await;

        MetricsSnapshot {
            tiles_started: self.tiles_started.load(Ordering::Relaxed),
            tiles_completed: self.tiles_completed.load(Ordering::Relaxed),
            tiles_failed: self.tiles_failed.load(Ordering::Relaxed),
            tiles_skipped: self.tiles_skipped.load(Ordering::Relaxed),
            cells_sampled: self.cells_sampled.load(Ordering::Relaxed),
            cells_painted: self.cells_painted.load(Ordering::Relaxed),
            provider_fetches: self.provider_fetches.load(Ordering::Relaxed),
            provider_errors: self.provider_errors.load(Ordering::Relaxed),
            render_avg_ms: render.avg_ms(),
            render_max_ms: render.max_ms(),
            fetch_avg_ms: fetch.avg_ms(),
        }
    }
}

impl Default for RenderMetrics {
    fn default() -> Self {
        Self::new()
    }
}

/// Point-in-time copy of [`RenderMetrics`].
#[derive(Debug, Clone, Serialize)]
pub struct MetricsSnapshot {
    pub tiles_started: u64,
    pub tiles_completed: u64,
    pub tiles_failed: u64,
    pub tiles_skipped: u64,
    pub cells_sampled: u64,
    pub cells_painted: u64,
    pub provider_fetches: u64,
    pub provider_errors: u64,
    pub render_avg_ms: f64,
    pub render_max_ms: f64,
    pub fetch_avg_ms: f64,
}

/// Timer guard for measuring operation duration.
pub struct Timer {
    start: Instant,
}

impl Timer {
    pub fn start() -> Self {
        Self {
            start: Instant::now(),
        }
    }

    pub fn elapsed_us(&self) -> u64 {
        self.start.elapsed().as_micros() as u64
    }
}

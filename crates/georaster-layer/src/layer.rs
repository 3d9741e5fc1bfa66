//! The layer controller: construction, bounds and tile requests.
//!
//! Tile requests are two-phase. The surface is created and handed back
//! synchronously; the fill runs later on a tokio task that first yields to
//! the scheduler, so the caller regains control before any sampling work
//! starts. Completion is reported exactly once, through a callback
//! ([`TileProvider::create_tile`]) or a future ([`TileHandle::ready`]).

use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures::FutureExt;
use raster_common::{BoundingBox, ColorScale, TileCoord, TileSize};
use renderer::{
    shared_surface, ColorStrategy, NormalizationWindow, SharedSurface, Surface, TileCanvas,
    WindowSource,
};
use tokio::runtime::Handle;
use tokio::sync::oneshot;
use tracing::{error, info, warn};

use crate::config::{LayerOptions, DEFAULT_NO_STATS_WINDOW};
use crate::error::{LayerError, Result};
use crate::metrics::RenderMetrics;
use crate::projection::{MapProjection, WebMercator};
use crate::render::{TileRenderer, TileReport};
use crate::sampler::{RegionSampler, SamplingGrid, SamplingMode};
use crate::summary::GeoRaster;

/// Creates a blank surface for each requested tile.
pub trait SurfaceFactory<S: Surface>: Send + Sync {
    fn create(&self, size: TileSize) -> S;
}

impl<S, F> SurfaceFactory<S> for F
where
    S: Surface,
    F: Fn(TileSize) -> S + Send + Sync,
{
    fn create(&self, size: TileSize) -> S {
        self(size)
    }
}

/// Produces transparent in-memory [`TileCanvas`] surfaces.
#[derive(Debug, Clone, Copy, Default)]
pub struct CanvasFactory;

impl SurfaceFactory<TileCanvas> for CanvasFactory {
    fn create(&self, size: TileSize) -> TileCanvas {
        TileCanvas::new(size.width, size.height)
    }
}

/// Completion callback: error indicator (if any) and the filled surface.
pub type TileCallback<S> = Box<dyn FnOnce(Option<LayerError>, SharedSurface<S>) + Send>;

/// What a host map needs from a tile layer.
pub trait TileProvider<S: Surface> {
    /// Geographic extent, for viewport fitting.
    fn bounds(&self) -> BoundingBox;

    fn tile_size(&self) -> TileSize;

    /// Return the tile's surface immediately and fill it asynchronously,
    /// calling `on_complete` exactly once when done.
    fn create_tile(&self, coord: TileCoord, on_complete: TileCallback<S>) -> SharedSurface<S>;
}

#[derive(Debug, Clone)]
enum LayerState {
    Ready(Arc<TileRenderer>),
    Degraded(String),
}

/// Calls the completion function exactly once: with the task's result, or
/// with `TaskFailed` if the task is dropped first.
struct Completion<F: FnOnce(Result<TileReport>)> {
    done: Option<F>,
}

impl<F: FnOnce(Result<TileReport>)> Completion<F> {
    fn new(done: F) -> Self {
        Self { done: Some(done) }
    }

    fn complete(mut self, result: Result<TileReport>) {
        if let Some(done) = self.done.take() {
            done(result);
        }
    }
}

impl<F: FnOnce(Result<TileReport>)> Drop for Completion<F> {
    fn drop(&mut self) {
        if let Some(done) = self.done.take() {
            done(Err(LayerError::task_failed(
                "render task dropped before completing",
            )));
        }
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        format!("render task panicked: {}", s)
    } else if let Some(s) = panic.downcast_ref::<String>() {
        format!("render task panicked: {}", s)
    } else {
        "render task panicked".to_string()
    }
}

/// A tile whose surface exists and whose fill may still be running.
pub struct TileHandle<S: Surface = TileCanvas> {
    pub coord: TileCoord,
    surface: SharedSurface<S>,
    rx: oneshot::Receiver<Result<TileReport>>,
}

impl<S: Surface> TileHandle<S> {
    /// The surface being filled; safe to attach to the host before `ready`.
    pub fn surface(&self) -> &SharedSurface<S> {
        &self.surface
    }

    /// Wait for the fill to finish.
    pub async fn ready(self) -> Result<SharedSurface<S>> {
        self.finish().await.map(|(surface, _)| surface)
    }

    /// Wait for the fill to finish, returning its render report as well.
    pub async fn finish(self) -> Result<(SharedSurface<S>, TileReport)> {
        match self.rx.await {
            Ok(Ok(report)) => Ok((self.surface, report)),
            Ok(Err(e)) => Err(e),
            Err(_) => Err(LayerError::task_failed("render task dropped before completing")),
        }
    }
}

/// Builder for [`GeoRasterLayer`].
pub struct LayerBuilder<S: Surface = TileCanvas> {
    raster: GeoRaster,
    options: LayerOptions,
    projection: Arc<dyn MapProjection>,
    surfaces: Arc<dyn SurfaceFactory<S>>,
    metrics: Arc<RenderMetrics>,
}

impl LayerBuilder<TileCanvas> {
    pub fn new(raster: GeoRaster, options: LayerOptions) -> Self {
        Self {
            raster,
            options,
            projection: Arc::new(WebMercator),
            surfaces: Arc::new(CanvasFactory),
            metrics: Arc::new(RenderMetrics::new()),
        }
    }
}

impl<S: Surface> LayerBuilder<S> {
    /// Host map projection (Web Mercator by default).
    pub fn projection(mut self, projection: Arc<dyn MapProjection>) -> Self {
        self.projection = projection;
        self
    }

    /// Shared metrics collector.
    pub fn metrics(mut self, metrics: Arc<RenderMetrics>) -> Self {
        self.metrics = metrics;
        self
    }

    /// Use a different surface type for tiles.
    pub fn surface_factory<T: Surface>(self, factory: impl SurfaceFactory<T> + 'static) -> LayerBuilder<T> {
        LayerBuilder {
            raster: self.raster,
            options: self.options,
            projection: self.projection,
            surfaces: Arc::new(factory),
            metrics: self.metrics,
        }
    }

    /// Build, failing on malformed options or raster summary.
    pub fn try_build(self) -> Result<GeoRasterLayer<S>> {
        let renderer = init_renderer(
            &self.raster,
            &self.options,
            self.projection.clone(),
            self.metrics.clone(),
        )?;
        Ok(self.assemble(LayerState::Ready(Arc::new(renderer))))
    }

    /// Build without failing. Initialization errors are logged and leave the
    /// layer degraded: it still reports bounds, and every tile completes
    /// with [`LayerError::Degraded`].
    pub fn build(self) -> GeoRasterLayer<S> {
        match init_renderer(
            &self.raster,
            &self.options,
            self.projection.clone(),
            self.metrics.clone(),
        ) {
            Ok(renderer) => self.assemble(LayerState::Ready(Arc::new(renderer))),
            Err(e) => {
                error!(error = %e, "Layer initialization failed, layer is degraded");
                self.assemble(LayerState::Degraded(e.to_string()))
            }
        }
    }

    fn assemble(self, state: LayerState) -> GeoRasterLayer<S> {
        GeoRasterLayer {
            state,
            bounds: self.raster.summary.bounds(),
            tile_size: self.options.tile_size(),
            keep_buffer: self.options.keep_buffer,
            update_when_zooming: self.options.update_when_zooming,
            surfaces: self.surfaces,
            metrics: self.metrics,
        }
    }
}

/// Resolve sampling mode and colour strategy for a raster.
fn init_renderer(
    raster: &GeoRaster,
    options: &LayerOptions,
    projection: Arc<dyn MapProjection>,
    metrics: Arc<RenderMetrics>,
) -> Result<TileRenderer> {
    options.check()?;
    raster.summary.validate()?;
    let summary = Arc::new(raster.summary.clone().with_computed_ranges());

    let mode = match (&raster.source, summary.is_resident()) {
        (_, true) => SamplingMode::Direct,
        (Some(source), false) => SamplingMode::Windowed(source.clone()),
        (None, false) => {
            return Err(LayerError::initialization(
                "raster has neither resident values nor a source",
            ))
        }
    };

    let bands = summary.band_count();
    let strategy = match &options.pixel_value_to_color_fn {
        Some(f) => ColorStrategy::Custom(f.clone()),
        None => {
            let fallback = options.no_stats_window.unwrap_or(DEFAULT_NO_STATS_WINDOW);
            let (window, source) = NormalizationWindow::resolve(
                options.data_min,
                options.data_max,
                summary.band_min(0),
                summary.band_range(0),
                fallback,
            );
            if bands == 1 && source == WindowSource::Fallback {
                warn!(
                    min = window.min,
                    max = window.max,
                    configured = options.no_stats_window.is_some(),
                    "Raster has no statistics, using fallback normalization window"
                );
            }
            let scale = ColorScale::from_spec(&options.color_scale)?;
            ColorStrategy::for_band_count(bands, window, scale)
        }
    };

    if let ColorStrategy::Unsupported { bands } = strategy {
        warn!(bands, "No colour output defined for this band count");
    }

    info!(
        width = summary.width,
        height = summary.height,
        bands,
        mode = mode.name(),
        strategy = strategy.name(),
        resolution = options.resolution,
        "Georaster layer initialized"
    );

    let sampler = RegionSampler::new(summary.clone(), mode);
    Ok(TileRenderer::new(
        summary,
        sampler,
        strategy,
        projection,
        options.tile_size(),
        options.resolution,
        metrics,
    ))
}

/// A raster rendered as map tiles.
pub struct GeoRasterLayer<S: Surface = TileCanvas> {
    state: LayerState,
    bounds: BoundingBox,
    tile_size: TileSize,
    keep_buffer: u32,
    update_when_zooming: bool,
    surfaces: Arc<dyn SurfaceFactory<S>>,
    metrics: Arc<RenderMetrics>,
}

impl GeoRasterLayer<TileCanvas> {
    /// Construct a layer; never fails (see [`LayerBuilder::build`]).
    pub fn new(raster: GeoRaster, options: LayerOptions) -> Self {
        LayerBuilder::new(raster, options).build()
    }

    /// Construct a layer, returning initialization errors.
    pub fn try_new(raster: GeoRaster, options: LayerOptions) -> Result<Self> {
        LayerBuilder::new(raster, options).try_build()
    }

    pub fn builder(raster: GeoRaster, options: LayerOptions) -> LayerBuilder<TileCanvas> {
        LayerBuilder::new(raster, options)
    }
}

impl<S: Surface> GeoRasterLayer<S> {
    pub fn get_bounds(&self) -> BoundingBox {
        self.bounds
    }

    pub fn keep_buffer(&self) -> u32 {
        self.keep_buffer
    }

    pub fn update_when_zooming(&self) -> bool {
        self.update_when_zooming
    }

    pub fn metrics(&self) -> &Arc<RenderMetrics> {
        &self.metrics
    }

    pub fn is_degraded(&self) -> bool {
        matches!(self.state, LayerState::Degraded(_))
    }

    /// Why initialization failed, for a degraded layer.
    pub fn degraded_reason(&self) -> Option<&str> {
        match &self.state {
            LayerState::Degraded(reason) => Some(reason),
            LayerState::Ready(_) => None,
        }
    }

    /// Colour strategy in use, `None` when degraded.
    pub fn strategy(&self) -> Option<&ColorStrategy> {
        match &self.state {
            LayerState::Ready(renderer) => Some(renderer.strategy()),
            LayerState::Degraded(_) => None,
        }
    }

    /// Sampling grid a render of `coord` would use, `None` when degraded.
    pub fn sampling_grid(&self, coord: TileCoord) -> Option<SamplingGrid> {
        match &self.state {
            LayerState::Ready(renderer) => Some(renderer.sampling_grid(coord)),
            LayerState::Degraded(_) => None,
        }
    }

    /// Start a tile: the surface is available at once, the fill runs in the
    /// background.
    pub fn begin_tile(&self, coord: TileCoord) -> TileHandle<S> {
        let surface = shared_surface(self.surfaces.create(self.tile_size));
        let (tx, rx) = oneshot::channel();
        self.spawn_fill(coord, surface.clone(), move |result| {
            let _ = tx.send(result);
        });
        TileHandle { coord, surface, rx }
    }

    fn spawn_fill<F>(&self, coord: TileCoord, surface: SharedSurface<S>, done: F)
    where
        F: FnOnce(Result<TileReport>) + Send + 'static,
    {
        self.metrics.record_tile_started();
        let metrics = self.metrics.clone();
        let completion = Completion::new(move |result: Result<TileReport>| {
            if let Err(e) = &result {
                metrics.record_tile_failed();
                warn!(z = coord.z, x = coord.x, y = coord.y, error = %e, "Tile render failed");
            }
            done(result);
        });

        let runtime = match Handle::try_current() {
            Ok(handle) => handle,
            Err(_) => {
                completion.complete(Err(LayerError::task_failed(
                    "no async runtime to run the tile fill",
                )));
                return;
            }
        };

        let state = self.state.clone();
        runtime.spawn(async move {
            tokio::task::yield_now().await;
            let result = match state {
                LayerState::Ready(renderer) => AssertUnwindSafe(renderer.render(coord, &surface))
                    .catch_unwind()
                    .await
                    .unwrap_or_else(|panic| Err(LayerError::task_failed(panic_message(&*panic)))),
                LayerState::Degraded(reason) => Err(LayerError::Degraded(reason)),
            };
            completion.complete(result);
        });
    }
}

impl<S: Surface> TileProvider<S> for GeoRasterLayer<S> {
    fn bounds(&self) -> BoundingBox {
        self.bounds
    }

    fn tile_size(&self) -> TileSize {
        self.tile_size
    }

    fn create_tile(&self, coord: TileCoord, on_complete: TileCallback<S>) -> SharedSurface<S> {
        let surface = shared_surface(self.surfaces.create(self.tile_size));
        let filled = surface.clone();
        self.spawn_fill(coord, surface.clone(), move |result| {
            on_complete(result.err(), filled);
        });
        surface
    }
}

impl<S: Surface> std::fmt::Debug for GeoRasterLayer<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GeoRasterLayer")
            .field("state", &self.state)
            .field("bounds", &self.bounds)
            .field("tile_size", &self.tile_size)
            .finish_non_exhaustive()
    }
}

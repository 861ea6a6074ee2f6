//! Loads batches of bands in the background and commits them to the layer
//! collection.
//!
//! Workers only decode and enhance. Their results travel back over a
//! channel and the coordinator, running on the caller's thread, is the only
//! one touching the layers, the RGB composite and the interaction signal.

use std::{
    panic::{self, AssertUnwindSafe},
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc,
    },
};

use crossbeam_channel::unbounded;
use log::{debug, info, warn};
use rayon::{ThreadPool, ThreadPoolBuilder};

use crate::{
    components::{
        composite::{ChannelPlane, RgbComposite},
        layers::{Layer, LayerCollection},
        loader::{load_channel, LoadedBand},
        transforms::GeoTransform,
    },
    config::{BandRequest, CoordinatorConfig},
    errors::{LandCoverError, Result, StretchWarning},
};

/// Tells the front end whether it may accept user input.
///
/// Counts the workers of the batch in flight; interaction is enabled once
/// every one of them has reported back.
#[derive(Debug, Clone, Default)]
pub struct InteractionSignal(Arc<AtomicUsize>);

impl InteractionSignal {
    pub fn is_enabled(&self) -> bool {
        self.pending() == 0
    }

    pub fn pending(&self) -> usize {
        self.0.load(Ordering::Acquire)
    }

    fn begin(&self, workers: usize) {
        self.0.fetch_add(workers, Ordering::AcqRel);
    }

    fn finish(&self, workers: usize) {
        self.0.fetch_sub(workers, Ordering::AcqRel);
    }
}

/// Outcome of [ConcurrencyCoordinator::load_batch].
#[derive(Debug, Default)]
pub struct BatchReport {
    /// Layers added by this batch, in commit order.
    pub committed: Vec<String>,
    pub failures: Vec<(String, LandCoverError)>,
    pub warnings: Vec<(String, StretchWarning)>,
    /// Projection of the first layer once the batch is committed.
    pub projection: Option<String>,
    /// Screen to world transform of the first layer, see
    /// [GeoTransform::unit_screen].
    pub screen_to_world: Option<GeoTransform>,
}

impl BatchReport {
    pub fn is_success(&self) -> bool {
        self.failures.is_empty()
    }
}

#[derive(Debug)]
struct Outcome {
    request: BandRequest,
    result: Result<LoadedBand>,
}

pub struct ConcurrencyCoordinator {
    pool: ThreadPool,
    layers: LayerCollection,
    /// Latest plane per channel, with the layer it was stretched from.
    planes: Vec<(String, ChannelPlane)>,
    composite: Option<RgbComposite>,
    signal: InteractionSignal,
}

impl std::fmt::Debug for ConcurrencyCoordinator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConcurrencyCoordinator")
            .field("workers", &self.pool.current_num_threads())
            .field("layers", &self.layers)
            .field("pending", &self.signal.pending())
            .finish()
    }
}

impl ConcurrencyCoordinator {
    pub fn new(config: &CoordinatorConfig) -> Result<Self> {
        let thread_name = config.thread_name.clone();
        let pool = ThreadPoolBuilder::new()
            .num_threads(config.workers.unwrap_or(0))
            .thread_name(move |index| format!("{thread_name}-{index}"))
            .build()
            .map_err(|error| LandCoverError::InvalidOptions(error.to_string()))?;
        Ok(Self {
            pool,
            layers: LayerCollection::new(),
            planes: Vec::new(),
            composite: None,
            signal: InteractionSignal::default(),
        })
    }

    pub fn layers(&self) -> &LayerCollection {
        &self.layers
    }

    pub fn composite(&self) -> Option<&RgbComposite> {
        self.composite.as_ref()
    }

    /// Handle the front end polls while a batch is running.
    pub fn signal(&self) -> InteractionSignal {
        self.signal.clone()
    }

    /// Returns whether a layer named `name` exists.
    pub fn set_feature(&mut self, name: &str, is_feature: bool) -> bool {
        self.layers.set_feature(name, is_feature)
    }

    pub fn set_visible(&mut self, name: &str, is_visible: bool) -> bool {
        self.layers
            .get_mut(name)
            .map(|layer| layer.is_visible = is_visible)
            .is_some()
    }

    /// Drops the layer and its pixels, along with its channel of the
    /// composite.
    pub fn remove_layer(&mut self, name: &str) -> bool {
        let removed = self.layers.remove(name).is_some();
        if self.drop_planes(name) {
            if let Err(error) = self.rebuild_composite() {
                warn!("keeping previous composite: {error}");
            }
        }
        removed
    }

    /// Loads every request on the worker pool and commits the results as
    /// they arrive. A failing request never affects its siblings nor the
    /// layers committed by earlier batches.
    pub fn load_batch(&mut self, requests: Vec<BandRequest>) -> BatchReport {
        let expected = requests.len();
        let (sender, receiver) = unbounded();
        self.signal.begin(expected);
        info!("loading {expected} bands");

        for request in requests {
            let sender = sender.clone();
            self.pool.spawn(move || {
                let result = guarded(&request.name, || {
                    load_channel(&request.path, &request.options, request.rgb_channel)
                });
                let _ = sender.send(Outcome { request, result });
            });
        }
        drop(sender);

        let mut report = BatchReport::default();
        let mut received = 0;
        let mut planes_changed = false;
        for Outcome { request, result } in receiver.iter() {
            received += 1;
            match result {
                Ok(loaded) => planes_changed |= self.commit(request, loaded, &mut report),
                Err(error) => {
                    warn!("could not load {}: {error}", request.name);
                    report.failures.push((request.name, error));
                }
            }
            self.signal.finish(1);
        }
        if received < expected {
            self.signal.finish(expected - received);
        }

        if planes_changed {
            if let Err(error) = self.rebuild_composite() {
                warn!("keeping previous composite: {error}");
                report.failures.push(("composite".to_string(), error));
            }
        }

        if let Some(first) = self.layers.iter().next() {
            report.projection = first.band.projection().map(str::to_string);
            report.screen_to_world = GeoTransform::unit_screen(first.band.transform().to_gdal()).ok();
        }
        info!(
            "batch done: {} committed, {} failed, {} warnings",
            report.committed.len(),
            report.failures.len(),
            report.warnings.len()
        );
        report
    }

    /// Returns whether the channel planes changed.
    fn commit(&mut self, request: BandRequest, loaded: LoadedBand, report: &mut BatchReport) -> bool {
        let LoadedBand {
            band,
            warning,
            plane,
        } = loaded;
        if let Some(warning) = warning {
            report.warnings.push((request.name.clone(), warning));
        }
        if self.layers.remove(&request.name).is_some() {
            debug!("replacing layer {}", request.name);
        }
        let dropped = self.drop_planes(&request.name);
        let layer = Layer::new(request.name.clone(), request.band_number, band)
            .with_path(request.path)
            .with_feature(request.options.is_feature);
        self.layers.insert_sorted(layer);
        report.committed.push(request.name.clone());

        let Some(plane) = plane else {
            return dropped;
        };
        self.planes.retain(|(_, existing)| existing.channel != plane.channel);
        self.planes.push((request.name, plane));
        true
    }

    /// Returns whether `name` had a channel plane.
    fn drop_planes(&mut self, name: &str) -> bool {
        let before = self.planes.len();
        self.planes.retain(|(layer, _)| layer != name);
        self.planes.len() != before
    }

    /// The composite is left untouched when the planes disagree in shape.
    fn rebuild_composite(&mut self) -> Result<()> {
        self.composite = RgbComposite::from_planes(self.planes.iter().map(|(_, plane)| plane))?;
        Ok(())
    }
}

/// Runs `job`, turning a panic into [LandCoverError::WorkerPanicked].
fn guarded<T, F>(name: &str, job: F) -> Result<T>
where
    F: FnOnce() -> Result<T>,
{
    panic::catch_unwind(AssertUnwindSafe(job))
        .unwrap_or_else(|_| Err(LandCoverError::WorkerPanicked(name.to_string())))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        components::engines::tests::write_u16_tiff,
        config::{LoadOptions, RgbChannel},
    };
    use rstest::{fixture, rstest};
    use std::path::Path;
    use tempfile::TempDir;

    #[fixture]
    fn coordinator() -> ConcurrencyCoordinator {
        ConcurrencyCoordinator::new(&CoordinatorConfig {
            workers: Some(2),
            ..Default::default()
        })
        .unwrap()
    }

    fn band_file(dir: &Path, name: &str, data: &[u16]) -> std::path::PathBuf {
        let path = dir.join(format!("{name}.tif"));
        write_u16_tiff(&path, (2, 2), data, (500_000., 4_600_000.));
        path
    }

    #[rstest]
    fn failing_request_does_not_stop_siblings(mut coordinator: ConcurrencyCoordinator) {
        let dir = TempDir::new().unwrap();
        let requests = vec![
            BandRequest::new("B04", band_file(dir.path(), "B04", &[1, 2, 3, 4]), 4),
            BandRequest::new("B03", dir.path().join("missing.tif"), 3),
            BandRequest::new("B02", band_file(dir.path(), "B02", &[5, 6, 7, 8]), 2),
        ];

        let signal = coordinator.signal();
        let report = coordinator.load_batch(requests);

        assert!(signal.is_enabled());
        assert!(!report.is_success());
        assert_eq!(report.failures.len(), 1);
        assert_eq!(report.failures[0].0, "B03");
        assert!(matches!(report.failures[0].1, LandCoverError::Io { .. }));
        assert_eq!(coordinator.layers().names().collect::<Vec<_>>(), ["B02", "B04"]);
        assert_eq!(report.projection.as_deref(), Some("WGS 84 / UTM zone 32N"));
        assert_eq!(
            report.screen_to_world.unwrap().to_gdal(),
            [500_000., 1., 0., 4_600_000., 0., -1.]
        );

        // A later batch keeps what was committed before.
        let report = coordinator.load_batch(vec![BandRequest::new(
            "B08",
            dir.path().join("also-missing.tif"),
            8,
        )]);
        assert_eq!(report.failures.len(), 1);
        assert!(report.committed.is_empty());
        assert_eq!(coordinator.layers().len(), 2);
        assert!(coordinator.signal().is_enabled());
    }

    #[rstest]
    fn committed_layers_carry_request(mut coordinator: ConcurrencyCoordinator) {
        let dir = TempDir::new().unwrap();
        let options = LoadOptions {
            is_feature: false,
            ..Default::default()
        };
        let report = coordinator.load_batch(vec![
            BandRequest::new("DEM", band_file(dir.path(), "DEM", &[9, 9, 9, 9]), 1).with_options(options),
        ]);

        assert_eq!(report.committed, ["DEM"]);
        assert_eq!(
            report.warnings,
            [("DEM".to_string(), StretchWarning::Degenerate { min_cut: 9, max_cut: 9 })]
        );
        let layer = coordinator.layers().get("DEM").unwrap();
        assert!(!layer.is_feature);
        assert_eq!(layer.band_number, 1);
        assert_eq!(layer.path.as_deref(), Some(dir.path().join("DEM.tif").as_path()));

        assert!(coordinator.set_feature("DEM", true));
        assert!(coordinator.set_visible("DEM", true));
        assert!(coordinator.remove_layer("DEM"));
        assert!(!coordinator.remove_layer("DEM"));
    }

    #[rstest]
    fn reloading_a_name_replaces_the_layer(mut coordinator: ConcurrencyCoordinator) {
        let dir = TempDir::new().unwrap();
        let path = band_file(dir.path(), "B02", &[1, 2, 3, 4]);
        coordinator.load_batch(vec![BandRequest::new("B02", &path, 2)]);
        coordinator.load_batch(vec![BandRequest::new("B02", &path, 7)]);
        assert_eq!(coordinator.layers().len(), 1);
        assert_eq!(coordinator.layers().get("B02").unwrap().band_number, 7);
    }

    #[rstest]
    fn rgb_requests_build_composite(mut coordinator: ConcurrencyCoordinator) {
        let dir = TempDir::new().unwrap();
        coordinator.load_batch(vec![
            BandRequest::new("B04", band_file(dir.path(), "B04", &[0, 10, 20, 30]), 4)
                .with_rgb_channel(RgbChannel::Red),
            BandRequest::new("B02", band_file(dir.path(), "B02", &[30, 20, 10, 0]), 2)
                .with_rgb_channel(RgbChannel::Blue),
        ]);

        let composite = coordinator.composite().unwrap();
        assert_eq!(composite.shape, (2, 2));
        assert_eq!(composite.pixel(0, 0), Some([255, 0, 0, 255]));
        assert_eq!(composite.pixel(1, 1), Some([0, 0, 255, 255]));
    }

    #[rstest]
    fn removing_a_channel_layer_clears_its_channel(mut coordinator: ConcurrencyCoordinator) {
        let dir = TempDir::new().unwrap();
        coordinator.load_batch(vec![
            BandRequest::new("B04", band_file(dir.path(), "B04", &[0, 10, 20, 30]), 4)
                .with_rgb_channel(RgbChannel::Red),
            BandRequest::new("B02", band_file(dir.path(), "B02", &[30, 20, 10, 0]), 2)
                .with_rgb_channel(RgbChannel::Blue),
        ]);

        assert!(coordinator.remove_layer("B04"));
        let composite = coordinator.composite().unwrap();
        assert_eq!(composite.pixel(0, 0), Some([255, 0, 0, 255]));
        assert_eq!(composite.pixel(1, 1), Some([0, 0, 0, 255]));

        // Reloading without a channel drops the plane too.
        coordinator.load_batch(vec![BandRequest::new(
            "B02",
            band_file(dir.path(), "B02", &[30, 20, 10, 0]),
            2,
        )]);
        assert!(coordinator.composite().is_none());
        assert_eq!(coordinator.layers().names().collect::<Vec<_>>(), ["B02"]);
    }

    #[rstest]
    fn empty_batch_reports_nothing(mut coordinator: ConcurrencyCoordinator) {
        let report = coordinator.load_batch(Vec::new());
        assert!(report.is_success());
        assert!(report.projection.is_none());
        assert!(coordinator.signal().is_enabled());
        assert!(coordinator.composite().is_none());
    }

    #[rstest]
    fn panics_become_errors() {
        let result: Result<()> = guarded("B05", || panic!("decoder blew up"));
        assert!(matches!(result, Err(LandCoverError::WorkerPanicked(name)) if name == "B05"));
        assert_eq!(guarded("B05", || Ok(5)).unwrap(), 5);
    }
}

pub mod band;
pub mod composite;
pub mod engines;
pub mod file;
pub mod histogram;
pub mod layers;
pub mod loader;
pub mod stretch;
pub mod transforms;

pub use band::RasterBand;
pub use composite::{ChannelPlane, RgbComposite};
pub use file::BandFile;
pub use histogram::{BandStatistics, Histogram};
pub use layers::{Layer, LayerCollection};
pub use loader::{load, load_channel, LoadedBand};
pub use stretch::{compute_cutoffs, ContrastStretcher, Cutoffs, StretchMode};
pub use transforms::GeoTransform;

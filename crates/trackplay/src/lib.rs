//! Playback of recorded GPS tracks over cached map tiles.
//!
//! Two engines live here. The tile engine projects degrees onto slippy-map
//! tiles, fetches and caches those tiles, and lays them out in a local
//! plotting space ([`tile_space`], [`mapper`]). The sampler answers
//! position, speed, cadence and distance queries for any playback time
//! ([`sampler`]). [`map_view::MapView`] ties both to a drawing surface.

pub mod config;
pub mod errors;
pub mod geo_math;
pub mod gpx_loader;
pub mod leaderboard;
pub mod map_view;
pub mod mapper;
pub mod overlay;
pub mod sampler;
pub mod surface;
pub mod tile_cache;
pub mod tile_image;
pub mod tile_source;
pub mod tile_space;
pub mod tile_store;
pub mod track;
pub mod units;

pub use config::Config;
pub use errors::AppError;
pub use geo_math::{GeoBounds, LatLon, TileIndex, ZOOM};
pub use map_view::MapView;
pub use overlay::{AthleteId, AthleteOverlay, AthleteUpdate};
pub use surface::{Colour, DrawingSurface, RecordingSurface};
pub use track::{Track, TrackPoint};
pub use units::{SpeedUnit, convert_speed_units};

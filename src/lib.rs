//! Tile-based atmospherics: gas mixtures that diffuse, equalize, vent to space, burn and
//! conduct heat across any number of tile grids, processed in budgeted, resumable stages.

pub mod atmos_grid;

pub mod config;

pub mod gas;

pub mod helpers;

pub mod interfaces;

pub mod reaction;

pub mod system;

pub mod turfs;

pub use atmos_grid::{DeviceContext, DeviceId, GridAtmosphere, GridId, PipeNetId, ProcessingState};

pub use config::AtmosConfig;

pub use gas::{GasCompareResult, Mixture};

pub use system::AtmosphereSystem;

pub use turfs::{Directions, TileCoord};

/// Sends every span and event to a Tracy client listening on the default port.
/// # Errors
/// If a global subscriber is already set.
#[cfg(feature = "tracy")]
pub fn init_tracy() -> eyre::Result<()> {
	use tracing_subscriber::layer::SubscriberExt;
	tracing::subscriber::set_global_default(
		tracing_subscriber::registry().with(tracing_tracy::TracyLayer::default()),
	)?;
	Ok(())
}

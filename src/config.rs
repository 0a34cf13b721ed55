use crate::gas::constants::*;

use coarsetime::Duration;

use eyre::Result;

use parking_lot::RwLock;

use std::sync::Arc;

/// Feature toggles and tunables, read once per stage as an `Arc` snapshot.
#[derive(Clone, Debug, PartialEq)]
pub struct AtmosConfig {
	pub monstermos_equalization: bool,
	pub monstermos_depressurization: bool,
	pub monstermos_rip_tiles: bool,
	pub grid_impulse: bool,
	pub space_wind: bool,
	pub excited_groups: bool,
	pub excited_groups_space_is_all_consuming: bool,
	pub superconduction: bool,
	/// Atmos ticks per second.
	pub atmos_tick_rate: f32,
	/// Wall clock budget for one `update` call across every grid.
	pub max_process_time: Duration,
	/// Tiles past this many in an equalization flood fill are found but not averaged.
	pub monstermos_tile_limit: usize,
	pub monstermos_hard_tile_limit: usize,
	/// Fraction of a tile's moles that may leave it in one depressurization step.
	pub depressurize_escape_ratio: f32,
	/// A tile left with fewer moles than this is vented completely.
	pub depressurize_min_moles: f32,
	/// Cap on the moles that may leave through a single tile in one step.
	pub depressurize_max_wind: f32,
	/// Fraction of the gas reaching the breach that is lost to space.
	pub breach_escape_ratio: f32,
	pub lag_check_iterations: usize,
	pub revalidate_lag_check_iterations: usize,
}

impl Default for AtmosConfig {
	fn default() -> Self {
		Self {
			monstermos_equalization: true,
			monstermos_depressurization: true,
			monstermos_rip_tiles: true,
			grid_impulse: false,
			space_wind: true,
			excited_groups: true,
			excited_groups_space_is_all_consuming: false,
			superconduction: true,
			atmos_tick_rate: ATMOS_TICK_RATE,
			max_process_time: Duration::from_millis(ATMOS_MAX_PROCESS_TIME_MS),
			monstermos_tile_limit: MONSTERMOS_TILE_LIMIT,
			monstermos_hard_tile_limit: MONSTERMOS_HARD_TILE_LIMIT,
			depressurize_escape_ratio: 1.0,
			depressurize_min_moles: 1.0,
			depressurize_max_wind: f32::INFINITY,
			breach_escape_ratio: 1.0,
			lag_check_iterations: LAG_CHECK_ITERATIONS,
			revalidate_lag_check_iterations: REVALIDATE_LAG_CHECK_ITERATIONS,
		}
	}
}

impl AtmosConfig {
	/// # Errors
	/// If a tunable is out of range, e.g. a non-positive tick rate, an escape ratio outside `(0, 1]`,
	/// or a partial escape ratio with no minimum-moles floor.
	pub fn validate(&self) -> Result<()> {
		if !(self.atmos_tick_rate.is_finite() && self.atmos_tick_rate > 0.0) {
			return Err(eyre::eyre!(
				"Atmos tick rate must be positive, got {}",
				self.atmos_tick_rate
			));
		}
		for (name, ratio) in [
			("depressurize_escape_ratio", self.depressurize_escape_ratio),
			("breach_escape_ratio", self.breach_escape_ratio),
		] {
			if !(0.0..=1.0).contains(&ratio) {
				return Err(eyre::eyre!("{name} must be within [0, 1], got {ratio}"));
			}
		}
		// A room only finishes venting if every step moves gas and a partial escape has a floor.
		if self.depressurize_escape_ratio <= 0.0 {
			return Err(eyre::eyre!("depressurize_escape_ratio must be above zero"));
		}
		if self.monstermos_tile_limit == 0
			|| self.monstermos_tile_limit > self.monstermos_hard_tile_limit
		{
			return Err(eyre::eyre!(
				"Monstermos tile limit {} must be non-zero and at most the hard limit {}",
				self.monstermos_tile_limit,
				self.monstermos_hard_tile_limit
			));
		}
		if self.depressurize_min_moles.is_nan() || self.depressurize_min_moles < 0.0 {
			return Err(eyre::eyre!(
				"depressurize_min_moles can't be negative, got {}",
				self.depressurize_min_moles
			));
		}
		if self.depressurize_escape_ratio < 1.0 && self.depressurize_min_moles <= 0.0 {
			return Err(eyre::eyre!(
				"depressurize_min_moles must be positive when depressurize_escape_ratio is below 1, got {}",
				self.depressurize_min_moles
			));
		}
		if self.depressurize_max_wind.is_nan() || self.depressurize_max_wind <= 0.0 {
			return Err(eyre::eyre!(
				"depressurize_max_wind must be positive, got {}",
				self.depressurize_max_wind
			));
		}
		if self.lag_check_iterations == 0 || self.revalidate_lag_check_iterations == 0 {
			return Err(eyre::eyre!("Lag check intervals must be non-zero"));
		}
		Ok(())
	}
	/// Seconds per atmos tick.
	#[must_use]
	pub fn atmos_time(&self) -> f32 {
		1.0 / self.atmos_tick_rate
	}
	#[must_use]
	pub fn equalization_enabled(&self) -> bool {
		cfg!(feature = "fastmos") && self.monstermos_equalization
	}
	#[must_use]
	pub fn superconduction_enabled(&self) -> bool {
		cfg!(feature = "superconductivity") && self.superconduction
	}
	/// The time a device actually experiences between two updates: every enabled stage costs a tick.
	#[must_use]
	pub fn real_atmos_time(&self) -> f32 {
		let mut stages = crate::atmos_grid::ProcessingState::COUNT;
		if !self.equalization_enabled() {
			stages -= 1;
		}
		if !self.excited_groups {
			stages -= 1;
		}
		if !self.superconduction_enabled() {
			stages -= 1;
		}
		stages as f32 * self.atmos_time()
	}
}

lazy_static::lazy_static! {
	static ref DEFAULT_CONFIG: RwLock<Arc<AtmosConfig>> = RwLock::new(Arc::new(AtmosConfig::default()));
}

/// The snapshot new systems start from.
pub fn default_config() -> Arc<AtmosConfig> {
	DEFAULT_CONFIG.read().clone()
}

/// Swaps the process-wide default. Systems that already exist keep their own snapshot.
/// # Errors
/// If the config doesn't validate.
pub fn set_default_config(config: AtmosConfig) -> Result<()> {
	config.validate()?;
	*DEFAULT_CONFIG.write() = Arc::new(config);
	Ok(())
}

//! What the simulation needs from the host, and what it tells the host.

use crate::atmos_grid::{DeviceContext, GridId};

use crate::gas::{constants::*, Mixture};

use crate::turfs::{Directions, TileCoord};

use eyre::Result;

pub type EntityId = u64;

/// What anchored objects on a tile do to airflow.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct AirtightInfo {
	pub blocked: Directions,
	/// A fully blocked tile with this set holds no air at all.
	pub no_air: bool,
	/// A tile that regains air should borrow it from its neighbors.
	pub fix_vacuum: bool,
}

impl AirtightInfo {
	#[must_use]
	pub fn is_air_blocked(&self) -> bool {
		self.blocked.contains(Directions::ALL_CARDINALS)
	}
}

/// Thermal and structural facts about the floor of a tile.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct TileProperties {
	pub space: bool,
	pub thermal_conductivity: f32,
	pub heat_capacity: f32,
}

impl Default for TileProperties {
	fn default() -> Self {
		Self {
			space: false,
			thermal_conductivity: DEFAULT_THERMAL_CONDUCTIVITY,
			heat_capacity: DEFAULT_TILE_HEAT_CAPACITY,
		}
	}
}

/// Answers questions about what occupies a tile.
pub trait AirtightQuery {
	fn airtight(&self, grid: GridId, coord: TileCoord) -> AirtightInfo;
	fn tile_properties(&self, _grid: GridId, _coord: TileCoord) -> TileProperties {
		TileProperties::default()
	}
}

/// Side effects the simulation wants performed. Every method defaults to doing nothing.
pub trait AtmosEvents {
	/// The tile's air changed; its overlay may need redrawing.
	fn invalidate_visuals(&mut self, _grid: GridId, _coord: TileCoord) {}
	/// Everything on the tile is being burned.
	fn tile_fire(&mut self, _grid: GridId, _coord: TileCoord, _temperature: f32, _volume: f32) {}
	/// Wind on a tile, for pushing things around.
	fn high_pressure_movement(
		&mut self,
		_grid: GridId,
		_coord: TileCoord,
		_difference: f32,
		_direction: Directions,
	) {
	}
	/// Push the grid body, scaled by the moles vented from `origin`.
	fn apply_impulse(&mut self, _grid: GridId, _origin: TileCoord, _direction: (f32, f32), _moles: f32) {}
	fn rip_floor(&mut self, _grid: GridId, _coord: TileCoord) {}
	/// Give firelocks between two tiles a chance to close. Returns true if any changed state,
	/// in which case both tiles are requeried for airtightness.
	fn consider_firelocks(&mut self, _grid: GridId, _a: TileCoord, _b: TileCoord) -> bool {
		false
	}
}

/// For hosts that don't care.
impl AtmosEvents for () {}

/// Identifies a pipe within its pipe net.
pub type PipeId = u64;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PipeDamageScaling {
	Linear,
	Exponential,
}

impl std::str::FromStr for PipeDamageScaling {
	type Err = eyre::Report;

	fn from_str(s: &str) -> Result<Self> {
		match s {
			"linear" => Ok(Self::Linear),
			"exponential" => Ok(Self::Exponential),
			_ => Err(eyre::eyre!("Unknown pipe damage scaling: {s}")),
		}
	}
}

/// A pipe a net reports for overpressure checking.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PipeState {
	pub id: PipeId,
	pub pressure: f32,
	pub max_pressure: f32,
	pub damage: f32,
	pub scaling: PipeDamageScaling,
}

pub const PIPE_DAMAGE_BASE: f32 = 1.0;
pub const PIPE_DAMAGE_EXPONENT: f32 = 2.0;
pub const PIPE_DAMAGE_BIAS: f32 = 100.0;

/// Damage a pipe takes this tick for being over pressure. Already damaged pipes take more.
#[must_use]
pub fn pipe_overpressure_damage(
	pressure: f32,
	max_pressure: f32,
	current_damage: f32,
	scaling: PipeDamageScaling,
) -> f32 {
	let over = pressure - max_pressure;
	if !(over > 0.0) || !(max_pressure > 0.0) {
		return 0.0;
	}
	let ratio = over / max_pressure;
	let base = match scaling {
		PipeDamageScaling::Linear => PIPE_DAMAGE_BASE * ratio,
		PipeDamageScaling::Exponential => PIPE_DAMAGE_BASE * (PIPE_DAMAGE_EXPONENT * ratio).exp_m1(),
	};
	base * (1.0 + current_damage.max(0.0) / PIPE_DAMAGE_BIAS)
}

/// An external gas network. Owns its own mixtures.
pub trait PipeNet {
	fn update(&mut self);
	/// Pipes to check for overpressure after `update`.
	fn pipes(&self) -> Vec<PipeState> {
		Vec::new()
	}
}

pub trait DamageSink {
	fn apply_damage(&mut self, pipe: PipeId, amount: f32);
}

/// Anything that pushes or pulls gas once per atmos tick.
pub trait AtmosDevice {
	/// `dt` is the simulated time since this device last ran, which may be longer than a
	/// nominal tick when processing fell behind.
	fn update(&mut self, dt: f32, context: &mut DeviceContext<'_>);
}

/// Resolves what air an entity is sitting in before the tile is consulted. The first resolver
/// returning `Some` wins.
pub trait ContainingMixtureResolver {
	fn containing_mixture(&self, entity: EntityId) -> Option<Mixture>;
}

#[cfg(test)]
pub(crate) mod test_support {
	use super::*;

	use fxhash::FxBuildHasher;
	use indexmap::{IndexMap, IndexSet};

	/// An airtight map you can edit, for building test rooms.
	#[derive(Default)]
	pub struct TestMap {
		pub airtight: IndexMap<TileCoord, AirtightInfo, FxBuildHasher>,
		pub space: IndexSet<TileCoord, FxBuildHasher>,
	}

	impl TestMap {
		pub fn wall(&mut self, coord: TileCoord) {
			self.airtight.insert(
				coord,
				AirtightInfo {
					blocked: Directions::ALL_CARDINALS,
					no_air: true,
					fix_vacuum: false,
				},
			);
		}
	}

	impl AirtightQuery for TestMap {
		fn airtight(&self, _grid: GridId, coord: TileCoord) -> AirtightInfo {
			self.airtight.get(&coord).copied().unwrap_or_default()
		}
		fn tile_properties(&self, _grid: GridId, coord: TileCoord) -> TileProperties {
			TileProperties {
				space: self.space.contains(&coord),
				..Default::default()
			}
		}
	}

	/// Records every event it gets.
	#[derive(Default)]
	pub struct EventLog {
		pub invalidated: Vec<TileCoord>,
		pub fires: Vec<(TileCoord, f32, f32)>,
		pub winds: Vec<(TileCoord, f32, Directions)>,
		pub impulses: Vec<(f32, f32, f32)>,
		pub rips: Vec<TileCoord>,
		pub firelock_checks: usize,
	}

	impl AtmosEvents for EventLog {
		fn invalidate_visuals(&mut self, _grid: GridId, coord: TileCoord) {
			self.invalidated.push(coord);
		}
		fn tile_fire(&mut self, _grid: GridId, coord: TileCoord, temperature: f32, volume: f32) {
			self.fires.push((coord, temperature, volume));
		}
		fn high_pressure_movement(
			&mut self,
			_grid: GridId,
			coord: TileCoord,
			difference: f32,
			direction: Directions,
		) {
			self.winds.push((coord, difference, direction));
		}
		fn apply_impulse(&mut self, _grid: GridId, _origin: TileCoord, direction: (f32, f32), moles: f32) {
			self.impulses.push((direction.0, direction.1, moles));
		}
		fn rip_floor(&mut self, _grid: GridId, coord: TileCoord) {
			self.rips.push(coord);
		}
		fn consider_firelocks(&mut self, _grid: GridId, _a: TileCoord, _b: TileCoord) -> bool {
			self.firelock_checks += 1;
			false
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn no_damage_under_pressure() {
		assert_eq!(
			pipe_overpressure_damage(100.0, 200.0, 0.0, PipeDamageScaling::Exponential),
			0.0
		);
		assert_eq!(
			pipe_overpressure_damage(f32::NAN, 200.0, 0.0, PipeDamageScaling::Linear),
			0.0
		);
	}

	#[test]
	fn damage_grows_with_pressure_and_wear() {
		let mild = pipe_overpressure_damage(250.0, 200.0, 0.0, PipeDamageScaling::Exponential);
		let severe = pipe_overpressure_damage(400.0, 200.0, 0.0, PipeDamageScaling::Exponential);
		let worn = pipe_overpressure_damage(250.0, 200.0, 50.0, PipeDamageScaling::Exponential);
		assert!(mild > 0.0);
		assert!(severe > mild);
		assert!((worn - mild * 1.5).abs() < 1e-5);
		let linear = pipe_overpressure_damage(400.0, 200.0, 0.0, PipeDamageScaling::Linear);
		assert!((linear - 1.0).abs() < 1e-6);
	}

	#[test]
	fn parses_scaling() {
		assert_eq!(
			"linear".parse::<PipeDamageScaling>().unwrap(),
			PipeDamageScaling::Linear
		);
		assert!("quadratic".parse::<PipeDamageScaling>().is_err());
	}
}

pub mod groups;
pub mod hotspot;
pub mod monstermos;
pub mod processing;
pub mod revalidate;
pub mod superconduct;

use crate::gas::{constants::*, Mixture};

use bitflags::bitflags;

/// Position of a tile within its grid.
pub type TileCoord = (i32, i32);

/// Index of a tile in its grid's arena. Only meaningful for the grid that handed it out.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TileId(pub(crate) usize);

bitflags! {
	#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
	pub struct Directions: u8 {
		const NORTH = 0b1;
		const SOUTH = 0b10;
		const EAST	= 0b100;
		const WEST	= 0b1000;
		const ALL_CARDINALS = Self::NORTH.bits() | Self::SOUTH.bits() | Self::EAST.bits() | Self::WEST.bits();
	}
}

pub const NUM_DIRECTIONS: usize = 4;

pub const OPP_DIR_INDEX: [usize; NUM_DIRECTIONS] = [1, 0, 3, 2];

const DIR_OFFSETS: [(i32, i32); NUM_DIRECTIONS] = [(0, 1), (0, -1), (1, 0), (-1, 0)];

impl Directions {
	#[must_use]
	pub const fn from_index(idx: usize) -> Self {
		Self::from_bits_truncate(1 << idx)
	}
	/// Index of a single direction, or `None` if this isn't exactly one direction.
	#[must_use]
	pub const fn to_index(self) -> Option<usize> {
		match self.bits() {
			0b1 => Some(0),
			0b10 => Some(1),
			0b100 => Some(2),
			0b1000 => Some(3),
			_ => None,
		}
	}
	#[must_use]
	pub fn opposite(self) -> Self {
		let mut ret = Self::empty();
		for i in 0..NUM_DIRECTIONS {
			if self.contains(Self::from_index(i)) {
				ret |= Self::from_index(OPP_DIR_INDEX[i]);
			}
		}
		ret
	}
	/// Indices of every direction in this set, in index order.
	pub fn indices(self) -> impl Iterator<Item = usize> {
		(0..NUM_DIRECTIONS).filter(move |&i| self.contains(Self::from_index(i)))
	}
}

#[must_use]
pub fn offset(coord: TileCoord, dir_index: usize) -> TileCoord {
	let (dx, dy) = DIR_OFFSETS[dir_index];
	(coord.0 + dx, coord.1 + dy)
}

/// Fire state of a tile.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Hotspot {
	pub valid: bool,
	/// A freshly lit hotspot waits one pass before it burns anything.
	pub skipped_first_process: bool,
	/// The fire fills the tile and reacts against the whole tile mixture.
	pub bypassing: bool,
	pub temperature: f32,
	pub volume: f32,
	/// 1 for a small fire, 2 for a large one, 3 for a tile-filling one.
	pub state: u8,
}

/// Scratch state for one equalization or depressurization pass. Reset on every use.
#[derive(Copy, Clone, Default, Debug)]
pub struct MonstermosInfo {
	pub transfer_dirs: [f32; NUM_DIRECTIONS],
	pub mole_delta: f32,
	pub curr_transfer_amount: f32,
	pub curr_transfer_dir: Option<usize>,
	pub last_cycle: u32,
	pub last_queue_cycle: u32,
	pub last_slow_queue_cycle: u32,
	pub fast_done: bool,
}

impl MonstermosInfo {
	pub fn adjust_eq_movement(&mut self, adjacent: &mut Self, dir_index: usize, amount: f32) {
		self.transfer_dirs[dir_index] += amount;
		adjacent.transfer_dirs[OPP_DIR_INDEX[dir_index]] -= amount;
	}
}

/// Per-tile simulation state.
#[derive(Clone, Debug)]
pub struct TileAtmosphere {
	pub coord: TileCoord,
	/// `None` means there is no air here at all (a wall), which is not the same as vacuum.
	pub air: Option<Mixture>,
	pub space: bool,
	/// Directions gas may flow through. Always mirrored by the neighbor in that direction.
	pub adjacent_bits: Directions,
	/// Tiles next to this one, open or not. Superconduction goes through walls.
	pub neighbors: [Option<TileId>; NUM_DIRECTIONS],
	pub blocked_airflow: Directions,
	pub excited: bool,
	pub excited_group: Option<crate::turfs::groups::GroupId>,
	pub archived_cycle: u32,
	pub current_cycle: u32,
	pub hotspot: Hotspot,
	pub max_fire_temperature_sustained: f32,
	pub monstermos: MonstermosInfo,
	pub pressure_difference: f32,
	pub pressure_direction: Directions,
	pub last_pressure_direction: Directions,
	/// Temperature of the tile itself, used when it has no air.
	pub temperature: f32,
	pub temperature_archived: f32,
	pub thermal_conductivity: f32,
	pub heat_capacity: f32,
}

impl TileAtmosphere {
	#[must_use]
	pub fn new(coord: TileCoord) -> Self {
		Self {
			coord,
			air: Some(Mixture::from_vol_temp(CELL_VOLUME, T20C)),
			space: false,
			adjacent_bits: Directions::empty(),
			neighbors: [None; NUM_DIRECTIONS],
			blocked_airflow: Directions::empty(),
			excited: false,
			excited_group: None,
			archived_cycle: 0,
			current_cycle: 0,
			hotspot: Hotspot::default(),
			max_fire_temperature_sustained: 0.0,
			monstermos: MonstermosInfo::default(),
			pressure_difference: 0.0,
			pressure_direction: Directions::empty(),
			last_pressure_direction: Directions::empty(),
			temperature: T20C,
			temperature_archived: T20C,
			thermal_conductivity: DEFAULT_THERMAL_CONDUCTIVITY,
			heat_capacity: DEFAULT_TILE_HEAT_CAPACITY,
		}
	}
	/// Snapshots the air and the tile's own temperature for this cycle.
	pub fn archive(&mut self, cycle: u32) {
		if let Some(air) = self.air.as_mut() {
			air.archive();
		}
		self.temperature_archived = self.temperature;
		self.archived_cycle = cycle;
	}
	#[must_use]
	pub fn total_moles(&self) -> f32 {
		self.air.as_ref().map_or(0.0, Mixture::total_moles)
	}
	#[must_use]
	pub fn has_air(&self) -> bool {
		self.air.is_some()
	}
	/// Drops the air and everything derived from it.
	pub fn clear_air_state(&mut self) {
		self.air = None;
		self.archived_cycle = 0;
		self.hotspot = Hotspot::default();
	}
	/// Records a pressure push if it is stronger than the one already recorded this cycle.
	pub fn consider_pressure_difference(&mut self, direction: Directions, difference: f32) {
		if difference > self.pressure_difference {
			self.pressure_difference = difference;
			self.pressure_direction = direction;
		}
	}
}

/// Collects what the reactions in a tile's air asked to set on fire.
#[derive(Default, Debug)]
pub(crate) struct FireExposure(pub Option<(f32, f32)>);

impl crate::reaction::ReactionHolder for FireExposure {
	fn fire_expose(&mut self, temperature: f32, volume: f32) {
		if self.0.map_or(true, |(hottest, _)| temperature > hottest) {
			self.0 = Some((temperature, volume));
		}
	}
}

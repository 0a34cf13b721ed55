use crate::config::AtmosConfig;

use crate::gas::{constants::*, Mixture};

use crate::interfaces::{
	pipe_overpressure_damage, AirtightQuery, AtmosDevice, AtmosEvents, DamageSink, PipeNet,
};

use crate::turfs::{
	groups::{process_excited_group, ExcitedGroup, GroupId},
	hotspot::process_hotspot,
	monstermos::equalize_pressure_in_zone,
	offset,
	processing::{process_cell, process_high_pressure_delta},
	revalidate::revalidate_tile,
	superconduct::superconduct,
	Directions, TileAtmosphere, TileCoord, TileId, NUM_DIRECTIONS, OPP_DIR_INDEX,
};

use coarsetime::{Duration, Instant};

use fxhash::FxBuildHasher;

use indexmap::{IndexMap, IndexSet};

use rand::rngs::StdRng;

use std::collections::VecDeque;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct GridId(pub u32);

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PipeNetId(pub(crate) u64);

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DeviceId(pub(crate) u64);

pub type TileSet = IndexSet<TileId, FxBuildHasher>;

/// The stage a grid is in. Each call to `AtmosphereSystem::update` advances a grid by at most one stage.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum ProcessingState {
	#[default]
	Revalidate,
	TileEqualize,
	ActiveTiles,
	ExcitedGroups,
	HighPressureDelta,
	Hotspots,
	Superconductivity,
	PipeNet,
	AtmosDevices,
}

impl ProcessingState {
	pub const COUNT: usize = 9;
}

/// Wall clock budget for one update call.
pub(crate) struct Budget {
	start_time: Instant,
	remaining_time: Duration,
}

impl Budget {
	pub fn new(remaining_time: Duration) -> Self {
		Self {
			start_time: Instant::now(),
			remaining_time,
		}
	}
	pub fn exceeded(&self) -> bool {
		self.start_time.elapsed() >= self.remaining_time
	}
}

/// Only looks at the clock every `every` items.
struct LagCheck {
	number: usize,
	every: usize,
}

impl LagCheck {
	fn new(every: usize) -> Self {
		Self { number: 0, every }
	}
	fn should_pause(&mut self, budget: &Budget) -> bool {
		self.number += 1;
		if self.number <= self.every {
			return false;
		}
		self.number = 0;
		budget.exceeded()
	}
}

/// Everything a stage needs besides the grid itself.
pub(crate) struct StageContext<'a> {
	pub config: &'a AtmosConfig,
	pub airtight: &'a dyn AirtightQuery,
	pub events: &'a mut dyn AtmosEvents,
	pub damage: &'a mut dyn DamageSink,
	pub rng: &'a mut StdRng,
	pub budget: &'a Budget,
}

#[derive(Clone, Copy)]
enum TileQueue {
	Active,
	HighPressure,
	Hotspots,
	Superconductivity,
}

struct DeviceSlot {
	/// Taken out while the device is running so it can borrow the grid.
	device: Option<Box<dyn AtmosDevice>>,
	last_process: Option<f64>,
}

/// The atmosphere of one grid: a tile arena, the sets the stages work through, and where
/// processing left off.
pub struct GridAtmosphere {
	id: GridId,
	tiles: Vec<TileAtmosphere>,
	positions: IndexMap<TileCoord, TileId, FxBuildHasher>,
	pub(crate) excited_groups: IndexMap<GroupId, ExcitedGroup, FxBuildHasher>,
	next_group: u64,
	pub(crate) active_tiles: TileSet,
	pub(crate) high_pressure_delta: TileSet,
	pub(crate) hotspot_tiles: TileSet,
	pub(crate) superconductivity_tiles: TileSet,
	pub(crate) invalidated_coords: IndexSet<TileCoord, FxBuildHasher>,
	pipe_nets: IndexMap<PipeNetId, Box<dyn PipeNet>, FxBuildHasher>,
	devices: IndexMap<DeviceId, DeviceSlot, FxBuildHasher>,
	map_mixture: Option<Mixture>,
	pub(crate) state: ProcessingState,
	pub(crate) processing_paused: bool,
	run_tiles: VecDeque<TileId>,
	run_groups: VecDeque<GroupId>,
	run_coords: VecDeque<TileCoord>,
	run_pipe_nets: VecDeque<PipeNetId>,
	run_devices: VecDeque<DeviceId>,
	pub(crate) update_counter: u32,
	pub(crate) equalization_queue_cycle_control: u32,
	pub(crate) timer: f32,
	pub(crate) simulated: bool,
	pub(crate) paused: bool,
	simulated_time: f64,
}

impl GridAtmosphere {
	#[must_use]
	pub fn new(id: GridId) -> Self {
		Self {
			id,
			tiles: Vec::new(),
			positions: IndexMap::with_hasher(FxBuildHasher::default()),
			excited_groups: IndexMap::with_hasher(FxBuildHasher::default()),
			next_group: 0,
			active_tiles: TileSet::default(),
			high_pressure_delta: TileSet::default(),
			hotspot_tiles: TileSet::default(),
			superconductivity_tiles: TileSet::default(),
			invalidated_coords: IndexSet::with_hasher(FxBuildHasher::default()),
			pipe_nets: IndexMap::with_hasher(FxBuildHasher::default()),
			devices: IndexMap::with_hasher(FxBuildHasher::default()),
			map_mixture: None,
			state: ProcessingState::default(),
			processing_paused: false,
			run_tiles: VecDeque::new(),
			run_groups: VecDeque::new(),
			run_coords: VecDeque::new(),
			run_pipe_nets: VecDeque::new(),
			run_devices: VecDeque::new(),
			update_counter: 1,
			equalization_queue_cycle_control: 0,
			timer: 0.0,
			simulated: true,
			paused: false,
			simulated_time: 0.0,
		}
	}
	#[must_use]
	pub fn id(&self) -> GridId {
		self.id
	}
	#[must_use]
	pub fn state(&self) -> ProcessingState {
		self.state
	}
	/// Full cycles completed so far, plus one.
	#[must_use]
	pub fn update_counter(&self) -> u32 {
		self.update_counter
	}
	#[must_use]
	pub fn is_processing_paused(&self) -> bool {
		self.processing_paused
	}
	#[must_use]
	pub fn tile_id(&self, coord: TileCoord) -> Option<TileId> {
		self.positions.get(&coord).copied()
	}
	/// # Panics
	/// If `id` didn't come from this grid.
	#[must_use]
	pub fn tile(&self, id: TileId) -> &TileAtmosphere {
		&self.tiles[id.0]
	}
	pub(crate) fn tile_mut(&mut self, id: TileId) -> &mut TileAtmosphere {
		&mut self.tiles[id.0]
	}
	#[must_use]
	pub fn tile_at(&self, coord: TileCoord) -> Option<&TileAtmosphere> {
		self.tile_id(coord).map(|id| self.tile(id))
	}
	pub fn tiles(&self) -> impl Iterator<Item = (TileId, &TileAtmosphere)> {
		self.tiles
			.iter()
			.enumerate()
			.map(|(i, tile)| (TileId(i), tile))
	}
	#[must_use]
	pub fn tile_count(&self) -> usize {
		self.tiles.len()
	}
	#[must_use]
	pub fn active_tiles(&self) -> &TileSet {
		&self.active_tiles
	}
	#[must_use]
	pub fn excited_group_count(&self) -> usize {
		self.excited_groups.len()
	}
	/// Two distinct tiles at once.
	/// # Panics
	/// If `a == b`.
	pub(crate) fn get_two_mut(
		&mut self,
		a: TileId,
		b: TileId,
	) -> (&mut TileAtmosphere, &mut TileAtmosphere) {
		assert_ne!(a, b, "Tried to borrow tile {a:?} twice");
		if a.0 < b.0 {
			let (left, right) = self.tiles.split_at_mut(b.0);
			(&mut left[a.0], &mut right[0])
		} else {
			let (left, right) = self.tiles.split_at_mut(a.0);
			(&mut right[0], &mut left[b.0])
		}
	}
	/// Neighbors that gas can currently flow to, indexed by direction.
	pub(crate) fn open_neighbors(&self, id: TileId) -> [Option<TileId>; NUM_DIRECTIONS] {
		let tile = self.tile(id);
		let mut ret = [None; NUM_DIRECTIONS];
		for dir in tile.adjacent_bits.indices() {
			ret[dir] = tile.neighbors[dir];
			if ret[dir].is_none() {
				tracing::warn!(
					"Tile {:?} on grid {:?} is open towards {dir} but has no neighbor there",
					tile.coord,
					self.id
				);
			}
		}
		ret
	}
	/// Gets the tile at `coord`, making a fresh one with room-temperature empty air if needed.
	pub fn get_or_create_tile(&mut self, coord: TileCoord) -> TileId {
		if let Some(id) = self.tile_id(coord) {
			return id;
		}
		let id = TileId(self.tiles.len());
		self.tiles.push(TileAtmosphere::new(coord));
		self.positions.insert(coord, id);
		for dir in 0..NUM_DIRECTIONS {
			if let Some(other) = self.tile_id(offset(coord, dir)) {
				self.tiles[id.0].neighbors[dir] = Some(other);
				self.tiles[other.0].neighbors[OPP_DIR_INDEX[dir]] = Some(id);
			}
		}
		id
	}
	/// Recomputes which directions of this tile are open, updating the neighbors to match.
	pub(crate) fn update_adjacent(&mut self, id: TileId) {
		for dir in 0..NUM_DIRECTIONS {
			let direction = Directions::from_index(dir);
			match self.tile(id).neighbors[dir] {
				Some(other) => {
					let (tile, other_tile) = self.get_two_mut(id, other);
					let open = tile.has_air()
						&& other_tile.has_air()
						&& !tile.blocked_airflow.contains(direction)
						&& !other_tile.blocked_airflow.contains(direction.opposite());
					tile.adjacent_bits.set(direction, open);
					other_tile.adjacent_bits.set(direction.opposite(), open);
				}
				None => self.tile_mut(id).adjacent_bits.remove(direction),
			}
		}
	}
	/// Whether every open direction is mirrored by the neighbor on the other side.
	#[must_use]
	pub fn adjacency_is_symmetric(&self) -> bool {
		self.tiles.iter().all(|tile| {
			(0..NUM_DIRECTIONS).all(|dir| {
				let open = tile.adjacent_bits.contains(Directions::from_index(dir));
				match tile.neighbors[dir] {
					Some(other) => {
						open == self
							.tile(other)
							.adjacent_bits
							.contains(Directions::from_index(OPP_DIR_INDEX[dir]))
					}
					None => !open,
				}
			})
		})
	}
	pub(crate) fn add_active_tile(&mut self, id: TileId) {
		let tile = self.tile_mut(id);
		if !tile.has_air() {
			return;
		}
		tile.excited = true;
		self.active_tiles.insert(id);
	}
	/// Deactivates a tile. Its excited group is either disposed of entirely or just loses this tile.
	pub(crate) fn remove_active_tile(&mut self, id: TileId, dispose_group: bool) {
		self.active_tiles.swap_remove(&id);
		let tile = self.tile_mut(id);
		tile.excited = false;
		if let Some(group) = tile.excited_group {
			if dispose_group {
				self.excited_group_dispose(group);
			} else {
				self.excited_group_remove_tile(group, id);
			}
		}
	}
	pub(crate) fn new_group_id(&mut self) -> GroupId {
		self.next_group += 1;
		GroupId(self.next_group)
	}
	/// Queues a coordinate to be re-read from the airtight query at the start of the next cycle.
	pub fn invalidate(&mut self, coord: TileCoord) {
		self.invalidated_coords.insert(coord);
	}
	#[must_use]
	pub fn map_mixture(&self) -> Option<&Mixture> {
		self.map_mixture.as_ref()
	}
	pub fn set_map_mixture(&mut self, mixture: Option<Mixture>) {
		self.map_mixture = mixture;
	}
	/// Every mole on the grid, space excluded.
	#[must_use]
	pub fn total_moles(&self) -> f32 {
		self.tiles
			.iter()
			.filter_map(|tile| tile.air.as_ref())
			.filter(|air| !air.is_immutable())
			.map(Mixture::total_moles)
			.sum()
	}
	pub(crate) fn add_pipe_net(&mut self, id: PipeNetId, net: Box<dyn PipeNet>) {
		self.pipe_nets.insert(id, net);
	}
	pub(crate) fn remove_pipe_net(&mut self, id: PipeNetId) -> Option<Box<dyn PipeNet>> {
		self.run_pipe_nets.retain(|&queued| queued != id);
		self.pipe_nets.shift_remove(&id)
	}
	pub(crate) fn add_device(&mut self, id: DeviceId, device: Box<dyn AtmosDevice>) {
		self.devices.insert(
			id,
			DeviceSlot {
				device: Some(device),
				last_process: None,
			},
		);
	}
	pub(crate) fn remove_device(&mut self, id: DeviceId) -> Option<Box<dyn AtmosDevice>> {
		self.run_devices.retain(|&queued| queued != id);
		self.devices
			.shift_remove(&id)
			.and_then(|slot| slot.device)
	}

	fn tile_set(&self, which: TileQueue) -> &TileSet {
		match which {
			TileQueue::Active => &self.active_tiles,
			TileQueue::HighPressure => &self.high_pressure_delta,
			TileQueue::Hotspots => &self.hotspot_tiles,
			TileQueue::Superconductivity => &self.superconductivity_tiles,
		}
	}

	fn process_tile_queue(
		&mut self,
		ctx: &mut StageContext<'_>,
		which: TileQueue,
		process: fn(&mut Self, TileId, &mut StageContext<'_>),
	) -> bool {
		if !self.processing_paused {
			self.run_tiles = self.tile_set(which).iter().copied().collect();
		}
		let mut lag = LagCheck::new(ctx.config.lag_check_iterations);
		while let Some(id) = self.run_tiles.pop_front() {
			process(self, id, ctx);
			if lag.should_pause(ctx.budget) {
				return false;
			}
		}
		true
	}

	fn process_revalidate(&mut self, ctx: &mut StageContext<'_>) -> bool {
		if !self.processing_paused {
			self.run_coords = self.invalidated_coords.drain(..).collect();
		}
		let mut lag = LagCheck::new(ctx.config.revalidate_lag_check_iterations);
		while let Some(coord) = self.run_coords.pop_front() {
			revalidate_tile(self, coord, ctx);
			if lag.should_pause(ctx.budget) {
				return false;
			}
		}
		true
	}

	fn process_excited_groups(&mut self, ctx: &mut StageContext<'_>) -> bool {
		if !self.processing_paused {
			self.run_groups = self.excited_groups.keys().copied().collect();
		}
		let mut lag = LagCheck::new(ctx.config.lag_check_iterations);
		while let Some(group) = self.run_groups.pop_front() {
			process_excited_group(self, group, ctx);
			if lag.should_pause(ctx.budget) {
				return false;
			}
		}
		true
	}

	fn process_pipe_nets(&mut self, ctx: &mut StageContext<'_>) -> bool {
		if !self.processing_paused {
			self.run_pipe_nets = self.pipe_nets.keys().copied().collect();
		}
		let mut lag = LagCheck::new(ctx.config.lag_check_iterations);
		while let Some(id) = self.run_pipe_nets.pop_front() {
			if let Some(net) = self.pipe_nets.get_mut(&id) {
				net.update();
				for pipe in net.pipes() {
					let damage = pipe_overpressure_damage(
						pipe.pressure,
						pipe.max_pressure,
						pipe.damage,
						pipe.scaling,
					);
					if damage > 0.0 {
						ctx.damage.apply_damage(pipe.id, damage);
					}
				}
			}
			if lag.should_pause(ctx.budget) {
				return false;
			}
		}
		true
	}

	fn process_atmos_devices(&mut self, ctx: &mut StageContext<'_>) -> bool {
		if !self.processing_paused {
			self.run_devices = self.devices.keys().copied().collect();
		}
		let default_dt = ctx.config.real_atmos_time();
		let now = self.simulated_time;
		let mut lag = LagCheck::new(ctx.config.lag_check_iterations);
		while let Some(id) = self.run_devices.pop_front() {
			let Some((mut device, last_process)) = self
				.devices
				.get_mut(&id)
				.and_then(|slot| Some((slot.device.take()?, slot.last_process)))
			else {
				continue;
			};
			let dt = last_process.map_or(default_dt, |last| (now - last) as f32);
			device.update(
				dt,
				&mut DeviceContext {
					grid: self,
					events: &mut *ctx.events,
				},
			);
			// The device may have removed itself.
			if let Some(slot) = self.devices.get_mut(&id) {
				slot.device = Some(device);
				slot.last_process = Some(now);
			}
			if lag.should_pause(ctx.budget) {
				return false;
			}
		}
		true
	}

	/// Advances the grid by one stage. Returns false if the budget ran out, in which case the
	/// same stage resumes from its saved queue next time.
	pub(crate) fn process_state(&mut self, ctx: &mut StageContext<'_>) -> bool {
		let done = match self.state {
			ProcessingState::Revalidate => self.process_revalidate(ctx),
			ProcessingState::TileEqualize => {
				self.process_tile_queue(ctx, TileQueue::Active, equalize_pressure_in_zone)
			}
			ProcessingState::ActiveTiles => {
				self.process_tile_queue(ctx, TileQueue::Active, process_cell)
			}
			ProcessingState::ExcitedGroups => self.process_excited_groups(ctx),
			ProcessingState::HighPressureDelta => self.process_tile_queue(
				ctx,
				TileQueue::HighPressure,
				process_high_pressure_delta,
			),
			ProcessingState::Hotspots => {
				self.process_tile_queue(ctx, TileQueue::Hotspots, process_hotspot)
			}
			ProcessingState::Superconductivity => {
				self.process_tile_queue(ctx, TileQueue::Superconductivity, superconduct)
			}
			ProcessingState::PipeNet => self.process_pipe_nets(ctx),
			ProcessingState::AtmosDevices => self.process_atmos_devices(ctx),
		};
		if !done {
			self.processing_paused = true;
			tracing::debug!(
				"Grid {:?} paused in {:?} with {} tiles, {} groups and {} coordinates left",
				self.id,
				self.state,
				self.run_tiles.len(),
				self.run_groups.len(),
				self.run_coords.len()
			);
			return false;
		}
		self.processing_paused = false;
		// Toggles are only read here, so a config change never cuts a stage short.
		self.state = match self.state {
			ProcessingState::Revalidate => {
				if ctx.config.equalization_enabled() {
					ProcessingState::TileEqualize
				} else {
					ProcessingState::ActiveTiles
				}
			}
			ProcessingState::TileEqualize => ProcessingState::ActiveTiles,
			ProcessingState::ActiveTiles => {
				if ctx.config.excited_groups {
					ProcessingState::ExcitedGroups
				} else {
					ProcessingState::HighPressureDelta
				}
			}
			ProcessingState::ExcitedGroups => ProcessingState::HighPressureDelta,
			ProcessingState::HighPressureDelta => ProcessingState::Hotspots,
			ProcessingState::Hotspots => {
				if ctx.config.superconduction_enabled() {
					ProcessingState::Superconductivity
				} else {
					ProcessingState::PipeNet
				}
			}
			ProcessingState::Superconductivity => ProcessingState::PipeNet,
			ProcessingState::PipeNet => ProcessingState::AtmosDevices,
			ProcessingState::AtmosDevices => {
				self.update_counter += 1;
				ProcessingState::Revalidate
			}
		};
		true
	}

	pub(crate) fn advance_clock(&mut self, seconds: f32) {
		self.simulated_time += f64::from(seconds);
	}
}

/// What a device gets to touch while it runs: tile air, through the mixture API only.
pub struct DeviceContext<'a> {
	grid: &'a mut GridAtmosphere,
	events: &'a mut dyn AtmosEvents,
}

impl DeviceContext<'_> {
	#[must_use]
	pub fn grid_id(&self) -> GridId {
		self.grid.id()
	}
	#[must_use]
	pub fn tile_mixture(&self, coord: TileCoord) -> Option<&Mixture> {
		self.grid.tile_at(coord).and_then(|tile| tile.air.as_ref())
	}
	#[must_use]
	pub fn map_mixture(&self) -> Option<&Mixture> {
		self.grid.map_mixture()
	}
	fn touched(&mut self, id: TileId, coord: TileCoord) {
		self.grid.add_active_tile(id);
		self.events.invalidate_visuals(self.grid.id(), coord);
	}
	/// Adds gas to a tile. Returns false if there is no mutable air there.
	pub fn merge_into_tile(&mut self, coord: TileCoord, giver: &Mixture) -> bool {
		let Some(id) = self.grid.tile_id(coord) else {
			return false;
		};
		match self.grid.tile_mut(id).air.as_mut() {
			Some(air) if !air.is_immutable() => air.merge(giver),
			_ => return false,
		}
		self.touched(id, coord);
		true
	}
	/// Takes moles out of a tile. Space hands out empty mixtures.
	pub fn remove_from_tile(&mut self, coord: TileCoord, moles: f32) -> Mixture {
		let Some(id) = self.grid.tile_id(coord) else {
			return Mixture::from_vol(CELL_VOLUME);
		};
		let Some(removed) = self
			.grid
			.tile_mut(id)
			.air
			.as_mut()
			.map(|air| air.remove(moles))
		else {
			return Mixture::from_vol(CELL_VOLUME);
		};
		self.touched(id, coord);
		removed
	}
}


#[cfg(test)]
mod tests {
	use super::test_world::TestWorld;
	use super::*;

	#[test]
	fn neighbors_link_both_ways() {
		let mut grid = GridAtmosphere::new(GridId(0));
		let a = grid.get_or_create_tile((0, 0));
		let b = grid.get_or_create_tile((1, 0));
		assert_eq!(grid.tile(a).neighbors[2], Some(b));
		assert_eq!(grid.tile(b).neighbors[3], Some(a));
		assert_eq!(grid.get_or_create_tile((0, 0)), a);
		grid.update_adjacent(a);
		assert!(grid.tile(a).adjacent_bits.contains(Directions::EAST));
		assert!(grid.tile(b).adjacent_bits.contains(Directions::WEST));
		assert!(grid.adjacency_is_symmetric());
	}

	#[test]
	fn blocked_airflow_closes_both_sides() {
		let mut world = TestWorld::new();
		world.room((0, 0), (2, 0));
		assert!(world.grid.adjacency_is_symmetric());
		world.map.airtight.insert(
			(1, 0),
			crate::interfaces::AirtightInfo {
				blocked: Directions::EAST,
				..Default::default()
			},
		);
		world.grid.invalidate((1, 0));
		world.revalidate();
		let middle = world.grid.tile_at((1, 0)).unwrap();
		assert!(!middle.adjacent_bits.contains(Directions::EAST));
		assert!(middle.adjacent_bits.contains(Directions::WEST));
		assert!(!world
			.grid
			.tile_at((2, 0))
			.unwrap()
			.adjacent_bits
			.contains(Directions::WEST));
		assert!(world.grid.adjacency_is_symmetric());
	}

	#[test]
	fn walls_have_no_adjacency() {
		let mut world = TestWorld::new();
		world.map.wall((1, 0));
		world.room((0, 0), (2, 0));
		assert!(world.grid.tile_at((1, 0)).unwrap().air.is_none());
		assert!(world.grid.tile_at((0, 0)).unwrap().adjacent_bits.is_empty());
		assert!(world.grid.adjacency_is_symmetric());
	}

	#[test]
	fn stage_order_follows_toggles() {
		let mut world = TestWorld::new();
		world.room((0, 0), (1, 1));
		let mut seen = Vec::new();
		for _ in 0..ProcessingState::COUNT {
			seen.push(world.grid.state);
			let (grid, mut ctx) = world.split();
			assert!(grid.process_state(&mut ctx));
		}
		assert_eq!(seen[0], ProcessingState::Revalidate);
		assert_eq!(world.grid.update_counter, 2);

		world.config.excited_groups = false;
		world.config.monstermos_equalization = false;
		world.config.superconduction = false;
		let mut seen = Vec::new();
		let start = world.grid.update_counter;
		while world.grid.update_counter == start {
			seen.push(world.grid.state);
			let (grid, mut ctx) = world.split();
			assert!(grid.process_state(&mut ctx));
		}
		assert_eq!(
			seen,
			vec![
				ProcessingState::Revalidate,
				ProcessingState::ActiveTiles,
				ProcessingState::HighPressureDelta,
				ProcessingState::Hotspots,
				ProcessingState::PipeNet,
				ProcessingState::AtmosDevices,
			]
		);
	}

	#[test]
	fn zero_budget_pauses_and_resumes() {
		let mut world = TestWorld::new();
		world.room((0, 0), (9, 9));
		world.budget = Budget::new(Duration::from_millis(0));
		world.grid.state = ProcessingState::ActiveTiles;
		let total = world.grid.active_tiles.len();
		assert!(total > world.config.lag_check_iterations + 1);
		let (grid, mut ctx) = world.split();
		assert!(!grid.process_state(&mut ctx));
		assert!(grid.processing_paused);
		assert_eq!(grid.state, ProcessingState::ActiveTiles);
		let left = grid.run_tiles.len();
		assert_eq!(left, total - (world.config.lag_check_iterations + 1));
		// Resuming continues the saved queue instead of starting over.
		let (grid, mut ctx) = world.split();
		let _ = grid.process_state(&mut ctx);
		assert!(world.grid.run_tiles.len() < left);
	}

	#[test]
	fn two_mut_returns_the_right_tiles() {
		let mut grid = GridAtmosphere::new(GridId(0));
		let a = grid.get_or_create_tile((0, 0));
		let b = grid.get_or_create_tile((5, 5));
		let (ta, tb) = grid.get_two_mut(b, a);
		assert_eq!(ta.coord, (5, 5));
		assert_eq!(tb.coord, (0, 0));
	}
}

//! The entry point: owns every grid, the host collaborators, and the resumable update loop.

use crate::atmos_grid::{Budget, DeviceId, GridAtmosphere, GridId, PipeNetId, StageContext};

use crate::config::{default_config, AtmosConfig};

use crate::gas::{constants::*, Mixture};

use crate::interfaces::{
	AirtightInfo, AirtightQuery, AtmosDevice, AtmosEvents, ContainingMixtureResolver,
	DamageSink, EntityId, PipeId, PipeNet,
};

use crate::turfs::{hotspot, TileCoord};

use eyre::Result;

use fxhash::FxBuildHasher;

use indexmap::IndexMap;

use rand::{rngs::StdRng, SeedableRng};

use std::sync::Arc;

/// Everything open, nothing is space. For hosts that haven't wired up a map yet.
struct OpenMap;

impl AirtightQuery for OpenMap {
	fn airtight(&self, _grid: GridId, _coord: TileCoord) -> AirtightInfo {
		AirtightInfo::default()
	}
}

impl DamageSink for () {
	fn apply_damage(&mut self, _pipe: PipeId, _amount: f32) {}
}

pub struct AtmosphereSystem {
	config: Arc<AtmosConfig>,
	grids: IndexMap<GridId, GridAtmosphere, FxBuildHasher>,
	airtight: Box<dyn AirtightQuery>,
	events: Box<dyn AtmosEvents>,
	damage: Box<dyn DamageSink>,
	resolvers: Vec<Box<dyn ContainingMixtureResolver>>,
	rng: StdRng,
	current_run: Vec<GridId>,
	current_run_index: usize,
	simulation_paused: bool,
	next_pipe_net: u64,
	next_device: u64,
}

impl Default for AtmosphereSystem {
	fn default() -> Self {
		Self::new()
	}
}

impl AtmosphereSystem {
	/// A system with the process-wide default config and no-op collaborators.
	#[must_use]
	pub fn new() -> Self {
		Self {
			config: default_config(),
			grids: IndexMap::with_hasher(FxBuildHasher::default()),
			airtight: Box::new(OpenMap),
			events: Box::new(()),
			damage: Box::new(()),
			resolvers: Vec::new(),
			rng: StdRng::from_os_rng(),
			current_run: Vec::new(),
			current_run_index: 0,
			simulation_paused: false,
			next_pipe_net: 0,
			next_device: 0,
		}
	}
	/// # Errors
	/// If the config doesn't validate.
	pub fn with_config(config: AtmosConfig) -> Result<Self> {
		let mut system = Self::new();
		system.set_config(config)?;
		Ok(system)
	}
	/// Takes effect at the next stage boundary of each grid.
	/// # Errors
	/// If the config doesn't validate; the old one stays in place.
	pub fn set_config(&mut self, config: AtmosConfig) -> Result<()> {
		config.validate()?;
		self.config = Arc::new(config);
		Ok(())
	}
	#[must_use]
	pub fn config(&self) -> &Arc<AtmosConfig> {
		&self.config
	}
	pub fn set_airtight_query(&mut self, airtight: Box<dyn AirtightQuery>) {
		self.airtight = airtight;
	}
	pub fn set_events(&mut self, events: Box<dyn AtmosEvents>) {
		self.events = events;
	}
	pub fn set_damage_sink(&mut self, damage: Box<dyn DamageSink>) {
		self.damage = damage;
	}
	pub fn add_containing_mixture_resolver(&mut self, resolver: Box<dyn ContainingMixtureResolver>) {
		self.resolvers.push(resolver);
	}
	/// Makes floor ripping reproducible.
	pub fn seed_rng(&mut self, seed: u64) {
		self.rng = StdRng::seed_from_u64(seed);
	}
	/// Seconds a device sees between two of its updates when nothing falls behind.
	#[must_use]
	pub fn real_atmos_time(&self) -> f32 {
		self.config.real_atmos_time()
	}
	#[must_use]
	pub fn is_simulation_paused(&self) -> bool {
		self.simulation_paused
	}

	/// Returns false if the grid already existed.
	pub fn add_grid(&mut self, id: GridId) -> bool {
		if self.grids.contains_key(&id) {
			return false;
		}
		tracing::info!("Adding atmosphere to grid {id:?}");
		self.grids.insert(id, GridAtmosphere::new(id));
		true
	}
	pub fn remove_grid(&mut self, id: GridId) -> Option<GridAtmosphere> {
		let removed = self.grids.shift_remove(&id)?;
		if let Some(position) = self.current_run.iter().position(|&queued| queued == id) {
			self.current_run.remove(position);
			if position < self.current_run_index {
				self.current_run_index -= 1;
			}
		}
		tracing::info!("Removed atmosphere from grid {id:?}");
		Some(removed)
	}
	#[must_use]
	pub fn grid(&self, id: GridId) -> Option<&GridAtmosphere> {
		self.grids.get(&id)
	}
	pub fn grid_mut(&mut self, id: GridId) -> Option<&mut GridAtmosphere> {
		self.grids.get_mut(&id)
	}
	pub fn grids(&self) -> impl Iterator<Item = &GridAtmosphere> {
		self.grids.values()
	}
	/// Unsimulated grids keep their state but are skipped by `update`.
	pub fn set_simulated_grid(&mut self, id: GridId, simulated: bool) -> bool {
		self.grids
			.get_mut(&id)
			.map(|grid| grid.simulated = simulated)
			.is_some()
	}
	#[must_use]
	pub fn is_simulated_grid(&self, id: GridId) -> bool {
		self.grids.get(&id).is_some_and(|grid| grid.simulated)
	}
	pub fn set_grid_paused(&mut self, id: GridId, paused: bool) -> bool {
		self.grids
			.get_mut(&id)
			.map(|grid| grid.paused = paused)
			.is_some()
	}

	/// Marks a tile for rereading from the airtight query at the start of the next cycle.
	pub fn invalidate_tile(&mut self, grid: GridId, coord: TileCoord) -> bool {
		self.grids
			.get_mut(&grid)
			.map(|grid| grid.invalidate(coord))
			.is_some()
	}
	/// A tile's air, or `None` for walls and unknown tiles. `excite` wakes the tile up, for
	/// callers about to change it through some other path.
	pub fn get_tile_mixture(&mut self, grid: GridId, coord: TileCoord, excite: bool) -> Option<&Mixture> {
		let grid = self.grids.get_mut(&grid)?;
		let id = grid.tile_id(coord)?;
		if excite {
			grid.add_active_tile(id);
		}
		grid.tile(id).air.as_ref()
	}
	/// Every tile's air on a grid.
	pub fn get_all_mixtures(&mut self, grid: GridId, excite: bool) -> Vec<(TileCoord, &Mixture)> {
		let Some(grid) = self.grids.get_mut(&grid) else {
			return Vec::new();
		};
		if excite {
			let ids: Vec<_> = grid
				.tiles()
				.filter(|(_, tile)| tile.has_air())
				.map(|(id, _)| id)
				.collect();
			for id in ids {
				grid.add_active_tile(id);
			}
		}
		grid.tiles()
			.filter_map(|(_, tile)| tile.air.as_ref().map(|air| (tile.coord, air)))
			.collect()
	}
	/// The air of every neighbor gas can currently flow to.
	#[must_use]
	pub fn get_adjacent_tile_mixtures(&self, grid: GridId, coord: TileCoord) -> Vec<&Mixture> {
		let Some(grid) = self.grids.get(&grid) else {
			return Vec::new();
		};
		let Some(id) = grid.tile_id(coord) else {
			return Vec::new();
		};
		grid.open_neighbors(id)
			.into_iter()
			.flatten()
			.filter_map(|other| grid.tile(other).air.as_ref())
			.collect()
	}
	/// What an entity breathes: a resolver's answer if any has one, else the tile's air,
	/// else the grid's map mixture, else vacuum.
	#[must_use]
	pub fn get_containing_mixture(
		&self,
		entity: EntityId,
		location: Option<(GridId, TileCoord)>,
	) -> Mixture {
		if let Some(mixture) = self
			.resolvers
			.iter()
			.find_map(|resolver| resolver.containing_mixture(entity))
		{
			return mixture;
		}
		let Some((grid_id, coord)) = location else {
			return Mixture::space();
		};
		let Some(grid) = self.grids.get(&grid_id) else {
			return Mixture::space();
		};
		grid.tile_at(coord)
			.and_then(|tile| tile.air.clone())
			.or_else(|| grid.map_mixture().cloned())
			.unwrap_or_else(Mixture::space)
	}
	pub fn set_map_mixture(&mut self, grid: GridId, mixture: Option<Mixture>) -> bool {
		self.grids
			.get_mut(&grid)
			.map(|grid| grid.set_map_mixture(mixture))
			.is_some()
	}

	/// Exposes a tile to heat, possibly lighting a fire there.
	pub fn hotspot_expose(
		&mut self,
		grid: GridId,
		coord: TileCoord,
		temperature: f32,
		volume: f32,
		soh: bool,
	) -> bool {
		let Some(grid) = self.grids.get_mut(&grid) else {
			return false;
		};
		let Some(id) = grid.tile_id(coord) else {
			return false;
		};
		hotspot::hotspot_expose(grid, id, temperature, volume, soh)
	}
	pub fn hotspot_extinguish(&mut self, grid_id: GridId, coord: TileCoord) -> bool {
		let Some(grid) = self.grids.get_mut(&grid_id) else {
			return false;
		};
		let Some(id) = grid.tile_id(coord) else {
			return false;
		};
		let extinguished = hotspot::hotspot_extinguish(grid, id);
		if extinguished {
			self.events.invalidate_visuals(grid_id, coord);
		}
		extinguished
	}
	#[must_use]
	pub fn is_hotspot_active(&self, grid: GridId, coord: TileCoord) -> bool {
		self.grids
			.get(&grid)
			.and_then(|grid| grid.tile_at(coord))
			.is_some_and(|tile| tile.hotspot.valid)
	}

	pub fn add_pipe_net(&mut self, grid: GridId, net: Box<dyn PipeNet>) -> Option<PipeNetId> {
		let grid = self.grids.get_mut(&grid)?;
		self.next_pipe_net += 1;
		let id = PipeNetId(self.next_pipe_net);
		grid.add_pipe_net(id, net);
		Some(id)
	}
	pub fn remove_pipe_net(&mut self, grid: GridId, id: PipeNetId) -> Option<Box<dyn PipeNet>> {
		self.grids.get_mut(&grid)?.remove_pipe_net(id)
	}
	pub fn add_atmos_device(&mut self, grid: GridId, device: Box<dyn AtmosDevice>) -> Option<DeviceId> {
		let grid = self.grids.get_mut(&grid)?;
		self.next_device += 1;
		let id = DeviceId(self.next_device);
		grid.add_device(id, device);
		Some(id)
	}
	pub fn remove_atmos_device(&mut self, grid: GridId, id: DeviceId) -> Option<Box<dyn AtmosDevice>> {
		self.grids.get_mut(&grid)?.remove_device(id)
	}

	/// Advances the simulation by `frame_time` seconds of wall clock. Each grid whose timer
	/// has built up a full atmos tick moves one stage along. If the time budget runs out the
	/// call returns early, and the next call resumes at the same grid and stage.
	pub fn update(&mut self, frame_time: f32) {
		let budget = Budget::new(self.config.max_process_time);
		let config = Arc::clone(&self.config);
		let atmos_time = config.atmos_time();
		if !self.simulation_paused {
			self.current_run_index = 0;
			self.current_run = self.grids.keys().copied().collect();
		}
		self.simulation_paused = true;
		while self.current_run_index < self.current_run.len() {
			let grid_id = self.current_run[self.current_run_index];
			let Some(grid) = self.grids.get_mut(&grid_id) else {
				self.current_run_index += 1;
				continue;
			};
			if grid.paused || !grid.simulated {
				self.current_run_index += 1;
				continue;
			}
			grid.timer += frame_time;
			if grid.timer < atmos_time {
				self.current_run_index += 1;
				continue;
			}
			grid.timer -= atmos_time;
			grid.advance_clock(atmos_time);

			let stage = grid.state;
			let _span = tracing::trace_span!("atmos_stage", grid = grid_id.0, ?stage).entered();
			let mut ctx = StageContext {
				config: &config,
				airtight: &*self.airtight,
				events: &mut *self.events,
				damage: &mut *self.damage,
				rng: &mut self.rng,
				budget: &budget,
			};
			if !grid.process_state(&mut ctx) {
				return;
			}
			self.current_run_index += 1;
		}
		self.simulation_paused = false;
	}
}

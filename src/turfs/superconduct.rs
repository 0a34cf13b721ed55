use crate::atmos_grid::{GridAtmosphere, StageContext};

use crate::gas::{constants::*, Mixture};

use super::{TileAtmosphere, TileId, NUM_DIRECTIONS};

/// Conducts heat from a tile into every neighbor that conducts, walls included.
pub(crate) fn superconduct(grid: &mut GridAtmosphere, id: TileId, ctx: &mut StageContext<'_>) {
	let cycle = grid.update_counter;
	if grid.tile(id).archived_cycle < cycle {
		grid.tile_mut(id).archive(cycle);
	}
	for dir in 0..NUM_DIRECTIONS {
		let Some(neighbor) = grid.tile(id).neighbors[dir] else {
			continue;
		};
		let neighbor_tile = grid.tile_mut(neighbor);
		if neighbor_tile.thermal_conductivity == 0.0 {
			continue;
		}
		if neighbor_tile.archived_cycle < cycle {
			neighbor_tile.archive(cycle);
		}
		neighbor_conduct_with_source(grid, neighbor, id);
		consider_superconductivity(grid, neighbor, ctx);
	}
	radiate_to_space(grid.tile_mut(id));
	finish_superconduction(grid, id);
}

fn neighbor_conduct_with_source(grid: &mut GridAtmosphere, id: TileId, source: TileId) {
	let (tile, source_tile) = grid.get_two_mut(id, source);
	match (tile.has_air(), source_tile.has_air()) {
		(false, true) => temperature_share_open_to_solid(source_tile, tile),
		(false, false) => temperature_share_mutual_solid(source_tile, tile),
		(true, true) => {
			if let (Some(air), Some(source_air)) = (tile.air.as_mut(), source_tile.air.as_mut()) {
				source_air.temperature_share(air, WINDOW_HEAT_TRANSFER_COEFFICIENT);
			}
			grid.add_active_tile(id);
		}
		(true, false) => {
			temperature_share_open_to_solid(tile, source_tile);
			grid.add_active_tile(id);
		}
	}
}

fn temperature_share_open_to_solid(open: &mut TileAtmosphere, solid: &mut TileAtmosphere) {
	if let Some(air) = open.air.as_mut() {
		solid.temperature = air.temperature_share_non_gas(
			solid.thermal_conductivity,
			solid.temperature,
			solid.heat_capacity,
		);
	}
}

fn temperature_share_mutual_solid(tile: &mut TileAtmosphere, other: &mut TileAtmosphere) {
	let delta = tile.temperature_archived - other.temperature_archived;
	if delta.abs() <= MINIMUM_TEMPERATURE_DELTA_TO_CONSIDER
		|| tile.heat_capacity <= 0.0
		|| other.heat_capacity <= 0.0
	{
		return;
	}
	let heat = other.thermal_conductivity
		* delta * (tile.heat_capacity * other.heat_capacity
		/ (tile.heat_capacity + other.heat_capacity));
	tile.temperature -= heat / tile.heat_capacity;
	other.temperature += heat / other.heat_capacity;
}

/// Bare tiles lose heat to the void.
fn radiate_to_space(tile: &mut TileAtmosphere) {
	if tile.temperature <= T0C {
		return;
	}
	let delta = tile.temperature_archived - TCMB;
	if tile.heat_capacity > 0.0 && delta.abs() > MINIMUM_TEMPERATURE_DELTA_TO_CONSIDER {
		let heat = tile.thermal_conductivity
			* delta * (tile.heat_capacity * HEAT_CAPACITY_VACUUM
			/ (tile.heat_capacity + HEAT_CAPACITY_VACUUM));
		tile.temperature = (tile.temperature - heat / tile.heat_capacity).max(TCMB);
	}
}

fn finish_superconduction(grid: &mut GridAtmosphere, id: TileId) {
	let tile = grid.tile_mut(id);
	if let Some(air) = tile.air.as_mut() {
		tile.temperature = air.temperature_share_non_gas(
			tile.thermal_conductivity,
			tile.temperature,
			tile.heat_capacity,
		);
	}
	let temperature = tile
		.air
		.as_ref()
		.map_or(tile.temperature, Mixture::get_temperature);
	if temperature < MINIMUM_TEMPERATURE_FOR_SUPERCONDUCTION {
		grid.superconductivity_tiles.swap_remove(&id);
	}
}

/// Queues a tile for superconduction if it can conduct at all.
pub(crate) fn consider_superconductivity(
	grid: &mut GridAtmosphere,
	id: TileId,
	ctx: &StageContext<'_>,
) -> bool {
	if grid.tile(id).thermal_conductivity == 0.0 || !ctx.config.superconduction_enabled() {
		return false;
	}
	grid.superconductivity_tiles.insert(id);
	true
}

/// As above, but only hot air with enough heat capacity gets to start conducting.
pub(crate) fn consider_superconductivity_starting(
	grid: &mut GridAtmosphere,
	id: TileId,
	ctx: &StageContext<'_>,
) -> bool {
	if !ctx.config.superconduction_enabled() {
		return false;
	}
	let hot_enough = grid.tile(id).air.as_ref().is_some_and(|air| {
		air.get_temperature() >= MINIMUM_TEMPERATURE_START_SUPERCONDUCTION
			&& air.heat_capacity() >= M_CELL_WITH_RATIO
	});
	hot_enough && consider_superconductivity(grid, id, ctx)
}

use crate::atmos_grid::{GridAtmosphere, StageContext};

use crate::gas::{constants::*, FireGases, Mixture};

use crate::reaction::react;

use super::{Hotspot, TileId};

fn has_fuel(air: &Mixture, gases: &FireGases) -> bool {
	air.get_moles(gases.plasma) > HOTSPOT_MINIMUM_REACTANT_MOLES
		|| air.get_moles(gases.tritium) > HOTSPOT_MINIMUM_REACTANT_MOLES
}

/// Exposes a tile to heat. Lights a hotspot if there's enough oxygen and fuel and it's hot
/// enough; an already burning hotspot only ever gets hotter or bigger, and only when
/// `soh` is set. Returns whether the tile has a hotspot afterwards.
pub fn hotspot_expose(
	grid: &mut GridAtmosphere,
	id: TileId,
	exposed_temperature: f32,
	exposed_volume: f32,
	soh: bool,
) -> bool {
	let Ok(gases) = FireGases::get() else {
		return false;
	};
	let cycle = grid.update_counter;
	let tile = grid.tile_mut(id);
	let Some(air) = tile.air.as_ref() else {
		return false;
	};
	if air.get_moles(gases.oxygen) < HOTSPOT_MINIMUM_REACTANT_MOLES {
		return tile.hotspot.valid;
	}
	let fuel = has_fuel(air, &gases);
	if tile.hotspot.valid {
		if soh && fuel {
			tile.hotspot.temperature = tile.hotspot.temperature.max(exposed_temperature);
			tile.hotspot.volume = tile.hotspot.volume.max(exposed_volume);
		}
		return true;
	}
	if exposed_temperature > PLASMA_MINIMUM_BURN_TEMPERATURE && fuel {
		tile.hotspot = Hotspot {
			valid: true,
			skipped_first_process: tile.current_cycle > cycle,
			bypassing: false,
			temperature: exposed_temperature,
			volume: exposed_volume * HOTSPOT_EXPOSED_VOLUME_SCALE,
			state: 1,
		};
		grid.add_active_tile(id);
		grid.hotspot_tiles.insert(id);
		return true;
	}
	false
}

/// Puts out a tile's fire. Returns whether there was one.
pub fn hotspot_extinguish(grid: &mut GridAtmosphere, id: TileId) -> bool {
	let tile = grid.tile_mut(id);
	let was_valid = tile.hotspot.valid;
	tile.hotspot = Hotspot::default();
	grid.hotspot_tiles.swap_remove(&id);
	was_valid
}

fn perform_hotspot_exposure(grid: &mut GridAtmosphere, id: TileId, ctx: &mut StageContext<'_>) {
	let grid_id = grid.id();
	let tile = grid.tile_mut(id);
	let Some(air) = tile.air.as_mut() else {
		return;
	};
	if !tile.hotspot.valid {
		return;
	}
	tile.hotspot.bypassing = tile.hotspot.skipped_first_process
		&& tile.hotspot.volume > air.volume * HOTSPOT_BYPASS_VOLUME_RATIO;
	if tile.hotspot.bypassing {
		tile.hotspot.volume = air.reaction_results.fire * FIRE_GROWTH_RATE;
		tile.hotspot.temperature = air.get_temperature();
	} else {
		let mut affected = air.remove_volume(tile.hotspot.volume);
		affected.set_temperature(tile.hotspot.temperature);
		// The hotspot is already valid, and exposing a valid hotspot without `soh` changes nothing.
		react(&mut affected, &mut ());
		tile.hotspot.temperature = affected.get_temperature();
		tile.hotspot.volume = affected.reaction_results.fire * FIRE_GROWTH_RATE;
		air.merge(&affected);
	}
	ctx.events
		.tile_fire(grid_id, tile.coord, tile.hotspot.temperature, tile.hotspot.volume);
}

/// One pass over a burning tile: keep it active, burn, and spread if the fire fills the tile.
pub(crate) fn process_hotspot(grid: &mut GridAtmosphere, id: TileId, ctx: &mut StageContext<'_>) {
	if !grid.tile(id).hotspot.valid {
		grid.hotspot_tiles.swap_remove(&id);
		return;
	}
	if !grid.tile(id).excited {
		grid.add_active_tile(id);
	}
	if !grid.tile(id).hotspot.skipped_first_process {
		grid.tile_mut(id).hotspot.skipped_first_process = true;
		return;
	}
	if let Some(group) = grid.tile(id).excited_group {
		grid.excited_group_reset_cooldowns(group);
	}
	let Ok(gases) = FireGases::get() else {
		return;
	};
	let burning = {
		let tile = grid.tile(id);
		tile.hotspot.temperature >= FIRE_MINIMUM_TEMPERATURE_TO_EXIST
			&& tile.hotspot.volume > 1.0
			&& tile.air.as_ref().is_some_and(|air| {
				air.get_moles(gases.oxygen) >= HOTSPOT_MINIMUM_REACTANT_MOLES
					&& has_fuel(air, &gases)
			})
	};
	if !burning {
		grid.tile_mut(id).hotspot = Hotspot::default();
		let coord = grid.tile(id).coord;
		ctx.events.invalidate_visuals(grid.id(), coord);
		return;
	}

	perform_hotspot_exposure(grid, id, ctx);

	let tile = grid.tile_mut(id);
	if tile.hotspot.bypassing {
		tile.hotspot.state = 3;
		let air_temperature = tile.air.as_ref().map_or(0.0, Mixture::get_temperature);
		if air_temperature > FIRE_MINIMUM_TEMPERATURE_TO_SPREAD {
			let radiated_temperature = air_temperature * FIRE_SPREAD_RADIOSITY_SCALE;
			for neighbor in grid.open_neighbors(id).into_iter().flatten() {
				if !grid.tile(neighbor).hotspot.valid {
					hotspot_expose(
						grid,
						neighbor,
						radiated_temperature,
						CELL_VOLUME / 4.0,
						false,
					);
				}
			}
		}
	} else {
		tile.hotspot.state = if tile.hotspot.volume > CELL_VOLUME * HOTSPOT_LARGE_VOLUME_RATIO {
			2
		} else {
			1
		};
	}
	let tile = grid.tile_mut(id);
	if tile.hotspot.temperature > tile.max_fire_temperature_sustained {
		tile.max_fire_temperature_sustained = tile.hotspot.temperature;
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::atmos_grid::test_world::TestWorld;

	fn fuel_air(world: &mut TestWorld, coord: (i32, i32), oxygen: f32, plasma: f32) {
		let gases = FireGases::resolve().unwrap();
		let air = world.air_mut(coord);
		air.set_moles(gases.oxygen, oxygen);
		air.set_moles(gases.plasma, plasma);
	}

	#[test]
	fn ignites_with_fuel_and_oxygen() {
		let mut world = TestWorld::new();
		world.room((0, 0), (0, 0));
		fuel_air(&mut world, (0, 0), 0.6, 0.6);
		let id = world.id((0, 0));
		assert!(hotspot_expose(&mut world.grid, id, 400.0, CELL_VOLUME, false));
		let hotspot = world.grid.tile(id).hotspot;
		assert!(hotspot.valid);
		assert_eq!(hotspot.state, 1);
		assert_eq!(hotspot.volume, CELL_VOLUME * HOTSPOT_EXPOSED_VOLUME_SCALE);
		assert!(world.grid.hotspot_tiles.contains(&id));
		assert!(world.grid.active_tiles.contains(&id));
	}

	#[test]
	fn needs_heat_oxygen_and_fuel() {
		let mut world = TestWorld::new();
		world.room((0, 0), (2, 0));
		fuel_air(&mut world, (0, 0), 0.6, 0.6);
		fuel_air(&mut world, (1, 0), 0.4, 5.0);
		fuel_air(&mut world, (2, 0), 5.0, 0.1);
		let ids: Vec<_> = (0..3).map(|x| world.id((x, 0))).collect();
		assert!(!hotspot_expose(&mut world.grid, ids[0], 300.0, CELL_VOLUME, false));
		assert!(!hotspot_expose(&mut world.grid, ids[1], 1000.0, CELL_VOLUME, false));
		assert!(!hotspot_expose(&mut world.grid, ids[2], 1000.0, CELL_VOLUME, false));
		assert!(world.grid.hotspot_tiles.is_empty());
	}

	#[test]
	fn weaker_exposure_never_shrinks() {
		let mut world = TestWorld::new();
		world.room((0, 0), (0, 0));
		fuel_air(&mut world, (0, 0), 5.0, 5.0);
		let id = world.id((0, 0));
		hotspot_expose(&mut world.grid, id, 800.0, 500.0, false);
		let before = world.grid.tile(id).hotspot;
		assert!(hotspot_expose(&mut world.grid, id, 500.0, 10.0, true));
		assert!(hotspot_expose(&mut world.grid, id, 2000.0, 10.0, false));
		let after = world.grid.tile(id).hotspot;
		assert_eq!(after.temperature, before.temperature);
		assert_eq!(after.volume, before.volume);
		assert!(hotspot_expose(&mut world.grid, id, 2000.0, 10.0, true));
		assert_eq!(world.grid.tile(id).hotspot.temperature, 2000.0);
	}

	#[test]
	fn fire_burns_and_reports() {
		let gases = FireGases::resolve().unwrap();
		let mut world = TestWorld::new();
		world.config.monstermos_equalization = false;
		world.room((0, 0), (0, 0));
		fuel_air(&mut world, (0, 0), 20.0, 5.0);
		let id = world.id((0, 0));
		// Small enough that the first burn only touches part of the tile.
		assert!(hotspot_expose(&mut world.grid, id, 600.0, 50.0, false));
		for _ in 0..3 {
			world.cycle();
		}
		assert!(!world.events.fires.is_empty());
		let air = world.grid.tile(id).air.as_ref().unwrap();
		assert!(air.get_moles(gases.plasma) < 5.0);
		assert!(air.get_moles(gases.co2) > 0.0);
		assert!(world.grid.tile(id).max_fire_temperature_sustained > 0.0);
	}

	#[test]
	fn fire_dies_without_fuel() {
		let mut world = TestWorld::new();
		world.room((0, 0), (0, 0));
		fuel_air(&mut world, (0, 0), 5.0, 5.0);
		let id = world.id((0, 0));
		hotspot_expose(&mut world.grid, id, 600.0, CELL_VOLUME, false);
		let gases = FireGases::resolve().unwrap();
		world.air_mut((0, 0)).set_moles(gases.plasma, 0.0);
		let (grid, mut ctx) = world.split();
		process_hotspot(grid, id, &mut ctx);
		process_hotspot(grid, id, &mut ctx);
		assert!(!grid.tile(id).hotspot.valid);
		process_hotspot(grid, id, &mut ctx);
		assert!(!grid.hotspot_tiles.contains(&id));
	}

	#[test]
	fn extinguish_reports_previous_state() {
		let mut world = TestWorld::new();
		world.room((0, 0), (0, 0));
		fuel_air(&mut world, (0, 0), 5.0, 5.0);
		let id = world.id((0, 0));
		assert!(!hotspot_extinguish(&mut world.grid, id));
		hotspot_expose(&mut world.grid, id, 600.0, CELL_VOLUME, false);
		assert!(hotspot_extinguish(&mut world.grid, id));
		assert!(!world.grid.tile(id).hotspot.valid);
	}
}

use crate::atmos_grid::{GridAtmosphere, StageContext};

use crate::gas::{constants::*, GasCompareResult};

use crate::reaction::react;

use super::{
	hotspot::hotspot_expose, superconduct::consider_superconductivity_starting, Directions,
	FireExposure, TileId, OPP_DIR_INDEX,
};

/// One LINDA step for an active tile: share with every open neighbor that hasn't gone yet
/// this cycle, react, and then decide whether the tile can go to sleep.
pub(crate) fn process_cell(grid: &mut GridAtmosphere, id: TileId, ctx: &mut StageContext<'_>) {
	let cycle = grid.update_counter;
	if !grid.tile(id).has_air() {
		grid.remove_active_tile(id, true);
		return;
	}
	{
		let tile = grid.tile_mut(id);
		if tile.archived_cycle < cycle {
			tile.archive(cycle);
		}
		tile.current_cycle = cycle;
	}
	let adjacent_bits = grid.tile(id).adjacent_bits;
	let adjacent_count = adjacent_bits.bits().count_ones() as usize;
	let mut shared_any = false;
	for (dir, enemy) in grid.open_neighbors(id).into_iter().enumerate() {
		let Some(enemy) = enemy else {
			continue;
		};
		{
			let enemy_tile = grid.tile(enemy);
			if !enemy_tile.has_air() || cycle <= enemy_tile.current_cycle {
				continue;
			}
		}
		grid.tile_mut(enemy).archive(cycle);
		let our_group = grid.tile(id).excited_group;
		let their_group = grid.tile(enemy).excited_group;
		let mut should_share = false;
		if let (true, Some(ours), Some(theirs)) =
			(ctx.config.excited_groups, our_group, their_group)
		{
			if ours != theirs {
				grid.excited_group_merge(ours, theirs);
			}
			should_share = true;
		} else {
			let exchange = match (&grid.tile(id).air, &grid.tile(enemy).air) {
				(Some(air), Some(enemy_air)) => air.compare_exchange(enemy_air),
				_ => GasCompareResult::NoExchange,
			};
			if exchange != GasCompareResult::NoExchange {
				if !grid.tile(enemy).excited {
					grid.add_active_tile(enemy);
				}
				if ctx.config.excited_groups {
					let group = match our_group.or(their_group) {
						Some(group) => group,
						None => grid.create_excited_group(),
					};
					if our_group.is_none() {
						grid.excited_group_add_tile(group, id);
					}
					if their_group.is_none() {
						grid.excited_group_add_tile(group, enemy);
					}
				}
				should_share = true;
			}
		}
		if !should_share {
			continue;
		}
		let difference = {
			let (tile, enemy_tile) = grid.get_two_mut(id, enemy);
			match (tile.air.as_mut(), enemy_tile.air.as_mut()) {
				(Some(air), Some(enemy_air)) => air.share(enemy_air, adjacent_count),
				_ => 0.0,
			}
		};
		// Equalization leaves its own wind behind, so only plain diffusion records it here.
		if !ctx.config.equalization_enabled() && difference != 0.0 {
			if difference > 0.0 {
				grid.high_pressure_delta.insert(id);
				grid.tile_mut(id)
					.consider_pressure_difference(Directions::from_index(dir), difference);
			} else {
				grid.high_pressure_delta.insert(enemy);
				grid.tile_mut(enemy).consider_pressure_difference(
					Directions::from_index(OPP_DIR_INDEX[dir]),
					-difference,
				);
			}
		}
		last_share_check(grid, id);
		shared_any = true;
	}

	let mut exposure = FireExposure::default();
	if let Some(air) = grid.tile_mut(id).air.as_mut() {
		react(air, &mut exposure);
	}
	if let Some((temperature, volume)) = exposure.0 {
		hotspot_expose(grid, id, temperature, volume, false);
	}
	let coord = grid.tile(id).coord;
	ctx.events.invalidate_visuals(grid.id(), coord);

	let hot = grid
		.tile(id)
		.air
		.as_ref()
		.is_some_and(|air| air.get_temperature() > MINIMUM_TEMPERATURE_START_SUPERCONDUCTION);
	if hot && consider_superconductivity_starting(grid, id, ctx) {
		return;
	}
	let tile = grid.tile(id);
	if tile.excited_group.is_none() && (ctx.config.excited_groups || !shared_any) {
		grid.remove_active_tile(id, true);
	}
}

fn last_share_check(grid: &mut GridAtmosphere, id: TileId) {
	let tile = grid.tile(id);
	let (Some(air), Some(group)) = (tile.air.as_ref(), tile.excited_group) else {
		return;
	};
	let last_share = air.last_share();
	if last_share > MINIMUM_AIR_TO_SUSPEND {
		grid.excited_group_reset_cooldowns(group);
	} else if last_share > MINIMUM_MOLES_DELTA_TO_MOVE {
		if let Some(group) = grid.excited_groups.get_mut(&group) {
			group.dismantle_cooldown = 0;
		}
	}
}

/// Hands the recorded wind to the host and clears it for the next cycle.
pub(crate) fn process_high_pressure_delta(
	grid: &mut GridAtmosphere,
	id: TileId,
	ctx: &mut StageContext<'_>,
) {
	let grid_id = grid.id();
	let tile = grid.tile_mut(id);
	if ctx.config.space_wind && tile.pressure_difference > 0.0 {
		ctx.events.high_pressure_movement(
			grid_id,
			tile.coord,
			tile.pressure_difference,
			tile.pressure_direction,
		);
	}
	tile.pressure_difference = 0.0;
	tile.last_pressure_direction = tile.pressure_direction;
	tile.pressure_direction = Directions::empty();
	grid.high_pressure_delta.swap_remove(&id);
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::atmos_grid::test_world::TestWorld;
	use crate::gas::gas_idx_from_string;

	fn linda_only(world: &mut TestWorld) {
		world.config.monstermos_equalization = false;
		world.config.superconduction = false;
	}

	#[test]
	fn two_tiles_even_out() {
		let o2 = gas_idx_from_string(GAS_O2).unwrap();
		let n2 = gas_idx_from_string(GAS_N2).unwrap();
		let mut world = TestWorld::new();
		linda_only(&mut world);
		world.room((0, 0), (1, 0));
		let air = world.air_mut((0, 0));
		air.set_moles(o2, 10.0);
		air.set_moles(n2, 30.0);
		for _ in 0..5 {
			world.cycle();
		}
		for x in 0..2 {
			let air = world.grid.tile_at((x, 0)).unwrap().air.as_ref().unwrap();
			assert!((air.get_moles(o2) - 5.0).abs() < 0.1);
			assert!((air.get_moles(n2) - 15.0).abs() < 0.1);
		}
	}

	#[test]
	fn diffusion_conserves_moles() {
		let o2 = gas_idx_from_string(GAS_O2).unwrap();
		let mut world = TestWorld::new();
		linda_only(&mut world);
		world.room((0, 0), (4, 4));
		world.air_mut((0, 0)).set_moles(o2, 500.0);
		world.air_mut((4, 2)).set_moles(o2, 120.0);
		let before = world.grid.total_moles();
		for _ in 0..10 {
			world.cycle();
			assert!((world.grid.total_moles() - before).abs() < before * 1e-4);
		}
		let corner = world.grid.tile_at((4, 4)).unwrap().total_moles();
		assert!(corner > 0.0);
		assert!(world.grid.adjacency_is_symmetric());
	}

	#[test]
	fn diffusion_records_wind() {
		let o2 = gas_idx_from_string(GAS_O2).unwrap();
		let mut world = TestWorld::new();
		linda_only(&mut world);
		world.room((0, 0), (1, 0));
		world.air_mut((0, 0)).set_moles(o2, 100.0);
		world.cycle();
		let (coord, difference, direction) = world.events.winds[0];
		assert_eq!(coord, (0, 0));
		assert!(difference > 0.0);
		assert_eq!(direction, Directions::EAST);
		let tile = world.grid.tile_at((0, 0)).unwrap();
		assert_eq!(tile.pressure_difference, 0.0);
		assert_eq!(tile.last_pressure_direction, Directions::EAST);
		assert!(world.grid.high_pressure_delta.is_empty());
	}

	#[test]
	fn quiet_tiles_fall_asleep() {
		let mut world = TestWorld::new();
		linda_only(&mut world);
		world.config.excited_groups = false;
		world.room((0, 0), (2, 2));
		assert!(!world.grid.active_tiles.is_empty());
		world.cycle();
		assert!(world.grid.active_tiles.is_empty());
	}

	#[test]
	fn sharing_forms_a_group() {
		let o2 = gas_idx_from_string(GAS_O2).unwrap();
		let mut world = TestWorld::new();
		linda_only(&mut world);
		world.room((0, 0), (2, 0));
		world.air_mut((0, 0)).set_moles(o2, 100.0);
		world.grid.state = crate::atmos_grid::ProcessingState::ActiveTiles;
		let (grid, mut ctx) = world.split();
		assert!(grid.process_state(&mut ctx));
		assert_eq!(world.grid.excited_group_count(), 1);
		let group = world.grid.tile_at((0, 0)).unwrap().excited_group;
		assert!(group.is_some());
		assert_eq!(world.grid.tile_at((1, 0)).unwrap().excited_group, group);
	}
}

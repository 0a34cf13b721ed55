use crate::atmos_grid::{GridAtmosphere, StageContext};

use crate::gas::{constants::*, Mixture};

use super::{Directions, TileCoord, TileId, NUM_DIRECTIONS, OPP_DIR_INDEX};

/// Rereads a tile from the host after something on it changed, recreating whatever
/// state depends on what occupies it.
pub(crate) fn revalidate_tile(
	grid: &mut GridAtmosphere,
	coord: TileCoord,
	ctx: &mut StageContext<'_>,
) {
	let grid_id = grid.id();
	let id = grid.get_or_create_tile(coord);
	let info = ctx.airtight.airtight(grid_id, coord);
	let properties = ctx.airtight.tile_properties(grid_id, coord);
	let air_blocked = info.is_air_blocked();

	let tile = grid.tile_mut(id);
	let old_blocked = tile.blocked_airflow;
	tile.blocked_airflow = info.blocked;
	if tile.excited && old_blocked != info.blocked {
		grid.remove_active_tile(id, true);
	}

	if properties.space && !air_blocked {
		let tile = grid.tile_mut(id);
		tile.air = Some(Mixture::space());
		tile.space = true;
	} else if air_blocked {
		let tile = grid.tile_mut(id);
		tile.space = false;
		if info.no_air {
			tile.clear_air_state();
		}
	} else {
		if grid.tile(id).air.is_none() && info.fix_vacuum {
			fix_vacuum(grid, id);
		}
		let tile = grid.tile_mut(id);
		if tile.space || tile.air.as_ref().is_some_and(Mixture::is_immutable) {
			tile.clear_air_state();
			tile.space = false;
		}
		if tile.air.is_none() {
			tile.air = Some(Mixture::from_vol_temp(CELL_VOLUME, T20C));
		}
	}

	let tile = grid.tile_mut(id);
	tile.thermal_conductivity = properties.thermal_conductivity;
	tile.heat_capacity = properties.heat_capacity;
	// Adjacency needs to know which tiles have air, so it's rebuilt after the air changes above.
	grid.update_adjacent(id);
	grid.add_active_tile(id);
	ctx.events.invalidate_visuals(grid_id, coord);
	for neighbor in grid.tile(id).neighbors.into_iter().flatten() {
		grid.add_active_tile(neighbor);
	}
}

/// A tile that just stopped being a wall borrows gas from the neighbors it opens onto.
fn fix_vacuum(grid: &mut GridAtmosphere, id: TileId) {
	let mut donors = Vec::with_capacity(NUM_DIRECTIONS);
	let blocked = grid.tile(id).blocked_airflow;
	for (dir, neighbor) in grid.tile(id).neighbors.into_iter().enumerate() {
		let Some(neighbor) = neighbor else {
			continue;
		};
		let neighbor_tile = grid.tile(neighbor);
		if neighbor_tile.has_air()
			&& !blocked.contains(Directions::from_index(dir))
			&& !neighbor_tile
				.blocked_airflow
				.contains(Directions::from_index(OPP_DIR_INDEX[dir]))
		{
			donors.push(neighbor);
		}
	}
	let mut air = Mixture::from_vol_temp(CELL_VOLUME, T20C);
	if !donors.is_empty() {
		let ratio = 1.0 / donors.len() as f32;
		for &donor in &donors {
			let Some(donor_air) = grid.tile_mut(donor).air.as_mut() else {
				continue;
			};
			let sample = donor_air.remove_ratio(ratio);
			air.merge(&sample);
			donor_air.merge(&sample);
		}
	}
	grid.tile_mut(id).air = Some(air);
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::atmos_grid::test_world::TestWorld;
	use crate::gas::gas_idx_from_string;
	use crate::interfaces::AirtightInfo;

	#[test]
	fn new_tiles_get_room_air() {
		let mut world = TestWorld::new();
		world.room((0, 0), (1, 1));
		assert_eq!(world.grid.tile_count(), 4);
		let tile = world.grid.tile_at((0, 0)).unwrap();
		let air = tile.air.as_ref().unwrap();
		assert_eq!(air.volume, CELL_VOLUME);
		assert!((air.get_temperature() - T20C).abs() < 1e-3);
		assert_eq!(world.grid.active_tiles.len(), 4);
		assert_eq!(world.events.invalidated.len(), 4);
	}

	#[test]
	fn space_tiles_are_immutable() {
		let mut world = TestWorld::new();
		world.map.space.insert((1, 0));
		world.room((0, 0), (1, 0));
		let space = world.grid.tile_at((1, 0)).unwrap();
		assert!(space.space);
		assert!(space.air.as_ref().unwrap().is_immutable());
		assert!(world
			.grid
			.tile_at((0, 0))
			.unwrap()
			.adjacent_bits
			.contains(Directions::EAST));

		// Floor gets placed: the tile stops being space.
		world.map.space.clear();
		world.grid.invalidate((1, 0));
		world.revalidate();
		let floor = world.grid.tile_at((1, 0)).unwrap();
		assert!(!floor.space);
		assert!(!floor.air.as_ref().unwrap().is_immutable());
	}

	#[test]
	fn blocked_tile_keeps_air_unless_told() {
		let o2 = gas_idx_from_string(GAS_O2).unwrap();
		let mut world = TestWorld::new();
		world.room((0, 0), (0, 0));
		world.air_mut((0, 0)).set_moles(o2, 10.0);
		world.map.airtight.insert(
			(0, 0),
			AirtightInfo {
				blocked: Directions::ALL_CARDINALS,
				no_air: false,
				fix_vacuum: false,
			},
		);
		world.grid.invalidate((0, 0));
		world.revalidate();
		assert_eq!(world.grid.tile_at((0, 0)).unwrap().total_moles(), 10.0);
		world.map.wall((0, 0));
		world.grid.invalidate((0, 0));
		world.revalidate();
		assert!(world.grid.tile_at((0, 0)).unwrap().air.is_none());
	}

	#[test]
	fn removed_wall_borrows_from_neighbors() {
		let o2 = gas_idx_from_string(GAS_O2).unwrap();
		let mut world = TestWorld::new();
		world.map.wall((1, 0));
		world.room((0, 0), (2, 0));
		world.air_mut((0, 0)).set_moles(o2, 40.0);
		world.air_mut((2, 0)).set_moles(o2, 20.0);
		world.map.airtight.insert(
			(1, 0),
			AirtightInfo {
				fix_vacuum: true,
				..Default::default()
			},
		);
		world.grid.invalidate((1, 0));
		world.revalidate();
		let middle = world.grid.tile_at((1, 0)).unwrap();
		// Half of each neighbor, sampled without draining them.
		assert!((middle.total_moles() - 30.0).abs() < 1e-3);
		assert!((world.grid.tile_at((0, 0)).unwrap().total_moles() - 40.0).abs() < 1e-3);
		assert!(world.grid.adjacency_is_symmetric());
		assert!(middle.adjacent_bits.contains(Directions::EAST | Directions::WEST));
	}
}

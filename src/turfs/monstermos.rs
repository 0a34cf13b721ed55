use crate::atmos_grid::{GridAtmosphere, StageContext};

use crate::gas::{constants::*, GasCompareResult, Mixture};

use super::{Directions, MonstermosInfo, TileId, NUM_DIRECTIONS, OPP_DIR_INDEX};

use float_ord::FloatOrd;

use rand::Rng;

fn adjust_eq_movement(grid: &mut GridAtmosphere, id: TileId, dir: usize, other: TileId, amount: f32) {
	let (tile, other_tile) = grid.get_two_mut(id, other);
	tile.monstermos
		.adjust_eq_movement(&mut other_tile.monstermos, dir, amount);
}

fn next_queue_cycle(grid: &mut GridAtmosphere) -> u32 {
	grid.equalization_queue_cycle_control = grid.equalization_queue_cycle_control.wrapping_add(1);
	grid.equalization_queue_cycle_control
}

/// Finds the connected zone around a tile and plans the transfers that bring every tile in
/// it to the zone's average in one go, then carries them out. If the zone touches space,
/// it gets depressurized instead.
pub(crate) fn equalize_pressure_in_zone(
	grid: &mut GridAtmosphere,
	start: TileId,
	ctx: &mut StageContext<'_>,
) {
	let cycle = grid.update_counter;
	let starting_moles = {
		let tile = grid.tile(start);
		if tile.air.is_none() || tile.monstermos.last_cycle >= cycle {
			return;
		}
		tile.total_moles()
	};
	grid.tile_mut(start).monstermos = MonstermosInfo::default();

	let run_atmos = grid.open_neighbors(start).into_iter().flatten().any(|other| {
		let other_tile = grid.tile(other);
		other_tile.has_air()
			&& (other_tile.total_moles() - starting_moles).abs() > MINIMUM_MOLES_DELTA_TO_MOVE
	});
	if !run_atmos {
		grid.tile_mut(start).monstermos.last_cycle = cycle;
		return;
	}

	let queue_cycle = next_queue_cycle(grid);
	let soft_limit = ctx.config.monstermos_tile_limit;
	let hard_limit = ctx.config.monstermos_hard_tile_limit;
	let mut total_moles = 0.0;
	let mut tiles = vec![start];
	grid.tile_mut(start).monstermos.last_queue_cycle = queue_cycle;
	let mut i = 0;
	while i < tiles.len() {
		if i > hard_limit {
			break;
		}
		let exploring = tiles[i];
		if i < soft_limit {
			let moles = grid.tile(exploring).total_moles();
			grid.tile_mut(exploring).monstermos.mole_delta = moles;
			total_moles += moles;
		}
		for adj in grid.open_neighbors(exploring).into_iter().flatten() {
			let adj_tile = grid.tile_mut(adj);
			if adj_tile.air.is_none() || adj_tile.monstermos.last_queue_cycle == queue_cycle {
				continue;
			}
			adj_tile.monstermos = MonstermosInfo {
				last_queue_cycle: queue_cycle,
				..Default::default()
			};
			if tiles.len() < hard_limit {
				tiles.push(adj);
			}
			if adj_tile.space && ctx.config.monstermos_depressurization {
				explosively_depressurize(grid, start, ctx);
				return;
			}
		}
		i += 1;
	}

	if tiles.len() > soft_limit {
		// Found, but too far away to be part of this zone.
		for &tile in &tiles[soft_limit..] {
			grid.tile_mut(tile).monstermos.last_queue_cycle = 0;
		}
		tiles.truncate(soft_limit);
	}

	let average_moles = total_moles / tiles.len() as f32;
	let mut givers = Vec::with_capacity(tiles.len());
	let mut takers = Vec::with_capacity(tiles.len());
	for &tile in &tiles {
		let info = &mut grid.tile_mut(tile).monstermos;
		info.last_cycle = cycle;
		info.mole_delta -= average_moles;
		if info.mole_delta > 0.0 {
			givers.push(tile);
		} else {
			takers.push(tile);
		}
	}

	let log_n = (tiles.len() as f32).log2();
	if givers.len() as f32 > log_n && takers.len() as f32 > log_n {
		fast_pass(grid, &mut tiles, queue_cycle);
		givers.clear();
		takers.clear();
		for &tile in &tiles {
			let mole_delta = grid.tile(tile).monstermos.mole_delta;
			if mole_delta > 0.0 {
				givers.push(tile);
			} else if mole_delta < 0.0 {
				takers.push(tile);
			}
		}
	}

	if givers.len() < takers.len() {
		for &giver in &givers {
			slow_pass_giver(grid, giver, queue_cycle);
		}
	} else {
		for &taker in &takers {
			slow_pass_taker(grid, taker, queue_cycle);
		}
	}

	for &tile in &tiles {
		finalize_eq(grid, tile, ctx);
	}

	for &tile in &tiles {
		for other in grid.open_neighbors(tile).into_iter().flatten() {
			let exchange = match (&grid.tile(other).air, &grid.tile(start).air) {
				(Some(other_air), Some(start_air)) => other_air.compare_exchange(start_air),
				_ => GasCompareResult::NoExchange,
			};
			if grid.tile(other).has_air() && exchange == GasCompareResult::NoExchange {
				continue;
			}
			grid.add_active_tile(other);
			break;
		}
	}
}

/// Spreads surplus from the most overfull tiles to whichever neighbors haven't been
/// handled yet, smallest surplus first.
fn fast_pass(grid: &mut GridAtmosphere, tiles: &mut [TileId], queue_cycle: u32) {
	tiles.sort_by_key(|&tile| FloatOrd(grid.tile(tile).monstermos.mole_delta));
	for &tile in tiles.iter() {
		grid.tile_mut(tile).monstermos.fast_done = true;
		let mole_delta = grid.tile(tile).monstermos.mole_delta;
		if mole_delta <= 0.0 {
			continue;
		}
		let mut eligible = [None; NUM_DIRECTIONS];
		let mut eligible_count = 0;
		for (dir, other) in grid.open_neighbors(tile).into_iter().enumerate() {
			let Some(other) = other else {
				continue;
			};
			let info = grid.tile(other).monstermos;
			if info.fast_done || info.last_queue_cycle != queue_cycle {
				continue;
			}
			eligible[dir] = Some(other);
			eligible_count += 1;
		}
		if eligible_count == 0 {
			continue;
		}
		let moles_to_move = mole_delta / eligible_count as f32;
		for (dir, other) in eligible.into_iter().enumerate() {
			let Some(other) = other else {
				continue;
			};
			adjust_eq_movement(grid, tile, dir, other, moles_to_move);
			grid.tile_mut(tile).monstermos.mole_delta -= moles_to_move;
			grid.tile_mut(other).monstermos.mole_delta += moles_to_move;
		}
	}
}

/// Breadth-first from a giver, handing its surplus to takers along the way and then
/// walking the transfers back up the search tree.
fn slow_pass_giver(grid: &mut GridAtmosphere, giver: TileId, queue_cycle: u32) {
	let slow_queue_cycle = next_queue_cycle(grid);
	{
		let info = &mut grid.tile_mut(giver).monstermos;
		info.curr_transfer_dir = None;
		info.curr_transfer_amount = 0.0;
		info.last_slow_queue_cycle = slow_queue_cycle;
	}
	let mut queue = vec![giver];
	let mut i = 0;
	while i < queue.len() {
		if grid.tile(giver).monstermos.mole_delta <= 0.0 {
			break;
		}
		let current = queue[i];
		for (dir, other) in grid.open_neighbors(current).into_iter().enumerate() {
			let Some(other) = other else {
				continue;
			};
			if grid.tile(giver).monstermos.mole_delta <= 0.0 {
				break;
			}
			let info = grid.tile(other).monstermos;
			if info.last_queue_cycle != queue_cycle || info.last_slow_queue_cycle == slow_queue_cycle {
				continue;
			}
			queue.push(other);
			let (giver_tile, other_tile) = grid.get_two_mut(giver, other);
			let other_info = &mut other_tile.monstermos;
			other_info.last_slow_queue_cycle = slow_queue_cycle;
			other_info.curr_transfer_dir = Some(OPP_DIR_INDEX[dir]);
			other_info.curr_transfer_amount = 0.0;
			if other_info.mole_delta < 0.0 {
				let giver_info = &mut giver_tile.monstermos;
				if -other_info.mole_delta > giver_info.mole_delta {
					other_info.curr_transfer_amount -= giver_info.mole_delta;
					other_info.mole_delta += giver_info.mole_delta;
					giver_info.mole_delta = 0.0;
				} else {
					other_info.curr_transfer_amount += other_info.mole_delta;
					giver_info.mole_delta += other_info.mole_delta;
					other_info.mole_delta = 0.0;
				}
			}
		}
		i += 1;
	}
	unwind_transfers(grid, &queue);
}

fn slow_pass_taker(grid: &mut GridAtmosphere, taker: TileId, queue_cycle: u32) {
	let slow_queue_cycle = next_queue_cycle(grid);
	{
		let info = &mut grid.tile_mut(taker).monstermos;
		info.curr_transfer_dir = None;
		info.curr_transfer_amount = 0.0;
		info.last_slow_queue_cycle = slow_queue_cycle;
	}
	let mut queue = vec![taker];
	let mut i = 0;
	while i < queue.len() {
		if grid.tile(taker).monstermos.mole_delta >= 0.0 {
			break;
		}
		let current = queue[i];
		for (dir, other) in grid.open_neighbors(current).into_iter().enumerate() {
			let Some(other) = other else {
				continue;
			};
			if grid.tile(taker).monstermos.mole_delta >= 0.0 {
				break;
			}
			let info = grid.tile(other).monstermos;
			if info.last_queue_cycle != queue_cycle || info.last_slow_queue_cycle == slow_queue_cycle {
				continue;
			}
			queue.push(other);
			let (taker_tile, other_tile) = grid.get_two_mut(taker, other);
			let other_info = &mut other_tile.monstermos;
			other_info.last_slow_queue_cycle = slow_queue_cycle;
			other_info.curr_transfer_dir = Some(OPP_DIR_INDEX[dir]);
			other_info.curr_transfer_amount = 0.0;
			if other_info.mole_delta > 0.0 {
				let taker_info = &mut taker_tile.monstermos;
				if other_info.mole_delta > -taker_info.mole_delta {
					other_info.curr_transfer_amount -= taker_info.mole_delta;
					other_info.mole_delta += taker_info.mole_delta;
					taker_info.mole_delta = 0.0;
				} else {
					other_info.curr_transfer_amount += other_info.mole_delta;
					taker_info.mole_delta += other_info.mole_delta;
					other_info.mole_delta = 0.0;
				}
			}
		}
		i += 1;
	}
	unwind_transfers(grid, &queue);
}

/// Pushes each queued tile's pending amount one step back towards where the search started.
fn unwind_transfers(grid: &mut GridAtmosphere, queue: &[TileId]) {
	for &tile in queue.iter().rev() {
		let info = grid.tile(tile).monstermos;
		if info.curr_transfer_amount == 0.0 {
			continue;
		}
		let Some(dir) = info.curr_transfer_dir else {
			continue;
		};
		let Some(towards) = grid.tile(tile).neighbors[dir] else {
			tracing::warn!("Equalization transfer from {:?} points off the grid", grid.tile(tile).coord);
			continue;
		};
		adjust_eq_movement(grid, tile, dir, towards, info.curr_transfer_amount);
		grid.tile_mut(towards).monstermos.curr_transfer_amount += info.curr_transfer_amount;
		grid.tile_mut(tile).monstermos.curr_transfer_amount = 0.0;
	}
}

/// Carries out a tile's planned transfers. A tile asked to give more than it has first
/// pulls in what its own suppliers planned to send it.
fn finalize_eq(grid: &mut GridAtmosphere, id: TileId, ctx: &mut StageContext<'_>) {
	let transfer_dirs = std::mem::take(&mut grid.tile_mut(id).monstermos.transfer_dirs);
	if transfer_dirs.iter().all(|&amount| amount == 0.0) {
		return;
	}
	let grid_id = grid.id();
	let mut has_transferred_first = false;
	for (dir, other) in grid.open_neighbors(id).into_iter().enumerate() {
		let Some(other) = other else {
			continue;
		};
		let amount = transfer_dirs[dir];
		if amount <= 0.0 || !grid.tile(other).has_air() {
			continue;
		}
		if !has_transferred_first && grid.tile(id).total_moles() < amount {
			finalize_eq_neighbors(grid, id, &transfer_dirs, ctx);
			has_transferred_first = true;
		}
		let (tile, other_tile) = grid.get_two_mut(id, other);
		other_tile.monstermos.transfer_dirs[OPP_DIR_INDEX[dir]] = 0.0;
		if let (Some(air), Some(other_air)) = (tile.air.as_mut(), other_tile.air.as_mut()) {
			let removed = air.remove(amount);
			other_air.merge(&removed);
		}
		tile.consider_pressure_difference(Directions::from_index(dir), amount);
		let (coord, other_coord) = (tile.coord, other_tile.coord);
		grid.high_pressure_delta.insert(id);
		ctx.events.invalidate_visuals(grid_id, coord);
		ctx.events.invalidate_visuals(grid_id, other_coord);
	}
}

fn finalize_eq_neighbors(
	grid: &mut GridAtmosphere,
	id: TileId,
	transfer_dirs: &[f32; NUM_DIRECTIONS],
	ctx: &mut StageContext<'_>,
) {
	for (dir, other) in grid.open_neighbors(id).into_iter().enumerate() {
		if let Some(other) = other {
			if transfer_dirs[dir] < 0.0 {
				finalize_eq(grid, other, ctx);
			}
		}
	}
}

/// Gives firelocks between two tiles a chance to shut, rereading both if they did.
fn consider_firelocks(grid: &mut GridAtmosphere, a: TileId, b: TileId, ctx: &mut StageContext<'_>) {
	let grid_id = grid.id();
	let (coord_a, coord_b) = (grid.tile(a).coord, grid.tile(b).coord);
	if !ctx.events.consider_firelocks(grid_id, coord_a, coord_b) {
		return;
	}
	for (id, coord) in [(a, coord_a), (b, coord_b)] {
		grid.tile_mut(id).blocked_airflow = ctx.airtight.airtight(grid_id, coord).blocked;
		grid.update_adjacent(id);
		ctx.events.invalidate_visuals(grid_id, coord);
	}
}

/// Vents a zone with a hole to space. Every tile pushes its gas one step along the
/// shortest path to the breach, deepest tiles first, so wind builds up towards the hole.
pub(crate) fn explosively_depressurize(
	grid: &mut GridAtmosphere,
	start: TileId,
	ctx: &mut StageContext<'_>,
) {
	let config = ctx.config;
	if !config.monstermos_depressurization || !grid.tile(start).has_air() {
		return;
	}
	let cycle = grid.update_counter;
	let grid_id = grid.id();
	let limit = config.monstermos_hard_tile_limit;
	let queue_cycle = next_queue_cycle(grid);
	let mut tiles = vec![start];
	let mut space_tiles = Vec::new();
	grid.tile_mut(start).monstermos = MonstermosInfo {
		last_queue_cycle: queue_cycle,
		..Default::default()
	};

	let mut i = 0;
	while i < tiles.len() {
		let current = tiles[i];
		i += 1;
		{
			let info = &mut grid.tile_mut(current).monstermos;
			info.last_cycle = cycle;
			info.curr_transfer_dir = None;
		}
		if grid.tile(current).space {
			space_tiles.push(current);
		} else {
			for (dir, other) in grid.open_neighbors(current).into_iter().enumerate() {
				let Some(other) = other else {
					continue;
				};
				let other_tile = grid.tile(other);
				if !other_tile.has_air() || other_tile.monstermos.last_queue_cycle == queue_cycle {
					continue;
				}
				consider_firelocks(grid, current, other, ctx);
				// A firelock may have just closed.
				if !grid.tile(current).adjacent_bits.contains(Directions::from_index(dir)) {
					continue;
				}
				grid.tile_mut(other).monstermos = MonstermosInfo {
					last_queue_cycle: queue_cycle,
					..Default::default()
				};
				tiles.push(other);
				if tiles.len() >= limit {
					break;
				}
			}
		}
		if tiles.len() >= limit || space_tiles.len() >= limit {
			break;
		}
	}

	let slow_queue_cycle = next_queue_cycle(grid);
	let mut progression = space_tiles.clone();
	for &space in &space_tiles {
		let info = &mut grid.tile_mut(space).monstermos;
		info.last_slow_queue_cycle = slow_queue_cycle;
		info.curr_transfer_dir = None;
	}
	let mut i = 0;
	while i < progression.len() {
		let current = progression[i];
		i += 1;
		for (dir, other) in grid.open_neighbors(current).into_iter().enumerate() {
			let Some(other) = other else {
				continue;
			};
			let other_tile = grid.tile_mut(other);
			if other_tile.monstermos.last_queue_cycle != queue_cycle
				|| other_tile.monstermos.last_slow_queue_cycle == slow_queue_cycle
				|| other_tile.space
			{
				continue;
			}
			other_tile.monstermos.curr_transfer_dir = Some(OPP_DIR_INDEX[dir]);
			other_tile.monstermos.curr_transfer_amount = 0.0;
			other_tile.monstermos.last_slow_queue_cycle = slow_queue_cycle;
			progression.push(other);
		}
	}

	let mut breach = Mixture::from_vol(CELL_VOLUME);
	let mut breach_tiles = Vec::new();
	for &current in progression.iter().rev() {
		let Some(dir) = grid.tile(current).monstermos.curr_transfer_dir else {
			continue;
		};
		grid.high_pressure_delta.insert(current);
		grid.add_active_tile(current);
		let Some(target) = grid.tile(current).neighbors[dir] else {
			continue;
		};
		let Some(moles) = grid.tile(current).air.as_ref().map(Mixture::total_moles) else {
			continue;
		};
		let target_is_space = grid
			.tile(target)
			.air
			.as_ref()
			.map_or(true, Mixture::is_immutable);
		let mut escaping = (moles * config.depressurize_escape_ratio).min(config.depressurize_max_wind);
		let vent_all = moles - escaping <= config.depressurize_min_moles;
		if vent_all {
			escaping = moles;
		}

		let (tile, target_tile) = grid.get_two_mut(current, target);
		if let Some(air) = tile.air.as_mut() {
			let removed = air.remove(escaping);
			if target_is_space {
				breach.merge(&removed);
			} else if let Some(target_air) = target_tile.air.as_mut() {
				target_air.merge(&removed);
			}
			if vent_all {
				air.clear();
				air.set_temperature(TCMB);
			}
		}
		if target_is_space && !breach_tiles.contains(&current) {
			breach_tiles.push(current);
		}
		// Upstream gas already passed through this tile, so the wind is just what left it.
		let wind = escaping;
		tile.monstermos.curr_transfer_amount = wind;
		target_tile.monstermos.curr_transfer_amount += wind;
		tile.pressure_difference = wind;
		tile.pressure_direction = Directions::from_index(dir);
		if target_tile.monstermos.curr_transfer_dir.is_none() {
			target_tile.pressure_difference = target_tile.monstermos.curr_transfer_amount;
			target_tile.pressure_direction = Directions::from_index(dir);
		}
		let coord = tile.coord;
		ctx.events.invalidate_visuals(grid_id, coord);
		handle_decompression_floor_rip(grid, current, wind, ctx);
	}

	let lost = breach.remove_ratio(config.breach_escape_ratio);
	let total_moles_removed = lost.total_moles();
	if breach.total_moles() > 0.0 && !breach_tiles.is_empty() {
		let returned = &breach * (1.0 / breach_tiles.len() as f32);
		for &tile in &breach_tiles {
			if let Some(air) = grid.tile_mut(tile).air.as_mut() {
				air.merge(&returned);
			}
		}
	}

	if config.grid_impulse {
		if let Some(&last) = tiles.last() {
			let origin = grid.tile(start).coord;
			let end = grid.tile(last).coord;
			let (dx, dy) = ((end.0 - origin.0) as f32, (end.1 - origin.1) as f32);
			let length = dx.hypot(dy);
			if length > 0.0 && total_moles_removed > 0.0 {
				ctx.events
					.apply_impulse(grid_id, origin, (dx / length, dy / length), total_moles_removed);
			}
		}
	}

	let tile_count = progression.len() - space_tiles.len();
	if tile_count > DEPRESSURIZATION_LOG_TILES
		&& total_moles_removed / tile_count as f32 > DEPRESSURIZATION_LOG_MOLES_PER_TILE
	{
		tracing::info!(
			"Explosive depressurization on grid {grid_id:?} removed {total_moles_removed} moles from {tile_count} tiles starting at {:?}",
			grid.tile(start).coord
		);
	}
}

fn handle_decompression_floor_rip(
	grid: &GridAtmosphere,
	id: TileId,
	wind: f32,
	ctx: &mut StageContext<'_>,
) {
	if !ctx.config.monstermos_rip_tiles || wind <= FLOOR_RIP_MINIMUM_WIND {
		return;
	}
	let chance = (wind / FLOOR_RIP_WIND_SCALE).clamp(FLOOR_RIP_MINIMUM_CHANCE, FLOOR_RIP_MAXIMUM_CHANCE);
	if ctx.rng.random_bool(f64::from(chance)) {
		ctx.events.rip_floor(grid.id(), grid.tile(id).coord);
	}
}

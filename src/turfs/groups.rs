use crate::atmos_grid::{GridAtmosphere, StageContext};

use crate::gas::{constants::*, Mixture};

use super::TileId;

use fxhash::FxBuildHasher;

use indexmap::IndexSet;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct GroupId(pub(crate) u64);

/// A cluster of active tiles that keep trading gas. Once it goes quiet for long enough it
/// averages itself out, and if it stays quiet after that it gets dismantled.
#[derive(Clone, Debug, Default)]
pub struct ExcitedGroup {
	pub tiles: IndexSet<TileId, FxBuildHasher>,
	pub breakdown_cooldown: u32,
	pub dismantle_cooldown: u32,
}

impl GridAtmosphere {
	pub(crate) fn create_excited_group(&mut self) -> GroupId {
		let id = self.new_group_id();
		self.excited_groups.insert(id, ExcitedGroup::default());
		id
	}
	pub(crate) fn excited_group_reset_cooldowns(&mut self, group: GroupId) {
		if let Some(group) = self.excited_groups.get_mut(&group) {
			group.breakdown_cooldown = 0;
			group.dismantle_cooldown = 0;
		}
	}
	pub(crate) fn excited_group_add_tile(&mut self, group: GroupId, tile: TileId) {
		let Some(excited) = self.excited_groups.get_mut(&group) else {
			tracing::warn!("Tried to add tile {tile:?} to disposed excited group {group:?}");
			return;
		};
		excited.tiles.insert(tile);
		excited.breakdown_cooldown = 0;
		excited.dismantle_cooldown = 0;
		self.tile_mut(tile).excited_group = Some(group);
	}
	pub(crate) fn excited_group_remove_tile(&mut self, group: GroupId, tile: TileId) {
		self.tile_mut(tile).excited_group = None;
		if let Some(excited) = self.excited_groups.get_mut(&group) {
			excited.tiles.swap_remove(&tile);
		}
	}
	/// The bigger group absorbs the smaller one.
	pub(crate) fn excited_group_merge(&mut self, ours: GroupId, theirs: GroupId) {
		let (Some(our_size), Some(their_size)) = (
			self.excited_groups.get(&ours).map(|group| group.tiles.len()),
			self.excited_groups.get(&theirs).map(|group| group.tiles.len()),
		) else {
			tracing::warn!("Tried to merge disposed excited groups {ours:?} and {theirs:?}");
			return;
		};
		let (winner, loser) = if our_size > their_size {
			(ours, theirs)
		} else {
			(theirs, ours)
		};
		let Some(loser_group) = self.excited_groups.swap_remove(&loser) else {
			return;
		};
		for &tile in &loser_group.tiles {
			self.tile_mut(tile).excited_group = Some(winner);
		}
		if let Some(winner_group) = self.excited_groups.get_mut(&winner) {
			winner_group.tiles.extend(loser_group.tiles);
		}
		self.excited_group_reset_cooldowns(winner);
	}
	/// Averages the group's gas over all of its tiles.
	pub(crate) fn excited_group_self_breakdown(
		&mut self,
		group: GroupId,
		ctx: &mut StageContext<'_>,
	) {
		let Some(tiles) = self
			.excited_groups
			.get(&group)
			.map(|group| group.tiles.iter().copied().collect::<Vec<_>>())
		else {
			return;
		};
		if tiles.is_empty() {
			self.excited_group_dispose(group);
			return;
		}
		let mut combined = Mixture::from_vol(CELL_VOLUME);
		for &tile in &tiles {
			let Some(air) = self.tile(tile).air.as_ref() else {
				continue;
			};
			combined.merge(air);
			if ctx.config.excited_groups_space_is_all_consuming && air.is_immutable() {
				combined.clear();
				break;
			}
		}
		combined.multiply(1.0 / tiles.len() as f32);
		let grid_id = self.id();
		for &tile in &tiles {
			let tile = self.tile_mut(tile);
			let Some(air) = tile.air.as_mut() else {
				continue;
			};
			air.copy_from_mutable(&combined);
			ctx.events.invalidate_visuals(grid_id, tile.coord);
		}
		if let Some(group) = self.excited_groups.get_mut(&group) {
			group.breakdown_cooldown = 0;
		}
	}
	/// Empties the group, optionally sending its tiles to sleep too.
	pub(crate) fn excited_group_dismantle(&mut self, group: GroupId, unexcite: bool) {
		let Some(tiles) = self
			.excited_groups
			.get_mut(&group)
			.map(|group| std::mem::take(&mut group.tiles))
		else {
			return;
		};
		for tile in tiles {
			self.tile_mut(tile).excited_group = None;
			if unexcite {
				self.tile_mut(tile).excited = false;
				self.active_tiles.swap_remove(&tile);
			}
		}
	}
	pub(crate) fn excited_group_dispose(&mut self, group: GroupId) {
		self.excited_group_dismantle(group, false);
		self.excited_groups.swap_remove(&group);
	}
}

/// Ticks a group's cooldowns and breaks it down or dismantles it when they run out.
pub(crate) fn process_excited_group(
	grid: &mut GridAtmosphere,
	group: GroupId,
	ctx: &mut StageContext<'_>,
) {
	let Some(excited) = grid.excited_groups.get_mut(&group) else {
		tracing::warn!("Processing disposed excited group {group:?}");
		return;
	};
	excited.breakdown_cooldown += 1;
	excited.dismantle_cooldown += 1;
	if excited.breakdown_cooldown > EXCITED_GROUP_BREAKDOWN_CYCLES {
		grid.excited_group_self_breakdown(group, ctx);
	} else if excited.dismantle_cooldown > EXCITED_GROUP_DISMANTLE_CYCLES {
		grid.excited_group_dismantle(group, true);
		grid.excited_group_dispose(group);
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::atmos_grid::test_world::TestWorld;
	use crate::gas::{gas_idx_from_string, GasIDX};

	fn grouped_row(world: &mut TestWorld, len: i32) -> (GroupId, Vec<TileId>) {
		world.room((0, 0), (len - 1, 0));
		let tiles: Vec<_> = (0..len).map(|x| world.id((x, 0))).collect();
		let group = world.grid.create_excited_group();
		for &tile in &tiles {
			world.grid.excited_group_add_tile(group, tile);
		}
		(group, tiles)
	}

	#[test]
	fn breakdown_averages_members() {
		let o2 = gas_idx_from_string(GAS_O2).unwrap();
		let mut world = TestWorld::new();
		let (group, tiles) = grouped_row(&mut world, 4);
		world.air_mut((0, 0)).set_moles(o2, 40.0);
		let before = world.grid.total_moles();
		for _ in 0..=EXCITED_GROUP_BREAKDOWN_CYCLES {
			let (grid, mut ctx) = world.split();
			process_excited_group(grid, group, &mut ctx);
		}
		for &tile in &tiles {
			let air = world.grid.tile(tile).air.as_ref().unwrap();
			assert!((air.get_moles(o2) - 10.0).abs() < 1e-4);
		}
		assert!((world.grid.total_moles() - before).abs() < 1e-3);
		assert_eq!(world.grid.excited_groups[&group].breakdown_cooldown, 0);
	}

	#[test]
	fn idle_group_dismantles() {
		let mut world = TestWorld::new();
		let (group, tiles) = grouped_row(&mut world, 3);
		for &tile in &tiles {
			world.grid.add_active_tile(tile);
		}
		// Breakdown keeps resetting its own cooldown, so only dismantle_cooldown runs out.
		for _ in 0..=EXCITED_GROUP_DISMANTLE_CYCLES {
			let (grid, mut ctx) = world.split();
			process_excited_group(grid, group, &mut ctx);
		}
		assert!(!world.grid.excited_groups.contains_key(&group));
		for &tile in &tiles {
			assert!(world.grid.tile(tile).excited_group.is_none());
			assert!(!world.grid.tile(tile).excited);
			assert!(!world.grid.active_tiles.contains(&tile));
		}
	}

	#[test]
	fn dismantle_leaves_gas_alone() {
		let o2 = gas_idx_from_string(GAS_O2).unwrap();
		let n2 = gas_idx_from_string(GAS_N2).unwrap();
		let mut world = TestWorld::new();
		let (group, tiles) = grouped_row(&mut world, 2);
		world.air_mut((0, 0)).set_moles(o2, 21.0);
		world.air_mut((0, 0)).set_temperature(310.0);
		world.air_mut((1, 0)).set_moles(o2, 20.995);
		world.air_mut((1, 0)).set_moles(n2, 3.0);
		let snapshot = |world: &TestWorld| -> Vec<(Vec<(GasIDX, f32)>, f32)> {
			tiles
				.iter()
				.map(|&tile| {
					let air = world.grid.tile(tile).air.as_ref().unwrap();
					(air.enumerate().collect(), air.get_temperature())
				})
				.collect()
		};
		let before = snapshot(&world);
		let excited = &mut world.grid.excited_groups[&group];
		excited.dismantle_cooldown = EXCITED_GROUP_DISMANTLE_CYCLES;
		excited.breakdown_cooldown = 0;
		let (grid, mut ctx) = world.split();
		process_excited_group(grid, group, &mut ctx);
		assert!(!world.grid.excited_groups.contains_key(&group));
		assert_eq!(snapshot(&world), before);
	}

	#[test]
	fn bigger_group_wins_merge() {
		let mut world = TestWorld::new();
		world.room((0, 0), (4, 0));
		let ids: Vec<_> = (0..5).map(|x| world.id((x, 0))).collect();
		let small = world.grid.create_excited_group();
		let big = world.grid.create_excited_group();
		world.grid.excited_group_add_tile(small, ids[0]);
		for &tile in &ids[1..] {
			world.grid.excited_group_add_tile(big, tile);
		}
		world.grid.excited_groups[&big].dismantle_cooldown = 5;
		world.grid.excited_group_merge(small, big);
		assert!(!world.grid.excited_groups.contains_key(&small));
		assert_eq!(world.grid.excited_groups[&big].tiles.len(), 5);
		assert_eq!(world.grid.excited_groups[&big].dismantle_cooldown, 0);
		assert_eq!(world.grid.tile(ids[0]).excited_group, Some(big));
	}

	#[test]
	fn removing_with_dispose_kills_the_group() {
		let mut world = TestWorld::new();
		let (group, tiles) = grouped_row(&mut world, 3);
		world.grid.add_active_tile(tiles[0]);
		world.grid.remove_active_tile(tiles[1], false);
		assert_eq!(world.grid.excited_groups[&group].tiles.len(), 2);
		world.grid.remove_active_tile(tiles[0], true);
		assert!(!world.grid.excited_groups.contains_key(&group));
		assert!(world.grid.tile(tiles[2]).excited_group.is_none());
	}

	#[test]
	fn space_can_consume_the_group() {
		let o2 = gas_idx_from_string(GAS_O2).unwrap();
		let mut world = TestWorld::new();
		world.config.excited_groups_space_is_all_consuming = true;
		world.map.space.insert((2, 0));
		let (group, tiles) = grouped_row(&mut world, 3);
		world.air_mut((0, 0)).set_moles(o2, 30.0);
		world.air_mut((1, 0)).set_moles(o2, 30.0);
		world.grid.excited_groups[&group].breakdown_cooldown = EXCITED_GROUP_BREAKDOWN_CYCLES;
		let (grid, mut ctx) = world.split();
		process_excited_group(grid, group, &mut ctx);
		assert_eq!(world.grid.tile(tiles[0]).total_moles(), 0.0);
		assert_eq!(world.grid.tile(tiles[1]).total_moles(), 0.0);
	}
}

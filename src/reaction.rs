pub mod hooks;

use crate::gas::{gas_idx_from_string, GasIDX, Mixture};
use bitflags::bitflags;
use eyre::Result;
use float_ord::FloatOrd;
use parking_lot::RwLock;

pub type ReactionPriority = FloatOrd<f32>;

bitflags! {
	/// What a reaction did. No bits set means nothing happened.
	#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
	pub struct ReactionResult: u8 {
		const REACTING = 0b1;
		const STOP_REACTIONS = 0b10;
	}
}

impl ReactionResult {
	pub const NO_REACTION: Self = Self::empty();
}

/// Whatever owns the mixture that is reacting. Tiles use this to catch fire.
pub trait ReactionHolder {
	/// A reaction heated the mixture past the point where fire can exist.
	fn fire_expose(&mut self, temperature: f32, volume: f32);
}

/// For mixtures nobody holds, like a canister being inspected.
impl ReactionHolder for () {
	fn fire_expose(&mut self, _temperature: f32, _volume: f32) {}
}

pub type ReactFunc = fn(&mut Mixture, &mut dyn ReactionHolder) -> ReactionResult;

#[derive(Clone)]
pub struct Reaction {
	id: Box<str>,
	priority: ReactionPriority,
	min_temp_req: Option<f32>,
	max_temp_req: Option<f32>,
	min_ener_req: Option<f32>,
	min_gas_reqs: Vec<(GasIDX, f32)>,
	func: ReactFunc,
}

impl Reaction {
	/// Builds a reaction. `min_gas_reqs` names gases by ID.
	/// # Errors
	/// If any of the gas IDs in the requirements don't exist.
	pub fn new(
		id: &str,
		priority: f32,
		min_gas_reqs: &[(&str, f32)],
		func: ReactFunc,
	) -> Result<Self> {
		let min_gas_reqs = min_gas_reqs
			.iter()
			.map(|&(gas, amount)| Ok((gas_idx_from_string(gas)?, amount)))
			.collect::<Result<Vec<_>>>()?;
		Ok(Self {
			id: id.into(),
			priority: FloatOrd(priority),
			min_temp_req: None,
			max_temp_req: None,
			min_ener_req: None,
			min_gas_reqs,
			func,
		})
	}
	#[must_use]
	pub fn with_min_temperature(mut self, temperature: f32) -> Self {
		self.min_temp_req = Some(temperature);
		self
	}
	#[must_use]
	pub fn with_max_temperature(mut self, temperature: f32) -> Self {
		self.max_temp_req = Some(temperature);
		self
	}
	#[must_use]
	pub fn with_min_energy(mut self, energy: f32) -> Self {
		self.min_ener_req = Some(energy);
		self
	}
	/// Gets the reaction's identifier.
	#[must_use]
	pub fn get_id(&self) -> &str {
		&self.id
	}
	/// Checks if the given gas mixture can react with this reaction.
	pub fn check_conditions(&self, mix: &Mixture) -> bool {
		self.min_temp_req
			.map_or(true, |temp_req| mix.get_temperature() >= temp_req)
			&& self
				.max_temp_req
				.map_or(true, |temp_req| mix.get_temperature() <= temp_req)
			&& self
				.min_gas_reqs
				.iter()
				.all(|&(k, v)| mix.get_moles(k) >= v)
			&& self
				.min_ener_req
				.map_or(true, |ener_req| mix.thermal_energy() >= ener_req)
	}
	/// Returns the priority of the reaction.
	#[must_use]
	pub fn get_priority(&self) -> ReactionPriority {
		self.priority
	}
	/// Calls the reaction with the given arguments.
	pub fn react(&self, mix: &mut Mixture, holder: &mut dyn ReactionHolder) -> ReactionResult {
		(self.func)(mix, holder)
	}
}

fn default_reactions() -> Result<Vec<Reaction>> {
	Ok(vec![hooks::plasma_fire_reaction()?, hooks::tritium_fire_reaction()?])
}

lazy_static::lazy_static! {
	static ref REACTIONS: RwLock<Vec<Reaction>> = RwLock::new({
		let mut reactions = default_reactions().unwrap_or_else(|e| {
			tracing::error!("Built-in reactions failed to load: {e}");
			Vec::new()
		});
		sort_reactions(&mut reactions);
		reactions
	});
}

fn sort_reactions(reactions: &mut [Reaction]) {
	reactions.sort_by_key(|r| std::cmp::Reverse(r.get_priority()));
}

fn insert_reaction(reactions: &mut Vec<Reaction>, reaction: Reaction) {
	reactions.retain(|r| r.id != reaction.id);
	reactions.push(reaction);
	sort_reactions(reactions);
}

/// Adds a reaction to the global list, keeping it ordered by descending priority.
/// Replaces any reaction with the same ID.
pub fn register_reaction(reaction: Reaction) {
	insert_reaction(&mut REACTIONS.write(), reaction);
}

pub fn with_reactions<T>(f: impl FnOnce(&[Reaction]) -> T) -> T {
	f(&REACTIONS.read())
}

/// Runs every registered reaction whose requirements are met, highest priority first, until
/// one asks to stop. Returns everything the reactions that ran reported.
pub fn react(mix: &mut Mixture, holder: &mut dyn ReactionHolder) -> ReactionResult {
	react_with(&REACTIONS.read(), mix, holder)
}

/// Same as [`react`], over a caller-provided list already sorted by descending priority.
pub fn react_with(
	reactions: &[Reaction],
	mix: &mut Mixture,
	holder: &mut dyn ReactionHolder,
) -> ReactionResult {
	mix.reaction_results = Default::default();
	if mix.is_immutable() {
		return ReactionResult::NO_REACTION;
	}
	let mut result = ReactionResult::NO_REACTION;
	for reaction in reactions {
		if !reaction.check_conditions(mix) {
			continue;
		}
		result |= reaction.react(mix, &mut *holder);
		if result.contains(ReactionResult::STOP_REACTIONS) {
			break;
		}
	}
	result
}

/// Checks if the mixture can react with any reactions.
pub fn can_react(mix: &Mixture) -> bool {
	with_reactions(|reactions| reactions.iter().any(|r| r.check_conditions(mix)))
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::gas::constants::*;

	#[test]
	fn reactions_sorted_by_priority() {
		with_reactions(|reactions| {
			assert!(reactions
				.windows(2)
				.all(|w| w[0].get_priority() >= w[1].get_priority()));
			assert!(reactions.iter().any(|r| r.get_id() == "plasmafire"));
		});
	}

	#[test]
	fn conditions() {
		let reaction = Reaction::new("test", 0.0, &[(GAS_O2, 1.0)], |_, _| {
			ReactionResult::REACTING
		})
		.unwrap()
		.with_min_temperature(300.0)
		.with_max_temperature(400.0);
		let mut mix = Mixture::from_vol_temp(CELL_VOLUME, 350.0);
		assert!(!reaction.check_conditions(&mix));
		mix.set_moles(gas_idx_from_string(GAS_O2).unwrap(), 2.0);
		assert!(reaction.check_conditions(&mix));
		mix.set_temperature(500.0);
		assert!(!reaction.check_conditions(&mix));
		assert!(Reaction::new("bad", 0.0, &[("nope", 1.0)], |_, _| {
			ReactionResult::NO_REACTION
		})
		.is_err());
	}

	fn n2_reaction(id: &str, priority: f32, func: ReactFunc) -> Reaction {
		Reaction::new(id, priority, &[(GAS_N2, 1.0)], func).unwrap()
	}

	#[test]
	fn results_combine_across_reactions() {
		let mut reactions = Vec::new();
		insert_reaction(
			&mut reactions,
			n2_reaction("quiet", 5.0, |_, _| ReactionResult::NO_REACTION),
		);
		insert_reaction(
			&mut reactions,
			n2_reaction("loud", 10.0, |_, _| ReactionResult::REACTING),
		);
		assert_eq!(reactions[0].get_id(), "loud");
		let mut mix = Mixture::from_vol_temp(CELL_VOLUME, T20C);
		mix.set_moles(gas_idx_from_string(GAS_N2).unwrap(), 10.0);
		let result = react_with(&reactions, &mut mix, &mut ());
		assert!(result.contains(ReactionResult::REACTING));
	}

	#[test]
	fn stop_halts_lower_priorities() {
		let mut reactions = Vec::new();
		insert_reaction(
			&mut reactions,
			n2_reaction("first", 10.0, |mix, _| {
				let n2 = gas_idx_from_string(GAS_N2).unwrap();
				mix.set_moles(n2, mix.get_moles(n2) - 1.0);
				ReactionResult::REACTING | ReactionResult::STOP_REACTIONS
			}),
		);
		insert_reaction(
			&mut reactions,
			n2_reaction("second", 1.0, |mix, _| {
				let n2 = gas_idx_from_string(GAS_N2).unwrap();
				mix.set_moles(n2, 0.0);
				ReactionResult::REACTING
			}),
		);
		// Replacing by ID keeps one entry.
		insert_reaction(
			&mut reactions,
			n2_reaction("second", 1.0, |mix, _| {
				let n2 = gas_idx_from_string(GAS_N2).unwrap();
				mix.set_moles(n2, 0.0);
				ReactionResult::REACTING
			}),
		);
		assert_eq!(reactions.len(), 2);
		let n2 = gas_idx_from_string(GAS_N2).unwrap();
		let mut mix = Mixture::from_vol_temp(CELL_VOLUME, T20C);
		mix.set_moles(n2, 10.0);
		let result = react_with(&reactions, &mut mix, &mut ());
		assert_eq!(
			result,
			ReactionResult::REACTING | ReactionResult::STOP_REACTIONS
		);
		assert_eq!(mix.get_moles(n2), 9.0);
	}

	#[test]
	fn cold_air_does_not_react() {
		let mut mix = Mixture::from_vol_temp(CELL_VOLUME, T20C);
		mix.set_moles(gas_idx_from_string(GAS_O2).unwrap(), 20.0);
		mix.set_moles(gas_idx_from_string(GAS_PLASMA).unwrap(), 20.0);
		assert_eq!(react(&mut mix, &mut ()), ReactionResult::NO_REACTION);
		assert_eq!(mix.reaction_results.fire, 0.0);
	}
}

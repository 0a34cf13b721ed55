use super::{Reaction, ReactionHolder, ReactionResult};

use crate::gas::{constants::*, FireGases, Mixture};

use eyre::Result;

const MINIMUM_TRITIUM_OXYBURN_ENERGY: f32 = 143_000.0;
const FIRE_REAGENT_MINIMUM: f32 = 0.01;

/// # Errors
/// If the gas table doesn't contain oxygen or plasma.
pub fn plasma_fire_reaction() -> Result<Reaction> {
	Ok(Reaction::new(
		"plasmafire",
		-2.0,
		&[(GAS_O2, FIRE_REAGENT_MINIMUM), (GAS_PLASMA, FIRE_REAGENT_MINIMUM)],
		plasma_fire,
	)?
	.with_min_temperature(FIRE_MINIMUM_TEMPERATURE_TO_EXIST))
}

/// # Errors
/// If the gas table doesn't contain oxygen or tritium.
pub fn tritium_fire_reaction() -> Result<Reaction> {
	Ok(Reaction::new(
		"tritfire",
		-1.0,
		&[(GAS_O2, FIRE_REAGENT_MINIMUM), (GAS_TRITIUM, FIRE_REAGENT_MINIMUM)],
		tritium_fire,
	)?
	.with_min_temperature(FIRE_MINIMUM_TEMPERATURE_TO_EXIST))
}

fn finish_fire(
	air: &mut Mixture,
	holder: &mut dyn ReactionHolder,
	old_heat_capacity: f32,
	energy_released: f32,
) -> ReactionResult {
	if energy_released > 0.0 {
		let new_heat_capacity = air.heat_capacity();
		if new_heat_capacity > MINIMUM_HEAT_CAPACITY {
			air.set_temperature(
				(air.get_temperature() * old_heat_capacity + energy_released) / new_heat_capacity,
			);
		}
	}
	let temperature = air.get_temperature();
	if temperature > FIRE_MINIMUM_TEMPERATURE_TO_EXIST {
		holder.fire_expose(temperature, air.volume);
	}
	if air.reaction_results.fire > 0.0 {
		ReactionResult::REACTING
	} else {
		ReactionResult::NO_REACTION
	}
}

fn plasma_fire(air: &mut Mixture, holder: &mut dyn ReactionHolder) -> ReactionResult {
	let Ok(gases) = FireGases::get() else {
		return ReactionResult::NO_REACTION;
	};
	let old_heat_capacity = air.heat_capacity();
	let temperature = air.get_temperature();
	let mut energy_released = 0.0;
	air.reaction_results.fire = 0.0;
	let temperature_scale = if temperature > PLASMA_UPPER_TEMPERATURE {
		1.0
	} else {
		(temperature - PLASMA_MINIMUM_BURN_TEMPERATURE)
			/ (PLASMA_UPPER_TEMPERATURE - PLASMA_MINIMUM_BURN_TEMPERATURE)
	};
	if temperature_scale > 0.0 {
		let oxygen_burn_rate = OXYGEN_BURN_RATE_BASE - temperature_scale;
		let initial_oxygen = air.get_moles(gases.oxygen);
		let initial_plasma = air.get_moles(gases.plasma);
		let supersaturation = ((initial_oxygen / initial_plasma - SUPER_SATURATION_ENDS)
			/ (SUPER_SATURATION_THRESHOLD - SUPER_SATURATION_ENDS))
			.clamp(0.0, 1.0);
		let plasma_burn_rate = if initial_oxygen > initial_plasma * PLASMA_OXYGEN_FULLBURN {
			initial_plasma * temperature_scale / PLASMA_BURN_RATE_DELTA
		} else {
			(temperature_scale * (initial_oxygen / PLASMA_OXYGEN_FULLBURN)) / PLASMA_BURN_RATE_DELTA
		};
		if plasma_burn_rate > MINIMUM_HEAT_CAPACITY {
			let plasma_burn_rate = plasma_burn_rate
				.min(initial_plasma)
				.min(initial_oxygen / oxygen_burn_rate);
			air.set_moles(gases.plasma, (initial_plasma - plasma_burn_rate).max(0.0));
			air.set_moles(
				gases.oxygen,
				(initial_oxygen - plasma_burn_rate * oxygen_burn_rate).max(0.0),
			);
			// Oxygen-rich burns make tritium instead of carbon dioxide.
			air.adjust_moles(gases.tritium, plasma_burn_rate * supersaturation);
			air.adjust_moles(gases.co2, plasma_burn_rate * (1.0 - supersaturation));
			energy_released += FIRE_PLASMA_ENERGY_RELEASED * plasma_burn_rate;
			air.reaction_results.fire += plasma_burn_rate * (1.0 + oxygen_burn_rate);
		}
	}
	air.garbage_collect();
	finish_fire(air, holder, old_heat_capacity, energy_released)
}

fn tritium_fire(air: &mut Mixture, holder: &mut dyn ReactionHolder) -> ReactionResult {
	let Ok(gases) = FireGases::get() else {
		return ReactionResult::NO_REACTION;
	};
	let old_heat_capacity = air.heat_capacity();
	let mut energy_released = 0.0;
	air.reaction_results.fire = 0.0;
	let initial_oxygen = air.get_moles(gases.oxygen);
	let initial_trit = air.get_moles(gases.tritium);
	let burned_fuel = if initial_oxygen < initial_trit
		|| MINIMUM_TRITIUM_OXYBURN_ENERGY > air.thermal_energy()
	{
		let burned = (initial_oxygen / TRITIUM_BURN_OXY_FACTOR).min(initial_trit);
		air.set_moles(gases.tritium, (initial_trit - burned).max(0.0));
		burned
	} else {
		// the whole tritium amount counts as burned, but only a tenth of it is consumed.
		air.set_moles(
			gases.tritium,
			(initial_trit - initial_trit / TRITIUM_BURN_TRIT_FACTOR).max(0.0),
		);
		air.set_moles(gases.oxygen, (initial_oxygen - initial_trit).max(0.0));
		energy_released +=
			FIRE_HYDROGEN_ENERGY_RELEASED * initial_trit * (TRITIUM_BURN_TRIT_FACTOR - 1.0);
		initial_trit
	};
	if burned_fuel > 0.0 {
		energy_released += FIRE_HYDROGEN_ENERGY_RELEASED * burned_fuel;
		air.adjust_moles(gases.water_vapor, burned_fuel);
		air.reaction_results.fire += burned_fuel;
	}
	air.garbage_collect();
	finish_fire(air, holder, old_heat_capacity, energy_released)
}

#[allow(dead_code)]
pub mod constants;

pub mod mixture;

pub mod types;

pub use types::*;

pub use mixture::{GasCompareResult, Mixture};

pub type GasIDX = usize;

/// Indices of the gases the built-in reactions and the hotspot engine care about.
#[derive(Clone, Copy, Debug)]
pub struct FireGases {
	pub oxygen: GasIDX,
	pub plasma: GasIDX,
	pub tritium: GasIDX,
	pub co2: GasIDX,
	pub water_vapor: GasIDX,
}

thread_local! {
	static CACHED_FIRE_GASES: std::cell::Cell<Option<(usize, FireGases)>> = const { std::cell::Cell::new(None) };
}

impl FireGases {
	/// The fire gas indices, looked up again only after the gas table is replaced.
	/// # Errors
	/// If the gas table doesn't have one of the fire gases.
	pub fn get() -> eyre::Result<Self> {
		let generation = gas_table_generation();
		if let Some((cached_generation, gases)) = CACHED_FIRE_GASES.get() {
			if cached_generation == generation {
				return Ok(gases);
			}
		}
		let gases = Self::resolve()?;
		CACHED_FIRE_GASES.set(Some((generation, gases)));
		Ok(gases)
	}
	/// # Errors
	/// If the gas table doesn't have one of the fire gases.
	pub fn resolve() -> eyre::Result<Self> {
		use constants::*;
		Ok(Self {
			oxygen: gas_idx_from_string(GAS_O2)?,
			plasma: gas_idx_from_string(GAS_PLASMA)?,
			tritium: gas_idx_from_string(GAS_TRITIUM)?,
			co2: gas_idx_from_string(GAS_CO2)?,
			water_vapor: gas_idx_from_string(GAS_H2O)?,
		})
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn fire_gases_are_cached() {
		let first = FireGases::get().unwrap();
		assert_eq!(
			CACHED_FIRE_GASES.get().map(|(generation, _)| generation),
			Some(gas_table_generation())
		);
		let again = FireGases::get().unwrap();
		assert_eq!(first.oxygen, again.oxygen);
		assert_eq!(
			first.plasma,
			gas_idx_from_string(constants::GAS_PLASMA).unwrap()
		);
	}
}

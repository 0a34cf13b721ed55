use itertools::{
	EitherOrBoth::{Both, Left, Right},
	Itertools,
};

use std::cell::Cell;

use tinyvec::TinyVec;

use super::{constants::*, gas_visibility, total_num_gases, with_specific_heats, GasIDX};

type Moles = TinyVec<[f32; 8]>;

/// Result of the cheap pre-check that decides whether two mixtures are worth sharing between.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum GasCompareResult {
	/// This species differs enough to move.
	Species(GasIDX),
	/// Moles are close enough, but temperatures are not.
	TemperatureExchange,
	NoExchange,
}

/// Per-mixture accumulator for reaction side channels, reset by `react`.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct ReactionResults {
	/// How much burned during the last `react`. Consumed by hotspots.
	pub fire: f32,
}

/// A tile-sized (or pipe-sized, or tank-sized) gas mixture.
/// Unlike the finite-difference turf mixtures this is descended from, the
/// LINDA archive lives inside the mixture: `archive` snapshots moles and
/// temperature so that every share in a cycle reads the same "before" state.
#[derive(Clone, Debug)]
pub struct Mixture {
	temperature: f32,
	temperature_archived: f32,
	pub volume: f32,
	min_heat_capacity: f32,
	immutable: bool,
	moles: Moles,
	moles_archived: Moles,
	last_share: f32,
	pub reaction_results: ReactionResults,
	cached_heat_capacity: Cell<Option<f32>>,
	cached_vis_hash: Cell<u64>,
}

impl Default for Mixture {
	fn default() -> Self {
		Self::new()
	}
}

impl Mixture {
	/// Makes an empty gas mixture.
	pub fn new() -> Self {
		Self {
			moles: TinyVec::new(),
			moles_archived: TinyVec::new(),
			temperature: TCMB,
			temperature_archived: TCMB,
			volume: CELL_VOLUME,
			min_heat_capacity: 0.0,
			immutable: false,
			last_share: 0.0,
			reaction_results: ReactionResults::default(),
			cached_heat_capacity: Cell::new(None),
			cached_vis_hash: Cell::new(0),
		}
	}
	/// Makes an empty gas mixture with the given volume.
	pub fn from_vol(vol: f32) -> Self {
		let mut ret = Self::new();
		ret.volume = vol.max(0.0);
		ret
	}
	/// Makes an empty mixture of the given volume at the given temperature.
	pub fn from_vol_temp(vol: f32, temp: f32) -> Self {
		let mut ret = Self::from_vol(vol);
		ret.set_temperature(temp);
		ret
	}
	/// The immutable vacuum every space tile shares.
	pub fn space() -> Self {
		let mut ret = Self::new();
		ret.mark_immutable();
		ret
	}
	/// Returns if any data is corrupt.
	pub fn is_corrupt(&self) -> bool {
		!self.temperature.is_normal()
			|| self.moles.len() > total_num_gases()
			|| self.moles.iter().any(|amt| !amt.is_finite() || *amt < 0.0)
	}
	/// Fixes any corruption found.
	pub fn fix_corruption(&mut self) {
		for amt in self.moles.iter_mut() {
			if !amt.is_finite() || *amt < 0.0 {
				*amt = 0.0;
			}
		}
		self.garbage_collect();
		if self.temperature < TCMB || !self.temperature.is_normal() {
			self.set_temperature(T20C);
		}
	}
	/// Returns the temperature of the mix. T
	pub fn get_temperature(&self) -> f32 {
		self.temperature
	}
	/// Temperature as of the last `archive`.
	pub fn get_temperature_archived(&self) -> f32 {
		self.temperature_archived
	}
	/// Sets the temperature, if the mix isn't immutable. Never goes below the cosmic background. T
	pub fn set_temperature(&mut self, temp: f32) {
		if !self.immutable && temp.is_finite() {
			self.temperature = temp.max(TCMB);
		}
	}
	/// Sets the minimum heat capacity of this mix.
	pub fn set_min_heat_capacity(&mut self, amt: f32) {
		self.min_heat_capacity = amt;
		self.cached_heat_capacity.set(None);
	}
	/// Returns an iterator over the gas keys and mole amounts thereof.
	pub fn enumerate(&self) -> impl Iterator<Item = (GasIDX, f32)> + '_ {
		self.moles.iter().copied().enumerate()
	}
	/// Returns (by value) the amount of moles of a given index the mix has. M
	pub fn get_moles(&self, idx: GasIDX) -> f32 {
		self.moles.get(idx).copied().unwrap_or(0.0)
	}
	/// Moles of the given gas as of the last `archive`.
	pub fn get_moles_archived(&self, idx: GasIDX) -> f32 {
		self.moles_archived.get(idx).copied().unwrap_or(0.0)
	}
	/// Sets the mix to be immutable. Every mutating operation becomes a no-op on this side.
	pub fn mark_immutable(&mut self) {
		self.immutable = true;
	}
	/// Returns whether this gas mixture is immutable.
	pub fn is_immutable(&self) -> bool {
		self.immutable
	}
	/// How many moles moved in total during the last `share` this mixture initiated.
	pub fn last_share(&self) -> f32 {
		self.last_share
	}
	fn maybe_expand(&mut self, size: usize) {
		if self.moles.len() < size {
			self.moles.resize(size, 0.0);
		}
	}
	/// If mix is not immutable, sets the gas at the given `idx` to the given `amt`.
	/// Rejects amounts that are negative or not finite.
	pub fn set_moles(&mut self, idx: GasIDX, amt: f32) {
		if !self.immutable && idx < total_num_gases() && amt.is_finite() && amt >= 0.0 {
			self.maybe_expand(idx + 1);
			self.moles[idx] = amt;
			self.cached_heat_capacity.set(None);
		}
	}
	/// Adds (or removes, when negative) moles of a gas. The result is clamped at zero.
	pub fn adjust_moles(&mut self, idx: GasIDX, amt: f32) {
		if !self.immutable && amt.is_finite() && idx < total_num_gases() {
			self.maybe_expand(idx + 1);
			let r = &mut self.moles[idx];
			*r = (*r + amt).max(0.0);
			if amt < 0.0 {
				self.garbage_collect();
			}
			self.cached_heat_capacity.set(None);
		}
	}
	fn heat_capacity_of(&self, moles: &[f32]) -> f32 {
		let sum: f32 = moles.iter().sum();
		if self.immutable && sum < GAS_MIN_MOLES {
			return HEAT_CAPACITY_VACUUM;
		}
		with_specific_heats(|heats| {
			moles
				.iter()
				.copied()
				.zip(heats.iter())
				.fold(0.0, |acc, (amt, cap)| cap.mul_add(amt, acc))
		})
		.max(self.min_heat_capacity)
		.max(MINIMUM_HEAT_CAPACITY)
	}
	#[inline(never)] // mostly this makes it so that heat_capacity itself is inlined
	fn slow_heat_capacity(&self) -> f32 {
		let heat_cap = self.heat_capacity_of(&self.moles);
		self.cached_heat_capacity.set(Some(heat_cap));
		heat_cap
	}
	/// The heat capacity of the material. J/K. A fully empty immutable mixture (space)
	/// reports `HEAT_CAPACITY_VACUUM` so that it can still soak up heat.
	pub fn heat_capacity(&self) -> f32 {
		self.cached_heat_capacity
			.get()
			.filter(|cap| cap.is_finite() && cap.is_sign_positive())
			.unwrap_or_else(|| self.slow_heat_capacity())
	}
	/// Heat capacity as of the last `archive`.
	pub fn heat_capacity_archived(&self) -> f32 {
		self.heat_capacity_of(&self.moles_archived)
	}
	/// Heat capacity of exactly one gas in this mix.
	pub fn partial_heat_capacity(&self, idx: GasIDX) -> f32 {
		self.moles
			.get(idx)
			.filter(|amt| amt.is_normal())
			.map_or(0.0, |amt| amt * with_specific_heats(|heats| heats[idx]))
	}
	/// The total mole count of the mixture. Moles.
	pub fn total_moles(&self) -> f32 {
		self.moles.iter().sum()
	}
	/// Pressure. Kilopascals.
	pub fn return_pressure(&self) -> f32 {
		if self.volume <= 0.0 {
			return 0.0;
		}
		self.total_moles() * R_IDEAL_GAS_EQUATION * self.temperature / self.volume
	}
	/// Thermal energy. Joules.
	pub fn thermal_energy(&self) -> f32 {
		self.heat_capacity() * self.temperature
	}
	/// Snapshots moles and temperature for the sharing calculations of this cycle.
	pub fn archive(&mut self) {
		self.moles_archived.clone_from(&self.moles);
		self.temperature_archived = self.temperature;
	}
	/// Merges one gas mixture into another. Temperatures blend by heat capacity unless
	/// they are already within `MINIMUM_TEMPERATURE_DELTA_TO_CONSIDER` of each other.
	pub fn merge(&mut self, giver: &Self) {
		if self.immutable {
			return;
		}
		if (self.temperature - giver.temperature).abs() > MINIMUM_TEMPERATURE_DELTA_TO_CONSIDER {
			let our_heat_capacity = self.heat_capacity();
			let other_heat_capacity = giver.heat_capacity();
			let combined_heat_capacity = our_heat_capacity + other_heat_capacity;
			if combined_heat_capacity > MINIMUM_HEAT_CAPACITY {
				self.set_temperature(
					(our_heat_capacity * self.temperature
						+ other_heat_capacity * giver.temperature)
						/ combined_heat_capacity,
				);
			}
		}
		self.maybe_expand(giver.moles.len());
		for (a, b) in self.moles.iter_mut().zip(giver.moles.iter()) {
			*a += b;
		}
		self.cached_heat_capacity.set(None);
	}
	/// Takes a fraction of this gas mixture's moles and returns them as a new mixture of the same
	/// volume and temperature. If this mix is mutable, also removes those moles from the original.
	pub fn remove_ratio(&mut self, ratio: f32) -> Self {
		let mut removed = Self::from_vol(self.volume);
		removed.temperature = self.temperature;
		if ratio.is_nan() || ratio <= 0.0 {
			return removed;
		}
		let ratio = ratio.min(1.0);
		removed.moles = self.moles.iter().map(|amt| amt * ratio).collect();
		if !self.immutable {
			for (ours, theirs) in self.moles.iter_mut().zip(removed.moles.iter()) {
				*ours -= theirs;
			}
			self.garbage_collect();
			self.cached_heat_capacity.set(None);
		}
		removed.garbage_collect();
		removed
	}
	/// Like `remove_ratio`, but with moles.
	pub fn remove(&mut self, amount: f32) -> Self {
		let total = self.total_moles();
		if total <= 0.0 {
			return self.remove_ratio(0.0);
		}
		self.remove_ratio(amount / total)
	}
	/// Like `remove_ratio`, but with liters.
	pub fn remove_volume(&mut self, volume: f32) -> Self {
		if self.volume <= 0.0 {
			return self.remove_ratio(0.0);
		}
		self.remove_ratio(volume / self.volume)
	}
	/// Copies from a given gas mixture, if we're mutable.
	pub fn copy_from_mutable(&mut self, sample: &Self) {
		if self.immutable {
			return;
		}
		self.moles = sample.moles.clone();
		self.temperature = sample.temperature;
		self.cached_heat_capacity.set(None);
	}
	/// The core diffusion step. Moves `1/(adjacent_tile_count + 1)` of every per-species
	/// difference from the richer side to the poorer side, computed from the archived
	/// state of both sides. Heat capacity travels with the gas, so the temperature update
	/// conserves thermal energy. Returns a signed pressure-ish flow figure, or 0 if too
	/// little moved to bother with.
	pub fn share(&mut self, sharer: &mut Self, adjacent_tile_count: usize) -> f32 {
		let temperature_delta = self.temperature_archived - sharer.temperature_archived;
		let abs_temperature_delta = temperature_delta.abs();
		let considers_heat = abs_temperature_delta > MINIMUM_TEMPERATURE_DELTA_TO_CONSIDER;
		let (old_heat_capacity, old_sharer_heat_capacity) = if considers_heat {
			(self.heat_capacity_archived(), sharer.heat_capacity_archived())
		} else {
			(0.0, 0.0)
		};
		let mut heat_capacity_to_sharer = 0.0;
		let mut heat_capacity_sharer_to_this = 0.0;
		let mut moved_moles = 0.0;
		let mut abs_moved_moles = 0.0;
		let divisor = (adjacent_tile_count + 1) as f32;
		let len = self
			.moles_archived
			.len()
			.max(sharer.moles_archived.len());
		self.maybe_expand(len);
		sharer.maybe_expand(len);
		with_specific_heats(|heats| {
			for i in 0..len {
				let mut delta =
					(self.get_moles_archived(i) - sharer.get_moles_archived(i)) / divisor;
				if delta.abs() < GAS_MIN_MOLES || !delta.is_finite() {
					continue;
				}
				// Archived deltas can outrun what is actually left this cycle.
				if delta > 0.0 && !self.immutable {
					delta = delta.min(self.moles[i]);
				} else if delta < 0.0 && !sharer.immutable {
					delta = delta.max(-sharer.moles[i]);
				}
				if considers_heat {
					let gas_heat_capacity = delta * heats.get(i).copied().unwrap_or(0.0);
					if delta > 0.0 {
						heat_capacity_to_sharer += gas_heat_capacity;
					} else {
						heat_capacity_sharer_to_this -= gas_heat_capacity;
					}
				}
				if !self.immutable {
					self.moles[i] -= delta;
				}
				if !sharer.immutable {
					sharer.moles[i] += delta;
				}
				moved_moles += delta;
				abs_moved_moles += delta.abs();
			}
		});
		self.cached_heat_capacity.set(None);
		sharer.cached_heat_capacity.set(None);
		self.last_share = abs_moved_moles;

		if considers_heat {
			let new_heat_capacity =
				old_heat_capacity + heat_capacity_sharer_to_this - heat_capacity_to_sharer;
			let new_sharer_heat_capacity =
				old_sharer_heat_capacity + heat_capacity_to_sharer - heat_capacity_sharer_to_this;
			if !self.immutable && new_heat_capacity > MINIMUM_HEAT_CAPACITY {
				self.set_temperature(
					(old_heat_capacity * self.temperature
						- heat_capacity_to_sharer * self.temperature_archived
						+ heat_capacity_sharer_to_this * sharer.temperature_archived)
						/ new_heat_capacity,
				);
			}
			if !sharer.immutable && new_sharer_heat_capacity > MINIMUM_HEAT_CAPACITY {
				sharer.set_temperature(
					(old_sharer_heat_capacity * sharer.temperature
						- heat_capacity_sharer_to_this * sharer.temperature_archived
						+ heat_capacity_to_sharer * self.temperature_archived)
						/ new_sharer_heat_capacity,
				);
			}
			if old_sharer_heat_capacity.abs() > MINIMUM_HEAT_CAPACITY
				&& (new_sharer_heat_capacity / old_sharer_heat_capacity - 1.0).abs() < 0.1
			{
				self.temperature_share(sharer, OPEN_HEAT_TRANSFER_COEFFICIENT);
			}
		}

		if !(temperature_delta > MINIMUM_TEMPERATURE_TO_MOVE
			|| moved_moles.abs() > MINIMUM_MOLES_DELTA_TO_MOVE)
		{
			return 0.0;
		}
		let our_moles = self.total_moles();
		let their_moles = sharer.total_moles();
		(self.temperature_archived * (our_moles + moved_moles)
			- sharer.temperature_archived * (their_moles - moved_moles))
			* R_IDEAL_GAS_EQUATION
			/ self.volume
	}
	/// `share`, for mixtures that aren't part of a tile cycle: archives both sides first.
	pub fn share_current(&mut self, sharer: &mut Self, adjacent_tile_count: usize) -> f32 {
		self.archive();
		sharer.archive();
		self.share(sharer, adjacent_tile_count)
	}
	/// Conduction between two mixtures, from archived temperatures and heat capacities.
	/// Returns the sharer's new temperature.
	pub fn temperature_share(&mut self, sharer: &mut Self, conduction_coefficient: f32) -> f32 {
		let temperature_delta = self.temperature_archived - sharer.temperature_archived;
		if temperature_delta.abs() > MINIMUM_TEMPERATURE_DELTA_TO_CONSIDER {
			let self_heat_capacity = self.heat_capacity_archived();
			let sharer_heat_capacity = sharer.heat_capacity_archived();

			if sharer_heat_capacity > MINIMUM_HEAT_CAPACITY
				&& self_heat_capacity > MINIMUM_HEAT_CAPACITY
			{
				let heat = conduction_coefficient
					* temperature_delta
					* (self_heat_capacity * sharer_heat_capacity
						/ (self_heat_capacity + sharer_heat_capacity));
				self.set_temperature(self.temperature - heat / self_heat_capacity);
				sharer.set_temperature(sharer.temperature + heat / sharer_heat_capacity);
			}
		}
		sharer.temperature
	}
	/// `temperature_share`, archiving both sides first.
	pub fn temperature_share_current(
		&mut self,
		sharer: &mut Self,
		conduction_coefficient: f32,
	) -> f32 {
		self.archive();
		sharer.archive();
		self.temperature_share(sharer, conduction_coefficient)
	}
	/// As above, but the other side is a solid with an arbitrary temperature and heat capacity.
	/// Returns the solid's new temperature.
	pub fn temperature_share_non_gas(
		&mut self,
		conduction_coefficient: f32,
		sharer_temperature: f32,
		sharer_heat_capacity: f32,
	) -> f32 {
		let temperature_delta = self.temperature_archived - sharer_temperature;
		if temperature_delta.abs() > MINIMUM_TEMPERATURE_DELTA_TO_CONSIDER {
			let self_heat_capacity = self.heat_capacity_archived();

			if sharer_heat_capacity > MINIMUM_HEAT_CAPACITY
				&& self_heat_capacity > MINIMUM_HEAT_CAPACITY
			{
				let heat = conduction_coefficient
					* temperature_delta
					* (self_heat_capacity * sharer_heat_capacity
						/ (self_heat_capacity + sharer_heat_capacity));
				self.set_temperature(self.temperature - heat / self_heat_capacity);
				return (sharer_temperature + heat / sharer_heat_capacity).max(TCMB);
			}
		}
		sharer_temperature
	}
	/// Decides whether sharing with `sample` is worth it.
	pub fn compare_exchange(&self, sample: &Self) -> GasCompareResult {
		let mut moles = 0.0;
		for (i, pair) in self
			.moles
			.iter()
			.copied()
			.zip_longest(sample.moles.iter().copied())
			.enumerate()
		{
			let (ours, theirs) = match pair {
				Both(a, b) => (a, b),
				Left(a) => (a, 0.0),
				Right(b) => (0.0, b),
			};
			let delta = (ours - theirs).abs();
			if delta > MINIMUM_MOLES_DELTA_TO_MOVE && delta > ours * MINIMUM_AIR_RATIO_TO_MOVE {
				return GasCompareResult::Species(i);
			}
			moles += ours;
		}
		if moles > MINIMUM_MOLES_DELTA_TO_MOVE
			&& (self.temperature - sample.temperature).abs() > MINIMUM_TEMPERATURE_DELTA_TO_SUSPEND
		{
			return GasCompareResult::TemperatureExchange;
		}
		GasCompareResult::NoExchange
	}
	/// Returns the maximum mole delta for an individual gas.
	pub fn compare(&self, sample: &Self) -> f32 {
		self.moles
			.iter()
			.copied()
			.zip_longest(sample.moles.iter().copied())
			.fold(0.0, |acc, pair| acc.max(pair.reduce(|a, b| (b - a).abs())))
	}
	/// Pumps gas into `output` until it reaches `target_pressure`. Returns false if there was nothing to do.
	pub fn pump_gas_to(&mut self, output: &mut Self, target_pressure: f32) -> bool {
		let pressure_delta = target_pressure - output.return_pressure();
		if pressure_delta < MINIMUM_PRESSURE_TO_PUMP {
			return false;
		}
		if !(self.total_moles() > 0.0) || !(self.temperature > 0.0) {
			return false;
		}
		let transfer_moles =
			pressure_delta * output.volume / (self.temperature * R_IDEAL_GAS_EQUATION);
		let removed = self.remove(transfer_moles);
		output.merge(&removed);
		true
	}
	/// Passively releases gas toward `target_pressure`. Needs a 10 kPa difference to
	/// overcome friction, and never pushes more than half the pressure difference.
	/// A `None` output is an unbounded sink the size of a tile.
	pub fn release_gas_to(&mut self, output: Option<&mut Self>, target_pressure: f32) -> bool {
		let output_pressure = output.as_ref().map_or(0.0, |out| out.return_pressure());
		let input_pressure = self.return_pressure();
		if output_pressure >= target_pressure.min(input_pressure - MINIMUM_PRESSURE_TO_RELEASE) {
			return false;
		}
		if !(self.total_moles() > 0.0) || !(self.temperature > 0.0) {
			return false;
		}
		let pressure_delta =
			(target_pressure - output_pressure).min((input_pressure - output_pressure) / 2.0);
		let output_volume = output.as_ref().map_or(CELL_VOLUME, |out| out.volume);
		let transfer_moles =
			pressure_delta * output_volume / (self.temperature * R_IDEAL_GAS_EQUATION);
		let removed = self.remove(transfer_moles);
		if let Some(out) = output {
			out.merge(&removed);
		}
		true
	}
	/// Moves every gas in `filter` into `destination`. Returns false if there was nothing to move.
	pub fn scrub_into(&mut self, destination: &mut Self, filter: &[GasIDX]) -> bool {
		if self.immutable {
			return false;
		}
		let mut buffer = Self::from_vol_temp(self.volume, self.temperature);
		for &gas in filter {
			buffer.adjust_moles(gas, self.get_moles(gas));
			self.set_moles(gas, 0.0);
		}
		self.garbage_collect();
		if buffer.total_moles() <= 0.0 {
			return false;
		}
		destination.merge(&buffer);
		true
	}
	/// Fraction of the higher-pressure side's moles that has to move for both sides to end up at
	/// the same pressure, accounting for the receiving side heating up or cooling down.
	pub fn fraction_to_equalize_pressure(&self, other: &Self) -> f32 {
		let (high, low) = if self.return_pressure() < other.return_pressure() {
			(other, self)
		} else {
			(self, other)
		};
		let high_moles = high.total_moles();
		if high_moles <= 0.0 || high.volume <= 0.0 {
			return 0.0;
		}
		let volume_ratio = low.volume / high.volume;
		let moles_ratio = low.total_moles() / high_moles;
		let temperature_ratio = low.temperature / high.temperature;
		let heat_capacity_ratio = low.heat_capacity() / high.heat_capacity();

		let quadratic_a = 1.0 + volume_ratio;
		let quadratic_b = moles_ratio - volume_ratio
			+ heat_capacity_ratio * (temperature_ratio + volume_ratio);
		let quadratic_c = heat_capacity_ratio * (moles_ratio * temperature_ratio - volume_ratio);

		(-quadratic_b + (quadratic_b * quadratic_b - 4.0 * quadratic_a * quadratic_c).sqrt())
			/ (2.0 * quadratic_a)
	}
	/// How many moles have to leave for this mixture to drop to `target_pressure`, assuming free expansion.
	pub fn moles_to_pressure_threshold(&self, target_pressure: f32) -> f32 {
		self.total_moles()
			- target_pressure * self.volume / (R_IDEAL_GAS_EQUATION * self.temperature)
	}
	/// Only checks pressure and temperature, not what's actually in it.
	pub fn is_probably_safe(&self) -> bool {
		let pressure = self.return_pressure();
		let temperature = self.temperature;
		pressure > WARNING_LOW_PRESSURE
			&& pressure < WARNING_HIGH_PRESSURE
			&& temperature > SAFE_MINIMUM_TEMPERATURE
			&& temperature < SAFE_MAXIMUM_TEMPERATURE
	}
	/// Clears the moles from the gas.
	pub fn clear(&mut self) {
		if !self.immutable {
			self.moles.clear();
			self.cached_heat_capacity.set(None);
		}
	}
	/// Multiplies every gas molage with this value.
	pub fn multiply(&mut self, multiplier: f32) {
		if !self.immutable {
			for amt in self.moles.iter_mut() {
				*amt *= multiplier;
			}
			self.cached_heat_capacity.set(None);
			self.garbage_collect();
		}
	}
	/// Adds heat directly to the gas mixture, in joules.
	pub fn adjust_heat(&mut self, heat: f32) {
		let cap = self.heat_capacity();
		self.set_temperature(((cap * self.temperature) + heat) / cap);
	}
	/// Returns true if there's a visible gas in this mix.
	pub fn is_visible(&self) -> bool {
		self.enumerate()
			.any(|(i, gas)| gas_visibility(i).map_or(false, |amt| gas >= amt))
	}
	/// A hashed representation of the visibility of a gas, so that overlays only need
	/// to update when it actually changed.
	pub fn vis_hash_changed(&self, gas_visibility: &[Option<f32>]) -> bool {
		use std::hash::Hasher;
		let mut hasher: ahash::AHasher = ahash::AHasher::default();
		for (i, gas) in self.enumerate() {
			if let Some(amt) = gas_visibility
				.get(i)
				.copied()
				.flatten()
				.filter(|&amt| gas >= amt)
			{
				hasher.write_usize(i);
				hasher.write_usize((FACTOR_GAS_VISIBLE_MAX).min((gas / amt).ceil()) as usize);
			}
		}
		let cur_hash = hasher.finish();
		self.cached_vis_hash.replace(cur_hash) != cur_hash
	}
	/// Zeroes everything under `GAS_MIN_MOLES` and trims trailing zeroes.
	pub fn garbage_collect(&mut self) {
		let mut last_valid_found = None;
		for (i, amt) in self.moles.iter_mut().enumerate() {
			if *amt > GAS_MIN_MOLES && amt.is_finite() {
				last_valid_found = Some(i);
			} else {
				*amt = 0.0;
			}
		}
		self.moles.truncate(last_valid_found.map_or(0, |i| i + 1));
	}
}

/// Splits `source` over `receivers` by their share of the total volume. The source is left alone;
/// immutable receivers are skipped.
pub fn divide_into(source: &Mixture, receivers: &mut [&mut Mixture]) {
	let total_volume: f32 = receivers
		.iter()
		.filter(|r| !r.is_immutable())
		.map(|r| r.volume)
		.sum();
	if total_volume <= 0.0 {
		return;
	}
	let source_heat_capacity = source.heat_capacity();
	for receiver in receivers.iter_mut().filter(|r| !r.is_immutable()) {
		let fraction = receiver.volume / total_volume;
		if (receiver.temperature - source.temperature).abs() > MINIMUM_TEMPERATURE_DELTA_TO_CONSIDER
		{
			if receiver.total_moles() == 0.0 {
				receiver.set_temperature(source.temperature);
			} else {
				let receiver_heat_capacity = receiver.heat_capacity();
				let combined = receiver_heat_capacity + source_heat_capacity * fraction;
				if combined > MINIMUM_HEAT_CAPACITY {
					receiver.set_temperature(
						(source.temperature * source_heat_capacity * fraction
							+ receiver.temperature * receiver_heat_capacity)
							/ combined,
					);
				}
			}
		}
		receiver.maybe_expand(source.moles.len());
		for (ours, theirs) in receiver.moles.iter_mut().zip(source.moles.iter()) {
			*ours += theirs * fraction;
		}
		receiver.cached_heat_capacity.set(None);
	}
}

use std::ops::{Add, Mul};

/// Takes a copy of the mix, merges the right hand side, then returns the copy.
impl Add<&Mixture> for Mixture {
	type Output = Self;

	fn add(self, rhs: &Mixture) -> Self {
		let mut ret = self;
		ret.merge(rhs);
		ret
	}
}

/// Makes a copy of the given mix, multiplied by a scalar.
impl<'a> Mul<f32> for &'a Mixture {
	type Output = Mixture;

	fn mul(self, rhs: f32) -> Mixture {
		let mut ret = self.clone();
		ret.multiply(rhs);
		ret
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::gas::gas_idx_from_string;
	use approx::assert_abs_diff_eq;

	fn o2() -> GasIDX {
		gas_idx_from_string(GAS_O2).unwrap()
	}

	fn n2() -> GasIDX {
		gas_idx_from_string(GAS_N2).unwrap()
	}

	fn plasma() -> GasIDX {
		gas_idx_from_string(GAS_PLASMA).unwrap()
	}

	#[test]
	fn test_merge() {
		let mut into = Mixture::new();
		into.set_moles(o2(), 82.0);
		into.set_moles(n2(), 22.0);
		into.set_temperature(293.15);
		let mut source = Mixture::new();
		source.set_moles(plasma(), 100.0);
		source.set_temperature(313.15);
		into.merge(&source);
		// make sure that the merge successfuly moved the moles
		assert_eq!(into.get_moles(plasma()), 100.0);
		assert_eq!(source.get_moles(plasma()), 100.0); // source is not modified by merge
		/*
		heat capacities are 82*20 + 22*30 = 2,300 and 100*200 = 20,000,
		so thermal energies of 674,245 and 6,263,000.
		(674,245 + 6,263,000) / 22,300 ~ 311.087
		*/
		assert!(
			(into.get_temperature() - 311.087).abs() < 0.01,
			"{} should be near 311.087",
			into.get_temperature(),
		);
	}

	#[test]
	fn test_remove() {
		let mut removed = Mixture::new();
		removed.set_moles(o2(), 22.0);
		removed.set_moles(n2(), 82.0);
		let new = removed.remove_ratio(0.5);
		assert!(removed.compare(&new) < MINIMUM_MOLES_DELTA_TO_MOVE);
		assert_eq!(removed.get_moles(o2()), 11.0);
		assert_eq!(removed.get_moles(n2()), 41.0);
		removed.mark_immutable();
		let new_two = removed.remove_ratio(0.5);
		assert!(removed.compare(&new_two) >= MINIMUM_MOLES_DELTA_TO_MOVE);
		assert_eq!(removed.get_moles(o2()), 11.0);
		assert_eq!(removed.get_moles(n2()), 41.0);
		assert_eq!(new_two.get_moles(o2()), 5.5);
	}

	#[test]
	fn remove_ratio_edges() {
		let mut mix = Mixture::from_vol_temp(CELL_VOLUME, 300.0);
		mix.set_moles(o2(), 10.0);
		let nothing = mix.remove_ratio(-1.0);
		assert_eq!(nothing.total_moles(), 0.0);
		assert_eq!(nothing.get_temperature(), 300.0);
		assert_eq!(nothing.volume, CELL_VOLUME);
		let everything = mix.remove_ratio(5.0);
		assert_eq!(everything.get_moles(o2()), 10.0);
		assert_eq!(mix.total_moles(), 0.0);
		let mut empty = Mixture::new();
		assert_eq!(empty.remove(5.0).total_moles(), 0.0);
	}

	#[test]
	fn setters_reject_garbage() {
		let mut mix = Mixture::new();
		mix.set_moles(o2(), f32::NAN);
		mix.set_moles(n2(), -4.0);
		mix.set_moles(plasma(), f32::INFINITY);
		assert_eq!(mix.total_moles(), 0.0);
		mix.set_temperature(0.5);
		assert_eq!(mix.get_temperature(), TCMB);
		mix.adjust_moles(o2(), 5.0);
		mix.adjust_moles(o2(), -10.0);
		assert_eq!(mix.get_moles(o2()), 0.0);
	}

	#[test]
	fn space_heat_capacity() {
		let space = Mixture::space();
		assert_eq!(space.heat_capacity(), HEAT_CAPACITY_VACUUM);
		let empty = Mixture::new();
		assert_eq!(empty.heat_capacity(), MINIMUM_HEAT_CAPACITY);
	}

	#[test]
	fn share_conserves_moles() {
		let mut a = Mixture::from_vol_temp(CELL_VOLUME, T20C);
		a.set_moles(o2(), 10.0);
		a.set_moles(n2(), 30.0);
		let mut b = Mixture::from_vol_temp(CELL_VOLUME, 500.0);
		b.set_moles(plasma(), 3.0);
		for _ in 0..5 {
			a.archive();
			b.archive();
			a.share(&mut b, 1);
			assert_abs_diff_eq!(a.total_moles() + b.total_moles(), 43.0, epsilon = 0.001);
			assert!(a.enumerate().all(|(_, m)| m >= 0.0));
			assert!(b.enumerate().all(|(_, m)| m >= 0.0));
		}
		assert_abs_diff_eq!(a.get_moles(o2()), 5.0, epsilon = 0.001);
		assert_abs_diff_eq!(b.get_moles(n2()), 15.0, epsilon = 0.001);
	}

	#[test]
	fn share_uses_archive() {
		let mut a = Mixture::from_vol_temp(CELL_VOLUME, T20C);
		a.set_moles(o2(), 100.0);
		a.archive();
		let mut b = Mixture::from_vol_temp(CELL_VOLUME, T20C);
		b.archive();
		// change current state after archiving; the archive drives the delta
		a.set_moles(o2(), 80.0);
		a.share(&mut b, 3);
		assert_abs_diff_eq!(b.get_moles(o2()), 25.0, epsilon = 0.001);
		assert_abs_diff_eq!(a.get_moles(o2()), 55.0, epsilon = 0.001);
		assert_abs_diff_eq!(a.last_share(), 25.0, epsilon = 0.001);
	}

	#[test]
	fn share_heat_uses_archived_capacity() {
		let mut a = Mixture::from_vol_temp(CELL_VOLUME, 400.0);
		a.set_moles(n2(), 100.0);
		a.archive();
		let mut b = Mixture::from_vol_temp(CELL_VOLUME, 300.0);
		b.set_moles(plasma(), 100.0);
		b.archive();
		// An earlier neighbor already handed `a` more gas this cycle.
		a.set_moles(n2(), 150.0);
		a.share(&mut b, 1);
		/*
		archived capacity 100*30 = 3,000; 50 N2 leaves (1,500), 50 plasma arrives (10,000),
		so (3,000*400 - 1,500*400 + 10,000*300) / 11,500 ~ 313.043
		*/
		assert_abs_diff_eq!(a.get_temperature(), 313.043, epsilon = 0.01);
	}

	#[test]
	fn immutable_is_never_mutated() {
		let mut space = Mixture::space();
		let mut room = Mixture::from_vol_temp(CELL_VOLUME, T20C);
		room.set_moles(o2(), 40.0);
		space.merge(&room);
		assert_eq!(space.total_moles(), 0.0);
		space.set_temperature(1000.0);
		assert_eq!(space.get_temperature(), TCMB);
		room.archive();
		space.archive();
		room.share(&mut space, 1);
		assert_eq!(space.total_moles(), 0.0);
		assert_abs_diff_eq!(room.get_moles(o2()), 20.0, epsilon = 0.001);
		room.archive();
		space.archive();
		space.share(&mut room, 1);
		assert_eq!(space.total_moles(), 0.0);
		assert_abs_diff_eq!(room.get_moles(o2()), 10.0, epsilon = 0.001);
		let taken = space.remove_ratio(0.5);
		assert_eq!(taken.total_moles(), 0.0);
		space.multiply(3.0);
		space.clear();
		space.copy_from_mutable(&room);
		assert_eq!(space.total_moles(), 0.0);
		room.temperature_share_current(&mut space, OPEN_HEAT_TRANSFER_COEFFICIENT);
		assert_eq!(space.get_temperature(), TCMB);
		assert!(room.get_temperature() < T20C);
	}

	#[test]
	fn compare_exchange_thresholds() {
		let mut a = Mixture::from_vol_temp(CELL_VOLUME, T20C);
		a.set_moles(o2(), 20.0);
		let mut b = a.clone();
		assert_eq!(a.compare_exchange(&b), GasCompareResult::NoExchange);
		b.set_temperature(T20C + 10.0);
		assert_eq!(
			a.compare_exchange(&b),
			GasCompareResult::TemperatureExchange
		);
		b.set_moles(n2(), 5.0);
		assert_eq!(a.compare_exchange(&b), GasCompareResult::Species(n2()));
	}

	#[test]
	fn pump_and_release() {
		let mut tank = Mixture::from_vol_temp(100.0, T20C);
		tank.set_moles(n2(), 100.0);
		let mut room = Mixture::from_vol_temp(CELL_VOLUME, T20C);
		assert!(tank.pump_gas_to(&mut room, ONE_ATMOSPHERE / 10.0));
		assert_abs_diff_eq!(room.return_pressure(), ONE_ATMOSPHERE / 10.0, epsilon = 0.01);
		assert!(!tank.pump_gas_to(&mut room, ONE_ATMOSPHERE / 10.0));

		let before = tank.total_moles();
		assert!(tank.release_gas_to(None, ONE_ATMOSPHERE));
		assert!(tank.total_moles() < before);
		let mut full = Mixture::from_vol_temp(CELL_VOLUME, T20C);
		full.set_moles(n2(), 1000.0);
		assert!(!tank.release_gas_to(Some(&mut full), ONE_ATMOSPHERE));
	}

	#[test]
	fn fraction_to_equalize() {
		let mut high = Mixture::from_vol_temp(CELL_VOLUME, T20C);
		high.set_moles(n2(), 100.0);
		let low = Mixture::from_vol_temp(CELL_VOLUME, T20C);
		let fraction = high.fraction_to_equalize_pressure(&low);
		assert_abs_diff_eq!(fraction, 0.5, epsilon = 0.01);
		assert_abs_diff_eq!(low.fraction_to_equalize_pressure(&high), fraction);
		let moved = high.remove_ratio(fraction);
		let mut low = low;
		low.merge(&moved);
		assert_abs_diff_eq!(high.return_pressure(), low.return_pressure(), epsilon = 0.5);
	}

	#[test]
	fn pressure_helpers() {
		let mut air = Mixture::from_vol_temp(CELL_VOLUME, T20C);
		air.set_moles(o2(), MOLES_O2STANDARD);
		air.set_moles(n2(), MOLES_N2STANDARD);
		assert!(air.is_probably_safe());
		assert_abs_diff_eq!(air.moles_to_pressure_threshold(ONE_ATMOSPHERE), 0.0, epsilon = 0.01);
		air.set_temperature(400.0);
		assert!(!air.is_probably_safe());
	}

	#[test]
	fn scrub_and_divide() {
		let mut air = Mixture::from_vol_temp(CELL_VOLUME, T20C);
		air.set_moles(o2(), 10.0);
		air.set_moles(plasma(), 5.0);
		let mut canister = Mixture::from_vol_temp(1000.0, T20C);
		assert!(air.scrub_into(&mut canister, &[plasma()]));
		assert!(!air.scrub_into(&mut canister, &[plasma()]));
		assert_eq!(air.get_moles(plasma()), 0.0);
		assert_eq!(canister.get_moles(plasma()), 5.0);

		let mut small = Mixture::from_vol_temp(100.0, T20C);
		let mut big = Mixture::from_vol_temp(300.0, T20C);
		divide_into(&air, &mut [&mut small, &mut big]);
		assert_abs_diff_eq!(small.get_moles(o2()), 2.5, epsilon = 0.001);
		assert_abs_diff_eq!(big.get_moles(o2()), 7.5, epsilon = 0.001);
		assert_eq!(air.get_moles(o2()), 10.0);
	}
}

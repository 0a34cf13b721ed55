use fxhash::FxBuildHasher;

use indexmap::IndexMap;

use parking_lot::RwLock;

use super::{constants::*, GasIDX};

use eyre::Result;

use std::sync::atomic::{AtomicUsize, Ordering};

static GAS_TABLE_GENERATION: AtomicUsize = AtomicUsize::new(0);

/// An individual gas type. Everything a mixture needs to know about a species at simulation time.
#[derive(Clone, Debug)]
pub struct GasType {
	/// The index of this gas in the moles vector of a mixture. Usually the most common representation, for speed.
	pub idx: GasIDX,
	/// The string ID; use `gas_idx_from_string` to get idx from this.
	pub id: Box<str>,
	/// Human readable name.
	pub name: Box<str>,
	/// The specific heat of the gas. Duplicated in the specific heats vector for speed.
	pub specific_heat: f32,
	/// Molar mass in g/mol. Not used by the simulation itself.
	pub molar_mass: f32,
	/// The moles at which the gas's overlay or other appearance shows up. If None, gas is never visible.
	pub moles_visible: Option<f32>,
}

impl GasType {
	#[must_use]
	pub fn new(id: &str, name: &str, specific_heat: f32, molar_mass: f32) -> Self {
		Self {
			idx: 0,
			id: id.into(),
			name: name.into(),
			specific_heat,
			molar_mass,
			moles_visible: None,
		}
	}
	#[must_use]
	pub fn visible_at(mut self, moles: f32) -> Self {
		self.moles_visible = Some(moles);
		self
	}
}

struct GasRegistry {
	by_idx: Vec<GasType>,
	by_id: IndexMap<Box<str>, GasIDX, FxBuildHasher>,
	specific_heats: Vec<f32>,
}

impl GasRegistry {
	fn with_gases(gases: impl IntoIterator<Item = GasType>) -> Result<Self> {
		let mut registry = Self {
			by_idx: Vec::new(),
			by_id: IndexMap::with_hasher(FxBuildHasher::default()),
			specific_heats: Vec::new(),
		};
		for gas in gases {
			registry.push(gas)?;
		}
		Ok(registry)
	}
	fn push(&mut self, mut gas: GasType) -> Result<GasIDX> {
		if !gas.specific_heat.is_finite() || gas.specific_heat < 0.0 {
			return Err(eyre::eyre!(
				"Gas {} has an invalid specific heat: {}",
				gas.id,
				gas.specific_heat
			));
		}
		if self.by_id.contains_key(&gas.id) {
			return Err(eyre::eyre!("Gas {} is already registered!", gas.id));
		}
		let idx = self.by_idx.len();
		gas.idx = idx;
		self.by_id.insert(gas.id.clone(), idx);
		self.specific_heats.push(gas.specific_heat);
		self.by_idx.push(gas);
		Ok(idx)
	}
}

/// The gases every grid starts out knowing about. Specific heats are J/(mol*K).
#[must_use]
pub fn default_gases() -> Vec<GasType> {
	vec![
		GasType::new(GAS_O2, "Oxygen", 20.0, 32.0),
		GasType::new(GAS_N2, "Nitrogen", 30.0, 28.0),
		GasType::new(GAS_CO2, "Carbon Dioxide", 30.0, 44.0),
		GasType::new(GAS_PLASMA, "Plasma", 200.0, 120.0).visible_at(MOLES_GAS_VISIBLE),
		GasType::new(GAS_TRITIUM, "Tritium", 10.0, 6.0).visible_at(MOLES_GAS_VISIBLE),
		GasType::new(GAS_H2O, "Water Vapor", 40.0, 18.0).visible_at(MOLES_GAS_VISIBLE * 4.0),
		GasType::new(GAS_AMMONIA, "Ammonia", 20.0, 44.0).visible_at(MOLES_GAS_VISIBLE),
		GasType::new(GAS_N2O, "Nitrous Oxide", 40.0, 44.0).visible_at(MOLES_GAS_VISIBLE),
		GasType::new(GAS_FREON, "Frezon", 600.0, 50.0).visible_at(MOLES_GAS_VISIBLE),
	]
}

lazy_static::lazy_static! {
	static ref GAS_REGISTRY: RwLock<GasRegistry> = RwLock::new(
		GasRegistry::with_gases(default_gases()).unwrap_or_else(|e| panic!("Default gases are malformed: {e}"))
	);
}

/// Registers an additional gas, returning its index.
/// # Errors
/// If a gas with that ID already exists or the specific heat is not a non-negative number.
pub fn register_gas(gas: GasType) -> Result<GasIDX> {
	GAS_REGISTRY.write().push(gas)
}

/// Replaces the whole gas table. Mixtures made before this call keep their old indices, so only call it before any grid exists.
/// # Errors
/// If the list contains duplicate IDs or bad specific heats; the old table is kept in that case.
pub fn set_gases(gases: impl IntoIterator<Item = GasType>) -> Result<()> {
	let registry = GasRegistry::with_gases(gases)?;
	*GAS_REGISTRY.write() = registry;
	GAS_TABLE_GENERATION.fetch_add(1, Ordering::Relaxed);
	Ok(())
}

/// Bumped whenever the gas table is replaced, so cached indices know to look up again.
/// Registering an extra gas keeps existing indices and leaves this alone.
pub fn gas_table_generation() -> usize {
	GAS_TABLE_GENERATION.load(Ordering::Relaxed)
}

pub fn with_specific_heats<T>(f: impl FnOnce(&[f32]) -> T) -> T {
	f(GAS_REGISTRY.read().specific_heats.as_slice())
}

/// Returns the total number of gases in use.
pub fn total_num_gases() -> GasIDX {
	GAS_REGISTRY.read().by_idx.len()
}

/// Gets the gas visibility threshold for the given gas ID.
pub fn gas_visibility(idx: GasIDX) -> Option<f32> {
	GAS_REGISTRY
		.read()
		.by_idx
		.get(idx)
		.and_then(|gas| gas.moles_visible)
}

/// Gets a copy of all the gas visibilities.
pub fn visibility_copies() -> Box<[Option<f32>]> {
	GAS_REGISTRY
		.read()
		.by_idx
		.iter()
		.map(|g| g.moles_visible)
		.collect::<Vec<_>>()
		.into_boxed_slice()
}

/// Allows one to run a closure with a lock on the global gas info vec.
pub fn with_gas_info<T>(f: impl FnOnce(&[GasType]) -> T) -> T {
	f(&GAS_REGISTRY.read().by_idx)
}

/// Returns the appropriate index for a given ID string.
/// # Errors
/// If no gas with that ID is registered.
pub fn gas_idx_from_string(id: &str) -> Result<GasIDX> {
	GAS_REGISTRY
		.read()
		.by_id
		.get(id)
		.copied()
		.ok_or_else(|| eyre::eyre!("Invalid gas ID: {}", id))
}

/// Takes an index and returns the string ID of the gas stored in that index.
/// # Errors
/// If the index is out of range.
pub fn gas_idx_to_id(idx: GasIDX) -> Result<Box<str>> {
	GAS_REGISTRY
		.read()
		.by_idx
		.get(idx)
		.map(|gas| gas.id.clone())
		.ok_or_else(|| eyre::eyre!("Invalid gas index: {}", idx))
}

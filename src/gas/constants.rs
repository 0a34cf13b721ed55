pub const R_IDEAL_GAS_EQUATION: f32 = 8.314_463; //kPa*L/(K*mol)
pub const ONE_ATMOSPHERE: f32 = 101.325; //kPa
pub const TCMB: f32 = 2.7; // -270.3degC
pub const T0C: f32 = 273.15; // 0degC
pub const T20C: f32 = 293.15; // 20degC

pub const GAS_MIN_MOLES: f32 = 0.000_000_05;

pub const MINIMUM_HEAT_CAPACITY: f32 = 0.0003;

pub const CELL_VOLUME: f32 = 2500.0; //liters in a cell
pub const MOLES_CELLSTANDARD: f32 = ONE_ATMOSPHERE * CELL_VOLUME / (T20C * R_IDEAL_GAS_EQUATION); //moles in a 2.5 m^3 cell at 101.325 kPa and 20 degC
pub const M_CELL_WITH_RATIO: f32 = MOLES_CELLSTANDARD * 0.005; //compared against for superconductivity
pub const O2STANDARD: f32 = 0.21; //percentage of oxygen in a normal mixture of air
pub const N2STANDARD: f32 = 0.79; //same but for nitrogen
pub const MOLES_O2STANDARD: f32 = MOLES_CELLSTANDARD * O2STANDARD; // O2 standard value (21%)
pub const MOLES_N2STANDARD: f32 = MOLES_CELLSTANDARD * N2STANDARD; // N2 standard value (79%)

//EXCITED GROUPS
pub const EXCITED_GROUP_BREAKDOWN_CYCLES: u32 = 4; //number of FULL atmos cycles before an excited group breaks down (averages gas contents across tiles)
pub const EXCITED_GROUP_DISMANTLE_CYCLES: u32 = 16; //number of FULL atmos cycles before an excited group dismantles and removes its tiles from active

pub const MINIMUM_AIR_RATIO_TO_SUSPEND: f32 = 0.1; //Ratio of air that must move to/from a tile to reset group processing
pub const MINIMUM_AIR_RATIO_TO_MOVE: f32 = 0.001; //Minimum ratio of air that must move to/from a tile
pub const MINIMUM_AIR_TO_SUSPEND: f32 = MOLES_CELLSTANDARD * MINIMUM_AIR_RATIO_TO_SUSPEND; //Minimum amount of air that has to move before a group processing can be suspended
pub const MINIMUM_MOLES_DELTA_TO_MOVE: f32 = MOLES_CELLSTANDARD * MINIMUM_AIR_RATIO_TO_MOVE; //Either this must be active
pub const MINIMUM_TEMPERATURE_TO_MOVE: f32 = T20C + 100.0; //or this (or both, obviously)
pub const MINIMUM_TEMPERATURE_DELTA_TO_SUSPEND: f32 = 4.0; //Minimum temperature difference before group processing is suspended
pub const MINIMUM_TEMPERATURE_DELTA_TO_CONSIDER: f32 = 0.5; //Minimum temperature difference before the gas temperatures are just set to be equal
pub const MINIMUM_TEMPERATURE_FOR_SUPERCONDUCTION: f32 = T20C + 10.0;
pub const MINIMUM_TEMPERATURE_START_SUPERCONDUCTION: f32 = T20C + 200.0;

//HEAT TRANSFER COEFFICIENTS
//Must be between 0 and 1. Values closer to 1 equalize temperature faster
//Should not exceed 0.4 else strange heat flow occur
pub const WALL_HEAT_TRANSFER_COEFFICIENT: f32 = 0.0;
pub const OPEN_HEAT_TRANSFER_COEFFICIENT: f32 = 0.4;
pub const WINDOW_HEAT_TRANSFER_COEFFICIENT: f32 = 0.1; //a hack for now
pub const HEAT_CAPACITY_VACUUM: f32 = 7000.0; //a hack to help make vacuums "cold", sacrificing realism for gameplay

//TILES
pub const DEFAULT_THERMAL_CONDUCTIVITY: f32 = 0.05;
pub const DEFAULT_TILE_HEAT_CAPACITY: f32 = 10_000.0;

//PRESSURE
pub const HAZARD_HIGH_PRESSURE: f32 = 550.0;
pub const WARNING_HIGH_PRESSURE: f32 = 0.7 * HAZARD_HIGH_PRESSURE;
pub const HAZARD_LOW_PRESSURE: f32 = 20.0;
pub const WARNING_LOW_PRESSURE: f32 = 2.5 * HAZARD_LOW_PRESSURE;
pub const SAFE_MINIMUM_TEMPERATURE: f32 = 260.0;
pub const SAFE_MAXIMUM_TEMPERATURE: f32 = 360.0;
pub const MINIMUM_PRESSURE_TO_PUMP: f32 = 0.01;
pub const MINIMUM_PRESSURE_TO_RELEASE: f32 = 10.0;

//MONSTERMOS
pub const MONSTERMOS_TILE_LIMIT: usize = 2000;
pub const MONSTERMOS_HARD_TILE_LIMIT: usize = 2000;
pub const FLOOR_RIP_MINIMUM_WIND: f32 = 20.0;
pub const FLOOR_RIP_WIND_SCALE: f32 = 500.0;
pub const FLOOR_RIP_MINIMUM_CHANCE: f32 = 0.005;
pub const FLOOR_RIP_MAXIMUM_CHANCE: f32 = 0.5;
pub const DEPRESSURIZATION_LOG_TILES: usize = 10;
pub const DEPRESSURIZATION_LOG_MOLES_PER_TILE: f32 = 20.0;

//FIRE
pub const FIRE_MINIMUM_TEMPERATURE_TO_SPREAD: f32 = 150.0 + T0C;
pub const FIRE_MINIMUM_TEMPERATURE_TO_EXIST: f32 = 100.0 + T0C;
pub const FIRE_SPREAD_RADIOSITY_SCALE: f32 = 0.85;
pub const FIRE_GROWTH_RATE: f32 = 40000.0; //For small fires
pub const HOTSPOT_EXPOSED_VOLUME_SCALE: f32 = 25.0;
pub const HOTSPOT_MINIMUM_REACTANT_MOLES: f32 = 0.5;
pub const HOTSPOT_BYPASS_VOLUME_RATIO: f32 = 0.95;
pub const HOTSPOT_LARGE_VOLUME_RATIO: f32 = 0.4;
pub const PLASMA_MINIMUM_BURN_TEMPERATURE: f32 = 100.0 + T0C;
pub const PLASMA_UPPER_TEMPERATURE: f32 = 1370.0 + T0C;
pub const PLASMA_OXYGEN_FULLBURN: f32 = 10.0;
pub const PLASMA_BURN_RATE_DELTA: f32 = 9.0;
pub const OXYGEN_BURN_RATE_BASE: f32 = 1.4;
pub const FIRE_PLASMA_ENERGY_RELEASED: f32 = 3_000_000.0;
pub const SUPER_SATURATION_THRESHOLD: f32 = 96.0;
pub const SUPER_SATURATION_ENDS: f32 = SUPER_SATURATION_THRESHOLD / 3.0;
pub const TRITIUM_BURN_OXY_FACTOR: f32 = 100.0;
pub const TRITIUM_BURN_TRIT_FACTOR: f32 = 10.0;
pub const FIRE_HYDROGEN_ENERGY_RELEASED: f32 = 284_000.0;

//GASES
pub const MOLES_GAS_VISIBLE: f32 = 0.25; //Moles in a standard cell after which gases are visible
pub const FACTOR_GAS_VISIBLE_MAX: f32 = 20.0; //moles_visible * FACTOR_GAS_VISIBLE_MAX = Moles after which gas is at maximum visibility

pub const GAS_O2: &str = "o2";
pub const GAS_N2: &str = "n2";
pub const GAS_CO2: &str = "co2";
pub const GAS_PLASMA: &str = "plasma";
pub const GAS_TRITIUM: &str = "tritium";
pub const GAS_H2O: &str = "water_vapor";
pub const GAS_AMMONIA: &str = "ammonia";
pub const GAS_N2O: &str = "n2o";
pub const GAS_FREON: &str = "freon";

//PROCESSING
pub const LAG_CHECK_ITERATIONS: usize = 30;
pub const REVALIDATE_LAG_CHECK_ITERATIONS: usize = 50;
pub const ATMOS_TICK_RATE: f32 = 15.0;
pub const ATMOS_MAX_PROCESS_TIME_MS: u64 = 5;

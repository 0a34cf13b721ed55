use crate::gas::Mixture;

/// Pools a set of mixtures and hands the pool back out by volume, so every mixture ends up
/// with the same composition, temperature and pressure. Immutable mixtures keep their gas.
pub fn equalize_all_gases_in_list(mixtures: &mut [&mut Mixture]) {
	let mut tot = Mixture::new();
	let mut tot_vol: f64 = 0.0;
	for gas in mixtures.iter() {
		tot.merge(gas);
		tot_vol += f64::from(gas.volume);
	}
	if tot_vol > 0.0 {
		for dest_gas in mixtures.iter_mut() {
			let vol = dest_gas.volume;
			dest_gas.copy_from_mutable(&tot);
			dest_gas.multiply((f64::from(vol) / tot_vol) as f32);
		}
	}
}

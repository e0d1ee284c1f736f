//! Physical constants and unit conversions
//!
//! Dataset energies are in wavenumbers [cm-1]; composite energies are
//! reported in [eV]. Lifetimes are in seconds, Einstein coefficients in [s-1].

/// Wavenumber equivalent of one electronvolt [cm-1 / eV]
pub const EV_IN_CM: f64 = 8065.543_937;

/// Second radiation constant hc/k [cm K]
pub const SECOND_RADIATION_CONSTANT: f64 = 1.438_776_877;

/// Reference temperature for the Boltzmann weights [K]
pub const DEFAULT_TEMPERATURE: f64 = 296.0;

/// Decimal digits kept in composite energies
pub const ENERGY_DECIMALS: i32 = 5;

#[inline]
pub fn ev_to_cm(energy_ev: f64) -> f64 {
    energy_ev * EV_IN_CM
}

#[inline]
pub fn cm_to_ev(energy_cm: f64) -> f64 {
    energy_cm / EV_IN_CM
}

/// Round half away from zero to a number of decimal digits
#[inline]
pub fn round_to(value: f64, decimals: i32) -> f64 {
    let scale = 10f64.powi(decimals);
    (value * scale).round() / scale
}

/// Boltzmann population weight `g * exp(-c2 E / T)` of a level with energy in [cm-1]
#[inline]
pub fn boltzmann_weight(g_tot: f64, energy_cm: f64, temperature: f64) -> f64 {
    g_tot * (-SECOND_RADIATION_CONSTANT * energy_cm / temperature).exp()
}

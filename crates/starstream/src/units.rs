//! Internal length units. One internal unit is one meter.

pub const M: f64 = 1.0;
pub const KM: f64 = 1.0e3;
/// Astronomical unit.
pub const AU: f64 = 1.495_978_707e11;
/// Light year.
pub const LY: f64 = 9.460_730_472_580_8e15;
/// Parsec.
pub const PC: f64 = 3.085_677_581_491_367e16;
pub const KPC: f64 = PC * 1.0e3;
pub const MPC: f64 = PC * 1.0e6;
pub const GPC: f64 = PC * 1.0e9;

//! # Time units

// Frequency based

/// Hertz
///
/// Clock rates are 64-bit because the PLL intermediate products exceed the
/// 32-bit range for realistic oscillator frequencies.
pub type Hertz = fugit::HertzU64;
pub type Hz = Hertz;

/// KiloHertz
pub type KiloHertz = fugit::KilohertzU64;
pub type KHz = KiloHertz;

/// MegaHertz
pub type MegaHertz = fugit::MegahertzU64;
pub type MHz = MegaHertz;

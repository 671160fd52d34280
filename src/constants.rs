/// Speed of light in km/s.
pub const CKM: f64 = 299_792.458;

/// Planck constant in J s.
pub const H: f64 = 6.626_070_15e-34;

/// Boltzmann constant in J/K.
pub const K: f64 = 1.380_649e-23;

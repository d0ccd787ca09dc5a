//! Compile-time unit safety for short-circuit quantities.
//!
//! Prevents mixing incompatible units like kVA and MVA, or ohms and per-unit.
//!
//! # Design Philosophy
//!
//! Fault analysis juggles quantities that are easy to confuse:
//! - Apparent power of grid equivalents (MVA) and of machines (kVA)
//! - Nominal voltages (kV) and currents (kA)
//! - Physical impedances (Ω) and normalized impedances (pu)
//!
//! Using raw `f64` values throughout the codebase makes it easy to feed a
//! machine rating in kVA into a formula expecting MVA. The newtypes below
//! catch such errors at compile time, and conversions are explicit.
//!
//! # Zero Runtime Overhead
//!
//! All types use `#[repr(transparent)]` ensuring they have the same memory
//! layout as `f64`. The compiler optimizes away all wrapper overhead.
//!
//! # Usage
//!
//! ```
//! use ikss_core::units::{KilovoltAmperes, MegavoltAmperes, Kilovolts, Ohms};
//!
//! let sn = KilovoltAmperes(500.0);
//! let s_sc = MegavoltAmperes(10.0);
//!
//! // This compiles - same units
//! let total = sn + KilovoltAmperes(250.0);
//!
//! // This would NOT compile - different units
//! // let wrong = sn + s_sc;  // Error: cannot add KilovoltAmperes to MegavoltAmperes
//!
//! // Explicit conversions between ratings and base impedances
//! let z_base: Ohms = Kilovolts(0.4).base_impedance(MegavoltAmperes(1.0));
//! assert!((z_base.value() - 0.16).abs() < 1e-12);
//! assert!((total.to_mva().value() - 0.75).abs() < 1e-12);
//! ```

use serde::{Deserialize, Serialize};
use std::ops::{Add, Div, Mul, Neg, Sub};

/// Macro to implement common arithmetic operations for unit types
macro_rules! impl_unit_ops {
    ($type:ty, $unit_name:literal) => {
        impl Add for $type {
            type Output = Self;
            fn add(self, rhs: Self) -> Self::Output {
                Self(self.0 + rhs.0)
            }
        }

        impl Sub for $type {
            type Output = Self;
            fn sub(self, rhs: Self) -> Self::Output {
                Self(self.0 - rhs.0)
            }
        }

        impl Neg for $type {
            type Output = Self;
            fn neg(self) -> Self::Output {
                Self(-self.0)
            }
        }

        impl Mul<f64> for $type {
            type Output = Self;
            fn mul(self, rhs: f64) -> Self::Output {
                Self(self.0 * rhs)
            }
        }

        impl Mul<$type> for f64 {
            type Output = $type;
            fn mul(self, rhs: $type) -> Self::Output {
                <$type>::new(self * rhs.0)
            }
        }

        impl Div<f64> for $type {
            type Output = Self;
            fn div(self, rhs: f64) -> Self::Output {
                Self(self.0 / rhs)
            }
        }

        impl Div<$type> for $type {
            type Output = f64;
            fn div(self, rhs: $type) -> Self::Output {
                self.0 / rhs.0
            }
        }

        impl std::fmt::Display for $type {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{:.4} {}", self.0, $unit_name)
            }
        }

        impl $type {
            /// Create a new value
            #[inline]
            pub const fn new(value: f64) -> Self {
                Self(value)
            }

            /// Get the raw numeric value
            #[inline]
            pub const fn value(self) -> f64 {
                self.0
            }

            /// Absolute value
            #[inline]
            pub fn abs(self) -> Self {
                Self(self.0.abs())
            }

            /// Check if value is finite
            #[inline]
            pub fn is_finite(self) -> bool {
                self.0.is_finite()
            }

            /// Finite and strictly greater than zero
            #[inline]
            pub fn is_positive(self) -> bool {
                self.0.is_finite() && self.0 > 0.0
            }

            /// Minimum of two values
            #[inline]
            pub fn min(self, other: Self) -> Self {
                Self(self.0.min(other.0))
            }

            /// Maximum of two values
            #[inline]
            pub fn max(self, other: Self) -> Self {
                Self(self.0.max(other.0))
            }
        }

        impl std::iter::Sum for $type {
            fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
                Self(iter.map(|x| x.0).sum())
            }
        }

        impl<'a> std::iter::Sum<&'a $type> for $type {
            fn sum<I: Iterator<Item = &'a Self>>(iter: I) -> Self {
                Self(iter.map(|x| x.0).sum())
            }
        }
    };
}

// =============================================================================
// Power Units
// =============================================================================

/// Apparent power in megavolt-amperes (MVA)
///
/// Used for grid short-circuit power (`S''k`) and the system base.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Default, Serialize, Deserialize)]
#[repr(transparent)]
pub struct MegavoltAmperes(pub f64);

impl_unit_ops!(MegavoltAmperes, "MVA");

/// Apparent power in kilovolt-amperes (kVA)
///
/// Rotating machines on low-voltage networks are rated in kVA.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Default, Serialize, Deserialize)]
#[repr(transparent)]
pub struct KilovoltAmperes(pub f64);

impl_unit_ops!(KilovoltAmperes, "kVA");

/// Active power in kilowatts (kW)
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Default, Serialize, Deserialize)]
#[repr(transparent)]
pub struct Kilowatts(pub f64);

impl_unit_ops!(Kilowatts, "kW");

impl KilovoltAmperes {
    /// Convert to MVA
    #[inline]
    pub fn to_mva(self) -> MegavoltAmperes {
        MegavoltAmperes(self.0 / 1000.0)
    }

    /// Power factor implied by an active power rating: pf = P / S
    #[inline]
    pub fn power_factor(self, p: Kilowatts) -> f64 {
        if self.0.abs() < 1e-12 {
            1.0
        } else {
            (p.0 / self.0).clamp(-1.0, 1.0)
        }
    }
}

impl MegavoltAmperes {
    /// Convert to kVA
    #[inline]
    pub fn to_kva(self) -> KilovoltAmperes {
        KilovoltAmperes(self.0 * 1000.0)
    }
}

// =============================================================================
// Voltage Units
// =============================================================================

/// Dimensionless per-unit value (pu)
///
/// Per-unit quantities are normalized to the system base power and the
/// nominal voltage of the bus they belong to.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Default, Serialize, Deserialize)]
#[repr(transparent)]
pub struct PerUnit(pub f64);

impl_unit_ops!(PerUnit, "pu");

impl PerUnit {
    /// One per-unit
    pub const ONE: Self = Self(1.0);

    /// Zero per-unit
    pub const ZERO: Self = Self(0.0);
}

/// Voltage in kilovolts (kV)
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Default, Serialize, Deserialize)]
#[repr(transparent)]
pub struct Kilovolts(pub f64);

impl_unit_ops!(Kilovolts, "kV");

impl Kilovolts {
    /// Base impedance `Z_base = U² / S_base`
    #[inline]
    pub fn base_impedance(self, base: MegavoltAmperes) -> Ohms {
        Ohms(self.0 * self.0 / base.0)
    }

    /// Base current `I_base = S_base / (√3·U)`
    #[inline]
    pub fn base_current(self, base: MegavoltAmperes) -> Kiloamperes {
        Kiloamperes(base.0 / (3.0_f64.sqrt() * self.0))
    }
}

// =============================================================================
// Impedance Units
// =============================================================================

/// Impedance magnitude or component in ohms (Ω)
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Default, Serialize, Deserialize)]
#[repr(transparent)]
pub struct Ohms(pub f64);

impl_unit_ops!(Ohms, "Ω");

impl Ohms {
    /// Normalize to per-unit on the given base impedance
    #[inline]
    pub fn to_per_unit(self, z_base: Ohms) -> PerUnit {
        if z_base.0.abs() < 1e-12 {
            PerUnit(0.0)
        } else {
            PerUnit(self.0 / z_base.0)
        }
    }
}

// =============================================================================
// Current Units
// =============================================================================

/// Current in kiloamperes (kA)
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Default, Serialize, Deserialize)]
#[repr(transparent)]
pub struct Kiloamperes(pub f64);

impl_unit_ops!(Kiloamperes, "kA");

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kva_arithmetic() {
        let s1 = KilovoltAmperes(100.0);
        let s2 = KilovoltAmperes(50.0);

        assert_eq!((s1 + s2).value(), 150.0);
        assert_eq!((s1 - s2).value(), 50.0);
        assert_eq!((-s1).value(), -100.0);
        assert_eq!((s1 * 2.0).value(), 200.0);
        assert_eq!((2.0 * s1).value(), 200.0);
        assert_eq!((s1 / 2.0).value(), 50.0);
        assert_eq!(s1 / s2, 2.0);
    }

    #[test]
    fn test_power_conversions() {
        assert!((KilovoltAmperes(500.0).to_mva().value() - 0.5).abs() < 1e-12);
        assert!((MegavoltAmperes(0.25).to_kva().value() - 250.0).abs() < 1e-9);
        assert!((KilovoltAmperes(100.0).power_factor(Kilowatts(80.0)) - 0.8).abs() < 1e-12);
    }

    #[test]
    fn test_base_quantities() {
        let vn = Kilovolts(0.4);
        let base = MegavoltAmperes(1.0);

        assert!((vn.base_impedance(base).value() - 0.16).abs() < 1e-12);
        // 1 MVA at 0.4 kV: 1 / (√3 · 0.4) ≈ 1.443 kA
        assert!((vn.base_current(base).value() - 1.443_375_672_974_064_5).abs() < 1e-12);
        assert!((Ohms(0.32).to_per_unit(Ohms(0.16)).value() - 2.0).abs() < 1e-12);
    }

    #[test]
    fn test_positive_check() {
        assert!(MegavoltAmperes(10.0).is_positive());
        assert!(!MegavoltAmperes(0.0).is_positive());
        assert!(!Kilovolts(f64::NAN).is_positive());
        assert!(!KilovoltAmperes(-1.0).is_positive());
    }

    #[test]
    fn test_sum_iterator() {
        let ratings = vec![
            KilovoltAmperes(10.0),
            KilovoltAmperes(20.0),
            KilovoltAmperes(30.0),
        ];
        let total: KilovoltAmperes = ratings.into_iter().sum();

        assert_eq!(total.value(), 60.0);
    }

    #[test]
    fn test_display() {
        assert_eq!(format!("{}", Kiloamperes(14.4)), "14.4000 kA");
        assert_eq!(format!("{}", Kilovolts(0.4)), "0.4000 kV");
        assert_eq!(format!("{}", PerUnit(1.0)), "1.0000 pu");
    }
}

//! Float math shims for `std` and `no_std` builds
//!
//! ## Why libm?
//!
//! `f64::atan2` and friends are methods of the standard library, not
//! of `core`. On `no_std` targets (ESP32, Cortex-M) they simply do not
//! exist, and hardware float support varies. `libm` provides software
//! implementations that work everywhere with identical results, which
//! also keeps the detector's angle arithmetic bit-for-bit reproducible
//! between host tests and the target.
//!
//! Call sites use these wrappers so they stay free of `cfg` noise.

#[cfg(feature = "std")]
#[inline(always)]
pub(crate) fn sqrt(x: f64) -> f64 {
    x.sqrt()
}

#[cfg(not(feature = "std"))]
#[inline(always)]
pub(crate) fn sqrt(x: f64) -> f64 {
    libm::sqrt(x)
}

#[cfg(feature = "std")]
#[inline(always)]
pub(crate) fn atan2(y: f64, x: f64) -> f64 {
    y.atan2(x)
}

#[cfg(not(feature = "std"))]
#[inline(always)]
pub(crate) fn atan2(y: f64, x: f64) -> f64 {
    libm::atan2(y, x)
}

#[cfg(feature = "std")]
#[inline(always)]
pub(crate) fn sin(x: f64) -> f64 {
    x.sin()
}

#[cfg(not(feature = "std"))]
#[inline(always)]
pub(crate) fn sin(x: f64) -> f64 {
    libm::sin(x)
}

#[cfg(feature = "std")]
#[inline(always)]
pub(crate) fn cos(x: f64) -> f64 {
    x.cos()
}

#[cfg(not(feature = "std"))]
#[inline(always)]
pub(crate) fn cos(x: f64) -> f64 {
    libm::cos(x)
}

#[cfg(feature = "std")]
#[inline(always)]
pub(crate) fn acos(x: f64) -> f64 {
    x.acos()
}

#[cfg(not(feature = "std"))]
#[inline(always)]
pub(crate) fn acos(x: f64) -> f64 {
    libm::acos(x)
}

#[cfg(feature = "std")]
#[inline(always)]
pub(crate) fn cbrt(x: f64) -> f64 {
    x.cbrt()
}

#[cfg(not(feature = "std"))]
#[inline(always)]
pub(crate) fn cbrt(x: f64) -> f64 {
    libm::cbrt(x)
}

#[cfg(feature = "std")]
#[inline(always)]
pub(crate) fn round(x: f64) -> f64 {
    x.round()
}

#[cfg(not(feature = "std"))]
#[inline(always)]
pub(crate) fn round(x: f64) -> f64 {
    libm::round(x)
}

#[cfg(feature = "std")]
#[inline(always)]
pub(crate) fn abs(x: f64) -> f64 {
    x.abs()
}

#[cfg(not(feature = "std"))]
#[inline(always)]
pub(crate) fn abs(x: f64) -> f64 {
    libm::fabs(x)
}

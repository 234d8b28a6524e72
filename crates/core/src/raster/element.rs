//! Cell value trait shared by elevation, direction and accumulation grids

use num_traits::{NumCast, Zero};
use std::fmt::Debug;

/// Numeric type that can live in a [`Raster`](super::Raster) cell.
///
/// Float types always treat NaN as nodata in addition to the explicit
/// sentinel. Integer types compare the sentinel exactly.
pub trait RasterElement:
    Copy + Debug + PartialOrd + PartialEq + NumCast + Zero + Send + Sync + 'static
{
    /// Sentinel used when a grid is created without one
    fn default_nodata() -> Self;

    /// Whether this value marks an invalid cell
    fn is_nodata(&self, nodata: Option<Self>) -> bool;

    /// Whether this type is a floating point type
    fn is_float() -> bool;

    /// Lossy conversion to f64
    fn as_f64(self) -> Option<f64> {
        NumCast::from(self)
    }
}

/// Relative tolerance for float nodata comparison
const NODATA_RTOL: f64 = 1e-6;

macro_rules! impl_raster_element_int {
    ($($t:ty => $nodata:expr),* $(,)?) => {
        $(
            impl RasterElement for $t {
                fn default_nodata() -> Self {
                    $nodata
                }

                fn is_nodata(&self, nodata: Option<Self>) -> bool {
                    nodata == Some(*self)
                }

                fn is_float() -> bool {
                    false
                }
            }
        )*
    };
}

macro_rules! impl_raster_element_float {
    ($($t:ty),* $(,)?) => {
        $(
            impl RasterElement for $t {
                fn default_nodata() -> Self {
                    <$t>::NAN
                }

                fn is_nodata(&self, nodata: Option<Self>) -> bool {
                    if self.is_nan() {
                        return true;
                    }
                    match nodata {
                        Some(nd) if nd.is_nan() => false,
                        // Relative tolerance: sentinels such as -3.4e38 round-trip through f32
                        Some(nd) => (self - nd).abs() <= nd.abs().max(1.0) * NODATA_RTOL as $t,
                        None => false,
                    }
                }

                fn is_float() -> bool {
                    true
                }
            }
        )*
    };
}

impl_raster_element_int!(
    u8 => u8::MAX,
    u16 => u16::MAX,
    u32 => u32::MAX,
    i16 => i16::MIN,
    i32 => i32::MIN,
    i64 => i64::MIN,
);
impl_raster_element_float!(f32, f64);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_float_nan_is_always_nodata() {
        assert!(f64::NAN.is_nodata(None));
        assert!(f64::NAN.is_nodata(Some(-9999.0)));
        assert!(!1.0_f64.is_nodata(None));
    }

    #[test]
    fn test_float_sentinel_tolerance() {
        let nd = -3.402_823e38_f64;
        let through_f32 = (nd as f32) as f64;
        assert!(through_f32.is_nodata(Some(nd)));
        assert!(!(-9998.0_f64).is_nodata(Some(-9999.0)));
    }

    #[test]
    fn test_int_sentinel_is_exact() {
        assert!(255u8.is_nodata(Some(255)));
        assert!(!254u8.is_nodata(Some(255)));
        assert!(!0u8.is_nodata(None));
        assert_eq!(<i32 as RasterElement>::default_nodata(), i32::MIN);
    }
}

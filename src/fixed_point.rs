//! Fixed-point rate arithmetic for clock conversions.
//!
//! Every multiplier in this module carries an implicit `2^32` denominator:
//! `scale(x, m) == (x * m) >> 32`, computed in a 128-bit intermediate so that
//! `x` up to `2^63` and `m` up to `2^40` never overflow during the multiply.
//! All divisions truncate toward zero, matching native unsigned shift semantics.

use crate::constants::FIXED_POINT_DENOMINATOR_SHIFT;

/// Scales `value` by the fixed-point multiplier `mult` (denominator `2^32`).
#[inline]
pub fn scale(value: u64, mult: u64) -> u64 {
    (((value as u128) * (mult as u128)) >> FIXED_POINT_DENOMINATOR_SHIFT) as u64
}

/// Converts a global tick count to a domain's local tick count:
/// `(global * multiplier_to_local) >> 32 + offset`.
#[inline]
pub fn to_local(global: u64, multiplier_to_local: u64, add_global_to_local_ticks: i64) -> u64 {
    let scaled = scale(global, multiplier_to_local) as i128;
    (scaled + add_global_to_local_ticks as i128) as u64
}

/// Converts microseconds to global ticks.
///
/// This preserves the original implementation's hard-coded `* 1000` rather than
/// routing through a configured multiplier, which is inconsistent with every
/// other conversion in this module. That inconsistency is a known deviation in
/// the system this crate reimplements, not a bug introduced here — see
/// `DESIGN.md` for the full rationale. Do not "fix" this without updating every
/// caller that depends on the current behavior.
#[inline]
pub fn local_us_to_global(us: u64) -> u64 {
    us.saturating_mul(1000)
}

/// Converts microseconds to domain-local ticks using `multiplier_us_to_ticks`.
#[inline]
pub fn us_to_ticks(us: u64, multiplier_us_to_ticks: u64) -> u64 {
    scale(us, multiplier_us_to_ticks)
}

/// Converts domain-local ticks back to microseconds using `multiplier_us_to_ticks`
/// as the inverse rate: `(ticks << 32) / multiplier_us_to_ticks`.
#[inline]
pub fn ticks_to_us(ticks: u64, multiplier_us_to_ticks: u64) -> u64 {
    if multiplier_us_to_ticks == 0 {
        return 0;
    }
    (((ticks as u128) << FIXED_POINT_DENOMINATOR_SHIFT) / (multiplier_us_to_ticks as u128)) as u64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scale_by_identity_multiplier_is_identity() {
        let one = 1u64 << FIXED_POINT_DENOMINATOR_SHIFT;
        assert_eq!(scale(12_345, one), 12_345);
    }

    #[test]
    fn scale_halves_with_half_multiplier() {
        let half = 1u64 << (FIXED_POINT_DENOMINATOR_SHIFT - 1);
        assert_eq!(scale(1000, half), 500);
    }

    #[test]
    fn to_local_applies_offset() {
        let one = 1u64 << FIXED_POINT_DENOMINATOR_SHIFT;
        assert_eq!(to_local(1000, one, -50), 950);
        assert_eq!(to_local(1000, one, 50), 1050);
    }

    #[test]
    fn local_us_to_global_is_hardcoded_times_1000() {
        assert_eq!(local_us_to_global(7), 7000);
        assert_eq!(local_us_to_global(0), 0);
    }

    #[test]
    fn us_to_ticks_and_back_roundtrip_within_truncation() {
        let mult = 3u64 << FIXED_POINT_DENOMINATOR_SHIFT; // 3 ticks per us
        for us in [0u64, 1, 7, 1_000, 1_000_000] {
            let ticks = us_to_ticks(us, mult);
            let back = ticks_to_us(ticks, mult);
            assert!(back.abs_diff(us) <= 1, "us={us} ticks={ticks} back={back}");
        }
    }

    #[test]
    fn no_overflow_near_documented_maxima() {
        let global_max = 1u64 << 62;
        let mult_max = 1u64 << 40;
        let _ = scale(global_max, mult_max);
    }
}

use crate::error::{AdcError, Result};

/// Maps `value` from `[src_lo, src_hi]` onto `[dst_lo, dst_hi]`, rounding up.
///
/// The quotient is taken on exact integers so any non-zero remainder bumps
/// the result to the next integer.
pub fn rescale(value: i32, src_lo: i32, src_hi: i32, dst_lo: i32, dst_hi: i32) -> Result<i32> {
    if src_hi == src_lo {
        return Err(AdcError::EmptySourceRange(src_lo));
    }

    let numerator = (value as i128 - src_lo as i128) * (dst_hi as i128 - dst_lo as i128);
    let denominator = src_hi as i128 - src_lo as i128;
    let scaled = div_ceil(numerator, denominator) + dst_lo as i128;

    i32::try_from(scaled).map_err(|_| AdcError::ScaleOverflow)
}

fn div_ceil(numerator: i128, denominator: i128) -> i128 {
    let quotient = numerator / denominator;
    let remainder = numerator % denominator;
    // `/` truncates toward zero, which is already the ceiling for negative quotients
    if remainder != 0 && ((remainder > 0) == (denominator > 0)) {
        quotient + 1
    } else {
        quotient
    }
}

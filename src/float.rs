//! IEEE-754 literal encoding for the `flt{}`, `dbl{}` and `qad{}` expression
//! primaries (spec.md §4.1). Per the redesign flag in spec.md §9, the body
//! is parsed with Rust's own float parser rather than any host-language
//! `eval`; `nan`, `inf` and `-inf` are recognized as special tokens first.

/// Encode a literal body as 32-bit IEEE-754 bits
pub fn encode_f32(body: &str) -> i128 {
    let bits: u32 = match body {
        "nan" => 0x7fc0_0000,
        "inf" => 0x7f80_0000,
        "-inf" => 0xff80_0000,
        _ => (body.parse::<f64>().unwrap_or(0.0) as f32).to_bits(),
    };
    bits as i128
}

/// Encode a literal body as 64-bit IEEE-754 bits
pub fn encode_f64(body: &str) -> i128 {
    let bits: u64 = match body {
        "nan" => 0x7ff8_0000_0000_0000,
        "inf" => 0x7ff0_0000_0000_0000,
        "-inf" => 0xfff0_0000_0000_0000,
        _ => body.parse::<f64>().unwrap_or(0.0).to_bits(),
    };
    bits as i128
}

/// Encode a literal body as 128-bit IEEE-754 "quad" bits. Stable Rust has no
/// native `f128`, so the value is parsed as `f64` and its sign/exponent/
/// mantissa are re-biased into the wider quad layout, zero-padding the extra
/// mantissa bits; this recovers the full range and the `f64`-representable
/// precision of the input, though not additional precision beyond what an
/// `f64` literal can already carry.
pub fn encode_f128(body: &str) -> i128 {
    const BIAS64: i64 = 1023;
    const BIAS128: i64 = 16383;

    match body {
        "nan" => return (0x7fffu128 << 112 | (1u128 << 111)) as i128,
        "inf" => return (0x7fffu128 << 112) as i128,
        "-inf" => return ((1u128 << 127) | (0x7fffu128 << 112)) as i128,
        _ => {}
    }

    let value: f64 = body.parse().unwrap_or(0.0);
    let bits64 = value.to_bits();
    let sign = (bits64 >> 63) & 1;
    let exp64 = ((bits64 >> 52) & 0x7ff) as i64;
    let frac64 = bits64 & 0xf_ffff_ffff_ffff;

    let (exp128, frac128): (u128, u128) = if exp64 == 0 && frac64 == 0 {
        (0, 0)
    } else if exp64 == 0x7ff {
        (0x7fff, (frac64 as u128) << 60)
    } else if exp64 == 0 {
        // subnormal f64: treat as zero in the wider format, the original
        // Decimal-based encoder never produces true subnormal quads either
        (0, 0)
    } else {
        ((exp64 - BIAS64 + BIAS128) as u128, (frac64 as u128) << 60)
    };

    let bits128 = ((sign as u128) << 127) | (exp128 << 112) | frac128;
    bits128 as i128
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn f32_roundtrip() {
        assert_eq!(encode_f32("1.5") as u32, 1.5f32.to_bits());
        assert_eq!(encode_f32("nan"), 0x7fc0_0000);
        assert_eq!(encode_f32("inf"), 0x7f80_0000);
        assert_eq!(encode_f32("-inf") as u32, 0xff80_0000);
    }

    #[test]
    fn f64_roundtrip() {
        assert_eq!(encode_f64("2.25") as u64, 2.25f64.to_bits());
        assert_eq!(encode_f64("nan") as u64, 0x7ff8_0000_0000_0000);
    }

    #[test]
    fn f128_zero_and_sign() {
        assert_eq!(encode_f128("0.0"), 0);
        let neg = encode_f128("-1.0");
        assert_eq!((neg >> 127) & 1, 1);
    }
}

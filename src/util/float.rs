//! Order-preserving encoding between `f64` and `i64`.
//!
//! Finite doubles map to signed 64-bit integers whose numeric order matches
//! the floating-point order, including negatives. Negative doubles carry the
//! sign bit with the magnitude bits complemented, so more-negative values
//! encode lower. `+0.0` and `-0.0` encode to distinct keys.

/// Encode a finite double as an order-preserving signed key.
#[inline]
pub fn encode(d: f64) -> i64 {
    let bits = d.to_bits() as i64;
    if bits < 0 {
        bits ^ 0x7fff_ffff_ffff_ffff
    } else {
        bits
    }
}

/// Decode a key produced by [`encode`] back to the original double.
#[inline]
pub fn decode(key: i64) -> f64 {
    let bits = if key < 0 {
        key ^ 0x7fff_ffff_ffff_ffff
    } else {
        key
    };
    f64::from_bits(bits as u64)
}

/// The smallest double strictly greater than `d`.
///
/// Defined through the key space, so it is exactly the successor in encoding
/// order; for `f64::MAX` it yields positive infinity, which the rank
/// dictionaries treat as "past every stored value".
#[inline]
pub fn next_up(d: f64) -> f64 {
    decode(encode(d) + 1)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_preserves_order() {
        let values = [
            -f64::MAX,
            -1e308,
            -2.5,
            -1.0,
            -f64::MIN_POSITIVE,
            -0.0,
            0.0,
            f64::MIN_POSITIVE,
            1.0,
            2.5,
            1e308,
            f64::MAX,
        ];
        for pair in values.windows(2) {
            assert!(
                encode(pair[0]) < encode(pair[1]),
                "{} !< {}",
                pair[0],
                pair[1]
            );
        }
    }

    #[test]
    fn test_roundtrip() {
        for &v in &[-f64::MAX, -123.456, -0.0, 0.0, 1.5e-300, 42.0, f64::MAX] {
            let back = decode(encode(v));
            assert_eq!(back.to_bits(), v.to_bits());
        }
    }

    #[test]
    fn test_next_up() {
        assert_eq!(next_up(1.0), 1.0 + f64::EPSILON);
        assert_eq!(next_up(-f64::MIN_POSITIVE), -0.0);
        assert!(next_up(0.0) > 0.0);
        assert_eq!(next_up(f64::MAX), f64::INFINITY);
        // Signed zeros are distinct keys with +0.0 the immediate successor.
        assert_eq!(next_up(-0.0).to_bits(), 0.0f64.to_bits());
    }
}

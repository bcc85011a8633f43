//! 256-bit word arithmetic that `U256` does not provide directly.
//!
//! Signed operations treat words as two's complement.

use primitive_types::{U256, U512};

/// Check the sign bit
pub fn is_negative(v: &U256) -> bool {
    v.bit(255)
}

/// Two's complement negation: !v + 1
pub fn negate(v: U256) -> U256 {
    (!v).overflowing_add(U256::one()).0
}

fn abs(v: U256) -> U256 {
    if is_negative(&v) {
        negate(v)
    } else {
        v
    }
}

fn low_u256(v: U512) -> U256 {
    let mut buf = [0u8; 64];
    v.to_big_endian(&mut buf);
    U256::from_big_endian(&buf[32..])
}

/// Unsigned division, zero on division by zero
pub fn div(a: U256, b: U256) -> U256 {
    if b.is_zero() {
        U256::zero()
    } else {
        a / b
    }
}

/// Unsigned modulo, zero on modulo by zero
pub fn rem(a: U256, b: U256) -> U256 {
    if b.is_zero() {
        U256::zero()
    } else {
        a % b
    }
}

/// Signed division; MIN / -1 wraps to MIN
pub fn sdiv(a: U256, b: U256) -> U256 {
    if b.is_zero() {
        return U256::zero();
    }
    let quotient = abs(a) / abs(b);
    if is_negative(&a) != is_negative(&b) {
        negate(quotient)
    } else {
        quotient
    }
}

/// Signed modulo; result takes the sign of the dividend
pub fn smod(a: U256, b: U256) -> U256 {
    if b.is_zero() {
        return U256::zero();
    }
    let r = abs(a) % abs(b);
    if is_negative(&a) {
        negate(r)
    } else {
        r
    }
}

/// (a + b) % n without intermediate overflow
pub fn addmod(a: U256, b: U256, n: U256) -> U256 {
    if n.is_zero() {
        return U256::zero();
    }
    low_u256((U512::from(a) + U512::from(b)) % U512::from(n))
}

/// (a * b) % n without intermediate overflow
pub fn mulmod(a: U256, b: U256, n: U256) -> U256 {
    if n.is_zero() {
        return U256::zero();
    }
    low_u256(a.full_mul(b) % U512::from(n))
}

/// base^exp mod 2^256
pub fn exp(base: U256, exponent: U256) -> U256 {
    base.overflowing_pow(exponent).0
}

/// Number of significant bytes, as charged by EXP
pub fn byte_len(v: &U256) -> usize {
    v.bits().div_ceil(8)
}

/// Sign-extend `x` from byte `b` (0 = least significant)
pub fn signextend(b: U256, x: U256) -> U256 {
    if b >= U256::from(31) {
        return x;
    }
    let bit = b.low_u32() * 8 + 7;
    let mask = (U256::one() << bit) - U256::one();
    if x.bit(bit as usize) {
        x | !mask
    } else {
        x & mask
    }
}

/// Byte `i` of `x`, 0 = most significant
pub fn byte(i: U256, x: U256) -> U256 {
    if i >= U256::from(32) {
        return U256::zero();
    }
    U256::from(x.byte(31 - i.low_u64() as usize))
}

/// value << shift
pub fn shl(shift: U256, value: U256) -> U256 {
    if shift >= U256::from(256) {
        return U256::zero();
    }
    value << shift.low_u32()
}

/// Logical value >> shift
pub fn shr(shift: U256, value: U256) -> U256 {
    if shift >= U256::from(256) {
        return U256::zero();
    }
    value >> shift.low_u32()
}

/// Arithmetic value >> shift
pub fn sar(shift: U256, value: U256) -> U256 {
    let negative = is_negative(&value);
    if shift >= U256::from(256) {
        return if negative { U256::MAX } else { U256::zero() };
    }
    let s = shift.low_u32();
    if s == 0 {
        return value;
    }
    let shifted = value >> s;
    if negative {
        shifted | (U256::MAX << (256 - s))
    } else {
        shifted
    }
}

/// Signed less-than
pub fn slt(a: &U256, b: &U256) -> bool {
    match (is_negative(a), is_negative(b)) {
        (true, false) => true,
        (false, true) => false,
        _ => a < b,
    }
}

/// Signed greater-than
pub fn sgt(a: &U256, b: &U256) -> bool {
    slt(b, a)
}

// SPDX-License-Identifier: LGPL-2.1-or-later
// See Notices.txt for copyright information

use bitflags::bitflags;
use num_bigint::BigInt;
use num_bigint::BigUint;
use num_integer::Integer;
use num_rational::Ratio;
use num_traits::FromPrimitive;
use num_traits::NumAssign;
use num_traits::One;
use num_traits::ToPrimitive;
use num_traits::Unsigned;
use num_traits::Zero;
use std::cmp::Ordering;
use std::fmt;
use std::ops::Add;
use std::ops::AddAssign;
use std::ops::BitAnd;
use std::ops::BitAndAssign;
use std::ops::BitOr;
use std::ops::BitOrAssign;
use std::ops::Div;
use std::ops::DivAssign;
use std::ops::Mul;
use std::ops::MulAssign;
use std::ops::Neg;
use std::ops::Shl;
use std::ops::ShlAssign;
use std::ops::Shr;
use std::ops::ShrAssign;
use std::ops::Sub;
use std::ops::SubAssign;

#[cfg(test)]
mod cross_check;

#[derive(Copy, Clone, Hash, Eq, PartialEq, Debug)]
#[repr(u8)]
pub enum Sign {
    Positive = 0,
    Negative = 1,
}

impl Neg for Sign {
    type Output = Self;
    fn neg(self) -> Self {
        match self {
            Self::Positive => Self::Negative,
            Self::Negative => Self::Positive,
        }
    }
}

impl Mul for Sign {
    type Output = Self;
    fn mul(self, rhs: Self) -> Self {
        match self {
            Self::Positive => rhs,
            Self::Negative => -rhs,
        }
    }
}

impl MulAssign for Sign {
    fn mul_assign(&mut self, rhs: Self) {
        *self = *self * rhs;
    }
}

/// unsigned working storage of a value's bit fields
pub trait FloatBitsType:
    Unsigned
    + Integer
    + Clone
    + NumAssign
    + Shl<usize, Output = Self>
    + Shr<usize, Output = Self>
    + ShlAssign<usize>
    + ShrAssign<usize>
    + BitAnd<Self, Output = Self>
    + BitOr<Self, Output = Self>
    + BitAndAssign<Self>
    + BitOrAssign<Self>
    + fmt::UpperHex
    + fmt::LowerHex
    + fmt::Binary
    + fmt::Display
    + fmt::Debug
    + FromPrimitive
    + ToPrimitive
    + Into<BigInt>
    + From<u8>
{
    /// total number of storage bits, `None` when the storage grows on demand
    fn bit_capacity() -> Option<usize>;
}

macro_rules! impl_float_bits_type {
    ($t:ty, $capacity:expr) => {
        impl FloatBitsType for $t {
            fn bit_capacity() -> Option<usize> {
                $capacity
            }
        }
    };
}

impl_float_bits_type!(u32, Some(32));
impl_float_bits_type!(u64, Some(64));
impl_float_bits_type!(u128, Some(128));
impl_float_bits_type!(BigUint, None);

#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug)]
#[repr(u32)]
pub enum RoundingMode {
    TiesToEven = 0,
    TowardZero = 1,
    TowardNegative = 2,
    TowardPositive = 3,
}

impl Default for RoundingMode {
    fn default() -> Self {
        RoundingMode::TiesToEven
    }
}

bitflags! {
    /// guard, round and sticky bits displaced from a mantissa during shifting
    pub struct GrsBits: u8 {
        const GUARD = 0b100;
        const ROUND = 0b010;
        const STICKY = 0b001;
    }
}

impl Default for GrsBits {
    fn default() -> Self {
        GrsBits::empty()
    }
}

fn low_mask<Bits: FloatBitsType>(width: usize) -> Bits {
    (Bits::one() << width) - Bits::one()
}

fn bit_length<Bits: FloatBitsType>(value: &Bits) -> usize {
    let mut value = value.clone();
    let mut length = 0;
    while !value.is_zero() {
        value >>= 1;
        length += 1;
    }
    length
}

/// Shifts `bits` right by `amount` while folding the displaced bits into `grs`.
///
/// The new guard bit is the highest displaced bit, the round bit the next
/// one down, and the sticky bit absorbs everything below. Sticky information
/// already present in `grs` survives, except for a shift of exactly 3, which
/// replaces the whole window.
pub fn shift_right_sticky<Bits: FloatBitsType>(bits: &mut Bits, amount: usize, grs: &mut GrsBits) {
    let prior = grs.bits();
    let prior_sticky = if amount >= 3 {
        prior != 0
    } else {
        prior & ((1u8 << amount) - 1) != 0
    };
    if amount < 3 {
        let exposed = (bits.clone() & low_mask::<Bits>(amount))
            .to_u8()
            .expect("masked low bits fit in u8");
        let mut merged = prior >> amount;
        merged |= exposed << (3 - amount);
        if prior_sticky {
            merged |= GrsBits::STICKY.bits();
        }
        *grs = GrsBits::from_bits_truncate(merged);
    } else {
        let mut window = ((bits.clone() >> (amount - 3)) & low_mask::<Bits>(3))
            .to_u8()
            .expect("3-bit window fits in u8");
        let residue = !(bits.clone() & low_mask::<Bits>(amount - 3)).is_zero();
        if (residue || prior_sticky) && amount != 3 {
            window |= GrsBits::STICKY.bits();
        }
        *grs = GrsBits::from_bits_truncate(window);
    }
    *bits >>= amount;
}

/// Shifts `bits` left by `amount`, reinserting the high bits of `grs` into
/// the vacated low positions; `grs` itself shifts left out of its window.
pub fn shift_left_sticky<Bits: FloatBitsType>(bits: &mut Bits, amount: usize, grs: &mut GrsBits) {
    *bits <<= amount;
    if amount < 3 {
        let reinserted = grs.bits() >> (3 - amount);
        *bits |= Bits::from(reinserted);
    } else {
        *bits |= Bits::from(grs.bits()) << (amount - 3);
    }
    let shifted = if amount >= 3 {
        0
    } else {
        (grs.bits() << amount) & GrsBits::all().bits()
    };
    *grs = GrsBits::from_bits_truncate(shifted);
}

/// exponent and mantissa field widths of a value
#[derive(Copy, Clone, Eq, PartialEq, Hash)]
pub struct Precision {
    exponent_width: u8,
    mantissa_width: u8,
}

impl Precision {
    #[inline]
    pub const fn new(exponent_width: u8, mantissa_width: u8) -> Self {
        Self {
            exponent_width,
            mantissa_width,
        }
    }
    /// `Precision` of the standard __binary16__ format
    pub const STANDARD_16: Self = Self::new(5, 10);
    /// `Precision` of the standard __binary32__ format
    pub const STANDARD_32: Self = Self::new(8, 23);
    /// `Precision` of the standard __binary64__ format
    pub const STANDARD_64: Self = Self::new(11, 52);
    /// `Precision` of the standard __binary128__ format
    pub const STANDARD_128: Self = Self::new(15, 112);
    /// `Precision` of the standard `width`-bit binary interchange format, if it exists
    #[inline]
    pub fn standard(width: usize) -> Option<Self> {
        match width {
            16 => Some(Self::STANDARD_16),
            32 => Some(Self::STANDARD_32),
            64 => Some(Self::STANDARD_64),
            128 => Some(Self::STANDARD_128),
            _ => None,
        }
    }
    /// the number of bits in the exponent field
    #[inline]
    pub const fn exponent_width(self) -> usize {
        self.exponent_width as usize
    }
    /// the number of bits in the mantissa field (excludes the implicit leading bit)
    #[inline]
    pub const fn mantissa_width(self) -> usize {
        self.mantissa_width as usize
    }
    pub fn exponent_bias(self) -> i64 {
        if self.exponent_width == 0 {
            0
        } else {
            (1i64 << (self.exponent_width - 1)) - 1
        }
    }
    pub fn exponent_field_mask(self) -> i64 {
        (1i64 << self.exponent_width) - 1
    }
    /// the all-ones exponent field shared by infinities and NaNs
    pub fn exponent_inf_nan(self) -> i64 {
        self.exponent_field_mask()
    }
    /// storage bits needed by intermediate products and extended sums
    #[inline]
    pub const fn working_width(self) -> usize {
        2 * (self.mantissa_width as usize + 1) + 1
    }
    /// per-field minimum of two precisions, the common precision of a binary operation
    pub fn min_of(self, other: Self) -> Self {
        Self {
            exponent_width: self.exponent_width.min(other.exponent_width),
            mantissa_width: self.mantissa_width.min(other.mantissa_width),
        }
    }
}

impl fmt::Debug for Precision {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        if *self == Self::STANDARD_16 {
            f.write_str("Precision::STANDARD_16")
        } else if *self == Self::STANDARD_32 {
            f.write_str("Precision::STANDARD_32")
        } else if *self == Self::STANDARD_64 {
            f.write_str("Precision::STANDARD_64")
        } else if *self == Self::STANDARD_128 {
            f.write_str("Precision::STANDARD_128")
        } else {
            f.debug_struct("Precision")
                .field("exponent_width", &self.exponent_width())
                .field("mantissa_width", &self.mantissa_width())
                .finish()
        }
    }
}

#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug)]
pub enum FloatClass {
    NegativeInfinity,
    NegativeNormal,
    NegativeSubnormal,
    NegativeZero,
    PositiveInfinity,
    PositiveNormal,
    PositiveSubnormal,
    PositiveZero,
    NaN,
}

impl FloatClass {
    #[inline]
    pub fn sign(self) -> Option<Sign> {
        match self {
            FloatClass::NegativeInfinity
            | FloatClass::NegativeNormal
            | FloatClass::NegativeSubnormal
            | FloatClass::NegativeZero => Some(Sign::Negative),
            FloatClass::PositiveInfinity
            | FloatClass::PositiveNormal
            | FloatClass::PositiveSubnormal
            | FloatClass::PositiveZero => Some(Sign::Positive),
            FloatClass::NaN => None,
        }
    }
    #[inline]
    pub fn is_negative_infinity(self) -> bool {
        self == FloatClass::NegativeInfinity
    }
    #[inline]
    pub fn is_positive_infinity(self) -> bool {
        self == FloatClass::PositiveInfinity
    }
    #[inline]
    pub fn is_infinity(self) -> bool {
        self == FloatClass::NegativeInfinity || self == FloatClass::PositiveInfinity
    }
    #[inline]
    pub fn is_normal(self) -> bool {
        self == FloatClass::NegativeNormal || self == FloatClass::PositiveNormal
    }
    #[inline]
    pub fn is_subnormal(self) -> bool {
        self == FloatClass::NegativeSubnormal || self == FloatClass::PositiveSubnormal
    }
    #[inline]
    pub fn is_zero(self) -> bool {
        self == FloatClass::NegativeZero || self == FloatClass::PositiveZero
    }
    #[inline]
    pub fn is_nan(self) -> bool {
        self == FloatClass::NaN
    }
    #[inline]
    pub fn is_finite(self) -> bool {
        match self {
            FloatClass::NegativeNormal
            | FloatClass::NegativeSubnormal
            | FloatClass::NegativeZero
            | FloatClass::PositiveNormal
            | FloatClass::PositiveSubnormal
            | FloatClass::PositiveZero => true,
            _ => false,
        }
    }
}

impl Neg for FloatClass {
    type Output = Self;
    fn neg(self) -> Self {
        use FloatClass::*;
        match self {
            NegativeInfinity => PositiveInfinity,
            NegativeNormal => PositiveNormal,
            NegativeSubnormal => PositiveSubnormal,
            NegativeZero => PositiveZero,
            PositiveInfinity => NegativeInfinity,
            PositiveNormal => NegativeNormal,
            PositiveSubnormal => NegativeSubnormal,
            PositiveZero => NegativeZero,
            NaN => NaN,
        }
    }
}

const F32_EXPONENT_WIDTH: usize = 8;
const F32_MANTISSA_WIDTH: usize = 23;
const F64_EXPONENT_WIDTH: usize = 11;
const F64_MANTISSA_WIDTH: usize = 52;

/// A software floating-point value with configurable field widths.
///
/// The mantissa lives in a storage type wide enough for double-width
/// intermediates; `precision` says how many bits of it are meaningful at
/// rest. Between public operations the exponent and mantissa fit their
/// configured widths and the guard/round/sticky register is clear.
#[derive(Copy, Clone)]
pub struct Float<Bits: FloatBitsType> {
    sign: Sign,
    exponent: i64,
    mantissa: Bits,
    grs: GrsBits,
    precision: Precision,
}

impl<Bits: FloatBitsType> Float<Bits> {
    pub fn zero(precision: Precision) -> Self {
        Self {
            sign: Sign::Positive,
            exponent: 0,
            mantissa: Bits::zero(),
            grs: GrsBits::empty(),
            precision,
        }
    }
    pub fn infinity(sign: Sign, precision: Precision) -> Self {
        let mut retval = Self::zero(precision);
        retval.sign = sign;
        retval.set_infinite();
        retval
    }
    pub fn nan(precision: Precision) -> Self {
        let mut retval = Self::zero(precision);
        retval.set_nan();
        retval
    }
    #[inline]
    pub fn sign(&self) -> Sign {
        self.sign
    }
    pub fn set_sign(&mut self, sign: Sign) {
        self.sign = sign;
    }
    #[inline]
    pub fn precision(&self) -> Precision {
        self.precision
    }
    /// Reinterprets the raw fields under a different precision without
    /// normalizing them; `change_precision` is the converting form.
    pub fn set_precision(&mut self, precision: Precision) {
        self.precision = precision;
    }
    pub fn exponent_field(&self) -> i64 {
        self.exponent & self.precision.exponent_field_mask()
    }
    pub fn set_exponent_field(&mut self, exponent: i64) {
        self.exponent = exponent & self.precision.exponent_field_mask();
    }
    pub fn mantissa_field(&self) -> Bits {
        self.mantissa.clone() & low_mask(self.precision.mantissa_width())
    }
    pub fn set_mantissa_field(&mut self, mantissa: Bits) {
        self.mantissa = mantissa & low_mask(self.precision.mantissa_width());
    }
    #[inline]
    pub fn grs(&self) -> GrsBits {
        self.grs
    }
    /// the mantissa with the implicit leading one inserted; zero stays zero
    pub fn mantissa_with_hidden_bit(&self) -> Bits {
        if self.is_zero() {
            Bits::zero()
        } else {
            (Bits::one() << self.precision.mantissa_width()) | self.mantissa_field()
        }
    }
    fn materialize_hidden_bit(&mut self) {
        self.mantissa = self.mantissa_with_hidden_bit();
    }
    pub fn class(&self) -> FloatClass {
        let exponent_field = self.exponent_field();
        let mantissa_is_zero = self.mantissa_field().is_zero();
        let retval = if exponent_field == 0 {
            if mantissa_is_zero {
                FloatClass::PositiveZero
            } else {
                FloatClass::PositiveSubnormal
            }
        } else if exponent_field == self.precision.exponent_inf_nan() {
            if mantissa_is_zero {
                FloatClass::PositiveInfinity
            } else {
                return FloatClass::NaN;
            }
        } else {
            FloatClass::PositiveNormal
        };
        match self.sign {
            Sign::Positive => retval,
            Sign::Negative => -retval,
        }
    }
    #[inline]
    pub fn is_zero(&self) -> bool {
        self.class().is_zero()
    }
    #[inline]
    pub fn is_subnormal(&self) -> bool {
        self.class().is_subnormal()
    }
    #[inline]
    pub fn is_infinite(&self) -> bool {
        self.class().is_infinity()
    }
    #[inline]
    pub fn is_positive_infinity(&self) -> bool {
        self.class().is_positive_infinity()
    }
    #[inline]
    pub fn is_negative_infinity(&self) -> bool {
        self.class().is_negative_infinity()
    }
    #[inline]
    pub fn is_nan(&self) -> bool {
        self.class().is_nan()
    }
    #[inline]
    pub fn is_normal(&self) -> bool {
        self.class().is_normal()
    }
    #[inline]
    pub fn is_finite(&self) -> bool {
        self.class().is_finite()
    }
    pub fn set_zero(&mut self) {
        self.set_exponent_field(0);
        self.set_mantissa_field(Bits::zero());
    }
    /// infinity with the current sign
    pub fn set_infinite(&mut self) {
        self.set_mantissa_field(Bits::zero());
        self.set_exponent_field(self.precision.exponent_inf_nan());
    }
    pub fn set_positive_infinity(&mut self) {
        self.set_infinite();
        self.sign = Sign::Positive;
    }
    pub fn set_negative_infinity(&mut self) {
        self.set_infinite();
        self.sign = Sign::Negative;
    }
    pub fn set_nan(&mut self) {
        self.set_infinite();
        self.set_mantissa_field(Bits::one());
    }
    fn shift_mantissa(&mut self, amount: i64) {
        if amount > 0 {
            shift_right_sticky(&mut self.mantissa, amount as usize, &mut self.grs);
        } else if amount < 0 {
            shift_left_sticky(&mut self.mantissa, (-amount) as usize, &mut self.grs);
        }
    }
    /// Shifts the mantissa until its highest set bit sits at `target_width`
    /// (one-based), compensating through the exponent, then masks to the
    /// target frame. A zero mantissa is left alone.
    fn normalize(&mut self, target_width: usize) {
        let msb_position = bit_length(&self.mantissa);
        if msb_position == 0 {
            return;
        }
        let to_shift = target_width as i64 - msb_position as i64;
        self.shift_mantissa(-to_shift);
        self.set_exponent_field(self.exponent_field() - to_shift);
        self.mantissa = self.mantissa.clone() & low_mask(target_width);
    }
    /// Commits the guard/round/sticky register into the mantissa.
    ///
    /// The directed modes rewrite the register to all-ones or all-zeros
    /// first; a tie rounds to an even mantissa. A carry out of the mantissa
    /// field bumps the exponent and the final mask renormalizes.
    pub fn round(&mut self, rounding_mode: RoundingMode) {
        match rounding_mode {
            RoundingMode::TowardZero => self.grs = GrsBits::empty(),
            RoundingMode::TowardPositive => {
                self.grs = if self.sign == Sign::Positive && !self.grs.is_empty() {
                    GrsBits::all()
                } else {
                    GrsBits::empty()
                };
            }
            RoundingMode::TowardNegative => {
                self.grs = if self.sign == Sign::Negative && !self.grs.is_empty() {
                    GrsBits::all()
                } else {
                    GrsBits::empty()
                };
            }
            RoundingMode::TiesToEven => {}
        }
        let grs = self.grs.bits();
        let exactly_half = grs == GrsBits::GUARD.bits();
        if (exactly_half && self.mantissa.is_odd()) || grs > GrsBits::GUARD.bits() {
            self.mantissa = self.mantissa.clone() + Bits::one();
        }
        let hidden_position = self.precision.mantissa_width();
        if !(self.mantissa.clone() & (Bits::one() << hidden_position)).is_zero() {
            self.set_exponent_field(self.exponent_field() + 1);
        }
        self.grs = GrsBits::empty();
        self.mantissa = self.mantissa.clone() & low_mask(hidden_position);
    }
    fn check_working_storage(&self) {
        if let Some(capacity) = Bits::bit_capacity() {
            assert!(
                self.precision.working_width() <= capacity,
                "mantissa width {} needs {} working bits, storage has {}",
                self.precision.mantissa_width(),
                self.precision.working_width(),
                capacity
            );
        }
    }
    /// Converts the value to new field widths.
    ///
    /// Narrowing the mantissa rounds the displaced bits back in. Narrowing
    /// the exponent clears the low bits of the de-biased exponent: the shift
    /// engine computes a rounding window for it but the decision is never
    /// applied, so the exponent truncates.
    pub fn change_precision(&mut self, new_precision: Precision) {
        if let Some(capacity) = Bits::bit_capacity() {
            assert!(
                new_precision.mantissa_width() < capacity,
                "mantissa width {} does not fit in {} storage bits",
                new_precision.mantissa_width(),
                capacity
            );
        }
        if self.precision.exponent_width != new_precision.exponent_width {
            let mut expanded_exponent = self.exponent_field() - self.precision.exponent_bias();
            let to_shift =
                self.precision.exponent_width() as i64 - new_precision.exponent_width() as i64;
            if to_shift > 0 {
                let mut window = expanded_exponent as u64;
                let mut exponent_grs = GrsBits::empty();
                shift_right_sticky(&mut window, to_shift as usize, &mut exponent_grs);
                expanded_exponent = (window << to_shift as usize) as i64;
            }
            expanded_exponent += new_precision.exponent_bias();
            self.precision.exponent_width = new_precision.exponent_width;
            self.set_exponent_field(expanded_exponent);
        }
        if self.precision.mantissa_width != new_precision.mantissa_width {
            let to_shift =
                self.precision.mantissa_width() as i64 - new_precision.mantissa_width() as i64;
            self.shift_mantissa(to_shift);
            self.precision.mantissa_width = new_precision.mantissa_width;
            if to_shift > 0 {
                self.round(RoundingMode::TiesToEven);
            }
        }
    }
    fn adapt_precision(&mut self, rhs: &mut Self) {
        let common = self.precision.min_of(rhs.precision);
        self.change_precision(common);
        rhs.change_precision(common);
    }
    pub fn add(&self, rhs: &Self, rounding_mode: Option<RoundingMode>) -> Self {
        let rounding_mode = rounding_mode.unwrap_or_default();
        let mut lhs = self.clone();
        let mut rhs = rhs.clone();
        lhs.adapt_precision(&mut rhs);
        if lhs.is_nan() || rhs.is_nan() {
            lhs.set_nan();
            return lhs;
        }
        if lhs.is_infinite() || rhs.is_infinite() {
            if (lhs.is_positive_infinity() && rhs.is_negative_infinity())
                || (rhs.is_positive_infinity() && lhs.is_negative_infinity())
            {
                lhs.set_nan();
            } else if !lhs.is_infinite() {
                lhs = rhs;
            }
            return lhs;
        }
        if lhs.is_zero() {
            return rhs;
        }
        if rhs.is_zero() {
            return lhs;
        }
        lhs.check_working_storage();
        // one headroom bit above the hidden position absorbs the carry
        let frame_shift = lhs.precision.mantissa_width() as i64 + 1;
        lhs.materialize_hidden_bit();
        rhs.materialize_hidden_bit();
        lhs.shift_mantissa(-frame_shift);
        rhs.shift_mantissa(-frame_shift);
        let exponent_difference = lhs.exponent_field() - rhs.exponent_field();
        if exponent_difference > 0 {
            rhs.shift_mantissa(exponent_difference);
        } else if exponent_difference < 0 {
            // the displaced operand adopts the other's exponent and rounding state
            lhs.shift_mantissa(-exponent_difference);
            lhs.set_exponent_field(rhs.exponent_field());
            lhs.grs = rhs.grs;
        }
        if lhs.sign == rhs.sign {
            lhs.mantissa = lhs.mantissa.clone() + rhs.mantissa.clone();
        } else if lhs.mantissa >= rhs.mantissa {
            lhs.mantissa = lhs.mantissa.clone() - rhs.mantissa.clone();
        } else {
            lhs.sign = rhs.sign;
            lhs.mantissa = rhs.mantissa.clone() - lhs.mantissa.clone();
        }
        if lhs.mantissa.is_zero() {
            lhs.set_exponent_field(0);
        }
        lhs.normalize(2 * frame_shift as usize);
        lhs.shift_mantissa(frame_shift);
        lhs.set_mantissa_field(lhs.mantissa.clone());
        lhs.round(rounding_mode);
        lhs
    }
    pub fn sub(&self, rhs: &Self, rounding_mode: Option<RoundingMode>) -> Self {
        let mut negated = rhs.clone();
        negated.sign = -negated.sign;
        self.add(&negated, rounding_mode)
    }
    pub fn mul(&self, rhs: &Self, rounding_mode: Option<RoundingMode>) -> Self {
        let rounding_mode = rounding_mode.unwrap_or_default();
        let mut lhs = self.clone();
        let mut rhs = rhs.clone();
        lhs.adapt_precision(&mut rhs);
        if lhs.is_nan() || rhs.is_nan() {
            lhs.set_nan();
            return lhs;
        }
        lhs.sign = lhs.sign * rhs.sign;
        if lhs.is_infinite() || rhs.is_infinite() {
            if lhs.is_infinite() && rhs.is_infinite() {
                lhs.set_nan();
                return lhs;
            }
            if lhs.is_zero() || rhs.is_zero() {
                lhs.set_nan();
                return lhs;
            }
            lhs.set_infinite();
            return lhs;
        }
        if lhs.is_zero() || rhs.is_zero() {
            lhs.set_zero();
            return lhs;
        }
        lhs.check_working_storage();
        let mantissa_width = lhs.precision.mantissa_width();
        lhs.materialize_hidden_bit();
        rhs.materialize_hidden_bit();
        let double_width = 2 * (mantissa_width + 1);
        lhs.mantissa = (lhs.mantissa.clone() * rhs.mantissa.clone()) & low_mask(double_width);
        // both inputs carry one bias, only one may remain
        lhs.set_exponent_field(
            lhs.exponent_field() + rhs.exponent_field() - lhs.precision.exponent_bias(),
        );
        // a product of two significands in [1, 2) lands in [1, 4); normalizing
        // one bit below the frame top covers the extra position
        let product_width = double_width - 1;
        lhs.normalize(product_width);
        lhs.shift_mantissa(product_width as i64 - (mantissa_width as i64 + 1));
        lhs.set_mantissa_field(lhs.mantissa.clone());
        lhs.round(rounding_mode);
        lhs
    }
    pub fn div(&self, rhs: &Self, rounding_mode: Option<RoundingMode>) -> Self {
        let rounding_mode = rounding_mode.unwrap_or_default();
        let mut lhs = self.clone();
        let mut rhs = rhs.clone();
        lhs.adapt_precision(&mut rhs);
        if lhs.is_nan() || rhs.is_nan() {
            lhs.set_nan();
            return lhs;
        }
        lhs.sign = lhs.sign * rhs.sign;
        if lhs.is_infinite() {
            if rhs.is_infinite() {
                lhs.set_nan();
                return lhs;
            }
            lhs.set_infinite();
            return lhs;
        }
        if rhs.is_infinite() {
            lhs.set_zero();
            return lhs;
        }
        // the divisor-zero case wins over the dividend-zero case
        if rhs.is_zero() {
            lhs.set_infinite();
            return lhs;
        }
        if lhs.is_zero() {
            return lhs;
        }
        lhs.check_working_storage();
        let significand_width = lhs.precision.mantissa_width() as i64 + 1;
        lhs.materialize_hidden_bit();
        rhs.materialize_hidden_bit();
        // the dividend is raised past the quotient width so a rounding bit
        // survives the integer division
        let round_shift = lhs.precision.working_width() as i64 - 2 * significand_width;
        let dividend_shift = significand_width + round_shift;
        lhs.shift_mantissa(-dividend_shift);
        lhs.mantissa = lhs.mantissa.clone() / rhs.mantissa.clone();
        lhs.shift_mantissa(round_shift);
        // the extra dividend position guaranteed a quotient >= 1, hence the -1
        lhs.set_exponent_field(
            lhs.exponent_field() - rhs.exponent_field() + lhs.precision.exponent_bias() - 1,
        );
        lhs.normalize(significand_width as usize);
        lhs.set_mantissa_field(lhs.mantissa.clone());
        lhs.round(rounding_mode);
        lhs
    }
    pub fn from_f32(value: f32) -> Self {
        let bits = value.to_bits() as u64;
        Self::from_native_fields(
            bits >> (F32_EXPONENT_WIDTH + F32_MANTISSA_WIDTH),
            (bits >> F32_MANTISSA_WIDTH) & ((1 << F32_EXPONENT_WIDTH) - 1),
            bits & ((1 << F32_MANTISSA_WIDTH) - 1),
            Precision::STANDARD_32,
        )
    }
    pub fn from_f64(value: f64) -> Self {
        let bits = value.to_bits();
        Self::from_native_fields(
            bits >> (F64_EXPONENT_WIDTH + F64_MANTISSA_WIDTH),
            (bits >> F64_MANTISSA_WIDTH) & ((1 << F64_EXPONENT_WIDTH) - 1),
            bits & ((1 << F64_MANTISSA_WIDTH) - 1),
            Precision::STANDARD_64,
        )
    }
    fn from_native_fields(
        sign_bit: u64,
        exponent: u64,
        mut mantissa: u64,
        native_precision: Precision,
    ) -> Self {
        let mut grs = GrsBits::empty();
        let mut precision = native_precision;
        if let Some(capacity) = Bits::bit_capacity() {
            // the top storage bit stays clear so the hidden bit and the
            // field masks always fit
            let storage_width = capacity - 1;
            if storage_width < precision.mantissa_width() {
                let width_difference = precision.mantissa_width() - storage_width;
                shift_right_sticky(&mut mantissa, width_difference, &mut grs);
                precision = Precision::new(precision.exponent_width, storage_width as u8);
            }
        }
        let mut retval = Self::zero(precision);
        retval.sign = if sign_bit != 0 {
            Sign::Negative
        } else {
            Sign::Positive
        };
        retval.set_exponent_field(exponent as i64);
        retval.set_mantissa_field(
            Bits::from_u64(mantissa).expect("decomposed mantissa fits in the storage type"),
        );
        retval.grs = grs;
        retval
    }
    /// decomposes at the native widths, then converts to `precision`
    pub fn from_f64_with_precision(value: f64, precision: Precision) -> Self {
        let mut retval = Self::from_f64(value);
        retval.change_precision(precision);
        retval
    }
    pub fn from_f32_with_precision(value: f32, precision: Precision) -> Self {
        let mut retval = Self::from_f32(value);
        retval.change_precision(precision);
        retval
    }
    pub fn from_i32(value: i32) -> Self {
        Self::from_f64(value as f64)
    }
    pub fn to_f64(&self) -> f64 {
        if self.precision.exponent_width() > F64_EXPONENT_WIDTH
            || self.precision.mantissa_width() > F64_MANTISSA_WIDTH
        {
            return 0.0;
        }
        let sign_bit = match self.sign {
            Sign::Positive => 0u64,
            Sign::Negative => 1u64 << 63,
        };
        let class = self.class();
        if class.is_nan() {
            return f64::from_bits(sign_bit | 0x7FF8_0000_0000_0000);
        }
        if class.is_infinity() {
            return f64::from_bits(sign_bit | 0x7FF0_0000_0000_0000);
        }
        if class.is_zero() {
            return f64::from_bits(sign_bit);
        }
        let exponent = self.exponent_field() - self.precision.exponent_bias()
            + Precision::STANDARD_64.exponent_bias();
        let mantissa = self
            .mantissa_field()
            .to_u64()
            .expect("mantissa narrower than f64's fits in u64")
            << (F64_MANTISSA_WIDTH - self.precision.mantissa_width());
        f64::from_bits(sign_bit | ((exponent as u64 & 0x7FF) << F64_MANTISSA_WIDTH) | mantissa)
    }
    pub fn to_f32(&self) -> f32 {
        if self.precision.exponent_width() > F32_EXPONENT_WIDTH
            || self.precision.mantissa_width() > F32_MANTISSA_WIDTH
        {
            return 0.0;
        }
        let sign_bit = match self.sign {
            Sign::Positive => 0u32,
            Sign::Negative => 1u32 << 31,
        };
        let class = self.class();
        if class.is_nan() {
            return f32::from_bits(sign_bit | 0x7FC0_0000);
        }
        if class.is_infinity() {
            return f32::from_bits(sign_bit | 0x7F80_0000);
        }
        if class.is_zero() {
            return f32::from_bits(sign_bit);
        }
        let exponent = self.exponent_field() - self.precision.exponent_bias()
            + Precision::STANDARD_32.exponent_bias();
        let mantissa = self
            .mantissa_field()
            .to_u32()
            .expect("mantissa narrower than f32's fits in u32")
            << (F32_MANTISSA_WIDTH - self.precision.mantissa_width());
        f32::from_bits(sign_bit | ((exponent as u32 & 0xFF) << F32_MANTISSA_WIDTH) | mantissa)
    }
    pub fn to_i32(&self) -> i32 {
        self.to_f64() as i32
    }
    /// exact rational value of a finite input
    pub fn to_ratio(&self) -> Option<Ratio<BigInt>> {
        if !self.is_finite() {
            return None;
        }
        if self.is_zero() {
            return Some(Ratio::from_integer(BigInt::zero()));
        }
        let mantissa: BigInt = self.mantissa_with_hidden_bit().into();
        let exponent = self.exponent_field()
            - self.precision.exponent_bias()
            - self.precision.mantissa_width() as i64;
        let mut retval = if exponent < 0 {
            Ratio::new(mantissa, BigInt::one() << (-exponent) as usize)
        } else {
            Ratio::from_integer(mantissa << exponent as usize)
        };
        if self.sign == Sign::Negative {
            retval = -retval;
        }
        Some(retval)
    }
}

impl<Bits: FloatBitsType> Neg for Float<Bits> {
    type Output = Self;
    fn neg(mut self) -> Self {
        self.sign = -self.sign;
        self
    }
}

impl<Bits: FloatBitsType> Add for Float<Bits> {
    type Output = Self;
    fn add(self, rhs: Self) -> Self {
        Float::add(&self, &rhs, None)
    }
}

impl<Bits: FloatBitsType> Sub for Float<Bits> {
    type Output = Self;
    fn sub(self, rhs: Self) -> Self {
        Float::sub(&self, &rhs, None)
    }
}

impl<Bits: FloatBitsType> Mul for Float<Bits> {
    type Output = Self;
    fn mul(self, rhs: Self) -> Self {
        Float::mul(&self, &rhs, None)
    }
}

impl<Bits: FloatBitsType> Div for Float<Bits> {
    type Output = Self;
    fn div(self, rhs: Self) -> Self {
        Float::div(&self, &rhs, None)
    }
}

impl<Bits: FloatBitsType> AddAssign for Float<Bits> {
    fn add_assign(&mut self, rhs: Self) {
        *self = Float::add(&*self, &rhs, None);
    }
}

impl<Bits: FloatBitsType> SubAssign for Float<Bits> {
    fn sub_assign(&mut self, rhs: Self) {
        *self = Float::sub(&*self, &rhs, None);
    }
}

impl<Bits: FloatBitsType> MulAssign for Float<Bits> {
    fn mul_assign(&mut self, rhs: Self) {
        *self = Float::mul(&*self, &rhs, None);
    }
}

impl<Bits: FloatBitsType> DivAssign for Float<Bits> {
    fn div_assign(&mut self, rhs: Self) {
        *self = Float::div(&*self, &rhs, None);
    }
}

impl<Bits: FloatBitsType> From<f32> for Float<Bits> {
    fn from(value: f32) -> Self {
        Self::from_f32(value)
    }
}

impl<Bits: FloatBitsType> From<f64> for Float<Bits> {
    fn from(value: f64) -> Self {
        Self::from_f64(value)
    }
}

impl<Bits: FloatBitsType> From<i32> for Float<Bits> {
    fn from(value: i32) -> Self {
        Self::from_i32(value)
    }
}

impl<Bits: FloatBitsType> PartialEq for Float<Bits> {
    fn eq(&self, rhs: &Self) -> bool {
        self.to_f64() == rhs.to_f64()
    }
}

impl<Bits: FloatBitsType> PartialOrd for Float<Bits> {
    fn partial_cmp(&self, rhs: &Self) -> Option<Ordering> {
        self.to_f64().partial_cmp(&rhs.to_f64())
    }
}

impl<Bits: FloatBitsType> fmt::Display for Float<Bits> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let grs = self.grs.bits();
        write!(
            f,
            "[{}:{}][{} | {:016x} | {:032x} | {}{}{}]",
            self.precision.exponent_width(),
            self.precision.mantissa_width(),
            self.sign as u8,
            self.exponent_field(),
            self.mantissa_field(),
            (grs >> 2) & 1,
            (grs >> 1) & 1,
            grs & 1
        )
    }
}

impl<Bits: FloatBitsType> fmt::Debug for Float<Bits> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("Float")
            .field("sign", &self.sign)
            .field(
                "exponent_field",
                &format_args!("0x{:X}", self.exponent_field()),
            )
            .field(
                "mantissa_field",
                &format_args!("0x{:X}", self.mantissa_field()),
            )
            .field("grs", &format_args!("0b{:03b}", self.grs.bits()))
            .field("precision", &self.precision)
            .field("class", &self.class())
            .finish()
    }
}

// SPDX-License-Identifier: LGPL-2.1-or-later
// See Notices.txt for copyright information

//! Differential harness that drives the engine with random operands and
//! compares every result against the host's native double arithmetic.

use super::*;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

const ROUNDS: usize = 2000;

const SIGN_COMBINATIONS: [(f64, f64); 4] = [(1.0, 1.0), (1.0, -1.0), (-1.0, 1.0), (-1.0, -1.0)];

fn random_operand(rng: &mut StdRng) -> f64 {
    (rng.gen::<u32>() as f64 / u32::MAX as f64) * 100.0
}

fn ulp_distance(a: f64, b: f64) -> u64 {
    fn ordered(value: f64) -> u64 {
        let bits = value.to_bits();
        if bits >> 63 == 1 {
            !bits
        } else {
            bits | (1 << 63)
        }
    }
    let a = ordered(a);
    let b = ordered(b);
    if a > b {
        a - b
    } else {
        b - a
    }
}

#[test]
fn randomized_operands_match_native_arithmetic() {
    let mut rng = StdRng::seed_from_u64(0x0f1e_2d3c_4b5a_6978);
    for _ in 0..ROUNDS {
        for &(sign_a, sign_b) in &SIGN_COMBINATIONS {
            let da = sign_a * random_operand(&mut rng);
            let db = sign_b * random_operand(&mut rng);
            let a = Float::<u128>::from_f64(da);
            let b = Float::<u128>::from_f64(db);
            assert_eq!(
                a.to_f64().to_bits(),
                da.to_bits(),
                "operand decomposition drifted for {}",
                da
            );

            let sum = Float::add(&a, &b, None).to_f64();
            assert!(
                sum == da + db,
                "{} + {} became {} instead of {}",
                da,
                db,
                sum,
                da + db
            );

            let difference = Float::sub(&a, &b, None).to_f64();
            assert!(
                difference == da - db,
                "{} - {} became {} instead of {}",
                da,
                db,
                difference,
                da - db
            );

            let product = Float::mul(&a, &b, None).to_f64();
            assert!(
                product == da * db,
                "{} * {} became {} instead of {}",
                da,
                db,
                product,
                da * db
            );

            // the quotient keeps less rounding information than the other
            // operations, so it is held to a ulp tolerance instead
            let quotient = Float::div(&a, &b, None).to_f64();
            assert!(
                ulp_distance(quotient, da / db) <= 4,
                "{} / {} became {} instead of {}",
                da,
                db,
                quotient,
                da / db
            );
        }
    }
}

#[test]
fn randomized_results_stay_clean_at_rest() {
    let mut rng = StdRng::seed_from_u64(0x00c0_ffee_c0de_f00d);
    for _ in 0..ROUNDS / 10 {
        let da = random_operand(&mut rng);
        let db = random_operand(&mut rng) + 1e-6;
        let a = Float::<u128>::from_f64(da);
        let b = Float::<u128>::from_f64(db);
        for result in &[
            Float::add(&a, &b, None),
            Float::sub(&a, &b, None),
            Float::mul(&a, &b, None),
            Float::div(&a, &b, None),
        ] {
            assert_eq!(result.grs(), GrsBits::empty());
            assert_eq!(result.precision(), Precision::STANDARD_64);
            let exponent = result.exponent_field();
            assert!(exponent <= Precision::STANDARD_64.exponent_inf_nan());
            assert!(result.mantissa_field() < 1u128 << 52);
        }
    }
}

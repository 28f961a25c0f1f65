use std::fmt;
use std::str::FromStr;

use rhai::{Dynamic, Engine, EvalAltResult, ImmutableString, FLOAT, INT};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};

use super::runtime_error;

const MAX_SCALE: INT = 28;

/// Exact decimal arithmetic for scripts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BigDecimal(pub Decimal);

impl fmt::Display for BigDecimal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

pub(crate) fn parse_decimal(text: &str) -> Option<Decimal> {
    let text = text.trim();
    Decimal::from_str(text)
        .or_else(|_| Decimal::from_scientific(text))
        .ok()
}

/// Numbers, numeric strings and `BigDecimal` values; `None` for anything else.
pub(crate) fn decimal_from_dynamic(value: &Dynamic) -> Option<Decimal> {
    if value.is::<INT>() {
        return Some(Decimal::from(value.clone().cast::<INT>()));
    }
    if value.is::<FLOAT>() {
        let number = value.clone().cast::<FLOAT>();
        return if number.is_finite() {
            parse_decimal(&number.to_string())
        } else {
            None
        };
    }
    if let Some(text) = value.read_lock::<ImmutableString>() {
        return parse_decimal(&text);
    }
    if let Some(decimal) = value.read_lock::<BigDecimal>() {
        return Some(decimal.0);
    }
    None
}

/// Plain float view of a numeric value, covering magnitudes `Decimal` cannot
/// hold.
pub(crate) fn float_from_dynamic(value: &Dynamic) -> Option<FLOAT> {
    if value.is::<FLOAT>() {
        return Some(value.clone().cast::<FLOAT>());
    }
    if value.is::<INT>() {
        return Some(value.clone().cast::<INT>() as FLOAT);
    }
    if let Some(text) = value.read_lock::<ImmutableString>() {
        return text.trim().parse::<FLOAT>().ok().filter(|number| number.is_finite());
    }
    decimal_from_dynamic(value).and_then(|decimal| decimal.to_f64())
}

fn scale_of(scale: INT) -> u32 {
    scale.clamp(0, MAX_SCALE) as u32
}

fn round_half_up(value: Decimal, scale: INT) -> Decimal {
    let scale = scale_of(scale);
    let mut rounded = value.round_dp_with_strategy(scale, RoundingStrategy::MidpointAwayFromZero);
    rounded.rescale(scale);
    rounded
}

pub fn round_to(value: Dynamic, decimals: INT) -> FLOAT {
    if let Some(decimal) = decimal_from_dynamic(&value) {
        return decimal
            .round_dp_with_strategy(scale_of(decimals), RoundingStrategy::MidpointAwayFromZero)
            .to_f64()
            .unwrap_or(0.0);
    }
    match float_from_dynamic(&value) {
        Some(number) if number.is_finite() => round_float(number, decimals),
        _ => 0.0,
    }
}

/// Half-away-from-zero rounding in plain float arithmetic.
fn round_float(number: FLOAT, decimals: INT) -> FLOAT {
    let factor = (10.0 as FLOAT).powi(scale_of(decimals) as i32);
    let scaled = number * factor;
    if scaled.is_finite() {
        scaled.round() / factor
    } else {
        number
    }
}

fn operand(name: &str, value: &Dynamic) -> Result<Decimal, Box<EvalAltResult>> {
    decimal_from_dynamic(value).ok_or_else(|| {
        runtime_error(format!(
            "BigDecimal.{}: {} is not a number",
            name,
            value.type_name()
        ))
    })
}

fn overflow(name: &str) -> Box<EvalAltResult> {
    runtime_error(format!("ArithmeticError: overflow in BigDecimal.{}", name))
}

fn divide(
    dividend: &BigDecimal,
    divisor: &Dynamic,
) -> Result<Decimal, Box<EvalAltResult>> {
    let divisor = operand("divide", divisor)?;
    if divisor.is_zero() {
        return Err(runtime_error("ArithmeticError: division by zero"));
    }
    dividend
        .0
        .checked_div(divisor)
        .ok_or_else(|| overflow("divide"))
}

pub(super) fn register(engine: &mut Engine) {
    engine.register_fn("roundTo", round_to);

    engine
        .register_type_with_name::<BigDecimal>("BigDecimal")
        .register_fn(
            "BigDecimal",
            |value: Dynamic| -> Result<BigDecimal, Box<EvalAltResult>> {
                decimal_from_dynamic(&value).map(BigDecimal).ok_or_else(|| {
                    runtime_error(format!("BigDecimal: {} is not a number", value))
                })
            },
        )
        .register_fn(
            "add",
            |a: BigDecimal, b: Dynamic| -> Result<BigDecimal, Box<EvalAltResult>> {
                let b = operand("add", &b)?;
                a.0.checked_add(b).map(BigDecimal).ok_or_else(|| overflow("add"))
            },
        )
        .register_fn(
            "subtract",
            |a: BigDecimal, b: Dynamic| -> Result<BigDecimal, Box<EvalAltResult>> {
                let b = operand("subtract", &b)?;
                a.0.checked_sub(b)
                    .map(BigDecimal)
                    .ok_or_else(|| overflow("subtract"))
            },
        )
        .register_fn(
            "multiply",
            |a: BigDecimal, b: Dynamic| -> Result<BigDecimal, Box<EvalAltResult>> {
                let b = operand("multiply", &b)?;
                a.0.checked_mul(b)
                    .map(BigDecimal)
                    .ok_or_else(|| overflow("multiply"))
            },
        )
        .register_fn(
            "divide",
            |a: BigDecimal, b: Dynamic| -> Result<BigDecimal, Box<EvalAltResult>> {
                divide(&a, &b).map(|value| BigDecimal(value.normalize()))
            },
        )
        .register_fn(
            "divide",
            |a: BigDecimal, b: Dynamic, scale: INT| -> Result<BigDecimal, Box<EvalAltResult>> {
                divide(&a, &b).map(|value| BigDecimal(round_half_up(value, scale)))
            },
        )
        .register_fn("setScale", |a: BigDecimal, scale: INT| {
            BigDecimal(round_half_up(a.0, scale))
        })
        .register_fn(
            "compareTo",
            |a: BigDecimal, b: Dynamic| -> Result<INT, Box<EvalAltResult>> {
                let b = operand("compareTo", &b)?;
                Ok(a.0.cmp(&b) as INT)
            },
        )
        .register_fn("toString", |a: BigDecimal| a.to_string())
        .register_fn("toNumber", |a: BigDecimal| a.0.to_f64().unwrap_or_default())
        .register_fn("to_string", |a: &mut BigDecimal| a.to_string())
        .register_fn("to_debug", |a: &mut BigDecimal| a.to_string());
}

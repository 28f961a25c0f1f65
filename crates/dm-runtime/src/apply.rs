//! Direct field-by-field application used for quick previews without
//! generating a script.

use std::str::FromStr;
use std::sync::OnceLock;

use dm_compiler::normalize_fragment;
use dm_core::{get_path, parse_path, set_path, MapperError};
use regex::Regex;
use rhai::{Dynamic, Engine, Scope};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

use crate::bridge::{float_to_json, is_truthy, json_to_dynamic};
use crate::shims::parse_decimal;

/// Operations budget for a single condition.
const CONDITION_MAX_OPERATIONS: u64 = 100_000;

pub const TRANSFORM_CATALOGUE: &[&str] = &[
    "add_percent(n)",
    "subtract_percent(n)",
    "multiply(n)",
    "add(n)",
    "round(n)",
    "uppercase()",
    "lowercase()",
    "trim()",
    "prefix(s)",
    "suffix(s)",
    "default(v)",
];

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct FieldMapping {
    pub id: String,
    pub source_path: String,
    pub target_path: String,
    pub condition: Option<String>,
    pub transform: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApplyError {
    pub mapping_id: String,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApplyResult {
    pub output: JsonValue,
    pub errors: Vec<ApplyError>,
}

impl ApplyResult {
    pub fn is_ok(&self) -> bool {
        self.errors.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Transform {
    AddPercent(Decimal),
    SubtractPercent(Decimal),
    Multiply(Decimal),
    Add(Decimal),
    Round(u32),
    Uppercase,
    Lowercase,
    Trim,
    Prefix(String),
    Suffix(String),
    Default(JsonValue),
}

fn transform_regex() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"^\s*([a-z_]+)\s*\(\s*(.*?)\s*\)\s*$").expect("valid transform regex")
    })
}

fn unquote(argument: &str) -> &str {
    for quote in ['"', '\''] {
        if argument.len() >= 2 && argument.starts_with(quote) && argument.ends_with(quote) {
            return &argument[1..argument.len() - 1];
        }
    }
    argument
}

impl FromStr for Transform {
    type Err = MapperError;

    fn from_str(text: &str) -> Result<Self, Self::Err> {
        let invalid = |detail: &str| {
            MapperError::new(
                "APPLY_INVALID_TRANSFORM",
                format!("Transform \"{}\" {}", text.trim(), detail),
            )
        };
        let captures = transform_regex()
            .captures(text)
            .ok_or_else(|| invalid("is not of the form name(argument)"))?;
        let name = captures.get(1).map_or("", |found| found.as_str());
        let argument = captures.get(2).map_or("", |found| found.as_str());
        let number = || parse_decimal(unquote(argument)).ok_or_else(|| invalid("needs a numeric argument"));
        let no_argument = |transform: Transform| {
            if argument.is_empty() {
                Ok(transform)
            } else {
                Err(invalid("takes no argument"))
            }
        };

        match name {
            "add_percent" => Ok(Transform::AddPercent(number()?)),
            "subtract_percent" => Ok(Transform::SubtractPercent(number()?)),
            "multiply" => Ok(Transform::Multiply(number()?)),
            "add" => Ok(Transform::Add(number()?)),
            "round" => {
                let places = if argument.is_empty() {
                    0
                } else {
                    number()?
                        .to_u32()
                        .ok_or_else(|| invalid("needs a non-negative number of places"))?
                };
                Ok(Transform::Round(places))
            }
            "uppercase" => no_argument(Transform::Uppercase),
            "lowercase" => no_argument(Transform::Lowercase),
            "trim" => no_argument(Transform::Trim),
            "prefix" => Ok(Transform::Prefix(unquote(argument).to_string())),
            "suffix" => Ok(Transform::Suffix(unquote(argument).to_string())),
            "default" => Ok(Transform::Default(
                serde_json::from_str(argument)
                    .unwrap_or_else(|_| JsonValue::String(unquote(argument).to_string())),
            )),
            _ => Err(invalid("is not a known transform")),
        }
    }
}

fn number_of(value: &JsonValue) -> Option<Decimal> {
    match value {
        JsonValue::Number(number) => parse_decimal(&number.to_string()),
        JsonValue::String(text) => parse_decimal(text),
        _ => None,
    }
}

fn text_of(value: &JsonValue) -> String {
    match value {
        JsonValue::String(text) => text.clone(),
        JsonValue::Null => String::new(),
        other => other.to_string(),
    }
}

fn decimal_to_json(value: Decimal) -> JsonValue {
    if value.fract().is_zero() {
        if let Some(whole) = value.to_i64() {
            return JsonValue::from(whole);
        }
    }
    float_to_json(value.to_f64().unwrap_or(f64::NAN))
}

impl Transform {
    fn apply(&self, value: &JsonValue) -> Result<JsonValue, String> {
        let hundred = Decimal::ONE_HUNDRED;
        let numeric = |operation: &dyn Fn(Decimal) -> Option<Decimal>| {
            let number = number_of(value)
                .ok_or_else(|| format!("Value {} is not numeric", value))?;
            operation(number)
                .map(decimal_to_json)
                .ok_or_else(|| "Numeric overflow".to_string())
        };
        match self {
            Transform::AddPercent(percent) => numeric(&|number| {
                number.checked_mul(hundred.checked_add(*percent)?)?.checked_div(hundred)
            }),
            Transform::SubtractPercent(percent) => numeric(&|number| {
                number.checked_mul(hundred.checked_sub(*percent)?)?.checked_div(hundred)
            }),
            Transform::Multiply(factor) => numeric(&|number| number.checked_mul(*factor)),
            Transform::Add(addend) => numeric(&|number| number.checked_add(*addend)),
            Transform::Round(places) => numeric(&|number| {
                Some(number.round_dp_with_strategy(*places, RoundingStrategy::MidpointAwayFromZero))
            }),
            Transform::Uppercase => Ok(JsonValue::String(text_of(value).to_uppercase())),
            Transform::Lowercase => Ok(JsonValue::String(text_of(value).to_lowercase())),
            Transform::Trim => Ok(JsonValue::String(text_of(value).trim().to_string())),
            Transform::Prefix(prefix) => Ok(JsonValue::String(format!("{}{}", prefix, text_of(value)))),
            Transform::Suffix(suffix) => Ok(JsonValue::String(format!("{}{}", text_of(value), suffix))),
            Transform::Default(fallback) => Ok(if value.is_null() {
                fallback.clone()
            } else {
                value.clone()
            }),
        }
    }
}

struct ConditionEvaluator {
    engine: Engine,
    base: Scope<'static>,
}

impl ConditionEvaluator {
    fn new(source: &JsonValue) -> Self {
        let mut engine = Engine::new();
        engine.set_max_operations(CONDITION_MAX_OPERATIONS);
        let mut base = Scope::new();
        if let JsonValue::Object(fields) = source {
            for (name, value) in fields {
                if dm_core::is_plain_identifier(name) {
                    base.push(name.clone(), json_to_dynamic(value));
                }
            }
        }
        base.push("sourceData", json_to_dynamic(source));
        Self { engine, base }
    }

    fn holds(&self, condition: &str, value: Option<&JsonValue>) -> Result<bool, String> {
        let mut scope = self.base.clone();
        scope.push("value", value.map(json_to_dynamic).unwrap_or(Dynamic::UNIT));
        let expression = normalize_fragment(condition);
        self.engine
            .eval_expression_with_scope::<Dynamic>(&mut scope, &expression)
            .map(|verdict| is_truthy(&verdict))
            .map_err(|error| format!("Condition \"{}\" failed: {}", condition.trim(), error))
    }
}

fn apply_one(
    evaluator: &ConditionEvaluator,
    source: &JsonValue,
    output: &mut JsonValue,
    mapping: &FieldMapping,
) -> Result<(), String> {
    let value = get_path(source, &parse_path(&mapping.source_path));

    if let Some(condition) = mapping.condition.as_deref().filter(|text| !text.trim().is_empty()) {
        if !evaluator.holds(condition, value)? {
            tracing::debug!(mapping = %mapping.id, "condition is false, mapping skipped");
            return Ok(());
        }
    }

    let transform = mapping
        .transform
        .as_deref()
        .filter(|text| !text.trim().is_empty())
        .map(Transform::from_str)
        .transpose()
        .map_err(|error| error.message)?;

    let result = match (value, &transform) {
        (None, Some(Transform::Default(fallback))) => fallback.clone(),
        (None, _) => {
            return Err(format!(
                "Source path \"{}\" was not found",
                mapping.source_path
            ))
        }
        (Some(value), Some(transform)) => transform.apply(value)?,
        (Some(value), None) => value.clone(),
    };

    set_path(output, &parse_path(&mapping.target_path), result).map_err(|error| error.message)
}

/// Applies `mappings` in order onto a copy of `template`. A failing mapping is
/// recorded and the rest still apply.
pub fn apply_mappings(
    source: &JsonValue,
    template: &JsonValue,
    mappings: &[FieldMapping],
) -> ApplyResult {
    let evaluator = ConditionEvaluator::new(source);
    let mut output = template.clone();
    let mut errors = Vec::new();
    for mapping in mappings {
        if let Err(message) = apply_one(&evaluator, source, &mut output, mapping) {
            errors.push(ApplyError {
                mapping_id: mapping.id.clone(),
                message,
            });
        }
    }
    tracing::debug!(
        mappings = mappings.len(),
        errors = errors.len(),
        "applied field mappings"
    );
    ApplyResult { output, errors }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn mapping(id: &str, source: &str, target: &str) -> FieldMapping {
        FieldMapping {
            id: id.to_string(),
            source_path: source.to_string(),
            target_path: target.to_string(),
            ..FieldMapping::default()
        }
    }

    fn priced(condition: &str, transform: &str) -> FieldMapping {
        FieldMapping {
            condition: Some(condition.to_string()),
            transform: Some(transform.to_string()),
            ..mapping("m1", "price", "cost")
        }
    }

    #[test]
    fn conditional_mapping_applies_percent_transform() {
        let mappings = [priced("price > 50", "add_percent(5)")];
        let applied = apply_mappings(&json!({"price": 100}), &json!({"cost": 0}), &mappings);
        assert!(applied.is_ok(), "{:?}", applied.errors);
        assert_eq!(applied.output, json!({"cost": 105}));

        let skipped = apply_mappings(&json!({"price": 20}), &json!({"cost": 0}), &mappings);
        assert!(skipped.is_ok());
        assert_eq!(skipped.output, json!({"cost": 0}));
    }

    #[test]
    fn conditions_accept_js_operators_and_source_data() {
        let mappings = [FieldMapping {
            condition: Some("sourceData.kind === 'retail' && value !== null".to_string()),
            ..mapping("m1", "price", "cost")
        }];
        let applied = apply_mappings(
            &json!({"kind": "retail", "price": 7}),
            &json!({}),
            &mappings,
        );
        assert_eq!(applied.output, json!({"cost": 7}));
    }

    #[test]
    fn catalogue_transforms() {
        let cases = [
            ("subtract_percent(10)", json!(200), json!(180)),
            ("multiply(1.5)", json!("4"), json!(6)),
            ("add(0.25)", json!(1), json!(1.25)),
            ("round(1)", json!(2.25), json!(2.3)),
            ("round()", json!(2.5), json!(3)),
            ("uppercase()", json!("ab"), json!("AB")),
            ("lowercase()", json!("AB"), json!("ab")),
            ("trim()", json!("  x "), json!("x")),
            ("prefix('#')", json!(7), json!("#7")),
            ("suffix(\" kg\")", json!("5"), json!("5 kg")),
            ("default(1)", JsonValue::Null, json!(1)),
            ("default(1)", json!(9), json!(9)),
        ];
        for (text, input, expected) in cases {
            let transform = Transform::from_str(text).expect(text);
            assert_eq!(transform.apply(&input), Ok(expected), "{}", text);
        }
    }

    #[test]
    fn errors_are_collected_per_mapping() {
        let mappings = [
            mapping("missing", "nope", "a"),
            FieldMapping {
                transform: Some("explode()".to_string()),
                ..mapping("bad-transform", "name", "b")
            },
            FieldMapping {
                condition: Some("price >".to_string()),
                ..mapping("bad-condition", "name", "c")
            },
            FieldMapping {
                transform: Some("add(1)".to_string()),
                ..mapping("not-numeric", "name", "d")
            },
            mapping("ok", "name", "e.f"),
        ];
        let applied = apply_mappings(&json!({"name": "Ann", "price": 1}), &json!({}), &mappings);
        let ids = applied
            .errors
            .iter()
            .map(|error| error.mapping_id.as_str())
            .collect::<Vec<_>>();
        assert_eq!(ids, vec!["missing", "bad-transform", "bad-condition", "not-numeric"]);
        assert_eq!(applied.output, json!({"e": {"f": "Ann"}}));
    }

    #[test]
    fn oversized_target_indices_are_reported() {
        let mappings = [mapping("far", "name", "rows[20000000]"), mapping("near", "name", "rows[0]")];
        let applied = apply_mappings(&json!({"name": "Ann"}), &json!({}), &mappings);
        assert_eq!(applied.errors.len(), 1);
        assert_eq!(applied.errors[0].mapping_id, "far");
        assert!(applied.errors[0].message.contains("20000000"), "{}", applied.errors[0].message);
        assert_eq!(applied.output, json!({"rows": ["Ann"]}));
    }

    #[test]
    fn default_transform_fills_missing_source() {
        let mappings = [FieldMapping {
            transform: Some("default(\"n/a\")".to_string()),
            ..mapping("m", "missing", "status")
        }];
        let applied = apply_mappings(&json!({}), &json!({}), &mappings);
        assert_eq!(applied.output, json!({"status": "n/a"}));
    }
}

use rhai::{Array, Dynamic, Engine, EvalAltResult, FnPtr, NativeCallContext, FLOAT, INT};

use super::numeric::float_from_dynamic;

pub(super) fn register(engine: &mut Engine) {
    engine.register_fn("chunk", chunk);
    engine.register_fn("sum", |array: Array| sum_values(array.iter()));
    engine.register_fn(
        "sum",
        |context: NativeCallContext,
         array: Array,
         selector: FnPtr|
         -> Result<Dynamic, Box<EvalAltResult>> {
            let selected = array
                .into_iter()
                .map(|item| selector.call_within_context::<Dynamic>(&context, (item,)))
                .collect::<Result<Vec<_>, _>>()?;
            Ok(sum_values(selected.iter()))
        },
    );
    engine.register_fn("findFirst", find_first);
}

fn chunk(array: Array, size: INT) -> Array {
    if size <= 0 {
        return vec![Dynamic::from_array(array)];
    }
    array
        .chunks(size as usize)
        .map(|items| Dynamic::from_array(items.to_vec()))
        .collect()
}

/// Integer total while every item is an integer, float otherwise.
/// Items that are not numbers count as zero.
fn sum_values<'a>(items: impl Iterator<Item = &'a Dynamic>) -> Dynamic {
    let mut integer: Option<INT> = Some(0);
    let mut float: FLOAT = 0.0;
    for item in items {
        if item.is::<INT>() {
            let value = item.clone().cast::<INT>();
            integer = integer.and_then(|total| total.checked_add(value));
            float += value as FLOAT;
            continue;
        }
        integer = None;
        if let Some(value) = float_from_dynamic(item) {
            float += value;
        }
    }
    match integer {
        Some(total) => Dynamic::from_int(total),
        None => Dynamic::from_float(float),
    }
}

fn find_first(
    context: NativeCallContext,
    array: Array,
    transform: FnPtr,
) -> Result<Dynamic, Box<EvalAltResult>> {
    for item in array {
        let result = transform.call_within_context::<Dynamic>(&context, (item,))?;
        if !result.is_unit() && !matches!(result.as_bool(), Ok(false)) {
            return Ok(result);
        }
    }
    Ok(Dynamic::UNIT)
}

//! Stand-ins for hosted platform services that do not exist outside it.
//! They never fail; each call leaves a warning in the execution log.

use rhai::{Dynamic, Engine, Map};

use crate::bridge::dynamic_to_text;
use crate::console::{LogBuffer, LogLevel};

fn warn(logs: &LogBuffer, name: &str, args: &[Dynamic]) {
    let rendered = args
        .iter()
        .map(dynamic_to_text)
        .collect::<Vec<_>>()
        .join(", ");
    tracing::warn!(binding = name, args = %rendered, "platform binding is not available");
    logs.push(
        LogLevel::Warn,
        format!("{}({}) is not available outside the platform", name, rendered),
    );
}

pub(super) fn register(engine: &mut Engine, logs: &LogBuffer) {
    let sink = logs.clone();
    engine.register_fn("getGlobalData", move |key: Dynamic| {
        warn(&sink, "getGlobalData", &[key]);
        Map::new()
    });

    let sink = logs.clone();
    engine.register_fn("getLookupTable", move |name: Dynamic| {
        warn(&sink, "getLookupTable", &[name]);
        Map::new()
    });

    let sink = logs.clone();
    engine.register_fn("getLookupValue", move |table: Dynamic, key: Dynamic| {
        warn(&sink, "getLookupValue", &[table, key]);
    });

    let sink = logs.clone();
    engine.register_fn("logFailureEvent", move || {
        warn(&sink, "logFailureEvent", &[]);
    });
    let sink = logs.clone();
    engine.register_fn("logFailureEvent", move |a: Dynamic| {
        warn(&sink, "logFailureEvent", &[a]);
    });
    let sink = logs.clone();
    engine.register_fn("logFailureEvent", move |a: Dynamic, b: Dynamic| {
        warn(&sink, "logFailureEvent", &[a, b]);
    });
    let sink = logs.clone();
    engine.register_fn(
        "logFailureEvent",
        move |a: Dynamic, b: Dynamic, c: Dynamic| {
            warn(&sink, "logFailureEvent", &[a, b, c]);
        },
    );
}

//! Host bindings registered into every script engine.

mod collections;
mod data;
mod date;
mod locale;
mod numeric;
mod platform;
mod portable;
mod strings;
mod xml;

pub use date::{DateFormat, DateValue};
pub use locale::{Locale, ISO_COUNTRIES};
pub use numeric::BigDecimal;
pub use portable::PORTABLE_SHIMS;
pub(crate) use numeric::parse_decimal;
pub use strings::format_printf;
pub use xml::{text_of, XmlNode, XmlNodeList};

use rhai::{Dynamic, Engine, EvalAltResult, Position};

use crate::console::{register_console, LogBuffer};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ShimDoc {
    pub name: &'static str,
    pub signature: &'static str,
    pub summary: &'static str,
}

/// State shared between the engine's callbacks and the caller.
#[derive(Debug, Clone, Default)]
pub struct ShimHost {
    pub logs: LogBuffer,
}

impl ShimHost {
    pub fn new(logs: LogBuffer) -> Self {
        Self { logs }
    }
}

pub const SHIM_CATALOGUE: &[ShimDoc] = &[
    ShimDoc {
        name: "parseJSON",
        signature: "parseJSON(text)",
        summary: "Parses JSON text into maps, arrays and scalars.",
    },
    ShimDoc {
        name: "toJSON",
        signature: "toJSON(value) / toJSON(value, keyOrder)",
        summary: "Serializes a value as 2-space indented JSON, keys ordered by keyOrder.",
    },
    ShimDoc {
        name: "parseXML",
        signature: "parseXML(text)",
        summary: "Parses XML; attributes use '@', text uses '#text'.",
    },
    ShimDoc {
        name: "toXML",
        signature: "toXML(value) / toXML(value, keyOrder)",
        summary: "Serializes a map as indented XML, elements ordered by keyOrder.",
    },
    ShimDoc {
        name: "asArray",
        signature: "asArray(value)",
        summary: "Wraps a single value in an array; () becomes [].",
    },
    ShimDoc {
        name: "isEmpty",
        signature: "isEmpty(value)",
        summary: "True for (), \"\" and empty arrays or maps.",
    },
    ShimDoc {
        name: "DateFormat",
        signature: "DateFormat(pattern).format(date) / .parse(text)",
        summary: "Pattern formatter: yyyy yy M MM MMM MMMM d dd H HH hh mm ss SSS EEE a 'lit'.",
    },
    ShimDoc {
        name: "now",
        signature: "now() / nowUtc() / nowZoned(offsetMinutes)",
        summary: "Current instant in local time, UTC or a fixed offset.",
    },
    ShimDoc {
        name: "toEpochSeconds",
        signature: "toEpochSeconds(date) / fromEpochSeconds(secs)",
        summary: "Converts between dates and Unix seconds.",
    },
    ShimDoc {
        name: "parseIsoDate",
        signature: "parseIsoDate(text)",
        summary: "Parses RFC 3339, naive date-time or plain date text.",
    },
    ShimDoc {
        name: "date getters",
        signature: "year month day hour minute second millisecond dayOfWeek",
        summary: "Calendar fields of a date; dayOfWeek is 1 for Monday.",
    },
    ShimDoc {
        name: "roundTo",
        signature: "roundTo(value, decimals)",
        summary: "Rounds half away from zero; non-numeric input gives 0.",
    },
    ShimDoc {
        name: "BigDecimal",
        signature: "BigDecimal(value)",
        summary: "Exact decimal: add subtract multiply divide setScale compareTo toString toNumber.",
    },
    ShimDoc {
        name: "chunk",
        signature: "chunk(array, size)",
        summary: "Splits an array into arrays of at most size items.",
    },
    ShimDoc {
        name: "sum",
        signature: "sum(array) / sum(array, selector)",
        summary: "Adds numeric items, optionally through a selector closure.",
    },
    ShimDoc {
        name: "findFirst",
        signature: "findFirst(array, transform)",
        summary: "First non-() transform result, or ().",
    },
    ShimDoc {
        name: "isoCountries",
        signature: "isoCountries() / toAlpha3(code)",
        summary: "ISO 3166 alpha-2 codes and alpha-2 to alpha-3 conversion.",
    },
    ShimDoc {
        name: "Locale",
        signature: "Locale(language, country)",
        summary: "Locale with language, country and iso3Country properties.",
    },
    ShimDoc {
        name: "getText",
        signature: "getText(node)",
        summary: "Concatenated text content of a parsed XML node.",
    },
    ShimDoc {
        name: "deepSearch",
        signature: "deepSearch(tree, predicate)",
        summary: "All values matching predicate, depth-first.",
    },
    ShimDoc {
        name: "xmlProxy",
        signature: "xmlProxy(parsed)",
        summary: "Navigable node: text() name() attr(n) children() [\"@a\"] [\"..name\"].",
    },
    ShimDoc {
        name: "sprintf",
        signature: "sprintf(format, args...)",
        summary: "printf-style formatting with %s %d %f %.Nf %% %n.",
    },
    ShimDoc {
        name: "getGlobalData",
        signature: "getGlobalData(key)",
        summary: "Platform stub; returns #{} and logs a warning.",
    },
    ShimDoc {
        name: "logFailureEvent",
        signature: "logFailureEvent(...)",
        summary: "Platform stub; logs a warning.",
    },
    ShimDoc {
        name: "getLookupTable",
        signature: "getLookupTable(name) / getLookupValue(table, key)",
        summary: "Platform stubs; return #{} or () and log a warning.",
    },
    ShimDoc {
        name: "console",
        signature: "console.log/info/warn/error(msg), print(msg), debug(msg)",
        summary: "Captured into the execution log.",
    },
];

pub fn register_shims(engine: &mut Engine, host: &ShimHost) {
    register_console(engine, &host.logs);
    data::register(engine);
    date::register(engine);
    numeric::register(engine);
    collections::register(engine);
    locale::register(engine);
    xml::register(engine);
    strings::register(engine);
    platform::register(engine, &host.logs);
}

/// Header for a standalone script: a comment block documenting every
/// binding, then script definitions of the ones that need no host.
pub fn render_shim_header() -> String {
    let width = SHIM_CATALOGUE
        .iter()
        .map(|doc| doc.signature.len())
        .max()
        .unwrap_or_default();
    let mut out = String::from("// Runtime bindings available to mapping scripts:\n");
    for doc in SHIM_CATALOGUE {
        out.push_str(&format!(
            "//   {:<width$}  {}\n",
            doc.signature,
            doc.summary,
            width = width
        ));
    }
    out.push_str("// Host-provided: parsers, serializers, dates, decimals, XML, sprintf.

");
    out.push_str(PORTABLE_SHIMS);
    out
}

pub(crate) fn runtime_error(message: impl Into<String>) -> Box<EvalAltResult> {
    Box::new(EvalAltResult::ErrorRuntime(
        Dynamic::from(message.into()),
        Position::NONE,
    ))
}

#[cfg(test)]
pub(crate) mod test_support {
    use rhai::{Dynamic, Engine, Scope};

    use super::{register_shims, ShimHost};
    use crate::bridge::dynamic_to_text;
    use crate::console::LogBuffer;

    pub fn engine_with_logs() -> (Engine, LogBuffer) {
        let logs = LogBuffer::default();
        let mut engine = Engine::new();
        register_shims(&mut engine, &ShimHost::new(logs.clone()));
        (engine, logs)
    }

    pub fn eval(script: &str) -> Dynamic {
        let (engine, _) = engine_with_logs();
        engine
            .eval_with_scope::<Dynamic>(&mut Scope::new(), script)
            .unwrap_or_else(|error| panic!("script failed: {}\n{}", error, script))
    }

    pub fn eval_text(script: &str) -> String {
        dynamic_to_text(&eval(script))
    }

    pub fn eval_error(script: &str) -> String {
        let (engine, _) = engine_with_logs();
        let error = engine
            .eval_with_scope::<Dynamic>(&mut Scope::new(), script)
            .expect_err("script should fail");
        error.to_string()
    }
}

use std::cell::RefCell;
use std::rc::Rc;

use rhai::{Dynamic, Engine};

use crate::bridge::dynamic_to_text;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    Log,
    Info,
    Warn,
    Error,
    Debug,
}

impl LogLevel {
    pub fn tag(self) -> &'static str {
        match self {
            LogLevel::Log => "[LOG]",
            LogLevel::Info => "[INFO]",
            LogLevel::Warn => "[WARN]",
            LogLevel::Error => "[ERROR]",
            LogLevel::Debug => "[DEBUG]",
        }
    }
}

/// Ordered log lines captured during one execution.
#[derive(Debug, Clone, Default)]
pub struct LogBuffer {
    lines: Rc<RefCell<Vec<String>>>,
}

impl LogBuffer {
    pub fn push(&self, level: LogLevel, message: impl AsRef<str>) {
        self.lines
            .borrow_mut()
            .push(format!("{} {}", level.tag(), message.as_ref()));
    }

    pub fn lines(&self) -> Vec<String> {
        self.lines.borrow().clone()
    }

    pub fn len(&self) -> usize {
        self.lines.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lines.borrow().is_empty()
    }
}

/// The `console` object bound in every script scope.
#[derive(Debug, Clone)]
pub struct Console {
    logs: LogBuffer,
}

impl Console {
    pub fn new(logs: LogBuffer) -> Self {
        Self { logs }
    }

    fn write(&self, level: LogLevel, parts: &[Dynamic]) {
        let message = parts
            .iter()
            .map(dynamic_to_text)
            .collect::<Vec<_>>()
            .join(" ");
        self.logs.push(level, message);
    }
}

pub fn register_console(engine: &mut Engine, logs: &LogBuffer) {
    engine.register_type_with_name::<Console>("Console");
    for (name, level) in [
        ("log", LogLevel::Log),
        ("info", LogLevel::Info),
        ("warn", LogLevel::Warn),
        ("error", LogLevel::Error),
    ] {
        engine.register_fn(name, move |console: Console, message: Dynamic| {
            console.write(level, &[message]);
        });
        engine.register_fn(name, move |console: Console, first: Dynamic, second: Dynamic| {
            console.write(level, &[first, second]);
        });
        engine.register_fn(
            name,
            move |console: Console, first: Dynamic, second: Dynamic, third: Dynamic| {
                console.write(level, &[first, second, third]);
            },
        );
    }

    let sink = logs.clone();
    engine.on_print(move |text| sink.push(LogLevel::Log, text));
    let sink = logs.clone();
    engine.on_debug(move |text, _source, _position| sink.push(LogLevel::Debug, text));
}

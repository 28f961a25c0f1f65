/// Protocol lines a command prints to stdout, plus its exit code.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub(crate) struct Report {
    pub(crate) lines: Vec<String>,
    pub(crate) exit_code: i32,
}

impl Report {
    pub(crate) fn ok() -> Self {
        Self {
            lines: vec!["RESULT:OK".to_string()],
            exit_code: 0,
        }
    }

    pub(crate) fn failed(code: &str, message: &str) -> Self {
        Self {
            lines: vec![
                "RESULT:ERROR".to_string(),
                format!("ERROR_CODE:{}", code),
                crate::error_map::json_line("ERROR_MSG_JSON", &message),
            ],
            exit_code: 1,
        }
    }

    pub(crate) fn push(&mut self, line: impl Into<String>) {
        self.lines.push(line.into());
    }

    pub(crate) fn emit(&self) -> i32 {
        for line in &self.lines {
            println!("{}", line);
        }
        self.exit_code
    }
}

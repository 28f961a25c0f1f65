use chrono::{
    DateTime, Datelike, FixedOffset, Local, NaiveDate, NaiveDateTime, NaiveTime, Offset,
    SecondsFormat, TimeZone, Timelike, Utc,
};
use rhai::{Engine, EvalAltResult, ImmutableString, INT};

use super::runtime_error;

const MONTH_NAMES: [&str; 12] = [
    "January",
    "February",
    "March",
    "April",
    "May",
    "June",
    "July",
    "August",
    "September",
    "October",
    "November",
    "December",
];

const MAX_YEAR_DIGITS: usize = 6;

const WEEKDAY_NAMES: [&str; 7] = [
    "Monday",
    "Tuesday",
    "Wednesday",
    "Thursday",
    "Friday",
    "Saturday",
    "Sunday",
];

/// A point in time with a fixed UTC offset.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DateValue(pub DateTime<FixedOffset>);

impl DateValue {
    pub fn to_iso(&self) -> String {
        self.0.to_rfc3339_opts(SecondsFormat::Millis, true)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Field {
    Year,
    Month,
    Day,
    Hour24,
    Hour12,
    Minute,
    Second,
    Millis,
    Weekday,
    Meridiem,
}

impl Field {
    fn from_letter(letter: char) -> Option<Self> {
        Some(match letter {
            'y' => Field::Year,
            'M' => Field::Month,
            'd' => Field::Day,
            'H' => Field::Hour24,
            'h' => Field::Hour12,
            'm' => Field::Minute,
            's' => Field::Second,
            'S' => Field::Millis,
            'E' => Field::Weekday,
            'a' => Field::Meridiem,
            _ => return None,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Token {
    Field(Field, usize),
    Literal(String),
}

/// A compiled date pattern such as `yyyy-MM-dd HH:mm:ss`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DateFormat {
    pattern: String,
    tokens: Vec<Token>,
}

impl DateFormat {
    pub fn new(pattern: &str) -> Result<Self, String> {
        let mut tokens = Vec::new();
        let chars = pattern.chars().collect::<Vec<_>>();
        let mut index = 0;
        while index < chars.len() {
            let current = chars[index];
            if current == '\'' {
                if chars.get(index + 1) == Some(&'\'') {
                    push_literal(&mut tokens, "'");
                    index += 2;
                    continue;
                }
                let start = index + 1;
                let mut end = start;
                while end < chars.len() && chars[end] != '\'' {
                    end += 1;
                }
                if end == chars.len() {
                    return Err(format!("Unterminated quote in date pattern \"{}\"", pattern));
                }
                let literal = chars[start..end].iter().collect::<String>();
                push_literal(&mut tokens, &literal);
                index = end + 1;
                continue;
            }
            if let Some(field) = Field::from_letter(current) {
                let mut width = 1;
                while chars.get(index + width) == Some(&current) {
                    width += 1;
                }
                tokens.push(Token::Field(field, width));
                index += width;
                continue;
            }
            if current.is_ascii_alphabetic() {
                return Err(format!(
                    "Unsupported letter '{}' in date pattern \"{}\"",
                    current, pattern
                ));
            }
            push_literal(&mut tokens, &current.to_string());
            index += 1;
        }
        Ok(Self {
            pattern: pattern.to_string(),
            tokens,
        })
    }

    pub fn pattern(&self) -> &str {
        &self.pattern
    }

    pub fn format(&self, date: &DateValue) -> String {
        let value = &date.0;
        let mut out = String::new();
        for token in &self.tokens {
            match token {
                Token::Literal(text) => out.push_str(text),
                Token::Field(field, width) => {
                    let width = *width;
                    match field {
                        Field::Year if width == 2 => {
                            out.push_str(&format!("{:02}", value.year().rem_euclid(100)))
                        }
                        Field::Year if value.year() < 0 => {
                            out.push_str(&format!("-{:04}", value.year().unsigned_abs()))
                        }
                        Field::Year => out.push_str(&format!("{:04}", value.year())),
                        Field::Month if width >= 4 => {
                            out.push_str(MONTH_NAMES[value.month0() as usize])
                        }
                        Field::Month if width == 3 => {
                            out.push_str(&MONTH_NAMES[value.month0() as usize][..3])
                        }
                        Field::Month => push_number(&mut out, value.month(), width),
                        Field::Day => push_number(&mut out, value.day(), width),
                        Field::Hour24 => push_number(&mut out, value.hour(), width),
                        Field::Hour12 => {
                            let hour = match value.hour() % 12 {
                                0 => 12,
                                hour => hour,
                            };
                            push_number(&mut out, hour, width)
                        }
                        Field::Minute => push_number(&mut out, value.minute(), width),
                        Field::Second => push_number(&mut out, value.second(), width),
                        Field::Millis => out.push_str(&format!(
                            "{:03}",
                            value.timestamp_subsec_millis().min(999)
                        )),
                        Field::Weekday => {
                            let name =
                                WEEKDAY_NAMES[value.weekday().num_days_from_monday() as usize];
                            out.push_str(if width >= 4 { name } else { &name[..3] })
                        }
                        Field::Meridiem => {
                            out.push_str(if value.hour() < 12 { "AM" } else { "PM" })
                        }
                    }
                }
            }
        }
        out
    }

    /// Parses `text` as UTC; missing fields default to 1970-01-01 00:00:00.
    pub fn parse(&self, text: &str) -> Result<DateValue, String> {
        let mut cursor = Cursor { text, position: 0 };
        let mut parts = Parts::default();
        for (index, token) in self.tokens.iter().enumerate() {
            match token {
                Token::Literal(literal) => {
                    if !cursor.rest().starts_with(literal.as_str()) {
                        return Err(self.mismatch(text));
                    }
                    cursor.position += literal.len();
                }
                Token::Field(field, width) => {
                    let width = *width;
                    match field {
                        Field::Year if width == 2 => {
                            let short = cursor.digits(2, 2).ok_or_else(|| self.mismatch(text))?;
                            parts.year = two_digit_year(short, Utc::now().year());
                        }
                        Field::Year => {
                            // Abutting numeric fields need a fixed width to split.
                            let abutting = matches!(self.tokens.get(index + 1), Some(Token::Field(..)));
                            let (min, max) = if abutting { (width, width) } else { (1, MAX_YEAR_DIGITS) };
                            let negative = cursor.sign();
                            let year = cursor.digits(min, max).ok_or_else(|| self.mismatch(text))?;
                            parts.year = if negative { -year } else { year };
                        }
                        Field::Month if width >= 3 => {
                            let month = cursor
                                .name(&MONTH_NAMES, width >= 4)
                                .ok_or_else(|| self.mismatch(text))?;
                            parts.month = month as u32 + 1;
                        }
                        Field::Month => parts.month = self.number(&mut cursor, width, text)?,
                        Field::Day => parts.day = self.number(&mut cursor, width, text)?,
                        Field::Hour24 => parts.hour = self.number(&mut cursor, width, text)?,
                        Field::Hour12 => {
                            parts.hour = self.number(&mut cursor, width, text)? % 12;
                            parts.twelve_hour = true;
                        }
                        Field::Minute => parts.minute = self.number(&mut cursor, width, text)?,
                        Field::Second => parts.second = self.number(&mut cursor, width, text)?,
                        Field::Millis => {
                            parts.millis =
                                cursor.digits(3, 3).ok_or_else(|| self.mismatch(text))? as u32;
                        }
                        Field::Weekday => {
                            cursor
                                .name(&WEEKDAY_NAMES, width >= 4)
                                .ok_or_else(|| self.mismatch(text))?;
                        }
                        Field::Meridiem => {
                            let marker = cursor
                                .name(&["AM", "PM"], true)
                                .ok_or_else(|| self.mismatch(text))?;
                            parts.afternoon = marker == 1;
                        }
                    }
                }
            }
        }
        if !cursor.rest().is_empty() {
            return Err(self.mismatch(text));
        }
        parts.build().ok_or_else(|| {
            format!(
                "Date \"{}\" is out of range for pattern \"{}\"",
                text, self.pattern
            )
        })
    }

    fn number(&self, cursor: &mut Cursor, width: usize, text: &str) -> Result<u32, String> {
        let (min, max) = if width == 1 { (1, 2) } else { (width, width) };
        cursor
            .digits(min, max)
            .map(|value| value as u32)
            .ok_or_else(|| self.mismatch(text))
    }

    fn mismatch(&self, text: &str) -> String {
        format!(
            "Date \"{}\" does not match pattern \"{}\"",
            text, self.pattern
        )
    }
}

fn push_literal(tokens: &mut Vec<Token>, text: &str) {
    if let Some(Token::Literal(existing)) = tokens.last_mut() {
        existing.push_str(text);
    } else {
        tokens.push(Token::Literal(text.to_string()));
    }
}

fn push_number(out: &mut String, value: u32, width: usize) {
    if width >= 2 {
        out.push_str(&format!("{:0width$}", value, width = width));
    } else {
        out.push_str(&value.to_string());
    }
}

struct Cursor<'a> {
    text: &'a str,
    position: usize,
}

impl Cursor<'_> {
    fn rest(&self) -> &str {
        &self.text[self.position..]
    }

    fn digits(&mut self, min: usize, max: usize) -> Option<i32> {
        let count = self
            .rest()
            .bytes()
            .take(max)
            .take_while(u8::is_ascii_digit)
            .count();
        if count < min {
            return None;
        }
        let value = self.rest()[..count].parse().ok()?;
        self.position += count;
        Some(value)
    }

    /// Consumes a leading `+` or `-`; true when negative.
    fn sign(&mut self) -> bool {
        match self.rest().as_bytes().first() {
            Some(b'-') => {
                self.position += 1;
                true
            }
            Some(b'+') => {
                self.position += 1;
                false
            }
            _ => false,
        }
    }

    /// Index of the name that matches next, full names or three-letter forms.
    fn name(&mut self, names: &[&str], full: bool) -> Option<usize> {
        let rest = self.rest().to_ascii_lowercase();
        names.iter().enumerate().find_map(|(index, name)| {
            let candidate = if full { *name } else { &name[..3] };
            if rest.starts_with(&candidate.to_ascii_lowercase()) {
                self.position += candidate.len();
                Some(index)
            } else {
                None
            }
        })
    }
}

/// Places a two-digit year in the century window starting 80 years before
/// `current`.
fn two_digit_year(short: i32, current: i32) -> i32 {
    let year = current - current.rem_euclid(100) + short;
    if year >= current + 20 {
        year - 100
    } else if year < current - 80 {
        year + 100
    } else {
        year
    }
}

struct Parts {
    year: i32,
    month: u32,
    day: u32,
    hour: u32,
    minute: u32,
    second: u32,
    millis: u32,
    twelve_hour: bool,
    afternoon: bool,
}

impl Default for Parts {
    fn default() -> Self {
        Self {
            year: 1970,
            month: 1,
            day: 1,
            hour: 0,
            minute: 0,
            second: 0,
            millis: 0,
            twelve_hour: false,
            afternoon: false,
        }
    }
}

impl Parts {
    fn build(&self) -> Option<DateValue> {
        let hour = if self.twelve_hour && self.afternoon {
            self.hour + 12
        } else {
            self.hour
        };
        let date = NaiveDate::from_ymd_opt(self.year, self.month, self.day)?;
        let time = NaiveTime::from_hms_milli_opt(hour, self.minute, self.second, self.millis)?;
        Some(at_utc(date.and_time(time)))
    }
}

fn at_utc(naive: NaiveDateTime) -> DateValue {
    DateValue(Utc.fix().from_utc_datetime(&naive))
}

pub fn parse_iso_date(text: &str) -> Result<DateValue, String> {
    let text = text.trim();
    if let Ok(value) = DateTime::parse_from_rfc3339(text) {
        return Ok(DateValue(value));
    }
    for pattern in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(text, pattern) {
            return Ok(at_utc(naive));
        }
    }
    NaiveDate::parse_from_str(text, "%Y-%m-%d")
        .map(|date| at_utc(date.and_time(NaiveTime::MIN)))
        .map_err(|_| format!("parseIsoDate: \"{}\" is not an ISO-8601 date", text))
}

fn now() -> DateValue {
    let local = Local::now();
    DateValue(local.with_timezone(local.offset()))
}

fn now_utc() -> DateValue {
    DateValue(Utc::now().with_timezone(&Utc.fix()))
}

fn now_zoned(offset_minutes: INT) -> Result<DateValue, Box<EvalAltResult>> {
    let offset = i32::try_from(offset_minutes.saturating_mul(60))
        .ok()
        .and_then(FixedOffset::east_opt)
        .ok_or_else(|| runtime_error(format!("nowZoned: invalid offset {} minutes", offset_minutes)))?;
    Ok(DateValue(Utc::now().with_timezone(&offset)))
}

fn from_epoch_seconds(seconds: INT) -> Result<DateValue, Box<EvalAltResult>> {
    Utc.timestamp_opt(seconds, 0)
        .single()
        .map(|value| DateValue(value.with_timezone(&Utc.fix())))
        .ok_or_else(|| runtime_error(format!("fromEpochSeconds: {} is out of range", seconds)))
}

pub(super) fn register(engine: &mut Engine) {
    engine
        .register_type_with_name::<DateValue>("Date")
        .register_fn("to_string", |date: &mut DateValue| date.to_iso())
        .register_fn("to_debug", |date: &mut DateValue| date.to_iso())
        .register_fn("toISOString", |date: DateValue| date.to_iso())
        .register_fn("==", |a: DateValue, b: DateValue| a == b)
        .register_fn("<", |a: DateValue, b: DateValue| a.0 < b.0)
        .register_fn(">", |a: DateValue, b: DateValue| a.0 > b.0);

    engine
        .register_type_with_name::<DateFormat>("DateFormat")
        .register_fn(
            "DateFormat",
            |pattern: ImmutableString| -> Result<DateFormat, Box<EvalAltResult>> {
                DateFormat::new(&pattern).map_err(runtime_error)
            },
        )
        .register_fn("format", |format: DateFormat, date: DateValue| {
            format.format(&date)
        })
        .register_fn(
            "parse",
            |format: DateFormat, text: ImmutableString| -> Result<DateValue, Box<EvalAltResult>> {
                format.parse(&text).map_err(runtime_error)
            },
        )
        .register_fn("to_string", |format: &mut DateFormat| {
            format.pattern().to_string()
        });

    engine
        .register_fn("now", now)
        .register_fn("nowUtc", now_utc)
        .register_fn("nowZoned", now_zoned)
        .register_fn("toEpochSeconds", |date: DateValue| date.0.timestamp() as INT)
        .register_fn("fromEpochSeconds", from_epoch_seconds)
        .register_fn(
            "parseIsoDate",
            |text: ImmutableString| -> Result<DateValue, Box<EvalAltResult>> {
                parse_iso_date(&text).map_err(runtime_error)
            },
        );

    engine
        .register_fn("year", |date: DateValue| date.0.year() as INT)
        .register_fn("month", |date: DateValue| date.0.month() as INT)
        .register_fn("day", |date: DateValue| date.0.day() as INT)
        .register_fn("hour", |date: DateValue| date.0.hour() as INT)
        .register_fn("minute", |date: DateValue| date.0.minute() as INT)
        .register_fn("second", |date: DateValue| date.0.second() as INT)
        .register_fn("millisecond", |date: DateValue| {
            date.0.timestamp_subsec_millis().min(999) as INT
        })
        .register_fn("dayOfWeek", |date: DateValue| {
            date.0.weekday().number_from_monday() as INT
        });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shims::test_support::{eval, eval_error, eval_text};

    #[test]
    fn pattern_round_trips_date_time_text() {
        let format = DateFormat::new("yyyy-MM-dd HH:mm:ss").expect("pattern");
        let date = format.parse("2024-02-29 13:05:09").expect("parse");
        assert_eq!(format.format(&date), "2024-02-29 13:05:09");
        assert_eq!(date.to_iso(), "2024-02-29T13:05:09.000Z");
    }

    #[test]
    fn named_fields_and_literals() {
        let format = DateFormat::new("EEE, d MMM yy 'at' hh:mm a").expect("pattern");
        let date = parse_iso_date("2023-07-04T18:30:00Z").expect("iso");
        let text = format.format(&date);
        assert_eq!(text, "Tue, 4 Jul 23 at 06:30 PM");
        assert_eq!(format.parse(&text).expect("parse back"), date);

        let long = DateFormat::new("MMMM d, yyyy").expect("pattern");
        assert_eq!(long.format(&date), "July 4, 2023");
    }

    #[test]
    fn unsupported_letters_and_mismatches_are_errors() {
        assert!(DateFormat::new("yyyy-QQ").is_err());
        assert!(DateFormat::new("'open").is_err());
        let format = DateFormat::new("yyyy-MM-dd").expect("pattern");
        assert!(format.parse("2024/01/01").is_err());
        assert!(format.parse("2024-02-30").is_err());
        assert!(format.parse("2024-01-01 extra").is_err());
    }

    #[test]
    fn two_digit_years_use_a_sliding_century() {
        assert_eq!(two_digit_year(85, 2026), 1985);
        assert_eq!(two_digit_year(23, 2026), 2023);
        assert_eq!(two_digit_year(45, 2026), 2045);
        assert_eq!(two_digit_year(46, 2026), 1946);

        let format = DateFormat::new("yy-MM-dd").expect("pattern");
        let date = parse_iso_date("1985-06-01").expect("iso");
        assert_eq!(format.format(&date), "85-06-01");
        assert_eq!(format.parse("85-06-01").expect("parse back"), date);
    }

    #[test]
    fn full_years_outside_four_digits_round_trip() {
        let format = DateFormat::new("yyyy-MM-dd").expect("pattern");
        for (year, text) in [(12345, "12345-01-02"), (-44, "-0044-01-02"), (7, "0007-01-02")] {
            let date = at_utc(
                NaiveDate::from_ymd_opt(year, 1, 2)
                    .expect("date")
                    .and_time(NaiveTime::MIN),
            );
            assert_eq!(format.format(&date), text);
            assert_eq!(format.parse(text).expect("parse back"), date);
        }

        let compact = DateFormat::new("yyyyMMdd").expect("pattern");
        assert_eq!(
            compact.parse("20240115").expect("compact").to_iso(),
            "2024-01-15T00:00:00.000Z"
        );
    }

    #[test]
    fn iso_parsing_accepts_offsets_and_plain_dates() {
        let zoned = parse_iso_date("2024-05-01T10:00:00+02:00").expect("rfc3339");
        assert_eq!(zoned.0.timestamp(), 1714550400);
        let plain = parse_iso_date("2024-05-01").expect("date");
        assert_eq!(plain.to_iso(), "2024-05-01T00:00:00.000Z");
    }

    #[test]
    fn script_bindings_expose_formatter_and_getters() {
        let text = eval_text(
            r#"let f = DateFormat("yyyy-MM-dd HH:mm:ss");
               let d = f.parse("2024-01-15 08:09:10");
               f.format(d) + "|" + d.year() + "|" + d.dayOfWeek() + "|" + toEpochSeconds(d)"#,
        );
        assert_eq!(text, "2024-01-15 08:09:10|2024|1|1705306150");
        assert_eq!(
            eval_text("fromEpochSeconds(0).toISOString()"),
            "1970-01-01T00:00:00.000Z"
        );
        assert!(eval("nowUtc().year() >= 2024").as_bool().unwrap_or(false));
        assert!(eval_error(r#"DateFormat("yyyy").parse("abcd")"#).contains("does not match"));
    }
}

//! Formatting helpers shared by the card renderers and the grouping engine.
//!
//! Everything here is a pure function of its input.

use std::sync::OnceLock;

use numfmt::{Formatter, Precision};
use time::{
    Date, Month, PrimitiveDateTime, Time, format_description::BorrowedFormatItem,
    macros::format_description,
};
use unicode_segmentation::UnicodeSegmentation;

use crate::record::Relation;

/// The currency every amount is displayed in.
pub const CURRENCY_CODE: &str = "ETB";

const DATE_FORMAT: &[BorrowedFormatItem] = format_description!("[year]-[month]-[day]");
const TIME_FORMAT: &[BorrowedFormatItem] = format_description!("[hour]:[minute]:[second]");
const DATE_TIME_DISPLAY_FORMAT: &[BorrowedFormatItem] = format_description!(
    "[month repr:short] [day padding:none], [hour repr:12 padding:none]:[minute] [period]"
);
const MONTH_DISPLAY_FORMAT: &[BorrowedFormatItem] =
    format_description!("[month repr:long] [year]");
const DAY_DISPLAY_FORMAT: &[BorrowedFormatItem] =
    format_description!("[month repr:long] [day padding:none], [year]");

/// Remove every parenthesised span, e.g. "ACME (VIP)" becomes "ACME".
///
/// Whitespace is collapsed and trimmed afterwards. An unmatched opening
/// parenthesis is left as is.
pub fn strip_parenthetical(value: &str) -> String {
    let mut stripped = String::with_capacity(value.len());
    let mut rest = value;

    while let Some(open) = rest.find('(') {
        let Some(close) = rest[open..].find(')') else {
            break;
        };

        stripped.push_str(&rest[..open]);
        stripped.push(' ');
        rest = &rest[open + close + 1..];
    }

    stripped.push_str(rest);
    collapse_whitespace(&stripped)
}

/// Title-case each word of `value`.
///
/// Words containing a period are upper-cased ("p.l.c" -> "P.L.C") and short
/// all-caps words are kept ("PLC", "OBI").
pub fn to_title_case(value: &str) -> String {
    value
        .split_whitespace()
        .map(|word| {
            if word.contains('.') {
                word.to_uppercase()
            } else if word.chars().count() <= 3 && word == word.to_uppercase() {
                word.to_owned()
            } else {
                capitalize(&word.to_lowercase())
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

fn capitalize(word: &str) -> String {
    let mut graphemes = word.graphemes(true);

    match graphemes.next() {
        Some(first) => format!("{}{}", first.to_uppercase(), graphemes.as_str()),
        None => String::new(),
    }
}

/// The display form of a person or company name.
pub fn format_name_display(value: &str) -> String {
    to_title_case(&strip_parenthetical(value))
}

/// The display form of a relational field, "Unknown" if it is empty.
pub fn format_relation(relation: Relation<'_>) -> String {
    match relation {
        Relation::Pair { name, .. } | Relation::Name(name) => format_name_display(name),
        Relation::Absent => format_name_display("Unknown"),
    }
}

/// Options for [format_currency].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CurrencyOptions {
    /// Keep the minus sign of negative amounts.
    pub preserve_sign: bool,
}

impl CurrencyOptions {
    /// Options that keep the sign of negative amounts.
    pub fn signed() -> Self {
        Self {
            preserve_sign: true,
        }
    }
}

/// Format `amount` as currency, e.g. "1,234.50 ETB".
///
/// The absolute value is shown unless `options.preserve_sign` is set.
pub fn format_currency(amount: f64, options: CurrencyOptions) -> String {
    let formatted = format_number(amount.abs());

    if options.preserve_sign && amount < 0.0 {
        format!("-{formatted} {CURRENCY_CODE}")
    } else {
        format!("{formatted} {CURRENCY_CODE}")
    }
}

/// Format a non-negative number with thousands separators and two decimals.
pub fn format_number(number: f64) -> String {
    static FMT: OnceLock<Formatter> = OnceLock::new();

    let fmt = FMT.get_or_init(|| {
        Formatter::currency("")
            .unwrap()
            .precision(Precision::Decimals(2))
    });

    if number == 0.0 || !number.is_finite() {
        // Zero is hardcoded as "0" by numfmt
        return "0.00".to_owned();
    }

    pad_decimals(fmt.fmt_string(number), 2)
}

/// Format the integer part of `number` with thousands separators, e.g. "12,500".
pub fn format_whole_number(number: f64) -> String {
    static FMT: OnceLock<Formatter> = OnceLock::new();

    let fmt = FMT.get_or_init(|| {
        Formatter::currency("")
            .unwrap()
            .precision(Precision::Decimals(0))
    });

    let number = number.floor();

    if number == 0.0 || !number.is_finite() {
        return "0".to_owned();
    }

    let formatted = fmt.fmt_string(number.abs());
    let integer_part = formatted.split('.').next().unwrap_or_default();

    if number < 0.0 {
        format!("-{integer_part}")
    } else {
        integer_part.to_owned()
    }
}

// numfmt drops trailing zeros, e.g. "12.30" is rendered as "12.3".
fn pad_decimals(mut formatted: String, decimals: usize) -> String {
    let existing = match formatted.rsplit_once('.') {
        Some((_, fraction)) => fraction.len(),
        None => {
            formatted.push('.');
            0
        }
    };

    for _ in existing..decimals {
        formatted.push('0');
    }

    formatted
}

/// The label for a warehouse, e.g. "Top 3 Main Store (Bole)" becomes "TOP 3".
///
/// Warehouses without a "TOP <n>" code fall back to [format_name_display].
pub fn format_warehouse_display(value: &str) -> String {
    let cleaned = strip_parenthetical(value);

    match find_top_code(&cleaned) {
        Some(code) => code.to_uppercase(),
        None => format_name_display(&cleaned),
    }
}

/// Find the first "TOP <digits>" word, ignoring case.
fn find_top_code(text: &str) -> Option<&str> {
    for (start, _) in text.char_indices() {
        let starts_with_top = text[start..]
            .get(..3)
            .is_some_and(|prefix| prefix.eq_ignore_ascii_case("top"));

        if !starts_with_top || text[..start].chars().next_back().is_some_and(is_word_char) {
            continue;
        }

        let after_top = &text[start + 3..];
        let digits_start = start + 3 + (after_top.len() - after_top.trim_start().len());
        let digit_count = text[digits_start..]
            .bytes()
            .take_while(u8::is_ascii_digit)
            .count();
        let end = digits_start + digit_count;

        if digit_count == 0 || text[end..].chars().next().is_some_and(is_word_char) {
            continue;
        }

        return Some(&text[start..end]);
    }

    None
}

/// Abbreviate a bank journal name to its initials.
///
/// "Commercial Bank of Ethiopia 1000178884787 (ETB)" becomes "CBOE". The
/// currency code and account numbers are ignored.
pub fn abbreviate_bank_name(value: &str) -> String {
    let without_currency = remove_word(&strip_parenthetical(value), CURRENCY_CODE);
    let without_digits: String = without_currency
        .chars()
        .filter(|c| !c.is_ascii_digit())
        .collect();

    collapse_whitespace(&without_digits)
        .split(' ')
        .filter_map(|word| word.graphemes(true).next())
        .collect::<String>()
        .to_uppercase()
}

/// Remove every whole-word, case-insensitive occurrence of the ASCII `word`.
fn remove_word(text: &str, word: &str) -> String {
    let mut output = String::with_capacity(text.len());
    let mut kept_from = 0;
    let mut index = 0;

    while index < text.len() {
        let is_match = text[index..]
            .get(..word.len())
            .is_some_and(|candidate| candidate.eq_ignore_ascii_case(word))
            && !text[..index].chars().next_back().is_some_and(is_word_char)
            && !text[index + word.len()..]
                .chars()
                .next()
                .is_some_and(is_word_char);

        if is_match {
            output.push_str(&text[kept_from..index]);
            index += word.len();
            kept_from = index;
        } else {
            index += text[index..].chars().next().map_or(1, char::len_utf8);
        }
    }

    output.push_str(&text[kept_from..]);
    output
}

fn is_word_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_'
}

fn collapse_whitespace(value: &str) -> String {
    value.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Parse the date strings the upstream produces.
///
/// Accepts "YYYY-MM-DD", "YYYY-MM-DD HH:MM:SS" and "YYYY-MM-DDTHH:MM:SS",
/// ignoring fractional seconds or a zone suffix. Date-only strings are
/// placed at midnight.
pub fn parse_date_time(raw: &str) -> Option<PrimitiveDateTime> {
    let raw = raw.trim();
    let date = Date::parse(raw.get(..10)?, DATE_FORMAT).ok()?;
    let rest = &raw[10..];

    if rest.is_empty() {
        return Some(date.midnight());
    }

    let rest = rest.strip_prefix(' ').or_else(|| rest.strip_prefix('T'))?;
    let time = Time::parse(rest.get(..8)?, TIME_FORMAT).ok()?;

    Some(PrimitiveDateTime::new(date, time))
}

/// Parse a "YYYY-MM" key into the first day of that month.
fn parse_year_month(key: &str) -> Option<Date> {
    let (year, month) = key.split_once('-')?;

    if year.len() != 4 || month.len() != 2 {
        return None;
    }

    let month = Month::try_from(month.parse::<u8>().ok()?).ok()?;

    Date::from_calendar_date(year.parse().ok()?, month, 1).ok()
}

/// The "YYYY-MM" key for a raw date string, if it can be parsed.
pub fn year_month_key(raw: &str) -> Option<String> {
    let date = parse_date_time(raw)?.date();

    Some(format!("{:04}-{:02}", date.year(), u8::from(date.month())))
}

/// The header text for a group of records sharing a date key.
///
/// A "YYYY-MM" key becomes "JANUARY 2024", a day becomes "JANUARY 5, 2024".
/// Returns `None` for an empty key; keys that are not dates are upper-cased.
pub fn format_group_date(key: &str) -> Option<String> {
    if key.is_empty() {
        return None;
    }

    let formatted = if key.chars().count() == 7 {
        parse_year_month(key).and_then(|date| date.format(MONTH_DISPLAY_FORMAT).ok())
    } else {
        parse_date_time(key).and_then(|date_time| date_time.date().format(DAY_DISPLAY_FORMAT).ok())
    };

    Some(formatted.unwrap_or_else(|| key.to_owned()).to_uppercase())
}

/// The date-time format used on every card, e.g. "Feb 4, 8:55 AM".
///
/// Empty input gives an empty string and unparseable input is shown as is.
pub fn format_date_time(raw: &str) -> String {
    if raw.is_empty() {
        return String::new();
    }

    parse_date_time(raw)
        .and_then(|date_time| date_time.format(DATE_TIME_DISPLAY_FORMAT).ok())
        .unwrap_or_else(|| raw.to_owned())
}

/// The date shown in the page header, e.g. "OCTOBER 15, 2026".
pub fn format_long_date(date: Date) -> String {
    date.format(DAY_DISPLAY_FORMAT)
        .unwrap_or_else(|_| date.to_string())
        .to_uppercase()
}

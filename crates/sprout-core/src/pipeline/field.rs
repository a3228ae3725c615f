//! Typed field lookup over loosely keyed generator items.
//!
//! Generators name the same field differently from one request to the
//! next. A [`FieldResolver`] lists the accepted key paths in priority order
//! and returns the first one present.

use serde_json::Value;

/// An ordered list of key paths tried in sequence.
///
/// Each path descends through nested objects: `&["nutrition", "calories"]`
/// reads `item.nutrition.calories`. A path is present when every key exists
/// and the final value is not `null`.
#[derive(Debug, Clone, Copy)]
pub struct FieldResolver {
    paths: &'static [&'static [&'static str]],
}

impl FieldResolver {
    pub const fn new(paths: &'static [&'static [&'static str]]) -> Self {
        Self { paths }
    }

    /// First present, non-null value.
    pub fn resolve<'v>(&self, item: &'v Value) -> Option<&'v Value> {
        self.paths.iter().find_map(|path| lookup(item, path))
    }

    /// First present value as a [`RawNumber`], then coerced.
    ///
    /// The first present value wins even when it does not coerce: a nested
    /// `"N/A"` yields `None` rather than falling through to a later path.
    pub fn number(&self, item: &Value) -> Option<f64> {
        RawNumber::from_value(self.resolve(item)).coerce()
    }

    /// First path whose value renders to non-empty text.
    ///
    /// Unlike [`FieldResolver::number`], blank strings count as missing so
    /// an empty `meal_type` falls through to the next source.
    pub fn text(&self, item: &Value) -> Option<String> {
        self.paths
            .iter()
            .filter_map(|path| lookup(item, path))
            .find_map(render_text)
    }
}

fn lookup<'v>(item: &'v Value, path: &[&str]) -> Option<&'v Value> {
    let mut current = item;
    for key in path {
        current = current.get(*key)?;
    }
    (!current.is_null()).then_some(current)
}

/// Scalar as trimmed text; `None` for blanks, containers, and null.
pub fn render_text(value: &Value) -> Option<String> {
    let text = match value {
        Value::String(s) => s.trim().to_string(),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Null | Value::Array(_) | Value::Object(_) => return None,
    };
    (!text.is_empty()).then_some(text)
}

/// A numeric field as it arrived from the generator.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum RawNumber<'a> {
    Number(f64),
    Text(&'a str),
    Absent,
}

impl<'a> RawNumber<'a> {
    /// Classify a looked-up value. Booleans and containers count as absent.
    pub fn from_value(value: Option<&'a Value>) -> Self {
        match value {
            Some(Value::Number(n)) => n.as_f64().map_or(Self::Absent, Self::Number),
            Some(Value::String(s)) => Self::Text(s),
            _ => Self::Absent,
        }
    }

    /// Finite number or `None`. Never zero for unparseable text.
    pub fn coerce(self) -> Option<f64> {
        match self {
            Self::Number(n) => n.is_finite().then_some(n),
            Self::Text(text) => coerce_number(text),
            Self::Absent => None,
        }
    }
}

/// Parse decorated numeric text such as `"650 kcal"` or `"1,200"`.
///
/// Every character other than ASCII digits, `.` and `-` is stripped before
/// parsing, so `"12g"` is 12 and `"N/A"` is `None`.
pub fn coerce_number(text: &str) -> Option<f64> {
    let cleaned: String = text
        .chars()
        .filter(|c| c.is_ascii_digit() || *c == '.' || *c == '-')
        .collect();
    cleaned.parse::<f64>().ok().filter(|n| n.is_finite())
}

// ai
//! 🎨 format — placeholders in, sentence out.
//!
//! 🎬 *[three fields walk into a template. `{Field1}-{Field2}+{Field3}`, it says.]*
//! *[they each take a seat. the template reads them out loud. "1-2+3". applause.]*
//!
//! Placeholders:
//! - `{0}`, `{1}` — positional, into the step's parameters (or the field itself when it has none)
//! - `{Alias}` — any field or process parameter, by alias or name
//! - `{x:spec}` — a numeric (`0.00`, `#,##0`, `N2`, `F1`, `D5`, `C`) or date (`yyyy-MM-dd`)
//!   format specifier. Without one, the referenced field's own `format` attribute applies.
//! - `{{` and `}}` are literal braces.

use chrono::NaiveDateTime;
use chrono::format::{Item, StrftimeItems};
use rust_decimal::{Decimal, RoundingStrategy};

use crate::common::{Row, Value};
use crate::schema::FieldType;
use crate::transforms::{
    Accepts, BuildContext, BuildError, FieldRef, Output, Registration, Returns, Signature,
    Transform, TransformContext, TransformRegistry,
};

pub(crate) fn register(registry: &mut TransformRegistry) {
    registry.register(
        &["format"],
        Registration {
            signature: Signature::Named(&[("format", None)]),
            accepts: Accepts::Any,
            returns: Returns::Fixed(FieldType::String),
            build,
        },
    );
}

#[derive(Debug, Clone, PartialEq)]
enum Segment {
    Literal(String),
    Placeholder { input: usize, spec: Option<ValueFormat> },
}

/// 🎨 A format specifier, pre-parsed both ways; the value's type picks which one applies.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct ValueFormat {
    number: Option<NumberFormat>,
    date: Option<String>,
}

impl ValueFormat {
    pub(crate) fn parse(spec: &str) -> Self {
        Self {
            number: NumberFormat::parse(spec),
            date: date_pattern(spec),
        }
    }

    /// 🖨️ `Err` carries a row-level complaint; the value's plain text is the fallback.
    pub(crate) fn render(&self, value: &Value) -> Result<String, String> {
        Ok(match value {
            Value::DateTime(dt) => match &self.date {
                Some(pattern) => format_date(dt, pattern),
                None => value.to_string(),
            },
            v if v.is_numeric() => match (&self.number, v.as_decimal()) {
                (Some(number), Some(decimal)) => number
                    .render(decimal)
                    .ok_or_else(|| format!("{decimal} is too large to show as a percentage"))?,
                _ => value.to_string(),
            },
            other => other.to_string(),
        })
    }
}

fn build(ctx: &mut BuildContext<'_>) -> Result<Box<dyn Transform>, BuildError> {
    let template = ctx.require("format")?;
    let raw_segments = parse_template(template).map_err(|message| ctx.invalid(message))?;

    let mut inputs: Vec<FieldRef> = Vec::new();
    let mut input_names: Vec<String> = Vec::new();
    let positional = ctx.inputs()?;
    let positional_names: Vec<String> = if ctx.spec.parameters.is_empty() {
        vec![ctx.field.alias.clone()]
    } else {
        ctx.spec.parameters.clone()
    };

    let mut segments = Vec::with_capacity(raw_segments.len());
    for raw in raw_segments {
        match raw {
            RawSegment::Literal(text) => segments.push(Segment::Literal(text)),
            RawSegment::Placeholder { name, spec } => {
                let (field_ref, field_name) = match name.parse::<usize>() {
                    Ok(position) => {
                        let found = positional.get(position).cloned().ok_or_else(|| {
                            ctx.invalid(format!(
                                "placeholder {{{position}}} but only {} input(s)",
                                positional.len()
                            ))
                        })?;
                        (found, positional_names[position].clone())
                    }
                    Err(_) => (ctx.resolve(&name)?, name.clone()),
                };
                let input = match input_names.iter().position(|n| n.eq_ignore_ascii_case(&field_name)) {
                    Some(existing) => existing,
                    None => {
                        inputs.push(field_ref);
                        input_names.push(field_name.clone());
                        inputs.len() - 1
                    }
                };
                // -- 🎨 no explicit spec? borrow the field's own format attribute, if it has one
                let spec = spec.or_else(|| {
                    ctx.entity
                        .field(&field_name)
                        .or_else(|| ctx.process.parameter(&field_name).map(|p| &p.field))
                        .and_then(|f| f.format.clone())
                });
                segments.push(Segment::Placeholder {
                    input,
                    spec: spec.as_deref().map(ValueFormat::parse),
                });
            }
        }
    }

    Ok(Box::new(Format {
        segments,
        inputs,
        output: ctx.output(),
    }))
}

#[derive(Debug)]
struct Format {
    segments: Vec<Segment>,
    inputs: Vec<FieldRef>,
    output: Output,
}

impl Transform for Format {
    fn transform(&mut self, row: &mut Row, ctx: &mut TransformContext<'_>) {
        let mut rendered = String::new();
        for segment in &self.segments {
            match segment {
                Segment::Literal(text) => rendered.push_str(text),
                Segment::Placeholder { input, spec } => {
                    let value = self.inputs[*input].read(row);
                    match spec {
                        Some(spec) => match spec.render(value) {
                            Ok(text) => rendered.push_str(&text),
                            Err(complaint) => {
                                ctx.error(complaint);
                                rendered.push_str(&value.to_string());
                            }
                        },
                        None => rendered.push_str(&value.to_string()),
                    }
                }
            }
        }
        self.output.write(row, Value::String(rendered));
    }
}

#[derive(Debug, PartialEq)]
enum RawSegment {
    Literal(String),
    Placeholder { name: String, spec: Option<String> },
}

fn parse_template(template: &str) -> Result<Vec<RawSegment>, String> {
    let mut segments = Vec::new();
    let mut literal = String::new();
    let mut chars = template.chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            '{' if chars.peek() == Some(&'{') => {
                chars.next();
                literal.push('{');
            }
            '}' if chars.peek() == Some(&'}') => {
                chars.next();
                literal.push('}');
            }
            '{' => {
                let mut inner = String::new();
                let mut closed = false;
                for next in chars.by_ref() {
                    if next == '}' {
                        closed = true;
                        break;
                    }
                    inner.push(next);
                }
                if !closed {
                    return Err(format!("placeholder in '{template}' is never closed"));
                }
                if !literal.is_empty() {
                    segments.push(RawSegment::Literal(std::mem::take(&mut literal)));
                }
                let (name, spec) = match inner.split_once(':') {
                    Some((name, spec)) => (name.trim().to_string(), Some(spec.to_string())),
                    None => (inner.trim().to_string(), None),
                };
                if name.is_empty() {
                    return Err(format!("empty placeholder in '{template}'"));
                }
                segments.push(RawSegment::Placeholder { name, spec });
            }
            '}' => return Err(format!("stray '}}' in '{template}'")),
            other => literal.push(other),
        }
    }
    if !literal.is_empty() {
        segments.push(RawSegment::Literal(literal));
    }
    Ok(segments)
}

// ============================================================
//  🔢 numbers
// ============================================================

#[derive(Debug, Clone, PartialEq)]
struct NumberFormat {
    prefix: String,
    suffix: String,
    min_integer_digits: usize,
    min_fraction_digits: u32,
    max_fraction_digits: u32,
    grouping: bool,
    percent: bool,
}

impl NumberFormat {
    fn parse(spec: &str) -> Option<Self> {
        let spec = spec.trim();
        let mut chars = spec.chars();
        let first = chars.next()?;
        let precision: String = chars.collect();
        if first.is_ascii_alphabetic() && precision.chars().all(|c| c.is_ascii_digit()) {
            return Self::standard(first, precision.parse().ok());
        }
        Self::custom(spec)
    }

    /// 📏 `F2`, `N0`, `D5`, `C`, `P1` — the single-letter family.
    fn standard(letter: char, precision: Option<u32>) -> Option<Self> {
        let plain = |min_int: usize, decimals: u32, grouping: bool| NumberFormat {
            prefix: String::new(),
            suffix: String::new(),
            min_integer_digits: min_int,
            min_fraction_digits: decimals,
            max_fraction_digits: decimals,
            grouping,
            percent: false,
        };
        Some(match letter.to_ascii_uppercase() {
            'F' => plain(1, precision.unwrap_or(2), false),
            'N' => plain(1, precision.unwrap_or(2), true),
            'D' => plain(precision.unwrap_or(1) as usize, 0, false),
            'C' => NumberFormat {
                prefix: "$".to_string(),
                ..plain(1, precision.unwrap_or(2), true)
            },
            'P' => NumberFormat {
                suffix: "%".to_string(),
                percent: true,
                ..plain(1, precision.unwrap_or(2), true)
            },
            _ => return None,
        })
    }

    /// 🧩 `000.00`, `#,##0.##`, `0.0%` — the custom family.
    fn custom(spec: &str) -> Option<Self> {
        let is_pattern = |c: char| matches!(c, '0' | '#' | '.' | ',');
        let start = spec.find(is_pattern)?;
        let end = spec.rfind(is_pattern)? + 1;
        let pattern = &spec[start..end];
        if !pattern.contains(['0', '#']) {
            return None;
        }
        let suffix = &spec[end..];
        let (integer, fraction) = pattern.split_once('.').unwrap_or((pattern, ""));
        Some(NumberFormat {
            prefix: spec[..start].to_string(),
            suffix: suffix.to_string(),
            min_integer_digits: integer.matches('0').count(),
            min_fraction_digits: fraction.matches('0').count() as u32,
            max_fraction_digits: fraction.matches(['0', '#']).count() as u32,
            grouping: integer.contains(','),
            percent: suffix.contains('%'),
        })
    }

    /// `None` when percent scaling overflows.
    fn render(&self, value: Decimal) -> Option<String> {
        let mut value = if self.percent {
            value.checked_mul(Decimal::ONE_HUNDRED)?
        } else {
            value
        };
        value = value.round_dp_with_strategy(self.max_fraction_digits, RoundingStrategy::MidpointAwayFromZero);
        let negative = value.is_sign_negative() && !value.is_zero();
        let mut magnitude = value.abs();
        magnitude.rescale(self.max_fraction_digits);

        let text = magnitude.to_string();
        let (integer, fraction) = text.split_once('.').unwrap_or((&text, ""));

        let mut integer = integer.trim_start_matches('0').to_string();
        while integer.len() < self.min_integer_digits {
            integer.insert(0, '0');
        }
        if self.grouping {
            integer = group_thousands(&integer);
        }

        let mut fraction = fraction.to_string();
        while fraction.len() > self.min_fraction_digits as usize && fraction.ends_with('0') {
            fraction.pop();
        }

        let mut rendered = String::with_capacity(self.prefix.len() + integer.len() + fraction.len() + 4);
        if negative {
            rendered.push('-');
        }
        rendered.push_str(&self.prefix);
        rendered.push_str(&integer);
        if !fraction.is_empty() {
            rendered.push('.');
            rendered.push_str(&fraction);
        }
        rendered.push_str(&self.suffix);
        Some(rendered)
    }
}

fn group_thousands(digits: &str) -> String {
    let mut grouped = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(c);
    }
    grouped
}

// ============================================================
//  📅 dates
// ============================================================

/// 📅 Translate a `yyyy-MM-dd HH:mm:ss` style pattern into a strftime pattern.
/// Returns `None` when the result would not be a valid chrono format.
pub(crate) fn date_pattern(spec: &str) -> Option<String> {
    let standard = match spec {
        "d" => Some("%-m/%-d/%Y"),
        "D" => Some("%A, %B %-d, %Y"),
        "t" => Some("%-I:%M %p"),
        "T" => Some("%-I:%M:%S %p"),
        "g" => Some("%-m/%-d/%Y %-I:%M %p"),
        "G" => Some("%-m/%-d/%Y %-I:%M:%S %p"),
        "s" => Some("%Y-%m-%dT%H:%M:%S"),
        "u" => Some("%Y-%m-%d %H:%M:%SZ"),
        "o" | "O" => Some("%Y-%m-%dT%H:%M:%S%.f"),
        _ => None,
    };
    let pattern = match standard {
        Some(pattern) => pattern.to_string(),
        None => translate_custom_date(spec),
    };
    let valid = !StrftimeItems::new(&pattern).any(|item| matches!(item, Item::Error));
    valid.then_some(pattern)
}

fn translate_custom_date(spec: &str) -> String {
    let chars: Vec<char> = spec.chars().collect();
    let mut pattern = String::with_capacity(spec.len() * 2);
    let mut i = 0;
    while i < chars.len() {
        let c = chars[i];
        if c == '\'' {
            // -- 🔒 quoted literal run
            i += 1;
            while i < chars.len() && chars[i] != '\'' {
                push_literal(&mut pattern, chars[i]);
                i += 1;
            }
            i += 1;
            continue;
        }
        let mut run = 1;
        while i + run < chars.len() && chars[i + run] == c {
            run += 1;
        }
        let token = match (c, run) {
            ('y', 1..=2) => "%y",
            ('y', _) => "%Y",
            ('M', 1) => "%-m",
            ('M', 2) => "%m",
            ('M', 3) => "%b",
            ('M', _) => "%B",
            ('d', 1) => "%-d",
            ('d', 2) => "%d",
            ('d', 3) => "%a",
            ('d', _) => "%A",
            ('H', 1) => "%-H",
            ('H', _) => "%H",
            ('h', 1) => "%-I",
            ('h', _) => "%I",
            ('m', 1) => "%-M",
            ('m', _) => "%M",
            ('s', 1) => "%-S",
            ('s', _) => "%S",
            ('f', 1..=3) => "%3f",
            ('f', 4..=6) => "%6f",
            ('f', _) => "%9f",
            ('t', _) => "%p",
            _ => {
                for _ in 0..run {
                    push_literal(&mut pattern, c);
                }
                i += run;
                continue;
            }
        };
        pattern.push_str(token);
        i += run;
    }
    pattern
}

fn push_literal(pattern: &mut String, c: char) {
    if c == '%' {
        pattern.push_str("%%");
    } else {
        pattern.push(c);
    }
}

fn format_date(dt: &NaiveDateTime, pattern: &str) -> String {
    dt.format_with_items(StrftimeItems::new(pattern)).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{EntitySchema, Field, ProcessSchema, TransformSpec};
    use crate::transforms::test_support::build_step;

    #[test]
    fn the_one_where_numbers_dress_up_for_the_occasion() {
        let render = |spec: &str, value: Decimal| {
            ValueFormat::parse(spec)
                .render(&Value::Decimal(value))
                .unwrap_or_else(|complaint| panic!("{complaint}"))
        };
        assert_eq!(render("000.0000", Decimal::from(3)), "003.0000");
        assert_eq!(render("#,##0.00", Decimal::new(1234567, 1)), "123,456.70");
        assert_eq!(render("0.##", Decimal::new(25, 1)), "2.5");
        assert_eq!(render("N2", Decimal::new(-12345678, 3)), "-12,345.68");
        assert_eq!(render("F1", Decimal::new(25, 2)), "0.3");
        assert_eq!(render("D5", Decimal::from(42)), "00042");
        assert_eq!(render("C", Decimal::new(19999, 2)), "$199.99");
        assert_eq!(render("0%", Decimal::new(5, 1)), "50%");
    }

    #[test]
    fn the_one_where_dates_learn_a_new_dialect() {
        let the_date = chrono::NaiveDate::from_ymd_opt(2013, 9, 3)
            .and_then(|d| d.and_hms_opt(14, 5, 9))
            .expect("valid date");
        let render = |spec: &str| {
            ValueFormat::parse(spec)
                .render(&Value::DateTime(the_date))
                .unwrap_or_else(|complaint| panic!("{complaint}"))
        };
        assert_eq!(render("yyyy-MM-dd"), "2013-09-03");
        assert_eq!(render("MMM d, yyyy HH:mm:ss"), "Sep 3, 2013 14:05:09");
        assert_eq!(render("d"), "9/3/2013");
        assert_eq!(render("'at' h tt"), "at 2 PM");
    }

    #[test]
    fn the_one_where_braces_must_balance() {
        assert!(parse_template("{0").is_err());
        assert!(parse_template("0}").is_err());
        assert_eq!(
            parse_template("{{literal}} {x:00}").expect("valid template"),
            vec![
                RawSegment::Literal("{literal} ".to_string()),
                RawSegment::Placeholder {
                    name: "x".to_string(),
                    spec: Some("00".to_string())
                },
            ]
        );
    }

    #[test]
    fn the_one_where_a_field_brings_its_own_format() -> anyhow::Result<()> {
        let entity = EntitySchema::new(
            "TestData",
            vec![
                Field::new("Field1", FieldType::Int32),
                Field::new("Field2", FieldType::Double).with_format("000.0000"),
                Field::new("Combined", FieldType::String).calculated(),
            ],
        )?;
        let process = ProcessSchema::new("p", vec![entity.clone()]);
        let mut the_step = build_step(
            &process,
            &entity,
            "Combined",
            TransformSpec::new("format")
                .with_parameters(["Field1", "Field2"])
                .with_setting("format", "{0} and {1}"),
            FieldType::Int32,
        )
        .map_err(|e| anyhow::anyhow!("{e}"))?;
        let the_row = the_step.transform(Row::from_values(vec![
            Value::Int32(1),
            Value::Double(3.0),
            Value::Null,
        ]));
        assert_eq!(the_row[2], Value::from("1 and 003.0000"));
        Ok(())
    }

    #[test]
    fn the_one_where_a_huge_percentage_complains_instead_of_panicking() -> anyhow::Result<()> {
        let entity = EntitySchema::new(
            "Ratios",
            vec![
                Field::new("Ratio", FieldType::Decimal),
                Field::new("Shown", FieldType::String).calculated(),
            ],
        )?;
        let process = ProcessSchema::new("p", vec![entity.clone()]);
        let mut the_step = build_step(
            &process,
            &entity,
            "Shown",
            TransformSpec::new("format")
                .with_parameters(["Ratio"])
                .with_setting("format", "{0:P}"),
            FieldType::Decimal,
        )
        .map_err(|e| anyhow::anyhow!("{e}"))?;

        let the_huge: Decimal = "1000000000000000000000000000".parse()?;
        let mut the_rows = Vec::new();
        for ratio in [the_huge, Decimal::new(25, 2), the_huge] {
            the_rows.push(the_step.transform(Row::from_values(vec![Value::Decimal(ratio), Value::Null])));
        }

        assert_eq!(the_rows[0][1], Value::from("1000000000000000000000000000"));
        assert_eq!(the_rows[1][1], Value::from("25.00%"));
        assert_eq!(the_step.diagnostics().errors().len(), 1, "one complaint, however many rows");
        Ok(())
    }
}

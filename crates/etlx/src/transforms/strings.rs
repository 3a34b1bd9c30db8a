//! 🧵 String kinds — trimming, casing, slicing, padding, replacing, encoding, measuring.
//!
//! They all read one value (the first parameter, or the field itself) and treat it as text.

use crate::common::{Row, Value};
use crate::schema::FieldType;
use crate::transforms::{
    Accepts, BuildContext, BuildError, BuildFn, FieldRef, Output, Registration, Returns, Signature,
    Transform, TransformContext, TransformRegistry,
};

pub(crate) fn register(registry: &mut TransformRegistry) {
    let text = |signature: Signature, build: BuildFn| Registration {
        signature,
        accepts: Accepts::Text,
        returns: Returns::Fixed(FieldType::String),
        build,
    };
    registry.register(&["trim"], text(Signature::Named(&[("trim_chars", Some(" "))]), build_trim));
    registry.register(&["trimstart"], text(Signature::Named(&[("trim_chars", Some(" "))]), build_trim_start));
    registry.register(&["trimend"], text(Signature::Named(&[("trim_chars", Some(" "))]), build_trim_end));
    registry.register(&["upper", "toupper"], text(Signature::Named(&[]), build_upper));
    registry.register(&["lower", "tolower"], text(Signature::Named(&[]), build_lower));
    registry.register(&["left"], text(Signature::Named(&[("length", None)]), build_left));
    registry.register(&["right"], text(Signature::Named(&[("length", None)]), build_right));
    registry.register(
        &["padleft"],
        text(
            Signature::Named(&[("total_width", None), ("padding_char", Some(" "))]),
            build_pad_left,
        ),
    );
    registry.register(
        &["padright"],
        text(
            Signature::Named(&[("total_width", None), ("padding_char", Some(" "))]),
            build_pad_right,
        ),
    );
    registry.register(
        &["replace"],
        text(
            Signature::Named(&[("old_value", None), ("new_value", Some(""))]),
            build_replace,
        ),
    );
    registry.register(&["htmlencode"], text(Signature::Named(&[]), build_html_encode));
    registry.register(&["xmlencode"], text(Signature::Named(&[]), build_xml_encode));
    registry.register(
        &["length"],
        Registration {
            signature: Signature::Named(&[]),
            accepts: Accepts::Any,
            returns: Returns::Fixed(FieldType::Int32),
            build: build_length,
        },
    );
    registry.register(
        &["concat"],
        Registration {
            signature: Signature::Fields,
            accepts: Accepts::Any,
            returns: Returns::Fixed(FieldType::String),
            build: build_concat,
        },
    );
}

/// ✂️ What one string kind does to its text.
#[derive(Debug, Clone, PartialEq)]
enum Operation {
    Trim(Vec<char>),
    TrimStart(Vec<char>),
    TrimEnd(Vec<char>),
    Upper,
    Lower,
    Left(usize),
    Right(usize),
    PadLeft(usize, char),
    PadRight(usize, char),
    Replace(String, String),
    HtmlEncode,
    XmlEncode,
}

impl Operation {
    fn apply(&self, text: &str) -> String {
        match self {
            Operation::Trim(chars) => text.trim_matches(chars.as_slice()).to_string(),
            Operation::TrimStart(chars) => text.trim_start_matches(chars.as_slice()).to_string(),
            Operation::TrimEnd(chars) => text.trim_end_matches(chars.as_slice()).to_string(),
            Operation::Upper => text.to_uppercase(),
            Operation::Lower => text.to_lowercase(),
            Operation::Left(length) => text.chars().take(*length).collect(),
            Operation::Right(length) => {
                let count = text.chars().count();
                text.chars().skip(count.saturating_sub(*length)).collect()
            }
            Operation::PadLeft(width, pad) => {
                let count = text.chars().count();
                let mut padded: String = std::iter::repeat_n(*pad, width.saturating_sub(count)).collect();
                padded.push_str(text);
                padded
            }
            Operation::PadRight(width, pad) => {
                let count = text.chars().count();
                let mut padded = text.to_string();
                padded.extend(std::iter::repeat_n(*pad, width.saturating_sub(count)));
                padded
            }
            Operation::Replace(old, new) => text.replace(old.as_str(), new),
            Operation::HtmlEncode => html_encode(text),
            Operation::XmlEncode => xml_encode(text),
        }
    }
}

fn text_step(ctx: &mut BuildContext<'_>, operation: Operation) -> Result<Box<dyn Transform>, BuildError> {
    Ok(Box::new(TextStep {
        input: ctx.single_input()?,
        output: ctx.output(),
        operation,
    }))
}

fn trim_chars(ctx: &BuildContext<'_>) -> Vec<char> {
    match ctx.setting("trim_chars") {
        Some(chars) if !chars.is_empty() => chars.chars().collect(),
        _ => vec![' '],
    }
}

fn padding(ctx: &BuildContext<'_>) -> Result<(usize, char), BuildError> {
    let width = ctx.parse_setting::<usize>("total_width")?;
    let pad = ctx.setting("padding_char").and_then(|p| p.chars().next()).unwrap_or(' ');
    Ok((width, pad))
}

fn build_trim(ctx: &mut BuildContext<'_>) -> Result<Box<dyn Transform>, BuildError> {
    let chars = trim_chars(ctx);
    text_step(ctx, Operation::Trim(chars))
}

fn build_trim_start(ctx: &mut BuildContext<'_>) -> Result<Box<dyn Transform>, BuildError> {
    let chars = trim_chars(ctx);
    text_step(ctx, Operation::TrimStart(chars))
}

fn build_trim_end(ctx: &mut BuildContext<'_>) -> Result<Box<dyn Transform>, BuildError> {
    let chars = trim_chars(ctx);
    text_step(ctx, Operation::TrimEnd(chars))
}

fn build_upper(ctx: &mut BuildContext<'_>) -> Result<Box<dyn Transform>, BuildError> {
    text_step(ctx, Operation::Upper)
}

fn build_lower(ctx: &mut BuildContext<'_>) -> Result<Box<dyn Transform>, BuildError> {
    text_step(ctx, Operation::Lower)
}

fn build_left(ctx: &mut BuildContext<'_>) -> Result<Box<dyn Transform>, BuildError> {
    let length = ctx.parse_setting("length")?;
    text_step(ctx, Operation::Left(length))
}

fn build_right(ctx: &mut BuildContext<'_>) -> Result<Box<dyn Transform>, BuildError> {
    let length = ctx.parse_setting("length")?;
    text_step(ctx, Operation::Right(length))
}

fn build_pad_left(ctx: &mut BuildContext<'_>) -> Result<Box<dyn Transform>, BuildError> {
    let (width, pad) = padding(ctx)?;
    text_step(ctx, Operation::PadLeft(width, pad))
}

fn build_pad_right(ctx: &mut BuildContext<'_>) -> Result<Box<dyn Transform>, BuildError> {
    let (width, pad) = padding(ctx)?;
    text_step(ctx, Operation::PadRight(width, pad))
}

fn build_replace(ctx: &mut BuildContext<'_>) -> Result<Box<dyn Transform>, BuildError> {
    let old = ctx.require("old_value")?.to_string();
    let new = ctx.setting("new_value").unwrap_or_default().to_string();
    text_step(ctx, Operation::Replace(old, new))
}

fn build_html_encode(ctx: &mut BuildContext<'_>) -> Result<Box<dyn Transform>, BuildError> {
    text_step(ctx, Operation::HtmlEncode)
}

fn build_xml_encode(ctx: &mut BuildContext<'_>) -> Result<Box<dyn Transform>, BuildError> {
    text_step(ctx, Operation::XmlEncode)
}

#[derive(Debug)]
struct TextStep {
    input: FieldRef,
    output: Output,
    operation: Operation,
}

impl Transform for TextStep {
    fn transform(&mut self, row: &mut Row, _ctx: &mut TransformContext<'_>) {
        let result = match self.input.read(row) {
            Value::Null => Value::Null,
            value => Value::String(self.operation.apply(&value.to_string())),
        };
        self.output.write(row, result);
    }
}

fn build_length(ctx: &mut BuildContext<'_>) -> Result<Box<dyn Transform>, BuildError> {
    Ok(Box::new(Length {
        input: ctx.single_input()?,
        output: ctx.output(),
    }))
}

#[derive(Debug)]
struct Length {
    input: FieldRef,
    output: Output,
}

impl Transform for Length {
    fn transform(&mut self, row: &mut Row, ctx: &mut TransformContext<'_>) {
        let length = match self.input.read(row) {
            Value::Null => 0,
            Value::List(items) => items.len(),
            value => value.to_string().chars().count(),
        };
        match i32::try_from(length) {
            Ok(length) => self.output.write(row, Value::Int32(length)),
            Err(_) => ctx.error(format!("a length of {length} does not fit in an int32")),
        }
    }
}

// -- 🧷 concat(A, B, C) glues text forms together, `separator` in between (none by default)
fn build_concat(ctx: &mut BuildContext<'_>) -> Result<Box<dyn Transform>, BuildError> {
    let inputs = ctx.inputs()?;
    Ok(Box::new(Concat {
        inputs,
        separator: ctx.setting("separator").unwrap_or_default().to_string(),
        output: ctx.output(),
    }))
}

#[derive(Debug)]
struct Concat {
    inputs: Vec<FieldRef>,
    separator: String,
    output: Output,
}

impl Transform for Concat {
    fn transform(&mut self, row: &mut Row, _ctx: &mut TransformContext<'_>) {
        let glued = self
            .inputs
            .iter()
            .map(|input| input.read(row).to_string())
            .collect::<Vec<_>>()
            .join(&self.separator);
        self.output.write(row, Value::String(glued));
    }
}

/// 🌐 `<`, `>`, `&`, `"` and `'` as entities. Everything else passes.
pub fn html_encode(text: &str) -> String {
    let mut encoded = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '<' => encoded.push_str("&lt;"),
            '>' => encoded.push_str("&gt;"),
            '&' => encoded.push_str("&amp;"),
            '"' => encoded.push_str("&quot;"),
            '\'' => encoded.push_str("&#39;"),
            other => encoded.push(other),
        }
    }
    encoded
}

/// 📄 The five XML entities, and characters XML 1.0 cannot carry at all are dropped.
pub fn xml_encode(text: &str) -> String {
    let mut encoded = String::with_capacity(text.len());
    for c in text.chars().filter(|c| is_legal_xml_char(*c)) {
        match c {
            '<' => encoded.push_str("&lt;"),
            '>' => encoded.push_str("&gt;"),
            '&' => encoded.push_str("&amp;"),
            '"' => encoded.push_str("&quot;"),
            '\'' => encoded.push_str("&apos;"),
            other => encoded.push(other),
        }
    }
    encoded
}

fn is_legal_xml_char(c: char) -> bool {
    matches!(c, '\u{9}' | '\u{A}' | '\u{D}' | '\u{20}'..='\u{D7FF}' | '\u{E000}'..='\u{FFFD}' | '\u{10000}'..='\u{10FFFF}')
}

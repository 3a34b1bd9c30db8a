// ai
//! ✍️ Shorthand transform expressions — `t = "copy(A,B).format({0}-{1}).trim()"`.
//!
//! 🎬 *[a config author, tired of writing TOML tables, types a one-liner instead]*
//! *[the parser squints, counts parentheses on its fingers, and produces three steps]*
//!
//! Grammar, such as it is:
//! ```text
//! chain := step ( '.' step )*
//! step  := method [ '(' args ')' ]
//! args  := arg ( ',' arg )*
//! ```
//! Dots and commas only split at depth zero: parentheses and braces nest, and a
//! single-quoted run is opaque. `format({0}.{1})` is one step with one argument.
//!
//! 🧠 Knowledge graph:
//! - Arguments stay raw here (`TransformSpec::arguments`). Binding them to a method's
//!   signature happens in `transforms::Signature::bind` once the registry is known.
//! - `copy(a, b)` followed by another step donates `a, b` to that step as parameters.
//!   A trailing `copy` is a real copy.
//!
//! 🦆

use anyhow::{Result, bail};

use crate::schema::TransformSpec;

/// 🔪 Parse a shorthand chain into unbound transform specs.
pub fn parse(expression: &str) -> Result<Vec<TransformSpec>> {
    let mut specs: Vec<TransformSpec> = Vec::new();
    let mut donated: Option<Vec<String>> = None;

    for raw_step in split_top_level(expression, '.')? {
        let raw_step = raw_step.trim();
        if raw_step.is_empty() {
            bail!("💀 Empty step in '{expression}'. Two dots walked into a bar with nothing between them.");
        }
        let (method, arguments) = parse_step(raw_step)?;

        if method == "copy" {
            // -- 🎁 park the fields; the next step picks them up, or we become a real copy at the end
            donated = Some(arguments.iter().map(|a| a.trim().to_string()).collect());
            continue;
        }

        let mut spec = TransformSpec::new(method);
        spec.arguments = arguments;
        if let Some(fields) = donated.take() {
            spec.parameters = fields;
        }
        specs.push(spec);
    }

    if let Some(fields) = donated {
        specs.push(TransformSpec::new("copy").with_parameters(fields));
    }
    Ok(specs)
}

fn parse_step(raw_step: &str) -> Result<(String, Vec<String>)> {
    let Some(open) = raw_step.find('(') else {
        return Ok((raw_step.to_ascii_lowercase(), Vec::new()));
    };
    if !raw_step.ends_with(')') {
        bail!("💀 Step '{raw_step}' opens a parenthesis it never closes.");
    }
    let method = raw_step[..open].trim();
    if method.is_empty() {
        bail!("💀 Step '{raw_step}' has arguments but no method name.");
    }
    let inner = &raw_step[open + 1..raw_step.len() - 1];
    let arguments = if inner.trim().is_empty() {
        Vec::new()
    } else {
        split_top_level(inner, ',')?
            .into_iter()
            .map(str::to_string)
            .collect()
    };
    Ok((method.to_ascii_lowercase(), arguments))
}

/// 🔪 Split at `separator` wherever nesting depth is zero and we're outside quotes.
pub(crate) fn split_top_level(text: &str, separator: char) -> Result<Vec<&str>> {
    let mut parts = Vec::new();
    let mut depth: i32 = 0;
    let mut quoted = false;
    let mut start = 0;

    for (position, c) in text.char_indices() {
        match c {
            '\'' => quoted = !quoted,
            '(' | '{' if !quoted => depth += 1,
            ')' | '}' if !quoted => {
                depth -= 1;
                if depth < 0 {
                    bail!("💀 '{text}' closes more brackets than it opens.");
                }
            }
            c if c == separator && depth == 0 && !quoted => {
                parts.push(&text[start..position]);
                start = position + c.len_utf8();
            }
            _ => {}
        }
    }
    if depth != 0 || quoted {
        bail!("💀 '{text}' leaves a bracket or quote open. The parser waited. Nobody came back.");
    }
    parts.push(&text[start..]);
    Ok(parts)
}

/// 🧹 `'a, b'` → `a, b`. Anything else is returned trimmed and untouched.
pub(crate) fn unquote(argument: &str) -> &str {
    let trimmed = argument.trim();
    if trimmed.len() >= 2 && trimmed.starts_with('\'') && trimmed.ends_with('\'') {
        &trimmed[1..trimmed.len() - 1]
    } else {
        trimmed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn the_one_where_copy_hands_its_fields_to_the_next_step() -> Result<()> {
        let the_chain = parse("copy(Field1,Field2,Field3).format({Field1}-{Field2}+{Field3}).trim()")?;
        assert_eq!(the_chain.len(), 2);
        assert_eq!(the_chain[0].method, "format");
        assert_eq!(the_chain[0].parameters, vec!["Field1", "Field2", "Field3"]);
        assert_eq!(the_chain[0].arguments, vec!["{Field1}-{Field2}+{Field3}"]);
        assert_eq!(the_chain[1].method, "trim");
        assert!(the_chain[1].arguments.is_empty());
        Ok(())
    }

    #[test]
    fn the_one_where_a_trailing_copy_is_just_a_copy() -> Result<()> {
        let the_chain = parse("copy(Other)")?;
        assert_eq!(the_chain.len(), 1);
        assert_eq!(the_chain[0].method, "copy");
        assert_eq!(the_chain[0].parameters, vec!["Other"]);
        Ok(())
    }

    #[test]
    fn the_one_where_nested_commas_and_dots_stay_inside() -> Result<()> {
        let the_chain = parse("iif(Field1=Field2,Field3,Field4).format({0:0.00}).padleft(10,'x')")?;
        assert_eq!(the_chain[0].arguments, vec!["Field1=Field2", "Field3", "Field4"]);
        assert_eq!(the_chain[1].arguments, vec!["{0:0.00}"]);
        assert_eq!(the_chain[2].arguments, vec!["10", "'x'"]);
        assert_eq!(unquote(&the_chain[2].arguments[1]), "x");
        Ok(())
    }

    #[test]
    fn the_one_where_the_brackets_never_close() {
        assert!(parse("format({0").is_err());
        assert!(parse("trim())").is_err());
        assert!(parse("trim()..upper()").is_err());
    }
}

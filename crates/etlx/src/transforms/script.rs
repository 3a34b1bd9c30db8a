// ai
//! 📜 script — when the built-in kinds run out of ideas, hand the row to an embedded engine.
//!
//! 🎬 *[a rhai engine boots up. it is handed `Field1 + Field2`. it has never been happier.]*
//!
//! - The engine is built once per step, with the process's global scripts and any scripts
//!   the step names (`scripts = "helpers,dates"`) compiled in ahead of the step's own body.
//! - Every field or process parameter whose alias shows up as an identifier in the body
//!   becomes a variable of the same name, refreshed per row.
//! - The body's last expression is the result, converted to the owning field's type.
//!   A script that evaluates to nothing (unit) is an error for that row.
//! - Runtime errors are reported once per script line. A bad line running over a million
//!   rows makes one complaint, logged with the script and the variables that triggered it.

use std::collections::HashSet;
use std::sync::Arc;

use rhai::{AST, Dynamic, Engine, Scope};
use tracing::error;

use crate::common::{DATETIME_FORMAT, Row, Value};
use crate::conversion::TypeTables;
use crate::transforms::{
    Accepts, BuildContext, BuildError, FieldRef, Output, Registration, Returns, Signature,
    Transform, TransformContext, TransformRegistry,
};

/// 🛑 Operations one row may spend before the engine gives up on it. Infinite loops are a row error.
const MAX_OPERATIONS: u64 = 1_000_000;

pub(crate) fn register(registry: &mut TransformRegistry) {
    registry.register(
        &["js", "javascript", "script"],
        Registration {
            signature: Signature::Named(&[("script", None)]),
            accepts: Accepts::Any,
            returns: Returns::OwningField,
            build,
        },
    );
}

fn build(ctx: &mut BuildContext<'_>) -> Result<Box<dyn Transform>, BuildError> {
    let body = ctx.require("script")?.to_string();
    let requested: Vec<&str> = ctx
        .setting("scripts")
        .map(|names| names.split(',').map(str::trim).filter(|n| !n.is_empty()).collect())
        .unwrap_or_default();
    let libraries = ctx.script_sources(&requested)?;

    let mut engine = Engine::new();
    engine.set_max_operations(MAX_OPERATIONS);

    let mut ast = AST::empty();
    for (name, source) in &libraries {
        let compiled = engine
            .compile(source)
            .map_err(|e| ctx.invalid(format!("script '{name}' does not compile: {e}")))?;
        ast = ast.merge(&compiled);
    }
    let compiled = engine
        .compile(&body)
        .map_err(|e| ctx.invalid(format!("script does not compile: {e}")))?;
    let ast = ast.merge(&compiled);

    // -- 🔍 explicit parameters first, then anything the body mentions by name
    let mut inputs: Vec<FieldRef> = Vec::new();
    for name in ctx.spec.parameters.clone() {
        push_unique(&mut inputs, ctx.resolve(&name)?);
    }
    for identifier in identifiers(&body) {
        let known = ctx
            .lookup(identifier)
            .is_some_and(|found| found.alias() == identifier);
        if known {
            push_unique(&mut inputs, ctx.resolve(identifier)?);
        }
    }

    Ok(Box::new(Script {
        body,
        engine: Some(engine),
        ast: Some(ast),
        inputs,
        output: ctx.output(),
        tables: Arc::clone(ctx.tables),
        reported_lines: HashSet::new(),
    }))
}

fn push_unique(inputs: &mut Vec<FieldRef>, candidate: FieldRef) {
    if !inputs.iter().any(|existing| existing.alias() == candidate.alias()) {
        inputs.push(candidate);
    }
}

/// 🔤 Every identifier-shaped token in the text, first occurrence order, string literals skipped.
fn identifiers(text: &str) -> Vec<&str> {
    let mut found: Vec<&str> = Vec::new();
    let mut chars = text.char_indices().peekable();
    let mut in_string: Option<char> = None;

    while let Some((start, c)) = chars.next() {
        if let Some(quote) = in_string {
            if c == '\\' {
                chars.next();
            } else if c == quote {
                in_string = None;
            }
            continue;
        }
        if c == '"' || c == '\'' || c == '`' {
            in_string = Some(c);
            continue;
        }
        if c.is_alphabetic() || c == '_' {
            let mut end = start + c.len_utf8();
            while let Some(&(next_start, next)) = chars.peek() {
                if next.is_alphanumeric() || next == '_' {
                    end = next_start + next.len_utf8();
                    chars.next();
                } else {
                    break;
                }
            }
            let token = &text[start..end];
            if !found.contains(&token) {
                found.push(token);
            }
        } else if c.is_ascii_digit() {
            // -- 🔢 swallow the rest of a number so `1e5` doesn't look like an identifier `e5`
            while chars.peek().is_some_and(|(_, n)| n.is_alphanumeric() || *n == '_' || *n == '.') {
                chars.next();
            }
        }
    }
    found
}

#[derive(Debug)]
struct Script {
    body: String,
    engine: Option<Engine>,
    ast: Option<AST>,
    inputs: Vec<FieldRef>,
    output: Output,
    tables: Arc<TypeTables>,
    reported_lines: HashSet<usize>,
}

impl Script {
    fn scope(&self, row: &Row) -> Scope<'static> {
        let mut scope = Scope::new();
        for input in &self.inputs {
            scope.push_dynamic(input.alias().to_string(), to_dynamic(input.read(row)));
        }
        scope
    }

    fn describe_variables(&self, row: &Row) -> String {
        self.inputs
            .iter()
            .map(|input| format!("{}={:?}", input.alias(), input.read(row)))
            .collect::<Vec<_>>()
            .join(", ")
    }
}

impl Transform for Script {
    fn transform(&mut self, row: &mut Row, ctx: &mut TransformContext<'_>) {
        let (Some(engine), Some(ast)) = (&self.engine, &self.ast) else {
            ctx.error("the script engine was already released");
            return;
        };
        let mut scope = self.scope(row);
        match engine.eval_ast_with_scope::<Dynamic>(&mut scope, ast) {
            Ok(result) => {
                let Some(value) = from_dynamic(result) else {
                    ctx.error("the script returns null");
                    return;
                };
                match self.tables.coerce(self.output.field_type, &value) {
                    Ok(converted) => self.output.write(row, converted),
                    Err(e) => ctx.error(format!("the script result {e:#}")),
                }
            }
            Err(e) => {
                let line = e.position().line().unwrap_or(0);
                if self.reported_lines.insert(line) {
                    error!(
                        "💀 {}.{} script failed at line {}: {}\n📜 script:\n{}\n🔍 variables: {}",
                        ctx.entity,
                        ctx.alias,
                        line,
                        e,
                        self.body,
                        self.describe_variables(row)
                    );
                    ctx.error(format!("script error at line {line}: {e}"));
                }
            }
        }
    }

    fn release(&mut self) {
        self.ast = None;
        self.engine = None;
    }
}

fn to_dynamic(value: &Value) -> Dynamic {
    match value {
        Value::Null => Dynamic::UNIT,
        Value::String(s) => Dynamic::from(s.clone()),
        Value::Char(c) => Dynamic::from(*c),
        Value::Bool(b) => Dynamic::from(*b),
        Value::Int32(i) => Dynamic::from(i64::from(*i)),
        Value::Int64(i) => Dynamic::from(*i),
        Value::Double(d) => Dynamic::from(*d),
        Value::Decimal(_) => Dynamic::from(value.as_f64().unwrap_or(f64::NAN)),
        Value::DateTime(dt) => Dynamic::from(dt.format(DATETIME_FORMAT).to_string()),
        Value::List(items) => Dynamic::from_array(items.iter().cloned().map(Dynamic::from).collect()),
        other => Dynamic::from(other.to_string()),
    }
}

/// 🔙 Engine value back to a cell. `None` means the script produced nothing.
fn from_dynamic(result: Dynamic) -> Option<Value> {
    if result.is_unit() {
        return None;
    }
    if let Ok(i) = result.as_int() {
        return Some(Value::Int64(i));
    }
    if let Ok(f) = result.as_float() {
        return Some(Value::Double(f));
    }
    if let Ok(b) = result.as_bool() {
        return Some(Value::Bool(b));
    }
    if let Ok(c) = result.as_char() {
        return Some(Value::Char(c));
    }
    if result.is_array() {
        let items = result.into_array().ok()?;
        return Some(Value::List(items.into_iter().map(|item| item.to_string()).collect()));
    }
    Some(Value::String(result.to_string()))
}

// ai
//! 🔄 Transforms — one field, one step, one row at a time 🎭🚀
//!
//! 🎬 COLD OPEN — INT. ASSEMBLY LINE — 2:47 AM
//!
//! The row arrives on the belt. Eleven slots. Station one trims slot four.
//! Station two reads slot four and pads it. Station three reads slots one, two
//! and four and glues them into a sentence. Nobody at station three asks what
//! slot four looked like before station one got to it. That's the deal.
//!
//! ## Architecture 📐
//!
//! ```text
//!   TransformSpec ──▶ TransformRegistry ──▶ Registration.build(BuildContext)
//!                                              │
//!                                              ▼
//!                              Box<dyn Transform> ──▶ BoundTransform (counter, diagnostics)
//! ```
//!
//! - [`Transform`] is the per-kind contract: read inputs from the row, write the owning slot.
//! - [`BoundTransform`] wraps one instance with its row counter and deduplicated [`Diagnostics`].
//! - [`TransformRegistry`] maps method names to a [`Registration`]: signature, accepted input
//!   category, output type rule, and a constructor. New kinds register; nothing else changes.
//! - [`BuildContext`] resolves field references (self → sibling → process parameter,
//!   case-insensitive) and records which row slots a step reads, for dependency ordering.
//!
//! ## Knowledge Graph 🧠
//! - Row-level problems never escape as `Err`. They become `ctx.error(..)` / `ctx.warn(..)`.
//! - Build problems are [`BuildError::Invalid`] (field chain disabled) or
//!   [`BuildError::Fatal`] (resource failure, entity aborted).
//! - Anything owning an external engine releases it in [`Transform::release`], exactly once.
//!
//! 🦆

use std::collections::{BTreeMap, HashMap, HashSet};
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use tracing::{debug, error, warn};

use crate::common::{Row, Value};
use crate::conversion::TypeTables;
use crate::schema::{EntitySchema, Field, FieldType, ProcessSchema, ScriptConfig, TransformSpec};
use crate::shorthand::unquote;

pub mod convert;
pub mod copy;
pub mod dates;
pub mod format;
pub mod humanize;
pub mod logic;
pub mod map;
pub mod numeric;
pub mod script;
pub mod split;
pub mod strings;

// ============================================================
//  📋 Diagnostics — the deduplicated complaint box
// ============================================================

/// 📋 Errors and warnings, deduplicated by message text, in first-seen order.
///
/// Ten thousand rows with the same malformed date make one entry, not ten thousand.
/// Your log aggregator sends its thanks. 🙏
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Diagnostics {
    errors: Vec<String>,
    warnings: Vec<String>,
    seen_errors: HashSet<String>,
    seen_warnings: HashSet<String>,
}

impl Diagnostics {
    /// ❌ Record an error. Returns `true` only the first time this exact message shows up.
    pub fn error(&mut self, message: impl Into<String>) -> bool {
        let message = message.into();
        if self.seen_errors.insert(message.clone()) {
            self.errors.push(message);
            true
        } else {
            false
        }
    }

    /// ⚠️ Record a warning. Same dedup rules as [`Diagnostics::error`].
    pub fn warn(&mut self, message: impl Into<String>) -> bool {
        let message = message.into();
        if self.seen_warnings.insert(message.clone()) {
            self.warnings.push(message);
            true
        } else {
            false
        }
    }

    pub fn errors(&self) -> &[String] {
        &self.errors
    }

    pub fn warnings(&self) -> &[String] {
        &self.warnings
    }

    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }

    pub fn is_empty(&self) -> bool {
        self.errors.is_empty() && self.warnings.is_empty()
    }

    /// 🔗 Fold another set in, keeping dedup and order.
    pub fn merge(&mut self, other: &Diagnostics) {
        for message in &other.errors {
            self.error(message.clone());
        }
        for message in &other.warnings {
            self.warn(message.clone());
        }
    }
}

/// 🎙️ What a transform gets to talk to while it's processing a row.
///
/// The first occurrence of every message is logged with entity and field; repeats are silent.
pub struct TransformContext<'a> {
    pub entity: &'a str,
    pub alias: &'a str,
    pub method: &'a str,
    diagnostics: &'a mut Diagnostics,
}

impl<'a> TransformContext<'a> {
    pub fn new(entity: &'a str, alias: &'a str, method: &'a str, diagnostics: &'a mut Diagnostics) -> Self {
        Self {
            entity,
            alias,
            method,
            diagnostics,
        }
    }

    pub fn error(&mut self, message: impl Into<String>) {
        let message = message.into();
        if self.diagnostics.error(message.clone()) {
            error!(
                "💀 {}.{} ({}): {}",
                self.entity, self.alias, self.method, message
            );
        }
    }

    pub fn warn(&mut self, message: impl Into<String>) {
        let message = message.into();
        if self.diagnostics.warn(message.clone()) {
            warn!(
                "⚠️ {}.{} ({}): {}",
                self.entity, self.alias, self.method, message
            );
        }
    }
}

// ============================================================
//  🔧 The Transform contract
// ============================================================

/// 🔧 One executable step bound to one field.
///
/// # Contract 📜
/// - Read the bound inputs from `row`, write the result into the owning field's slot.
/// - Deterministic for identical row contents and construction state.
/// - Never panic on row content. Call `ctx.error(..)` / `ctx.warn(..)` and leave the slot alone.
/// - `release` frees external engines. It may be called more than once; only the first call counts.
pub trait Transform: Send + fmt::Debug {
    fn transform(&mut self, row: &mut Row, ctx: &mut TransformContext<'_>);

    fn release(&mut self) {}
}

/// 📍 Where a transform writes. Always the owning field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Output {
    pub index: usize,
    pub field_type: FieldType,
}

impl Output {
    pub fn write(&self, row: &mut Row, value: Value) {
        row.set(self.index, value);
    }
}

/// 🔗 A resolved input: a slot in the row, or a process parameter with a fixed value.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldRef {
    Row {
        index: usize,
        field_type: FieldType,
        alias: String,
    },
    Parameter {
        value: Value,
        field_type: FieldType,
        alias: String,
    },
}

impl FieldRef {
    /// 🧪 A literal dressed as a parameter. Used for constants in `iif`, `in` and map targets.
    pub fn literal(value: Value, field_type: FieldType) -> Self {
        FieldRef::Parameter {
            alias: value.to_string(),
            value,
            field_type,
        }
    }

    pub fn read<'r>(&'r self, row: &'r Row) -> &'r Value {
        match self {
            FieldRef::Row { index, .. } => &row[*index],
            FieldRef::Parameter { value, .. } => value,
        }
    }

    pub fn field_type(&self) -> FieldType {
        match self {
            FieldRef::Row { field_type, .. } | FieldRef::Parameter { field_type, .. } => *field_type,
        }
    }

    pub fn alias(&self) -> &str {
        match self {
            FieldRef::Row { alias, .. } | FieldRef::Parameter { alias, .. } => alias,
        }
    }
}

/// 🎁 A transform instance plus the bookkeeping every kind shares: a row counter and
/// its own deduplicated diagnostics.
#[derive(Debug)]
pub struct BoundTransform {
    entity: String,
    alias: String,
    method: String,
    returns: Option<FieldType>,
    output_type: FieldType,
    inner: Box<dyn Transform>,
    row_count: u64,
    log_interval: u64,
    diagnostics: Diagnostics,
    released: bool,
}

impl BoundTransform {
    pub fn new(
        entity: &str,
        field: &Field,
        spec: &TransformSpec,
        output_type: FieldType,
        inner: Box<dyn Transform>,
        log_interval: u64,
    ) -> Self {
        Self {
            entity: entity.to_string(),
            alias: field.alias.clone(),
            method: spec.method.clone(),
            returns: spec.returns,
            output_type,
            inner,
            row_count: 0,
            log_interval: log_interval.max(1),
            diagnostics: Diagnostics::default(),
            released: false,
        }
    }

    pub fn method(&self) -> &str {
        &self.method
    }

    /// 🏷️ The `returns` override, if the config asked for one.
    pub fn returns(&self) -> Option<FieldType> {
        self.returns
    }

    /// 🏷️ What the next step receives: `returns` if set, else this kind's static output type.
    pub fn output_type(&self) -> FieldType {
        self.returns.unwrap_or(self.output_type)
    }

    pub fn row_count(&self) -> u64 {
        self.row_count
    }

    pub fn diagnostics(&self) -> &Diagnostics {
        &self.diagnostics
    }

    pub(crate) fn diagnostics_mut(&mut self) -> &mut Diagnostics {
        &mut self.diagnostics
    }

    pub(crate) fn entity(&self) -> &str {
        &self.entity
    }

    pub(crate) fn alias(&self) -> &str {
        &self.alias
    }

    /// 🔄 One row in, the same row out, one slot changed (maybe).
    pub fn transform(&mut self, mut row: Row) -> Row {
        let mut ctx = TransformContext::new(&self.entity, &self.alias, &self.method, &mut self.diagnostics);
        self.inner.transform(&mut row, &mut ctx);
        self.row_count += 1;
        if self.row_count % self.log_interval == 0 {
            debug!(
                "🔄 {}.{} ({}) has seen {} rows",
                self.entity, self.alias, self.method, self.row_count
            );
        }
        row
    }

    /// 🌊 The stream form: lazily map [`BoundTransform::transform`] over the rows, in order.
    pub fn transform_rows<'s, I>(&'s mut self, rows: I) -> impl Iterator<Item = Row> + 's
    where
        I: IntoIterator<Item = Row>,
        I::IntoIter: 's,
    {
        rows.into_iter().map(move |row| self.transform(row))
    }

    /// 🗑️ Release external engines. Idempotent.
    pub fn release(&mut self) {
        if !self.released {
            self.released = true;
            self.inner.release();
        }
    }
}

impl Drop for BoundTransform {
    fn drop(&mut self) {
        self.release();
    }
}

// ============================================================
//  🏗️ Building transforms
// ============================================================

/// 💥 Why a transform could not be built.
#[derive(Debug)]
pub enum BuildError {
    /// 🚫 configuration problem: the field's chain is disabled, one error is recorded
    Invalid(String),
    /// 💀 resource failure: the entity aborts before any row flows
    Fatal(anyhow::Error),
}

impl fmt::Display for BuildError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BuildError::Invalid(message) => f.write_str(message),
            BuildError::Fatal(error) => write!(f, "{error:#}"),
        }
    }
}

impl From<anyhow::Error> for BuildError {
    fn from(error: anyhow::Error) -> Self {
        BuildError::Fatal(error)
    }
}

/// 🏷️ The input categories a kind accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Accepts {
    Any,
    Text,
    Numeric,
    Date,
    TextOrDate,
}

impl Accepts {
    pub fn admits(&self, field_type: FieldType) -> bool {
        match self {
            Accepts::Any => true,
            Accepts::Text => field_type.is_text(),
            Accepts::Numeric => field_type.is_numeric(),
            Accepts::Date => field_type.is_date(),
            Accepts::TextOrDate => field_type.is_text() || field_type.is_date(),
        }
    }
}

impl fmt::Display for Accepts {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Accepts::Any => "any",
            Accepts::Text => "string",
            Accepts::Numeric => "numeric",
            Accepts::Date => "date",
            Accepts::TextOrDate => "string or date",
        })
    }
}

/// 🏷️ How a kind's static output type is decided.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Returns {
    Fixed(FieldType),
    /// the owning field's declared type
    OwningField,
    /// whatever the step received
    Received,
    /// the widest numeric type among the inputs (double beats decimal beats the ints)
    Widest,
    /// parsed from a named setting, e.g. `convert(type = int)`
    FromSetting(&'static str),
}

/// ✍️ How shorthand arguments bind to a kind.
#[derive(Debug, Clone, Copy)]
pub enum Signature {
    /// named settings in order, with optional defaults; extra args fold into the last one
    Named(&'static [(&'static str, Option<&'static str>)]),
    /// every argument is a field reference
    Fields,
    /// every argument is a value in one list setting
    Values(&'static str),
}

impl Signature {
    /// 🔗 Bind raw arguments into parameters/settings and fill defaults. Explicit settings win.
    pub fn bind(&self, spec: &TransformSpec) -> TransformSpec {
        let mut bound = spec.clone();
        bound.arguments.clear();
        match self {
            Signature::Named(slots) => {
                let mut slot_values: BTreeMap<&str, String> = BTreeMap::new();
                for (position, argument) in spec.arguments.iter().enumerate() {
                    let Some(last) = slots.len().checked_sub(1) else {
                        break;
                    };
                    if position < last {
                        slot_values.insert(slots[position].0, unquote(argument).to_string());
                    } else {
                        // -- 🧺 overflow lands in the last slot, commas restored
                        let rest = spec.arguments[last..].join(",");
                        slot_values.insert(slots[last].0, unquote(&rest).to_string());
                        break;
                    }
                }
                for (name, default) in slots.iter() {
                    if bound.settings.contains_key(*name) {
                        continue;
                    }
                    if let Some(value) = slot_values.remove(name) {
                        bound.settings.insert(name.to_string(), value);
                    } else if let Some(default) = default {
                        bound.settings.insert(name.to_string(), default.to_string());
                    }
                }
            }
            Signature::Fields => {
                bound
                    .parameters
                    .extend(spec.arguments.iter().map(|a| unquote(a).to_string()));
            }
            Signature::Values(name) => {
                if !spec.arguments.is_empty() && !bound.settings.contains_key(*name) {
                    let values: Vec<&str> = spec.arguments.iter().map(|a| unquote(a)).collect();
                    bound.settings.insert(name.to_string(), values.join(","));
                }
            }
        }
        bound
    }
}

/// 📖 Where script files come from. Injected so tests never touch the disk.
pub trait ScriptReader: Send + Sync + fmt::Debug {
    fn read(&self, path: &str) -> anyhow::Result<String>;
}

/// 📂 Reads script files from disk, relative to an optional base directory.
#[derive(Debug, Clone, Default)]
pub struct FileScriptReader {
    base: Option<PathBuf>,
}

impl FileScriptReader {
    pub fn new(base: Option<PathBuf>) -> Self {
        Self { base }
    }
}

impl ScriptReader for FileScriptReader {
    fn read(&self, path: &str) -> anyhow::Result<String> {
        let full_path = match &self.base {
            Some(base) => base.join(path),
            None => PathBuf::from(path),
        };
        std::fs::read_to_string(&full_path).with_context(|| {
            format!(
                "💀 Script file '{}' would not open. It was referenced with confidence. It does not exist with equal confidence.",
                full_path.display()
            )
        })
    }
}

/// 🧰 Everything a constructor may look at, plus the field resolver.
pub struct BuildContext<'a> {
    pub process: &'a ProcessSchema,
    pub entity: &'a EntitySchema,
    pub field: &'a Field,
    /// the transform step after signature binding
    pub spec: &'a TransformSpec,
    /// position of this step in the field's chain
    pub position: usize,
    /// the type this step receives (previous step's output, or the input's declared type)
    pub received: FieldType,
    /// the static output type decided by the registration
    pub output_type: FieldType,
    pub tables: &'a Arc<TypeTables>,
    pub scripts: &'a dyn ScriptReader,
    reads: Vec<usize>,
}

impl<'a> BuildContext<'a> {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        process: &'a ProcessSchema,
        entity: &'a EntitySchema,
        field: &'a Field,
        spec: &'a TransformSpec,
        position: usize,
        received: FieldType,
        output_type: FieldType,
        tables: &'a Arc<TypeTables>,
        scripts: &'a dyn ScriptReader,
    ) -> Self {
        Self {
            process,
            entity,
            field,
            spec,
            position,
            received,
            output_type,
            tables,
            scripts,
            reads: Vec::new(),
        }
    }

    /// 📍 Row slots (other than the owning field) this step reads.
    pub fn reads(&self) -> &[usize] {
        &self.reads
    }

    pub fn into_reads(self) -> Vec<usize> {
        self.reads
    }

    pub fn output(&self) -> Output {
        Output {
            index: self.field.index,
            field_type: self.output_type,
        }
    }

    /// 🪞 The owning field's slot, typed as whatever this step received.
    pub fn self_ref(&self) -> FieldRef {
        FieldRef::Row {
            index: self.field.index,
            field_type: self.received,
            alias: self.field.alias.clone(),
        }
    }

    /// 🔍 Look a name up without recording a read: self → sibling → process parameter.
    pub fn lookup(&self, name: &str) -> Option<FieldRef> {
        let name = name.trim();
        if self.field.matches(name) {
            return Some(self.self_ref());
        }
        if let Some(sibling) = self.entity.field(name) {
            return Some(FieldRef::Row {
                index: sibling.index,
                field_type: sibling.field_type,
                alias: sibling.alias.clone(),
            });
        }
        self.process.parameter(name).map(|parameter| FieldRef::Parameter {
            value: parameter.value.clone(),
            field_type: parameter.field.field_type,
            alias: parameter.field.alias.clone(),
        })
    }

    /// 🔍 Resolve a field reference and remember the read. Missing names are a config problem.
    pub fn resolve(&mut self, name: &str) -> Result<FieldRef, BuildError> {
        let found = self.lookup(name).ok_or_else(|| {
            self.invalid(format!(
                "'{}' is not a field of '{}' or a process parameter",
                name.trim(),
                self.entity.name
            ))
        })?;
        if let FieldRef::Row { index, .. } = &found {
            if *index != self.field.index && !self.reads.contains(index) {
                self.reads.push(*index);
            }
        }
        Ok(found)
    }

    /// 🔍 A field if one answers to `text`, otherwise a literal converted to `hint`.
    pub fn operand(&mut self, text: &str, hint: FieldType) -> Result<FieldRef, BuildError> {
        let text = text.trim();
        if self.lookup(text).is_some() {
            return self.resolve(text);
        }
        let literal = unquote(text);
        let value = self
            .tables
            .convert(hint, literal)
            .map_err(|e| self.invalid(format!("literal {e}")))?;
        Ok(FieldRef::literal(value, hint))
    }

    /// 📥 The step's inputs: its parameters, or the owning field itself when it has none.
    pub fn inputs(&mut self) -> Result<Vec<FieldRef>, BuildError> {
        if self.spec.parameters.is_empty() {
            return Ok(vec![self.self_ref()]);
        }
        let names = self.spec.parameters.clone();
        names.iter().map(|name| self.resolve(name)).collect()
    }

    /// 📥 The first input. Kinds that read one value use this.
    pub fn single_input(&mut self) -> Result<FieldRef, BuildError> {
        match self.spec.parameters.first().cloned() {
            Some(name) => self.resolve(&name),
            None => Ok(self.self_ref()),
        }
    }

    pub fn setting(&self, key: &str) -> Option<&'a str> {
        self.spec.setting(key)
    }

    /// 🎛️ A setting that must exist and must not be blank.
    pub fn require(&self, key: &str) -> Result<&'a str, BuildError> {
        match self.setting(key) {
            Some(value) if !value.is_empty() => Ok(value),
            _ => Err(self.invalid(format!("the '{key}' setting is required"))),
        }
    }

    /// 🎛️ A setting parsed into a number (or anything `FromStr`).
    pub fn parse_setting<T: std::str::FromStr>(&self, key: &str) -> Result<T, BuildError> {
        let raw = self.require(key)?;
        raw.trim()
            .parse()
            .map_err(|_| self.invalid(format!("the '{key}' setting '{raw}' is not valid")))
    }

    /// 📜 Script sources for this step: globals first, then the ones it asked for by name.
    /// Files go through the injected reader; a read failure is fatal.
    pub fn script_sources(&self, names: &[&str]) -> Result<Vec<(String, String)>, BuildError> {
        let mut wanted: Vec<&ScriptConfig> = self.process.scripts.iter().filter(|s| s.global).collect();
        for name in names {
            let script = self
                .process
                .script(name)
                .ok_or_else(|| self.invalid(format!("script '{name}' is not in the process catalog")))?;
            if !wanted.iter().any(|s| s.name.eq_ignore_ascii_case(&script.name)) {
                wanted.push(script);
            }
        }
        let mut sources = Vec::with_capacity(wanted.len());
        for script in wanted {
            let mut content = script.content.clone();
            if let Some(file) = &script.file {
                let from_disk = self.scripts.read(file).with_context(|| {
                    format!(
                        "💀 Script '{}' for {}.{} could not be loaded.",
                        script.name, self.entity.name, self.field.alias
                    )
                })?;
                if !content.is_empty() {
                    content.push('\n');
                }
                content.push_str(&from_disk);
            }
            sources.push((script.name.clone(), content));
        }
        Ok(sources)
    }

    /// 🚫 A config problem, prefixed with where it happened.
    pub fn invalid(&self, message: impl fmt::Display) -> BuildError {
        BuildError::Invalid(format!(
            "{}.{} step {} ({}): {}",
            self.entity.name,
            self.field.alias,
            self.position + 1,
            self.spec.method,
            message
        ))
    }
}

/// 🏭 A constructor: context in, boxed transform out.
pub type BuildFn = fn(&mut BuildContext<'_>) -> Result<Box<dyn Transform>, BuildError>;

/// 📇 Everything the chain builder needs to know about one kind.
#[derive(Debug, Clone, Copy)]
pub struct Registration {
    pub signature: Signature,
    pub accepts: Accepts,
    pub returns: Returns,
    pub build: BuildFn,
}

/// 📇 Method name → registration. Case-insensitive by way of lowercasing on the way in.
#[derive(Debug, Clone, Default)]
pub struct TransformRegistry {
    kinds: HashMap<String, Registration>,
}

impl TransformRegistry {
    pub fn empty() -> Self {
        Self::default()
    }

    /// 📇 Register one kind under one or more names. Later registrations replace earlier ones.
    pub fn register(&mut self, names: &[&str], registration: Registration) -> &mut Self {
        for name in names {
            self.kinds.insert(name.to_ascii_lowercase(), registration);
        }
        self
    }

    pub fn get(&self, method: &str) -> Option<&Registration> {
        self.kinds.get(&method.to_ascii_lowercase())
    }

    pub fn contains(&self, method: &str) -> bool {
        self.get(method).is_some()
    }

    /// 🏗️ Every built-in kind.
    pub fn standard() -> Self {
        let mut registry = Self::empty();
        copy::register(&mut registry);
        map::register(&mut registry);
        split::register(&mut registry);
        format::register(&mut registry);
        script::register(&mut registry);
        humanize::register(&mut registry);
        logic::register(&mut registry);
        strings::register(&mut registry);
        numeric::register(&mut registry);
        dates::register(&mut registry);
        convert::register(&mut registry);
        registry
    }
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn the_one_where_ten_thousand_complaints_become_one() {
        let mut the_complaint_box = Diagnostics::default();
        for _ in 0..10_000 {
            the_complaint_box.error("the date is not a date");
        }
        assert!(the_complaint_box.warn("mild concern"));
        assert!(!the_complaint_box.warn("mild concern"));
        assert_eq!(the_complaint_box.errors().len(), 1);
        assert_eq!(the_complaint_box.warnings().len(), 1);

        let mut the_other_box = Diagnostics::default();
        the_other_box.error("the date is not a date");
        the_other_box.error("a brand new problem");
        the_complaint_box.merge(&the_other_box);
        assert_eq!(
            the_complaint_box.errors(),
            &["the date is not a date".to_string(), "a brand new problem".to_string()]
        );
    }

    #[test]
    fn the_one_where_arguments_find_their_named_slots() {
        let mut the_spec = TransformSpec::new("padleft");
        the_spec.arguments = vec!["10".into(), " 'x'".into()];
        let the_bound = Signature::Named(&[("total_width", None), ("padding_char", Some("0"))]).bind(&the_spec);
        assert_eq!(the_bound.setting("total_width"), Some("10"));
        assert_eq!(the_bound.setting("padding_char"), Some("x"));

        let the_defaulted = Signature::Named(&[("total_width", None), ("padding_char", Some("0"))])
            .bind(&TransformSpec::new("padleft").with_setting("total_width", "3"));
        assert_eq!(the_defaulted.setting("padding_char"), Some("0"));
    }

    #[test]
    fn the_one_where_overflow_commas_are_glued_back_together() {
        let mut the_spec = TransformSpec::new("format");
        the_spec.arguments = vec!["{0}".into(), " {1}".into()];
        let the_bound = Signature::Named(&[("format", None)]).bind(&the_spec);
        assert_eq!(the_bound.setting("format"), Some("{0}, {1}"));
    }

    #[test]
    fn the_one_where_value_lists_and_field_lists_bind_differently() {
        let mut the_spec = TransformSpec::new("in");
        the_spec.arguments = vec!["1".into(), "2".into(), "3".into()];
        assert_eq!(Signature::Values("values").bind(&the_spec).setting("values"), Some("1,2,3"));

        let mut the_sum = TransformSpec::new("add");
        the_sum.arguments = vec!["A".into(), " B".into()];
        assert_eq!(Signature::Fields.bind(&the_sum).parameters, vec!["A", "B"]);
    }

    #[test]
    fn the_one_where_the_stream_form_only_pulls_what_it_is_asked_for() -> anyhow::Result<()> {
        use std::cell::Cell;

        let entity = EntitySchema::new("Words", vec![Field::new("Text", FieldType::String)])?;
        let process = ProcessSchema::new("p", vec![entity.clone()]);
        let mut the_step = test_support::build_step(
            &process,
            &entity,
            "Text",
            TransformSpec::new("upper"),
            FieldType::String,
        )
        .map_err(|e| anyhow::anyhow!("{e}"))?;

        let pulled = Cell::new(0usize);
        let the_rows = ["a", "b", "c"]
            .into_iter()
            .map(|text| Row::from_values(vec![Value::from(text)]))
            .inspect(|_| pulled.set(pulled.get() + 1));

        let the_first_two: Vec<Row> = the_step.transform_rows(the_rows).take(2).collect();
        assert_eq!(pulled.get(), 2, "the third row was never pulled");
        assert_eq!(the_step.row_count(), 2);
        assert_eq!(the_first_two[0][0], Value::from("A"));
        assert_eq!(the_first_two[1][0], Value::from("B"));

        let the_rest: Vec<Value> = the_step
            .transform_rows(["d", "e"].into_iter().map(|text| Row::from_values(vec![Value::from(text)])))
            .map(|row| row[0].clone())
            .collect();
        assert_eq!(the_rest, vec![Value::from("D"), Value::from("E")]);
        assert_eq!(the_step.row_count(), 4);
        Ok(())
    }

    #[test]
    fn the_one_where_the_registry_knows_every_alias() {
        let registry = TransformRegistry::standard();
        for method in [
            "copy", "map", "split", "join", "format", "js", "javascript", "script", "humanize",
            "iif", "in", "equals", "trim", "trimstart", "trimend", "upper", "toupper", "lower",
            "tolower", "left", "right", "padleft", "padright", "replace", "htmlencode",
            "xmlencode", "length", "add", "sum", "multiply", "round", "abs", "convert",
            "tolocaltime",
        ] {
            assert!(registry.contains(method), "missing {method}");
        }
        assert!(registry.contains("TRIM"), "lookups are case-insensitive");
        assert!(!registry.contains("teleport"));
    }
}

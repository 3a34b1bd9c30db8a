// ai
//! 🗺️ map — three-tier lookup against a named process map.
//!
//! 🎬 *[the input walks up to the counter. "Exact match?" asks the clerk.]*
//! *["No? Starts with? Ends with? ... Do you have a wildcard on file?"]*
//! *[the input shrugs. the clerk stamps it PASSTHROUGH and waves it on.]*
//!
//! Precedence, in order:
//! 1. `Equals` entries (exact text match)
//! 2. `StartsWith` entries, first match in map order
//! 3. `EndsWith` entries, first match in map order
//! 4. the `"*"` entry among the `Equals` items
//! 5. passthrough: the input value lands in the field unchanged
//!
//! Literal targets are converted to the field's type once, at build time.
//! A target may instead name a field or parameter (`parameter = "..."`), read per row.

use std::collections::HashMap;

use crate::common::{Row, Value};
use crate::schema::MapOperator;
use crate::transforms::{
    Accepts, BuildContext, BuildError, FieldRef, Output, Registration, Returns, Signature,
    Transform, TransformContext, TransformRegistry,
};

const WILDCARD: &str = "*";

pub(crate) fn register(registry: &mut TransformRegistry) {
    registry.register(
        &["map"],
        Registration {
            signature: Signature::Named(&[("map", None)]),
            accepts: Accepts::Any,
            returns: Returns::OwningField,
            build,
        },
    );
}

/// 🎯 Where a matched key leads.
#[derive(Debug, Clone, PartialEq)]
enum MapTarget {
    Literal(Value),
    Field(FieldRef),
}

impl MapTarget {
    fn resolve<'r>(&'r self, row: &'r Row) -> &'r Value {
        match self {
            MapTarget::Literal(value) => value,
            MapTarget::Field(field) => field.read(row),
        }
    }
}

fn build(ctx: &mut BuildContext<'_>) -> Result<Box<dyn Transform>, BuildError> {
    let map_name = ctx.require("map")?;
    let map = ctx
        .process
        .map(map_name)
        .ok_or_else(|| ctx.invalid(format!("map '{map_name}' is not defined in the process")))?;
    let input = ctx.single_input()?;
    let output = ctx.output();

    let mut equals = HashMap::new();
    let mut starts_with = Vec::new();
    let mut ends_with = Vec::new();
    let mut wildcard = None;

    for item in &map.items {
        let target = match (&item.parameter, &item.to) {
            (Some(parameter), _) => MapTarget::Field(ctx.resolve(parameter)?),
            (None, Some(literal)) => MapTarget::Literal(
                ctx.tables
                    .convert(output.field_type, literal)
                    .map_err(|e| ctx.invalid(format!("map '{}' item '{}': {e}", map.name, item.from)))?,
            ),
            (None, None) => {
                return Err(ctx.invalid(format!(
                    "map '{}' item '{}' has neither `to` nor `parameter`",
                    map.name, item.from
                )));
            }
        };
        match item.operator {
            MapOperator::Equals if item.from == WILDCARD => wildcard = Some(target),
            // -- 🥇 first definition of a key wins, like the other two tiers
            MapOperator::Equals => {
                equals.entry(item.from.clone()).or_insert(target);
            }
            MapOperator::StartsWith => starts_with.push((item.from.clone(), target)),
            MapOperator::EndsWith => ends_with.push((item.from.clone(), target)),
        }
    }

    Ok(Box::new(MapLookup {
        input,
        output,
        equals,
        starts_with,
        ends_with,
        wildcard,
    }))
}

#[derive(Debug)]
struct MapLookup {
    input: FieldRef,
    output: Output,
    equals: HashMap<String, MapTarget>,
    starts_with: Vec<(String, MapTarget)>,
    ends_with: Vec<(String, MapTarget)>,
    wildcard: Option<MapTarget>,
}

impl MapLookup {
    fn lookup(&self, key: &str) -> Option<&MapTarget> {
        self.equals
            .get(key)
            .or_else(|| {
                self.starts_with
                    .iter()
                    .find(|(prefix, _)| key.starts_with(prefix.as_str()))
                    .map(|(_, target)| target)
            })
            .or_else(|| {
                self.ends_with
                    .iter()
                    .find(|(suffix, _)| key.ends_with(suffix.as_str()))
                    .map(|(_, target)| target)
            })
            .or(self.wildcard.as_ref())
    }
}

impl Transform for MapLookup {
    fn transform(&mut self, row: &mut Row, _ctx: &mut TransformContext<'_>) {
        let key = self.input.read(row).to_string();
        let value = match self.lookup(&key) {
            Some(target) => target.resolve(row).clone(),
            None => self.input.read(row).clone(),
        };
        self.output.write(row, value);
    }
}

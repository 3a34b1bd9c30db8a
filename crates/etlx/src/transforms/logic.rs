// ai
//! ⚖️ logic — `iif`, `in` and `equals`. The decision-makers of the transform family.
//!
//! 🎬 *[iif stares at the expression `Field1 > Field2`. it has two doors to choose from.]*
//! *[it picks one. it always picks one. it has never once hesitated.]*

use std::sync::Arc;

use crate::common::{Row, Value};
use crate::conversion::{ComparisonOperator, TypeTables};
use crate::schema::FieldType;
use crate::shorthand::{split_top_level, unquote};
use crate::transforms::{
    Accepts, BuildContext, BuildError, FieldRef, Output, Registration, Returns, Signature,
    Transform, TransformContext, TransformRegistry,
};

pub(crate) fn register(registry: &mut TransformRegistry) {
    registry.register(
        &["iif"],
        Registration {
            signature: Signature::Named(&[
                ("expression", None),
                ("true", None),
                ("false", None),
            ]),
            accepts: Accepts::Any,
            returns: Returns::OwningField,
            build: build_iif,
        },
    );
    registry.register(
        &["in"],
        Registration {
            signature: Signature::Values("values"),
            accepts: Accepts::Any,
            returns: Returns::Fixed(FieldType::Boolean),
            build: build_in,
        },
    );
    registry.register(
        &["equals"],
        Registration {
            signature: Signature::Fields,
            accepts: Accepts::Any,
            returns: Returns::Fixed(FieldType::Boolean),
            build: build_equals,
        },
    );
}

// ============================================================
//  🚪 iif
// ============================================================

fn build_iif(ctx: &mut BuildContext<'_>) -> Result<Box<dyn Transform>, BuildError> {
    let expression = ctx.require("expression")?;
    let true_text = ctx.require("true")?;
    let false_text = ctx.require("false")?;

    let (left_text, operator, right_text) = ComparisonOperator::split_expression(expression)
        .ok_or_else(|| ctx.invalid(format!("'{expression}' has no comparison operator in it")))?;

    // -- 🧭 whichever side is a field decides how the other side's literal is read
    let hint = ctx
        .lookup(left_text)
        .or_else(|| ctx.lookup(right_text))
        .map(|found| found.field_type())
        .unwrap_or(FieldType::String);
    let left = ctx.operand(left_text, hint)?;
    let right = ctx.operand(right_text, hint)?;

    let output = ctx.output();
    let when_true = ctx.operand(true_text, output.field_type)?;
    let when_false = ctx.operand(false_text, output.field_type)?;

    Ok(Box::new(Iif {
        left,
        operator,
        right,
        when_true,
        when_false,
        output,
        tables: Arc::clone(ctx.tables),
    }))
}

#[derive(Debug)]
struct Iif {
    left: FieldRef,
    operator: ComparisonOperator,
    right: FieldRef,
    when_true: FieldRef,
    when_false: FieldRef,
    output: Output,
    tables: Arc<TypeTables>,
}

impl Transform for Iif {
    fn transform(&mut self, row: &mut Row, ctx: &mut TransformContext<'_>) {
        let verdict = self
            .tables
            .compare(self.operator, self.left.read(row), self.right.read(row));
        let chosen = if verdict { &self.when_true } else { &self.when_false };
        match self.tables.coerce(self.output.field_type, chosen.read(row)) {
            Ok(value) => self.output.write(row, value),
            Err(e) => ctx.error(format!("'{}' {e:#}", chosen.alias())),
        }
    }
}

// ============================================================
//  🎒 in
// ============================================================

fn build_in(ctx: &mut BuildContext<'_>) -> Result<Box<dyn Transform>, BuildError> {
    let raw = ctx.require("values")?;
    let input = ctx.single_input()?;
    let pieces = split_top_level(raw, ',').map_err(|e| ctx.invalid(e))?;
    let mut values = Vec::with_capacity(pieces.len());
    for piece in pieces {
        let converted = ctx
            .tables
            .convert(input.field_type(), unquote(piece.trim()))
            .map_err(|e| ctx.invalid(format!("value {e:#}")))?;
        values.push(converted);
    }
    Ok(Box::new(In {
        input,
        values,
        output: ctx.output(),
        tables: Arc::clone(ctx.tables),
    }))
}

#[derive(Debug)]
struct In {
    input: FieldRef,
    values: Vec<Value>,
    output: Output,
    tables: Arc<TypeTables>,
}

impl Transform for In {
    fn transform(&mut self, row: &mut Row, _ctx: &mut TransformContext<'_>) {
        let candidate = self.input.read(row);
        let found = self
            .values
            .iter()
            .any(|value| self.tables.compare(ComparisonOperator::Equal, candidate, value));
        self.output.write(row, Value::Bool(found));
    }
}

// ============================================================
//  🟰 equals
// ============================================================

fn build_equals(ctx: &mut BuildContext<'_>) -> Result<Box<dyn Transform>, BuildError> {
    let inputs = ctx.inputs()?;
    if inputs.len() < 2 {
        return Err(ctx.invalid("equals needs at least two fields to compare"));
    }
    Ok(Box::new(Equals {
        inputs,
        output: ctx.output(),
        tables: Arc::clone(ctx.tables),
    }))
}

#[derive(Debug)]
struct Equals {
    inputs: Vec<FieldRef>,
    output: Output,
    tables: Arc<TypeTables>,
}

impl Transform for Equals {
    fn transform(&mut self, row: &mut Row, _ctx: &mut TransformContext<'_>) {
        let first = self.inputs[0].read(row);
        let all_equal = self.inputs[1..]
            .iter()
            .all(|other| self.tables.compare(ComparisonOperator::Equal, first, other.read(row)));
        self.output.write(row, Value::Bool(all_equal));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{EntitySchema, Field, ProcessSchema, TransformSpec};
    use crate::shorthand;
    use crate::transforms::test_support::build_step;

    fn harness() -> anyhow::Result<(ProcessSchema, EntitySchema)> {
        let entity = EntitySchema::new(
            "TestData",
            vec![
                Field::new("Field1", FieldType::Int32),
                Field::new("Field2", FieldType::Int32),
                Field::new("Result", FieldType::Int32).calculated(),
                Field::new("Flag", FieldType::Boolean).calculated(),
            ],
        )?;
        let process = ProcessSchema::new("p", vec![entity.clone()]);
        Ok((process, entity))
    }

    fn row(a: i32, b: i32) -> Row {
        Row::from_values(vec![Value::Int32(a), Value::Int32(b), Value::Int32(0), Value::Bool(false)])
    }

    fn one_step(expression: &str) -> anyhow::Result<TransformSpec> {
        shorthand::parse(expression)?
            .into_iter()
            .next()
            .ok_or_else(|| anyhow::anyhow!("no step parsed"))
    }

    #[test]
    fn the_one_where_iif_picks_the_bigger_number() -> anyhow::Result<()> {
        let (process, entity) = harness()?;
        let mut the_step = build_step(
            &process,
            &entity,
            "Result",
            one_step("iif(Field1 > Field2, Field1, Field2)")?,
            FieldType::Int32,
        )
        .map_err(|e| anyhow::anyhow!("{e}"))?;
        assert_eq!(the_step.transform(row(4, 3))[2], Value::Int32(4));
        assert_eq!(the_step.transform(row(1, 3))[2], Value::Int32(3));
        Ok(())
    }

    #[test]
    fn the_one_where_iif_compares_against_a_literal() -> anyhow::Result<()> {
        let (process, entity) = harness()?;
        let mut the_step = build_step(
            &process,
            &entity,
            "Result",
            one_step("iif(Field1 = 5, 100, 0)")?,
            FieldType::Int32,
        )
        .map_err(|e| anyhow::anyhow!("{e}"))?;
        assert_eq!(the_step.transform(row(5, 0))[2], Value::Int32(100));
        assert_eq!(the_step.transform(row(6, 0))[2], Value::Int32(0));
        Ok(())
    }

    #[test]
    fn the_one_where_iif_forgot_the_operator() -> anyhow::Result<()> {
        let (process, entity) = harness()?;
        let the_result = build_step(
            &process,
            &entity,
            "Result",
            one_step("iif(Field1, 1, 0)")?,
            FieldType::Int32,
        );
        assert!(matches!(the_result, Err(BuildError::Invalid(_))));
        Ok(())
    }

    #[test]
    fn the_one_where_membership_is_checked() -> anyhow::Result<()> {
        let (process, entity) = harness()?;
        let mut the_step = build_step(
            &process,
            &entity,
            "Flag",
            one_step("in(1,2,3)")?.with_parameters(["Field1"]),
            FieldType::Int32,
        )
        .map_err(|e| anyhow::anyhow!("{e}"))?;
        assert_eq!(the_step.transform(row(2, 0))[3], Value::Bool(true));
        assert_eq!(the_step.transform(row(7, 0))[3], Value::Bool(false));
        Ok(())
    }

    #[test]
    fn the_one_where_twins_are_detected() -> anyhow::Result<()> {
        let (process, entity) = harness()?;
        let mut the_step = build_step(
            &process,
            &entity,
            "Flag",
            one_step("equals(Field1, Field2)")?,
            FieldType::Boolean,
        )
        .map_err(|e| anyhow::anyhow!("{e}"))?;
        assert_eq!(the_step.transform(row(2, 2))[3], Value::Bool(true));
        assert_eq!(the_step.transform(row(2, 3))[3], Value::Bool(false));

        let the_lonely = build_step(
            &process,
            &entity,
            "Flag",
            one_step("equals(Field1)")?,
            FieldType::Boolean,
        );
        assert!(matches!(the_lonely, Err(BuildError::Invalid(_))));
        Ok(())
    }
}

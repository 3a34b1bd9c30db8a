//! 🔢 Numeric kinds — `add`/`sum`, `multiply`, `round`, `abs`.
//!
//! Sums and products run in `Decimal` unless the step's output type is `Double`, in which case
//! they run in `f64`. Nulls are skipped. Overflow is a row error, not a wraparound.

use std::sync::Arc;

use rust_decimal::{Decimal, RoundingStrategy};

use crate::common::{Row, Value};
use crate::conversion::TypeTables;
use crate::schema::FieldType;
use crate::transforms::{
    Accepts, BuildContext, BuildError, FieldRef, Output, Registration, Returns, Signature,
    Transform, TransformContext, TransformRegistry,
};

pub(crate) fn register(registry: &mut TransformRegistry) {
    registry.register(
        &["add", "sum"],
        Registration {
            signature: Signature::Fields,
            accepts: Accepts::Numeric,
            returns: Returns::Widest,
            build: build_add,
        },
    );
    registry.register(
        &["multiply"],
        Registration {
            signature: Signature::Fields,
            accepts: Accepts::Numeric,
            returns: Returns::Widest,
            build: build_multiply,
        },
    );
    registry.register(
        &["round"],
        Registration {
            signature: Signature::Named(&[("decimals", Some("0"))]),
            accepts: Accepts::Numeric,
            returns: Returns::Received,
            build: build_round,
        },
    );
    registry.register(
        &["abs"],
        Registration {
            signature: Signature::Named(&[]),
            accepts: Accepts::Numeric,
            returns: Returns::Received,
            build: build_abs,
        },
    );
}

/// 📏 The widest numeric type among `types`: double beats decimal beats the integers.
pub fn widest(types: impl IntoIterator<Item = FieldType>) -> FieldType {
    if types.into_iter().any(|t| t == FieldType::Double) {
        FieldType::Double
    } else {
        FieldType::Decimal
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Fold {
    Add,
    Multiply,
}

fn build_add(ctx: &mut BuildContext<'_>) -> Result<Box<dyn Transform>, BuildError> {
    build_fold(ctx, Fold::Add)
}

fn build_multiply(ctx: &mut BuildContext<'_>) -> Result<Box<dyn Transform>, BuildError> {
    build_fold(ctx, Fold::Multiply)
}

fn build_fold(ctx: &mut BuildContext<'_>, fold: Fold) -> Result<Box<dyn Transform>, BuildError> {
    Ok(Box::new(Arithmetic {
        fold,
        inputs: ctx.inputs()?,
        output: ctx.output(),
        tables: Arc::clone(ctx.tables),
    }))
}

#[derive(Debug)]
struct Arithmetic {
    fold: Fold,
    inputs: Vec<FieldRef>,
    output: Output,
    tables: Arc<TypeTables>,
}

impl Arithmetic {
    fn fold_f64(&self, row: &Row) -> Result<f64, String> {
        let mut total = match self.fold {
            Fold::Add => 0.0,
            Fold::Multiply => 1.0,
        };
        for input in &self.inputs {
            let value = input.read(row);
            if value.is_null() {
                continue;
            }
            let operand = match value.as_f64() {
                Some(operand) => operand,
                None => self
                    .tables
                    .coerce(FieldType::Double, value)
                    .ok()
                    .and_then(|v| v.as_f64())
                    .ok_or_else(|| format!("'{}' = '{value}' is not a number", input.alias()))?,
            };
            total = match self.fold {
                Fold::Add => total + operand,
                Fold::Multiply => total * operand,
            };
        }
        Ok(total)
    }

    fn fold_decimal(&self, row: &Row) -> Result<Decimal, String> {
        let mut total = match self.fold {
            Fold::Add => Decimal::ZERO,
            Fold::Multiply => Decimal::ONE,
        };
        for input in &self.inputs {
            let value = input.read(row);
            if value.is_null() {
                continue;
            }
            let operand = match value.as_decimal() {
                Some(operand) => operand,
                None => self
                    .tables
                    .coerce(FieldType::Decimal, value)
                    .ok()
                    .and_then(|v| v.as_decimal())
                    .ok_or_else(|| format!("'{}' = '{value}' is not a number", input.alias()))?,
            };
            total = match self.fold {
                Fold::Add => total.checked_add(operand),
                Fold::Multiply => total.checked_mul(operand),
            }
            .ok_or_else(|| "the result overflows a decimal".to_string())?;
        }
        Ok(total)
    }
}

impl Transform for Arithmetic {
    fn transform(&mut self, row: &mut Row, ctx: &mut TransformContext<'_>) {
        let result = if self.output.field_type == FieldType::Double {
            self.fold_f64(row).map(Value::Double)
        } else {
            self.fold_decimal(row).map(Value::Decimal)
        };
        let converted = result.and_then(|value| {
            self.tables
                .coerce(self.output.field_type, &value)
                .map_err(|e| format!("{e:#}"))
        });
        match converted {
            Ok(value) => self.output.write(row, value),
            Err(message) => ctx.error(message),
        }
    }
}

fn build_round(ctx: &mut BuildContext<'_>) -> Result<Box<dyn Transform>, BuildError> {
    let decimals: u32 = ctx.parse_setting("decimals")?;
    Ok(Box::new(Round {
        decimals,
        input: ctx.single_input()?,
        output: ctx.output(),
    }))
}

#[derive(Debug)]
struct Round {
    decimals: u32,
    input: FieldRef,
    output: Output,
}

impl Transform for Round {
    fn transform(&mut self, row: &mut Row, ctx: &mut TransformContext<'_>) {
        let rounded = match self.input.read(row) {
            Value::Double(d) => {
                let scale = 10_f64.powi(self.decimals.min(15) as i32);
                Value::Double((d * scale).round() / scale)
            }
            Value::Decimal(d) => {
                Value::Decimal(d.round_dp_with_strategy(self.decimals, RoundingStrategy::MidpointAwayFromZero))
            }
            v @ (Value::Int32(_) | Value::Int64(_) | Value::Null) => v.clone(),
            other => {
                ctx.error(format!("'{}' = '{other}' is not a number", self.input.alias()));
                return;
            }
        };
        self.output.write(row, rounded);
    }
}

fn build_abs(ctx: &mut BuildContext<'_>) -> Result<Box<dyn Transform>, BuildError> {
    Ok(Box::new(Abs {
        input: ctx.single_input()?,
        output: ctx.output(),
    }))
}

#[derive(Debug)]
struct Abs {
    input: FieldRef,
    output: Output,
}

impl Transform for Abs {
    fn transform(&mut self, row: &mut Row, ctx: &mut TransformContext<'_>) {
        let absolute = match self.input.read(row) {
            Value::Int32(i) => i.checked_abs().map(Value::Int32),
            Value::Int64(i) => i.checked_abs().map(Value::Int64),
            Value::Double(d) => Some(Value::Double(d.abs())),
            Value::Decimal(d) => Some(Value::Decimal(d.abs())),
            Value::Null => Some(Value::Null),
            other => {
                ctx.error(format!("'{}' = '{other}' is not a number", self.input.alias()));
                return;
            }
        };
        match absolute {
            Some(value) => self.output.write(row, value),
            None => ctx.error(format!("the absolute value of '{}' overflows", self.input.alias())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{EntitySchema, Field, ProcessSchema, TransformSpec};
    use crate::transforms::test_support::build_step;

    fn harness() -> anyhow::Result<(ProcessSchema, EntitySchema)> {
        let entity = EntitySchema::new(
            "Numbers",
            vec![
                Field::new("A", FieldType::Int32),
                Field::new("B", FieldType::Decimal),
                Field::new("C", FieldType::Double),
                Field::new("Total", FieldType::Decimal).calculated(),
            ],
        )?;
        let process = ProcessSchema::new("p", vec![entity.clone()]);
        Ok((process, entity))
    }

    fn row() -> Row {
        Row::from_values(vec![
            Value::Int32(2),
            Value::Decimal(Decimal::new(15, 1)),
            Value::Double(-2.5),
            Value::Null,
        ])
    }

    #[test]
    fn the_one_where_numbers_are_added_up() -> anyhow::Result<()> {
        let (process, entity) = harness()?;
        let mut the_sum = build_step(
            &process,
            &entity,
            "Total",
            TransformSpec::new("add").with_parameters(["A", "B"]),
            FieldType::Decimal,
        )
        .map_err(|e| anyhow::anyhow!("{e}"))?;
        assert_eq!(the_sum.transform(row())[3], Value::Decimal(Decimal::new(35, 1)));

        let mut the_product = build_step(
            &process,
            &entity,
            "Total",
            TransformSpec::new("multiply").with_parameters(["A", "C"]),
            FieldType::Double,
        )
        .map_err(|e| anyhow::anyhow!("{e}"))?;
        assert_eq!(the_product.transform(row())[3], Value::Double(-5.0));
        Ok(())
    }

    #[test]
    fn the_one_where_rounding_goes_away_from_zero() -> anyhow::Result<()> {
        let (process, entity) = harness()?;
        let mut the_step = build_step(
            &process,
            &entity,
            "B",
            TransformSpec::new("round"),
            FieldType::Decimal,
        )
        .map_err(|e| anyhow::anyhow!("{e}"))?;
        assert_eq!(the_step.transform(row())[1], Value::Decimal(Decimal::from(2)));

        let mut the_abs = build_step(&process, &entity, "C", TransformSpec::new("abs"), FieldType::Double)
            .map_err(|e| anyhow::anyhow!("{e}"))?;
        assert_eq!(the_abs.transform(row())[2], Value::Double(2.5));
        Ok(())
    }

    #[test]
    fn the_one_where_the_widest_type_wins() {
        assert_eq!(widest([FieldType::Int32, FieldType::Decimal]), FieldType::Decimal);
        assert_eq!(widest([FieldType::Int64, FieldType::Double]), FieldType::Double);
    }
}

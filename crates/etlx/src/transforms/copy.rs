//! 📋 copy — the humblest transform. Reads one value, writes it somewhere else.

use crate::common::Row;
use crate::transforms::{
    Accepts, BuildContext, BuildError, FieldRef, Output, Registration, Returns, Signature,
    Transform, TransformContext, TransformRegistry,
};

pub(crate) fn register(registry: &mut TransformRegistry) {
    registry.register(
        &["copy"],
        Registration {
            signature: Signature::Fields,
            accepts: Accepts::Any,
            returns: Returns::Received,
            build,
        },
    );
}

fn build(ctx: &mut BuildContext<'_>) -> Result<Box<dyn Transform>, BuildError> {
    if ctx.spec.parameters.len() > 1 {
        return Err(ctx.invalid(
            "copy reads exactly one field; follow it with another step to hand that step several",
        ));
    }
    Ok(Box::new(CopyValue {
        input: ctx.single_input()?,
        output: ctx.output(),
    }))
}

#[derive(Debug)]
struct CopyValue {
    input: FieldRef,
    output: Output,
}

impl Transform for CopyValue {
    fn transform(&mut self, row: &mut Row, _ctx: &mut TransformContext<'_>) {
        let value = self.input.read(row).clone();
        self.output.write(row, value);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::Value;
    use crate::schema::{EntitySchema, Field, FieldType, ProcessSchema, TransformSpec};
    use crate::transforms::test_support::build_step;

    #[test]
    fn the_one_where_a_value_moves_next_door() -> anyhow::Result<()> {
        let entity = EntitySchema::new(
            "People",
            vec![
                Field::new("Name", FieldType::String),
                Field::new("Copied", FieldType::String).calculated(),
            ],
        )?;
        let process = ProcessSchema::new("p", vec![entity.clone()]);
        let mut the_step = build_step(
            &process,
            &entity,
            "Copied",
            TransformSpec::new("copy").with_parameters(["name"]),
            FieldType::String,
        )
        .map_err(|e| anyhow::anyhow!("{e}"))?;

        let the_row = the_step.transform(crate::common::Row::from_values(vec![
            Value::from("Dale"),
            Value::Null,
        ]));
        assert_eq!(the_row[1], Value::from("Dale"));
        assert_eq!(the_step.row_count(), 1);
        Ok(())
    }
}

//! 🔄 convert — `convert(int)`, `convert(datetime)`... the value changes clothes, not identity.

use std::sync::Arc;

use crate::common::Row;
use crate::conversion::TypeTables;
use crate::schema::FieldType;
use crate::transforms::{
    Accepts, BuildContext, BuildError, FieldRef, Output, Registration, Returns, Signature,
    Transform, TransformContext, TransformRegistry,
};

pub(crate) fn register(registry: &mut TransformRegistry) {
    registry.register(
        &["convert"],
        Registration {
            signature: Signature::Named(&[("type", None)]),
            accepts: Accepts::Any,
            returns: Returns::FromSetting("type"),
            build,
        },
    );
}

fn build(ctx: &mut BuildContext<'_>) -> Result<Box<dyn Transform>, BuildError> {
    let raw = ctx.require("type")?;
    let target: FieldType = raw
        .parse()
        .map_err(|e: String| ctx.invalid(e))?;
    Ok(Box::new(Convert {
        input: ctx.single_input()?,
        output: Output {
            index: ctx.field.index,
            field_type: target,
        },
        tables: Arc::clone(ctx.tables),
    }))
}

#[derive(Debug)]
struct Convert {
    input: FieldRef,
    output: Output,
    tables: Arc<TypeTables>,
}

impl Transform for Convert {
    fn transform(&mut self, row: &mut Row, ctx: &mut TransformContext<'_>) {
        match self.tables.coerce(self.output.field_type, self.input.read(row)) {
            Ok(value) => self.output.write(row, value),
            Err(e) => ctx.error(format!("'{}' {e:#}", self.input.alias())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::Value;
    use crate::schema::{EntitySchema, Field, ProcessSchema, TransformSpec};
    use crate::transforms::test_support::build_step;

    #[test]
    fn the_one_where_text_becomes_a_number_or_complains() -> anyhow::Result<()> {
        let entity = EntitySchema::new("Raw", vec![Field::new("Amount", FieldType::String)])?;
        let process = ProcessSchema::new("p", vec![entity.clone()]);
        let mut the_step = build_step(
            &process,
            &entity,
            "Amount",
            TransformSpec::new("convert").with_setting("type", "int"),
            FieldType::String,
        )
        .map_err(|e| anyhow::anyhow!("{e}"))?;
        assert_eq!(the_step.output_type(), FieldType::Int32);
        assert_eq!(the_step.transform(Row::from_values(vec![Value::from("42")]))[0], Value::Int32(42));

        let the_row = the_step.transform(Row::from_values(vec![Value::from("forty-two")]));
        assert_eq!(the_row[0], Value::from("forty-two"), "slot left alone");
        assert_eq!(the_step.diagnostics().errors().len(), 1);
        Ok(())
    }

    #[test]
    fn the_one_where_the_type_is_made_up() -> anyhow::Result<()> {
        let entity = EntitySchema::new("Raw", vec![Field::new("Amount", FieldType::String)])?;
        let process = ProcessSchema::new("p", vec![entity.clone()]);
        let the_result = build_step(
            &process,
            &entity,
            "Amount",
            TransformSpec::new("convert").with_setting("type", "quaternion"),
            FieldType::String,
        );
        assert!(matches!(the_result, Err(BuildError::Invalid(_))));
        Ok(())
    }
}

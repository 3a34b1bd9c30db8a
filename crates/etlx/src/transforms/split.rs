//! ✂️ split & join — strings into lists, lists into strings. The circle of life.

use crate::common::{Row, Value};
use crate::schema::FieldType;
use crate::transforms::{
    Accepts, BuildContext, BuildError, FieldRef, Output, Registration, Returns, Signature,
    Transform, TransformContext, TransformRegistry,
};

pub(crate) fn register(registry: &mut TransformRegistry) {
    registry.register(
        &["split"],
        Registration {
            signature: Signature::Named(&[("separator", Some(","))]),
            accepts: Accepts::Text,
            returns: Returns::Fixed(FieldType::Object),
            build: build_split,
        },
    );
    registry.register(
        &["join"],
        Registration {
            signature: Signature::Named(&[("separator", Some(","))]),
            accepts: Accepts::Any,
            returns: Returns::Fixed(FieldType::String),
            build: build_join,
        },
    );
}

// -- 🧹 an empty separator would split between every char. we assume that's a typo for ","
fn separator(ctx: &BuildContext<'_>) -> String {
    match ctx.setting("separator") {
        Some(s) if !s.is_empty() => s.to_string(),
        _ => ",".to_string(),
    }
}

fn build_split(ctx: &mut BuildContext<'_>) -> Result<Box<dyn Transform>, BuildError> {
    Ok(Box::new(Split {
        separator: separator(ctx),
        input: ctx.single_input()?,
        output: ctx.output(),
    }))
}

fn build_join(ctx: &mut BuildContext<'_>) -> Result<Box<dyn Transform>, BuildError> {
    Ok(Box::new(Join {
        separator: separator(ctx),
        inputs: ctx.inputs()?,
        output: ctx.output(),
    }))
}

#[derive(Debug)]
struct Split {
    separator: String,
    input: FieldRef,
    output: Output,
}

impl Transform for Split {
    fn transform(&mut self, row: &mut Row, _ctx: &mut TransformContext<'_>) {
        let pieces = match self.input.read(row) {
            Value::Null => Vec::new(),
            value => value
                .to_string()
                .split(self.separator.as_str())
                .map(str::to_string)
                .collect(),
        };
        self.output.write(row, Value::List(pieces));
    }
}

#[derive(Debug)]
struct Join {
    separator: String,
    inputs: Vec<FieldRef>,
    output: Output,
}

impl Transform for Join {
    fn transform(&mut self, row: &mut Row, _ctx: &mut TransformContext<'_>) {
        let joined = match self.inputs.as_slice() {
            [single] => match single.read(row) {
                Value::List(items) => items.join(&self.separator),
                other => other.to_string(),
            },
            many => many
                .iter()
                .map(|input| input.read(row).to_string())
                .collect::<Vec<_>>()
                .join(&self.separator),
        };
        self.output.write(row, Value::String(joined));
    }
}

// ai
//! 🔗 The Transform Chain Builder — specs in, ordered executable chains out 🏗️🚀
//!
//! 🎬 COLD OPEN — INT. BUILD SITE — BEFORE THE FIRST ROW
//!
//! Every field with transform specs gets a foreman. The foreman walks the specs in
//! order, asks the registry for each kind, checks that what the previous step hands
//! over is something this step can actually hold, and bolts the step on. If a step
//! doesn't fit, the foreman puts up a sign ("CLOSED: misconfigured") on that one field
//! and goes home. The rest of the site keeps working. 🚧
//!
//! ## Knowledge Graph 🧠
//! - Received type for step N: step N-1's `returns` override, else its static output type.
//!   Step 0 receives the field's own declared type.
//! - A step that names parameters is type-checked against its first parameter instead.
//! - [`BuildError::Invalid`] disables one field's chain and records one error.
//!   [`BuildError::Fatal`] releases everything built so far and fails the entity.
//! - Evaluation order is topological over "field B's chain reads field A". Ties go to
//!   declaration order. Fields caught in a dependency cycle are disabled.
//!
//! 🦆

use std::collections::{BTreeSet, HashSet};
use std::sync::Arc;

use anyhow::Result;
use tracing::{debug, error};

use crate::common::Row;
use crate::conversion::TypeTables;
use crate::schema::{EntitySchema, Field, FieldType, ProcessSchema};
use crate::transforms::numeric::widest;
use crate::transforms::{
    BoundTransform, BuildContext, BuildError, Diagnostics, Returns, ScriptReader, TransformRegistry,
};

/// 🏗️ Builds the chains of one process. Cheap; holds borrows and one `Arc`.
pub struct ChainBuilder<'a> {
    process: &'a ProcessSchema,
    registry: &'a TransformRegistry,
    tables: Arc<TypeTables>,
    scripts: &'a dyn ScriptReader,
}

impl<'a> ChainBuilder<'a> {
    pub fn new(
        process: &'a ProcessSchema,
        registry: &'a TransformRegistry,
        tables: Arc<TypeTables>,
        scripts: &'a dyn ScriptReader,
    ) -> Self {
        Self {
            process,
            registry,
            tables,
            scripts,
        }
    }

    /// 🏗️ Every field chain of `entity`, in evaluation order.
    ///
    /// `Err` only for fatal (resource) failures; configuration problems come back as
    /// disabled chains with their one error each.
    pub fn build_entity(&self, entity: &EntitySchema) -> Result<EntityChains> {
        let mut chains: Vec<FieldChain> = Vec::new();
        for field in entity.fields().iter().filter(|f| !f.transforms.is_empty()) {
            match self.build_field(entity, field) {
                Ok(chain) => chains.push(chain),
                Err(fatal) => {
                    for chain in &mut chains {
                        chain.release();
                    }
                    return Err(fatal);
                }
            }
        }
        let order = evaluation_order(&entity.name, &mut chains);
        debug!(
            "🔗 {} chain(s) built for '{}', evaluation order: {:?}",
            chains.len(),
            entity.name,
            order.iter().map(|&i| chains[i].alias()).collect::<Vec<_>>()
        );
        Ok(EntityChains {
            entity: entity.name.clone(),
            chains,
            order,
        })
    }

    fn build_field(&self, entity: &EntitySchema, field: &Field) -> Result<FieldChain> {
        let mut chain = FieldChain::new(entity, field, Arc::clone(&self.tables));
        let mut received = field.field_type;

        for (position, spec) in field.transforms.iter().enumerate() {
            let Some(registration) = self.registry.get(&spec.method) else {
                chain.disable(format!(
                    "{}.{} step {} ({}): '{}' is not a transform we know",
                    entity.name,
                    field.alias,
                    position + 1,
                    spec.method,
                    spec.method
                ));
                return Ok(chain);
            };
            let bound = registration.signature.bind(spec);

            // -- 🔍 what this step actually reads first: its first parameter, or the value flowing down the chain
            let probe = BuildContext::new(
                self.process, entity, field, &bound, position, received, received, &self.tables, self.scripts,
            );
            let input_types: Vec<FieldType> = if bound.parameters.is_empty() {
                vec![received]
            } else {
                bound
                    .parameters
                    .iter()
                    .filter_map(|name| probe.lookup(name).map(|found| found.field_type()))
                    .collect()
            };
            if let Some(&first) = input_types.first() {
                if !registration.accepts.admits(first) {
                    chain.disable(format!(
                        "{}.{} step {} ({}): expects {} input but receives {}",
                        entity.name,
                        field.alias,
                        position + 1,
                        bound.method,
                        registration.accepts,
                        first
                    ));
                    return Ok(chain);
                }
            }

            let output_type = match registration.returns {
                Returns::Fixed(field_type) => field_type,
                Returns::OwningField => field.field_type,
                Returns::Received => input_types.first().copied().unwrap_or(received),
                Returns::Widest => widest(input_types.iter().copied()),
                Returns::FromSetting(key) => match bound.setting(key).map(str::parse::<FieldType>) {
                    Some(Ok(field_type)) => field_type,
                    _ => field.field_type,
                },
            };

            let mut ctx = BuildContext::new(
                self.process, entity, field, &bound, position, received, output_type, &self.tables, self.scripts,
            );
            match (registration.build)(&mut ctx) {
                Ok(inner) => {
                    chain.add_reads(ctx.into_reads());
                    let step = BoundTransform::new(&entity.name, field, &bound, output_type, inner, entity.log_interval);
                    received = step.output_type();
                    chain.steps.push(step);
                }
                Err(BuildError::Invalid(message)) => {
                    chain.disable(message);
                    return Ok(chain);
                }
                Err(BuildError::Fatal(cause)) => {
                    chain.release();
                    return Err(cause.context(format!(
                        "💀 {}.{} step {} ({}) could not acquire what it needs. The entity stops here.",
                        entity.name,
                        field.alias,
                        position + 1,
                        bound.method
                    )));
                }
            }
        }
        Ok(chain)
    }
}

/// ⛓️ One field's bound steps, plus the bookkeeping that makes it safe to skip.
#[derive(Debug)]
pub struct FieldChain {
    entity: String,
    alias: String,
    index: usize,
    field_type: FieldType,
    run: bool,
    steps: Vec<BoundTransform>,
    reads: Vec<usize>,
    build_errors: Vec<String>,
    diagnostics: Diagnostics,
    tables: Arc<TypeTables>,
}

impl FieldChain {
    fn new(entity: &EntitySchema, field: &Field, tables: Arc<TypeTables>) -> Self {
        Self {
            entity: entity.name.clone(),
            alias: field.alias.clone(),
            index: field.index,
            field_type: field.field_type,
            run: true,
            steps: Vec::new(),
            reads: Vec::new(),
            build_errors: Vec::new(),
            diagnostics: Diagnostics::default(),
            tables,
        }
    }

    pub fn alias(&self) -> &str {
        &self.alias
    }

    pub fn index(&self) -> usize {
        self.index
    }

    /// 🚦 `false` once a build problem (or a dependency cycle) switched this chain off.
    pub fn is_enabled(&self) -> bool {
        self.run
    }

    pub fn steps(&self) -> &[BoundTransform] {
        &self.steps
    }

    /// 📍 Other row slots this chain reads.
    pub fn reads(&self) -> &[usize] {
        &self.reads
    }

    pub fn build_errors(&self) -> &[String] {
        &self.build_errors
    }

    /// 📋 Row-time diagnostics from every step plus the chain's own type coercions.
    pub fn diagnostics(&self) -> Diagnostics {
        let mut all = Diagnostics::default();
        for step in &self.steps {
            all.merge(step.diagnostics());
        }
        all.merge(&self.diagnostics);
        all
    }

    fn add_reads(&mut self, reads: Vec<usize>) {
        for index in reads {
            if !self.reads.contains(&index) {
                self.reads.push(index);
            }
        }
    }

    /// 🚫 Switch the chain off, record the reason once, release whatever was acquired.
    fn disable(&mut self, message: String) {
        error!("🚫 {message}. The field passes its current value through untouched.");
        self.run = false;
        self.build_errors.push(message);
        self.release();
        self.steps.clear();
    }

    /// 🔄 Run every step in order on one row. A disabled chain hands the row straight back.
    pub fn run(&mut self, mut row: Row) -> Row {
        if !self.run {
            return row;
        }
        for step in &mut self.steps {
            row = step.transform(row);
            if let Some(returns) = step.returns() {
                coerce_slot(&mut row, self.index, returns, &self.tables, &mut self.diagnostics, &self.entity, &self.alias);
            }
        }
        coerce_slot(&mut row, self.index, self.field_type, &self.tables, &mut self.diagnostics, &self.entity, &self.alias);
        row
    }

    /// 🗑️ Release every external engine the steps own. Idempotent.
    pub fn release(&mut self) {
        for step in &mut self.steps {
            step.release();
        }
    }
}

fn coerce_slot(
    row: &mut Row,
    index: usize,
    field_type: FieldType,
    tables: &TypeTables,
    diagnostics: &mut Diagnostics,
    entity: &str,
    alias: &str,
) {
    let current = &row[index];
    if current.is_null() || current.field_type() == Some(field_type) {
        return;
    }
    match tables.coerce(field_type, current) {
        Ok(converted) => {
            row.set(index, converted);
        }
        Err(e) => {
            let message = format!("the chain result could not become a {field_type}: {e:#}");
            if diagnostics.error(message.clone()) {
                error!("💀 {entity}.{alias}: {message}");
            }
        }
    }
}

/// 🗂️ All chains of one entity and the order they run in.
#[derive(Debug)]
pub struct EntityChains {
    entity: String,
    chains: Vec<FieldChain>,
    order: Vec<usize>,
}

impl EntityChains {
    pub fn entity(&self) -> &str {
        &self.entity
    }

    pub fn chains(&self) -> &[FieldChain] {
        &self.chains
    }

    pub fn chain(&self, alias: &str) -> Option<&FieldChain> {
        self.chains.iter().find(|c| c.alias.eq_ignore_ascii_case(alias))
    }

    /// 🧭 Field aliases in the order their chains run.
    pub fn evaluation_order(&self) -> Vec<&str> {
        self.order.iter().map(|&i| self.chains[i].alias()).collect()
    }

    /// 🔄 Every enabled chain, in evaluation order, on one row.
    pub fn run(&mut self, mut row: Row) -> Row {
        for &position in &self.order {
            row = self.chains[position].run(row);
        }
        row
    }

    pub fn build_errors(&self) -> Vec<String> {
        self.chains.iter().flat_map(|c| c.build_errors.iter().cloned()).collect()
    }

    pub fn diagnostics(&self) -> Diagnostics {
        let mut all = Diagnostics::default();
        for chain in &self.chains {
            all.merge(&chain.diagnostics());
        }
        all
    }

    pub fn release(&mut self) {
        for chain in &mut self.chains {
            chain.release();
        }
    }
}

/// 🧭 Kahn's algorithm with the smallest ready field index first. Chains stuck in a
/// cycle are disabled and the order is recomputed without them.
fn evaluation_order(entity: &str, chains: &mut [FieldChain]) -> Vec<usize> {
    let (order, stuck) = topological(chains);
    if stuck.is_empty() {
        return order;
    }

    let cyclic: Vec<usize> = stuck
        .iter()
        .copied()
        .filter(|&start| reaches(chains, start, start))
        .collect();
    let names: Vec<String> = cyclic.iter().map(|&i| chains[i].alias.clone()).collect();
    for &position in &cyclic {
        let message = format!(
            "{}.{}: circular dependency between {}",
            entity,
            chains[position].alias,
            names.join(", ")
        );
        chains[position].disable(message);
    }
    let (order, still_stuck) = topological(chains);
    debug_assert!(still_stuck.is_empty(), "removing every cyclic chain leaves a DAG");
    order
}

/// Positions (into `chains`) of the enabled chains `position` depends on.
fn dependencies(chains: &[FieldChain], position: usize) -> Vec<usize> {
    chains[position]
        .reads
        .iter()
        .filter_map(|&index| chains.iter().position(|c| c.index == index && c.run))
        .filter(|&dependency| dependency != position)
        .collect()
}

fn topological(chains: &[FieldChain]) -> (Vec<usize>, Vec<usize>) {
    let enabled: Vec<usize> = (0..chains.len()).filter(|&i| chains[i].run).collect();
    let mut pending: Vec<(usize, Vec<usize>)> = enabled.iter().map(|&i| (i, dependencies(chains, i))).collect();
    let mut done: HashSet<usize> = HashSet::new();
    let mut order = Vec::with_capacity(enabled.len());

    loop {
        // -- 🥇 of everything ready, the one declared first goes first
        let ready: BTreeSet<(usize, usize)> = pending
            .iter()
            .filter(|(_, deps)| deps.iter().all(|d| done.contains(d)))
            .map(|(position, _)| (chains[*position].index, *position))
            .collect();
        let Some(&(_, next)) = ready.first() else {
            break;
        };
        order.push(next);
        done.insert(next);
        pending.retain(|(position, _)| *position != next);
    }
    // -- disabled chains still belong in the order; running them is a passthrough
    for position in 0..chains.len() {
        if !chains[position].run {
            order.push(position);
        }
    }
    (order, pending.into_iter().map(|(position, _)| position).collect())
}

fn reaches(chains: &[FieldChain], from: usize, target: usize) -> bool {
    let mut stack = dependencies(chains, from);
    let mut seen = HashSet::new();
    while let Some(position) = stack.pop() {
        if position == target {
            return true;
        }
        if seen.insert(position) {
            stack.extend(dependencies(chains, position));
        }
    }
    false
}

/// 🧪 Convenience for callers that only want to know whether a process would build.
pub fn check_entity(builder: &ChainBuilder<'_>, entity: &EntitySchema) -> Result<Vec<String>> {
    let mut chains = builder.build_entity(entity)?;
    let errors = chains.build_errors();
    chains.release();
    Ok(errors)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::Value;
    use crate::schema::TransformSpec;
    use crate::shorthand;
    use crate::transforms::test_support::MemoryScripts;

    fn calculated(name: &str, field_type: FieldType, t: &str) -> anyhow::Result<Field> {
        Ok(Field::new(name, field_type)
            .calculated()
            .with_transforms(shorthand::parse(t)?))
    }

    fn build(entity: &EntitySchema) -> anyhow::Result<EntityChains> {
        let process = ProcessSchema::new("p", vec![entity.clone()]);
        let registry = TransformRegistry::standard();
        let scripts = MemoryScripts::default();
        let builder = ChainBuilder::new(&process, &registry, Arc::new(TypeTables::standard()), &scripts);
        builder.build_entity(entity)
    }

    #[test]
    fn the_one_where_the_calculated_field_reads_another_calculated_field() -> anyhow::Result<()> {
        // -- declared "backwards": Shout reads Greeting, which is declared after it
        let entity = EntitySchema::new(
            "People",
            vec![
                Field::new("Name", FieldType::String),
                calculated("Shout", FieldType::String, "copy(Greeting).upper()")?,
                calculated("Greeting", FieldType::String, "copy(Name).format(hello {0})")?,
            ],
        )?;
        let mut the_chains = build(&entity)?;
        assert_eq!(the_chains.evaluation_order(), vec!["Greeting", "Shout"]);

        let the_row = the_chains.run(Row::from_values(vec![Value::from("ross"), Value::Null, Value::Null]));
        assert_eq!(the_row[2], Value::from("hello ross"));
        assert_eq!(the_row[1], Value::from("HELLO ROSS"));
        Ok(())
    }

    #[test]
    fn the_one_where_a_type_mismatch_closes_one_field() -> anyhow::Result<()> {
        let entity = EntitySchema::new(
            "Numbers",
            vec![
                Field::new("Amount", FieldType::Int32).with_transforms(vec![TransformSpec::new("trim")]),
                Field::new("Label", FieldType::String).with_transforms(vec![TransformSpec::new("upper")]),
            ],
        )?;
        let mut the_chains = build(&entity)?;
        let the_amount = the_chains.chain("Amount").expect("chain exists");
        assert!(!the_amount.is_enabled());
        assert_eq!(the_chains.build_errors().len(), 1);
        assert!(the_chains.build_errors()[0].contains("expects string input but receives int32"));

        let the_row = the_chains.run(Row::from_values(vec![Value::Int32(7), Value::from("ok")]));
        assert_eq!(the_row[0], Value::Int32(7), "passthrough");
        assert_eq!(the_row[1], Value::from("OK"), "the neighbour is unaffected");
        Ok(())
    }

    #[test]
    fn the_one_where_received_types_flow_down_the_chain() -> anyhow::Result<()> {
        // -- length hands an int32 to padleft, which only takes strings
        let entity = EntitySchema::new(
            "Words",
            vec![Field::new("Text", FieldType::String).with_transforms(shorthand::parse("length().padleft(3)")?)],
        )?;
        let the_chains = build(&entity)?;
        assert_eq!(the_chains.build_errors().len(), 1);

        // -- ...unless `returns` says otherwise
        let the_length = TransformSpec::new("length").with_returns(FieldType::String);
        let entity = EntitySchema::new(
            "Words",
            vec![Field::new("Text", FieldType::String)
                .with_transforms(vec![the_length, TransformSpec::new("padleft").with_setting("total_width", "3").with_setting("padding_char", "0")])],
        )?;
        let mut the_chains = build(&entity)?;
        assert!(the_chains.build_errors().is_empty());
        let the_row = the_chains.run(Row::from_values(vec![Value::from("abcd")]));
        assert_eq!(the_row[0], Value::from("004"));
        Ok(())
    }

    #[test]
    fn the_one_where_two_fields_chase_each_other() -> anyhow::Result<()> {
        let entity = EntitySchema::new(
            "Loop",
            vec![
                Field::new("Seed", FieldType::String),
                calculated("Chicken", FieldType::String, "copy(Egg).upper()")?,
                calculated("Egg", FieldType::String, "copy(Chicken).lower()")?,
                calculated("Bystander", FieldType::String, "copy(Seed).upper()")?,
            ],
        )?;
        let mut the_chains = build(&entity)?;
        assert_eq!(the_chains.build_errors().len(), 2);
        assert!(the_chains.chain("Bystander").is_some_and(FieldChain::is_enabled));

        let the_row = the_chains.run(Row::from_values(vec![Value::from("x"), Value::Null, Value::Null, Value::Null]));
        assert_eq!(the_row[3], Value::from("X"));
        Ok(())
    }

    #[test]
    fn the_one_where_an_unknown_method_is_a_config_problem() -> anyhow::Result<()> {
        let entity = EntitySchema::new(
            "Things",
            vec![Field::new("A", FieldType::String).with_transforms(vec![TransformSpec::new("teleport")])],
        )?;
        let the_chains = build(&entity)?;
        assert!(the_chains.build_errors()[0].contains("'teleport' is not a transform we know"));
        Ok(())
    }

    #[test]
    fn the_one_where_a_missing_script_file_stops_the_entity() -> anyhow::Result<()> {
        let entity = EntitySchema::new(
            "Scripted",
            vec![Field::new("A", FieldType::Int32).with_transforms(vec![
                TransformSpec::new("js").with_setting("script", "A + 1").with_setting("scripts", "lib"),
            ])],
        )?;
        let mut process = ProcessSchema::new("p", vec![entity.clone()]);
        process.scripts = vec![crate::schema::ScriptConfig {
            name: "lib".to_string(),
            content: String::new(),
            file: Some("nowhere.rhai".to_string()),
            global: false,
        }];
        let registry = TransformRegistry::standard();
        let scripts = MemoryScripts::default();
        let builder = ChainBuilder::new(&process, &registry, Arc::new(TypeTables::standard()), &scripts);
        let the_result = builder.build_entity(&entity);
        assert!(the_result.is_err());
        Ok(())
    }
}

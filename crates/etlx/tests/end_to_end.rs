//! 🎬 End to end: a TOML process goes in, a process report (and captured rows) comes out.
//!
//! Every test drives the public surface only: `AppConfig` from TOML, `etlx::run` or
//! `etlx::check`, and the rows an in-memory sink hands back through the report.

use std::io::Write;

use anyhow::{Context, Result};
use etlx::{AppConfig, ProcessReport};
use serde_json::json;

const IN_MEMORY_SINK: &str = "sink_config = { InMemory = {} }\n";

async fn run_toml(body: &str) -> Result<ProcessReport> {
    let config: AppConfig = toml::from_str(&format!("{IN_MEMORY_SINK}{body}"))?;
    etlx::run(config).await
}

fn rows_of(report: &ProcessReport, entity: &str) -> Result<Vec<serde_json::Value>> {
    report
        .entity(entity)
        .with_context(|| format!("entity {entity} is in the report"))?
        .captured_rows()
}

#[tokio::test]
async fn the_one_where_iif_picks_a_side() -> Result<()> {
    let report = run_toml(
        r#"
        [[process.entities]]
        name = "TestData"
        source = { InMemory = { rows = [ { Field1 = 4, Field2 = 3 }, { Field1 = 1, Field2 = 3 } ] } }

        [[process.entities.fields]]
        name = "Field1"
        type = "int32"

        [[process.entities.fields]]
        name = "Field2"
        type = "int32"

        [[process.entities.calculated_fields]]
        name = "Bigger"
        type = "int32"
        t = "iif(Field1 > Field2, Field1, Field2)"
        "#,
    )
    .await?;

    assert!(report.is_ok(), "{report}");
    let rows = rows_of(&report, "TestData")?;
    assert_eq!(rows[0]["Bigger"], json!(4));
    assert_eq!(rows[1]["Bigger"], json!(3));
    Ok(())
}

#[tokio::test]
async fn the_one_where_equal_twins_take_the_third_door() -> Result<()> {
    let report = run_toml(
        r#"
        [[process.entities]]
        name = "TestData"
        source = { InMemory = { rows = [ { Field1 = 2, Field2 = 1, Field3 = 3, Field4 = 4 }, { Field1 = 2, Field2 = 2, Field3 = 3, Field4 = 4 } ] } }

        [[process.entities.fields]]
        name = "Field1"
        type = "int32"

        [[process.entities.fields]]
        name = "Field2"
        type = "int32"

        [[process.entities.fields]]
        name = "Field3"
        type = "int32"

        [[process.entities.fields]]
        name = "Field4"
        type = "int32"

        [[process.entities.calculated_fields]]
        name = "Equal"
        type = "int32"
        t = "iif(Field1=Field2, Field3, Field4)"
        "#,
    )
    .await?;

    assert!(report.is_ok(), "{report}");
    let rows = rows_of(&report, "TestData")?;
    assert_eq!(rows[0]["Equal"], json!(4));
    assert_eq!(rows[1]["Equal"], json!(3));
    Ok(())
}

#[tokio::test]
async fn the_one_where_three_fields_become_one_sentence() -> Result<()> {
    let report = run_toml(
        r#"
        [[process.entities]]
        name = "TestData"
        source = { InMemory = { rows = [ { Field1 = 1, Field2 = 2, Field3 = 3.0 } ] } }

        [[process.entities.fields]]
        name = "Field1"
        type = "int32"

        [[process.entities.fields]]
        name = "Field2"
        type = "int32"

        [[process.entities.fields]]
        name = "Field3"
        type = "double"

        [[process.entities.calculated_fields]]
        name = "Format"
        t = "copy(Field1,Field2,Field3).format({Field1}-{Field2}+{Field3}).trim()"
        "#,
    )
    .await?;

    assert!(report.is_ok(), "{report}");
    assert_eq!(rows_of(&report, "TestData")?[0]["Format"], json!("1-2+3"));
    Ok(())
}

#[tokio::test]
async fn the_one_where_a_field_with_no_transforms_passes_straight_through() -> Result<()> {
    let report = run_toml(
        r#"
        [[process.entities]]
        name = "Plain"
        source = { InMemory = { rows = [ { Name = "dale", Age = 41 } ] } }

        [[process.entities.fields]]
        name = "Name"

        [[process.entities.fields]]
        name = "Age"
        type = "int32"
        "#,
    )
    .await?;

    assert!(report.is_ok(), "{report}");
    assert_eq!(rows_of(&report, "Plain")?, vec![json!({ "Name": "dale", "Age": 41 })]);
    Ok(())
}

#[tokio::test]
async fn the_one_where_the_map_clerk_checks_every_drawer() -> Result<()> {
    let report = run_toml(
        r#"
        [[process.maps]]
        name = "codes"
        items = [
            { from = "5", to = "prefix five", operator = "starts_with" },
            { from = "5", to = "exactly five" },
            { from = "0", to = "ends in zero", operator = "ends_with" },
        ]

        [[process.maps]]
        name = "catch_all"
        items = [ { from = "a", to = "A" }, { from = "*", to = "other" } ]

        [[process.entities]]
        name = "Codes"
        source = { InMemory = { rows = [ { Code = "5" }, { Code = "55" }, { Code = "10" }, { Code = "7" } ] } }

        [[process.entities.fields]]
        name = "Code"

        [[process.entities.calculated_fields]]
        name = "Meaning"
        t = "copy(Code).map(codes)"

        [[process.entities.calculated_fields]]
        name = "Bucket"
        t = "copy(Code).map(catch_all)"
        "#,
    )
    .await?;

    assert!(report.is_ok(), "{report}");
    let meanings: Vec<_> = rows_of(&report, "Codes")?
        .iter()
        .map(|row| (row["Meaning"].clone(), row["Bucket"].clone()))
        .collect();
    assert_eq!(
        meanings,
        vec![
            (json!("exactly five"), json!("other")),
            (json!("prefix five"), json!("other")),
            (json!("ends in zero"), json!("other")),
            (json!("7"), json!("other")),
        ]
    );
    Ok(())
}

#[tokio::test]
async fn the_one_where_a_hundred_tantrums_make_one_complaint() -> Result<()> {
    let rows: Vec<String> = (1..=100).map(|i| format!("{{ Field1 = {i} }}")).collect();
    let report = run_toml(&format!(
        r#"
        [[process.entities]]
        name = "Scripted"
        source = {{ InMemory = {{ rows = [ {} ] }} }}

        [[process.entities.fields]]
        name = "Field1"
        type = "int32"

        [[process.entities.calculated_fields]]
        name = "Total"
        type = "int32"
        transforms = [ {{ method = "js", script = "if Field1 > 0 {{ throw \"nope\"; }}\nField1" }} ]
        "#,
        rows.join(", ")
    ))
    .await?;

    let the_entity = report.entity("Scripted").context("Scripted ran")?;
    assert_eq!(the_entity.rows_read, 100);
    assert_eq!(the_entity.rows_written, 100, "bad rows are still written, best effort");
    assert_eq!(the_entity.errors.len(), 1);
    assert!(!report.is_ok());
    Ok(())
}

#[tokio::test]
async fn the_one_where_nobody_cuts_the_line() -> Result<()> {
    let rows: Vec<String> = (1..=50).map(|i| format!("{{ Id = {i}, Name = \"n{i}\" }}")).collect();
    let report = run_toml(&format!(
        r#"
        runtime = {{ queue_capacity = 1 }}

        [[process.entities]]
        name = "Ordered"
        source = {{ InMemory = {{ rows = [ {} ] }} }}

        [[process.entities.fields]]
        name = "Id"
        type = "int32"

        [[process.entities.fields]]
        name = "Name"
        t = "upper()"
        "#,
        rows.join(", ")
    ))
    .await?;

    let rows = rows_of(&report, "Ordered")?;
    assert_eq!(rows.len(), 50);
    for (i, row) in rows.iter().enumerate() {
        assert_eq!(row["Id"], json!(i + 1));
        assert_eq!(row["Name"], json!(format!("N{}", i + 1)));
    }
    Ok(())
}

#[tokio::test]
async fn the_one_where_one_broken_field_does_not_sink_the_ship() -> Result<()> {
    let report = run_toml(
        r#"
        [[process.entities]]
        name = "Numbers"
        source = { InMemory = { rows = [ { Amount = 7, Label = "ok" } ] } }

        [[process.entities.fields]]
        name = "Amount"
        type = "int32"
        t = "trim()"

        [[process.entities.fields]]
        name = "Label"
        t = "upper()"
        "#,
    )
    .await?;

    let the_entity = report.entity("Numbers").context("Numbers ran")?;
    assert_eq!(the_entity.build_errors.len(), 1);
    assert!(!report.is_ok(), "a build error marks the run as failed");
    assert_eq!(rows_of(&report, "Numbers")?, vec![json!({ "Amount": 7, "Label": "OK" })]);
    Ok(())
}

#[tokio::test]
async fn the_one_where_the_master_sits_with_every_kid() -> Result<()> {
    let report = run_toml(
        r#"
        [[process.relationships]]
        master = "Order"
        slave = "Line"
        master_key = ["OrderId"]

        [[process.entities]]
        name = "Order"
        source = { InMemory = { rows = [ { OrderId = 1, Customer = "ross" }, { OrderId = 2, Customer = "rachel" } ] } }

        [[process.entities.fields]]
        name = "OrderId"
        type = "int32"

        [[process.entities.fields]]
        name = "Customer"

        [[process.entities]]
        name = "Line"
        source = { InMemory = { rows = [ { OrderId = 1, Product = "apple" }, { OrderId = 1, Product = "pear" }, { OrderId = 1, Product = "fig" } ] } }

        [[process.entities.fields]]
        name = "OrderId"
        type = "int32"

        [[process.entities.fields]]
        name = "Product"
        t = "upper()"
        "#,
    )
    .await?;

    assert!(report.is_ok(), "{report}");
    assert!(report.entity("Line").is_some_and(|e| e.captured.is_none()), "slaves are not written on their own");
    let rows = rows_of(&report, "Order")?;
    assert_eq!(
        rows,
        vec![
            json!({ "OrderId": 1, "Customer": "ross", "Product": "APPLE" }),
            json!({ "OrderId": 1, "Customer": "ross", "Product": "PEAR" }),
            json!({ "OrderId": 1, "Customer": "ross", "Product": "FIG" }),
            json!({ "OrderId": 2, "Customer": "rachel", "Product": "" }),
        ]
    );
    Ok(())
}

#[tokio::test]
async fn the_one_where_the_kids_get_summarized() -> Result<()> {
    let report = run_toml(
        r#"
        [[process.relationships]]
        master = "Order"
        slave = "Line"
        master_key = ["OrderId"]
        join = "inner"
        shape = "aggregate"
        prefix = "Line"
        aggregates = { Product = "concat", Quantity = "sum" }

        [[process.entities]]
        name = "Order"
        source = { InMemory = { rows = [ { OrderId = 1 }, { OrderId = 2 } ] } }

        [[process.entities.fields]]
        name = "OrderId"
        type = "int32"

        [[process.entities]]
        name = "Line"
        source = { InMemory = { rows = [ { OrderId = 1, Product = "apple", Quantity = 2 }, { OrderId = 1, Product = "pear", Quantity = 3 } ] } }

        [[process.entities.fields]]
        name = "OrderId"
        type = "int32"

        [[process.entities.fields]]
        name = "Product"

        [[process.entities.fields]]
        name = "Quantity"
        type = "int32"
        "#,
    )
    .await?;

    assert!(report.is_ok(), "{report}");
    let rows = rows_of(&report, "Order")?;
    assert_eq!(rows.len(), 1, "inner join drops the order with no lines");
    assert_eq!(rows[0]["LineProduct"], json!("apple, pear"));
    assert_eq!(rows[0]["LineQuantity"], json!(5.0));
    Ok(())
}

#[tokio::test]
async fn the_one_where_membership_is_checked_at_the_door() -> Result<()> {
    let report = run_toml(
        r#"
        [[process.entities]]
        name = "Members"
        source = { InMemory = { rows = [ { Code = 2 }, { Code = 7 } ] } }

        [[process.entities.fields]]
        name = "Code"
        type = "int32"

        [[process.entities.calculated_fields]]
        name = "Allowed"
        type = "bool"
        t = "copy(Code).in(1,2,3)"
        "#,
    )
    .await?;

    assert!(report.is_ok(), "{report}");
    let rows = rows_of(&report, "Members")?;
    assert_eq!(rows[0]["Allowed"], json!(true));
    assert_eq!(rows[1]["Allowed"], json!(false));
    Ok(())
}

#[tokio::test]
async fn the_one_where_a_double_dresses_up() -> Result<()> {
    let report = run_toml(
        r#"
        [[process.entities]]
        name = "Measures"
        source = { InMemory = { rows = [ { Reading = 3.0 } ] } }

        [[process.entities.fields]]
        name = "Reading"
        type = "double"
        format = "000.0000"

        [[process.entities.calculated_fields]]
        name = "Label"
        t = "format({Reading})"
        "#,
    )
    .await?;

    assert!(report.is_ok(), "{report}");
    assert_eq!(rows_of(&report, "Measures")?[0]["Label"], json!("003.0000"));
    Ok(())
}

#[tokio::test]
async fn the_one_where_the_defaults_source_makes_something_from_nothing() -> Result<()> {
    let report = run_toml(
        r#"
        [[process.entities]]
        name = "Greeting"
        source = "Defaults"

        [[process.entities.fields]]
        name = "Name"
        default = "world"

        [[process.entities.calculated_fields]]
        name = "Hello"
        t = "copy(Name).format(hello {0})"
        "#,
    )
    .await?;

    assert!(report.is_ok(), "{report}");
    assert_eq!(
        rows_of(&report, "Greeting")?,
        vec![json!({ "Name": "world", "Hello": "hello world" })]
    );
    Ok(())
}

#[test]
fn the_one_where_check_finds_the_typo_without_moving_a_row() -> Result<()> {
    let config: AppConfig = toml::from_str(
        r#"
        [[process.entities]]
        name = "Typo"

        [[process.entities.fields]]
        name = "Name"
        t = "uper()"
        "#,
    )?;
    let report = etlx::check(&config)?;
    assert!(!report.is_ok());
    let the_entity = report.entity("Typo").context("Typo was checked")?;
    assert_eq!(the_entity.build_errors.len(), 1);
    assert_eq!(the_entity.rows_read, 0);
    Ok(())
}

#[tokio::test]
async fn the_one_where_files_go_in_and_files_come_out() -> Result<()> {
    let the_dir = tempfile::tempdir()?;
    let input = the_dir.path().join("people.ndjson");
    let mut input_file = std::fs::File::create(&input)?;
    writeln!(input_file, "{{\"Name\":\" ross \",\"Age\":\"29\"}}")?;
    writeln!(input_file)?;
    writeln!(input_file, "{{\"Name\":\"rachel\",\"Age\":\"not a number\"}}")?;
    drop(input_file);

    let output = the_dir.path().join("{entity}.out.ndjson");
    let mut config_file = tempfile::Builder::new().suffix(".toml").tempfile_in(the_dir.path())?;
    write!(
        config_file,
        r#"
        runtime = {{ progress = false }}
        sink_config = {{ File = {{ file_name = "{output}" }} }}

        [[process.entities]]
        name = "People"
        source = {{ File = {{ file_name = "{input}" }} }}

        [[process.entities.fields]]
        name = "Name"
        t = "trim().upper()"

        [[process.entities.fields]]
        name = "Age"
        type = "int32"
        "#,
        output = output.display(),
        input = input.display(),
    )?;

    let config = etlx::app_config::load_config(Some(config_file.path()))?;
    let report = etlx::run(config).await?;

    let the_entity = report.entity("People").context("People ran")?;
    assert_eq!(the_entity.rows_read, 2, "blank lines are not rows");
    assert_eq!(the_entity.warnings.len(), 1, "one unreadable Age, one warning");

    let written = std::fs::read_to_string(the_dir.path().join("People.out.ndjson"))?;
    let rows: Vec<serde_json::Value> = written
        .lines()
        .map(serde_json::from_str)
        .collect::<Result<_, _>>()?;
    assert_eq!(
        rows,
        vec![json!({ "Name": "ROSS", "Age": 29 }), json!({ "Name": "RACHEL", "Age": 0 })]
    );
    Ok(())
}

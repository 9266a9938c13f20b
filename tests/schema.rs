mod common;

use std::fs;

use common::TestWorkspace;
use serde_json::Value;
use sheet2sql::{
    dialect::Dialect,
    io_utils::{ReadOptions, read_table},
    output::{MetadataFormat, MetadataLayout, OutputPlan, persist},
    schema::{Column, Table, generate_schema},
};

fn payroll_table() -> Table {
    Table::new(vec![
        Column::from_text("Employee No.", &["101", "102", "103"]),
        Column::from_text("Full Name", &["Wanjiru Kamau", "Otieno", ""]),
        Column::from_text("Basic Salary", &["45000.50", "38000", "52000.75"]),
        Column::from_text("Date Joined", &["2019-04-01", "2020-11-15", "2018-01-09"]),
    ])
}

#[test]
fn ddl_lists_columns_in_order_with_nullability() {
    let schema = generate_schema("payroll", &payroll_table(), Dialect::PostgreSql);
    assert_eq!(
        schema.ddl,
        "CREATE TABLE payroll (\n  employee_no SMALLINT NOT NULL,\n  full_name VARCHAR(16) NULL,\n  basic_salary NUMERIC(18,2) NOT NULL,\n  date_joined TIMESTAMP NOT NULL\n);"
    );
}

#[test]
fn dialects_differ_only_in_type_names() {
    let table = payroll_table();
    let mysql = generate_schema("payroll", &table, Dialect::MySql);
    let sqlserver = generate_schema("payroll", &table, Dialect::SqlServer);
    assert_eq!(mysql.column("date_joined").unwrap().sql_type, "DATETIME");
    assert_eq!(sqlserver.column("date_joined").unwrap().sql_type, "DATETIME2");
    assert_eq!(mysql.column("basic_salary").unwrap().sql_type, "DECIMAL(18,2)");
    assert_eq!(
        mysql.column("full_name").unwrap().metadata,
        sqlserver.column("full_name").unwrap().metadata
    );
}

#[test]
fn metadata_report_is_keyed_by_cleaned_name_in_column_order() {
    let schema = generate_schema("payroll", &payroll_table(), Dialect::MySql);
    let json = serde_json::to_string(&schema.metadata_report()).expect("serialize");
    let keys = ["employee_no", "full_name", "basic_salary", "date_joined"]
        .iter()
        .map(|key| json.find(&format!("\"{key}\":")).expect("key present"))
        .collect::<Vec<_>>();
    assert!(keys.windows(2).all(|pair| pair[0] < pair[1]));

    let report: Value = serde_json::from_str(&json).expect("parse");
    assert_eq!(report["employee_no"]["original_name"], "Employee No.");
    assert_eq!(report["employee_no"]["min_value"], 101.0);
    assert!(report["employee_no"].get("decimal_places").is_none());
    assert_eq!(report["basic_salary"]["decimal_places"], 2);
    assert_eq!(report["full_name"]["null_count"], 1);
    assert_eq!(report["full_name"]["max_length"], 13);
    assert_eq!(report["date_joined"]["min_date"], "2018-01-09");
    assert!(report["date_joined"].get("min_length").is_none());
}

#[test]
fn duplicate_and_blank_headers_get_distinct_names() {
    let table = Table::new(vec![
        Column::from_text("Amount", &["1"]),
        Column::from_text("amount", &["2"]),
        Column::from_text("***", &["3"]),
    ]);
    let schema = generate_schema("t", &table, Dialect::Generic);
    let names = schema
        .columns
        .iter()
        .map(|column| column.name.as_str())
        .collect::<Vec<_>>();
    assert_eq!(names, vec!["amount", "amount_2", "column_3"]);
}

#[test]
fn persist_writes_one_schema_and_metadata_file_per_dialect() {
    let workspace = TestWorkspace::new();
    let plan = OutputPlan::in_directory(workspace.path().join("out"));
    let table = payroll_table();

    for dialect in [Dialect::MySql, Dialect::PostgreSql] {
        let schema = generate_schema("payroll", &table, dialect);
        let written = persist(&schema, &plan).expect("persist");
        assert_eq!(fs::read_to_string(&written.schema).expect("read ddl"), schema.ddl);
    }

    let out = workspace.path().join("out");
    assert!(out.join("schema_mysql.sql").exists());
    assert!(out.join("schema_postgresql.sql").exists());
    let mysql: Value = serde_json::from_str(
        &fs::read_to_string(out.join("column_analysis_mysql.json")).expect("read metadata"),
    )
    .expect("parse metadata");
    assert_eq!(mysql["employee_no"]["total_count"], 3);
    assert!(out.join("column_analysis_postgresql.json").exists());
    assert!(!out.join("column_analysis.json").exists());
}

#[test]
fn shared_layout_keeps_the_last_dialect_written() {
    let workspace = TestWorkspace::new();
    let plan = OutputPlan::in_directory(workspace.path()).with_layout(MetadataLayout::Shared);
    let table = Table::new(vec![Column::from_text("Code", &["A1", "B22"])]);

    for dialect in [Dialect::PostgreSql, Dialect::Sqlite] {
        persist(&generate_schema("codes", &table, dialect), &plan).expect("persist");
    }

    let shared = workspace.path().join("column_analysis.json");
    let contents = fs::read_to_string(&shared).expect("read shared metadata");
    assert!(contents.starts_with("{\n  \"code\": {"));
    assert!(workspace.path().join("schema_postgresql.sql").exists());
    assert!(workspace.path().join("schema_sqlite.sql").exists());
}

#[test]
fn yaml_metadata_uses_yml_extension() {
    let workspace = TestWorkspace::new();
    let plan = OutputPlan::in_directory(workspace.path()).with_format(MetadataFormat::Yaml);
    let schema = generate_schema("payroll", &payroll_table(), Dialect::Sqlite);
    let written = persist(&schema, &plan).expect("persist");
    assert_eq!(written.metadata, workspace.path().join("column_analysis_sqlite.yml"));
    let report: serde_yaml::Value =
        serde_yaml::from_str(&fs::read_to_string(&written.metadata).expect("read yaml"))
            .expect("parse yaml");
    assert_eq!(report["full_name"]["original_name"].as_str(), Some("Full Name"));
}

#[test]
fn csv_input_skips_leading_rows_and_pads_short_records() {
    let workspace = TestWorkspace::new();
    let path = workspace.write(
        "staff.csv",
        "Staff export\nid,name,grade\n1,Amina,A\n2,Baraka\n3,Chebet,C,extra\n",
    );
    let options = ReadOptions {
        skip_rows: 1,
        ..ReadOptions::default()
    };
    let table = read_table(&path, &options).expect("read csv");
    assert_eq!(table.row_count(), 3);
    assert_eq!(table.columns.len(), 4);

    let schema = generate_schema("staff", &table, Dialect::MySql);
    assert_eq!(schema.column("grade").unwrap().nullability(), "NULL");
    assert_eq!(schema.column("column_4").unwrap().metadata.null_count, 2);
    assert_eq!(schema.column("id").unwrap().sql_type, "SMALLINT");
}

#[test]
fn regenerating_the_same_table_writes_identical_bytes() {
    let workspace = TestWorkspace::new();
    let plan = OutputPlan::in_directory(workspace.path());
    let read_artifacts = || {
        (
            fs::read(workspace.path().join("schema_postgresql.sql")).expect("read ddl"),
            fs::read(workspace.path().join("column_analysis_postgresql.json"))
                .expect("read metadata"),
        )
    };

    persist(&generate_schema("payroll", &payroll_table(), Dialect::PostgreSql), &plan)
        .expect("first persist");
    let first = read_artifacts();
    persist(&generate_schema("payroll", &payroll_table(), Dialect::PostgreSql), &plan)
        .expect("second persist");
    let second = read_artifacts();

    assert!(!first.0.is_empty() && !first.1.is_empty());
    assert_eq!(first, second);
}

//! File-level behaviour of the delimited and DBF codecs

use std::fs;

use tempfile::TempDir;

use tablekit::config::{DbfReadMode, ParseOptions, WriteOptions};
use tablekit::logger::{CollectingObserver, Level, Logger};
use tablekit::model::{CellValue, Column, Table, ValueType};
use tablekit::ops::{compare_tables, join_tables, sort_table, CompareOptions, JoinOptions, SortKey};
use tablekit::output::{DbfWriter, DelimitedWriter, TableWriter, WriterFactory};
use tablekit::parser::{read_dbf, ParserFactory};

fn stations() -> Table {
    let mut table = Table::new(vec![
        Column::string("site", 10),
        Column::integer("zone").with_width(4),
        Column::double("flow", 2).with_width(8),
    ])
    .with_identifier("stations");
    let rows: Vec<(&str, i32, f64)> = vec![("Ash", 3, 1.25), ("Birch", 1, 20.5), ("Cedar", 2, 0.75)];
    for (site, zone, flow) in rows {
        table
            .add_record(vec![site.into(), CellValue::Int32(zone), CellValue::Float64(flow)])
            .unwrap();
    }
    table
}

#[test]
fn delimited_round_trip_preserves_text() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("notes.csv");

    let mut table = Table::new(vec![Column::string("name", 20), Column::string("remark", 20)]);
    table
        .add_record(vec!["a,b".into(), "said \"hi\"".into()])
        .unwrap();
    table.add_record(vec!["plain".into(), "x".into()]).unwrap();
    DelimitedWriter::new(WriteOptions::default()).write(&table, &path).unwrap();

    let back = ParserFactory::new(ParseOptions::new().all_text(), DbfReadMode::Eager)
        .parse(&path, &Logger::new())
        .unwrap();
    assert_eq!(back.identifier(), "notes");
    assert_eq!(back.row_count(), 2);
    for row in 0..2 {
        for col in 0..2 {
            assert_eq!(
                back.get_field_value(row, col).unwrap(),
                table.get_field_value(row, col).unwrap()
            );
        }
    }
}

#[test]
fn inferred_types_from_file() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("values.csv");
    fs::write(&path, "\"id\",\"value\"\n\"A\",1\n\"B\",2.5\n").unwrap();

    let table = ParserFactory::default().parse(&path, &Logger::new()).unwrap();
    assert_eq!(table.column(0).unwrap().value_type, ValueType::String);
    assert_eq!(table.column(1).unwrap().value_type, ValueType::Float64);
    assert_eq!(
        table.get_field_value_by_name(1, "value").unwrap(),
        CellValue::Float64(2.5)
    );
}

#[test]
fn dbf_eager_and_on_the_fly_agree() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("stations.dbf");
    let table = stations();
    DbfWriter::new().write(&table, &path).unwrap();

    let eager = read_dbf(&path, DbfReadMode::Eager, &Logger::new()).unwrap();
    let lazy = read_dbf(&path, DbfReadMode::OnTheFly, &Logger::new()).unwrap();
    assert!(eager.has_materialized_rows());
    assert!(!lazy.has_materialized_rows());
    assert_eq!(eager.identifier(), "stations");
    assert_eq!(lazy.row_count(), 3);

    for row in 0..3 {
        for col in 0..3 {
            let expected = table.get_field_value(row, col).unwrap();
            assert_eq!(eager.get_field_value(row, col).unwrap(), expected);
            assert_eq!(lazy.get_field_value(row, col).unwrap(), expected);
        }
    }
    assert_eq!(lazy.column(2).unwrap().precision, Some(2));
    assert_eq!(lazy.column(0).unwrap().width, Some(10));
}

#[test]
fn mutating_an_on_the_fly_table_materializes_it() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("stations.dbf");
    DbfWriter::new().write(&stations(), &path).unwrap();

    let mut lazy = read_dbf(&path, DbfReadMode::OnTheFly, &Logger::new()).unwrap();
    lazy.set_field_value(0, 1, CellValue::Int32(9), false).unwrap();
    assert!(lazy.has_materialized_rows());
    assert_eq!(lazy.rows().len(), 3);
    assert_eq!(lazy.get_field_value(0, 1).unwrap(), CellValue::Int32(9));

    // The file itself is untouched
    let again = read_dbf(&path, DbfReadMode::Eager, &Logger::new()).unwrap();
    assert_eq!(again.get_field_value(0, 1).unwrap(), CellValue::Int32(3));
}

#[test]
fn dbf_numeric_overflow_is_reported() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("overflow.dbf");
    DbfWriter::new().write(&stations(), &path).unwrap();

    // Overwrite the first flow cell with an overflow marker
    let mut bytes = fs::read(&path).unwrap();
    let header_len = usize::from(u16::from_le_bytes([bytes[8], bytes[9]]));
    let flow_start = header_len + 1 + 10 + 4;
    bytes[flow_start..flow_start + 8].copy_from_slice(b"********");
    fs::write(&path, &bytes).unwrap();

    let observer = CollectingObserver::new();
    let table = read_dbf(&path, DbfReadMode::Eager, &Logger::with_observer(observer.clone())).unwrap();
    assert_eq!(table.substitutions().len(), 1);
    assert_eq!(table.substitutions()[0].raw, "********");
    assert_eq!(table.get_field_value(0, 2).unwrap(), CellValue::Float64(0.0));
    assert_eq!(observer.at_least(Level::Warning).len(), 1);
    assert!(observer.records().iter().any(|r| r.level == Level::Info && r.message.contains("3 rows")));
}

#[test]
fn sorted_join_and_compare_pipeline() {
    let dir = TempDir::new().unwrap();
    let csv = dir.path().join("stations.csv");
    let dbf = dir.path().join("stations.dbf");
    let writers = WriterFactory::default();
    writers.write(&stations(), &csv).unwrap();
    writers.write(&stations(), &dbf).unwrap();

    let factory = ParserFactory::default();
    let from_csv = factory.parse(&csv, &Logger::new()).unwrap();
    let from_dbf = factory.parse(&dbf, &Logger::new()).unwrap();
    let comparison = compare_tables(&from_csv, &from_dbf, &CompareOptions::new()).unwrap();
    assert_eq!(comparison.difference_count(), 0);

    let mut sorted = from_csv.clone();
    let order = sort_table(&mut sorted, &[SortKey::ascending("zone")]).unwrap();
    assert_eq!(order, vec![1, 2, 0]);

    // Joining a table with itself on its key leaves every column unchanged
    let mut joined = sorted.clone();
    join_tables(&mut joined, &sorted, &JoinOptions::new(vec!["site".into()])).unwrap();
    let comparison = compare_tables(&joined, &sorted, &CompareOptions::new()).unwrap();
    assert!(!comparison.has_differences());
}

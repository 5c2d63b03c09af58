use chrono::{TimeZone, Utc};
use tempfile::NamedTempFile;

use tessera_api::{ErrorKind, Row, RowFactory, Value};
use tessera_rdb::{ColumnOverride, Database, IfExists, RdbOptions};
use tessera_sqlite::SqliteConnection;
use tessera_table::Table;

fn readings(n: usize) -> Table {
    let factory = RowFactory::new(["sensor", "count", "level", "ok", "at"]);
    let rows: Vec<Row> = (0..n)
        .map(|i| {
            let at = Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, i as u32).unwrap();
            factory
                .row(vec![
                    Some(Value::from(format!("s{i}"))),
                    Some(Value::Int64(i as i64 * 10)),
                    Some(Value::Float64(i as f64 / 4.0)),
                    Some(Value::Bool(i % 2 == 0)),
                    Some(Value::Timestamp(at)),
                ])
                .unwrap()
        })
        .collect();
    Table::from_rows(rows).unwrap()
}

fn url(file: &NamedTempFile) -> String {
    format!("sqlite:{}", file.path().display())
}

#[tokio::test(flavor = "multi_thread")]
async fn table_round_trips_through_a_database_file() {
    tessera_sqlite::register();
    let file = NamedTempFile::new().expect("create sqlite file");
    let table = readings(7);

    let sink = RdbOptions::table("readings").with_batch(3).with_workers(4);
    tessera_rdb::write(&table, Database::url(url(&file)), sink).await.unwrap();

    let source = RdbOptions::query("select * from readings order by count");
    let back = tessera_rdb::read(Database::url(url(&file)), source).await.unwrap();

    assert_eq!(back.len(), 7);
    assert_eq!(back.factory().unwrap().names(), ["sensor", "count", "level", "ok", "at"]);
    for i in 0..7 {
        assert_eq!(back.row(i), table.row(i), "row {i}");
    }
}

#[tokio::test(flavor = "multi_thread")]
async fn declared_types_drive_scanning() {
    tessera_sqlite::register();
    let file = NamedTempFile::new().expect("create sqlite file");
    let mut conn = SqliteConnection::open(&file.path().display().to_string()).unwrap();
    {
        use tessera_rdb::Connection;
        conn.execute("create table t( name VARCHAR(16), n INTEGER, x FLOAT, d DATE )").unwrap();
        conn.execute("insert into t values ('a', 1, 1.5, '2024-01-02'), (null, null, null, null)").unwrap();
    }

    let options = RdbOptions::table("t").with_column("n", ColumnOverride::sql_type("BIGINT").rename("count"));
    let table = tessera_rdb::read(Database::open(Box::new(conn)), options).await.unwrap();

    assert_eq!(table.factory().unwrap().names(), ["name", "count", "x", "d"]);
    let first = table.row(0).unwrap();
    assert_eq!(first.col("name"), Some(&Value::from("a")));
    assert_eq!(first.col("count"), Some(&Value::Int64(1)));
    assert_eq!(first.col("x"), Some(&Value::Float32(1.5)));
    assert_eq!(first.col("d"), Some(&Value::Timestamp(Utc.with_ymd_and_hms(2024, 1, 2, 0, 0, 0).unwrap())));
    assert!(table.row(1).unwrap().cells().iter().all(Option::is_none));
}

#[tokio::test(flavor = "multi_thread")]
async fn drop_policy_replaces_rows_and_error_policy_refuses() {
    tessera_sqlite::register();
    let file = NamedTempFile::new().expect("create sqlite file");

    tessera_rdb::write(&readings(5), Database::url(url(&file)), RdbOptions::table("r")).await.unwrap();
    let replace = RdbOptions::table("r").with_if_exists(IfExists::Drop);
    tessera_rdb::write(&readings(2), Database::url(url(&file)), replace).await.unwrap();

    let back = tessera_rdb::read(Database::url(url(&file)), RdbOptions::table("r")).await.unwrap();
    assert_eq!(back.len(), 2);

    let strict = RdbOptions::table("r").with_if_exists(IfExists::Error);
    let err = tessera_rdb::write(&readings(1), Database::url(url(&file)), strict).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Driver, "{err}");

    // the failed write rolled back
    let back = tessera_rdb::read(Database::url(url(&file)), RdbOptions::table("r")).await.unwrap();
    assert_eq!(back.len(), 2);
}

#[tokio::test]
async fn missing_table_is_a_query_error() {
    tessera_sqlite::register();
    let err = tessera_rdb::read(Database::url("sqlite::memory:"), RdbOptions::table("nope"))
        .await
        .unwrap_err();
    assert!(err.to_string().starts_with("query error"), "{err}");
}

// Integration tests against a live Postgres.
//
// Run with: DATABASE_URL=postgres://... cargo test -- --ignored
// Every test builds its own schema and drops it afterwards.

use chrono::{NaiveDate, NaiveDateTime};
use deddiag_loader::db::POOL_SIZE;
use deddiag_loader::{Connection, DbConfig, DeddiagError, Query, QueryCache, Value};
use sqlx::postgres::PgConnectOptions;
use std::str::FromStr;
use std::time::Duration;

const SCHEMA_SQL: &[&str] = &[
    "CREATE TABLE houses (id integer PRIMARY KEY, persons integer)",
    "CREATE TABLE items (id integer PRIMARY KEY, house integer, name text, category text)",
    "CREATE TABLE measurements (item_id integer, time timestamp, value real)",
    "CREATE TABLE annotation_labels (id integer PRIMARY KEY, name text)",
    "CREATE TABLE annotations (id serial PRIMARY KEY, item_id integer, label_id integer, \
     start_date timestamp, stop_date timestamp)",
    "CREATE FUNCTION round_timestamp(ts timestamp) RETURNS timestamp \
     AS $$ SELECT date_trunc('second', ts) $$ LANGUAGE sql IMMUTABLE",
    "CREATE FUNCTION get_measurements(integer, timestamp, timestamp) \
     RETURNS TABLE(item_id integer, \"time\" timestamp, value real) AS $$ \
     SELECT $1, s.t, (SELECT m.value FROM measurements m WHERE m.item_id = $1 AND m.time <= s.t \
     ORDER BY m.time DESC LIMIT 1) \
     FROM generate_series($2, $3, interval '1 second') AS s(t) $$ LANGUAGE sql STABLE",
];

struct Fixture {
    con: Connection,
    schema: String,
}

impl Fixture {
    async fn new(name: &str, config: DbConfig) -> Fixture {
        let url = std::env::var("DATABASE_URL").expect("DATABASE_URL required");
        let schema = format!("deddiag_test_{}_{}", name, std::process::id());

        let admin = sqlx::PgPool::connect(&url).await.expect("connect failed");
        sqlx::query(&format!("DROP SCHEMA IF EXISTS {} CASCADE", schema))
            .execute(&admin)
            .await
            .unwrap();
        sqlx::query(&format!("CREATE SCHEMA {}", schema))
            .execute(&admin)
            .await
            .unwrap();
        admin.close().await;

        let options = PgConnectOptions::from_str(&url)
            .unwrap()
            .options([("search_path", schema.as_str())]);
        let con = Connection::from_options(options, &config).unwrap();

        for sql in SCHEMA_SQL {
            sqlx::query(sql).execute(con.pool()).await.unwrap();
        }

        Fixture { con, schema }
    }

    async fn exec(&self, sql: &str) {
        sqlx::query(sql).execute(self.con.pool()).await.unwrap();
    }

    async fn teardown(self) {
        self.exec(&format!("DROP SCHEMA {} CASCADE", self.schema)).await;
        self.con.close().await;
    }
}

fn ts(y: i32, m: u32, d: u32) -> NaiveDateTime {
    NaiveDate::from_ymd_opt(y, m, d)
        .unwrap()
        .and_hms_opt(0, 0, 0)
        .unwrap()
}

#[tokio::test]
#[ignore = "requires database"]
async fn measurements_range_returns_rounded_bounds() {
    let fx = Fixture::new("range", DbConfig::default()).await;
    fx.exec(
        "INSERT INTO measurements SELECT 7, t, 1.0 \
         FROM generate_series('2020-01-01'::timestamp, '2020-01-10'::timestamp, '1 hour') t",
    )
    .await;

    let table = Query::measurements_range(7)
        .request(&fx.con, None)
        .await
        .unwrap();

    assert_eq!(table.column_names(), vec!["min_date", "max_date"]);
    assert_eq!(table.len(), 1);
    assert_eq!(table.get(0, "min_date"), Some(&Value::Timestamp(ts(2020, 1, 1))));
    assert_eq!(table.get(0, "max_date"), Some(&Value::Timestamp(ts(2020, 1, 10))));

    fx.teardown().await;
}

#[tokio::test]
#[ignore = "requires database"]
async fn missing_total_day_gaps_are_subset_of_hour_gaps() {
    let fx = Fixture::new("missing", DbConfig::default()).await;
    // 30 days of half-hourly samples with a 2 hour and a 2 day hole
    fx.exec(
        "INSERT INTO measurements SELECT 7, t, 1.0 \
         FROM generate_series('2020-01-01'::timestamp, '2020-01-31'::timestamp, '30 minutes') t \
         WHERE NOT (t > '2020-01-05 00:00' AND t < '2020-01-05 02:00') \
         AND NOT (t > '2020-01-10 00:00' AND t < '2020-01-12 00:00')",
    )
    .await;

    let table = Query::measurements_missing_total(7)
        .request(&fx.con, None)
        .await
        .unwrap();

    let hour = table.get(0, "perc_missing_hour").and_then(Value::as_f64).unwrap();
    let day = table.get(0, "perc_missing_day").and_then(Value::as_f64).unwrap();
    assert!(hour > 0.0);
    assert!(day > 0.0);
    assert!(day <= hour);
    assert!((day - 2.0 / 30.0).abs() < 1e-9);
    assert!((hour - (2.0 / 24.0 + 2.0) / 30.0).abs() < 1e-9);

    let gaps = Query::measurements_missing(7)
        .request(&fx.con, None)
        .await
        .unwrap();
    assert_eq!(gaps.column_names(), vec!["item_id", "time_total", "time_diff"]);
    assert_eq!(gaps.len(), 2);

    fx.teardown().await;
}

#[tokio::test]
#[ignore = "requires database"]
async fn missing_threshold_is_bound_as_interval_text() {
    let fx = Fixture::new("threshold", DbConfig::default()).await;
    // gaps of 3 hours and 30 minutes
    fx.exec(
        "INSERT INTO measurements VALUES \
         (7, '2020-01-01 00:00:00', 1.0), (7, '2020-01-01 03:00:00', 1.0), \
         (7, '2020-01-01 03:30:00', 1.0)",
    )
    .await;

    let default = Query::measurements_missing(7)
        .request(&fx.con, None)
        .await
        .unwrap();
    assert_eq!(default.len(), 1);
    assert_eq!(
        default.get(0, "time_diff").map(ToString::to_string),
        Some("03:00:00".to_string())
    );

    let fine = Query::measurements_missing(7)
        .with_threshold("1 minute")
        .request(&fx.con, None)
        .await
        .unwrap();
    assert_eq!(fine.len(), 2);

    let coarse = Query::measurements_missing(7)
        .with_threshold("1 day")
        .request(&fx.con, None)
        .await
        .unwrap();
    assert!(coarse.is_empty());
    assert_eq!(coarse.column_names(), vec!["item_id", "time_total", "time_diff"]);

    fx.teardown().await;
}

#[tokio::test]
#[ignore = "requires database"]
async fn measurements_limit_and_limit_all() {
    let fx = Fixture::new("limit", DbConfig::default()).await;
    // inserted out of order, 00:00 to 00:09
    fx.exec(
        "INSERT INTO measurements SELECT 7, '2020-01-01'::timestamp + n * interval '1 minute', n \
         FROM unnest(ARRAY[5, 2, 9, 0, 7, 1, 8, 3, 6, 4]) AS n",
    )
    .await;
    fx.exec("INSERT INTO measurements VALUES (8, '2020-01-01 00:01:00', 99.0)").await;

    let start = ts(2020, 1, 1);
    let stop = start + chrono::Duration::minutes(30);

    let limited = Query::measurements(7, start, stop, Some(3))
        .request(&fx.con, None)
        .await
        .unwrap();
    assert_eq!(limited.column_names(), vec!["item_id", "time", "value"]);
    let values: Vec<f64> = limited.column("value").unwrap().filter_map(Value::as_f64).collect();
    assert_eq!(values, vec![0.0, 1.0, 2.0]);

    let all = Query::measurements(7, start, stop, None)
        .request(&fx.con, None)
        .await
        .unwrap();
    assert_eq!(all.len(), 10);
    let times: Vec<&Value> = all.column("time").unwrap().collect();
    assert_eq!(times.first(), Some(&&Value::Timestamp(start)));
    assert!(all.column("item_id").unwrap().all(|v| v.as_i64() == Some(7)));

    // stop bound is inclusive
    let bounded = Query::measurements(7, start, start + chrono::Duration::minutes(4), None)
        .request(&fx.con, None)
        .await
        .unwrap();
    assert_eq!(bounded.len(), 5);

    fx.teardown().await;
}

#[tokio::test]
#[ignore = "requires database"]
async fn annotations_filter_and_order() {
    let fx = Fixture::new("annotations", DbConfig::default()).await;
    fx.exec(
        "INSERT INTO annotations (item_id, label_id, start_date, stop_date) VALUES \
         (5, 2, '2020-01-03', '2020-01-04'), \
         (5, 1, '2020-01-01', '2020-01-02'), \
         (5, 3, '2020-01-05', '2020-01-06'), \
         (6, 1, '2020-01-01', '2020-01-02')",
    )
    .await;

    let all = Query::annotations(5).request(&fx.con, None).await.unwrap();
    let labels: Vec<i64> = all.column("label_id").unwrap().filter_map(Value::as_i64).collect();
    assert_eq!(labels, vec![1, 2, 3]);

    let filtered = Query::annotations(5)
        .with_labels(vec![2, 3])
        .between(Some(ts(2020, 1, 2)), Some(ts(2020, 1, 5)))
        .request(&fx.con, None)
        .await
        .unwrap();
    let labels: Vec<i64> = filtered.column("label_id").unwrap().filter_map(Value::as_i64).collect();
    assert_eq!(labels, vec![2]);

    fx.teardown().await;
}

#[tokio::test]
#[ignore = "requires database"]
async fn expanded_with_labels_flags_annotated_seconds() {
    let fx = Fixture::new("expanded", DbConfig::default()).await;
    fx.exec("INSERT INTO measurements VALUES (7, '2020-01-01 00:00:00', 3.5)").await;
    fx.exec(
        "INSERT INTO annotations (item_id, label_id, start_date, stop_date) \
         VALUES (7, 1, '2020-01-01 00:00:02', '2020-01-01 00:00:03')",
    )
    .await;

    let start = ts(2020, 1, 1);
    let stop = start + chrono::Duration::seconds(4);
    let table = Query::measurements_expanded_with_labels(7, None, start, stop)
        .request(&fx.con, None)
        .await
        .unwrap();

    assert_eq!(table.column_names(), vec!["item_id", "time", "value", "hasLabel"]);
    let flags: Vec<bool> = table.column("hasLabel").unwrap().filter_map(Value::as_bool).collect();
    assert_eq!(flags, vec![false, false, true, true, false]);

    let other_label = Query::measurements_expanded_with_labels(7, Some(vec![9]), start, stop)
        .request(&fx.con, None)
        .await
        .unwrap();
    assert!(other_label.column("hasLabel").unwrap().all(|v| v.as_bool() == Some(false)));

    fx.teardown().await;
}

#[tokio::test]
#[ignore = "requires database"]
async fn cached_request_skips_database() {
    let fx = Fixture::new("cache", DbConfig::default()).await;
    fx.exec("INSERT INTO houses VALUES (1, 2), (2, 4)").await;
    let dir = tempfile::tempdir().unwrap();
    let cache = QueryCache::new(dir.path());

    let first = Query::Houses.request(&fx.con, Some(&cache)).await.unwrap();
    assert_eq!(first.len(), 2);

    // the cached copy is served even after the rows are gone
    fx.exec("DELETE FROM houses").await;
    let second = Query::Houses.request(&fx.con, Some(&cache)).await.unwrap();
    assert_eq!(second, first);

    let fresh = Query::Houses.request(&fx.con, None).await.unwrap();
    assert!(fresh.is_empty());
    assert_eq!(fresh.column_names(), vec!["id", "persons"]);

    fx.teardown().await;
}

#[tokio::test]
#[ignore = "requires database"]
async fn pool_blocks_beyond_pool_size() {
    let config = DbConfig::default().with_acquire_timeout(Duration::from_secs(1));
    let fx = Fixture::new("pool", config).await;

    let mut held = Vec::new();
    for _ in 0..POOL_SIZE {
        held.push(fx.con.acquire().await.unwrap());
    }
    assert_eq!(fx.con.stats().open_connections, POOL_SIZE);

    let err = fx.con.acquire().await.unwrap_err();
    assert!(matches!(err, DeddiagError::Connectivity(sqlx::Error::PoolTimedOut)));

    // releasing one slot lets the next acquire through on a reused connection
    held.pop();
    let again = fx.con.acquire().await.unwrap();
    assert_eq!(fx.con.stats().open_connections, POOL_SIZE);
    drop(again);
    drop(held);

    fx.teardown().await;
}

#[tokio::test]
#[ignore = "requires database"]
async fn malformed_sql_is_query_error() {
    let fx = Fixture::new("malformed", DbConfig::default()).await;
    fx.exec(
        "INSERT INTO measurements VALUES \
         (7, '2020-01-01 00:00:00', 1.0), (7, '2020-01-01 03:00:00', 1.0)",
    )
    .await;

    let err = Query::measurements_missing(7)
        .with_threshold("not an interval")
        .request(&fx.con, None)
        .await
        .unwrap_err();
    assert!(matches!(err, DeddiagError::Query(_)));

    fx.teardown().await;
}

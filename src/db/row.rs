// Turns Postgres rows into table cells, driven by the column types the
// prepared statement reported.

use crate::db::models::{Column, DataType, Interval, Value};
use crate::error::{DeddiagError, Result};
use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use sqlx::postgres::types::PgInterval;
use sqlx::postgres::{PgColumn, PgRow};
use sqlx::{Column as _, Row, TypeInfo};

/// Describe result columns, rejecting types with no `Value` mapping
pub fn describe(columns: &[PgColumn]) -> Result<Vec<Column>> {
    columns
        .iter()
        .map(|col| {
            let type_name = col.type_info().name();
            DataType::from_pg_name(type_name)
                .map(|data_type| Column::new(col.name(), data_type))
                .ok_or_else(|| DeddiagError::UnsupportedColumnType {
                    column: col.name().to_string(),
                    type_name: type_name.to_string(),
                })
        })
        .collect()
}

/// Decode one row according to `columns`
pub fn decode(row: &PgRow, columns: &[Column]) -> Result<Vec<Value>> {
    columns
        .iter()
        .enumerate()
        .map(|(idx, col)| decode_cell(row, idx, col))
        .collect()
}

fn decode_cell(row: &PgRow, idx: usize, col: &Column) -> Result<Value> {
    // Integer widths have to match the wire type exactly
    let value = match col.data_type {
        DataType::Bool => row.try_get::<Option<bool>, _>(idx)?.map(Value::Bool),
        DataType::Int => match row.column(idx).type_info().name() {
            "INT2" => row.try_get::<Option<i16>, _>(idx)?.map(|v| Value::Int(v.into())),
            "INT4" => row.try_get::<Option<i32>, _>(idx)?.map(|v| Value::Int(v.into())),
            "OID" => row
                .try_get::<Option<sqlx::postgres::types::Oid>, _>(idx)?
                .map(|v| Value::Int(v.0.into())),
            _ => row.try_get::<Option<i64>, _>(idx)?.map(Value::Int),
        },
        DataType::Float => match row.column(idx).type_info().name() {
            "FLOAT4" => row.try_get::<Option<f32>, _>(idx)?.map(|v| Value::Float(v.into())),
            _ => row.try_get::<Option<f64>, _>(idx)?.map(Value::Float),
        },
        DataType::Text => row.try_get::<Option<String>, _>(idx)?.map(Value::Text),
        DataType::Date => row.try_get::<Option<NaiveDate>, _>(idx)?.map(Value::Date),
        DataType::Timestamp => row
            .try_get::<Option<NaiveDateTime>, _>(idx)?
            .map(Value::Timestamp),
        DataType::TimestampTz => row
            .try_get::<Option<DateTime<Utc>>, _>(idx)?
            .map(Value::TimestampTz),
        DataType::Interval => row
            .try_get::<Option<PgInterval>, _>(idx)?
            .map(|v| Value::Interval(v.into())),
    };

    Ok(value.unwrap_or(Value::Null))
}

impl From<PgInterval> for Interval {
    fn from(pg: PgInterval) -> Self {
        Self {
            months: pg.months,
            days: pg.days,
            microseconds: pg.microseconds,
        }
    }
}

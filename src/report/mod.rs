/// Dataset statistics report
///
/// Walks every house and item and collects measurement range, annotation
/// count and (optionally) missing-data ratios per item.

pub mod formatter;

pub use formatter::{Formatter, LatexFormatter, PlainFormatter};

use crate::cache::QueryCache;
use crate::db::{Table, Value};
use crate::error::{DeddiagError, Result};
use crate::query::{Executor, Query};
use tracing::debug;

/// Summary line for one item
#[derive(Debug, Clone, PartialEq)]
pub struct ItemSummary {
    pub id: i64,
    pub name: String,
    pub first_date: Value,
    pub last_date: Value,
    pub num_annotations: usize,
    pub perc_missing_hour: Option<f64>,
    pub perc_missing_day: Option<f64>,
}

/// Items of one house
#[derive(Debug, Clone, PartialEq)]
pub struct HouseSection {
    pub house_id: i64,
    pub items: Vec<ItemSummary>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Report {
    pub houses: Vec<HouseSection>,
    /// Whether the missing-data columns were collected
    pub include_missing: bool,
}

impl Report {
    pub fn item_count(&self) -> usize {
        self.houses.iter().map(|h| h.items.len()).sum()
    }
}

/// Collect the report, one round of queries per item
pub async fn build<E>(executor: &E, cache: Option<&QueryCache>, include_missing: bool) -> Result<Report>
where
    E: Executor + ?Sized,
{
    let houses = Query::Houses.request(executor, cache).await?;
    let items = Query::Items.request(executor, cache).await?;

    let mut report = Report {
        houses: Vec::new(),
        include_missing,
    };

    for row in 0..houses.len() {
        let house_id = int_cell(&houses, row, "id")?;
        let mut section = HouseSection {
            house_id,
            items: Vec::new(),
        };

        for item_row in 0..items.len() {
            if int_cell(&items, item_row, "house")? != house_id {
                continue;
            }
            let id = int_cell(&items, item_row, "id")?;
            let name = items
                .get(item_row, "name")
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string();
            let item_id = i32::try_from(id)
                .map_err(|_| DeddiagError::Report(format!("item id {} out of range", id)))?;

            debug!(house = house_id, item = item_id, "summarizing item");
            section
                .items
                .push(summarize(executor, cache, item_id, name, include_missing).await?);
        }

        report.houses.push(section);
    }

    Ok(report)
}

async fn summarize<E>(
    executor: &E,
    cache: Option<&QueryCache>,
    item_id: i32,
    name: String,
    include_missing: bool,
) -> Result<ItemSummary>
where
    E: Executor + ?Sized,
{
    let range = Query::measurements_range(item_id).request(executor, cache).await?;
    let annotations = Query::annotations(item_id).request(executor, cache).await?;

    let (perc_missing_hour, perc_missing_day) = if include_missing {
        let missing = Query::measurements_missing_total(item_id)
            .request(executor, cache)
            .await?;
        (
            missing.get(0, "perc_missing_hour").and_then(Value::as_f64),
            missing.get(0, "perc_missing_day").and_then(Value::as_f64),
        )
    } else {
        (None, None)
    };

    Ok(ItemSummary {
        id: item_id.into(),
        name,
        first_date: range.get(0, "min_date").cloned().unwrap_or(Value::Null),
        last_date: range.get(0, "max_date").cloned().unwrap_or(Value::Null),
        num_annotations: annotations.len(),
        perc_missing_hour,
        perc_missing_day,
    })
}

fn int_cell(table: &Table, row: usize, column: &str) -> Result<i64> {
    table
        .get(row, column)
        .and_then(Value::as_i64)
        .ok_or_else(|| DeddiagError::Report(format!("row {} has no integer '{}'", row, column)))
}

// The DEDDIAG queries. Each variant fixes its SQL and the parameters it
// binds; nothing here talks to the database.

use crate::query::statement::{Param, Statement};
use chrono::NaiveDateTime;

/// Gap threshold `MeasurementsMissing` uses when none is given
pub const DEFAULT_MISSING_THRESHOLD: &str = "1 hour 5 minutes";

/// Named, parameterized dataset query
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Query {
    /// All houses and their occupants
    Houses,
    /// All metered items
    Items,
    /// All annotation labels
    AnnotationLabels,
    /// Annotations of an item, ordered by start date
    ///
    /// Missing bounds widen to `to_timestamp(0)` and `to_timestamp('inf')`.
    Annotations {
        item_id: i32,
        label_ids: Option<Vec<i32>>,
        start_date: Option<NaiveDateTime>,
        stop_date: Option<NaiveDateTime>,
    },
    /// One gap-filled row per second, from the dataset's `get_measurements`
    MeasurementsExpanded {
        item_id: i32,
        start_date: NaiveDateTime,
        stop_date: NaiveDateTime,
    },
    /// Stored samples ordered by time; `limit: None` returns every row
    Measurements {
        item_id: i32,
        start_date: NaiveDateTime,
        stop_date: NaiveDateTime,
        limit: Option<i64>,
    },
    /// Expanded measurements plus a `hasLabel` flag per second
    MeasurementsExpandedWithLabels {
        item_id: i32,
        label_ids: Option<Vec<i32>>,
        start_date: NaiveDateTime,
        stop_date: NaiveDateTime,
    },
    /// First and last sample, rounded with `round_timestamp`
    MeasurementsRange { item_id: i32 },
    /// Gaps between consecutive samples longer than `threshold`
    MeasurementsMissing { item_id: i32, threshold: String },
    /// Share of the recorded span lost to gaps over one hour and over one day
    MeasurementsMissingTotal { item_id: i32 },
}

impl Query {
    pub fn annotations(item_id: i32) -> Self {
        Query::Annotations {
            item_id,
            label_ids: None,
            start_date: None,
            stop_date: None,
        }
    }

    pub fn measurements_expanded(
        item_id: i32,
        start_date: NaiveDateTime,
        stop_date: NaiveDateTime,
    ) -> Self {
        Query::MeasurementsExpanded {
            item_id,
            start_date,
            stop_date,
        }
    }

    pub fn measurements(
        item_id: i32,
        start_date: NaiveDateTime,
        stop_date: NaiveDateTime,
        limit: Option<i64>,
    ) -> Self {
        Query::Measurements {
            item_id,
            start_date,
            stop_date,
            limit,
        }
    }

    pub fn measurements_expanded_with_labels(
        item_id: i32,
        label_ids: Option<Vec<i32>>,
        start_date: NaiveDateTime,
        stop_date: NaiveDateTime,
    ) -> Self {
        Query::MeasurementsExpandedWithLabels {
            item_id,
            label_ids,
            start_date,
            stop_date,
        }
    }

    pub fn measurements_range(item_id: i32) -> Self {
        Query::MeasurementsRange { item_id }
    }

    pub fn measurements_missing(item_id: i32) -> Self {
        Query::MeasurementsMissing {
            item_id,
            threshold: DEFAULT_MISSING_THRESHOLD.to_string(),
        }
    }

    pub fn measurements_missing_total(item_id: i32) -> Self {
        Query::MeasurementsMissingTotal { item_id }
    }

    /// Restrict `Annotations` or `MeasurementsExpandedWithLabels` to a label set
    pub fn with_labels(mut self, labels: Vec<i32>) -> Self {
        match &mut self {
            Query::Annotations { label_ids, .. }
            | Query::MeasurementsExpandedWithLabels { label_ids, .. } => *label_ids = Some(labels),
            _ => {}
        }
        self
    }

    /// Set the `Annotations` date bounds
    pub fn between(mut self, start: Option<NaiveDateTime>, stop: Option<NaiveDateTime>) -> Self {
        if let Query::Annotations {
            start_date,
            stop_date,
            ..
        } = &mut self
        {
            *start_date = start;
            *stop_date = stop;
        }
        self
    }

    /// Set the `MeasurementsMissing` gap threshold (any Postgres interval literal)
    pub fn with_threshold(mut self, value: impl Into<String>) -> Self {
        if let Query::MeasurementsMissing { threshold, .. } = &mut self {
            *threshold = value.into();
        }
        self
    }

    pub fn name(&self) -> &'static str {
        match self {
            Query::Houses => "Houses",
            Query::Items => "Items",
            Query::AnnotationLabels => "AnnotationLabels",
            Query::Annotations { .. } => "Annotations",
            Query::MeasurementsExpanded { .. } => "MeasurementsExpanded",
            Query::Measurements { .. } => "Measurements",
            Query::MeasurementsExpandedWithLabels { .. } => "MeasurementsExpandedWithLabels",
            Query::MeasurementsRange { .. } => "MeasurementsRange",
            Query::MeasurementsMissing { .. } => "MeasurementsMissing",
            Query::MeasurementsMissingTotal { .. } => "MeasurementsMissingTotal",
        }
    }

    /// Parameters this variant binds, in placeholder order
    pub fn param_schema(&self) -> &'static [&'static str] {
        match self {
            Query::Houses | Query::Items | Query::AnnotationLabels => &[],
            Query::Annotations { .. } => &["item_id", "start_date", "stop_date", "label_ids"],
            Query::MeasurementsExpanded { .. } => &["item_id", "start_date", "stop_date"],
            Query::Measurements { .. } => &["item_id", "start_date", "stop_date", "limit"],
            Query::MeasurementsExpandedWithLabels { .. } => {
                &["item_id", "start_date", "stop_date", "label_ids"]
            }
            Query::MeasurementsRange { .. }
            | Query::MeasurementsMissingTotal { .. } => &["item_id"],
            Query::MeasurementsMissing { .. } => &["item_id", "threshold"],
        }
    }

    /// Build the bound statement
    pub fn statement(&self) -> Statement {
        match self {
            Query::Houses => Statement::new("SELECT * FROM houses"),
            Query::Items => Statement::new("SELECT * FROM items"),
            Query::AnnotationLabels => Statement::new("SELECT * FROM annotation_labels"),
            Query::Annotations {
                item_id,
                label_ids,
                start_date,
                stop_date,
            } => annotations(*item_id, label_ids.as_deref(), *start_date, *stop_date),
            Query::MeasurementsExpanded {
                item_id,
                start_date,
                stop_date,
            } => {
                let mut stmt = Statement::new("SELECT * FROM ");
                let call = get_measurements(&mut stmt, *item_id, *start_date, *stop_date);
                stmt.push_sql(&call);
                stmt
            }
            Query::Measurements {
                item_id,
                start_date,
                stop_date,
                limit,
            } => {
                let mut stmt = Statement::new("SELECT * FROM measurements WHERE item_id = ");
                let item = stmt.push("item_id", Param::Int(*item_id));
                let start = stmt.push("start_date", Param::Timestamp(*start_date));
                let stop = stmt.push("stop_date", Param::Timestamp(*stop_date));
                stmt.push_sql(&format!(
                    "{} AND time BETWEEN {} AND {} ORDER BY time LIMIT ",
                    item, start, stop
                ));
                match limit {
                    Some(n) => {
                        let n = stmt.push("limit", Param::BigInt(*n));
                        stmt.push_sql(&n);
                    }
                    None => stmt.push_sql("ALL"),
                }
                stmt
            }
            Query::MeasurementsExpandedWithLabels {
                item_id,
                label_ids,
                start_date,
                stop_date,
            } => {
                let mut stmt = Statement::new("");
                let call = get_measurements(&mut stmt, *item_id, *start_date, *stop_date);
                let labels = label_filter(&mut stmt, label_ids.as_deref());
                stmt.push_sql(&format!(
                    "SELECT q0.*, EXISTS (SELECT 1 FROM annotations \
                     WHERE annotations.item_id = q0.item_id{} \
                     AND annotations.start_date <= q0.time AND q0.time <= annotations.stop_date) AS \"hasLabel\" \
                     FROM {} q0",
                    labels, call
                ));
                stmt
            }
            Query::MeasurementsRange { item_id } => {
                let mut stmt = Statement::new(
                    "SELECT DISTINCT round_timestamp(min(time)) AS min_date, \
                     round_timestamp(max(time)) AS max_date \
                     FROM measurements WHERE item_id = ",
                );
                let item = stmt.push("item_id", Param::Int(*item_id));
                stmt.push_sql(&item);
                stmt
            }
            Query::MeasurementsMissing { item_id, threshold } => {
                let mut stmt = Statement::new("");
                let item = stmt.push("item_id", Param::Int(*item_id));
                let threshold = stmt.push("threshold", Param::Text(threshold.clone()));
                stmt.push_sql(&format!(
                    "WITH {} \
                     SELECT DISTINCT {item}::integer AS item_id, v_min_max.time_total, v_lag.time_diff \
                     FROM v_min_max, v_lag \
                     WHERE v_lag.time_diff > {threshold}::interval",
                    gap_views(&item),
                    item = item,
                    threshold = threshold
                ));
                stmt
            }
            Query::MeasurementsMissingTotal { item_id } => {
                let mut stmt = Statement::new("");
                let item = stmt.push("item_id", Param::Int(*item_id));
                stmt.push_sql(&format!(
                    "WITH {}, \
                     v_hour_missing AS (SELECT sum(EXTRACT(EPOCH FROM time_diff)) AS missing FROM v_lag WHERE time_diff > '1 hour 5 seconds'), \
                     v_day_missing AS (SELECT sum(EXTRACT(EPOCH FROM time_diff)) AS missing FROM v_lag WHERE time_diff > '1 day') \
                     SELECT DISTINCT {item}::integer AS item_id, v_min_max.time_total, \
                     (COALESCE(v_hour_missing.missing, 0) / EXTRACT(EPOCH FROM v_min_max.time_total))::double precision AS perc_missing_hour, \
                     (COALESCE(v_day_missing.missing, 0) / EXTRACT(EPOCH FROM v_min_max.time_total))::double precision AS perc_missing_day \
                     FROM v_min_max, v_hour_missing, v_day_missing",
                    gap_views(&item),
                    item = item
                ));
                stmt
            }
        }
    }
}

fn annotations(
    item_id: i32,
    label_ids: Option<&[i32]>,
    start_date: Option<NaiveDateTime>,
    stop_date: Option<NaiveDateTime>,
) -> Statement {
    let mut stmt = Statement::new("SELECT * FROM annotations WHERE item_id = ");
    let item = stmt.push("item_id", Param::Int(item_id));
    let start = match start_date {
        Some(ts) => stmt.push("start_date", Param::Timestamp(ts)),
        None => "to_timestamp(0)".to_string(),
    };
    let stop = match stop_date {
        Some(ts) => stmt.push("stop_date", Param::Timestamp(ts)),
        None => "to_timestamp('inf')".to_string(),
    };
    let labels = label_filter(&mut stmt, label_ids);
    stmt.push_sql(&format!(
        "{} AND start_date >= {} AND stop_date <= {}{} ORDER BY start_date",
        item, start, stop, labels
    ));
    stmt
}

// `get_measurements(item, start, stop)` call with its three bindings
fn get_measurements(
    stmt: &mut Statement,
    item_id: i32,
    start_date: NaiveDateTime,
    stop_date: NaiveDateTime,
) -> String {
    let item = stmt.push("item_id", Param::Int(item_id));
    let start = stmt.push("start_date", Param::Timestamp(start_date));
    let stop = stmt.push("stop_date", Param::Timestamp(stop_date));
    format!("get_measurements({}, {}, {})", item, start, stop)
}

fn label_filter(stmt: &mut Statement, label_ids: Option<&[i32]>) -> String {
    match label_ids {
        Some(ids) => {
            let ids = stmt.push("label_ids", Param::IntList(ids.to_vec()));
            format!(" AND label_id = ANY({})", ids)
        }
        None => String::new(),
    }
}

// Total span and consecutive-sample differences of one item
fn gap_views(item: &str) -> String {
    format!(
        "v_min_max AS (SELECT max(time) - min(time) AS time_total FROM measurements WHERE item_id = {item}), \
         v_lag AS (SELECT time, time - LAG(time) OVER (ORDER BY time) AS time_diff FROM measurements WHERE item_id = {item})",
        item = item
    )
}

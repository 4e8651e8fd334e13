/// Bound SQL statements
///
/// A `Statement` is SQL text with `$n` placeholders plus the values bound to
/// them. Values only ever reach the server through sqlx bindings; the
/// literal rendering exists for cache keys and logs.

use chrono::NaiveDateTime;
use sqlx::postgres::{PgArguments, PgTypeInfo};
use sqlx::query::Query;
use sqlx::{Postgres, Type};

/// Timestamp layout used when rendering literals
const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.f";

/// A parameter value
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Param {
    Int(i32),
    BigInt(i64),
    Text(String),
    Timestamp(NaiveDateTime),
    IntList(Vec<i32>),
}

impl Param {
    /// Attach this value to the next placeholder of `query`
    pub fn bind<'q>(
        &self,
        query: Query<'q, Postgres, PgArguments>,
    ) -> Query<'q, Postgres, PgArguments> {
        match self {
            Param::Int(v) => query.bind(*v),
            Param::BigInt(v) => query.bind(*v),
            Param::Text(v) => query.bind(v.clone()),
            Param::Timestamp(v) => query.bind(*v),
            Param::IntList(v) => query.bind(v.clone()),
        }
    }

    /// Wire type the value is encoded as
    ///
    /// Declared when preparing so the server never infers a placeholder's
    /// type from the surrounding SQL.
    pub fn type_info(&self) -> PgTypeInfo {
        match self {
            Param::Int(_) => <i32 as Type<Postgres>>::type_info(),
            Param::BigInt(_) => <i64 as Type<Postgres>>::type_info(),
            Param::Text(_) => <String as Type<Postgres>>::type_info(),
            Param::Timestamp(_) => <NaiveDateTime as Type<Postgres>>::type_info(),
            Param::IntList(_) => <Vec<i32> as Type<Postgres>>::type_info(),
        }
    }

    /// SQL literal equivalent of the bound value
    pub fn to_literal(&self) -> String {
        match self {
            Param::Int(v) => v.to_string(),
            Param::BigInt(v) => v.to_string(),
            Param::Text(v) => quote(v),
            Param::Timestamp(v) => quote(&v.format(TIMESTAMP_FORMAT).to_string()),
            Param::IntList(v) if v.is_empty() => "ARRAY[]::integer[]".to_string(),
            Param::IntList(v) => {
                let items: Vec<String> = v.iter().map(|i| i.to_string()).collect();
                format!("ARRAY[{}]", items.join(","))
            }
        }
    }
}

fn quote(s: &str) -> String {
    format!("'{}'", s.replace('\'', "''"))
}

/// A named parameter bound to one placeholder
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Binding {
    pub name: &'static str,
    pub value: Param,
}

/// SQL text plus its bindings, in placeholder order
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Statement {
    sql: String,
    bindings: Vec<Binding>,
}

impl Statement {
    pub fn new(sql: impl Into<String>) -> Self {
        Self {
            sql: sql.into(),
            bindings: Vec::new(),
        }
    }

    /// Bind `value` to the next placeholder, returning its `$n` marker
    pub fn push(&mut self, name: &'static str, value: Param) -> String {
        self.bindings.push(Binding { name, value });
        format!("${}", self.bindings.len())
    }

    /// Append raw SQL text
    pub fn push_sql(&mut self, sql: &str) {
        self.sql.push_str(sql);
    }

    pub fn sql(&self) -> &str {
        &self.sql
    }

    pub fn bindings(&self) -> &[Binding] {
        &self.bindings
    }

    pub fn param_names(&self) -> Vec<&'static str> {
        self.bindings.iter().map(|b| b.name).collect()
    }

    /// Placeholder types in `$n` order
    pub fn param_types(&self) -> Vec<PgTypeInfo> {
        self.bindings.iter().map(|b| b.value.type_info()).collect()
    }

    /// Literal SQL text with every placeholder replaced by its value
    ///
    /// Deterministic for a given statement, which makes it the cache key.
    pub fn render(&self) -> String {
        let mut out = String::with_capacity(self.sql.len());
        let mut chars = self.sql.char_indices().peekable();

        while let Some((_, c)) = chars.next() {
            if c != '$' {
                out.push(c);
                continue;
            }

            let mut digits = String::new();
            while let Some(&(_, d)) = chars.peek() {
                if !d.is_ascii_digit() {
                    break;
                }
                digits.push(d);
                chars.next();
            }

            let binding = digits
                .parse::<usize>()
                .ok()
                .and_then(|n| n.checked_sub(1))
                .and_then(|idx| self.bindings.get(idx));
            match binding {
                Some(binding) => out.push_str(&binding.value.to_literal()),
                None => {
                    out.push('$');
                    out.push_str(&digits);
                }
            }
        }

        out
    }
}

impl std::fmt::Display for Statement {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.render())
    }
}

//! Telemetry capture for simulation runs.
//!
//! Simulation code emits `tracing` events at INFO level, one per row, with the
//! target naming the table:
//!
//! ```ignore
//! tracing::info!(target: "market", now, class = ?class, impact, spending);
//! ```
//!
//! Tests run the simulation inside [`capture`] and get back a [`Ledger`] of
//! row tables. Rows keep whatever fields their event carried; columns are
//! projected on demand, with missing fields as nulls.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, PoisonError};

use polars::prelude::*;
use tracing::field::{Field, Visit};
use tracing::span::{Attributes, Record};
use tracing::{Event, Id, Level, Metadata, Subscriber};

// ============================================================================
// Values & Rows
// ============================================================================

#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    UInt(u64),
    Int(i64),
    Float(f64),
    Flag(bool),
    Text(String),
}

impl Value {
    /// Numeric view. Integers widen; flags and text have none.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::UInt(v) => Some(*v as f64),
            Value::Int(v) => Some(*v as f64),
            Value::Float(v) => Some(*v),
            Value::Flag(_) | Value::Text(_) => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Text(s) => Some(s),
            _ => None,
        }
    }
}

pub type Row = BTreeMap<String, Value>;

/// Rows recorded under one tracing target, in emission order
#[derive(Debug, Clone, Default)]
pub struct Table {
    pub rows: Vec<Row>,
}

impl Table {
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Field names seen in any row
    pub fn column_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self
            .rows
            .iter()
            .flat_map(|row| row.keys().map(String::as_str))
            .collect();
        names.sort_unstable();
        names.dedup();
        names
    }

    /// Numeric values of `column`, skipping rows without one
    pub fn floats(&self, column: &str) -> Vec<f64> {
        self.rows
            .iter()
            .filter_map(|row| row.get(column).and_then(Value::as_f64))
            .collect()
    }

    pub fn texts(&self, column: &str) -> Vec<&str> {
        self.rows
            .iter()
            .filter_map(|row| row.get(column).and_then(Value::as_str))
            .collect()
    }

    /// Rows whose `column` equals the text `value`
    pub fn rows_where<'a>(&'a self, column: &'a str, value: &'a str) -> impl Iterator<Item = &'a Row> {
        self.rows
            .iter()
            .filter(move |row| row.get(column).and_then(Value::as_str) == Some(value))
    }

    /// Project into a DataFrame. Column type follows the first value seen.
    pub fn to_dataframe(&self) -> PolarsResult<DataFrame> {
        let columns = self
            .column_names()
            .into_iter()
            .map(|name| self.project(name))
            .collect();
        DataFrame::new(columns)
    }

    fn project(&self, name: &str) -> Column {
        let cells: Vec<Option<&Value>> = self.rows.iter().map(|row| row.get(name)).collect();
        let first = cells.iter().flatten().next();
        match first {
            Some(Value::UInt(_)) => Column::new(
                name.into(),
                cells
                    .iter()
                    .map(|c| match c {
                        Some(Value::UInt(v)) => Some(*v),
                        _ => None,
                    })
                    .collect::<Vec<Option<u64>>>(),
            ),
            Some(Value::Int(_)) => Column::new(
                name.into(),
                cells
                    .iter()
                    .map(|c| match c {
                        Some(Value::Int(v)) => Some(*v),
                        Some(Value::UInt(v)) => i64::try_from(*v).ok(),
                        _ => None,
                    })
                    .collect::<Vec<Option<i64>>>(),
            ),
            Some(Value::Flag(_)) => Column::new(
                name.into(),
                cells
                    .iter()
                    .map(|c| match c {
                        Some(Value::Flag(v)) => Some(*v),
                        _ => None,
                    })
                    .collect::<Vec<Option<bool>>>(),
            ),
            Some(Value::Text(_)) => Column::new(
                name.into(),
                cells
                    .iter()
                    .map(|c| c.and_then(Value::as_str).map(str::to_string))
                    .collect::<Vec<Option<String>>>(),
            ),
            Some(Value::Float(_)) | None => Column::new(
                name.into(),
                cells
                    .iter()
                    .map(|c| c.and_then(Value::as_f64))
                    .collect::<Vec<Option<f64>>>(),
            ),
        }
    }
}

/// Every table captured during a run, keyed by target
#[derive(Debug, Clone, Default)]
pub struct Ledger {
    pub tables: BTreeMap<String, Table>,
}

impl Ledger {
    pub fn table(&self, target: &str) -> Option<&Table> {
        self.tables.get(target)
    }

    /// Row count per target, zero for targets never seen
    pub fn rows(&self, target: &str) -> usize {
        self.tables.get(target).map_or(0, Table::len)
    }

    pub fn to_dataframes(&self) -> PolarsResult<BTreeMap<String, DataFrame>> {
        self.tables
            .iter()
            .map(|(name, table)| Ok((name.clone(), table.to_dataframe()?)))
            .collect()
    }
}

// ============================================================================
// Subscriber
// ============================================================================

struct RowVisitor<'a>(&'a mut Row);

impl RowVisitor<'_> {
    fn put(&mut self, field: &Field, value: Value) {
        self.0.insert(field.name().to_string(), value);
    }
}

impl Visit for RowVisitor<'_> {
    fn record_u64(&mut self, field: &Field, value: u64) {
        self.put(field, Value::UInt(value));
    }

    fn record_i64(&mut self, field: &Field, value: i64) {
        self.put(field, Value::Int(value));
    }

    fn record_f64(&mut self, field: &Field, value: f64) {
        self.put(field, Value::Float(value));
    }

    fn record_bool(&mut self, field: &Field, value: bool) {
        self.put(field, Value::Flag(value));
    }

    fn record_str(&mut self, field: &Field, value: &str) {
        self.put(field, Value::Text(value.to_string()));
    }

    fn record_debug(&mut self, field: &Field, value: &dyn std::fmt::Debug) {
        self.put(field, Value::Text(format!("{value:?}")));
    }
}

/// Subscriber that appends each INFO-or-higher event as a row of its target's table.
#[derive(Clone, Default)]
pub struct TelemetrySubscriber {
    ledger: Arc<Mutex<Ledger>>,
}

impl TelemetrySubscriber {
    pub fn new() -> Self {
        Self::default()
    }

    /// Take everything recorded so far, leaving the ledger empty
    pub fn take(&self) -> Ledger {
        let mut ledger = self.ledger.lock().unwrap_or_else(PoisonError::into_inner);
        std::mem::take(&mut *ledger)
    }
}

impl Subscriber for TelemetrySubscriber {
    fn enabled(&self, metadata: &Metadata<'_>) -> bool {
        metadata.is_event() && *metadata.level() <= Level::INFO
    }

    fn new_span(&self, _span: &Attributes<'_>) -> Id {
        Id::from_u64(1)
    }

    fn record(&self, _span: &Id, _values: &Record<'_>) {}

    fn record_follows_from(&self, _span: &Id, _follows: &Id) {}

    fn event(&self, event: &Event<'_>) {
        let mut row = Row::new();
        event.record(&mut RowVisitor(&mut row));
        // Plain `info!("...")` messages carry no data
        row.remove("message");
        if row.is_empty() {
            return;
        }

        let mut ledger = self.ledger.lock().unwrap_or_else(PoisonError::into_inner);
        ledger
            .tables
            .entry(event.metadata().target().to_string())
            .or_default()
            .rows
            .push(row);
    }

    fn enter(&self, _span: &Id) {}

    fn exit(&self, _span: &Id) {}
}

/// Run `f` with telemetry captured on this thread and return its rows.
pub fn capture<R>(f: impl FnOnce() -> R) -> (R, Ledger) {
    let subscriber = TelemetrySubscriber::new();
    let out = tracing::subscriber::with_default(subscriber.clone(), f);
    (out, subscriber.take())
}

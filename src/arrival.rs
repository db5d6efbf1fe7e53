//! Arrival data model: the queried stop/route pair and the result set
//! handed back to callers.

use serde::Serialize;

/// Placeholder used for every field of the sentinel record.
pub const NOT_AVAILABLE: &str = "n/a";

/// Stop and route being watched. Fixed for the lifetime of the facade.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StopRoute {
    stop: String,
    route: String,
}

impl StopRoute {
    pub fn new(stop: impl Into<String>, route: impl Into<String>) -> Self {
        Self {
            stop: stop.into(),
            route: route.into(),
        }
    }

    pub fn stop(&self) -> &str {
        &self.stop
    }

    pub fn route(&self) -> &str {
        &self.route
    }
}

/// One upcoming bus passage.
///
/// `due_in` holds either the minute count as sent by the upstream service or
/// an ISO-8601 timestamp, depending on the [`TimeMode`](crate::due::TimeMode)
/// used for the fetch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ArrivalRecord {
    #[serde(rename = "Route name")]
    pub route_name: String,
    #[serde(rename = "Route")]
    pub route: String,
    #[serde(rename = "Due in")]
    pub due_in: String,
}

impl ArrivalRecord {
    /// The "n/a" record standing in for missing data on `route`.
    pub fn sentinel(route: &str) -> Self {
        Self {
            route_name: NOT_AVAILABLE.to_string(),
            route: route.to_string(),
            due_in: NOT_AVAILABLE.to_string(),
        }
    }
}

/// Ordered arrivals in upstream document order.
///
/// Never empty: either one or more real records, or exactly the single
/// sentinel record. The two are never mixed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct ResultSet {
    records: Vec<ArrivalRecord>,
    #[serde(skip)]
    unavailable: bool,
}

impl ResultSet {
    /// The sentinel result for `route`.
    pub fn unavailable(route: &str) -> Self {
        Self {
            records: vec![ArrivalRecord::sentinel(route)],
            unavailable: true,
        }
    }

    /// Wraps real records, falling back to the sentinel when there are none.
    pub fn from_records(route: &str, records: Vec<ArrivalRecord>) -> Self {
        if records.is_empty() {
            Self::unavailable(route)
        } else {
            Self {
                records,
                unavailable: false,
            }
        }
    }

    pub fn is_unavailable(&self) -> bool {
        self.unavailable
    }

    pub fn records(&self) -> &[ArrivalRecord] {
        &self.records
    }

    /// The soonest arrival (first in document order).
    pub fn first(&self) -> &ArrivalRecord {
        &self.records[0]
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, ArrivalRecord> {
        self.records.iter()
    }
}

impl<'a> IntoIterator for &'a ResultSet {
    type Item = &'a ArrivalRecord;
    type IntoIter = std::slice::Iter<'a, ArrivalRecord>;

    fn into_iter(self) -> Self::IntoIter {
        self.records.iter()
    }
}

//! Row-level filtering model for the data-store port.
//!
//! A [`Query`] is a conjunction of [`Filter`]s plus optional ordering and
//! paging. The hosted backend receives it rendered as PostgREST parameters
//! ([`Query::to_query_pairs`]); in-process stores evaluate it directly with
//! [`Filter::matches`] and [`Query::apply`]. Both paths share the semantics
//! defined here.

use std::cmp::Ordering;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

// ---------------------------------------------------------------------------
// Tables
// ---------------------------------------------------------------------------

/// The relational tables the marketplace reads and writes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Table {
    Profiles,
    Properties,
    Rentals,
    RentalRequests,
    PropertyViewings,
    Complaints,
    Messages,
    Notifications,
    Payments,
    Renovations,
}

impl Table {
    /// Every table.
    pub const ALL: &'static [Table] = &[
        Table::Profiles,
        Table::Properties,
        Table::Rentals,
        Table::RentalRequests,
        Table::PropertyViewings,
        Table::Complaints,
        Table::Messages,
        Table::Notifications,
        Table::Payments,
        Table::Renovations,
    ];

    /// Returns the table name used by the data store.
    pub fn as_str(self) -> &'static str {
        match self {
            Table::Profiles => "profiles",
            Table::Properties => "properties",
            Table::Rentals => "rentals",
            Table::RentalRequests => "rental_requests",
            Table::PropertyViewings => "property_viewings",
            Table::Complaints => "complaints",
            Table::Messages => "messages",
            Table::Notifications => "notifications",
            Table::Payments => "payments",
            Table::Renovations => "renovations",
        }
    }
}

impl std::fmt::Display for Table {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Filters
// ---------------------------------------------------------------------------

/// One predicate on one column.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Filter {
    Eq(String, Value),
    Neq(String, Value),
    Gt(String, Value),
    Gte(String, Value),
    Lt(String, Value),
    Lte(String, Value),
    /// Column value is one of the listed values.
    In(String, Vec<Value>),
    /// Case-insensitive pattern match; `%` matches any run of characters.
    ILike(String, String),
    /// Column is `null` (or absent).
    IsNull(String),
    /// Array column contains the value.
    Contains(String, Value),
}

impl Filter {
    /// Returns the column this filter constrains.
    pub fn column(&self) -> &str {
        match self {
            Filter::Eq(c, _)
            | Filter::Neq(c, _)
            | Filter::Gt(c, _)
            | Filter::Gte(c, _)
            | Filter::Lt(c, _)
            | Filter::Lte(c, _)
            | Filter::In(c, _)
            | Filter::ILike(c, _)
            | Filter::IsNull(c)
            | Filter::Contains(c, _) => c,
        }
    }

    /// Evaluates the filter against a JSON row.
    ///
    /// Comparisons against a missing or `null` column are false, matching SQL
    /// three-valued logic; only [`Filter::IsNull`] matches such rows.
    pub fn matches(&self, row: &Value) -> bool {
        let cell = row.get(self.column()).unwrap_or(&Value::Null);
        match self {
            Filter::IsNull(_) => cell.is_null(),
            _ if cell.is_null() => false,
            Filter::Eq(_, v) => compare_values(cell, v) == Some(Ordering::Equal),
            Filter::Neq(_, v) => matches!(
                compare_values(cell, v),
                Some(Ordering::Less | Ordering::Greater)
            ),
            Filter::Gt(_, v) => compare_values(cell, v) == Some(Ordering::Greater),
            Filter::Gte(_, v) => matches!(
                compare_values(cell, v),
                Some(Ordering::Greater | Ordering::Equal)
            ),
            Filter::Lt(_, v) => compare_values(cell, v) == Some(Ordering::Less),
            Filter::Lte(_, v) => matches!(
                compare_values(cell, v),
                Some(Ordering::Less | Ordering::Equal)
            ),
            Filter::In(_, values) => values
                .iter()
                .any(|v| compare_values(cell, v) == Some(Ordering::Equal)),
            Filter::ILike(_, pattern) => cell
                .as_str()
                .is_some_and(|text| ilike(text, pattern)),
            Filter::Contains(_, v) => cell
                .as_array()
                .is_some_and(|items| items.iter().any(|item| item == v)),
        }
    }

    /// Renders the filter as a PostgREST `(column, operator.value)` pair.
    pub fn to_query_pair(&self) -> (String, String) {
        let rendered = match self {
            Filter::Eq(_, v) => format!("eq.{}", render_scalar(v)),
            Filter::Neq(_, v) => format!("neq.{}", render_scalar(v)),
            Filter::Gt(_, v) => format!("gt.{}", render_scalar(v)),
            Filter::Gte(_, v) => format!("gte.{}", render_scalar(v)),
            Filter::Lt(_, v) => format!("lt.{}", render_scalar(v)),
            Filter::Lte(_, v) => format!("lte.{}", render_scalar(v)),
            Filter::In(_, values) => format!(
                "in.({})",
                values
                    .iter()
                    .map(render_list_item)
                    .collect::<Vec<_>>()
                    .join(",")
            ),
            Filter::ILike(_, pattern) => format!("ilike.{}", pattern.replace('%', "*")),
            Filter::IsNull(_) => "is.null".to_owned(),
            Filter::Contains(_, v) => format!("cs.{{{}}}", render_list_item(v)),
        };
        (self.column().to_owned(), rendered)
    }
}

fn render_scalar(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => "null".to_owned(),
        other => other.to_string(),
    }
}

fn render_list_item(value: &Value) -> String {
    match value {
        Value::String(s) if s.contains([',', '(', ')', '"', '{', '}']) => {
            format!("\"{}\"", s.replace('"', "\\\""))
        }
        other => render_scalar(other),
    }
}

/// Orders two JSON scalars the way the data store would.
///
/// Numbers compare numerically, RFC 3339 strings compare as instants (so
/// differing fractional-second precision does not matter), other strings
/// lexicographically, booleans `false < true`. Mismatched kinds are
/// incomparable.
pub fn compare_values(a: &Value, b: &Value) -> Option<Ordering> {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => x.as_f64()?.partial_cmp(&y.as_f64()?),
        (Value::String(x), Value::String(y)) => {
            match (parse_instant(x), parse_instant(y)) {
                (Some(x), Some(y)) => Some(x.cmp(&y)),
                _ => Some(x.cmp(y)),
            }
        }
        (Value::Bool(x), Value::Bool(y)) => Some(x.cmp(y)),
        (Value::Null, Value::Null) => Some(Ordering::Equal),
        _ => None,
    }
}

fn parse_instant(text: &str) -> Option<DateTime<Utc>> {
    // Cheap pre-check so plain words never hit the parser.
    if text.len() < 20 || text.as_bytes().get(10) != Some(&b'T') {
        return None;
    }
    DateTime::parse_from_rfc3339(text)
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}

/// Case-insensitive `%`-wildcard match.
fn ilike(text: &str, pattern: &str) -> bool {
    let text: Vec<char> = text.to_lowercase().chars().collect();
    let pattern: Vec<char> = pattern.to_lowercase().chars().collect();

    // Classic two-pointer glob with backtracking to the last `%`.
    let (mut t, mut p) = (0usize, 0usize);
    let mut star: Option<(usize, usize)> = None;
    while t < text.len() {
        if p < pattern.len() && pattern[p] != '%' && pattern[p] == text[t] {
            t += 1;
            p += 1;
        } else if p < pattern.len() && pattern[p] == '%' {
            star = Some((p, t));
            p += 1;
        } else if let Some((sp, st)) = star {
            p = sp + 1;
            t = st + 1;
            star = Some((sp, st + 1));
        } else {
            return false;
        }
    }
    pattern[p..].iter().all(|c| *c == '%')
}

// ---------------------------------------------------------------------------
// Ordering and queries
// ---------------------------------------------------------------------------

/// Sort key for a query.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Order {
    pub column: String,
    pub ascending: bool,
}

/// A conjunction of filters with optional ordering and paging.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Query {
    pub filters: Vec<Filter>,
    pub order: Option<Order>,
    pub limit: Option<usize>,
    pub offset: Option<usize>,
}

impl Query {
    /// An unfiltered query.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds an arbitrary filter.
    pub fn filter(mut self, filter: Filter) -> Self {
        self.filters.push(filter);
        self
    }

    pub fn eq(self, column: &str, value: impl Into<Value>) -> Self {
        self.filter(Filter::Eq(column.to_owned(), value.into()))
    }

    pub fn neq(self, column: &str, value: impl Into<Value>) -> Self {
        self.filter(Filter::Neq(column.to_owned(), value.into()))
    }

    pub fn gt(self, column: &str, value: impl Into<Value>) -> Self {
        self.filter(Filter::Gt(column.to_owned(), value.into()))
    }

    pub fn gte(self, column: &str, value: impl Into<Value>) -> Self {
        self.filter(Filter::Gte(column.to_owned(), value.into()))
    }

    pub fn lt(self, column: &str, value: impl Into<Value>) -> Self {
        self.filter(Filter::Lt(column.to_owned(), value.into()))
    }

    pub fn lte(self, column: &str, value: impl Into<Value>) -> Self {
        self.filter(Filter::Lte(column.to_owned(), value.into()))
    }

    pub fn one_of(self, column: &str, values: Vec<Value>) -> Self {
        self.filter(Filter::In(column.to_owned(), values))
    }

    pub fn ilike(self, column: &str, pattern: impl Into<String>) -> Self {
        self.filter(Filter::ILike(column.to_owned(), pattern.into()))
    }

    pub fn is_null(self, column: &str) -> Self {
        self.filter(Filter::IsNull(column.to_owned()))
    }

    pub fn contains(self, column: &str, value: impl Into<Value>) -> Self {
        self.filter(Filter::Contains(column.to_owned(), value.into()))
    }

    pub fn order_asc(mut self, column: &str) -> Self {
        self.order = Some(Order {
            column: column.to_owned(),
            ascending: true,
        });
        self
    }

    pub fn order_desc(mut self, column: &str) -> Self {
        self.order = Some(Order {
            column: column.to_owned(),
            ascending: false,
        });
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn offset(mut self, offset: usize) -> Self {
        self.offset = Some(offset);
        self
    }

    /// Returns `true` if every filter matches the row.
    pub fn matches(&self, row: &Value) -> bool {
        self.filters.iter().all(|f| f.matches(row))
    }

    /// Filters, orders and pages `rows` in memory.
    ///
    /// `null` sorts last in ascending order and first in descending order,
    /// like PostgreSQL's default.
    pub fn apply<'a>(&self, rows: impl IntoIterator<Item = &'a Value>) -> Vec<Value> {
        let mut selected: Vec<Value> = rows
            .into_iter()
            .filter(|row| self.matches(row))
            .cloned()
            .collect();

        if let Some(order) = &self.order {
            selected.sort_by(|a, b| {
                let a = a.get(&order.column).unwrap_or(&Value::Null);
                let b = b.get(&order.column).unwrap_or(&Value::Null);
                let ordering = match (a.is_null(), b.is_null()) {
                    (true, true) => Ordering::Equal,
                    (true, false) => Ordering::Greater,
                    (false, true) => Ordering::Less,
                    (false, false) => compare_values(a, b).unwrap_or(Ordering::Equal),
                };
                if order.ascending {
                    ordering
                } else {
                    ordering.reverse()
                }
            });
        }

        let offset = self.offset.unwrap_or(0);
        let limit = self.limit.unwrap_or(usize::MAX);
        selected.into_iter().skip(offset).take(limit).collect()
    }

    /// Renders the query as PostgREST query-string pairs.
    pub fn to_query_pairs(&self) -> Vec<(String, String)> {
        let mut pairs: Vec<(String, String)> =
            self.filters.iter().map(Filter::to_query_pair).collect();
        if let Some(order) = &self.order {
            let direction = if order.ascending { "asc" } else { "desc" };
            pairs.push(("order".to_owned(), format!("{}.{direction}", order.column)));
        }
        if let Some(limit) = self.limit {
            pairs.push(("limit".to_owned(), limit.to_string()));
        }
        if let Some(offset) = self.offset {
            pairs.push(("offset".to_owned(), offset.to_string()));
        }
        pairs
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn rows() -> Vec<Value> {
        vec![
            json!({ "id": 1, "city": "Leuven", "rent": 450, "tags": ["wifi"], "note": null,
                    "created_at": "2026-10-01T10:00:00Z" }),
            json!({ "id": 2, "city": "Gent", "rent": 620, "tags": ["wifi", "garden"],
                    "created_at": "2026-10-01T10:00:00.500Z" }),
            json!({ "id": 3, "city": "leuven", "rent": 380, "tags": [], "note": "quiet",
                    "created_at": "2026-09-30T08:00:00Z" }),
        ]
    }

    fn ids(rows: &[Value]) -> Vec<i64> {
        rows.iter().map(|r| r["id"].as_i64().unwrap()).collect()
    }

    #[test]
    fn range_filters_compare_numerically() {
        let q = Query::new().gte("rent", 400).lt("rent", 620);
        assert_eq!(ids(&q.apply(&rows())), vec![1]);
    }

    #[test]
    fn eq_is_case_sensitive_but_ilike_is_not() {
        assert_eq!(ids(&Query::new().eq("city", "Leuven").apply(&rows())), vec![1]);
        assert_eq!(ids(&Query::new().ilike("city", "leu%").apply(&rows())), vec![1, 3]);
        assert_eq!(ids(&Query::new().ilike("city", "%EN%").apply(&rows())), vec![1, 2, 3]);
        assert!(Query::new().ilike("city", "gen").apply(&rows()).is_empty());
    }

    #[test]
    fn null_columns_only_match_is_null() {
        assert_eq!(ids(&Query::new().is_null("note").apply(&rows())), vec![1, 2]);
        assert_eq!(ids(&Query::new().neq("note", "loud").apply(&rows())), vec![3]);
    }

    #[test]
    fn in_and_contains() {
        let q = Query::new().one_of("id", vec![json!(1), json!(3)]);
        assert_eq!(ids(&q.apply(&rows())), vec![1, 3]);
        assert_eq!(ids(&Query::new().contains("tags", "garden").apply(&rows())), vec![2]);
    }

    #[test]
    fn timestamps_order_by_instant_not_text() {
        let ordered = Query::new().order_desc("created_at").apply(&rows());
        assert_eq!(ids(&ordered), vec![2, 1, 3]);
    }

    #[test]
    fn paging_applies_after_ordering() {
        let q = Query::new().order_asc("rent").offset(1).limit(1);
        assert_eq!(ids(&q.apply(&rows())), vec![1]);
    }

    #[test]
    fn renders_postgrest_parameters() {
        let q = Query::new()
            .eq("city", "Leuven")
            .lte("rent", 500)
            .ilike("title", "%room%")
            .one_of("status", vec![json!("pending"), json!("a,b")])
            .is_null("end_date")
            .contains("amenities", "wifi")
            .order_desc("created_at")
            .limit(20)
            .offset(40);
        let pairs = q.to_query_pairs();
        let expected: Vec<(String, String)> = [
            ("city", "eq.Leuven"),
            ("rent", "lte.500"),
            ("title", "ilike.*room*"),
            ("status", "in.(pending,\"a,b\")"),
            ("end_date", "is.null"),
            ("amenities", "cs.{wifi}"),
            ("order", "created_at.desc"),
            ("limit", "20"),
            ("offset", "40"),
        ]
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();
        assert_eq!(pairs, expected);
    }

    #[test]
    fn table_names_match_serde() {
        for table in Table::ALL {
            assert_eq!(
                serde_json::to_value(table).unwrap(),
                Value::String(table.as_str().to_owned())
            );
        }
    }
}

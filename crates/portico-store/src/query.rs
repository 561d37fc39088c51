//! Typed query options.
//!
//! A [`Query`] is a closed set of options built with a builder: equality
//! filters, one ordering, and offset/limit paging.

use std::cmp::Ordering;

use serde_json::Value;

/// A single field predicate.
#[derive(Debug, Clone, PartialEq)]
pub enum Filter {
    /// Field equals value.
    Eq(String, Value),
    /// Field differs from value.
    Ne(String, Value),
}

impl Filter {
    fn matches(&self, row: &Value) -> bool {
        match self {
            Self::Eq(field, value) => row.get(field) == Some(value),
            Self::Ne(field, value) => row.get(field) != Some(value),
        }
    }
}

/// Sort direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// Smallest first.
    Asc,
    /// Largest first.
    Desc,
}

/// Query over one collection.
///
/// # Example
///
/// ```
/// use portico_store::Query;
///
/// let query = Query::new()
///     .eq("role", "admin")
///     .order_by("id", portico_store::Direction::Desc)
///     .offset(20)
///     .limit(10);
/// assert_eq!(query.limit_value(), Some(10));
/// ```
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Query {
    filters: Vec<Filter>,
    order: Option<(String, Direction)>,
    offset: usize,
    limit: Option<usize>,
}

impl Query {
    /// Matches every record.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Matches the record with the given id.
    #[must_use]
    pub fn by_id(id: u64) -> Self {
        Self::new().eq("id", id)
    }

    /// Adds an equality filter.
    #[must_use]
    pub fn eq(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.filters.push(Filter::Eq(field.into(), value.into()));
        self
    }

    /// Adds an inequality filter.
    #[must_use]
    pub fn ne(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.filters.push(Filter::Ne(field.into(), value.into()));
        self
    }

    /// Sorts by a field. Without an ordering, records come back by id.
    #[must_use]
    pub fn order_by(mut self, field: impl Into<String>, direction: Direction) -> Self {
        self.order = Some((field.into(), direction));
        self
    }

    /// Skips the first `offset` matches.
    #[must_use]
    pub fn offset(mut self, offset: usize) -> Self {
        self.offset = offset;
        self
    }

    /// Returns at most `limit` matches.
    #[must_use]
    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Returns the limit, if any.
    #[must_use]
    pub fn limit_value(&self) -> Option<usize> {
        self.limit
    }

    /// Returns `true` if the row passes every filter.
    pub(crate) fn matches(&self, row: &Value) -> bool {
        self.filters.iter().all(|f| f.matches(row))
    }

    /// Applies ordering and paging to matching rows.
    pub(crate) fn arrange<'a>(&self, mut rows: Vec<&'a Value>) -> Vec<&'a Value> {
        if let Some((field, direction)) = &self.order {
            rows.sort_by(|a, b| {
                let ordering = compare(a.get(field), b.get(field));
                match direction {
                    Direction::Asc => ordering,
                    Direction::Desc => ordering.reverse(),
                }
            });
        }
        rows.into_iter()
            .skip(self.offset)
            .take(self.limit.unwrap_or(usize::MAX))
            .collect()
    }
}

fn compare(a: Option<&Value>, b: Option<&Value>) -> Ordering {
    match (a, b) {
        (Some(Value::Number(a)), Some(Value::Number(b))) => a
            .as_f64()
            .partial_cmp(&b.as_f64())
            .unwrap_or(Ordering::Equal),
        (Some(Value::String(a)), Some(Value::String(b))) => a.cmp(b),
        (Some(Value::Bool(a)), Some(Value::Bool(b))) => a.cmp(b),
        (None, Some(_)) => Ordering::Less,
        (Some(_), None) => Ordering::Greater,
        _ => Ordering::Equal,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn rows() -> Vec<Value> {
        vec![
            json!({"id": 1, "name": "cat", "role": "default"}),
            json!({"id": 2, "name": "ann", "role": "admin"}),
            json!({"id": 3, "name": "bob", "role": "default"}),
        ]
    }

    fn names(query: &Query, rows: &[Value]) -> Vec<String> {
        let matching: Vec<&Value> = rows.iter().filter(|r| query.matches(r)).collect();
        query
            .arrange(matching)
            .into_iter()
            .map(|r| r["name"].as_str().unwrap().to_string())
            .collect()
    }

    #[test]
    fn test_filters() {
        let rows = rows();
        assert_eq!(names(&Query::new().eq("role", "default"), &rows), ["cat", "bob"]);
        assert_eq!(names(&Query::new().ne("role", "default"), &rows), ["ann"]);
        assert_eq!(names(&Query::by_id(3), &rows), ["bob"]);
    }

    #[test]
    fn test_ordering_and_paging() {
        let rows = rows();
        let query = Query::new().order_by("name", Direction::Asc);
        assert_eq!(names(&query, &rows), ["ann", "bob", "cat"]);

        let query = Query::new().order_by("id", Direction::Desc).offset(1).limit(1);
        assert_eq!(names(&query, &rows), ["ann"]);
    }
}

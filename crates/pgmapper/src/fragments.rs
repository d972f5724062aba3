//! Reusable SQL fragments for listing queries.
//!
//! These return plain strings meant to be passed to [`Query::select`] or
//! [`Query::where_`](crate::qb::Query::where_). Table and field names are
//! interpolated verbatim and must come from code, never from user input.
//!
//! ```ignore
//! let page = Pagination::new(page_no, 20);
//! let rows: Option<Vec<Notice>> = Query::new("noticeList")
//!     .select(&[
//!         &row_number("ORDER BY n.created_time DESC"),
//!         &all_count("board.notice", None),
//!         &total_count("board.notice", Some(where_)),
//!         "n.*",
//!     ])
//!     .from("board.notice n")
//!     .where_(&date_range("n.created_time"))
//!     .limit(page.page_size)
//!     .offset(page.offset())
//!     .set_param("fromDate", from)
//!     .set_param("toDate", to)
//!     .find_many(&db)
//!     .await?;
//! ```
//!
//! [`Query::select`]: crate::qb::Query::select

use serde::Serialize;

fn count_column(table: &str, where_clause: Option<&str>, alias: &str) -> String {
    match where_clause.map(str::trim).filter(|w| !w.is_empty()) {
        Some(w) => format!("(SELECT count(*) FROM {table} WHERE {w}) AS {alias}"),
        None => format!("(SELECT count(*) FROM {table}) AS {alias}"),
    }
}

/// Sub-select counting every row of `table`, aliased `all_cnt`.
pub fn all_count(table: &str, where_clause: Option<&str>) -> String {
    count_column(table, where_clause, "all_cnt")
}

/// Sub-select counting the filtered rows of `table`, aliased `total_cnt`.
pub fn total_count(table: &str, where_clause: Option<&str>) -> String {
    count_column(table, where_clause, "total_cnt")
}

/// `row_number()` window column aliased `no`; `window` is the OVER body,
/// e.g. `ORDER BY created_time DESC`.
pub fn row_number(window: &str) -> String {
    format!("row_number() over({window}) as no")
}

/// Day-granular range predicate on `field`, bound through the `:fromDate` and
/// `:toDate` parameters (both inclusive).
pub fn date_range(field: &str) -> String {
    format!(
        "(date_trunc('day', {field}::timestamp) BETWEEN date_trunc('day', :fromDate::timestamp) \
         AND date_trunc('day', :toDate::timestamp))"
    )
}

/// Paging metadata returned next to a listing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Pagination {
    pub all_cnt: i64,
    pub total_cnt: i64,
    /// 1-based.
    pub page: i64,
    pub page_size: i64,
    pub total_page: i64,
}

impl Pagination {
    /// Page `page` (1-based, clamped) of `page_size` rows (clamped to 1).
    pub fn new(page: i64, page_size: i64) -> Self {
        Self {
            all_cnt: 0,
            total_cnt: 0,
            page: page.max(1),
            page_size: page_size.max(1),
            total_page: 0,
        }
    }

    /// Fill in counts and derive the page total from `total_cnt`.
    pub fn with_counts(mut self, all_cnt: i64, total_cnt: i64) -> Self {
        self.all_cnt = all_cnt;
        self.total_cnt = total_cnt;
        let total = total_cnt.max(0);
        self.total_page = total / self.page_size + i64::from(total % self.page_size != 0);
        self
    }

    /// Row offset of the current page, saturating at `i64::MAX`.
    pub fn offset(&self) -> i64 {
        (self.page - 1).saturating_mul(self.page_size)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::qb::Query;
    use crate::value::SqlValue;

    #[test]
    fn test_count_columns() {
        assert_eq!(all_count("t", None), "(SELECT count(*) FROM t) AS all_cnt");
        assert_eq!(all_count("t", Some("  ")), "(SELECT count(*) FROM t) AS all_cnt");
        assert_eq!(
            total_count("t", Some("status = :status")),
            "(SELECT count(*) FROM t WHERE status = :status) AS total_cnt"
        );
    }

    #[test]
    fn test_row_number() {
        assert_eq!(
            row_number("ORDER BY id DESC"),
            "row_number() over(ORDER BY id DESC) as no"
        );
    }

    #[test]
    fn test_date_range_binds_through_casts() {
        let stmt = Query::new("range")
            .select(&[])
            .from("t")
            .where_(&date_range("t.created_time"))
            .set_param("fromDate", "2024-01-01")
            .set_param("toDate", "2024-01-31")
            .build()
            .unwrap();
        assert_eq!(
            stmt.text,
            "SELECT * FROM t WHERE (date_trunc('day', t.created_time::timestamp) BETWEEN \
             date_trunc('day', $1::timestamp) AND date_trunc('day', $2::timestamp));"
        );
        assert_eq!(
            stmt.values,
            vec![SqlValue::from("2024-01-01"), SqlValue::from("2024-01-31")]
        );
    }

    #[test]
    fn test_count_fragment_params_are_bound() {
        let stmt = Query::new("list")
            .select(&[&total_count("t", Some("kind = :kind")), "t.*"])
            .from("t")
            .where_("kind = :kind")
            .set_param("kind", "notice")
            .build()
            .unwrap();
        assert_eq!(
            stmt.text,
            "SELECT (SELECT count(*) FROM t WHERE kind = $1) AS total_cnt, t.* FROM t WHERE kind = $1;"
        );
        assert_eq!(stmt.values.len(), 1);
    }

    #[test]
    fn test_pagination() {
        let page = Pagination::new(3, 20).with_counts(100, 41);
        assert_eq!(page.offset(), 40);
        assert_eq!(page.total_page, 3);

        let clamped = Pagination::new(0, 0).with_counts(0, 0);
        assert_eq!(clamped.page, 1);
        assert_eq!(clamped.page_size, 1);
        assert_eq!(clamped.offset(), 0);
        assert_eq!(clamped.total_page, 0);
    }

    #[test]
    fn test_pagination_extremes() {
        assert_eq!(Pagination::new(i64::MAX, 20).offset(), i64::MAX);
        assert_eq!(Pagination::new(2, i64::MAX).offset(), i64::MAX);

        let page = Pagination::new(1, 20).with_counts(i64::MAX, i64::MAX);
        assert_eq!(page.total_page, i64::MAX / 20 + 1);
        let page = Pagination::new(1, i64::MAX).with_counts(i64::MAX, i64::MAX);
        assert_eq!(page.total_page, 1);
        let page = Pagination::new(1, 10).with_counts(-5, -5);
        assert_eq!(page.total_page, 0);
    }

    #[test]
    fn test_pagination_serializes_camel_case() {
        let json = serde_json::to_value(Pagination::new(1, 10).with_counts(5, 5)).unwrap();
        assert_eq!(json["totalPage"], 1);
        assert_eq!(json["pageSize"], 10);
    }
}

//! SELECT query builder.
//!
//! A `Select<M>` is the scope object relationships hand out: it is built
//! lazily, refined by chaining, and only touches the database when
//! materialized (`all`, `first`, `one`), counted, or paged.

use crate::clause::{Limit, Offset, OrderBy, Where};
use crate::expr::{Dialect, Expr};
use grouped_scope_core::{Connection, Error, Model, Result, Value};
use std::fmt;
use std::marker::PhantomData;

/// A SELECT query builder.
///
/// Conditions live in two slots. The *scope* slot holds restrictions added
/// with [`Select::scoped`]; they are always ANDed in front of everything
/// else, so a later [`Select::or_filter`] can widen the caller's own filters
/// but never the scope. The *where* slot holds ordinary caller filters.
pub struct Select<M: Model> {
    /// Columns to select (empty = all)
    columns: Vec<String>,
    /// Restrictions that later filters cannot widen
    scope: Option<Where>,
    /// WHERE clause conditions
    where_clause: Option<Where>,
    /// ORDER BY clauses
    order_by: Vec<OrderBy>,
    /// LIMIT clause
    limit: Option<Limit>,
    /// OFFSET clause
    offset: Option<Offset>,
    /// DISTINCT flag
    distinct: bool,
    /// Placeholder style used when building
    dialect: Dialect,
    _marker: PhantomData<fn() -> M>,
}

impl<M: Model> Select<M> {
    /// Create a new SELECT query for the model's table.
    pub fn new() -> Self {
        Self {
            columns: Vec::new(),
            scope: None,
            where_clause: None,
            order_by: Vec::new(),
            limit: None,
            offset: None,
            distinct: false,
            dialect: Dialect::default(),
            _marker: PhantomData,
        }
    }

    /// Select specific columns.
    pub fn columns(mut self, cols: &[&str]) -> Self {
        self.columns = cols.iter().map(|&s| s.to_string()).collect();
        self
    }

    /// Add a restriction to the scope slot.
    ///
    /// Scope restrictions are ANDed together and rendered before any
    /// [`filter`](Self::filter)/[`or_filter`](Self::or_filter) condition.
    pub fn scoped(mut self, expr: Expr) -> Self {
        self.scope = Some(match self.scope {
            Some(existing) => existing.and(expr),
            None => Where::new(expr),
        });
        self
    }

    /// Add a WHERE condition (AND).
    pub fn filter(mut self, expr: Expr) -> Self {
        self.where_clause = Some(match self.where_clause {
            Some(existing) => existing.and(expr),
            None => Where::new(expr),
        });
        self
    }

    /// Add an OR WHERE condition.
    pub fn or_filter(mut self, expr: Expr) -> Self {
        self.where_clause = Some(match self.where_clause {
            Some(existing) => existing.or(expr),
            None => Where::new(expr),
        });
        self
    }

    /// Add ORDER BY clause.
    pub fn order_by(mut self, order: OrderBy) -> Self {
        self.order_by.push(order);
        self
    }

    /// Set LIMIT.
    pub fn limit(mut self, n: u64) -> Self {
        self.limit = Some(Limit(n));
        self
    }

    /// Set OFFSET.
    pub fn offset(mut self, n: u64) -> Self {
        self.offset = Some(Offset(n));
        self
    }

    /// Restrict to one page of results.
    ///
    /// Pages are 1-based; page 0 is treated as page 1.
    pub fn paginate(self, page: u64, per_page: u64) -> Self {
        let page = page.max(1);
        self.limit(per_page)
            .offset((page - 1).saturating_mul(per_page))
    }

    /// Make this a DISTINCT query.
    pub fn distinct(mut self) -> Self {
        self.distinct = true;
        self
    }

    /// Use a specific placeholder dialect when building.
    pub fn with_dialect(mut self, dialect: Dialect) -> Self {
        self.dialect = dialect;
        self
    }

    /// Apply a named scope.
    ///
    /// # Example
    ///
    /// ```ignore
    /// fn urgent(q: Select<Report>) -> Select<Report> {
    ///     q.filter(Expr::col("title").eq("URGENT"))
    /// }
    /// let q = association.query()?.apply(urgent);
    /// ```
    pub fn apply(self, scope: impl FnOnce(Self) -> Self) -> Self {
        scope(self)
    }

    /// Restrictions in the scope slot, if any.
    pub fn scope_expr(&self) -> Option<&Expr> {
        self.scope.as_ref().map(Where::expr)
    }

    /// Caller filters in the where slot, if any.
    pub fn where_expr(&self) -> Option<&Expr> {
        self.where_clause.as_ref().map(Where::expr)
    }

    /// The full predicate: scope restrictions ANDed with caller filters.
    pub fn predicate(&self) -> Option<Expr> {
        match (self.scope_expr(), self.where_expr()) {
            (Some(scope), Some(filters)) => Some(scope.clone().and(filters.clone())),
            (Some(only), None) | (None, Some(only)) => Some(only.clone()),
            (None, None) => None,
        }
    }

    /// Can this query never return a row because its scope is an empty set?
    pub fn is_empty_scope(&self) -> bool {
        let mut stack: Vec<&Expr> = self.scope_expr().into_iter().collect();
        while let Some(expr) = stack.pop() {
            match expr {
                Expr::Binary {
                    left,
                    op: crate::expr::BinaryOp::And,
                    right,
                } => {
                    stack.push(left.as_ref());
                    stack.push(right.as_ref());
                }
                other if other.is_empty_set() => return true,
                _ => {}
            }
        }
        false
    }

    /// Build the SQL query and parameters.
    pub fn build(&self) -> (String, Vec<Value>) {
        self.build_with_dialect(self.dialect)
    }

    /// Build the SQL query and parameters with a specific dialect.
    pub fn build_with_dialect(&self, dialect: Dialect) -> (String, Vec<Value>) {
        let mut sql = String::new();
        let mut params = Vec::new();

        // SELECT
        sql.push_str("SELECT ");
        if self.distinct {
            sql.push_str("DISTINCT ");
        }

        if self.columns.is_empty() {
            sql.push('*');
        } else {
            sql.push_str(&self.columns.join(", "));
        }

        // FROM
        sql.push_str(" FROM ");
        sql.push_str(M::TABLE_NAME);

        // WHERE
        if let Some(predicate) = self.predicate() {
            let where_sql = predicate.build_with_dialect(dialect, &mut params, 0);
            sql.push_str(" WHERE ");
            sql.push_str(&where_sql);
        }

        // ORDER BY
        if !self.order_by.is_empty() {
            sql.push_str(" ORDER BY ");
            let order_strs: Vec<_> = self
                .order_by
                .iter()
                .map(|o| o.build(dialect, &mut params, 0))
                .collect();
            sql.push_str(&order_strs.join(", "));
        }

        // LIMIT
        if let Some(Limit(n)) = self.limit {
            sql.push_str(&format!(" LIMIT {}", n));
        }

        // OFFSET
        if let Some(Offset(n)) = self.offset {
            sql.push_str(&format!(" OFFSET {}", n));
        }

        (sql, params)
    }

    /// Render the query with its parameters inlined as SQL literals.
    ///
    /// Meant for logs and assertions; execution always binds parameters.
    pub fn to_sql(&self) -> String {
        let (sql, params) = self.build();
        self.dialect.inline_params(&sql, &params)
    }

    fn count_query(&self) -> Self {
        let mut count_query = self.clone();
        count_query.columns = vec!["COUNT(*) as count".to_string()];
        count_query.order_by.clear();
        count_query.limit = None;
        count_query.offset = None;
        count_query.distinct = false;
        count_query
    }

    /// Render the COUNT query this scope would run.
    pub fn count_sql(&self) -> String {
        self.count_query().to_sql()
    }

    // ==================== Execution ====================

    /// Execute the query and return all matching rows.
    #[tracing::instrument(level = "debug", skip(self, conn), fields(table = M::TABLE_NAME))]
    pub fn all<C: Connection + ?Sized>(&self, conn: &C) -> Result<Vec<M>> {
        let (sql, params) = self.build();
        tracing::trace!(sql = %sql, params = params.len(), "SELECT");

        let rows = conn.query(&sql, &params)?;
        tracing::debug!(row_count = rows.len(), "Materializing rows");
        rows.iter().map(M::from_row).collect()
    }

    /// Execute the query and return the first matching row.
    pub fn first<C: Connection + ?Sized>(&self, conn: &C) -> Result<Option<M>> {
        let query = self.clone().limit(1);
        let (sql, params) = query.build();
        tracing::trace!(sql = %sql, "SELECT first");
        conn.query_one(&sql, &params)?
            .map(|row| M::from_row(&row))
            .transpose()
    }

    /// Execute the query and return exactly one row, or error.
    pub fn one<C: Connection + ?Sized>(&self, conn: &C) -> Result<M> {
        let mut rows = self.clone().limit(2).all(conn)?;
        match rows.len() {
            1 => Ok(rows.remove(0)),
            0 => Err(Error::Custom("Expected one row, found none".to_string())),
            n => Err(Error::Custom(format!("Expected one row, found {n}"))),
        }
    }

    /// Execute the query and return the count of matching rows.
    ///
    /// Ordering, LIMIT and OFFSET are dropped; the count covers the whole
    /// scope.
    #[tracing::instrument(level = "debug", skip(self, conn), fields(table = M::TABLE_NAME))]
    pub fn count<C: Connection + ?Sized>(&self, conn: &C) -> Result<u64> {
        let (sql, params) = self.count_query().build();
        tracing::trace!(sql = %sql, "COUNT");

        match conn.query_one(&sql, &params)? {
            Some(row) => row.get_named::<u64>("count"),
            None => Ok(0),
        }
    }

    /// Check if any rows match the query.
    pub fn exists<C: Connection + ?Sized>(&self, conn: &C) -> Result<bool> {
        self.count(conn).map(|n| n > 0)
    }

    /// Fetch one page of results together with the total row count.
    pub fn page<C: Connection + ?Sized>(
        &self,
        conn: &C,
        page: u64,
        per_page: u64,
    ) -> Result<Page<M>> {
        let total = self.count(conn)?;
        let page = page.max(1);
        let items = self.clone().paginate(page, per_page).all(conn)?;
        Ok(Page {
            items,
            page,
            per_page,
            total,
        })
    }
}

impl<M: Model> Default for Select<M> {
    fn default() -> Self {
        Self::new()
    }
}

impl<M: Model> Clone for Select<M> {
    fn clone(&self) -> Self {
        Self {
            columns: self.columns.clone(),
            scope: self.scope.clone(),
            where_clause: self.where_clause.clone(),
            order_by: self.order_by.clone(),
            limit: self.limit,
            offset: self.offset,
            distinct: self.distinct,
            dialect: self.dialect,
            _marker: PhantomData,
        }
    }
}

impl<M: Model> PartialEq for Select<M> {
    fn eq(&self, other: &Self) -> bool {
        self.columns == other.columns
            && self.scope == other.scope
            && self.where_clause == other.where_clause
            && self.order_by == other.order_by
            && self.limit == other.limit
            && self.offset == other.offset
            && self.distinct == other.distinct
            && self.dialect == other.dialect
    }
}

impl<M: Model> fmt::Debug for Select<M> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let (sql, params) = self.build();
        f.debug_struct("Select")
            .field("table", &M::TABLE_NAME)
            .field("sql", &sql)
            .field("params", &params)
            .finish()
    }
}

/// One page of query results.
#[derive(Debug, Clone, PartialEq)]
pub struct Page<M> {
    /// Records on this page
    pub items: Vec<M>,
    /// 1-based page number
    pub page: u64,
    /// Page size
    pub per_page: u64,
    /// Total matching rows across all pages
    pub total: u64,
}

impl<M> Page<M> {
    /// Number of pages needed for `total` rows.
    pub fn total_pages(&self) -> u64 {
        if self.per_page == 0 {
            0
        } else {
            self.total.div_ceil(self.per_page)
        }
    }

    /// Is there a page after this one?
    pub fn has_next(&self) -> bool {
        self.page < self.total_pages()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use grouped_scope_core::Row;
    use std::sync::Mutex;

    #[derive(Debug, Clone, PartialEq)]
    struct Report {
        id: i64,
        title: String,
    }

    impl Model for Report {
        const TABLE_NAME: &'static str = "reports";
        const PRIMARY_KEY: &'static [&'static str] = &["id"];

        fn to_row(&self) -> Vec<(&'static str, Value)> {
            vec![("id", self.id.into()), ("title", self.title.clone().into())]
        }

        fn from_row(row: &Row) -> Result<Self> {
            Ok(Self {
                id: row.get_named("id")?,
                title: row.get_named("title")?,
            })
        }

        fn primary_key_value(&self) -> Vec<Value> {
            vec![self.id.into()]
        }

        fn is_new(&self) -> bool {
            false
        }
    }

    /// Answers every query with the same rows and remembers the SQL.
    #[derive(Default)]
    struct Canned {
        rows: Vec<Row>,
        seen: Mutex<Vec<String>>,
    }

    impl Connection for Canned {
        fn query(&self, sql: &str, _params: &[Value]) -> Result<Vec<Row>> {
            self.seen.lock().unwrap().push(sql.to_string());
            Ok(self.rows.clone())
        }

        fn execute(&self, _sql: &str, _params: &[Value]) -> Result<u64> {
            Ok(0)
        }

        fn insert(&self, _sql: &str, _params: &[Value]) -> Result<i64> {
            Ok(0)
        }
    }

    fn report_row(id: i32, title: &str) -> Row {
        Row::new(
            vec!["id".to_string(), "title".to_string()],
            vec![Value::Int(id), Value::Text(title.to_string())],
        )
    }

    #[test]
    fn test_select_all_columns() {
        let (sql, params) = Select::<Report>::new().build();
        assert_eq!(sql, "SELECT * FROM reports");
        assert!(params.is_empty());
    }

    #[test]
    fn test_select_with_multiple_and_filters() {
        let query = Select::<Report>::new()
            .filter(Expr::col("title").eq("URGENT"))
            .filter(Expr::col("id").gt(3));
        let (sql, params) = query.build();
        assert_eq!(
            sql,
            "SELECT * FROM reports WHERE \"title\" = $1 AND \"id\" > $2"
        );
        assert_eq!(
            params,
            vec![Value::Text("URGENT".to_string()), Value::Int(3)]
        );
    }

    #[test]
    fn scope_comes_first_and_or_filter_cannot_widen_it() {
        let query = Select::<Report>::new()
            .scoped(Expr::qualified("reports", "employee_id").eq(10))
            .filter(Expr::col("title").eq("URGENT"))
            .or_filter(Expr::col("body").contains("URGENT"));
        let (sql, params) = query.build();
        assert_eq!(
            sql,
            "SELECT * FROM reports WHERE \"reports\".\"employee_id\" = $1 AND (\"title\" = $2 OR \"body\" LIKE $3)"
        );
        assert_eq!(params[0], Value::Int(10));
    }

    #[test]
    fn paginate_is_one_based() {
        let (sql, _) = Select::<Report>::new().paginate(1, 2).build();
        assert_eq!(sql, "SELECT * FROM reports LIMIT 2 OFFSET 0");

        let (sql, _) = Select::<Report>::new().paginate(3, 25).build();
        assert_eq!(sql, "SELECT * FROM reports LIMIT 25 OFFSET 50");

        let (sql, _) = Select::<Report>::new().paginate(0, 10).build();
        assert_eq!(sql, "SELECT * FROM reports LIMIT 10 OFFSET 0");
    }

    #[test]
    fn order_limit_offset_render_in_order() {
        let query = Select::<Report>::new()
            .order_by(OrderBy::desc(Expr::col("id")))
            .limit(5)
            .offset(10);
        assert_eq!(
            query.build().0,
            "SELECT * FROM reports ORDER BY \"id\" DESC LIMIT 5 OFFSET 10"
        );
    }

    #[test]
    fn to_sql_inlines_literals() {
        let query = Select::<Report>::new()
            .scoped(Expr::qualified("reports", "email").in_list(vec!["a@x.io", "b@x.io"]));
        assert_eq!(
            query.to_sql(),
            "SELECT * FROM reports WHERE \"reports\".\"email\" IN ('a@x.io', 'b@x.io')"
        );
    }

    #[test]
    fn count_sql_drops_paging_and_order() {
        let query = Select::<Report>::new()
            .scoped(Expr::qualified("reports", "employee_id").in_list(vec![10, 11]))
            .order_by(OrderBy::asc(Expr::col("id")))
            .paginate(2, 2);
        assert_eq!(
            query.count_sql(),
            "SELECT COUNT(*) as count FROM reports WHERE \"reports\".\"employee_id\" IN (10, 11)"
        );
    }

    #[test]
    fn empty_scope_is_detected() {
        let empty = Select::<Report>::new()
            .scoped(Expr::qualified("reports", "employee_id").in_list(Vec::<Value>::new()))
            .filter(Expr::col("title").eq("x"));
        assert!(empty.is_empty_scope());
        assert_eq!(
            empty.build().0,
            "SELECT * FROM reports WHERE 1 = 0 AND \"title\" = $1"
        );

        let full = Select::<Report>::new().scoped(Expr::col("employee_id").eq(1));
        assert!(!full.is_empty_scope());
    }

    #[test]
    fn apply_runs_named_scope() {
        fn urgent(q: Select<Report>) -> Select<Report> {
            q.filter(Expr::col("title").eq("URGENT"))
        }
        let query = Select::<Report>::new().apply(urgent);
        assert_eq!(
            query.where_expr(),
            Some(&Expr::col("title").eq("URGENT"))
        );
        assert!(query.scope_expr().is_none());
    }

    #[test]
    fn clones_compare_equal() {
        let query = Select::<Report>::new().scoped(Expr::col("employee_id").eq(1));
        assert_eq!(query.clone(), query);
        assert_ne!(query.clone().limit(1), query);
    }

    #[test]
    fn all_and_first_materialize_rows() {
        let conn = Canned {
            rows: vec![report_row(1, "URGENT"), report_row(2, "weekly")],
            ..Canned::default()
        };
        let query = Select::<Report>::new();

        let reports = query.all(&conn).unwrap();
        assert_eq!(reports.len(), 2);
        assert_eq!(reports[1].title, "weekly");

        let first = query.first(&conn).unwrap().unwrap();
        assert_eq!(first.id, 1);

        let seen = conn.seen.lock().unwrap();
        assert_eq!(seen[1], "SELECT * FROM reports LIMIT 1");
    }

    #[test]
    fn one_rejects_many_and_none() {
        let many = Canned {
            rows: vec![report_row(1, "a"), report_row(2, "b")],
            ..Canned::default()
        };
        match Select::<Report>::new().one(&many) {
            Err(Error::Custom(msg)) => assert!(msg.contains("found 2")),
            other => panic!("expected custom error, got {other:?}"),
        }

        let none = Canned::default();
        match Select::<Report>::new().one(&none) {
            Err(Error::Custom(msg)) => assert!(msg.contains("found none")),
            other => panic!("expected custom error, got {other:?}"),
        }
    }

    #[test]
    fn count_reads_count_column() {
        let conn = Canned {
            rows: vec![Row::new(vec!["count".to_string()], vec![Value::Int(3)])],
            ..Canned::default()
        };
        let query = Select::<Report>::new().filter(Expr::col("id").gt(0)).limit(1);
        assert_eq!(query.count(&conn).unwrap(), 3);
        assert!(query.exists(&conn).unwrap());
        assert_eq!(
            conn.seen.lock().unwrap()[0],
            "SELECT COUNT(*) as count FROM reports WHERE \"id\" > $1"
        );
    }

    #[test]
    fn page_math() {
        let page = Page {
            items: vec![1, 2],
            page: 1,
            per_page: 2,
            total: 5,
        };
        assert_eq!(page.total_pages(), 3);
        assert!(page.has_next());

        let last = Page {
            items: vec![5],
            page: 3,
            ..page
        };
        assert!(!last.has_next());

        let degenerate = Page::<i32> {
            items: Vec::new(),
            page: 1,
            per_page: 0,
            total: 4,
        };
        assert_eq!(degenerate.total_pages(), 0);
    }
}

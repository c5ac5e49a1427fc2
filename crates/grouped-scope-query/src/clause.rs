//! SQL clause types (WHERE, ORDER BY, LIMIT, OFFSET).

use crate::expr::{Dialect, Expr};
use grouped_scope_core::Value;

/// WHERE clause.
#[derive(Debug, Clone, PartialEq)]
pub struct Where {
    expr: Expr,
}

impl Where {
    /// Create a new WHERE clause with the given expression.
    pub fn new(expr: Expr) -> Self {
        Self { expr }
    }

    /// Add an AND condition.
    pub fn and(self, expr: Expr) -> Self {
        Self {
            expr: self.expr.and(expr),
        }
    }

    /// Add an OR condition.
    pub fn or(self, expr: Expr) -> Self {
        Self {
            expr: self.expr.or(expr),
        }
    }

    /// The condition this clause holds.
    pub fn expr(&self) -> &Expr {
        &self.expr
    }

    /// Build the WHERE clause SQL and parameters.
    pub fn build(&self) -> (String, Vec<Value>) {
        self.build_with_offset(Dialect::Postgres, 0)
    }

    /// Build the WHERE clause with a parameter offset.
    pub fn build_with_offset(&self, dialect: Dialect, offset: usize) -> (String, Vec<Value>) {
        let mut params = Vec::new();
        let sql = self.expr.build_with_dialect(dialect, &mut params, offset);
        (sql, params)
    }
}

/// ORDER BY clause.
#[derive(Debug, Clone, PartialEq)]
pub struct OrderBy {
    pub expr: Expr,
    pub direction: OrderDirection,
}

/// Sort direction.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum OrderDirection {
    #[default]
    Asc,
    Desc,
}

impl OrderBy {
    /// Create an ascending order by clause.
    pub fn asc(expr: impl Into<Expr>) -> Self {
        Self {
            expr: expr.into(),
            direction: OrderDirection::Asc,
        }
    }

    /// Create a descending order by clause.
    pub fn desc(expr: impl Into<Expr>) -> Self {
        Self {
            expr: expr.into(),
            direction: OrderDirection::Desc,
        }
    }

    /// Generate SQL for this ORDER BY term.
    pub fn build(&self, dialect: Dialect, params: &mut Vec<Value>, offset: usize) -> String {
        let expr_sql = self.expr.build_with_dialect(dialect, params, offset);
        match self.direction {
            OrderDirection::Asc => format!("{expr_sql} ASC"),
            OrderDirection::Desc => format!("{expr_sql} DESC"),
        }
    }
}

/// LIMIT clause.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Limit(pub u64);

/// OFFSET clause.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Offset(pub u64);

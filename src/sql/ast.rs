//! Statement trees handed to the executor.
//!
//! Besides the plain data types, the AST offers small builder helpers so
//! that statements can be assembled in code:
//!
//! ```
//! use tributary::sql::{Expr, SelectStmt};
//!
//! let stmt = SelectStmt::from_table("t")
//!     .column(Expr::column("dept"))
//!     .column(Expr::function("SUM", vec![Expr::column("amount")]))
//!     .group_by(Expr::column("dept"))
//!     .order_by(Expr::column("dept"), true);
//! assert_eq!(stmt.columns.len(), 2);
//! ```

use std::fmt;

/// A statement the session can execute.
#[derive(Debug, Clone, PartialEq)]
pub enum Statement {
    /// A query returning rows.
    Select(Box<SelectStmt>),
    /// CREATE MATERIALIZED VIEW statement.
    CreateMaterializedView(Box<CreateMaterializedViewStmt>),
}

/// `SELECT ... FROM table [WHERE] [GROUP BY] [ORDER BY] [LIMIT]`.
#[derive(Debug, Clone, PartialEq)]
pub struct SelectStmt {
    /// Select list, in output order.
    pub columns: Vec<SelectItem>,
    /// Source table name.
    pub from: String,
    /// Row predicate, if any.
    pub where_clause: Option<Expr>,
    /// Grouping keys; empty unless grouped.
    pub group_by: Vec<Expr>,
    /// Sort keys, most significant first.
    pub order_by: Vec<OrderByItem>,
    /// LIMIT clause; `None` (or a negative count) means unbounded.
    pub limit: Option<i64>,
}

impl SelectStmt {
    /// Starts an empty `SELECT ... FROM table`.
    pub fn from_table(table: impl Into<String>) -> Self {
        Self {
            columns: Vec::new(),
            from: table.into(),
            where_clause: None,
            group_by: Vec::new(),
            order_by: Vec::new(),
            limit: None,
        }
    }

    /// Adds `*` to the select list.
    pub fn wildcard(mut self) -> Self {
        self.columns.push(SelectItem::Wildcard);
        self
    }

    /// Adds an unaliased expression to the select list.
    pub fn column(mut self, expr: Expr) -> Self {
        self.columns.push(SelectItem::Expr { expr, alias: None });
        self
    }

    /// Adds `expr AS alias` to the select list.
    pub fn column_as(mut self, expr: Expr, alias: impl Into<String>) -> Self {
        self.columns.push(SelectItem::Expr {
            expr,
            alias: Some(alias.into()),
        });
        self
    }

    /// Sets the WHERE clause.
    pub fn filter(mut self, predicate: Expr) -> Self {
        self.where_clause = Some(predicate);
        self
    }

    /// Appends a GROUP BY expression.
    pub fn group_by(mut self, expr: Expr) -> Self {
        self.group_by.push(expr);
        self
    }

    /// Appends an ORDER BY key.
    pub fn order_by(mut self, expr: Expr, ascending: bool) -> Self {
        let direction = if ascending {
            SortDirection::Asc
        } else {
            SortDirection::Desc
        };
        self.order_by.push(OrderByItem { expr, direction });
        self
    }

    /// Sets the LIMIT.
    pub fn limit(mut self, limit: i64) -> Self {
        self.limit = Some(limit);
        self
    }
}

/// CREATE MATERIALIZED VIEW statement.
#[derive(Debug, Clone, PartialEq)]
pub struct CreateMaterializedViewStmt {
    /// Name of the table to create.
    pub name: String,
    /// Defining query.
    pub query: SelectStmt,
}

/// One entry of a select list.
#[derive(Debug, Clone, PartialEq)]
pub enum SelectItem {
    /// `*`: every column of the source table.
    Wildcard,
    /// `expr [AS alias]`.
    Expr { expr: Expr, alias: Option<String> },
}

/// One ORDER BY key.
#[derive(Debug, Clone, PartialEq)]
pub struct OrderByItem {
    pub expr: Expr,
    pub direction: SortDirection,
}

/// ASC or DESC; ascending when omitted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortDirection {
    /// Smallest first.
    #[default]
    Asc,
    /// Largest first.
    Desc,
}

/// An unbound scalar expression.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Null,
    Boolean(bool),
    Integer(i64),
    Float(f64),
    /// Quoted string; typed as CHARS when bound.
    String(String),
    /// `column` or `table.column`.
    ColumnRef {
        table: Option<String>,
        column: String,
    },
    /// `*` as a function argument, as in `COUNT(*)`.
    Star,
    /// `left op right`.
    BinaryOp {
        left: Box<Expr>,
        op: BinaryOperator,
        right: Box<Expr>,
    },
    /// Call by name; only aggregate functions bind.
    Function { name: String, args: Vec<Expr> },
}

impl Expr {
    /// Unqualified column reference.
    pub fn column(name: impl Into<String>) -> Self {
        Expr::ColumnRef {
            table: None,
            column: name.into(),
        }
    }

    /// `name(args...)`.
    pub fn function(name: impl Into<String>, args: Vec<Expr>) -> Self {
        Expr::Function {
            name: name.into(),
            args,
        }
    }

    /// `left op right`.
    pub fn binary(left: Expr, op: BinaryOperator, right: Expr) -> Self {
        Expr::BinaryOp {
            left: Box::new(left),
            op,
            right: Box::new(right),
        }
    }

    /// Structural equality with case-insensitive identifiers.
    ///
    /// Used to recognize a GROUP BY or select-list expression when it is
    /// repeated elsewhere in the statement.
    pub fn same_as(&self, other: &Expr) -> bool {
        match (self, other) {
            (
                Expr::ColumnRef {
                    table: t1,
                    column: c1,
                },
                Expr::ColumnRef {
                    table: t2,
                    column: c2,
                },
            ) => {
                c1.eq_ignore_ascii_case(c2)
                    && match (t1, t2) {
                        (Some(a), Some(b)) => a.eq_ignore_ascii_case(b),
                        _ => true,
                    }
            }
            (
                Expr::BinaryOp {
                    left: l1,
                    op: o1,
                    right: r1,
                },
                Expr::BinaryOp {
                    left: l2,
                    op: o2,
                    right: r2,
                },
            ) => o1 == o2 && l1.same_as(l2) && r1.same_as(r2),
            (Expr::Function { name: n1, args: a1 }, Expr::Function { name: n2, args: a2 }) => {
                n1.eq_ignore_ascii_case(n2)
                    && a1.len() == a2.len()
                    && a1.iter().zip(a2).all(|(x, y)| x.same_as(y))
            }
            _ => self == other,
        }
    }
}

impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Expr::Null => write!(f, "NULL"),
            Expr::Boolean(b) => write!(f, "{}", if *b { "TRUE" } else { "FALSE" }),
            Expr::Integer(n) => write!(f, "{}", n),
            Expr::Float(n) => write!(f, "{}", n),
            Expr::String(s) => write!(f, "'{}'", s.replace('\'', "''")),
            Expr::ColumnRef {
                table: Some(table),
                column,
            } => write!(f, "{}.{}", table, column),
            Expr::ColumnRef { table: None, column } => write!(f, "{}", column),
            Expr::Star => write!(f, "*"),
            Expr::BinaryOp { left, op, right } => {
                write!(f, "{} {} {}", left, op.as_str(), right)
            }
            Expr::Function { name, args } => {
                let args: Vec<String> = args.iter().map(ToString::to_string).collect();
                write!(f, "{}({})", name, args.join(", "))
            }
        }
    }
}

/// Infix operators, grouped as arithmetic, comparison and three-valued logic.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOperator {
    Add,
    Sub,
    Mul,
    /// A zero divisor is an error, never NULL or infinity.
    Div,
    Eq,
    /// `<>`; `!=` spells the same operator.
    Neq,
    Lt,
    LtEq,
    Gt,
    GtEq,
    And,
    Or,
}

impl BinaryOperator {
    /// SQL spelling, used when naming computed columns.
    pub fn as_str(&self) -> &'static str {
        match self {
            BinaryOperator::Add => "+",
            BinaryOperator::Sub => "-",
            BinaryOperator::Mul => "*",
            BinaryOperator::Div => "/",
            BinaryOperator::Eq => "=",
            BinaryOperator::Neq => "<>",
            BinaryOperator::Lt => "<",
            BinaryOperator::LtEq => "<=",
            BinaryOperator::Gt => ">",
            BinaryOperator::GtEq => ">=",
            BinaryOperator::And => "AND",
            BinaryOperator::Or => "OR",
        }
    }

    pub fn is_arithmetic(&self) -> bool {
        matches!(
            self,
            BinaryOperator::Add | BinaryOperator::Sub | BinaryOperator::Mul | BinaryOperator::Div
        )
    }

    pub fn is_comparison(&self) -> bool {
        matches!(
            self,
            BinaryOperator::Eq
                | BinaryOperator::Neq
                | BinaryOperator::Lt
                | BinaryOperator::LtEq
                | BinaryOperator::Gt
                | BinaryOperator::GtEq
        )
    }
}

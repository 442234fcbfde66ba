//! Condition building for `WHERE`/`ORDER BY`/`LIMIT` tails.
//!
//! Conditions name a model field (by Rust name or column alias) and are
//! resolved to quoted column names when the criteria is built. Values are
//! always bound as parameters, never spliced into the SQL text.

use cipherdb_core::{Error, Model, Result, Value, quote_ident};

/// How a condition joins the ones before it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Conjunction {
    Where,
    And,
    Or,
}

impl Conjunction {
    /// SQL keyword.
    #[must_use]
    pub const fn as_sql(&self) -> &'static str {
        match self {
            Conjunction::Where => "WHERE",
            Conjunction::And => "AND",
            Conjunction::Or => "OR",
        }
    }
}

/// Comparison operators accepted in a condition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operator {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    Like,
    NotLike,
    Is,
    IsNot,
    Glob,
}

impl Operator {
    /// Parse a textual operator, case-insensitively.
    pub fn parse(op: &str) -> Result<Self> {
        let normalized = op.split_whitespace().collect::<Vec<_>>().join(" ");
        match normalized.to_ascii_uppercase().as_str() {
            "=" | "==" => Ok(Operator::Eq),
            "!=" | "<>" => Ok(Operator::Ne),
            "<" => Ok(Operator::Lt),
            "<=" => Ok(Operator::Le),
            ">" => Ok(Operator::Gt),
            ">=" => Ok(Operator::Ge),
            "LIKE" => Ok(Operator::Like),
            "NOT LIKE" => Ok(Operator::NotLike),
            "IS" => Ok(Operator::Is),
            "IS NOT" => Ok(Operator::IsNot),
            "GLOB" => Ok(Operator::Glob),
            _ => Err(Error::criteria(format!("unsupported operator `{op}`"))),
        }
    }

    /// SQL spelling.
    #[must_use]
    pub const fn as_sql(&self) -> &'static str {
        match self {
            Operator::Eq => "=",
            Operator::Ne => "!=",
            Operator::Lt => "<",
            Operator::Le => "<=",
            Operator::Gt => ">",
            Operator::Ge => ">=",
            Operator::Like => "LIKE",
            Operator::NotLike => "NOT LIKE",
            Operator::Is => "IS",
            Operator::IsNot => "IS NOT",
            Operator::Glob => "GLOB",
        }
    }
}

#[derive(Debug, Clone)]
enum Clause {
    Condition {
        conjunction: Conjunction,
        column: &'static str,
        operator: Operator,
        value: Value,
    },
    /// Caller-supplied fragment using `?` placeholders.
    Raw { sql: String, params: Vec<Value> },
}

/// A query tail: conditions, ordering and paging, plus bound parameters.
///
/// Resolution errors (unknown field, bad operator) are remembered and
/// reported by [`Criteria::build`], so chains stay infallible.
#[derive(Debug, Clone, Default)]
pub struct Criteria {
    clauses: Vec<Clause>,
    order_by: Vec<(String, bool)>,
    limit: Option<u64>,
    offset: Option<u64>,
    error: Option<String>,
}

impl Criteria {
    /// Empty criteria (matches every row).
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// A raw SQL tail such as `WHERE age > 18 ORDER BY name`.
    #[must_use]
    pub fn raw(sql: impl Into<String>) -> Self {
        Self::raw_with(sql, Vec::new())
    }

    /// A raw SQL tail with `?` placeholders and their values.
    #[must_use]
    pub fn raw_with(sql: impl Into<String>, params: Vec<Value>) -> Self {
        Self::new().push_raw(sql, params)
    }

    /// Append a raw fragment after the existing clauses.
    #[must_use]
    pub fn push_raw(mut self, sql: impl Into<String>, params: Vec<Value>) -> Self {
        let sql = sql.into();
        if !sql.trim().is_empty() {
            self.clauses.push(Clause::Raw {
                sql: sql.trim().to_string(),
                params,
            });
        }
        self
    }

    /// Append `field op value` for model `M`.
    ///
    /// The first clause always renders as `WHERE`; a later `Where` reads as
    /// `AND`.
    #[must_use]
    pub fn condition<M: Model>(
        mut self,
        conjunction: Conjunction,
        field: &str,
        op: &str,
        value: impl Into<Value>,
    ) -> Self {
        if self.error.is_some() {
            return self;
        }
        let column = match M::field(field) {
            Some(info) => info.column_name,
            None => {
                self.error = Some(format!("{} has no field `{field}`", M::TABLE_NAME));
                return self;
            }
        };
        let operator = match Operator::parse(op) {
            Ok(operator) => operator,
            Err(e) => {
                self.error = Some(e.to_string());
                return self;
            }
        };
        self.clauses.push(Clause::Condition {
            conjunction,
            column,
            operator,
            value: value.into(),
        });
        self
    }

    /// Shorthand for a `WHERE`/`AND` condition.
    #[must_use]
    pub fn filter<M: Model>(self, field: &str, op: &str, value: impl Into<Value>) -> Self {
        self.condition::<M>(Conjunction::And, field, op, value)
    }

    /// Shorthand for an `OR` condition.
    #[must_use]
    pub fn or_filter<M: Model>(self, field: &str, op: &str, value: impl Into<Value>) -> Self {
        self.condition::<M>(Conjunction::Or, field, op, value)
    }

    /// Add an `ORDER BY` term on a column name.
    #[must_use]
    pub fn order_by(mut self, column: impl Into<String>, ascending: bool) -> Self {
        self.order_by.push((column.into(), ascending));
        self
    }

    /// Add an `ORDER BY` term on a field of model `M` (Rust name or column).
    /// An unknown field is reported by [`Criteria::build`].
    #[must_use]
    pub fn order_by_field<M: Model>(mut self, field: &str, ascending: bool) -> Self {
        if self.error.is_some() {
            return self;
        }
        match M::field(field) {
            Some(info) => self.order_by(info.column_name, ascending),
            None => {
                self.error = Some(format!("{} has no field `{field}`", M::TABLE_NAME));
                self
            }
        }
    }

    /// Cap the number of rows.
    #[must_use]
    pub fn limit(mut self, n: u64) -> Self {
        self.limit = Some(n);
        self
    }

    /// Skip the first `n` rows.
    #[must_use]
    pub fn offset(mut self, n: u64) -> Self {
        self.offset = Some(n);
        self
    }

    /// Whether no clause, ordering or paging was added.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.clauses.is_empty()
            && self.order_by.is_empty()
            && self.limit.is_none()
            && self.offset.is_none()
            && self.error.is_none()
    }

    /// Render the full tail. Numbered placeholders start at
    /// `first_param_index`.
    pub fn build(&self, first_param_index: usize) -> Result<(String, Vec<Value>)> {
        let (mut sql, params) = self.build_where(first_param_index)?;
        let mut push = |part: String| {
            if !sql.is_empty() {
                sql.push(' ');
            }
            sql.push_str(&part);
        };

        if !self.order_by.is_empty() {
            let terms: Vec<String> = self
                .order_by
                .iter()
                .map(|(column, asc)| {
                    format!("{} {}", quote_ident(column), if *asc { "ASC" } else { "DESC" })
                })
                .collect();
            push(format!("ORDER BY {}", terms.join(", ")));
        }
        match (self.limit, self.offset) {
            (Some(limit), Some(offset)) => push(format!("LIMIT {limit} OFFSET {offset}")),
            (Some(limit), None) => push(format!("LIMIT {limit}")),
            (None, Some(offset)) => push(format!("LIMIT -1 OFFSET {offset}")),
            (None, None) => {}
        }

        Ok((sql, params))
    }

    /// Render only the conditions, without ordering or paging.
    ///
    /// Used for `COUNT(*)` and `DELETE`, where SQLite rejects or ignores the rest.
    pub fn build_where(&self, first_param_index: usize) -> Result<(String, Vec<Value>)> {
        if let Some(message) = &self.error {
            return Err(Error::criteria(message.clone()));
        }

        let mut parts: Vec<String> = Vec::with_capacity(self.clauses.len());
        let mut params = Vec::new();

        for clause in &self.clauses {
            match clause {
                Clause::Condition {
                    conjunction,
                    column,
                    operator,
                    value,
                } => {
                    let keyword = match (parts.is_empty(), conjunction) {
                        (true, _) => "WHERE",
                        (false, Conjunction::Where) => "AND",
                        (false, c) => c.as_sql(),
                    };
                    params.push(value.clone());
                    parts.push(format!(
                        "{keyword} {} {} ?{}",
                        quote_ident(column),
                        operator.as_sql(),
                        first_param_index + params.len() - 1
                    ));
                }
                Clause::Raw { sql, params: raw } => {
                    params.extend(raw.iter().cloned());
                    parts.push(sql.clone());
                }
            }
        }

        Ok((parts.join(" "), params))
    }
}

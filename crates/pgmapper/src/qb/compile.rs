//! Descriptor → [`CompiledStatement`].

use super::descriptor::{InsertValues, QueryDescriptor, QueryKind, SetValue};
use super::params::substitute;
use crate::error::{OrmError, OrmResult};
use crate::value::SqlValue;
use tokio_postgres::types::ToSql;

/// Final statement text with `$n` placeholders and the values bound to them.
#[derive(Debug, Clone, PartialEq)]
pub struct CompiledStatement {
    /// Diagnostic label (also used as the statement-cache identity in logs).
    pub name: String,
    pub text: String,
    pub values: Vec<SqlValue>,
}

impl CompiledStatement {
    /// Get parameters as references for tokio-postgres.
    pub fn params_ref(&self) -> Vec<&(dyn ToSql + Sync)> {
        self.values.iter().map(|v| v as &(dyn ToSql + Sync)).collect()
    }
}

impl QueryDescriptor {
    /// Assemble the statement and bind its parameters.
    pub(crate) fn compile(&self) -> OrmResult<CompiledStatement> {
        let kind = self
            .kind
            .ok_or_else(|| OrmError::config(format!("{}: query kind is not set", self.label())))?;
        if self.table.trim().is_empty() {
            return Err(OrmError::config(format!("{}: table is not set", self.label())));
        }

        let mut positional: Vec<SqlValue> = Vec::new();
        let mut sql = match kind {
            QueryKind::Select => {
                let fields = if self.select_fields.is_empty() {
                    "*".to_string()
                } else {
                    self.select_fields.join(", ")
                };
                format!("SELECT {} FROM {}", fields, self.table)
            }
            QueryKind::Insert => {
                let groups = self.insert_groups(&mut positional)?;
                format!(
                    "INSERT INTO {} ({}) VALUES {}",
                    self.table,
                    self.insert_fields.join(", "),
                    groups
                )
            }
            QueryKind::Update => {
                if self.update_sets.is_empty() {
                    return Err(OrmError::config(format!(
                        "{}: UPDATE has no fields to set",
                        self.label()
                    )));
                }
                let sets: Vec<String> = self
                    .update_sets
                    .iter()
                    .map(|(field, value)| match value {
                        SetValue::Value(v) => {
                            positional.push(v.clone());
                            format!("{} = ${}", field, positional.len())
                        }
                        SetValue::Raw(expr) => format!("{} = {}", field, expr),
                    })
                    .collect();
                format!("UPDATE {} SET {}", self.table, sets.join(", "))
            }
            QueryKind::Delete => format!("DELETE FROM {}", self.table),
        };

        for join in &self.joins {
            sql.push_str(&format!(" {} JOIN {}", join.kind.as_sql(), join.table));
            if !join.on.is_empty() {
                sql.push_str(&format!(" ON {}", join.on));
            }
        }

        if !self.where_clauses.is_empty() {
            sql.push_str(&format!(" WHERE {}", self.where_clauses.join(" ")));
        }

        if !self.group_by.is_empty() {
            sql.push_str(&format!(" GROUP BY {}", self.group_by.join(", ")));
        }

        if !self.having.is_empty() {
            sql.push_str(&format!(" HAVING {}", self.having.join(" ")));
        }

        if !self.order_by.is_empty() {
            let order: Vec<String> = self
                .order_by
                .iter()
                .map(|o| format!("{} {}", o.field, o.direction.as_sql()))
                .collect();
            sql.push_str(&format!(" ORDER BY {}", order.join(", ")));
        }

        if let Some(limit) = self.limit {
            sql.push_str(&format!(" LIMIT {limit}"));
        }

        if let Some(offset) = self.offset {
            sql.push_str(&format!(" OFFSET {offset}"));
        }

        if self.returning {
            let fields = if self.returning_fields.is_empty() {
                "*".to_string()
            } else {
                self.returning_fields.join(", ")
            };
            sql.push_str(&format!(" RETURNING {fields}"));
        }

        sql.push(';');

        Ok(self.bind(sql, positional))
    }

    /// Compile free-form SQL accumulated through `raw()` fragments.
    pub(crate) fn compile_raw(&self, fragments: &[String]) -> OrmResult<CompiledStatement> {
        let mut sql = String::new();
        for fragment in fragments.iter().filter(|f| !f.trim().is_empty()) {
            if !sql.is_empty() {
                sql.push(if ends_in_line_comment(&sql) { '\n' } else { ' ' });
            }
            sql.push_str(fragment);
        }
        if sql.is_empty() {
            return Err(OrmError::config(format!("{}: raw query is empty", self.label())));
        }
        Ok(self.bind(sql, Vec::new()))
    }

    fn bind(&self, sql: String, mut values: Vec<SqlValue>) -> CompiledStatement {
        tracing::debug!(
            target: "pgmapper.sql",
            name = %self.name,
            query = %sql,
            params = ?self.params,
            "Query"
        );

        let substituted = substitute(&sql, &self.params, values.len() + 1);
        if !substituted.unused.is_empty() {
            tracing::debug!(
                target: "pgmapper.sql",
                name = %self.name,
                unused = ?substituted.unused,
                "named parameters not referenced by the statement"
            );
        }
        values.extend(substituted.values);

        let compiled = CompiledStatement {
            name: self.name.clone(),
            text: substituted.text,
            values,
        };

        tracing::debug!(
            target: "pgmapper.sql",
            name = %compiled.name,
            text = %compiled.text,
            values = ?compiled.values,
            "Raw Query"
        );
        compiled
    }

    /// Render `(…),(…)` placeholder groups and collect the row values.
    fn insert_groups(&self, positional: &mut Vec<SqlValue>) -> OrmResult<String> {
        let width = self.insert_fields.len();
        if width == 0 {
            return Err(OrmError::config(format!("{}: INSERT has no fields", self.label())));
        }

        let rows: Vec<&Vec<SqlValue>> = match &self.values {
            InsertValues::Row(row) if row.is_empty() => Vec::new(),
            InsertValues::Row(row) => vec![row],
            InsertValues::Rows(rows) => rows.iter().collect(),
        };
        if rows.is_empty() {
            return Err(OrmError::config(format!("{}: INSERT has no values", self.label())));
        }

        let mut groups = Vec::with_capacity(rows.len());
        for (n, row) in rows.into_iter().enumerate() {
            if row.len() != width {
                return Err(OrmError::config(format!(
                    "{}: INSERT row {} has {} values for {} fields",
                    self.label(),
                    n,
                    row.len(),
                    width
                )));
            }
            let placeholders: Vec<String> = row
                .iter()
                .map(|v| {
                    positional.push(v.clone());
                    format!("${}", positional.len())
                })
                .collect();
            groups.push(format!("({})", placeholders.join(",")));
        }
        Ok(groups.join(","))
    }

    fn label(&self) -> &str {
        if self.name.is_empty() {
            "<unnamed query>"
        } else {
            &self.name
        }
    }
}

/// The last line of `sql` holds a `--` comment that would swallow a
/// same-line continuation.
fn ends_in_line_comment(sql: &str) -> bool {
    sql.rsplit('\n').next().is_some_and(|line| line.contains("--"))
}

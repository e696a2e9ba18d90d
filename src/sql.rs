//! Parameterized statement assembly.
//!
//! A [`Statement`] grows a `WHERE` clause one predicate at a time. Values are
//! always bound as `$n` parameters; only constant fragments (such as
//! [`Nivel::geo_predicate`](crate::nivel::Nivel::geo_predicate)) enter the
//! SQL text directly.

use std::fmt::Write as _;

use tokio_postgres::types::ToSql;

type Param = Box<dyn ToSql + Sync + Send>;

#[derive(Debug, Default)]
pub struct Statement {
    sql: String,
    params: Vec<Param>,
    has_where: bool,
}

impl Statement {
    pub fn new(head: &str) -> Self {
        Self { sql: head.trim_end().to_owned(), ..Self::default() }
    }

    fn keyword(&mut self) -> &'static str {
        if std::mem::replace(&mut self.has_where, true) { " AND " } else { " WHERE " }
    }

    /// Binds `value` and returns its placeholder.
    pub fn bind(&mut self, value: impl ToSql + Sync + Send + 'static) -> String {
        self.params.push(Box::new(value));
        format!("${}", self.params.len())
    }

    /// Appends a constant predicate.
    pub fn filter(mut self, predicate: &str) -> Self {
        let kw = self.keyword();
        self.sql.push_str(kw);
        self.sql.push_str(predicate);
        self
    }

    /// Appends `column = $n`.
    pub fn eq(mut self, column: &str, value: impl ToSql + Sync + Send + 'static) -> Self {
        let placeholder = self.bind(value);
        let kw = self.keyword();
        let _ = write!(self.sql, "{kw}{column} = {placeholder}");
        self
    }

    /// Appends `column = $n` only when `value` is present.
    pub fn eq_opt<T: ToSql + Sync + Send + 'static>(self, column: &str, value: Option<T>) -> Self {
        match value {
            Some(v) => self.eq(column, v),
            None => self,
        }
    }

    /// Appends `column IN ($n, ...)`. An empty list matches nothing.
    pub fn any_of<T: ToSql + Sync + Send + 'static>(mut self, column: &str, values: Vec<T>) -> Self {
        if values.is_empty() {
            return self.filter("FALSE");
        }
        let placeholders: Vec<String> = values.into_iter().map(|v| self.bind(v)).collect();
        let kw = self.keyword();
        let _ = write!(self.sql, "{kw}{column} IN ({})", placeholders.join(", "));
        self
    }

    /// Appends a trailing clause (`GROUP BY`, `ORDER BY`, `LIMIT`).
    pub fn tail(mut self, clause: &str) -> Self {
        self.sql.push(' ');
        self.sql.push_str(clause.trim());
        self
    }

    pub fn sql(&self) -> &str {
        &self.sql
    }

    pub fn params(&self) -> Vec<&(dyn ToSql + Sync)> {
        self.params.iter()
            .map(|p| p.as_ref() as &(dyn ToSql + Sync))
            .collect()
    }

    pub fn param_count(&self) -> usize {
        self.params.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn numbers_placeholders_in_order() {
        let st = Statement::new("SELECT geo FROM delitos_aux")
            .eq("periodo", "2024-06-01".to_owned())
            .filter("geo LIKE 'CCAA%'")
            .eq("tipo", "1.1".to_owned());
        assert_eq!(
            st.sql(),
            "SELECT geo FROM delitos_aux WHERE periodo = $1 AND geo LIKE 'CCAA%' AND tipo = $2"
        );
        assert_eq!(st.param_count(), 2);
    }

    #[test]
    fn absent_optional_adds_nothing() {
        let st = Statement::new("SELECT 1 FROM t").eq_opt::<String>("tipo", None);
        assert_eq!(st.sql(), "SELECT 1 FROM t");
        assert_eq!(st.param_count(), 0);
    }

    #[test]
    fn any_of_binds_each_value() {
        let st = Statement::new("SELECT 1 FROM t")
            .any_of("geo", vec!["a".to_owned(), "b".to_owned()])
            .eq("tipo", "x".to_owned())
            .tail("GROUP BY geo");
        assert_eq!(st.sql(), "SELECT 1 FROM t WHERE geo IN ($1, $2) AND tipo = $3 GROUP BY geo");
        let bound = format!("{:?}", st.params());
        assert!(bound.contains("\"a\"") && bound.contains("\"b\""));
    }

    #[test]
    fn empty_any_of_matches_nothing() {
        let st = Statement::new("SELECT 1 FROM t").any_of::<String>("geo", vec![]);
        assert_eq!(st.sql(), "SELECT 1 FROM t WHERE FALSE");
    }
}

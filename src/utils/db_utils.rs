use sqlx::MySqlPool;

/// ===============================
/// SQL bindable value enum
/// ===============================
#[derive(Debug, Clone, PartialEq)]
pub enum SqlValue {
    String(String),
    Null,
}

impl From<Option<String>> for SqlValue {
    fn from(value: Option<String>) -> Self {
        value.map_or(SqlValue::Null, SqlValue::String)
    }
}

/// ===============================
/// SQL update container
/// ===============================
#[derive(Debug)]
pub struct SqlUpdate {
    pub sql: String,
    pub values: Vec<SqlValue>,
}

/// ===============================
/// Typed UPDATE builder
/// ===============================
/// Column names come from the caller's code, never from request payloads.
#[derive(Debug)]
pub struct UpdateBuilder {
    table: &'static str,
    columns: Vec<&'static str>,
    values: Vec<SqlValue>,
}

impl UpdateBuilder {
    pub fn new(table: &'static str) -> Self {
        Self {
            table,
            columns: Vec::new(),
            values: Vec::new(),
        }
    }

    pub fn set(&mut self, column: &'static str, value: SqlValue) -> &mut Self {
        self.columns.push(column);
        self.values.push(value);
        self
    }

    /// `None` when no column was set.
    pub fn build(self, id_column: &'static str, id_value: SqlValue) -> Option<SqlUpdate> {
        if self.columns.is_empty() {
            return None;
        }

        let set_clause = self
            .columns
            .iter()
            .map(|c| format!("{} = ?", c))
            .collect::<Vec<_>>()
            .join(", ");

        let sql = format!(
            "UPDATE {} SET {} WHERE {} = ?",
            self.table, set_clause, id_column
        );

        let mut values = self.values;
        values.push(id_value);

        Some(SqlUpdate { sql, values })
    }
}

/// ===============================
/// Execute the update
/// ===============================
pub async fn execute_update(pool: &MySqlPool, update: SqlUpdate) -> Result<u64, sqlx::Error> {
    let mut query = sqlx::query(&update.sql);

    for value in update.values {
        query = match value {
            SqlValue::String(v) => query.bind(v),
            SqlValue::Null => query.bind(None::<String>),
        };
    }

    tracing::debug!(sql = %update.sql, "Executing update");
    let result = query.execute(pool).await?;
    Ok(result.rows_affected())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builds_set_clause_in_call_order() {
        let mut builder = UpdateBuilder::new("employees");
        builder
            .set("name", SqlValue::String("Ada".into()))
            .set("email", SqlValue::from(None));

        let update = builder
            .build("id", SqlValue::String("E1".into()))
            .unwrap();

        assert_eq!(update.sql, "UPDATE employees SET name = ?, email = ? WHERE id = ?");
        assert_eq!(
            update.values,
            vec![
                SqlValue::String("Ada".into()),
                SqlValue::Null,
                SqlValue::String("E1".into())
            ]
        );
    }

    #[test]
    fn empty_builder_builds_nothing() {
        let builder = UpdateBuilder::new("employees");
        assert!(builder.build("id", SqlValue::Null).is_none());
    }
}

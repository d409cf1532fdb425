use sqlx::{Executor, MySql, MySqlConnection, MySqlPool, QueryBuilder};
use tracing::debug;

use super::BATCH_SIZE;
use crate::model::employee::{Employee, EmployeeRow, Shift};

const COLUMNS: &str = "id, name, department, email, phone, position, join_date, shift, weekends";

#[derive(Debug, Default)]
pub struct EmployeeFilter {
    pub department: Option<String>,
    pub shift: Option<String>,
    pub search: Option<String>,
}

/// One page of employees matching `filter`, plus the total match count.
pub async fn list(
    pool: &MySqlPool,
    filter: &EmployeeFilter,
    limit: u32,
    offset: u32,
) -> Result<(Vec<Employee>, i64), sqlx::Error> {
    // ---------- build WHERE clause dynamically ----------
    let mut conditions = Vec::new();
    let mut bindings: Vec<String> = Vec::new();

    if let Some(department) = &filter.department {
        conditions.push("department = ?");
        bindings.push(department.clone());
    }

    if let Some(shift) = &filter.shift {
        conditions.push("shift = ?");
        bindings.push(Shift::parse(shift).to_string());
    }

    if let Some(search) = &filter.search {
        conditions.push("(name LIKE ? OR email LIKE ? OR id LIKE ?)");
        let like = format!("%{}%", search);
        bindings.push(like.clone());
        bindings.push(like.clone());
        bindings.push(like);
    }

    let where_clause = if conditions.is_empty() {
        "".to_string()
    } else {
        format!("WHERE {}", conditions.join(" AND "))
    };

    // ---------- total count ----------
    let count_sql = format!("SELECT COUNT(*) FROM employees {}", where_clause);
    debug!(sql = %count_sql, bindings = ?bindings, "Counting employees");

    let mut count_query = sqlx::query_scalar::<_, i64>(&count_sql);
    for b in &bindings {
        count_query = count_query.bind(b);
    }
    let total = count_query.fetch_one(pool).await?;

    // ---------- data query ----------
    let data_sql = format!(
        "SELECT {} FROM employees {} ORDER BY name, id LIMIT ? OFFSET ?",
        COLUMNS, where_clause
    );
    debug!(sql = %data_sql, limit, offset, "Fetching employees");

    let mut data_query = sqlx::query_as::<_, EmployeeRow>(&data_sql);
    for b in &bindings {
        data_query = data_query.bind(b);
    }
    let rows = data_query
        .bind(limit as i64)
        .bind(offset as i64)
        .fetch_all(pool)
        .await?;

    Ok((rows.into_iter().map(Employee::from).collect(), total))
}

pub async fn all<'c, E>(executor: E) -> Result<Vec<Employee>, sqlx::Error>
where
    E: Executor<'c, Database = MySql>,
{
    let sql = format!("SELECT {} FROM employees ORDER BY name, id", COLUMNS);
    let rows = sqlx::query_as::<_, EmployeeRow>(&sql)
        .fetch_all(executor)
        .await?;
    Ok(rows.into_iter().map(Employee::from).collect())
}

pub async fn find(pool: &MySqlPool, id: &str) -> Result<Option<Employee>, sqlx::Error> {
    let sql = format!("SELECT {} FROM employees WHERE id = ?", COLUMNS);
    let row = sqlx::query_as::<_, EmployeeRow>(&sql)
        .bind(id)
        .fetch_optional(pool)
        .await?;
    Ok(row.map(Employee::from))
}

pub async fn insert(pool: &MySqlPool, employee: &Employee) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        INSERT INTO employees
        (id, name, department, email, phone, position, join_date, shift, weekends)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(&employee.id)
    .bind(&employee.name)
    .bind(&employee.department)
    .bind(&employee.email)
    .bind(&employee.phone)
    .bind(&employee.position)
    .bind(&employee.join_date)
    .bind(employee.shift.as_str())
    .bind(employee.weekends_json())
    .execute(pool)
    .await?;
    Ok(())
}

/// Insert, or overwrite every column of an existing employee with the same id.
pub async fn upsert(pool: &MySqlPool, employee: &Employee) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        INSERT INTO employees
        (id, name, department, email, phone, position, join_date, shift, weekends)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
        ON DUPLICATE KEY UPDATE
            name = VALUES(name),
            department = VALUES(department),
            email = VALUES(email),
            phone = VALUES(phone),
            position = VALUES(position),
            join_date = VALUES(join_date),
            shift = VALUES(shift),
            weekends = VALUES(weekends)
        "#,
    )
    .bind(&employee.id)
    .bind(&employee.name)
    .bind(&employee.department)
    .bind(&employee.email)
    .bind(&employee.phone)
    .bind(&employee.position)
    .bind(&employee.join_date)
    .bind(employee.shift.as_str())
    .bind(employee.weekends_json())
    .execute(pool)
    .await?;
    Ok(())
}

/// Deletes the employee and all of their attendance in one transaction.
/// Returns false when no such employee exists.
pub async fn delete_cascade(pool: &MySqlPool, id: &str) -> Result<bool, sqlx::Error> {
    let mut tx = pool.begin().await?;

    let attendance = sqlx::query("DELETE FROM attendance WHERE employee_id = ?")
        .bind(id)
        .execute(&mut *tx)
        .await?;

    let employee = sqlx::query("DELETE FROM employees WHERE id = ?")
        .bind(id)
        .execute(&mut *tx)
        .await?;

    if employee.rows_affected() == 0 {
        tx.rollback().await?;
        return Ok(false);
    }

    tx.commit().await?;
    debug!(
        employee_id = id,
        attendance_rows = attendance.rows_affected(),
        "Employee deleted with attendance"
    );
    Ok(true)
}

pub async fn count_on_shift(pool: &MySqlPool, shift: &str) -> Result<i64, sqlx::Error> {
    sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM employees WHERE shift = ?")
        .bind(shift)
        .fetch_one(pool)
        .await
}

pub async fn insert_batch(
    conn: &mut MySqlConnection,
    employees: &[Employee],
) -> Result<(), sqlx::Error> {
    for chunk in employees.chunks(BATCH_SIZE) {
        let mut qb: QueryBuilder<MySql> =
            QueryBuilder::new(format!("INSERT INTO employees ({}) ", COLUMNS));
        qb.push_values(chunk, |mut b, e| {
            b.push_bind(&e.id)
                .push_bind(&e.name)
                .push_bind(&e.department)
                .push_bind(&e.email)
                .push_bind(&e.phone)
                .push_bind(&e.position)
                .push_bind(&e.join_date)
                .push_bind(e.shift.as_str())
                .push_bind(e.weekends_json());
        });
        qb.build().execute(&mut *conn).await?;
    }
    Ok(())
}

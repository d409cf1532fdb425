use std::fmt;

use serde::{Deserialize, Serialize};
use strum_macros::EnumString;
use utoipa::ToSchema;

/// Shift assignment. `morning` and `night` are built in; anything else
/// names a shift defined in settings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord, EnumString)]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum Shift {
    #[default]
    Morning,
    Night,
    #[strum(default)]
    Custom(String),
}

impl Shift {
    pub fn as_str(&self) -> &str {
        match self {
            Shift::Morning => "morning",
            Shift::Night => "night",
            Shift::Custom(name) => name,
        }
    }

    pub fn is_reserved(&self) -> bool {
        matches!(self, Shift::Morning | Shift::Night)
    }

    /// Parses a shift name; blank input falls back to `morning`. Custom
    /// names are lowercased, matching how settings store them.
    pub fn parse(name: &str) -> Self {
        let name = name.trim().to_lowercase();
        if name.is_empty() {
            return Shift::Morning;
        }
        // `strum(default)` makes this infallible
        name.parse().unwrap_or(Shift::Custom(name))
    }
}

impl fmt::Display for Shift {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for Shift {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for Shift {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let name = String::deserialize(deserializer)?;
        Ok(Shift::parse(&name))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
#[schema(
    example = json!({
        "id": "EMP-001",
        "name": "John Doe",
        "department": "Engineering",
        "email": "john.doe@company.com",
        "phone": "+8801712345678",
        "position": "Developer",
        "joinDate": "2024-01-01",
        "shift": "morning",
        "weekends": [5, 6]
    })
)]
pub struct Employee {
    pub id: String,

    pub name: String,

    #[serde(default)]
    pub department: String,

    #[serde(default)]
    pub email: Option<String>,

    #[serde(default)]
    pub phone: Option<String>,

    #[serde(default)]
    pub position: Option<String>,

    #[serde(default)]
    pub join_date: Option<String>,

    #[serde(default)]
    #[schema(value_type = String, example = "morning")]
    pub shift: Shift,

    /// Overrides the global weekend days when present.
    #[serde(default)]
    pub weekends: Option<Vec<u8>>,
}

/// Row shape in the `employees` table. Weekends are stored as a JSON array
/// string.
#[derive(Debug, sqlx::FromRow)]
pub struct EmployeeRow {
    pub id: String,
    pub name: String,
    pub department: String,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub position: Option<String>,
    pub join_date: Option<String>,
    pub shift: String,
    pub weekends: Option<String>,
}

impl From<EmployeeRow> for Employee {
    fn from(row: EmployeeRow) -> Self {
        let weekends = row
            .weekends
            .as_deref()
            .and_then(|raw| match serde_json::from_str::<Vec<u8>>(raw) {
                Ok(days) => Some(days),
                Err(e) => {
                    tracing::warn!(employee_id = %row.id, error = %e, "Ignoring malformed weekends column");
                    None
                }
            });

        Employee {
            shift: Shift::parse(&row.shift),
            id: row.id,
            name: row.name,
            department: row.department,
            email: row.email,
            phone: row.phone,
            position: row.position,
            join_date: row.join_date,
            weekends,
        }
    }
}

impl Employee {
    pub fn weekends_json(&self) -> Option<String> {
        self.weekends
            .as_ref()
            .map(|days| serde_json::to_string(days).unwrap_or_else(|_| "[]".to_string()))
    }
}

/// Weekday indices run 0 (Sunday) to 6 (Saturday). Returns the sorted,
/// de-duplicated set or the first out-of-range value.
pub fn normalize_weekdays(days: &[u8]) -> Result<Vec<u8>, u8> {
    if let Some(bad) = days.iter().copied().find(|d| *d > 6) {
        return Err(bad);
    }
    let mut days = days.to_vec();
    days.sort_unstable();
    days.dedup();
    Ok(days)
}

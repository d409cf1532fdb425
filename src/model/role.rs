use std::collections::BTreeSet;

use serde::Serialize;
use strum::IntoEnumIterator;
use strum_macros::{AsRefStr, Display, EnumIter, EnumString};

#[derive(Debug, Copy, Clone, Eq, PartialEq, Display, AsRefStr, EnumString)]
#[strum(serialize_all = "snake_case")]
pub enum Role {
    Admin = 1,
    Hr = 2,
    Employee = 3,
    System = 4,
    ApiUser = 5,
}

#[derive(
    Debug, Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Serialize, Display, AsRefStr, EnumIter,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum Permission {
    ViewEmployees,
    ManageEmployees,
    ViewAttendance,
    MarkAttendance,
    SelfService,
    ViewSettings,
    ManageSettings,
    ViewReports,
    ManageBackups,
}

impl Role {
    pub fn from_id(id: u8) -> Option<Self> {
        match id {
            1 => Some(Role::Admin),
            2 => Some(Role::Hr),
            3 => Some(Role::Employee),
            4 => Some(Role::System),
            5 => Some(Role::ApiUser),
            _ => None,
        }
    }

    pub fn id(self) -> u8 {
        self as u8
    }

    /// The fixed permission table for a role.
    pub fn permissions(self) -> BTreeSet<Permission> {
        use Permission::*;

        match self {
            Role::Admin => Permission::iter().collect(),
            Role::Hr => [
                ViewEmployees,
                ManageEmployees,
                ViewAttendance,
                MarkAttendance,
                SelfService,
                ViewSettings,
                ManageSettings,
                ViewReports,
            ]
            .into_iter()
            .collect(),
            Role::Employee => [SelfService, ViewSettings].into_iter().collect(),
            Role::System => [ViewEmployees, ViewAttendance, ViewSettings, ManageBackups]
                .into_iter()
                .collect(),
            Role::ApiUser => [ViewEmployees, ViewAttendance, ViewSettings, ViewReports]
                .into_iter()
                .collect(),
        }
    }
}

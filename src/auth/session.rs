use std::collections::BTreeSet;

use actix_web::{FromRequest, HttpMessage, HttpRequest, dev::Payload};
use futures::future::{Ready, ready};

use crate::error::{AppError, AppResult};
use crate::model::role::{Permission, Role};
use crate::models::{Claims, TokenType};

/// The authenticated caller. Built once by the auth middleware from the
/// access token and read by handlers through the extractor below.
#[derive(Debug, Clone)]
pub struct Session {
    pub user_id: u64,
    pub username: String,
    pub role: Role,

    /// Present only if this user is linked to an employee record
    pub employee_id: Option<String>,

    pub permissions: BTreeSet<Permission>,
}

impl Session {
    pub fn from_claims(claims: Claims) -> AppResult<Self> {
        if claims.token_type != TokenType::Access {
            return Err(AppError::Unauthorized(
                "Refresh tokens cannot be used to call the API".into(),
            ));
        }

        let role = Role::from_id(claims.role)
            .ok_or_else(|| AppError::Unauthorized("Invalid role".into()))?;

        Ok(Session {
            user_id: claims.user_id,
            username: claims.sub,
            role,
            employee_id: claims.employee_id,
            permissions: role.permissions(),
        })
    }

    pub fn can(&self, permission: Permission) -> bool {
        self.permissions.contains(&permission)
    }

    pub fn require(&self, permission: Permission) -> AppResult<()> {
        if self.can(permission) {
            Ok(())
        } else {
            Err(AppError::Forbidden(format!(
                "Role '{}' lacks the '{}' permission",
                self.role, permission
            )))
        }
    }

    /// The employee record this account acts for, for self-service routes.
    pub fn own_employee_id(&self) -> AppResult<&str> {
        self.employee_id
            .as_deref()
            .ok_or_else(|| AppError::Forbidden("Account is not linked to an employee".into()))
    }
}

impl FromRequest for Session {
    type Error = AppError;
    type Future = Ready<Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _: &mut Payload) -> Self::Future {
        ready(
            req.extensions()
                .get::<Session>()
                .cloned()
                .ok_or_else(|| AppError::Unauthorized("Not authenticated".into())),
        )
    }
}

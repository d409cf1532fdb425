use crate::{
    auth::{
        jwt::{TokenSubject, generate_access_token, generate_refresh_token, verify_token},
        password::{hash_password, verify_password},
    },
    config::Config,
    error::{AppError, AppResult},
    model::{role::Role, user::User},
    models::{Claims, LoginReqDto, TokenPair, TokenType, UserReq},
    repo,
};
use actix_web::{HttpRequest, HttpResponse, web};
use serde_json::json;
use sqlx::MySqlPool;
use tracing::{debug, error, info, instrument, warn};

fn bearer(req: &HttpRequest) -> Option<&str> {
    req.headers()
        .get("Authorization")
        .and_then(|h| h.to_str().ok())
        .and_then(|h| h.strip_prefix("Bearer "))
}

fn token_error(e: jsonwebtoken::errors::Error) -> AppError {
    AppError::Internal(format!("token encoding failed: {e}"))
}

/// Signs a fresh access/refresh pair and records the refresh token's `jti`.
async fn issue_pair(
    pool: &MySqlPool,
    config: &Config,
    subject: &TokenSubject,
) -> AppResult<TokenPair> {
    let access_token =
        generate_access_token(subject, &config.jwt_secret, config.access_token_ttl)
            .map_err(token_error)?;

    let (refresh_token, refresh_claims) =
        generate_refresh_token(subject, &config.jwt_secret, config.refresh_token_ttl)
            .map_err(token_error)?;

    debug!(
        user_id = subject.user_id,
        jti = %refresh_claims.jti,
        "Storing refresh token"
    );

    sqlx::query(
        r#"
        INSERT INTO refresh_tokens (user_id, jti, expires_at)
        VALUES (?, ?, FROM_UNIXTIME(?))
        "#,
    )
    .bind(subject.user_id)
    .bind(&refresh_claims.jti)
    .bind(refresh_claims.exp as i64)
    .execute(pool)
    .await?;

    Ok(TokenPair {
        access_token,
        refresh_token,
    })
}

/// Role for a new account. The first account ever created bootstraps the
/// system and defaults to admin; later self-registrations are employees.
fn resolve_role(requested: Option<u8>, existing_users: i64) -> AppResult<Role> {
    let role = match requested {
        Some(id) => Role::from_id(id)
            .ok_or_else(|| AppError::validation(format!("Unknown role id {id}")))?,
        None if existing_users == 0 => Role::Admin,
        None => Role::Employee,
    };

    if existing_users > 0 && role != Role::Employee {
        return Err(AppError::Forbidden(
            "Only employee accounts can self-register".into(),
        ));
    }
    Ok(role)
}

/// An account may only be linked to an existing employee that no other
/// account has claimed.
fn check_employee_link(employee_id: &str, exists: bool, claimed: bool) -> AppResult<()> {
    if !exists {
        return Err(AppError::not_found(format!(
            "Employee '{employee_id}' not found"
        )));
    }
    if claimed {
        return Err(AppError::conflict(format!(
            "Employee '{employee_id}' is already linked to an account"
        )));
    }
    Ok(())
}

#[utoipa::path(
    post,
    path = "/auth/register",
    request_body = UserReq,
    responses(
        (status = 201, description = "User registered"),
        (status = 400, description = "Validation error"),
        (status = 403, description = "Privileged role requested"),
        (status = 404, description = "Employee to link not found"),
        (status = 409, description = "Username taken or employee already linked")
    ),
    tag = "Auth"
)]
pub async fn register(
    user: web::Json<UserReq>,
    pool: web::Data<MySqlPool>,
) -> AppResult<HttpResponse> {
    let username = user.username.trim().to_lowercase();

    if username.is_empty() || user.password.is_empty() {
        return Err(AppError::validation(
            "Username and password must not be empty",
        ));
    }

    let existing_users = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM users")
        .fetch_one(pool.get_ref())
        .await?;
    let role = resolve_role(user.role_id, existing_users)?;

    if let Some(employee_id) = &user.employee_id {
        let exists = repo::employee::find(pool.get_ref(), employee_id)
            .await?
            .is_some();
        let claimed = sqlx::query_scalar::<_, bool>(
            "SELECT EXISTS(SELECT 1 FROM users WHERE employee_id = ? LIMIT 1)",
        )
        .bind(employee_id)
        .fetch_one(pool.get_ref())
        .await?;

        check_employee_link(employee_id, exists, claimed)?;
    }

    let taken = sqlx::query_scalar::<_, bool>(
        "SELECT EXISTS(SELECT 1 FROM users WHERE username = ? LIMIT 1)",
    )
    .bind(&username)
    .fetch_one(pool.get_ref())
    .await?;

    if taken {
        return Err(AppError::conflict("Username already taken"));
    }

    let hashed = hash_password(&user.password)
        .map_err(|e| AppError::Internal(format!("password hashing failed: {e}")))?;

    let result = sqlx::query(
        r#"INSERT INTO users (username, password, role_id, employee_id) VALUES (?, ?, ?, ?)"#,
    )
    .bind(&username)
    .bind(&hashed)
    .bind(role.id())
    .bind(&user.employee_id)
    .execute(pool.get_ref())
    .await;

    match result {
        Ok(_) => {
            info!(username = %username, role = %role, "User registered");
            Ok(HttpResponse::Created().json(json!({
                "success": true,
                "message": "User registered successfully"
            })))
        }
        Err(e) if AppError::is_constraint_violation(&e) => {
            Err(AppError::conflict("Username or employee link already taken"))
        }
        Err(e) => Err(e.into()),
    }
}

#[utoipa::path(
    post,
    path = "/auth/login",
    request_body = LoginReqDto,
    responses(
        (status = 200, description = "Token pair", body = TokenPair),
        (status = 401, description = "Invalid credentials")
    ),
    tag = "Auth"
)]
#[instrument(
    name = "auth_login",
    skip(pool, config, user),
    fields(username = %user.username)
)]
pub async fn login(
    user: web::Json<LoginReqDto>,
    pool: web::Data<MySqlPool>,
    config: web::Data<Config>,
) -> AppResult<HttpResponse> {
    info!("Login request received");

    if user.username.trim().is_empty() || user.password.is_empty() {
        info!("Validation failed: empty username or password");
        return Err(AppError::validation("Username or password required"));
    }

    debug!("Fetching user from database");

    let db_user = sqlx::query_as::<_, User>(
        r#"
        SELECT id, username, password, role_id, employee_id
        FROM users
        WHERE username = ?
        "#,
    )
    .bind(user.username.trim().to_lowercase())
    .fetch_optional(pool.get_ref())
    .await?;

    let Some(db_user) = db_user else {
        info!("Invalid credentials: user not found");
        return Err(AppError::Unauthorized("Invalid credentials".into()));
    };

    if let Err(e) = verify_password(&user.password, &db_user.password) {
        info!(error = %e, "Invalid credentials: password mismatch");
        return Err(AppError::Unauthorized("Invalid credentials".into()));
    }

    debug!(user_id = db_user.id, "Password verified");

    let subject = TokenSubject {
        user_id: db_user.id,
        username: db_user.username.clone(),
        role: db_user.role_id,
        employee_id: db_user.employee_id.clone(),
    };
    let pair = issue_pair(pool.get_ref(), &config, &subject).await?;

    if let Err(e) = sqlx::query("UPDATE users SET last_login_at = NOW() WHERE id = ?")
        .bind(db_user.id)
        .execute(pool.get_ref())
        .await
    {
        // login still succeeds
        error!(error = %e, "Failed to update last_login_at");
    }

    info!("Login successful");
    Ok(HttpResponse::Ok().json(pair))
}

/// Verified refresh-token claims from the Authorization header.
fn refresh_claims(req: &HttpRequest, config: &Config) -> Option<Claims> {
    let claims = verify_token(bearer(req)?, &config.jwt_secret).ok()?;
    (claims.token_type == TokenType::Refresh).then_some(claims)
}

#[utoipa::path(
    post,
    path = "/auth/refresh",
    responses(
        (status = 200, description = "Rotated token pair", body = TokenPair),
        (status = 401, description = "Missing, revoked or invalid refresh token")
    ),
    security(("bearer_auth" = [])),
    tag = "Auth"
)]
pub async fn refresh_token(
    req: HttpRequest,
    pool: web::Data<MySqlPool>,
    config: web::Data<Config>,
) -> AppResult<HttpResponse> {
    let claims = refresh_claims(&req, &config)
        .ok_or_else(|| AppError::Unauthorized("Invalid refresh token".into()))?;

    // Revoke-and-check in one statement so a replayed token loses the race.
    let revoked = sqlx::query(
        "UPDATE refresh_tokens SET revoked = TRUE WHERE jti = ? AND revoked = FALSE",
    )
    .bind(&claims.jti)
    .execute(pool.get_ref())
    .await?;

    if revoked.rows_affected() == 0 {
        warn!(user_id = claims.user_id, jti = %claims.jti, "Refresh token reuse or unknown jti");
        return Err(AppError::Unauthorized("Refresh token revoked".into()));
    }

    let pair = issue_pair(pool.get_ref(), &config, &TokenSubject::from(&claims)).await?;
    debug!(user_id = claims.user_id, "Refresh token rotated");

    Ok(HttpResponse::Ok().json(pair))
}

#[utoipa::path(
    post,
    path = "/auth/logout",
    responses((status = 204, description = "Refresh token revoked (idempotent)")),
    security(("bearer_auth" = [])),
    tag = "Auth"
)]
pub async fn logout(
    req: HttpRequest,
    pool: web::Data<MySqlPool>,
    config: web::Data<Config>,
) -> AppResult<HttpResponse> {
    // only refresh tokens can log out; anything else is a silent no-op
    let Some(claims) = refresh_claims(&req, &config) else {
        return Ok(HttpResponse::NoContent().finish());
    };

    sqlx::query("UPDATE refresh_tokens SET revoked = TRUE WHERE jti = ?")
        .bind(&claims.jti)
        .execute(pool.get_ref())
        .await?;

    info!(user_id = claims.user_id, "Logged out");
    Ok(HttpResponse::NoContent().finish())
}

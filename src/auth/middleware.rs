use crate::auth::jwt::verify_token;
use crate::auth::session::Session;
use crate::config::Config;
use crate::error::AppError;
use actix_web::middleware::Next;
use actix_web::{
    Error, HttpMessage, ResponseError,
    body::BoxBody,
    dev::{ServiceRequest, ServiceResponse},
    web::Data,
};
use tracing::debug;

fn reject(req: ServiceRequest, err: AppError) -> Result<ServiceResponse<BoxBody>, Error> {
    debug!(path = %req.path(), error = %err, "Request rejected by auth");
    Ok(req.into_response(err.error_response()))
}

/// Validates the bearer access token and stores the resolved [`Session`] in
/// the request extensions.
pub async fn auth_middleware(
    req: ServiceRequest,
    next: Next<BoxBody>,
) -> Result<ServiceResponse<BoxBody>, Error> {
    let config = req
        .app_data::<Data<Config>>()
        .cloned()
        .ok_or_else(|| actix_web::error::ErrorInternalServerError("App config missing"))?;

    let header_value = match req.headers().get("Authorization") {
        Some(h) => match h.to_str() {
            Ok(v) => v.to_owned(),
            Err(_) => {
                return reject(
                    req,
                    AppError::Unauthorized("Invalid Authorization header encoding".into()),
                );
            }
        },
        None => {
            return reject(req, AppError::Unauthorized("Missing Authorization header".into()));
        }
    };

    let token = match header_value.strip_prefix("Bearer ") {
        Some(t) => t,
        None => {
            return reject(
                req,
                AppError::Unauthorized("Authorization header must start with Bearer".into()),
            );
        }
    };

    let claims = match verify_token(token, &config.jwt_secret) {
        Ok(c) => c,
        Err(_) => {
            return reject(req, AppError::Unauthorized("Invalid or expired token".into()));
        }
    };

    let session = match Session::from_claims(claims) {
        Ok(s) => s,
        Err(e) => return reject(req, e),
    };

    req.extensions_mut().insert(session);

    next.call(req).await
}

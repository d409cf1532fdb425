use crate::{
    api::{attendance, backup, employee, report, settings},
    auth::{handlers, middleware::auth_middleware},
    config::Config,
};
use actix_governor::{
    Governor, GovernorConfigBuilder, PeerIpKeyExtractor, governor::middleware::NoOpMiddleware,
};
use actix_web::{middleware::from_fn, web};
use anyhow::{Result, anyhow};
use std::sync::Arc;

type Limiter = Arc<Governor<PeerIpKeyExtractor, NoOpMiddleware>>;

/// Per-IP rate limiters, one per route group.
#[derive(Clone)]
pub struct Limiters {
    login: Limiter,
    register: Limiter,
    refresh: Limiter,
    protected: Limiter,
}

fn build_limiter(requests_per_min: u32) -> Result<Limiter> {
    let burst = requests_per_min.max(1);
    let per_ms = 60_000 / burst as u64;

    let cfg = GovernorConfigBuilder::default()
        .milliseconds_per_request(per_ms.max(1))
        .burst_size(burst)
        .key_extractor(PeerIpKeyExtractor)
        .finish()
        .ok_or_else(|| anyhow!("invalid rate limit of {requests_per_min}/min"))?;

    Ok(Arc::new(Governor::new(&cfg)))
}

impl Limiters {
    pub fn from_config(config: &Config) -> Result<Self> {
        Ok(Limiters {
            login: build_limiter(config.rate_login_per_min)?,
            register: build_limiter(config.rate_register_per_min)?,
            refresh: build_limiter(config.rate_refresh_per_min)?,
            protected: build_limiter(config.rate_protected_per_min)?,
        })
    }
}

pub fn configure(cfg: &mut web::ServiceConfig, config: &Config, limiters: &Limiters) {
    // Public routes
    cfg.service(
        web::scope("/auth")
            .service(
                web::resource("/login")
                    .wrap(limiters.login.clone())
                    .route(web::post().to(handlers::login)),
            )
            .service(
                web::resource("/register")
                    .wrap(limiters.register.clone())
                    .route(web::post().to(handlers::register)),
            )
            .service(
                web::resource("/refresh")
                    .wrap(limiters.refresh.clone())
                    .route(web::post().to(handlers::refresh_token)),
            )
            .service(
                web::resource("/logout")
                    .wrap(limiters.login.clone())
                    .route(web::post().to(handlers::logout)),
            ),
    );

    // Protected routes
    cfg.service(
        web::scope(&config.api_prefix)
            .wrap(from_fn(auth_middleware)) // authentication
            .wrap(limiters.protected.clone()) // rate limiting
            .service(
                web::scope("/employees")
                    // /employees
                    .service(
                        web::resource("")
                            .route(web::get().to(employee::list_employees))
                            .route(web::post().to(employee::create_employee)),
                    )
                    // before /{id} so they are not taken for ids
                    .service(
                        web::resource("/export").route(web::get().to(employee::export_employees)),
                    )
                    .service(
                        web::resource("/import").route(web::post().to(employee::import_employees)),
                    )
                    // /employees/{id}
                    .service(
                        web::resource("/{id}")
                            .route(web::get().to(employee::get_employee))
                            .route(web::put().to(employee::update_employee))
                            .route(web::delete().to(employee::delete_employee)),
                    ),
            )
            .service(
                web::scope("/attendance")
                    // /attendance
                    .service(
                        web::resource("")
                            .route(web::get().to(attendance::list_attendance))
                            .route(web::put().to(attendance::mark_attendance)),
                    )
                    .service(web::resource("/bulk").route(web::post().to(attendance::bulk_mark)))
                    .service(
                        web::resource("/export")
                            .route(web::get().to(attendance::export_attendance)),
                    )
                    .service(
                        web::resource("/import")
                            .route(web::post().to(attendance::import_attendance)),
                    )
                    .service(
                        web::resource("/check-in").route(web::post().to(attendance::check_in)),
                    )
                    .service(
                        web::resource("/check-out").route(web::post().to(attendance::check_out)),
                    )
                    // /attendance/{employee_id}/{date}
                    .service(
                        web::resource("/{employee_id}/{date}")
                            .route(web::delete().to(attendance::delete_attendance)),
                    ),
            )
            .service(
                web::scope("/settings")
                    .service(web::resource("").route(web::get().to(settings::get_settings)))
                    .service(
                        web::resource("/weekends").route(web::put().to(settings::set_weekends)),
                    )
                    .service(
                        web::resource("/holidays").route(web::post().to(settings::add_holiday)),
                    )
                    .service(
                        web::resource("/holidays/{date}")
                            .route(web::delete().to(settings::remove_holiday)),
                    )
                    .service(
                        web::resource("/shifts/{name}")
                            .route(web::put().to(settings::set_shift))
                            .route(web::delete().to(settings::remove_shift)),
                    ),
            )
            .service(
                web::scope("/reports")
                    .service(web::resource("/summary").route(web::get().to(report::summary)))
                    .service(web::resource("/monthly").route(web::get().to(report::monthly)))
                    .service(web::resource("/daily").route(web::get().to(report::daily))),
            )
            .service(
                web::scope("/backup")
                    .service(
                        web::resource("/json")
                            .route(web::get().to(backup::export_json))
                            .route(web::post().to(backup::import_json)),
                    )
                    .service(
                        web::resource("/sql")
                            .route(web::get().to(backup::export_sql))
                            .route(web::post().to(backup::import_sql)),
                    )
                    .service(
                        web::resource("/sample-data").route(web::post().to(backup::sample_data)),
                    ),
            ),
    );
}

// LOGIN
//  ├─ access_token (15 min)
//  └─ refresh_token (7 days)

// API REQUEST
//  └─ Authorization: Bearer access_token

// ACCESS EXPIRED
//  └─ POST /auth/refresh with refresh_token
//       └─ returns new access_token

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn limiters_accept_zero_and_large_rates() {
        assert!(build_limiter(0).is_ok());
        assert!(build_limiter(60).is_ok());
        assert!(build_limiter(120_000).is_ok());
    }
}

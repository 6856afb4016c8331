use axum::{
    middleware,
    routing::{delete, get, patch, post},
    Router,
};
use sqlx::PgPool;
use std::sync::Arc;
use std::time::Duration;
use tower_http::{
    cors::{Any, CorsLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};

use crate::config::Config;
use crate::middleware::{metrics_handler, trace_id};
use crate::routes::{events, health, promotions, transactions, users};
use shared::jwt::TokenKeys;

#[derive(Clone)]
pub struct AppState {
    pub pool: PgPool,
    pub config: Arc<Config>,
    pub token_keys: Arc<TokenKeys>,
}

pub fn create_app(config: Config, pool: PgPool) -> Router {
    let token_keys = Arc::new(TokenKeys::new(&config.jwt.secret, config.jwt.leeway_secs));
    let config = Arc::new(config);

    let state = AppState {
        pool,
        config: config.clone(),
        token_keys,
    };

    // Build CORS layer based on configuration
    let cors = if config.security.cors_origins.is_empty() {
        // Default: allow any origin (for development)
        CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any)
    } else {
        use tower_http::cors::AllowOrigin;
        let origins: Vec<_> = config
            .security
            .cors_origins
            .iter()
            .filter_map(|o| o.parse().ok())
            .collect();
        CorsLayer::new()
            .allow_origin(AllowOrigin::list(origins))
            .allow_methods(Any)
            .allow_headers(Any)
    };

    // Every handler resolves its own principal via the AuthUser extractor,
    // so the routers compose flat.
    let user_routes = Router::new()
        .route("/users", get(users::list_users))
        .route("/users/me", get(users::get_me))
        .route(
            "/users/me/transactions",
            get(users::my_transactions).post(users::create_redemption),
        )
        .route(
            "/users/:user_id",
            get(users::get_user).patch(users::update_user),
        )
        .route("/users/:user_id/transactions", post(users::create_transfer));

    let transaction_routes = Router::new()
        .route(
            "/transactions",
            post(transactions::create_transaction).get(transactions::list_transactions),
        )
        .route("/transactions/:transaction_id", get(transactions::get_transaction))
        .route(
            "/transactions/:transaction_id/suspicious",
            patch(transactions::set_suspicious),
        )
        .route(
            "/transactions/:transaction_id/processed",
            patch(transactions::process_transaction),
        );

    let event_routes = Router::new()
        .route("/events", post(events::create_event).get(events::list_events))
        .route("/organizer/events", get(events::organizer_events))
        .route(
            "/events/:event_id",
            get(events::get_event)
                .patch(events::update_event)
                .delete(events::delete_event),
        )
        .route("/events/:event_id/organizers", post(events::add_organizer))
        .route(
            "/events/:event_id/organizers/:user_id",
            delete(events::remove_organizer),
        )
        .route("/events/:event_id/guests", post(events::add_guest))
        .route(
            "/events/:event_id/guests/me",
            post(events::rsvp_me).delete(events::leave_me),
        )
        .route(
            "/events/:event_id/guests/:user_id",
            delete(events::remove_guest),
        )
        .route("/events/:event_id/transactions", post(events::award_points));

    let promotion_routes = Router::new()
        .route(
            "/promotions",
            post(promotions::create_promotion).get(promotions::list_promotions),
        )
        .route(
            "/promotions/:promotion_id",
            get(promotions::get_promotion)
                .patch(promotions::update_promotion)
                .delete(promotions::delete_promotion),
        );

    // Public routes (no authentication required)
    let public_routes = Router::new()
        .route("/api/health", get(health::health_check))
        .route("/metrics", get(metrics_handler));

    Router::new()
        .merge(public_routes)
        .merge(user_routes)
        .merge(transaction_routes)
        .merge(event_routes)
        .merge(promotion_routes)
        // Global middleware (order matters: bottom layers run first)
        .layer(TimeoutLayer::new(Duration::from_secs(
            config.server.request_timeout_secs,
        )))
        .layer(TraceLayer::new_for_http())
        .layer(middleware::from_fn(trace_id))
        .layer(cors)
        .with_state(state)
}

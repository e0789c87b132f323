use axum::{
    routing::{get, post},
    Router,
};
use tower_http::trace::TraceLayer;

use crate::config::{create_cors_layer, create_security_headers_layer};
use crate::handlers::{account, booking, conference, discount, health_check, payment};
use crate::state::AppState;

pub fn create_routes(state: AppState) -> Router {
    let conference = Router::new()
        .route("/:slug", get(conference::get_conference))
        .route("/booking", post(booking::create_booking))
        .route("/booking/:reference", get(booking::get_booking))
        .route("/discount-code", get(discount::validate_discount_code))
        .route("/paypal/create-order", post(payment::create_order))
        .route("/paypal/capture", post(payment::capture_order))
        .route("/paypal/webhook", post(payment::webhook));

    let user = Router::new()
        .route("/register", post(account::register))
        .route("/verify", post(account::verify_email))
        .route("/set-password", post(account::set_password))
        .route("/login", post(account::login))
        .route("/resend-code", post(account::resend_code))
        .route("/forgot-password", post(account::forgot_password))
        .route("/reset-password", post(account::reset_password))
        .route("/change-password", post(account::change_password))
        .route("/check-account", get(account::check_account));

    Router::new()
        .route("/health", get(health_check))
        .nest("/api/conference", conference)
        .nest("/api/user", user)
        .layer(TraceLayer::new_for_http())
        .layer(create_security_headers_layer())
        .layer(create_cors_layer())
        .with_state(state)
}

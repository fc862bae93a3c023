use axum::{
    routing::{get, post, put},
    Router,
};
use tower_http::trace::TraceLayer;

use crate::config::{create_cors_layer, create_security_headers_layer};
use crate::handlers::{
    accounts, analytics, checkin, discount_codes, events, guests, health_check, notifications, orders,
    payments, qr_codes, ticket_types, tickets,
};
use crate::state::AppState;

fn account_routes() -> Router<AppState> {
    Router::new()
        .route("/register", post(accounts::register))
        .route("/login", post(accounts::login))
        .route("/token/refresh", post(accounts::refresh))
        .route("/profile", get(accounts::profile))
        .route(
            "/profile/update",
            put(accounts::update_profile).patch(accounts::update_profile),
        )
        .route("/change-password", post(accounts::change_password))
        .route("/delete", axum::routing::delete(accounts::delete_account))
}

fn event_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(events::list_events).post(events::create_event))
        .route("/upcoming", get(events::upcoming_events))
        .route("/past", get(events::past_events))
        .route("/public", get(events::public_events))
        .route("/by-slug/:slug", get(events::event_by_slug))
        .route(
            "/:id",
            get(events::get_event)
                .put(events::update_event)
                .patch(events::update_event)
                .delete(events::delete_event),
        )
        .route("/:id/stats", get(analytics::event_stats))
        .route("/:id/publish", post(events::publish_event))
        .route("/:id/cancel", post(events::cancel_event))
}

fn guest_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(guests::list_guests).post(guests::create_guest))
        .route("/bulk_create", post(guests::bulk_create_guests))
        .route(
            "/:id",
            get(guests::get_guest)
                .put(guests::update_guest)
                .patch(guests::update_guest)
                .delete(guests::delete_guest),
        )
}

fn qr_code_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(qr_codes::list_qr_codes))
        .route("/generate", post(qr_codes::generate_qr_code))
        .route("/validate", post(qr_codes::validate_qr_token))
        .route("/:id", get(qr_codes::get_qr_code).delete(qr_codes::delete_qr_code))
        .route("/:id/image", get(qr_codes::qr_code_image))
}

fn checkin_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(checkin::list_checkins))
        .route("/scan", post(checkin::scan_qr))
        .route("/manual", post(checkin::manual_checkin))
        .route("/self-checkin", post(checkin::self_checkin))
        .route("/validate", post(checkin::validate_credential))
        .route("/redeem", post(checkin::checkin_credential))
}

fn notification_routes() -> Router<AppState> {
    Router::new()
        .route("/send-invite", post(notifications::send_invite))
        .route("/send-bulk-invites", post(notifications::send_bulk_invites))
        .route("/send-reminder", post(notifications::send_reminder))
        .route("/send-ticket-reminder", post(notifications::send_ticket_reminder))
}

fn analytics_routes() -> Router<AppState> {
    Router::new()
        .route("/dashboard", get(analytics::dashboard))
        .route("/events/:id/stats", get(analytics::event_stats))
        .route("/events/:id/export", get(analytics::export_guests))
}

fn ticketing_routes() -> Router<AppState> {
    Router::new()
        .route(
            "/ticket-types",
            get(ticket_types::list_ticket_types).post(ticket_types::create_ticket_type),
        )
        .route(
            "/ticket-types/:id",
            get(ticket_types::get_ticket_type)
                .put(ticket_types::update_ticket_type)
                .patch(ticket_types::update_ticket_type)
                .delete(ticket_types::delete_ticket_type),
        )
        .route("/ticket-types/:id/benefits", post(ticket_types::add_benefit))
        .route("/orders", get(orders::list_orders).post(orders::create_order))
        .route("/orders/:id", get(orders::get_order))
        .route("/orders/:id/initialize-payment", post(orders::initialize_payment))
        .route("/orders/:id/confirm-payment", post(orders::confirm_payment))
        .route("/orders/:id/cancel", post(orders::cancel_order))
        .route("/payments/verify", get(payments::verify_payment))
        .route("/webhooks/paystack", post(payments::paystack_webhook))
        .route("/tickets", get(tickets::list_tickets))
        .route("/tickets/:id", get(tickets::get_ticket))
        .route("/tickets/:id/check-in", post(tickets::check_in_ticket))
        .route("/tickets/:id/qr", get(tickets::ticket_qr))
        .route(
            "/discount-codes",
            get(discount_codes::list_discount_codes).post(discount_codes::create_discount_code),
        )
        .route("/discount-codes/validate", post(discount_codes::validate_code))
        .route(
            "/discount-codes/:id",
            get(discount_codes::get_discount_code)
                .put(discount_codes::update_discount_code)
                .patch(discount_codes::update_discount_code)
                .delete(discount_codes::delete_discount_code),
        )
}

pub fn create_routes(state: AppState) -> Router {
    let is_production = state.config.is_production;
    let cors = create_cors_layer(&state.config.cors_allowed_origins);

    let api = Router::new()
        .nest("/accounts", account_routes())
        .nest("/events", event_routes())
        .nest("/guests", guest_routes())
        .nest("/qr-codes", qr_code_routes())
        .nest("/checkin", checkin_routes())
        .nest("/notifications", notification_routes())
        .nest("/analytics", analytics_routes())
        .nest("/ticket", ticketing_routes());

    Router::new()
        .route("/health", get(health_check))
        .nest("/api", api)
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(create_security_headers_layer(is_production))
        .layer(cors)
}

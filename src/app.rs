use crate::handlers;
use crate::state::AppState;
use axum::{
    Router,
    routing::{get, post, put},
};

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(handlers::index))
        .route("/login", post(handlers::login_form))
        .route("/logout", post(handlers::logout_form))
        .route("/onboarding", post(handlers::onboarding_form))
        .route("/cell/check", post(handlers::check_cell_form))
        .route("/cell/uncheck", post(handlers::uncheck_cell_form))
        .route("/day", post(handlers::select_day_form))
        .route("/note", post(handlers::note_form))
        .route("/api/login", post(handlers::login))
        .route("/api/logout", post(handlers::logout))
        .route("/api/session", get(handlers::get_session))
        .route("/api/onboarding", post(handlers::onboarding))
        .route("/api/dashboard", get(handlers::get_dashboard))
        .route("/api/progress/check", post(handlers::check_cell))
        .route("/api/progress/uncheck", post(handlers::uncheck_cell))
        .route("/api/progress/reset", post(handlers::reset_progress))
        .route("/api/habits", post(handlers::add_habit))
        .route("/api/habits/top", put(handlers::set_top_habits))
        .route(
            "/api/habits/:id",
            put(handlers::update_habit).delete(handlers::delete_habit),
        )
        .route("/api/habits/:id/move", post(handlers::move_habit))
        .route(
            "/api/notes/:day",
            put(handlers::set_note).delete(handlers::clear_note),
        )
        .route("/api/view", post(handlers::update_view))
        .route("/api/view/today", post(handlers::view_today))
        .route("/api/backup", get(handlers::backup))
        .route("/api/restore", post(handlers::restore))
        .route("/api/new-data", post(handlers::new_data))
        .route("/api/account/delete", post(handlers::delete_account))
        .route("/api/admin/setup", post(handlers::admin_setup))
        .route("/api/admin/accounts", post(handlers::admin_accounts))
        .route("/api/admin/switch", post(handlers::admin_switch))
        .route("/api/admin/recover", post(handlers::admin_recover))
        .route("/api/admin/reset", post(handlers::admin_reset))
        .with_state(state)
}

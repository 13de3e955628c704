use crate::auth::{self, LoginOutcome};
use crate::errors::{AppError, TrackerError};
use crate::models::{
    AccountSummary, AddHabitRequest, CellRequest, DashboardResponse, HabitId, LoginRequest,
    MasterSetupRequest, MoveHabitRequest, NoteRequest, OnboardingRequest, PasswordRequest,
    RecoverRequest, SessionResponse, SwitchProfileRequest, TopHabitsRequest, UpdateHabitRequest,
    ViewRequest,
};
use crate::session::Session;
use crate::state::{AppState, Workspace};
use crate::stats::build_dashboard_at;
use crate::storage::{KvStore, persist_store};
use crate::ui::{render_dashboard, render_login, render_onboarding};
use axum::{
    Form, Json,
    extract::{Path, Query, State},
    http::{StatusCode, header},
    response::{Html, IntoResponse, Redirect},
};
use chrono::{Datelike, Local, NaiveDate};
use serde::Deserialize;
use std::collections::HashSet;
use tokio::sync::MutexGuard;
use tracing::{info, warn};

#[derive(Debug, Deserialize)]
pub struct IndexQuery {
    pub error: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct LoginForm {
    pub username: String,
    pub password: String,
    pub create: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct OnboardingForm {
    pub year: i32,
    pub month: String,
    #[serde(default)]
    pub habits: String,
    #[serde(default)]
    pub top: String,
}

#[derive(Debug, Deserialize)]
pub struct DayForm {
    pub day: u32,
}

pub async fn index(
    State(state): State<AppState>,
    Query(query): Query<IndexQuery>,
) -> Html<String> {
    let error = query.error.as_deref().map(error_message);
    let ws = state.workspace.lock().await;
    let Some(session) = ws.session.as_ref() else {
        return Html(render_login(error));
    };
    match session.data.as_ref() {
        Some(data) => Html(render_dashboard(&build_dashboard_at(today(), session, data), error)),
        None => Html(render_onboarding(&session.username, today(), error)),
    }
}

pub async fn login_form(State(state): State<AppState>, Form(form): Form<LoginForm>) -> Redirect {
    let result = commit(&state, |ws| {
        open_session(ws, &form.username, &form.password, form.create.is_some())
    })
    .await;
    match result {
        Ok(_) => Redirect::to("/"),
        Err(err) => {
            if err.status.is_server_error() {
                warn!("login failed: {}", err.message);
            }
            Redirect::to(&format!("/?error={}", error_code(&err)))
        }
    }
}

pub async fn logout_form(State(state): State<AppState>) -> Result<Redirect, AppError> {
    commit(&state, |ws| {
        ws.logout();
        Ok(())
    })
    .await?;
    Ok(Redirect::to("/"))
}

pub async fn onboarding_form(
    State(state): State<AppState>,
    Form(form): Form<OnboardingForm>,
) -> Result<Redirect, AppError> {
    let habits: Vec<String> = form.habits.lines().map(str::to_string).collect();
    let top: Vec<String> = form.top.lines().map(str::to_string).collect();
    let outcome = apply_session(&state, |session, _| {
        session.onboard(form.year, &form.month, &habits, &top)
    })
    .await;
    redirect_after(outcome)
}

pub async fn check_cell_form(
    State(state): State<AppState>,
    Form(cell): Form<CellRequest>,
) -> Result<Redirect, AppError> {
    let outcome = apply_session(&state, |session, today| {
        session.data_mut()?.check(&cell.habit_id, cell.day, today)
    })
    .await;
    redirect_after(outcome)
}

pub async fn uncheck_cell_form(
    State(state): State<AppState>,
    Form(cell): Form<CellRequest>,
) -> Result<Redirect, AppError> {
    let outcome = apply_session(&state, |session, _| {
        session.data_mut()?.uncheck(&cell.habit_id, cell.day)
    })
    .await;
    redirect_after(outcome)
}

pub async fn select_day_form(
    State(state): State<AppState>,
    Form(form): Form<DayForm>,
) -> Result<Redirect, AppError> {
    let outcome = apply_session(&state, |session, _| session.select_day(form.day)).await;
    redirect_after(outcome)
}

pub async fn note_form(
    State(state): State<AppState>,
    Form(note): Form<NoteRequest>,
) -> Result<Redirect, AppError> {
    let outcome = apply_session(&state, |session, _| session.set_note_for_selected(&note.text)).await;
    redirect_after(outcome)
}

pub async fn login(
    State(state): State<AppState>,
    Json(payload): Json<LoginRequest>,
) -> Result<Json<SessionResponse>, AppError> {
    let (_, response) = commit(&state, |ws| {
        open_session(ws, &payload.username, &payload.password, payload.create)
    })
    .await?;
    Ok(Json(response))
}

pub async fn logout(State(state): State<AppState>) -> Result<Json<SessionResponse>, AppError> {
    let (_, username) = commit(&state, |ws| {
        let username = ws.session.as_ref().map(|session| session.username.clone());
        ws.logout();
        Ok(username)
    })
    .await?;
    if let Some(username) = username {
        info!(%username, "logged out");
    }
    Ok(Json(SessionResponse {
        username: None,
        created: false,
        needs_onboarding: false,
    }))
}

pub async fn get_session(State(state): State<AppState>) -> Json<SessionResponse> {
    let ws = state.workspace.lock().await;
    Json(SessionResponse {
        username: ws.session.as_ref().map(|s| s.username.clone()),
        created: false,
        needs_onboarding: ws.session.as_ref().is_some_and(Session::needs_onboarding),
    })
}

pub async fn onboarding(
    State(state): State<AppState>,
    Json(payload): Json<OnboardingRequest>,
) -> Result<Json<DashboardResponse>, AppError> {
    apply_session(&state, |session, _| {
        session.onboard(payload.year, &payload.month, &payload.habits, &payload.top)
    })
    .await
}

pub async fn get_dashboard(State(state): State<AppState>) -> Result<Json<DashboardResponse>, AppError> {
    let ws = state.workspace.lock().await;
    dashboard_of(&ws, today())
}

pub async fn check_cell(
    State(state): State<AppState>,
    Json(cell): Json<CellRequest>,
) -> Result<Json<DashboardResponse>, AppError> {
    apply_session(&state, |session, today| {
        session.data_mut()?.check(&cell.habit_id, cell.day, today)
    })
    .await
}

pub async fn uncheck_cell(
    State(state): State<AppState>,
    Json(cell): Json<CellRequest>,
) -> Result<Json<DashboardResponse>, AppError> {
    apply_session(&state, |session, _| {
        session.data_mut()?.uncheck(&cell.habit_id, cell.day)
    })
    .await
}

pub async fn reset_progress(
    State(state): State<AppState>,
    Json(payload): Json<PasswordRequest>,
) -> Result<Json<DashboardResponse>, AppError> {
    let today = today();
    let (ws, username) = commit(&state, |ws| {
        let username = ws.session()?.username.clone();
        auth::verify_profile_password(&ws.store, &username, &payload.password)?;
        ws.session_mut()?.data_mut()?.clear_progress();
        ws.save_session_data()?;
        Ok(username)
    })
    .await?;
    info!(%username, "progress cleared");
    dashboard_of(&ws, today)
}

pub async fn add_habit(
    State(state): State<AppState>,
    Json(payload): Json<AddHabitRequest>,
) -> Result<Json<DashboardResponse>, AppError> {
    apply_session(&state, |session, today| {
        let start = if payload.start_from_today { today.day() } else { 1 };
        session.data_mut()?.habits.add_habit(&payload.name, start)?;
        Ok(())
    })
    .await
}

pub async fn update_habit(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(payload): Json<UpdateHabitRequest>,
) -> Result<Json<DashboardResponse>, AppError> {
    let id = HabitId::new(id);
    apply_session(&state, |session, _| {
        let habits = &mut session.data_mut()?.habits;
        if let Some(name) = &payload.name {
            habits.rename_habit(&id, name)?;
        }
        if let Some(details) = &payload.details {
            habits.set_details(&id, details)?;
        }
        Ok(())
    })
    .await
}

pub async fn delete_habit(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<DashboardResponse>, AppError> {
    let id = HabitId::new(id);
    apply_session(&state, |session, _| {
        session.data_mut()?.habits.remove_habit(&id)?;
        Ok(())
    })
    .await
}

pub async fn move_habit(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(payload): Json<MoveHabitRequest>,
) -> Result<Json<DashboardResponse>, AppError> {
    let id = HabitId::new(id);
    apply_session(&state, |session, _| {
        session.data_mut()?.habits.move_habit(&id, payload.index)
    })
    .await
}

pub async fn set_top_habits(
    State(state): State<AppState>,
    Json(payload): Json<TopHabitsRequest>,
) -> Result<Json<DashboardResponse>, AppError> {
    let ids: HashSet<HabitId> = payload.ids.into_iter().collect();
    apply_session(&state, |session, _| {
        session.data_mut()?.habits.set_top_priority(&ids)
    })
    .await
}

pub async fn set_note(
    State(state): State<AppState>,
    Path(day): Path<u32>,
    Json(payload): Json<NoteRequest>,
) -> Result<Json<DashboardResponse>, AppError> {
    apply_session(&state, |session, _| {
        session.data_mut()?.set_note(day, payload.text.as_str())
    })
    .await
}

pub async fn clear_note(
    State(state): State<AppState>,
    Path(day): Path<u32>,
) -> Result<Json<DashboardResponse>, AppError> {
    apply_session(&state, |session, _| session.data_mut()?.clear_note(day)).await
}

pub async fn update_view(
    State(state): State<AppState>,
    Json(payload): Json<ViewRequest>,
) -> Result<Json<DashboardResponse>, AppError> {
    apply_session(&state, |session, _| {
        if let Some(day) = payload.selected_day {
            session.select_day(day)?;
        }
        if let Some(view) = payload.stat_view {
            session.stat_view = view;
        }
        if let Some(visible) = payload.graph_visible {
            session.graph_visible = visible;
        }
        Ok(())
    })
    .await
}

pub async fn view_today(State(state): State<AppState>) -> Result<Json<DashboardResponse>, AppError> {
    apply_session(&state, |session, today| session.go_to_today(today).map(|_| ())).await
}

pub async fn backup(State(state): State<AppState>) -> Result<impl IntoResponse, AppError> {
    let ws = state.workspace.lock().await;
    let body = ws.store.snapshot_json()?;
    info!(keys = ws.store.len(), "backup exported");
    Ok((
        [
            (header::CONTENT_TYPE, "application/json"),
            (
                header::CONTENT_DISPOSITION,
                "attachment; filename=\"habit-tracker-backup.json\"",
            ),
        ],
        body,
    ))
}

pub async fn restore(
    State(state): State<AppState>,
    body: String,
) -> Result<Json<serde_json::Value>, AppError> {
    let store = KvStore::from_backup(&body)?;
    let (_, keys) = commit(&state, |ws| {
        ws.store = store;
        ws.session = None;
        Ok(ws.store.len())
    })
    .await?;
    info!(keys, "store restored from backup");
    Ok(Json(serde_json::json!({ "restored_keys": keys })))
}

pub async fn new_data(State(state): State<AppState>) -> Result<Json<serde_json::Value>, AppError> {
    commit(&state, |ws| {
        ws.store.clear();
        ws.session = None;
        Ok(())
    })
    .await?;
    info!("store cleared for new data");
    Ok(Json(serde_json::json!({ "cleared": true })))
}

pub async fn delete_account(
    State(state): State<AppState>,
    Json(payload): Json<PasswordRequest>,
) -> Result<Json<SessionResponse>, AppError> {
    commit(&state, |ws| {
        let username = ws.session()?.username.clone();
        auth::delete_profile(&mut ws.store, &username, &payload.password)?;
        ws.session = None;
        Ok(())
    })
    .await?;
    Ok(Json(SessionResponse {
        username: None,
        created: false,
        needs_onboarding: false,
    }))
}

pub async fn admin_setup(
    State(state): State<AppState>,
    Json(payload): Json<MasterSetupRequest>,
) -> Result<Json<serde_json::Value>, AppError> {
    commit(&state, |ws| auth::setup_master(&mut ws.store, &payload.password, &payload.email))
        .await?;
    Ok(Json(serde_json::json!({ "configured": true })))
}

pub async fn admin_accounts(
    State(state): State<AppState>,
    Json(payload): Json<PasswordRequest>,
) -> Result<Json<Vec<AccountSummary>>, AppError> {
    let ws = state.workspace.lock().await;
    Ok(Json(auth::list_accounts(&ws.store, &payload.password)?))
}

pub async fn admin_switch(
    State(state): State<AppState>,
    Json(payload): Json<SwitchProfileRequest>,
) -> Result<Json<SessionResponse>, AppError> {
    let username = payload.username.trim();
    let (_, response) = commit(&state, |ws| {
        auth::verify_master(&ws.store, &payload.password)?;
        if ws.store.find_user(username)?.is_none() {
            return Err(TrackerError::NotFound(format!("profile {username}")));
        }
        activate(ws, username, false)
    })
    .await?;
    info!(username, "switched profile");
    Ok(Json(response))
}

pub async fn admin_recover(
    State(state): State<AppState>,
    Json(payload): Json<RecoverRequest>,
) -> Result<Json<serde_json::Value>, AppError> {
    commit(&state, |ws| auth::recover_master(&mut ws.store, &payload.email)).await?;
    Ok(Json(serde_json::json!({ "reset": true })))
}

pub async fn admin_reset(
    State(state): State<AppState>,
    Json(payload): Json<PasswordRequest>,
) -> Result<Json<serde_json::Value>, AppError> {
    commit(&state, |ws| {
        auth::reset_app(&mut ws.store, &payload.password)?;
        ws.session = None;
        Ok(())
    })
    .await?;
    Ok(Json(serde_json::json!({ "reset": true })))
}

/// Applies `change` to a copy of the workspace under the lock and writes the
/// copy's store to disk. The live workspace is replaced only when both
/// succeed, so a rejected change or a failed write leaves it untouched.
async fn commit<T, F>(
    state: &AppState,
    change: F,
) -> Result<(MutexGuard<'_, Workspace>, T), AppError>
where
    F: FnOnce(&mut Workspace) -> Result<T, TrackerError>,
{
    let mut ws = state.workspace.lock().await;
    let mut staged = (*ws).clone();
    let value = change(&mut staged)?;
    persist_store(&state.data_path, &staged.store).await?;
    *ws = staged;
    Ok((ws, value))
}

/// Runs one session mutation, saves the whole profile blob and the store,
/// then answers with a fresh dashboard.
async fn apply_session<F>(state: &AppState, mutate: F) -> Result<Json<DashboardResponse>, AppError>
where
    F: FnOnce(&mut Session, NaiveDate) -> Result<(), TrackerError>,
{
    let today = today();
    let (ws, ()) = commit(state, |ws| {
        mutate(ws.session_mut()?, today)?;
        ws.save_session_data()
    })
    .await?;
    dashboard_of(&ws, today)
}

fn dashboard_of(ws: &Workspace, today: NaiveDate) -> Result<Json<DashboardResponse>, AppError> {
    let session = ws.session()?;
    let data = session.data()?;
    Ok(Json(build_dashboard_at(today, session, data)))
}

fn open_session(
    ws: &mut Workspace,
    username: &str,
    password: &str,
    create: bool,
) -> Result<SessionResponse, TrackerError> {
    let outcome = auth::login(&mut ws.store, username, password, create)?;
    let response = activate(ws, username.trim(), outcome == LoginOutcome::Created)?;
    info!(username = username.trim(), ?outcome, "logged in");
    Ok(response)
}

fn activate(ws: &mut Workspace, username: &str, created: bool) -> Result<SessionResponse, TrackerError> {
    let data = ws.store.load_user_data(username)?;
    let session = Session::new(username, today()).with_data(data);
    let response = SessionResponse {
        username: Some(session.username.clone()),
        created,
        needs_onboarding: session.needs_onboarding(),
    };
    ws.store.set_current_user(username);
    ws.session = Some(session);
    Ok(response)
}

// Form posts always land back on the page; the failure travels as a code in
// the query string. Storage failures still surface as errors.
fn redirect_after(outcome: Result<Json<DashboardResponse>, AppError>) -> Result<Redirect, AppError> {
    match outcome {
        Ok(_) => Ok(Redirect::to("/")),
        Err(err) if err.status.is_server_error() => Err(err),
        Err(err) => {
            warn!("form action rejected: {}", err.message);
            Ok(Redirect::to("/?error=rejected"))
        }
    }
}

fn error_code(err: &AppError) -> &'static str {
    match err.status {
        StatusCode::BAD_REQUEST => "missing",
        StatusCode::UNAUTHORIZED => "credentials",
        StatusCode::NOT_FOUND => "unknown",
        StatusCode::CONFLICT => "locked",
        status if status.is_server_error() => "storage",
        _ => "rejected",
    }
}

fn error_message(code: &str) -> &'static str {
    match code {
        "missing" => "Please enter both fields.",
        "credentials" => "Incorrect password.",
        "unknown" => "Profile not found. Tick \"create\" to make a new one.",
        "locked" => "That day cannot be changed yet.",
        "storage" => "Could not save your data.",
        _ => "That action was not allowed.",
    }
}

fn today() -> NaiveDate {
    Local::now().date_naive()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{MonthName, UserData};
    use std::path::PathBuf;

    // Signed-in "ana" tracking February 2024 with one habit.
    async fn signed_in(data_path: PathBuf) -> (AppState, HabitId) {
        let mut store = KvStore::default();
        auth::login(&mut store, "ana", "pw", true).unwrap();
        let data = UserData::onboard(2024, MonthName::February, &["Read".to_string()], &[]).unwrap();
        let id = data.habits.iter().next().unwrap().id.clone();
        store.save_user_data("ana", &data).unwrap();

        let state = AppState::new(data_path, store);
        activate(&mut *state.workspace.lock().await, "ana", false).unwrap();
        (state, id)
    }

    fn unused_file() -> PathBuf {
        std::env::temp_dir().join(format!("habit-tracker-unit-{}.json", std::process::id()))
    }

    #[tokio::test]
    async fn failed_write_leaves_workspace_unchanged() {
        // A directory cannot be written as a file.
        let (state, id) = signed_in(std::env::temp_dir()).await;

        let result = check_cell(
            State(state.clone()),
            Json(CellRequest {
                habit_id: id.clone(),
                day: 3,
            }),
        )
        .await;
        assert_eq!(
            result.err().map(|err| err.status),
            Some(StatusCode::INTERNAL_SERVER_ERROR)
        );

        let ws = state.workspace.lock().await;
        let data = ws.session().unwrap().data().unwrap();
        assert!(!data.progress.is_checked(&id, 3));
        let stored = ws.store.load_user_data("ana").unwrap().unwrap();
        assert!(stored.progress.is_empty());
    }

    #[tokio::test]
    async fn failed_write_keeps_admin_secrets_unset() {
        let (state, _) = signed_in(std::env::temp_dir()).await;
        let result = admin_setup(
            State(state.clone()),
            Json(MasterSetupRequest {
                password: "m".to_string(),
                email: "admin@example.com".to_string(),
            }),
        )
        .await;
        assert!(result.is_err());
        assert!(state.workspace.lock().await.store.master_pass().is_none());
    }

    #[tokio::test]
    async fn unreadable_profile_does_not_switch_current_user() {
        let (state, _) = signed_in(unused_file()).await;
        {
            let mut ws = state.workspace.lock().await;
            auth::login(&mut ws.store, "bob", "pw", true).unwrap();
            ws.store.set_current_user("ana");
            ws.store.set(crate::storage::data_key("bob"), "{broken");
        }

        let result = login(
            State(state.clone()),
            Json(LoginRequest {
                username: "bob".to_string(),
                password: "pw".to_string(),
                create: false,
            }),
        )
        .await;
        assert_eq!(
            result.err().map(|err| err.status),
            Some(StatusCode::INTERNAL_SERVER_ERROR)
        );

        let ws = state.workspace.lock().await;
        assert_eq!(ws.session().unwrap().username, "ana");
        assert_eq!(ws.store.current_user(), Some("ana"));
    }
}

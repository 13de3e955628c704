pub mod app;
pub mod auth;
pub mod eligibility;
pub mod errors;
pub mod handlers;
pub mod ledger;
pub mod models;
pub mod registry;
pub mod session;
pub mod state;
pub mod stats;
pub mod storage;
pub mod ui;

pub use app::router;
pub use errors::{AppError, TrackerError};
pub use state::AppState;
pub use stats::Progress;
pub use storage::{load_store, resolve_data_path};

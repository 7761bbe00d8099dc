mod app;

pub use app::{AppState, app_router};

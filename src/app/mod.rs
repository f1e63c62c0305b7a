//! Application context shared by the HTTP layer and background tasks

mod state;

pub use state::AppState;

mod state;

pub use state::{Api, AppState};

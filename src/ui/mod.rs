pub mod app;
pub mod conversation;
pub mod sidebar;

pub use app::run_tui;

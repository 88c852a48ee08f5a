pub mod icons;
pub mod progress;

pub use progress::{MonitorUI, SessionState, session_message};

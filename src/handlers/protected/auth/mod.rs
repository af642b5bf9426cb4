pub mod handoff;
pub mod session;

// Re-export handler functions for use in routing
pub use handoff::issue as handoff_issue;
pub use session::profile as session_profile;

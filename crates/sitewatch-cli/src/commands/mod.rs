pub mod check;
pub mod history;
pub mod jobs;
pub mod watch;

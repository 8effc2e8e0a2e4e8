//! Minimal CLI parsing for the operational command surface.

use std::env;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Command {
    /// Long-running mode: notification listener, periodic sync, health/stats API
    Serve,
    /// One full synchronization pass
    #[default]
    RunOnce,
    /// Ping both remote services and check the media path
    Health,
    /// Live counts from both remote services
    Stats,
    /// List media items with no counterpart in the archive
    CleanOrphans,
    /// Exercise the local notification endpoint
    TestNotification,
    /// Trigger a media-server library rescan
    RefreshLibrary,
}

impl Command {
    pub fn from_args() -> Self {
        let mut command = Command::default();
        for arg in env::args().skip(1) {
            if let Some(parsed) = Command::from_arg(&arg) {
                command = parsed;
            }
        }
        command
    }

    pub fn from_arg(arg: &str) -> Option<Self> {
        match arg {
            "serve" | "--server" => Some(Command::Serve),
            "run-once" | "--sync" => Some(Command::RunOnce),
            "health" => Some(Command::Health),
            "stats" => Some(Command::Stats),
            "clean-orphans" => Some(Command::CleanOrphans),
            "test-notification" => Some(Command::TestNotification),
            "refresh-library" => Some(Command::RefreshLibrary),
            _ => None,
        }
    }
}

pub mod attendance;
pub mod checkin;
pub mod config;
pub mod context;
mod error;
pub mod net;
pub mod prompt;
pub mod storage;

pub use attendance::{AttendanceRecord, AttendanceReporter, Submission};
pub use checkin::{CheckIn, CheckInError, QrOptions};
pub use config::{ConfigError, ConfigSnapshot, Resolver};
pub use context::AppContext;
pub use error::Error;

pub mod dump;

pub use dump::{DumpAttempt, FailureDump, FailureReport};

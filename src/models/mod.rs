mod email;

pub use email::{Email, EmailAnalysis, Priority, StoredEmail, UnknownPriority};

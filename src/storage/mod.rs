mod entries;
mod fetch_logs;
mod schema;
mod sources;
mod types;

pub use schema::Database;
pub use types::{DatabaseError, Entry, FetchLog, FetchStatus, NewEntry, NewSource, Source};

//! SQLite persistence for users, groups, posts, comments and follow edges.

pub mod client;
mod follows;
mod groups;
mod posts;
mod record;

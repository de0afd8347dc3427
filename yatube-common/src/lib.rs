//! Domain model shared by the yatube database layer and HTTP server.

pub mod model;
pub mod paginator;
pub mod util;

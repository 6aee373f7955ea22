pub mod connection;
pub mod lists;
pub mod members;
pub mod models;
pub mod players;
pub mod results;
pub mod runs;
pub mod setup;
pub mod tournaments;

pub use connection::{create_pool, get_connection, DbConn, DbPool};
pub use models::*;

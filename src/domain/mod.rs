pub mod models;
pub mod snapshot;

pub use models::{Colour, Outcome, PlayerCategory, RunStatus, Stage, SubscriptionCategory};
pub use snapshot::{PlayerSnapshot, ResultSnapshot, TournamentSnapshot};

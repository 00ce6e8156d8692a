pub mod overview;
pub mod session;
pub mod store;

pub use overview::StatsOverview;
pub use session::SessionOutcome;
pub use store::{StatisticsStore, StatsListener};

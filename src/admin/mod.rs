//! Admin listener: metrics scrape and dashboard

pub mod dashboard;
pub mod handlers;
pub mod routes;

pub use dashboard::{Reported, SiteHistory, SiteReport, SiteSummary, DAY_WINDOWS};
pub use routes::create_admin_router;

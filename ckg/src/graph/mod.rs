mod analytics;
mod store;

pub use analytics::GraphAnalytics;
pub use store::GraphService;

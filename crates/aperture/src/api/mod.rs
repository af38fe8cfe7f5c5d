//! HTTP API handlers for the rating gateway.

pub mod batch;
pub mod health;
pub mod payload;
pub mod providers;
pub mod rating;

pub use batch::batch_routes;
pub use health::health_routes;
pub use providers::provider_routes;
pub use rating::rating_routes;

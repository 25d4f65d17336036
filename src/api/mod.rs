pub mod in_flight;
pub mod middleware;
pub mod routes;

// Re-export public types and functions
pub use in_flight::{InFlight, InFlightGuard};
pub use middleware::log_request_errors;
pub use routes::{ClaimResponse, claim, health};

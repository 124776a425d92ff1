pub mod handlers;
pub mod middleware;
pub mod pending;
pub mod routes;

pub use routes::create_router;

//! HTTP command surface

mod routes;

pub use routes::build_router;

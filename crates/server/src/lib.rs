mod error;
pub mod board;
pub mod routes;

pub use error::ServerError;

pub use api_response::*;
pub use transaction::*;

pub mod api_response;
pub mod transaction;

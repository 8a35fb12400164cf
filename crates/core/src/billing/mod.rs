pub mod stripe;
pub mod traits;
pub mod webhook;

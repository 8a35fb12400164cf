pub mod alphavantage;
pub mod traits;

pub mod metrics;
pub mod notice;
pub mod portfolio;
pub mod quote;
pub mod stock;
pub mod subscription;
pub mod user;

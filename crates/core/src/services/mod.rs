pub mod metrics_service;
pub mod portfolio_service;
pub mod quote_service;
pub mod retry;
pub mod subscription_service;

pub mod auth_service;
pub mod biometric_service;
pub mod detector;
pub mod identity_service;
pub mod rate_limiter;
pub mod token_service;

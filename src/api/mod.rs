pub mod biometric;
pub mod health;
pub mod user;

pub mod jwt;
pub mod landmarks;
pub mod user;

pub mod client_addr;
pub mod image;

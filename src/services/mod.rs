pub mod payment;
pub mod tokens;

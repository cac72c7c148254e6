pub mod user;
pub mod payment;
pub mod stats;

pub use user::User;
pub use payment::Checkout;
pub use stats::AdminSummary;

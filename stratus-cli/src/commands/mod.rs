pub mod call;
pub mod session;

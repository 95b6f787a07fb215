pub mod lower;
pub mod signature;

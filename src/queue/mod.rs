pub mod ordering;
pub mod signature;

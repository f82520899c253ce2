pub mod harvest;
pub mod rate;

pub mod orders;
pub mod profit;
pub mod settings;

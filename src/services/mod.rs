pub mod api;
pub mod orders;
pub mod profit;
pub mod search;
pub mod state;

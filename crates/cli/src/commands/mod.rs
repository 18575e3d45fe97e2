pub mod onboard;
pub mod serve;

pub mod base;
// statistic preparation slots, statistic slots
pub mod stat;
// statistic slots, rule check slots
pub mod circuitbreaker;
pub mod config;
pub mod flow;
// rule check slots
pub mod system;

pub mod account;
pub mod config;
pub mod event;
pub mod history;
pub mod leaderboard;
pub mod market;
pub mod portfolio;
pub mod stock;
pub mod trade;

pub mod event_catalog;
pub mod history_store;
pub mod leaderboard;
pub mod ledger;
pub mod price_model;
pub mod stock_book;

pub mod archiver;
pub mod audit;
pub mod config;
pub mod ledger;
pub mod lock;
pub mod message;
pub mod naming;
pub mod normalize;
pub mod paths;
pub mod source;
pub mod store;
pub mod util;
pub mod views;
pub mod warn;
pub mod watcher;

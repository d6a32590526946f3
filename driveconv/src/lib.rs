pub mod config;
pub mod credentials;
pub mod provision;
pub mod remote;
pub mod store;
pub mod trace;
pub mod traverse;

pub mod account;
pub mod cache;
pub mod circuit_breaker;
pub mod client;
pub mod mutation;
pub mod mutation_state;
pub mod normalizer;
pub mod payload;
pub mod search;
pub mod service;
pub mod session;

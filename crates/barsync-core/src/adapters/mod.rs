//! Upstream fetch client implementations.

pub mod cryptocompare;

pub use cryptocompare::CryptoCompareClient;

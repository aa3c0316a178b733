//! Integration tests: full cycles against an in-memory exchange.

mod cycle;
mod mock_exchange;
mod status_api;

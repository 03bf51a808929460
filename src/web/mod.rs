//! JSON API for ranking providers against a fixed coverage file.
//!
//! The server is started with a coverage file; every request streams that
//! file again, so updates to it are picked up without a restart.
//!
//! ## Starting the Server
//!
//! ```text
//! # Start on default port 8080
//! provider-match serve --coverage in-network-rates.json.gz
//!
//! # Bind to all interfaces
//! provider-match serve --coverage in-network-rates.json.gz --address 0.0.0.0
//! ```
//!
//! ## API Endpoints
//!
//! - `POST /api/rank` - Rank candidates for a patient. Body:
//!   `{"patient": {...}, "candidates": [...], "weights"?, "limit"?, "taxonomy"?, "allow_partial"?}`
//! - `GET /api/coverage?npi=ID,ID` - Network status of up to 1000 identifiers
//! - `GET /api/health` - Liveness check

pub mod server;

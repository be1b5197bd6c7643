//! HTTP API for the run engine.
//!
//! ## Endpoints
//!
//! - `GET /api/health` - Health check
//! - `POST /api/runs` - Create a run from a user goal
//! - `GET /api/runs` - List runs
//! - `GET /api/runs/{id}` - Get a run document
//! - `DELETE /api/runs/{id}` - Delete a run
//! - `POST /api/runs/{id}/design` - Design the agent team, stop at draft
//! - `POST /api/runs/{id}/execute` - Execute the run in the background
//! - `POST /api/runs/{id}/resume` - Resume a paused run, optionally with a hint
//! - `POST /api/runs/{id}/fork` - Fork the run at a step index
//! - `POST /api/runs/{id}/ghost` - Create a ghost with one prompt replaced
//! - `POST /api/runs/{id}/promote` - Promote a ghost's prompts onto the run
//! - `POST /api/runs/{id}/critic` - Run the critic pass
//! - `PUT /api/runs/{id}/agents` - Replace a draft run's agent definitions

mod routes;
pub mod types;

pub use routes::serve;
pub use types::*;

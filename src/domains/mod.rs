//! Custom-domain lifecycle: format checks, DNS ownership checks and the
//! pending → active → inactive state machine.

pub mod dns;
mod dto;
pub mod handlers;
pub mod services;
pub mod validation;

use crate::state::AppState;
use axum::Router;

pub fn router() -> Router<AppState> {
    handlers::domain_routes()
}

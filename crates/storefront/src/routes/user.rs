//! User route handlers.

use axum::extract::State;
use tracing::instrument;

use crate::error::Result;
use crate::middleware::CallerIdentity;
use crate::response::Envelope;
use crate::state::AppState;

/// Return the caller's user record.
#[instrument(skip_all)]
pub async fn data(State(state): State<AppState>, caller: CallerIdentity) -> Result<Envelope> {
    let user = state.users().profile(caller.user_id()).await?;
    Ok(Envelope::user(user))
}

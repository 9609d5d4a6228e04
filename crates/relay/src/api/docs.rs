use axum::{
    extract::{Path, Query, State},
    Json,
};
use quire_common::protocol::docs::{
    DocSnapshot, DocSummary, EventsResponse, SubmitEventsRequest, SubmitEventsResponse,
};
use quire_common::step::Step;
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use tracing::{debug, info_span, warn, Instrument};

use super::{ClientIp, DocsApiState};
use crate::collab::{PollOutcome, PollStart};
use crate::error::RelayError;
use crate::validation::{non_negative_integer, ValidatedJson};

/// Raw query for the long-poll; both values are validated by hand so bad
/// input gets the structured 400 instead of axum's plain-text rejection.
#[derive(Debug, Default, Deserialize)]
pub struct EventsQuery {
    version: Option<String>,
    #[serde(rename = "commentVersion")]
    comment_version: Option<String>,
}

pub async fn list_docs<S: Step>(State(state): State<DocsApiState<S>>) -> Json<Vec<DocSummary>> {
    Json(state.registry.summaries().await)
}

pub async fn get_doc<S>(
    State(state): State<DocsApiState<S>>,
    Path(id): Path<String>,
    ClientIp(ip): ClientIp,
) -> Json<DocSnapshot<S::Doc>>
where
    S: Step,
    S::Doc: Serialize,
{
    let session = state.registry.get_or_create(&id, Some(&ip)).await;
    Json(session.snapshot())
}

pub async fn poll_events<S>(
    State(state): State<DocsApiState<S>>,
    Path(id): Path<String>,
    ClientIp(ip): ClientIp,
    Query(query): Query<EventsQuery>,
) -> Result<Json<EventsResponse<S>>, RelayError>
where
    S: Step + Serialize,
{
    let version = non_negative_integer("version", query.version.as_deref())?;
    let comment_version =
        non_negative_integer("commentVersion", query.comment_version.as_deref())?;

    let span = info_span!("relay.api.poll_events", doc_id = %id, version, comment_version);
    async move {
        let session = state.registry.get_or_create(&id, Some(&ip)).await;
        let parked = match session.poll(version, comment_version, &ip)? {
            PollStart::Ready(delta) => return Ok(Json(delta.into_response())),
            PollStart::Parked(parked) => parked,
        };

        let delta = match parked.wait(state.poll_timeout).await {
            PollOutcome::Woken => session.delta(version, comment_version)?,
            PollOutcome::TimedOut => {
                debug!("poll timed out without changes");
                session.idle()
            }
        };
        Ok::<_, RelayError>(Json(delta.into_response()))
    }
    .instrument(span)
    .await
}

pub async fn submit_events<S>(
    State(state): State<DocsApiState<S>>,
    Path(id): Path<String>,
    ClientIp(ip): ClientIp,
    ValidatedJson(request): ValidatedJson<SubmitEventsRequest<S>>,
) -> Result<Json<SubmitEventsResponse>, RelayError>
where
    S: Step + DeserializeOwned,
{
    let SubmitEventsRequest { version, steps, comment, client_id } = request;
    let span = info_span!("relay.api.submit_events", doc_id = %id, version, client_id);
    async move {
        let session = state.registry.get_or_create(&id, Some(&ip)).await;
        match session.submit(version, steps, comment, client_id) {
            Ok(accepted) => Ok(Json(accepted)),
            Err(error) => {
                warn!(%error, "rejected step batch");
                Err(RelayError::from(error))
            }
        }
    }
    .instrument(span)
    .await
}

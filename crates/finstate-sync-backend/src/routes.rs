//! Ingress HTTP surface: a bearer-checked batch endpoint that validates and
//! spawns one orchestrator task per ticker, plus an unauthenticated health
//! check.

use std::convert::Infallible;
use std::sync::Arc;

use finstate_sync_core::IngestRequest;
use serde::Serialize;
use tracing::{info, warn};
use validator::Validate;
use warp::http::StatusCode;
use warp::{Filter, Rejection, Reply};

use crate::AppState;

#[derive(Debug)]
struct Unauthorized;
impl warp::reject::Reject for Unauthorized {}

#[derive(Debug)]
struct InvalidPayload(String);
impl warp::reject::Reject for InvalidPayload {}

#[derive(Serialize)]
struct IngestAccepted {
    accepted_tickers: usize,
}

#[derive(Serialize)]
struct ErrorBody {
    error: String,
}

pub fn routes(
    state: Arc<AppState>,
) -> impl Filter<Extract = (impl Reply,), Error = Infallible> + Clone {
    healthz().or(ingest(state)).recover(handle_rejection)
}

fn healthz() -> impl Filter<Extract = (impl Reply,), Error = Rejection> + Clone {
    warp::path("healthz")
        .and(warp::get())
        .map(|| warp::reply::with_status("ok", StatusCode::OK))
}

fn ingest(
    state: Arc<AppState>,
) -> impl Filter<Extract = (impl Reply,), Error = Rejection> + Clone {
    warp::path("ingest")
        .and(warp::post())
        .and(with_state(state.clone()))
        .and(bearer_auth(state.config.ingress.bearer_secret.clone()))
        .and(warp::body::json())
        .and_then(handle_ingest)
}

fn with_state(
    state: Arc<AppState>,
) -> impl Filter<Extract = (Arc<AppState>,), Error = Infallible> + Clone {
    warp::any().map(move || state.clone())
}

fn bearer_auth(expected_secret: String) -> impl Filter<Extract = (), Error = Rejection> + Clone {
    warp::header::<String>("authorization")
        .and_then(move |header: String| {
            let expected = format!("Bearer {expected_secret}");
            async move {
                if header == expected {
                    Ok(())
                } else {
                    Err(warp::reject::custom(Unauthorized))
                }
            }
        })
        .untuple_one()
}

async fn handle_ingest(
    state: Arc<AppState>,
    request: IngestRequest,
) -> Result<impl Reply, Rejection> {
    if let Err(errors) = request.validate() {
        return Err(warp::reject::custom(InvalidPayload(errors.to_string())));
    }

    let accepted = request.tickers.len();
    info!(accepted, "accepted ticker batch");

    for ticker_input in request.tickers {
        let job = ticker_input.into_job(request.callback_url.clone());
        let orchestrator = state.orchestrator.clone();
        let semaphore = state.semaphore.clone();

        tokio::spawn(async move {
            let _permit = match semaphore.acquire_owned().await {
                Ok(permit) => permit,
                Err(_) => {
                    warn!("semaphore closed, dropping ticker run");
                    return;
                }
            };
            orchestrator.run_ticker(job).await;
        });
    }

    Ok(warp::reply::with_status(
        warp::reply::json(&IngestAccepted {
            accepted_tickers: accepted,
        }),
        StatusCode::ACCEPTED,
    ))
}

async fn handle_rejection(rejection: Rejection) -> Result<impl Reply, Infallible> {
    let (status, message) = if rejection.find::<Unauthorized>().is_some() {
        (StatusCode::UNAUTHORIZED, "invalid bearer token".to_string())
    } else if let Some(InvalidPayload(detail)) = rejection.find::<InvalidPayload>() {
        (StatusCode::BAD_REQUEST, detail.clone())
    } else if rejection.is_not_found() {
        (StatusCode::NOT_FOUND, "not found".to_string())
    } else {
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            "internal error".to_string(),
        )
    };

    Ok(warp::reply::with_status(
        warp::reply::json(&ErrorBody { error: message }),
        status,
    ))
}

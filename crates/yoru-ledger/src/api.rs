//! HTTP surface of the transaction store
//!
//! - `GET    /transactions?owner&start&end&limit&cursor`
//! - `POST   /transactions`
//! - `PATCH  /transactions/:id`  (`expectedVersion` guards the write; 409 on mismatch)
//! - `DELETE /transactions/:id`
//!
//! Errors are `{ "error": "<message>" }` with the matching status.

use crate::error::LedgerError;
use crate::record::{NewTransaction, TransactionPatch};
use crate::store::{Query, TransactionStore};
use chrono::NaiveDate;
use serde::Deserialize;
use std::convert::Infallible;
use std::sync::Arc;
use uuid::Uuid;
use warp::http::StatusCode;
use warp::reply::Response;
use warp::{Filter, Rejection, Reply};
use yoru_core::Identity;

/// Query-string parameters of the list route
#[derive(Debug, Deserialize)]
struct ListParams {
    owner: Identity,
    start: NaiveDate,
    end: NaiveDate,
    limit: Option<usize>,
    cursor: Option<String>,
}

/// Body of the update route
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct UpdateBody {
    expected_version: Option<u64>,
    #[serde(flatten)]
    patch: TransactionPatch,
}

/// All transaction routes, with JSON error recovery
pub fn routes(
    store: Arc<TransactionStore>,
) -> impl Filter<Extract = (impl Reply,), Error = Infallible> + Clone {
    let base = || warp::path("transactions");
    let with_store = warp::any().map(move || Arc::clone(&store));

    let list = base()
        .and(warp::path::end())
        .and(warp::get())
        .and(warp::query::<ListParams>())
        .and(with_store.clone())
        .and_then(list_handler);

    let create = base()
        .and(warp::path::end())
        .and(warp::post())
        .and(warp::body::json::<NewTransaction>())
        .and(with_store.clone())
        .and_then(create_handler);

    let update = base()
        .and(warp::path::param::<Uuid>())
        .and(warp::path::end())
        .and(warp::patch())
        .and(warp::body::json::<UpdateBody>())
        .and(with_store.clone())
        .and_then(update_handler);

    let delete = base()
        .and(warp::path::param::<Uuid>())
        .and(warp::path::end())
        .and(warp::delete())
        .and(with_store)
        .and_then(delete_handler);

    list.or(create)
        .or(update)
        .or(delete)
        .recover(handle_rejection)
}

async fn list_handler(params: ListParams, store: Arc<TransactionStore>) -> Result<Response, Infallible> {
    let query = Query {
        owner: params.owner,
        start: params.start,
        end: params.end,
        limit: params.limit,
        cursor: params.cursor,
    };
    Ok(match store.query(&query) {
        Ok(page) => warp::reply::json(&page).into_response(),
        Err(e) => error_reply(&e),
    })
}

async fn create_handler(new: NewTransaction, store: Arc<TransactionStore>) -> Result<Response, Infallible> {
    Ok(match store.create(new) {
        Ok(record) => {
            warp::reply::with_status(warp::reply::json(&record), StatusCode::CREATED).into_response()
        }
        Err(e) => error_reply(&e),
    })
}

async fn update_handler(
    id: Uuid,
    body: UpdateBody,
    store: Arc<TransactionStore>,
) -> Result<Response, Infallible> {
    Ok(match store.update(id, body.patch, body.expected_version) {
        Ok(record) => warp::reply::json(&record).into_response(),
        Err(e) => error_reply(&e),
    })
}

async fn delete_handler(id: Uuid, store: Arc<TransactionStore>) -> Result<Response, Infallible> {
    Ok(match store.delete(id) {
        Ok(_) => StatusCode::NO_CONTENT.into_response(),
        Err(e) => error_reply(&e),
    })
}

fn error_reply(err: &LedgerError) -> Response {
    let status = StatusCode::from_u16(err.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    if status.is_server_error() {
        tracing::error!(error = %err, "transaction request failed");
    }
    json_error(&err.to_string(), status)
}

fn json_error(message: &str, status: StatusCode) -> Response {
    warp::reply::with_status(
        warp::reply::json(&serde_json::json!({ "error": message })),
        status,
    )
    .into_response()
}

async fn handle_rejection(rejection: Rejection) -> Result<Response, Infallible> {
    let (status, message) = if rejection.is_not_found() {
        (StatusCode::NOT_FOUND, "not found".to_string())
    } else if let Some(e) = rejection.find::<warp::reject::InvalidQuery>() {
        (StatusCode::BAD_REQUEST, e.to_string())
    } else if let Some(e) = rejection.find::<warp::filters::body::BodyDeserializeError>() {
        (StatusCode::BAD_REQUEST, e.to_string())
    } else if rejection.find::<warp::reject::MethodNotAllowed>().is_some() {
        (StatusCode::METHOD_NOT_ALLOWED, "method not allowed".to_string())
    } else {
        tracing::warn!(?rejection, "unhandled rejection");
        (StatusCode::INTERNAL_SERVER_ERROR, "internal error".to_string())
    };
    Ok(json_error(&message, status))
}

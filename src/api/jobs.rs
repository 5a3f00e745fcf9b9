use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use serde::Serialize;
use tracing::{error, info};
use uuid::Uuid;

use crate::{
    app::AppState,
    scheduler::JobKind,
    util::time,
};

#[derive(Debug, Serialize)]
struct TriggerResponse {
    run_id: Uuid,
    kind: JobKind,
    status: &'static str,
}

#[derive(Debug, Serialize)]
struct ErrorResponse {
    error: String,
}

/// `POST /v1/jobs/{kind}`: 작업을 백그라운드에서 시작하고 바로 202 를 돌려준다.
pub(crate) async fn trigger(
    State(state): State<AppState>,
    Path(raw_kind): Path<String>,
) -> impl IntoResponse {
    let kind = match raw_kind.parse::<JobKind>() {
        Ok(kind) => kind,
        Err(err) => {
            let body = Json(ErrorResponse {
                error: err.to_string(),
            });
            return (StatusCode::BAD_REQUEST, body).into_response();
        }
    };

    let run_id = Uuid::new_v4();
    let scheduler = state.scheduler().clone();

    tokio::spawn(async move {
        match scheduler.run(run_id, kind, time::now()).await {
            Ok(_) => info!(%run_id, job = kind.as_str(), "manual job completed"),
            Err(error) => error!(%run_id, job = kind.as_str(), error = ?error, "manual job failed"),
        }
    });

    let body = Json(TriggerResponse {
        run_id,
        kind,
        status: "accepted",
    });
    (StatusCode::ACCEPTED, body).into_response()
}

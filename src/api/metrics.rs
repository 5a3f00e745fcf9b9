use axum::{extract::State, http::StatusCode, response::IntoResponse};

use crate::app::AppState;

pub(crate) async fn exporter(State(state): State<AppState>) -> impl IntoResponse {
    (StatusCode::OK, state.telemetry().render_prometheus()).into_response()
}

#[cfg(test)]
mod tests {
    use axum::{
        body::Body,
        http::{Request, StatusCode},
    };
    use tower::ServiceExt;

    use crate::app::{build_router, tests::bare_registry};

    #[tokio::test]
    async fn exporter_renders_digest_metrics() {
        let registry = bare_registry();
        registry.telemetry().metrics().articles_collected.inc_by(3.0);
        let app = build_router(registry);

        let request = Request::get("/metrics").body(Body::empty()).expect("request builds");
        let response = app.oneshot(request).await.expect("request succeeds");
        assert_eq!(response.status(), StatusCode::OK);

        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("body bytes");
        let text = String::from_utf8(bytes.to_vec()).expect("utf-8");
        assert!(text.contains("digest_articles_collected_total 3"));
    }
}

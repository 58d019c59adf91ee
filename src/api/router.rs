//! Report API router.
//!
//! Returns a composable `Router` that can be mounted on any axum server.
//! Routes are nested under `/api/`. CORS is open: the service is called
//! from a browser front end on another origin.

use axum::extract::DefaultBodyLimit;
use axum::routing::{get, post};
use axum::Router;
use tower_http::cors::{Any, CorsLayer};

use crate::api::endpoints;
use crate::api::types::ApiContext;

/// Build the report API router.
///
/// Each upload route carries its own body limit: the multipart route allows
/// the upload cap plus form overhead, the JSON route allows the base64
/// expansion of the same cap.
pub fn report_api_router(ctx: ApiContext) -> Router {
    let routes = Router::new()
        .route("/health", get(endpoints::health::check))
        .route(
            "/simplify",
            post(endpoints::reports::simplify_upload)
                .layer(DefaultBodyLimit::max(ctx.multipart_body_limit())),
        )
        .route(
            "/simplify/json",
            post(endpoints::reports::simplify_json)
                .layer(DefaultBodyLimit::max(ctx.json_body_limit())),
        )
        .with_state(ctx);

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new().nest("/api", routes).layer(cors)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::time::Duration;

    use axum::body::Body;
    use axum::http::{header, Request, StatusCode};
    use axum::response::Response;
    use base64::Engine;
    use http_body_util::BodyExt;
    use tower::ServiceExt;

    use crate::pipeline::guardrail::HALLUCINATED_TESTS_REASON;
    use crate::pipeline::llm::{LlmError, MockLlmClient};
    use crate::pipeline::ocr::{MockOcrEngine, OcrEngine, OcrFailurePolicy};
    use crate::pipeline::orchestrator::PipelineSettings;
    use crate::pipeline::ReportPipeline;

    const BOUNDARY: &str = "labsimplify-test-boundary";
    const HB_TEXT: &str = "Hemoglobin 10 g/dL Low (12-15)";

    const HB_PHASE1: &str = r#"{
        "tests_raw": ["Hemoglobin 10 g/dL Low (12-15)"],
        "tests": [{"name": "Hemoglobin", "fields": {"value": 10, "unit": "g/dL", "status": "low", "ref_range": {"low": 12, "high": 15}}}],
        "confidence": 1.0,
        "normalization_confidence": 0.85,
        "status": "ok"
    }"#;

    const HB_PHASE2: &str = r#"{
        "status": "ok",
        "summary": "Your hemoglobin is slightly below the reference range.",
        "explanations": [{"test": "Hemoglobin", "explanation": "Hemoglobin carries oxygen in the blood."}]
    }"#;

    struct Harness {
        llm: Arc<MockLlmClient>,
        ocr: Arc<MockOcrEngine>,
        app: Router,
    }

    fn harness_with(llm: MockLlmClient, ocr: MockOcrEngine, timeout: Duration, max_upload: usize) -> Harness {
        let llm = Arc::new(llm);
        let ocr = Arc::new(ocr);
        let settings = PipelineSettings {
            model: "openai/gpt-4o-mini".into(),
            timeout,
            ocr_policy: OcrFailurePolicy::Fallback,
        };
        let ocr_engine: Arc<dyn OcrEngine> = ocr.clone();
        let pipeline = ReportPipeline::build(llm.clone(), ocr_engine, &settings);
        let app = report_api_router(ApiContext::new(Arc::new(pipeline), max_upload));
        Harness { llm, ocr, app }
    }

    fn harness(replies: &[&str]) -> Harness {
        harness_with(
            MockLlmClient::new(replies),
            MockOcrEngine::new(HB_TEXT, 0.9),
            Duration::from_secs(5),
            5 * 1024 * 1024,
        )
    }

    /// Hand-built multipart body: text fields then file fields.
    fn multipart_body(text: Option<&str>, file: Option<(&str, &[u8])>) -> Vec<u8> {
        let mut body = Vec::new();
        if let Some(text) = text {
            body.extend_from_slice(
                format!(
                    "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"text\"\r\n\r\n{text}\r\n"
                )
                .as_bytes(),
            );
        }
        if let Some((field, bytes)) = file {
            body.extend_from_slice(
                format!(
                    "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"{field}\"; filename=\"scan.png\"\r\nContent-Type: image/png\r\n\r\n"
                )
                .as_bytes(),
            );
            body.extend_from_slice(bytes);
            body.extend_from_slice(b"\r\n");
        }
        body.extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());
        body
    }

    fn multipart_request(body: Vec<u8>) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri("/api/simplify")
            .header(
                header::CONTENT_TYPE,
                format!("multipart/form-data; boundary={BOUNDARY}"),
            )
            .body(Body::from(body))
            .unwrap()
    }

    fn json_request(body: serde_json::Value) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri("/api/simplify/json")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    async fn body_json(response: Response) -> serde_json::Value {
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        serde_json::from_slice(&bytes).unwrap()
    }

    // ── health ─────────────────────────────────────────────

    #[tokio::test]
    async fn health_returns_ok_and_version() {
        let h = harness(&[]);
        let req = Request::builder().uri("/api/health").body(Body::empty()).unwrap();
        let response = h.app.oneshot(req).await.unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let json = body_json(response).await;
        assert_eq!(json["status"], "ok");
        assert_eq!(json["version"], crate::config::APP_VERSION);
        assert_eq!(h.llm.call_count(), 0);
    }

    #[tokio::test]
    async fn unknown_route_is_404() {
        let h = harness(&[]);
        let req = Request::builder().uri("/api/nope").body(Body::empty()).unwrap();
        let response = h.app.oneshot(req).await.unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn cors_preflight_allows_any_origin() {
        let h = harness(&[]);
        let req = Request::builder()
            .method("OPTIONS")
            .uri("/api/simplify")
            .header(header::ORIGIN, "https://app.example")
            .header(header::ACCESS_CONTROL_REQUEST_METHOD, "POST")
            .body(Body::empty())
            .unwrap();
        let response = h.app.oneshot(req).await.unwrap();

        assert!(response.status().is_success());
        assert_eq!(
            response.headers().get(header::ACCESS_CONTROL_ALLOW_ORIGIN).unwrap(),
            "*"
        );
    }

    // ── multipart route ────────────────────────────────────

    #[tokio::test]
    async fn multipart_text_succeeds() {
        let h = harness(&[HB_PHASE1, HB_PHASE2]);
        let response = h
            .app
            .oneshot(multipart_request(multipart_body(Some(HB_TEXT), None)))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let json = body_json(response).await;
        assert_eq!(json["status"], "ok");
        assert_eq!(json["tests"][0]["name"], "Hemoglobin");
        assert_eq!(json["tests"][0]["fields"]["value"], 10);
        assert_eq!(json["tests"][0]["fields"]["ref_range"], serde_json::json!({"low": 12, "high": 15}));
        assert!(json["summary"].as_str().unwrap().starts_with("Your hemoglobin"));
        assert_eq!(h.llm.call_count(), 2);
        assert_eq!(h.ocr.call_count(), 0);
    }

    #[tokio::test]
    async fn multipart_without_input_is_400() {
        let h = harness(&[HB_PHASE1, HB_PHASE2]);
        let response = h
            .app
            .oneshot(multipart_request(multipart_body(Some("   "), Some(("report", &b""[..])))))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(
            body_json(response).await,
            serde_json::json!({"status": "error", "message": "No input provided"})
        );
        assert_eq!(h.llm.call_count(), 0);
        assert_eq!(h.ocr.call_count(), 0);
    }

    #[tokio::test]
    async fn multipart_image_runs_ocr() {
        let h = harness(&[HB_PHASE1, HB_PHASE2]);
        let png = [0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A, 0, 0];
        let response = h
            .app
            .oneshot(multipart_request(multipart_body(None, Some(("report", &png[..])))))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(h.ocr.call_count(), 1);
        assert!(h.llm.prompts()[0].contains(HB_TEXT));
    }

    #[tokio::test]
    async fn multipart_accepts_image_alias() {
        let h = harness(&[HB_PHASE1, HB_PHASE2]);
        let response = h
            .app
            .oneshot(multipart_request(multipart_body(None, Some(("image", &b"\xFF\xD8\xFF\xE0"[..])))))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(h.ocr.call_count(), 1);
    }

    #[tokio::test]
    async fn oversized_upload_is_413() {
        let h = harness_with(
            MockLlmClient::new(&[HB_PHASE1, HB_PHASE2]),
            MockOcrEngine::new(HB_TEXT, 0.9),
            Duration::from_secs(5),
            16,
        );
        let big = vec![0xAB_u8; 64];
        let response = h
            .app
            .oneshot(multipart_request(multipart_body(None, Some(("report", big.as_slice())))))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
        assert_eq!(body_json(response).await["status"], "error");
        assert_eq!(h.ocr.call_count(), 0);
        assert_eq!(h.llm.call_count(), 0);
    }

    #[tokio::test]
    async fn missing_boundary_is_400() {
        let h = harness(&[]);
        let req = Request::builder()
            .method("POST")
            .uri("/api/simplify")
            .header(header::CONTENT_TYPE, "multipart/form-data")
            .body(Body::from("garbage"))
            .unwrap();
        let response = h.app.oneshot(req).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(body_json(response).await["status"], "error");
    }

    #[tokio::test]
    async fn guardrail_rejection_is_422() {
        let phase1 = r#"{"status": "unprocessed", "reason": "not a medical report"}"#;
        let phase2 = r#"{"status": "unprocessed", "reason": "hallucinated data"}"#;
        let h = harness(&[phase1, phase2]);
        let response = h
            .app
            .oneshot(multipart_request(multipart_body(Some("Dear diary, today was sunny."), None)))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(
            body_json(response).await,
            serde_json::json!({"status": "unprocessed", "reason": HALLUCINATED_TESTS_REASON})
        );
    }

    #[tokio::test]
    async fn upstream_failure_is_500() {
        let llm = MockLlmClient::new(&[]).then_fail(LlmError::Upstream {
            status: 502,
            body: "bad gateway".into(),
        });
        let h = harness_with(llm, MockOcrEngine::new("", 0.0), Duration::from_secs(5), 1024);
        let response = h
            .app
            .oneshot(multipart_request(multipart_body(Some(HB_TEXT), None)))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let json = body_json(response).await;
        assert_eq!(json["status"], "error");
        assert!(json["message"].as_str().unwrap().contains("bad gateway"));
    }

    #[tokio::test]
    async fn upstream_timeout_is_504() {
        let llm = MockLlmClient::new(&[HB_PHASE1]).with_delay(Duration::from_millis(500));
        let h = harness_with(llm, MockOcrEngine::new("", 0.0), Duration::from_millis(20), 1024);
        let response = h
            .app
            .oneshot(multipart_request(multipart_body(Some(HB_TEXT), None)))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::GATEWAY_TIMEOUT);
        assert_eq!(body_json(response).await["status"], "error");
    }

    // ── JSON route ─────────────────────────────────────────

    #[tokio::test]
    async fn json_text_succeeds() {
        let h = harness(&[HB_PHASE1, HB_PHASE2]);
        let response = h
            .app
            .oneshot(json_request(serde_json::json!({ "text": HB_TEXT })))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_json(response).await["tests"][0]["name"], "Hemoglobin");
    }

    #[tokio::test]
    async fn json_data_url_image_runs_ocr() {
        let h = harness(&[HB_PHASE1, HB_PHASE2]);
        let encoded = base64::engine::general_purpose::STANDARD.encode([0xFF, 0xD8, 0xFF, 0xE0, 0x00]);
        let response = h
            .app
            .oneshot(json_request(serde_json::json!({
                "image": format!("data:image/jpeg;base64,{encoded}")
            })))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(h.ocr.call_count(), 1);
    }

    #[tokio::test]
    async fn json_empty_body_is_no_input() {
        let h = harness(&[HB_PHASE1, HB_PHASE2]);
        let response = h
            .app
            .oneshot(json_request(serde_json::json!({ "text": "", "image": "" })))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(body_json(response).await["message"], "No input provided");
        assert_eq!(h.llm.call_count(), 0);
    }

    #[tokio::test]
    async fn json_invalid_base64_is_400() {
        let h = harness(&[]);
        let response = h
            .app
            .oneshot(json_request(serde_json::json!({ "image": "not-valid-base64!!!" })))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert!(body_json(response).await["message"]
            .as_str()
            .unwrap()
            .starts_with("Invalid image data"));
        assert_eq!(h.ocr.call_count(), 0);
    }

    #[tokio::test]
    async fn json_malformed_body_is_400() {
        let h = harness(&[]);
        let req = Request::builder()
            .method("POST")
            .uri("/api/simplify/json")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from("{\"text\": "))
            .unwrap();
        let response = h.app.oneshot(req).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(body_json(response).await["status"], "error");
    }

    #[tokio::test]
    async fn json_oversized_image_is_413() {
        let h = harness_with(
            MockLlmClient::new(&[]),
            MockOcrEngine::new("", 0.0),
            Duration::from_secs(5),
            16,
        );
        let encoded = base64::engine::general_purpose::STANDARD.encode([0u8; 64]);
        let response = h
            .app
            .oneshot(json_request(serde_json::json!({ "image": encoded })))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
    }
}

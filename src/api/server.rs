//! Report API server lifecycle: starts/stops the axum HTTP server.
//!
//! bind → spawn background task → return handle with shutdown channel.

use std::net::SocketAddr;

use serde::{Deserialize, Serialize};
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use uuid::Uuid;

use crate::api::router::report_api_router;
use crate::api::types::ApiContext;

// ═══════════════════════════════════════════════════════════
// Public types
// ═══════════════════════════════════════════════════════════

/// Metadata for a running server.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiSession {
    pub session_id: String,
    pub server_addr: String,
    pub port: u16,
    pub started_at: String,
}

/// Handle to a running API server.
pub struct ApiServer {
    pub session: ApiSession,
    shutdown_tx: Option<oneshot::Sender<()>>,
    task: Option<JoinHandle<()>>,
}

impl ApiServer {
    /// Signal graceful shutdown. Safe to call more than once.
    pub fn shutdown(&mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
            tracing::info!("API server shutdown signal sent");
        }
    }

    /// Shut down and wait for in-flight requests to drain.
    pub async fn stop(mut self) {
        self.shutdown();
        if let Some(task) = self.task.take() {
            if let Err(e) = task.await {
                tracing::error!("API server task failed: {e}");
            }
        }
    }
}

// ═══════════════════════════════════════════════════════════
// Server lifecycle
// ═══════════════════════════════════════════════════════════

/// Bind `addr`, mount `report_api_router` and serve in a background task.
///
/// Port `0` binds an ephemeral port; the chosen one is in the session.
pub async fn start_api_server(ctx: ApiContext, addr: SocketAddr) -> Result<ApiServer, String> {
    // 1. Bind
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|e| format!("Failed to bind API server on {addr}: {e}"))?;

    let addr = listener
        .local_addr()
        .map_err(|e| format!("Failed to get server address: {e}"))?;

    // 2. Build the router
    let app = report_api_router(ctx);

    // 3. Session metadata
    let session = ApiSession {
        session_id: Uuid::new_v4().to_string(),
        server_addr: addr.to_string(),
        port: addr.port(),
        started_at: chrono::Utc::now().to_rfc3339(),
    };

    // 4. Shutdown signal
    let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();

    // 5. Spawn server
    let task = tokio::spawn(async move {
        let shutdown_signal = async move {
            let _ = shutdown_rx.await;
            tracing::info!("API server received shutdown signal");
        };

        tracing::info!(%addr, "API server started");

        if let Err(e) = axum::serve(listener, app)
            .with_graceful_shutdown(shutdown_signal)
            .await
        {
            tracing::error!("API server error: {e}");
        }

        tracing::info!("API server stopped");
    });

    Ok(ApiServer {
        session,
        shutdown_tx: Some(shutdown_tx),
        task: Some(task),
    })
}

// ═══════════════════════════════════════════════════════════
// Tests
// ═══════════════════════════════════════════════════════════

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::{IpAddr, Ipv4Addr};
    use std::sync::Arc;
    use std::time::Duration;

    use crate::pipeline::llm::MockLlmClient;
    use crate::pipeline::ocr::{MockOcrEngine, OcrFailurePolicy};
    use crate::pipeline::orchestrator::PipelineSettings;
    use crate::pipeline::ReportPipeline;

    fn test_ctx(llm: MockLlmClient) -> ApiContext {
        let settings = PipelineSettings {
            model: "openai/gpt-4o-mini".into(),
            timeout: Duration::from_secs(5),
            ocr_policy: OcrFailurePolicy::Fallback,
        };
        let pipeline = ReportPipeline::build(
            Arc::new(llm),
            Arc::new(MockOcrEngine::new("", 0.0)),
            &settings,
        );
        ApiContext::new(Arc::new(pipeline), 1024 * 1024)
    }

    fn localhost() -> SocketAddr {
        SocketAddr::new(IpAddr::V4(Ipv4Addr::LOCALHOST), 0)
    }

    #[tokio::test]
    async fn start_and_stop_server() {
        let server = start_api_server(test_ctx(MockLlmClient::new(&[])), localhost())
            .await
            .expect("server should start");

        assert!(!server.session.session_id.is_empty());
        assert!(server.session.port > 0);

        let url = format!("http://127.0.0.1:{}/api/health", server.session.port);
        let resp = reqwest::get(&url).await.unwrap();
        assert_eq!(resp.status(), reqwest::StatusCode::OK);
        let json: serde_json::Value = resp.json().await.unwrap();
        assert_eq!(json["status"], "ok");

        server.stop().await;
    }

    #[tokio::test]
    async fn serves_json_simplify_over_http() {
        let llm = MockLlmClient::new(&[
            r#"{"status": "ok", "tests": [{"name": "Glucose", "fields": {"value": 92, "unit": "mg/dL"}}], "confidence": 1.0, "normalization_confidence": 0.85}"#,
            r#"{"status": "ok", "summary": "Your glucose is in the usual range.", "explanations": [{"test": "Glucose", "explanation": "Glucose is blood sugar."}]}"#,
        ]);
        let server = start_api_server(test_ctx(llm), localhost()).await.unwrap();

        let url = format!("http://127.0.0.1:{}/api/simplify/json", server.session.port);
        let resp = reqwest::Client::new()
            .post(&url)
            .json(&serde_json::json!({ "text": "Glucose 92 mg/dL" }))
            .send()
            .await
            .unwrap();

        assert_eq!(resp.status(), reqwest::StatusCode::OK);
        let json: serde_json::Value = resp.json().await.unwrap();
        assert_eq!(json["tests"][0]["name"], "Glucose");
        assert_eq!(json["summary"], "Your glucose is in the usual range.");

        server.stop().await;
    }

    #[tokio::test]
    async fn empty_request_is_400_over_http() {
        let server = start_api_server(test_ctx(MockLlmClient::new(&[])), localhost())
            .await
            .unwrap();

        let url = format!("http://127.0.0.1:{}/api/simplify/json", server.session.port);
        let resp = reqwest::Client::new()
            .post(&url)
            .json(&serde_json::json!({}))
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), reqwest::StatusCode::BAD_REQUEST);

        server.stop().await;
    }

    #[tokio::test]
    async fn session_has_valid_metadata() {
        let mut server = start_api_server(test_ctx(MockLlmClient::new(&[])), localhost())
            .await
            .unwrap();

        assert!(chrono::DateTime::parse_from_rfc3339(&server.session.started_at).is_ok());
        assert!(Uuid::parse_str(&server.session.session_id).is_ok());
        assert!(server.session.server_addr.contains(':'));

        server.shutdown();
        server.shutdown();
    }

    #[tokio::test]
    async fn bind_conflict_is_an_error() {
        let server = start_api_server(test_ctx(MockLlmClient::new(&[])), localhost())
            .await
            .unwrap();
        let taken: SocketAddr = server.session.server_addr.parse().unwrap();

        let err = start_api_server(test_ctx(MockLlmClient::new(&[])), taken)
            .await
            .err()
            .expect("second bind should fail");
        assert!(err.contains("Failed to bind"));

        server.stop().await;
    }
}

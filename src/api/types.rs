//! Shared types for the report API layer.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::pipeline::ReportPipeline;

/// Headroom on top of the upload cap for multipart boundaries and the
/// `text` field.
pub const BODY_OVERHEAD_BYTES: usize = 64 * 1024;

// ═══════════════════════════════════════════════════════════
// API context
// ═══════════════════════════════════════════════════════════

/// Shared context for all API routes. Holds no per-request state.
#[derive(Clone)]
pub struct ApiContext {
    pub pipeline: Arc<ReportPipeline>,
    /// Largest accepted image, in decoded bytes.
    pub max_upload_bytes: usize,
}

impl ApiContext {
    pub fn new(pipeline: Arc<ReportPipeline>, max_upload_bytes: usize) -> Self {
        Self {
            pipeline,
            max_upload_bytes,
        }
    }

    /// Body limit for the multipart route.
    pub fn multipart_body_limit(&self) -> usize {
        self.max_upload_bytes.saturating_add(BODY_OVERHEAD_BYTES)
    }

    /// Body limit for the JSON route, where the image travels as base64.
    pub fn json_body_limit(&self) -> usize {
        (self.max_upload_bytes / 3 + 1)
            .saturating_mul(4)
            .saturating_add(BODY_OVERHEAD_BYTES)
    }
}

// ═══════════════════════════════════════════════════════════
// Request / response payloads
// ═══════════════════════════════════════════════════════════

/// `POST /api/simplify/json` body.
#[derive(Debug, Default, Deserialize)]
pub struct SimplifyJsonRequest {
    #[serde(default)]
    pub text: Option<String>,
    /// Raw base64 or a `data:` URL.
    #[serde(default)]
    pub image: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
}

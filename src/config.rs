use std::net::SocketAddr;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use thiserror::Error;

use crate::pipeline::llm::{LlmConfig, DEFAULT_BASE_URL, DEFAULT_MODEL};
use crate::pipeline::ocr::OcrFailurePolicy;
use crate::pipeline::orchestrator::PipelineSettings;

/// Application-level constants
pub const APP_NAME: &str = "labsimplify";
pub const APP_VERSION: &str = env!("CARGO_PKG_VERSION");

pub const DEFAULT_BIND: &str = "0.0.0.0:3000";
pub const DEFAULT_TIMEOUT_SECS: u64 = 60;
pub const DEFAULT_MAX_UPLOAD_BYTES: usize = 5 * 1024 * 1024;
pub const DEFAULT_TESSDATA: &str = "/usr/share/tesseract-ocr/5/tessdata";
pub const DEFAULT_OCR_LANG: &str = "eng";

/// Log filter used when `RUST_LOG` is not set.
pub fn default_log_filter() -> &'static str {
    if cfg!(debug_assertions) {
        "info,labsimplify=debug"
    } else {
        "info"
    }
}

#[derive(Error, Debug, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Missing required environment variable {0}")]
    Missing(&'static str),

    #[error("Invalid value for {var}: {value}")]
    Invalid { var: &'static str, value: String },

    #[error("OCR backend '{0}' requires building with the `ocr` feature")]
    BackendNotCompiled(&'static str),
}

/// Which engine reads uploaded images.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OcrBackend {
    #[default]
    Vision,
    Tesseract,
}

impl OcrBackend {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Vision => "vision",
            Self::Tesseract => "tesseract",
        }
    }
}

impl FromStr for OcrBackend {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "vision" => Ok(Self::Vision),
            "tesseract" => Ok(Self::Tesseract),
            _ => Err(()),
        }
    }
}

/// Process configuration, read once at startup.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub llm: LlmConfig,
    pub model: String,
    pub vision_model: String,
    pub timeout: Duration,
    pub ocr_policy: OcrFailurePolicy,
    pub ocr_backend: OcrBackend,
    pub tessdata_dir: PathBuf,
    pub ocr_lang: String,
    pub bind: SocketAddr,
    pub max_upload_bytes: usize,
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from any key lookup. Blank values count as unset.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let api_key = get("OPENROUTER_API_KEY").ok_or(ConfigError::Missing("OPENROUTER_API_KEY"))?;

        let timeout_secs: u64 = parse_or(&get, "LABSIMPLIFY_TIMEOUT_SECS", DEFAULT_TIMEOUT_SECS)?;
        if timeout_secs == 0 {
            return Err(ConfigError::Invalid {
                var: "LABSIMPLIFY_TIMEOUT_SECS",
                value: "0".into(),
            });
        }
        let timeout = Duration::from_secs(timeout_secs);

        let mut llm = LlmConfig::new(&api_key)
            .with_base_url(&get("LABSIMPLIFY_LLM_BASE_URL").unwrap_or_else(|| DEFAULT_BASE_URL.into()))
            .with_timeout(timeout);
        llm.site_url = get("SITE_URL");
        llm.site_name = get("SITE_NAME");

        let model = get("LABSIMPLIFY_MODEL").unwrap_or_else(|| DEFAULT_MODEL.into());
        let vision_model = get("LABSIMPLIFY_VISION_MODEL").unwrap_or_else(|| model.clone());

        let ocr_policy = match get("LABSIMPLIFY_OCR_POLICY") {
            Some(v) => v.parse().map_err(|_| ConfigError::Invalid {
                var: "LABSIMPLIFY_OCR_POLICY",
                value: v,
            })?,
            None => OcrFailurePolicy::default(),
        };

        let ocr_backend = match get("LABSIMPLIFY_OCR_BACKEND") {
            Some(v) => v.parse().map_err(|_| ConfigError::Invalid {
                var: "LABSIMPLIFY_OCR_BACKEND",
                value: v,
            })?,
            None => OcrBackend::default(),
        };
        if ocr_backend == OcrBackend::Tesseract && !cfg!(feature = "ocr") {
            return Err(ConfigError::BackendNotCompiled("tesseract"));
        }

        Ok(Self {
            llm,
            model,
            vision_model,
            timeout,
            ocr_policy,
            ocr_backend,
            tessdata_dir: PathBuf::from(get("LABSIMPLIFY_TESSDATA").unwrap_or_else(|| DEFAULT_TESSDATA.into())),
            ocr_lang: get("LABSIMPLIFY_OCR_LANG").unwrap_or_else(|| DEFAULT_OCR_LANG.into()),
            bind: parse_or(&get, "LABSIMPLIFY_BIND", parse_default_bind()?)?,
            max_upload_bytes: parse_or(&get, "LABSIMPLIFY_MAX_UPLOAD_BYTES", DEFAULT_MAX_UPLOAD_BYTES)?,
        })
    }

    pub fn pipeline_settings(&self) -> PipelineSettings {
        PipelineSettings {
            model: self.model.clone(),
            timeout: self.timeout,
            ocr_policy: self.ocr_policy,
        }
    }
}

fn parse_or<T: FromStr>(
    get: &impl Fn(&str) -> Option<String>,
    var: &'static str,
    default: T,
) -> Result<T, ConfigError> {
    match get(var) {
        Some(v) => v.parse().map_err(|_| ConfigError::Invalid { var, value: v }),
        None => Ok(default),
    }
}

fn parse_default_bind() -> Result<SocketAddr, ConfigError> {
    DEFAULT_BIND.parse().map_err(|_| ConfigError::Invalid {
        var: "LABSIMPLIFY_BIND",
        value: DEFAULT_BIND.into(),
    })
}

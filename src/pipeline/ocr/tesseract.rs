use std::path::{Path, PathBuf};

use async_trait::async_trait;

use super::types::{OcrEngine, OcrPageResult};
use super::OcrError;

/// libtesseract backend. Only available when compiled with the `ocr` feature.
pub struct BundledTesseract {
    tessdata_dir: PathBuf,
    lang: String,
}

impl BundledTesseract {
    /// Checks that traineddata exists for every language in `lang`
    /// (`eng`, `eng+fra`, ...).
    pub fn new(tessdata_dir: &Path, lang: &str) -> Result<Self, OcrError> {
        for code in lang.split('+').map(str::trim).filter(|c| !c.is_empty()) {
            let file = tessdata_dir.join(format!("{code}.traineddata"));
            if !file.exists() {
                return Err(OcrError::Unavailable(format!(
                    "{code}.traineddata not found in {}",
                    tessdata_dir.display()
                )));
            }
        }

        tracing::info!(tessdata = %tessdata_dir.display(), lang, "Tesseract OCR ready");

        Ok(Self {
            tessdata_dir: tessdata_dir.to_path_buf(),
            lang: lang.to_string(),
        })
    }
}

#[async_trait]
impl OcrEngine for BundledTesseract {
    async fn recognize(&self, image: &[u8]) -> Result<OcrPageResult, OcrError> {
        let tessdata_dir = self.tessdata_dir.clone();
        let lang = self.lang.clone();
        let image = image.to_vec();

        // libtesseract is blocking and CPU-bound
        tokio::task::spawn_blocking(move || run_tesseract(&tessdata_dir, &lang, &image))
            .await
            .map_err(|e| OcrError::Processing(format!("OCR task failed: {e}")))?
    }

    fn name(&self) -> &'static str {
        "tesseract"
    }
}

fn run_tesseract(tessdata_dir: &Path, lang: &str, image: &[u8]) -> Result<OcrPageResult, OcrError> {
    let tessdata = tessdata_dir
        .to_str()
        .ok_or_else(|| OcrError::Init("Invalid tessdata path".into()))?;

    let tess = tesseract::Tesseract::new(Some(tessdata), Some(lang))
        .map_err(|e| OcrError::Init(format!("{e:?}")))?;

    let mut tess = tess
        .set_image_from_mem(image)
        .map_err(|e| OcrError::Processing(format!("{e:?}")))?;

    let text = tess
        .get_text()
        .map_err(|e| OcrError::Processing(format!("{e:?}")))?;

    // mean_text_conf is 0-100, negative when nothing was recognized
    let confidence = tess.mean_text_conf().clamp(0, 100) as f32 / 100.0;

    Ok(OcrPageResult { text, confidence })
}

use crate::config::OcrSection;
use crate::domain::ports::OcrEngine;
use crate::utils::error::{Result, SicilError};
use async_trait::async_trait;
use std::process::Stdio;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;

/// Runs the `tesseract` command line tool, piping the image through stdin.
#[derive(Debug, Clone)]
pub struct TesseractCli {
    binary: String,
    tessdata_dir: Option<String>,
}

impl TesseractCli {
    pub fn new(binary: impl Into<String>, tessdata_dir: Option<String>) -> Self {
        Self {
            binary: binary.into(),
            tessdata_dir,
        }
    }

    pub fn from_config(config: &OcrSection) -> Self {
        Self::new(config.tesseract_binary.clone(), config.tessdata_dir.clone())
    }

    pub async fn is_available(&self) -> bool {
        Command::new(&self.binary)
            .arg("--version")
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .await
            .map(|status| status.success())
            .unwrap_or(false)
    }
}

#[async_trait]
impl OcrEngine for TesseractCli {
    async fn recognize(&self, png: &[u8], languages: &str) -> Result<String> {
        let mut command = Command::new(&self.binary);
        command.arg("stdin").arg("stdout").arg("-l").arg(languages);
        if let Some(dir) = &self.tessdata_dir {
            command.arg("--tessdata-dir").arg(dir);
        }
        command
            .arg("--psm")
            .arg("3")
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());

        let mut child = command.spawn().map_err(|e| SicilError::Ocr {
            message: format!("Failed to run {}: {}", self.binary, e),
        })?;

        if let Some(mut stdin) = child.stdin.take() {
            stdin.write_all(png).await?;
            // 關閉 stdin，tesseract 才會開始處理
            drop(stdin);
        }

        let output = child.wait_with_output().await?;
        if !output.status.success() {
            return Err(SicilError::Ocr {
                message: format!(
                    "tesseract exited with {}: {}",
                    output.status,
                    String::from_utf8_lossy(&output.stderr).trim()
                ),
            });
        }

        Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_missing_binary_is_ocr_error() {
        let engine = TesseractCli::new("definitely-not-a-tesseract-binary", None);

        assert!(!engine.is_available().await);
        let err = engine.recognize(&[0u8; 4], "eng").await.unwrap_err();
        assert!(matches!(err, SicilError::Ocr { .. }));
    }

    #[test]
    fn test_from_config_uses_binary_and_tessdata() {
        let config = OcrSection {
            tessdata_dir: Some("/opt/tessdata".to_string()),
            ..OcrSection::default()
        };
        let engine = TesseractCli::from_config(&config);
        assert_eq!(engine.binary, "tesseract");
        assert_eq!(engine.tessdata_dir.as_deref(), Some("/opt/tessdata"));
    }
}

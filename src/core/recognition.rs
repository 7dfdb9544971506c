use crate::domain::ports::OcrEngine;
use crate::utils::error::Result;
use once_cell::sync::Lazy;
use std::io::Cursor;
use tokio::sync::Mutex;

/// The recognition engine keeps internal state and is not safe to run
/// concurrently, so every call in the process goes through this lock.
/// Network I/O around it stays parallel.
static RECOGNITION_LOCK: Lazy<Mutex<()>> = Lazy::new(|| Mutex::new(()));

pub async fn recognize_exclusive(engine: &dyn OcrEngine, png: &[u8], languages: &str) -> Result<String> {
    let _guard = RECOGNITION_LOCK.lock().await;
    engine.recognize(png, languages).await
}

/// 轉為灰階 PNG；驗證碼雜訊多，灰階後辨識率明顯較好
pub fn to_grayscale_png(image_bytes: &[u8]) -> Result<Vec<u8>> {
    let gray = image::load_from_memory(image_bytes)?.grayscale();
    let mut png = Vec::new();
    gray.write_to(&mut Cursor::new(&mut png), image::ImageFormat::Png)?;
    Ok(png)
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use async_trait::async_trait;
    use parking_lot::Mutex as SyncMutex;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    /// OCR engine returning canned text and recording how it was used.
    #[derive(Default)]
    pub struct ScriptedOcr {
        pub responses: SyncMutex<Vec<String>>,
        pub calls: AtomicUsize,
        pub active: AtomicUsize,
        pub max_active: AtomicUsize,
        pub languages: SyncMutex<Vec<String>>,
        pub delay_ms: u64,
    }

    impl ScriptedOcr {
        pub fn returning(texts: &[&str]) -> Self {
            Self {
                responses: SyncMutex::new(texts.iter().rev().map(|t| t.to_string()).collect()),
                ..Self::default()
            }
        }

        pub fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl OcrEngine for ScriptedOcr {
        async fn recognize(&self, _png: &[u8], languages: &str) -> Result<String> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let now_active = self.active.fetch_add(1, Ordering::SeqCst) + 1;
            self.max_active.fetch_max(now_active, Ordering::SeqCst);
            self.languages.lock().push(languages.to_string());

            if self.delay_ms > 0 {
                tokio::time::sleep(Duration::from_millis(self.delay_ms)).await;
            }

            self.active.fetch_sub(1, Ordering::SeqCst);
            Ok(self.responses.lock().pop().unwrap_or_default())
        }
    }

    /// A tiny valid PNG.
    pub fn sample_png() -> Vec<u8> {
        let image = image::RgbImage::from_pixel(8, 4, image::Rgb([200, 30, 30]));
        let mut png = Vec::new();
        image::DynamicImage::ImageRgb8(image)
            .write_to(&mut Cursor::new(&mut png), image::ImageFormat::Png)
            .unwrap();
        png
    }
}

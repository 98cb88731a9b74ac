use std::io::Cursor;

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use image::codecs::jpeg::JpegEncoder;
use image::imageops::FilterType;
use image::GenericImageView;

use crate::ai::InlinePart;
use crate::error::Result;
use crate::models::MediaBlob;

/// Longest edge allowed after re-encoding. Keeps request payloads bounded.
pub const MAX_EDGE_PX: u32 = 1200;

const JPEG_QUALITY: u8 = 80;

/// Re-encode a photo down to a bounded size, preserving aspect ratio.
/// Images already inside the bound are still transcoded to JPEG so the
/// payload quality is uniform.
pub fn optimize_image(blob: &MediaBlob) -> Result<MediaBlob> {
    let img = image::load_from_memory(&blob.bytes)?;

    let (w, h) = img.dimensions();
    let img = if w > MAX_EDGE_PX || h > MAX_EDGE_PX {
        img.resize(MAX_EDGE_PX, MAX_EDGE_PX, FilterType::Lanczos3)
    } else {
        img
    };

    let mut out = Cursor::new(Vec::new());
    let encoder = JpegEncoder::new_with_quality(&mut out, JPEG_QUALITY);
    img.write_with_encoder(encoder)?;

    Ok(MediaBlob::new(out.into_inner(), "image/jpeg"))
}

/// Optimize a batch of photos concurrently. Output order matches input
/// order regardless of completion order. An item that fails to re-encode is
/// passed through unmodified: an oversized-but-valid capture beats losing
/// the user's photo.
pub async fn optimize_images(images: Vec<MediaBlob>) -> Vec<MediaBlob> {
    let tasks = images.into_iter().map(|blob| {
        // Held outside the task so even a panicking re-encode cannot lose
        // the capture or shift later items out of position.
        let fallback = blob.clone();
        let task = tokio::task::spawn_blocking(move || match optimize_image(&blob) {
            Ok(optimized) => {
                tracing::debug!(
                    "Optimized image: {} -> {} bytes",
                    blob.bytes.len(),
                    optimized.bytes.len()
                );
                optimized
            }
            Err(e) => {
                tracing::warn!("Image optimization failed, using original: {}", e);
                blob
            }
        });
        async move {
            match task.await {
                Ok(optimized) => optimized,
                Err(e) => {
                    tracing::error!("Image optimization task panicked, using original: {}", e);
                    fallback
                }
            }
        }
    });

    futures::future::join_all(tasks).await
}

/// Base64-encode a blob for transport as an inline request part.
pub fn to_attachment(blob: &MediaBlob) -> InlinePart {
    InlinePart {
        mime_type: blob.mime_type.clone(),
        data: BASE64.encode(&blob.bytes),
    }
}

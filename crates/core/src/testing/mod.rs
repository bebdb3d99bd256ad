//! Testing utilities and mock implementations.
//!
//! This module provides a scriptable mock codec engine and image fixtures,
//! allowing the whole intake → batch run → download flow to be exercised
//! without an ffmpeg binary.
//!
//! # Example
//!
//! ```rust,ignore
//! use stillreel_core::testing::{fixtures, MockEngine};
//!
//! let engine = MockEngine::new();
//! engine.set_conversion_duration_ms(50);
//! engine.set_progress_steps(vec![10.0, 60.0]).await;
//!
//! let adapter = Arc::new(EngineAdapter::new(Arc::new(engine.clone()), ConversionParams::vertical(5.0)));
//! intake.accept(vec![IncomingFile::new("a.jpg", Some("image/jpeg"), fixtures::jpeg_bytes(1024))]);
//! ```

mod mock_engine;

pub use mock_engine::{MockEngine, RecordedConversion, MOCK_OUTPUT};

/// Test fixtures and helper functions.
pub mod fixtures {
    use bytes::Bytes;
    use image::{ImageFormat, Rgb, RgbImage};
    use std::io::Cursor;

    /// JPEG start-of-image marker followed by an APP0 segment header.
    const JPEG_HEADER: &[u8] = &[0xFF, 0xD8, 0xFF, 0xE0, 0x00, 0x10, b'J', b'F', b'I', b'F', 0x00];

    /// A payload of exactly `len` bytes whose signature reads as JPEG.
    ///
    /// Not decodable; use it where only size and type matter.
    pub fn jpeg_bytes(len: usize) -> Bytes {
        let mut data = vec![0u8; len.max(JPEG_HEADER.len())];
        data[..JPEG_HEADER.len()].copy_from_slice(JPEG_HEADER);
        data.truncate(len.max(JPEG_HEADER.len()));
        Bytes::from(data)
    }

    /// A small, fully decodable landscape PNG.
    pub fn png_bytes() -> Bytes {
        encoded_image(64, 36, ImageFormat::Png)
    }

    /// A decodable image of the given size and format.
    pub fn encoded_image(width: u32, height: u32, format: ImageFormat) -> Bytes {
        let img = RgbImage::from_fn(width, height, |x, y| {
            Rgb([(x * 4 % 256) as u8, (y * 4 % 256) as u8, 128])
        });
        let mut out = Cursor::new(Vec::new());
        img.write_to(&mut out, format)
            .expect("encoding an in-memory image should not fail");
        Bytes::from(out.into_inner())
    }
}

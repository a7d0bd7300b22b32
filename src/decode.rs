use image::ImageReader;
use std::io::Cursor;

/// Capability that scans one frame for a machine-readable tag.
///
/// Returns at most one decoded text payload per frame; additional tags in
/// the same frame are ignored.
pub trait TagDecoder: Send {
    fn decode(&self, jpeg_data: &[u8]) -> Result<Option<String>, DecodeError>;
}

#[derive(Debug, thiserror::Error)]
pub enum DecodeError {
    #[error("failed to decode image: {0}")]
    Image(String),
    #[error("failed to decode tag content: {0}")]
    Tag(String),
}

/// QR decoder backed by rqrr, operating on in-memory frames.
pub struct QrTagDecoder;

impl TagDecoder for QrTagDecoder {
    fn decode(&self, jpeg_data: &[u8]) -> Result<Option<String>, DecodeError> {
        let img = ImageReader::new(Cursor::new(jpeg_data))
            .with_guessed_format()
            .map_err(|e| DecodeError::Image(e.to_string()))?
            .decode()
            .map_err(|e| DecodeError::Image(e.to_string()))?;

        let luma = img.to_luma8();
        let (width, height) = luma.dimensions();
        let mut prepared =
            rqrr::PreparedImage::prepare_from_greyscale(width as usize, height as usize, |x, y| {
                luma.get_pixel(x as u32, y as u32).0[0]
            });

        match prepared.detect_grids().first() {
            Some(grid) => {
                let (_meta, content) = grid.decode().map_err(|e| DecodeError::Tag(e.to_string()))?;
                Ok(Some(content))
            }
            None => Ok(None),
        }
    }
}

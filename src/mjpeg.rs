use async_trait::async_trait;
use bytes::{Bytes, BytesMut};
use futures_util::{Stream, StreamExt};
use std::pin::Pin;
use std::time::Duration;
use tracing::{info, warn};

use crate::frame::Frame;
use crate::source::{StreamConnection, StreamError, VideoSource};

const BOUNDARY: &[u8] = b"--frame\r\n";
const HEADER_END: &[u8] = b"\r\n\r\n";
const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);
/// A part larger than this is corrupt; drop the buffer and resynchronize.
const MAX_PART_BYTES: usize = 5 * 1024 * 1024;

/// Parse state for the MJPEG multipart stream.
enum ParseState {
    /// Looking for the boundary marker `--frame\r\n`.
    SeekingBoundary,
    /// Found boundary, now looking for end of headers `\r\n\r\n`.
    SeekingHeaderEnd,
    /// Collecting JPEG bytes until the next boundary.
    CollectingJpeg,
}

/// Incremental parser for `multipart/x-mixed-replace` MJPEG bodies.
///
/// Fed raw chunks as they arrive off the wire; yields one complete JPEG per
/// finished part. A boundary may span chunk borders, so a tail of unparsed
/// bytes is retained between calls.
struct MultipartParser {
    buffer: BytesMut,
    state: ParseState,
    jpeg_start: usize,
}

impl MultipartParser {
    fn new() -> Self {
        Self {
            buffer: BytesMut::with_capacity(256 * 1024),
            state: ParseState::SeekingBoundary,
            jpeg_start: 0,
        }
    }

    fn push(&mut self, chunk: &[u8]) {
        self.buffer.extend_from_slice(chunk);
    }

    /// Extract the next complete JPEG, or `None` if more bytes are needed.
    fn next_jpeg(&mut self) -> Option<Vec<u8>> {
        loop {
            match self.state {
                ParseState::SeekingBoundary => {
                    if let Some(pos) = find_subsequence(&self.buffer, BOUNDARY) {
                        // Discard everything up to and including the boundary
                        let _ = self.buffer.split_to(pos + BOUNDARY.len());
                        self.state = ParseState::SeekingHeaderEnd;
                    } else {
                        // Keep last few bytes in case boundary spans chunks
                        if self.buffer.len() > BOUNDARY.len() {
                            let _ = self.buffer.split_to(self.buffer.len() - BOUNDARY.len());
                        }
                        return None;
                    }
                }
                ParseState::SeekingHeaderEnd => {
                    if let Some(pos) = find_subsequence(&self.buffer, HEADER_END) {
                        // Discard headers
                        let _ = self.buffer.split_to(pos + HEADER_END.len());
                        self.jpeg_start = 0;
                        self.state = ParseState::CollectingJpeg;
                    } else {
                        return None;
                    }
                }
                ParseState::CollectingJpeg => {
                    // Look for the next boundary to know where the JPEG ends
                    if let Some(pos) = find_subsequence(&self.buffer[self.jpeg_start..], BOUNDARY) {
                        let jpeg_end = self.jpeg_start + pos;
                        // Strip trailing \r\n before the boundary
                        let end = if jpeg_end >= 2
                            && self.buffer[jpeg_end - 2] == b'\r'
                            && self.buffer[jpeg_end - 1] == b'\n'
                        {
                            jpeg_end - 2
                        } else {
                            jpeg_end
                        };

                        let jpeg = self.buffer[..end].to_vec();

                        // Advance past the boundary
                        let _ = self.buffer.split_to(jpeg_end + BOUNDARY.len());
                        self.jpeg_start = 0;
                        self.state = ParseState::SeekingHeaderEnd;

                        if !jpeg.is_empty() {
                            return Some(jpeg);
                        }
                    } else {
                        if self.buffer.len() > MAX_PART_BYTES {
                            warn!(bytes = self.buffer.len(), "oversized part, resynchronizing");
                            self.buffer.clear();
                            self.jpeg_start = 0;
                            self.state = ParseState::SeekingBoundary;
                            return None;
                        }
                        // No boundary yet; remember where to resume scanning
                        self.jpeg_start = if self.buffer.len() > BOUNDARY.len() {
                            self.buffer.len() - BOUNDARY.len()
                        } else {
                            0
                        };
                        return None;
                    }
                }
            }
        }
    }
}

/// Camera source speaking MJPEG over HTTP.
///
/// Most IP cameras and the ESP32-class boards expose a
/// `multipart/x-mixed-replace` endpoint; anything else belongs behind its
/// own [`VideoSource`] implementation.
pub struct MjpegSource {
    client: reqwest::Client,
}

impl MjpegSource {
    pub fn new() -> Result<Self, StreamError> {
        let client = reqwest::Client::builder()
            .connect_timeout(CONNECT_TIMEOUT)
            .build()
            .map_err(|e| StreamError::Connect(e.to_string()))?;
        Ok(Self { client })
    }
}

#[async_trait]
impl VideoSource for MjpegSource {
    async fn open(&self, url: &str) -> Result<Box<dyn StreamConnection>, StreamError> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| StreamError::Connect(e.to_string()))?;

        if !response.status().is_success() {
            return Err(StreamError::Status(response.status().as_u16()));
        }

        info!(status = %response.status(), "connected to MJPEG stream");

        Ok(Box::new(MjpegConnection {
            byte_stream: Box::pin(response.bytes_stream()),
            parser: MultipartParser::new(),
        }))
    }
}

struct MjpegConnection {
    byte_stream: Pin<Box<dyn Stream<Item = Result<Bytes, reqwest::Error>> + Send>>,
    parser: MultipartParser,
}

#[async_trait]
impl StreamConnection for MjpegConnection {
    async fn read_frame(&mut self) -> Result<Option<Frame>, StreamError> {
        loop {
            if let Some(jpeg) = self.parser.next_jpeg() {
                return Ok(Some(Frame::capture(jpeg)));
            }
            match self.byte_stream.next().await {
                Some(Ok(chunk)) => self.parser.push(&chunk),
                Some(Err(e)) => return Err(StreamError::Read(e.to_string())),
                None => return Ok(None),
            }
        }
    }
}

/// Find the position of `needle` in `haystack`.
fn find_subsequence(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack
        .windows(needle.len())
        .position(|window| window == needle)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn part(jpeg: &[u8]) -> Vec<u8> {
        let mut body = Vec::new();
        body.extend_from_slice(BOUNDARY);
        body.extend_from_slice(b"Content-Type: image/jpeg\r\nContent-Length: 4\r\n\r\n");
        body.extend_from_slice(jpeg);
        body.extend_from_slice(b"\r\n");
        body
    }

    #[test]
    fn parses_single_part() {
        let mut parser = MultipartParser::new();
        let mut body = part(b"\xFF\xD8\xAA\xD9");
        body.extend_from_slice(BOUNDARY); // terminating boundary of the part

        parser.push(&body);
        assert_eq!(parser.next_jpeg().unwrap(), b"\xFF\xD8\xAA\xD9");
        assert!(parser.next_jpeg().is_none());
    }

    #[test]
    fn parses_consecutive_parts_from_one_chunk() {
        let mut parser = MultipartParser::new();
        let mut body = part(b"\xFF\xD8\x01\xD9");
        body.extend_from_slice(&part(b"\xFF\xD8\x02\xD9"));
        body.extend_from_slice(BOUNDARY);

        parser.push(&body);
        assert_eq!(parser.next_jpeg().unwrap(), b"\xFF\xD8\x01\xD9");
        assert_eq!(parser.next_jpeg().unwrap(), b"\xFF\xD8\x02\xD9");
        assert!(parser.next_jpeg().is_none());
    }

    #[test]
    fn incomplete_part_yields_nothing() {
        let mut parser = MultipartParser::new();
        // Part body present but no terminating boundary yet
        parser.push(&part(b"\xFF\xD8\xAA\xD9"));
        assert!(parser.next_jpeg().is_none());
    }

    #[test]
    fn reassembles_across_chunk_borders() {
        let mut body = part(b"\xFF\xD8\xAA\xD9");
        body.extend_from_slice(BOUNDARY);

        // Feed one byte at a time; the boundary spans every possible border
        let mut parser = MultipartParser::new();
        let mut frames = Vec::new();
        for byte in body {
            parser.push(&[byte]);
            while let Some(jpeg) = parser.next_jpeg() {
                frames.push(jpeg);
            }
        }
        assert_eq!(frames, vec![b"\xFF\xD8\xAA\xD9".to_vec()]);
    }

    #[test]
    fn strips_trailing_crlf_before_boundary() {
        let mut parser = MultipartParser::new();
        let mut body = Vec::new();
        body.extend_from_slice(BOUNDARY);
        body.extend_from_slice(b"\r\n\r\n"); // empty headers
        body.extend_from_slice(b"\xFF\xD8\xD9");
        body.extend_from_slice(b"\r\n");
        body.extend_from_slice(BOUNDARY);

        parser.push(&body);
        assert_eq!(parser.next_jpeg().unwrap(), b"\xFF\xD8\xD9");
    }

    #[test]
    fn garbage_before_first_boundary_is_discarded() {
        let mut parser = MultipartParser::new();
        let mut body = b"HTTP noise that is not a boundary".to_vec();
        body.extend_from_slice(&part(b"\xFF\xD8\xAA\xD9"));
        body.extend_from_slice(BOUNDARY);

        parser.push(&body);
        assert_eq!(parser.next_jpeg().unwrap(), b"\xFF\xD8\xAA\xD9");
    }

    #[test]
    fn oversized_part_resynchronizes() {
        let mut parser = MultipartParser::new();
        let mut body = Vec::new();
        body.extend_from_slice(BOUNDARY);
        body.extend_from_slice(b"\r\n\r\n");
        body.extend_from_slice(&vec![0xAB; MAX_PART_BYTES + 1]);
        parser.push(&body);
        assert!(parser.next_jpeg().is_none());

        // Parser recovers on the next well-formed part
        let mut rest = part(b"\xFF\xD8\xAA\xD9");
        rest.extend_from_slice(BOUNDARY);
        parser.push(&rest);
        assert_eq!(parser.next_jpeg().unwrap(), b"\xFF\xD8\xAA\xD9");
    }
}

//! Transport seam
//!
//! The client needs exactly one thing from the outside world: "open a
//! long-lived stream of frames to this URL". `Transport` is that seam.
//! `HttpTransport` is the shipped implementation - a streaming HTTP GET
//! with `Accept: text/event-stream`, its body fed through the incremental
//! frame decoder. Tests drive the client through scripted transports
//! instead.

use std::pin::Pin;
use std::task::{Context, Poll};

use async_trait::async_trait;
use futures_util::Stream;
use reqwest::header;

use relay_protocol::{Frame, FrameDecoder};

use crate::error::ClientError;

/// A stream of decoded frames off one open transport
pub type FrameStream = Pin<Box<dyn Stream<Item = Result<Frame, ClientError>> + Send>>;

/// Something that can open a long-lived frame stream
#[async_trait]
pub trait Transport: Send + Sync {
    /// Open the stream; resolves once the connection is established
    async fn open(&self, url: &str) -> Result<FrameStream, ClientError>;
}

/// HTTP transport over a streaming response body
#[derive(Debug, Clone, Default)]
pub struct HttpTransport {
    client: reqwest::Client,
}

impl HttpTransport {
    /// Create a transport with a fresh HTTP client
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn open(&self, url: &str) -> Result<FrameStream, ClientError> {
        let response = self
            .client
            .get(url)
            .header(header::ACCEPT, "text/event-stream")
            .send()
            .await?
            .error_for_status()?;

        Ok(Box::pin(SseBody::new(response)))
    }
}

/// Adapter: raw response chunks in, decoded frames out
struct SseBody {
    chunks: Pin<Box<dyn Stream<Item = reqwest::Result<bytes::Bytes>> + Send>>,
    decoder: FrameDecoder,
    done: bool,
}

impl SseBody {
    fn new(response: reqwest::Response) -> Self {
        Self {
            chunks: Box::pin(response.bytes_stream()),
            decoder: FrameDecoder::new(),
            done: false,
        }
    }
}

impl Stream for SseBody {
    type Item = Result<Frame, ClientError>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        loop {
            if let Some(frame) = self.decoder.next_frame() {
                return Poll::Ready(Some(Ok(frame)));
            }
            if self.done {
                return Poll::Ready(None);
            }

            match self.chunks.as_mut().poll_next(cx) {
                Poll::Ready(Some(Ok(chunk))) => self.decoder.feed(&chunk),
                Poll::Ready(Some(Err(e))) => {
                    self.done = true;
                    return Poll::Ready(Some(Err(e.into())));
                }
                Poll::Ready(None) => self.done = true,
                Poll::Pending => return Poll::Pending,
            }
        }
    }
}

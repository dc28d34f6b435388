//! TCP protocol between the counter server and its consumer (the web layer).
//!
//! Length-delimited frames, each a bincode-encoded message.

use anyhow::Context;
use bytes::Bytes;
use futures::{Sink, SinkExt, StreamExt};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio_util::codec::{Framed, LengthDelimitedCodec};

use crate::session::SessionStatus;

/// Maximum frame size (JPEG frames included)
pub const MAX_FRAME_LENGTH: usize = 16 * 1024 * 1024;

/// Consumer → server
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub enum ClientMessage {
    /// Measure leg factor on the next frame
    Calibrate,
    /// Zero the counts
    Reset,
    /// Switch to a new camera index or video path and start counting from zero
    OpenSource { source: String },
}

/// Server → consumer
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub enum ServerMessage {
    Hello { version: String, dual: bool },
    Status(SessionStatus),
    Frame(EncodedFrame),
    /// Capture source exhausted (end of file / camera disconnect)
    SourceEnded,
    Error { message: String },
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct EncodedFrame {
    pub frame_index: u64,
    pub width: u16,
    pub height: u16,
    pub jpeg_data: Vec<u8>,
}

impl EncodedFrame {
    /// Fails when the image size does not fit the 16-bit header fields.
    pub fn new(frame_index: u64, width: i32, height: i32, jpeg_data: Vec<u8>) -> anyhow::Result<Self> {
        let width = u16::try_from(width).with_context(|| format!("frame width {} out of range", width))?;
        let height = u16::try_from(height).with_context(|| format!("frame height {} out of range", height))?;
        Ok(Self {
            frame_index,
            width,
            height,
            jpeg_data,
        })
    }
}

pub type MessageStream<T> = Framed<T, LengthDelimitedCodec>;

/// Create a framed message stream with length-delimited framing.
pub fn message_stream<T: AsyncRead + AsyncWrite>(stream: T) -> MessageStream<T> {
    let codec = LengthDelimitedCodec::builder()
        .max_frame_length(MAX_FRAME_LENGTH)
        .new_codec();
    Framed::new(stream, codec)
}

/// Send a serializable message (bincode + length prefix).
pub async fn send_message<T, M>(stream: &mut MessageStream<T>, msg: &M) -> anyhow::Result<()>
where
    T: AsyncRead + AsyncWrite + Unpin,
    M: Serialize,
{
    send_to_sink(stream, msg).await
}

/// Send through any byte sink, e.g. the write half of a split stream.
pub async fn send_to_sink<S, M>(sink: &mut S, msg: &M) -> anyhow::Result<()>
where
    S: Sink<Bytes, Error = std::io::Error> + Unpin,
    M: Serialize,
{
    let data = bincode::serialize(msg)?;
    sink.send(Bytes::from(data)).await?;
    Ok(())
}

/// Receive and deserialize a message. `None` when the peer closed cleanly.
pub async fn recv_message<T, M>(stream: &mut MessageStream<T>) -> anyhow::Result<Option<M>>
where
    T: AsyncRead + AsyncWrite + Unpin,
    M: DeserializeOwned,
{
    match stream.next().await {
        Some(Ok(bytes)) => Ok(Some(bincode::deserialize(&bytes)?)),
        Some(Err(e)) => Err(e.into()),
        None => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::{PersonStatus, SessionMetrics, TrackingStatus};
    use crate::tracker::{Stage, TrackerSnapshot};

    #[tokio::test]
    async fn test_status_over_duplex() {
        let (a, b) = tokio::io::duplex(4096);
        let mut server = message_stream(a);
        let mut client = message_stream(b);

        let status = SessionStatus {
            frame_index: 42,
            metrics: SessionMetrics {
                fps: 30.0,
                calibration_requested: true,
            },
            tracking: TrackingStatus::Dual {
                left: PersonStatus {
                    snapshot: TrackerSnapshot {
                        count: 7,
                        stage: Stage::Up,
                        calibrated: true,
                    },
                    missing_streak: 0,
                },
                right: PersonStatus::default(),
            },
        };
        send_message(&mut server, &ServerMessage::Status(status.clone())).await.unwrap();
        send_message(&mut client, &ClientMessage::OpenSource { source: "clip.mp4".into() })
            .await
            .unwrap();

        let got: Option<ServerMessage> = recv_message(&mut client).await.unwrap();
        assert_eq!(got, Some(ServerMessage::Status(status)));
        let got: Option<ClientMessage> = recv_message(&mut server).await.unwrap();
        assert_eq!(got, Some(ClientMessage::OpenSource { source: "clip.mp4".into() }));
    }

    #[test]
    fn test_encoded_frame_size_checked() {
        let frame = EncodedFrame::new(3, 1920, 1080, vec![0xff, 0xd8]).unwrap();
        assert_eq!((frame.width, frame.height), (1920, 1080));
        assert!(EncodedFrame::new(3, 70_000, 1080, Vec::new()).is_err());
        assert!(EncodedFrame::new(3, 640, -1, Vec::new()).is_err());
    }

    #[tokio::test]
    async fn test_closed_peer() {
        let (a, b) = tokio::io::duplex(64);
        let mut client = message_stream(b);
        drop(a);
        let got: Option<ClientMessage> = recv_message(&mut client).await.unwrap();
        assert!(got.is_none());
    }
}

//! TCP protocol between a capture client and the trainer server.
//!
//! Length-delimited frames carrying bincode-encoded messages.

use bytes::Bytes;
use futures::stream::SplitSink;
use futures::{SinkExt, StreamExt};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use tokio::net::TcpStream;
use tokio_util::codec::{Framed, LengthDelimitedCodec};

use crate::biomechanics::{BiometricResult, ExerciseKind};
use crate::capability::{Capabilities, DeviceMode, ThermalState};
use crate::fusion::DepthMap;
use crate::pipeline::FrameInput;
use crate::pose::PoseEstimate;
use crate::session::SessionSummary;

// --- Message types ---

/// Client → server
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub enum ClientMessage {
    /// Opens a session. Must be the first message on a connection.
    Hello {
        capabilities: Capabilities,
        /// `None` selects the server's configured exercise.
        exercise: Option<ExerciseKind>,
    },
    Frame {
        timestamp: f64,
        joints: PoseEstimate,
        depth: Option<DepthMap>,
    },
    Thermal {
        state: ThermalState,
    },
    EndSession,
}

impl ClientMessage {
    /// The frame payload, if this is a `Frame`.
    pub fn into_frame(self) -> Option<FrameInput> {
        match self {
            ClientMessage::Frame {
                timestamp,
                joints,
                depth,
            } => Some(FrameInput {
                timestamp,
                joints,
                depth,
            }),
            _ => None,
        }
    }
}

impl From<FrameInput> for ClientMessage {
    fn from(frame: FrameInput) -> Self {
        ClientMessage::Frame {
            timestamp: frame.timestamp,
            joints: frame.joints,
            depth: frame.depth,
        }
    }
}

/// Server → client
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub enum ServerMessage {
    Ready { mode: DeviceMode },
    Result { result: BiometricResult },
    /// The frame arrived while another was in flight.
    Dropped { timestamp: f64 },
    ModeChanged { mode: DeviceMode, thermal_warning: bool },
    Summary { summary: SessionSummary },
}

// --- TCP codec helpers ---

pub type MessageStream = Framed<TcpStream, LengthDelimitedCodec>;
pub type MessageSink = SplitSink<MessageStream, Bytes>;

/// Create a framed message stream with length-delimited framing.
pub fn message_stream(stream: TcpStream) -> MessageStream {
    let codec = LengthDelimitedCodec::builder()
        .max_frame_length(16 * 1024 * 1024) // depth maps are the largest payload
        .new_codec();
    Framed::new(stream, codec)
}

/// Send a serializable message (bincode + length prefix).
pub async fn send_message<T: Serialize>(
    stream: &mut MessageStream,
    msg: &T,
) -> anyhow::Result<()> {
    let data = bincode::serialize(msg)?;
    stream.send(Bytes::from(data)).await?;
    Ok(())
}

/// Send on the write half of a split stream.
pub async fn send_to_sink<T: Serialize>(sink: &mut MessageSink, msg: &T) -> anyhow::Result<()> {
    let data = bincode::serialize(msg)?;
    sink.send(Bytes::from(data)).await?;
    Ok(())
}

/// Decode one frame read from the read half of a split stream.
pub fn decode_message<T: DeserializeOwned>(bytes: &[u8]) -> anyhow::Result<T> {
    Ok(bincode::deserialize(bytes)?)
}

/// Receive and deserialize a message.
pub async fn recv_message<T: DeserializeOwned>(
    stream: &mut MessageStream,
) -> anyhow::Result<T> {
    match stream.next().await {
        Some(Ok(bytes)) => decode_message(&bytes),
        Some(Err(e)) => Err(e.into()),
        None => Err(anyhow::anyhow!("connection closed")),
    }
}

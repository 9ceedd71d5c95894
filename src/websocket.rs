use async_trait::async_trait;
use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use serde::de::DeserializeOwned;
use tokio::net::TcpStream;
use tokio::sync::mpsc::Receiver as GatewaySinkReceiver;
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};
use tracing::{debug, error, trace};

use crate::error::{Error, Result};
use crate::gateway::GatewayCommand;

/// Type Alias which shortens the websocket connected to the Discord Gateway.
pub type GatewayWebSocket = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Type Alias which shortens the Split Stream from the Discord Gateway websocket.
pub type ReadSplitStream = SplitStream<GatewayWebSocket>;

/// Type Alias which shortens the Split Sink from the Discord Gateway websocket.
pub type WriteSplitSink = SplitSink<GatewayWebSocket, Message>;

/// What the writer task of a connection can be asked to do.
#[derive(Debug)]
pub(crate) enum Outbound {
    Command(GatewayCommand),

    /// Sends a close frame with the code and stops the writer.
    Close(u16),
}

/// Opens a websocket to `url` and splits it into its write & read halves.
pub(crate) async fn connect(url: &str) -> Result<(WriteSplitSink, ReadSplitStream)> {
    let (websocket_stream, _response) = tokio_tungstenite::connect_async(url).await?;
    Ok(websocket_stream.split())
}

/// The close code carried by a close frame, 1005 (no status) when there is none.
pub(crate) fn frame_close_code(frame: Option<&CloseFrame<'_>>) -> u16 {
    frame.map_or(1005, |frame| u16::from(frame.code))
}

#[async_trait]
/// Trait which adds deserialization read methods to payloads recieved from the Discord Gateway
pub(crate) trait DeserializeRecievePayload {
    async fn read_deserialize_next_payload<T>(&mut self) -> Result<T>
    where
        T: DeserializeOwned + Send + 'static;
}

#[async_trait]
impl DeserializeRecievePayload for ReadSplitStream {
    /// Reads the next text payload and attempts to deserialize it to type T,
    /// fails if the payload is unable to be deserialized to type T or the Gateway was closed
    async fn read_deserialize_next_payload<T>(&mut self) -> Result<T>
    where
        T: DeserializeOwned + Send + 'static,
    {
        loop {
            let next_payload = self.next().await.ok_or_else(|| {
                Error::Protocol("gateway closed the connection while reading".into())
            })??;

            match next_payload {
                Message::Text(text) => return Ok(serde_json::from_str::<T>(&text)?),
                Message::Close(frame) => {
                    return Err(Error::Protocol(format!(
                        "gateway closed the connection with code {} while reading",
                        frame_close_code(frame.as_ref())
                    )))
                }
                // Ping & pong are answered by tungstenite, json encoding never sends binary.
                other => trace!(?other, "Skipping non text gateway message"),
            }
        }
    }
}

/// Processes every [`Outbound`] sent through the channel & writes it to Discords gateway.
///
/// Commands are written one at a time in the order they were sent, the task ends when the
/// channel closes, a close was requested, or the socket stops accepting messages.
pub(crate) async fn process_gateway_send_commands(
    mut sink_channel_reciever: GatewaySinkReceiver<Outbound>,
    mut sink: WriteSplitSink,
) {
    while let Some(outbound) = sink_channel_reciever.recv().await {
        match outbound {
            Outbound::Command(command) => {
                let message = match command.to_message() {
                    Ok(message) => message,
                    Err(err) => {
                        error!(
                            error = %err,
                            opcode = command.opcode(),
                            "Failed to serialize gateway command"
                        );
                        continue;
                    }
                };

                if let Err(err) = sink.send(message).await {
                    debug!(error = %err, "Gateway writer stopped, send failed");
                    return;
                }
            }
            Outbound::Close(code) => {
                let frame = CloseFrame {
                    code: CloseCode::from(code),
                    reason: "".into(),
                };
                if let Err(err) = sink.send(Message::Close(Some(frame))).await {
                    debug!(error = %err, "Failed to send close frame");
                }
                break;
            }
        }
    }

    let _ = sink.close().await;
}

//! WebSocket connection handler
//!
//! Handles individual client connections: WebSocket handshake, room
//! registration, and the inbound/outbound pump pair bridging the socket to
//! the room actor.

use std::sync::Arc;
use std::time::Duration;

use futures_util::{Sink, SinkExt, Stream, StreamExt};
use serde::Deserialize;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::sync::{mpsc, watch};
use tokio::time::{interval_at, timeout, timeout_at, Instant, MissedTickBehavior};
use tokio_tungstenite::tungstenite::handshake::server::{ErrorResponse, Request, Response};
use tokio_tungstenite::tungstenite::http::Uri;
use tokio_tungstenite::tungstenite::protocol::WebSocketConfig;
use tokio_tungstenite::tungstenite::{Error as WsError, Message as WsMessage};
use tracing::{debug, error, info, warn};

use crate::actor::RoomHandle;
use crate::client::Client;
use crate::config::Config;
use crate::directory::RoomDirectory;
use crate::error::ChatError;
use crate::message::Message;
use crate::types::{guest_name, ConnectionId, Id};

const ROUTE_PREFIX: &str = "/chat/rooms/";
const ROUTE_SUFFIX: &str = "/ws";
const MAX_USER_NAME_LEN: usize = 64;

/// Parsed connect request: `/chat/rooms/{roomID}/ws?clientID=&userID=&userName=`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectRequest {
    pub room_id: Id,
    pub client_id: Id,
    pub user_id: Id,
    pub user_name: String,
}

#[derive(Debug, Default, Deserialize)]
struct ConnectQuery {
    #[serde(rename = "clientID")]
    client_id: Option<String>,
    #[serde(rename = "userID")]
    user_id: Option<String>,
    #[serde(rename = "userName")]
    user_name: Option<String>,
}

impl ConnectRequest {
    pub fn from_uri(uri: &Uri) -> Result<Self, ChatError> {
        let path = uri.path();
        let room = path
            .strip_prefix(ROUTE_PREFIX)
            .and_then(|rest| rest.strip_suffix(ROUTE_SUFFIX))
            .filter(|room| !room.contains('/'))
            .ok_or_else(|| ChatError::UnknownRoute(path.to_string()))?;
        let room_id = Id::parse(room)?;

        let query: ConnectQuery = match uri.query() {
            Some(raw) => serde_urlencoded::from_str(raw)
                .map_err(|e| ChatError::InvalidConnect(e.to_string()))?,
            None => ConnectQuery::default(),
        };

        let client_id = match non_empty(query.client_id) {
            Some(raw) => Id::parse(&raw)?,
            None => Id::new(),
        };
        let user_id = match non_empty(query.user_id) {
            Some(raw) => Id::parse(&raw)?,
            None => client_id.clone(),
        };
        let user_name = non_empty(query.user_name).unwrap_or_else(guest_name);
        if user_name.chars().count() > MAX_USER_NAME_LEN {
            return Err(ChatError::InvalidConnect("userName too long".to_string()));
        }

        Ok(Self {
            room_id,
            client_id,
            user_id,
            user_name,
        })
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Handshake refusal carrying the error's status code
fn reject(err: &ChatError) -> ErrorResponse {
    let mut response = ErrorResponse::new(Some(err.to_string()));
    *response.status_mut() = err.status();
    response
}

/// Per-connection cancellation signal shared by both loops
#[derive(Debug, Clone)]
struct Cancel {
    tx: Arc<watch::Sender<bool>>,
    rx: watch::Receiver<bool>,
}

impl Cancel {
    fn new() -> Self {
        let (tx, rx) = watch::channel(false);
        Self { tx: Arc::new(tx), rx }
    }

    /// Raise the signal; true only for the call that actually raised it
    fn cancel(&self) -> bool {
        self.tx.send_if_modified(|cancelled| {
            if *cancelled {
                false
            } else {
                *cancelled = true;
                true
            }
        })
    }

    async fn cancelled(&self) {
        let mut rx = self.rx.clone();
        let _ = rx.wait_for(|cancelled| *cancelled).await;
    }
}

/// Cleanup that runs exactly once, whichever way the inbound loop ends
struct ConnectionGuard {
    room: RoomHandle,
    client_id: Id,
    connection: ConnectionId,
    cancel: Cancel,
}

impl Drop for ConnectionGuard {
    fn drop(&mut self) {
        if self.cancel.cancel() {
            debug!("Inbound loop of {} raised cancellation", self.client_id);
        }
        self.room
            .unregister_later(self.client_id.clone(), self.connection);
    }
}

/// Handle a new connection
///
/// Performs the WebSocket handshake (refusing unknown paths and bad ids),
/// resolves the room and runs the pump until the connection ends.
pub async fn handle_connection<S>(stream: S, directory: Arc<RoomDirectory>) -> Result<(), ChatError>
where
    S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
{
    let config = directory.config().clone();

    let mut ws_config = WebSocketConfig::default();
    ws_config.max_message_size = Some(config.max_message_size);
    ws_config.max_frame_size = Some(config.max_message_size);

    let mut connect = None;
    let callback = |req: &Request, response: Response| -> Result<Response, ErrorResponse> {
        match ConnectRequest::from_uri(req.uri()) {
            Ok(parsed) => {
                connect = Some(parsed);
                Ok(response)
            }
            Err(e) => {
                warn!("Refusing connect to {}: {}", req.uri(), e);
                Err(reject(&e))
            }
        }
    };

    // WebSocket handshake
    let ws_stream =
        tokio_tungstenite::accept_hdr_async_with_config(stream, callback, Some(ws_config)).await?;
    let connect = connect.ok_or_else(|| ChatError::InvalidConnect("missing request".to_string()))?;

    let room = directory.get_or_create(&connect.room_id).await;
    serve(ws_stream, room, connect, &config).await;
    Ok(())
}

/// Run both loops for an upgraded connection
async fn serve<T>(ws_stream: T, room: RoomHandle, connect: ConnectRequest, config: &Config)
where
    T: Stream<Item = Result<WsMessage, WsError>> + Sink<WsMessage, Error = WsError> + Send + 'static,
{
    let (ws_sender, ws_receiver) = ws_stream.split();
    let connection = ConnectionId::next();
    let cancel = Cancel::new();

    // Mailbox and outbound loop exist before the room can see the client.
    let (mailbox_tx, mailbox_rx) = mpsc::channel(config.mailbox_bound());
    let write_task = tokio::spawn(write_loop(
        ws_sender,
        mailbox_rx,
        cancel.clone(),
        connect.client_id.clone(),
        config.ping_period,
        config.write_wait,
    ));

    let guard = ConnectionGuard {
        room: room.clone(),
        client_id: connect.client_id.clone(),
        connection,
        cancel: cancel.clone(),
    };

    info!(
        "Client {} ({}) connected to room {} as connection {}",
        connect.client_id, connect.user_name, connect.room_id, connection
    );

    let client = Client::new(
        connect.client_id.clone(),
        connection,
        connect.user_id.clone(),
        connect.user_name.clone(),
        mailbox_tx,
    );

    match room.register(client).await {
        Ok(()) => read_loop(ws_receiver, &room, &connect, &cancel, config.pong_wait).await,
        Err(e) => error!("Failed to register client {}: {}", connect.client_id, e),
    }

    drop(guard);
    if let Err(e) = write_task.await {
        error!("Write task for {} failed: {}", connect.client_id, e);
    }

    info!("Client {} disconnected", connect.client_id);
}

/// Inbound loop (WebSocket → room)
///
/// Ends on transport error, close, undecodable frame, missed keepalive or
/// cancellation. The read deadline moves forward with every pong.
async fn read_loop<R>(
    mut ws_receiver: R,
    room: &RoomHandle,
    connect: &ConnectRequest,
    cancel: &Cancel,
    pong_wait: Duration,
) where
    R: Stream<Item = Result<WsMessage, WsError>> + Unpin,
{
    let client_id = &connect.client_id;
    let mut deadline = Instant::now() + pong_wait;

    loop {
        let next = tokio::select! {
            next = timeout_at(deadline, ws_receiver.next()) => next,
            _ = cancel.cancelled() => {
                debug!("Read loop for {} cancelled", client_id);
                break;
            }
        };

        let frame = match next {
            Err(_) => {
                warn!("No pong from {} within {:?}", client_id, pong_wait);
                break;
            }
            Ok(None) => {
                debug!("Stream ended for {}", client_id);
                break;
            }
            Ok(Some(Err(e))) => {
                error!("WebSocket error for {}: {}", client_id, e);
                break;
            }
            Ok(Some(Ok(frame))) => frame,
        };

        match &frame {
            WsMessage::Text(_) | WsMessage::Binary(_) => {}
            WsMessage::Pong(_) => {
                deadline = Instant::now() + pong_wait;
                continue;
            }
            WsMessage::Close(_) => {
                debug!("Client {} sent close frame", client_id);
                break;
            }
            // Pong replies are queued automatically by tungstenite
            WsMessage::Ping(_) | WsMessage::Frame(_) => continue,
        }

        let mut message: Message = match serde_json::from_slice(&frame.into_data()) {
            Ok(message) => message,
            Err(e) => {
                warn!("Invalid JSON from {}: {}", client_id, e);
                break;
            }
        };

        message.room_id = connect.room_id.clone();
        message.client_id = Some(client_id.clone());
        message.user_id = Some(connect.user_id.clone());
        message.user_name = Some(connect.user_name.clone());

        if let Err(e) = message.validate_inbound() {
            warn!("Dropping message {} from {}: {}", message.id, client_id, e);
            continue;
        }

        debug!("Received {:?} message {} from {}", message.kind, message.id, client_id);

        tokio::select! {
            result = room.dispatch(message) => {
                if result.is_err() {
                    warn!("Room {} closed, ending read loop for {}", connect.room_id, client_id);
                    break;
                }
            }
            _ = cancel.cancelled() => {
                debug!("Forward from {} aborted by cancellation", client_id);
                break;
            }
        }
    }

    debug!("Read loop ended for {}", client_id);
}

/// Outbound loop (mailbox → WebSocket)
///
/// Ends when the mailbox closes (unregistered or evicted), on any write or
/// ping failure, or on cancellation. Always raises cancellation and closes
/// the socket on the way out.
async fn write_loop<W>(
    mut ws_sender: W,
    mut mailbox: mpsc::Receiver<Message>,
    cancel: Cancel,
    client_id: Id,
    ping_period: Duration,
    write_wait: Duration,
) where
    W: Sink<WsMessage, Error = WsError> + Unpin,
{
    let mut ticker = interval_at(Instant::now() + ping_period, ping_period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            maybe = mailbox.recv() => {
                let Some(msg) = maybe else {
                    debug!("Mailbox closed for {}", client_id);
                    break;
                };
                let json = match serde_json::to_string(&msg) {
                    Ok(json) => json,
                    Err(e) => {
                        error!("Failed to serialize message: {}", e);
                        // Continue - don't break on serialization errors
                        continue;
                    }
                };
                if let Err(e) = send_frame(&mut ws_sender, WsMessage::Text(json.into()), write_wait).await {
                    debug!("WebSocket send to {} failed: {}", client_id, e);
                    break;
                }
            }
            _ = ticker.tick() => {
                if let Err(e) = send_frame(&mut ws_sender, WsMessage::Ping(Vec::<u8>::new().into()), write_wait).await {
                    debug!("Ping to {} failed: {}", client_id, e);
                    break;
                }
            }
            _ = cancel.cancelled() => {
                debug!("Write loop for {} cancelled", client_id);
                break;
            }
        }
    }

    if cancel.cancel() {
        debug!("Write loop of {} raised cancellation", client_id);
    }

    // Send close frame when done
    let _ = timeout(write_wait, ws_sender.close()).await;
    debug!("Write loop ended for {}", client_id);
}

/// Write one frame, bounded by `write_wait`
async fn send_frame<W>(sink: &mut W, frame: WsMessage, write_wait: Duration) -> Result<(), ChatError>
where
    W: Sink<WsMessage, Error = WsError> + Unpin,
{
    match timeout(write_wait, sink.send(frame)).await {
        Ok(result) => result.map_err(ChatError::from),
        Err(_) => Err(ChatError::Io(std::io::Error::new(
            std::io::ErrorKind::TimedOut,
            "write timed out",
        ))),
    }
}

//! TCP accept loop. Sessions are served one at a time.

use std::io;
use std::net::SocketAddr;
use std::sync::Arc;

use futures_util::{SinkExt, StreamExt};
use thiserror::Error;
use tokio::net::{TcpListener, TcpStream};
use tokio_util::codec::Framed;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::actuator::Actuator;
use crate::codec::{CommandCodec, Frame};
use crate::protocol::{ProtocolError, ProtocolVersion, Response};
use crate::registry::Registry;
use crate::session::Session;

#[derive(Error, Debug)]
pub enum ServerError {
    #[error("address {addr} is already in use")]
    AddrInUse { addr: String },
    #[error("failed to bind {addr}: {source}")]
    Bind {
        addr: String,
        #[source]
        source: io::Error,
    },
}

/// Everything a session needs, shared with the rest of the daemon.
pub struct AppState {
    pub registry: Arc<Registry>,
    pub actuator: Arc<Actuator>,
    /// Version advertised before any handshake
    pub version: ProtocolVersion,
}

impl AppState {
    pub fn new(registry: Arc<Registry>, actuator: Arc<Actuator>, version: ProtocolVersion) -> Self {
        Self {
            registry,
            actuator,
            version,
        }
    }
}

/// Bind the listening socket; an occupied port is reported separately.
pub async fn bind(address: &str, port: u16) -> Result<TcpListener, ServerError> {
    let addr = format!("{}:{}", address, port);
    match TcpListener::bind((address, port)).await {
        Ok(listener) => {
            info!(%addr, "Listening");
            Ok(listener)
        }
        Err(e) if e.kind() == io::ErrorKind::AddrInUse => Err(ServerError::AddrInUse { addr }),
        Err(source) => Err(ServerError::Bind { addr, source }),
    }
}

/// Accept clients until `shutdown` is cancelled.
pub async fn serve(listener: TcpListener, state: Arc<AppState>, shutdown: CancellationToken) {
    loop {
        let accepted = tokio::select! {
            biased;
            _ = shutdown.cancelled() => break,
            accepted = listener.accept() => accepted,
        };
        match accepted {
            Ok((stream, peer)) => serve_session(stream, peer, state.clone(), &shutdown).await,
            Err(e) => warn!("Failed to accept connection: {}", e),
        }
    }
    info!("Accept loop stopped");
}

async fn serve_session(
    stream: TcpStream,
    peer: SocketAddr,
    state: Arc<AppState>,
    shutdown: &CancellationToken,
) {
    info!(%peer, "Client connected");
    let mut lines = Framed::new(stream, CommandCodec::new());
    let mut session = Session::new(state);

    loop {
        let received = tokio::select! {
            biased;
            _ = shutdown.cancelled() => {
                debug!(%peer, "Closing session for shutdown");
                break;
            }
            received = lines.next() => received,
        };

        let response = match received {
            Some(Ok(Frame::Line(line))) => {
                debug!(%peer, command = %line.trim(), "Received");
                match session.handle(&line).await {
                    Some(response) => response,
                    None => break,
                }
            }
            Some(Ok(Frame::TooLong)) => {
                debug!(%peer, "Command too long");
                Response::from(ProtocolError::Malformed(String::new()))
            }
            Some(Ok(Frame::Invalid)) => {
                debug!(%peer, "Command is not valid UTF-8");
                Response::from(ProtocolError::Malformed(String::new()))
            }
            Some(Err(e)) => {
                warn!(%peer, "Receive failed: {}", e);
                session.close();
                break;
            }
            None => {
                session.close();
                break;
            }
        };

        if let Err(e) = lines.send(response.to_string()).await {
            warn!(%peer, "Send failed: {}", e);
            session.close();
            break;
        }
    }
    info!(%peer, "Client disconnected");
}

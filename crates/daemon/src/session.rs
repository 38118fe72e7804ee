//! Per-connection command handling.

use std::sync::Arc;

use domotica_types::PinKind;
use tracing::debug;

use crate::actuator::PinError;
use crate::protocol::{self, Command, ProtocolVersion, Response};
use crate::server::AppState;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Open,
    Closed,
}

/// One client conversation: OPEN until `desconectar` or a transport error.
pub struct Session {
    state: Arc<AppState>,
    negotiated: ProtocolVersion,
    phase: SessionState,
}

impl Session {
    pub fn new(state: Arc<AppState>) -> Self {
        let negotiated = state.version;
        Self {
            state,
            negotiated,
            phase: SessionState::Open,
        }
    }

    pub fn negotiated(&self) -> ProtocolVersion {
        self.negotiated
    }

    pub fn phase(&self) -> SessionState {
        self.phase
    }

    /// Transport failures end the session without a reply.
    pub fn close(&mut self) {
        self.phase = SessionState::Closed;
    }

    /// Handle one received line. `None` means the client disconnected and
    /// nothing is sent back.
    pub async fn handle(&mut self, line: &str) -> Option<Response> {
        let command = match protocol::parse(line, self.negotiated) {
            Ok(command) => command,
            Err(e) => {
                debug!("Rejected command: {}", e);
                return Some(e.into());
            }
        };

        let state = self.state.clone();
        let actuator = &state.actuator;
        let response = match command {
            Command::Disconnect => {
                self.close();
                return None;
            }
            Command::Handshake(client) => self.handshake(client),
            Command::List => {
                let relays = state.registry.list_outputs(PinKind::Relay);
                Response::Info(relays.iter().map(|pin| format!("{} ", pin)).collect())
            }
            Command::Toggle(pin) => executed(actuator.toggle(pin)),
            Command::TurnOn(pin) => executed(actuator.turn_on(pin)),
            Command::TurnOff(pin) => executed(actuator.turn_off(pin)),
            Command::Pulse(pin) => executed(actuator.pulse(pin).await),
            Command::State(pin) => match actuator.read_state(pin) {
                Ok(on) => Response::Info(if on { "1" } else { "0" }.to_string()),
                Err(e) => rejected(e),
            },
            Command::Describe(pin) => match actuator.describe(pin) {
                Ok(text) => Response::Info(text.to_string()),
                Err(e) => rejected(e),
            },
        };
        Some(response)
    }

    /// A newer client version is adopted; an older one is answered with ours.
    fn handshake(&mut self, client: ProtocolVersion) -> Response {
        if client >= self.negotiated {
            if client > self.negotiated {
                debug!(from = %self.negotiated, to = %client, "Adopting client protocol version");
            }
            self.negotiated = client;
            Response::Ok(client.to_string())
        } else {
            Response::Info(self.negotiated.to_string())
        }
    }
}

fn executed(result: Result<(), PinError>) -> Response {
    match result {
        Ok(()) => Response::executed(),
        Err(e) => rejected(e),
    }
}

fn rejected(err: PinError) -> Response {
    debug!("Command not executed: {}", err);
    Response::bad_pin()
}

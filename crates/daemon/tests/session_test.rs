use std::sync::{Arc, Mutex};
use std::time::Duration;

use domotica_daemon::action::ActionInvoker;
use domotica_daemon::{Daemon, Lifecycle};
use domotica_gpio::MockGpio;
use domotica_types::{CallConfig, GroupConfig, Level, PinConfig, PinKind, ServerConfig};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, Lines};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;
use tokio::task::JoinHandle;
use tokio::time::timeout;

#[derive(Default)]
struct Recorder {
    calls: Mutex<Vec<String>>,
}

impl ActionInvoker for Recorder {
    fn invoke(&self, action: &str) {
        self.calls.lock().unwrap().push(action.to_string());
    }
}

fn pin(pin: u8, kind: PinKind, active_high: bool, description: &str) -> PinConfig {
    PinConfig {
        pin,
        kind,
        active_high,
        description: description.to_string(),
    }
}

fn test_config() -> ServerConfig {
    ServerConfig {
        port: 0,
        pause_ms: 5,
        pulse_ms: 50,
        groups: vec![
            GroupConfig {
                pins: vec![
                    pin(22, PinKind::Button, true, "Router button"),
                    pin(4, PinKind::Relay, false, "Router relay"),
                ],
                call: None,
            },
            GroupConfig {
                pins: vec![
                    pin(14, PinKind::Probe, true, "Mains probe"),
                    pin(15, PinKind::Relay, true, "Router power"),
                ],
                call: Some(CallConfig {
                    action: Some("aviso_electricidad".to_string()),
                    on_falling: false,
                    on_rising: true,
                }),
            },
            GroupConfig {
                pins: vec![
                    pin(24, PinKind::Button, true, "Switch button"),
                    pin(23, PinKind::Relay, false, "Switch relay"),
                ],
                call: None,
            },
        ],
        ..ServerConfig::default()
    }
}

struct TestServer {
    addr: std::net::SocketAddr,
    gpio: MockGpio,
    lifecycle: Lifecycle,
    recorder: Arc<Recorder>,
    handle: JoinHandle<()>,
}

impl TestServer {
    async fn start() -> Self {
        let gpio = MockGpio::new();
        let recorder = Arc::new(Recorder::default());
        let lifecycle = Lifecycle::new();
        let daemon = Daemon::start(&test_config(), &gpio, recorder.clone(), lifecycle.clone())
            .await
            .unwrap();
        let addr = daemon.local_addr().unwrap();
        let handle = tokio::spawn(daemon.run());
        Self {
            addr,
            gpio,
            lifecycle,
            recorder,
            handle,
        }
    }

    async fn connect(&self) -> Client {
        let stream = TcpStream::connect(self.addr).await.unwrap();
        let (read, write) = stream.into_split();
        Client {
            lines: BufReader::new(read).lines(),
            write,
        }
    }

    async fn stop(self) {
        self.lifecycle.request_shutdown();
        timeout(Duration::from_secs(2), self.handle)
            .await
            .expect("server did not stop")
            .unwrap();
    }
}

struct Client {
    lines: Lines<BufReader<OwnedReadHalf>>,
    write: OwnedWriteHalf,
}

impl Client {
    async fn send(&mut self, command: &str) {
        self.write
            .write_all(format!("{}\n", command).as_bytes())
            .await
            .unwrap();
    }

    async fn recv(&mut self) -> Option<String> {
        timeout(Duration::from_secs(2), self.lines.next_line())
            .await
            .expect("no reply")
            .unwrap()
    }

    async fn ask(&mut self, command: &str) -> String {
        self.send(command).await;
        self.recv().await.expect("connection closed")
    }
}

async fn wait_for(mut condition: impl FnMut() -> bool) {
    for _ in 0..200 {
        if condition() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    panic!("condition not reached");
}

#[tokio::test]
async fn test_full_session() {
    let server = TestServer::start().await;
    let mut client = server.connect().await;

    assert_eq!(client.ask("hola 1.1").await, "ok: 1.1");
    assert_eq!(client.ask("listar").await, "info: 4 15 23 ");
    assert_eq!(client.ask("encender 4").await, "ok: ejecutado");
    assert_eq!(client.ask("estado 4").await, "info: 1");
    // Relay 4 is active-low
    assert_eq!(server.gpio.level(4), Level::Low);
    assert_eq!(client.ask("apagar 4").await, "ok: ejecutado");
    assert_eq!(client.ask("Estado 4").await, "info: 0");
    assert_eq!(client.ask("describir 23").await, "info: Switch relay");
    assert_eq!(client.ask("describir 22").await, "info: Router button");
    assert_eq!(client.ask("pulsar 15").await, "ok: ejecutado");
    assert_eq!(client.ask("estado 15").await, "info: 0");

    assert_eq!(
        client.ask("estado").await,
        "err: no ejecutado, comando incorrecto"
    );
    assert_eq!(
        client.ask("estado 99").await,
        "err: no ejecutado, puerto incorrecto o no encontrado"
    );
    assert_eq!(
        client.ask("formatear 4").await,
        "err: no ejecutado, comando incorrecto"
    );

    client.send("desconectar").await;
    assert_eq!(client.recv().await, None);

    server.stop().await;
}

#[tokio::test]
async fn test_handshake_negotiation_over_tcp() {
    let server = TestServer::start().await;
    let mut client = server.connect().await;

    assert_eq!(client.ask("hola 1.0").await, "info: 1.1");
    assert_eq!(client.ask("hola 1.5").await, "ok: 1.5");
    client.send("desconectar").await;
    assert_eq!(client.recv().await, None);

    // Negotiation is per session
    let mut client = server.connect().await;
    assert_eq!(client.ask("hola 1.1").await, "ok: 1.1");

    server.stop().await;
}

#[tokio::test]
async fn test_one_session_at_a_time() {
    let server = TestServer::start().await;
    let mut first = server.connect().await;
    assert_eq!(first.ask("listar").await, "info: 4 15 23 ");

    let mut second = server.connect().await;
    second.send("listar").await;
    assert!(
        timeout(Duration::from_millis(200), second.lines.next_line())
            .await
            .is_err(),
        "second client served while the first is active"
    );

    first.send("desconectar").await;
    assert_eq!(second.recv().await.as_deref(), Some("info: 4 15 23 "));

    server.stop().await;
}

#[tokio::test]
async fn test_overlong_command_is_rejected() {
    let server = TestServer::start().await;
    let mut client = server.connect().await;

    let long = format!("estado {}", "4".repeat(2048));
    assert_eq!(
        client.ask(&long).await,
        "err: no ejecutado, comando incorrecto"
    );
    assert_eq!(client.ask("estado 4").await, "info: 0");

    server.stop().await;
}

#[tokio::test]
async fn test_invalid_utf8_is_rejected() {
    let server = TestServer::start().await;
    let mut client = server.connect().await;

    client.write.write_all(b"estado \xff\xfe\n").await.unwrap();
    assert_eq!(
        client.recv().await.as_deref(),
        Some("err: no ejecutado, comando incorrecto")
    );
    assert_eq!(client.ask("estado 4").await, "info: 0");

    server.stop().await;
}

#[tokio::test]
async fn test_button_press_is_visible_to_session() {
    let server = TestServer::start().await;
    let mut client = server.connect().await;

    server.gpio.set_input(22, Level::High);
    tokio::time::sleep(Duration::from_millis(50)).await;
    server.gpio.set_input(22, Level::Low);
    tokio::time::sleep(Duration::from_millis(50)).await;

    assert_eq!(client.ask("estado 4").await, "info: 1");

    server.stop().await;
}

#[tokio::test]
async fn test_probe_fires_action() {
    let server = TestServer::start().await;

    server.gpio.set_input(14, Level::High);
    let recorder = server.recorder.clone();
    wait_for(|| !recorder.calls.lock().unwrap().is_empty()).await;
    assert_eq!(
        recorder.calls.lock().unwrap().as_slice(),
        ["aviso_electricidad".to_string()]
    );

    let mut client = server.connect().await;
    assert_eq!(client.ask("estado 15").await, "info: 1");

    server.stop().await;
}

#[tokio::test]
async fn test_shutdown_closes_active_session() {
    let server = TestServer::start().await;
    let mut client = server.connect().await;
    assert_eq!(client.ask("estado 23").await, "info: 0");

    let gpio = server.gpio.clone();
    server.stop().await;

    assert_eq!(client.recv().await, None);
    assert!(!gpio.is_claimed(4));
    assert!(!gpio.is_claimed(22));
}

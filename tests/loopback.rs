//! A client session against the emulated controller over a real socket.

use std::time::Duration;

use daikinws::{
    client::{run_session, unix_now, Input},
    config::parse_endpoint,
    emulator::{serve, Device, DeviceHandle},
    encoder::UiEvent,
    protocol::telemetry::MessageType,
    session::{Outcome, Session},
    sink::{AutoConfirm, ProjectionSink},
};
use tokio::{net::TcpListener, sync::mpsc, time::timeout};

#[derive(Debug, PartialEq)]
enum Seen {
    Power(bool),
    Applied(MessageType),
    Hostname(String),
    ConnectionLost,
}

struct Probe(mpsc::UnboundedSender<Seen>);

impl ProjectionSink for Probe {
    fn set_power(&mut self, on: bool) {
        let _ = self.0.send(Seen::Power(on));
    }

    fn set_hostname(&mut self, hostname: &str) {
        let _ = self.0.send(Seen::Hostname(hostname.to_string()));
    }

    fn show_connection_lost(&mut self) {
        let _ = self.0.send(Seen::ConnectionLost);
    }

    fn message_applied(&mut self, kind: MessageType) {
        let _ = self.0.send(Seen::Applied(kind));
    }
}

async fn wait_for(seen: &mut mpsc::UnboundedReceiver<Seen>, wanted: Seen) {
    while let Some(next) = seen.recv().await {
        if next == wanted {
            return;
        }
    }

    panic!("session ended before {wanted:?}");
}

#[tokio::test(flavor = "multi_thread")]
async fn test_session_against_emulator() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    let device = DeviceHandle::spawn(Device::new(unix_now()));
    tokio::spawn(serve(listener, device));

    let endpoint = parse_endpoint(&format!("ws://{addr}/ws")).unwrap();

    let (seen_send, mut seen) = mpsc::unbounded_channel();
    let (inputs, mut inputs_recv) = mpsc::channel(4);

    let runner = tokio::spawn(async move {
        let mut session = Session::new(Probe(seen_send), AutoConfirm(true));
        run_session(&endpoint, &mut session, &mut inputs_recv).await
    });

    timeout(Duration::from_secs(10), async {
        // greeting: config first, then the unit state
        wait_for(&mut seen, Seen::Hostname("daikin".into())).await;
        wait_for(&mut seen, Seen::Power(false)).await;
        wait_for(&mut seen, Seen::Applied(MessageType::Sensor)).await;

        inputs.send(Input::Event(UiEvent::PowerToggled(true))).await.unwrap();
        wait_for(&mut seen, Seen::Power(true)).await;

        inputs.send(Input::Event(UiEvent::ResetDevicePressed)).await.unwrap();
        wait_for(&mut seen, Seen::ConnectionLost).await;
    })
    .await
    .expect("device did not respond in time");

    let outcome = timeout(Duration::from_secs(10), runner)
        .await
        .expect("session did not end")
        .unwrap()
        .unwrap();

    assert_eq!(outcome, Outcome::Reload);
}

#[tokio::test]
async fn test_unreachable_controller_reloads() {
    // nothing listens here once the listener is dropped
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let endpoint = parse_endpoint(&format!("ws://{addr}/ws")).unwrap();

    let (seen_send, mut seen) = mpsc::unbounded_channel();
    let (_inputs, mut inputs_recv) = mpsc::channel(1);

    let mut session = Session::new(Probe(seen_send), AutoConfirm(true));
    let outcome = run_session(&endpoint, &mut session, &mut inputs_recv).await.unwrap();

    assert_eq!(outcome, Outcome::Reload);
    assert_eq!(seen.try_recv(), Ok(Seen::ConnectionLost));
}

#[tokio::test]
async fn test_wrong_path_is_refused() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    let device = DeviceHandle::spawn(Device::new(unix_now()));
    tokio::spawn(serve(listener, device));

    let endpoint = parse_endpoint(&format!("ws://{addr}/other")).unwrap();
    assert!(daikinws::config::open(&endpoint).await.is_err());
}

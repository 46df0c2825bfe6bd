use queuecall::arrival::transport::MockTransport;
use queuecall::config::Config;
use queuecall::ipc::client::send_command;
use queuecall::ipc::protocol::{Command, Response};
use queuecall::ipc::server::IpcServer;
use queuecall::sequencer::SequencerPhase;
use queuecall::speech::MockSpeech;
use queuecall::terminal::Terminal;
use queuecall::terminal::handler::TerminalCommandHandler;
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;

fn test_config() -> Config {
    let mut config = Config::default();
    config.speech.spell_identifier = false;
    config.speech.pharmacy_template = "pharmacy {identifier}".to_string();
    config
}

fn arrival(id: &str) -> serde_json::Value {
    json!({"identifier": id, "subjectName": format!("Patient {}", id), "relatedCode": "R"})
}

fn ids(events: &[queuecall::ArrivalEvent]) -> Vec<&str> {
    events.iter().map(|e| e.identifier.as_str()).collect()
}

async fn advance(ms: u64) {
    tokio::time::sleep(Duration::from_millis(ms)).await;
}

#[tokio::test(start_paused = true)]
async fn disconnect_during_cooldown_keeps_queue_and_rejoins() {
    let (transport, server) = MockTransport::pair();
    let speech = MockSpeech::new().with_delay(Duration::from_secs(1));
    let terminal = Terminal::start(
        &test_config(),
        Arc::new(transport),
        Arc::new(speech.clone()),
        None,
    )
    .unwrap();
    advance(10).await;
    assert!(server.is_connected());

    for id in ["P1", "P2", "P3"] {
        assert!(server.push(arrival(id)));
    }

    // P1 spoken, cooldown running
    advance(1_500).await;
    let status = terminal.status();
    assert_eq!(status.phase, SequencerPhase::Cooldown);
    assert_eq!(status.queued, 2);
    assert_eq!(
        status.display.current.as_ref().map(|e| e.identifier.as_str()),
        Some("P1")
    );
    assert_eq!(ids(&status.display.waiting), vec!["P3", "P2"]);

    server.disconnect();
    advance(10).await;
    let status = terminal.status();
    assert!(!status.connection.is_live());
    assert_eq!(status.queued, 2, "queue survives the disconnect");
    assert_eq!(ids(&status.display.waiting), vec!["P3", "P2"]);

    advance(1_000).await;
    let status = terminal.status();
    assert!(status.connection.is_live(), "reconnected after backoff");
    assert_eq!(server.joins(), vec!["pharmacy-queue", "pharmacy-queue"]);
    assert_eq!(status.channel.sessions, 2);

    assert!(server.push(arrival("P4")));
    advance(10_000).await;

    assert_eq!(
        speech.spoken(),
        vec!["pharmacy P1", "pharmacy P2", "pharmacy P3", "pharmacy P4"]
    );
    assert_eq!(speech.max_outstanding(), 1);

    let snapshot = terminal.display();
    assert!(snapshot.waiting.is_empty());
    assert_eq!(ids(&snapshot.history), vec!["P4", "P3", "P2", "P1"]);

    terminal.shutdown().await;
}

#[tokio::test]
async fn control_socket_drives_a_running_terminal() {
    let dir = tempfile::tempdir().unwrap();
    let socket_path = dir.path().join("queuecall.sock");

    let mut config = test_config();
    config.speech.cooldown_ms = 10;

    let (transport, push) = MockTransport::pair();
    let speech = MockSpeech::new();
    let terminal = Terminal::start(
        &config,
        Arc::new(transport),
        Arc::new(speech.clone()),
        None,
    )
    .unwrap();
    let view = terminal.view();

    let server = Arc::new(IpcServer::new(socket_path.clone()));
    let listener = server.bind().unwrap();
    let server_task = {
        let server = Arc::clone(&server);
        let handler = TerminalCommandHandler::new(view.clone());
        tokio::spawn(async move { server.serve(listener, handler).await })
    };

    tokio::time::timeout(Duration::from_secs(5), async {
        while !push.is_connected() {
            advance(5).await;
        }
    })
    .await
    .unwrap();
    push.push(arrival("RX-9"));

    tokio::time::timeout(Duration::from_secs(5), async {
        while terminal.status().announced < 1 {
            advance(5).await;
        }
    })
    .await
    .unwrap();

    match send_command(&socket_path, Command::Status).await.unwrap() {
        Response::Status(status) => {
            assert!(status.connection.is_live());
            assert_eq!(status.announced, 1);
            assert_eq!(
                status.display.current.map(|e| e.identifier),
                Some("RX-9".to_string())
            );
            assert!(status.board.is_none());
        }
        other => panic!("Expected Status, got {:?}", other),
    }

    // No clinic polling, nothing to scroll
    match send_command(&socket_path, Command::AutoScroll { enabled: true })
        .await
        .unwrap()
    {
        Response::Error { message } => assert!(message.contains("poll")),
        other => panic!("Expected Error, got {:?}", other),
    }

    assert_eq!(
        send_command(&socket_path, Command::Shutdown).await.unwrap(),
        Response::Ok
    );
    tokio::time::timeout(Duration::from_secs(5), view.shutdown_requested())
        .await
        .unwrap();

    server.stop().unwrap();
    server_task.await.unwrap().unwrap();
    assert!(!socket_path.exists());

    terminal.shutdown().await;
    assert_eq!(speech.spoken(), vec!["pharmacy RX-9"]);
}

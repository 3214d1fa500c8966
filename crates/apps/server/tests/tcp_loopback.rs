//! Full handshake over real sockets on the loopback interface.

use modgate_network::{DisconnectReason, Frame, Package, Role, TransportConfig, ERROR};
use modgate_server::net::io::{read_frame, write_frame};
use modgate_server::protocol::{encode_fingerprint, REQUEST_ADMIN_SYNC};
use modgate_server::{Fingerprint, ModIdentity, ServerSession, TcpTransport};
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tokio::net::{TcpListener, TcpStream};

const MAX_FRAME: usize = 1024 * 1024;

const HASH: &str = "0123456789ABCDEF0123456789ABCDEF0123456789ABCDEF0123456789ABCDEF";

fn identity(version: &str) -> ModIdentity {
    ModIdentity::new("LocationManager", version, "azumatt")
}

async fn start_server(admins: Vec<String>) -> (String, Arc<TcpTransport>, ServerSession) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let address = listener.local_addr().unwrap().to_string();
    let transport = TcpTransport::new(
        Role::Server,
        TransportConfig {
            address: address.clone(),
            ..TransportConfig::default()
        },
    );
    let session = ServerSession::new(
        identity("1.0.0"),
        Fingerprint::new("1.0.0", HASH),
        transport.clone(),
        admins,
    );
    tokio::spawn(transport.clone().serve(listener, session.hooks()));
    (address, transport, session)
}

fn client(address: &str, version: &str) -> (Arc<TcpTransport>, ServerSession) {
    let transport = TcpTransport::new(
        Role::Client,
        TransportConfig {
            address: address.to_string(),
            connect_timeout_ms: 2_000,
            ..TransportConfig::default()
        },
    );
    let session = ServerSession::new(
        identity(version),
        Fingerprint::new(version, HASH),
        transport.clone(),
        Vec::new(),
    );
    (transport, session)
}

async fn wait_for(mut condition: impl FnMut() -> bool) {
    tokio::time::timeout(Duration::from_secs(5), async {
        while !condition() {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("condition not reached in time");
}

#[tokio::test]
async fn test_matching_peers_validate_over_tcp() {
    let (address, _server_transport, server) = start_server(vec!["alice".into()]).await;
    let (transport, session) = client(&address, "1.0.0");

    let (_peer, task) = transport.clone().connect(session.hooks()).await.unwrap();

    wait_for(|| server.registry().len() == 1).await;
    wait_for(|| session.admin_sync().received().is_some()).await;

    assert_eq!(session.admin_sync().received(), Some(vec!["alice".to_string()]));
    assert_eq!(session.connection_error().get(), None);
    assert_eq!(transport.disconnect_reason(), None);
    task.abort();
}

#[tokio::test]
async fn test_version_mismatch_drops_client() {
    let (address, server_transport, server) = start_server(Vec::new()).await;
    let (transport, session) = client(&address, "0.9.0");

    let (_peer, task) = transport.clone().connect(session.hooks()).await.unwrap();
    tokio::time::timeout(Duration::from_secs(5), task)
        .await
        .expect("client was not disconnected")
        .unwrap();

    assert_eq!(
        transport.disconnect_reason(),
        Some(DisconnectReason::IncompatibleVersion)
    );
    let message = session.connection_error().get().unwrap();
    assert!(message.contains("Installed: 0.9.0"));
    assert!(message.contains("Needed: 1.0.0"));

    assert!(server.registry().is_empty());
    wait_for(|| server_transport.peer_count() == 0).await;
}

#[tokio::test]
async fn test_client_leaving_clears_server_registry() {
    let (address, server_transport, server) = start_server(Vec::new()).await;
    let (transport, session) = client(&address, "1.0.0");

    let (_peer, task) = transport.clone().connect(session.hooks()).await.unwrap();
    wait_for(|| server.registry().len() == 1).await;

    task.abort();
    drop(transport);
    drop(session);

    wait_for(|| server.registry().is_empty()).await;
    wait_for(|| server_transport.peer_count() == 0).await;
}

#[tokio::test]
async fn test_connect_to_closed_port_fails() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let address = listener.local_addr().unwrap().to_string();
    drop(listener);

    let (transport, session) = client(&address, "1.0.0");
    assert!(transport.connect(session.hooks()).await.is_err());
}

/// Read frames until the server's `Error` frame and return its reason code.
async fn read_until_error(stream: &mut TcpStream) -> Option<i32> {
    tokio::time::timeout(Duration::from_secs(5), async {
        while let Some(mut frame) = read_frame(stream, MAX_FRAME).await.ok()? {
            if frame.name == ERROR {
                return frame.payload.read_i32().ok();
            }
        }
        None
    })
    .await
    .expect("server never closed the connection")
}

fn version_check(version: &str) -> Frame {
    Frame::new(
        "LocationManager_VersionCheck",
        encode_fingerprint(&Fingerprint::new(version, HASH)),
    )
}

#[tokio::test]
async fn test_matching_check_after_mismatch_is_not_accepted() {
    let (address, server_transport, server) = start_server(vec!["alice".into()]).await;

    for _ in 0..20 {
        // Both checks leave in one write so they are buffered together.
        let mut bytes = Vec::new();
        write_frame(&mut bytes, &version_check("0.9.0"), MAX_FRAME)
            .await
            .unwrap();
        write_frame(&mut bytes, &version_check("1.0.0"), MAX_FRAME)
            .await
            .unwrap();
        let mut stream = TcpStream::connect(&address).await.unwrap();
        stream.write_all(&bytes).await.unwrap();

        assert_eq!(
            read_until_error(&mut stream).await,
            Some(DisconnectReason::IncompatibleVersion.code())
        );
    }

    wait_for(|| server_transport.peer_count() == 0).await;
    assert!(server.registry().is_empty());
    assert_eq!(server.metrics().validated.load(Ordering::Relaxed), 0);
    assert_eq!(server.metrics().rejected.load(Ordering::Relaxed), 20);
}

#[tokio::test]
async fn test_routed_request_before_handshake_is_refused() {
    let (address, server_transport, server) = start_server(vec!["alice".into()]).await;

    let mut bytes = Vec::new();
    for _ in 0..5 {
        let frame = Frame::routed(REQUEST_ADMIN_SYNC, Package::new());
        write_frame(&mut bytes, &frame, MAX_FRAME).await.unwrap();
    }
    let mut stream = TcpStream::connect(&address).await.unwrap();
    stream.write_all(&bytes).await.unwrap();

    assert_eq!(
        read_until_error(&mut stream).await,
        Some(DisconnectReason::IncompatibleVersion.code())
    );
    wait_for(|| server_transport.peer_count() == 0).await;
    assert_eq!(server.metrics().gated_denials.load(Ordering::Relaxed), 1);
    assert!(server.registry().is_empty());
}

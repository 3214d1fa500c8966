//! TCP implementation of the transport traits.
//!
//! Each connection gets a reader loop and a writer task. Sends only push onto
//! the writer's unbounded queue, so protocol code never waits on a socket.

use super::io::{read_frame, write_frame};
use dashmap::DashMap;
use modgate_network::{
    ConnectionHooks, DisconnectReason, Frame, Gate, HandleAllocator, NetworkError, NetworkResult,
    Package, PeerHandle, PeerRpcTables, Role, RouteTarget, RpcHandler, RpcTable, Transport,
    TransportConfig, ERROR, PEER_INFO,
};
use parking_lot::RwLock;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

enum Outbound {
    Frame(Frame),
    Close,
}

struct PeerLink {
    remote_address: String,
    outbound: mpsc::UnboundedSender<Outbound>,
    cancel: CancellationToken,
}

pub struct TcpTransport {
    role: Role,
    config: TransportConfig,
    handles: HandleAllocator,
    peers: DashMap<PeerHandle, PeerLink>,
    rpc: PeerRpcTables,
    routed: RpcTable,
    server_peer: RwLock<Option<PeerHandle>>,
    disconnect_reason: RwLock<Option<DisconnectReason>>,
}

impl TcpTransport {
    pub fn new(role: Role, config: TransportConfig) -> Arc<Self> {
        Arc::new(Self {
            role,
            config,
            handles: HandleAllocator::new(),
            peers: DashMap::new(),
            rpc: PeerRpcTables::new(),
            routed: RpcTable::new(),
            server_peer: RwLock::new(None),
            disconnect_reason: RwLock::new(None),
        })
    }

    /// Accept connections until the listener fails.
    pub async fn serve(
        self: Arc<Self>,
        listener: TcpListener,
        hooks: Arc<dyn ConnectionHooks>,
    ) -> NetworkResult<()> {
        if self.role != Role::Server {
            return Err(NetworkError::InvalidState(
                "only a server transport can accept connections".into(),
            ));
        }
        tracing::info!("Listening on {}", listener.local_addr()?);

        loop {
            let (stream, address) = listener.accept().await?;
            let peer = self.handles.allocate();
            tracing::info!("Accepted {} from {}", peer, address);
            tokio::spawn(self.clone().run_peer(
                peer,
                stream,
                address.to_string(),
                hooks.clone(),
            ));
        }
    }

    /// Connect to the server at `config.address`.
    ///
    /// Returns the server's peer handle and the task driving the connection,
    /// which finishes once the connection is gone.
    pub async fn connect(
        self: Arc<Self>,
        hooks: Arc<dyn ConnectionHooks>,
    ) -> NetworkResult<(PeerHandle, JoinHandle<()>)> {
        if self.role != Role::Client {
            return Err(NetworkError::InvalidState(
                "only a client transport can connect".into(),
            ));
        }
        let address = self.config.address.clone();
        let timeout = Duration::from_millis(self.config.connect_timeout_ms);
        let stream = tokio::time::timeout(timeout, TcpStream::connect(&address))
            .await
            .map_err(|_| NetworkError::Timeout)?
            .map_err(|err| NetworkError::ConnectionFailed(format!("{address}: {err}")))?;

        let peer = self.handles.allocate();
        *self.server_peer.write() = Some(peer);
        *self.disconnect_reason.write() = None;
        tracing::info!("Connected to {} as {}", address, peer);

        let task = tokio::spawn(self.clone().run_peer(peer, stream, address, hooks));
        Ok((peer, task))
    }

    /// Why the remote side last closed on us, if it said so.
    pub fn disconnect_reason(&self) -> Option<DisconnectReason> {
        *self.disconnect_reason.read()
    }

    pub fn peer_count(&self) -> usize {
        self.peers.len()
    }

    async fn run_peer(
        self: Arc<Self>,
        peer: PeerHandle,
        stream: TcpStream,
        remote_address: String,
        hooks: Arc<dyn ConnectionHooks>,
    ) {
        if let Err(err) = stream.set_nodelay(true) {
            tracing::debug!("Cannot disable Nagle for {}: {}", peer, err);
        }
        let (reader, writer) = stream.into_split();
        let (outbound, queue) = mpsc::unbounded_channel();
        let cancel = CancellationToken::new();

        self.peers.insert(
            peer,
            PeerLink {
                remote_address,
                outbound,
                cancel: cancel.clone(),
            },
        );
        tokio::spawn(write_loop(writer, queue, self.config.max_frame_len));

        hooks.on_new_connection(peer);
        if self.role == Role::Client {
            if let Err(err) = self.send(peer, PEER_INFO, Package::new()) {
                tracing::debug!("Peer info not sent to {}: {}", peer, err);
            }
        }

        match self.read_loop(peer, reader, &cancel, hooks.as_ref()).await {
            Ok(()) => tracing::info!("{} disconnected", peer),
            Err(err) => tracing::info!("{} disconnected: {}", peer, err),
        }

        // Dropping the link closes the queue; the writer drains what is left.
        self.peers.remove(&peer);
        self.rpc.remove_peer(peer);
        {
            let mut server_peer = self.server_peer.write();
            if *server_peer == Some(peer) {
                *server_peer = None;
            }
        }
        hooks.on_disconnect(peer);
    }

    async fn read_loop(
        &self,
        peer: PeerHandle,
        mut reader: OwnedReadHalf,
        cancel: &CancellationToken,
        hooks: &dyn ConnectionHooks,
    ) -> NetworkResult<()> {
        loop {
            let frame = tokio::select! {
                biased;
                _ = cancel.cancelled() => return Ok(()),
                frame = read_frame(&mut reader, self.config.max_frame_len) => frame?,
            };
            let Some(frame) = frame else {
                return Ok(());
            };
            // A forced disconnect may have landed while the frame was read.
            if cancel.is_cancelled() || !self.dispatch(peer, frame, hooks) {
                return Ok(());
            }
        }
    }

    /// Route one received frame. Returns `false` when the connection should
    /// be torn down.
    fn dispatch(&self, peer: PeerHandle, mut frame: Frame, hooks: &dyn ConnectionHooks) -> bool {
        if frame.routed {
            if hooks.on_routed_rpc(peer, &frame.name) == Gate::Deny {
                tracing::debug!("Routed {} from {} refused", frame.name, peer);
                return false;
            }
            if !self.routed.dispatch(&frame.name, peer, frame.payload) {
                tracing::debug!("No routed handler for {} from {}", frame.name, peer);
            }
            return true;
        }

        match frame.name.as_str() {
            PEER_INFO => {
                if hooks.on_peer_info(peer, &frame.payload) == Gate::Deny {
                    tracing::debug!("Peer info from {} refused", peer);
                    return false;
                }
                if self.role == Role::Server {
                    if let Err(err) = self.send(peer, PEER_INFO, Package::new()) {
                        tracing::debug!("Peer info reply to {} failed: {}", peer, err);
                    }
                }
                true
            }
            ERROR => {
                let reason = frame
                    .payload
                    .read_i32()
                    .ok()
                    .and_then(DisconnectReason::from_code)
                    .unwrap_or(DisconnectReason::Disconnected);
                tracing::warn!("{} closed the connection: {}", peer, reason);
                *self.disconnect_reason.write() = Some(reason);
                false
            }
            name => {
                if !self.rpc.dispatch(peer, name, frame.payload) {
                    tracing::debug!("Dropping {} from {}: no handler registered", name, peer);
                }
                true
            }
        }
    }

    fn queue(&self, peer: PeerHandle, item: Outbound) -> NetworkResult<()> {
        let link = self.peers.get(&peer).ok_or(NetworkError::UnknownPeer(peer))?;
        link.outbound
            .send(item)
            .map_err(|_| NetworkError::ConnectionClosed(peer.to_string()))
    }
}

impl Transport for TcpTransport {
    fn role(&self) -> Role {
        self.role
    }

    fn register_handler(
        &self,
        peer: PeerHandle,
        name: &str,
        handler: RpcHandler,
    ) -> NetworkResult<()> {
        if !self.peers.contains_key(&peer) {
            return Err(NetworkError::UnknownPeer(peer));
        }
        self.rpc.register(peer, name, handler);
        Ok(())
    }

    fn register_routed(&self, name: &str, handler: RpcHandler) {
        self.routed.register(name, handler);
    }

    fn send(&self, peer: PeerHandle, name: &str, payload: Package) -> NetworkResult<()> {
        self.queue(peer, Outbound::Frame(Frame::new(name, payload)))
    }

    fn invoke_routed(
        &self,
        target: RouteTarget,
        name: &str,
        payload: Package,
    ) -> NetworkResult<()> {
        match target {
            RouteTarget::Server if self.role == Role::Server => {
                if !self.routed.dispatch(name, PeerHandle::LOCAL, payload) {
                    tracing::debug!("No routed handler for {}", name);
                }
                Ok(())
            }
            RouteTarget::Server => {
                let server = (*self.server_peer.read()).ok_or_else(|| {
                    NetworkError::InvalidState("not connected to a server".into())
                })?;
                self.queue(server, Outbound::Frame(Frame::routed(name, payload)))
            }
            RouteTarget::Peer(peer) => {
                self.queue(peer, Outbound::Frame(Frame::routed(name, payload)))
            }
        }
    }

    fn force_disconnect(&self, peer: PeerHandle, reason: DisconnectReason) -> NetworkResult<()> {
        let mut payload = Package::new();
        payload.write_i32(reason.code());
        self.queue(peer, Outbound::Frame(Frame::new(ERROR, payload)))?;
        self.queue(peer, Outbound::Close)?;
        if let Some(link) = self.peers.get(&peer) {
            link.cancel.cancel();
        }
        tracing::info!("Disconnecting {}: {}", peer, reason);
        Ok(())
    }

    fn remote_address(&self, peer: PeerHandle) -> Option<String> {
        self.peers.get(&peer).map(|link| link.remote_address.clone())
    }
}

async fn write_loop(
    mut writer: OwnedWriteHalf,
    mut queue: mpsc::UnboundedReceiver<Outbound>,
    max_frame_len: usize,
) {
    while let Some(item) = queue.recv().await {
        match item {
            Outbound::Frame(frame) => {
                if let Err(err) = write_frame(&mut writer, &frame, max_frame_len).await {
                    tracing::debug!("Write of {} failed: {}", frame.name, err);
                    break;
                }
            }
            Outbound::Close => break,
        }
    }
    let _ = writer.shutdown().await;
}

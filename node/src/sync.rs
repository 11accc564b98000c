//! Point-to-point bulk block transfer.
//!
//! ## Wire protocol
//!
//! ```text
//! client -> server: [bottom: u32 BE] [top: u32 BE]
//! server -> client: record(top), record(top - 1), ..., record(bottom)
//! ```
//!
//! Each record is a framed block record (see [`cairn_primitives::codec`]).
//! If the server cannot read a requested height from disk it sends the
//! zero-length "no block" marker in its place and closes the connection.
//!
//! The server serves one connection to completion before accepting the
//! next. Peers are not authenticated; the client trusts whichever replica
//! the substrate reports as leader.

use std::collections::BTreeMap;
use std::io::{Read, Write};
use std::net::{Ipv4Addr, Ipv6Addr, Shutdown, SocketAddr, TcpListener, TcpStream};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use cairn_ledger::BlockStore;
use cairn_primitives::codec::{
    decode_reply, encode_message, read_block_record, write_block_record, write_empty_record,
};
use cairn_primitives::{BlockHeight, ClientRequest, Message, Reply, ReplicaId};

use crate::config::SyncConfig;
use crate::error::SyncError;
use crate::substrate::Substrate;

fn wire_height(height: BlockHeight) -> Result<u32, SyncError> {
    u32::try_from(height).map_err(|_| SyncError::HeightOutOfRange(height))
}

// ── Client ──

/// Pulls block ranges from the leader's sync endpoint into the local store.
#[derive(Clone)]
pub struct SyncClient {
    substrate: Arc<dyn Substrate>,
    store: BlockStore,
    peers: BTreeMap<ReplicaId, String>,
    io_timeout: Option<Duration>,
}

impl SyncClient {
    pub fn new(substrate: Arc<dyn Substrate>, store: BlockStore, config: &SyncConfig) -> Self {
        Self {
            substrate,
            store,
            peers: config.peers.clone(),
            io_timeout: config.io_timeout(),
        }
    }

    fn query(&self, request: ClientRequest) -> Result<Reply, SyncError> {
        let reply = self
            .substrate
            .submit_unordered(&encode_message(&Message::Client(request)))?;
        decode_reply(&reply).map_err(|e| SyncError::Query(e.to_string()))
    }

    /// Current leader and its tip height, asked through unordered queries.
    pub fn leader_tip(&self) -> Result<(ReplicaId, BlockHeight), SyncError> {
        let leader = match self.query(ClientRequest::GetLeader)? {
            Reply::Leader(id) => id,
            other => return Err(SyncError::Query(format!("{other:?}"))),
        };
        let top = match self.query(ClientRequest::GetMostRecentBlockHeight)? {
            Reply::Height(h) => h,
            other => return Err(SyncError::Query(format!("{other:?}"))),
        };
        Ok((leader, top))
    }

    /// Fetch every block from `bottom` up to the leader's tip.
    ///
    /// Returns the number of blocks persisted; zero if the local store is
    /// already past the leader's tip.
    pub fn sync_from_leader(&self, bottom: BlockHeight) -> Result<usize, SyncError> {
        let (leader, top) = self.leader_tip()?;
        if !self.substrate.current_view().contains(&leader) {
            return Err(SyncError::LeaderNotInView(leader));
        }
        if leader == self.substrate.self_id() {
            return Err(SyncError::SelfIsLeader(leader));
        }
        let addr = self.peers.get(&leader).ok_or(SyncError::UnknownPeer(leader))?;
        if bottom > top {
            tracing::debug!(target: "sync", bottom, top, "already up to date");
            return Ok(0);
        }
        tracing::info!(target: "sync", leader, addr = %addr, bottom, top, "syncing from leader");
        fetch_blocks(addr, &self.store, bottom, top, self.io_timeout)
    }
}

/// Request `[bottom, top]` from the server at `addr`, persisting each block
/// as it arrives.
///
/// Blocks received before a failure stay on disk. The connection is closed
/// on every exit path.
pub fn fetch_blocks(
    addr: &str,
    store: &BlockStore,
    bottom: BlockHeight,
    top: BlockHeight,
    io_timeout: Option<Duration>,
) -> Result<usize, SyncError> {
    if bottom > top {
        return Err(SyncError::InvalidRange { bottom, top });
    }
    wire_height(top)?;

    let mut stream = TcpStream::connect(addr)?;
    stream.set_read_timeout(io_timeout)?;
    stream.set_write_timeout(io_timeout)?;
    let result = receive_range(&mut stream, store, bottom, top);
    let _ = stream.shutdown(Shutdown::Both);

    match &result {
        Ok(count) => tracing::info!(target: "sync", addr, bottom, top, received = count, "sync complete"),
        Err(e) => tracing::warn!(target: "sync", addr, bottom, top, error = %e, "sync aborted"),
    }
    result
}

fn receive_range<S: Read + Write>(
    stream: &mut S,
    store: &BlockStore,
    bottom: BlockHeight,
    top: BlockHeight,
) -> Result<usize, SyncError> {
    let mut request = Vec::with_capacity(8);
    request.extend_from_slice(&wire_height(bottom)?.to_be_bytes());
    request.extend_from_slice(&wire_height(top)?.to_be_bytes());
    stream.write_all(&request)?;
    stream.flush()?;

    let mut received = 0;
    for expected in (bottom..=top).rev() {
        let Some(block) = read_block_record(stream)? else {
            return Err(SyncError::MissingBlock(expected));
        };
        if block.height() != expected {
            return Err(SyncError::UnexpectedHeight {
                expected,
                found: block.height(),
            });
        }
        store.write_block(&block)?;
        received += 1;
    }
    Ok(received)
}

// ── Server ──

/// Serves block ranges from the local store, one connection at a time.
pub struct SyncServer {
    local_addr: SocketAddr,
    stopping: Arc<AtomicBool>,
    handle: Option<JoinHandle<()>>,
}

impl SyncServer {
    /// Bind `addr` and start the accept loop on its own thread.
    pub fn bind(addr: &str, store: BlockStore, io_timeout: Option<Duration>) -> Result<Self, SyncError> {
        let listener = TcpListener::bind(addr)?;
        let local_addr = listener.local_addr()?;
        let stopping = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&stopping);
        let handle = thread::Builder::new()
            .name("sync-server".into())
            .spawn(move || accept_loop(listener, store, io_timeout, flag))?;
        tracing::info!(target: "sync", addr = %local_addr, "sync server listening");
        Ok(Self {
            local_addr,
            stopping,
            handle: Some(handle),
        })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Stop accepting and join the accept thread. Idempotent.
    ///
    /// A connection being served is finished first.
    pub fn shutdown(&mut self) {
        let Some(handle) = self.handle.take() else {
            return;
        };
        self.stopping.store(true, Ordering::SeqCst);
        // wake the blocking accept
        let _ = TcpStream::connect(wake_addr(self.local_addr));
        if handle.join().is_err() {
            tracing::error!(target: "sync", "sync server thread panicked");
        }
        tracing::info!(target: "sync", addr = %self.local_addr, "sync server stopped");
    }
}

impl Drop for SyncServer {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn wake_addr(addr: SocketAddr) -> SocketAddr {
    match addr {
        SocketAddr::V4(v4) if v4.ip().is_unspecified() => {
            SocketAddr::new(Ipv4Addr::LOCALHOST.into(), v4.port())
        }
        SocketAddr::V6(v6) if v6.ip().is_unspecified() => {
            SocketAddr::new(Ipv6Addr::LOCALHOST.into(), v6.port())
        }
        other => other,
    }
}

fn accept_loop(listener: TcpListener, store: BlockStore, io_timeout: Option<Duration>, stopping: Arc<AtomicBool>) {
    for incoming in listener.incoming() {
        if stopping.load(Ordering::SeqCst) {
            break;
        }
        let mut stream = match incoming {
            Ok(stream) => stream,
            Err(e) => {
                tracing::warn!(target: "sync", error = %e, "accept failed");
                continue;
            }
        };
        let peer = stream.peer_addr().ok();
        if let Err(e) = stream
            .set_read_timeout(io_timeout)
            .and_then(|_| stream.set_write_timeout(io_timeout))
        {
            tracing::warn!(target: "sync", error = %e, "failed to set socket timeouts");
        }
        match serve_range(&mut stream, &store) {
            Ok(sent) => tracing::debug!(target: "sync", peer = ?peer, sent, "range served"),
            Err(e) => tracing::warn!(target: "sync", peer = ?peer, error = %e, "range request failed"),
        }
        let _ = stream.shutdown(Shutdown::Both);
    }
}

/// Answer one range request on `stream`; returns the number of blocks sent.
pub fn serve_range<S: Read + Write>(stream: &mut S, store: &BlockStore) -> Result<usize, SyncError> {
    let mut request = [0u8; 8];
    stream.read_exact(&mut request)?;
    let bottom = BlockHeight::from(u32::from_be_bytes([request[0], request[1], request[2], request[3]]));
    let top = BlockHeight::from(u32::from_be_bytes([request[4], request[5], request[6], request[7]]));
    if bottom > top {
        return Err(SyncError::InvalidRange { bottom, top });
    }

    let mut sent = 0;
    for height in (bottom..=top).rev() {
        match store.read_block(height) {
            Ok(block) => {
                write_block_record(stream, &block)?;
                sent += 1;
            }
            Err(e) => {
                tracing::warn!(target: "sync", height, error = %e, "cannot serve block");
                write_empty_record(stream)?;
                stream.flush()?;
                return Err(SyncError::MissingBlock(height));
            }
        }
    }
    stream.flush()?;
    Ok(sent)
}

//! Multi-process runtime over TCP.
//!
//! Each rank runs in its own process and listens on its entry of the peer
//! list. During bootstrap a rank dials every lower rank and accepts one
//! connection from every higher rank, so the group ends up fully meshed.
//! The first frame on a dialed connection is a [`Tag::Hello`] carrying the
//! dialer's rank.

use std::net::SocketAddr;
use std::time::Duration;

use async_trait::async_trait;
use tokio::io::{BufReader, ErrorKind};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::Mutex;
use tracing::{debug, info};

use crate::group::{Group, Transport};
use crate::wire::{Frame, Tag, read_frame, write_frame};
use crate::{Error, RankContext};

pub const RANK_VAR: &str = "MATMUL_RANK";
pub const SIZE_VAR: &str = "MATMUL_SIZE";
pub const PEERS_VAR: &str = "MATMUL_PEERS";

const MAX_CONNECT_RETRIES: usize = 20;
const MAX_CONNECT_DELAY: Duration = Duration::from_secs(2);

pub type TcpCommunicator = Group<TcpTransport>;

/// Launch parameters handed to a rank by its launcher.
#[derive(Debug, Clone)]
pub struct LaunchEnv {
    pub ctx: RankContext,
    pub peers: Vec<SocketAddr>,
}

impl LaunchEnv {
    /// Returns `true` when this process was started by a launcher.
    pub fn is_present() -> bool {
        std::env::var_os(RANK_VAR).is_some()
    }

    /// Reads `MATMUL_RANK`, `MATMUL_SIZE` and `MATMUL_PEERS` from the
    /// process environment.
    pub fn from_env() -> Result<Self, Error> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, Error>
    where
        F: Fn(&str) -> Option<String>,
    {
        let rank = parse_var(&lookup, RANK_VAR)?;
        let size = parse_var(&lookup, SIZE_VAR)?;
        let ctx = RankContext::new(rank, size)?;

        let raw = lookup(PEERS_VAR)
            .ok_or_else(|| Error::Unavailable(format!("{} is not set", PEERS_VAR)))?;
        let peers = raw
            .split(',')
            .map(|addr| addr.trim().parse::<SocketAddr>())
            .collect::<Result<Vec<_>, _>>()?;
        if peers.len() != size {
            return Err(Error::Unavailable(format!(
                "{} lists {} addresses for {} ranks",
                PEERS_VAR,
                peers.len(),
                size
            )));
        }

        Ok(Self { ctx, peers })
    }
}

fn parse_var<F>(lookup: &F, key: &str) -> Result<usize, Error>
where
    F: Fn(&str) -> Option<String>,
{
    let raw = lookup(key).ok_or_else(|| Error::Unavailable(format!("{} is not set", key)))?;
    raw.trim()
        .parse()
        .map_err(|_| Error::Unavailable(format!("{}={:?} is not a non-negative integer", key, raw)))
}

/// Binds this rank's listening address and meshes with every peer.
pub async fn connect(env: &LaunchEnv) -> Result<TcpCommunicator, Error> {
    let addr = *env.peers.get(env.ctx.rank()).ok_or(Error::SizeMismatch {
        op: "peer list",
        expected: env.ctx.size(),
        actual: env.peers.len(),
    })?;
    let listener = TcpListener::bind(addr).await?;
    establish(env.ctx, listener, &env.peers).await
}

/// Meshes with every peer using an already bound listener.
///
/// `peers[r]` must be the address rank `r` is listening on.
pub async fn establish(
    ctx: RankContext,
    listener: TcpListener,
    peers: &[SocketAddr],
) -> Result<TcpCommunicator, Error> {
    let rank = ctx.rank();
    let size = ctx.size();
    if peers.len() != size {
        return Err(Error::SizeMismatch {
            op: "peer list",
            expected: size,
            actual: peers.len(),
        });
    }

    let inbound = size - rank - 1;
    let accept = async {
        let mut accepted = Vec::with_capacity(inbound);
        while accepted.len() < inbound {
            let (mut stream, addr) = listener.accept().await?;
            stream.set_nodelay(true)?;
            let hello = read_frame(&mut stream).await?;
            if hello.tag != Tag::Hello || hello.source <= rank || hello.source >= size {
                return Err(Error::Protocol(format!(
                    "unexpected {:?} frame from rank {} at {}",
                    hello.tag, hello.source, addr
                )));
            }
            debug!(peer = hello.source, %addr, "accepted");
            accepted.push((hello.source, stream));
        }
        Ok::<_, Error>(accepted)
    };
    let dial = async {
        let mut dialed = Vec::with_capacity(rank);
        for (peer, addr) in peers.iter().enumerate().take(rank) {
            let mut stream = connect_with_retry(*addr).await?;
            stream.set_nodelay(true)?;
            write_frame(&mut stream, &Frame::empty(Tag::Hello, rank)).await?;
            debug!(peer, %addr, "dialed");
            dialed.push((peer, stream));
        }
        Ok::<_, Error>(dialed)
    };
    let (accepted, dialed) = tokio::try_join!(accept, dial)?;

    let mut readers: Vec<Option<Mutex<BufReader<OwnedReadHalf>>>> = (0..size).map(|_| None).collect();
    let mut writers: Vec<Option<Mutex<OwnedWriteHalf>>> = (0..size).map(|_| None).collect();
    for (peer, stream) in accepted.into_iter().chain(dialed) {
        if writers[peer].is_some() {
            return Err(Error::Protocol(format!("rank {} connected twice", peer)));
        }
        let (read, write) = stream.into_split();
        readers[peer] = Some(Mutex::new(BufReader::new(read)));
        writers[peer] = Some(Mutex::new(write));
    }

    info!(rank, size, "tcp group established");
    Ok(Group::new(ctx, TcpTransport { readers, writers }))
}

async fn connect_with_retry(addr: SocketAddr) -> Result<TcpStream, Error> {
    let mut retries = 0;
    let mut delay = Duration::from_millis(50);

    loop {
        match TcpStream::connect(addr).await {
            Ok(stream) => return Ok(stream),
            Err(e) => {
                retries += 1;
                if retries >= MAX_CONNECT_RETRIES {
                    return Err(Error::Unavailable(format!(
                        "could not reach {} after {} attempts: {}",
                        addr, retries, e
                    )));
                }
                debug!(%addr, retries, "peer not listening yet");
                tokio::time::sleep(delay).await;
                delay = (delay * 2).min(MAX_CONNECT_DELAY);
            }
        }
    }
}

/// Socket halves of one rank, indexed by peer rank.
pub struct TcpTransport {
    readers: Vec<Option<Mutex<BufReader<OwnedReadHalf>>>>,
    writers: Vec<Option<Mutex<OwnedWriteHalf>>>,
}

#[async_trait]
impl Transport for TcpTransport {
    async fn send(&self, peer: usize, frame: Frame) -> Result<(), Error> {
        let size = self.writers.len();
        let writer = self
            .writers
            .get(peer)
            .and_then(Option::as_ref)
            .ok_or(Error::InvalidRank { rank: peer, size })?;
        let mut writer = writer.lock().await;
        match write_frame(&mut *writer, &frame).await {
            Err(Error::Io(e)) if e.kind() == ErrorKind::BrokenPipe => Err(Error::Disconnected(peer)),
            other => other,
        }
    }

    async fn recv(&self, peer: usize) -> Result<Frame, Error> {
        let size = self.readers.len();
        let reader = self
            .readers
            .get(peer)
            .and_then(Option::as_ref)
            .ok_or(Error::InvalidRank { rank: peer, size })?;
        let mut reader = reader.lock().await;
        match read_frame(&mut *reader).await {
            Err(Error::Io(e)) if e.kind() == ErrorKind::UnexpectedEof => Err(Error::Disconnected(peer)),
            other => other,
        }
    }
}

use std::io;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use log::*;
use rtutcp::frame;
use rtutcp::HexDump;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::{TcpListener, UnixListener};
use tokio::sync::Mutex;
use tokio_vsock::{VsockAddr, VsockListener};

use crate::slave::Slave;

/// How long to wait for the rest of a frame whose length cannot be derived
/// from its header.
const TRAILING_BYTES_WAIT: Duration = Duration::from_millis(50);

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ServerTarget {
    Unix(PathBuf),
    Tcp(SocketAddr),
    Vsock { cid: u32, port: u32 },
}

impl FromStr for ServerTarget {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (scheme, rest) = s
            .split_once(':')
            .ok_or_else(|| format!("missing scheme in target {:?}", s))?;
        match scheme {
            "tcp" => rest
                .parse()
                .map(ServerTarget::Tcp)
                .map_err(|e| format!("bad tcp address {:?}: {}", rest, e)),
            "unix" => Ok(ServerTarget::Unix(PathBuf::from(rest))),
            "vsock" => {
                let (cid, port) = rest
                    .split_once(':')
                    .ok_or_else(|| format!("expected vsock:<cid>:<port>, got {:?}", s))?;
                let cid = cid.parse().map_err(|e| format!("bad vsock cid {:?}: {}", cid, e))?;
                let port = port.parse().map_err(|e| format!("bad vsock port {:?}: {}", port, e))?;
                Ok(ServerTarget::Vsock { cid, port })
            }
            other => Err(format!("unknown scheme {:?}", other)),
        }
    }
}

pub struct RtuServer {
    target: ServerTarget,
    slave: Arc<Mutex<Slave>>,
}

impl RtuServer {
    pub fn new(target: ServerTarget, slave: Slave) -> Self {
        Self {
            target,
            slave: Arc::new(Mutex::new(slave)),
        }
    }

    pub async fn run(&self) -> io::Result<()> {
        match &self.target {
            ServerTarget::Unix(path) => {
                if path.exists() {
                    let _ = std::fs::remove_file(path);
                }
                let listener = UnixListener::bind(path)?;
                info!("Server listening on Unix Socket {:?}", path);
                loop {
                    let (stream, _) = listener.accept().await?;
                    info!("Accepted Unix connection");
                    tokio::spawn(Self::handle_connection(stream, self.slave.clone()));
                }
            }
            ServerTarget::Tcp(addr) => {
                let listener = TcpListener::bind(addr).await?;
                info!("Server listening on TCP {:?}", addr);
                loop {
                    let (stream, peer) = listener.accept().await?;
                    info!("Accepted TCP connection from {:?}", peer);
                    tokio::spawn(Self::handle_connection(stream, self.slave.clone()));
                }
            }
            ServerTarget::Vsock { cid, port } => {
                let listener = VsockListener::bind(VsockAddr::new(*cid, *port))?;
                info!("Server listening on Vsock CID:{} Port:{}", cid, port);
                loop {
                    let (stream, addr) = listener.accept().await?;
                    info!("Accepted Vsock connection from {:?}", addr);
                    tokio::spawn(Self::handle_connection(stream, self.slave.clone()));
                }
            }
        }
    }

    /// Answers request frames on one connection until the peer goes away.
    pub async fn handle_connection<S>(mut stream: S, slave: Arc<Mutex<Slave>>)
    where
        S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
    {
        loop {
            let request = match read_request(&mut stream).await {
                Ok(Some(request)) => request,
                Ok(None) => {
                    info!("Connection closed by remote");
                    break;
                }
                Err(e) => {
                    error!("Read error: {}", e);
                    break;
                }
            };
            trace!("Request: {}", HexDump(&request));

            let reply = slave.lock().await.handle(&request);
            if let Some(reply) = reply {
                trace!("Reply: {}", HexDump(&reply));
                if let Err(e) = stream.write_all(&reply).await {
                    error!("Write error: {}", e);
                    break;
                }
            }
        }
    }
}

/// Reads one request frame. Returns `None` on a clean end of stream.
async fn read_request<S>(stream: &mut S) -> io::Result<Option<Vec<u8>>>
where
    S: AsyncRead + Unpin,
{
    let mut adu = vec![0u8; 2];
    match stream.read_exact(&mut adu).await {
        Ok(_) => {}
        Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => return Ok(None),
        Err(e) => return Err(e),
    }

    match adu[1] {
        frame::READ_COILS..=frame::WRITE_SINGLE_REGISTER => {
            read_more(stream, &mut adu, 6).await?;
        }
        frame::WRITE_MULTIPLE_COILS | frame::WRITE_MULTIPLE_REGISTERS => {
            read_more(stream, &mut adu, 5).await?;
            let byte_count = adu[6] as usize;
            read_more(stream, &mut adu, byte_count + 2).await?;
        }
        frame::MASK_WRITE_REGISTER => {
            read_more(stream, &mut adu, 8).await?;
        }
        frame::READ_WRITE_MULTIPLE_REGISTERS => {
            read_more(stream, &mut adu, 9).await?;
            let byte_count = adu[10] as usize;
            read_more(stream, &mut adu, byte_count + 2).await?;
        }
        _ => {
            // Unknown layout: take whatever follows closely.
            let mut buf = [0u8; rtutcp::RTU_MAX_SIZE];
            if let Ok(read) = tokio::time::timeout(TRAILING_BYTES_WAIT, stream.read(&mut buf)).await {
                let n = read?;
                adu.extend_from_slice(&buf[..n]);
            }
        }
    }
    Ok(Some(adu))
}

async fn read_more<S>(stream: &mut S, adu: &mut Vec<u8>, count: usize) -> io::Result<()>
where
    S: AsyncRead + Unpin,
{
    let start = adu.len();
    adu.resize(start + count, 0);
    stream.read_exact(&mut adu[start..]).await?;
    Ok(())
}

use std::net::SocketAddr;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Instant;

use log::*;
use rtutcp::frame::{self, EXCEPTION_BIT};
use rtutcp::io::Connection;
use rtutcp::{Error, HexDump, Result, RtuOverTcpTransport, TcpTransport, TransportConfig};
use tokio::net::UnixStream;
use tokio_vsock::{VsockAddr, VsockStream};

const SLAVE_ID: u8 = 1;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClientTarget {
    Unix(PathBuf),
    Tcp(SocketAddr),
    Vsock { cid: u32, port: u32 },
}

impl FromStr for ClientTarget {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let (scheme, rest) = s
            .split_once(':')
            .ok_or_else(|| format!("missing scheme in target {:?}", s))?;
        match scheme {
            "tcp" => rest
                .parse()
                .map(ClientTarget::Tcp)
                .map_err(|e| format!("bad tcp address {:?}: {}", rest, e)),
            "unix" => Ok(ClientTarget::Unix(PathBuf::from(rest))),
            "vsock" => {
                let (cid, port) = rest
                    .split_once(':')
                    .ok_or_else(|| format!("expected vsock:<cid>:<port>, got {:?}", s))?;
                let cid = cid.parse().map_err(|e| format!("bad vsock cid {:?}: {}", cid, e))?;
                let port = port.parse().map_err(|e| format!("bad vsock port {:?}: {}", port, e))?;
                Ok(ClientTarget::Vsock { cid, port })
            }
            other => Err(format!("unknown scheme {:?}", other)),
        }
    }
}

pub struct RtuClient {
    target: ClientTarget,
    config: TransportConfig,
}

impl RtuClient {
    pub fn new(target: ClientTarget, config: TransportConfig) -> Self {
        Self { target, config }
    }

    pub async fn run(&self) -> Result<()> {
        info!("Connecting to target: {:?}", self.target);
        match &self.target {
            ClientTarget::Unix(path) => {
                let stream = UnixStream::connect(path).await.map_err(Error::Connect)?;
                info!("Unix socket connected.");
                let transport = RtuOverTcpTransport::with_config(stream, self.config.clone());
                Self::run_session(&transport).await
            }
            ClientTarget::Tcp(addr) => {
                let transport = TcpTransport::connect(*addr, self.config.clone()).await?;
                info!("TCP socket connected.");
                Self::run_session(&transport).await
            }
            ClientTarget::Vsock { cid, port } => {
                let stream = VsockStream::connect(VsockAddr::new(*cid, *port))
                    .await
                    .map_err(Error::Connect)?;
                info!("Vsock socket connected.");
                let transport = RtuOverTcpTransport::with_config(stream, self.config.clone());
                Self::run_session(&transport).await
            }
        }
    }

    /// Runs the demo requests one after another, then closes the connection.
    async fn run_session<T: Connection>(transport: &RtuOverTcpTransport<T>) -> Result<()> {
        debug!("Transport config: {:?}", transport.config());
        let requests = [
            (
                "read holding registers",
                frame::read_holding_registers(SLAVE_ID, 300, 1),
            ),
            (
                "write multiple registers",
                frame::write_multiple_registers(SLAVE_ID, 1, &[3, 4]),
            ),
            (
                "write multiple coils",
                frame::write_multiple_coils(SLAVE_ID, 5, 10, &[4, 3]),
            ),
        ];

        for (name, request) in requests {
            let start = Instant::now();
            let response = transport.exchange(&request).await?;
            let elapsed = start.elapsed();

            if response[1] & EXCEPTION_BIT != 0 {
                warn!(
                    "{}: exception {:#04x} after {:.2} ms",
                    name,
                    response.get(2).copied().unwrap_or_default(),
                    elapsed.as_secs_f64() * 1000.0
                );
            } else {
                info!(
                    "{}: {} bytes after {:.2} ms: {}",
                    name,
                    response.len(),
                    elapsed.as_secs_f64() * 1000.0,
                    HexDump(&response)
                );
            }
        }

        transport.close().await?;
        info!("Connection closed");
        Ok(())
    }
}

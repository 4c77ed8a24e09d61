//! Half-duplex RTU exchange over a byte stream.
//!
//! [`RtuOverTcpTransport`] owns one connection. Each [`exchange`] writes a
//! request frame and reads back exactly one response frame; the lock taken
//! for the whole call keeps concurrent callers from interleaving on the wire.
//! A background task closes the connection once it has been idle for the
//! configured period.
//!
//! [`exchange`]: RtuOverTcpTransport::exchange

use std::io;
use std::sync::{Arc, Weak};
use std::time::Duration;

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpStream, ToSocketAddrs};
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio::time::Instant;

use crate::config::TransportConfig;
use crate::error::{Error, Result};
use crate::frame::{self, ResponseLength, RtuFrameLength};
use crate::io::{read_at_least, Connection, Deadline};
use crate::trace::{HexDump, TraceSink};
use crate::{RTU_EXCEPTION_SIZE, RTU_MAX_SIZE, RTU_MIN_SIZE};

/// Modbus RTU transport over a stream connection.
///
/// # Example
///
/// ```rust,ignore
/// use rtutcp::{frame, RtuOverTcpTransport, TransportConfig};
///
/// let stream = tokio::net::TcpStream::connect("127.0.0.1:5020").await?;
/// let transport = RtuOverTcpTransport::with_config(stream, TransportConfig::default());
///
/// let response = transport.exchange(&frame::read_holding_registers(1, 300, 1)).await?;
/// ```
pub struct RtuOverTcpTransport<T, P = RtuFrameLength> {
    shared: Arc<Shared<T>>,
    predictor: P,
    config: TransportConfig,
}

/// State reachable from both the exchange path and the idle task.
struct Shared<T> {
    state: Mutex<State<T>>,
    idle_timeout: Option<Duration>,
    trace: Arc<dyn TraceSink>,
}

struct State<T> {
    conn: Option<T>,
    last_activity: Instant,
    idle_timer: Option<JoinHandle<()>>,
}

impl<T: Connection> RtuOverTcpTransport<T> {
    /// Wraps `conn` with the default configuration.
    pub fn new(conn: T) -> Self {
        Self::with_config(conn, TransportConfig::default())
    }

    /// Wraps `conn` with the given configuration.
    pub fn with_config(conn: T, config: TransportConfig) -> Self {
        Self::with_predictor(conn, config, RtuFrameLength)
    }
}

/// Transport over a TCP stream with the standard length table.
pub type TcpTransport = RtuOverTcpTransport<TcpStream, RtuFrameLength>;

impl TcpTransport {
    /// Dials `addr` and wraps the stream. Dialing is bounded by the request
    /// timeout.
    pub async fn connect<A: ToSocketAddrs>(addr: A, config: TransportConfig) -> Result<Self> {
        let deadline = config
            .request_deadline()
            .map(|timeout| Deadline::after(Instant::now(), timeout));
        let stream = Deadline::run(deadline, "connect", TcpStream::connect(addr))
            .await?
            .map_err(Error::Connect)?;
        stream.set_nodelay(true).map_err(Error::Connect)?;

        if let Ok(peer) = stream.peer_addr() {
            log::info!("Connected to {}", peer);
        }
        Ok(Self::with_config(stream, config))
    }
}

impl<T: Connection, P: ResponseLength> RtuOverTcpTransport<T, P> {
    /// Wraps `conn`, predicting response lengths with `predictor`.
    pub fn with_predictor(conn: T, config: TransportConfig, predictor: P) -> Self {
        let shared = Arc::new(Shared {
            state: Mutex::new(State {
                conn: Some(conn),
                last_activity: Instant::now(),
                idle_timer: None,
            }),
            idle_timeout: config.idle_deadline(),
            trace: config.trace.clone(),
        });

        Self {
            shared,
            predictor,
            config,
        }
    }

    /// Returns the configuration.
    pub fn config(&self) -> &TransportConfig {
        &self.config
    }

    /// Returns true until the connection has been closed.
    pub async fn is_connected(&self) -> bool {
        self.shared.state.lock().await.conn.is_some()
    }

    /// Sends `request` and returns the raw response frame.
    ///
    /// Holds the transport lock for the whole round trip. The response is
    /// returned unmodified; its CRC is not checked here.
    ///
    /// # Errors
    ///
    /// - [`Error::RequestTooShort`] if the request has no function code
    /// - [`Error::ConnectionClosed`] if the connection was closed
    /// - [`Error::Write`] / [`Error::Read`] on stream failures, including end
    ///   of stream before the frame was complete
    /// - [`Error::Timeout`] if the request deadline expired
    pub async fn exchange(&self, request: &[u8]) -> Result<Vec<u8>> {
        if request.len() < 2 {
            return Err(Error::RequestTooShort(request.len()));
        }

        let mut state = self.shared.state.lock().await;
        if state.conn.is_none() {
            return Err(Error::ConnectionClosed);
        }
        state.last_activity = Instant::now();
        Shared::arm_idle_timer(&self.shared, &mut *state);

        let deadline = self
            .config
            .request_deadline()
            .map(|timeout| Deadline::after(state.last_activity, timeout));
        let conn = state.conn.as_mut().ok_or(Error::ConnectionClosed)?;

        self.shared
            .trace
            .trace(format_args!("modbus: sending {}", HexDump(request)));
        Deadline::run(deadline, "write", async {
            conn.write_all(request).await?;
            conn.flush().await
        })
        .await?
        .map_err(Error::Write)?;

        let function = request[1];
        let expected = self.predictor.response_length(request);

        let mut data = [0u8; RTU_MAX_SIZE];
        let n = Deadline::run(deadline, "read", read_response(conn, &mut data, function, expected))
            .await?
            .map_err(Error::Read)?;

        let response = data[..n].to_vec();
        self.shared
            .trace
            .trace(format_args!("modbus: received {}", HexDump(&response)));
        Ok(response)
    }

    /// Closes the connection and cancels the idle timer.
    ///
    /// Closing an already closed transport is a no-op.
    pub async fn close(&self) -> Result<()> {
        let mut state = self.shared.state.lock().await;
        if let Some(timer) = state.idle_timer.take() {
            timer.abort();
        }
        Shared::close_locked(&mut *state).await
    }
}

impl<T: Connection> Shared<T> {
    /// Restarts the idle countdown from now. Caller holds the lock.
    fn arm_idle_timer(this: &Arc<Self>, state: &mut State<T>) {
        let Some(idle_timeout) = this.idle_timeout else {
            return;
        };
        if let Some(timer) = state.idle_timer.take() {
            timer.abort();
        }

        let weak: Weak<Self> = Arc::downgrade(this);
        state.idle_timer = Some(tokio::spawn(async move {
            tokio::time::sleep(idle_timeout).await;
            if let Some(shared) = weak.upgrade() {
                shared.close_idle().await;
            }
        }));
        log::trace!("idle timer armed for {:?}", idle_timeout);
    }

    /// Closes the connection if nothing was exchanged for the idle timeout.
    ///
    /// An exchange that started after the timer fired but before the lock was
    /// taken leaves `last_activity` recent, and the check below keeps the
    /// connection open.
    async fn close_idle(&self) {
        let Some(idle_timeout) = self.idle_timeout else {
            return;
        };
        let mut state = self.state.lock().await;
        let idle = state.last_activity.elapsed();
        if idle < idle_timeout || state.conn.is_none() {
            return;
        }

        self.trace.trace(format_args!(
            "modbus: closing connection due to idle timeout: {:?}",
            idle
        ));
        // The stored handle is the task running this call.
        state.idle_timer = None;
        if let Err(e) = Self::close_locked(&mut *state).await {
            log::debug!("idle close: {}", e);
        }
    }

    /// Shuts the stream down and marks it absent. Caller holds the lock.
    async fn close_locked(state: &mut State<T>) -> Result<()> {
        match state.conn.take() {
            Some(mut conn) => conn.shutdown().await.map_err(Error::Close),
            None => Ok(()),
        }
    }
}

impl<T, P> Drop for RtuOverTcpTransport<T, P> {
    fn drop(&mut self) {
        if let Ok(mut state) = self.shared.state.try_lock() {
            if let Some(timer) = state.idle_timer.take() {
                timer.abort();
            }
        }
    }
}

/// Reads one response frame into `data` and returns its length.
///
/// The first read collects at least [`RTU_MIN_SIZE`] bytes, enough to see the
/// function code. A normal reply is then completed to `expected` bytes when
/// that length is plausible; an exception reply is always
/// [`RTU_EXCEPTION_SIZE`] bytes. Any other function code returns what the
/// first read delivered.
async fn read_response<R>(
    conn: &mut R,
    data: &mut [u8; RTU_MAX_SIZE],
    function: u8,
    expected: usize,
) -> io::Result<usize>
where
    R: AsyncRead + Unpin + ?Sized,
{
    let mut n = read_at_least(conn, data, RTU_MIN_SIZE).await?;

    let code = data[1];
    if code == function {
        if n < expected && expected > RTU_MIN_SIZE && expected <= RTU_MAX_SIZE {
            conn.read_exact(&mut data[n..expected]).await?;
            n = expected;
        }
    } else if code == frame::exception_code(function) {
        if n < RTU_EXCEPTION_SIZE {
            conn.read_exact(&mut data[n..RTU_EXCEPTION_SIZE]).await?;
        } else if n > RTU_EXCEPTION_SIZE {
            log::debug!(
                "discarding {} bytes after exception reply",
                n - RTU_EXCEPTION_SIZE
            );
        }
        n = RTU_EXCEPTION_SIZE;
        log::debug!(
            "exception reply to function {:#04x}: code {:#04x}",
            function,
            data[2]
        );
    } else {
        log::debug!(
            "unexpected function code {:#04x} in reply to {:#04x}, returning {} bytes",
            code,
            function,
            n
        );
    }
    Ok(n)
}

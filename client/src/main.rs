use log::*;
use std::sync::Arc;
use std::time::Duration;

use rtutcp::{LogSink, TransportConfig};

mod rtu_client;

use rtu_client::{ClientTarget, RtuClient};

const DEFAULT_TARGET: &str = "tcp:127.0.0.1:5020";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(5);

#[tokio::main]
async fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("debug")).init();

    // tcp:<addr>, unix:<path> or vsock:<cid>:<port>
    let target = std::env::args()
        .nth(1)
        .unwrap_or_else(|| DEFAULT_TARGET.to_string());
    let target: ClientTarget = match target.parse() {
        Ok(target) => target,
        Err(e) => {
            error!("Invalid target: {}", e);
            std::process::exit(2);
        }
    };

    let config = TransportConfig::default()
        .with_request_timeout(REQUEST_TIMEOUT)
        .with_trace(Arc::new(LogSink::new("tcp: ")));

    let client = RtuClient::new(target, config);
    if let Err(e) = client.run().await {
        error!("Session failed: {}", e);
        std::process::exit(1);
    }
}

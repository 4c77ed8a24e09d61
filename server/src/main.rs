use log::*;

mod rtu_server;
mod slave;

use rtu_server::{RtuServer, ServerTarget};
use slave::Slave;

const DEFAULT_TARGET: &str = "tcp:0.0.0.0:5020";
const SLAVE_ID: u8 = 1;

#[tokio::main]
async fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("trace")).init();

    // tcp:<addr>, unix:<path> or vsock:<cid>:<port>
    let target = std::env::args()
        .nth(1)
        .unwrap_or_else(|| DEFAULT_TARGET.to_string());
    let target: ServerTarget = match target.parse() {
        Ok(target) => target,
        Err(e) => {
            error!("Invalid target: {}", e);
            std::process::exit(2);
        }
    };

    let slave = Slave::new(SLAVE_ID);
    info!("Simulating slave {} on {:?}", slave.id(), target);

    let server = RtuServer::new(target, slave);
    if let Err(e) = server.run().await {
        error!("Server stopped: {}", e);
        std::process::exit(1);
    }
}

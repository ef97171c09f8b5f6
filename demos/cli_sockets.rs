/// Connect to the HAProxy Unix socket at the default address (or `HAPCTL_SOCKET`). Once
/// connected, enumerate all CLI sockets via a `show cli sockets` command. Display all sockets and
/// attempt to connect to any supported sockets, reporting any errors.
use hapctl::{CliSocketAddr, Client, ClientConfig, ConnectionBuilder, UnixSocketBuilder};
use tracing::{info, warn};

#[tokio::main(flavor = "current_thread")]
async fn main() -> hapctl::Result<()> {
    hapctl::init_logging()?;

    let config = ClientConfig::default().with_env_overrides()?;
    let client = Client::new(&config)?;
    let level = client.level().await?;
    info!(?level, "connected");

    for socket in client.cli_sockets().await? {
        info!(?socket, "attempting connection to socket");
        match socket.address {
            CliSocketAddr::Unix(path) => {
                let connection_builder: UnixSocketBuilder = path.into();
                match connection_builder.connect().await {
                    Ok(_) => info!("connected successfully"),
                    Err(err) => warn!(%err, "failed to connect"),
                };
            }
            _ => info!("socket type not supported"),
        }
    }
    Ok(())
}

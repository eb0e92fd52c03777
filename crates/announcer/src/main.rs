//! Herald announcer binary

use herald_announcer::{AnnounceServer, Config};
use herald_common::{logging, Error, Result};

#[tokio::main]
async fn main() -> Result<()> {
    logging::init();

    tracing::info!("Herald announcer starting");

    let config = Config::load().map_err(Error::config)?;
    let server = AnnounceServer::new(config);

    server.run().await?;

    Ok(())
}

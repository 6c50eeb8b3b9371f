use std::sync::Arc;

use clap::Parser;
use kvadmin::config::ServerConfig;
use kvadmin::server::FileServer;
use kvadmin::{AdminConfig, AdminService, Locator, StoreHandle};
use tokio::signal;

#[derive(Parser, Debug)]
#[command(author, version, about = "Serve stored binary records over HTTP", long_about = None)]
struct Args {
    /// Store file path, or `:memory:` [env: KVADMIN_STORE]
    #[arg(short, long)]
    store: Option<String>,

    /// [env: KVADMIN_PORT]
    #[arg(short, long)]
    port: Option<String>,

    /// First key segment of every served record [env: KVADMIN_NAMESPACE]
    #[arg(short, long)]
    namespace: Option<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    env_logger::init();
    let args = Args::parse();
    let config = ServerConfig::resolve(args.store, args.port, args.namespace);

    let locator: Locator = config.locator.parse()?;
    let handle = StoreHandle::open(&locator).await?;
    let admin = Arc::new(AdminService::with_config(handle, AdminConfig::from_env()));
    let files = Arc::new(FileServer::new(admin, config.namespace.clone()));

    println!("Serving /{}/ from {} on :{}", config.namespace, locator, config.port);

    tokio::select! {
        res = files.listen(&config.port) => {
            if let Err(e) = res {
                log::error!("HTTP server failed: {}", e);
                eprintln!("HTTP server failed: {}", e);
            }
        }
        _ = signal::ctrl_c() => {
            println!("\nShutdown signal received. Exiting.");
        }
    }

    Ok(())
}

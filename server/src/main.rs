use clap::Parser;
use log::info;
use server::auth::UserDirectory;
use server::config::ServerConfig;
use server::network::Server;
use std::path::PathBuf;
use std::sync::Arc;

/// Main-method of the application.
/// Loads the settings, then serves sessions until Ctrl+C.
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Command line arguments
    #[derive(Parser, Debug)]
    #[clap(author, version, about)]
    struct Args {
        /// TOML settings file
        #[clap(short, long)]
        config: Option<PathBuf>,
        /// Server IP address to bind to
        #[clap(short = 'H', long)]
        host: Option<String>,
        /// Server port to listen on
        #[clap(short, long)]
        port: Option<u16>,
        /// File that finished games are appended to
        #[clap(short, long)]
        results: Option<PathBuf>,
        /// Stream board snapshots on the frame channel
        #[clap(short, long)]
        stream: bool,
    }

    env_logger::init();
    let args = Args::parse();

    let mut config = match &args.config {
        Some(path) => ServerConfig::load_from_file(path).await?,
        None => ServerConfig::default(),
    };

    // Command line flags override the file
    if let Some(host) = args.host {
        config.host = host;
    }
    if let Some(port) = args.port {
        config.port = port;
    }
    if let Some(results) = args.results {
        config.results_path = results;
    }
    config.stream_frames |= args.stream;

    let users = UserDirectory::from_list(&config.users);
    info!("Loaded {} users", users.len());

    let server = Server::bind(config, Arc::new(users)).await?;
    let best = server
        .run(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                log::error!("Failed to listen for Ctrl+C: {}", e);
            }
        })
        .await;

    if let Some(record) = best {
        println!(
            "Mejor resultado: {} con {} puntos en {}s",
            record.name, record.score, record.elapsed_secs
        );
    }

    Ok(())
}

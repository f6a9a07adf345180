use clap::Parser;
use client::network;
use log::{error, info};
use std::io::{self, BufRead};
use std::thread;
use tokio::sync::mpsc;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Server address to connect to
    #[arg(short = 's', long, default_value = "127.0.0.1:9090")]
    server: String,

    /// Username, asked for interactively when missing
    #[arg(short = 'u', long)]
    user: Option<String>,

    /// Password, asked for interactively when missing
    #[arg(short = 'p', long)]
    password: Option<String>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    if std::env::var("RUST_LOG").is_err() {
        eprintln!("Set RUST_LOG=info for detailed logging");
    }

    let args = Args::parse();

    info!("Starting client...");
    info!("Commands: arriba, abajo, izquierda, derecha, salir");

    let mut client = network::Client::connect(&args.server)
        .await?
        .with_credentials(args.user, args.password)
        .with_echo(true);

    // Stdin is read on a plain thread
    let (input_tx, input_rx) = mpsc::channel(64);
    thread::spawn(move || {
        for line in io::stdin().lock().lines() {
            match line {
                Ok(line) => {
                    if input_tx.blocking_send(line).is_err() {
                        break;
                    }
                }
                Err(e) => {
                    error!("Failed to read stdin: {}", e);
                    break;
                }
            }
        }
    });

    let report = client.run(input_rx).await;
    match report.summary {
        Some(summary) => println!(
            "Puntaje final: {} en {}s",
            summary.score, summary.elapsed_secs
        ),
        None if report.rejected => println!("No se pudo iniciar sesión"),
        None => {}
    }

    Ok(())
}

use std::process::ExitCode;
use std::time::Duration;

use clap::Parser;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use socks5_dial::{AsyncDialer, DialerConfig, Error, ProxyNetwork};

/// Opens a tunnel to each target through a SOCKS5 proxy and prints the
/// first line the target answers with.
#[derive(Parser, Debug)]
#[command(name = "socks5-fetch")]
#[command(version)]
struct CliArgs {
    /// SOCKS5 proxy address (host:port, or a socket path for unix)
    #[arg(short, long, default_value = "127.0.0.1:9150")]
    proxy: String,

    /// Network used to reach the proxy (tcp, tcp4, tcp6, unix)
    #[arg(long, default_value = "tcp")]
    proxy_network: String,

    /// Per-target timeout in seconds
    #[arg(short, long, default_value_t = 10)]
    timeout: u64,

    /// Targets as host:port
    #[arg(required = true)]
    targets: Vec<String>,
}

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let args = CliArgs::parse();

    let network = match args.proxy_network.parse::<ProxyNetwork>() {
        Ok(network) => network,
        Err(e) => {
            error!("{}", e);
            return ExitCode::FAILURE;
        }
    };

    let limit = Duration::from_secs(args.timeout);
    let config = DialerConfig {
        connect_timeout: Some(limit),
        handshake_timeout: limit,
        ..DialerConfig::default()
    };
    let dialer = AsyncDialer::with_config(network, args.proxy, config);

    let mut tasks = Vec::with_capacity(args.targets.len());
    for target in args.targets {
        let dialer = dialer.clone();
        tasks.push(tokio::spawn(async move {
            let result = tokio::time::timeout(limit, fetch_head(&dialer, &target)).await;
            (target, result)
        }));
    }

    let mut failed = false;
    for task in tasks {
        match task.await {
            Ok((target, Ok(Ok(line)))) => info!("{} - {}", target, line),
            Ok((target, Ok(Err(e)))) => {
                error!("{} - {}", target, e);
                failed = true;
            }
            Ok((target, Err(_))) => {
                error!("{} - timed out after {:?}", target, limit);
                failed = true;
            }
            Err(e) => {
                error!("fetch task failed: {}", e);
                failed = true;
            }
        }
    }

    if failed {
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    }
}

async fn fetch_head(dialer: &AsyncDialer, target: &str) -> Result<String, FetchError> {
    let mut stream = dialer.dial("tcp", target).await?;

    let host = target.rsplit_once(':').map_or(target, |(host, _)| host);
    let request = format!("HEAD / HTTP/1.0\r\nHost: {}\r\n\r\n", host);
    stream.write_all(request.as_bytes()).await?;

    let mut line = String::new();
    BufReader::new(stream).read_line(&mut line).await?;
    Ok(line.trim_end().to_string())
}

#[derive(Debug, thiserror::Error)]
enum FetchError {
    #[error(transparent)]
    Dial(#[from] Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

//! A payment-processing simulator that listens on a local TCP port for incoming connections and
//! answers each `PAYMENT|<amount>` line with a `RESPONSE|<STATUS>|<reason>` line. A simple client
//! connection can be established on the same machine by entering something like:
//!     nc -v 127.0.0.1 8080
//!
//! Each client's connection is handled by its own async-std task. On SIGINT or SIGTERM the
//! listener is closed, in-flight requests get the configured grace period to finish, and any
//! that are still running are cancelled.
use async_std::channel;
use async_std::task;
use clap::Parser;
use payment_simulator::net::TcpListenerFactory;
use payment_simulator::{telemetry, Config, PaymentProcessor, Result, Server};
use std::process::ExitCode;
use std::sync::Arc;
use tracing::{error, info};

fn main() -> ExitCode {
    let config = Config::parse();
    if let Err(e) = telemetry::init(&config.log_level, config.log_format) {
        eprintln!("{e}");
        return ExitCode::FAILURE;
    }

    match task::block_on(serve(config)) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!(error = %e, "Server failed");
            ExitCode::FAILURE
        }
    }
}

async fn serve(config: Config) -> Result<()> {
    let server = Server::bind(
        &TcpListenerFactory,
        &config.address(),
        Arc::new(PaymentProcessor),
    )
    .await?;
    let server = Arc::new(server);
    info!(addr = %server.local_addr()?, "Listening for connections");

    let (signal_tx, signal_rx) = channel::bounded(1);
    ctrlc::set_handler(move || {
        let _ = signal_tx.try_send(());
    })?;

    let accept_loop = task::spawn({
        let server = server.clone();
        async move { server.run().await }
    });

    let _ = signal_rx.recv().await;
    info!("Shutdown signal received");

    let outcome = server.stop(config.grace_period()).await;
    accept_loop.await;
    info!(?outcome, "Shutdown complete");
    Ok(())
}

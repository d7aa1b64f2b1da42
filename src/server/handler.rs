//! Per-connection request loop

use crate::net::{Connection, LineReader};
use crate::payment::Processor;
use crate::registry::ConnectionGuard;
use std::sync::Arc;
use tracing::{debug, error, info_span, warn, Instrument};

/// Serve `conn` until the peer hangs up or an I/O error occurs, then
/// deregister and close it.
pub(crate) async fn handle_connection<C: Connection>(
    conn: C,
    guard: ConnectionGuard<C>,
    processor: Arc<dyn Processor>,
) {
    let span = info_span!("connection", conn = guard.id());

    serve(&conn, processor.as_ref())
        .instrument(span.clone())
        .await;

    drop(guard);
    let _entered = span.enter();
    if let Err(err) = conn.close() {
        warn!(error = %err, "Error closing connection");
    }
    debug!("Connection closed");
}

/// Read, process and answer requests one at a time.
async fn serve<C: Connection>(conn: &C, processor: &dyn Processor) {
    let mut reader = conn.reader();
    loop {
        let request = match reader.read_line().await {
            Ok(Some(line)) => line,
            Ok(None) => {
                debug!("Peer closed connection");
                return;
            }
            Err(err) => {
                error!(error = %err, "Error reading from connection");
                return;
            }
        };

        debug!(%request, "Received request");
        let response = processor.process(&request).await;

        debug!(%response, "Sending response");
        if let Err(err) = conn.write_line(&response.to_string()).await {
            error!(error = %err, "Error writing response to connection");
            return;
        }
    }
}

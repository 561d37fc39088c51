//! RPC listener.

use tokio::net::TcpListener;
use tokio_stream::wrappers::TcpListenerStream;
use tonic::service::Routes;
use tonic::transport::Server;

use crate::error::ServerResult;
use crate::shutdown::ShutdownSignal;

/// Serves the registered RPC services until `shutdown`.
///
/// Stopping is graceful: the listener closes, then in-flight calls finish
/// before this returns.
pub(crate) async fn serve_rpc(
    listener: TcpListener,
    routes: Routes,
    shutdown: ShutdownSignal,
) -> ServerResult<()> {
    let local_addr = listener.local_addr()?;
    tracing::info!(addr = %local_addr, "rpc listener started");

    Server::builder()
        .add_routes(routes)
        .serve_with_incoming_shutdown(TcpListenerStream::new(listener), shutdown.recv())
        .await?;

    tracing::info!("rpc listener stopped");
    Ok(())
}

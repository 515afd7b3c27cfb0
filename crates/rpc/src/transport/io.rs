use futures::{SinkExt, StreamExt};
use tokio::process::Child;
use tokio::sync::mpsc;
use tokio_util::codec::{FramedRead, FramedWrite};

use super::{Connection, DisconnectReason, Outbound, TransportEvent};
use crate::codec::{CodecError, FrameCodec};
use crate::error::{Error, Result};
use crate::message::Inbound;

/// Connects, then runs the I/O loop for a single connection.
///
/// Emits `Connected` once the stream is up and always finishes with one `Disconnected`.
pub(super) async fn run_transport_io(
	endpoint: String,
	connect: impl Future<Output = Result<Connection>>,
	mut outbound_rx: mpsc::UnboundedReceiver<Outbound>,
	event_tx: mpsc::UnboundedSender<TransportEvent>,
) {
	let conn = match connect.await {
		Ok(conn) => conn,
		Err(e) => {
			tracing::warn!(endpoint = %endpoint, error = %e, "Failed to connect to analysis server");
			let _ = event_tx.send(TransportEvent::Disconnected(DisconnectReason::ConnectFailed(e)));
			return;
		}
	};

	tracing::info!(endpoint = %endpoint, "Connected to analysis server");
	let _ = event_tx.send(TransportEvent::Connected);

	let Connection { reader, writer, child } = conn;
	let mut frames_in = FramedRead::new(reader, FrameCodec::new());
	let mut frames_out = FramedWrite::new(writer, FrameCodec::new());
	let mut detach = false;

	let reason = loop {
		tokio::select! {
			// Handle all outbound messages sequentially for total ordering
			out = outbound_rx.recv() => match out {
				Some(Outbound::Frame(body)) => {
					if let Err(e) = frames_out.send(body).await {
						tracing::error!(endpoint = %endpoint, error = %e, "Outbound write failed; terminating IO loop");
						break DisconnectReason::Failed(codec_error(e));
					}
				}
				Some(Outbound::Shutdown { detach: keep_running }) => {
					detach = keep_running;
					let _ = frames_out.close().await;
					break DisconnectReason::Shutdown;
				}
				// Handle dropped
				None => break DisconnectReason::Shutdown,
			},

			frame = frames_in.next() => match frame {
				Some(Ok(body)) => match Inbound::decode(&body) {
					Ok(msg) => {
						let _ = event_tx.send(TransportEvent::Message(msg));
					}
					Err(e) => {
						tracing::warn!(endpoint = %endpoint, error = %e, "Skipping undecodable frame");
					}
				},
				Some(Err(e)) => {
					tracing::error!(endpoint = %endpoint, error = %e, "Error reading from analysis server");
					break DisconnectReason::Failed(codec_error(e));
				}
				None => {
					tracing::info!(endpoint = %endpoint, "Analysis server closed connection");
					break DisconnectReason::Closed;
				}
			},
		}
	};

	if let Some(child) = child {
		reap(child, detach).await;
	}

	tracing::debug!(endpoint = %endpoint, reason = %reason, "rpc.disconnected");
	let _ = event_tx.send(TransportEvent::Disconnected(reason));
}

fn codec_error(e: CodecError) -> Error {
	match e {
		CodecError::Io(e) => Error::Transport(e.to_string()),
		other => Error::Protocol(other.to_string()),
	}
}

/// Kills a spawned server unless it is to outlive the session.
async fn reap(mut child: Child, detach: bool) {
	if detach {
		tracing::info!(pid = ?child.id(), "Leaving analysis server running");
		return;
	}
	if let Err(e) = child.start_kill() {
		tracing::debug!(error = %e, "Analysis server already exited");
	}
	match child.wait().await {
		Ok(status) => tracing::info!(%status, "Analysis server exited"),
		Err(e) => tracing::warn!(error = %e, "Failed to reap analysis server"),
	}
}

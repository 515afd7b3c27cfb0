//! Connection to the analysis server.
//!
//! A [`Transport`] owns one bidirectional byte stream (TCP socket or the stdin/stdout pipes of a
//! spawned server process). Connecting and all socket I/O run on a tokio task; the handle itself
//! never blocks. Outbound frames are queued in issuance order. Inbound traffic is exposed as a
//! lazy, non-restartable stream of [`TransportEvent`]s that starts with
//! [`TransportEvent::Connected`] and ends with exactly one [`TransportEvent::Disconnected`].

mod io;

use std::collections::HashMap;
use std::path::PathBuf;
use std::pin::Pin;
use std::process::Stdio;
use std::task::{Context, Poll, ready};
use std::time::Duration;

use bytes::Bytes;
use futures::Stream;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::TcpStream;
use tokio::process::{Child, Command};
use tokio::runtime::Handle;
use tokio::sync::mpsc;

use crate::error::{Error, Result};
use crate::message::{Inbound, Request};

/// Where the analysis server lives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Endpoint {
	/// `host:port` of an already running server.
	Tcp(String),
	/// Server process to spawn, speaking the protocol on its stdin/stdout.
	Process(ServerCommand),
}

impl std::fmt::Display for Endpoint {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		match self {
			Self::Tcp(addr) => write!(f, "tcp://{addr}"),
			Self::Process(cmd) => write!(f, "process:{}", cmd.program.display()),
		}
	}
}

/// Command line for a spawned server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerCommand {
	/// Executable to spawn.
	pub program: PathBuf,
	/// Arguments to pass to the command.
	pub args: Vec<String>,
	/// Environment variables to set.
	pub env: HashMap<String, String>,
	/// Working directory.
	pub cwd: Option<PathBuf>,
}

impl ServerCommand {
	/// Create a new server command.
	pub fn new(program: impl Into<PathBuf>) -> Self {
		Self {
			program: program.into(),
			args: Vec::new(),
			env: HashMap::new(),
			cwd: None,
		}
	}

	/// Add command line arguments.
	pub fn args(mut self, args: impl IntoIterator<Item = impl Into<String>>) -> Self {
		self.args = args.into_iter().map(Into::into).collect();
		self
	}

	/// Add environment variables.
	pub fn env(
		mut self,
		env: impl IntoIterator<Item = (impl Into<String>, impl Into<String>)>,
	) -> Self {
		self.env = env.into_iter().map(|(k, v)| (k.into(), v.into())).collect();
		self
	}

	/// Set the working directory.
	pub fn cwd(mut self, cwd: impl Into<PathBuf>) -> Self {
		self.cwd = Some(cwd.into());
		self
	}
}

/// An established byte stream, plus the server process when we spawned it.
pub struct Connection {
	pub(crate) reader: Box<dyn AsyncRead + Send + Unpin>,
	pub(crate) writer: Box<dyn AsyncWrite + Send + Unpin>,
	pub(crate) child: Option<Child>,
}

impl std::fmt::Debug for Connection {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("Connection")
			.field("child", &self.child.as_ref().and_then(Child::id))
			.finish_non_exhaustive()
	}
}

impl Connection {
	/// Wraps an arbitrary reader/writer pair.
	pub fn from_io(
		reader: impl AsyncRead + Send + Unpin + 'static,
		writer: impl AsyncWrite + Send + Unpin + 'static,
	) -> Self {
		Self {
			reader: Box::new(reader),
			writer: Box::new(writer),
			child: None,
		}
	}
}

/// Establishes a connection to `endpoint`.
///
/// # Errors
///
/// [`Error::Connection`] when the peer refuses, the process cannot be spawned, or `timeout`
/// elapses first.
pub async fn connect(endpoint: &Endpoint, timeout: Duration) -> Result<Connection> {
	let failed = |reason: String| Error::Connection {
		endpoint: endpoint.to_string(),
		reason,
	};

	match endpoint {
		Endpoint::Tcp(addr) => {
			let stream = tokio::time::timeout(timeout, TcpStream::connect(addr.as_str()))
				.await
				.map_err(|_| failed(format!("timed out after {}ms", timeout.as_millis())))?
				.map_err(|e| failed(e.to_string()))?;
			stream.set_nodelay(true).map_err(|e| failed(e.to_string()))?;
			let (reader, writer) = stream.into_split();
			Ok(Connection::from_io(reader, writer))
		}
		Endpoint::Process(cfg) => {
			let mut cmd = Command::new(&cfg.program);
			cmd.args(&cfg.args)
				.stdin(Stdio::piped())
				.stdout(Stdio::piped())
				.stderr(Stdio::null())
				.kill_on_drop(false);
			for (key, value) in &cfg.env {
				cmd.env(key, value);
			}
			if let Some(cwd) = &cfg.cwd {
				cmd.current_dir(cwd);
			}

			let mut child = cmd.spawn().map_err(|e| failed(e.to_string()))?;
			let stdin = child
				.stdin
				.take()
				.ok_or_else(|| failed("failed to capture stdin".into()))?;
			let stdout = child
				.stdout
				.take()
				.ok_or_else(|| failed("failed to capture stdout".into()))?;

			tracing::info!(pid = ?child.id(), program = %cfg.program.display(), "Spawned analysis server");
			Ok(Connection {
				reader: Box::new(stdout),
				writer: Box::new(stdin),
				child: Some(child),
			})
		}
	}
}

/// Why a transport stopped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DisconnectReason {
	/// The peer closed the stream.
	Closed,
	/// The client asked for the shutdown.
	Shutdown,
	/// The connection could never be established.
	ConnectFailed(Error),
	/// Read/write failure or framing violation.
	Failed(Error),
}

impl DisconnectReason {
	/// Returns true when the session should be considered crashed rather than disconnected.
	pub fn is_crash(&self) -> bool {
		matches!(self, Self::Failed(_))
	}
}

impl std::fmt::Display for DisconnectReason {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		match self {
			Self::Closed => f.write_str("server closed the connection"),
			Self::Shutdown => f.write_str("client shut down"),
			Self::ConnectFailed(e) | Self::Failed(e) => write!(f, "{e}"),
		}
	}
}

/// Signals and messages delivered by the transport.
#[derive(Debug, Clone, PartialEq)]
pub enum TransportEvent {
	/// The connection is established; `send` now succeeds.
	Connected,
	/// A decoded inbound message.
	Message(Inbound),
	/// Final event; no more messages follow.
	Disconnected(DisconnectReason),
}

/// Outbound queue entries, handled sequentially by the I/O task for total ordering.
pub(crate) enum Outbound {
	Frame(Bytes),
	Shutdown { detach: bool },
}

/// Handle to a single server connection.
#[derive(Debug)]
pub struct Transport {
	endpoint: String,
	outbound_tx: mpsc::UnboundedSender<Outbound>,
	events_rx: mpsc::UnboundedReceiver<TransportEvent>,
	connected: bool,
}

impl Transport {
	/// Starts connecting to `endpoint` on `runtime` and returns immediately.
	pub fn open(endpoint: Endpoint, runtime: &Handle, connect_timeout: Duration) -> Self {
		let label = endpoint.to_string();
		Self::spawn(label, runtime, async move {
			connect(&endpoint, connect_timeout).await
		})
	}

	/// Attaches to an existing byte stream.
	pub fn from_io(
		reader: impl AsyncRead + Send + Unpin + 'static,
		writer: impl AsyncWrite + Send + Unpin + 'static,
		runtime: &Handle,
	) -> Self {
		let conn = Connection::from_io(reader, writer);
		Self::spawn("io".into(), runtime, async move { Ok(conn) })
	}

	fn spawn(
		endpoint: String,
		runtime: &Handle,
		connect: impl Future<Output = Result<Connection>> + Send + 'static,
	) -> Self {
		let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();
		let (event_tx, events_rx) = mpsc::unbounded_channel();

		runtime.spawn(io::run_transport_io(
			endpoint.clone(),
			connect,
			outbound_rx,
			event_tx,
		));

		Self {
			endpoint,
			outbound_tx,
			events_rx,
			connected: false,
		}
	}

	/// Endpoint description, for messages.
	pub fn endpoint(&self) -> &str {
		&self.endpoint
	}

	/// Returns true between the `Connected` and `Disconnected` signals.
	pub fn is_connected(&self) -> bool {
		self.connected
	}

	/// Queues `req` for writing.
	///
	/// # Errors
	///
	/// [`Error::Transport`] when not connected, or when the request cannot be encoded.
	pub fn send(&self, req: &Request) -> Result<()> {
		if !self.connected {
			return Err(Error::Transport(format!("not connected to {}", self.endpoint)));
		}
		let body = req.encode()?;
		tracing::debug!(call_id = %req.id, typehint = %req.typehint, "rpc.send");
		self.outbound_tx
			.send(Outbound::Frame(Bytes::from(body)))
			.map_err(|_| Error::Transport("transport task stopped".into()))
	}

	/// Asks the I/O task to close the connection.
	///
	/// A spawned server process is killed unless `detach` is set. The final
	/// [`TransportEvent::Disconnected`] is still delivered through the event stream.
	pub fn shutdown(&mut self, detach: bool) {
		self.connected = false;
		let _ = self.outbound_tx.send(Outbound::Shutdown { detach });
	}

	/// Returns the next event without waiting.
	pub fn try_recv(&mut self) -> Option<TransportEvent> {
		let event = self.events_rx.try_recv().ok()?;
		self.observe(&event);
		Some(event)
	}

	/// Waits for the next event; `None` once the stream has ended.
	pub async fn recv(&mut self) -> Option<TransportEvent> {
		let event = self.events_rx.recv().await?;
		self.observe(&event);
		Some(event)
	}

	fn observe(&mut self, event: &TransportEvent) {
		match event {
			TransportEvent::Connected => self.connected = true,
			TransportEvent::Disconnected(_) => self.connected = false,
			TransportEvent::Message(_) => {}
		}
	}
}

impl Stream for Transport {
	type Item = TransportEvent;

	fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<TransportEvent>> {
		let event = ready!(self.events_rx.poll_recv(cx));
		if let Some(event) = &event {
			self.observe(event);
		}
		Poll::Ready(event)
	}
}

#[cfg(test)]
mod tests;

//! Accept loop and per-connection I/O.

use super::session::{ReceivedMessage, Session, SessionLimits, Step};
use std::future::Future;
use std::io;
use std::sync::Arc;
use tokio::io::{
    AsyncBufRead, AsyncBufReadExt, AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, BufReader,
};
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tracing::{debug, error, info};

/// Receives every message a session accepts.
///
/// The reply to the client is sent once `deliver` completes. Delivery cannot
/// reject a message; failures are the sink's to log.
pub trait MessageSink: Send + Sync + 'static {
    /// Takes ownership of one received message.
    fn deliver(&self, message: ReceivedMessage) -> impl Future<Output = ()> + Send;
}

/// Runs the SMTP listener until `shutdown` fires.
///
/// Each connection gets its own task. Connections still open at shutdown are
/// left to finish on their own.
pub async fn run<K: MessageSink>(
    listener: TcpListener,
    domain: String,
    limits: SessionLimits,
    sink: Arc<K>,
    mut shutdown: broadcast::Receiver<()>,
) {
    let domain: Arc<str> = domain.into();

    loop {
        tokio::select! {
            result = listener.accept() => {
                match result {
                    Ok((stream, peer)) => {
                        debug!(%peer, "SMTP connection accepted");
                        let sink = Arc::clone(&sink);
                        let domain = Arc::clone(&domain);
                        tokio::spawn(async move {
                            if let Err(e) = serve_connection(stream, &domain, limits, sink.as_ref()).await {
                                debug!(%peer, error = %e, "SMTP session ended with error");
                            }
                        });
                    }
                    Err(e) => {
                        error!(error = %e, "failed to accept connection");
                    }
                }
            }
            _ = shutdown.recv() => {
                info!("SMTP listener shutting down");
                break;
            }
        }
    }
}

/// Drives one SMTP session over `stream` until `QUIT` or end of input.
///
/// # Errors
///
/// Returns an error if reading from or writing to the stream fails.
pub async fn serve_connection<S, K>(
    stream: S,
    domain: &str,
    limits: SessionLimits,
    sink: &K,
) -> io::Result<()>
where
    S: AsyncRead + AsyncWrite + Unpin,
    K: MessageSink,
{
    let mut stream = BufReader::new(stream);
    let mut session = Session::with_limits(domain, limits);

    stream.write_all(&session.greeting().to_wire()).await?;
    stream.flush().await?;

    let mut buf = Vec::new();
    loop {
        let step = match read_line(&mut stream, &mut buf, limits.max_line_length).await? {
            LineRead::Closed => {
                debug!(state = ?session.state(), "peer closed connection");
                return Ok(());
            }
            LineRead::TooLong => {
                debug!(state = ?session.state(), "line over limit discarded");
                session.line_too_long()
            }
            LineRead::Line => {
                let line = buf.strip_suffix(b"\n").unwrap_or(&buf);
                let line = line.strip_suffix(b"\r").unwrap_or(line);
                session.handle_line(line)
            }
        };

        let reply = match step {
            Step::Pending => continue,
            Step::Reply(reply) => reply,
            Step::Message(message, reply) => {
                debug!(
                    from = %message.mail_from,
                    to = %message.rcpt_to,
                    size = message.data.len(),
                    "message received"
                );
                sink.deliver(message).await;
                reply
            }
            Step::Close(reply) => {
                stream.write_all(&reply.to_wire()).await?;
                stream.flush().await?;
                return Ok(());
            }
        };

        stream.write_all(&reply.to_wire()).await?;
        stream.flush().await?;
    }
}

enum LineRead {
    /// `buf` holds one line, terminator included unless input ended.
    Line,
    /// The line exceeded the limit and was skipped.
    TooLong,
    /// End of input.
    Closed,
}

/// Reads one line of at most `limit` bytes into `buf`.
///
/// An overlong line is consumed up to its newline without being kept.
async fn read_line<R>(reader: &mut R, buf: &mut Vec<u8>, limit: usize) -> io::Result<LineRead>
where
    R: AsyncBufRead + Unpin,
{
    let cap = u64::try_from(limit).unwrap_or(u64::MAX);

    buf.clear();
    let read = (&mut *reader).take(cap).read_until(b'\n', buf).await?;
    if read == 0 {
        return Ok(LineRead::Closed);
    }
    if buf.ends_with(b"\n") || read < limit {
        return Ok(LineRead::Line);
    }

    loop {
        buf.clear();
        let read = (&mut *reader).take(cap).read_until(b'\n', buf).await?;
        if read == 0 || buf.ends_with(b"\n") {
            buf.clear();
            return Ok(LineRead::TooLong);
        }
    }
}

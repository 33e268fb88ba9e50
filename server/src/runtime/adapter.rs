use std::{
    io::{self, BufRead, BufReader, Write},
    net::{Shutdown, SocketAddr, TcpStream},
    panic::{self, AssertUnwindSafe},
    sync::{atomic::Ordering, Arc},
    time::{Duration, Instant},
};

use log::{debug, info, warn};

use gantry_net::{
    data_types::ConnectionId,
    http::{read_request, status, Method, Request, RequestError, Response},
};

use super::ConnectionMessage;
use crate::{observability::Metrics, App};

const IDLE_POLL_INTERVAL: Duration = Duration::from_millis(50);
const REQUEST_READ_TIMEOUT: Duration = Duration::from_secs(30);
const MAX_IDLE: Duration = Duration::from_secs(30);
const SERVER_NAME: &str = concat!("gantry/", env!("CARGO_PKG_VERSION"));

enum NextRequest {
    Ready,
    Close,
}

/// Translates a raw connection into request/response exchanges. Reads one
/// well-formed request at a time, dispatches it to the registered handler
/// and writes the response back, keeping the connection open per protocol.
/// Whatever the handler does, the connection is never left unterminated:
/// malformed input and handler failures get a minimal error response.
pub struct HandlerAdapter {
    app: Arc<App>,
}

impl HandlerAdapter {
    pub(crate) fn new(app: &Arc<App>) -> Self {
        Self { app: app.clone() }
    }

    pub(crate) fn serve(self: &Self, connection: ConnectionMessage) {
        let ConnectionMessage {
            connection_id,
            mut stream,
            remote_addr,
        } = connection;

        debug!("HandlerAdapter: Serving connection {connection_id} from {remote_addr}");

        let reader_stream = match stream.try_clone() {
            Ok(reader_stream) => reader_stream,
            Err(e) => {
                warn!("HandlerAdapter: Failed to clone stream for connection {connection_id}: {e}");
                return;
            }
        };
        let mut reader = BufReader::new(reader_stream);

        loop {
            if stream.set_read_timeout(Some(IDLE_POLL_INTERVAL)).is_err() {
                break;
            }
            match self.await_request(&mut reader) {
                NextRequest::Close => break,
                NextRequest::Ready => (),
            }
            stream.set_read_timeout(Some(REQUEST_READ_TIMEOUT)).ok();
            if !self.exchange(&mut reader, &mut stream, connection_id, &remote_addr) {
                break;
            }
        }

        stream.shutdown(Shutdown::Both).ok();
        self.app.metrics.incr(Metrics::METRIC_CONNECTION_CLOSED_COUNT);
        debug!("HandlerAdapter: Connection {connection_id} closed");
    }

    /// Waits for the next request to start arriving, watching the stop
    /// signal and the keep-alive idle limit
    fn await_request(self: &Self, reader: &mut BufReader<TcpStream>) -> NextRequest {
        let idle_since = Instant::now();
        loop {
            if self.app.stop_signal.load(Ordering::Relaxed) {
                return NextRequest::Close;
            }
            match reader.fill_buf() {
                Ok(buffer) if buffer.is_empty() => return NextRequest::Close,
                Ok(_) => return NextRequest::Ready,
                Err(e)
                    if e.kind() == io::ErrorKind::WouldBlock
                        || e.kind() == io::ErrorKind::TimedOut =>
                {
                    if idle_since.elapsed() > MAX_IDLE {
                        debug!("HandlerAdapter: Connection idle for too long");
                        return NextRequest::Close;
                    }
                }
                Err(_) => return NextRequest::Close,
            }
        }
    }

    /// Reads one request, invokes the handler and writes the response.
    /// Returns whether the connection should be kept open.
    fn exchange(
        self: &Self,
        reader: &mut BufReader<TcpStream>,
        stream: &mut TcpStream,
        connection_id: ConnectionId,
        remote_addr: &SocketAddr,
    ) -> bool {
        match read_request(reader) {
            Ok(request) => {
                self.app.metrics.incr(Metrics::METRIC_REQUEST_COUNT);
                self.app.request_count.fetch_add(1, Ordering::Relaxed);

                let response = self.invoke_handler(&request);
                info!(
                    "HandlerAdapter: {remote_addr} {} {} -> {}",
                    request.method, request.path, response.status
                );

                let keep_alive =
                    request.keep_alive() && !self.app.stop_signal.load(Ordering::Relaxed);
                let head = request.method == Method::Head;
                self.write_response(stream, &response, keep_alive, head) && keep_alive
            }
            Err(e) => {
                self.app.metrics.incr(Metrics::METRIC_MALFORMED_REQUEST_COUNT);
                warn!("HandlerAdapter: Malformed request on connection {connection_id}: {e}");
                let response = match e {
                    RequestError::UnsupportedMethod(_) => {
                        Response::text(status::NOT_IMPLEMENTED, "Not Implemented\n")
                    }
                    RequestError::BodyTooLarge(_) => {
                        Response::text(status::PAYLOAD_TOO_LARGE, "Payload Too Large\n")
                    }
                    RequestError::Io(ref io_err)
                        if io_err.kind() == io::ErrorKind::WouldBlock
                            || io_err.kind() == io::ErrorKind::TimedOut =>
                    {
                        Response::text(status::REQUEST_TIMEOUT, "Request Timeout\n")
                    }
                    // The peer is gone, there is nobody left to tell
                    RequestError::Io(_) => return false,
                    _ => Response::text(status::BAD_REQUEST, "Bad Request\n"),
                };
                self.write_response(stream, &response, false, false);
                false
            }
        }
    }

    fn invoke_handler(self: &Self, request: &Request) -> Response {
        let handler = self.app.handler.clone();
        let response = match panic::catch_unwind(AssertUnwindSafe(|| handler.handle(request))) {
            Ok(Ok(response)) => response,
            Ok(Err(e)) => {
                self.app.metrics.incr(Metrics::METRIC_HANDLER_ERROR_COUNT);
                warn!("HandlerAdapter: Handler failed: {e}");
                Response::text(status::INTERNAL_SERVER_ERROR, "Internal Server Error\n")
            }
            Err(_) => {
                self.app.metrics.incr(Metrics::METRIC_HANDLER_PANIC_COUNT);
                warn!("HandlerAdapter: Handler panicked");
                Response::text(status::INTERNAL_SERVER_ERROR, "Internal Server Error\n")
            }
        };
        self.app.metrics.incr(if response.status < 500 {
            Metrics::METRIC_RESPONSE_OK_COUNT
        } else {
            Metrics::METRIC_RESPONSE_ERROR_COUNT
        });
        response
    }

    fn write_response(
        self: &Self,
        stream: &mut TcpStream,
        response: &Response,
        keep_alive: bool,
        head: bool,
    ) -> bool {
        let bytes = if head {
            response.to_head_bytes(SERVER_NAME, keep_alive)
        } else {
            response.to_bytes(SERVER_NAME, keep_alive)
        };
        match stream.write_all(&bytes) {
            Ok(()) => true,
            Err(e) => {
                warn!("HandlerAdapter: Failed to write response: {e}");
                false
            }
        }
    }
}

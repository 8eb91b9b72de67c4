use std::io;
use std::net::SocketAddr;
use std::sync::Arc;

use tokio::io::Interest;
use tokio::net::TcpStream;
use tracing::{debug, warn};

use crate::http::buffer::Buffer;
use crate::http::parser::{ParseError, RequestParser};
use crate::http::request::Request;
use crate::http::writer::ResponseWriter;
use crate::server::App;
use crate::server::event_loop::ActivityClock;

const READ_CHUNK: usize = 8 * 1024;

pub enum ConnectionState {
    ReadRequest,
    ProcessRequest(Box<Request>),
    WriteResponse(ResponseWriter),
    Closed,
}

/// One accepted socket, carried through request/response cycles until the
/// peer leaves, an error occurs or keep-alive ends.
pub struct Connection {
    stream: TcpStream,
    peer: SocketAddr,
    buffer: Buffer,
    parser: RequestParser,
    app: Arc<App>,
    state: ConnectionState,
    keep_alive: bool,
    peer_closed: bool,
    activity: ActivityClock,
}

impl Connection {
    pub fn new(stream: TcpStream, peer: SocketAddr, app: Arc<App>, activity: ActivityClock) -> Self {
        let parser = RequestParser::new(app.settings().max_request_bytes);
        Self {
            stream,
            peer,
            buffer: Buffer::default(),
            parser,
            app,
            state: ConnectionState::ReadRequest,
            keep_alive: true,
            peer_closed: false,
            activity,
        }
    }

    pub fn state(&self) -> &ConnectionState {
        &self.state
    }

    /// Readiness this connection is waiting for, if any.
    ///
    /// Readable while a request is being read; writable only while response
    /// bytes are queued.
    pub fn interest(&self) -> Option<Interest> {
        match &self.state {
            ConnectionState::ReadRequest => Some(Interest::READABLE),
            ConnectionState::WriteResponse(writer) if !writer.pending().is_empty() => {
                Some(Interest::WRITABLE)
            }
            _ => None,
        }
    }

    pub async fn run(mut self) -> anyhow::Result<()> {
        loop {
            match &self.state {
                ConnectionState::Closed => break,
                ConnectionState::ProcessRequest(_) => {
                    self.process_request();
                    continue;
                }
                _ => {}
            }

            let Some(interest) = self.interest() else {
                // Streaming body with nothing queued yet.
                self.on_writable()?;
                continue;
            };

            let ready = self.stream.ready(interest).await?;

            if (ready.is_readable() || ready.is_read_closed())
                && matches!(self.state, ConnectionState::ReadRequest)
            {
                self.on_readable()?;
            }
            if ready.is_writable() && matches!(self.state, ConnectionState::WriteResponse(_)) {
                self.on_writable()?;
            }
        }

        debug!(peer = %self.peer, "connection closed");
        Ok(())
    }

    /// Drains the socket into the read buffer and frames a request once one
    /// is complete.
    pub fn on_readable(&mut self) -> anyhow::Result<()> {
        let mut chunk = [0u8; READ_CHUNK];

        loop {
            match self.stream.try_read(&mut chunk) {
                Ok(0) => {
                    self.peer_closed = true;
                    break;
                }
                Ok(n) => {
                    self.buffer.append(&chunk[..n]);
                    self.activity.touch();

                    if self.buffer.len() > self.parser.max_request_bytes() {
                        break;
                    }
                }
                Err(e) if e.kind() == io::ErrorKind::WouldBlock => break,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e.into()),
            }
        }

        self.try_frame();

        if self.peer_closed && matches!(self.state, ConnectionState::ReadRequest) {
            self.state = ConnectionState::Closed;
        }
        Ok(())
    }

    fn try_frame(&mut self) {
        match self.parser.parse(self.buffer.as_slice()) {
            Ok((request, consumed)) => {
                self.buffer.consume(consumed);
                self.state = ConnectionState::ProcessRequest(Box::new(request));
            }
            Err(ParseError::Incomplete) => {}
            Err(e @ ParseError::TooLarge { .. }) => {
                warn!(peer = %self.peer, error = %e, "request too large, closing connection");
                self.buffer.clear();
                self.state = ConnectionState::Closed;
            }
        }
    }

    /// Runs the request through the application and queues the response.
    pub fn process_request(&mut self) {
        let ConnectionState::ProcessRequest(mut request) =
            std::mem::replace(&mut self.state, ConnectionState::Closed)
        else {
            return;
        };

        request.peer_addr = Some(self.peer);
        self.keep_alive = request.keep_alive() && !self.peer_closed;

        let response = self.app.process(&mut request);

        debug!(
            peer = %self.peer,
            method = %request.method,
            path = %request.path,
            status = response.status_code().as_u16(),
            "request processed"
        );

        self.state = ConnectionState::WriteResponse(ResponseWriter::new(response, self.keep_alive));
    }

    /// Writes as much of the queued response as the socket takes.
    pub fn on_writable(&mut self) -> anyhow::Result<()> {
        let ConnectionState::WriteResponse(writer) = &mut self.state else {
            return Ok(());
        };

        loop {
            writer.fill()?;
            if writer.is_finished() {
                break;
            }

            match self.stream.try_write(writer.pending()) {
                Ok(0) => return Err(anyhow::anyhow!("connection closed while writing")),
                Ok(n) => {
                    writer.advance(n);
                    self.activity.touch();
                }
                Err(e) if e.kind() == io::ErrorKind::WouldBlock => return Ok(()),
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e.into()),
            }
        }

        if self.keep_alive {
            self.state = ConnectionState::ReadRequest;
            // Pipelined requests may already be buffered.
            if !self.buffer.is_empty() {
                self.try_frame();
            }
        } else {
            self.state = ConnectionState::Closed;
        }
        Ok(())
    }
}

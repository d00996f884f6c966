//! Rotor-protocol (rotctld subset) handler.
//!
//! Line-oriented ASCII over TCP, one client at a time:
//!
//! | Line          | Reply                     | Effect                   |
//! |---------------|---------------------------|--------------------------|
//! | `P <az> <alt>`| `RPRT 0` / `RPRT -1`      | sets the pending target  |
//! | `p`           | `<az> <alt>` (2 decimals) | reports current position |
//! | `q`           | `RPRT 0`                  | closes the connection    |
//! | anything else | `RPRT -1`                 | none                     |
//!
//! [`RotctlProtocol`] is the pure line handler; [`RotctlSession`] owns the
//! non-blocking listener and the connected client.

use rotor_common::tracking::PointingTarget;
use std::io::{self, Read, Write};
use std::net::{SocketAddr, TcpListener, TcpStream, ToSocketAddrs};
use tracing::{debug, info, warn};

/// Longest unterminated line kept before it is discarded [bytes].
pub const MAX_LINE_LEN: usize = 256;

const REPLY_OK: &str = "RPRT 0\n";
const REPLY_ERR: &str = "RPRT -1\n";

/// Result of handling input: a target for the tracking side or nothing.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub enum PollOutcome {
    #[default]
    NoUpdate,
    Target(PointingTarget),
}

/// Reply to one protocol line.
#[derive(Debug, Clone, PartialEq)]
pub struct LineReply {
    pub reply: String,
    pub outcome: PollOutcome,
    /// The client asked to close the connection.
    pub close: bool,
}

impl LineReply {
    fn new(reply: impl Into<String>, outcome: PollOutcome) -> Self {
        Self {
            reply: reply.into(),
            outcome,
            close: false,
        }
    }
}

// ─── Line Handler ───────────────────────────────────────────────────

#[derive(Debug, Default)]
pub struct RotctlProtocol {
    pending: Option<PointingTarget>,
}

impl RotctlProtocol {
    pub fn new() -> Self {
        Self::default()
    }

    /// Target set by the last accepted `P` line.
    pub fn pending(&self) -> Option<PointingTarget> {
        self.pending
    }

    /// Handle one line. `current` is the rig's present pointing.
    pub fn handle_line(&mut self, line: &str, current: PointingTarget) -> LineReply {
        let line = line.trim();
        match line {
            "p" => {
                let outcome = self.pending.map_or(PollOutcome::NoUpdate, PollOutcome::Target);
                LineReply::new(
                    format!("{:.2} {:.2}\n", current.azimuth_deg, current.altitude_deg),
                    outcome,
                )
            }
            "q" => LineReply {
                close: true,
                ..LineReply::new(REPLY_OK, PollOutcome::NoUpdate)
            },
            _ => match line.strip_prefix('P') {
                Some(args) if args.starts_with(char::is_whitespace) => match parse_position(args) {
                    Some(target) => {
                        debug!(az = target.azimuth_deg, alt = target.altitude_deg, "Rotor target");
                        self.pending = Some(target);
                        LineReply::new(REPLY_OK, PollOutcome::Target(target))
                    }
                    None => LineReply::new(REPLY_ERR, PollOutcome::NoUpdate),
                },
                _ => LineReply::new(REPLY_ERR, PollOutcome::NoUpdate),
            },
        }
    }
}

/// Parse `<az> <alt>`: exactly two finite numbers.
fn parse_position(args: &str) -> Option<PointingTarget> {
    let mut fields = args.split_whitespace().map(str::parse::<f64>);
    let az = fields.next()?.ok()?;
    let alt = fields.next()?.ok()?;
    if fields.next().is_some() || !az.is_finite() || !alt.is_finite() {
        return None;
    }
    Some(PointingTarget::new(az, alt))
}

// ─── TCP Session ────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    Connected,
}

struct Client {
    stream: TcpStream,
    peer: SocketAddr,
    buf: Vec<u8>,
}

/// Non-blocking rotctld listener serving one client at a time.
pub struct RotctlSession {
    listener: TcpListener,
    client: Option<Client>,
    protocol: RotctlProtocol,
}

impl RotctlSession {
    pub fn bind(addr: impl ToSocketAddrs) -> io::Result<Self> {
        let listener = TcpListener::bind(addr)?;
        listener.set_nonblocking(true)?;
        info!(addr = %listener.local_addr()?, "Rotor protocol listening");
        Ok(Self {
            listener,
            client: None,
            protocol: RotctlProtocol::new(),
        })
    }

    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    pub fn state(&self) -> SessionState {
        if self.client.is_some() {
            SessionState::Connected
        } else {
            SessionState::Idle
        }
    }

    pub fn pending_target(&self) -> Option<PointingTarget> {
        self.protocol.pending()
    }

    /// Serve whatever input is available without blocking.
    ///
    /// Accepts a client when idle, then handles every complete line that
    /// has arrived. The outcome of the last line yielding a target wins.
    /// Client I/O failures drop the client; only listener failures are
    /// returned.
    pub fn poll(&mut self, current: PointingTarget) -> io::Result<PollOutcome> {
        if self.client.is_none() && !self.accept()? {
            return Ok(PollOutcome::NoUpdate);
        }
        let Some(client) = self.client.as_mut() else {
            return Ok(PollOutcome::NoUpdate);
        };

        let eof = match fill(client) {
            Ok(eof) => eof,
            Err(e) => {
                warn!(peer = %client.peer, "Rotor client read failed: {e}");
                self.disconnect();
                return Ok(PollOutcome::NoUpdate);
            }
        };

        let mut outcome = PollOutcome::NoUpdate;
        let mut close = false;
        while let Some(pos) = client.buf.iter().position(|&b| b == b'\n') {
            let raw: Vec<u8> = client.buf.drain(..=pos).collect();
            let line = String::from_utf8_lossy(&raw);
            debug!(peer = %client.peer, line = %line.trim(), "Rotor command");

            let reply = self.protocol.handle_line(&line, current);
            if let PollOutcome::Target(_) = reply.outcome {
                outcome = reply.outcome;
            }
            if let Err(e) = client.stream.write_all(reply.reply.as_bytes()) {
                warn!(peer = %client.peer, "Rotor client write failed: {e}");
                close = true;
                break;
            }
            if reply.close {
                close = true;
                break;
            }
        }

        if !close && client.buf.len() > MAX_LINE_LEN {
            warn!(peer = %client.peer, len = client.buf.len(), "Overlong rotor line discarded");
            client.buf.clear();
            if client.stream.write_all(REPLY_ERR.as_bytes()).is_err() {
                close = true;
            }
        }

        if close || eof {
            self.disconnect();
        }
        Ok(outcome)
    }

    fn accept(&mut self) -> io::Result<bool> {
        match self.listener.accept() {
            Ok((stream, peer)) => {
                stream.set_nonblocking(true)?;
                let _ = stream.set_nodelay(true);
                info!(%peer, "Rotor client connected");
                self.client = Some(Client {
                    stream,
                    peer,
                    buf: Vec::with_capacity(MAX_LINE_LEN),
                });
                Ok(true)
            }
            Err(ref e) if e.kind() == io::ErrorKind::WouldBlock => Ok(false),
            Err(e) => Err(e),
        }
    }

    fn disconnect(&mut self) {
        if let Some(client) = self.client.take() {
            info!(peer = %client.peer, "Rotor client disconnected");
        }
    }
}

/// Drain readable bytes into the client buffer. Returns `true` on EOF.
///
/// Stops once the buffer holds one byte more than [`MAX_LINE_LEN`]; the rest
/// stays in the socket until the buffered lines have been handled.
fn fill(client: &mut Client) -> io::Result<bool> {
    let mut chunk = [0u8; MAX_LINE_LEN + 1];
    loop {
        let room = (MAX_LINE_LEN + 1).saturating_sub(client.buf.len());
        if room == 0 {
            return Ok(false);
        }
        match client.stream.read(&mut chunk[..room]) {
            Ok(0) => return Ok(true),
            Ok(n) => client.buf.extend_from_slice(&chunk[..n]),
            Err(ref e) if e.kind() == io::ErrorKind::WouldBlock => return Ok(false),
            Err(ref e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use std::io::{BufRead, BufReader};
    use std::thread;
    use std::time::Duration;

    const HERE: PointingTarget = PointingTarget::new(11.0, 21.0);

    #[test]
    fn reference_exchange() {
        let mut proto = RotctlProtocol::new();

        let r = proto.handle_line("P 10.50 20.25\n", HERE);
        assert_eq!(r.reply, "RPRT 0\n");
        assert_eq!(proto.pending(), Some(PointingTarget::new(10.5, 20.25)));

        let r = proto.handle_line("p\n", HERE);
        assert_eq!(r.reply, "11.00 21.00\n");
        assert_eq!(r.outcome, PollOutcome::Target(PointingTarget::new(10.5, 20.25)));

        let r = proto.handle_line("X\n", HERE);
        assert_eq!(r.reply, "RPRT -1\n");
        assert_eq!(r.outcome, PollOutcome::NoUpdate);
        assert_eq!(proto.pending(), Some(PointingTarget::new(10.5, 20.25)));

        let r = proto.handle_line("q\n", HERE);
        assert_eq!(r.reply, "RPRT 0\n");
        assert!(r.close);
    }

    #[test]
    fn position_before_any_target() {
        let mut proto = RotctlProtocol::new();
        let r = proto.handle_line("p", PointingTarget::new(0.0, 0.0));
        assert_eq!(r.reply, "0.00 0.00\n");
        assert_eq!(r.outcome, PollOutcome::NoUpdate);
    }

    #[test]
    fn malformed_set_position() {
        let mut proto = RotctlProtocol::new();
        for line in [
            "P",
            "P 10",
            "P ten twenty",
            "P 1 2 3",
            "P NaN 2",
            "P inf 2",
            "P10 20",
            "PP 1 2",
        ] {
            let r = proto.handle_line(line, HERE);
            assert_eq!(r.reply, "RPRT -1\n", "{line:?}");
        }
        assert_eq!(proto.pending(), None);
    }

    #[test]
    fn zero_target_is_reported() {
        let mut proto = RotctlProtocol::new();
        let r = proto.handle_line("P 0 0", HERE);
        assert_eq!(r.outcome, PollOutcome::Target(PointingTarget::new(0.0, 0.0)));
    }

    #[test]
    fn carriage_returns_are_trimmed() {
        let mut proto = RotctlProtocol::new();
        assert_eq!(proto.handle_line("P 1.5 2.5\r\n", HERE).reply, "RPRT 0\n");
        assert_eq!(proto.handle_line("p\r\n", HERE).reply, "11.00 21.00\n");
    }

    proptest! {
        #[test]
        fn arbitrary_lines_never_panic(line in "\\PC{0,64}") {
            let mut proto = RotctlProtocol::new();
            let r = proto.handle_line(&line, HERE);
            prop_assert!(r.reply.ends_with('\n'));
            if !line.trim().starts_with('P') {
                prop_assert_eq!(proto.pending(), None);
            }
        }

        #[test]
        fn finite_pairs_are_accepted(az in -720.0f64..720.0, alt in -90.0f64..90.0) {
            let mut proto = RotctlProtocol::new();
            let r = proto.handle_line(&format!("P {az} {alt}"), HERE);
            prop_assert_eq!(r.reply.as_str(), "RPRT 0\n");
            prop_assert_eq!(proto.pending(), Some(PointingTarget::new(az, alt)));
        }
    }

    // ─── Session ────────────────────────────────────────────────

    /// Run `script` as a client in its own thread while polling the session.
    ///
    /// Returns every target the session produced and the script's result.
    fn drive<T, F>(session: &mut RotctlSession, current: PointingTarget, script: F) -> (Vec<PollOutcome>, T)
    where
        T: Send + 'static,
        F: FnOnce(TcpStream) -> T + Send + 'static,
    {
        let addr = session.local_addr().unwrap();
        let handle = thread::spawn(move || {
            let stream = TcpStream::connect(addr).unwrap();
            stream
                .set_read_timeout(Some(Duration::from_secs(2)))
                .unwrap();
            script(stream)
        });
        let mut outcomes = Vec::new();
        while !handle.is_finished() {
            let o = session.poll(current).unwrap();
            if o != PollOutcome::NoUpdate {
                outcomes.push(o);
            }
            thread::sleep(Duration::from_millis(2));
        }
        (outcomes, handle.join().unwrap())
    }

    fn send(stream: &mut TcpStream, reader: &mut BufReader<TcpStream>, line: &[u8]) -> String {
        stream.write_all(line).unwrap();
        let mut reply = String::new();
        reader.read_line(&mut reply).unwrap();
        reply
    }

    #[test]
    fn idle_poll_returns_immediately() {
        let mut session = RotctlSession::bind("127.0.0.1:0").unwrap();
        assert_eq!(session.poll(HERE).unwrap(), PollOutcome::NoUpdate);
        assert_eq!(session.state(), SessionState::Idle);
    }

    #[test]
    fn session_exchange_over_tcp() {
        let mut session = RotctlSession::bind("127.0.0.1:0").unwrap();
        let (outcomes, replies) = drive(&mut session, HERE, |mut stream| {
            let mut reader = BufReader::new(stream.try_clone().unwrap());
            let replies = vec![
                send(&mut stream, &mut reader, b"P 10.50 20.25\n"),
                send(&mut stream, &mut reader, b"p\n"),
                send(&mut stream, &mut reader, b"X\n"),
                send(&mut stream, &mut reader, b"q\n"),
            ];
            let mut rest = String::new();
            let closed = reader.read_line(&mut rest).map(|n| n == 0).unwrap_or(false);
            (replies, closed)
        });

        let (replies, closed) = replies;
        assert_eq!(replies, ["RPRT 0\n", "11.00 21.00\n", "RPRT -1\n", "RPRT 0\n"]);
        assert!(closed, "server should close after q");
        assert!(!outcomes.is_empty());
        assert!(
            outcomes
                .iter()
                .all(|o| *o == PollOutcome::Target(PointingTarget::new(10.5, 20.25)))
        );
        assert_eq!(session.state(), SessionState::Idle);
        assert_eq!(session.pending_target(), Some(PointingTarget::new(10.5, 20.25)));
    }

    #[test]
    fn overlong_line_is_discarded() {
        let mut session = RotctlSession::bind("127.0.0.1:0").unwrap();
        let (_, replies) = drive(&mut session, HERE, |mut stream| {
            let mut reader = BufReader::new(stream.try_clone().unwrap());
            let first = send(&mut stream, &mut reader, &[b'x'; MAX_LINE_LEN + 10]);
            // Tail of the discarded line, then a real command.
            let second = send(&mut stream, &mut reader, b"\np\n");
            let mut third = String::new();
            reader.read_line(&mut third).unwrap();
            vec![first, second, third]
        });
        assert_eq!(replies, ["RPRT -1\n", "RPRT -1\n", "11.00 21.00\n"]);
    }

    #[test]
    fn flood_without_newline_is_read_in_bounded_slices() {
        let mut session = RotctlSession::bind("127.0.0.1:0").unwrap();
        let mut stream = TcpStream::connect(session.local_addr().unwrap()).unwrap();
        stream.write_all(&[b'x'; 8 * 1024]).unwrap();
        while !session.accept().unwrap() {
            thread::sleep(Duration::from_millis(2));
        }
        thread::sleep(Duration::from_millis(20));

        let client = session.client.as_mut().unwrap();
        assert!(!fill(client).unwrap());
        assert_eq!(client.buf.len(), MAX_LINE_LEN + 1);
        assert!(!fill(client).unwrap());
        assert_eq!(client.buf.len(), MAX_LINE_LEN + 1);

        // Each poll discards one slice and answers it.
        assert_eq!(session.poll(HERE).unwrap(), PollOutcome::NoUpdate);
        assert_eq!(session.state(), SessionState::Connected);
        assert!(session.client.as_ref().unwrap().buf.is_empty());
    }

    #[test]
    fn peer_disconnect_returns_to_idle() {
        let mut session = RotctlSession::bind("127.0.0.1:0").unwrap();
        let (_, reply) = drive(&mut session, HERE, |mut stream| {
            let mut reader = BufReader::new(stream.try_clone().unwrap());
            send(&mut stream, &mut reader, b"p\n")
        });
        assert_eq!(reply, "11.00 21.00\n");

        for _ in 0..500 {
            session.poll(HERE).unwrap();
            if session.state() == SessionState::Idle {
                break;
            }
            thread::sleep(Duration::from_millis(2));
        }
        assert_eq!(session.state(), SessionState::Idle);
    }
}

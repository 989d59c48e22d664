//! Pixel sink: where finished frames go.
//!
//! The LED hardware is driven by an Open Pixel Control (OPC) server. We only
//! ever send one message type, "set pixel colors":
//!
//! ```text
//! | channel: u8 | command: u8 = 0 | length: u16 BE | length bytes of RGB |
//! ```
//!
//! No acknowledgement comes back, so a successful write is all we can know.
//!
//! ## Rust concepts
//! - A trait as the seam between the state machine and the network
//! - `Option<TcpStream>` for a lazily opened connection
//! - `ToSocketAddrs` to resolve `host:port` strings

use crate::BladeError;
use crate::layout::Frame;
use std::io::{self, Write};
use std::net::{TcpStream, ToSocketAddrs};
use std::time::Duration;

/// Something that renders complete frames.
pub trait PixelSink {
    /// Try to reach the sink. Never fails, only reports.
    fn can_connect(&mut self) -> bool;

    /// Push one frame. Frames are rendered in the order they are sent.
    fn send_frame(&mut self, frame: &Frame) -> Result<(), BladeError>;
}

/// OPC command byte for "set pixel colors".
const SET_PIXEL_COLORS: u8 = 0;

const CONNECT_TIMEOUT: Duration = Duration::from_secs(1);

/// A server that stops reading must not stall the blade thread for longer
/// than this.
const WRITE_TIMEOUT: Duration = Duration::from_secs(1);

/// Build one OPC "set pixel colors" message.
pub fn encode_set_pixels(channel: u8, frame: &Frame) -> Result<Vec<u8>, BladeError> {
    let data = frame.to_rgb_bytes();
    let len = u16::try_from(data.len()).map_err(|_| {
        BladeError::InvalidConfig(format!(
            "{} LEDs do not fit in one OPC message",
            frame.len()
        ))
    })?;

    let mut message = Vec::with_capacity(4 + data.len());
    message.push(channel);
    message.push(SET_PIXEL_COLORS);
    message.extend_from_slice(&len.to_be_bytes());
    message.extend_from_slice(&data);
    Ok(message)
}

/// TCP client for an Open Pixel Control server.
///
/// The socket is opened on first use. If a write fails or times out the
/// socket is dropped and the next frame opens a fresh one; the failed frame
/// itself is not resent.
pub struct OpcClient {
    address: String,
    channel: u8,
    stream: Option<TcpStream>,
}

impl OpcClient {
    pub fn new(address: impl Into<String>, channel: u8) -> Self {
        Self {
            address: address.into(),
            channel,
            stream: None,
        }
    }

    fn ensure_connected(&mut self) -> io::Result<&mut TcpStream> {
        if self.stream.is_none() {
            let stream = open_stream(&self.address)?;
            tracing::info!("Connected to OPC server at {}", self.address);
            self.stream = Some(stream);
        }
        // Just populated above if it was empty.
        self.stream
            .as_mut()
            .ok_or_else(|| io::Error::from(io::ErrorKind::NotConnected))
    }
}

fn open_stream(address: &str) -> io::Result<TcpStream> {
    let mut last_err = io::Error::new(
        io::ErrorKind::AddrNotAvailable,
        format!("{address} did not resolve to any address"),
    );
    for addr in address.to_socket_addrs()? {
        match TcpStream::connect_timeout(&addr, CONNECT_TIMEOUT) {
            Ok(stream) => {
                stream.set_nodelay(true)?;
                stream.set_write_timeout(Some(WRITE_TIMEOUT))?;
                return Ok(stream);
            }
            Err(e) => last_err = e,
        }
    }
    Err(last_err)
}

impl PixelSink for OpcClient {
    fn can_connect(&mut self) -> bool {
        match self.ensure_connected() {
            Ok(_) => true,
            Err(e) => {
                tracing::debug!("OPC server {} unreachable: {}", self.address, e);
                false
            }
        }
    }

    fn send_frame(&mut self, frame: &Frame) -> Result<(), BladeError> {
        let message = encode_set_pixels(self.channel, frame)?;
        let stream = self.ensure_connected().map_err(BladeError::Connection)?;

        if let Err(e) = stream.write_all(&message) {
            self.stream = None;
            tracing::debug!("OPC write failed, dropping connection: {}", e);
            return Err(BladeError::Connection(e));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Color;
    use pretty_assertions::assert_eq;
    use std::io::Read;
    use std::net::TcpListener;

    #[test]
    fn encodes_header_and_pixels() {
        let frame = Frame::filled(2, Color::new(10, 20, 30));
        let message = encode_set_pixels(3, &frame).unwrap();
        assert_eq!(message, vec![3, 0, 0, 6, 10, 20, 30, 10, 20, 30]);
    }

    #[test]
    fn length_is_big_endian() {
        let frame = Frame::off(100);
        let message = encode_set_pixels(0, &frame).unwrap();
        // 300 bytes = 0x012C
        assert_eq!(&message[..4], &[0, 0, 0x01, 0x2C]);
        assert_eq!(message.len(), 304);
    }

    #[test]
    fn oversized_frame_is_rejected() {
        let frame = Frame::off(30_000);
        assert!(encode_set_pixels(0, &frame).is_err());
    }

    #[test]
    fn sends_frames_to_listening_server() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let address = listener.local_addr().unwrap().to_string();

        let mut client = OpcClient::new(address, 0);
        assert!(client.can_connect());
        client
            .send_frame(&Frame::filled(2, Color::new(255, 0, 0)))
            .unwrap();

        let (mut conn, _) = listener.accept().unwrap();
        let mut buf = [0u8; 10];
        conn.read_exact(&mut buf).unwrap();
        assert_eq!(buf, [0, 0, 0, 6, 255, 0, 0, 255, 0, 0]);
    }

    #[test]
    fn unreachable_server_reports_connection_error() {
        // Bind then drop to get a port nobody listens on.
        let address = {
            let listener = TcpListener::bind("127.0.0.1:0").unwrap();
            listener.local_addr().unwrap().to_string()
        };

        let mut client = OpcClient::new(address, 0);
        assert!(!client.can_connect());
        let result = client.send_frame(&Frame::off(2));
        assert!(matches!(result, Err(BladeError::Connection(_))));
    }

    #[test]
    fn stalled_server_times_out_instead_of_blocking() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let address = listener.local_addr().unwrap().to_string();

        let mut client = OpcClient::new(address, 0);
        assert!(client.can_connect());
        // Accepted but never read from.
        let (_conn, _) = listener.accept().unwrap();

        // 60 kB per frame; the socket buffers fill long before this runs out.
        let frame = Frame::off(20_000);
        let result = (0..2_000)
            .map(|_| client.send_frame(&frame))
            .find(Result::is_err)
            .expect("writes never stalled");

        assert!(matches!(result, Err(BladeError::Connection(_))));
        assert!(client.stream.is_none());
    }
}

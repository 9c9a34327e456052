//! # Packet Codec
//!
//! Encoding and decoding of remote console frames. A frame on the wire is
//!
//! ```text
//! <size:u32le><request_id:i32le><type:i32le><body bytes><0x00><0x00>
//! ```
//!
//! where `size` counts everything after itself. The codec performs no I/O
//! beyond reading from or writing to the stream it is handed.

use std::fmt;
use std::io::ErrorKind;

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use super::error::{RconError, RconResult};
use crate::constants::protocol::{FRAME_OVERHEAD, MAX_FRAME_SIZE, SIZE_FIELD_LEN};

/// Packet type field.
///
/// The value `2` is overloaded: it is `EXEC_COMMAND` when sent by the client
/// and `AUTH_RESPONSE` when received from the server, so the type is kept as
/// a raw value and interpreted by direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PacketType(pub i32);

impl PacketType {
    pub const AUTH: PacketType = PacketType(3);
    pub const AUTH_RESPONSE: PacketType = PacketType(2);
    pub const EXEC_COMMAND: PacketType = PacketType(2);
    pub const RESPONSE_VALUE: PacketType = PacketType(0);

    pub fn value(self) -> i32 {
        self.0
    }
}

impl fmt::Display for PacketType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0 {
            3 => write!(f, "auth"),
            2 => write!(f, "auth_response/exec_command"),
            0 => write!(f, "response_value"),
            other => write!(f, "unknown({other})"),
        }
    }
}

/// One decoded frame
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Packet {
    pub request_id: i32,
    pub packet_type: PacketType,
    pub body: String,
}

impl Packet {
    pub fn new(packet_type: PacketType, request_id: i32, body: impl Into<String>) -> Self {
        Self {
            request_id,
            packet_type,
            body: body.into(),
        }
    }

    /// Value of the size field this packet has on the wire
    pub fn size(&self) -> usize {
        FRAME_OVERHEAD + self.body.len()
    }

    pub fn encode(&self) -> RconResult<Vec<u8>> {
        encode(self.packet_type, self.request_id, &self.body)
    }
}

/// Encode a frame. The body must be ASCII; no upper bound on its length is
/// enforced here beyond what fits in the size field.
pub fn encode(packet_type: PacketType, request_id: i32, body: &str) -> RconResult<Vec<u8>> {
    if !body.is_ascii() {
        return Err(RconError::non_ascii_body(body));
    }

    let size = u32::try_from(FRAME_OVERHEAD + body.len())
        .map_err(|_| RconError::malformed_frame(u32::MAX, "body too long for the size field"))?;

    let mut frame = Vec::with_capacity(SIZE_FIELD_LEN + size as usize);
    frame.extend_from_slice(&size.to_le_bytes());
    frame.extend_from_slice(&request_id.to_le_bytes());
    frame.extend_from_slice(&packet_type.value().to_le_bytes());
    frame.extend_from_slice(body.as_bytes());
    frame.extend_from_slice(&[0x00, 0x00]);
    Ok(frame)
}

/// Encode and write one frame, flushing the writer
pub async fn write_packet<W>(
    writer: &mut W,
    packet_type: PacketType,
    request_id: i32,
    body: &str,
) -> RconResult<()>
where
    W: AsyncWrite + Unpin,
{
    let frame = encode(packet_type, request_id, body)?;
    writer.write_all(&frame).await?;
    writer.flush().await?;
    Ok(())
}

/// Read exactly one frame.
///
/// A stream that ends early yields `ConnectionClosed`; a size field outside
/// `10..=MAX_FRAME_SIZE` yields `MalformedFrame`.
pub async fn read_packet<R>(reader: &mut R) -> RconResult<Packet>
where
    R: AsyncRead + Unpin,
{
    let size = u32::from_le_bytes(read_array(reader, "size field").await?);
    let request_id = i32::from_le_bytes(read_array(reader, "request id").await?);
    let packet_type = i32::from_le_bytes(read_array(reader, "packet type").await?);

    if (size as usize) < FRAME_OVERHEAD {
        return Err(RconError::malformed_frame(
            size,
            format!("size is below the {FRAME_OVERHEAD} byte minimum"),
        ));
    }
    if size > MAX_FRAME_SIZE {
        return Err(RconError::malformed_frame(
            size,
            format!("size exceeds the {MAX_FRAME_SIZE} byte limit"),
        ));
    }

    let mut body = vec![0u8; size as usize - FRAME_OVERHEAD];
    read_exact_or_closed(reader, &mut body, "body").await?;

    let mut terminators = [0u8; 2];
    read_exact_or_closed(reader, &mut terminators, "terminators").await?;

    Ok(Packet {
        request_id,
        packet_type: PacketType(packet_type),
        body: String::from_utf8_lossy(&body).into_owned(),
    })
}

async fn read_array<R>(reader: &mut R, context: &str) -> RconResult<[u8; 4]>
where
    R: AsyncRead + Unpin,
{
    let mut buf = [0u8; 4];
    read_exact_or_closed(reader, &mut buf, context).await?;
    Ok(buf)
}

async fn read_exact_or_closed<R>(reader: &mut R, buf: &mut [u8], context: &str) -> RconResult<()>
where
    R: AsyncRead + Unpin,
{
    match reader.read_exact(buf).await {
        Ok(_) => Ok(()),
        Err(e) if e.kind() == ErrorKind::UnexpectedEof => {
            Err(RconError::connection_closed(context, buf.len()))
        }
        Err(e) => Err(RconError::Io(e)),
    }
}

//! The relay cell: the atomic unit of the overlay's wire protocol.
//!
//! Wire layout (big-endian throughout):
//!
//! ```text
//! int32  prev_addr_len
//! bytes  prev_addr        (prev_addr_len bytes, UTF-8 "host:port")
//! int32  next_addr_len
//! bytes  next_addr        (next_addr_len bytes)
//! int32  payload_len
//! bytes  payload          (payload_len bytes)
//! int8   is_exit_request  (0 | 1)
//! int8   is_exit_response (0 | 1)
//! ```

use relaynet_common::{config::protocol::MAX_PAYLOAD_SIZE, Endpoint, RelayNetError};

/// A single cell exchanged between relays (spec §3).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelayCell {
    /// Address of the relay that sent this cell; empty if the originator
    /// is the client.
    pub prev_addr: Endpoint,

    /// Address of the relay to forward to; empty if this cell has reached
    /// its terminal.
    pub next_addr: Endpoint,

    /// Request body (toward exit) or response body (toward origin).
    pub payload: Vec<u8>,

    /// True when the receiving relay is to treat the payload as the
    /// terminal request.
    pub is_exit_request: bool,

    /// True when the cell is a response travelling back toward the origin.
    pub is_exit_response: bool,
}

impl RelayCell {
    /// A cell with neither address nor flag set is malformed (spec §3).
    pub fn is_malformed(&self) -> bool {
        self.prev_addr.is_empty()
            && self.next_addr.is_empty()
            && !self.is_exit_request
            && !self.is_exit_response
    }

    /// Serialize to the wire format described above.
    pub fn serialize(&self) -> Vec<u8> {
        let prev = self.prev_addr.as_str().as_bytes();
        let next = self.next_addr.as_str().as_bytes();

        let mut buf =
            Vec::with_capacity(4 + prev.len() + 4 + next.len() + 4 + self.payload.len() + 2);

        buf.extend_from_slice(&(prev.len() as i32).to_be_bytes());
        buf.extend_from_slice(prev);
        buf.extend_from_slice(&(next.len() as i32).to_be_bytes());
        buf.extend_from_slice(next);
        buf.extend_from_slice(&(self.payload.len() as i32).to_be_bytes());
        buf.extend_from_slice(&self.payload);
        buf.push(self.is_exit_request as u8);
        buf.push(self.is_exit_response as u8);

        buf
    }

    /// Parse from the wire format. Fails on negative or oversize lengths,
    /// short reads, and trailing garbage.
    pub fn parse(data: &[u8]) -> Result<Self, RelayNetError> {
        let mut cursor = Cursor::new(data);

        let prev_addr = cursor.read_length_prefixed("prev_addr")?;
        let next_addr = cursor.read_length_prefixed("next_addr")?;
        let payload = cursor.read_length_prefixed("payload")?;

        let is_exit_request = cursor.read_bool("is_exit_request")?;
        let is_exit_response = cursor.read_bool("is_exit_response")?;

        if !cursor.is_exhausted() {
            return Err(RelayNetError::decode("trailing garbage after cell"));
        }

        let prev_addr = String::from_utf8(prev_addr)
            .map_err(|_| RelayNetError::decode("prev_addr is not valid UTF-8"))?;
        let next_addr = String::from_utf8(next_addr)
            .map_err(|_| RelayNetError::decode("next_addr is not valid UTF-8"))?;

        if is_exit_request && is_exit_response {
            return Err(RelayNetError::decode(
                "is_exit_request and is_exit_response both set",
            ));
        }

        Ok(Self {
            prev_addr: prev_addr.into(),
            next_addr: next_addr.into(),
            payload,
            is_exit_request,
            is_exit_response,
        })
    }
}

struct Cursor<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> Cursor<'a> {
    fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    fn is_exhausted(&self) -> bool {
        self.pos == self.data.len()
    }

    fn read_i32(&mut self, field: &str) -> Result<i32, RelayNetError> {
        if self.pos + 4 > self.data.len() {
            return Err(RelayNetError::decode(format!(
                "short read for {field} length"
            )));
        }
        let bytes: [u8; 4] = self.data[self.pos..self.pos + 4].try_into().unwrap();
        self.pos += 4;
        Ok(i32::from_be_bytes(bytes))
    }

    fn read_length_prefixed(&mut self, field: &str) -> Result<Vec<u8>, RelayNetError> {
        let len = self.read_i32(field)?;
        if len < 0 {
            return Err(RelayNetError::decode(format!("negative length for {field}")));
        }
        let len = len as usize;
        if len > MAX_PAYLOAD_SIZE {
            return Err(RelayNetError::decode(format!(
                "{field} length {len} exceeds limit of {MAX_PAYLOAD_SIZE}"
            )));
        }
        if self.pos + len > self.data.len() {
            return Err(RelayNetError::decode(format!("short read for {field} bytes")));
        }
        let bytes = self.data[self.pos..self.pos + len].to_vec();
        self.pos += len;
        Ok(bytes)
    }

    fn read_bool(&mut self, field: &str) -> Result<bool, RelayNetError> {
        if self.pos + 1 > self.data.len() {
            return Err(RelayNetError::decode(format!("short read for {field}")));
        }
        let byte = self.data[self.pos];
        self.pos += 1;
        match byte {
            0 => Ok(false),
            1 => Ok(true),
            other => Err(RelayNetError::decode(format!(
                "{field} must be 0 or 1, got {other}"
            ))),
        }
    }
}

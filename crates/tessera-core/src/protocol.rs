//! Binary wire protocol spoken between the host and the accessibility agent.
//!
//! # Packet Structure (Little Endian)
//!
//! ```text
//! [Header: 4 bytes LE u32 len] [OpCode: 1 byte] [Payload: variable]
//! ```
//!
//! `len` covers the opcode and payload, not the header itself.
//!
//! Strings are a `u32` LE byte count followed by UTF-8 bytes. Optional values
//! are a `u8` presence flag (`0` = None, `1` = Some) followed by the value.
//!
//! ```
//! use tessera_core::protocol::{Request, encode_request, decode_request};
//!
//! let req = Request::TypeText { text: "test".into() };
//! let wire = encode_request(&req);
//! assert_eq!(decode_request(&wire[4..]).unwrap(), req);
//! ```

use thiserror::Error;

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Errors that can occur during protocol encoding or decoding.
#[derive(Error, Debug, PartialEq, Eq)]
pub enum ProtocolError {
    /// The opcode byte does not correspond to any known operation.
    #[error("invalid opcode: 0x{0:02X}")]
    InvalidOpCode(u8),

    /// The buffer does not contain enough bytes for the expected data.
    #[error("insufficient data in buffer")]
    InsufficientData,

    /// A string field contains invalid UTF-8.
    #[error("invalid UTF-8 in string field")]
    Utf8Error,

    /// The payload structure is invalid for the given opcode.
    #[error("invalid payload: {0}")]
    InvalidPayload(String),
}

// ---------------------------------------------------------------------------
// OpCode
// ---------------------------------------------------------------------------

/// On-the-wire operation codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum OpCode {
    /// Keep-alive ping (no payload).
    Heartbeat = 0x01,
    /// Tap element by accessibility identifier.
    TapElement = 0x03,
    /// Type text via keyboard into the focused element.
    TypeText = 0x06,
    /// Current value of an element (identifier + optional type).
    GetValue = 0x08,
    /// Full accessibility tree dump (no payload).
    DumpTree = 0x10,
    /// Set the target application bundle id.
    SetTarget = 0x12,
    /// Find a single element (identifier + optional type).
    FindElement = 0x13,
    /// Bare error message from the agent.
    Error = 0x99,
    /// Generic response (response-type byte + data).
    Response = 0xA0,
}

impl OpCode {
    pub fn from_u8(byte: u8) -> Result<Self, ProtocolError> {
        match byte {
            0x01 => Ok(OpCode::Heartbeat),
            0x03 => Ok(OpCode::TapElement),
            0x06 => Ok(OpCode::TypeText),
            0x08 => Ok(OpCode::GetValue),
            0x10 => Ok(OpCode::DumpTree),
            0x12 => Ok(OpCode::SetTarget),
            0x13 => Ok(OpCode::FindElement),
            0x99 => Ok(OpCode::Error),
            0xA0 => Ok(OpCode::Response),
            other => Err(ProtocolError::InvalidOpCode(other)),
        }
    }
}

// ---------------------------------------------------------------------------
// Request / Response enums
// ---------------------------------------------------------------------------

/// A typed request from the host to the agent.
#[derive(Debug, Clone, PartialEq)]
pub enum Request {
    Heartbeat,
    /// Tap the element with this accessibility identifier.
    TapElement { selector: String },
    /// Type into whatever currently has keyboard focus.
    TypeText { text: String },
    GetValue { selector: String, element_type: Option<String> },
    DumpTree,
    /// Point the agent at another application.
    SetTarget { bundle_id: String },
    /// Look up one element, optionally restricted to an element type.
    FindElement { selector: String, element_type: Option<String> },
}

impl Request {
    /// Short static name for tracing span metadata.
    pub fn opcode_name(&self) -> &'static str {
        match self {
            Request::Heartbeat => "heartbeat",
            Request::TapElement { .. } => "tap_element",
            Request::TypeText { .. } => "type_text",
            Request::GetValue { .. } => "get_value",
            Request::DumpTree => "dump_tree",
            Request::SetTarget { .. } => "set_target",
            Request::FindElement { .. } => "find_element",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
enum ResponseType {
    Ok = 0x00,
    Error = 0x01,
    Tree = 0x02,
    Value = 0x04,
    Element = 0x05,
}

impl ResponseType {
    fn from_u8(byte: u8) -> Result<Self, ProtocolError> {
        match byte {
            0x00 => Ok(ResponseType::Ok),
            0x01 => Ok(ResponseType::Error),
            0x02 => Ok(ResponseType::Tree),
            0x04 => Ok(ResponseType::Value),
            0x05 => Ok(ResponseType::Element),
            other => Err(ProtocolError::InvalidPayload(format!(
                "unknown response type: 0x{other:02X}"
            ))),
        }
    }
}

/// A typed response from the agent to the host.
#[derive(Debug, Clone, PartialEq)]
pub enum Response {
    Ok,
    /// The agent rejected or failed the request.
    Error { message: String },
    /// A JSON-encoded accessibility tree.
    Tree { json: String },
    /// `None` when the element has no value.
    Value { value: Option<String> },
    /// A JSON-encoded single element, or `null` when nothing matched.
    Element { json: String },
}

// ---------------------------------------------------------------------------
// Low-level payload helpers
// ---------------------------------------------------------------------------

fn write_string(buf: &mut Vec<u8>, s: &str) {
    let bytes = s.as_bytes();
    buf.extend_from_slice(&(bytes.len() as u32).to_le_bytes());
    buf.extend_from_slice(bytes);
}

fn write_optional_string(buf: &mut Vec<u8>, opt: &Option<String>) {
    match opt {
        None => buf.push(0u8),
        Some(s) => {
            buf.push(1u8);
            write_string(buf, s);
        }
    }
}

/// Sequential reader over a payload slice.
struct Cursor<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> Cursor<'a> {
    fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    fn remaining(&self) -> usize {
        self.data.len().saturating_sub(self.pos)
    }

    fn take(&mut self, n: usize) -> Result<&'a [u8], ProtocolError> {
        if self.remaining() < n {
            return Err(ProtocolError::InsufficientData);
        }
        let slice = &self.data[self.pos..self.pos + n];
        self.pos += n;
        Ok(slice)
    }

    fn read_u8(&mut self) -> Result<u8, ProtocolError> {
        Ok(self.take(1)?[0])
    }

    fn read_u32(&mut self) -> Result<u32, ProtocolError> {
        let bytes: [u8; 4] = self
            .take(4)?
            .try_into()
            .map_err(|_| ProtocolError::InsufficientData)?;
        Ok(u32::from_le_bytes(bytes))
    }

    fn read_string(&mut self) -> Result<String, ProtocolError> {
        let len = self.read_u32()? as usize;
        let bytes = self.take(len)?;
        std::str::from_utf8(bytes)
            .map(str::to_owned)
            .map_err(|_| ProtocolError::Utf8Error)
    }

    fn read_optional_string(&mut self) -> Result<Option<String>, ProtocolError> {
        match self.read_u8()? {
            0 => Ok(None),
            _ => Ok(Some(self.read_string()?)),
        }
    }
}

// ---------------------------------------------------------------------------
// Frame helpers
// ---------------------------------------------------------------------------

/// Wrap a payload (opcode + data) with the 4-byte LE length header.
pub fn encode_frame(payload: &[u8]) -> Vec<u8> {
    let mut frame = Vec::with_capacity(4 + payload.len());
    frame.extend_from_slice(&(payload.len() as u32).to_le_bytes());
    frame.extend_from_slice(payload);
    frame
}

/// Read the payload length from a 4-byte LE header.
pub fn read_frame_length(header: &[u8; 4]) -> u32 {
    u32::from_le_bytes(*header)
}

// ---------------------------------------------------------------------------
// Encode request
// ---------------------------------------------------------------------------

/// Encode a [`Request`] into a complete frame, header included.
pub fn encode_request(req: &Request) -> Vec<u8> {
    let mut payload = Vec::new();

    match req {
        Request::Heartbeat => payload.push(OpCode::Heartbeat as u8),
        Request::TapElement { selector } => {
            payload.push(OpCode::TapElement as u8);
            write_string(&mut payload, selector);
        }
        Request::TypeText { text } => {
            payload.push(OpCode::TypeText as u8);
            write_string(&mut payload, text);
        }
        Request::GetValue { selector, element_type } => {
            payload.push(OpCode::GetValue as u8);
            write_string(&mut payload, selector);
            write_optional_string(&mut payload, element_type);
        }
        Request::DumpTree => payload.push(OpCode::DumpTree as u8),
        Request::SetTarget { bundle_id } => {
            payload.push(OpCode::SetTarget as u8);
            write_string(&mut payload, bundle_id);
        }
        Request::FindElement { selector, element_type } => {
            payload.push(OpCode::FindElement as u8);
            write_string(&mut payload, selector);
            write_optional_string(&mut payload, element_type);
        }
    }

    encode_frame(&payload)
}

// ---------------------------------------------------------------------------
// Decode request
// ---------------------------------------------------------------------------

/// Decode a request payload (starting at the opcode byte, header excluded).
pub fn decode_request(data: &[u8]) -> Result<Request, ProtocolError> {
    let mut cur = Cursor::new(data);
    let opcode = OpCode::from_u8(cur.read_u8()?)?;

    match opcode {
        OpCode::Heartbeat => Ok(Request::Heartbeat),
        OpCode::TapElement => Ok(Request::TapElement { selector: cur.read_string()? }),
        OpCode::TypeText => Ok(Request::TypeText { text: cur.read_string()? }),
        OpCode::GetValue => {
            let selector = cur.read_string()?;
            let element_type = cur.read_optional_string()?;
            Ok(Request::GetValue { selector, element_type })
        }
        OpCode::DumpTree => Ok(Request::DumpTree),
        OpCode::SetTarget => Ok(Request::SetTarget { bundle_id: cur.read_string()? }),
        OpCode::FindElement => {
            let selector = cur.read_string()?;
            let element_type = cur.read_optional_string()?;
            Ok(Request::FindElement { selector, element_type })
        }
        OpCode::Error | OpCode::Response => Err(ProtocolError::InvalidPayload(format!(
            "opcode 0x{:02X} is not a valid request opcode",
            opcode as u8
        ))),
    }
}

// ---------------------------------------------------------------------------
// Encode response
// ---------------------------------------------------------------------------

/// Encode a [`Response`] into a complete frame, header included.
pub fn encode_response(resp: &Response) -> Vec<u8> {
    let mut payload = vec![OpCode::Response as u8];

    match resp {
        Response::Ok => payload.push(ResponseType::Ok as u8),
        Response::Error { message } => {
            payload.push(ResponseType::Error as u8);
            write_string(&mut payload, message);
        }
        Response::Tree { json } => {
            payload.push(ResponseType::Tree as u8);
            write_string(&mut payload, json);
        }
        Response::Value { value } => {
            payload.push(ResponseType::Value as u8);
            write_optional_string(&mut payload, value);
        }
        Response::Element { json } => {
            payload.push(ResponseType::Element as u8);
            write_string(&mut payload, json);
        }
    }

    encode_frame(&payload)
}

// ---------------------------------------------------------------------------
// Decode response
// ---------------------------------------------------------------------------

/// Decode a response payload (starting at the opcode byte, header excluded).
///
/// Accepts both the `Response` opcode and a bare `Error` opcode.
pub fn decode_response(data: &[u8]) -> Result<Response, ProtocolError> {
    let mut cur = Cursor::new(data);
    let opcode = OpCode::from_u8(cur.read_u8()?)?;

    match opcode {
        OpCode::Response => match ResponseType::from_u8(cur.read_u8()?)? {
            ResponseType::Ok => Ok(Response::Ok),
            ResponseType::Error => Ok(Response::Error { message: cur.read_string()? }),
            ResponseType::Tree => Ok(Response::Tree { json: cur.read_string()? }),
            ResponseType::Value => Ok(Response::Value { value: cur.read_optional_string()? }),
            ResponseType::Element => Ok(Response::Element { json: cur.read_string()? }),
        },
        OpCode::Error => Ok(Response::Error { message: cur.read_string()? }),
        _ => Err(ProtocolError::InvalidPayload(format!(
            "opcode 0x{:02X} is not a valid response opcode",
            opcode as u8
        ))),
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

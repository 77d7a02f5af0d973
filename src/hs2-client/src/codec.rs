// Copyright Materialize, Inc. and contributors. All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

//! Encoding/decoding of the frames exchanged with the service.
//!
//! Two layers live here. [`SaslCodec`] frames the SASL handshake that runs
//! on TCP transports before any call is made: one status byte, a four byte
//! big-endian length, then the payload. Once negotiation completes, each call
//! is a single message produced by [`encode_call`] and answered by a message
//! read with [`decode_reply`]. The channel decides how messages are framed on
//! the wire (length prefix on TCP, one POST per message over HTTP).

use std::io;

use bytes::{Buf, BufMut, Bytes, BytesMut};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tokio_util::codec::{Decoder, Encoder};

use crate::error::ConnectionError;

/// The largest SASL frame accepted from the server.
pub const MAX_SASL_FRAME_SIZE: usize = 1 << 20;

/// Status byte of a SASL negotiation frame.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[repr(u8)]
pub enum SaslStatus {
    Start = 1,
    Ok = 2,
    Bad = 3,
    Error = 4,
    Complete = 5,
}

impl TryFrom<u8> for SaslStatus {
    type Error = io::Error;

    fn try_from(byte: u8) -> Result<SaslStatus, io::Error> {
        match byte {
            1 => Ok(SaslStatus::Start),
            2 => Ok(SaslStatus::Ok),
            3 => Ok(SaslStatus::Bad),
            4 => Ok(SaslStatus::Error),
            5 => Ok(SaslStatus::Complete),
            _ => Err(io::Error::new(
                io::ErrorKind::InvalidData,
                format!("invalid sasl status byte {byte}"),
            )),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SaslFrame {
    pub status: SaslStatus,
    pub payload: Bytes,
}

impl SaslFrame {
    pub fn new(status: SaslStatus, payload: impl Into<Bytes>) -> SaslFrame {
        SaslFrame {
            status,
            payload: payload.into(),
        }
    }

    /// The payload as text, for error reporting.
    pub fn message(&self) -> String {
        String::from_utf8_lossy(&self.payload).into_owned()
    }
}

#[derive(Debug, Default)]
pub struct SaslCodec;

impl Decoder for SaslCodec {
    type Item = SaslFrame;
    type Error = io::Error;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<SaslFrame>, io::Error> {
        if src.len() < 5 {
            return Ok(None);
        }
        let status = SaslStatus::try_from(src[0])?;
        let len = usize::try_from(u32::from_be_bytes([src[1], src[2], src[3], src[4]]))
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
        if len > MAX_SASL_FRAME_SIZE {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                format!("sasl frame of {len} bytes exceeds limit"),
            ));
        }
        if src.len() < 5 + len {
            src.reserve(5 + len - src.len());
            return Ok(None);
        }
        src.advance(5);
        let payload = src.split_to(len).freeze();
        Ok(Some(SaslFrame { status, payload }))
    }
}

impl Encoder<SaslFrame> for SaslCodec {
    type Error = io::Error;

    fn encode(&mut self, frame: SaslFrame, dst: &mut BytesMut) -> Result<(), io::Error> {
        let len = u32::try_from(frame.payload.len())
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidInput, e))?;
        dst.reserve(5 + frame.payload.len());
        dst.put_u8(frame.status as u8);
        dst.put_u32(len);
        dst.extend_from_slice(&frame.payload);
        Ok(())
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct Call<'a, T> {
    method: &'a str,
    seq_id: i32,
    body: &'a T,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct Reply<T> {
    method: String,
    seq_id: i32,
    body: Option<T>,
    exception: Option<String>,
}

/// Encodes one call of `method`.
pub fn encode_call<T: Serialize>(
    method: &str,
    seq_id: i32,
    body: &T,
) -> Result<Bytes, ConnectionError> {
    let buf = serde_json::to_vec(&Call {
        method,
        seq_id,
        body,
    })?;
    Ok(Bytes::from(buf))
}

/// Decodes the reply to the call of `method` numbered `seq_id`.
pub fn decode_reply<T: DeserializeOwned>(
    method: &'static str,
    seq_id: i32,
    frame: &[u8],
) -> Result<T, ConnectionError> {
    let reply: Reply<T> = serde_json::from_slice(frame)?;
    if reply.method != method || reply.seq_id != seq_id {
        return Err(ConnectionError::Protocol {
            method,
            message: format!(
                "reply to {} #{} received for call #{}",
                reply.method, reply.seq_id, seq_id
            ),
        });
    }
    if let Some(message) = reply.exception {
        return Err(ConnectionError::Application { method, message });
    }
    reply.body.ok_or_else(|| ConnectionError::Protocol {
        method,
        message: "reply carried no body".into(),
    })
}

#[cfg(test)]
mod tests {
    use crate::protocol::StatusResp;

    use super::*;

    #[test]
    fn sasl_frame_waits_for_full_payload() {
        let mut codec = SaslCodec;
        let mut buf = BytesMut::new();
        codec
            .encode(SaslFrame::new(SaslStatus::Complete, "done"), &mut buf)
            .unwrap();
        assert_eq!(&buf[..5], &[5, 0, 0, 0, 4]);

        let mut partial = BytesMut::from(&buf[..7]);
        assert_eq!(codec.decode(&mut partial).unwrap(), None);
        partial.extend_from_slice(&buf[7..]);
        let frame = codec.decode(&mut partial).unwrap().unwrap();
        assert_eq!(frame.status, SaslStatus::Complete);
        assert_eq!(frame.message(), "done");
        assert!(partial.is_empty());
    }

    #[test]
    fn sasl_rejects_unknown_status() {
        let mut buf = BytesMut::from(&[9u8, 0, 0, 0, 0][..]);
        assert!(SaslCodec.decode(&mut buf).is_err());
    }

    #[test]
    fn reply_must_match_call() {
        let frame = br#"{"method":"CloseOperation","seqId":3,"body":{"status":{"statusCode":0}}}"#;
        let reply: StatusResp = decode_reply("CloseOperation", 3, frame).unwrap();
        assert_eq!(reply.status.status_code, 0);

        let err = decode_reply::<StatusResp>("CloseOperation", 4, frame).unwrap_err();
        assert!(matches!(err, ConnectionError::Protocol { .. }));
    }

    #[test]
    fn exception_reply() {
        let frame = br#"{"method":"FetchResults","seqId":1,"exception":"Invalid method name"}"#;
        let err = decode_reply::<StatusResp>("FetchResults", 1, frame).unwrap_err();
        assert_eq!(
            err.to_string(),
            "FetchResults: remote exception: Invalid method name"
        );
    }
}

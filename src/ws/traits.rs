//! Core traits for the session transport.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::error::WsError;
use crate::serde_helpers::deserialize_with_warnings;
use crate::types::{Request, RequestId, Response, ResponseId};

/// Converts typed requests into frames and frames into typed responses.
///
/// The client never inspects frame bytes itself; swapping the codec changes the wire format
/// without touching session handling.
///
/// # Example
///
/// ```ignore
/// pub struct MyCodec;
///
/// impl MessageCodec for MyCodec {
///     fn encode(&self, request: &Request) -> crate::Result<Vec<u8>> { /* ... */ }
///     fn decode(&self, bytes: &[u8]) -> crate::Result<Response> { /* ... */ }
/// }
/// ```
pub trait MessageCodec: Send + Sync + 'static {
    /// Encode a request, including its [`RequestId`], into a frame.
    fn encode(&self, request: &Request) -> crate::Result<Vec<u8>>;

    /// Decode a frame into a response tagged by its [`ResponseId`].
    fn decode(&self, bytes: &[u8]) -> crate::Result<Response>;
}

/// JSON envelope codec: `{"id": <u8>, "data": {...}}`.
#[non_exhaustive]
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonCodec;

#[derive(Serialize)]
struct OutboundEnvelope {
    id: RequestId,
    data: Value,
}

#[derive(Deserialize)]
struct InboundEnvelope {
    id: u8,
    #[serde(default)]
    data: Value,
}

impl MessageCodec for JsonCodec {
    fn encode(&self, request: &Request) -> crate::Result<Vec<u8>> {
        let envelope = OutboundEnvelope {
            id: request.id(),
            data: request.payload()?,
        };

        Ok(serde_json::to_vec(&envelope)?)
    }

    fn decode(&self, bytes: &[u8]) -> crate::Result<Response> {
        let envelope: InboundEnvelope =
            serde_json::from_slice(bytes).map_err(WsError::MessageParse)?;

        let id = ResponseId::from_repr(envelope.id).ok_or(WsError::UnknownResponse(envelope.id))?;

        let response = match id {
            ResponseId::Metadata => Response::Metadata(deserialize_with_warnings(envelope.data)?),
            ResponseId::SessionCreate => {
                Response::SessionCreate(deserialize_with_warnings(envelope.data)?)
            }
            ResponseId::Auctions => Response::Auctions(deserialize_with_warnings(envelope.data)?),
        };

        Ok(response)
    }
}

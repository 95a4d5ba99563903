use base64::{Engine as _, prelude::BASE64_URL_SAFE_NO_PAD};
use serde::Deserialize;
use serde_json::{Map, Value};

use super::{claims::ClaimSet, error::VerifyError};

/// JOSE header of a compact token.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct TokenHeader {
    /// Algorithm named by the token. Informational only; verification always
    /// uses RS256.
    pub alg: String,

    /// Key ID of the signing key.
    #[serde(default)]
    pub kid: Option<String>,
}

/// A decoded, not yet trusted, compact JWT.
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedToken {
    pub header: TokenHeader,
    pub claims: ClaimSet,
    signing_input: String,
    signature: Vec<u8>,
}

impl ParsedToken {
    /// Decodes `header.payload.signature`.
    ///
    /// # Errors
    /// Returns [`VerifyError::MalformedToken`] when the token does not have
    /// exactly three segments, a segment is not unpadded base64url, the
    /// header or payload is not a JSON object, the payload lacks a required
    /// claim, or the signature is empty.
    pub fn parse(token: &str) -> Result<Self, VerifyError> {
        let mut segments = token.split('.');
        let (Some(header_segment), Some(payload_segment), Some(signature_segment), None) = (
            segments.next(),
            segments.next(),
            segments.next(),
            segments.next(),
        ) else {
            return Err(VerifyError::MalformedToken("expected three segments"));
        };

        let header = decode_object(
            header_segment,
            "header is not base64url",
            "header is not a JSON object",
        )?;
        let header: TokenHeader = serde_json::from_value(Value::Object(header))
            .map_err(|_| VerifyError::MalformedToken("invalid header"))?;

        let claims = decode_object(
            payload_segment,
            "payload is not base64url",
            "payload is not a JSON object",
        )?;
        let claims: ClaimSet = serde_json::from_value(Value::Object(claims))
            .map_err(|_| VerifyError::MalformedToken("invalid claims"))?;

        let signature = BASE64_URL_SAFE_NO_PAD
            .decode(signature_segment)
            .map_err(|_| VerifyError::MalformedToken("signature is not base64url"))?;
        if signature.is_empty() {
            return Err(VerifyError::MalformedToken("missing signature"));
        }

        // The signature covers the segments exactly as transmitted.
        let signing_input_len = header_segment.len() + 1 + payload_segment.len();

        Ok(Self {
            header,
            claims,
            signing_input: token[..signing_input_len].to_string(),
            signature,
        })
    }

    /// The bytes the signature was computed over.
    #[must_use]
    pub fn signing_input(&self) -> &[u8] {
        self.signing_input.as_bytes()
    }

    /// The decoded signature.
    #[must_use]
    pub fn signature(&self) -> &[u8] {
        &self.signature
    }
}

fn decode_object(
    segment: &str,
    not_base64: &'static str,
    not_object: &'static str,
) -> Result<Map<String, Value>, VerifyError> {
    let bytes = BASE64_URL_SAFE_NO_PAD
        .decode(segment)
        .map_err(|_| VerifyError::MalformedToken(not_base64))?;

    match serde_json::from_slice(&bytes) {
        Ok(Value::Object(object)) => Ok(object),
        _ => Err(VerifyError::MalformedToken(not_object)),
    }
}

use std::{fmt, io::Write, sync::OnceLock};

use base64::{
    prelude::{BASE64_STANDARD, BASE64_STANDARD_NO_PAD},
    Engine,
};
use derive_new::new;
use flate2::{
    write::{DeflateDecoder, DeflateEncoder},
    Compression,
};
use getset::{CopyGetters, Getters};
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::{DecodeError, EncodeError};

#[derive(Clone, Copy, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SdpKind {
    Offer,
    Answer,
}

impl SdpKind {
    fn tag(self) -> &'static str {
        match self {
            Self::Offer => "offer",
            Self::Answer => "answer",
        }
    }

    fn from_tag(tag: &str) -> Option<Self> {
        match tag {
            "offer" => Some(Self::Offer),
            "answer" => Some(Self::Answer),
            _ => None,
        }
    }
}

impl fmt::Display for SdpKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

/// One endpoint's offer or answer. The field names match the browser's
/// `RTCSessionDescription` JSON so the json token format stays interoperable.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize, CopyGetters, Getters, new)]
pub struct SessionDescription {
    #[serde(rename = "type")]
    #[get_copy = "pub"]
    kind: SdpKind,
    #[serde(rename = "sdp")]
    #[get = "pub"]
    body: String,
}

impl SessionDescription {
    pub fn offer(body: impl Into<String>) -> Self {
        Self::new(SdpKind::Offer, body.into())
    }

    pub fn answer(body: impl Into<String>) -> Self {
        Self::new(SdpKind::Answer, body.into())
    }

    pub fn into_body(self) -> String {
        self.body
    }
}

#[derive(Clone, Debug, Eq, PartialEq, Deserialize, Serialize)]
pub struct SignalingToken(String);

impl SignalingToken {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_inner(self) -> String {
        self.0
    }
}

impl fmt::Display for SignalingToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Clone, Copy, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum SignalingFormat {
    /// `<offer>BASE64(DEFLATE(sdp))</offer>`
    #[default]
    Compressed,
    /// `BASE64(JSON(description))`, the format browser demos paste.
    Json,
}

#[derive(Clone, Copy, Debug, Default, new)]
pub struct SignalingCodec {
    format: SignalingFormat,
}

impl SignalingCodec {
    pub fn encode(&self, desc: &SessionDescription) -> Result<SignalingToken, EncodeError> {
        match self.format {
            SignalingFormat::Compressed => encode_compressed(desc),
            SignalingFormat::Json => encode_json(desc),
        }
    }

    /// Accepts either token format regardless of the configured one.
    pub fn decode(&self, token: &str) -> Result<SessionDescription, DecodeError> {
        decode(token)
    }
}

fn whitespace() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\s").expect("valid regex"))
}

fn tagged() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r#"^<(.+?)>(.+?)</(.+?)>$"#).expect("valid regex"))
}

fn encode_compressed(desc: &SessionDescription) -> Result<SignalingToken, EncodeError> {
    let mut e = DeflateEncoder::new(Vec::new(), Compression::best());
    e.write_all(desc.body.as_bytes())
        .map_err(EncodeError::Deflate)?;
    let compressed_bytes = e.finish().map_err(EncodeError::Deflate)?;
    let tag = desc.kind.tag();
    Ok(SignalingToken(format!(
        "<{}>{}</{}>",
        tag,
        BASE64_STANDARD_NO_PAD.encode(compressed_bytes),
        tag
    )))
}

fn encode_json(desc: &SessionDescription) -> Result<SignalingToken, EncodeError> {
    let json = serde_json::to_vec(desc)?;
    Ok(SignalingToken(BASE64_STANDARD.encode(json)))
}

pub fn encode(desc: &SessionDescription) -> Result<SignalingToken, EncodeError> {
    SignalingCodec::default().encode(desc)
}

pub fn decode(token: &str) -> Result<SessionDescription, DecodeError> {
    let code = whitespace().replace_all(token, "");
    if code.is_empty() {
        return Err(DecodeError::Empty);
    }
    if code.starts_with('<') {
        decode_compressed(&code)
    } else {
        decode_json(&code)
    }
}

fn decode_compressed(code: &str) -> Result<SessionDescription, DecodeError> {
    let captures = tagged()
        .captures(code)
        .ok_or_else(|| DecodeError::Malformed {
            reason: "expected <tag>...</tag>".to_owned(),
        })?;
    let tag = &captures[1];
    let tag_end = &captures[3];
    if tag != tag_end {
        return Err(DecodeError::UnmatchedTag {
            open: tag.to_owned(),
            close: tag_end.to_owned(),
        });
    }
    let kind = SdpKind::from_tag(tag).ok_or_else(|| DecodeError::UnknownKind(tag.to_owned()))?;

    let compressed_bytes = BASE64_STANDARD_NO_PAD.decode(&captures[2])?;
    let mut d = DeflateDecoder::new(Vec::new());
    d.write_all(&compressed_bytes)
        .map_err(DecodeError::Inflate)?;
    let body = String::from_utf8(d.finish().map_err(DecodeError::Inflate)?)?;
    Ok(SessionDescription::new(kind, body))
}

fn decode_json(code: &str) -> Result<SessionDescription, DecodeError> {
    // Tolerate tokens whose padding was lost while copying.
    let bytes = BASE64_STANDARD
        .decode(code)
        .or_else(|_| BASE64_STANDARD_NO_PAD.decode(code.trim_end_matches('=')))?;
    Ok(serde_json::from_slice(&bytes)?)
}

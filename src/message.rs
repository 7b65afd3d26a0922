//! Gmail API shaped view of a part tree
//!
//! Mirrors the `MessagePart` resource of the Gmail API, so a parsed message
//! can be handed to consumers which expect that layout.

use bytes::Bytes;
#[cfg(feature = "serde")]
use serde::{Serialize, Serializer};

use crate::mimebody::Part;

/// Header line of a message part
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize))]
pub struct HeaderPair {
    pub name: String,
    pub value: String,
}

/// Decoded body of a message part
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize), serde(rename_all = "camelCase"))]
pub struct MessagePartBody {
    #[cfg_attr(feature = "serde", serde(skip_serializing_if = "String::is_empty"))]
    pub attachment_id: String,
    #[cfg_attr(
        feature = "serde",
        serde(serialize_with = "serialize_base64", skip_serializing_if = "Bytes::is_empty")
    )]
    pub data: Bytes,
    pub size: usize,
}

/// Part of a message with its subparts
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize), serde(rename_all = "camelCase"))]
pub struct MessagePart {
    pub part_id: String,
    pub mime_type: String,
    #[cfg_attr(feature = "serde", serde(rename = "filename"))]
    pub file_name: String,
    pub headers: Vec<HeaderPair>,
    pub body: MessagePartBody,
    #[cfg_attr(feature = "serde", serde(skip_serializing_if = "Vec::is_empty"))]
    pub parts: Vec<MessagePart>,
}

impl<'a> From<&'a Part> for MessagePart {
    fn from(part: &'a Part) -> Self {
        MessagePart {
            part_id: part.id().to_string(),
            mime_type: part.content_type().to_string(),
            file_name: part.file_name().to_string(),
            headers: part
                .headers()
                .iter()
                .map(|(name, value)| HeaderPair {
                    name: name.to_string(),
                    value: value.to_string(),
                })
                .collect(),
            body: MessagePartBody {
                attachment_id: part.content_id().to_string(),
                data: part.content().clone(),
                size: part.len(),
            },
            parts: part.children().iter().map(MessagePart::from).collect(),
        }
    }
}

#[cfg(feature = "serde")]
fn serialize_base64<S>(data: &Bytes, serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    use base64::engine::general_purpose::STANDARD;
    use base64::Engine as _;

    serializer.serialize_str(&STANDARD.encode(data))
}

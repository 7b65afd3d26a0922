use bytes::Bytes;

use crate::mimebody::Part;

/// Attachment found in a part tree
#[derive(Debug, Clone, PartialEq)]
pub struct Attachment {
    /// Content-ID of the part
    pub attachment_id: String,
    /// Content type without parameters
    pub content_type: String,
    /// Disposition without parameters
    pub disposition: String,
    /// File name from the disposition or the content type
    pub file_name: String,
    pub data: Bytes,
    pub size: usize,
}

impl Attachment {
    fn from_part(part: &Part) -> Self {
        let data = if part.is_message() {
            // only a base64 message has its bytes in the first child
            part.children()
                .first()
                .map(|child| child.content().clone())
                .unwrap_or_default()
        } else {
            part.content().clone()
        };

        Attachment {
            attachment_id: part.content_id().to_string(),
            content_type: part.content_type().to_string(),
            disposition: part.disposition().to_string(),
            file_name: part.file_name().to_string(),
            size: data.len(),
            data,
        }
    }
}

fn is_attachment(part: &Part) -> bool {
    part.disposition() == "attachment" || part.content_type() == "application/octet-stream"
}

/// Collects attachment parts in depth-first order
///
/// A part counts as attachment when its disposition is `attachment` or its
/// type is `application/octet-stream`. Children of an attachment are visited
/// as well.
pub fn attachments(root: &Part) -> Vec<Attachment> {
    root.walk()
        .filter(|part| is_attachment(part))
        .map(Attachment::from_part)
        .collect()
}

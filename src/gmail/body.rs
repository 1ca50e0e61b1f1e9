use base64::Engine;
use base64::alphabet::URL_SAFE;
use base64::engine::{DecodePaddingMode, GeneralPurpose, GeneralPurposeConfig};

use super::model::MessagePart;

const TEXT_PLAIN: &str = "text/plain";
const TEXT_HTML: &str = "text/html";
const MULTIPART_ALTERNATIVE: &str = "multipart/alternative";
const MULTIPART_RELATED: &str = "multipart/related";

// Gmail 的 body.data 是 URL 安全的 base64，填充可有可无
const GMAIL_BASE64: GeneralPurpose = GeneralPurpose::new(
    &URL_SAFE,
    GeneralPurposeConfig::new().with_decode_padding_mode(DecodePaddingMode::Indifferent),
);

/// 提取正文，优先 text/plain，其次 text/html，再递归进入 multipart/alternative 与 multipart/related
pub fn extract_body(part: &MessagePart) -> Option<String> {
    let Some(parts) = part.parts.as_deref() else {
        return decode_part(part);
    };

    let find = |mime: &str| parts.iter().find(|p| p.mime_type.eq_ignore_ascii_case(mime));

    if let Some(text) = find(TEXT_PLAIN).or_else(|| find(TEXT_HTML)) {
        return decode_part(text);
    }

    [MULTIPART_ALTERNATIVE, MULTIPART_RELATED]
        .into_iter()
        .filter_map(find)
        .find_map(extract_body)
}

fn decode_part(part: &MessagePart) -> Option<String> {
    let data = part.body.as_ref()?.data.as_deref()?;
    match GMAIL_BASE64.decode(data) {
        Ok(bytes) => Some(String::from_utf8_lossy(&bytes).into_owned()),
        Err(e) => {
            tracing::warn!("failed to decode message body: {}", e);
            None
        }
    }
}

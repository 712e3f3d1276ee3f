//! Minimal RFC 822 / MIME part model: header fields, body and multipart children.
//!
//! Transfer and charset decoding are the host's business; bodies are kept as
//! received (line endings normalised to `\n`).

use std::rc::Rc;

/// One MIME entity. A message is the root part.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Part {
    header: String,
    body: String,
    fields: Vec<(String, String)>,
    children: Vec<Rc<Part>>,
}

/// Parsed `Content-Type` value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContentType {
    pub media_type: String,
    pub sub_type: String,
    pub params: Vec<(String, String)>,
}

impl ContentType {
    pub fn param(&self, name: &str) -> Option<&str> {
        self.params
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }

    pub fn is(&self, media_type: &str, sub_type: &str) -> bool {
        self.media_type.eq_ignore_ascii_case(media_type)
            && (sub_type == "*" || self.sub_type.eq_ignore_ascii_case(sub_type))
    }
}

impl Default for ContentType {
    fn default() -> Self {
        Self {
            media_type: "text".to_string(),
            sub_type: "plain".to_string(),
            params: Vec::new(),
        }
    }
}

impl Part {
    /// Parses a complete entity (header, blank line, body).
    pub fn parse(content: &str) -> Part {
        let content = content.replace("\r\n", "\n");
        let (header, body) = match content.find("\n\n") {
            Some(pos) => (&content[..pos + 1], &content[pos + 2..]),
            None if content.starts_with('\n') => ("", &content[1..]),
            None => (content.as_str(), ""),
        };

        let fields = parse_fields(header);
        let mut part = Part {
            header: header.to_string(),
            body: body.to_string(),
            fields,
            children: Vec::new(),
        };

        let content_type = part.content_type();
        if content_type.is("multipart", "*") {
            if let Some(boundary) = content_type.param("boundary") {
                part.children = split_multipart(body, boundary)
                    .into_iter()
                    .map(|segment| Rc::new(Part::parse(segment)))
                    .collect();
            }
        }
        part
    }

    /// Raw header block, including the trailing newline.
    pub fn header(&self) -> &str {
        &self.header
    }

    pub fn body(&self) -> &str {
        &self.body
    }

    /// First field with this name (case-insensitive), unfolded.
    pub fn field(&self, name: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }

    /// Every occurrence of a field, in header order.
    pub fn fields(&self, name: &str) -> Vec<&str> {
        self.fields
            .iter()
            .filter(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
            .collect()
    }

    pub fn content_type(&self) -> ContentType {
        self.field("Content-Type")
            .map(parse_content_type)
            .unwrap_or_default()
    }

    pub fn is_multipart(&self) -> bool {
        !self.children.is_empty()
    }

    pub fn part_count(&self) -> usize {
        self.children.len()
    }

    pub fn part(&self, index: usize) -> Option<Rc<Part>> {
        self.children.get(index).cloned()
    }

    pub fn parts(&self) -> &[Rc<Part>] {
        &self.children
    }

    /// Attachment file name from `Content-Disposition` or `Content-Type`.
    pub fn file_name(&self) -> Option<String> {
        self.field("Content-Disposition")
            .and_then(|value| param_of(value, "filename"))
            .or_else(|| self.content_type().param("name").map(str::to_string))
    }

    pub fn is_attachment(&self) -> bool {
        if self.is_multipart() {
            return false;
        }
        let disposition = self
            .field("Content-Disposition")
            .map(|value| value.split(';').next().unwrap_or("").trim().to_ascii_lowercase());
        match disposition.as_deref() {
            Some("attachment") => true,
            Some("inline") => false,
            _ => self.file_name().is_some(),
        }
    }

    /// Leaf parts that are attachments, depth first. A leaf attachment
    /// yields itself.
    pub fn attachments(self: &Rc<Self>) -> Vec<Rc<Part>> {
        if !self.is_multipart() {
            return if self.is_attachment() {
                vec![Rc::clone(self)]
            } else {
                Vec::new()
            };
        }
        self.children.iter().flat_map(Part::attachments).collect()
    }

    /// The readable text of this entity: itself when it is a leaf, otherwise the
    /// first `text/plain` leaf, falling back to the first `text/*` leaf.
    pub fn body_text(&self) -> String {
        if !self.is_multipart() {
            return self.body.clone();
        }
        let readable = |sub_type: &'static str| {
            move |part: &Part| part.content_type().is("text", sub_type) && !part.is_attachment()
        };
        self.find_leaf(&readable("plain"))
            .or_else(|| self.find_leaf(&readable("*")))
            .map(|part| part.body.clone())
            .unwrap_or_default()
    }

    fn find_leaf(&self, predicate: &dyn Fn(&Part) -> bool) -> Option<Rc<Part>> {
        for child in &self.children {
            if child.is_multipart() {
                if let Some(found) = child.find_leaf(predicate) {
                    return Some(found);
                }
            } else if predicate(child) {
                return Some(Rc::clone(child));
            }
        }
        None
    }

    /// Size of the entity as text.
    pub fn size(&self) -> usize {
        self.header.len() + 1 + self.body.len()
    }
}

// ============================================================================
// HEADER PARSING
// ============================================================================

fn parse_fields(header: &str) -> Vec<(String, String)> {
    let mut fields: Vec<(String, String)> = Vec::new();
    for line in header.lines() {
        if line.starts_with(&[' ', '\t'][..]) {
            if let Some((_, value)) = fields.last_mut() {
                value.push(' ');
                value.push_str(line.trim());
            }
            continue;
        }
        if let Some((name, value)) = line.split_once(':') {
            fields.push((name.trim().to_string(), value.trim().to_string()));
        }
    }
    fields
}

fn parse_content_type(value: &str) -> ContentType {
    let mut segments = split_params(value).into_iter();
    let mime = segments.next().unwrap_or_default();
    let (media_type, sub_type) = mime
        .split_once('/')
        .map(|(t, s)| (t.trim().to_ascii_lowercase(), s.trim().to_ascii_lowercase()))
        .unwrap_or_else(|| ("text".to_string(), "plain".to_string()));
    let params = segments
        .filter_map(|segment| {
            let (key, value) = segment.split_once('=')?;
            Some((key.trim().to_string(), unquote(value.trim())))
        })
        .collect();
    ContentType {
        media_type,
        sub_type,
        params,
    }
}

fn param_of(value: &str, name: &str) -> Option<String> {
    split_params(value).into_iter().skip(1).find_map(|segment| {
        let (key, value) = segment.split_once('=')?;
        key.trim()
            .eq_ignore_ascii_case(name)
            .then(|| unquote(value.trim()))
    })
}

/// Splits on `;` outside double quotes.
fn split_params(value: &str) -> Vec<String> {
    let mut segments = Vec::new();
    let mut current = String::new();
    let mut quoted = false;
    for c in value.chars() {
        match c {
            '"' => {
                quoted = !quoted;
                current.push(c);
            }
            ';' if !quoted => segments.push(std::mem::take(&mut current)),
            _ => current.push(c),
        }
    }
    segments.push(current);
    segments
}

fn unquote(value: &str) -> String {
    value
        .strip_prefix('"')
        .and_then(|v| v.strip_suffix('"'))
        .unwrap_or(value)
        .to_string()
}

fn split_multipart<'a>(body: &'a str, boundary: &str) -> Vec<&'a str> {
    let delimiter = format!("--{boundary}");
    let mut segments = Vec::new();
    let mut start: Option<usize> = None;
    let mut offset: usize = 0;
    for line in body.split_inclusive('\n') {
        let trimmed = line.trim_end();
        if trimmed == delimiter || trimmed == format!("{delimiter}--") {
            if let Some(begin) = start {
                // The newline before the delimiter belongs to the delimiter.
                let end = offset.saturating_sub(1).max(begin);
                segments.push(&body[begin..end]);
            }
            if trimmed.ends_with("--") && trimmed != delimiter {
                return segments;
            }
            start = Some(offset + line.len());
        }
        offset += line.len();
    }
    if let Some(begin) = start {
        if begin < body.len() {
            segments.push(&body[begin..]);
        }
    }
    segments
}

#[cfg(test)]
mod tests {
    use super::*;

    const MULTIPART: &str = "From: a@example.com\r\n\
Subject: Report\r\n\
\x20continued\r\n\
Content-Type: multipart/mixed; boundary=\"XYZ\"\r\n\
\r\n\
preamble\r\n\
--XYZ\r\n\
Content-Type: text/plain\r\n\
\r\n\
Hello there\r\n\
--XYZ\r\n\
Content-Type: application/pdf; name=\"report.pdf\"\r\n\
Content-Disposition: attachment; filename=\"report.pdf\"\r\n\
\r\n\
JVBERi0=\r\n\
--XYZ--\r\n";

    #[test]
    fn unfolds_header_fields() {
        let part = Part::parse(MULTIPART);
        assert_eq!(part.field("subject"), Some("Report continued"));
        assert_eq!(part.field("X-Missing"), None);
    }

    #[test]
    fn splits_multipart_children() {
        let part = Rc::new(Part::parse(MULTIPART));
        assert_eq!(part.part_count(), 2);
        assert_eq!(part.body_text(), "Hello there");
        let attachments = part.attachments();
        assert_eq!(attachments.len(), 1);
        assert_eq!(attachments[0].file_name().as_deref(), Some("report.pdf"));
    }

    #[test]
    fn leaf_attachment_lists_itself() {
        let part = Rc::new(Part::parse(MULTIPART));
        let pdf = part.part(1).unwrap();
        let attachments = pdf.attachments();
        assert_eq!(attachments.len(), 1);
        assert!(Rc::ptr_eq(&attachments[0], &pdf));

        let text = part.part(0).unwrap();
        assert!(text.attachments().is_empty());
    }

    #[test]
    fn message_without_body() {
        let part = Part::parse("Subject: x");
        assert_eq!(part.field("Subject"), Some("x"));
        assert_eq!(part.body(), "");
        assert!(!part.is_multipart());
    }
}

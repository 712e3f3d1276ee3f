//! RFC 2822 address-list parsing, tolerant of the malformed headers found in
//! real mail.
//!
//! Handles display names (quoted or bare), angle-addr, trailing comments used
//! as names (`a@b (Alice)`), and groups (`Team: a@b, c@d;`).

/// One mailbox of an address list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Mailbox {
    pub name: Option<String>,
    pub address: String,
}

impl Mailbox {
    /// Display name, falling back to the address.
    pub fn display_name(&self) -> &str {
        self.name.as_deref().unwrap_or(&self.address)
    }
}

/// Parses a header value into its mailboxes. Empty entries are dropped.
pub fn parse_address_list(text: &str) -> Vec<Mailbox> {
    split_top_level(text)
        .iter()
        .filter_map(|segment| parse_mailbox(segment))
        .collect()
}

/// Splits at `,` and group delimiters (`:` / `;`) that are outside quotes,
/// angle brackets and comments. Text before a group `:` is the group name and
/// is discarded.
fn split_top_level(text: &str) -> Vec<String> {
    let mut segments = Vec::new();
    let mut current = String::new();
    let mut quoted = false;
    let mut escaped = false;
    let mut angle = false;
    let mut comment_depth = 0usize;

    for c in text.chars() {
        if escaped {
            current.push(c);
            escaped = false;
            continue;
        }
        match c {
            '\\' if quoted || comment_depth > 0 => {
                current.push(c);
                escaped = true;
            }
            '"' if comment_depth == 0 => {
                quoted = !quoted;
                current.push(c);
            }
            '(' if !quoted => {
                comment_depth += 1;
                current.push(c);
            }
            ')' if !quoted && comment_depth > 0 => {
                comment_depth -= 1;
                current.push(c);
            }
            '<' if !quoted && comment_depth == 0 => {
                angle = true;
                current.push(c);
            }
            '>' if !quoted && comment_depth == 0 => {
                angle = false;
                current.push(c);
            }
            ',' | ';' if !quoted && !angle && comment_depth == 0 => {
                segments.push(std::mem::take(&mut current));
            }
            ':' if !quoted && !angle && comment_depth == 0 => {
                current.clear();
            }
            _ => current.push(c),
        }
    }
    segments.push(current);
    segments
}

fn parse_mailbox(segment: &str) -> Option<Mailbox> {
    let segment = segment.trim();
    if segment.is_empty() {
        return None;
    }

    if let (Some(open), Some(close)) = (segment.find('<'), segment.rfind('>')) {
        if open < close {
            let address = segment[open + 1..close].trim().to_string();
            let phrase = strip_comments(&segment[..open]);
            let name = unquote_phrase(phrase.trim())
                .or_else(|| first_comment(segment))
                .filter(|name| !name.is_empty());
            if address.is_empty() && name.is_none() {
                return None;
            }
            return Some(Mailbox { name, address });
        }
    }

    let address = strip_comments(segment).trim().to_string();
    if address.is_empty() {
        return None;
    }
    Some(Mailbox {
        name: first_comment(segment).filter(|name| !name.is_empty()),
        address,
    })
}

fn unquote_phrase(phrase: &str) -> Option<String> {
    if phrase.is_empty() {
        return None;
    }
    let Some(inner) = phrase.strip_prefix('"').and_then(|p| p.strip_suffix('"')) else {
        return Some(phrase.to_string());
    };
    let mut name = String::with_capacity(inner.len());
    let mut chars = inner.chars();
    while let Some(c) = chars.next() {
        if c == '\\' {
            if let Some(next) = chars.next() {
                name.push(next);
            }
        } else {
            name.push(c);
        }
    }
    Some(name.trim().to_string())
}

fn strip_comments(text: &str) -> String {
    let mut result = String::with_capacity(text.len());
    let mut depth = 0usize;
    let mut quoted = false;
    for c in text.chars() {
        match c {
            '"' if depth == 0 => {
                quoted = !quoted;
                result.push(c);
            }
            '(' if !quoted => depth += 1,
            ')' if !quoted && depth > 0 => depth -= 1,
            _ if depth == 0 => result.push(c),
            _ => {}
        }
    }
    result
}

fn first_comment(text: &str) -> Option<String> {
    let open = text.find('(')?;
    let mut depth = 0usize;
    for (index, c) in text[open..].char_indices() {
        match c {
            '(' => depth += 1,
            ')' => {
                depth -= 1;
                if depth == 0 {
                    return Some(text[open + 1..open + index].trim().to_string());
                }
            }
            _ => {}
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_names_and_angle_addresses() {
        let list = parse_address_list(r#""Doe, John" <john@example.com>, jane@example.com"#);
        assert_eq!(list.len(), 2);
        assert_eq!(list[0].name.as_deref(), Some("Doe, John"));
        assert_eq!(list[0].address, "john@example.com");
        assert_eq!(list[1].name, None);
        assert_eq!(list[1].display_name(), "jane@example.com");
    }

    #[test]
    fn comments_serve_as_names() {
        let list = parse_address_list("bob@example.com (Bob Smith)");
        assert_eq!(list[0].address, "bob@example.com");
        assert_eq!(list[0].name.as_deref(), Some("Bob Smith"));
    }

    #[test]
    fn groups_are_flattened() {
        let list = parse_address_list("Team: a@example.com, B <b@example.com>;, c@example.com");
        let addresses: Vec<_> = list.iter().map(|m| m.address.as_str()).collect();
        assert_eq!(addresses, ["a@example.com", "b@example.com", "c@example.com"]);
    }

    #[test]
    fn empty_input_yields_nothing() {
        assert!(parse_address_list("").is_empty());
        assert!(parse_address_list(" , ;").is_empty());
    }
}

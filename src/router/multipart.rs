//! Minimal `multipart/form-data` reader and writer
//!
//! Covers what share targets send: named parts, an optional filename and
//! content type per part, and binary bodies.

/// One part of a multipart body
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Part {
    pub name: String,
    pub filename: Option<String>,
    pub content_type: Option<String>,
    pub data: Vec<u8>,
}

/// Extract the boundary parameter from a `Content-Type` header
pub fn boundary(content_type: &str) -> Option<String> {
    let mut params = content_type.split(';');
    let mime = params.next()?.trim();
    if !mime.eq_ignore_ascii_case("multipart/form-data") {
        return None;
    }

    params.find_map(|p| {
        let (k, v) = p.trim().split_once('=')?;
        k.trim()
            .eq_ignore_ascii_case("boundary")
            .then(|| v.trim().trim_matches('"').to_string())
    })
}

/// Split a body into its parts. Returns `None` if the body is malformed.
///
/// Parts end only at a full `CRLF--boundary` delimiter line, so payloads
/// that contain the boundary text elsewhere come through intact.
pub fn parse(body: &[u8], boundary: &str) -> Option<Vec<Part>> {
    let dash_boundary = format!("--{}", boundary).into_bytes();
    let delimiter = [b"\r\n".as_slice(), &dash_boundary].concat();

    // The opening boundary may start the body without a CRLF before it
    let mut pos = if is_delimiter_at(body, &dash_boundary, 0) {
        dash_boundary.len()
    } else {
        find_delimiter(body, &delimiter, 0)? + delimiter.len()
    };

    let mut parts = Vec::new();
    loop {
        // Closing delimiter ends with "--"
        if body.get(pos..pos + 2) == Some(b"--") {
            return Some(parts);
        }
        pos = skip_line_end(body, pos)?;

        let headers_end = find(body, b"\r\n\r\n", pos)?;
        let headers = std::str::from_utf8(&body[pos..headers_end]).ok()?;
        let data_start = headers_end + 4;

        let next = find_delimiter(body, &delimiter, data_start)?;
        parts.push(part_from(headers, body[data_start..next].to_vec())?);
        pos = next + delimiter.len();
    }
}

/// Encode a single file part as a multipart body
pub fn encode_file(
    boundary: &str,
    field: &str,
    filename: &str,
    content_type: &str,
    data: &[u8],
) -> Vec<u8> {
    let mut body = Vec::with_capacity(data.len() + 256);
    body.extend_from_slice(format!("--{}\r\n", boundary).as_bytes());
    body.extend_from_slice(
        format!(
            "Content-Disposition: form-data; name=\"{}\"; filename=\"{}\"\r\n",
            field,
            filename.replace('"', "")
        )
        .as_bytes(),
    );
    body.extend_from_slice(format!("Content-Type: {}\r\n\r\n", content_type).as_bytes());
    body.extend_from_slice(data);
    body.extend_from_slice(format!("\r\n--{}--\r\n", boundary).as_bytes());
    body
}

fn part_from(headers: &str, data: Vec<u8>) -> Option<Part> {
    let mut name = None;
    let mut filename = None;
    let mut content_type = None;

    for line in headers.split("\r\n") {
        let Some((key, value)) = line.split_once(':') else {
            continue;
        };
        let key = key.trim();
        let value = value.trim();

        if key.eq_ignore_ascii_case("content-disposition") {
            for param in value.split(';').skip(1) {
                if let Some((k, v)) = param.trim().split_once('=') {
                    let v = v.trim().trim_matches('"').to_string();
                    match k.trim() {
                        "name" => name = Some(v),
                        "filename" => filename = Some(v),
                        _ => {}
                    }
                }
            }
        } else if key.eq_ignore_ascii_case("content-type") {
            content_type = Some(value.to_string());
        }
    }

    Some(Part {
        name: name?,
        filename,
        content_type,
        data,
    })
}

/// Skip optional transport padding and the CRLF ending a delimiter line
fn skip_line_end(body: &[u8], mut pos: usize) -> Option<usize> {
    while matches!(body.get(pos), Some(b' ' | b'\t')) {
        pos += 1;
    }
    (body.get(pos..pos + 2) == Some(b"\r\n")).then_some(pos + 2)
}

/// `delimiter` sits at `pos` and is followed by a line end or the close marker
fn is_delimiter_at(body: &[u8], delimiter: &[u8], pos: usize) -> bool {
    if !body[pos..].starts_with(delimiter) {
        return false;
    }
    let rest = &body[pos + delimiter.len()..];
    rest.starts_with(b"--")
        || rest.starts_with(b"\r\n")
        || matches!(rest.first(), Some(b' ' | b'\t'))
}

fn find_delimiter(body: &[u8], delimiter: &[u8], mut from: usize) -> Option<usize> {
    loop {
        let at = find(body, delimiter, from)?;
        if is_delimiter_at(body, delimiter, at) {
            return Some(at);
        }
        from = at + 1;
    }
}

fn find(haystack: &[u8], needle: &[u8], from: usize) -> Option<usize> {
    if from > haystack.len() {
        return None;
    }
    haystack[from..]
        .windows(needle.len())
        .position(|w| w == needle)
        .map(|i| i + from)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_boundary_from_content_type() {
        assert_eq!(
            boundary("multipart/form-data; boundary=----abc").as_deref(),
            Some("----abc")
        );
        assert_eq!(
            boundary("multipart/form-data; charset=utf-8; boundary=\"q\"").as_deref(),
            Some("q")
        );
        assert!(boundary("application/json").is_none());
        assert!(boundary("multipart/form-data").is_none());
    }

    #[test]
    fn test_parse_file_and_field() {
        let body = b"--b\r\n\
Content-Disposition: form-data; name=\"title\"\r\n\r\n\
Holiday\r\n\
--b\r\n\
Content-Disposition: form-data; name=\"file\"; filename=\"cat.png\"\r\n\
Content-Type: image/png\r\n\r\n\
\x89PNG\r\n\x1a\n\r\n\
--b--\r\n";

        let parts = parse(body, "b").unwrap();
        assert_eq!(parts.len(), 2);
        assert_eq!(parts[0].name, "title");
        assert_eq!(parts[0].data, b"Holiday");
        assert!(parts[0].filename.is_none());

        assert_eq!(parts[1].name, "file");
        assert_eq!(parts[1].filename.as_deref(), Some("cat.png"));
        assert_eq!(parts[1].content_type.as_deref(), Some("image/png"));
        // Embedded CRLF in binary data survives
        assert_eq!(parts[1].data, b"\x89PNG\r\n\x1a\n");
    }

    #[test]
    fn test_boundary_text_inside_data_is_not_a_delimiter() {
        let data = b"line one --b still data\r\n--bogus is not it either\r\n--b-";
        let body = encode_file("b", "file", "tricky.txt", "text/plain", data);

        let parts = parse(&body, "b").unwrap();
        assert_eq!(parts.len(), 1);
        assert_eq!(parts[0].data, data.to_vec());
    }

    #[test]
    fn test_preamble_and_padding_are_skipped() {
        let body = b"ignored preamble\r\n--b  \r\n\
Content-Disposition: form-data; name=\"file\"\r\n\r\n\
ok\r\n\
--b--";

        let parts = parse(body, "b").unwrap();
        assert_eq!(parts.len(), 1);
        assert_eq!(parts[0].data, b"ok");
    }

    #[test]
    fn test_encode_then_parse() {
        let body = encode_file("zz", "file", "notes.txt", "text/plain", b"hello");
        let parts = parse(&body, "zz").unwrap();
        assert_eq!(parts.len(), 1);
        assert_eq!(parts[0].filename.as_deref(), Some("notes.txt"));
        assert_eq!(parts[0].data, b"hello");
    }

    #[test]
    fn test_truncated_body_is_rejected() {
        let body = b"--b\r\nContent-Disposition: form-data; name=\"file\"\r\n\r\nhalf";
        assert!(parse(body, "b").is_none());
        assert!(parse(b"", "b").is_none());
    }
}

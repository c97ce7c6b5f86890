use crate::constants::multipart::{BOUNDARY_PREFIX, DEFAULT_FILE_TYPE};
use bytes::Bytes;

/// One section of a `multipart/form-data` body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MultipartPart {
    Field {
        name: String,
        value: String,
    },
    File {
        name: String,
        content: Bytes,
        content_type: String,
        filename: Option<String>,
    },
}

impl MultipartPart {
    pub fn field(name: impl Into<String>, value: impl Into<String>) -> Self {
        MultipartPart::Field {
            name: name.into(),
            value: value.into(),
        }
    }

    pub fn file(
        name: impl Into<String>,
        content: impl Into<Bytes>,
        content_type: impl Into<String>,
    ) -> Self {
        let content_type = content_type.into();
        MultipartPart::File {
            name: name.into(),
            content: content.into(),
            content_type: if content_type.trim().is_empty() {
                DEFAULT_FILE_TYPE.to_string()
            } else {
                content_type
            },
            filename: None,
        }
    }

    pub fn with_filename(self, filename: impl Into<String>) -> Self {
        match self {
            MultipartPart::File {
                name,
                content,
                content_type,
                ..
            } => MultipartPart::File {
                name,
                content,
                content_type,
                filename: Some(filename.into()),
            },
            field => field,
        }
    }

    pub fn name(&self) -> &str {
        match self {
            MultipartPart::Field { name, .. } | MultipartPart::File { name, .. } => name,
        }
    }

    /// The filename sent on the wire; synthesized from the field name when absent.
    pub fn filename(&self) -> Option<String> {
        match self {
            MultipartPart::Field { .. } => None,
            MultipartPart::File {
                name,
                content_type,
                filename,
                ..
            } => Some(
                filename
                    .clone()
                    .unwrap_or_else(|| format!("{}.{}", name, extension_for(content_type))),
            ),
        }
    }

    fn write_to(&self, boundary: &str, out: &mut Vec<u8>) {
        out.extend_from_slice(format!("--{}\r\n", boundary).as_bytes());
        match self {
            MultipartPart::Field { name, value } => {
                out.extend_from_slice(
                    format!(
                        "Content-Disposition: form-data; name=\"{}\"\r\n\r\n",
                        escape_quoted(name)
                    )
                    .as_bytes(),
                );
                out.extend_from_slice(value.as_bytes());
            }
            MultipartPart::File {
                name,
                content,
                content_type,
                ..
            } => {
                let filename = self.filename().unwrap_or_default();
                out.extend_from_slice(
                    format!(
                        "Content-Disposition: form-data; name=\"{}\"; filename=\"{}\"\r\n",
                        escape_quoted(name),
                        escape_quoted(&filename)
                    )
                    .as_bytes(),
                );
                out.extend_from_slice(format!("Content-Type: {}\r\n\r\n", content_type).as_bytes());
                out.extend_from_slice(content);
            }
        }
        out.extend_from_slice(b"\r\n");
    }
}

fn extension_for(content_type: &str) -> &'static str {
    let essence = content_type
        .split(';')
        .next()
        .unwrap_or("")
        .trim()
        .to_lowercase();
    match essence.as_str() {
        "text/plain" => "txt",
        "text/csv" => "csv",
        "text/html" => "html",
        "application/json" => "json",
        "application/xml" | "text/xml" => "xml",
        "application/pdf" => "pdf",
        "image/png" => "png",
        "image/jpeg" => "jpg",
        "image/gif" => "gif",
        _ => "bin",
    }
}

fn escape_quoted(value: &str) -> String {
    value
        .replace('"', "%22")
        .replace('\r', "%0D")
        .replace('\n', "%0A")
}

pub fn generate_boundary() -> String {
    format!("{}{}", BOUNDARY_PREFIX, uuid::Uuid::new_v4().simple())
}

pub fn encode(parts: &[MultipartPart], boundary: &str) -> Vec<u8> {
    let mut out = Vec::new();
    for part in parts {
        part.write_to(boundary, &mut out);
    }
    out.extend_from_slice(format!("--{}--\r\n", boundary).as_bytes());
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn explicit_filename_is_written_verbatim() {
        let part = MultipartPart::file("file", "lorem ipsum", "text/plain").with_filename("lorem.txt");
        let body = String::from_utf8(encode(&[part], "XyZ")).expect("utf8 body");
        assert!(body.contains("filename=\"lorem.txt\""));
        assert!(body.contains("Content-Disposition: form-data; name=\"file\"; filename=\"lorem.txt\"\r\n"));
        assert!(body.contains("Content-Type: text/plain\r\n\r\nlorem ipsum\r\n"));
        assert!(body.ends_with("--XyZ--\r\n"));
    }

    #[test]
    fn missing_filename_is_synthesized_deterministically() {
        let part = MultipartPart::file("report", vec![1u8, 2, 3], "application/pdf");
        assert_eq!(part.filename().as_deref(), Some("report.pdf"));
        let unknown = MultipartPart::file("blob", vec![0u8], "");
        assert_eq!(unknown.filename().as_deref(), Some("blob.bin"));
    }

    #[test]
    fn plain_fields_have_no_filename() {
        let body = String::from_utf8(encode(&[MultipartPart::field("note", "hi")], "b"))
            .expect("utf8 body");
        assert_eq!(
            body,
            "--b\r\nContent-Disposition: form-data; name=\"note\"\r\n\r\nhi\r\n--b--\r\n"
        );
    }
}

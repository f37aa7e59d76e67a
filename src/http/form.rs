use crate::http::request::find_bytes;
use log::{ info, warn };
use std::collections::{ BTreeMap, HashMap };
use std::fs;
use std::io;
use std::path::{ Path, PathBuf };

#[derive(Debug, Default)]
pub struct MultipartForm {
    pub fields: BTreeMap<String, String>,
    /// Field name -> stored file path.
    pub files: BTreeMap<String, String>,
}

/// `%XX` -> byte and `+` -> space. A `%2B` stays a literal `+`.
pub fn percent_decode(input: &str) -> String {
    let spaced = input.replace('+', " ");
    let decoded = urlencoding::decode_binary(spaced.as_bytes());
    String::from_utf8_lossy(&decoded).into_owned()
}

pub fn parse_urlencoded(body: &[u8]) -> BTreeMap<String, String> {
    let text = String::from_utf8_lossy(body);
    let mut fields = BTreeMap::new();

    for pair in text.split('&').filter(|p| !p.is_empty()) {
        let (key, value) = pair.split_once('=').unwrap_or((pair, ""));
        fields.insert(percent_decode(key), percent_decode(value));
    }
    fields
}

/// Extracts the `boundary=` parameter, unquoted.
pub fn boundary(content_type: &str) -> Option<&str> {
    let (_, rest) = content_type.split_once("boundary=")?;
    let value = rest.split(';').next()?.trim().trim_matches('"');
    if value.is_empty() { None } else { Some(value) }
}

/// Splits a multipart body on its boundary. Parts carrying a non-empty
/// `filename` are written under `upload_dir`; the rest become fields.
pub fn parse_multipart(content_type: &str, body: &[u8], upload_dir: &Path) -> MultipartForm {
    let mut form = MultipartForm::default();
    let Some(boundary) = boundary(content_type) else {
        warn!("[Upload] multipart body without boundary");
        return form;
    };
    let delimiter = format!("--{}", boundary).into_bytes();

    let mut current = match find_bytes(body, &delimiter, 0) {
        Some(pos) => pos,
        None => {
            return form;
        }
    };

    loop {
        let part_start = current + delimiter.len();
        let part_end = match find_bytes(body, &delimiter, part_start) {
            Some(pos) => pos,
            None => {
                break;
            }
        };
        add_part(&mut form, &body[part_start..part_end], upload_dir);
        current = part_end;
    }

    form
}

fn add_part(form: &mut MultipartForm, part: &[u8], upload_dir: &Path) {
    let data = part.strip_prefix(b"\r\n").unwrap_or(part);

    let (header_bytes, content) = match find_bytes(data, b"\r\n\r\n", 0) {
        Some(pos) => (&data[..pos], &data[pos + 4..]),
        None => {
            return;
        }
    };
    let content = content.strip_suffix(b"\r\n").unwrap_or(content);

    let mut headers = HashMap::new();
    for line in String::from_utf8_lossy(header_bytes).split("\r\n") {
        if line.is_empty() {
            break;
        }
        if let Some((key, value)) = line.split_once(':') {
            headers.insert(key.trim().to_ascii_lowercase(), value.trim().to_string());
        }
    }

    let Some(disposition) = headers.get("content-disposition") else {
        return;
    };
    let params = disposition_params(disposition);
    let Some(name) = params.get("name") else {
        return;
    };

    match params.get("filename").filter(|f| !f.is_empty()) {
        Some(filename) => {
            match save_upload(upload_dir, filename, content) {
                Ok(stored) => {
                    info!("[Upload] field={} file={} bytes={}", name, stored.display(), content.len());
                    form.files.insert(name.clone(), stored.to_string_lossy().into_owned());
                }
                Err(e) => {
                    warn!("[Upload] failed to store {}: {}", filename, e);
                }
            }
        }
        None => {
            form.fields.insert(name.clone(), String::from_utf8_lossy(content).into_owned());
        }
    }
}

/// `form-data; name="f"; filename="t.txt"` -> {name: f, filename: t.txt}
fn disposition_params(value: &str) -> HashMap<String, String> {
    split_unquoted(value, ';')
        .into_iter()
        .filter_map(|segment| segment.trim().split_once('='))
        .map(|(k, v)| (k.trim().to_ascii_lowercase(), v.trim().trim_matches('"').to_string()))
        .collect()
}

/// Splits on `sep` wherever it is not inside double quotes.
fn split_unquoted(value: &str, sep: char) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut start = 0;
    let mut quoted = false;
    for (i, c) in value.char_indices() {
        if c == '"' {
            quoted = !quoted;
        } else if c == sep && !quoted {
            parts.push(&value[start..i]);
            start = i + c.len_utf8();
        }
    }
    parts.push(&value[start..]);
    parts
}

/// Writes `data` under `dir` as `<unix-seconds>_<basename>`, appending a
/// counter if that name is taken. Creates `dir` when missing.
pub fn save_upload(dir: &Path, original_name: &str, data: &[u8]) -> io::Result<PathBuf> {
    let base = original_name.rsplit(['/', '\\']).next().unwrap_or("");
    if base.is_empty() || base == "." || base == ".." {
        return Err(io::Error::new(io::ErrorKind::InvalidInput, "invalid upload file name"));
    }

    fs::create_dir_all(dir)?;

    let stamp = chrono::Utc::now().timestamp();
    let mut stored = dir.join(format!("{}_{}", stamp, base));
    let mut n = 1;
    while stored.exists() {
        stored = dir.join(format!("{}_{}_{}", stamp, n, base));
        n += 1;
    }

    fs::write(&stored, data)?;
    Ok(stored)
}

use std::path::Path;

use comfy_table::{presets::UTF8_HORIZONTAL_ONLY, Attribute, Cell, ContentArrangement, Table};
use kernel::{ErrorReply, UploadReply, AVATAR_FIELD};
use reqwest::multipart::{Form, Part};
use reqwest::Client;
use tokio::fs::File;
use tokio_util::io::ReaderStream;
use url::Url;

const UPLOAD_PATH: &str = "upload";

pub struct UploadParams {
    pub uri: String,
    pub file: String,
    /// Overrides the MIME type guessed from the file extension
    pub mime: Option<String>,
    pub fields: Vec<(String, String)>,
}

/// Posts a single image with extra text fields and prints the server reply.
pub async fn upload_file(params: UploadParams) {
    let Some(uri) = upload_url(&params.uri) else {
        println!("invalid server URI: {}", params.uri);
        return;
    };

    let path = Path::new(&params.file);
    let file_name = path
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or_default()
        .to_owned();
    let mime = params
        .mime
        .clone()
        .or_else(|| guess_mime(path).map(ToOwned::to_owned))
        .unwrap_or_else(|| String::from("application/octet-stream"));

    let f = match File::open(path).await {
        Ok(f) => f,
        Err(e) => {
            println!("no such file {}: {e}", params.file);
            return;
        }
    };
    let len = match f.metadata().await {
        Ok(meta) => meta.len(),
        Err(e) => {
            println!("cannot read {}: {e}", params.file);
            return;
        }
    };
    let stream = reqwest::Body::wrap_stream(ReaderStream::new(f));
    let part = match Part::stream_with_length(stream, len)
        .file_name(file_name)
        .mime_str(&mime)
    {
        Ok(p) => p,
        Err(e) => {
            println!("invalid MIME type {mime}: {e}");
            return;
        }
    };

    let mut form = Form::new();
    for (name, value) in params.fields {
        form = form.text(name, value);
    }
    form = form.part(AVATAR_FIELD, part);

    let client = Client::new();
    match client.post(uri).multipart(form).send().await {
        Ok(response) => {
            let status = response.status();
            if status.is_success() {
                match response.json::<UploadReply>().await {
                    Ok(reply) => println!("{}", reply_table(&reply)),
                    Err(e) => println!("JSON decode error: {e}"),
                }
            } else {
                match response.json::<ErrorReply>().await {
                    Ok(reply) => println!("upload rejected ({status}): {}", reply.message()),
                    Err(_) => println!("upload failed. Status: {status}"),
                }
            }
        }
        Err(e) => {
            println!("upload error: {e}");
        }
    }
}

/// `<base>/upload`, whether or not the base ends with a slash.
#[must_use]
pub fn upload_url(base: &str) -> Option<Url> {
    let mut url = Url::parse(base).ok()?;
    if !url.path().ends_with('/') {
        let path = format!("{}/", url.path());
        url.set_path(&path);
    }
    url.join(UPLOAD_PATH).ok()
}

#[must_use]
pub fn guess_mime(path: &Path) -> Option<&'static str> {
    let ext = path.extension()?.to_str()?.to_ascii_lowercase();
    match ext.as_str() {
        "jpg" | "jpeg" => Some("image/jpeg"),
        "png" => Some("image/png"),
        _ => None,
    }
}

/// Parses `name=value`. The value may itself contain `=`.
#[must_use]
pub fn parse_field(s: &str) -> Option<(String, String)> {
    let (name, value) = s.split_once('=')?;
    if name.is_empty() {
        return None;
    }
    Some((name.to_owned(), value.to_owned()))
}

fn reply_table(reply: &UploadReply) -> Table {
    let mut table = Table::new();
    table
        .load_preset(UTF8_HORIZONTAL_ONLY)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_width(120)
        .set_header(vec![
            Cell::new("Field").add_attribute(Attribute::Bold),
            Cell::new("Value").add_attribute(Attribute::Bold),
        ]);

    if let Some(file) = &reply.file {
        table.add_row(vec![Cell::new("original name"), Cell::new(&file.original_name)]);
        table.add_row(vec![Cell::new("stored as"), Cell::new(&file.file_name)]);
        table.add_row(vec![Cell::new("path"), Cell::new(&file.path)]);
        table.add_row(vec![Cell::new("type"), Cell::new(&file.mime_type)]);
        table.add_row(vec![Cell::new("size"), Cell::new(file.size)]);
    }
    for (name, value) in &reply.body {
        table.add_row(vec![Cell::new(name), Cell::new(value)]);
    }
    table
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("http://localhost:3000", "http://localhost:3000/upload")]
    #[case("http://localhost:3000/", "http://localhost:3000/upload")]
    #[case("http://localhost/images", "http://localhost/images/upload")]
    #[case("http://localhost/images/", "http://localhost/images/upload")]
    #[trace]
    fn upload_url_tests(#[case] base: &str, #[case] expected: &str) {
        // Act
        let url = upload_url(base).unwrap();

        // Assert
        assert_eq!(url.as_str(), expected);
    }

    #[test]
    fn upload_url_invalid() {
        // Act
        let url = upload_url("http/localhost");

        // Assert
        assert!(url.is_none());
    }

    #[rstest]
    #[case("a.jpg", Some("image/jpeg"))]
    #[case("a.JPEG", Some("image/jpeg"))]
    #[case("dir/a.png", Some("image/png"))]
    #[case("a.gif", None)]
    #[case("a", None)]
    #[trace]
    fn guess_mime_tests(#[case] path: &str, #[case] expected: Option<&str>) {
        // Act
        let mime = guess_mime(Path::new(path));

        // Assert
        assert_eq!(mime, expected);
    }

    #[rstest]
    #[case("caption=hello", Some(("caption", "hello")))]
    #[case("q=a=b", Some(("q", "a=b")))]
    #[case("empty=", Some(("empty", "")))]
    #[case("=x", None)]
    #[case("novalue", None)]
    #[trace]
    fn parse_field_tests(#[case] s: &str, #[case] expected: Option<(&str, &str)>) {
        // Act
        let field = parse_field(s);

        // Assert
        let expected = expected.map(|(n, v)| (n.to_owned(), v.to_owned()));
        assert_eq!(field, expected);
    }

    #[test]
    fn reply_table_lists_file_and_fields() {
        // Arrange
        let mut reply = UploadReply::default();
        reply.body.insert("caption".to_owned(), "hello".to_owned());

        // Act
        let table = reply_table(&reply).to_string();

        // Assert
        assert!(table.contains("caption"));
        assert!(table.contains("hello"));
    }
}

// Text acquisition: local files (async buffered or memory-mapped) and
// HTTP(S) URLs. Acquisition failures degrade to an empty text blob with the
// error recorded, so the scanning core only ever sees valid input; fail-fast
// escalates instead.

use anyhow::{Context, Result};
use memmap2::Mmap;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};
use tokio::fs;
use tracing::{debug, info, warn};

/// Where a run's text comes from, classified from the raw CLI argument.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TextSource {
    File(PathBuf),
    Directory(PathBuf),
    Url(String),
}

impl TextSource {
    /// Classify a raw source string: an `http://`/`https://` prefix names a
    /// URL, an existing directory names a batch root, anything else is
    /// treated as a file path.
    pub fn parse(raw: &str) -> Self {
        if raw.starts_with("http://") || raw.starts_with("https://") {
            return Self::Url(raw.to_string());
        }
        let path = PathBuf::from(raw);
        if path.is_dir() {
            Self::Directory(path)
        } else {
            Self::File(path)
        }
    }
}

/// Configuration for text acquisition behavior.
#[derive(Debug, Clone)]
pub struct SourceConfig {
    /// Whether to fail fast on first error or degrade to empty text
    pub fail_fast: bool,
    /// Use memory-mapped I/O for file sources instead of async buffered reads
    pub use_mmap: bool,
    /// Connect timeout for URL sources, in seconds
    pub connect_timeout_secs: u64,
    /// Request timeout for URL sources, in seconds
    pub request_timeout_secs: u64,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            fail_fast: false,
            use_mmap: false,
            connect_timeout_secs: 10,
            request_timeout_secs: 30,
        }
    }
}

/// Outcome of acquiring one source's text.
#[derive(Debug, Clone)]
pub struct AcquiredText {
    pub origin: String,
    pub text: String,
    pub bytes_read: u64,
    pub duration_ms: u64,
    pub error: Option<String>,
}

impl AcquiredText {
    fn failed(origin: String, error: String, started: Instant) -> Self {
        Self {
            origin,
            text: String::new(),
            bytes_read: 0,
            duration_ms: started.elapsed().as_millis() as u64,
            error: Some(error),
        }
    }
}

/// Read a file source to a string.
pub async fn acquire_file(path: &Path, config: &SourceConfig) -> Result<AcquiredText> {
    let origin = path.display().to_string();
    let started = Instant::now();
    debug!("Acquiring file source: {}", origin);

    let read = if config.use_mmap {
        read_file_mmap(path)
    } else {
        fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read file {}", path.display()))
    };

    match read {
        Ok(text) => {
            let bytes_read = text.len() as u64;
            info!(
                "Acquired {}: {} bytes in {}ms",
                origin,
                bytes_read,
                started.elapsed().as_millis()
            );
            Ok(AcquiredText {
                origin,
                text,
                bytes_read,
                duration_ms: started.elapsed().as_millis() as u64,
                error: None,
            })
        }
        Err(e) => {
            let error_msg = format!("Cannot read {}: {:#}", path.display(), e);
            warn!("{}", error_msg);
            if config.fail_fast {
                Err(anyhow::anyhow!(error_msg))
            } else {
                Ok(AcquiredText::failed(origin, error_msg, started))
            }
        }
    }
}

fn read_file_mmap(path: &Path) -> Result<String> {
    let file = std::fs::File::open(path)
        .with_context(|| format!("Failed to open file {}", path.display()))?;
    // The mapping is read-only and dropped before this function returns.
    let mmap = unsafe { Mmap::map(&file) }
        .with_context(|| format!("Failed to mmap file {}", path.display()))?;
    let text = std::str::from_utf8(&mmap)
        .with_context(|| format!("File is not valid UTF-8: {}", path.display()))?;
    Ok(text.to_string())
}

/// Fetch a URL source, reducing HTML responses to visible text.
pub async fn acquire_url(url: &str, config: &SourceConfig) -> Result<AcquiredText> {
    let origin = url.to_string();
    let started = Instant::now();
    debug!("Acquiring URL source: {}", origin);

    let client = reqwest::Client::builder()
        .connect_timeout(Duration::from_secs(config.connect_timeout_secs))
        .timeout(Duration::from_secs(config.request_timeout_secs))
        .build()
        .context("Failed to build HTTP client")?;

    let fetched = fetch_body(&client, url).await;
    match fetched {
        Ok((body, is_html)) => {
            let bytes_read = body.len() as u64;
            let text = if is_html { html_to_text(&body) } else { body };
            info!(
                "Fetched {}: {} bytes in {}ms",
                origin,
                bytes_read,
                started.elapsed().as_millis()
            );
            Ok(AcquiredText {
                origin,
                text,
                bytes_read,
                duration_ms: started.elapsed().as_millis() as u64,
                error: None,
            })
        }
        Err(e) => {
            let error_msg = format!("Cannot fetch {url}: {e:#}");
            warn!("{}", error_msg);
            if config.fail_fast {
                Err(anyhow::anyhow!(error_msg))
            } else {
                Ok(AcquiredText::failed(origin, error_msg, started))
            }
        }
    }
}

async fn fetch_body(client: &reqwest::Client, url: &str) -> Result<(String, bool)> {
    let response = client
        .get(url)
        .send()
        .await
        .context("Request failed")?
        .error_for_status()
        .context("Server returned an error status")?;

    let is_html = response
        .headers()
        .get(reqwest::header::CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .map(|value| value.contains("html"))
        .unwrap_or(false);

    let body = response.text().await.context("Failed to read response body")?;
    Ok((body, is_html))
}

/// Reduce an HTML document to its visible text: tags become separators,
/// `<script>`/`<style>` content is elided, and the common entities are
/// decoded.
fn html_to_text(html: &str) -> String {
    let mut out = String::with_capacity(html.len());
    let mut rest = html;

    while let Some(lt) = rest.find('<') {
        out.push_str(&rest[..lt]);
        rest = &rest[lt..];

        let Some(gt) = rest.find('>') else {
            // Unterminated tag: nothing visible remains.
            rest = "";
            break;
        };
        let tag = &rest[1..gt];
        let name: String = tag
            .trim_start_matches('/')
            .chars()
            .take_while(|c| c.is_ascii_alphanumeric())
            .collect::<String>()
            .to_ascii_lowercase();
        let is_closing = tag.starts_with('/');
        rest = &rest[gt + 1..];

        if !is_closing && (name == "script" || name == "style") {
            // Elide everything up to and including the matching close tag.
            let close = format!("</{name}");
            match rest.to_ascii_lowercase().find(&close) {
                Some(pos) => {
                    rest = &rest[pos..];
                    match rest.find('>') {
                        Some(end) => rest = &rest[end + 1..],
                        None => {
                            rest = "";
                            break;
                        }
                    }
                }
                None => {
                    rest = "";
                    break;
                }
            }
        } else {
            // Tags separate words; a space keeps adjacent text apart.
            out.push(' ');
        }
    }
    out.push_str(rest);

    decode_entities(&out)
}

fn decode_entities(text: &str) -> String {
    text.replace("&nbsp;", " ")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&amp;", "&")
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_source_classification() {
        assert_eq!(
            TextSource::parse("https://example.com/page"),
            TextSource::Url("https://example.com/page".to_string())
        );
        assert_eq!(
            TextSource::parse("http://example.com"),
            TextSource::Url("http://example.com".to_string())
        );

        let temp_dir = TempDir::new().unwrap();
        let dir = temp_dir.path().to_str().unwrap();
        assert_eq!(
            TextSource::parse(dir),
            TextSource::Directory(temp_dir.path().to_path_buf())
        );

        assert_eq!(
            TextSource::parse("notes.txt"),
            TextSource::File(PathBuf::from("notes.txt"))
        );
    }

    #[tokio::test]
    async fn test_acquire_file_buffered() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("sample.txt");
        std::fs::write(&path, "The cat sat. The dog ran.").unwrap();

        let acquired = acquire_file(&path, &SourceConfig::default()).await.unwrap();
        assert_eq!(acquired.text, "The cat sat. The dog ran.");
        assert_eq!(acquired.bytes_read, 25);
        assert!(acquired.error.is_none());
    }

    #[tokio::test]
    async fn test_acquire_file_mmap_agrees_with_buffered() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("sample.txt");
        std::fs::write(&path, "Same bytes either way. Even with 世界.").unwrap();

        let buffered = acquire_file(&path, &SourceConfig::default()).await.unwrap();
        let mmap_config = SourceConfig {
            use_mmap: true,
            ..Default::default()
        };
        let mapped = acquire_file(&path, &mmap_config).await.unwrap();

        assert_eq!(buffered.text, mapped.text);
        assert_eq!(buffered.bytes_read, mapped.bytes_read);
    }

    #[tokio::test]
    async fn test_missing_file_degrades_to_empty_text() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("missing.txt");

        let acquired = acquire_file(&path, &SourceConfig::default()).await.unwrap();
        assert!(acquired.text.is_empty());
        assert!(acquired.error.is_some());
    }

    #[tokio::test]
    async fn test_missing_file_fail_fast() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("missing.txt");
        let config = SourceConfig {
            fail_fast: true,
            ..Default::default()
        };

        assert!(acquire_file(&path, &config).await.is_err());
    }

    #[test]
    fn test_html_tags_become_separators() {
        let html = "<html><body><p>The cat sat.</p><p>The dog ran.</p></body></html>";
        let text = html_to_text(html);
        assert!(text.contains("The cat sat."));
        assert!(text.contains("The dog ran."));
        assert!(!text.contains('<'));
    }

    #[test]
    fn test_script_and_style_content_elided() {
        let html = "<p>Visible.</p><script>var hidden = 1;</script>\
                    <style>p { color: red; }</style><p>Also visible.</p>";
        let text = html_to_text(html);
        assert!(text.contains("Visible."));
        assert!(text.contains("Also visible."));
        assert!(!text.contains("hidden"));
        assert!(!text.contains("color"));
    }

    #[test]
    fn test_entities_decoded() {
        assert_eq!(
            html_to_text("Fish &amp; chips &lt;today&gt;"),
            "Fish & chips <today>"
        );
    }

    #[test]
    fn test_unterminated_tag_drops_remainder() {
        assert_eq!(html_to_text("before<a href=").trim(), "before");
    }
}

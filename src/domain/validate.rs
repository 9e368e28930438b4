use url::Url;

use super::AppError;

/// Validate user input as an absolute http(s) URL. Returns the parsed,
/// normalized URL; performs no network I/O.
pub fn validate(input: &str) -> Result<Url, AppError> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return Err(AppError::EmptyInput);
    }

    let url = Url::parse(trimmed).map_err(|_| AppError::MalformedUrl)?;
    match url.scheme() {
        "http" | "https" => Ok(url),
        _ => Err(AppError::MalformedUrl),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_empty_and_whitespace_input() {
        assert!(matches!(validate(""), Err(AppError::EmptyInput)));
        assert!(matches!(validate("   \t"), Err(AppError::EmptyInput)));
    }

    #[test]
    fn rejects_non_http_schemes() {
        assert!(matches!(
            validate("ftp://example.com/video.mp4"),
            Err(AppError::MalformedUrl)
        ));
        assert!(matches!(
            validate("file:///tmp/video.mp4"),
            Err(AppError::MalformedUrl)
        ));
    }

    #[test]
    fn rejects_relative_and_garbage_input() {
        assert!(matches!(
            validate("watch?v=dQw4w9WgXcQ"),
            Err(AppError::MalformedUrl)
        ));
        assert!(matches!(
            validate("not a url at all"),
            Err(AppError::MalformedUrl)
        ));
    }

    #[test]
    fn accepts_http_and_https_and_trims() {
        assert!(validate("https://youtube.com/watch?v=abc").is_ok());
        assert!(validate("  http://example.com/cat.mp4  ").is_ok());
    }
}

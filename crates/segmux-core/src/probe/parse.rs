//! Parse the `Content-Range` header of a probe response.

/// Total size from a `bytes 0-0/<total>` value. Returns `None` for any other
/// range, an unknown total (`*`), or garbage.
pub(crate) fn parse_probe_content_range(value: &str) -> Option<u64> {
    let rest = value.trim().strip_prefix("bytes")?.trim_start();
    let (range, total) = rest.split_once('/')?;
    if range.trim() != "0-0" {
        return None;
    }
    total.trim().parse::<u64>().ok().filter(|&t| t > 0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_total() {
        assert_eq!(parse_probe_content_range("bytes 0-0/2000000"), Some(2_000_000));
        assert_eq!(parse_probe_content_range("  bytes 0-0/1 "), Some(1));
    }

    #[test]
    fn rejects_unknown_total() {
        assert_eq!(parse_probe_content_range("bytes 0-0/*"), None);
    }

    #[test]
    fn rejects_other_ranges() {
        assert_eq!(parse_probe_content_range("bytes 0-99/1000"), None);
        assert_eq!(parse_probe_content_range("bytes */1000"), None);
    }

    #[test]
    fn rejects_garbage() {
        assert_eq!(parse_probe_content_range(""), None);
        assert_eq!(parse_probe_content_range("items 0-0/10"), None);
        assert_eq!(parse_probe_content_range("bytes 0-0/abc"), None);
        assert_eq!(parse_probe_content_range("bytes 0-0/0"), None);
    }
}

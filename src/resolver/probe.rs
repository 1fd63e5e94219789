//! File metadata from the resolved link's response headers

use reqwest::header::{HeaderMap, CONTENT_DISPOSITION, CONTENT_LENGTH};
use serde::Serialize;

use super::client::HostClient;
use super::error::ProbeError;

const UNITS: [&str; 8] = ["", "K", "M", "G", "T", "P", "E", "Z"];

/// Name and size of the file behind a resolved link
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FileInfo {
    pub name: String,
    pub size: String,
    pub url: String,
    #[serde(skip)]
    pub bytes: u64,
}

/// Human-readable size: one decimal, binary steps, e.g. `3.4MB`
pub fn format_size(bytes: u64) -> String {
    let mut value = bytes as f64;
    for unit in UNITS {
        if value.abs() < 1024.0 {
            return format!("{:.1}{}B", value, unit);
        }
        value /= 1024.0;
    }
    format!("{:.1}YB", value)
}

/// HEAD the resolved link and read filename and size from its headers
pub async fn probe(client: &HostClient, url: &str) -> Result<FileInfo, ProbeError> {
    let headers = client.head(url).await?;
    file_info(&headers, url)
}

fn file_info(headers: &HeaderMap, url: &str) -> Result<FileInfo, ProbeError> {
    let disposition = headers
        .get(CONTENT_DISPOSITION)
        .map(|v| String::from_utf8_lossy(v.as_bytes()).into_owned())
        .ok_or(ProbeError::MissingHeader("Content-Disposition"))?;
    let name = filename(&disposition).ok_or_else(|| ProbeError::NoFilename(disposition.clone()))?;

    let length = headers
        .get(CONTENT_LENGTH)
        .ok_or(ProbeError::MissingHeader("Content-Length"))?;
    let length = String::from_utf8_lossy(length.as_bytes());
    let bytes: u64 = length
        .trim()
        .parse()
        .map_err(|_| ProbeError::InvalidLength(length.to_string()))?;

    Ok(FileInfo {
        name,
        size: format_size(bytes),
        url: url.to_string(),
        bytes,
    })
}

/// Filename after the last `filename=` marker, percent-decoded.
///
/// The service writes `attachment; filename= name%20with%20spaces.apk`, with a
/// space after the marker and no quotes.
fn filename(disposition: &str) -> Option<String> {
    let (_, raw) = disposition.rsplit_once("filename=")?;
    let raw = raw.split(';').next().unwrap_or_default().trim().trim_matches('"');
    if raw.is_empty() {
        return None;
    }

    Some(
        urlencoding::decode(raw)
            .map(|name| name.into_owned())
            .unwrap_or_else(|_| raw.to_string()),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::header::HeaderValue;

    #[test]
    fn test_format_size_boundaries() {
        assert_eq!(format_size(0), "0.0B");
        assert_eq!(format_size(1023), "1023.0B");
        assert_eq!(format_size(1024), "1.0KB");
        assert_eq!(format_size(1536), "1.5KB");
        assert_eq!(format_size(1048576), "1.0MB");
        assert_eq!(format_size(3_565_158), "3.4MB");
        assert_eq!(format_size(1 << 30), "1.0GB");
        assert_eq!(format_size(u64::MAX), "16.0EB");
    }

    #[test]
    fn test_format_size_is_monotone_across_units() {
        let rank = |s: &str| {
            let unit = s.trim_end_matches('B').trim_start_matches(|c: char| c.is_ascii_digit() || c == '.');
            let value: f64 = s[..s.len() - unit.len() - 1].parse().unwrap();
            let power = ["", "K", "M", "G", "T", "P", "E", "Z", "Y"]
                .iter()
                .position(|u| *u == unit)
                .unwrap();
            (power, value)
        };

        let mut previous = rank(&format_size(0));
        for exp in 1..60u32 {
            for n in [(1u64 << exp) - 1, 1u64 << exp, (1u64 << exp) + 1] {
                let current = rank(&format_size(n));
                assert!(
                    current.0 > previous.0 || (current.0 == previous.0 && current.1 >= previous.1),
                    "{} went backwards",
                    n
                );
                previous = current;
            }
        }
    }

    #[test]
    fn test_filename_variants() {
        assert_eq!(
            filename("attachment; filename= demo%20app.apk").as_deref(),
            Some("demo app.apk")
        );
        assert_eq!(
            filename("attachment; filename=\"report.pdf\"").as_deref(),
            Some("report.pdf")
        );
        assert_eq!(
            filename("attachment; filename=%E6%B5%8B%E8%AF%95.zip").as_deref(),
            Some("测试.zip")
        );
        assert_eq!(filename("attachment"), None);
        assert_eq!(filename("attachment; filename= "), None);
    }

    #[test]
    fn test_file_info_requires_both_headers() {
        let mut headers = HeaderMap::new();
        assert!(matches!(
            file_info(&headers, "https://x/f"),
            Err(ProbeError::MissingHeader("Content-Disposition"))
        ));

        headers.insert(
            CONTENT_DISPOSITION,
            HeaderValue::from_static("attachment; filename= demo%20app.apk"),
        );
        assert!(matches!(
            file_info(&headers, "https://x/f"),
            Err(ProbeError::MissingHeader("Content-Length"))
        ));

        headers.insert(CONTENT_LENGTH, HeaderValue::from_static("nope"));
        assert!(matches!(
            file_info(&headers, "https://x/f"),
            Err(ProbeError::InvalidLength(_))
        ));

        headers.insert(CONTENT_LENGTH, HeaderValue::from_static("1572864"));
        let info = file_info(&headers, "https://x/f").unwrap();
        assert_eq!(info.name, "demo app.apk");
        assert_eq!(info.size, "1.5MB");
        assert_eq!(info.bytes, 1572864);
        assert_eq!(info.url, "https://x/f");
    }
}

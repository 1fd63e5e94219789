//! Share requests and inbound link parsing

use std::fmt;

use url::Url;

use super::error::LinkError;

/// Identifiers of the mobile presentation start with this character
pub const MOBILE_PREFIX: char = 'i';

/// Minimum length of a bare share identifier
const MIN_IDENTIFIER_LEN: usize = 4;

/// Presentation of the hosting service a request impersonates
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ClientVariant {
    Desktop,
    Mobile,
}

impl ClientVariant {
    /// Order in which variants are attempted. Desktop failures are cheaper
    /// to detect, so it goes first.
    pub const FAILOVER_ORDER: [ClientVariant; 2] = [ClientVariant::Desktop, ClientVariant::Mobile];

    pub fn as_str(&self) -> &'static str {
        match self {
            ClientVariant::Desktop => "desktop",
            ClientVariant::Mobile => "mobile",
        }
    }
}

impl fmt::Display for ClientVariant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Input to a single resolution attempt
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShareRequest {
    pub identifier: String,
    pub password: Option<String>,
    pub variant: ClientVariant,
}

impl ShareRequest {
    /// Build a request; an empty password counts as no password
    pub fn new(identifier: impl Into<String>, password: Option<&str>, variant: ClientVariant) -> Self {
        Self {
            identifier: identifier.into(),
            password: password.filter(|p| !p.is_empty()).map(str::to_string),
            variant,
        }
    }

    /// Whether the identifier already addresses the mobile share page
    pub fn has_mobile_prefix(&self) -> bool {
        self.identifier.starts_with(MOBILE_PREFIX)
    }
}

/// Extract the share identifier from a `url` parameter.
///
/// Accepts either a bare identifier (`i4wk2oh`) or a share URL on one of the
/// service's `lanzou*` domains (`https://lanzoui.com/i4wk2oh`), in which case
/// the last non-empty path segment is the identifier.
pub fn parse_share_input(raw: &str) -> Result<String, LinkError> {
    let raw = raw.trim();

    let candidate = if raw.contains("://") {
        let url = Url::parse(raw).map_err(|_| LinkError::Input(raw.to_string()))?;
        let on_service = url
            .host_str()
            .map(|host| host.contains("lanzou"))
            .unwrap_or(false);
        if !on_service {
            return Err(LinkError::Input(raw.to_string()));
        }
        url.path_segments()
            .and_then(|segments| segments.filter(|s| !s.is_empty()).last())
            .unwrap_or_default()
            .to_string()
    } else {
        raw.to_string()
    };

    if is_identifier(&candidate) {
        Ok(candidate)
    } else {
        Err(LinkError::Input(raw.to_string()))
    }
}

fn is_identifier(s: &str) -> bool {
    s.chars().count() >= MIN_IDENTIFIER_LEN && s.chars().all(|c| c.is_alphanumeric() || c == '_')
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_bare_identifier() {
        assert_eq!(parse_share_input("i4wk2oh").unwrap(), "i4wk2oh");
        assert_eq!(parse_share_input("  dkbdv7 ").unwrap(), "dkbdv7");
    }

    #[test]
    fn test_parse_share_url() {
        assert_eq!(parse_share_input("https://lanzoui.com/i4wk2oh").unwrap(), "i4wk2oh");
        assert_eq!(
            parse_share_input("https://wwa.lanzoux.com/i7tit9c/").unwrap(),
            "i7tit9c"
        );
    }

    #[test]
    fn test_reject_foreign_or_short_input() {
        assert!(matches!(parse_share_input("abc"), Err(LinkError::Input(_))));
        assert!(matches!(parse_share_input(""), Err(LinkError::Input(_))));
        assert!(parse_share_input("https://example.com/i4wk2oh").is_err());
        assert!(parse_share_input("https://lanzoui.com/").is_err());
        assert!(parse_share_input("i4wk 2oh").is_err());
    }

    #[test]
    fn test_empty_password_is_none() {
        let request = ShareRequest::new("i4wk2oh", Some(""), ClientVariant::Desktop);
        assert_eq!(request.password, None);
        assert!(request.has_mobile_prefix());

        let request = ShareRequest::new("dkbdv7", Some("6svq"), ClientVariant::Mobile);
        assert_eq!(request.password.as_deref(), Some("6svq"));
        assert!(!request.has_mobile_prefix());
    }
}

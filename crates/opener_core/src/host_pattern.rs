use url::Url;

/// Matches page URLs served from one allow-listed host (and its subdomains)
/// over http or https.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostPattern {
    host: String,
}

impl HostPattern {
    pub fn new(host: impl Into<String>) -> Self {
        Self {
            host: host.into().trim().to_ascii_lowercase(),
        }
    }

    pub fn matches(&self, url: &str) -> bool {
        let Ok(parsed) = Url::parse(url) else {
            return false;
        };
        if !matches!(parsed.scheme(), "http" | "https") {
            return false;
        }
        parsed
            .host_str()
            .is_some_and(|host| self.matches_hostname(host))
    }

    fn matches_hostname(&self, hostname: &str) -> bool {
        let hostname = hostname.to_ascii_lowercase();
        hostname == self.host
            || hostname
                .strip_suffix(self.host.as_str())
                .is_some_and(|prefix| prefix.ends_with('.'))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn matches_host_and_subdomains_only() {
        let pattern = HostPattern::new("connect.bracu.ac.bd");

        assert!(pattern.matches("https://connect.bracu.ac.bd/courses/1"));
        assert!(pattern.matches("http://www.connect.bracu.ac.bd/"));
        assert!(!pattern.matches("https://evilconnect.bracu.ac.bd/"));
        assert!(!pattern.matches("https://example.com/?q=connect.bracu.ac.bd"));
        assert!(!pattern.matches("chrome://extensions"));
        assert!(!pattern.matches("not a url"));
    }
}

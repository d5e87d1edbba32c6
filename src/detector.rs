//! Success-string detection

use memchr::memmem;

/// Substring containment, the whole matching rule
#[inline]
pub fn check(line: &[u8], needle: &str) -> bool {
    !needle.is_empty() && memmem::find(line, needle.as_bytes()).is_some()
}

/// Precompiled success-string matcher
#[derive(Debug, Clone)]
pub struct SuccessDetector {
    needle: String,
    finder: memmem::Finder<'static>,
}

impl SuccessDetector {
    /// `None` when no (or an empty) success string is configured
    pub fn new(needle: Option<&str>) -> Option<Self> {
        let needle = needle.filter(|n| !n.is_empty())?;
        Some(Self {
            needle: needle.to_string(),
            finder: memmem::Finder::new(needle.as_bytes()).into_owned(),
        })
    }

    pub fn needle(&self) -> &str {
        &self.needle
    }

    #[inline]
    pub fn check(&self, line: &[u8]) -> bool {
        self.finder.find(line).is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_check() {
        assert!(check(b"[+] 10.0.0.1 admin:pw STATUS_LOGON_SUCCESS", "STATUS_LOGON_SUCCESS"));
        assert!(!check(b"STATUS_LOGON_FAILURE", "STATUS_LOGON_SUCCESS"));
        assert!(!check(b"anything", ""));
    }

    #[test]
    fn test_detector_is_case_sensitive() {
        let detector = SuccessDetector::new(Some("FOUND")).unwrap();
        assert!(detector.check(b"password FOUND for admin"));
        assert!(!detector.check(b"password found for admin"));
        assert_eq!(detector.needle(), "FOUND");
    }

    #[test]
    fn test_detector_handles_invalid_utf8() {
        let detector = SuccessDetector::new(Some("FOUND")).unwrap();
        assert!(detector.check(b"\xff\xfe FOUND \xc3"));
    }

    #[test]
    fn test_empty_needle_disables_detection() {
        assert!(SuccessDetector::new(None).is_none());
        assert!(SuccessDetector::new(Some("")).is_none());
    }
}

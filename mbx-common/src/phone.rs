//! Phone number canonicalization and validity checks
//!
//! Canonicalization is deliberately narrow: separators are stripped and the
//! two common ways of writing the configured country prefix without a plus
//! (`00<cc>` and bare `<cc>`) are rewritten to `+<cc>`. Every other form
//! passes through unchanged. A leading national `0` is kept as written.

use once_cell::sync::Lazy;
use regex::Regex;

/// Country calling code used when no configuration is supplied
pub const DEFAULT_COUNTRY_CODE: &str = "98";

static SEPARATORS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[\s\-()]").expect("valid separator regex"));

static GENERIC_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\+?[\d\s\-]{5,}$").expect("valid phone regex"));

static DEFAULT_RULES: Lazy<PhoneRules> = Lazy::new(|| PhoneRules::new(DEFAULT_COUNTRY_CODE));

/// Phone rules for one country calling code
#[derive(Debug, Clone)]
pub struct PhoneRules {
    country_code: String,
    mobile: Regex,
}

impl PhoneRules {
    /// Build rules for a country code such as `"98"`.
    ///
    /// Non-digit characters in `country_code` are ignored; an empty code
    /// falls back to [`DEFAULT_COUNTRY_CODE`].
    pub fn new(country_code: &str) -> Self {
        let digits: String = country_code.chars().filter(|c| c.is_ascii_digit()).collect();
        let country_code = if digits.is_empty() {
            DEFAULT_COUNTRY_CODE.to_string()
        } else {
            digits
        };
        // only digits are interpolated
        let mobile = Regex::new(&format!(r"^(?:\+{}|0)9\d{{9}}$", country_code))
            .expect("valid mobile regex");
        Self {
            country_code,
            mobile,
        }
    }

    pub fn country_code(&self) -> &str {
        &self.country_code
    }

    /// Canonical form of a raw phone string. Idempotent.
    pub fn normalize(&self, raw: &str) -> String {
        let stripped = SEPARATORS.replace_all(raw.trim(), "");
        let cc = self.country_code.as_str();

        if let Some(rest) = stripped.strip_prefix("00").and_then(|s| s.strip_prefix(cc)) {
            return format!("+{}{}", cc, rest);
        }
        if !stripped.starts_with('+') && stripped.starts_with(cc) {
            return format!("+{}", stripped);
        }
        stripped.into_owned()
    }

    /// Matches the national mobile pattern (`+<cc>9…` or `09…`, ten digits after the prefix)
    pub fn is_mobile(&self, phone: &str) -> bool {
        self.mobile.is_match(phone)
    }

    /// Accepted by either the mobile or the generic phone pattern
    pub fn is_valid(&self, phone: &str) -> bool {
        self.is_mobile(phone) || GENERIC_PATTERN.is_match(phone)
    }
}

impl Default for PhoneRules {
    fn default() -> Self {
        DEFAULT_RULES.clone()
    }
}

/// Canonicalize with the default country code
pub fn normalize_phone(raw: &str) -> String {
    DEFAULT_RULES.normalize(raw)
}

/// Validity check with the default country code
pub fn is_valid_phone(phone: &str) -> bool {
    DEFAULT_RULES.is_valid(phone)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strips_separators() {
        assert_eq!(normalize_phone("(0912) 123-4567"), "09121234567");
        assert_eq!(normalize_phone(" +98 912 123 4567 "), "+989121234567");
    }

    #[test]
    fn test_rewrites_country_prefixes() {
        assert_eq!(normalize_phone("00989121234567"), "+989121234567");
        assert_eq!(normalize_phone("989121234567"), "+989121234567");
        assert_eq!(normalize_phone("+989121234567"), "+989121234567");
    }

    #[test]
    fn test_leading_zero_kept() {
        assert_eq!(normalize_phone("0989123456"), "0989123456");
        assert_eq!(normalize_phone("09121234567"), "09121234567");
    }

    #[test]
    fn test_other_countries_pass_through() {
        assert_eq!(normalize_phone("+44 20 7946 0958"), "+442079460958");
        assert_eq!(normalize_phone("0044207946"), "0044207946");
    }

    #[test]
    fn test_normalize_is_idempotent() {
        let inputs = [
            "0098 912 123 4567",
            "98-912-123-4567",
            "0912 123 4567",
            "+1 (555) 010-9999",
            "9898",
            "",
            "  ",
            "abc",
            "0098",
            "000098912",
        ];
        for input in inputs {
            let once = normalize_phone(input);
            assert_eq!(normalize_phone(&once), once, "input {:?}", input);
        }
    }

    #[test]
    fn test_mobile_pattern() {
        assert!(DEFAULT_RULES.is_mobile("+989121234567"));
        assert!(DEFAULT_RULES.is_mobile("09121234567"));
        assert!(!DEFAULT_RULES.is_mobile("0989123456"));
        assert!(!DEFAULT_RULES.is_mobile("+98912123456"));
    }

    #[test]
    fn test_validity() {
        assert!(is_valid_phone("+989121234567"));
        assert!(is_valid_phone("0989123456"));
        assert!(is_valid_phone("12345"));
        assert!(!is_valid_phone("1234"));
        assert!(!is_valid_phone(""));
        assert!(!is_valid_phone("+98abc12345"));
    }

    #[test]
    fn test_configured_country() {
        let rules = PhoneRules::new("+44");
        assert_eq!(rules.country_code(), "44");
        assert_eq!(rules.normalize("00447700900123"), "+447700900123");
        assert_eq!(rules.normalize("989121234567"), "989121234567");
        assert!(rules.is_mobile("+449121234567"));
        assert!(!rules.is_mobile("+989121234567"));
    }
}

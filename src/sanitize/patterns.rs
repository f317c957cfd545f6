//! Compiled pattern sets shared by the sanitizer, the request heuristics and
//! the secret masking helpers.
//!
//! Every pattern is a literal compiled once on first use.

use once_cell::sync::Lazy;
use regex::Regex;

fn compile(pattern: &str) -> Regex {
    Regex::new(pattern).expect("Invalid built-in pattern")
}

/// Markers removed from free text before it is entity-escaped.
pub static TEXT_DENYLIST: Lazy<Vec<Regex>> = Lazy::new(|| {
    [
        r"(?is)<\s*script[^>]*>.*?<\s*/\s*script\s*>",
        r"(?i)<\s*/?\s*script[^>]*>?",
        r"(?i)<\s*/?\s*(iframe|object|embed|applet|meta|link|style|base|form)\b[^>]*>?",
        r"(?i)javascript\s*:",
        r"(?i)vbscript\s*:",
        r"(?i)data\s*:\s*text/html",
        r"(?i)\bon[a-z]+\s*=",
        r"(?i)expression\s*\(",
    ]
    .iter()
    .map(|p| compile(p))
    .collect()
});

/// Content that must never survive into a value reported as valid.
pub static DANGEROUS_CONTENT: Lazy<Regex> = Lazy::new(|| {
    compile(r"(?i)(<\s*/?\s*script|<\s*iframe|javascript\s*:|vbscript\s*:|data\s*:\s*text/html|\bon[a-z]+\s*=)")
});

/// Keyword combinations typical of SQL injection payloads.
///
/// Single keywords ("select", "update") are common in prose, so only
/// statement-shaped combinations are matched.
pub static SQL_INJECTION: Lazy<Regex> = Lazy::new(|| {
    compile(concat!(
        r"(?i)(\bunion\b(\s+all)?\s+\bselect\b",
        r"|\binsert\s+into\b",
        r"|\bdelete\s+from\b",
        r"|\bdrop\s+(table|database|schema)\b",
        r"|\btruncate\s+table\b",
        r"|\balter\s+table\b",
        r"|\bupdate\s+\w+\s+set\b",
        r"|\bexec(ute)?\s*\(",
        r"|\bxp_cmdshell\b",
        r"|\bor\s+1\s*=\s*1\b",
        r"|'\s*(or|and)\s+'[^']*'\s*=\s*'",
        r"|'\s*;?\s*--)",
    ))
});

/// Script-injection markers looked for in whole request payloads.
pub static XSS_PAYLOAD: Lazy<Regex> = Lazy::new(|| {
    compile(concat!(
        r"(?i)(<\s*script",
        r"|javascript\s*:",
        r"|\bon[a-z]+\s*=",
        r"|<\s*iframe",
        r"|\beval\s*\(",
        r"|\bdocument\s*\.\s*(cookie|write|writeln|location|domain|body|forms))",
    ))
});

pub static EMAIL_FORMAT: Lazy<Regex> = Lazy::new(|| compile(r"^[^\s@]+@[^\s@]+\.[^\s@]+$"));

/// Object keys whose values are secrets. Matches whole segments of a key
/// already folded to lowercase snake_case, so `author` and `monkey` pass.
pub static SENSITIVE_KEY: Lazy<Regex> = Lazy::new(|| {
    compile(concat!(
        r"(?:^|[_.\- ])",
        r"(?:apikey|secretkey|privatekey|accesskey|key|secret|token|password|passphrase|passwd|pwd",
        r"|authorization|auth|cookie|session|sessionid|credential|signature|private)s?",
        r"(?:$|[_.\- ])",
    ))
});

/// Secrets embedded in free-form text such as error messages.
pub static INLINE_SECRETS: Lazy<Vec<(Regex, &'static str)>> = Lazy::new(|| {
    vec![
        (compile(r"(?i)\bbearer\s+[A-Za-z0-9._~+/=-]+"), "Bearer [REDACTED]"),
        (compile(r"\b(sk|pk|rk)_(live|test)_[A-Za-z0-9]+"), "[REDACTED]"),
        (compile(r"\bwhsec_[A-Za-z0-9]+"), "[REDACTED]"),
        (
            compile(r"(?i)\b(api[_-]?key|secret|token|password|passwd)\s*([=:])\s*[^\s&,;]+"),
            "$1$2[REDACTED]",
        ),
    ]
});

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sql_pattern_ignores_prose() {
        assert!(!SQL_INJECTION.is_match("Please select gold and update me"));
        assert!(SQL_INJECTION.is_match("1 UNION SELECT password FROM users"));
        assert!(SQL_INJECTION.is_match("x'; DROP TABLE users; --"));
        assert!(SQL_INJECTION.is_match("admin' OR 1=1"));
    }

    #[test]
    fn test_event_handler_needs_word_boundary() {
        assert!(DANGEROUS_CONTENT.is_match("<img src=x onerror=alert(1)>"));
        assert!(!DANGEROUS_CONTENT.is_match("condition=met"));
    }

    #[test]
    fn test_sensitive_key_segments() {
        for key in ["key", "api_key", "session_token", "x-api-key", "apikey", "credentials", "password_hash"] {
            assert!(SENSITIVE_KEY.is_match(key), "{key}");
        }
        for key in ["author", "monkey", "keyboard", "donkey_count", "tokenizer"] {
            assert!(!SENSITIVE_KEY.is_match(key), "{key}");
        }
    }

    #[test]
    fn test_xss_payload_markers() {
        assert!(XSS_PAYLOAD.is_match(r#"{"name":"<script>alert(1)</script>"}"#));
        assert!(XSS_PAYLOAD.is_match("eval (atob('...'))"));
        assert!(XSS_PAYLOAD.is_match("document.cookie"));
        assert!(!XSS_PAYLOAD.is_match(r#"{"name":"Ada Lovelace"}"#));
    }
}

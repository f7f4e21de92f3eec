// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2026 ® John Hauger Mitander <john@on1.no>

use lazy_static::lazy_static;
use regex::Regex;

lazy_static! {
    static ref HEX_SECRET: Regex =
        Regex::new(r"(?i)\b(0x)?[a-f0-9]{64}\b").expect("static regex");
    static ref URL: Regex = Regex::new(r#"(?i)\b(https?|wss?)://[^\s"'<>]+"#).expect("static regex");
    static ref KEY_VALUE: Regex = Regex::new(
        r#"(?i)\b(password|passwd|secret|token|api[_-]?key|key)\s*[=:]\s*[^\s,;&"']+"#
    )
    .expect("static regex");
}

/// Strip private keys, endpoint URLs and credential pairs from error text.
///
/// Transaction hashes are also 32 bytes of hex and get masked too; callers that
/// need the hash keep it in a typed field rather than in the message.
pub fn sanitize_error_message(raw: &str) -> String {
    let out = HEX_SECRET.replace_all(raw, "[REDACTED_HEX]");
    let out = URL.replace_all(&out, "[REDACTED_URL]");
    let out = KEY_VALUE.replace_all(&out, "$1=[REDACTED]");
    out.into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn redacts_private_keys() {
        let key = "4c0883a69102937d6231471b5dbb6204fe5129617082792ae468d01a3f362318";
        let msg = format!("bad key 0x{key} supplied");
        let clean = sanitize_error_message(&msg);
        assert!(!clean.contains(key));
        assert!(clean.contains("[REDACTED_HEX]"));
    }

    #[test]
    fn redacts_urls_and_credentials() {
        let msg = "rpc https://base.example/v2/abcdef failed; api_key=s3cret password: hunter2";
        let clean = sanitize_error_message(msg);
        assert!(!clean.contains("base.example"));
        assert!(!clean.contains("s3cret"));
        assert!(!clean.contains("hunter2"));
        assert!(clean.contains("api_key=[REDACTED]"));
    }

    #[test]
    fn leaves_plain_revert_reasons_alone() {
        let msg = "execution reverted: V4TooLittleReceived";
        assert_eq!(sanitize_error_message(msg), msg);
    }
}

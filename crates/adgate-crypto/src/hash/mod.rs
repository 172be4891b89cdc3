//! Directory password encodings

/// Encode a password for the Active Directory `unicodePwd` attribute.
///
/// The value is the password wrapped in double quotes, encoded as UTF-16LE.
pub fn unicode_pwd(password: &str) -> Vec<u8> {
    format!("\"{}\"", password)
        .encode_utf16()
        .flat_map(|unit| unit.to_le_bytes())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unicode_pwd_encoding() {
        assert_eq!(
            unicode_pwd("ab"),
            vec![b'"', 0, b'a', 0, b'b', 0, b'"', 0]
        );
    }

    #[test]
    fn test_unicode_pwd_non_ascii() {
        // U+00E9 is a single UTF-16 unit
        assert_eq!(unicode_pwd("\u{e9}"), vec![b'"', 0, 0xe9, 0, b'"', 0]);
    }
}

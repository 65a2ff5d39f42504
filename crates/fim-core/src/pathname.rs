//! Lossless text form of filesystem paths.
//!
//! Snapshot keys and the JSON document need strings, but unix file names
//! are arbitrary bytes. Valid UTF-8 is kept as is, a literal backslash is
//! written `\\` and every byte that is not part of valid UTF-8 is written
//! `\xNN`, so distinct names always produce distinct keys.

use std::path::{Path, PathBuf};

#[cfg(unix)]
pub fn encode(path: &Path) -> String {
    use std::os::unix::ffi::OsStrExt;

    let mut bytes = path.as_os_str().as_bytes();
    let mut out = String::with_capacity(bytes.len());
    loop {
        match std::str::from_utf8(bytes) {
            Ok(valid) => {
                push_escaped(&mut out, valid);
                return out;
            }
            Err(err) => {
                let (valid, rest) = bytes.split_at(err.valid_up_to());
                push_escaped(&mut out, std::str::from_utf8(valid).unwrap_or_default());
                let invalid = err.error_len().unwrap_or(rest.len());
                for byte in &rest[..invalid] {
                    out.push_str(&format!("\\x{byte:02x}"));
                }
                bytes = &rest[invalid..];
            }
        }
    }
}

#[cfg(not(unix))]
pub fn encode(path: &Path) -> String {
    path.to_string_lossy().into_owned()
}

/// Inverse of [`encode`].
#[cfg(unix)]
pub fn decode(text: &str) -> PathBuf {
    use std::ffi::OsString;
    use std::os::unix::ffi::OsStringExt;

    let src = text.as_bytes();
    let mut bytes = Vec::with_capacity(src.len());
    let mut i = 0;
    while i < src.len() {
        if src[i] == b'\\' {
            match src.get(i + 1) {
                Some(b'\\') => {
                    bytes.push(b'\\');
                    i += 2;
                    continue;
                }
                Some(b'x') => {
                    if let Some(byte) = src
                        .get(i + 2..i + 4)
                        .and_then(|hex| std::str::from_utf8(hex).ok())
                        .and_then(|hex| u8::from_str_radix(hex, 16).ok())
                    {
                        bytes.push(byte);
                        i += 4;
                        continue;
                    }
                }
                _ => {}
            }
        }
        bytes.push(src[i]);
        i += 1;
    }
    PathBuf::from(OsString::from_vec(bytes))
}

#[cfg(not(unix))]
pub fn decode(text: &str) -> PathBuf {
    PathBuf::from(text)
}

#[cfg(unix)]
fn push_escaped(out: &mut String, text: &str) {
    for c in text.chars() {
        if c == '\\' {
            out.push_str("\\\\");
        } else {
            out.push(c);
        }
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use std::ffi::OsStr;
    use std::os::unix::ffi::OsStrExt;

    #[test]
    fn utf8_paths_are_unchanged() {
        assert_eq!(encode(Path::new("/etc/ssh/sshd_config")), "/etc/ssh/sshd_config");
        assert_eq!(encode(Path::new("/srv/données/é")), "/srv/données/é");
    }

    #[test]
    fn invalid_bytes_stay_distinct_and_reversible() {
        let ff = Path::new(OsStr::from_bytes(b"/srv/a\xff"));
        let fe = Path::new(OsStr::from_bytes(b"/srv/a\xfe"));
        assert_eq!(encode(ff), "/srv/a\\xff");
        assert_ne!(encode(ff), encode(fe));
        assert_eq!(decode(&encode(ff)), ff);
        assert_eq!(decode(&encode(fe)), fe);
    }

    #[test]
    fn literal_escape_text_does_not_collide_with_raw_bytes() {
        let literal = Path::new("/srv/a\\xff");
        let raw = Path::new(OsStr::from_bytes(b"/srv/a\xff"));
        assert_ne!(encode(literal), encode(raw));
        assert_eq!(decode(&encode(literal)), literal);
    }
}

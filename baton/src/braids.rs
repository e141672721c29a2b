use aliri_braid::braid;
use std::fmt;

macro_rules! limited_reveal {
    ($ty:ty: $hidden:literal, $default:literal) => {
        impl fmt::Debug for $ty {
            fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
                if f.alternate() {
                    f.write_str("\"")?;
                    limited_reveal(&self.0, &mut *f, $default)?;
                    f.write_str("\"")
                } else {
                    f.write_str(concat!("***", $hidden, "***"))
                }
            }
        }

        impl fmt::Display for $ty {
            fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
                if f.alternate() {
                    limited_reveal(&self.0, &mut *f, usize::MAX)
                } else {
                    f.write_str(concat!("***", $hidden, "***"))
                }
            }
        }
    };
}

/// Writes at most `width` (or `default_len`) characters of a secret, marking
/// truncation with an ellipsis
fn limited_reveal(unprotected: &str, f: &mut fmt::Formatter, default_len: usize) -> fmt::Result {
    let max_len = f.width().unwrap_or(default_len);
    if max_len <= 1 {
        f.write_str("…")
    } else if max_len > unprotected.len() {
        f.write_str(unprotected)
    } else {
        match unprotected.char_indices().nth(max_len - 2) {
            Some((idx, c)) if idx + c.len_utf8() < unprotected.len() => {
                f.write_str(&unprotected[0..idx + c.len_utf8()])?;
                f.write_str("…")
            }
            _ => f.write_str(unprotected),
        }
    }
}

/// The stable identifier of an authenticated principal
#[braid(serde)]
pub struct PrincipalId;

/// The role granted to a principal
#[braid(serde)]
pub struct Role;

/// An email address presented at sign-in
#[braid(serde)]
pub struct Email;

/// A password presented at sign-in
#[braid(serde, debug = "owned", display = "owned")]
pub struct Password;

limited_reveal!(PasswordRef: "PASSWORD", 0);

/// A signed access token
#[braid(serde, debug = "owned", display = "owned")]
pub struct AccessToken;

limited_reveal!(AccessTokenRef: "ACCESS TOKEN", 15);

/// An opaque, single-use refresh token
#[braid(serde, debug = "owned", display = "owned")]
pub struct RefreshToken;

limited_reveal!(RefreshTokenRef: "REFRESH TOKEN", 5);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn secrets_are_hidden_by_default() {
        let token = RefreshToken::from("abcdefghijklmnop");
        assert_eq!(format!("{:?}", token), "***REFRESH TOKEN***");
        assert_eq!(token.to_string(), "***REFRESH TOKEN***");

        let password = Password::from("hunter2");
        assert_eq!(format!("{:?}", password), "***PASSWORD***");
    }

    #[test]
    fn alternate_debug_reveals_a_prefix() {
        let token = RefreshToken::from("abcdefghijklmnop");
        assert_eq!(format!("{:#?}", token), "\"abcd…\"");

        let password = Password::from("hunter2");
        assert_eq!(format!("{:#?}", password), "\"…\"");
    }

    #[test]
    fn alternate_display_reveals_everything() {
        let token = AccessToken::from("aaa.bbb.ccc");
        assert_eq!(format!("{:#}", token), "aaa.bbb.ccc");
        assert_eq!(token.as_str(), "aaa.bbb.ccc");
    }
}

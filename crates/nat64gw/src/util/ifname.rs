//! Bounded interface names.

use std::fmt;

use crate::error::{Error, Result};

/// Maximum interface name length (including null terminator).
pub const IFNAMSIZ: usize = libc::IFNAMSIZ;

/// Longest name the kernel accepts.
pub const IFNAME_MAX: usize = IFNAMSIZ - 1;

/// An interface name no longer than [`IFNAME_MAX`] bytes.
///
/// Longer input is truncated once, here, on a character boundary. Every
/// ioctl request copies its name out of an `IfName`, so no call site
/// truncates on its own.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct IfName(String);

impl IfName {
    /// Build a name, truncating anything past [`IFNAME_MAX`] bytes.
    pub fn new(name: &str) -> Result<Self> {
        validate(name)?;

        let mut end = name.len().min(IFNAME_MAX);
        while !name.is_char_boundary(end) {
            end -= 1;
        }
        if end < name.len() {
            tracing::debug!(requested = name, kept = &name[..end], "truncating interface name");
        }
        Ok(Self(name[..end].to_string()))
    }

    /// Decode a NUL-terminated name as returned by the kernel in `ifr_name`.
    pub fn from_kernel(raw: &[libc::c_char]) -> Result<Self> {
        let bytes: Vec<u8> = raw
            .iter()
            .take_while(|&&c| c != 0)
            .map(|&c| c as u8)
            .collect();
        let name = String::from_utf8(bytes)
            .map_err(|_| Error::InvalidName("kernel returned non UTF-8 name".to_string()))?;
        Self::new(&name)
    }

    /// The name as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Copy the name into an `ifr_name` buffer, NUL-terminated.
    pub fn write_to(&self, buf: &mut [libc::c_char; IFNAMSIZ]) {
        *buf = [0; IFNAMSIZ];
        for (dst, &src) in buf.iter_mut().zip(self.0.as_bytes()) {
            *dst = src as libc::c_char;
        }
    }
}

impl fmt::Display for IfName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for IfName {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Validate the characters of an interface name. Length is not checked;
/// [`IfName::new`] truncates instead.
pub fn validate(name: &str) -> Result<()> {
    if name.is_empty() {
        return Err(Error::InvalidName("empty name".to_string()));
    }

    if name.contains('/') || name.contains('\0') {
        return Err(Error::InvalidName(format!(
            "{:?} contains invalid characters",
            name
        )));
    }

    if name.chars().any(|c| c.is_whitespace()) {
        return Err(Error::InvalidName(format!("{:?} contains whitespace", name)));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_short_name_kept() {
        let name = IfName::new("tun-test0").unwrap();
        assert_eq!(name.as_str(), "tun-test0");
    }

    #[test]
    fn test_long_name_truncated() {
        let name = IfName::new("tun-gateway-interface").unwrap();
        assert_eq!("tun-gateway-interface".len(), 21);
        assert_eq!(name.as_str().len(), IFNAME_MAX);
        assert_eq!(name.as_str(), "tun-gateway-int");

        let twenty = "abcdefghijklmnopqrst";
        assert_eq!(IfName::new(twenty).unwrap().as_str(), &twenty[..15]);
    }

    #[test]
    fn test_truncation_respects_char_boundary() {
        // 14 ASCII bytes followed by a 2-byte character straddling the limit.
        let name = IfName::new("abcdefghijklmné").unwrap();
        assert_eq!(name.as_str(), "abcdefghijklmn");
    }

    #[test]
    fn test_validate() {
        assert!(validate("tun0").is_ok());
        assert!(validate("").is_err());
        assert!(validate("tun/0").is_err());
        assert!(validate("tun 0").is_err());
        assert!(IfName::new("tun\00").is_err());
    }

    #[test]
    fn test_kernel_round_trip() {
        let name = IfName::new("tun64").unwrap();
        let mut buf = [1 as libc::c_char; IFNAMSIZ];
        name.write_to(&mut buf);
        assert_eq!(buf[5], 0);
        assert_eq!(buf[IFNAMSIZ - 1], 0);
        assert_eq!(IfName::from_kernel(&buf).unwrap(), name);
    }
}

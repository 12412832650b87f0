//! The identification banner exchanged before any packet (RFC 4253, section 4.2).
use bytes::{BufMut as _, Bytes, BytesMut};
use std::fmt;
use crate::error::{Error, Result};

/// Protocol version that this crate speaks. Always `"2.0"` for what we send.
pub const PROTOCOL_VERSION: &str = "2.0";

/// One peer's identification banner.
///
/// Serialized as `SSH-<protocol>-<software>[ <comment>]\r\n`. The protocol and
/// software fields must not contain `-`, whitespace or non-printable ASCII.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Ident {
    protocol_version: String,
    software_version: String,
    comment: Option<String>,
}

impl Ident {
    /// Creates a banner with the given software version and no comment.
    pub fn new(software_version: &str) -> Result<Ident> {
        Ident::with_comment(software_version, None)
    }

    /// Creates a banner with the given software version and comment.
    pub fn with_comment(software_version: &str, comment: Option<&str>) -> Result<Ident> {
        check_version_field(software_version)?;
        if let Some(comment) = comment {
            if comment.is_empty() {
                return Err(Error::IllegalIdent("banner comment is empty"));
            }
            if !comment.bytes().all(|b| (0x20..0x7f).contains(&b)) {
                return Err(Error::IllegalIdent("banner comment is not printable ascii"));
            }
        }
        Ok(Ident {
            protocol_version: PROTOCOL_VERSION.into(),
            software_version: software_version.into(),
            comment: comment.map(|c| c.into()),
        })
    }

    pub fn protocol_version(&self) -> &str {
        &self.protocol_version
    }

    pub fn software_version(&self) -> &str {
        &self.software_version
    }

    pub fn comment(&self) -> Option<&str> {
        self.comment.as_deref()
    }

    /// The banner line without the trailing CRLF, as it enters the exchange
    /// hash computation.
    pub fn to_line(&self) -> String {
        self.to_string()
    }

    /// The wire encoding of the banner, including the trailing CRLF.
    pub fn encode(&self) -> Bytes {
        let line = self.to_line();
        let mut buf = BytesMut::with_capacity(line.len() + 2);
        buf.put_slice(line.as_bytes());
        buf.put_slice(b"\r\n");
        buf.freeze()
    }

    /// Parses a banner line with the CRLF already stripped.
    ///
    /// The received software version may contain `-` (some deployed servers
    /// violate the grammar), so the field is read up to the first space or the
    /// end of the line.
    pub fn parse(line: &[u8]) -> Result<Ident> {
        let line = std::str::from_utf8(line)
            .map_err(|_| Error::IllegalIdent("banner is not valid utf-8"))?;
        if !line.bytes().all(|b| (0x20..0x7f).contains(&b)) {
            return Err(Error::IllegalIdent("banner contains non-printable bytes"));
        }

        let rest = line.strip_prefix("SSH-")
            .ok_or(Error::IllegalIdent("banner does not start with \"SSH-\""))?;
        let (protocol_version, rest) = rest.split_once('-')
            .ok_or(Error::IllegalIdent("banner is missing the software version"))?;
        let (software_version, comment) = match rest.split_once(' ') {
            Some((software, comment)) => (software, Some(comment)),
            None => (rest, None),
        };

        if protocol_version.is_empty() {
            return Err(Error::IllegalIdent("banner protocol version is empty"));
        }
        if software_version.is_empty() {
            return Err(Error::IllegalIdent("banner software version is empty"));
        }

        Ok(Ident {
            protocol_version: protocol_version.into(),
            software_version: software_version.into(),
            comment: comment.map(|c| c.into()),
        })
    }
}

impl fmt::Display for Ident {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "SSH-{}-{}", self.protocol_version, self.software_version)?;
        if let Some(comment) = self.comment.as_deref() {
            write!(f, " {}", comment)?;
        }
        Ok(())
    }
}

fn check_version_field(version: &str) -> Result<()> {
    if version.is_empty() {
        return Err(Error::IllegalIdent("banner version field is empty"));
    }
    for c in version.chars() {
        if !c.is_ascii() {
            return Err(Error::IllegalIdent("banner version field is not ascii"));
        } else if c.is_whitespace() || c.is_ascii_control() {
            return Err(Error::IllegalIdent("banner version field contains whitespace"));
        } else if c == '-' {
            return Err(Error::IllegalIdent("banner version field contains '-'"));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode() {
        let ident = Ident::with_comment("OpenSSH_Emulator", Some("x")).unwrap();
        assert_eq!(
            ident.encode().as_ref(),
            &b"SSH-2.0-OpenSSH_Emulator x\r\n"[..],
        );

        let ident = Ident::new("dummy").unwrap();
        assert_eq!(ident.encode().as_ref(), &b"SSH-2.0-dummy\r\n"[..]);
    }

    #[test]
    fn test_parse() {
        let ident = Ident::parse(b"SSH-2.0-OpenSSH_9.6 Ubuntu-3ubuntu13").unwrap();
        assert_eq!(ident.protocol_version(), "2.0");
        assert_eq!(ident.software_version(), "OpenSSH_9.6");
        assert_eq!(ident.comment(), Some("Ubuntu-3ubuntu13"));

        let ident = Ident::parse(b"SSH-2.0-dummy").unwrap();
        assert_eq!(ident.software_version(), "dummy");
        assert_eq!(ident.comment(), None);

        // deployed servers sometimes put '-' into the software version
        let ident = Ident::parse(b"SSH-2.0-Cisco-1.25").unwrap();
        assert_eq!(ident.software_version(), "Cisco-1.25");
    }

    #[test]
    fn test_parse_round_trip() {
        for line in ["SSH-2.0-minato_0.1.0", "SSH-2.0-minato comment here"] {
            let ident = Ident::parse(line.as_bytes()).unwrap();
            assert_eq!(ident.to_line(), line);
        }
    }

    #[test]
    fn test_parse_errors() {
        assert!(Ident::parse(b"HTTP/1.1 200 OK").is_err());
        assert!(Ident::parse(b"SSH-2.0").is_err());
        assert!(Ident::parse(b"SSH--dummy").is_err());
        assert!(Ident::parse(b"SSH-2.0-").is_err());
        assert!(Ident::parse(b"SSH-2.0-dum\x01my").is_err());
    }

    #[test]
    fn test_illegal_software_version() {
        assert!(Ident::new("has-minus").is_err());
        assert!(Ident::new("has space").is_err());
        assert!(Ident::new("").is_err());
        assert!(Ident::new("ok_version_1.0").is_ok());
    }
}

//! Dial options

use std::fmt;

/// Which of the instance's addresses to dial
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum IpType {
    /// Public IP (`PRIMARY` in the Admin API)
    #[default]
    Public,
    /// Private IP inside the VPC
    Private,
}

impl IpType {
    /// Map an Admin API address type; unknown types are skipped
    pub fn from_api(kind: &str) -> Option<Self> {
        match kind {
            "PRIMARY" => Some(Self::Public),
            "PRIVATE" => Some(Self::Private),
            _ => None,
        }
    }

    /// Label used in logs and metrics
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Public => "public",
            Self::Private => "private",
        }
    }
}

impl fmt::Display for IpType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Per-dial options; a `Dialer` applies its defaults unless overridden
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DialOptions {
    /// Address type to dial
    pub ip_type: IpType,
}

impl DialOptions {
    /// Prefer the instance's private address
    pub fn private_ip(mut self) -> Self {
        self.ip_type = IpType::Private;
        self
    }

    /// Prefer the instance's public address
    pub fn public_ip(mut self) -> Self {
        self.ip_type = IpType::Public;
        self
    }
}

//! Instance connection names

use crate::{Error, Result};
use std::fmt;
use std::str::FromStr;

/// A parsed `project:region:instance` name
///
/// Domain-scoped projects (`example.com:project`) are accepted, giving four parts.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct InstanceConnectionName {
    project: String,
    region: String,
    name: String,
}

impl InstanceConnectionName {
    /// Parse and validate a connection name
    pub fn parse(s: &str) -> Result<Self> {
        let parts: Vec<&str> = s.split(':').collect();
        let (project, region, name) = match parts.as_slice() {
            [project, region, name] => (project.to_string(), *region, *name),
            [domain, project, region, name] if !domain.is_empty() && !project.is_empty() => {
                (format!("{}:{}", domain, project), *region, *name)
            }
            _ => return Err(Error::InvalidInstanceName(s.to_string())),
        };

        if project.is_empty() || region.is_empty() || name.is_empty() {
            return Err(Error::InvalidInstanceName(s.to_string()));
        }

        Ok(Self {
            project,
            region: region.to_string(),
            name: name.to_string(),
        })
    }

    /// Project ID, including any domain prefix
    pub fn project(&self) -> &str {
        &self.project
    }

    /// Region the instance lives in
    pub fn region(&self) -> &str {
        &self.region
    }

    /// Instance name within the project
    pub fn name(&self) -> &str {
        &self.name
    }
}

impl FromStr for InstanceConnectionName {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl fmt::Display for InstanceConnectionName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:{}", self.project, self.region, self.name)
    }
}

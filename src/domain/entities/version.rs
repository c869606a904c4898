use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

/// Semantic version of a module or of the host API
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct Version {
    major: u64,
    minor: u64,
    patch: u64,
    prerelease: String,
    buildtag: String,
}

impl Version {
    pub fn new(major: u64, minor: u64, patch: u64) -> Self {
        Self {
            major,
            minor,
            patch,
            prerelease: String::new(),
            buildtag: String::new(),
        }
    }

    pub fn with_prerelease(mut self, prerelease: impl Into<String>) -> Self {
        self.prerelease = prerelease.into();
        self
    }

    pub fn with_buildtag(mut self, buildtag: impl Into<String>) -> Self {
        self.buildtag = buildtag.into();
        self
    }

    pub fn major(&self) -> u64 {
        self.major
    }

    pub fn minor(&self) -> u64 {
        self.minor
    }

    pub fn patch(&self) -> u64 {
        self.patch
    }

    pub fn prerelease(&self) -> &str {
        &self.prerelease
    }

    pub fn buildtag(&self) -> &str {
        &self.buildtag
    }

    /// Whether `candidate` satisfies this version as a requirement.
    ///
    /// Any one of the three clauses is enough: same major, or a minor no
    /// newer than ours, or a patch no newer than ours. This accepts pairs a
    /// strict semver check would reject (see `DESIGN.md`).
    pub fn is_compatible(&self, candidate: &Version) -> bool {
        candidate.major == self.major
            || candidate.minor <= self.minor
            || candidate.patch <= self.patch
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.patch)?;
        if !self.prerelease.is_empty() {
            write!(f, "-{}", self.prerelease)?;
        }
        if !self.buildtag.is_empty() {
            write!(f, "+{}", self.buildtag)?;
        }
        Ok(())
    }
}

impl FromStr for Version {
    type Err = semver::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parsed = semver::Version::parse(s.trim())?;
        Ok(Self {
            major: parsed.major,
            minor: parsed.minor,
            patch: parsed.patch,
            prerelease: parsed.pre.as_str().to_string(),
            buildtag: parsed.build.as_str().to_string(),
        })
    }
}

impl Serialize for Version {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Version {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

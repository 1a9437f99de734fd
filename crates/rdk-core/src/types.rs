use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::RdkError;

// ---------------------------------------------------------------------------
// Runtime
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Runtime {
    #[serde(rename = "nodejs")]
    Nodejs,
    #[serde(rename = "nodejs4.3")]
    Nodejs43,
    #[serde(rename = "nodejs6.10")]
    Nodejs610,
    #[serde(rename = "java8")]
    Java8,
    #[serde(rename = "python2.7")]
    Python27,
    #[serde(rename = "python3.6")]
    Python36,
    #[serde(rename = "dotnetcore1.0")]
    Dotnetcore10,
    #[serde(rename = "nodejs4.3-edge")]
    Nodejs43Edge,
}

/// Language family a runtime belongs to. Drives file extensions,
/// handler naming and which local interpreter can run the rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RuntimeFamily {
    Python,
    Node,
    Java,
    DotNet,
}

impl Runtime {
    pub fn all() -> &'static [Runtime] {
        &[
            Runtime::Nodejs,
            Runtime::Nodejs43,
            Runtime::Nodejs610,
            Runtime::Java8,
            Runtime::Python27,
            Runtime::Python36,
            Runtime::Dotnetcore10,
            Runtime::Nodejs43Edge,
        ]
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Runtime::Nodejs => "nodejs",
            Runtime::Nodejs43 => "nodejs4.3",
            Runtime::Nodejs610 => "nodejs6.10",
            Runtime::Java8 => "java8",
            Runtime::Python27 => "python2.7",
            Runtime::Python36 => "python3.6",
            Runtime::Dotnetcore10 => "dotnetcore1.0",
            Runtime::Nodejs43Edge => "nodejs4.3-edge",
        }
    }

    pub fn family(self) -> RuntimeFamily {
        match self {
            Runtime::Nodejs | Runtime::Nodejs43 | Runtime::Nodejs610 | Runtime::Nodejs43Edge => {
                RuntimeFamily::Node
            }
            Runtime::Python27 | Runtime::Python36 => RuntimeFamily::Python,
            Runtime::Java8 => RuntimeFamily::Java,
            Runtime::Dotnetcore10 => RuntimeFamily::DotNet,
        }
    }

    /// Extension of the `<rule>.<ext>` source file.
    pub fn extension(self) -> &'static str {
        self.family().extension()
    }

    /// Function handler for a rule deployed with this runtime.
    pub fn handler(self, rule: &str) -> String {
        match self.family() {
            RuntimeFamily::Python => format!("{rule}.lambda_handler"),
            RuntimeFamily::Node => format!("{rule}.handler"),
            RuntimeFamily::Java => format!("{rule}::handleRequest"),
            RuntimeFamily::DotNet => format!("{rule}::{rule}.Rule::Handler"),
        }
    }
}

impl RuntimeFamily {
    pub fn extension(self) -> &'static str {
        match self {
            RuntimeFamily::Python => "py",
            RuntimeFamily::Node => "js",
            RuntimeFamily::Java => "java",
            RuntimeFamily::DotNet => "cs",
        }
    }

    /// Every extension a rule source file may carry.
    pub fn all_extensions() -> &'static [&'static str] {
        &["py", "js", "java", "cs"]
    }
}

impl fmt::Display for Runtime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Runtime {
    type Err = RdkError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Runtime::all()
            .iter()
            .copied()
            .find(|r| r.as_str() == s)
            .ok_or_else(|| RdkError::InvalidRuntime(s.to_string()))
    }
}

// ---------------------------------------------------------------------------
// Frequency
// ---------------------------------------------------------------------------

/// Maximum execution frequency of a periodic rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Frequency {
    #[serde(rename = "One_Hour")]
    OneHour,
    #[serde(rename = "Three_Hours")]
    ThreeHours,
    #[serde(rename = "Six_Hours")]
    SixHours,
    #[serde(rename = "Twelve_Hours")]
    TwelveHours,
    #[serde(rename = "TwentyFour_Hours")]
    TwentyFourHours,
}

impl Frequency {
    pub fn all() -> &'static [Frequency] {
        &[
            Frequency::OneHour,
            Frequency::ThreeHours,
            Frequency::SixHours,
            Frequency::TwelveHours,
            Frequency::TwentyFourHours,
        ]
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Frequency::OneHour => "One_Hour",
            Frequency::ThreeHours => "Three_Hours",
            Frequency::SixHours => "Six_Hours",
            Frequency::TwelveHours => "Twelve_Hours",
            Frequency::TwentyFourHours => "TwentyFour_Hours",
        }
    }
}

impl fmt::Display for Frequency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Frequency {
    type Err = RdkError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Frequency::all()
            .iter()
            .copied()
            .find(|f| f.as_str() == s)
            .ok_or_else(|| RdkError::InvalidFrequency(s.to_string()))
    }
}

// ---------------------------------------------------------------------------
// Verdict
// ---------------------------------------------------------------------------

/// Compliance verdict returned by a rule for one configuration item.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verdict {
    Compliant,
    NonCompliant,
    NotApplicable,
    InsufficientData,
    Other(String),
}

impl Verdict {
    pub fn parse(raw: &str) -> Self {
        match raw.trim() {
            "COMPLIANT" => Verdict::Compliant,
            "NON_COMPLIANT" => Verdict::NonCompliant,
            "NOT_APPLICABLE" => Verdict::NotApplicable,
            "INSUFFICIENT_DATA" => Verdict::InsufficientData,
            other => Verdict::Other(other.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Verdict::Compliant => "COMPLIANT",
            Verdict::NonCompliant => "NON_COMPLIANT",
            Verdict::NotApplicable => "NOT_APPLICABLE",
            Verdict::InsufficientData => "INSUFFICIENT_DATA",
            Verdict::Other(s) => s,
        }
    }
}

impl fmt::Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for Verdict {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn runtime_strings_roundtrip() {
        for r in Runtime::all() {
            assert_eq!(Runtime::from_str(r.as_str()).unwrap(), *r);
            let json = serde_json::to_string(r).unwrap();
            assert_eq!(json, format!("\"{}\"", r.as_str()));
        }
        assert!(Runtime::from_str("python3.12").is_err());
    }

    #[test]
    fn runtime_extensions_and_handlers() {
        assert_eq!(Runtime::Python36.extension(), "py");
        assert_eq!(Runtime::Nodejs43Edge.extension(), "js");
        assert_eq!(
            Runtime::Python27.handler("encryption-check"),
            "encryption-check.lambda_handler"
        );
        assert_eq!(Runtime::Nodejs610.handler("r"), "r.handler");
    }

    #[test]
    fn frequency_serializes_with_underscores() {
        let json = serde_json::to_string(&Frequency::TwentyFourHours).unwrap();
        assert_eq!(json, "\"TwentyFour_Hours\"");
        assert_eq!(Frequency::from_str("Six_Hours").unwrap(), Frequency::SixHours);
        assert!(Frequency::from_str("Weekly").is_err());
    }

    #[test]
    fn verdict_parse_trims_and_keeps_unknown() {
        assert_eq!(Verdict::parse("COMPLIANT\n"), Verdict::Compliant);
        assert_eq!(Verdict::parse("NON_COMPLIANT"), Verdict::NonCompliant);
        assert_eq!(
            Verdict::parse("maybe"),
            Verdict::Other("maybe".to_string())
        );
        assert_eq!(
            serde_json::to_string(&Verdict::NotApplicable).unwrap(),
            "\"NOT_APPLICABLE\""
        );
    }
}

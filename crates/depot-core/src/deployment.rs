use std::fmt;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DeploymentType {
    #[default]
    Full,
    Update,
    /// The prior version stays in place unless the install is forced.
    SideBySide,
    NotRecognized,
}

impl DeploymentType {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Full => "full",
            Self::Update => "update",
            Self::SideBySide => "side-by-side",
            Self::NotRecognized => "not-recognized",
        }
    }

    /// Token handed to package scripts.
    pub fn script_token(self) -> &'static str {
        match self {
            Self::Full => "Full",
            Self::Update => "Update",
            Self::SideBySide => "SideBySide",
            Self::NotRecognized => "NotRecognized",
        }
    }

    pub fn parse(input: &str) -> Self {
        match input.trim().to_ascii_lowercase().as_str() {
            "" | "full" => Self::Full,
            "update" => Self::Update,
            "side-by-side" | "sidebyside" | "sxs" => Self::SideBySide,
            _ => Self::NotRecognized,
        }
    }

    pub fn is_recognized(self) -> bool {
        self != Self::NotRecognized
    }

    pub fn is_side_by_side(self) -> bool {
        self == Self::SideBySide
    }
}

impl fmt::Display for DeploymentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Category {
    Technical,
    Informational,
}

/// Declared high to low so that `High < Medium < Low` sorts highest first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Impact {
    High,
    Medium,
    Low,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Recommendation {
    pub title: String,
    pub description: String,
    pub category: Category,
    pub impact: Impact,
    pub implementation_hint: String,
}

impl Recommendation {
    pub fn technical(
        title: impl Into<String>,
        description: impl Into<String>,
        impact: Impact,
        implementation_hint: impl Into<String>,
    ) -> Self {
        Self {
            title: title.into(),
            description: description.into(),
            category: Category::Technical,
            impact,
            implementation_hint: implementation_hint.into(),
        }
    }

    pub fn informational(
        title: impl Into<String>,
        description: impl Into<String>,
        implementation_hint: impl Into<String>,
    ) -> Self {
        Self {
            title: title.into(),
            description: description.into(),
            category: Category::Informational,
            impact: Impact::Low,
            implementation_hint: implementation_hint.into(),
        }
    }
}

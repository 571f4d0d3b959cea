//! Question and response types.

use serde::{Deserialize, Serialize};

use crate::clusters::ClusterId;

/// Display-ready form of a brand for one specific question.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BrandSnapshot {
    pub brand: String,
    pub price: i64,
    pub images: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum QuestionKind {
    /// One candidate shares the reference's cluster, the other comes from `test_cluster`.
    Contrast {
        verify_cluster: ClusterId,
        test_cluster: ClusterId,
    },
    /// Reference and candidates come from distinct clusters.
    Mixed { clusters: Vec<ClusterId> },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Question {
    pub kind: QuestionKind,
    pub reference: BrandSnapshot,
    pub candidate_a: BrandSnapshot,
    pub candidate_b: BrandSnapshot,
}

impl Question {
    pub fn candidate(&self, choice: Choice) -> &BrandSnapshot {
        match choice {
            Choice::A => &self.candidate_a,
            Choice::B => &self.candidate_b,
        }
    }

    pub fn brands(&self) -> [&str; 3] {
        [
            self.reference.brand.as_str(),
            self.candidate_a.brand.as_str(),
            self.candidate_b.brand.as_str(),
        ]
    }
}

/// Which candidate the respondent picked.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Choice {
    A,
    B,
}

impl Choice {
    pub fn other(self) -> Self {
        match self {
            Choice::A => Choice::B,
            Choice::B => Choice::A,
        }
    }
}

/// Column names of the persisted response table, in order.
pub const RESPONSE_HEADER: [&str; 4] = ["question", "reference", "selected", "other"];

/// One answered question.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Response {
    /// 1-based ordinal of the question within the survey.
    pub question: u32,
    pub reference: String,
    pub selected: String,
    pub other: String,
}

impl Response {
    pub fn from_choice(ordinal: u32, question: &Question, choice: Choice) -> Self {
        Self {
            question: ordinal,
            reference: question.reference.brand.clone(),
            selected: question.candidate(choice).brand.clone(),
            other: question.candidate(choice.other()).brand.clone(),
        }
    }

    pub fn to_row(&self) -> [String; 4] {
        [
            self.question.to_string(),
            self.reference.clone(),
            self.selected.clone(),
            self.other.clone(),
        ]
    }
}

//! Prompt construction for the narrative collaborator.

use serde::{Deserialize, Serialize};

use crate::error::{KessanError, Result};
use crate::ratios::BalanceSheetTotals;
use crate::types::ItemLabel;

/// System prompt sent with every request.
pub const SYSTEM_PROMPT: &str = "You are a highly knowledgeable finance chatbot. Your purpose is to \
provide accurate, insightful, and actionable financial advice to users, tailored to their specific \
needs and contexts.";

/// Order in which fields are listed in the prompt.
const PROMPT_FIELDS: [ItemLabel; 5] = [
    ItemLabel::CurrentLiabilities,
    ItemLabel::NoncurrentLiabilities,
    ItemLabel::CurrentAssets,
    ItemLabel::NoncurrentAssets,
    ItemLabel::NetAssets,
];

/// A chat-style request for a balance-sheet analysis.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct NarrativeRequest {
    /// System message.
    pub system: String,
    /// User message, embedding the figures.
    pub user: String,
    /// The figures alone.
    pub data: String,
}

impl NarrativeRequest {
    /// Builds a request from per-period figures.
    ///
    /// With both periods the figures are labelled "Prior:" and "Current:"; a
    /// single period is listed unlabelled.
    ///
    /// # Errors
    /// Returns [`KessanError::InvalidParameter`] when neither period is given.
    pub fn from_periods(
        prior: Option<&BalanceSheetTotals>,
        current: Option<&BalanceSheetTotals>,
    ) -> Result<Self> {
        let data = match (prior, current) {
            (Some(p), Some(c)) => format!("Prior: {}\nCurrent: {}", describe(p), describe(c)),
            (Some(only), None) | (None, Some(only)) => describe(only),
            (None, None) => {
                return Err(KessanError::InvalidParameter(
                    "No balance-sheet figures to analyze".to_string(),
                ));
            }
        };

        Ok(Self {
            system: SYSTEM_PROMPT.to_string(),
            user: format!("Analyze this company's balance sheet: {data}"),
            data,
        })
    }
}

/// "CurrentLiabilities: 1, NoncurrentLiabilities: 2, ..."
fn describe(totals: &BalanceSheetTotals) -> String {
    PROMPT_FIELDS
        .iter()
        .map(|label| format!("{}: {}", label.field_name(), totals.get(*label)))
        .collect::<Vec<_>>()
        .join(", ")
}

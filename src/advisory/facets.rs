//! Facet decomposition of a transaction for the advisory evaluators.
//!
//! Each facet renders only the attributes relevant to its concern, together
//! with the checklist the evaluator is asked to walk through.

use crate::advisory::Opinion;
use crate::types::transaction::Transaction;

/// Aspect of a transaction judged by one evaluator
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Facet {
    Amount,
    Behavior,
    Location,
}

impl Facet {
    /// Facets in the order they are deliberated
    pub const ALL: [Facet; 3] = [Facet::Amount, Facet::Behavior, Facet::Location];

    /// Vote key reported in `Prediction::agent_votes`
    pub fn agent_name(&self) -> &'static str {
        match self {
            Facet::Amount => "amount_agent",
            Facet::Behavior => "behavior_agent",
            Facet::Location => "location_agent",
        }
    }

    pub fn role(&self) -> &'static str {
        match self {
            Facet::Amount => "amount analysis specialist",
            Facet::Behavior => "behavioral analysis specialist",
            Facet::Location => "location analysis specialist",
        }
    }

    pub fn checks(&self) -> &'static [&'static str] {
        match self {
            Facet::Amount => &[
                "unusually high amounts",
                "round number patterns",
                "amounts that do not fit the transaction type",
            ],
            Facet::Behavior => &[
                "unusual transaction timing",
                "frequency patterns",
                "transaction type patterns",
            ],
            Facet::Location => &[
                "unusual locations",
                "high-risk merchants",
                "geographic inconsistencies",
            ],
        }
    }

    /// Attributes of `tx` this facet looks at, one per line
    pub fn context(&self, tx: &Transaction) -> String {
        match self {
            Facet::Amount => format!(
                "Amount: ${:.2}\nTransaction type: {}\nUser ID: {}",
                tx.amount, tx.transaction_type, tx.user_id
            ),
            Facet::Behavior => format!(
                "User ID: {}\nTransaction type: {}\nTime: {}",
                tx.user_id,
                tx.transaction_type,
                tx.timestamp.to_rfc3339()
            ),
            Facet::Location => format!(
                "Location: {}\nMerchant: {}\nUser ID: {}",
                tx.location_or_unknown(),
                tx.merchant_or_unknown(),
                tx.user_id
            ),
        }
    }

    pub fn prompt(&self, tx: &Transaction) -> String {
        let checks: String = self
            .checks()
            .iter()
            .map(|check| format!("- {}\n", check))
            .collect();

        format!(
            "You are a {role} on a payment fraud review panel.\n\n\
             {context}\n\n\
             Look for:\n{checks}\n\
             Start your answer with SUSPICIOUS or NORMAL, then give your reasoning.",
            role = self.role(),
            context = self.context(tx),
            checks = checks,
        )
    }
}

/// Prompt for the final judgment over all facet opinions
pub fn judgment_prompt(tx: &Transaction, opinions: &[Opinion]) -> String {
    let findings: String = opinions
        .iter()
        .map(|opinion| format!("[{}]\n{}\n\n", opinion.evaluator, opinion.text.trim()))
        .collect();

    format!(
        "You coordinate a payment fraud review panel and make the final call.\n\n\
         Transaction {id}: ${amount:.2} {tx_type} by {user} at {merchant} ({location}).\n\n\
         Panel findings:\n{findings}\
         Give a final verdict of FRAUD or LEGITIMATE, a confidence between 0 and 1, \
         and list the key risk factors.",
        id = tx.transaction_id,
        amount = tx.amount,
        tx_type = tx.transaction_type,
        user = tx.user_id,
        merchant = tx.merchant_or_unknown(),
        location = tx.location_or_unknown(),
        findings = findings,
    )
}

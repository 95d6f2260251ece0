//! Assembles the message sequence sent to the completion backend.

use chrono::Utc;
use parley_types::{ChatMessage, CustomerRecord, EmotionTags, Role, Turn};

/// Standing behavioral guidelines for the agent. Prompt wording is
/// illustrative; deployments tune it to their business.
const GUIDELINES: &str = "\
You are an empathetic and professional customer service assistant. Your role is to:

1. ALWAYS remain calm and professional, especially with angry or frustrated customers
2. Handle interruptions gracefully and maintain conversation flow
3. De-escalate tense situations by acknowledging the customer's feelings
4. Provide accurate information based only on the company data below

Key guidelines:
- If a customer is angry: acknowledge their frustration, apologize sincerely, focus on solutions
- If a customer uses abusive language: remain professional, redirect to problem-solving
- If a customer interrupts: acknowledge new points while returning to important information
- Use natural, conversational language while maintaining professionalism
- If unsure about any information, be honest and offer to find out";

/// Extra instruction appended when the caller reads as angry or shouting.
const DEESCALATION_LINE: &str =
    "The caller sounds upset. Lead with a sincere apology and keep your reply calm and brief.";

/// Extra instruction appended when the caller signals urgency.
const URGENCY_LINE: &str =
    "The caller has indicated urgency. Address their request directly before anything else.";

/// Builds the bounded message list for one turn.
#[derive(Debug, Clone, Copy, Default)]
pub struct PromptComposer;

impl PromptComposer {
    /// Produces the system message, the buffered session turns in order, and
    /// the new user turn.
    ///
    /// The system message always carries the full reference text and the
    /// full customer summary: the turn-history cap never truncates it.
    /// Deterministic given identical inputs aside from the embedded
    /// timestamp line.
    pub fn compose(
        &self,
        reference: &str,
        customer: Option<&CustomerRecord>,
        session_turns: &[Turn],
        tags: &EmotionTags,
        input: &str,
    ) -> Vec<ChatMessage> {
        let mut system = String::from(GUIDELINES);

        if !reference.is_empty() {
            system.push_str("\n\nCompany data:\n");
            system.push_str(reference);
        }

        if let Some(customer) = customer {
            system.push_str(&format!(
                "\n\nCustomer history: {} prior interaction(s), first seen {}.",
                customer.interaction_count,
                customer.first_seen.format("%Y-%m-%d")
            ));
            if !customer.summaries.is_empty() {
                system.push_str("\nRecent exchanges:");
                for summary in &customer.summaries {
                    system.push_str("\n- ");
                    system.push_str(summary);
                }
            }
        }

        if tags.is_angry || tags.is_shouting {
            system.push_str("\n\n");
            system.push_str(DEESCALATION_LINE);
        }
        if tags.is_urgent {
            system.push_str("\n\n");
            system.push_str(URGENCY_LINE);
        }

        system.push_str(&format!(
            "\n\nCurrent time (UTC): {}",
            Utc::now().format("%Y-%m-%d %H:%M:%S")
        ));

        let mut messages = Vec::with_capacity(session_turns.len() + 2);
        messages.push(ChatMessage::new(Role::System.as_str(), system));
        messages.extend(session_turns.iter().map(ChatMessage::from));
        messages.push(ChatMessage::new(Role::User.as_str(), input));
        messages
    }
}

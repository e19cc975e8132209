//! Prompt assembly for the generation backend.
//!
//! Builds the (system, user) prompt pair from retrieved matches, a bounded
//! slice of conversation history, and the current question. History is hard
//! capped at the last [`HISTORY_LIMIT`] turns so prompts cannot grow without
//! bound over a long conversation; older turns are dropped, not summarized.

use crate::models::{ConversationTurn, SourceMatch};

/// Maximum prior turns included in the prompt, most recent last.
pub const HISTORY_LIMIT: usize = 6;

/// Delimiter between context blocks in the user prompt.
const CONTEXT_DELIMITER: &str = "\n\n---\n\n";

const SYSTEM_PROMPT: &str = "You are a helpful AI assistant that answers questions based on the provided document context.

Rules:
1. Only answer based on the provided context
2. If the context doesn't contain enough information, say so clearly
3. Be concise but thorough
4. When referencing information, mention which document it came from
5. If asked about something not in the documents, politely explain you can only answer about the uploaded documents";

/// Assemble the system and user prompts for a question.
pub fn build(
    query: &str,
    matches: &[SourceMatch],
    history: &[ConversationTurn],
) -> (String, String) {
    let context = matches
        .iter()
        .map(|m| {
            format!(
                "From '{}' (relevance: {:.0}%):\n{}",
                m.document_name,
                m.relevance_score * 100.0,
                m.content
            )
        })
        .collect::<Vec<_>>()
        .join(CONTEXT_DELIMITER);

    let mut history_block = String::new();
    if !history.is_empty() {
        history_block.push_str("\n\nPrevious conversation:\n");
        let skip = history.len().saturating_sub(HISTORY_LIMIT);
        for turn in &history[skip..] {
            history_block.push_str(turn.role.label());
            history_block.push_str(": ");
            history_block.push_str(&turn.content);
            history_block.push('\n');
        }
    }

    let user_prompt = format!(
        "Context from documents:\n{}\n{}\nCurrent question: {}\n\nPlease provide a helpful answer based on the document context above.",
        context, history_block, query
    );

    (SYSTEM_PROMPT.to_string(), user_prompt)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Role;

    fn source(name: &str, content: &str, score: f32) -> SourceMatch {
        SourceMatch {
            content: content.to_string(),
            document_id: "doc_a".to_string(),
            document_name: name.to_string(),
            chunk_index: 0,
            relevance_score: score,
        }
    }

    #[test]
    fn system_prompt_states_the_rules() {
        let (system, _) = build("q", &[], &[]);
        assert!(system.contains("Only answer based on the provided context"));
        assert!(system.contains("mention which document it came from"));
        assert!(system.contains("politely explain"));
    }

    #[test]
    fn user_prompt_contains_context_in_match_order() {
        let matches = vec![
            source("alpha.txt", "first block", 0.91),
            source("beta.pdf", "second block", 0.42),
        ];
        let (_, user) = build("what is this?", &matches, &[]);

        let first = user.find("From 'alpha.txt' (relevance: 91%):\nfirst block").unwrap();
        let second = user.find("From 'beta.pdf' (relevance: 42%):\nsecond block").unwrap();
        assert!(first < second);
        assert!(user.contains("\n\n---\n\n"));
        assert!(user.contains("Current question: what is this?"));
    }

    #[test]
    fn history_is_capped_at_last_six_turns() {
        let history: Vec<ConversationTurn> = (0..8)
            .map(|i| {
                let role = if i % 2 == 0 { Role::User } else { Role::Assistant };
                ConversationTurn::new(role, format!("turn {}", i))
            })
            .collect();

        let (_, user) = build("q", &[], &history);

        assert!(!user.contains("turn 0"));
        assert!(!user.contains("turn 1"));
        for i in 2..8 {
            assert!(user.contains(&format!("turn {}", i)), "missing turn {}", i);
        }

        // Relative order of surviving turns is preserved
        let positions: Vec<usize> = (2..8)
            .map(|i| user.find(&format!("turn {}", i)).unwrap())
            .collect();
        assert!(positions.windows(2).all(|w| w[0] < w[1]));
    }

    #[test]
    fn empty_history_omits_the_history_block() {
        let (_, user) = build("q", &[], &[]);
        assert!(!user.contains("Previous conversation:"));
    }

    #[test]
    fn turns_are_role_labeled() {
        let history = vec![
            ConversationTurn::new(Role::User, "hello"),
            ConversationTurn::new(Role::Assistant, "hi there"),
        ];
        let (_, user) = build("q", &[], &history);
        assert!(user.contains("User: hello\n"));
        assert!(user.contains("Assistant: hi there\n"));
    }
}

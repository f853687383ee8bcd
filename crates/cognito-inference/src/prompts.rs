//! System prompts and conversation formatting.

use cognito_core::{format_timestamp, Conversation, MessageRole};

/// System prompt for live journaling chat.
pub const CHAT_SYSTEM_PROMPT: &str = "You are a warm, attentive journaling companion. \
You help the user reflect on their thoughts, feelings and experiences through conversation.

Guidelines:
- Be supportive and never judgmental
- Ask gentle follow-up questions that invite deeper reflection
- Encourage self-discovery without lecturing
- Keep replies short but meaningful, usually two to four sentences
- When the user shares something hard, acknowledge the feeling before anything else
- Point out patterns or connections when they genuinely help
- Do not offer advice unless the user asks for it

This is the user's journal. Help them think; do not tell them what to think.";

/// System prompt for turning conversations into a journal entry.
pub const REFINE_SYSTEM_PROMPT: &str = "You turn one or more journaling conversations \
into a single coherent, well-written journal entry.

Guidelines:
- Write in the first person, from the user's point of view
- Capture the main themes, insights and emotions of the conversations
- Organize the content into clear paragraphs in a sensible order
- Use markdown (headings, bullet points) where it helps readability
- Keep the user's voice and their own insights
- Do not introduce ideas that were not in the conversations
- Be concise while still covering everything important
- Include any decisions or action items that came up

The result should read like a personal journal entry, not a transcript.";

/// Render conversations as the single user message sent for refinement.
///
/// ```text
/// ## Conversation 1
/// Started: 2024-12-30T08:00:00.000000Z
///
/// **User:** ...
///
/// **Assistant:** ...
///
/// ---
/// ```
pub fn format_conversations(conversations: &[Conversation]) -> String {
    let mut lines: Vec<String> = Vec::new();

    for (index, conversation) in conversations.iter().enumerate() {
        lines.push(format!("## Conversation {}", index + 1));
        lines.push(format!("Started: {}", format_timestamp(conversation.started_at)));
        lines.push(String::new());

        for message in &conversation.messages {
            let speaker = match message.role {
                MessageRole::User => "User",
                MessageRole::Assistant => "Assistant",
            };
            lines.push(format!("**{}:** {}", speaker, message.content));
            lines.push(String::new());
        }

        lines.push("---".to_string());
        lines.push(String::new());
    }

    lines.join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use cognito_core::{Message, PromptSource};

    fn conversation(messages: Vec<Message>) -> Conversation {
        let mut conv = Conversation::new(PromptSource::User);
        conv.started_at = Utc.with_ymd_and_hms(2024, 12, 30, 8, 0, 0).unwrap();
        conv.messages = messages;
        conv
    }

    #[test]
    fn test_format_single_conversation() {
        let text = format_conversations(&[conversation(vec![
            Message::user("Rough morning."),
            Message::assistant("What made it rough?"),
        ])]);

        let expected = "## Conversation 1\n\
                        Started: 2024-12-30T08:00:00.000000Z\n\
                        \n\
                        **User:** Rough morning.\n\
                        \n\
                        **Assistant:** What made it rough?\n\
                        \n\
                        ---\n";
        assert_eq!(text, expected);
    }

    #[test]
    fn test_format_numbers_conversations() {
        let text = format_conversations(&[
            conversation(vec![Message::user("one")]),
            conversation(vec![Message::user("two")]),
        ]);
        assert!(text.contains("## Conversation 1"));
        assert!(text.contains("## Conversation 2"));
        assert_eq!(text.matches("---").count(), 2);
    }

    #[test]
    fn test_format_empty() {
        assert_eq!(format_conversations(&[]), "");
    }
}

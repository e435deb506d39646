//! Prompt construction for SQL generation.

use crate::llm::ChatMessage;

/// System instructions for SQL generation
pub const SQL_SYSTEM_PROMPT: &str = "You translate questions about a hospital database into SQL. \
Answer with exactly one SQLite SELECT statement and nothing else: no explanation, no markdown. \
Only use the tables and columns listed in the schema. \
Never modify data.";

/// Messages for a first attempt at answering `question`
pub fn build_sql_messages(schema_context: &str, question: &str) -> Vec<ChatMessage> {
    vec![
        ChatMessage::system(SQL_SYSTEM_PROMPT),
        ChatMessage::user(format!(
            "Database schema:\n{}\n\nQuestion: {}\n\nSQL:",
            schema_context,
            question.trim()
        )),
    ]
}

/// Messages asking the model to fix a query that was rejected or failed
pub fn build_correction_messages(
    schema_context: &str,
    question: &str,
    failed_sql: &str,
    error: &str,
) -> Vec<ChatMessage> {
    let mut messages = build_sql_messages(schema_context, question);
    messages.push(ChatMessage::assistant(failed_sql));
    messages.push(ChatMessage::user(format!(
        "That query failed with this error:\n{}\n\nReply with a corrected SQLite SELECT statement only.",
        error
    )));
    messages
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::ChatRole;

    const SCHEMA: &str = "patient(patient_id INTEGER PRIMARY KEY, name TEXT NOT NULL)";

    #[test]
    fn test_build_sql_messages() {
        let messages = build_sql_messages(SCHEMA, "  How many patients are there?\n");

        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0].role, ChatRole::System);
        assert_eq!(messages[1].role, ChatRole::User);
        assert!(messages[1].content.contains(SCHEMA));
        assert!(messages[1]
            .content
            .contains("Question: How many patients are there?\n"));
        assert!(messages[1].content.ends_with("SQL:"));
    }

    #[test]
    fn test_build_correction_messages() {
        let messages = build_correction_messages(
            SCHEMA,
            "How many patients are there?",
            "SELECT COUNT(*) FROM patients",
            "no such table: patients",
        );

        assert_eq!(messages.len(), 4);
        assert_eq!(messages[2], ChatMessage::assistant("SELECT COUNT(*) FROM patients"));
        assert_eq!(messages[3].role, ChatRole::User);
        assert!(messages[3].content.contains("no such table: patients"));
    }
}

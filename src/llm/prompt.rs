//! Prompt templates
//!
//! Kept deliberately small. The classifier prompts pin down the exact answer
//! shapes that `classify::parse` understands.

use crate::stream::TAG_WORD;

/// Inputs for the main chat prompt
#[derive(Debug, Clone)]
pub struct ChatPrompt<'a> {
    pub assistant_name: &'a str,
    pub language: &'a str,
    pub context: &'a str,
    pub question: &'a str,
    /// Ask for a trailing in-band mood marker
    pub mood_tag: bool,
}

impl ChatPrompt<'_> {
    pub fn render(&self) -> String {
        let mut prompt = format!(
            "You are {name}, a positive, friendly and knowledgeable assistant. \
             Support and uplift the user, highlight the positive side and be kind \
             and encouraging. Answer concisely.\n\
             Reply in the language with ISO 639-1 code \"{lang}\".\n",
            name = self.assistant_name,
            lang = self.language,
        );

        if self.mood_tag {
            prompt.push_str(&format!(
                "At the very end of your answer add a tag for the user's emotional tone: \
                 \"0{tag}\" for happy, \"1{tag}\" for sad, \"2{tag}\" for neutral.\n",
                tag = TAG_WORD
            ));
        }

        prompt.push_str(&format!(
            "\nConversation history: {}\nUser message: {}\n\nYour reply:\n",
            self.context, self.question
        ));
        prompt
    }
}

pub fn mood(message: &str) -> String {
    format!(
        "Classify the mood of the following message. Answer with a single digit: \
         0 for happy, 1 for sad, 2 for neutral. Answer with the digit only.\n\n\
         Message: {}\n",
        message
    )
}

pub fn significance(message: &str) -> String {
    format!(
        "Decide whether the following message contains something about the user worth \
         remembering long term.\n\
         Answer exactly one of:\n\
         special: <short title>   for a milestone or cherished moment\n\
         yes                      for a lasting positive fact or preference\n\
         no                       for anything else\n\n\
         Message: {}\n",
        message
    )
}

pub fn fact(message: &str) -> String {
    format!(
        "Extract one fact about the user from the following message. Answer in exactly \
         three lines:\n\
         validity: true|false\n\
         type: <category such as name, food, place, hobby, person>\n\
         value: <the fact as a short sentence>\n\n\
         Message: {}\n",
        message
    )
}

/// Daily summary over a `User:`/`Assistant:` transcript
pub fn daily_summary(transcript: &str, previous: Option<&str>) -> String {
    let mut prompt = String::from(
        "Summarize today's conversation between the user and the assistant. \
         Write exactly two sections:\n\
         ### Summary\n<a short paragraph about the user's day and mood>\n\
         ### Tips\n- <tip>\n- <tip>\n- <tip>\n\n",
    );

    if let Some(previous) = previous.filter(|p| !p.trim().is_empty()) {
        prompt.push_str("Earlier summary for today, extend it:\n");
        prompt.push_str(previous);
        prompt.push_str("\n\n");
    }

    prompt.push_str("Conversation:\n");
    prompt.push_str(transcript);
    prompt.push('\n');
    prompt
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chat_prompt_includes_inputs() {
        let prompt = ChatPrompt {
            assistant_name: "GemmaTalk",
            language: "fr",
            context: "User name: Asha",
            question: "How was my week?",
            mood_tag: false,
        }
        .render();

        assert!(prompt.contains("You are GemmaTalk"));
        assert!(prompt.contains("\"fr\""));
        assert!(prompt.contains("User name: Asha"));
        assert!(prompt.contains("User message: How was my week?"));
        assert!(!prompt.contains(TAG_WORD));
    }

    #[test]
    fn test_chat_prompt_mood_tag() {
        let prompt = ChatPrompt {
            assistant_name: "GemmaTalk",
            language: "en",
            context: "",
            question: "hi",
            mood_tag: true,
        }
        .render();

        assert!(prompt.contains("\"1Macintosh\" for sad"));
    }

    #[test]
    fn test_summary_prompt_previous() {
        let without = daily_summary("User: hi", None);
        assert!(!without.contains("Earlier summary"));

        let with = daily_summary("User: hi", Some("A calm morning."));
        assert!(with.contains("Earlier summary for today"));
        assert!(with.contains("A calm morning."));
    }
}

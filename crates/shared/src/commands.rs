//! The fixed command surface: one entry per user-invokable action, with its
//! display metadata and built-in default prompt.
//!
//! A command's prompt can be replaced by dropping `<action id>.md` into the
//! configured prompt directory; the strings here are the fallbacks.

use crate::settings::Preferences;

pub const CMD_ASK: &str = "ask";
pub const CMD_CHAT: &str = "chat";
pub const CMD_COUNT_TOKENS: &str = "count-tokens";
pub const CMD_EXPLAIN: &str = "explain";
pub const CMD_FRIENDLY: &str = "friendly";
pub const CMD_GRAMMAR: &str = "grammar";
pub const CMD_HISTORY: &str = "history";
pub const CMD_LONGER: &str = "longer";
pub const CMD_PROFESSIONAL: &str = "professional";
pub const CMD_PROMPT_BUILDER: &str = "prompt-builder";
pub const CMD_REPHRASE: &str = "rephrase";
pub const CMD_SCR_EXPLAIN: &str = "screenshot-explain";
pub const CMD_SCR_MARKDOWN: &str = "screenshot-markdown";
pub const CMD_SCR_TRANSLATE: &str = "screenshot-translate";
pub const CMD_SHORTER: &str = "shorter";
pub const CMD_STATS: &str = "stats";
pub const CMD_SUMMARIZE: &str = "summarize";
pub const CMD_TRANSLATE: &str = "translate";

/// Commands whose responses are pinned to the user's primary language
/// instead of mirroring the query language.
pub const FIXED_LANGUAGE_ACTIONS: [&str; 6] = [
    CMD_ASK,
    CMD_EXPLAIN,
    CMD_PROMPT_BUILDER,
    CMD_SUMMARIZE,
    CMD_SCR_EXPLAIN,
    CMD_SCR_TRANSLATE,
];

/// Commands that never need a composed system prompt.
pub const UTILITY_ACTIONS: [&str; 3] = [CMD_COUNT_TOKENS, CMD_HISTORY, CMD_STATS];

#[derive(Debug, Clone, Copy)]
pub struct CommandSpec {
    pub id: &'static str,
    pub name: &'static str,
    pub description: &'static str,
    pub placeholder: &'static str,
}

static ALL_COMMANDS: [CommandSpec; 18] = [
    CommandSpec {
        id: CMD_ASK,
        name: "Ask AI",
        description: "Ask any question on any topic with expert-level responses.",
        placeholder: "Ask me any question",
    },
    CommandSpec {
        id: CMD_CHAT,
        name: "Chat Room",
        description: "Interactive chat with context memory across turns.",
        placeholder: "Start chatting with AI...",
    },
    CommandSpec {
        id: CMD_COUNT_TOKENS,
        name: "Count Tokens",
        description: "Count tokens in text or files for cost estimation.",
        placeholder: "Text to count",
    },
    CommandSpec {
        id: CMD_EXPLAIN,
        name: "Explain It",
        description: "Explain words, sentences, or concepts clearly and concisely.",
        placeholder: "Enter text to explain it",
    },
    CommandSpec {
        id: CMD_FRIENDLY,
        name: "Friendly Text Maker",
        description: "Make text warmer and more approachable, preserving the core message.",
        placeholder: "Enter text to make it warmer",
    },
    CommandSpec {
        id: CMD_GRAMMAR,
        name: "Fix Grammar",
        description: "Fix grammar, spelling, and punctuation for native-speaker readability.",
        placeholder: "Enter text to correct grammar",
    },
    CommandSpec {
        id: CMD_HISTORY,
        name: "History",
        description: "Show past requests with search and management.",
        placeholder: "",
    },
    CommandSpec {
        id: CMD_LONGER,
        name: "Longer Text Maker",
        description: "Expand text with substantial details while preserving core meaning.",
        placeholder: "Enter text to make it longer",
    },
    CommandSpec {
        id: CMD_PROFESSIONAL,
        name: "Professional Text Maker",
        description: "Rewrite text in a formal business tone, preserving the message.",
        placeholder: "Enter text to make it formal",
    },
    CommandSpec {
        id: CMD_PROMPT_BUILDER,
        name: "Prompt Builder",
        description: "Create or improve LLM prompts using prompt-engineering practice.",
        placeholder: "Enter any idea for new prompt",
    },
    CommandSpec {
        id: CMD_REPHRASE,
        name: "Rephrase It",
        description: "Rewrite text with different wording while preserving meaning and style.",
        placeholder: "Enter text to rephrase it",
    },
    CommandSpec {
        id: CMD_SCR_EXPLAIN,
        name: "Screenshot -> Explain",
        description: "Take a screenshot and analyze or describe its content.",
        placeholder: "Additional instructions if any",
    },
    CommandSpec {
        id: CMD_SCR_MARKDOWN,
        name: "Screenshot -> Markdown",
        description: "Take a screenshot and convert all visible text to GFM.",
        placeholder: "Additional instructions if any",
    },
    CommandSpec {
        id: CMD_SCR_TRANSLATE,
        name: "Screenshot -> Translate",
        description: "Take a screenshot and translate all visible text.",
        placeholder: "Additional instructions if any",
    },
    CommandSpec {
        id: CMD_SHORTER,
        name: "Shorter Text Maker",
        description: "Make text significantly shorter while keeping all key information.",
        placeholder: "Enter text to make it shorter",
    },
    CommandSpec {
        id: CMD_STATS,
        name: "Stats",
        description: "Usage statistics, costs, and insights across time periods.",
        placeholder: "",
    },
    CommandSpec {
        id: CMD_SUMMARIZE,
        name: "Summarize It",
        description: "Summarize text concisely, conveying main ideas and key points.",
        placeholder: "Enter text to summarize it",
    },
    CommandSpec {
        id: CMD_TRANSLATE,
        name: "Translator",
        description: "Translate between your configured primary and secondary languages.",
        placeholder: "Enter text to translate",
    },
];

pub fn all() -> &'static [CommandSpec] {
    &ALL_COMMANDS
}

pub fn get(action_id: &str) -> Option<&'static CommandSpec> {
    ALL_COMMANDS.iter().find(|c| c.id == action_id)
}

pub fn is_utility(action_id: &str) -> bool {
    UTILITY_ACTIONS.contains(&action_id)
}

pub fn is_fixed_language(action_id: &str) -> bool {
    FIXED_LANGUAGE_ACTIONS.contains(&action_id)
}

/// Built-in system prompt for a command, parameterized by the user's
/// language pair where the task needs it. Utility commands have none.
pub fn default_prompt(action_id: &str, prefs: &Preferences) -> Option<String> {
    let primary = prefs.primary_language_upper();
    let secondary = prefs.secondary_language_upper();

    let prompt = match action_id {
        CMD_ASK => "You are an expert assistant. Respond to the following user request strictly \
            according to the rules: start immediately with the core point, without introductory \
            phrases, repeating the request, or fluff. Structure the response with short \
            paragraphs and one-level lists, use precise terminology and standard capitalization. \
            If necessary, present different viewpoints objectively or request clarification. \
            ALWAYS return only the answer itself, without any explanations, greetings, or \
            unnecessary words."
            .to_string(),
        CMD_CHAT => "You are a helpful AI assistant engaging in a conversation. Provide clear, \
            accurate, and helpful responses. Maintain context from previous messages in the \
            conversation. Be concise but thorough, and ask clarifying questions when needed."
            .to_string(),
        CMD_EXPLAIN => "Explain the meanings of the provided word or sentence as accurately as \
            possible, briefly and structured, using lists only if truly necessary. Do not use \
            introductory phrases, greetings, or repeat the request. ALWAYS return ONLY the \
            explanation itself and nothing more."
            .to_string(),
        CMD_FRIENDLY => "Rewrite the following text to be significantly warmer, friendlier, and \
            just a bit positive, adopting a conversational tone and approachable language while \
            preserving the original core message and key information. ALWAYS return ONLY the \
            modified text and nothing else."
            .to_string(),
        CMD_GRAMMAR => format!(
            "You are a {primary} and {secondary} proofreader. Make the text flawless for a \
             native speaker: correct grammar, spelling, punctuation, and capitalization. You can \
             change words or word order for better readability, but without distorting the \
             meaning or completely rephrasing, while preserving the style and structure. ALWAYS \
             return ONLY the corrected text or the original if it is perfect."
        ),
        CMD_LONGER => "You are an expert in text expansion. Expand the provided text by adding \
            substantial yet concise details, examples, or explanations, ensuring the total \
            length does not exceed twice the original. Preserve the core meaning, tone, and \
            style, and avoid any irrelevant or false information. ALWAYS return ONLY the \
            expanded text itself, without any preamble."
            .to_string(),
        CMD_PROFESSIONAL => "Rephrase the following text in your own words, using a professional \
            and business tone while preserving the original core message and key information. \
            ALWAYS return ONLY the modified text and nothing else."
            .to_string(),
        CMD_PROMPT_BUILDER => "You are \"Prompt Generator\". Your task is to create or improve \
            an LLM prompt based on the user request that follows, applying prompt engineering \
            best practices. Your response must consist SOLELY of the generated or improved \
            prompt text, with no additional explanations, commentary, or greetings."
            .to_string(),
        CMD_REPHRASE => "You are a professional rephraser. Your sole task is to rephrase the \
            text provided by the user, using different words and sentence structures, ensuring \
            the original meaning, tone, and style are precisely preserved. Do not add any new \
            information or external knowledge. ALWAYS return ONLY the rephrased text, without \
            any preamble."
            .to_string(),
        CMD_SCR_EXPLAIN => "Process the upcoming image based on the user's text. Execute any \
            instructions provided; if none, describe the image in detail. If you use lists, \
            they should be single-level and non-nested. Respond ONLY with the direct result."
            .to_string(),
        CMD_SCR_MARKDOWN => "You are provided with an image (screenshot). Analyze the image and \
            extract all visible text, then convert it to GitHub Flavored Markdown, precisely \
            replicating the original structure: headings, lists, emphasis, code blocks, inline \
            code, blockquotes, horizontal rules, links, and tables. Ensure all text is \
            transferred accurately. Output only the resulting GFM, with no introductions, \
            explanations, or comments."
            .to_string(),
        CMD_SCR_TRANSLATE => format!(
            "Determine the language of the upcoming text. By default it's {secondary}. If \
             {primary}, return it unchanged. If not {primary}, translate it to {primary} with \
             absolute accuracy and natural phrasing. Preserve the original meaning, tone, \
             formatting, special characters, and letter case. Adapt punctuation to {primary} \
             norms and keep proper nouns and brands in original script unless a common \
             {primary} version exists. ALWAYS return ONLY the processed text."
        ),
        CMD_SHORTER => "You are a professional editor specializing in concise texts. Take the \
            following text and make it significantly shorter and more concise, while preserving \
            all the original meaning and key information. Do not add new ideas or information; \
            focus on removing redundant words, phrases, and sentences. ALWAYS present the \
            result ONLY as the final, shortened text."
            .to_string(),
        CMD_SUMMARIZE => "Summarize the following text very concisely (3-10 sentences; for very \
            long texts, up to 15 sentences and a list of key points), conveying only the main \
            ideas, facts, and conclusions. If the original text is already brief, return its \
            essence. Provide the response objectively and clearly, returning EXCLUSIVELY the \
            summary itself, without any explanations."
            .to_string(),
        CMD_TRANSLATE => format!(
            "Please translate the text ({primary} <> {secondary}), ensuring the meaning is \
             precisely preserved and the result sounds natural and clear to a native speaker. \
             To accomplish this, you may reorder words, but ONLY within their original \
             sentence. Please do not distort or simplify the content. If the following text is \
             in {primary} then translate it to {secondary}, otherwise translate the following \
             text to {primary}. ALWAYS ONLY return the translated text and nothing else."
        ),
        _ => return None,
    };

    Some(prompt)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lookup() {
        assert_eq!(get(CMD_TRANSLATE).unwrap().name, "Translator");
        assert!(get("no-such-command").is_none());
    }

    #[test]
    fn test_classification() {
        assert!(is_utility(CMD_HISTORY));
        assert!(is_utility(CMD_COUNT_TOKENS));
        assert!(!is_utility(CMD_ASK));
        assert!(is_fixed_language(CMD_ASK));
        assert!(is_fixed_language(CMD_SUMMARIZE));
        assert!(!is_fixed_language(CMD_TRANSLATE));
    }

    #[test]
    fn test_default_prompts_carry_language_pair() {
        let mut prefs = Preferences::default();
        prefs.primary_language = "Spanish".into();
        prefs.secondary_language = "English".into();

        let translate = default_prompt(CMD_TRANSLATE, &prefs).unwrap();
        assert!(translate.contains("SPANISH"));
        assert!(translate.contains("ENGLISH"));

        let grammar = default_prompt(CMD_GRAMMAR, &prefs).unwrap();
        assert!(grammar.contains("SPANISH and ENGLISH proofreader"));
    }

    #[test]
    fn test_utility_commands_have_no_prompt() {
        let prefs = Preferences::default();
        assert!(default_prompt(CMD_HISTORY, &prefs).is_none());
        assert!(default_prompt(CMD_STATS, &prefs).is_none());
        assert!(default_prompt(CMD_COUNT_TOKENS, &prefs).is_none());
    }

    #[test]
    fn test_every_non_utility_command_has_a_prompt() {
        let prefs = Preferences::default();
        for spec in all() {
            if !is_utility(spec.id) {
                assert!(
                    default_prompt(spec.id, &prefs).is_some(),
                    "missing default prompt for {}",
                    spec.id
                );
            }
        }
    }
}

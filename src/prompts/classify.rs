use crate::feedback::{Sentiment, Theme};

const SYSTEM_INSTRUCTION: &str = "You classify product feedback. Respond with a single JSON object and nothing else: no markdown, no explanation, no extra keys.";
const PREAMBLE: &str = "Classify the feedback between the delimiters.";
const OUTPUT_FORMAT: &str = "Respond with exactly:\n{\"sentiment\": \"<sentiment>\", \"theme\": \"<theme>\"}";
const DELIMITER: &str = "\"\"\"";

pub fn system_instruction() -> &'static str {
    SYSTEM_INSTRUCTION
}

/// Fixed preamble, the allowed values, then the content fenced by triple quotes.
pub fn build_classify_prompt(content: &str) -> String {
    let sentiments = Sentiment::ALL
        .iter()
        .map(|s| s.as_str())
        .collect::<Vec<_>>()
        .join(", ");
    let themes = Theme::ALL
        .iter()
        .map(|t| t.as_str())
        .collect::<Vec<_>>()
        .join(", ");

    format!(
        "{preamble}\n\nsentiment must be one of: {sentiments}\ntheme must be one of: {themes}\n\n{output_format}\n\nFeedback:\n{delim}\n{content}\n{delim}\n",
        preamble = PREAMBLE,
        sentiments = sentiments,
        themes = themes,
        output_format = OUTPUT_FORMAT,
        delim = DELIMITER,
        content = content,
    )
}

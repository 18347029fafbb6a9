//! Instruction text sent alongside each task.

use crate::schema::SchemaContext;

const OCR_INSTRUCTIONS: &str = "\
Read the exam question in this screenshot. Transcribe the question and every \
answer option exactly as written, keeping option letters. Ignore browser \
chrome, navigation and unrelated UI. If the image contains no question, set \
hasText to false and leave text empty.";

const SOLVE_INSTRUCTIONS: &str = "\
Solve the following question. Work through it carefully, then report the \
letter(s) of every correct option. Set solved to false if you cannot reach a \
definite answer rather than guessing.";

const TURBO_INSTRUCTIONS: &str = "\
Read the exam question in this screenshot and solve it directly. Report the \
letter(s) of every correct option. Set solved to false if the image holds no \
question or you cannot reach a definite answer.";

const TITLE_INSTRUCTIONS: &str = "\
Write a short title, at most six words, that identifies this question in a \
history list. Do not answer it.";

fn with_tag_hint(mut prompt: String, context: &SchemaContext) -> String {
    if let Some(hint) = context.tag_hint() {
        prompt.push_str("\n\nSubjects used so far: ");
        prompt.push_str(&hint);
        prompt.push('.');
    }
    prompt
}

pub fn ocr_prompt() -> String {
    OCR_INSTRUCTIONS.to_string()
}

pub fn solve_prompt(question: &str, context: &SchemaContext) -> String {
    let prompt = format!("{SOLVE_INSTRUCTIONS}\n\nQuestion:\n{}", question.trim());
    with_tag_hint(prompt, context)
}

pub fn turbo_prompt(context: &SchemaContext) -> String {
    with_tag_hint(TURBO_INSTRUCTIONS.to_string(), context)
}

pub fn title_prompt(question: &str) -> String {
    format!("{TITLE_INSTRUCTIONS}\n\nQuestion:\n{}", question.trim())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn solve_prompt_embeds_question_and_tags() {
        let ctx = SchemaContext::from_tags(["Chemistry"]);
        let prompt = solve_prompt("  What is H2O?\nA) water ", &ctx);
        assert!(prompt.contains("Question:\nWhat is H2O?\nA) water"));
        assert!(prompt.ends_with("Subjects used so far: Chemistry."));
    }

    #[test]
    fn no_tag_line_without_tags() {
        assert!(!turbo_prompt(&SchemaContext::default()).contains("Subjects"));
    }
}

//! Prompt text sent with analysis requests.

use assetlens_core::{DocumentRecord, Role};

/// Prompt the pipeline attaches to every frame.
pub const FRAME_PROMPT: &str = "Please analyze this machine or equipment and provide: \
1) Type and model identification 2) Safety assessment 3) Condition evaluation \
4) Environmental impact analysis";

/// Used when an image arrives without a prompt.
pub const DEFAULT_IMAGE_PROMPT: &str = "Please analyze this equipment in detail and provide:
1) Type and model identification - Include specific details about make, model, and key specifications
2) Safety assessment - Evaluate current safety status, potential risks, and recommended safety measures
3) Condition evaluation - Assess current operational state, wear patterns, and maintenance needs
4) Environmental impact analysis - Consider energy efficiency, emissions, and sustainability aspects
5) Optimization recommendations - Suggest improvements for performance, efficiency, and longevity
Please be specific and detailed in your analysis, providing actionable insights and recommendations.";

const TEXT_FRAMING: &str = "You are an expert industrial equipment analyst. Please provide detailed, \
technical, yet understandable responses to questions about equipment maintenance, optimization, \
and troubleshooting. Consider safety implications, efficiency improvements, and best practices \
in your response.";

const VOICE_HINT: &str = "The question was spoken aloud and the answer will be read back, \
so keep it conversational and avoid tables or markup.";

/// Wrap a free-text question in the analyst framing.
pub fn text_prompt(question: &str, is_voice: bool) -> String {
    if is_voice {
        format!("{TEXT_FRAMING} {VOICE_HINT} Here is the user's question: {question}")
    } else {
        format!("{TEXT_FRAMING} Here is the user's question: {question}")
    }
}

/// System context describing the machine's documentation, if any.
pub fn documentation_context(machine_id: &str, docs: &[DocumentRecord]) -> Option<String> {
    if docs.is_empty() {
        return None;
    }
    let mut out = format!(
        "Reference documentation for machine {machine_id}. Prefer it over general knowledge when they disagree.\n"
    );
    for doc in docs {
        out.push_str(&format!("\n## {} ({})\n{}\n", doc.title, doc.document_type, doc.content.trim()));
    }
    Some(out)
}

/// Gemini role name for a turn.
pub fn gemini_role(role: Role) -> &'static str {
    match role {
        Role::User => "user",
        Role::Assistant => "model",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn frame_prompt_asks_for_four_sections() {
        for marker in ["1)", "2)", "3)", "4)"] {
            assert!(FRAME_PROMPT.contains(marker));
        }
        assert!(!FRAME_PROMPT.contains("5)"));
    }

    #[test]
    fn no_docs_no_context() {
        assert!(documentation_context("lathe-7", &[]).is_none());
    }

    #[test]
    fn docs_are_listed_with_type() {
        let docs = vec![DocumentRecord {
            title: "Lathe manual".into(),
            content: "  Max spindle speed 2000 rpm  ".into(),
            document_type: "manual".into(),
        }];
        let ctx = documentation_context("lathe-7", &docs).unwrap();
        assert!(ctx.contains("machine lathe-7"));
        assert!(ctx.contains("## Lathe manual (manual)\nMax spindle speed 2000 rpm\n"));
    }

    #[test]
    fn voice_prompt_adds_hint() {
        assert!(text_prompt("why is it loud?", true).contains("read back"));
        assert!(!text_prompt("why is it loud?", false).contains("read back"));
    }
}

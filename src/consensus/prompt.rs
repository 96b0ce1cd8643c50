use std::fmt::Write;

use crate::providers::ModelSpec;

/// Placeholder embedded in the synthesis prompt when the conversation
/// contains no user-authored message.
pub const UNKNOWN_QUERY: &str = "Unknown query";

/// A successful participant response, tagged with its model identity.
#[derive(Debug, Clone)]
pub struct ModelResponse {
    pub spec: ModelSpec,
    pub content: String,
}

/// Build the merge prompt handed to the synthesizer model.
///
/// The prompt delimits the original query from the per-model responses with
/// `<user_query>` and `<model name="provider:model">` sections, preserving
/// the caller's model order, and instructs the synthesizer to produce one
/// cohesive answer rather than a per-model transcript.
pub fn build_synthesis_prompt(user_query: &str, responses: &[ModelResponse]) -> String {
    let mut sections = String::new();
    for response in responses {
        let _ = writeln!(
            sections,
            "<model name=\"{}\">\n{}\n</model>\n",
            response.spec, response.content
        );
    }

    format!(
        "You are synthesizing responses from multiple AI models to provide the best possible answer to the user's query.\n\
         \n\
         <user_query>\n\
         {user_query}\n\
         </user_query>\n\
         \n\
         <model_responses>\n\
         {sections}\
         </model_responses>\n\
         \n\
         Your task: Deliver the BEST answer to the CURRENT user query (shown above in the <user_query> tags) by synthesizing the model responses above.\n\
         \n\
         Guidelines:\n\
         - Write as ONE cohesive expert response, not \"Model X says... Model Y says...\"\n\
         - Eliminate redundancy - if models agree on something, state it once\n\
         - Only mention a specific model when it provided an insight that was truly unique to that one model\n\
         - Use model mentions conservatively - if there are many unique insights, only highlight the most valuable ones\n\
         - Use short names when referring to models (e.g., \"GPT-4o\", \"Claude\", \"Gemini\")\n\
         - Be concise and actionable - avoid lengthy preambles, excessive explanations, or filler text\n\
         - Your response should generally not be significantly longer than the longest individual model response\n\
         - Use clear structure (bullets, headings) when presenting multiple points\n\
         \n\
         Provide your synthesized response now."
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn response(provider: &str, model: &str, content: &str) -> ModelResponse {
        ModelResponse {
            spec: ModelSpec {
                provider: provider.to_string(),
                model: model.to_string(),
            },
            content: content.to_string(),
        }
    }

    #[test]
    fn prompt_embeds_query_verbatim() {
        let prompt = build_synthesis_prompt(
            "Summarize the plan",
            &[response("openai", "gpt-x", "A")],
        );
        let query_section = prompt
            .split("<user_query>")
            .nth(1)
            .and_then(|rest| rest.split("</user_query>").next())
            .unwrap();
        assert_eq!(query_section.trim(), "Summarize the plan");
    }

    #[test]
    fn prompt_contains_one_tagged_section_per_response_in_order() {
        let prompt = build_synthesis_prompt(
            "Summarize the plan",
            &[
                response("openai", "gpt-x", "A"),
                response("anthropic", "claude-y", "B"),
            ],
        );

        assert_eq!(prompt.matches("<model name=").count(), 2);
        let first = prompt.find("<model name=\"openai:gpt-x\">").unwrap();
        let second = prompt.find("<model name=\"anthropic:claude-y\">").unwrap();
        assert!(first < second);
        assert!(prompt.contains("\nA\n"));
        assert!(prompt.contains("\nB\n"));
    }

    #[test]
    fn prompt_keeps_required_instruction_structure() {
        let prompt = build_synthesis_prompt("q", &[response("openai", "gpt-x", "A")]);
        assert!(prompt.contains("ONE cohesive"));
        assert!(prompt.contains("redundancy"));
        assert!(prompt.contains("short names"));
        assert!(prompt.contains("not be significantly longer"));
        assert!(prompt.contains("bullets, headings"));
    }

    #[test]
    fn prompt_is_deterministic() {
        let responses = [
            response("openai", "gpt-x", "alpha"),
            response("google", "gemini-z", "beta"),
        ];
        let a = build_synthesis_prompt("q", &responses);
        let b = build_synthesis_prompt("q", &responses);
        assert_eq!(a, b);
    }
}

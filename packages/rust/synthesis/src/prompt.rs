//! Fixed-shape prompt for the table description request.

/// System role sent with every request.
pub const SYSTEM_PROMPT: &str = "You are an assistant specialized in corporate data governance.";

/// Maximum documentation characters included in the prompt.
pub const MAX_DOCUMENTATION_CHARS: usize = 12_000;

const INSTRUCTIONS: &str = "\
- Start with \"Filled in with AI\"
- 2 sections: Table description and Business context
- Focus on product/business - do NOT describe columns
- Use technical language suited to data governance
- Be comprehensive and describe the products, services or financial instruments identified in the table";

/// Build the user prompt from the three evidence sections.
pub fn build_prompt(metadata: &str, sample: &str, documentation: &str) -> String {
    let documentation = truncate_content(documentation, MAX_DOCUMENTATION_CHARS);
    format!(
        "Analyze this table for the corporate data catalog:\n\n\
         **METADATA:**\n{metadata}\n\n\
         **SAMPLE:**\n{sample}\n\n\
         **DOCUMENTATION:**\n{documentation}\n\n\
         **INSTRUCTIONS:**\n{INSTRUCTIONS}\n"
    )
}

/// Cut `content` to at most `max_chars` characters, marking the cut.
pub fn truncate_content(content: &str, max_chars: usize) -> String {
    match content.char_indices().nth(max_chars) {
        None => content.to_string(),
        Some((byte_end, _)) => {
            format!("{}\n\n[... documentation truncated ...]", &content[..byte_end])
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sections_appear_in_order() {
        let prompt = build_prompt("name: orders", "id\n 1", "");
        let meta = prompt.find("**METADATA:**").unwrap();
        let sample = prompt.find("**SAMPLE:**").unwrap();
        let docs = prompt.find("**DOCUMENTATION:**").unwrap();
        let instr = prompt.find("**INSTRUCTIONS:**").unwrap();
        assert!(meta < sample && sample < docs && docs < instr);
        assert!(prompt.contains("name: orders"));
    }

    #[test]
    fn truncate_short_content() {
        assert_eq!(truncate_content("short text", 100), "short text");
    }

    #[test]
    fn truncate_long_content() {
        let result = truncate_content(&"a".repeat(200), 100);
        assert!(result.starts_with(&"a".repeat(100)));
        assert!(!result.starts_with(&"a".repeat(101)));
        assert!(result.contains("truncated"));
    }

    #[test]
    fn truncate_respects_char_boundaries() {
        let result = truncate_content(&"é".repeat(20), 10);
        assert!(result.starts_with(&"é".repeat(10)));
    }

    #[test]
    fn long_documentation_is_capped() {
        let prompt = build_prompt("", "", &"x".repeat(MAX_DOCUMENTATION_CHARS + 500));
        assert!(prompt.contains(&"x".repeat(MAX_DOCUMENTATION_CHARS)));
        assert!(!prompt.contains(&"x".repeat(MAX_DOCUMENTATION_CHARS + 1)));
    }
}

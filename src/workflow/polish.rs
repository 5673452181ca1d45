//! Polish-stage prompt construction.

/// Template used when no `polish_prompt` is configured.
pub const DEFAULT_POLISH_PROMPT: &str = r#"Polish this changelog entry. The diff is provided for verification only.

CHANGELOG:
{draft}

DIFF (for verification):
{diff}

Rules:
1. Keep EXACTLY the same number of items - do NOT add or remove any
2. Only reword the existing text
3. Avoid "we", "we've", "our"
4. Use active voice: "Updated X", "Fixed Y"
5. Keep it concise

Output only the polished changelog with the SAME items."#;

const DRAFT_PLACEHOLDER: &str = "{draft}";
const DIFF_PLACEHOLDER: &str = "{diff}";

/// Render the polish prompt.
///
/// A blank `template` selects [`DEFAULT_POLISH_PROMPT`]. Custom templates
/// that forget `{draft}` get the draft appended so it always reaches the model.
pub fn build_polish_prompt(template: &str, draft: &str, diff: &str) -> String {
    let template = if template.trim().is_empty() {
        DEFAULT_POLISH_PROMPT
    } else {
        template
    };

    let mut prompt = String::with_capacity(template.len() + draft.len() + diff.len());
    let mut rest = template;
    let mut saw_draft = false;

    // Single pass, so placeholders inside the draft or diff stay literal.
    while let Some(pos) = rest.find('{') {
        prompt.push_str(&rest[..pos]);
        let candidate = &rest[pos..];
        if let Some(after) = candidate.strip_prefix(DRAFT_PLACEHOLDER) {
            prompt.push_str(draft);
            saw_draft = true;
            rest = after;
        } else if let Some(after) = candidate.strip_prefix(DIFF_PLACEHOLDER) {
            prompt.push_str(diff);
            rest = after;
        } else {
            prompt.push('{');
            rest = &candidate[1..];
        }
    }
    prompt.push_str(rest);

    if !saw_draft {
        prompt.push_str("\n\nCHANGELOG:\n");
        prompt.push_str(draft);
    }
    prompt
}

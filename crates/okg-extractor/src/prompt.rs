//! Extraction prompt construction

const EXTRACTION_TEMPLATE: &str = include_str!("prompts/extraction.txt");

/// Build the extraction prompt for one chunk.
///
/// Pure and deterministic: identical inputs give byte-identical output.
/// Vocabulary lists are joined with `", "` in the order given.
pub fn build_prompt(
    chunk: &str,
    class_names: &[String],
    property_names: &[String],
    namespace: &str,
) -> String {
    let classes = class_names.join(", ");
    let properties = property_names.join(", ");

    render(
        EXTRACTION_TEMPLATE,
        &[
            ("namespace", namespace),
            ("classes", classes.as_str()),
            ("properties", properties.as_str()),
            ("chunk", chunk),
        ],
    )
}

/// Single-pass `{name}` substitution; substituted values are never rescanned.
fn render(template: &str, vars: &[(&str, &str)]) -> String {
    let mut out = String::with_capacity(template.len() + 256);
    let mut rest = template;

    while let Some(open) = rest.find('{') {
        out.push_str(&rest[..open]);
        let after = &rest[open + 1..];

        let value = after.find('}').and_then(|close| {
            let name = &after[..close];
            vars.iter()
                .find(|(key, _)| *key == name)
                .map(|(_, value)| (*value, close))
        });

        match value {
            Some((value, close)) => {
                out.push_str(value);
                rest = &after[close + 1..];
            }
            None => {
                out.push('{');
                rest = after;
            }
        }
    }

    out.push_str(rest);
    out
}

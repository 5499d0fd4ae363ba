/// Convert a contract name into a lower-camel-case identifier.
///
/// The name is split on `_`, `-` and whitespace. The first token has its initial
/// letter lower-cased, every following token has its initial letter upper-cased,
/// and the rest of each token is kept as is. Input made only of separators (or
/// empty input) yields an empty string.
pub fn camel_case(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    let tokens = name.split(|c: char| c == '_' || c == '-' || c.is_whitespace());
    for token in tokens.filter(|t| !t.is_empty()) {
        let mut chars = token.chars();
        if let Some(first) = chars.next() {
            if out.is_empty() {
                out.extend(first.to_lowercase());
            } else {
                out.extend(first.to_uppercase());
            }
            out.push_str(chars.as_str());
        }
    }
    out
}

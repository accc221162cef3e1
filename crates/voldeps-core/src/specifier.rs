use sha2::{Digest, Sha256};

/// Comparison operators that separate a package name from its version constraint.
pub const VERSION_OPERATORS: [&str; 7] = ["==", ">=", "<=", "!=", "~=", ">", "<"];

/// Returns the bare package name of a specifier such as `numpy==1.26`.
///
/// The name ends at the first occurrence of any operator in
/// [`VERSION_OPERATORS`]; a specifier without an operator is its own name.
pub fn bare_name(specifier: &str) -> &str {
    let cut = VERSION_OPERATORS
        .iter()
        .filter_map(|operator| specifier.find(operator))
        .min()
        .unwrap_or(specifier.len());
    specifier[..cut].trim()
}

/// Order-independent SHA-256 fingerprint of a specifier set.
pub fn specifier_fingerprint<'a, I>(specifiers: I) -> String
where
    I: IntoIterator<Item = &'a str>,
{
    let mut sorted: Vec<&str> = specifiers.into_iter().collect();
    sorted.sort_unstable();
    sorted.dedup();

    let mut hasher = Sha256::new();
    hasher.update(sorted.join("\n").as_bytes());
    hex::encode(hasher.finalize())
}

//! PU-005: Deterministic logical ID generation.
//!
//! A logical ID is a sanitized, length-bounded rendering of the full source
//! address, plus a short BLAKE3 checksum of the original text. The checksum
//! keeps IDs distinct when two addresses collapse to the same sanitized
//! prefix, so uniqueness needs no post-hoc collision check.

/// Maximum length of the sanitized human-readable part.
pub const HUMAN_PART_MAX: usize = 247;

/// Hex characters of the checksum suffix.
pub const CHECKSUM_LEN: usize = 8;

/// Generate the logical ID for a fully qualified source address.
///
/// `module.app.aws_lambda_function.f` → `ModuleAppAwsLambdaFunctionF` + 8 hex
/// checksum chars; total length never exceeds 255.
pub fn logical_id(address: &str) -> String {
    let mut human = String::with_capacity(address.len());
    let mut uppercase_next = true;
    for c in address.chars() {
        if c.is_ascii_alphanumeric() {
            if uppercase_next {
                human.push(c.to_ascii_uppercase());
                uppercase_next = false;
            } else {
                human.push(c);
            }
        } else {
            uppercase_next = true;
        }
    }
    human.truncate(HUMAN_PART_MAX);

    // Checksum of the original, untruncated address.
    let digest = blake3::hash(address.as_bytes()).to_hex();
    let checksum = digest.as_str()[..CHECKSUM_LEN].to_ascii_uppercase();
    format!("{}{}", human, checksum)
}

use crate::utils::normalize_lines;

/// Whether `rendered` should replace the published file.
///
/// A missing file always needs an update. Otherwise the texts are compared
/// after line normalization, case-sensitively.
pub fn needs_update(rendered: &str, existing: Option<&str>) -> bool {
    match existing {
        None => true,
        Some(existing) => normalize_lines(rendered) != normalize_lines(existing),
    }
}

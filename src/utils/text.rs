/// Canonical form used when comparing generated file content.
///
/// Line endings become `\n`, trailing whitespace is stripped from every line
/// and trailing blank lines are dropped. Case is left untouched: owners that
/// differ only in case are different accounts.
pub fn normalize_lines(text: &str) -> String {
    let unified = text.replace("\r\n", "\n").replace('\r', "\n");
    let mut lines: Vec<&str> = unified.lines().map(str::trim_end).collect();
    while lines.last().is_some_and(|line| line.is_empty()) {
        lines.pop();
    }

    let mut normalized = lines.join("\n");
    if !normalized.is_empty() {
        normalized.push('\n');
    }
    normalized
}

use colored::Colorize;

/// Print an info message
pub fn info(msg: &str) {
    println!("{} {}", "ℹ".blue(), msg);
}

/// Print a success message
pub fn success(msg: &str) {
    println!("{} {}", "✓".green(), msg);
}

/// Print a warning message
pub fn warn(msg: &str) {
    println!("{} {}", "⚠".yellow(), msg);
}

/// Print an error message
pub fn error(msg: &str) {
    eprintln!("{} {}", "✗".red(), msg);
}

/// Print a dim/muted message
pub fn dim(msg: &str) {
    println!("  {}", msg.dimmed());
}

/// Print a step that had nothing to do
pub fn unchanged(msg: &str) {
    println!("{} {}", "○".dimmed(), msg.dimmed());
}

/// Print a header/title
pub fn header(title: &str) {
    println!();
    println!("{}", title.bold());
    println!("{}", "─".repeat(title.chars().count()).dimmed());
}

/// Print a section header
pub fn section(title: &str) {
    println!();
    println!("{}", title.cyan().bold());
}

/// Print a key-value pair
pub fn kv(key: &str, value: &str) {
    println!("  {}: {}", key.dimmed(), value);
}

/// Lines removed from `old` and added in `new`, prefixed `- ` and `+ `
fn diff_lines(old: &str, new: &str) -> Vec<String> {
    similar::TextDiff::from_lines(old, new)
        .iter_all_changes()
        .filter_map(|change| match change.tag() {
            similar::ChangeTag::Delete => Some(format!("- {}", change.value().trim_end_matches('\n'))),
            similar::ChangeTag::Insert => Some(format!("+ {}", change.value().trim_end_matches('\n'))),
            similar::ChangeTag::Equal => None,
        })
        .collect()
}

/// Print a line diff of `old` against `new`
pub fn diff(old: &str, new: &str) {
    let lines = diff_lines(old, new);
    if lines.is_empty() {
        println!("    {}", "(files are identical)".dimmed());
        return;
    }
    for line in lines {
        if line.starts_with('-') {
            println!("    {}", line.red());
        } else {
            println!("    {}", line.green());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_diff_lines() {
        let old = "client\ndev tun\nremote x\n";
        let new = "client\nremote x\ndev tun0-unrooted\n";
        assert_eq!(
            diff_lines(old, new),
            vec!["- dev tun".to_string(), "+ dev tun0-unrooted".to_string()]
        );
    }

    #[test]
    fn test_identical_has_no_diff() {
        assert!(diff_lines("a\n", "a\n").is_empty());
    }
}

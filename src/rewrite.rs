//! Ordered line-rewrite rules
//!
//! A [`RuleSet`] walks the input line by line. Every rule whose predicate
//! matches acts on the current line in order: `Drop` removes it and stops,
//! `Rewrite` replaces it and continues with the next rule, `KeepAndInsert`
//! queues lines to emit right after it. Lines no rule touches are kept
//! verbatim. Trailer lines are appended at the end. Lines inside an opaque
//! block, tags included, are never offered to the rules.

/// What a matching rule does to a line
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    Drop,
    Rewrite(String),
    KeepAndInsert(Vec<String>),
}

type Predicate = Box<dyn Fn(&str) -> bool>;
type Transform = Box<dyn Fn(&str) -> Action>;
type BlockOpener = Box<dyn Fn(&str) -> Option<String>>;

struct Rule {
    label: &'static str,
    applies: Predicate,
    action: Transform,
}

#[derive(Default)]
pub struct RuleSet {
    rules: Vec<Rule>,
    trailer: Vec<String>,
    opener: Option<BlockOpener>,
}

impl RuleSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a rule; `action` only runs on lines `applies` accepts
    pub fn rule(
        mut self,
        label: &'static str,
        applies: impl Fn(&str) -> bool + 'static,
        action: impl Fn(&str) -> Action + 'static,
    ) -> Self {
        self.rules.push(Rule {
            label,
            applies: Box::new(applies),
            action: Box::new(action),
        });
        self
    }

    pub fn drop_when(self, label: &'static str, applies: impl Fn(&str) -> bool + 'static) -> Self {
        self.rule(label, applies, |_| Action::Drop)
    }

    pub fn rewrite_when(
        self,
        label: &'static str,
        applies: impl Fn(&str) -> bool + 'static,
        rewrite: impl Fn(&str) -> String + 'static,
    ) -> Self {
        self.rule(label, applies, move |line| Action::Rewrite(rewrite(line)))
    }

    pub fn insert_after(
        self,
        label: &'static str,
        applies: impl Fn(&str) -> bool + 'static,
        lines: Vec<String>,
    ) -> Self {
        self.rule(label, applies, move |_| Action::KeepAndInsert(lines.clone()))
    }

    /// Pass blocks through untouched; `opens` returns the closing line for a block start
    pub fn opaque_blocks(mut self, opens: impl Fn(&str) -> Option<String> + 'static) -> Self {
        self.opener = Some(Box::new(opens));
        self
    }

    /// Lines appended after the last input line
    pub fn trailer(mut self, lines: Vec<String>) -> Self {
        self.trailer.extend(lines);
        self
    }

    pub fn apply(&self, text: &str) -> String {
        let mut out: Vec<String> = Vec::new();
        let mut close: Option<String> = None;

        'lines: for line in text.lines() {
            if let Some(tag) = &close {
                if line.trim() == tag.as_str() {
                    close = None;
                }
                out.push(line.to_string());
                continue;
            }
            if let Some(opens) = &self.opener
                && let Some(tag) = opens(line)
            {
                close = Some(tag);
                out.push(line.to_string());
                continue;
            }

            let mut current = line.to_string();
            let mut inserted = Vec::new();

            for rule in &self.rules {
                if !(rule.applies)(&current) {
                    continue;
                }
                match (rule.action)(&current) {
                    Action::Drop => {
                        log::trace!("{}: dropped `{}`", rule.label, line);
                        continue 'lines;
                    }
                    Action::Rewrite(new) => {
                        log::trace!("{}: `{}` -> `{}`", rule.label, current, new);
                        current = new;
                    }
                    Action::KeepAndInsert(lines) => {
                        log::trace!("{}: inserting {} line(s)", rule.label, lines.len());
                        inserted.extend(lines);
                    }
                }
            }

            out.push(current);
            out.extend(inserted);
        }

        out.extend(self.trailer.iter().cloned());
        let mut result = out.join("\n");
        result.push('\n');
        result
    }
}

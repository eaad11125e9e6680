//! Mode-change line batching.
//!
//! Collected mode changes are packed into as few wire lines as fit the
//! 510-byte budget and the per-line parameter cap. A change is never split
//! across lines, the `+`/`-` direction marker is re-emitted only when the
//! direction flips within a line, and every accepted change appears on
//! exactly one emitted line.

use tern_proto::MAX_MSG_LEN;

/// One mode change to propagate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModeChange {
    pub letter: char,
    pub add: bool,
    /// Parameter, for modes that take one.
    pub arg: Option<String>,
}

impl ModeChange {
    pub fn flag(letter: char, add: bool) -> Self {
        Self { letter, add, arg: None }
    }

    pub fn with_arg(letter: char, add: bool, arg: impl Into<String>) -> Self {
        Self { letter, add, arg: Some(arg.into()) }
    }
}

/// Packs mode changes into wire lines under a fixed prefix.
///
/// The prefix is everything before the mode string, e.g.
/// `:server.name TMODE 1700000000 #chan ` (trailing space included).
pub struct ModeLineBatcher {
    prefix: String,
    max_params: usize,
    lines: Vec<String>,
    modes: String,
    args: Vec<String>,
    dir: Option<bool>,
    params: usize,
}

impl ModeLineBatcher {
    pub fn new(prefix: impl Into<String>, max_params: usize) -> Self {
        Self {
            prefix: prefix.into(),
            max_params: max_params.max(1),
            lines: Vec::new(),
            modes: String::new(),
            args: Vec::new(),
            dir: None,
            params: 0,
        }
    }

    fn current_len(&self) -> usize {
        let args_len: usize = self.args.iter().map(|a| a.len() + 1).sum();
        self.prefix.len() + self.modes.len() + args_len
    }

    /// Length the current line would have after appending `change`.
    fn len_with(&self, change: &ModeChange) -> usize {
        let dir_cost = if self.dir == Some(change.add) { 0 } else { 1 };
        let arg_cost = change.arg.as_ref().map(|a| a.len() + 1).unwrap_or(0);
        self.current_len() + dir_cost + 1 + arg_cost
    }

    fn flush(&mut self) {
        if self.modes.is_empty() {
            return;
        }
        let mut line = String::with_capacity(self.current_len());
        line.push_str(&self.prefix);
        line.push_str(&self.modes);
        for arg in &self.args {
            line.push(' ');
            line.push_str(arg);
        }
        self.lines.push(line);
        self.modes.clear();
        self.args.clear();
        self.dir = None;
        self.params = 0;
    }

    /// Append one change, starting a new line when the budget or the
    /// parameter cap would be exceeded.
    pub fn push(&mut self, change: ModeChange) {
        let over_params = change.arg.is_some() && self.params >= self.max_params;
        let over_budget = !self.modes.is_empty() && self.len_with(&change) > MAX_MSG_LEN;
        if over_params || over_budget {
            self.flush();
        }

        if self.dir != Some(change.add) {
            self.modes.push(if change.add { '+' } else { '-' });
            self.dir = Some(change.add);
        }
        self.modes.push(change.letter);
        if let Some(arg) = change.arg {
            self.args.push(arg);
            self.params += 1;
        }
    }

    /// Emit all packed lines.
    pub fn finish(mut self) -> Vec<String> {
        self.flush();
        self.lines
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PREFIX: &str = ":irc.tern.test TMODE 1700000000 #test ";

    #[test]
    fn test_direction_marker_only_on_change() {
        let mut b = ModeLineBatcher::new(PREFIX, 4);
        b.push(ModeChange::flag('n', true));
        b.push(ModeChange::flag('t', true));
        b.push(ModeChange::with_arg('b', false, "*!*@a"));
        b.push(ModeChange::with_arg('q', false, "*!*@b"));
        b.push(ModeChange::flag('m', true));

        let lines = b.finish();
        assert_eq!(lines, vec![format!("{PREFIX}+nt-bq+m *!*@a *!*@b")]);
    }

    #[test]
    fn test_param_cap_splits_lines() {
        let mut b = ModeLineBatcher::new(PREFIX, 2);
        for mask in ["*!*@a", "*!*@b", "*!*@c"] {
            b.push(ModeChange::with_arg('b', true, mask));
        }

        let lines = b.finish();
        assert_eq!(
            lines,
            vec![
                format!("{PREFIX}+bb *!*@a *!*@b"),
                format!("{PREFIX}+b *!*@c"),
            ]
        );
    }

    #[test]
    fn test_direction_resets_after_flush() {
        let mut b = ModeLineBatcher::new(PREFIX, 1);
        b.push(ModeChange::with_arg('b', true, "*!*@a"));
        b.push(ModeChange::with_arg('b', true, "*!*@b"));

        let lines = b.finish();
        // Each line carries its own direction marker.
        assert_eq!(
            lines,
            vec![format!("{PREFIX}+b *!*@a"), format!("{PREFIX}+b *!*@b")]
        );
    }

    #[test]
    fn test_byte_budget_honored_and_changes_conserved() {
        let masks: Vec<String> = (0..40)
            .map(|i| format!("verylongmask{i:02}!*@some.host.with.a.long.name.example"))
            .collect();

        let mut b = ModeLineBatcher::new(PREFIX, 100);
        for mask in &masks {
            b.push(ModeChange::with_arg('b', true, mask.clone()));
        }
        let lines = b.finish();

        assert!(lines.len() > 1);
        for line in &lines {
            assert!(line.len() <= 510, "line over budget: {} bytes", line.len());
        }
        // Every mask appears exactly once across the batch.
        let joined = lines.join("\n");
        for mask in &masks {
            assert_eq!(joined.matches(mask.as_str()).count(), 1);
        }
        // Mode letters match the argument count on every line.
        for line in &lines {
            let rest = &line[PREFIX.len()..];
            let mut parts = rest.split(' ');
            let modes = parts.next().unwrap_or_default();
            let letters = modes.chars().filter(|c| *c == 'b').count();
            assert_eq!(letters, parts.count());
        }
    }

    #[test]
    fn test_empty_batch_emits_nothing() {
        let b = ModeLineBatcher::new(PREFIX, 4);
        assert!(b.finish().is_empty());
    }
}

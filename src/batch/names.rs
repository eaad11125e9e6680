//! NAMES reply batching.
//!
//! Member tokens are packed into 353 numerics under the 510-byte budget.
//! Invisible members are listed only to a viewer who shares the channel,
//! and capability-dependent token forms (multi-prefix, userhost-in-names)
//! are selected per viewer.

use tern_proto::MAX_MSG_LEN;

/// One channel member as seen by the NAMES formatter.
#[derive(Debug, Clone)]
pub struct NamesEntry {
    pub nick: String,
    /// `user@host` part, appended when the viewer negotiated
    /// userhost-in-names.
    pub userhost: String,
    /// Status prefix characters, highest first (e.g. `"@+"`).
    pub prefixes: String,
    /// Whether the member is `+i`.
    pub invisible: bool,
}

/// Per-viewer formatting options.
#[derive(Debug, Clone, Copy, Default)]
pub struct NamesOptions {
    /// Viewer negotiated the multi-prefix capability: show every status
    /// character instead of just the highest.
    pub multi_prefix: bool,
    /// Viewer negotiated userhost-in-names: tokens are full hostmasks.
    pub userhost_in_names: bool,
    /// Viewer shares the channel, so invisible members are shown.
    pub shares_channel: bool,
}

impl NamesEntry {
    fn token(&self, opts: NamesOptions) -> String {
        let prefixes: &str = if opts.multi_prefix {
            &self.prefixes
        } else {
            // Highest status only.
            self.prefixes.get(..1).unwrap_or("")
        };
        if opts.userhost_in_names {
            format!("{prefixes}{}!{}", self.nick, self.userhost)
        } else {
            format!("{prefixes}{}", self.nick)
        }
    }
}

/// Format the 353 lines of a NAMES reply. The caller appends the 366
/// end-of-names numeric itself; it is owed even when this returns no lines.
pub fn names_lines(
    server: &str,
    viewer_nick: &str,
    symbol: char,
    channel: &str,
    entries: &[NamesEntry],
    opts: NamesOptions,
) -> Vec<String> {
    let prefix = format!(":{server} 353 {viewer_nick} {symbol} {channel} :");
    let mut lines = Vec::new();
    let mut line = prefix.clone();
    let mut empty = true;

    for entry in entries {
        if entry.invisible && !opts.shares_channel {
            continue;
        }
        let token = entry.token(opts);
        let cost = token.len() + usize::from(!empty);
        if !empty && line.len() + cost > MAX_MSG_LEN {
            lines.push(std::mem::replace(&mut line, prefix.clone()));
            empty = true;
        }
        if !empty {
            line.push(' ');
        }
        line.push_str(&token);
        empty = false;
    }

    // A trailing prefix with no tokens is suppressed.
    if !empty {
        lines.push(line);
    }
    lines
}

//! Channel name validation.

/// Maximum channel name length, including the type prefix.
pub const MAX_CHANNEL_NAME_LEN: usize = 50;

/// Extension trait for channel-name checks on string types.
pub trait ChannelExt {
    /// Check whether this string is a syntactically valid channel name.
    ///
    /// A valid name starts with `#` or `&`, is at most
    /// [`MAX_CHANNEL_NAME_LEN`] bytes, and contains no space, comma,
    /// colon, BEL, CR, or LF.
    fn is_channel_name(&self) -> bool;
}

impl ChannelExt for str {
    fn is_channel_name(&self) -> bool {
        let mut chars = self.chars();
        let valid_sigil = matches!(chars.next(), Some('#') | Some('&'));

        valid_sigil
            && self.len() <= MAX_CHANNEL_NAME_LEN
            && chars.clone().next().is_some()
            && !chars.any(|c| matches!(c, ' ' | ',' | ':' | '\x07' | '\r' | '\n'))
    }
}

impl ChannelExt for String {
    fn is_channel_name(&self) -> bool {
        self.as_str().is_channel_name()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_channel_names() {
        assert!("#test".is_channel_name());
        assert!("&local".is_channel_name());
        assert!("#a".is_channel_name());
        assert!("#with-dashes_and.dots".is_channel_name());
    }

    #[test]
    fn test_invalid_channel_names() {
        assert!(!"test".is_channel_name());
        assert!(!"#".is_channel_name());
        assert!(!"&".is_channel_name());
        assert!(!"#has space".is_channel_name());
        assert!(!"#has,comma".is_channel_name());
        assert!(!"#has:colon".is_channel_name());
        assert!(!"#has\x07bell".is_channel_name());
        assert!(!format!("#{}", "x".repeat(60)).is_channel_name());
    }
}

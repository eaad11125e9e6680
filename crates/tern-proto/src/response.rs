//! Numeric reply codes.
//!
//! Only the numerics the Tern daemon emits are represented; anything else
//! arriving off the wire stays a raw command.

/// Numeric server replies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[allow(non_camel_case_types, missing_docs)]
#[repr(u16)]
pub enum Response {
    RPL_WELCOME = 1,
    RPL_CHANNELMODEIS = 324,
    RPL_CREATIONTIME = 329,
    RPL_NOTOPIC = 331,
    RPL_TOPIC = 332,
    RPL_TOPICWHOTIME = 333,
    RPL_INVITING = 341,
    RPL_INVEXLIST = 346,
    RPL_ENDOFINVEXLIST = 347,
    RPL_EXCEPTLIST = 348,
    RPL_ENDOFEXCEPTLIST = 349,
    RPL_NAMREPLY = 353,
    RPL_ENDOFNAMES = 366,
    RPL_BANLIST = 367,
    RPL_ENDOFBANLIST = 368,
    ERR_NOSUCHNICK = 401,
    ERR_NOSUCHCHANNEL = 403,
    ERR_CANNOTSENDTOCHAN = 404,
    ERR_NOTEXTTOSEND = 412,
    ERR_UNKNOWNCOMMAND = 421,
    ERR_NONICKNAMEGIVEN = 431,
    ERR_ERRONEUSNICKNAME = 432,
    ERR_NICKNAMEINUSE = 433,
    ERR_UNAVAILRESOURCE = 437,
    ERR_USERNOTINCHANNEL = 441,
    ERR_NOTONCHANNEL = 442,
    ERR_USERONCHANNEL = 443,
    ERR_NOTREGISTERED = 451,
    ERR_NEEDMOREPARAMS = 461,
    ERR_ALREADYREGISTRED = 462,
    RPL_LINKCHANNEL = 470,
    ERR_CHANNELISFULL = 471,
    ERR_INVITEONLYCHAN = 473,
    ERR_BANNEDFROMCHAN = 474,
    ERR_BADCHANNELKEY = 475,
    ERR_NEEDREGGEDNICK = 477,
    ERR_BANLISTFULL = 478,
    ERR_CHANOPRIVSNEEDED = 482,
    RPL_QUIETLIST = 728,
    RPL_ENDOFQUIETLIST = 729,
}

impl Response {
    /// The three-digit wire code.
    pub fn code(self) -> u16 {
        self as u16
    }

    /// Map a wire code back to a known response, if any.
    pub fn from_code(code: u16) -> Option<Self> {
        use Response::*;
        let resp = match code {
            1 => RPL_WELCOME,
            324 => RPL_CHANNELMODEIS,
            329 => RPL_CREATIONTIME,
            331 => RPL_NOTOPIC,
            332 => RPL_TOPIC,
            333 => RPL_TOPICWHOTIME,
            341 => RPL_INVITING,
            346 => RPL_INVEXLIST,
            347 => RPL_ENDOFINVEXLIST,
            348 => RPL_EXCEPTLIST,
            349 => RPL_ENDOFEXCEPTLIST,
            353 => RPL_NAMREPLY,
            366 => RPL_ENDOFNAMES,
            367 => RPL_BANLIST,
            368 => RPL_ENDOFBANLIST,
            401 => ERR_NOSUCHNICK,
            403 => ERR_NOSUCHCHANNEL,
            404 => ERR_CANNOTSENDTOCHAN,
            412 => ERR_NOTEXTTOSEND,
            421 => ERR_UNKNOWNCOMMAND,
            431 => ERR_NONICKNAMEGIVEN,
            432 => ERR_ERRONEUSNICKNAME,
            433 => ERR_NICKNAMEINUSE,
            437 => ERR_UNAVAILRESOURCE,
            441 => ERR_USERNOTINCHANNEL,
            442 => ERR_NOTONCHANNEL,
            443 => ERR_USERONCHANNEL,
            451 => ERR_NOTREGISTERED,
            461 => ERR_NEEDMOREPARAMS,
            462 => ERR_ALREADYREGISTRED,
            470 => RPL_LINKCHANNEL,
            471 => ERR_CHANNELISFULL,
            473 => ERR_INVITEONLYCHAN,
            474 => ERR_BANNEDFROMCHAN,
            475 => ERR_BADCHANNELKEY,
            477 => ERR_NEEDREGGEDNICK,
            478 => ERR_BANLISTFULL,
            482 => ERR_CHANOPRIVSNEEDED,
            728 => RPL_QUIETLIST,
            729 => RPL_ENDOFQUIETLIST,
            _ => return None,
        };
        Some(resp)
    }

    /// Whether this is an error numeric (4xx/5xx range, plus 7xx errors).
    pub fn is_error(self) -> bool {
        (400..600).contains(&self.code())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_code_roundtrip() {
        for resp in [
            Response::RPL_WELCOME,
            Response::RPL_NAMREPLY,
            Response::ERR_BANNEDFROMCHAN,
            Response::RPL_QUIETLIST,
        ] {
            assert_eq!(Response::from_code(resp.code()), Some(resp));
        }
        assert_eq!(Response::from_code(999), None);
    }

    #[test]
    fn test_is_error() {
        assert!(Response::ERR_BANNEDFROMCHAN.is_error());
        assert!(!Response::RPL_NAMREPLY.is_error());
        assert!(!Response::RPL_QUIETLIST.is_error());
    }
}

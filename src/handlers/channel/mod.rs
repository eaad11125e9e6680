//! Channel membership commands.

pub mod invite;
pub mod join;
pub mod kick;
pub mod names;
pub mod part;
pub mod topic;

//! Lightweight shell text handling.
//!
//! This is not a shell grammar. It knows about quotes and control
//! operators, which is enough to split compound commands for permission
//! matching and to find `rm`/`git` invocations for the risk analyzers.

pub mod prefix;
pub mod split;

pub use prefix::{CommandSubcommandPrefixResult, HeuristicPrefixResolver, PrefixResolver, ResolveError};
pub use split::{split_into_subcommands, tokenize, Token};

//! Core domain types, name normalization, extraction and roster matching
//! for checking appointment patients against an enrollment roster.

pub mod config;
pub mod controller;
pub mod error;
pub mod extract;
pub mod matcher;
pub mod normalize;
pub mod render;
pub mod types;

pub use config::{CheckConfig, RosterColumns};
pub use controller::{
    BlobSource, Controller, RosterParser, RunOutcome, StatusChecker, StatusView, TextExtractor,
};
pub use error::{Error, Result};
pub use extract::NameExtractor;
pub use matcher::{MatchPolicy, NameMatcher};
pub use normalize::{normalize, NameNormalizer};
pub use render::{HtmlRenderer, ResultRenderer, TextRenderer};
pub use types::{DocumentKind, MatchResult, MatchStatus, Roster, RosterRecord, StatusClass};

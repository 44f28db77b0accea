// Compiled regex cache shared by the heuristics modules.
macro_rules! re {
    ($name:ident, $pat:expr) => {
        fn $name() -> &'static ::regex::Regex {
            static R: ::std::sync::OnceLock<::regex::Regex> = ::std::sync::OnceLock::new();
            R.get_or_init(|| ::regex::Regex::new($pat).expect("invalid regex"))
        }
    };
}

pub mod classify;
pub mod config;
pub mod link;
pub mod match_engine;
pub mod payee_text;
pub mod scoring;

pub use classify::{AccountIndex, AccountProfile, CardConstraints};
pub use config::{ConfigError, TransferConfig};
pub use link::{
    apply_plan, build_link_plan, find_pair, link_candidates, merge_notes, select_candidates,
    ApplyError, CandidateFilter, DatePreference, LinkError, LinkOptions, LinkOutcome, LinkPlan, Side,
};
pub use match_engine::{
    find_transfer_candidates, resolve_one_to_one, Candidate, MatchError, MatchOptions, ScoredPair,
    TransferMatcher,
};
pub use scoring::{score_pair, PairScore, Reason, Rejection};

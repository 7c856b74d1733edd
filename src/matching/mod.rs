pub mod config;
pub mod ranking;
pub mod scoring;
pub mod service;

pub use config::ScoringWeights;
pub use ranking::{search, suggest, RankedMentor, SearchCriteria};
pub use scoring::{score, FactorScore, MatchScore, MatchScorer, ScoringFactor};
pub use service::MatchService;

//! High-level campaign entry points used by the CLI.

pub mod campaign;

pub use campaign::{CampaignSummary, check_campaign, run_campaign};

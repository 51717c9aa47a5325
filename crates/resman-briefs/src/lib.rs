pub mod cache;
pub mod heuristic;
pub mod project_index;
pub mod repo_map;

pub use cache::{collect_sources, make_prompt, refresh_briefs, BriefFiles, RefreshReport, Summarizer};
pub use heuristic::{heuristic_brief, one_liner};
pub use repo_map::{build_repo_map, RepoMap, RepoMapOptions};

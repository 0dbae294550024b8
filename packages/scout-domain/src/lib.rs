pub mod conversation;
pub mod document;
pub mod failure;
pub mod query;
pub mod time_serde;

pub use conversation::{ConversationLog, ConversationTurn, Role, WindowPolicy};
pub use document::{
	CandidateDocument, CombinedResultSet, RankedResult, SearchMode, SourceTag, cmp_f32_desc,
	relevance_from_distance,
};
pub use failure::FailureRecord;
pub use query::{Query, QueryFilter};

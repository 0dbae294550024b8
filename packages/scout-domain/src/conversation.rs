use serde::{Deserialize, Serialize};
use unicode_segmentation::UnicodeSegmentation;

const TRUNCATION_MARKER: &str = " [truncated]";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
	System,
	User,
	Assistant,
	Tool,
}
impl Role {
	pub fn as_str(self) -> &'static str {
		match self {
			Self::System => "system",
			Self::User => "user",
			Self::Assistant => "assistant",
			Self::Tool => "tool",
		}
	}
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversationTurn {
	pub role: Role,
	pub content: String,
}
impl ConversationTurn {
	pub fn new(role: Role, content: impl Into<String>) -> Self {
		Self { role, content: content.into() }
	}

	pub fn system(content: impl Into<String>) -> Self {
		Self::new(Role::System, content)
	}

	pub fn user(content: impl Into<String>) -> Self {
		Self::new(Role::User, content)
	}

	pub fn assistant(content: impl Into<String>) -> Self {
		Self::new(Role::Assistant, content)
	}

	pub fn tool(content: impl Into<String>) -> Self {
		Self::new(Role::Tool, content)
	}
}

/// Bounds applied to the view of a log that is handed to the model.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WindowPolicy {
	/// Maximum number of turns in the window, omission marker excluded.
	pub max_turns: usize,
	/// Maximum grapheme clusters kept per turn.
	pub max_chars: usize,
}

/// Append-only conversation memory owned by a single session.
///
/// The leading turns passed to [`ConversationLog::new`] are pinned: they always survive
/// windowing. Nothing is ever removed from the log itself.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversationLog {
	turns: Vec<ConversationTurn>,
	pinned: usize,
}
impl ConversationLog {
	pub fn new(pinned: Vec<ConversationTurn>) -> Self {
		let pinned_len = pinned.len();

		Self { turns: pinned, pinned: pinned_len }
	}

	pub fn push(&mut self, turn: ConversationTurn) {
		self.turns.push(turn);
	}

	pub fn turns(&self) -> &[ConversationTurn] {
		&self.turns
	}

	pub fn into_turns(self) -> Vec<ConversationTurn> {
		self.turns
	}

	pub fn len(&self) -> usize {
		self.turns.len()
	}

	pub fn is_empty(&self) -> bool {
		self.turns.is_empty()
	}

	/// Builds the bounded view sent to the model.
	///
	/// Pinned turns come first. When unpinned turns overflow the budget, the oldest ones are
	/// replaced by a single system marker stating how many were omitted.
	pub fn window(&self, policy: WindowPolicy) -> Vec<ConversationTurn> {
		let recent_budget = policy.max_turns.saturating_sub(self.pinned).max(1);
		let unpinned = self.turns.len() - self.pinned;
		let mut out = Vec::with_capacity(self.pinned + recent_budget + 1);

		out.extend(self.turns[..self.pinned].iter().map(|turn| clip_turn(turn, policy.max_chars)));

		let start = if unpinned > recent_budget {
			let omitted = unpinned - recent_budget;

			out.push(ConversationTurn::system(format!(
				"[{omitted} earlier turn(s) omitted from this conversation.]"
			)));

			self.turns.len() - recent_budget
		} else {
			self.pinned
		};

		out.extend(self.turns[start..].iter().map(|turn| clip_turn(turn, policy.max_chars)));

		out
	}
}

fn clip_turn(turn: &ConversationTurn, max_chars: usize) -> ConversationTurn {
	ConversationTurn { role: turn.role, content: clip_graphemes(&turn.content, max_chars) }
}

pub fn clip_graphemes(text: &str, max_chars: usize) -> String {
	let mut graphemes = text.grapheme_indices(true);

	match graphemes.nth(max_chars) {
		Some((cut, _)) => {
			let mut out = String::with_capacity(cut + TRUNCATION_MARKER.len());

			out.push_str(&text[..cut]);
			out.push_str(TRUNCATION_MARKER);

			out
		},
		None => text.to_string(),
	}
}

use tracing::trace;

/// Restricts calendar views to one owner.
#[derive(
  Debug, Clone, Default, PartialEq, Eq,
)]
pub enum OwnerFilter {
  #[default]
  All,
  /// Case-insensitive substring of a
  /// free-text owner name.
  Contains(String),
  /// Exact team member id.
  Member(String)
}

impl OwnerFilter {
  /// Free-text filter; blank input
  /// clears it.
  pub fn contains(raw: &str) -> Self {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
      Self::All
    } else {
      Self::Contains(
        trimmed.to_lowercase()
      )
    }
  }

  /// Member-id filter; blank input
  /// clears it.
  pub fn member(raw: &str) -> Self {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
      Self::All
    } else {
      Self::Member(trimmed.to_string())
    }
  }

  #[must_use]
  pub fn is_all(&self) -> bool {
    matches!(self, Self::All)
  }

  pub fn matches(
    &self,
    owner: &str
  ) -> bool {
    let ok = match self {
      | Self::All => true,
      | Self::Contains(needle) => {
        owner
          .to_lowercase()
          .contains(needle.as_str())
      }
      | Self::Member(id) => owner == id
    };
    trace!(
      filter = ?self,
      owner,
      ok,
      "owner filter evaluated"
    );
    ok
  }
}

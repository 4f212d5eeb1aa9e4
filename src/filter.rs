//! Composes the ad-hoc part of the issue query from independently toggled fragments.

/// User-controlled filter settings for the issue list.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FilterState {
  /// Checked issue type names; empty means all types
  pub issue_types: Vec<String>,
  /// Overall toggle gating the status and summary fragments
  pub filter_active: bool,
  pub exclude_done: bool,
  pub summary: String,
}

impl FilterState {
  /// The ad-hoc filter for the current state, or `None` when no fragment applies.
  ///
  /// Fragments appear in a fixed order: issue types, completed status, summary.
  pub fn compose(&self) -> Option<String> {
    let mut fragments = Vec::new();

    if !self.issue_types.is_empty() {
      fragments.push(format!(
        "IssueType IN (\"{}\")",
        self.issue_types.join("\",\"")
      ));
    }

    if self.filter_active {
      if self.exclude_done {
        fragments.push("StatusCategory != Done".to_string());
      }

      if !self.summary.trim().is_empty() {
        fragments.push(format!("Summary ~ \"{}\"", self.summary.replace('"', "\\\"")));
      }
    }

    if fragments.is_empty() {
      None
    } else {
      Some(format!("({})", fragments.join(") AND (")))
    }
  }
}

/// Restrict `base` by an optional ad-hoc filter.
pub fn composite(base: &str, ad_hoc: Option<&str>) -> String {
  match ad_hoc {
    None => base.to_string(),
    Some(ad_hoc) if base.trim().is_empty() => ad_hoc.to_string(),
    Some(ad_hoc) => format!("({}) AND ({})", base, ad_hoc),
  }
}

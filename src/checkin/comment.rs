//! Structured comment bodies in the Atlassian document format.
//!
//! Serialization of these types is the wire contract of the comment endpoint:
//! node `type` first, then `attrs`/`text`, then `marks`/`content`.

use serde::Serialize;
use std::collections::HashSet;

use crate::text::{format_count, longest_common_prefix, trim_to};

use super::vcs::{Change, Changeset};

/// Longest comment text copied into the issue.
pub const MAX_COMMENT_LEN: usize = 1000;
/// Above this many files, only a count and a link are posted.
pub const MAX_LISTED_CHANGES: usize = 50;
const MUTED_COLOR: &str = "#97a0af";

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Document {
  pub version: u8,
  #[serde(rename = "type")]
  pub kind: &'static str,
  pub content: Vec<Block>,
}

impl Document {
  pub fn new(content: Vec<Block>) -> Self {
    Self {
      version: 1,
      kind: "doc",
      content,
    }
  }

  pub fn to_value(&self) -> serde_json::Value {
    serde_json::to_value(self).unwrap_or(serde_json::Value::Null)
  }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum Block {
  Paragraph { content: Vec<Inline> },
  Panel { attrs: PanelAttrs, content: Vec<Block> },
  BulletList { content: Vec<Block> },
  ListItem { content: Vec<Block> },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PanelType {
  Info,
  Warning,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PanelAttrs {
  #[serde(rename = "panelType")]
  pub panel_type: PanelType,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum Inline {
  Text {
    text: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    marks: Vec<Mark>,
  },
  HardBreak,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum Mark {
  Strong,
  Link { attrs: LinkAttrs },
  TextColor { attrs: ColorAttrs },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LinkAttrs {
  pub href: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ColorAttrs {
  pub color: String,
}

// ============================================================================
// Node helpers
// ============================================================================

fn text(s: impl Into<String>) -> Inline {
  Inline::Text {
    text: s.into(),
    marks: Vec::new(),
  }
}

fn marked(s: impl Into<String>, marks: Vec<Mark>) -> Inline {
  Inline::Text {
    text: s.into(),
    marks,
  }
}

fn strong(s: impl Into<String>) -> Inline {
  marked(s, vec![Mark::Strong])
}

fn link(href: &str) -> Mark {
  Mark::Link {
    attrs: LinkAttrs {
      href: href.to_string(),
    },
  }
}

fn muted(s: impl Into<String>) -> Inline {
  marked(
    s,
    vec![Mark::TextColor {
      attrs: ColorAttrs {
        color: MUTED_COLOR.to_string(),
      },
    }],
  )
}

fn paragraph(content: Vec<Inline>) -> Block {
  Block::Paragraph { content }
}

fn panel(panel_type: PanelType, content: Vec<Inline>) -> Block {
  Block::Panel {
    attrs: PanelAttrs { panel_type },
    content: vec![paragraph(content)],
  }
}

// ============================================================================
// Changeset comment
// ============================================================================

/// Changes with repeated server paths removed, first occurrence kept.
fn distinct_changes(changes: &[Change]) -> Vec<&Change> {
  let mut seen = HashSet::new();
  changes
    .iter()
    .filter(|c| seen.insert(c.server_item.to_lowercase()))
    .collect()
}

/// Folder every change lives under, ending in `/` (or empty).
pub fn common_folder(changes: &[&Change]) -> String {
  let folders: Vec<&str> = changes.iter().map(|c| c.folder()).collect();
  let prefix = longest_common_prefix(&folders, false);
  match prefix.rfind('/') {
    Some(i) => prefix[..=i].to_string(),
    None => String::new(),
  }
}

/// Comment posted to an issue when a changeset referencing it is committed.
pub fn changeset_comment(changeset: &Changeset, comment: &str) -> Document {
  let changes = distinct_changes(&changeset.changes);
  let mut content = Vec::new();

  content.push(paragraph(vec![
    strong("Changeset Number: "),
    marked(changeset.id.to_string(), vec![link(&changeset.url)]),
    Inline::HardBreak,
    strong("Changeset Owner: "),
    text(changeset.committer.clone()),
    Inline::HardBreak,
    strong("Comment: "),
  ]));

  let comment = if comment.trim().is_empty() {
    "No comment provided".to_string()
  } else {
    trim_to(comment, MAX_COMMENT_LEN, "...")
  };
  content.push(panel(PanelType::Info, vec![text(comment)]));

  let prefix = common_folder(&changes);
  let prefix_len = prefix.chars().count();
  content.push(paragraph(vec![
    strong("Files Changed"),
    muted(format!(" (Under {})", prefix)),
  ]));

  if changes.len() <= MAX_LISTED_CHANGES {
    let items = changes
      .iter()
      .map(|change| {
        let relative: String = change.folder().chars().skip(prefix_len).collect();
        Block::ListItem {
          content: vec![paragraph(vec![
            text(format!("./{}", relative)),
            strong(change.file_name()),
            muted(format!(" ({})", change.change_type.cleaned())),
          ])],
        }
      })
      .collect();
    content.push(Block::BulletList { content: items });
  } else {
    content.push(panel(
      PanelType::Warning,
      vec![
        strong(format!("{} files", format_count(changes.len()))),
        text(" changed.  View full Changeset information "),
        marked("here", vec![Mark::Strong, link(&changeset.url)]),
        text("."),
      ],
    ));
  }

  Document::new(content)
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::checkin::vcs::ChangeType;

  fn change(path: &str, change_type: ChangeType) -> Change {
    Change {
      server_item: path.to_string(),
      change_type,
    }
  }

  fn three_file_changeset() -> Changeset {
    Changeset {
      id: 42,
      comment: "PARENT-123: abc".to_string(),
      committer: "Alice".to_string(),
      url: "https://tfs.example.com/cs?cs=42".to_string(),
      changes: vec![
        change("/src/feature/a.rs", ChangeType::ADD | ChangeType::EDIT),
        change("/src/feature/ui/b.rs", ChangeType::EDIT),
        change("/src/feature/c.rs", ChangeType::DELETE),
      ],
    }
  }

  #[test]
  fn test_three_file_comment_matches_wire_format() {
    let doc = changeset_comment(&three_file_changeset(), "abc");
    let json = serde_json::to_string(&doc).unwrap();

    let expected = concat!(
      r##"{"version":1,"type":"doc","content":["##,
      r##"{"type":"paragraph","content":["##,
      r##"{"type":"text","text":"Changeset Number: ","marks":[{"type":"strong"}]},"##,
      r##"{"type":"text","text":"42","marks":[{"type":"link","attrs":{"href":"https://tfs.example.com/cs?cs=42"}}]},"##,
      r##"{"type":"hardBreak"},"##,
      r##"{"type":"text","text":"Changeset Owner: ","marks":[{"type":"strong"}]},"##,
      r##"{"type":"text","text":"Alice"},"##,
      r##"{"type":"hardBreak"},"##,
      r##"{"type":"text","text":"Comment: ","marks":[{"type":"strong"}]}]},"##,
      r##"{"type":"panel","attrs":{"panelType":"info"},"content":[{"type":"paragraph","content":[{"type":"text","text":"abc"}]}]},"##,
      r##"{"type":"paragraph","content":["##,
      r##"{"type":"text","text":"Files Changed","marks":[{"type":"strong"}]},"##,
      r##"{"type":"text","text":" (Under /src/feature/)","marks":[{"type":"textColor","attrs":{"color":"#97a0af"}}]}]},"##,
      r##"{"type":"bulletList","content":["##,
      r##"{"type":"listItem","content":[{"type":"paragraph","content":["##,
      r##"{"type":"text","text":"./"},"##,
      r##"{"type":"text","text":"a.rs","marks":[{"type":"strong"}]},"##,
      r##"{"type":"text","text":" (Add)","marks":[{"type":"textColor","attrs":{"color":"#97a0af"}}]}]}]},"##,
      r##"{"type":"listItem","content":[{"type":"paragraph","content":["##,
      r##"{"type":"text","text":"./ui/"},"##,
      r##"{"type":"text","text":"b.rs","marks":[{"type":"strong"}]},"##,
      r##"{"type":"text","text":" (Edit)","marks":[{"type":"textColor","attrs":{"color":"#97a0af"}}]}]}]},"##,
      r##"{"type":"listItem","content":[{"type":"paragraph","content":["##,
      r##"{"type":"text","text":"./"},"##,
      r##"{"type":"text","text":"c.rs","marks":[{"type":"strong"}]},"##,
      r##"{"type":"text","text":" (Delete)","marks":[{"type":"textColor","attrs":{"color":"#97a0af"}}]}]}]}"##,
      r##"]}]}"##,
    );

    assert_eq!(json, expected);
  }

  #[test]
  fn test_blank_comment_placeholder_and_truncation() {
    let doc = changeset_comment(&three_file_changeset(), "  ");
    let value = doc.to_value();
    assert_eq!(
      value["content"][1]["content"][0]["content"][0]["text"],
      "No comment provided"
    );

    let long = "x".repeat(1500);
    let value = changeset_comment(&three_file_changeset(), &long).to_value();
    let posted = value["content"][1]["content"][0]["content"][0]["text"]
      .as_str()
      .unwrap()
      .to_string();
    assert_eq!(posted.chars().count(), MAX_COMMENT_LEN);
    assert!(posted.ends_with("..."));
  }

  #[test]
  fn test_duplicate_paths_listed_once() {
    let mut changeset = three_file_changeset();
    changeset
      .changes
      .push(change("/SRC/feature/A.rs", ChangeType::EDIT));

    let value = changeset_comment(&changeset, "abc").to_value();
    assert_eq!(value["content"][3]["content"].as_array().unwrap().len(), 3);
  }

  #[test]
  fn test_large_changeset_summarized() {
    let changeset = Changeset {
      changes: (0..1234)
        .map(|n| change(&format!("/src/gen/file{}.rs", n), ChangeType::ADD))
        .collect(),
      ..three_file_changeset()
    };

    let value = changeset_comment(&changeset, "abc").to_value();
    let summary = &value["content"][3];
    assert_eq!(summary["type"], "panel");
    assert_eq!(summary["attrs"]["panelType"], "warning");
    let runs = &summary["content"][0]["content"];
    assert_eq!(runs[0]["text"], "1,234 files");
    assert_eq!(runs[1]["text"], " changed.  View full Changeset information ");
    assert_eq!(runs[2]["text"], "here");
    assert_eq!(runs[2]["marks"][0]["type"], "strong");
    assert_eq!(
      runs[2]["marks"][1]["attrs"]["href"],
      "https://tfs.example.com/cs?cs=42"
    );
    assert_eq!(runs[3]["text"], ".");
    assert_eq!(
      value["content"][2]["content"][1]["text"],
      " (Under /src/gen/)"
    );
  }

  #[test]
  fn test_common_folder_falls_back_to_slash_boundary() {
    let a = change("/src/feature_a/x.rs", ChangeType::EDIT);
    let b = change("/src/feature_b/y.rs", ChangeType::EDIT);
    assert_eq!(common_folder(&[&a, &b]), "/src/");
    assert_eq!(common_folder(&[]), "");
  }
}

//! Project entities indexed by the retrieval engine, and their text rendering.
//!
//! Each entity is flattened into one labelled text blob before embedding. The
//! blob is also what callers get back as context, so the labels are meant to
//! be read by a language model.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// The setting of a novel.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WorldView {
    pub id: String,
    pub project_id: String,
    pub title: String,
    pub synopsis: String,
    /// Era and place
    pub setting: String,
    pub key_rules: Vec<String>,
    pub tone_examples: Vec<String>,
    pub themes: Vec<String>,
}

impl WorldView {
    pub fn render(&self) -> String {
        format!(
            "Title: {}\nSynopsis: {}\nSetting: {}\nKey rules: {}\nThemes: {}",
            self.title,
            self.synopsis,
            self.setting,
            self.key_rules.join("; "),
            self.themes.join("; "),
        )
    }
}

/// A character sheet.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Character {
    pub id: String,
    pub project_id: String,
    pub name: String,
    /// Protagonist, antagonist, supporting...
    pub role: String,
    pub age: u32,
    pub appearance: String,
    pub background: String,
    pub motivation: String,
    pub flaws: Vec<String>,
    pub speech_tone: String,
    pub secrets: Vec<String>,
    /// Other character name to relationship
    pub relationships: BTreeMap<String, String>,
}

impl Character {
    pub fn render(&self) -> String {
        let mut text = format!(
            "Character: {}\nRole: {}\nAge: {}\nAppearance: {}\nBackground: {}\n\
             Motivation: {}\nFlaws: {}\nSpeech: {}\nSecrets: {}",
            self.name,
            self.role,
            self.age,
            self.appearance,
            self.background,
            self.motivation,
            self.flaws.join("; "),
            self.speech_tone,
            self.secrets.join("; "),
        );

        if !self.relationships.is_empty() {
            let relationships: Vec<String> = self
                .relationships
                .iter()
                .map(|(other, relation)| format!("{other} ({relation})"))
                .collect();
            text.push_str("\nRelationships: ");
            text.push_str(&relationships.join("; "));
        }
        text
    }
}

/// One written chapter.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Chapter {
    pub id: String,
    pub project_id: String,
    pub index: u32,
    pub title: String,
    pub raw_content: String,
    pub polished_content: String,
    pub summary: String,
    pub word_count: u32,
}

impl Chapter {
    /// Polished text when available, raw text otherwise.
    pub fn body(&self) -> &str {
        if self.polished_content.is_empty() {
            &self.raw_content
        } else {
            &self.polished_content
        }
    }

    /// Renders the chapter, reducing bodies longer than `excerpt_chars`
    /// characters to title, summary and the first `excerpt_chars` characters.
    pub fn render(&self, excerpt_chars: usize) -> String {
        let body = self.body();
        match body.char_indices().nth(excerpt_chars) {
            None => body.to_string(),
            Some((cut, _)) => format!(
                "Title: {}\nSummary: {}\nExcerpt: {}",
                self.title,
                self.summary,
                &body[..cut]
            ),
        }
    }
}

/// Plan for one chapter.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChapterOutline {
    pub index: u32,
    pub title: String,
    pub summary: String,
    pub goal: String,
    pub twist_hint: String,
    pub important_items: Vec<String>,
}

impl ChapterOutline {
    fn render(&self) -> String {
        let mut text = format!(
            "Chapter {}: {}\nSummary: {}\nGoal: {}",
            self.index, self.title, self.summary, self.goal
        );
        if !self.twist_hint.is_empty() {
            text.push_str("\nTwist: ");
            text.push_str(&self.twist_hint);
        }
        if !self.important_items.is_empty() {
            text.push_str("\nKey items: ");
            text.push_str(&self.important_items.join("; "));
        }
        text
    }
}

/// The chapter plan of a project.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Outline {
    pub id: String,
    pub project_id: String,
    pub chapters: Vec<ChapterOutline>,
}

impl Outline {
    pub fn render(&self) -> String {
        self.chapters
            .iter()
            .map(ChapterOutline::render)
            .collect::<Vec<_>>()
            .join("\n\n")
    }
}

/// Everything a project owns that can be indexed.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NovelProject {
    pub id: String,
    pub title: String,
    pub genre: String,
    pub world_view: Option<WorldView>,
    pub characters: Vec<Character>,
    pub outline: Option<Outline>,
    pub chapters: Vec<Chapter>,
}

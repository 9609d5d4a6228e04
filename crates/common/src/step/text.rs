// Plain-text document model.
//
// Offsets count Unicode scalar values, so a client can address the document
// without agreeing on an encoding.

use serde::{Deserialize, Serialize};

use super::{Step, StepError, StepMap};

/// A plain-text document. Serialized as a bare JSON string.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TextDoc(String);

impl TextDoc {
    pub fn new(content: impl Into<String>) -> Self {
        Self(content.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Length in Unicode scalar values.
    pub fn len(&self) -> usize {
        self.0.chars().count()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    fn byte_index(&self, pos: usize) -> usize {
        self.0.char_indices().nth(pos).map(|(index, _)| index).unwrap_or(self.0.len())
    }
}

impl From<&str> for TextDoc {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

/// A single edit to a [`TextDoc`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "stepType", rename_all = "snake_case")]
pub enum TextStep {
    /// Replace `from..to` with `text`.
    Replace { from: usize, to: usize, text: String },
    Insert { pos: usize, text: String },
    Delete { from: usize, to: usize },
}

impl TextStep {
    pub fn insert(pos: usize, text: impl Into<String>) -> Self {
        Self::Insert { pos, text: text.into() }
    }

    pub fn delete(from: usize, to: usize) -> Self {
        Self::Delete { from, to }
    }

    pub fn replace(from: usize, to: usize, text: impl Into<String>) -> Self {
        Self::Replace { from, to, text: text.into() }
    }

    fn parts(&self) -> (usize, usize, &str) {
        match self {
            Self::Replace { from, to, text } => (*from, *to, text),
            Self::Insert { pos, text } => (*pos, *pos, text),
            Self::Delete { from, to } => (*from, *to, ""),
        }
    }
}

impl Step for TextStep {
    type Doc = TextDoc;

    fn apply(&self, doc: &TextDoc) -> Result<TextDoc, StepError> {
        let (from, to, text) = self.parts();
        if from > to {
            return Err(StepError::InvertedRange { from, to });
        }
        let len = doc.len();
        if to > len {
            return Err(StepError::OutOfRange { from, to, len });
        }

        let start = doc.byte_index(from);
        let end = doc.byte_index(to);
        let mut content = String::with_capacity(doc.0.len() - (end - start) + text.len());
        content.push_str(&doc.0[..start]);
        content.push_str(text);
        content.push_str(&doc.0[end..]);
        Ok(TextDoc(content))
    }

    fn step_map(&self) -> StepMap {
        let (from, to, text) = self.parts();
        StepMap::replace(from, to.saturating_sub(from), text.chars().count())
    }

    fn doc_size(doc: &TextDoc) -> usize {
        doc.len()
    }
}

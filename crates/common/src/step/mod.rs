// Document-model contract for collaborative editing.
//
// A step is an atomic edit. Applying it yields a new document; its step map
// re-projects offsets from the old document onto the new one so that
// anything anchored to positions (comments, cursors) can follow the edit.

pub mod text;

use thiserror::Error;

/// Why a step could not be applied to a document.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StepError {
    #[error("range {from}..{to} is outside a document of length {len}")]
    OutOfRange { from: usize, to: usize, len: usize },

    #[error("range start {from} is after range end {to}")]
    InvertedRange { from: usize, to: usize },
}

/// An atomic, applyable edit against a document of type [`Step::Doc`].
///
/// The engine never looks inside a document. Everything it needs is the
/// ability to apply a step and to map positions through it.
pub trait Step: Clone + Send + Sync + 'static {
    /// The document this step edits. `Default` is the fresh empty document.
    type Doc: Clone + Default + Send + Sync + 'static;

    fn apply(&self, doc: &Self::Doc) -> Result<Self::Doc, StepError>;

    fn step_map(&self) -> StepMap;

    /// Size of `doc` in the position space step maps use. Anything anchored
    /// to a document must lie within `0..=doc_size`.
    fn doc_size(doc: &Self::Doc) -> usize;
}

/// One replaced region, expressed in the coordinates of the document the
/// step was applied to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReplacedRange {
    pub start: usize,
    pub old_size: usize,
    pub new_size: usize,
}

/// Position map for a single step.
///
/// Ranges must be sorted by `start` and must not overlap.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StepMap {
    ranges: Vec<ReplacedRange>,
}

impl StepMap {
    pub fn new(ranges: Vec<ReplacedRange>) -> Self {
        Self { ranges }
    }

    /// A map that leaves every position where it is.
    pub fn identity() -> Self {
        Self::default()
    }

    /// Map for replacing `old_size` units at `start` with `new_size` units.
    pub fn replace(start: usize, old_size: usize, new_size: usize) -> Self {
        if old_size == 0 && new_size == 0 {
            return Self::identity();
        }
        Self::new(vec![ReplacedRange { start, old_size, new_size }])
    }

    /// Re-project `pos` onto the post-step document.
    ///
    /// `assoc < 0` keeps a position at an insertion point before the inserted
    /// content; `assoc >= 0` moves it after. Positions inside a deleted or
    /// replaced region collapse to whichever edge `assoc` selects.
    pub fn map(&self, pos: usize, assoc: i8) -> usize {
        let mut diff: isize = 0;
        for range in &self.ranges {
            if range.start > pos {
                break;
            }
            let end = range.start + range.old_size;
            if pos <= end {
                let side = if range.old_size == 0 {
                    assoc
                } else if pos == range.start {
                    -1
                } else if pos == end {
                    1
                } else {
                    assoc
                };
                let base = offset(range.start, diff);
                return if side < 0 { base } else { base + range.new_size };
            }
            diff += range.new_size as isize - range.old_size as isize;
        }
        offset(pos, diff)
    }
}

fn offset(pos: usize, diff: isize) -> usize {
    pos.saturating_add_signed(diff)
}

/// Step maps composed in application order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Mapping {
    maps: Vec<StepMap>,
}

impl Mapping {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, map: StepMap) {
        self.maps.push(map);
    }

    pub fn map(&self, pos: usize, assoc: i8) -> usize {
        self.maps.iter().fold(pos, |pos, map| map.map(pos, assoc))
    }
}

impl FromIterator<StepMap> for Mapping {
    fn from_iter<I: IntoIterator<Item = StepMap>>(iter: I) -> Self {
        Self { maps: iter.into_iter().collect() }
    }
}

/// Edit session versioning: original vs. current image, pending variations
///
/// Identity is tracked with a per-session generation counter rather than by
/// comparing images, so replacing the image with an identical value still
/// counts as a change.
use serde::{Deserialize, Serialize};
use tracing::{debug, info};
use uuid::Uuid;

use crate::frame::Image;
use crate::{Result, StudioError};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum SessionState {
    /// Current image is the one the session started from
    Clean,
    /// Current image was replaced at least once
    Dirty,
    /// A structured-remix result awaits accept/discard
    VariationPending,
}

/// Pair handed to whoever persists the replacement.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SavedEdit {
    pub session_id: Uuid,
    pub original: Image,
    pub current: Image,
    pub changed: bool,
}

#[derive(Debug, Clone)]
struct Snapshot {
    image: Image,
    generation: u64,
}

#[derive(Debug, Clone)]
pub struct EditSession {
    id: Uuid,
    original: Image,
    current: Image,
    generation: u64,
    last_generation: u64,
    pending: Option<Snapshot>,
}

impl EditSession {
    pub const ORIGINAL_GENERATION: u64 = 0;

    pub fn new(original: Image) -> Self {
        let id = Uuid::new_v4();
        info!(session = %id, url = %original.url, "edit session opened");
        Self {
            id,
            current: original.clone(),
            original,
            generation: Self::ORIGINAL_GENERATION,
            last_generation: Self::ORIGINAL_GENERATION,
            pending: None,
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn original(&self) -> &Image {
        &self.original
    }

    pub fn current(&self) -> &Image {
        &self.current
    }

    /// Generation of the current image; 0 is the original.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn has_unsaved_changes(&self) -> bool {
        self.generation != Self::ORIGINAL_GENERATION
    }

    pub fn pending_variation(&self) -> Option<&Image> {
        self.pending.as_ref().map(|_| &self.current)
    }

    pub fn state(&self) -> SessionState {
        if self.pending.is_some() {
            SessionState::VariationPending
        } else if self.has_unsaved_changes() {
            SessionState::Dirty
        } else {
            SessionState::Clean
        }
    }

    /// Session-level save/discard are hidden while a variation is pending.
    pub fn can_save_or_discard(&self) -> bool {
        self.pending.is_none()
    }

    /// Make `image` the current image under a fresh generation.
    pub fn replace_current(&mut self, image: Image) -> u64 {
        self.last_generation += 1;
        self.generation = self.last_generation;
        debug!(session = %self.id, generation = self.generation, url = %image.url, "current image replaced");
        self.current = image;
        self.generation
    }

    /// Show a speculative result, remembering what it replaced.
    pub fn begin_variation(&mut self, variation: Image) -> Result<u64> {
        if self.pending.is_some() {
            return Err(StudioError::VariationPending);
        }
        let snapshot = Snapshot {
            image: self.current.clone(),
            generation: self.generation,
        };
        let generation = self.replace_current(variation);
        self.pending = Some(snapshot);
        Ok(generation)
    }

    /// Keep the variation; it is already the current image.
    pub fn accept_variation(&mut self) -> Result<()> {
        self.pending.take().ok_or(StudioError::NoVariationPending)?;
        info!(session = %self.id, generation = self.generation, "variation accepted");
        Ok(())
    }

    /// Restore exactly what was current before the regeneration, identity
    /// included.
    pub fn discard_variation(&mut self) -> Result<()> {
        let snapshot = self.pending.take().ok_or(StudioError::NoVariationPending)?;
        self.current = snapshot.image;
        self.generation = snapshot.generation;
        info!(session = %self.id, generation = self.generation, "variation discarded");
        Ok(())
    }

    /// Back to the original image.
    pub fn discard(&mut self) -> Result<()> {
        if self.pending.is_some() {
            return Err(StudioError::VariationPending);
        }
        self.current = self.original.clone();
        self.generation = Self::ORIGINAL_GENERATION;
        info!(session = %self.id, "edits discarded");
        Ok(())
    }

    pub fn save(&self) -> Result<SavedEdit> {
        if self.pending.is_some() {
            return Err(StudioError::VariationPending);
        }
        info!(session = %self.id, changed = self.has_unsaved_changes(), "edit saved");
        Ok(SavedEdit {
            session_id: self.id,
            original: self.original.clone(),
            current: self.current.clone(),
            changed: self.has_unsaved_changes(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_session_is_clean() {
        let session = EditSession::new(Image::new("a.png"));
        assert!(!session.has_unsaved_changes());
        assert_eq!(session.state(), SessionState::Clean);
        assert_eq!(session.current(), session.original());
    }

    #[test]
    fn test_identical_replacement_is_still_dirty() {
        let mut session = EditSession::new(Image::new("a.png"));
        session.replace_current(Image::new("a.png"));
        assert_eq!(session.current(), session.original());
        assert!(session.has_unsaved_changes());
        assert_eq!(session.state(), SessionState::Dirty);
    }

    #[test]
    fn test_discard_returns_to_original() {
        let mut session = EditSession::new(Image::new("a.png"));
        session.replace_current(Image::new("b.png"));
        session.replace_current(Image::new("c.png"));
        session.discard().unwrap();
        assert_eq!(session.current().url, "a.png");
        assert_eq!(session.state(), SessionState::Clean);
    }

    #[test]
    fn test_generations_never_repeat() {
        let mut session = EditSession::new(Image::new("a.png"));
        let first = session.replace_current(Image::new("b.png"));
        session.discard().unwrap();
        let second = session.replace_current(Image::new("b.png"));
        assert!(second > first);
    }

    #[test]
    fn test_variation_accept() {
        let mut session = EditSession::new(Image::new("a.png"));
        session.begin_variation(Image::new("v.png")).unwrap();
        assert_eq!(session.state(), SessionState::VariationPending);
        assert_eq!(session.pending_variation().unwrap().url, "v.png");
        assert!(!session.can_save_or_discard());
        assert_eq!(session.save(), Err(StudioError::VariationPending));
        assert_eq!(session.discard(), Err(StudioError::VariationPending));

        session.accept_variation().unwrap();
        assert_eq!(session.state(), SessionState::Dirty);
        assert_eq!(session.current().url, "v.png");
        assert_eq!(session.accept_variation(), Err(StudioError::NoVariationPending));
    }

    #[test]
    fn test_variation_discard_restores_prior_state() {
        let mut clean = EditSession::new(Image::new("a.png"));
        clean.begin_variation(Image::new("v.png")).unwrap();
        clean.discard_variation().unwrap();
        assert_eq!(clean.state(), SessionState::Clean);
        assert_eq!(clean.current(), clean.original());

        let mut dirty = EditSession::new(Image::new("a.png"));
        let before = dirty.replace_current(Image::new("b.png").with_seed(9));
        dirty.begin_variation(Image::new("v.png")).unwrap();
        assert!(dirty.begin_variation(Image::new("w.png")).is_err());
        dirty.discard_variation().unwrap();
        assert_eq!(dirty.state(), SessionState::Dirty);
        assert_eq!(dirty.generation(), before);
        assert_eq!(dirty.current(), &Image::new("b.png").with_seed(9));
    }

    #[test]
    fn test_save_reports_pair() {
        let mut session = EditSession::new(Image::new("a.png"));
        session.replace_current(Image::new("b.png"));
        let saved = session.save().unwrap();
        assert!(saved.changed);
        assert_eq!(saved.original.url, "a.png");
        assert_eq!(saved.current.url, "b.png");
        assert_eq!(saved.session_id, session.id());
    }
}

/// The editing surface: one open image, its mask, the active tool and the
/// structured remix editor, wired to a generation service
use tracing::{debug, info, warn};

use crate::capability::ImageCapabilities;
use crate::config::StudioConfig;
use crate::coords::{CoordinateMapper, Point, RenderedBox};
use crate::dispatch::{EditDispatcher, Invocation, InvocationKind, InvocationOutcome, InvocationResult};
use crate::frame::Image;
use crate::mask::MaskSurface;
use crate::prompt_diff::DescriptionEditor;
use crate::tools::{ToolKind, ToolStateMachine};
use crate::version::{EditSession, SavedEdit, SessionState};
use crate::{Result, StudioError};

pub struct EditStudio {
    session: EditSession,
    mask: MaskSurface,
    mapper: CoordinateMapper,
    tools: ToolStateMachine,
    dispatcher: EditDispatcher,
    remix: Option<DescriptionEditor>,
    last_error: Option<StudioError>,
    /// Native size of the original image
    original_size: (u32, u32),
    /// Native size to restore if the pending variation is discarded
    pre_variation_size: Option<(u32, u32)>,
}

impl EditStudio {
    /// Open `image` for editing. `native_width`/`native_height` are the
    /// decoded pixel dimensions; until a viewport is reported the image is
    /// assumed to be drawn 1:1 at the origin.
    pub fn open(image: Image, native_width: u32, native_height: u32, config: StudioConfig) -> Self {
        let tools = ToolStateMachine::new(config);
        let mask = MaskSurface::new(native_width, native_height, tools.inputs().brush_diameter);
        let mapper = CoordinateMapper::new(
            RenderedBox::new(0.0, 0.0, native_width as f32, native_height as f32),
            native_width,
            native_height,
        );
        Self {
            session: EditSession::new(image),
            mask,
            mapper,
            tools,
            dispatcher: EditDispatcher::new(),
            remix: None,
            last_error: None,
            original_size: (native_width, native_height),
            pre_variation_size: None,
        }
    }

    pub fn session(&self) -> &EditSession {
        &self.session
    }

    pub fn current(&self) -> &Image {
        self.session.current()
    }

    pub fn state(&self) -> SessionState {
        self.session.state()
    }

    pub fn has_unsaved_changes(&self) -> bool {
        self.session.has_unsaved_changes()
    }

    pub fn can_save_or_discard(&self) -> bool {
        self.session.can_save_or_discard() && !self.is_processing()
    }

    pub fn mask(&self) -> &MaskSurface {
        &self.mask
    }

    pub fn mapper(&self) -> &CoordinateMapper {
        &self.mapper
    }

    pub fn tools(&self) -> &ToolStateMachine {
        &self.tools
    }

    /// Per-tool text and numeric inputs. Brush size is set through
    /// [`EditStudio::set_brush_diameter`].
    pub fn tools_mut(&mut self) -> &mut ToolStateMachine {
        &mut self.tools
    }

    pub fn active_tool(&self) -> ToolKind {
        self.tools.active()
    }

    pub fn is_processing(&self) -> bool {
        self.dispatcher.is_processing()
    }

    pub fn remix(&self) -> Option<&DescriptionEditor> {
        self.remix.as_ref()
    }

    pub fn remix_mut(&mut self) -> Option<&mut DescriptionEditor> {
        self.remix.as_mut()
    }

    /// Most recent failure, for display.
    pub fn last_error(&self) -> Option<&StudioError> {
        self.last_error.as_ref()
    }

    pub fn take_error(&mut self) -> Option<StudioError> {
        self.last_error.take()
    }

    /// Layout changed: the image is now drawn inside `rendered`.
    pub fn set_viewport(&mut self, rendered: RenderedBox) {
        self.mapper.set_rendered(rendered);
    }

    /// The current image decoded at a new native size. Clears the mask.
    pub fn set_native_size(&mut self, width: u32, height: u32) {
        self.mapper.set_native_size(width, height);
        self.mask.resize(width, height);
    }

    pub fn select_tool(&mut self, tool: ToolKind) -> Result<()> {
        self.tools
            .select(tool, self.session.has_unsaved_changes(), self.is_processing())
    }

    pub fn set_brush_diameter(&mut self, diameter: f32) -> f32 {
        let applied = self.tools.set_brush_diameter(diameter);
        self.mask.set_brush_diameter(applied);
        applied
    }

    fn accepts_strokes(&self) -> bool {
        self.tools.active().requires_mask() && !self.is_processing()
    }

    pub fn pointer_down(&mut self, viewport: Point) {
        if self.accepts_strokes() {
            self.mask.begin(self.mapper.to_native(viewport));
        }
    }

    pub fn pointer_move(&mut self, viewport: Point) {
        if self.accepts_strokes() && self.mask.is_stroking() {
            self.mask.extend(self.mapper.to_native(viewport));
        }
    }

    pub fn pointer_up(&mut self) {
        self.mask.end();
    }

    pub fn clear_mask(&mut self) {
        self.mask.clear();
    }

    /// Validate the active tool and claim the processing guard.
    pub fn prepare_apply(&mut self) -> Result<Invocation> {
        let prepared = self
            .dispatcher
            .prepare_edit(&self.session, &self.tools, &self.mask);
        self.record(prepared)
    }

    /// Enter structured remix and request the description to edit. The tool
    /// only switches once the request is known to be valid.
    pub fn prepare_remix(&mut self) -> Result<Invocation> {
        let has_unsaved_changes = self.session.has_unsaved_changes();
        let prepared = self
            .tools
            .can_select(ToolKind::StructuredRemix, has_unsaved_changes, self.is_processing())
            .and_then(|_| self.dispatcher.prepare_analysis(&self.session))
            .and_then(|invocation| {
                match self
                    .tools
                    .select(ToolKind::StructuredRemix, has_unsaved_changes, false)
                {
                    Ok(()) => Ok(invocation),
                    Err(err) => {
                        self.dispatcher.abandon();
                        Err(err)
                    }
                }
            });
        self.record(prepared)
    }

    /// Build the regeneration instruction from the remix editor's changes.
    /// Refused locally when nothing changed.
    pub fn prepare_regeneration(&mut self) -> Result<Invocation> {
        let instruction = match &self.remix {
            Some(editor) => editor.regeneration_instruction(),
            None => Err(StudioError::MissingStructuredDescription),
        };
        let prepared = instruction.and_then(|instruction| {
            self.dispatcher
                .prepare_regeneration(&self.session, instruction)
        });
        self.record(prepared)
    }

    /// Fold an outcome back into the session and release the guard.
    /// Failures leave image, mask and inputs untouched.
    pub fn complete(&mut self, outcome: InvocationOutcome) -> Result<()> {
        if let Err(err) = self.dispatcher.finish(outcome.id) {
            warn!(invocation = %outcome.id, "dropping outcome of a stale invocation");
            return Err(err);
        }
        let applied = match (outcome.kind, outcome.result) {
            (_, Err(err)) => Err(err),
            (InvocationKind::Edit(operation), Ok(InvocationResult::Image(image))) => {
                info!(tool = %operation.tool(), url = %image.url, "edit applied");
                self.session.replace_current(image);
                self.mask.clear();
                self.tools.finish_apply();
                self.remix = None;
                Ok(())
            }
            (InvocationKind::Analyze, Ok(InvocationResult::Description(description))) => {
                debug!(fields = description.len(), "structured description ready");
                self.remix = Some(DescriptionEditor::new(&description));
                Ok(())
            }
            (InvocationKind::Regenerate { .. }, Ok(InvocationResult::Image(image))) => {
                info!(url = %image.url, "variation ready");
                let size = self.mapper.native_size();
                self.session.begin_variation(image).map(|_| {
                    self.pre_variation_size = Some(size);
                    self.mask.clear();
                })
            }
            (kind, Ok(_)) => Err(StudioError::MalformedResponse(format!(
                "unexpected result for {} request",
                kind.tool()
            ))),
        };
        self.record(applied)
    }

    /// Apply the active tool: validate, call the service, fold the result.
    pub async fn apply(&mut self, backend: &dyn ImageCapabilities) -> Result<()> {
        let invocation = self.prepare_apply()?;
        let outcome = invocation.run(backend).await;
        self.complete(outcome)
    }

    /// Enter structured remix and load the editable description.
    pub async fn open_remix(&mut self, backend: &dyn ImageCapabilities) -> Result<()> {
        let invocation = self.prepare_remix()?;
        let outcome = invocation.run(backend).await;
        self.complete(outcome)
    }

    /// Regenerate from the remix edits; the result is a pending variation.
    pub async fn regenerate(&mut self, backend: &dyn ImageCapabilities) -> Result<()> {
        let invocation = self.prepare_regeneration()?;
        let outcome = invocation.run(backend).await;
        self.complete(outcome)
    }

    /// Keep the variation. The remix editor restarts from its description.
    pub fn accept_variation(&mut self) -> Result<()> {
        self.session.accept_variation()?;
        self.pre_variation_size = None;
        self.remix = self
            .session
            .current()
            .structured_description
            .as_ref()
            .map(DescriptionEditor::new);
        Ok(())
    }

    /// Drop the variation and restore the pre-regeneration image and its
    /// native size. Field edits are kept so they can be adjusted and retried.
    pub fn discard_variation(&mut self) -> Result<()> {
        self.session.discard_variation()?;
        match self.pre_variation_size.take() {
            Some((width, height)) => self.set_native_size(width, height),
            None => self.mask.clear(),
        }
        Ok(())
    }

    /// Revert to the original image and clear the mask.
    pub fn discard(&mut self) -> Result<()> {
        if self.is_processing() {
            return Err(StudioError::Busy);
        }
        self.session.discard()?;
        let (width, height) = self.original_size;
        self.set_native_size(width, height);
        self.pre_variation_size = None;
        self.remix = None;
        self.tools.reset();
        self.mask.set_brush_diameter(self.tools.inputs().brush_diameter);
        Ok(())
    }

    /// Original/current pair for the persistence layer. The studio is done
    /// after this; drop it once the pair is stored.
    pub fn save(&self) -> Result<SavedEdit> {
        if self.is_processing() {
            return Err(StudioError::Busy);
        }
        self.session.save()
    }

    fn record<T>(&mut self, result: Result<T>) -> Result<T> {
        match result {
            Ok(value) => Ok(value),
            Err(err) => {
                self.last_error = Some(err.clone());
                Err(err)
            }
        }
    }
}

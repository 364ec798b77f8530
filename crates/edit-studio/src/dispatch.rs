/// One-at-a-time dispatch of edit, analysis and regeneration requests
///
/// Dispatch is split in two so an event loop never blocks: `prepare_*`
/// validates and marks the dispatcher busy, the returned [`Invocation`] is
/// awaited wherever the caller likes (it is `Send`), and `finish` releases
/// the dispatcher when the outcome comes back.
use tracing::{info, warn};
use uuid::Uuid;

use crate::capability::ImageCapabilities;
use crate::description::StructuredDescription;
use crate::frame::Image;
use crate::mask::MaskSurface;
use crate::tools::{EditOperation, ToolKind, ToolStateMachine};
use crate::version::EditSession;
use crate::{Result, StudioError};

#[derive(Debug, Clone, PartialEq)]
pub enum InvocationKind {
    Edit(EditOperation),
    Analyze,
    Regenerate { instruction: String },
}

impl InvocationKind {
    pub fn tool(&self) -> ToolKind {
        match self {
            Self::Edit(operation) => operation.tool(),
            Self::Analyze | Self::Regenerate { .. } => ToolKind::StructuredRemix,
        }
    }

    fn label(&self) -> &'static str {
        match self {
            Self::Edit(_) => "edit",
            Self::Analyze => "analyze",
            Self::Regenerate { .. } => "regenerate",
        }
    }
}

/// A validated request, detached from the session so it can be awaited
/// elsewhere.
#[derive(Debug, Clone)]
pub struct Invocation {
    id: Uuid,
    source: Image,
    kind: InvocationKind,
}

#[derive(Debug, Clone, PartialEq)]
pub enum InvocationResult {
    Image(Image),
    Description(StructuredDescription),
}

#[derive(Debug, Clone)]
pub struct InvocationOutcome {
    pub id: Uuid,
    pub kind: InvocationKind,
    pub result: Result<InvocationResult>,
}

impl Invocation {
    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn kind(&self) -> &InvocationKind {
        &self.kind
    }

    /// Image the request was built from.
    pub fn source(&self) -> &Image {
        &self.source
    }

    pub async fn run(self, backend: &dyn ImageCapabilities) -> InvocationOutcome {
        info!(
            invocation = %self.id,
            service = backend.name(),
            kind = self.kind.label(),
            tool = %self.kind.tool(),
            "dispatching"
        );
        let result = self.execute(backend).await;
        if let Err(err) = &result {
            warn!(invocation = %self.id, error = %err, "invocation failed");
        }
        InvocationOutcome {
            id: self.id,
            kind: self.kind,
            result,
        }
    }

    async fn execute(&self, backend: &dyn ImageCapabilities) -> Result<InvocationResult> {
        let carried = self.source.structured_description.as_ref();
        match &self.kind {
            InvocationKind::Edit(operation) => {
                let response = backend
                    .edit(&self.source, operation)
                    .await
                    .map_err(capability_error)?;
                Ok(InvocationResult::Image(response.into_image(carried)?))
            }
            InvocationKind::Analyze => {
                let description = carried.ok_or(StudioError::MissingStructuredDescription)?;
                let analyzed = backend
                    .analyze_structure(description)
                    .await
                    .map_err(capability_error)?;
                Ok(InvocationResult::Description(analyzed))
            }
            InvocationKind::Regenerate { instruction } => {
                let response = backend
                    .regenerate(instruction, &self.source)
                    .await
                    .map_err(capability_error)?;
                Ok(InvocationResult::Image(response.into_image(carried)?))
            }
        }
    }
}

fn capability_error(err: anyhow::Error) -> StudioError {
    StudioError::Capability(format!("{err:#}"))
}

/// Processing guard: at most one invocation in flight.
#[derive(Debug, Default)]
pub struct EditDispatcher {
    in_flight: Option<Uuid>,
}

impl EditDispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_processing(&self) -> bool {
        self.in_flight.is_some()
    }

    pub fn in_flight(&self) -> Option<Uuid> {
        self.in_flight
    }

    /// Validate the active tool against the current image and mask.
    pub fn prepare_edit(
        &mut self,
        session: &EditSession,
        tools: &ToolStateMachine,
        mask: &MaskSurface,
    ) -> Result<Invocation> {
        self.ensure_idle()?;
        if session.pending_variation().is_some() {
            return Err(StudioError::VariationPending);
        }
        let operation = tools.build_operation(mask)?;
        Ok(self.start(session.current().clone(), InvocationKind::Edit(operation)))
    }

    /// Refused while a variation is pending, so the remix editor's baseline
    /// is always a description on a settled image.
    pub fn prepare_analysis(&mut self, session: &EditSession) -> Result<Invocation> {
        self.ensure_idle()?;
        if session.pending_variation().is_some() {
            return Err(StudioError::VariationPending);
        }
        if !session.current().has_structured_description() {
            return Err(StudioError::MissingStructuredDescription);
        }
        Ok(self.start(session.current().clone(), InvocationKind::Analyze))
    }

    pub fn prepare_regeneration(
        &mut self,
        session: &EditSession,
        instruction: String,
    ) -> Result<Invocation> {
        self.ensure_idle()?;
        if session.pending_variation().is_some() {
            return Err(StudioError::VariationPending);
        }
        if instruction.trim().is_empty() {
            return Err(StudioError::NothingToRegenerate);
        }
        Ok(self.start(
            session.current().clone(),
            InvocationKind::Regenerate { instruction },
        ))
    }

    /// Release the guard for `id`. Outcomes of anything else are refused.
    pub fn finish(&mut self, id: Uuid) -> Result<()> {
        match self.in_flight {
            Some(current) if current == id => {
                self.in_flight = None;
                Ok(())
            }
            _ => Err(StudioError::StaleInvocation(id)),
        }
    }

    /// Forget the in-flight request; its outcome will be refused as stale.
    pub fn abandon(&mut self) {
        if let Some(id) = self.in_flight.take() {
            warn!(invocation = %id, "abandoning in-flight invocation");
        }
    }

    fn ensure_idle(&self) -> Result<()> {
        if self.is_processing() {
            Err(StudioError::Busy)
        } else {
            Ok(())
        }
    }

    fn start(&mut self, source: Image, kind: InvocationKind) -> Invocation {
        let id = Uuid::new_v4();
        self.in_flight = Some(id);
        Invocation { id, source, kind }
    }
}

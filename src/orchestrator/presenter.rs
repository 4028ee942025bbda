//! Presentation collaborator interface.
//!
//! Presentation layers never inspect the pipeline; they receive `PipelineEvent`s and turn
//! them into output through this trait.

use crate::error::OrchestratorError;
use crate::model::{Candidate, Generation, PipelineEvent, Query};

/// Work that has started, for loading indicators.
#[derive(Debug, Clone, Copy)]
pub enum Progress<'a, P> {
    Resolving(&'a Query),
    Fetching(&'a Candidate<P>),
}

pub trait Presenter<P, D> {
    fn on_progress(&mut self, _generation: Generation, _progress: Progress<'_, P>) {}
    /// A selection answering this list must carry `generation`.
    fn on_ambiguous(&mut self, generation: Generation, candidates: Vec<Candidate<P>>);
    fn on_no_match(&mut self, query: &Query);
    fn on_result(&mut self, detail: D);
    /// Both failed pipelines and refused commands land here; `error.stage()` tells them apart.
    fn on_error(&mut self, error: &OrchestratorError);
}

/// Route one event to the matching presenter callback.
pub fn dispatch<P, D, T>(presenter: &mut T, event: PipelineEvent<P, D>)
where
    T: Presenter<P, D> + ?Sized,
{
    match event {
        PipelineEvent::Resolving { generation, query } => {
            presenter.on_progress(generation, Progress::Resolving(&query))
        }
        PipelineEvent::Fetching {
            generation,
            candidate,
        } => presenter.on_progress(generation, Progress::Fetching(&candidate)),
        PipelineEvent::Ambiguous {
            generation,
            candidates,
        } => presenter.on_ambiguous(generation, candidates),
        PipelineEvent::NoMatch { query, .. } => presenter.on_no_match(&query),
        PipelineEvent::Completed { detail, .. } => presenter.on_result(*detail),
        PipelineEvent::Failed { error, .. } | PipelineEvent::Rejected { error } => {
            presenter.on_error(&error)
        }
    }
}

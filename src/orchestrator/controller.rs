//! Pipeline driver.
//!
//! Runs stage calls on spawned tasks, applies their outcomes to the `Pipeline`, and emits
//! events for presentation layers. Only this task touches the pipeline.

use super::pipeline::{AfterResolve, Pipeline};
use crate::error::LookupError;
use crate::model::{Candidate, Generation, PipelineEvent, Query};
use crate::source::DependentSource;
use anyhow::Result;
use std::sync::Arc;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tokio::task::JoinHandle;

/// Commands emitted by UI layers.
#[derive(Debug, Clone)]
pub(crate) enum UiCommand<P> {
    /// Start a new lookup, superseding any unfinished one.
    Submit(Query),
    /// Answer a pending choice: the generation of the `Ambiguous` event and the position
    /// of the chosen entry in its list.
    Select {
        generation: Generation,
        index: usize,
        candidate: Candidate<P>,
    },
    Quit,
}

/// Outcome of one remote call, tagged with the generation it was started under.
enum Completion<P, D> {
    Resolved {
        generation: Generation,
        query: Query,
        outcome: Result<Vec<Candidate<P>>, LookupError>,
    },
    Detail {
        generation: Generation,
        outcome: Result<D, LookupError>,
    },
}

type Events<S> =
    UnboundedSender<PipelineEvent<<S as DependentSource>::Payload, <S as DependentSource>::Detail>>;
type Completions<S> =
    UnboundedSender<Completion<<S as DependentSource>::Payload, <S as DependentSource>::Detail>>;

fn spawn_resolve<S: DependentSource>(
    source: Arc<S>,
    generation: Generation,
    query: Query,
    done_tx: Completions<S>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let outcome = source.resolve(&query).await;
        let _ = done_tx.send(Completion::Resolved {
            generation,
            query,
            outcome,
        });
    })
}

fn spawn_detail<S: DependentSource>(
    source: Arc<S>,
    generation: Generation,
    candidate: Candidate<S::Payload>,
    done_tx: Completions<S>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let outcome = source.fetch_detail(&candidate).await;
        let _ = done_tx.send(Completion::Detail {
            generation,
            outcome,
        });
    })
}

/// Drive lookups from UI commands until `Quit` arrives or the command channel closes.
pub(crate) async fn run_controller<S: DependentSource>(
    source: Arc<S>,
    event_tx: Events<S>,
    mut cmd_rx: UnboundedReceiver<UiCommand<S::Payload>>,
) -> Result<()> {
    let mut pipeline = Pipeline::<S::Payload>::new();
    let (done_tx, mut done_rx) = mpsc::unbounded_channel();
    // Superseded calls keep running until they finish; their outcomes are dropped on arrival.
    let mut tasks: Vec<JoinHandle<()>> = Vec::new();

    loop {
        tokio::select! {
            cmd = cmd_rx.recv() => {
                match cmd {
                    Some(UiCommand::Submit(query)) => match pipeline.submit(query.clone()) {
                        Ok(generation) => {
                            tracing::debug!(%generation, %query, "resolving");
                            let _ = event_tx.send(PipelineEvent::Resolving {
                                generation,
                                query: query.clone(),
                            });
                            tasks.push(spawn_resolve(source.clone(), generation, query, done_tx.clone()));
                        }
                        Err(error) => {
                            let _ = event_tx.send(PipelineEvent::Rejected { error });
                        }
                    },
                    Some(UiCommand::Select { generation, index, candidate }) => {
                        match pipeline.select(generation, index, &candidate) {
                            Ok((generation, candidate)) => {
                                tracing::debug!(%generation, %candidate, index, "selected");
                                let _ = event_tx.send(PipelineEvent::Fetching {
                                    generation,
                                    candidate: candidate.clone(),
                                });
                                tasks.push(spawn_detail(source.clone(), generation, candidate, done_tx.clone()));
                            }
                            Err(error) => {
                                let _ = event_tx.send(PipelineEvent::Rejected { error });
                            }
                        }
                    }
                    Some(UiCommand::Quit) | None => break,
                }
            }
            Some(done) = done_rx.recv() => {
                match done {
                    Completion::Resolved { generation, query, outcome } => {
                        match pipeline.on_resolved(generation, outcome) {
                            None => tracing::debug!(%generation, "discarding stale lookup result"),
                            Some(AfterResolve::NoMatch) => {
                                let _ = event_tx.send(PipelineEvent::NoMatch { generation, query });
                            }
                            Some(AfterResolve::Choose(candidates)) => {
                                let _ = event_tx.send(PipelineEvent::Ambiguous { generation, candidates });
                            }
                            Some(AfterResolve::FetchDetail(candidate)) => {
                                let _ = event_tx.send(PipelineEvent::Fetching {
                                    generation,
                                    candidate: candidate.clone(),
                                });
                                tasks.push(spawn_detail(source.clone(), generation, candidate, done_tx.clone()));
                            }
                            Some(AfterResolve::Failed(error)) => {
                                tracing::warn!(%generation, %error, "lookup failed");
                                let _ = event_tx.send(PipelineEvent::Failed { generation, error });
                            }
                        }
                    }
                    Completion::Detail { generation, outcome } => {
                        match pipeline.on_detail(generation, outcome) {
                            None => tracing::debug!(%generation, "discarding stale detail result"),
                            Some(Ok(detail)) => {
                                let _ = event_tx.send(PipelineEvent::Completed {
                                    generation,
                                    detail: Box::new(detail),
                                });
                            }
                            Some(Err(error)) => {
                                tracing::warn!(%generation, %error, "detail fetch failed");
                                let _ = event_tx.send(PipelineEvent::Failed { generation, error });
                            }
                        }
                    }
                }
            }
        }
        tasks.retain(|h| !h.is_finished());
    }

    for handle in tasks {
        handle.abort();
    }
    Ok(())
}

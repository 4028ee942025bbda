//! Pure state machine for one dependent lookup.
//!
//! `Pipeline` performs no I/O. The controller asks it what to do next and feeds it the
//! outcome of each remote call, tagged with the generation the call was started under.
//! Outcomes from older generations are dropped, which is how a superseded query can never
//! overwrite the result of a newer one.

use super::matcher::match_candidates;
use crate::error::{LookupError, OrchestratorError};
use crate::model::{Candidate, Generation, Query, Resolution};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PipelineState<P> {
    Idle,
    AwaitingStage1 {
        query: Query,
    },
    NoMatchTerminal {
        query: Query,
    },
    AwaitingUserChoice {
        query: Query,
        candidates: Vec<Candidate<P>>,
    },
    AwaitingStage2 {
        query: Query,
        candidate: Candidate<P>,
    },
    Done {
        query: Query,
        candidate: Candidate<P>,
    },
    Failed {
        query: Query,
        error: OrchestratorError,
    },
}

/// Next step after stage 1 completed for the current generation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AfterResolve<P> {
    NoMatch,
    Choose(Vec<Candidate<P>>),
    FetchDetail(Candidate<P>),
    Failed(OrchestratorError),
}

#[derive(Debug)]
pub struct Pipeline<P> {
    generation: Generation,
    state: PipelineState<P>,
}

impl<P> Default for Pipeline<P> {
    fn default() -> Self {
        Self {
            generation: Generation::default(),
            state: PipelineState::Idle,
        }
    }
}

impl<P: Clone> Pipeline<P> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn generation(&self) -> Generation {
        self.generation
    }

    pub fn state(&self) -> &PipelineState<P> {
        &self.state
    }

    /// True while a remote call or a user choice is outstanding.
    pub fn is_in_flight(&self) -> bool {
        matches!(
            self.state,
            PipelineState::AwaitingStage1 { .. }
                | PipelineState::AwaitingUserChoice { .. }
                | PipelineState::AwaitingStage2 { .. }
        )
    }

    /// Start stage 1 for `query` under a fresh generation, superseding whatever was running.
    ///
    /// Re-submitting the query that is currently waiting for a choice is refused; the
    /// pending choice has to be made (or a different query submitted) first.
    pub fn submit(&mut self, query: Query) -> Result<Generation, OrchestratorError> {
        if let PipelineState::AwaitingUserChoice { query: pending, .. } = &self.state {
            if *pending == query {
                return Err(OrchestratorError::AmbiguousUnresolved);
            }
        }
        if self.is_in_flight() {
            tracing::debug!(superseded = %self.generation, "new query supersedes pipeline");
        }
        self.generation = self.generation.next();
        self.state = PipelineState::AwaitingStage1 { query };
        Ok(self.generation)
    }

    /// Apply the stage-1 outcome. Returns `None` when the outcome is stale.
    pub fn on_resolved(
        &mut self,
        generation: Generation,
        outcome: Result<Vec<Candidate<P>>, LookupError>,
    ) -> Option<AfterResolve<P>> {
        if generation != self.generation {
            return None;
        }
        let query = match &self.state {
            PipelineState::AwaitingStage1 { query } => query.clone(),
            _ => return None,
        };

        let raw = match outcome {
            Ok(raw) if raw.is_empty() => {
                return Some(self.fail(query, OrchestratorError::NoCandidates));
            }
            Ok(raw) => raw,
            Err(e) => {
                return Some(self.fail(query, OrchestratorError::ResolveFailed(e)));
            }
        };

        let step = match match_candidates(&query, raw) {
            Resolution::NoMatch => {
                self.state = PipelineState::NoMatchTerminal { query };
                AfterResolve::NoMatch
            }
            Resolution::UniqueMatch(candidate) => {
                self.state = PipelineState::AwaitingStage2 {
                    query,
                    candidate: candidate.clone(),
                };
                AfterResolve::FetchDetail(candidate)
            }
            Resolution::Ambiguous(candidates) => {
                self.state = PipelineState::AwaitingUserChoice {
                    query,
                    candidates: candidates.clone(),
                };
                AfterResolve::Choose(candidates)
            }
        };
        Some(step)
    }

    /// Collapse a pending choice to one candidate and move on to stage 2.
    ///
    /// `generation` and `index` identify the offered entry being answered: the generation of
    /// the `Ambiguous` event and the entry's position in its list. The entry at that position
    /// must also carry `choice`'s label and region. The returned candidate is the stored
    /// stage-1 entry, not the caller's copy. On error the state is left as it was.
    pub fn select(
        &mut self,
        generation: Generation,
        index: usize,
        choice: &Candidate<P>,
    ) -> Result<(Generation, Candidate<P>), OrchestratorError> {
        let (query, chosen) = match &self.state {
            PipelineState::AwaitingUserChoice { query, candidates } => {
                if generation != self.generation {
                    return Err(OrchestratorError::InvalidSelection);
                }
                let chosen = candidates
                    .get(index)
                    .filter(|c| *c == choice)
                    .cloned()
                    .ok_or(OrchestratorError::InvalidSelection)?;
                (query.clone(), chosen)
            }
            _ => return Err(OrchestratorError::SelectionNotExpected),
        };
        self.state = PipelineState::AwaitingStage2 {
            query,
            candidate: chosen.clone(),
        };
        Ok((self.generation, chosen))
    }

    /// Apply the stage-2 outcome. Returns `None` when the outcome is stale.
    pub fn on_detail<D>(
        &mut self,
        generation: Generation,
        outcome: Result<D, LookupError>,
    ) -> Option<Result<D, OrchestratorError>> {
        if generation != self.generation {
            return None;
        }
        let (query, candidate) = match &self.state {
            PipelineState::AwaitingStage2 { query, candidate } => {
                (query.clone(), candidate.clone())
            }
            _ => return None,
        };
        match outcome {
            Ok(detail) => {
                self.state = PipelineState::Done { query, candidate };
                Some(Ok(detail))
            }
            Err(e) => {
                let error = OrchestratorError::DetailFetchFailed(e);
                self.state = PipelineState::Failed {
                    query,
                    error: error.clone(),
                };
                Some(Err(error))
            }
        }
    }

    fn fail(&mut self, query: Query, error: OrchestratorError) -> AfterResolve<P> {
        self.state = PipelineState::Failed {
            query,
            error: error.clone(),
        };
        AfterResolve::Failed(error)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn c(label: &str, region: &str, id: u32) -> Candidate<u32> {
        Candidate::new(label, region, id)
    }

    fn springfields() -> Vec<Candidate<u32>> {
        vec![c("Springfield", "IL", 1), c("Springfield", "MO", 2)]
    }

    fn awaiting_choice() -> (Pipeline<u32>, Generation) {
        let mut p = Pipeline::new();
        let g = p.submit(Query::new("Springfield", "")).unwrap();
        let step = p.on_resolved(g, Ok(springfields())).unwrap();
        assert!(matches!(step, AfterResolve::Choose(ref l) if l.len() == 2));
        (p, g)
    }

    #[test]
    fn unique_match_goes_straight_to_stage_two() {
        let mut p = Pipeline::new();
        let g = p.submit(Query::new("Springfield", "MO")).unwrap();
        let step = p.on_resolved(g, Ok(springfields())).unwrap();
        assert!(matches!(step, AfterResolve::FetchDetail(ref c) if c.payload == 2));
        assert!(matches!(p.state(), PipelineState::AwaitingStage2 { .. }));

        let done = p.on_detail(g, Ok("sunny")).unwrap();
        assert_eq!(done, Ok("sunny"));
        assert!(matches!(p.state(), PipelineState::Done { .. }));
        assert!(!p.is_in_flight());
    }

    #[test]
    fn selection_moves_choice_to_stage_two() {
        let (mut p, g) = awaiting_choice();
        // Payload on the caller's copy is ignored; the stored entry is used.
        let (sel_gen, chosen) = p.select(g, 1, &c("Springfield", "MO", 999)).unwrap();
        assert_eq!(sel_gen, g);
        assert_eq!(chosen.payload, 2);
        assert!(matches!(
            p.state(),
            PipelineState::AwaitingStage2 { candidate, .. } if candidate.payload == 2
        ));
    }

    #[test]
    fn invalid_selection_leaves_choice_pending() {
        let (mut p, g) = awaiting_choice();
        let before = p.state().clone();
        let err = p.select(g, 2, &c("Springfield", "OR", 3)).unwrap_err();
        assert_eq!(err, OrchestratorError::InvalidSelection);
        // Right entry, wrong position.
        let err = p.select(g, 0, &c("Springfield", "MO", 2)).unwrap_err();
        assert_eq!(err, OrchestratorError::InvalidSelection);
        assert_eq!(p.state(), &before);
    }

    #[test]
    fn selecting_without_pending_choice_is_rejected() {
        let mut p = Pipeline::<u32>::new();
        assert_eq!(
            p.select(Generation(0), 0, &c("Springfield", "IL", 1)).unwrap_err(),
            OrchestratorError::SelectionNotExpected
        );
        let g = p.submit(Query::new("Springfield", "IL")).unwrap();
        assert_eq!(
            p.select(g, 0, &c("Springfield", "IL", 1)).unwrap_err(),
            OrchestratorError::SelectionNotExpected
        );
        assert!(matches!(p.state(), PipelineState::AwaitingStage1 { .. }));
        assert_eq!(p.generation(), g);
    }

    #[test]
    fn resubmitting_pending_query_is_ambiguous_unresolved() {
        let (mut p, g) = awaiting_choice();
        let err = p.submit(Query::new("Springfield", "")).unwrap_err();
        assert_eq!(err, OrchestratorError::AmbiguousUnresolved);
        assert_eq!(p.generation(), g);
        assert!(matches!(p.state(), PipelineState::AwaitingUserChoice { .. }));
    }

    #[test]
    fn different_query_supersedes_pending_choice() {
        let (mut p, g) = awaiting_choice();
        let g2 = p.submit(Query::new("Springfield", "IL")).unwrap();
        assert!(g2 > g);
        assert!(matches!(p.state(), PipelineState::AwaitingStage1 { .. }));
        // An old choice can no longer be made.
        assert_eq!(
            p.select(g, 1, &c("Springfield", "MO", 2)).unwrap_err(),
            OrchestratorError::SelectionNotExpected
        );
    }

    #[test]
    fn choosing_second_of_two_identical_places_keeps_its_own_payload() {
        let mut p = Pipeline::new();
        let g = p.submit(Query::new("Portland", "Maine")).unwrap();
        let offered = vec![c("Portland", "Maine", 1), c("Portland", "Maine", 2)];
        assert!(matches!(
            p.on_resolved(g, Ok(offered.clone())),
            Some(AfterResolve::Choose(ref l)) if l.len() == 2
        ));

        let (_, chosen) = p.select(g, 1, &offered[1]).unwrap();
        assert_eq!(chosen.payload, 2);
        assert!(matches!(
            p.state(),
            PipelineState::AwaitingStage2 { candidate, .. } if candidate.payload == 2
        ));
    }

    #[test]
    fn selection_from_an_older_choice_list_is_invalid() {
        let (mut p, old) = awaiting_choice();
        // A different query offers a new list.
        let new = p.submit(Query::new("Springfield", "Sangamon")).unwrap();
        p.on_resolved(
            new,
            Ok(vec![c("Springfield", "Sangamon", 1), c("Springfield", "Sangamon", 2)]),
        );
        assert!(matches!(p.state(), PipelineState::AwaitingUserChoice { .. }));

        let before = p.state().clone();
        assert_eq!(
            p.select(old, 0, &c("Springfield", "Sangamon", 1)).unwrap_err(),
            OrchestratorError::InvalidSelection
        );
        assert_eq!(p.state(), &before);
        assert!(p.select(new, 0, &c("Springfield", "Sangamon", 1)).is_ok());
    }

    #[test]
    fn stale_detail_is_dropped() {
        let mut p = Pipeline::new();
        let a = p.submit(Query::new("Springfield", "IL")).unwrap();
        assert!(p.on_resolved(a, Ok(springfields())).is_some());

        let b = p.submit(Query::new("Springfield", "MO")).unwrap();
        assert!(matches!(
            p.on_resolved(b, Ok(springfields())),
            Some(AfterResolve::FetchDetail(_))
        ));
        assert_eq!(p.on_detail(b, Ok("B")), Some(Ok("B")));
        // A finishes last and must not be applied.
        assert_eq!(p.on_detail(a, Ok("A")), None);
        assert!(matches!(p.state(), PipelineState::Done { candidate, .. } if candidate.payload == 2));
    }

    #[test]
    fn stale_resolve_is_dropped() {
        let mut p = Pipeline::new();
        let a = p.submit(Query::new("Springfield", "IL")).unwrap();
        let b = p.submit(Query::new("Springfield", "MO")).unwrap();
        assert_eq!(p.on_resolved(a, Ok(springfields())), None);
        assert!(matches!(p.state(), PipelineState::AwaitingStage1 { query } if query.disambiguator == "MO"));
        assert!(p.on_resolved(b, Ok(springfields())).is_some());
    }

    #[test]
    fn transport_failure_in_stage_one_never_reaches_stage_two() {
        let mut p = Pipeline::<u32>::new();
        let g = p.submit(Query::new("Springfield", "IL")).unwrap();
        let step = p
            .on_resolved(g, Err(LookupError::Transport("connection refused".into())))
            .unwrap();
        let expected =
            OrchestratorError::ResolveFailed(LookupError::Transport("connection refused".into()));
        assert_eq!(step, AfterResolve::Failed(expected.clone()));
        assert!(matches!(p.state(), PipelineState::Failed { error, .. } if *error == expected));
        // A late detail outcome for this generation has nothing to attach to.
        assert_eq!(p.on_detail(g, Ok("x")), None);
    }

    #[test]
    fn empty_stage_one_is_no_candidates_and_filtered_empty_is_no_match() {
        let mut p = Pipeline::<u32>::new();
        let g = p.submit(Query::new("Atlantis", "")).unwrap();
        assert_eq!(
            p.on_resolved(g, Ok(Vec::new())),
            Some(AfterResolve::Failed(OrchestratorError::NoCandidates))
        );

        let g = p.submit(Query::new("Springfield", "OR")).unwrap();
        assert_eq!(
            p.on_resolved(g, Ok(springfields())),
            Some(AfterResolve::NoMatch)
        );
        assert!(matches!(p.state(), PipelineState::NoMatchTerminal { .. }));
    }

    #[test]
    fn failed_detail_is_tagged_and_pipeline_can_restart() {
        let mut p = Pipeline::new();
        let g = p.submit(Query::new("Springfield", "IL")).unwrap();
        p.on_resolved(g, Ok(springfields()));
        let err = p.on_detail::<&str>(g, Err(LookupError::Http(502))).unwrap();
        assert_eq!(
            err,
            Err(OrchestratorError::DetailFetchFailed(LookupError::Http(502)))
        );
        assert!(!p.is_in_flight());
        assert!(p.submit(Query::new("Springfield", "IL")).is_ok());
    }
}

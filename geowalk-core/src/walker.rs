//! Sequential reverse geocoding over a fixed coordinate list
//!
//! The walker is a plain state machine: it hands out one `Step` at a time and
//! is fed the outcome of each lookup. It never performs I/O, so the chain of
//! lookups is driven by whoever owns the dispatch loop and no call stack
//! grows with the length of the list.

use crate::coord::Coordinate;
use crate::error::{LookupError, WalkError};
use crate::search::{Place, SearchOptions};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// What happens to the cursor when a lookup fails
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ErrorPolicy {
    /// Stop and keep the cursor on the failed index; the next trigger retries it
    #[default]
    Halt,
    /// Stop, but move the cursor past the failed index
    Skip,
    /// Move past the failed index and keep walking
    Continue,
}

impl std::str::FromStr for ErrorPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "halt" => Ok(ErrorPolicy::Halt),
            "skip" => Ok(ErrorPolicy::Skip),
            "continue" => Ok(ErrorPolicy::Continue),
            other => Err(format!("unknown error policy: {}", other)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WalkState {
    /// Never started, or stopped after a failure
    Idle,
    /// One lookup is outstanding for this index
    AwaitingLookup(usize),
    /// The last pass ran to the end; cursor is back at 0
    Done,
}

/// Next action for the driver
#[derive(Debug, Clone, PartialEq)]
pub enum Step {
    /// Issue exactly one lookup
    Lookup {
        index: usize,
        coordinate: Coordinate,
        options: SearchOptions,
    },
    /// The list is exhausted and the cursor was reset
    Finished,
    /// A failure stopped the chain; cursor is where the policy left it
    Halted { cursor: usize },
}

/// First place of a successful lookup
#[derive(Debug, Clone, PartialEq)]
pub struct Resolution {
    pub index: usize,
    pub coordinate: Coordinate,
    pub address: String,
    pub altitude: Option<f64>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum WalkEvent {
    Resolved(Resolution),
    Failed {
        index: usize,
        coordinate: Coordinate,
        error: LookupError,
    },
}

/// Result of feeding one lookup outcome into the walker
#[derive(Debug, Clone, PartialEq)]
pub struct Completion {
    pub event: WalkEvent,
    pub next: Step,
}

pub struct GeocodeWalker {
    points: Arc<[Coordinate]>,
    cursor: usize,
    state: WalkState,
    policy: ErrorPolicy,
    /// Options pinned by the trigger that started the current chain
    options: Option<SearchOptions>,
}

impl GeocodeWalker {
    pub fn new(points: impl Into<Arc<[Coordinate]>>, policy: ErrorPolicy) -> Self {
        Self {
            points: points.into(),
            cursor: 0,
            state: WalkState::Idle,
            policy,
            options: None,
        }
    }

    pub fn points(&self) -> &[Coordinate] {
        &self.points
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn cursor(&self) -> usize {
        self.cursor
    }

    pub fn state(&self) -> WalkState {
        self.state
    }

    pub fn policy(&self) -> ErrorPolicy {
        self.policy
    }

    pub fn set_policy(&mut self, policy: ErrorPolicy) {
        self.policy = policy;
    }

    /// Options of the running chain, if one is running
    pub fn options(&self) -> Option<&SearchOptions> {
        match self.state {
            WalkState::AwaitingLookup(_) => self.options.as_ref(),
            _ => None,
        }
    }

    pub fn is_awaiting(&self) -> bool {
        matches!(self.state, WalkState::AwaitingLookup(_))
    }

    /// Begin a chain from the current cursor with `options` pinned for it
    pub fn start(&mut self, options: SearchOptions) -> Result<Step, WalkError> {
        if let WalkState::AwaitingLookup(index) = self.state {
            return Err(WalkError::Busy(index));
        }
        if options.max_items == 0 {
            return Err(WalkError::InvalidOptions);
        }

        log::debug!(
            "Walk triggered at {}/{} ({}, max {})",
            self.cursor,
            self.points.len(),
            options.language,
            options.max_items
        );
        self.options = Some(options);
        Ok(self.step())
    }

    /// Feed the outcome of the lookup for `index`
    pub fn complete(
        &mut self,
        index: usize,
        outcome: Result<Vec<Place>, LookupError>,
    ) -> Result<Completion, WalkError> {
        match self.state {
            WalkState::AwaitingLookup(pending) if pending == index => {}
            WalkState::AwaitingLookup(pending) => {
                return Err(WalkError::UnexpectedCompletion {
                    expected: Some(pending),
                    got: index,
                })
            }
            _ => {
                return Err(WalkError::UnexpectedCompletion {
                    expected: None,
                    got: index,
                })
            }
        }

        let coordinate = self.points[index];
        let first = outcome.and_then(|places| places.into_iter().next().ok_or(LookupError::NoResults));

        match first {
            Ok(place) => {
                let resolution = Resolution {
                    index,
                    coordinate,
                    altitude: place.altitude(),
                    address: place.address.address_text,
                };
                self.cursor += 1;
                Ok(Completion {
                    event: WalkEvent::Resolved(resolution),
                    next: self.step(),
                })
            }
            Err(error) => {
                let next = match self.policy {
                    ErrorPolicy::Halt => self.halt(),
                    ErrorPolicy::Skip => {
                        self.cursor += 1;
                        self.halt()
                    }
                    ErrorPolicy::Continue => {
                        self.cursor += 1;
                        self.step()
                    }
                };
                Ok(Completion {
                    event: WalkEvent::Failed {
                        index,
                        coordinate,
                        error,
                    },
                    next,
                })
            }
        }
    }

    /// Swap the route. Not allowed while a lookup is outstanding.
    pub fn replace_points(&mut self, points: impl Into<Arc<[Coordinate]>>) -> Result<(), WalkError> {
        if let WalkState::AwaitingLookup(index) = self.state {
            return Err(WalkError::Busy(index));
        }
        self.points = points.into();
        self.cursor = 0;
        self.state = WalkState::Idle;
        self.options = None;
        Ok(())
    }

    fn step(&mut self) -> Step {
        if self.cursor >= self.points.len() {
            self.cursor = 0;
            self.state = WalkState::Done;
            self.options = None;
            return Step::Finished;
        }

        let index = self.cursor;
        self.state = WalkState::AwaitingLookup(index);
        Step::Lookup {
            index,
            coordinate: self.points[index],
            options: self.options.clone().unwrap_or_default(),
        }
    }

    fn halt(&mut self) -> Step {
        self.state = WalkState::Idle;
        self.options = None;
        Step::Halted {
            cursor: self.cursor,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::search::{Address, GeoPoint, LanguageCode};

    fn route(n: usize) -> Vec<Coordinate> {
        (0..n)
            .map(|i| Coordinate::new(47.0 + i as f64 * 0.01, 6.9).unwrap())
            .collect()
    }

    fn place(text: &str, altitude: Option<f64>) -> Vec<Place> {
        vec![Place {
            address: Address {
                address_text: text.to_string(),
                ..Default::default()
            },
            geo_point: Some(GeoPoint {
                coordinate: Coordinate::new(47.0, 6.9).unwrap(),
                altitude,
            }),
        }]
    }

    fn lookup_index(step: &Step) -> usize {
        match step {
            Step::Lookup { index, .. } => *index,
            other => panic!("expected a lookup, got {:?}", other),
        }
    }

    #[test]
    fn test_full_pass_visits_in_order_then_resets() {
        for n in 1..6 {
            let mut walker = GeocodeWalker::new(route(n), ErrorPolicy::Halt);
            let mut step = walker.start(SearchOptions::default()).unwrap();
            let mut visited = Vec::new();

            while let Step::Lookup { index, .. } = step {
                visited.push(index);
                step = walker.complete(index, Ok(place("somewhere", None))).unwrap().next;
            }

            assert_eq!(visited, (0..n).collect::<Vec<_>>());
            assert_eq!(step, Step::Finished);
            assert_eq!(walker.cursor(), 0);
            assert_eq!(walker.state(), WalkState::Done);
        }
    }

    #[test]
    fn test_two_points_both_succeed() {
        let mut walker = GeocodeWalker::new(route(2), ErrorPolicy::Halt);
        let step = walker.start(SearchOptions::default()).unwrap();
        assert_eq!(lookup_index(&step), 0);

        let completion = walker.complete(0, Ok(place("A street", Some(431.0)))).unwrap();
        match completion.event {
            WalkEvent::Resolved(ref r) => {
                assert_eq!(r.address, "A street");
                assert_eq!(r.altitude, Some(431.0));
            }
            ref other => panic!("unexpected event {:?}", other),
        }
        assert_eq!(lookup_index(&completion.next), 1);

        let completion = walker.complete(1, Ok(place("B street", None))).unwrap();
        assert_eq!(completion.next, Step::Finished);
        assert_eq!(walker.cursor(), 0);
    }

    #[test]
    fn test_failure_keeps_cursor_with_halt() {
        let mut walker = GeocodeWalker::new(route(2), ErrorPolicy::Halt);
        walker.start(SearchOptions::default()).unwrap();

        let completion = walker.complete(0, Err(LookupError::Status(503))).unwrap();
        assert!(matches!(completion.event, WalkEvent::Failed { index: 0, .. }));
        assert_eq!(completion.next, Step::Halted { cursor: 0 });
        assert_eq!(walker.cursor(), 0);
        assert_eq!(walker.state(), WalkState::Idle);

        // Next trigger retries the same point
        let step = walker.start(SearchOptions::default()).unwrap();
        assert_eq!(lookup_index(&step), 0);
    }

    #[test]
    fn test_failure_mid_list_resumes_at_failed_index() {
        let mut walker = GeocodeWalker::new(route(4), ErrorPolicy::Halt);
        walker.start(SearchOptions::default()).unwrap();
        walker.complete(0, Ok(place("a", None))).unwrap();
        walker.complete(1, Ok(place("b", None))).unwrap();
        let completion = walker.complete(2, Err(LookupError::NoResults)).unwrap();
        assert_eq!(completion.next, Step::Halted { cursor: 2 });

        let step = walker.start(SearchOptions::default()).unwrap();
        assert_eq!(lookup_index(&step), 2);
    }

    #[test]
    fn test_skip_policy_advances_and_stops() {
        let mut walker = GeocodeWalker::new(route(3), ErrorPolicy::Skip);
        walker.start(SearchOptions::default()).unwrap();
        let completion = walker.complete(0, Err(LookupError::NoResults)).unwrap();
        assert_eq!(completion.next, Step::Halted { cursor: 1 });

        let step = walker.start(SearchOptions::default()).unwrap();
        assert_eq!(lookup_index(&step), 1);
    }

    #[test]
    fn test_skip_policy_on_last_point_finishes_on_next_trigger() {
        let mut walker = GeocodeWalker::new(route(1), ErrorPolicy::Skip);
        walker.start(SearchOptions::default()).unwrap();
        walker.complete(0, Err(LookupError::NoResults)).unwrap();
        assert_eq!(walker.cursor(), 1);

        assert_eq!(walker.start(SearchOptions::default()).unwrap(), Step::Finished);
        assert_eq!(walker.cursor(), 0);
    }

    #[test]
    fn test_continue_policy_walks_past_failures() {
        let mut walker = GeocodeWalker::new(route(3), ErrorPolicy::Continue);
        walker.start(SearchOptions::default()).unwrap();
        let completion = walker.complete(0, Err(LookupError::Status(500))).unwrap();
        assert_eq!(lookup_index(&completion.next), 1);
        walker.complete(1, Ok(place("b", None))).unwrap();
        let completion = walker.complete(2, Err(LookupError::NoResults)).unwrap();
        assert_eq!(completion.next, Step::Finished);
        assert_eq!(walker.cursor(), 0);
    }

    #[test]
    fn test_empty_result_list_counts_as_failure() {
        let mut walker = GeocodeWalker::new(route(2), ErrorPolicy::Halt);
        walker.start(SearchOptions::default()).unwrap();
        let completion = walker.complete(0, Ok(Vec::new())).unwrap();
        match completion.event {
            WalkEvent::Failed { error, .. } => assert_eq!(error, LookupError::NoResults),
            other => panic!("unexpected event {:?}", other),
        }
        assert_eq!(walker.cursor(), 0);
    }

    #[test]
    fn test_retrigger_after_full_pass_restarts_at_zero() {
        let mut walker = GeocodeWalker::new(route(2), ErrorPolicy::Halt);
        walker.start(SearchOptions::default()).unwrap();
        walker.complete(0, Ok(place("a", None))).unwrap();
        walker.complete(1, Ok(place("b", None))).unwrap();

        let step = walker.start(SearchOptions::default()).unwrap();
        assert_eq!(lookup_index(&step), 0);
    }

    #[test]
    fn test_options_constant_for_the_pass() {
        let options = SearchOptions {
            language: LanguageCode::FrCh,
            max_items: 3,
        };
        let mut walker = GeocodeWalker::new(route(3), ErrorPolicy::Halt);
        let mut step = walker.start(options.clone()).unwrap();

        while let Step::Lookup {
            index,
            options: step_options,
            ..
        } = step.clone()
        {
            assert_eq!(step_options, options);
            assert_eq!(walker.options(), Some(&options));
            step = walker.complete(index, Ok(place("x", None))).unwrap().next;
        }
        assert_eq!(walker.options(), None);
    }

    #[test]
    fn test_start_while_awaiting_is_rejected() {
        let mut walker = GeocodeWalker::new(route(2), ErrorPolicy::Halt);
        walker.start(SearchOptions::default()).unwrap();
        assert_eq!(
            walker.start(SearchOptions::default()),
            Err(WalkError::Busy(0))
        );
    }

    #[test]
    fn test_rejects_zero_max_items() {
        let mut walker = GeocodeWalker::new(route(2), ErrorPolicy::Halt);
        let options = SearchOptions {
            max_items: 0,
            ..Default::default()
        };
        assert_eq!(walker.start(options), Err(WalkError::InvalidOptions));
        assert_eq!(walker.state(), WalkState::Idle);
    }

    #[test]
    fn test_unexpected_completion() {
        let mut walker = GeocodeWalker::new(route(2), ErrorPolicy::Halt);
        assert_eq!(
            walker.complete(0, Ok(place("a", None))),
            Err(WalkError::UnexpectedCompletion {
                expected: None,
                got: 0
            })
        );

        walker.start(SearchOptions::default()).unwrap();
        assert_eq!(
            walker.complete(1, Ok(place("b", None))),
            Err(WalkError::UnexpectedCompletion {
                expected: Some(0),
                got: 1
            })
        );
    }

    #[test]
    fn test_empty_list_finishes_immediately() {
        let mut walker = GeocodeWalker::new(Vec::<Coordinate>::new(), ErrorPolicy::Halt);
        assert_eq!(walker.start(SearchOptions::default()).unwrap(), Step::Finished);
        assert_eq!(walker.cursor(), 0);
    }

    #[test]
    fn test_replace_points() {
        let mut walker = GeocodeWalker::new(route(3), ErrorPolicy::Halt);
        walker.start(SearchOptions::default()).unwrap();
        assert_eq!(walker.replace_points(route(1)), Err(WalkError::Busy(0)));

        walker.complete(0, Err(LookupError::NoResults)).unwrap();
        walker.replace_points(route(1)).unwrap();
        assert_eq!(walker.len(), 1);
        assert_eq!(walker.cursor(), 0);
    }

    #[test]
    fn test_error_policy_from_str() {
        assert_eq!("halt".parse::<ErrorPolicy>(), Ok(ErrorPolicy::Halt));
        assert_eq!("Skip".parse::<ErrorPolicy>(), Ok(ErrorPolicy::Skip));
        assert_eq!("continue".parse::<ErrorPolicy>(), Ok(ErrorPolicy::Continue));
        assert!("retry".parse::<ErrorPolicy>().is_err());
    }
}

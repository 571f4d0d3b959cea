//! Survey session state machine.
//!
//! `start -> survey -> end`. Each transition is an explicit method call that
//! returns the page the session landed on; the front end decides when to
//! redraw.

use std::fmt;
use std::sync::Arc;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use uuid::Uuid;

use crate::question::{Choice, GenerationError, Question, QuestionGenerator, Response};
use crate::sink::{ResponseSink, SinkError, SinkReceipt};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Page {
    #[default]
    Start,
    Survey,
    End,
}

impl Page {
    pub fn as_str(self) -> &'static str {
        match self {
            Page::Start => "start",
            Page::Survey => "survey",
            Page::End => "end",
        }
    }
}

impl fmt::Display for Page {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("cannot {action} on the {page} page")]
    InvalidTransition { page: Page, action: &'static str },
    #[error("answer given for question index {given}, but the current index is {expected}")]
    IndexMismatch { expected: usize, given: usize },
    #[error("no question at index {index} (batch has {len})")]
    IndexOutOfRange { index: usize, len: usize },
    #[error("responses for this session were already persisted")]
    AlreadyPersisted,
    #[error(transparent)]
    Generation(#[from] GenerationError),
    #[error("failed to persist responses: {0}")]
    Sink(#[from] SinkError),
}

/// Everything a session accumulates between `begin_survey` and the end page.
#[derive(Debug, Clone, Default, Serialize)]
pub struct SessionState {
    pub page: Page,
    pub questions: Vec<Question>,
    pub index: usize,
    pub responses: Vec<Response>,
}

/// One respondent's run through the survey.
pub struct SurveySession<R = StdRng> {
    id: Uuid,
    generator: Arc<QuestionGenerator>,
    rng: R,
    state: SessionState,
    persisted: usize,
}

impl SurveySession<StdRng> {
    /// Seeds from the generator's configured seed, or from OS entropy.
    pub fn new(generator: Arc<QuestionGenerator>) -> Self {
        let rng = match generator.config().rng_seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        Self::with_rng(generator, rng)
    }
}

impl<R: Rng> SurveySession<R> {
    pub fn with_rng(generator: Arc<QuestionGenerator>, rng: R) -> Self {
        Self {
            id: Uuid::new_v4(),
            generator,
            rng,
            state: SessionState::default(),
            persisted: 0,
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn page(&self) -> Page {
        self.state.page
    }

    pub fn state(&self) -> &SessionState {
        &self.state
    }

    /// `start -> survey`: builds the full batch up front.
    ///
    /// On a generation failure the session stays on the start page.
    pub fn begin_survey(&mut self) -> Result<Page, SessionError> {
        if self.state.page != Page::Start {
            return Err(SessionError::InvalidTransition {
                page: self.state.page,
                action: "begin the survey",
            });
        }
        let questions = self.generator.generate_batch(&mut self.rng)?;
        if questions.is_empty() {
            return Err(GenerationError::EmptySurvey.into());
        }
        info!(session = %self.id, questions = questions.len(), "survey started");
        self.state = SessionState {
            page: Page::Survey,
            questions,
            index: 0,
            responses: Vec::new(),
        };
        self.persisted = 0;
        Ok(self.state.page)
    }

    pub fn current_question(&self) -> Option<&Question> {
        if self.state.page != Page::Survey {
            return None;
        }
        self.state.questions.get(self.state.index)
    }

    /// (answered, total)
    pub fn progress(&self) -> (usize, usize) {
        (self.state.index, self.state.questions.len())
    }

    /// Records `choice` for the current question and advances.
    ///
    /// Moves to the end page after the last question.
    pub fn answer(&mut self, choice: Choice) -> Result<Page, SessionError> {
        if self.state.page != Page::Survey {
            return Err(SessionError::InvalidTransition {
                page: self.state.page,
                action: "answer a question",
            });
        }
        let index = self.state.index;
        let question =
            self.state
                .questions
                .get(index)
                .ok_or(SessionError::IndexOutOfRange {
                    index,
                    len: self.state.questions.len(),
                })?;
        let response = Response::from_choice((index + 1) as u32, question, choice);
        self.state.responses.push(response);
        self.state.index += 1;

        if self.state.index >= self.state.questions.len() {
            self.state.page = Page::End;
            info!(session = %self.id, answered = self.state.responses.len(), "survey complete");
        }
        Ok(self.state.page)
    }

    /// Like `answer`, but rejects any index other than the current one.
    pub fn answer_at(&mut self, index: usize, choice: Choice) -> Result<Page, SessionError> {
        if self.state.page == Page::Survey && index >= self.state.questions.len() {
            return Err(SessionError::IndexOutOfRange {
                index,
                len: self.state.questions.len(),
            });
        }
        if index != self.state.index {
            return Err(SessionError::IndexMismatch {
                expected: self.state.index,
                given: index,
            });
        }
        self.answer(choice)
    }

    pub fn is_complete(&self) -> bool {
        self.state.page == Page::End
    }

    pub fn responses(&self) -> &[Response] {
        &self.state.responses
    }

    /// Responses not yet acknowledged by a sink.
    pub fn pending_responses(&self) -> &[Response] {
        &self.state.responses[self.persisted..]
    }

    pub fn is_persisted(&self) -> bool {
        self.is_complete() && self.persisted == self.state.responses.len()
    }

    /// Hands the un-persisted responses to `sink`.
    ///
    /// Responses stay in memory on failure; calling again resends only the
    /// rows the sink did not acknowledge.
    pub async fn persist(&mut self, sink: &dyn ResponseSink) -> Result<SinkReceipt, SessionError> {
        if self.state.page != Page::End {
            return Err(SessionError::InvalidTransition {
                page: self.state.page,
                action: "persist responses",
            });
        }
        if self.is_persisted() {
            return Err(SessionError::AlreadyPersisted);
        }

        let total = self.state.responses.len();
        match sink.append(self.id, &self.state.responses[self.persisted..]).await {
            Ok(receipt) => {
                self.persisted = total;
                info!(session = %self.id, rows = receipt.rows_written, "responses persisted");
                Ok(receipt)
            }
            Err(err) => {
                self.persisted = (self.persisted + err.rows_written()).min(total);
                warn!(
                    session = %self.id,
                    persisted = self.persisted,
                    total,
                    error = %err,
                    "failed to persist responses"
                );
                Err(err.into())
            }
        }
    }
}

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use brand_survey::catalog::{CatalogIndex, ImageRecord, PriceRecord, WeightingPolicy};
use brand_survey::clusters::ClusterMap;
use brand_survey::question::{Choice, GenerationError, GeneratorConfig, QuestionGenerator, Response};
use brand_survey::session::{Page, SessionError, SurveySession};
use brand_survey::sink::{CsvResponseSink, ResponseSink, SinkError, SinkReceipt};
use rand::rngs::StdRng;
use rand::SeedableRng;
use tempfile::tempdir;
use uuid::Uuid;

const BRANDS: &[(&str, u32)] = &[
    ("Gucci", 1),
    ("Prada", 1),
    ("Supreme", 2),
    ("Stussy", 2),
    ("Nike", 3),
    ("Adidas", 3),
    ("Zara", 4),
];

fn generator(config: GeneratorConfig) -> Arc<QuestionGenerator> {
    let prices: Vec<PriceRecord> = BRANDS
        .iter()
        .map(|(b, _)| PriceRecord::new(*b, 100.0))
        .collect();
    let images: Vec<ImageRecord> = BRANDS
        .iter()
        .flat_map(|(b, _)| {
            (0..3).map(move |i| ImageRecord::new(*b, "main", format!("https://img/{b}/{i}")))
        })
        .collect();
    let catalog = CatalogIndex::from_records(&prices, &images, WeightingPolicy::Subcategory);
    let clusters = ClusterMap::from_pairs(BRANDS.iter().copied());
    Arc::new(QuestionGenerator::new(Arc::new(catalog), Arc::new(clusters), config).unwrap())
}

fn session(total: usize) -> SurveySession {
    SurveySession::with_rng(
        generator(GeneratorConfig::default().with_total(total)),
        StdRng::seed_from_u64(11),
    )
}

fn answer_all(session: &mut SurveySession) {
    let mut i = 0;
    while session.page() == Page::Survey {
        let choice = if i % 2 == 0 { Choice::A } else { Choice::B };
        session.answer(choice).unwrap();
        i += 1;
    }
}

#[derive(Default)]
struct MemorySink {
    rows: Mutex<Vec<(Uuid, Response)>>,
}

#[async_trait]
impl ResponseSink for MemorySink {
    async fn append(
        &self,
        session_id: Uuid,
        responses: &[Response],
    ) -> Result<SinkReceipt, SinkError> {
        let mut rows = self.rows.lock().unwrap();
        let header_written = rows.is_empty() && !responses.is_empty();
        rows.extend(responses.iter().cloned().map(|r| (session_id, r)));
        Ok(SinkReceipt {
            rows_written: responses.len(),
            header_written,
        })
    }
}

/// Accepts `accept` rows on the first call, then fails; later calls succeed.
struct FlakySink {
    accept: usize,
    calls: Mutex<usize>,
    rows: Mutex<Vec<Response>>,
}

impl FlakySink {
    fn new(accept: usize) -> Self {
        Self {
            accept,
            calls: Mutex::new(0),
            rows: Mutex::new(Vec::new()),
        }
    }
}

#[async_trait]
impl ResponseSink for FlakySink {
    async fn append(
        &self,
        _session_id: Uuid,
        responses: &[Response],
    ) -> Result<SinkReceipt, SinkError> {
        let first = {
            let mut calls = self.calls.lock().unwrap();
            *calls += 1;
            *calls == 1
        };
        let mut rows = self.rows.lock().unwrap();
        if first {
            let take = self.accept.min(responses.len());
            rows.extend_from_slice(&responses[..take]);
            let err = SinkError::Io(std::io::Error::other("disk unplugged"));
            return Err(if take > 0 {
                SinkError::partial(take, responses.len(), err)
            } else {
                err
            });
        }
        rows.extend_from_slice(responses);
        Ok(SinkReceipt {
            rows_written: responses.len(),
            header_written: false,
        })
    }
}

#[test]
fn twenty_answers_walk_start_survey_end() {
    let mut session = session(20);
    assert_eq!(session.page(), Page::Start);
    assert!(session.current_question().is_none());

    assert_eq!(session.begin_survey().unwrap(), Page::Survey);
    assert_eq!(session.progress(), (0, 20));

    for i in 0..20 {
        assert_eq!(session.page(), Page::Survey);
        assert!(session.current_question().is_some());
        let page = session.answer(Choice::A).unwrap();
        if i < 19 {
            assert_eq!(page, Page::Survey);
        } else {
            assert_eq!(page, Page::End);
        }
    }

    assert!(session.is_complete());
    assert!(session.current_question().is_none());
    let ordinals: Vec<u32> = session.responses().iter().map(|r| r.question).collect();
    assert_eq!(ordinals, (1..=20).collect::<Vec<u32>>());
}

#[test]
fn responses_record_selected_and_other_candidates() {
    let mut session = session(4);
    session.begin_survey().unwrap();
    let questions = session.state().questions.clone();
    answer_all(&mut session);

    for (i, (question, response)) in questions.iter().zip(session.responses()).enumerate() {
        let choice = if i % 2 == 0 { Choice::A } else { Choice::B };
        assert_eq!(response.reference, question.reference.brand);
        assert_eq!(response.selected, question.candidate(choice).brand);
        assert_eq!(response.other, question.candidate(choice.other()).brand);
    }
}

#[test]
fn out_of_order_actions_are_rejected() {
    let mut session = session(3);
    assert!(matches!(
        session.answer(Choice::A),
        Err(SessionError::InvalidTransition {
            page: Page::Start,
            ..
        })
    ));

    session.begin_survey().unwrap();
    assert!(matches!(
        session.begin_survey(),
        Err(SessionError::InvalidTransition {
            page: Page::Survey,
            ..
        })
    ));

    answer_all(&mut session);
    assert!(matches!(
        session.answer(Choice::B),
        Err(SessionError::InvalidTransition { page: Page::End, .. })
    ));
    assert_eq!(session.responses().len(), 3);
}

#[test]
fn answer_at_checks_the_index() {
    let mut session = session(3);
    session.begin_survey().unwrap();

    assert!(matches!(
        session.answer_at(1, Choice::A),
        Err(SessionError::IndexMismatch {
            expected: 0,
            given: 1
        })
    ));
    assert!(matches!(
        session.answer_at(7, Choice::A),
        Err(SessionError::IndexOutOfRange { index: 7, len: 3 })
    ));
    assert!(session.responses().is_empty());

    session.answer_at(0, Choice::A).unwrap();
    session.answer_at(1, Choice::B).unwrap();
    assert_eq!(session.progress(), (2, 3));
}

#[test]
fn failed_generation_leaves_session_on_start() {
    // Only two populated clusters: mixed questions are impossible.
    let prices = vec![
        PriceRecord::new("A1", 1.0),
        PriceRecord::new("A2", 1.0),
        PriceRecord::new("B1", 1.0),
    ];
    let images = vec![
        ImageRecord::new("A1", "x", "https://img/a1"),
        ImageRecord::new("A2", "x", "https://img/a2"),
        ImageRecord::new("B1", "x", "https://img/b1"),
    ];
    let catalog = CatalogIndex::from_records(&prices, &images, WeightingPolicy::Subcategory);
    let clusters = ClusterMap::from_pairs([("A1", 1), ("A2", 1), ("B1", 2)]);
    let generator =
        QuestionGenerator::new(Arc::new(catalog), Arc::new(clusters), GeneratorConfig::default())
            .unwrap();
    let mut session = SurveySession::with_rng(Arc::new(generator), StdRng::seed_from_u64(1));

    assert!(matches!(
        session.begin_survey(),
        Err(SessionError::Generation(
            GenerationError::InsufficientCatalog { .. }
        ))
    ));
    assert_eq!(session.page(), Page::Start);
}

#[test]
fn seeded_sessions_ask_the_same_questions() {
    let generator = generator(GeneratorConfig::default().with_total(10).with_seed(99));
    let mut a = SurveySession::new(generator.clone());
    let mut b = SurveySession::new(generator);
    a.begin_survey().unwrap();
    b.begin_survey().unwrap();
    assert_ne!(a.id(), b.id());
    assert_eq!(a.state().questions, b.state().questions);
}

#[tokio::test]
async fn persist_requires_the_end_page_and_runs_once() {
    let sink = MemorySink::default();
    let mut session = session(5);
    session.begin_survey().unwrap();

    assert!(matches!(
        session.persist(&sink).await,
        Err(SessionError::InvalidTransition {
            page: Page::Survey,
            ..
        })
    ));

    answer_all(&mut session);
    let receipt = session.persist(&sink).await.unwrap();
    assert_eq!(receipt.rows_written, 5);
    assert!(receipt.header_written);
    assert!(session.is_persisted());

    assert!(matches!(
        session.persist(&sink).await,
        Err(SessionError::AlreadyPersisted)
    ));

    let rows = sink.rows.lock().unwrap();
    assert_eq!(rows.len(), 5);
    assert!(rows.iter().all(|(id, _)| *id == session.id()));
}

#[tokio::test]
async fn failed_persist_keeps_unwritten_responses_for_retry() {
    let sink = FlakySink::new(2);
    let mut session = session(6);
    session.begin_survey().unwrap();
    answer_all(&mut session);

    let err = session.persist(&sink).await.unwrap_err();
    assert!(matches!(err, SessionError::Sink(SinkError::Partial { written: 2, .. })));
    assert!(!session.is_persisted());
    assert_eq!(session.responses().len(), 6);
    assert_eq!(session.pending_responses().len(), 4);
    assert_eq!(session.pending_responses()[0].question, 3);

    let receipt = session.persist(&sink).await.unwrap();
    assert_eq!(receipt.rows_written, 4);
    assert!(session.is_persisted());

    let stored: Vec<u32> = sink.rows.lock().unwrap().iter().map(|r| r.question).collect();
    assert_eq!(stored, vec![1, 2, 3, 4, 5, 6]);
}

#[tokio::test]
async fn persisted_csv_matches_answers() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("responses.csv");
    let sink = CsvResponseSink::new(&path);

    let mut session = session(3);
    session.begin_survey().unwrap();
    answer_all(&mut session);
    session.persist(&sink).await.unwrap();

    let mut reader = csv::Reader::from_path(&path).unwrap();
    let headers = reader.headers().unwrap().clone();
    assert_eq!(
        headers.iter().collect::<Vec<_>>(),
        vec!["question", "reference", "selected", "other"]
    );
    let rows: Vec<Response> = reader.deserialize().map(Result::unwrap).collect();
    assert_eq!(rows, session.responses());
}

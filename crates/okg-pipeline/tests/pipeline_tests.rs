//! End-to-end pipeline tests with a scripted model

use std::collections::VecDeque;
use std::io;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use okg_core::{ChatRequest, Iri, LlmClient, OkgError, Result, Triple};
use okg_extractor::{ExtractionClient, RetryPolicy, Sleeper};
use okg_graph::{GraphStore, RdfFormat};
use okg_ontology::OntologyRegistry;
use okg_pipeline::{DirectorySource, InMemorySource, Pipeline};

const NS: &str = "http://www.enit.fr/2022/03/baeo#";

const ONTOLOGY: &str = r#"
@prefix owl: <http://www.w3.org/2002/07/owl#> .
@prefix rdfs: <http://www.w3.org/2000/01/rdf-schema#> .
@prefix baeo: <http://www.enit.fr/2022/03/baeo#> .

baeo:Accident a owl:Class .
baeo:Avion a owl:Class .
baeo:aCause a owl:ObjectProperty .
"#;

struct ScriptedLlm {
    replies: Mutex<VecDeque<Result<String>>>,
    prompts: Mutex<Vec<String>>,
}

impl ScriptedLlm {
    fn new(replies: Vec<Result<String>>) -> Arc<Self> {
        Arc::new(Self {
            replies: Mutex::new(replies.into()),
            prompts: Mutex::new(Vec::new()),
        })
    }

    fn calls(&self) -> usize {
        self.prompts.lock().unwrap().len()
    }
}

#[async_trait]
impl LlmClient for ScriptedLlm {
    async fn chat(&self, request: &ChatRequest) -> Result<String> {
        self.prompts
            .lock()
            .unwrap()
            .push(request.messages[0].content.clone());
        self.replies
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Ok(String::new()))
    }

    fn model(&self) -> &str {
        "scripted"
    }
}

struct NoSleep;

#[async_trait]
impl Sleeper for NoSleep {
    async fn sleep(&self, _duration: Duration) {}
}

fn pipeline(llm: Arc<ScriptedLlm>) -> Pipeline {
    let registry = OntologyRegistry::from_turtle(ONTOLOGY).unwrap();
    let extractor = ExtractionClient::new(llm, NS)
        .with_sleeper(Arc::new(NoSleep))
        .with_retry(RetryPolicy {
            max_attempts: 3,
            base_delay: Duration::from_millis(1),
        });
    Pipeline::new(registry, extractor, GraphStore::new("baeo", NS))
}

fn iri(local: &str) -> Iri {
    Iri::new(format!("{NS}{local}")).unwrap()
}

#[tokio::test]
async fn test_single_sentence_yields_one_triple() {
    let reply = format!(
        "<{NS}AccidentAvion> <{NS}aCause> <{NS}MauvaisTemps> .\n<{NS}Pilote> <{NS}aCause> <{NS}Panne>"
    );
    let llm = ScriptedLlm::new(vec![Ok(reply)]);
    let mut pipeline = pipeline(llm.clone());
    let output = tempfile::tempdir().unwrap();

    let source = InMemorySource::new().with_document(
        "rapport",
        ["L'accident de l'avion a été causé par le mauvais temps."],
    );
    let report = pipeline.run(&source, output.path()).await.unwrap();

    assert_eq!(llm.calls(), 1);
    assert_eq!(report.triples, 1);
    assert_eq!(report.lines_discarded, 1);
    assert!(pipeline.graph().contains(&Triple::new(
        iri("AccidentAvion"),
        iri("aCause"),
        iri("MauvaisTemps")
    )));

    let prompt = &llm.prompts.lock().unwrap()[0];
    assert!(prompt.contains("Accident, Avion"));
    assert!(prompt.contains("aCause"));

    assert_eq!(report.written.len(), 3);
    for format in RdfFormat::ALL {
        let path = output.path().join(format!("knowledge_graph.{}", format.extension()));
        let bytes = std::fs::read(&path).unwrap();
        let parsed = GraphStore::parse(&bytes, format, "baeo", NS).unwrap();
        assert_eq!(parsed.count(), 1);
    }
    assert!(!report.has_partial_failures());
}

#[tokio::test]
async fn test_empty_input_makes_no_calls_and_writes_nothing() {
    let llm = ScriptedLlm::new(vec![]);
    let mut pipeline = pipeline(llm.clone());
    let output = tempfile::tempdir().unwrap();

    let source = InMemorySource::new().with_document("vide", Vec::<String>::new());
    let report = pipeline.run(&source, output.path()).await.unwrap();

    assert_eq!(llm.calls(), 0);
    assert_eq!(report.documents_skipped, 1);
    assert_eq!(report.triples, 0);
    assert!(report.written.is_empty());
    assert_eq!(std::fs::read_dir(output.path()).unwrap().count(), 0);
}

#[tokio::test]
async fn test_exhausted_chunk_is_counted_and_run_continues() {
    let failure = || Err(OkgError::LlmError("timeout".to_string()));
    let llm = ScriptedLlm::new(vec![
        failure(),
        failure(),
        failure(),
        Ok(format!("<{NS}A> <{NS}aCause> <{NS}B> .")),
    ]);
    let mut pipeline = pipeline(llm.clone());
    let output = tempfile::tempdir().unwrap();

    let source = InMemorySource::new().with_document("doc", ["Premier.", "Second."]);
    let report = pipeline.run(&source, output.path()).await.unwrap();

    assert_eq!(llm.calls(), 4);
    assert_eq!(report.chunks_processed, 2);
    assert_eq!(report.chunks_failed, 1);
    assert_eq!(report.triples, 1);
    assert!(report.has_partial_failures());
}

#[tokio::test]
async fn test_duplicates_across_documents_collapse() {
    let line = format!("<{NS}A> <{NS}aCause> <{NS}B> .");
    let llm = ScriptedLlm::new(vec![
        Ok(line.clone()),
        Ok(format!("{line}\n<{NS}A> <{NS}aCause> <{NS}C> .")),
        Ok("<http://ex.org/a b> <http://ex.org/p> <http://ex.org/c> .".to_string()),
    ]);
    let mut pipeline = pipeline(llm);
    let output = tempfile::tempdir().unwrap();

    let source = InMemorySource::new()
        .with_document("un", ["Phrase un."])
        .with_document("deux", ["Phrase deux.", "Phrase trois."]);
    let report = pipeline.run(&source, output.path()).await.unwrap();

    assert_eq!(report.documents_processed, 2);
    assert_eq!(report.lines_accepted, 2);
    assert_eq!(report.lines_duplicate, 1);
    assert_eq!(report.lines_rejected, 1);
    assert_eq!(pipeline.graph().count(), 2);
}

#[tokio::test]
async fn test_directory_source_end_to_end() {
    let input = tempfile::tempdir().unwrap();
    std::fs::write(
        input.path().join("accident.txt"),
        "L'accident de l'avion a été causé par le mauvais temps. Le pilote a survécu.",
    )
    .unwrap();
    std::fs::write(input.path().join("vide.txt"), "  \n").unwrap();

    let llm = ScriptedLlm::new(vec![
        Ok(format!("<{NS}AccidentAvion> <{NS}aCause> <{NS}MauvaisTemps> .")),
        Ok("Aucun triplet.".to_string()),
    ]);
    let mut pipeline = pipeline(llm.clone()).with_file_stem("graphe");
    let output = tempfile::tempdir().unwrap();
    let out_dir = output.path().join("sortie");

    let source = DirectorySource::new(input.path());
    let report = pipeline.run(&source, &out_dir).await.unwrap();

    assert_eq!(llm.calls(), 2);
    assert_eq!(report.documents_processed, 1);
    assert_eq!(report.documents_skipped, 1);
    assert!(out_dir.join("graphe.ttl").exists());
    assert!(out_dir.join("graphe.jsonld").exists());
    assert!(out_dir.join("graphe.owl").exists());
}

#[derive(Clone, Default)]
struct LogBuffer(Arc<Mutex<Vec<u8>>>);

impl LogBuffer {
    fn contents(&self) -> String {
        String::from_utf8_lossy(&self.0.lock().unwrap()).into_owned()
    }
}

impl io::Write for LogBuffer {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

#[tokio::test]
async fn test_warnings_carry_document_and_chunk() {
    let logs = LogBuffer::default();
    let writer = logs.clone();
    let subscriber = tracing_subscriber::fmt()
        .with_ansi(false)
        .with_max_level(tracing::Level::DEBUG)
        .with_writer(move || writer.clone())
        .finish();
    let _guard = tracing::subscriber::set_default(subscriber);

    let llm = ScriptedLlm::new(vec![
        Err(OkgError::LlmError("timeout".to_string())),
        Ok("<http://ex.org/a b> <http://ex.org/p> <http://ex.org/c> .".to_string()),
    ]);
    let mut pipeline = pipeline(llm);
    let output = tempfile::tempdir().unwrap();

    let source = InMemorySource::new().with_document(
        "rapport-447.pdf",
        ["L'avion a disparu au-dessus de l'Atlantique."],
    );
    let report = pipeline.run(&source, output.path()).await.unwrap();
    assert_eq!(report.lines_rejected, 1);

    let logs = logs.contents();
    let rejected = logs
        .lines()
        .find(|line| line.contains("Rejected triple line"))
        .expect("rejection is logged");
    assert!(rejected.contains("rapport-447.pdf"), "{rejected}");

    let attempt = logs
        .lines()
        .find(|line| line.contains("Extraction attempt failed"))
        .expect("failed attempt is logged");
    assert!(attempt.contains("rapport-447.pdf"), "{attempt}");
    assert!(attempt.contains("chunk=0"), "{attempt}");
}

#[tokio::test]
async fn test_output_directory_created_for_empty_graph() {
    let llm = ScriptedLlm::new(vec![]);
    let mut pipeline = pipeline(llm);
    let output = tempfile::tempdir().unwrap();
    let out_dir = output.path().join("sortie").join("graphes");

    let report = pipeline.run(&InMemorySource::new(), &out_dir).await.unwrap();

    assert!(report.written.is_empty());
    assert!(out_dir.is_dir());
    assert_eq!(std::fs::read_dir(&out_dir).unwrap().count(), 0);
    assert!(!report.has_partial_failures());
}

use async_trait::async_trait;
use chrono::NaiveDate;
use httpmock::prelude::*;
use market_export::core::projection::{FieldMapping, FieldProjection};
use market_export::core::{Notifier, RecordSource};
use market_export::{
    ExportEngine, ExportError, ExportFormat, ExportJob, ExportOutcome, HttpRecordSource,
    LocalStorage, Notice, Record, Result, TomlConfig,
};
use serde_json::json;
use std::io::Read;
use std::sync::{Arc, Mutex};
use tempfile::TempDir;
use tokio::sync::Notify;

#[derive(Clone, Default)]
struct RecordingNotifier {
    notices: Arc<Mutex<Vec<Notice>>>,
}

impl RecordingNotifier {
    fn notices(&self) -> Vec<Notice> {
        self.notices.lock().unwrap().clone()
    }
}

impl Notifier for RecordingNotifier {
    fn notify(&self, notice: Notice) {
        self.notices.lock().unwrap().push(notice);
    }
}

fn asesorias() -> serde_json::Value {
    json!([
        {"id": 7, "estudiante": "Ana", "asesor": {"nombre": "Luis"}, "fecha": "2024-01-10", "precio": 15},
        {"id": 8, "estudiante": "Bruno", "asesor": {"nombre": "Marta"}, "fecha": "2024-01-12", "precio": 20}
    ])
}

fn asesorias_projection() -> FieldProjection {
    FieldProjection::new(vec![
        FieldMapping::new("estudiante", "Estudiante"),
        FieldMapping::new("asesor.nombre", "Asesor"),
        FieldMapping::new("precio", "Precio"),
    ])
}

fn engine_for(
    base_url: String,
    output: &TempDir,
) -> (ExportEngine<HttpRecordSource, LocalStorage, RecordingNotifier>, RecordingNotifier) {
    let notifier = RecordingNotifier::default();
    let storage = LocalStorage::new(output.path().to_string_lossy().into_owned());
    let engine = ExportEngine::new(HttpRecordSource::new(base_url), storage, notifier.clone())
        .with_generation_date(NaiveDate::from_ymd_opt(2024, 2, 1).unwrap());
    (engine, notifier)
}

async fn mock_dashboard(server: &MockServer) {
    server
        .mock_async(|when, then| {
            when.method(GET)
                .path("/api/Admin/dashboard-stats")
                .query_param("page", "1")
                .query_param("pageSize", "500");
            then.status(200)
                .header("Content-Type", "application/json")
                .json_body(json!({
                    "totalUsuarios": 12,
                    "ultimasAsesorias": asesorias()
                }));
        })
        .await;
}

#[tokio::test]
async fn test_end_to_end_csv_export() {
    let server = MockServer::start_async().await;
    mock_dashboard(&server).await;
    let output = TempDir::new().unwrap();
    let (engine, notifier) = engine_for(server.url("/api"), &output);

    let job = ExportJob::new("/Admin/dashboard-stats", "asesorias", ExportFormat::Csv)
        .with_shared_projection(asesorias_projection().into_projection());
    let outcome = engine.run_export(&job).await.unwrap();

    assert!(matches!(outcome, ExportOutcome::Saved { records: 2, .. }));
    let csv = std::fs::read_to_string(output.path().join("asesorias.csv")).unwrap();
    let mut reader = csv::Reader::from_reader(csv.as_bytes());
    let headers: Vec<String> = reader.headers().unwrap().iter().map(String::from).collect();
    assert_eq!(headers, vec!["Estudiante", "Asesor", "Precio"]);
    let rows: Vec<csv::StringRecord> = reader.records().map(|r| r.unwrap()).collect();
    assert_eq!(rows.len(), 2);
    assert_eq!(&rows[1][1], "Marta");

    assert_eq!(
        notifier.notices(),
        vec![Notice::Success {
            file_name: "asesorias.csv".to_string()
        }]
    );
}

#[tokio::test]
async fn test_end_to_end_xlsx_export() {
    let server = MockServer::start_async().await;
    mock_dashboard(&server).await;
    let output = TempDir::new().unwrap();
    let (engine, _) = engine_for(server.url("/api"), &output);

    let job = ExportJob::new("/Admin/dashboard-stats", "asesorias", ExportFormat::Xlsx)
        .with_shared_projection(asesorias_projection().into_projection());
    engine.run_export(&job).await.unwrap();

    let data = std::fs::read(output.path().join("asesorias.xlsx")).unwrap();
    let mut archive = zip::ZipArchive::new(std::io::Cursor::new(data)).unwrap();

    let mut workbook = String::new();
    archive
        .by_name("xl/workbook.xml")
        .unwrap()
        .read_to_string(&mut workbook)
        .unwrap();
    assert!(workbook.contains(r#"name="Reporte""#));

    let mut sheet = String::new();
    archive
        .by_name("xl/worksheets/sheet1.xml")
        .unwrap()
        .read_to_string(&mut sheet)
        .unwrap();
    assert!(sheet.contains(">Estudiante<"));
    assert!(sheet.contains(">Bruno<"));
    assert_eq!(sheet.matches("<row ").count(), 3);
}

#[tokio::test]
async fn test_end_to_end_xml_export() {
    let server = MockServer::start_async().await;
    mock_dashboard(&server).await;
    let output = TempDir::new().unwrap();
    let (engine, _) = engine_for(server.url("/api"), &output);

    let job = ExportJob::new("/Admin/dashboard-stats", "asesorias", ExportFormat::Xml)
        .with_shared_projection(asesorias_projection().into_projection());
    engine.run_export(&job).await.unwrap();

    let xml = std::fs::read_to_string(output.path().join("asesorias.xml")).unwrap();
    assert!(xml.starts_with("<?xml"));
    assert_eq!(xml.matches("<row>").count(), 2);
    assert!(xml.contains("<Asesor>Luis</Asesor>"));
}

#[tokio::test]
async fn test_end_to_end_pdf_export() {
    let server = MockServer::start_async().await;
    mock_dashboard(&server).await;
    let output = TempDir::new().unwrap();
    let (engine, _) = engine_for(server.url("/api"), &output);

    let job = ExportJob::new("/Admin/dashboard-stats", "asesorias", ExportFormat::Pdf)
        .with_title("Últimas asesorías")
        .with_headers(vec![
            "ESTUDIANTE".to_string(),
            "ASESOR".to_string(),
            "PRECIO".to_string(),
        ])
        .with_shared_projection(asesorias_projection().into_projection());
    engine.run_export(&job).await.unwrap();

    let pdf = std::fs::read(output.path().join("asesorias.pdf")).unwrap();
    assert!(pdf.starts_with(b"%PDF-1.4"));
    let text = String::from_utf8_lossy(&pdf);
    assert!(text.contains("(Fecha: 01/02/2024) Tj"));
    assert!(text.contains("(ASESOR) Tj"));
    assert!(text.contains("(Marta) Tj"));
}

#[tokio::test]
async fn test_end_to_end_json_export_keeps_full_records() {
    let server = MockServer::start_async().await;
    mock_dashboard(&server).await;
    let output = TempDir::new().unwrap();
    let (engine, _) = engine_for(server.url("/api"), &output);

    let job = ExportJob::new("/Admin/dashboard-stats", "asesorias", ExportFormat::Json);
    engine.run_export(&job).await.unwrap();

    let written: serde_json::Value =
        serde_json::from_slice(&std::fs::read(output.path().join("asesorias.json")).unwrap())
            .unwrap();
    assert_eq!(written, asesorias());
}

#[tokio::test]
async fn test_response_shapes_produce_identical_files() {
    let server = MockServer::start_async().await;
    let rows = asesorias();
    for (path, body) in [
        ("/bare", rows.clone()),
        ("/items", json!({"items": rows.clone(), "totalItems": 2})),
        ("/report", json!({"ultimasAsesorias": rows.clone()})),
    ] {
        server
            .mock_async(move |when, then| {
                when.method(GET).path(path);
                then.status(200).json_body(body);
            })
            .await;
    }

    let output = TempDir::new().unwrap();
    let (engine, _) = engine_for(server.base_url(), &output);
    for (path, name) in [("/bare", "bare"), ("/items", "items"), ("/report", "report")] {
        let job = ExportJob::new(path, name, ExportFormat::Csv);
        engine.run_export(&job).await.unwrap();
    }

    let bare = std::fs::read(output.path().join("bare.csv")).unwrap();
    assert_eq!(bare, std::fs::read(output.path().join("items.csv")).unwrap());
    assert_eq!(bare, std::fs::read(output.path().join("report.csv")).unwrap());
}

#[tokio::test]
async fn test_empty_collection_writes_nothing() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(GET).path("/estudiante/pagos");
            then.status(200).json_body(json!({"items": []}));
        })
        .await;

    let output = TempDir::new().unwrap();
    let (engine, notifier) = engine_for(server.base_url(), &output);

    let job = ExportJob::new("/estudiante/pagos", "pagos", ExportFormat::Xlsx);
    let outcome = engine.run_export(&job).await.unwrap();

    assert_eq!(outcome, ExportOutcome::NoRecords);
    assert_eq!(std::fs::read_dir(output.path()).unwrap().count(), 0);
    assert_eq!(notifier.notices(), vec![Notice::NoRecords]);
}

#[tokio::test]
async fn test_server_error_notifies_failure_once() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(GET).path("/curso/publicos");
            then.status(503);
        })
        .await;

    let output = TempDir::new().unwrap();
    let (engine, notifier) = engine_for(server.base_url(), &output);

    let job = ExportJob::new("/curso/publicos", "cursos", ExportFormat::Csv);
    let err = engine.run_export(&job).await.unwrap_err();

    assert!(matches!(err, ExportError::HttpStatusError { status: 503, .. }));
    assert!(matches!(notifier.notices()[..], [Notice::Failure { .. }]));
    assert!(!engine.is_exporting());
    assert_eq!(std::fs::read_dir(output.path()).unwrap().count(), 0);
}

#[tokio::test]
async fn test_independent_engines_run_concurrently() {
    let server = MockServer::start_async().await;
    mock_dashboard(&server).await;
    server
        .mock_async(|when, then| {
            when.method(GET).path("/api/curso/publicos");
            then.status(200)
                .json_body(json!({"items": [{"id": 1, "titulo": "Álgebra"}]}));
        })
        .await;

    let output = TempDir::new().unwrap();
    let (asesorias_engine, asesorias_notices) = engine_for(server.url("/api"), &output);
    let (cursos_engine, cursos_notices) = engine_for(server.url("/api"), &output);

    let asesorias_job = ExportJob::new("/Admin/dashboard-stats", "asesorias", ExportFormat::Pdf)
        .with_title("Asesorías");
    let cursos_job = ExportJob::new("/curso/publicos", "cursos", ExportFormat::Xml);

    let (first, second) = tokio::join!(
        asesorias_engine.run_export(&asesorias_job),
        cursos_engine.run_export(&cursos_job)
    );
    first.unwrap();
    second.unwrap();

    assert!(output.path().join("asesorias.pdf").exists());
    assert!(output.path().join("cursos.xml").exists());
    assert_eq!(asesorias_notices.notices().len(), 1);
    assert_eq!(cursos_notices.notices().len(), 1);
}

/// Blocks inside the fetch until released.
struct GatedSource {
    entered: Arc<Notify>,
    release: Arc<Notify>,
}

#[async_trait]
impl RecordSource for GatedSource {
    async fn fetch_all(&self, _resource_path: &str) -> Result<Vec<Record>> {
        self.entered.notify_one();
        self.release.notified().await;
        Ok(vec![Record::new().with("id", 1)])
    }
}

#[tokio::test]
async fn test_second_trigger_while_busy_is_rejected() {
    let entered = Arc::new(Notify::new());
    let release = Arc::new(Notify::new());
    let output = TempDir::new().unwrap();
    let notifier = RecordingNotifier::default();
    let engine = ExportEngine::new(
        GatedSource {
            entered: entered.clone(),
            release: release.clone(),
        },
        LocalStorage::new(output.path().to_string_lossy().into_owned()),
        notifier.clone(),
    );

    let job = ExportJob::new("/curso/publicos", "cursos", ExportFormat::Json);
    let (first, second) = tokio::join!(engine.run_export(&job), async {
        entered.notified().await;
        assert!(engine.is_exporting());
        let rejected = engine.run_export(&job).await;
        release.notify_one();
        rejected
    });

    assert!(matches!(first, Ok(ExportOutcome::Saved { .. })));
    assert!(matches!(second, Err(ExportError::ExportInProgressError)));
    assert_eq!(notifier.notices().len(), 1);
    assert!(!engine.is_exporting());

    // 旗標釋放後可以再次匯出
    release.notify_one();
    assert!(engine.run_export(&job).await.is_ok());
}

#[tokio::test]
async fn test_preset_from_toml_drives_export() {
    let server = MockServer::start_async().await;
    let mock = server
        .mock_async(|when, then| {
            when.method(GET)
                .path("/api/estudiante/pagos")
                .header("Authorization", "Bearer token-de-prueba");
            then.status(200).json_body(json!({
                "items": [
                    {"id": 1, "curso": {"titulo": "Álgebra"}, "monto": 25},
                    {"id": 2, "curso": {"titulo": "Física"}, "monto": 30}
                ]
            }));
        })
        .await;

    let output = TempDir::new().unwrap();
    let config = TomlConfig::from_toml_str(&format!(
        r#"
[api]
base_url = "{}"
token = "token-de-prueba"

[output]
path = "{}"

[[exports]]
name = "pagos"
resource = "/estudiante/pagos"
file_name = "mis_pagos"
format = "csv"
uppercase_labels = true

[[exports.fields]]
source = "curso.titulo"
label = "Curso"

[[exports.fields]]
source = "monto"
label = "Monto"
"#,
        server.url("/api"),
        output.path().display()
    ))
    .unwrap();

    let preset = config.preset("pagos").unwrap();
    let job = ExportJob::new(
        preset.resource.clone(),
        preset.file_name.clone(),
        preset.format.unwrap(),
    )
    .with_shared_projection(preset.projection().into_projection());

    let engine = ExportEngine::new(
        HttpRecordSource::from_config(&config).unwrap(),
        LocalStorage::new(config.output.path.clone()),
        RecordingNotifier::default(),
    );
    engine.run_export(&job).await.unwrap();

    mock.assert_async().await;
    let csv = std::fs::read_to_string(output.path().join("mis_pagos.csv")).unwrap();
    assert_eq!(csv, "CURSO,MONTO\nÁlgebra,25\nFísica,30\n");
}

use imoscout_core::{
    collect_files, CsvSink, Database, DedupedListing, DirectoryUploader, EnrichedRecord, JsonSink,
    MetricsRecorder, RecordFilter, ScoutError, UploadKind, Uploader,
};
use std::fs;
use tempfile::tempdir;
use url::Url;

fn listing(title: &str, slug: &str) -> DedupedListing {
    DedupedListing {
        title: title.to_string(),
        link: Url::parse(&format!("https://www.imovirtual.com/pt/anuncio/{}", slug)).unwrap(),
    }
}

fn record(title: &str, slug: &str, price: &str) -> EnrichedRecord {
    let mut record = EnrichedRecord::from_listing(&listing(title, slug));
    record.set_address(Some("Avenida da Boavista, Porto, Porto".to_string()));
    record.price = Some(price.to_string());
    record.merge_attribute("Tipo", "Apartamento".to_string());
    record.merge_attribute("Certificado Energético", "A".to_string());
    record
}

#[tokio::test]
async fn test_records_round_trip_through_database() {
    let dir = tempdir().unwrap();
    let db = Database::new(dir.path().join("imoscout.db")).await.unwrap();

    let records = vec![
        record("T2 Boavista", "t2-boavista", "310 000"),
        record("T3 Foz", "t3-foz", "640 000"),
    ];
    db.save_records("imovirtual", "apartamento", &records).await.unwrap();

    // A second crawl refreshes the same link instead of duplicating it
    let refreshed = record("T2 Boavista", "t2-boavista", "295 000");
    db.save_record("imovirtual", "apartamento", &refreshed).await.unwrap();

    assert_eq!(db.count().await.unwrap(), 2);

    let stored = db.list_records(&RecordFilter::default()).await.unwrap();
    assert_eq!(stored[0].record.title, "T2 Boavista");
    assert_eq!(stored[0].record.price.as_deref(), Some("295 000"));
    assert_eq!(stored[0].record.attribute("Certificado Energético"), Some("A"));
    assert_eq!(stored[1].record.city.as_deref(), Some("Porto"));

    let moradias = db
        .list_records(&RecordFilter {
            typology: Some("moradia".to_string()),
            ..RecordFilter::default()
        })
        .await
        .unwrap();
    assert!(moradias.is_empty());
}

#[tokio::test]
async fn test_sinks_and_upload() {
    let data = tempdir().unwrap();
    let bucket = tempdir().unwrap();

    let json_sink = JsonSink::new(data.path());
    let raw_path = json_sink
        .write_raw(
            "imovirtual",
            "apartamento",
            &[listing("T2 Boavista", "t2-boavista"), listing("T3 Foz", "t3-foz")],
        )
        .unwrap();
    let raw: serde_json::Value = serde_json::from_str(&fs::read_to_string(&raw_path).unwrap()).unwrap();
    assert_eq!(
        raw["T3 Foz"],
        "https://www.imovirtual.com/pt/anuncio/t3-foz"
    );

    let csv_sink = CsvSink::new(data.path());
    let csv_path = csv_sink
        .write_processed(
            "imovirtual",
            "apartamento",
            &[record("T2 Boavista", "t2-boavista", "310 000")],
        )
        .unwrap();

    let mut reader = csv::Reader::from_path(&csv_path).unwrap();
    let headers = reader.headers().unwrap().clone();
    assert_eq!(&headers[0], "title");
    assert_eq!(headers.len(), 14);
    let rows: Vec<csv::StringRecord> = reader.records().map(|r| r.unwrap()).collect();
    assert_eq!(rows.len(), 1);
    assert_eq!(&rows[0][3], "310 000");

    let uploader = DirectoryUploader::new(bucket.path());
    let json_files = collect_files(json_sink.dir(), UploadKind::Json).unwrap();
    let csv_files = collect_files(csv_sink.dir(), UploadKind::Csv).unwrap();
    assert_eq!(uploader.upload(&json_files, UploadKind::Json).await.unwrap(), 1);
    assert_eq!(uploader.upload(&csv_files, UploadKind::Csv).await.unwrap(), 1);

    let raw_name = raw_path.file_name().unwrap();
    assert!(bucket.path().join("raw").join(raw_name).exists());
    assert!(bucket
        .path()
        .join("processed")
        .join(csv_path.file_name().unwrap())
        .exists());
}

#[tokio::test]
async fn test_metrics_are_written_for_failures_too() {
    let data = tempdir().unwrap();
    let metrics = MetricsRecorder::new(data.path());

    let result: Result<(), ScoutError> = metrics
        .measure("store", async { Err(ScoutError::Upload("bucket offline".to_string())) })
        .await;
    assert!(result.is_err());

    let written: Vec<_> = fs::read_dir(data.path().join("metrics"))
        .unwrap()
        .map(|entry| entry.unwrap().path())
        .collect();
    assert_eq!(written.len(), 1);

    let record: serde_json::Value =
        serde_json::from_str(&fs::read_to_string(&written[0]).unwrap()).unwrap();
    assert_eq!(record["operation"], "store");
    assert_eq!(record["succeeded"], false);
}

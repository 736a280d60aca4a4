use agri_forecast::{
    ForecastConfig, ForecastError, ForecastService, Prediction, RawRecord, SeriesKey,
};
use chrono::{Days, NaiveDate};
use pretty_assertions::assert_eq;
use std::io::Write;
use tempfile::{tempdir, NamedTempFile, TempDir};

fn ymd(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

const HISTORY_END: (i32, u32, u32) = (2024, 1, 10);
const HISTORY_DAYS: u64 = 120;

fn history_end() -> NaiveDate {
    ymd(HISTORY_END.0, HISTORY_END.1, HISTORY_END.2)
}

// Small and fast model settings; 120 days give 100 windows
fn create_service() -> (TempDir, ForecastService) {
    let dir = tempdir().unwrap();
    let config = ForecastConfig {
        seq_len: 14,
        horizon: 7,
        epochs: 15,
        batch_size: 16,
        data_dir: dir.path().join("data"),
        models_dir: dir.path().join("models"),
        ..ForecastConfig::default()
    };
    (dir, ForecastService::new(config).unwrap())
}

// Raw export in the shape the markets publish, with DD/MM/YYYY dates and an
// ignored serial-number column; every fifth day is missing
fn create_sample_export() -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    writeln!(file, "Sl no,Date,State,District,Crop,Modal Price").unwrap();

    let start = history_end() - Days::new(HISTORY_DAYS - 1);
    for i in 0..HISTORY_DAYS {
        if i % 5 == 3 {
            continue;
        }
        let date = start + Days::new(i);
        let price = 2400.0 + 3.0 * i as f64 + 60.0 * (i as f64 * 0.2).sin();
        writeln!(
            file,
            "{},{},Karnataka,Mysuru,Ragi,{:.2}",
            i + 1,
            date.format("%d/%m/%Y"),
            price
        )
        .unwrap();
    }

    file
}

fn trained_service() -> (TempDir, ForecastService) {
    let (dir, service) = create_service();
    let export = create_sample_export();
    let records = agri_forecast::DataLoader::from_csv(export.path()).unwrap();
    service.ingest_as_of(&records, ymd(2024, 1, 31)).unwrap();
    service.train("Karnataka", "Ragi").unwrap();
    (dir, service)
}

fn predict(service: &ForecastService, date: Option<&str>) -> Prediction {
    service
        .predict("Karnataka", Some("Mysuru"), "Ragi", date)
        .unwrap()
}

#[test]
fn test_full_forecast_workflow() {
    let (_dir, service) = create_service();
    let export = create_sample_export();

    let records = agri_forecast::DataLoader::from_csv(export.path()).unwrap();
    let report = service.ingest_as_of(&records, ymd(2024, 1, 31)).unwrap();
    assert_eq!(report.rows_read, 96);
    assert_eq!(report.rows_persisted, 96);
    assert_eq!(report.rows_dropped, 0);

    let metrics = service.train("Karnataka", "ragi").unwrap();
    assert!(metrics.rmse.is_finite() && metrics.rmse >= 0.0);
    assert!(metrics.mape.is_finite() && metrics.mape >= 0.0);

    let stored = service
        .metrics(&SeriesKey::new("Karnataka", "RAGI"))
        .unwrap();
    assert_eq!(stored, metrics);

    let prediction = predict(&service, None);
    assert_eq!(prediction.forecasts.len(), 7);
    for point in &prediction.forecasts {
        assert!(point.price.is_finite());
        assert_eq!((point.price * 100.0).round() / 100.0, point.price);
    }
}

// History ends 2024-01-10: the forecast starts on the anchor date
#[test]
fn test_forecast_starts_on_anchor_date() {
    let (_dir, service) = trained_service();
    let b = predict(&service, None);

    assert_eq!(b.anchor_date, ymd(2024, 1, 11));
    assert_eq!(b.start_date, ymd(2024, 1, 11));
    let dates: Vec<NaiveDate> = b.forecasts.iter().map(|p| p.date).collect();
    let expected: Vec<NaiveDate> = (11..=17).map(|d| ymd(2024, 1, d)).collect();
    assert_eq!(dates, expected);
    assert_eq!(b.representative_price, b.forecasts[0].price);
    assert!(!b.clamped);
}

// A date inside history is clamped to the anchor and flagged
#[test]
fn test_past_request_is_clamped() {
    let (_dir, service) = trained_service();
    let b = predict(&service, None);
    let c = predict(&service, Some("2024-01-09"));

    assert!(c.clamped);
    assert_eq!(c.anchor_date, b.anchor_date);
    assert_eq!(c.start_date, b.start_date);
    assert_eq!(c.forecasts, b.forecasts);
}

// A later date is a slice of the same forward path
#[test]
fn test_future_request_reuses_anchor_path() {
    let (_dir, service) = trained_service();
    let b = predict(&service, None);
    let d = predict(&service, Some("13/01/2024"));

    assert_eq!(d.anchor_date, ymd(2024, 1, 11));
    assert_eq!(d.forecasts[0].date, ymd(2024, 1, 13));
    assert_eq!(d.forecasts[6].date, ymd(2024, 1, 19));
    assert_eq!(d.representative_price, b.forecasts[2].price);
    assert_eq!(&d.forecasts[..5], &b.forecasts[2..]);
}

#[test]
fn test_overlapping_requests_agree() {
    let (_dir, service) = trained_service();
    let requests: Vec<Prediction> = (0..10)
        .map(|offset| {
            let date = ymd(2024, 1, 11) + Days::new(offset);
            predict(&service, Some(&date.to_string()))
        })
        .collect();

    for a in &requests {
        for b in &requests {
            for pa in &a.forecasts {
                if let Some(pb) = b.forecasts.iter().find(|p| p.date == pa.date) {
                    assert_eq!(pa.price.to_bits(), pb.price.to_bits(), "on {}", pa.date);
                }
            }
        }
    }
}

#[test]
fn test_prediction_has_no_side_effects() {
    let (dir, service) = trained_service();
    let artifact = dir.path().join("models").join("Karnataka__ragi.json");
    let before = std::fs::read(&artifact).unwrap();

    let first = predict(&service, Some("2024-01-15"));
    let second = predict(&service, Some("2024-01-15"));

    assert_eq!(first, second);
    assert_eq!(std::fs::read(&artifact).unwrap(), before);
}

#[test]
fn test_subregion_falls_back_to_region() {
    let (_dir, service) = trained_service();

    let local = predict(&service, None);
    assert_eq!(local.subregion.as_deref(), Some("Mysuru"));

    let pooled = service
        .predict("Karnataka", Some("Hassan"), "Ragi", None)
        .unwrap();
    assert_eq!(pooled.subregion, None);
    assert_eq!(pooled.forecasts, local.forecasts);

    let region = service.predict("Karnataka", None, "Ragi", None).unwrap();
    assert_eq!(region.subregion, None);
    assert_eq!(region.forecasts, local.forecasts);
}

// Three valid rows and two without a price
#[test]
fn test_ingest_drops_rows_without_price() {
    let (_dir, service) = create_service();
    let row = |date: &str, price: Option<&str>| RawRecord {
        date: Some(date.to_string()),
        region: Some("Bihar".to_string()),
        subregion: Some("Patna".to_string()),
        commodity: Some("Maize".to_string()),
        price: price.map(str::to_string),
    };
    let records = vec![
        row("2024-01-01", Some("1800")),
        row("2024-01-02", None),
        row("2024-01-03", Some("1815.5")),
        row("2024-01-04", Some("")),
        row("2024-01-05", Some("1822")),
    ];

    let report = service.ingest_as_of(&records, ymd(2024, 1, 31)).unwrap();
    assert_eq!(report.rows_read, 5);
    assert_eq!(report.rows_persisted, 3);
    assert_eq!(report.rows_dropped, 2);
    assert_eq!(service.store().load_all().unwrap().len(), 3);
}

#[test]
fn test_ingest_ranks_commodities() {
    let (_dir, service) = create_service();
    let row = |commodity: &str, day: u32| RawRecord {
        date: Some(format!("2024-01-{:02}", day)),
        region: Some("Bihar".to_string()),
        subregion: Some("Patna".to_string()),
        commodity: Some(commodity.to_string()),
        price: Some("100".to_string()),
    };
    let records = vec![
        row("Maize", 1),
        row("Wheat", 1),
        row("Wheat", 2),
        row("Onion", 1),
        row("Maize", 2),
        row("Wheat", 3),
    ];

    service.ingest_as_of(&records, ymd(2024, 1, 31)).unwrap();
    assert_eq!(
        service.top_commodities("Bihar", Some("Patna")).unwrap(),
        vec!["Wheat", "Maize", "Onion"]
    );
}

#[test]
fn test_train_all_reports_each_key() {
    let (_dir, service) = create_service();
    let export = create_sample_export();
    let mut records = agri_forecast::DataLoader::from_csv(export.path()).unwrap();
    records.push(RawRecord {
        date: Some("2024-01-05".to_string()),
        region: Some("Kerala".to_string()),
        subregion: None,
        commodity: Some("Pepper".to_string()),
        price: Some("51000".to_string()),
    });
    service.ingest_as_of(&records, ymd(2024, 1, 31)).unwrap();

    let outcomes = service.train_all().unwrap();
    assert_eq!(outcomes.len(), 2);
    assert_eq!(outcomes[0].key, SeriesKey::new("Karnataka", "Ragi"));
    assert!(outcomes[0].result.is_ok());
    assert!(matches!(
        outcomes[1].result,
        Err(ForecastError::InsufficientData { available: 1, .. })
    ));
}

#[test]
fn test_predict_without_model_is_model_not_found() {
    let (_dir, service) = create_service();
    assert!(matches!(
        service.predict("Karnataka", None, "Ragi", None),
        Err(ForecastError::ModelNotFound { .. })
    ));
}

#[test]
fn test_unparseable_date_is_invalid_date() {
    let (_dir, service) = trained_service();
    assert!(matches!(
        service.predict("Karnataka", None, "Ragi", Some("next tuesday")),
        Err(ForecastError::InvalidDate(_))
    ));
}

#[test]
fn test_too_few_windows_is_insufficient_samples() {
    let (dir, _) = create_service();
    let config = ForecastConfig {
        seq_len: 14,
        horizon: 7,
        min_samples: 500,
        data_dir: dir.path().join("data"),
        models_dir: dir.path().join("models"),
        ..ForecastConfig::default()
    };
    let service = ForecastService::new(config).unwrap();
    let export = create_sample_export();
    let records = agri_forecast::DataLoader::from_csv(export.path()).unwrap();
    service.ingest_as_of(&records, ymd(2024, 1, 31)).unwrap();

    assert!(matches!(
        service.train("Karnataka", "Ragi"),
        Err(ForecastError::InsufficientSamples {
            required: 500,
            available: 100,
            ..
        })
    ));
}

// A failed retrain must leave the previously saved model in place
#[test]
fn test_failed_retrain_keeps_previous_model() {
    let (dir, _service) = trained_service();
    let models_dir = dir.path().join("models");
    let artifact = models_dir.join("Karnataka__ragi.json");
    let before = std::fs::read(&artifact).unwrap();

    let strict = ForecastService::new(ForecastConfig {
        seq_len: 14,
        horizon: 7,
        min_samples: 500,
        data_dir: dir.path().join("data"),
        models_dir: models_dir.clone(),
        ..ForecastConfig::default()
    })
    .unwrap();
    assert!(matches!(
        strict.train("Karnataka", "Ragi"),
        Err(ForecastError::InsufficientSamples { .. })
    ));
    assert_eq!(std::fs::read(&artifact).unwrap(), before);

    let sparse = ForecastService::new(ForecastConfig {
        seq_len: 14,
        horizon: 7,
        data_dir: dir.path().join("sparse_data"),
        models_dir: models_dir.clone(),
        ..ForecastConfig::default()
    })
    .unwrap();
    let records: Vec<RawRecord> = (1..=5)
        .map(|day| RawRecord {
            date: Some(format!("2024-01-{:02}", day)),
            region: Some("Karnataka".to_string()),
            subregion: Some("Mysuru".to_string()),
            commodity: Some("Ragi".to_string()),
            price: Some("2500".to_string()),
        })
        .collect();
    sparse.ingest_as_of(&records, ymd(2024, 1, 31)).unwrap();
    assert!(matches!(
        sparse.train("Karnataka", "Ragi"),
        Err(ForecastError::InsufficientData { available: 5, .. })
    ));
    assert_eq!(std::fs::read(&artifact).unwrap(), before);

    // the untouched model still serves forecasts over the full history
    assert!(matches!(
        sparse.predict("Karnataka", None, "Ragi", None),
        Err(ForecastError::InsufficientHistory { .. })
    ));
    assert_eq!(predict(&strict, None).forecasts.len(), 7);
}

#[test]
fn test_lookalike_commodity_has_no_model() {
    let (_dir, service) = trained_service();
    for commodity in ["Ragi!", "Ragi_", "Ra gi"] {
        assert!(matches!(
            service.predict("Karnataka", None, commodity, None),
            Err(ForecastError::ModelNotFound { .. })
        ));
    }
}

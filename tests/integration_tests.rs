/// End-to-end tests: cached API bodies → processed tables → models → shortlist.
///
/// Run with: cargo test --test integration_tests -- --nocapture
use cf_recommender::{
    config::PipelineConfig,
    model::GbtRegressor,
    pipeline,
    recommend::recommend_for_records,
    store::{self, BlobStore, FsStore, MemoryStore},
    train, PipelineError,
};

fn submissions_json(base_rating: i32, solves: usize) -> String {
    let items: Vec<String> = (0..solves)
        .map(|i| {
            format!(
                concat!(
                    r#"{{"verdict":"OK","creationTimeSeconds":{},"problem":"#,
                    r#"{{"contestId":{},"index":"A","name":"p{}","rating":{},"tags":["math"]}}}}"#,
                ),
                1_000 + 3_600 * i,
                100 + i,
                i,
                base_rating + 100 * (i as i32 % 3)
            )
        })
        .collect();
    format!(r#"{{"status":"OK","result":[{}]}}"#, items.join(","))
}

fn rating_json(final_rating: i32) -> String {
    format!(
        concat!(
            r#"{{"status":"OK","result":[{{"contestId":1,"#,
            r#""ratingUpdateTimeSeconds":10,"oldRating":0,"newRating":{}}}]}}"#,
        ),
        final_rating
    )
}

fn catalog() -> Vec<cf_recommender::types::ProblemCatalogEntry> {
    let body = r#"{"status":"OK","result":{"problems":[
        {"contestId":100,"index":"A","name":"p0","rating":1300,"tags":["math"]},
        {"contestId":500,"index":"B","name":"Bravo","rating":1350,"tags":["greedy"]},
        {"contestId":501,"index":"C","name":"Alpha","rating":1350,"tags":["dp"]},
        {"contestId":502,"index":"D","name":"Charlie","rating":1400,"tags":[]},
        {"contestId":503,"index":"E","name":"Far","rating":2400,"tags":[]},
        {"contestId":504,"index":"F","name":"Unrated","tags":[]}
    ]}}"#;
    cf_recommender::source::parse_catalog(body.as_bytes()).unwrap()
}

/// Ten users whose final rating tracks their average solved rating.
fn seeded_store() -> MemoryStore {
    let mut store = MemoryStore::new();
    let cfg = PipelineConfig::default();
    for u in 0..10 {
        let handle = format!("user{u}");
        let base = 1000 + 50 * u;
        let submissions = submissions_json(base, 6);
        store.put(&store::submissions_key(&handle), submissions.as_bytes()).unwrap();
        store.put(&store::rating_key(&handle), rating_json(base + 200).as_bytes()).unwrap();
        pipeline::process_user(&mut store, &handle, &cfg.features).unwrap();
    }
    store
}

#[test]
fn test_general_model_end_to_end() {
    println!("\n=== Test: General Model End To End ===");
    let mut store = seeded_store();
    let cfg = PipelineConfig::default();

    let rows = train::train_and_save_general(&mut store, &cfg.train).unwrap();
    assert_eq!(rows, 10);
    let model: GbtRegressor = store::load_estimator(&store, store::GENERAL_MODEL_KEY).unwrap();

    let records = pipeline::cached_submissions(&store, "user4").unwrap();
    let catalog = catalog();
    let first =
        recommend_for_records("user4", &model, &records, &catalog, &cfg.features, &cfg.recommend)
            .unwrap();
    println!("✓ Predicted {} with {} problems", first.predicted_rating, first.problems.len());

    let solved = cf_recommender::types::solved_set(&records);
    for p in &first.problems {
        assert!(!solved.contains(&p.id), "solved problem {} recommended", p.id);
        assert!((p.rating - first.predicted_rating).abs() <= cfg.recommend.window);
    }
    for w in first.problems.windows(2) {
        assert!(w[0] <= w[1], "shortlist not sorted");
    }

    let second =
        recommend_for_records("user4", &model, &records, &catalog, &cfg.features, &cfg.recommend)
            .unwrap();
    assert_eq!(first, second, "recommend must be deterministic");
    println!("✓ Repeated call gave identical output");
}

#[test]
fn test_general_training_needs_ten_rows() {
    println!("\n=== Test: Minimum Rows ===");
    let mut store = seeded_store();
    let table = store.get(&store::processed_key("user0")).unwrap().unwrap();
    let text = String::from_utf8(table).unwrap();
    let header_only = text.lines().next().unwrap().to_string() + "\n";
    store.put(&store::processed_key("user0"), header_only.as_bytes()).unwrap();

    let cfg = PipelineConfig::default();
    let err = train::train_and_save_general(&mut store, &cfg.train).unwrap_err();
    assert!(matches!(err, PipelineError::InsufficientData { found: 9, required: 10 }));
    assert_eq!(store.get(store::GENERAL_MODEL_KEY).unwrap(), None);
    println!("✓ 9 rows refused");
}

#[test]
fn test_shortlist_ordering_against_fixed_prediction() {
    println!("\n=== Test: Ordering ===");
    // One-row training set: the per-user model predicts that user's target.
    let mut store = MemoryStore::new();
    store
        .put(
            &store::processed_key("solo"),
            b"solved_count,avg_rating,avg_time_taken,hard_ratio,future_rating\n5,1300,100,0,1380\n",
        )
        .unwrap();
    train::train_one(&mut store, "solo", &Default::default()).unwrap();
    let model: GbtRegressor =
        store::load_estimator(&store, &store::user_model_key("solo")).unwrap();

    store.put(&store::submissions_key("solo"), submissions_json(1300, 1).as_bytes()).unwrap();
    let records = pipeline::cached_submissions(&store, "solo").unwrap();
    let cfg = PipelineConfig::default();
    let catalog = catalog();
    let out =
        recommend_for_records("solo", &model, &records, &catalog, &cfg.features, &cfg.recommend)
            .unwrap();

    assert_eq!(out.predicted_rating, 1380);
    let names: Vec<&str> = out.problems.iter().map(|p| p.name.as_str()).collect();
    // p0 (100A) is solved; ties at 1350 order by name.
    assert_eq!(names, vec!["Alpha", "Bravo", "Charlie"]);
    println!("✓ Ordering: {:?}", names);
}

#[test]
fn test_batch_training_on_disk() {
    println!("\n=== Test: Batch Training On Disk ===");
    let dir = tempfile::tempdir().unwrap();
    let mut store = FsStore::new(dir.path());
    store
        .put(
            &store::processed_key("alice"),
            concat!(
                "solved_count,avg_rating,avg_time_taken,hard_ratio,future_rating\n",
                "20,1450,5000,0.1,1520\n",
            )
            .as_bytes(),
        )
        .unwrap();

    let report = train::train_batch(&mut store, ["alice", "bob"], &Default::default());
    assert_eq!(report.succeeded, vec!["alice".to_string()]);
    assert!(matches!(report.failed[0].1, PipelineError::DataUnavailable { .. }));
    assert!(dir.path().join("models").join("alice_rating_model.json").exists());
    println!("✓ bob skipped, alice trained");
}

#[test]
fn test_user_without_rated_solves() {
    println!("\n=== Test: No Usable History ===");
    let mut store = MemoryStore::new();
    let body = r#"{"status":"OK","result":[
        {"verdict":"WRONG_ANSWER","creationTimeSeconds":1,
         "problem":{"contestId":1,"index":"A","name":"x","rating":800}},
        {"verdict":"OK","creationTimeSeconds":2,"problem":{"contestId":1,"index":"B","name":"y"}}
    ]}"#;
    store.put(&store::submissions_key("newbie"), body.as_bytes()).unwrap();
    let records = pipeline::cached_submissions(&store, "newbie").unwrap();

    let model = GbtRegressor::default();
    let cfg = PipelineConfig::default();
    let catalog = catalog();
    let err =
        recommend_for_records("newbie", &model, &records, &catalog, &cfg.features, &cfg.recommend)
            .unwrap_err();
    assert!(matches!(err, PipelineError::NoRecommendations { .. }));
    println!("✓ NoRecommendations reported");
}

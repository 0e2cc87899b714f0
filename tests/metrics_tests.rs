//! Tests for retained-memory metrics and global garbage collection

use primeselect::{CacheKey, Metrics, PrimeSelect, PrimeSelectError, SelectOptions, Value};

fn repeat_selector(ctx: &PrimeSelect, name: &str) -> primeselect::Selector<usize, String> {
    ctx.create_selector(
        name,
        |n: &usize| vec![Value::from(*n)],
        |n: &usize| "x".repeat(*n),
    )
    .unwrap()
}

#[test]
fn test_total_is_sum_of_cells() {
    let ctx = PrimeSelect::new();
    let small = repeat_selector(&ctx, "small");
    let large = repeat_selector(&ctx, "large");
    small.select(&8).unwrap();
    large.select(&4096).unwrap();
    large
        .select_with(&64, SelectOptions::new().sub_cache("medium"))
        .unwrap();

    let report = ctx.overall_metrics();
    assert_eq!(report.total_selectors, 3);
    let sum: usize = report
        .selectors_ranked
        .iter()
        .map(|metrics| metrics.cache_size.bytes)
        .sum();
    assert_eq!(report.cache_size.bytes, sum);
}

#[test]
fn test_ranking_is_largest_first() {
    let ctx = PrimeSelect::new();
    let small = repeat_selector(&ctx, "small");
    let large = repeat_selector(&ctx, "large");
    small.select(&8).unwrap();
    large.select(&4096).unwrap();
    large
        .select_with(&64, SelectOptions::new().sub_cache("medium"))
        .unwrap();

    let report = ctx.overall_metrics();
    let keys: Vec<CacheKey> = report
        .selectors_ranked
        .iter()
        .map(|metrics| metrics.key.clone())
        .collect();
    assert_eq!(
        keys,
        vec![
            CacheKey::main("large"),
            CacheKey::sub("large", "medium"),
            CacheKey::main("small"),
        ]
    );
    assert_eq!(
        report.max_cache_usage_selector.map(|metrics| metrics.key),
        Some(CacheKey::main("large"))
    );
}

#[test]
fn test_cleared_cell_retains_nothing() {
    let ctx = PrimeSelect::new();
    let large = repeat_selector(&ctx, "large");
    large.select(&1024).unwrap();
    assert!(ctx.metrics("large").unwrap().cache_size.bytes >= 1024);

    large.clear(None).unwrap();
    let metrics = ctx.metrics("large").unwrap();
    assert_eq!(metrics.cache_size.bytes, 0);
    assert!(metrics.cache.result.is_none());
    assert!(metrics.cache.dependency.is_empty());
}

#[test]
fn test_snapshot_is_independent_of_cell() {
    let ctx = PrimeSelect::new();
    let echo = ctx
        .create_selector("echo", |v: &Value| vec![v.clone()], |v: &Value| format!("{v:?}"))
        .unwrap();
    let items = Value::list([1, 2]);
    echo.select(&items).unwrap();

    let before = ctx.metrics("echo").unwrap().cache;
    items.as_list().unwrap().write().push(Value::from(3));
    assert_eq!(before.dependency, vec![Value::list([1, 2])]);
}

#[test]
fn test_get_metrics_by_name_and_overall() {
    let ctx = PrimeSelect::new();
    repeat_selector(&ctx, "one").select(&3).unwrap();

    match ctx.get_metrics(Some("one")).unwrap() {
        Metrics::Selector(metrics) => assert_eq!(metrics.key, CacheKey::main("one")),
        Metrics::Overall(_) => panic!("expected selector metrics"),
    }
    match ctx.get_metrics(None).unwrap() {
        Metrics::Overall(report) => assert_eq!(report.total_selectors, 1),
        Metrics::Selector(_) => panic!("expected overall metrics"),
    }
    assert!(matches!(
        ctx.get_metrics(Some("two")),
        Err(PrimeSelectError::NotFound(_))
    ));
}

#[test]
fn test_garbage_collection_reports_before_and_after() {
    let ctx = PrimeSelect::new();
    let large = repeat_selector(&ctx, "large");
    large.select(&2048).unwrap();

    let summary = ctx.perform_global_garbage_collection(true);
    assert_eq!(summary.cleared, 1);
    let before = summary.before.unwrap();
    let after = summary.after.unwrap();
    assert!(before.cache_size.bytes >= 2048);
    assert_eq!(after.cache_size.bytes, 0);
    assert!(after.max_cache_usage_selector.is_none());
    assert_eq!(after.total_selectors, 1);

    assert_eq!(large.select(&2048).unwrap().len(), 2048);
}

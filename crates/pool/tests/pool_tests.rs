use micro_pool::{job_fn, PoolManager, PoolOptions};
use std::collections::HashSet;
use std::sync::Arc;

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn every_request_completes_exactly_once() {
    let manager = PoolManager::new();
    let pool = manager
        .create_pool("checksum", job_fn(|bytes: Vec<u8>| bytes.iter().map(|b| u64::from(*b)).sum::<u64>()), PoolOptions::new(1, 3))
        .unwrap();
    let pool = Arc::new(pool);

    let handles = (0u8..64)
        .map(|n| {
            let pool = Arc::clone(&pool);
            tokio::spawn(async move { (n, pool.run(vec![n; 4]).await) })
        })
        .collect::<Vec<_>>();

    let mut seen = HashSet::new();
    for handle in handles {
        let (n, result) = handle.await.unwrap();
        assert_eq!(result.unwrap(), u64::from(n) * 4);
        assert!(seen.insert(n));
    }
    assert_eq!(seen.len(), 64);

    let stats = pool.stats().await;
    assert_eq!(stats.queued, 0);
    assert_eq!(stats.idle + stats.busy, stats.size);
    assert!(stats.size <= 3);

    let pool = Arc::into_inner(pool).unwrap();
    manager.terminate(pool).await;
    assert!(!manager.contains("checksum"));
}

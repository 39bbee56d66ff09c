// SPDX-License-Identifier: Apache-2.0

//! End-to-end coverage of the init pathway: memoization, single-flight
//! coalescing, failure recovery, and the post-allocation hook.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use init_registry::{
    async_trait, ArgForwarding, BoxFuture, Construct, InitError, Registration, Registry,
    RegistryConfig, Result,
};

fn registry() -> Registry {
    init_registry::logging::init();
    Registry::with_config(RegistryConfig::default())
}

#[derive(Debug, Default)]
struct App {
    port: u16,
}

impl Construct for App {
    type Args = u16;

    fn allocate() -> Self {
        Self::default()
    }
}

#[tokio::test]
async fn return_first_memoizes_and_ignores_later_args() {
    let registry = registry();
    registry
        .register::<App>(Registration::new().initializer(|app: &mut App, port| {
            app.port = port;
            Ok(())
        }))
        .unwrap();

    let first = registry.request_init::<App>(3000).unwrap();
    assert!(first.is_ready(), "sync initializer must not suspend");
    let second = registry.request_init::<App>(4000).unwrap();

    let a1 = Arc::clone(first.ready().unwrap());
    let a2 = Arc::clone(second.ready().unwrap());
    assert!(Arc::ptr_eq(&a1, &a2));
    assert_eq!(a1.port, 3000);
    assert!(Arc::ptr_eq(&registry.instance_of::<App>().unwrap(), &a1));
}

#[derive(Debug, Default)]
struct Db {
    url: String,
}

impl Construct for Db {
    type Args = &'static str;

    fn allocate() -> Self {
        Self::default()
    }
}

static DB_RUNS: AtomicUsize = AtomicUsize::new(0);

fn init_db<'a>(db: &'a mut Db, url: &'static str) -> BoxFuture<'a, Result<()>> {
    Box::pin(async move {
        tokio::time::sleep(Duration::from_millis(5)).await;
        DB_RUNS.fetch_add(1, Ordering::SeqCst);
        db.url = url.to_string();
        Ok(())
    })
}

#[tokio::test]
async fn concurrent_callers_share_one_pending_handle() {
    let registry = registry();
    registry
        .register::<Db>(Registration::new().deferred_initializer(init_db))
        .unwrap();

    let p1 = registry.request_init::<Db>("url-a").unwrap();
    let p2 = registry.request_init::<Db>("url-b").unwrap();
    let (p1, p2) = (p1.pending().unwrap().clone(), p2.pending().unwrap().clone());
    assert!(p1.same_flight(&p2), "later callers must coalesce");

    let (a, b) = tokio::join!(p1, p2);
    let (a, b) = (a.unwrap(), b.unwrap());
    assert!(Arc::ptr_eq(&a, &b));
    assert_eq!(a.url, "url-a", "second caller's args are discarded");
    assert_eq!(DB_RUNS.load(Ordering::SeqCst), 1);
}

#[derive(Debug, Default)]
struct Fanout {
    seed: u64,
}

static FANOUT_RUNS: AtomicUsize = AtomicUsize::new(0);

impl Construct for Fanout {
    type Args = u64;

    fn allocate() -> Self {
        Self::default()
    }
}

fn init_fanout<'a>(fanout: &'a mut Fanout, seed: u64) -> BoxFuture<'a, Result<()>> {
    Box::pin(async move {
        tokio::time::sleep(Duration::from_millis(10)).await;
        FANOUT_RUNS.fetch_add(1, Ordering::SeqCst);
        fanout.seed = seed;
        Ok(())
    })
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn parallel_callers_run_the_initializer_exactly_once() {
    let registry = Arc::new(registry());
    registry
        .register::<Fanout>(Registration::new().deferred_initializer(init_fanout))
        .unwrap();

    let mut tasks = Vec::new();
    for i in 0..16u64 {
        let registry = Arc::clone(&registry);
        tasks.push(tokio::spawn(async move { registry.init::<Fanout>(i).await }));
    }

    let mut instances = Vec::new();
    for task in tasks {
        instances.push(task.await.unwrap().unwrap());
    }
    for instance in &instances[1..] {
        assert!(Arc::ptr_eq(&instances[0], instance));
    }
    assert_eq!(FANOUT_RUNS.load(Ordering::SeqCst), 1);
}

#[derive(Debug, Default)]
struct Flaky {
    attempt: usize,
}

static FLAKY_RUNS: AtomicUsize = AtomicUsize::new(0);

impl Construct for Flaky {
    type Args = ();

    fn allocate() -> Self {
        Self::default()
    }
}

fn init_flaky<'a>(flaky: &'a mut Flaky, _args: ()) -> BoxFuture<'a, Result<()>> {
    Box::pin(async move {
        tokio::time::sleep(Duration::from_millis(2)).await;
        let run = FLAKY_RUNS.fetch_add(1, Ordering::SeqCst);
        if run == 0 {
            anyhow::bail!("transient failure");
        }
        flaky.attempt = run;
        Ok(())
    })
}

#[tokio::test]
async fn a_failed_attempt_does_not_poison_the_construct() {
    let registry = registry();
    registry
        .register::<Flaky>(Registration::new().deferred_initializer(init_flaky))
        .unwrap();

    // Two coalesced waiters observe the same failure.
    let p1 = registry.request_init::<Flaky>(()).unwrap();
    let p2 = registry.request_init::<Flaky>(()).unwrap();
    let (p1, p2) = (p1.pending().unwrap().clone(), p2.pending().unwrap().clone());
    let (a, b) = tokio::join!(p1, p2);
    let (a, b) = (a.unwrap_err(), b.unwrap_err());
    assert_eq!(a.to_string(), b.to_string());
    assert!(a.to_string().contains("transient failure"), "{a}");

    // No instance was memoized, and the next request starts fresh.
    assert!(matches!(
        registry.instance_of::<Flaky>().unwrap_err(),
        InitError::Uninitialized { .. }
    ));
    let instance = registry.init::<Flaky>(()).await.unwrap();
    assert_eq!(instance.attempt, 1);
    assert_eq!(FLAKY_RUNS.load(Ordering::SeqCst), 2);
}

#[derive(Debug, Default)]
struct Hooked {
    saw_args: Option<Option<String>>,
}

#[async_trait]
impl Construct for Hooked {
    type Args = String;

    fn allocate() -> Self {
        Self::default()
    }

    async fn post_allocate(&mut self, args: Option<&Self::Args>) -> Result<()> {
        self.saw_args = Some(args.cloned());
        Ok(())
    }
}

#[tokio::test]
async fn post_allocate_hook_receives_forwarded_args() {
    let registry = registry();
    registry
        .register::<Hooked>(Registration::new().with_post_allocate())
        .unwrap();

    let instance = registry.init::<Hooked>("from-caller".into()).await.unwrap();
    assert_eq!(instance.saw_args, Some(Some("from-caller".to_string())));
}

#[derive(Debug, Default)]
struct HookedWithheld {
    saw_args: Option<Option<String>>,
}

#[async_trait]
impl Construct for HookedWithheld {
    type Args = String;

    fn allocate() -> Self {
        Self::default()
    }

    async fn post_allocate(&mut self, args: Option<&Self::Args>) -> Result<()> {
        self.saw_args = Some(args.cloned());
        Ok(())
    }
}

#[tokio::test]
async fn withheld_args_never_reach_the_hook() {
    let registry = registry();
    registry
        .register::<HookedWithheld>(
            Registration::new()
                .with_post_allocate()
                .forwarding(ArgForwarding::Withhold),
        )
        .unwrap();

    let instance = registry
        .init::<HookedWithheld>("from-caller".into())
        .await
        .unwrap();
    assert_eq!(instance.saw_args, Some(None));
}

use txbench::bench::{bench, init};
use txbench::Status;

const MEMORY: &str = include_str!(concat!(
    env!("CARGO_MANIFEST_DIR"),
    "/presets/stores/memory.toml"
));

const MEMORY_ABORTS: &str = include_str!(concat!(
    env!("CARGO_MANIFEST_DIR"),
    "/presets/stores/memory_aborts.toml"
));

const INTEGRITY: &str = include_str!(concat!(
    env!("CARGO_MANIFEST_DIR"),
    "/presets/benchmarks/integrity.toml"
));

const TRANSACTIONS: &str = include_str!(concat!(
    env!("CARGO_MANIFEST_DIR"),
    "/presets/benchmarks/transactions.toml"
));

#[test]
fn load_then_verify() {
    let _ = env_logger::try_init();
    let opt = MEMORY.to_string() + "\n" + INTEGRITY;
    let (store, workload, phases) = init(&opt).unwrap();
    let results = bench(&*store, &workload, &phases);
    assert_eq!(results.len(), 2);

    let load = &results[0].measurements;
    assert_eq!(results[0].total, 2000);
    assert_eq!(load.status_count("INSERT", Status::Ok), 2000);

    let run = &results[1].measurements;
    assert_eq!(results[1].total, 20000);
    assert!(run.status_count("VERIFY", Status::Ok) > 0);
    assert_eq!(run.status_count("VERIFY", Status::UnexpectedState), 0);
    assert_eq!(run.status_count("VERIFY", Status::Error), 0);
    assert_eq!(run.status_count("READ", Status::NotFound), 0);
    // every insert of the run phase moved the watermark
    let inserted = run.count("INSERT");
    assert_eq!(workload.inserts().limit(), 2000 + inserted);
}

#[test]
fn failed_commits_are_counted() {
    let _ = env_logger::try_init();
    let bench_opt = TRANSACTIONS
        .replace("operationcount = 100000", "operationcount = 5000")
        .replace("repeat = 5\ntimeout = 1.0\n", "");
    let opt = MEMORY_ABORTS.to_string() + "\n" + &bench_opt;
    let (store, workload, phases) = init(&opt).unwrap();
    let results = bench(&*store, &workload, &phases);

    // the load phase does not retry by default, so some records are missing
    let load = &results[0].measurements;
    assert_eq!(load.count("INSERT"), 10000);
    assert!(load.status_count("INSERT", Status::Error) > 0);

    let run = &results[1].measurements;
    assert_eq!(results[1].total, 5000);
    let errors: u64 = run
        .operations()
        .map(|op| run.status_count(op, Status::Error))
        .sum();
    assert!(errors > 0);
    assert_eq!(run.count("VERIFY"), 0);
}

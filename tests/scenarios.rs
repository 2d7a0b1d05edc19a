use pretty_assertions::assert_eq;
use queue_tb::prelude::*;
use rstest::rstest;

const WRITE: u32 = 4;
const READ: u32 = 3;
const NOT_EMPTY: u32 = 2;
const NOT_FULL: u32 = 0;

fn session(config: HarnessConfig, scenarios: &[&str]) -> TestSession {
    init_logging();
    let dut = dut_handle(RegisterFifo::new(&config));
    TestSession::new("queue", config, dut, scenarios).unwrap()
}

fn observed_reads(env: &Environment) -> Vec<u32> {
    env.scoreboard()
        .history()
        .iter()
        .filter(|t| t.is_read())
        .map(|t| t.data)
        .collect()
}

#[test]
fn writes_come_back_in_order() {
    let mut session = session(HarnessConfig::default(), &[]);
    let seen = Shared::new(Vec::new());
    let s = seen.clone();
    let outcome = session
        .run_scenario("fifo_order", move |env| async move {
            for v in [0x12, 0x34, 0x56] {
                env.write(WRITE, v).await?;
            }
            for _ in 0..3 {
                env.read(READ).await?;
            }
            *s.get_mut() = observed_reads(&env);
            Ok(())
        })
        .clone();

    assert_eq!(outcome.result, Ok(()));
    assert_eq!(*seen.get(), vec![0x12, 0x34, 0x56]);
    assert_eq!(outcome.stats.writes, 3);
    assert_eq!(outcome.stats.matched, 3);
    assert_eq!(outcome.skipped_samples, 0);
}

#[test]
fn read_right_after_reset_returns_sentinel() {
    let mut session = session(HarnessConfig::default(), &[]);
    let seen = Shared::new((Vec::new(), usize::MAX));
    let s = seen.clone();
    let outcome = session
        .run_scenario("read_after_reset", move |env| async move {
            env.reset().await?;
            env.read(READ).await?;
            *s.get_mut() = (observed_reads(&env), env.model().get().total_len());
            Ok(())
        })
        .clone();

    assert_eq!(outcome.result, Ok(()));
    assert_eq!(*seen.get(), (vec![0], 0));
    assert_eq!(outcome.stats.empty_reads, 1);
    assert_eq!(outcome.stats.matched, 0);
}

#[test]
fn write_beyond_capacity_is_not_mirrored() {
    let config = HarnessConfig::default();
    let capacity = config.queues[0].capacity;
    let mut session = session(config, &[]);
    let lens = Shared::new(Vec::new());
    let l = lens.clone();
    let outcome = session
        .run_scenario("overfill", move |env| async move {
            for v in 0..capacity as u32 {
                env.write(WRITE, v + 1).await?;
            }
            l.get_mut().push(env.model().get().len(0));
            env.write(WRITE, 0xff).await?;
            l.get_mut().push(env.model().get().len(0));
            Ok(())
        })
        .clone();

    assert_eq!(outcome.result, Ok(()));
    assert_eq!(*lens.get(), vec![capacity, capacity]);
    assert_eq!(session.coverage().get().hits(WRITE_WHEN_FULL), Some(1));
}

#[test]
fn reset_discards_pending_writes() {
    let mut session = session(HarnessConfig::default(), &[]);
    let seen = Shared::new(Vec::new());
    let s = seen.clone();
    let outcome = session
        .run_scenario("reset_discards", move |env| async move {
            env.write(WRITE, 0xaa).await?;
            env.reset().await?;
            s.get_mut().push(env.model().get().total_len() as u32);
            env.read(READ).await?;
            s.get_mut().extend(observed_reads(&env));
            Ok(())
        })
        .clone();

    assert_eq!(outcome.result, Ok(()));
    assert_eq!(*seen.get(), vec![0, 0]);
    assert_eq!(outcome.stats.empty_reads, 1);
}

#[test]
fn over_read_yields_sentinel_after_data() {
    let mut session = session(HarnessConfig::default(), &[]);
    let seen = Shared::new(Vec::new());
    let s = seen.clone();
    let outcome = session
        .run_scenario("over_read", move |env| async move {
            env.write(WRITE, 0x21).await?;
            for _ in 0..3 {
                env.read(READ).await?;
            }
            *s.get_mut() = observed_reads(&env);
            Ok(())
        })
        .clone();

    assert_eq!(outcome.result, Ok(()));
    assert_eq!(*seen.get(), vec![0x21, 0, 0]);
    assert_eq!(outcome.stats.matched, 1);
    assert_eq!(outcome.stats.empty_reads, 2);
}

#[rstest]
#[case::read_first(SameTickPolicy::ReadFirst, vec![0, 0x5a])]
#[case::write_first(SameTickPolicy::WriteFirst, vec![0x5a, 0])]
fn same_tick_write_and_read(#[case] policy: SameTickPolicy, #[case] expected: Vec<u32>) {
    let config = HarnessConfig {
        same_tick_policy: policy,
        ..HarnessConfig::default()
    };
    let mut session = session(config, &[]);
    let seen = Shared::new(Vec::new());
    let s = seen.clone();
    let outcome = session
        .run_scenario("same_tick", move |env| async move {
            env.write_and_read(WRITE, 0x5a, READ).await?;
            env.read(READ).await?;
            *s.get_mut() = observed_reads(&env);
            Ok(())
        })
        .clone();

    assert_eq!(outcome.result, Ok(()));
    assert_eq!(*seen.get(), expected);
    assert_eq!(session.coverage().get().hits(SIMULTANEOUS_READ_WRITE), Some(1));
}

#[test]
fn held_write_enqueues_every_tick() {
    let mut session = session(HarnessConfig::default(), &[]);
    let seen = Shared::new(Vec::new());
    let s = seen.clone();
    let outcome = session
        .run_scenario("held_write", move |env| async move {
            env.write_held(WRITE, &[7, 8, 9]).await?;
            for _ in 0..3 {
                env.read(READ).await?;
            }
            *s.get_mut() = observed_reads(&env);
            Ok(())
        })
        .clone();

    assert_eq!(outcome.result, Ok(()));
    assert_eq!(*seen.get(), vec![7, 8, 9]);
}

#[test]
fn status_registers_and_readiness_waits() {
    let mut session = session(HarnessConfig::default(), &[]);
    let seen = Shared::new(Vec::new());
    let s = seen.clone();
    let outcome = session
        .run_scenario("status", move |env| async move {
            let mut values = vec![env.read_status(NOT_EMPTY).await?, env.read_status(NOT_FULL).await?];
            env.write(WRITE, 1).await?;
            env.wait_until_not_empty("fifo", 4).await?;
            values.push(env.read_status(NOT_EMPTY).await?);
            env.wait_until_not_full("fifo", 4).await?;
            *s.get_mut() = values;
            Ok(())
        })
        .clone();

    assert_eq!(outcome.result, Ok(()));
    assert_eq!(*seen.get(), vec![Some(0), Some(1), Some(1)]);
    assert_eq!(outcome.stats.status_reads, 3);
    // Status reads never touch the expected queue.
    assert_eq!(outcome.stats.matched, 0);
}

#[test]
fn status_read_under_reset_has_no_value() {
    let mut session = session(HarnessConfig::default(), &[]);
    let seen = Shared::new(Vec::new());
    let s = seen.clone();
    let outcome = session
        .run_scenario("status_in_reset", move |env| async move {
            let ctx = env.context().clone();
            ctx.next_drive().await;
            ctx.drive(InputPort::ResetN, 0)?;
            let held = env.read_status(NOT_FULL).await?;
            ctx.drive(InputPort::ResetN, 1)?;
            let released = env.read_status(NOT_FULL).await?;
            *s.get_mut() = vec![held, released];
            Ok(())
        })
        .clone();

    assert_eq!(outcome.result, Ok(()));
    assert_eq!(*seen.get(), vec![None, Some(1)]);
}

#[test]
fn flagless_core_covers_full_and_empty_conditions() {
    let mut config = HarnessConfig::default();
    config.capabilities.has_full_flag = false;
    config.capabilities.has_empty_flag = false;
    let mut session = session(config, &["flagless"]);
    let outcome = session
        .run_scenario("flagless", |env| async move {
            env.read(READ).await?;
            let capacity = env.config().queues[0].capacity as u32;
            for i in 0..=capacity {
                env.write(WRITE, i + 1).await?;
            }
            env.read(READ).await?;
            env.write_and_read(WRITE, 9, READ).await?;
            env.read_status(NOT_EMPTY).await?;
            env.read_status(NOT_FULL).await?;
            Ok(())
        })
        .clone();

    assert_eq!(outcome.result, Ok(()));
    let report = session.finish();
    assert_eq!(report.coverage.uncovered(), Vec::<&str>::new());
    assert_eq!(report.coverage.hits(WRITE_WHEN_FULL), Some(1));
    assert!(report.meets_goal());
}

#[test]
fn readiness_polls_status_register_without_flags() {
    let mut config = HarnessConfig::default();
    config.capabilities.has_empty_flag = false;
    config.capabilities.has_full_flag = false;
    let mut session = session(config, &[]);
    let outcome = session
        .run_scenario("poll_status", |env| async move {
            env.write(WRITE, 3).await?;
            env.wait_until_not_empty("fifo", 4).await?;
            env.read(READ).await?;
            Ok(())
        })
        .clone();

    assert_eq!(outcome.result, Ok(()));
    assert_eq!(outcome.stats.matched, 1);
    assert_eq!(session.coverage().get().hits(EMPTY_FLAG_ASSERTED), Some(0));
}

#[test]
fn read_valid_qualifies_empty_reads() {
    let mut config = HarnessConfig::default();
    config.capabilities.has_read_valid = true;
    let mut session = session(config, &[]);
    let outcome = session
        .run_scenario("read_valid", |env| async move {
            env.write(WRITE, 0).await?;
            env.read(READ).await?;
            env.read(READ).await?;
            Ok(())
        })
        .clone();

    assert_eq!(outcome.result, Ok(()));
    // A written zero is data; the second zero is flagged invalid.
    assert_eq!(outcome.stats.matched, 1);
    assert_eq!(outcome.stats.empty_reads, 1);
}

#[test]
fn queues_are_checked_independently() {
    let config = HarnessConfig::from_json_str(
        r#"{
            "queues": [
                { "name": "a_ff", "capacity": 2, "write_addresses": [4], "read_addresses": [1] },
                { "name": "b_ff", "capacity": 2, "write_addresses": [5], "read_addresses": [6] }
            ]
        }"#,
    )
    .unwrap();
    let mut session = session(config, &[]);
    let seen = Shared::new(Vec::new());
    let s = seen.clone();
    let outcome = session
        .run_scenario("two_queues", move |env| async move {
            env.write(4, 0xa1).await?;
            env.write(5, 0xb1).await?;
            env.write(4, 0xa2).await?;
            env.read(6).await?;
            env.read(1).await?;
            env.read(1).await?;
            *s.get_mut() = observed_reads(&env);
            Ok(())
        })
        .clone();

    assert_eq!(outcome.result, Ok(()));
    assert_eq!(*seen.get(), vec![0xb1, 0xa1, 0xa2]);
}

#[rstest]
#[case(0x5eed)]
#[case(1)]
#[case(0xdead_beef)]
fn random_traffic_keeps_scoreboard_in_sync(#[case] seed: u64) {
    let mut session = session(HarnessConfig::default(), &[]);
    let outcome = session
        .run_scenario("random", move |env| async move { env.random_traffic(300, seed).await })
        .clone();

    assert_eq!(outcome.result, Ok(()));
    assert!(outcome.stats.writes > 0);
    assert!(outcome.stats.matched > 0);
}

#[test]
fn report_is_stable_between_samples() {
    let mut session = session(HarnessConfig::default(), &[]);
    session.run_scenario("traffic", |env| async move { env.random_traffic(50, 3).await });
    let coverage = session.coverage();
    let first = coverage.get().report();
    let second = coverage.get().report();
    assert_eq!(first, second);
    assert!(first.total > 0);
}

//! Integration tests for the process supervisor: relay completeness, line
//! prefixes, interrupt forwarding, and spawn-failure teardown.

use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use proxy_harness::farm::{LaunchSpec, Supervisor};
use proxy_harness::HarnessError;
use serial_test::serial;

fn sh(name: &str, script: &str) -> LaunchSpec {
    LaunchSpec {
        name: name.to_owned(),
        program: "sh".to_owned(),
        args: vec!["-c".to_owned(), script.to_owned()],
        cwd: None,
    }
}

#[tokio::test]
#[serial]
async fn relays_every_line_with_name_prefix() {
    let specs = vec![sh("alpha", "printf 'one\\ntwo\\n'")];
    let supervisor = Supervisor::spawn(&specs).expect("spawn");
    assert_eq!(supervisor.active_count(), 1);

    let mut lines = Vec::new();
    supervisor
        .run_with(|line| lines.push(line.to_owned()))
        .await
        .expect("clean supervision");

    assert_eq!(lines, ["alpha: one", "alpha: two"]);
}

#[tokio::test]
#[serial]
async fn blank_lines_are_dropped() {
    let specs = vec![sh("quiet", "printf 'a\\n\\n   \\nb\\n'")];
    let supervisor = Supervisor::spawn(&specs).expect("spawn");

    let mut lines = Vec::new();
    supervisor
        .run_with(|line| lines.push(line.to_owned()))
        .await
        .expect("clean supervision");

    assert_eq!(lines, ["quiet: a", "quiet: b"]);
}

#[tokio::test]
#[serial]
async fn per_child_order_survives_interleaving() {
    let specs = vec![
        sh("first", "printf 'f1\\nf2\\nf3\\n'"),
        sh("second", "printf 's1\\ns2\\ns3\\n'"),
    ];
    let supervisor = Supervisor::spawn(&specs).expect("spawn");

    let mut lines = Vec::new();
    supervisor
        .run_with(|line| lines.push(line.to_owned()))
        .await
        .expect("clean supervision");

    // Exactly one relayed line per written line, no duplicates.
    assert_eq!(lines.len(), 6);

    // Within one child's stream, order is preserved; the cross-child
    // interleaving is whatever the multiplex observed.
    let firsts: Vec<&String> = lines.iter().filter(|l| l.starts_with("first: ")).collect();
    let seconds: Vec<&String> = lines.iter().filter(|l| l.starts_with("second: ")).collect();
    assert_eq!(firsts, ["first: f1", "first: f2", "first: f3"]);
    assert_eq!(seconds, ["second: s1", "second: s2", "second: s3"]);
}

#[tokio::test(flavor = "multi_thread")]
#[serial]
async fn lingering_child_does_not_stall_other_children() {
    // One child closes its stdout immediately but keeps running; another
    // speaks shortly after. The talker's line must be relayed while the
    // lingerer is still alive, and the loop must not wait out its sleep.
    let specs = vec![
        sh("lingerer", "exec 1>&-; sleep 3"),
        sh("talker", "sleep 0.3; echo hello"),
    ];
    let supervisor = Supervisor::spawn(&specs).expect("spawn");

    let started = Instant::now();
    let mut lines = Vec::new();
    supervisor
        .run_with(|line| lines.push((line.to_owned(), started.elapsed())))
        .await
        .expect("clean supervision");

    let (line, at) = lines.first().expect("talker line relayed");
    assert_eq!(line, "talker: hello");
    assert!(
        *at < Duration::from_secs(2),
        "line relayed only after {at:?}; multiplex stalled behind the lingerer"
    );
}

#[tokio::test]
#[serial]
async fn stderr_written_at_exit_is_still_relayed() {
    // The stderr line can arrive after the stdout EOF that empties the
    // active set; the post-loop drain must still pick it up.
    let specs = vec![sh("noisy", "echo out; echo err >&2")];
    let supervisor = Supervisor::spawn(&specs).expect("spawn");

    let mut lines = Vec::new();
    supervisor
        .run_with(|line| lines.push(line.to_owned()))
        .await
        .expect("clean supervision");

    assert!(lines.contains(&"noisy: out".to_owned()), "got: {lines:?}");
    assert!(lines.contains(&"noisy: err".to_owned()), "got: {lines:?}");
}

#[tokio::test(flavor = "multi_thread")]
#[serial]
async fn interrupt_byte_reaches_child_stdin() {
    // The child blocks until a single byte arrives on stdin, then prints its
    // shutdown diagnostic; the forwarded ETX byte is that byte.
    let specs = vec![sh("etx", "head -c1 >/dev/null; echo interrupted")];
    let supervisor = Supervisor::spawn(&specs).expect("spawn");
    let handle = supervisor.handle();

    let lines = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&lines);
    let task = tokio::spawn(async move {
        supervisor
            .run_with(move |line| sink.lock().expect("sink lock").push(line.to_owned()))
            .await
    });

    tokio::time::sleep(Duration::from_millis(300)).await;
    // Twice on purpose: forwarding must be idempotent.
    handle.interrupt().await;
    handle.interrupt().await;

    task.await.expect("join").expect("clean supervision");
    let lines = lines.lock().expect("lines lock");
    assert_eq!(lines.as_slice(), ["etx: interrupted"]);
}

#[tokio::test(flavor = "multi_thread")]
#[serial]
async fn interrupt_after_exit_is_harmless() {
    let specs = vec![sh("gone", "echo done")];
    let supervisor = Supervisor::spawn(&specs).expect("spawn");
    let handle = supervisor.handle();

    let result = supervisor.run_with(|_| {}).await;
    assert!(result.is_ok());

    // The loop is finished and the child reaped; the request is dropped.
    handle.interrupt().await;
    handle.interrupt().await;
}

#[tokio::test]
#[serial]
async fn spawn_failure_aborts_the_whole_launch() {
    let specs = vec![
        sh("survivor", "sleep 30"),
        LaunchSpec {
            name: "broken".to_owned(),
            program: "/nonexistent/proxy-binary".to_owned(),
            args: Vec::new(),
            cwd: None,
        },
    ];
    let err = Supervisor::spawn(&specs).expect_err("second spawn must fail the call");
    assert!(matches!(err, HarnessError::Spawn(_)), "got: {err}");
}

#[tokio::test]
#[serial]
async fn duplicate_child_names_are_rejected() {
    let specs = vec![sh("twin", "sleep 30"), sh("twin", "sleep 30")];
    let err = Supervisor::spawn(&specs).expect_err("duplicate names must fail");
    assert!(matches!(err, HarnessError::Spawn(_)), "got: {err}");
}

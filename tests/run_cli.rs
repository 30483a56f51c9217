#![cfg(unix)]

mod support;

use predicates::str::contains;

use support::TestProject;

fn project_with_executor(program: &str, args: &[&str]) -> TestProject {
    let project = TestProject::init();
    let args: Vec<String> = args.iter().map(|arg| format!("{arg:?}")).collect();
    project
        .write_config(&format!(
            r#"
[scheduler]
stall_interval = "0s"
max_stalled_checks = 1

[executor]
program = "{program}"
args = [{}]
"#,
            args.join(", ")
        ))
        .expect("write config");
    project
}

#[test]
fn run_completes_chain_when_deliverables_appear() {
    let project = project_with_executor("sh", &["-c", "mkdir -p api && touch api/server.js"]);
    project.add_task("DB001", "Quotes schema", &["--deliverable", "api/server.js"]);
    project.add_task(
        "BE001",
        "Quote API",
        &["--depends", "DB001", "--deliverable", "api/server.js"],
    );

    let value = project.json(&["run"]);
    assert_eq!(value["data"]["outcome"], "complete");
    assert_eq!(value["data"]["dispatched"].as_array().expect("dispatched").len(), 2);
    assert_eq!(value["data"]["progress"]["percent_complete"], 100.0);

    let show = project.json(&["task", "show", "BE001"]);
    assert_eq!(show["data"]["status"], "complete");
    assert_eq!(show["data"]["attempts"], 1);
}

#[test]
fn missing_deliverable_blocks_and_stalls() {
    let project = project_with_executor("sh", &["-c", "echo done"]);
    project.add_task("A", "Write the guide", &["--deliverable", "docs/guide.md"]);

    let value = project.json(&["run"]);
    assert_eq!(value["data"]["outcome"], "stalled");
    assert_eq!(value["data"]["dispatched"][0]["status"], "blocked");
    assert_eq!(
        value["data"]["dispatched"][0]["missing_deliverables"][0],
        "docs/guide.md"
    );

    project
        .cmd()
        .arg("status")
        .assert()
        .success()
        .stdout(contains("blocked A: missing deliverables: docs/guide.md"));

    // the executor never writes the file, so only a manual fix unblocks it
    project
        .write_file("docs/guide.md", "# Guide\n")
        .expect("write deliverable");
    let retry = project.json(&["retry", "A"]);
    assert_eq!(retry["data"]["status"], "complete");
}

#[test]
fn failing_executor_blocks_task() {
    let project = project_with_executor("sh", &["-c", "echo boom >&2; exit 1"]);
    project.add_task("A", "Anything", &[]);

    let value = project.json(&["run", "--once"]);
    assert_eq!(value["data"]["dispatched"][0]["status"], "blocked");
    assert_eq!(value["data"]["dispatched"][0]["executor_success"], false);

    let show = project.json(&["task", "show", "A"]);
    assert_eq!(show["data"]["last_attempt"]["success"], false);
    assert!(show["data"]["last_attempt"]["output"]
        .as_str()
        .is_some_and(|output| output.contains("boom")));
}

#[test]
fn missing_executor_program_blocks_instead_of_crashing() {
    let project = project_with_executor("tasksmith-no-such-program", &[]);
    project.add_task("A", "Anything", &[]);

    let value = project.json(&["run", "--once"]);
    let result = &value["data"]["dispatched"][0];
    assert_eq!(result["status"], "blocked");
    assert!(result["error"]
        .as_str()
        .is_some_and(|error| error.contains("tasksmith-no-such-program")));
}

#[test]
fn once_runs_a_single_cycle() {
    let project = project_with_executor("sh", &["-c", "true"]);
    project.add_task("A", "First", &[]);
    project.add_task("B", "Second", &["--depends", "A"]);

    let value = project.json(&["run", "--once"]);
    assert_eq!(value["data"]["outcome"], "paused");
    assert_eq!(value["data"]["cycles"], 1);

    let list = project.json(&["task", "list", "--status", "pending"]);
    assert_eq!(list["data"][0]["id"], "B");
}

#[test]
fn blocked_task_can_go_through_review() {
    let project = project_with_executor("sh", &["-c", "exit 1"]);
    project.add_task("A", "Anything", &[]);
    project.cmd().args(["run", "--once"]).assert().success();

    project
        .cmd()
        .args(["task", "review", "A", "--reason", "needs a human"])
        .assert()
        .success();
    let approved = project.json(&["task", "approve", "A"]);
    assert_eq!(approved["data"]["status"], "complete");

    let status = project.json(&["status"]);
    assert_eq!(status["data"]["state"], "complete");
}

#[test]
fn retry_rejects_tasks_that_are_not_blocked() {
    let project = project_with_executor("sh", &["-c", "true"]);
    project.add_task("A", "Anything", &[]);
    project
        .cmd()
        .args(["retry", "A"])
        .assert()
        .code(3)
        .stderr(contains("pending -> in_progress"));
}

#[test]
fn second_dispatcher_is_refused_while_lock_is_held() {
    let project = project_with_executor("sh", &["-c", "true"]);
    project.add_task("A", "Anything", &[]);

    let lock_path = project.path().join(".tasksmith").join("run.lock");
    let _held = tasksmith::lock::FileLock::acquire(&lock_path, 1000).expect("lock");

    project
        .cmd()
        .arg("run")
        .assert()
        .code(4)
        .stderr(contains("another tasksmith process is dispatching tasks"));

    let show = project.json(&["task", "show", "A"]);
    assert_eq!(show["data"]["status"], "pending");
}

#[test]
fn executor_runs_inside_a_fresh_output_dir() {
    let project = TestProject::init();
    project
        .write_config(
            r#"
[scheduler]
stall_interval = "0s"
max_stalled_checks = 1

[executor]
program = "sh"
args = ["-c", "touch api.js"]
output_dir = "generated"
"#,
        )
        .expect("write config");
    project.add_task("A", "Quote API", &["--deliverable", "generated/api.js"]);

    let value = project.json(&["run"]);
    assert_eq!(value["data"]["outcome"], "complete");
    assert!(project.path().join("generated").join("api.js").is_file());
}

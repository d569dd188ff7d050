//! Heap faults abort the process, so each scenario runs in a child process:
//! the test binary re-executes itself with only `fault_scenario` selected and
//! the scenario named in the environment.

use std::{
  env,
  os::unix::process::ExitStatusExt,
  process::{Command, Output},
};

use nfalloc::{Allocator, FixedArena, HEADER_SIZE};

const SCENARIO: &str = "NFALLOC_FAULT_SCENARIO";

#[test]
fn fault_scenario() {
  let Ok(scenario) = env::var(SCENARIO) else {
    return;
  };

  let mut buffer = vec![0u8; 4096];
  let mut allocator = Allocator::with_grower(FixedArena::new(&mut buffer));

  let ptr = allocator.allocate(64).unwrap();
  let other = allocator.allocate(64).unwrap();
  let _guard = allocator.allocate(64).unwrap();

  unsafe {
    match scenario.as_str() {
      "clean" => {
        allocator.deallocate(ptr.as_ptr());
      }
      "double_free" => {
        allocator.deallocate(ptr.as_ptr());
        allocator.deallocate(ptr.as_ptr());
      }
      "double_free_after_merge" => {
        allocator.deallocate(ptr.as_ptr());
        allocator.deallocate(other.as_ptr());
        allocator.deallocate(other.as_ptr());
      }
      "corrupt_deallocate" => {
        ptr.as_ptr().sub(HEADER_SIZE).write_bytes(0xAB, HEADER_SIZE);
        allocator.deallocate(ptr.as_ptr());
      }
      "corrupt_reallocate" => {
        ptr.as_ptr().sub(HEADER_SIZE).write_bytes(0xAB, HEADER_SIZE);
        let _ = allocator.reallocate(ptr.as_ptr(), 1024);
      }
      unknown => panic!("unknown scenario {unknown}"),
    }
  }

  println!("scenario {scenario} completed");
}

fn run(scenario: &str) -> Output {
  Command::new(env::current_exe().unwrap())
    .args(["--exact", "fault_scenario", "--nocapture", "--test-threads=1"])
    .env(SCENARIO, scenario)
    .output()
    .unwrap()
}

fn assert_aborted(
  scenario: &str,
  message: &str,
) {
  let output = run(scenario);
  let stdout = String::from_utf8_lossy(&output.stdout);
  let stderr = String::from_utf8_lossy(&output.stderr);

  assert_eq!(output.status.signal(), Some(libc::SIGABRT), "{scenario}: {stderr}");
  assert!(stderr.contains(message), "{scenario}: {stderr}");
  assert!(!stdout.contains("completed"), "{scenario}: {stdout}");
}

#[test]
fn test_clean_run_exits_normally() {
  let output = run("clean");
  assert!(output.status.success());
  assert!(String::from_utf8_lossy(&output.stdout).contains("scenario clean completed"));
}

#[test]
fn test_double_free_aborts() {
  assert_aborted("double_free", "double free detected");
}

#[test]
fn test_double_free_after_merge_aborts() {
  assert_aborted("double_free_after_merge", "double free detected");
}

#[test]
fn test_corrupt_header_aborts_deallocate() {
  assert_aborted("corrupt_deallocate", "memory corruption detected");
}

#[test]
fn test_corrupt_header_aborts_reallocate() {
  assert_aborted("corrupt_reallocate", "memory corruption detected");
}

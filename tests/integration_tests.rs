//! Integration tests for codefort
//!
//! Most tests drive the coordinator through an unconfined backend so they
//! run anywhere. Tests against the real isolation backends skip when the
//! host cannot provide one.

mod common;

use std::io::Read;
use std::net::TcpListener;
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};

use codefort::api::ExecutionResponse;
use codefort::{
    BackendKind, CodefortError, CompileFailurePolicy, ExecutionCoordinator, SystemCapabilities,
    select_backend,
};
use common::{Fixture, Unconfined, request};

static TIMING_LOCK: Mutex<()> = Mutex::new(());

#[test]
fn test_bash_program_runs() {
    let fixture = Fixture::new();
    let result = fixture
        .unconfined()
        .execute(&request("bash", "echo out; echo err >&2; exit 4"))
        .unwrap();

    assert_eq!(result.exit_code, 4);
    assert_eq!(result.stdout, "out\n");
    assert_eq!(result.stderr, "err\n");
    assert!(result.compile.is_none());
    assert!(fixture.leftover_workspaces().is_empty());
}

#[test]
fn test_language_lookup_is_case_insensitive() {
    let fixture = Fixture::new();
    let result = fixture
        .unconfined()
        .execute(&request("BaSh", "echo hi"))
        .unwrap();
    assert_eq!(result.stdout, "hi\n");
}

#[test]
fn test_passthrough_round_trips_stdin() {
    let fixture = Fixture::new();
    let mut req = request("passthrough", "");
    req.stdin = "line one\nline two\n".to_string();

    let result = fixture.unconfined().execute(&req).unwrap();
    assert_eq!(result.exit_code, 0);
    assert_eq!(result.stdout, req.stdin);
    assert!(result.stderr.is_empty());
}

#[test]
fn test_source_is_written_before_run() {
    let fixture = Fixture::new();
    let result = fixture
        .unconfined()
        .execute(&request("bash", "cat main.sh"))
        .unwrap();
    assert_eq!(result.stdout, "cat main.sh");
}

#[test]
fn test_compile_step_output_is_reported() {
    let fixture = Fixture::new();
    let result = fixture
        .unconfined()
        .execute(&request("copied", "echo from program"))
        .unwrap();

    let compile = result.compile.as_ref().unwrap();
    assert_eq!(compile.exit_code, 0);
    assert_eq!(compile.stdout, "compiled\n");
    assert_eq!(result.stdout, "from program\n");

    let response = serde_json::to_value(ExecutionResponse::from(&result)).unwrap();
    assert_eq!(response["stats"]["compile"]["stdout"], "compiled\n");
    assert!(response["stats"]["run"]["realTime"].is_u64());
}

#[test]
fn test_interpreted_language_has_null_compile_stats() {
    let fixture = Fixture::new();
    let result = fixture
        .unconfined()
        .execute(&request("bash", "true"))
        .unwrap();
    let response = serde_json::to_value(ExecutionResponse::from(&result)).unwrap();
    assert!(response["stats"]["compile"].is_null());
}

#[test]
fn test_failed_compile_still_runs_by_default() {
    let fixture = Fixture::new();
    let result = fixture
        .unconfined()
        .execute(&request("broken", ""))
        .unwrap();

    let compile = result.compile.as_ref().unwrap();
    assert_eq!(compile.exit_code, 3);
    assert_eq!(compile.stderr, "syntax error\n");
    assert_eq!(result.exit_code, 0);
    assert_eq!(result.stdout, "ran anyway\n");
    assert!(fixture.leftover_workspaces().is_empty());
}

#[test]
fn test_failed_compile_can_skip_run() {
    let fixture = Fixture::new();
    let coordinator = ExecutionCoordinator::builder(fixture.catalog.clone(), Arc::new(Unconfined))
        .workspace_root(fixture.workspace_root.path())
        .compile_failure(CompileFailurePolicy::SkipRun)
        .build()
        .unwrap();

    let result = coordinator.execute(&request("broken", "")).unwrap();
    assert_eq!(result.exit_code, 3);
    assert!(result.run.is_none());
    assert!(result.stdout.is_empty());

    let response = serde_json::to_value(ExecutionResponse::from(&result)).unwrap();
    assert_eq!(response["stats"]["run"]["realTime"], 0);
    assert!(fixture.leftover_workspaces().is_empty());
}

#[test]
fn test_unknown_language_allocates_nothing() {
    let fixture = Fixture::new();
    let err = fixture
        .unconfined()
        .execute(&request("cobol", "DISPLAY 'HI'."))
        .unwrap_err();

    assert!(matches!(err, CodefortError::LanguageNotFound(_)));
    assert!(err.is_request_error());
    assert!(fixture.leftover_workspaces().is_empty());
}

#[test]
fn test_zero_timeout_is_rejected() {
    let fixture = Fixture::new();
    let mut req = request("bash", "echo never");
    req.run_timeout = 0;

    let err = fixture.unconfined().execute(&req).unwrap_err();
    assert!(matches!(err, CodefortError::InvalidRequest(_)));
    assert!(fixture.leftover_workspaces().is_empty());
}

#[test]
fn test_timeout_kills_program_and_keeps_partial_output() {
    let _lock = TIMING_LOCK.lock();
    let fixture = Fixture::new();
    let mut req = request("bash", "echo started; sleep 30; echo finished");
    req.run_timeout = 500;

    let start = Instant::now();
    let result = fixture.unconfined().execute(&req).unwrap();
    let elapsed = start.elapsed();

    assert_eq!(result.exit_code, 137);
    assert!(result.timed_out());
    assert_eq!(result.stdout, "started\n");
    assert!(elapsed < Duration::from_secs(5), "took {:?}", elapsed);
    assert!(fixture.leftover_workspaces().is_empty());
}

#[test]
fn test_timeout_reaches_background_children() {
    let _lock = TIMING_LOCK.lock();
    let fixture = Fixture::new();
    let mut req = request("bash", "sleep 30 & sleep 30 & wait");
    req.run_timeout = 300;

    let start = Instant::now();
    let result = fixture.unconfined().execute(&req).unwrap();
    assert!(result.timed_out());
    assert!(start.elapsed() < Duration::from_secs(5));
}

#[test]
fn test_workspace_is_removed_after_program_deletes_its_files() {
    let fixture = Fixture::new();
    let result = fixture
        .unconfined()
        .execute(&request("bash", "mkdir -p a/b && touch a/b/c && rm main.sh"))
        .unwrap();
    assert_eq!(result.exit_code, 0);
    assert!(fixture.leftover_workspaces().is_empty());
}

#[test]
fn test_concurrent_executions_are_isolated() {
    let fixture = Arc::new(Fixture::new());
    let coordinator = Arc::new(fixture.unconfined());

    let handles: Vec<_> = (0..8)
        .map(|i| {
            let coordinator = coordinator.clone();
            thread::spawn(move || {
                let code = format!("echo {i} > mine.txt; sleep 0.2; ls -A | wc -l; cat mine.txt");
                coordinator.execute(&request("bash", &code)).unwrap()
            })
        })
        .collect();

    for (i, handle) in handles.into_iter().enumerate() {
        let result = handle.join().unwrap();
        let lines: Vec<&str> = result.stdout.lines().map(str::trim).collect();
        assert_eq!(lines, vec!["2", i.to_string().as_str()]);
    }
    assert!(fixture.leftover_workspaces().is_empty());
}

#[test]
fn test_environment_is_scrubbed() {
    let fixture = Fixture::new();
    let result = fixture
        .unconfined()
        .execute(&request("bash", "env | cut -d= -f1 | sort | tr '\\n' ' '"))
        .unwrap();
    for name in result.stdout.split_whitespace() {
        assert!(
            ["PATH", "HOME", "TMPDIR", "LANG", "PWD", "SHLVL", "_", "OLDPWD"].contains(&name),
            "unexpected variable {}",
            name
        );
    }
}

#[test]
fn test_oversized_output_is_truncated() {
    let fixture = Fixture::new();
    let coordinator = ExecutionCoordinator::builder(fixture.catalog.clone(), Arc::new(Unconfined))
        .workspace_root(fixture.workspace_root.path())
        .output_limit(1024)
        .build()
        .unwrap();

    let result = coordinator
        .execute(&request("bash", "head -c 100000 /dev/zero | tr '\\0' x"))
        .unwrap();
    let run = result.run.unwrap();
    assert_eq!(run.stdout.len(), 1024);
    assert!(run.stdout_truncated);
    assert_eq!(run.exit_code, 0);
}

fn real_coordinator(fixture: &Fixture) -> Option<ExecutionCoordinator> {
    let caps = SystemCapabilities::detect();
    match select_backend(BackendKind::Auto) {
        Ok(backend) => {
            eprintln!("using {} backend ({})", backend.name(), caps.summary());
            Some(fixture.coordinator(backend))
        }
        Err(e) => {
            eprintln!("Skipping: no isolation backend available: {}", e);
            None
        }
    }
}

#[test]
fn test_sandboxed_program_has_no_network() {
    let fixture = Fixture::new();
    let Some(coordinator) = real_coordinator(&fixture) else {
        return;
    };

    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let port = listener.local_addr().unwrap().port();
    let code = format!(
        "if (exec 3<>/dev/tcp/127.0.0.1/{port}) 2>/dev/null; then echo connected; else echo blocked; fi"
    );

    match coordinator.execute(&request("bash", &code)) {
        Ok(result) => assert_eq!(result.stdout, "blocked\n", "stderr: {}", result.stderr),
        Err(e) => eprintln!("Skipping: sandbox could not start here: {}", e),
    }
    drop(listener);
}

#[test]
fn test_sandboxed_program_cannot_write_outside_workspace() {
    let fixture = Fixture::new();
    let Some(coordinator) = real_coordinator(&fixture) else {
        return;
    };

    let target = fixture.catalog_dir.path().join("bash").join("escaped");
    let code = format!(
        "echo inside > ok.txt && cat ok.txt; echo x > {} 2>/dev/null && echo escaped",
        target.display()
    );

    match coordinator.execute(&request("bash", &code)) {
        Ok(result) => {
            assert_eq!(result.stdout, "inside\n", "stderr: {}", result.stderr);
            assert!(!target.exists());
        }
        Err(e) => eprintln!("Skipping: sandbox could not start here: {}", e),
    }
    assert!(fixture.leftover_workspaces().is_empty());
}

#[test]
fn test_sandboxed_program_cannot_read_host_home() {
    let fixture = Fixture::new();
    let Some(coordinator) = real_coordinator(&fixture) else {
        return;
    };

    let secret = tempfile::NamedTempFile::new_in(env_home()).ok();
    let Some(mut secret) = secret else {
        eprintln!("Skipping: no writable home directory");
        return;
    };
    std::io::Write::write_all(&mut secret, b"host secret").unwrap();

    let code = format!("cat {} 2>/dev/null || echo denied", secret.path().display());
    match coordinator.execute(&request("bash", &code)) {
        Ok(result) => assert_eq!(result.stdout, "denied\n"),
        Err(e) => eprintln!("Skipping: sandbox could not start here: {}", e),
    }

    let mut contents = String::new();
    secret.reopen().unwrap().read_to_string(&mut contents).unwrap();
    assert_eq!(contents, "host secret");
}

fn env_home() -> std::path::PathBuf {
    std::env::var_os("HOME")
        .map(Into::into)
        .unwrap_or_else(|| "/root".into())
}

#[test]
fn test_sandboxed_program_cannot_signal_host_processes() {
    let fixture = Fixture::new();
    let Some(coordinator) = real_coordinator(&fixture) else {
        return;
    };

    let mut victim = std::process::Command::new("sleep").arg("30").spawn().unwrap();
    let code = format!(
        "kill -9 {} 2>/dev/null && echo killed || echo denied",
        victim.id()
    );
    let outcome = coordinator.execute(&request("bash", &code));
    let alive = victim.try_wait().unwrap().is_none();
    let _ = victim.kill();
    let _ = victim.wait();

    match outcome {
        Ok(result) => {
            assert_eq!(result.stdout, "denied\n", "stderr: {}", result.stderr);
            assert!(alive, "host process was killed from inside the sandbox");
        }
        Err(e) => eprintln!("Skipping: sandbox could not start here: {}", e),
    }
}

#[test]
fn test_sandboxed_executions_are_isolated() {
    let fixture = Arc::new(Fixture::new());
    let Some(coordinator) = real_coordinator(&fixture) else {
        return;
    };
    let coordinator = Arc::new(coordinator);

    let handles: Vec<_> = (0..4)
        .map(|i| {
            let coordinator = coordinator.clone();
            thread::spawn(move || {
                let code = format!("echo {i} > mine.txt; sleep 0.2; ls -A | wc -l; cat mine.txt");
                coordinator.execute(&request("bash", &code))
            })
        })
        .collect();

    for (i, handle) in handles.into_iter().enumerate() {
        match handle.join().unwrap() {
            Ok(result) => {
                let lines: Vec<&str> = result.stdout.lines().map(str::trim).collect();
                assert_eq!(lines, vec!["2", i.to_string().as_str()], "stderr: {}", result.stderr);
            }
            Err(e) => eprintln!("Skipping: sandbox could not start here: {}", e),
        }
    }
    assert!(fixture.leftover_workspaces().is_empty());
}

#[test]
fn test_sandboxed_program_cannot_read_sibling_workspace() {
    let fixture = Arc::new(Fixture::new());
    let Some(coordinator) = real_coordinator(&fixture) else {
        return;
    };
    let coordinator = Arc::new(coordinator);

    let holder = {
        let coordinator = coordinator.clone();
        thread::spawn(move || {
            coordinator.execute(&request("bash", "echo sibling secret > s.txt; sleep 2; echo done"))
        })
    };

    let deadline = Instant::now() + Duration::from_secs(2);
    let sibling = loop {
        let found = fixture
            .leftover_workspaces()
            .into_iter()
            .find(|ws| ws.join("s.txt").exists());
        if found.is_some() || Instant::now() > deadline {
            break found;
        }
        thread::sleep(Duration::from_millis(20));
    };

    if let Some(sibling) = sibling {
        let code = format!(
            "cat {}/s.txt ../*/s.txt 2>/dev/null || echo denied",
            sibling.display()
        );
        match coordinator.execute(&request("bash", &code)) {
            Ok(result) => assert_eq!(result.stdout, "denied\n", "stderr: {}", result.stderr),
            Err(e) => eprintln!("Skipping: sandbox could not start here: {}", e),
        }
    } else {
        eprintln!("Skipping: first sandboxed program never started");
    }

    if let Ok(result) = holder.join().unwrap() {
        assert_eq!(result.stdout, "done\n");
    }
    assert!(fixture.leftover_workspaces().is_empty());
}

// ============ Shipped language catalog ============

/// Host tool each shipped language needs before it can be exercised
fn toolchain_present(language: &str) -> bool {
    let tool = match language {
        "c" => "gcc",
        "cpp" => "g++",
        "python" => "python3",
        "javascript" => {
            return codefort::util::find_in_path("node").is_some()
                || std::path::Path::new("/opt/node/bin/node").exists();
        }
        "bash" => "bash",
        _ => "cat",
    };
    codefort::util::find_in_path(tool).is_some()
}

fn shipped_coordinator(workspace_root: &std::path::Path) -> Option<ExecutionCoordinator> {
    let languages = std::path::Path::new(env!("CARGO_MANIFEST_DIR")).join("languages");
    let catalog = Arc::new(codefort::LanguageCatalog::load(&languages).unwrap());
    let backend = match select_backend(BackendKind::Auto) {
        Ok(backend) => backend,
        Err(e) => {
            eprintln!("Skipping: no isolation backend available: {}", e);
            return None;
        }
    };
    Some(
        ExecutionCoordinator::builder(catalog, backend)
            .workspace_root(workspace_root)
            .build()
            .unwrap(),
    )
}

const HELLO_WORLDS: &[(&str, &str)] = &[
    ("bash", "echo hello"),
    (
        "c",
        "#include <stdio.h>\nint main(void) { puts(\"hello\"); return 0; }\n",
    ),
    (
        "cpp",
        "#include <iostream>\nint main() { std::cout << \"hello\" << std::endl; }\n",
    ),
    ("python", "print('hello')\n"),
    ("javascript", "console.log('hello');\n"),
];

#[test]
fn test_shipped_languages_run_hello_world() {
    let workspace_root = tempfile::tempdir().unwrap();
    let Some(coordinator) = shipped_coordinator(workspace_root.path()) else {
        return;
    };

    for (language, code) in HELLO_WORLDS {
        if !toolchain_present(language) {
            eprintln!("Skipping {}: toolchain not installed", language);
            continue;
        }
        let result = match coordinator.execute(&request(language, code)) {
            Ok(result) => result,
            Err(e) => {
                eprintln!("Skipping: sandbox could not start here: {}", e);
                return;
            }
        };
        if let Some(compile) = &result.compile {
            assert_eq!(
                compile.exit_code, 0,
                "{} failed to compile: {}",
                language, compile.stderr
            );
        }
        assert_eq!(
            (result.exit_code, result.stdout.as_str()),
            (0, "hello\n"),
            "{} stderr: {}",
            language,
            result.stderr
        );
    }
}

#[test]
fn test_shipped_languages_have_no_network() {
    let workspace_root = tempfile::tempdir().unwrap();
    let Some(coordinator) = shipped_coordinator(workspace_root.path()) else {
        return;
    };

    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let port = listener.local_addr().unwrap().port();
    let programs = [
        (
            "bash",
            format!(
                "if (exec 3<>/dev/tcp/127.0.0.1/{port}) 2>/dev/null; then echo connected; else echo blocked; fi"
            ),
        ),
        (
            "python",
            format!(
                "import socket\ntry:\n    socket.create_connection(('127.0.0.1', {port}), timeout=2)\n    print('connected')\nexcept OSError:\n    print('blocked')\n"
            ),
        ),
        (
            "javascript",
            format!(
                "const s = require('net').connect({port}, '127.0.0.1');\n\
                 s.on('connect', () => {{ console.log('connected'); s.destroy(); }});\n\
                 s.on('error', () => console.log('blocked'));\n"
            ),
        ),
        (
            "c",
            format!(
                "#include <arpa/inet.h>\n#include <stdio.h>\n#include <sys/socket.h>\n\
                 int main(void) {{\n\
                 struct sockaddr_in a = {{0}};\n\
                 a.sin_family = AF_INET;\n\
                 a.sin_port = htons({port});\n\
                 a.sin_addr.s_addr = htonl(INADDR_LOOPBACK);\n\
                 int fd = socket(AF_INET, SOCK_STREAM, 0);\n\
                 puts(fd >= 0 && connect(fd, (struct sockaddr *)&a, sizeof a) == 0 ? \"connected\" : \"blocked\");\n\
                 return 0;\n}}\n"
            ),
        ),
    ];

    for (language, code) in &programs {
        if !toolchain_present(language) {
            eprintln!("Skipping {}: toolchain not installed", language);
            continue;
        }
        match coordinator.execute(&request(language, code)) {
            Ok(result) => assert_eq!(
                result.stdout, "blocked\n",
                "{} stderr: {}",
                language, result.stderr
            ),
            Err(e) => {
                eprintln!("Skipping: sandbox could not start here: {}", e);
                return;
            }
        }
    }
    drop(listener);
}

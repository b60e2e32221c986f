//! Integration Test: Blocking I/O Prohibition
//!
//! **Policy**: Async code in the router crates MUST NOT use blocking I/O.
//! **Required**: Use `tokio::fs`, `tokio::net`, `reqwest` async clients.
//!
//! Synchronous functions (settings loading before the server starts) and
//! test modules are exempt.

use architectural_enforcement::{code_part, is_in_async_function, production_sources};

const FORBIDDEN: &[(&str, &str)] = &[
    ("std::fs::", "Blocking file I/O"),
    ("std::net::", "Blocking network I/O"),
    ("std::process::Command", "Blocking process I/O"),
    ("reqwest::blocking", "Blocking HTTP client"),
    ("std::thread::sleep", "Blocking sleep"),
];

/// Find all blocking calls inside async production code
fn find_blocking_io_violations() -> Vec<String> {
    let mut violations = Vec::new();

    for file in production_sources() {
        for (idx, line) in file.lines.iter().enumerate() {
            let code = code_part(line);
            for (pattern, label) in FORBIDDEN {
                if code.contains(pattern) && is_in_async_function(&file.lines, idx) {
                    violations.push(format!(
                        "{}:{} - {label}: {}",
                        file.path.display(),
                        idx + 1,
                        line.trim()
                    ));
                }
            }
        }
    }

    violations
}

#[test]
fn test_no_blocking_io_in_async_code() {
    let violations = find_blocking_io_violations();

    if !violations.is_empty() {
        eprintln!("\n❌ Blocking I/O calls found in async production code!\n");
        for violation in &violations {
            eprintln!("  ❌ {violation}");
        }
        eprintln!("\n✅ REQUIRED async I/O:");
        eprintln!("  - tokio::fs::read().await, tokio::fs::write().await");
        eprintln!("  - tokio::net::TcpListener::bind().await");
        eprintln!("  - tokio::time::sleep().await");

        panic!(
            "\nFound {} blocking I/O violation(s) in production code.",
            violations.len()
        );
    }
}

#[test]
fn test_no_blocking_reqwest_anywhere() {
    let offenders: Vec<String> = production_sources()
        .into_iter()
        .filter(|f| f.lines.iter().any(|l| code_part(l).contains("reqwest::blocking")))
        .map(|f| f.path.display().to_string())
        .collect();

    assert!(offenders.is_empty(), "reqwest::blocking used in: {offenders:?}");
}

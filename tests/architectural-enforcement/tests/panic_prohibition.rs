//! Integration Test: Panic Prohibition
//!
//! **Policy**: Production code propagates errors. A request that fails must
//! end with an error notice, never a panicked task that silently drops the
//! client's stream.
//!
//! Forbidden outside test modules: `.unwrap()`, `.expect(`, `panic!(`,
//! `unimplemented!(`, `todo!(`.

use architectural_enforcement::{code_part, production_sources};

const FORBIDDEN: &[&str] = &[".unwrap()", ".expect(", "panic!(", "unimplemented!(", "todo!("];

#[test]
fn test_no_panics_in_production_code() {
    let mut violations = Vec::new();

    for file in production_sources() {
        for (idx, line) in file.lines.iter().enumerate() {
            let code = code_part(line);
            if FORBIDDEN.iter().any(|pattern| code.contains(pattern)) {
                violations.push(format!("{}:{} - {}", file.path.display(), idx + 1, line.trim()));
            }
        }
    }

    assert!(
        violations.is_empty(),
        "\nFound {} panicking call(s) in production code:\n  {}\n",
        violations.len(),
        violations.join("\n  ")
    );
}

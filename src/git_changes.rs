use crate::error::{LocatorError, Result};
use regex::Regex;
use std::path::Path;
use std::str;
use tokio::process::Command;

/// Runs git inside `dir` and returns its stdout lines.
pub async fn run_git_command(dir: &Path, args: &[&str]) -> Result<Vec<String>> {
    let output = Command::new("git")
        .args(args)
        .current_dir(dir)
        .output()
        .await
        .map_err(|e| LocatorError::Git(format!("Failed to execute git command: {}", e)))?;

    if !output.status.success() {
        let stderr = str::from_utf8(&output.stderr).unwrap_or("Unknown error");
        return Err(LocatorError::Git(format!("Git command failed: {}", stderr)));
    }

    let stdout = str::from_utf8(&output.stdout)
        .map_err(|e| LocatorError::Git(format!("Invalid UTF-8 in git output: {}", e)))?;

    Ok(stdout.lines().map(|s| s.to_string()).collect())
}

/// Java files under `dir` changed between `revision` and the working tree,
/// as paths relative to `dir`.
pub async fn changed_files(dir: &Path, revision: &str) -> Result<Vec<String>> {
    let files =
        run_git_command(dir, &["diff", "--name-only", "--relative", revision, "--", "*.java"]).await?;
    Ok(files.into_iter().filter(|f| !f.trim().is_empty()).collect())
}

/// Lines of `file_path` (relative to `dir`) added or modified since `revision`.
pub async fn lines_touched(dir: &Path, file_path: &str, revision: &str) -> Result<Vec<usize>> {
    let diff_output =
        run_git_command(dir, &["diff", "--unified=0", "--relative", revision, "--", file_path]).await?;
    parse_hunk_lines(&diff_output)
}

fn parse_hunk_lines(diff_output: &[String]) -> Result<Vec<usize>> {
    let line_range_regex = Regex::new(r"^@@.*\+(\d+)(?:,(\d+))?.*@@")?;
    let mut lines = Vec::new();

    for line in diff_output {
        let Some(captures) = line_range_regex.captures(line) else {
            continue;
        };
        let start_line: usize = captures[1]
            .parse()
            .map_err(|_| LocatorError::Git("Invalid line number in diff".to_string()))?;
        let num_lines = match captures.get(2) {
            Some(count) => count
                .as_str()
                .parse::<usize>()
                .map_err(|_| LocatorError::Git("Invalid line count in diff".to_string()))?,
            None => 1,
        };
        lines.extend(start_line..start_line + num_lines);
    }

    Ok(lines)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::process::Command as StdCommand;
    use tempfile::tempdir;

    #[test]
    fn test_parse_hunk_lines() {
        let diff = vec![
            "diff --git a/A.java b/A.java".to_string(),
            "@@ -10,0 +11 @@ class A {".to_string(),
            "+    int x = 1;".to_string(),
            "@@ -20,3 +21,3 @@ void foo() {".to_string(),
            "@@ -40,2 +42,0 @@".to_string(),
        ];

        assert_eq!(parse_hunk_lines(&diff).unwrap(), vec![11, 21, 22, 23]);
    }

    #[tokio::test]
    async fn test_git_failure_is_reported() {
        let result = run_git_command(Path::new("."), &["definitely-not-a-git-subcommand"]).await;
        assert!(matches!(result, Err(LocatorError::Git(_))));
    }

    #[tokio::test]
    async fn test_changes_are_relative_to_the_working_dir() {
        let repo = tempdir().unwrap();
        let module = repo.path().join("core").join("src");
        fs::create_dir_all(&module).unwrap();
        fs::write(module.join("A.java"), "class A {}\n").unwrap();
        fs::write(repo.path().join("B.java"), "class B {}\n").unwrap();

        let git = |args: &[&str]| {
            StdCommand::new("git")
                .args(args)
                .current_dir(repo.path())
                .output()
                .map(|output| output.status.success())
                .unwrap_or(false)
        };
        if !git(&["init", "-q"]) {
            // git is not installed
            return;
        }
        assert!(git(&["add", "."]));
        assert!(git(&[
            "-c", "user.name=locator", "-c", "user.email=locator@example.com",
            "-c", "commit.gpgsign=false", "commit", "-q", "-m", "init",
        ]));

        fs::write(module.join("A.java"), "class A {\n    int x;\n}\n").unwrap();
        fs::write(repo.path().join("B.java"), "class B { }\n").unwrap();

        let files = changed_files(&module, "HEAD").await.unwrap();
        assert_eq!(files, vec!["A.java".to_string()]);
        assert!(module.join(&files[0]).exists());

        let lines = lines_touched(&module, &files[0], "HEAD").await.unwrap();
        assert_eq!(lines, vec![1, 2, 3]);
    }
}

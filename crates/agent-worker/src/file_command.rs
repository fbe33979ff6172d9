// Parser for the file-based command format written by steps into their
// designated files (ENV_FILE, OUTPUT_FILE, STATE_FILE). Two line forms:
//
//   key=value
//   key<<DELIMITER
//   line one
//   line two
//   DELIMITER
//
// Values are stored verbatim; no escaping exists in this format. The parser
// reports entries in file order and never deduplicates; last-write-wins
// resolution belongs to the applier.

use std::fs;
use std::io;
use std::path::Path;

use thiserror::Error;

/// One key/value pair extracted from a file command file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileCommandEntry {
    /// The key. Never contains `=` or a line terminator.
    pub key: String,
    /// The value, verbatim. Multi-line for heredoc entries.
    pub value: String,
    /// Whether this entry came from a heredoc block.
    pub is_multiline: bool,
    /// 1-based line number of the entry's opening line, for diagnostics.
    pub source_line: usize,
}

/// Errors from reading or parsing a file command file.
///
/// A structural error fails the whole file: after a malformed block the
/// parser cannot resynchronize with confidence, so no partial entries are
/// ever surfaced from a file that failed to parse.
#[derive(Debug, Error)]
pub enum FileCommandError {
    #[error(
        "unterminated block for key '{key}' opened on line {line}: \
         expected closing delimiter '{delimiter}' before end of file"
    )]
    UnterminatedBlock {
        key: String,
        delimiter: String,
        line: usize,
    },

    #[error("invalid entry on line {line}: {reason}")]
    InvalidLine { line: usize, reason: String },

    #[error("directory for file command does not exist: {path}")]
    MissingDirectory { path: String },

    #[error("failed to read file command file {path}")]
    Io {
        path: String,
        #[source]
        source: io::Error,
    },
}

/// Parse the full content of a mapping-style file command file.
///
/// Blank lines are skipped at the top level but preserved verbatim inside
/// heredoc bodies. Heredoc recognition anchors on the two-character `<<`
/// token: a line is a heredoc open when `<<` occurs before any `=`, so
/// delimiters that themselves contain `=` or `<` (such as `=EOF` or base64
/// text with `==` padding) do not confuse key extraction.
pub fn parse_entries(content: &str) -> Result<Vec<FileCommandEntry>, FileCommandError> {
    let mut entries = Vec::new();
    let mut lines = content.lines().enumerate();

    while let Some((idx, line)) = lines.next() {
        let line_no = idx + 1;
        if line.trim().is_empty() {
            continue;
        }

        // Precedence by leftmost token: `<<` before any `=` opens a heredoc,
        // otherwise the first `=` splits a simple assignment.
        let heredoc_at = match (line.find("<<"), line.find('=')) {
            (Some(h), Some(e)) if h < e => Some(h),
            (Some(h), None) => Some(h),
            _ => None,
        };

        if let Some(h) = heredoc_at {
            let key = line[..h].trim();
            if key.is_empty() {
                return Err(FileCommandError::InvalidLine {
                    line: line_no,
                    reason: "missing key before '<<'".to_string(),
                });
            }
            // The delimiter is the remainder of the line verbatim. Internal
            // characters are significant, so no whitespace trimming here.
            let delimiter = &line[h + 2..];
            if delimiter.is_empty() {
                return Err(FileCommandError::InvalidLine {
                    line: line_no,
                    reason: format!("missing delimiter after '{key}<<'"),
                });
            }

            let mut body: Vec<&str> = Vec::new();
            let mut closed = false;
            for (_, body_line) in lines.by_ref() {
                // The close must equal the delimiter exactly, with only the
                // line terminator stripped.
                if body_line == delimiter {
                    closed = true;
                    break;
                }
                body.push(body_line);
            }
            if !closed {
                return Err(FileCommandError::UnterminatedBlock {
                    key: key.to_string(),
                    delimiter: delimiter.to_string(),
                    line: line_no,
                });
            }

            entries.push(FileCommandEntry {
                key: key.to_string(),
                value: body.join("\n"),
                is_multiline: true,
                source_line: line_no,
            });
        } else if let Some(e) = line.find('=') {
            let key = line[..e].trim();
            if key.is_empty() {
                return Err(FileCommandError::InvalidLine {
                    line: line_no,
                    reason: "missing key before '='".to_string(),
                });
            }
            entries.push(FileCommandEntry {
                key: key.to_string(),
                value: line[e + 1..].to_string(),
                is_multiline: false,
                source_line: line_no,
            });
        } else {
            return Err(FileCommandError::InvalidLine {
                line: line_no,
                reason: "expected 'key=value' or 'key<<delimiter'".to_string(),
            });
        }
    }

    Ok(entries)
}

/// Parse a path file: one path per line, blanks skipped, order preserved.
pub fn parse_path_entries(content: &str) -> Vec<String> {
    content
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .map(str::to_string)
        .collect()
}

/// Read and parse a mapping-style file command file from disk.
///
/// A missing file is not an error (the step simply did not use it) as long
/// as its containing directory exists; a missing directory means the step
/// environment was not provisioned and is an error.
pub fn read_entries(path: &Path) -> Result<Vec<FileCommandEntry>, FileCommandError> {
    match fs::read_to_string(path) {
        Ok(content) => parse_entries(&content),
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            ensure_parent_exists(path)?;
            Ok(Vec::new())
        }
        Err(e) => Err(FileCommandError::Io {
            path: path.display().to_string(),
            source: e,
        }),
    }
}

/// Read and parse a path file from disk, with the same missing-file and
/// missing-directory semantics as [`read_entries`].
pub fn read_path_entries(path: &Path) -> Result<Vec<String>, FileCommandError> {
    match fs::read_to_string(path) {
        Ok(content) => Ok(parse_path_entries(&content)),
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            ensure_parent_exists(path)?;
            Ok(Vec::new())
        }
        Err(e) => Err(FileCommandError::Io {
            path: path.display().to_string(),
            source: e,
        }),
    }
}

fn ensure_parent_exists(path: &Path) -> Result<(), FileCommandError> {
    let parent = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    if parent.is_dir() {
        Ok(())
    } else {
        Err(FileCommandError::MissingDirectory {
            path: parent.display().to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_simple_assignments() {
        let entries = parse_entries("a=1\nb=2\n").unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].key, "a");
        assert_eq!(entries[0].value, "1");
        assert!(!entries[0].is_multiline);
        assert_eq!(entries[1].source_line, 2);
    }

    #[test]
    fn test_value_may_contain_equals() {
        let entries = parse_entries("conn=host=db;port=5432\n").unwrap();
        assert_eq!(entries[0].key, "conn");
        assert_eq!(entries[0].value, "host=db;port=5432");
    }

    #[test]
    fn test_heredoc_basic() {
        let entries = parse_entries("key<<EOF\nline one\nline two\nEOF\n").unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].key, "key");
        assert_eq!(entries[0].value, "line one\nline two");
        assert!(entries[0].is_multiline);
    }

    #[test]
    fn test_heredoc_delimiter_independence() {
        for delim in ["=EOF", "<<EOF", "EOF==", "khkIhPxsVA=="] {
            let content = format!("key<<{delim}\nbody\n{delim}\n");
            let entries = parse_entries(&content)
                .unwrap_or_else(|e| panic!("delimiter {delim:?} failed: {e}"));
            assert_eq!(entries.len(), 1, "delimiter {delim:?}");
            assert_eq!(entries[0].key, "key");
            assert_eq!(entries[0].value, "body");
        }
    }

    #[test]
    fn test_heredoc_before_equals_wins() {
        // `<<` occurs before `=`, so this is a heredoc with delimiter `=X`.
        let entries = parse_entries("key<<=X\nv\n=X\n").unwrap();
        assert_eq!(entries[0].key, "key");
        assert_eq!(entries[0].value, "v");
    }

    #[test]
    fn test_equals_before_heredoc_is_assignment() {
        let entries = parse_entries("a=b<<EOF\n").unwrap();
        assert_eq!(entries[0].key, "a");
        assert_eq!(entries[0].value, "b<<EOF");
        assert!(!entries[0].is_multiline);
    }

    #[test]
    fn test_heredoc_close_requires_exact_match() {
        // Indented and padded candidates are body content, not the close.
        let entries = parse_entries("k<<EOF\n EOF\nEOF \nEOF\n").unwrap();
        assert_eq!(entries[0].value, " EOF\nEOF ");
    }

    #[test]
    fn test_heredoc_no_trailing_newline_after_close() {
        let entries = parse_entries("k<<EOF\nbody\nEOF").unwrap();
        assert_eq!(entries[0].value, "body");
    }

    #[test]
    fn test_heredoc_preserves_blank_body_lines() {
        let entries = parse_entries("k<<EOF\na\n\nb\nEOF\n").unwrap();
        assert_eq!(entries[0].value, "a\n\nb");
    }

    #[test]
    fn test_heredoc_empty_value() {
        let entries = parse_entries("k<<EOF\nEOF\n").unwrap();
        assert_eq!(entries[0].value, "");
        assert!(entries[0].is_multiline);
    }

    #[test]
    fn test_unterminated_heredoc_fails_file() {
        let err = parse_entries("ok=1\nk<<EOF\nbody without close\n").unwrap_err();
        match err {
            FileCommandError::UnterminatedBlock { key, delimiter, line } => {
                assert_eq!(key, "k");
                assert_eq!(delimiter, "EOF");
                assert_eq!(line, 2);
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_crlf_normalized() {
        let entries = parse_entries("a=1\r\nk<<EOF\r\nx\r\ny\r\nEOF\r\n").unwrap();
        assert_eq!(entries[0].value, "1");
        assert_eq!(entries[1].value, "x\ny");
    }

    #[test]
    fn test_blank_lines_skipped_at_top_level() {
        let entries = parse_entries("\n\na=1\n   \nb=2\n").unwrap();
        assert_eq!(entries.len(), 2);
    }

    #[test]
    fn test_duplicates_reported_in_order() {
        let entries = parse_entries("a=1\na=2\n").unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].value, "1");
        assert_eq!(entries[1].value, "2");
    }

    #[test]
    fn test_invalid_lines() {
        assert!(matches!(
            parse_entries("just some text\n"),
            Err(FileCommandError::InvalidLine { line: 1, .. })
        ));
        assert!(matches!(
            parse_entries("=value\n"),
            Err(FileCommandError::InvalidLine { .. })
        ));
        assert!(matches!(
            parse_entries("<<EOF\nx\nEOF\n"),
            Err(FileCommandError::InvalidLine { .. })
        ));
        assert!(matches!(
            parse_entries("key<<\n\n"),
            Err(FileCommandError::InvalidLine { .. })
        ));
    }

    #[test]
    fn test_empty_content() {
        assert!(parse_entries("").unwrap().is_empty());
    }

    #[test]
    fn test_path_entries_preserve_order() {
        let paths = parse_path_entries("/usr/local/bin\n\n/opt/tool/bin\n");
        assert_eq!(paths, vec!["/usr/local/bin", "/opt/tool/bin"]);
    }

    #[test]
    fn test_read_missing_file_in_existing_dir() {
        let dir = tempfile::tempdir().unwrap();
        let entries = read_entries(&dir.path().join("absent.txt")).unwrap();
        assert!(entries.is_empty());
    }

    #[test]
    fn test_read_missing_directory_is_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("no-such-dir").join("env.txt");
        assert!(matches!(
            read_entries(&path),
            Err(FileCommandError::MissingDirectory { .. })
        ));
    }

    #[test]
    fn test_read_empty_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("env.txt");
        std::fs::write(&path, "").unwrap();
        assert!(read_entries(&path).unwrap().is_empty());
    }
}

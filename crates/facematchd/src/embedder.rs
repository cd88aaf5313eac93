//! External-process embedder.
//!
//! Runs the configured program once per image: image bytes go to stdin, and
//! stdout must be a JSON array holding one embedding per detected face,
//! e.g. `[[0.01, -0.12, ...]]`.

use facematch_core::{Embedder, EmbedderError, Embedding};
use std::io::Write;
use std::process::{Command, Stdio};

pub struct CommandEmbedder {
    program: String,
    args: Vec<String>,
}

impl CommandEmbedder {
    /// Build from an argv list; `None` when it is empty.
    pub fn from_argv(argv: &[String]) -> Option<Self> {
        let (program, args) = argv.split_first()?;
        Some(Self {
            program: program.clone(),
            args: args.to_vec(),
        })
    }
}

impl Embedder for CommandEmbedder {
    fn detect(&self, image: &[u8]) -> Result<Vec<Embedding>, EmbedderError> {
        let mut child = Command::new(&self.program)
            .args(&self.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| EmbedderError::Failed(format!("failed to start {}: {e}", self.program)))?;

        // Stdin is fed from its own thread while stdout and stderr drain here.
        let stdin = child.stdin.take();
        let (written, output) = std::thread::scope(|scope| {
            let writer = scope.spawn(move || match stdin {
                Some(mut stdin) => stdin.write_all(image),
                None => Ok(()),
            });
            let output = child.wait_with_output();
            (writer.join(), output)
        });

        match written {
            Ok(Ok(())) => {}
            // The program may decide it has seen enough and exit early.
            Ok(Err(e)) if e.kind() == std::io::ErrorKind::BrokenPipe => {}
            Ok(Err(e)) => {
                return Err(EmbedderError::Failed(format!("failed to send image: {e}")));
            }
            Err(_) => {
                return Err(EmbedderError::Failed("stdin writer thread panicked".into()));
            }
        }

        let output =
            output.map_err(|e| EmbedderError::Failed(format!("failed to read output: {e}")))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(EmbedderError::Failed(format!(
                "{} exited with {}: {}",
                self.program,
                output.status,
                stderr.trim()
            )));
        }

        let faces = parse_faces(&output.stdout)?;
        tracing::debug!(program = %self.program, faces = faces.len(), "embedder finished");
        Ok(faces)
    }
}

/// Parse the embedder's JSON output.
pub fn parse_faces(stdout: &[u8]) -> Result<Vec<Embedding>, EmbedderError> {
    let faces: Vec<Vec<f64>> = serde_json::from_slice(stdout)
        .map_err(|e| EmbedderError::Failed(format!("unparsable embedder output: {e}")))?;

    if let Some(i) = faces.iter().position(|f| f.is_empty()) {
        return Err(EmbedderError::Failed(format!("face {i} has an empty embedding")));
    }

    Ok(faces.into_iter().map(Embedding::new).collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sh(script: &str) -> CommandEmbedder {
        CommandEmbedder::from_argv(&["sh".into(), "-c".into(), script.into()]).unwrap()
    }

    #[test]
    fn test_parse_faces() {
        let faces = parse_faces(b"[[0.1, 0.2], [0.3, 0.4]]").unwrap();
        assert_eq!(faces.len(), 2);
        assert_eq!(faces[1].values, vec![0.3, 0.4]);
        assert!(parse_faces(b"[]").unwrap().is_empty());
    }

    #[test]
    fn test_parse_faces_rejects_garbage() {
        assert!(matches!(parse_faces(b"no face here"), Err(EmbedderError::Failed(_))));
        assert!(matches!(parse_faces(b"[[]]"), Err(EmbedderError::Failed(_))));
    }

    #[test]
    fn test_from_argv_empty() {
        assert!(CommandEmbedder::from_argv(&[]).is_none());
    }

    #[test]
    fn test_command_single_face() {
        let embedder = sh("cat > /dev/null; echo '[[0.5, 0.25]]'");
        let e = embedder.embed(b"fake image bytes").unwrap();
        assert_eq!(e.values, vec![0.5, 0.25]);
    }

    #[test]
    fn test_command_no_face() {
        let embedder = sh("cat > /dev/null; echo '[]'");
        assert_eq!(embedder.embed(b"img"), Err(EmbedderError::NoFaceDetected));
    }

    #[test]
    fn test_command_multiple_faces() {
        let embedder = sh("cat > /dev/null; echo '[[0.1], [0.2]]'");
        assert_eq!(embedder.embed(b"img"), Err(EmbedderError::MultipleFacesDetected(2)));
    }

    #[test]
    fn test_command_failure_reports_stderr() {
        let embedder = sh("cat > /dev/null; echo 'cannot decode image' >&2; exit 3");
        let err = embedder.detect(b"img").unwrap_err();
        match err {
            EmbedderError::Failed(msg) => assert!(msg.contains("cannot decode image")),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_chatty_program_does_not_block_on_stdin() {
        let embedder = sh("head -c 200000 /dev/zero >&2; cat > /dev/null; echo '[[0.1]]'");
        let image = vec![0u8; 200_000];
        let faces = embedder.detect(&image).unwrap();
        assert_eq!(faces, vec![Embedding::new(vec![0.1])]);
    }

    #[test]
    fn test_missing_program() {
        let embedder =
            CommandEmbedder::from_argv(&["/nonexistent/facematch-embedder".into()]).unwrap();
        assert!(matches!(embedder.detect(b"img"), Err(EmbedderError::Failed(_))));
    }
}

//! Subprocess-backed legacy decryption.

use std::io::{Read, Write};
use std::process::{Child, Command, Stdio};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use edi_model::{CollaboratorError, Decryptor};
use tracing::{debug, warn};
use wait_timeout::ChildExt;

/// Hard limit for one decrypt call.
pub const DECRYPT_TIMEOUT: Duration = Duration::from_secs(30);

const COLLABORATOR: &str = "decryptor";

/// Runs an external program: ciphertext on stdin, plaintext on stdout.
#[derive(Debug, Clone)]
pub struct CommandDecryptor {
    program: String,
    args: Vec<String>,
    timeout: Duration,
}

impl CommandDecryptor {
    pub fn new(program: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            program: program.into(),
            args,
            timeout: DECRYPT_TIMEOUT,
        }
    }

    #[cfg(test)]
    fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Run the program once. Timeouts and non-zero exits are errors.
    pub fn try_decrypt(&self, ciphertext: &str) -> Result<String, CollaboratorError> {
        let mut child = Command::new(&self.program)
            .args(&self.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()?;

        let writer = child.stdin.take().map(|mut stdin| {
            let input = ciphertext.as_bytes().to_vec();
            thread::spawn(move || stdin.write_all(&input))
        });
        let stdout = drain(child.stdout.take());
        let stderr = drain(child.stderr.take());

        let Some(status) = child.wait_timeout(self.timeout)? else {
            stop(&mut child);
            return Err(CollaboratorError::Timeout {
                collaborator: COLLABORATOR,
                seconds: self.timeout.as_secs(),
            });
        };

        if let Some(writer) = writer {
            // A program that exits without reading stdin breaks the pipe;
            // its exit status decides the outcome.
            let _ = writer.join();
        }
        let output = collect(stdout);
        if !status.success() {
            let message = String::from_utf8_lossy(&collect(stderr)).trim().to_string();
            return Err(CollaboratorError::failed(
                COLLABORATOR,
                format!("{} exited with {status}: {message}", self.program),
            ));
        }
        String::from_utf8(output)
            .map_err(|error| CollaboratorError::failed(COLLABORATOR, error.to_string()))
    }
}

impl Decryptor for CommandDecryptor {
    fn decrypt(&self, ciphertext: &str) -> String {
        match self.try_decrypt(ciphertext) {
            Ok(plaintext) => {
                debug!(program = %self.program, "decrypted record");
                plaintext
            }
            Err(error) => {
                warn!(%error, "decryption failed, using raw content");
                ciphertext.to_string()
            }
        }
    }
}

/// Decryptor for unencrypted feeds.
#[derive(Debug, Clone, Copy, Default)]
pub struct PlainText;

impl Decryptor for PlainText {
    fn decrypt(&self, ciphertext: &str) -> String {
        ciphertext.to_string()
    }
}

fn drain<R: Read + Send + 'static>(pipe: Option<R>) -> Option<JoinHandle<Vec<u8>>> {
    pipe.map(|mut pipe| {
        thread::spawn(move || {
            let mut buffer = Vec::new();
            let _ = pipe.read_to_end(&mut buffer);
            buffer
        })
    })
}

fn collect(handle: Option<JoinHandle<Vec<u8>>>) -> Vec<u8> {
    handle
        .and_then(|handle| handle.join().ok())
        .unwrap_or_default()
}

fn stop(child: &mut Child) {
    let _ = child.kill();
    let _ = child.wait();
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    #[test]
    fn passes_stdin_through_the_program() {
        let decryptor = CommandDecryptor::new("cat", Vec::new());
        assert_eq!(decryptor.try_decrypt("HDR0001\n").unwrap(), "HDR0001\n");
    }

    #[test]
    fn failures_fall_back_to_ciphertext() {
        let decryptor = CommandDecryptor::new("sh", vec!["-c".into(), "exit 3".into()]);
        assert!(decryptor.try_decrypt("secret").is_err());
        assert_eq!(decryptor.decrypt("secret"), "secret");
    }

    #[test]
    fn missing_program_falls_back_to_ciphertext() {
        let decryptor = CommandDecryptor::new("/nonexistent/decrypt-tool", Vec::new());
        assert_eq!(decryptor.decrypt("secret"), "secret");
    }

    #[test]
    fn slow_programs_time_out() {
        let decryptor = CommandDecryptor::new("sleep", vec!["5".into()])
            .with_timeout(Duration::from_millis(200));
        assert!(matches!(
            decryptor.try_decrypt("x"),
            Err(CollaboratorError::Timeout { .. })
        ));
    }
}

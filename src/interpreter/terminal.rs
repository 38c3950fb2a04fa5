//! Captured console
//!
//! The program's standard streams never touch the real terminal: stdin is a
//! byte buffer supplied up front and everything written to stdout and stderr
//! is collected in order, so output produced before a runtime error is still
//! available afterwards.

#[derive(Debug, Clone, Default)]
pub struct Console {
    input: Vec<u8>,
    input_pos: usize,
    stdout: Vec<u8>,
    stderr: Vec<u8>,
}

impl Console {
    pub fn new(input: Vec<u8>) -> Self {
        Console {
            input,
            ..Default::default()
        }
    }

    /// Take up to `len` bytes of pending input; empty at end of input
    pub fn read(&mut self, len: usize) -> &[u8] {
        let start = self.input_pos;
        let end = start.saturating_add(len).min(self.input.len());
        self.input_pos = end;
        &self.input[start..end]
    }

    pub fn write_stdout(&mut self, bytes: &[u8]) {
        self.stdout.extend_from_slice(bytes);
    }

    pub fn write_stderr(&mut self, bytes: &[u8]) {
        self.stderr.extend_from_slice(bytes);
    }

    pub fn stdout(&self) -> &[u8] {
        &self.stdout
    }

    pub fn stderr(&self) -> &[u8] {
        &self.stderr
    }

    /// Hand over everything written so far
    pub fn into_output(self) -> (Vec<u8>, Vec<u8>) {
        (self.stdout, self.stderr)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_input_is_consumed_in_order() {
        let mut console = Console::new(b"abc".to_vec());
        assert_eq!(console.read(2), b"ab");
        assert_eq!(console.read(5), b"c");
        assert!(console.read(1).is_empty());
    }

    #[test]
    fn test_streams_are_separate() {
        let mut console = Console::default();
        console.write_stdout(b"out");
        console.write_stderr(b"err");
        console.write_stdout(b"!");
        let (out, err) = console.into_output();
        assert_eq!(out, b"out!");
        assert_eq!(err, b"err");
    }
}

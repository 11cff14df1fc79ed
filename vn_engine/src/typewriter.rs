use std::time::Duration;

/// Delay between revealed characters.
const CHAR_INTERVAL: Duration = Duration::from_millis(10);

/// Character-by-character reveal of a dialogue line, driven by the frame
/// clock. Suspension is an elapsed-time accumulator; there is no thread to
/// cancel, so stopping is always safe and leaves the visible text either
/// empty (cancel) or complete (skip), never partial garbage.
///
/// Bracketed markup tags (`<...>`) are revealed atomically so styled text
/// never shows a torn tag.
#[derive(Debug, Default, Clone)]
pub struct Typewriter {
    target: String,
    revealed: usize,
    elapsed: Duration,
    running: bool,
}

impl Typewriter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Starts revealing `text` from the beginning, superseding any run in
    /// flight.
    pub fn begin(&mut self, text: &str) {
        self.target = text.to_string();
        self.revealed = 0;
        self.elapsed = Duration::ZERO;
        self.running = !self.target.is_empty();
    }

    /// Stops the run and clears the visible text.
    pub fn cancel(&mut self) {
        self.target.clear();
        self.revealed = 0;
        self.elapsed = Duration::ZERO;
        self.running = false;
    }

    /// Drains every remaining step instantly.
    pub fn skip(&mut self) {
        self.revealed = self.target.len();
        self.elapsed = Duration::ZERO;
        self.running = false;
    }

    /// Advances the reveal by `dt`. Returns true on the tick that completes
    /// the text.
    pub fn tick(&mut self, dt: Duration) -> bool {
        if !self.running {
            return false;
        }
        self.elapsed += dt;
        while self.elapsed >= CHAR_INTERVAL {
            self.elapsed -= CHAR_INTERVAL;
            self.step();
            if self.revealed >= self.target.len() {
                self.running = false;
                self.elapsed = Duration::ZERO;
                return true;
            }
        }
        false
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    pub fn is_complete(&self) -> bool {
        !self.target.is_empty() && self.revealed >= self.target.len()
    }

    pub fn visible(&self) -> &str {
        &self.target[..self.revealed]
    }

    pub fn target(&self) -> &str {
        &self.target
    }

    /// Reveals one more visible character, or a whole `<...>` tag in a
    /// single step. An unterminated `<` degrades to a plain character.
    fn step(&mut self) {
        let rest = &self.target[self.revealed..];
        let mut chars = rest.char_indices();
        let Some((_, first)) = chars.next() else {
            return;
        };

        if first == '<' {
            if let Some(close) = rest.find('>') {
                self.revealed += close + '>'.len_utf8();
                return;
            }
        }

        self.revealed += match chars.next() {
            Some((offset, _)) => offset,
            None => rest.len(),
        };
    }
}

use std::time::Duration;

use tokio::time::Instant;

use super::event::StreamHandler;

/// Flush thresholds for the batching emitter.
#[derive(Debug, Clone)]
pub struct EmitterConfig {
    /// Flush once this much time has passed since the last flush.
    pub flush_interval: Duration,
    /// Flush once this many accumulated characters are pending.
    pub max_buffer: usize,
}

impl Default for EmitterConfig {
    fn default() -> Self {
        Self {
            flush_interval: Duration::from_millis(50),
            max_buffer: 100,
        }
    }
}

/// Coalesces rapid small text deltas before invoking handler callbacks.
///
/// Bounds callback frequency under high token-emission rates without
/// dropping or reordering text. Callers must `flush` before any tool-call
/// or terminal callback so cross-kind ordering is preserved.
pub struct BatchingEmitter {
    config: EmitterConfig,
    content: String,
    reasoning: String,
    last_flush: Instant,
}

impl BatchingEmitter {
    pub fn new(config: EmitterConfig) -> Self {
        Self {
            config,
            content: String::new(),
            reasoning: String::new(),
            last_flush: Instant::now(),
        }
    }

    /// Queue assistant text. Returns true if anything reached the handler.
    pub fn push_content(&mut self, text: &str, handler: &mut dyn StreamHandler) -> bool {
        self.content.push_str(text);
        self.flush_if_due(handler)
    }

    /// Queue reasoning text. Returns true if anything reached the handler.
    pub fn push_reasoning(&mut self, text: &str, handler: &mut dyn StreamHandler) -> bool {
        self.reasoning.push_str(text);
        self.flush_if_due(handler)
    }

    fn flush_if_due(&mut self, handler: &mut dyn StreamHandler) -> bool {
        let pending = self.content.len() + self.reasoning.len();
        if pending > self.config.max_buffer
            || self.last_flush.elapsed() > self.config.flush_interval
        {
            return self.flush(handler);
        }
        false
    }

    /// Deliver everything pending. Returns true if anything was delivered.
    pub fn flush(&mut self, handler: &mut dyn StreamHandler) -> bool {
        let mut delivered = false;
        if !self.reasoning.is_empty() {
            handler.on_reasoning(&self.reasoning);
            self.reasoning.clear();
            delivered = true;
        }
        if !self.content.is_empty() {
            handler.on_content(&self.content);
            self.content.clear();
            delivered = true;
        }
        self.last_flush = Instant::now();
        delivered
    }

    /// Drop pending output without delivery (cancellation path).
    pub fn discard(&mut self) {
        self.content.clear();
        self.reasoning.clear();
    }

    pub fn is_empty(&self) -> bool {
        self.content.is_empty() && self.reasoning.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct Recorder {
        content: Vec<String>,
        reasoning: Vec<String>,
    }

    impl StreamHandler for Recorder {
        fn on_content(&mut self, text: &str) {
            self.content.push(text.to_string());
        }
        fn on_reasoning(&mut self, text: &str) {
            self.reasoning.push(text.to_string());
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_small_deltas_held_back() {
        let mut emitter = BatchingEmitter::new(EmitterConfig::default());
        let mut handler = Recorder::default();

        assert!(!emitter.push_content("a", &mut handler));
        assert!(!emitter.push_content("b", &mut handler));
        assert!(handler.content.is_empty());
        assert!(!emitter.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_size_threshold_triggers_flush() {
        let mut emitter = BatchingEmitter::new(EmitterConfig {
            flush_interval: Duration::from_secs(3600),
            max_buffer: 10,
        });
        let mut handler = Recorder::default();

        emitter.push_content("0123456789", &mut handler);
        assert!(handler.content.is_empty());
        // One more char tips the buffer over the limit.
        assert!(emitter.push_content("x", &mut handler));
        assert_eq!(handler.content, vec!["0123456789x"]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_time_threshold_triggers_flush() {
        let mut emitter = BatchingEmitter::new(EmitterConfig::default());
        let mut handler = Recorder::default();

        emitter.push_content("a", &mut handler);
        tokio::time::advance(Duration::from_millis(60)).await;
        assert!(emitter.push_content("b", &mut handler));
        assert_eq!(handler.content, vec!["ab"]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_flush_preserves_order_and_concatenation() {
        let mut emitter = BatchingEmitter::new(EmitterConfig::default());
        let mut handler = Recorder::default();

        emitter.push_content("one ", &mut handler);
        emitter.push_content("two ", &mut handler);
        emitter.push_content("three", &mut handler);
        emitter.flush(&mut handler);
        assert_eq!(handler.content.join(""), "one two three");
    }

    #[tokio::test(start_paused = true)]
    async fn test_reasoning_batched_separately() {
        let mut emitter = BatchingEmitter::new(EmitterConfig::default());
        let mut handler = Recorder::default();

        emitter.push_reasoning("hmm", &mut handler);
        emitter.push_content("hi", &mut handler);
        assert!(emitter.flush(&mut handler));
        assert_eq!(handler.reasoning, vec!["hmm"]);
        assert_eq!(handler.content, vec!["hi"]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_discard_drops_pending() {
        let mut emitter = BatchingEmitter::new(EmitterConfig::default());
        let mut handler = Recorder::default();

        emitter.push_content("never seen", &mut handler);
        emitter.discard();
        assert!(!emitter.flush(&mut handler));
        assert!(handler.content.is_empty());
    }
}

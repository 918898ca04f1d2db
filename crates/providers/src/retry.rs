//! Retrying generator: bounded attempts and exponential backoff.
//!
//! Wraps any [`TextGenerator`]. Transient failures (timeouts, rate limits,
//! network errors, 5xx) are retried after a doubling delay; anything else is
//! returned at once. Callers only ever see the final error.

use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};
use weekforge_core::error::GenerationError;
use weekforge_core::provider::{Generation, GenerationRequest, TextGenerator};

/// A generator that retries its inner generator on transient failure.
pub struct RetryingGenerator {
    name: String,
    inner: Arc<dyn TextGenerator>,
    max_attempts: u32,
    base_delay: Duration,
    max_delay: Duration,
    attempt_timeout: Duration,
}

impl RetryingGenerator {
    /// Wrap `inner` with 3 attempts, 1s base delay, and a 120s per-attempt timeout.
    pub fn new(inner: Arc<dyn TextGenerator>) -> Self {
        let name = format!("retry({})", inner.name());
        Self {
            name,
            inner,
            max_attempts: 3,
            base_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(30),
            attempt_timeout: Duration::from_secs(120),
        }
    }

    pub fn with_max_attempts(mut self, attempts: u32) -> Self {
        self.max_attempts = attempts.max(1);
        self
    }

    pub fn with_base_delay(mut self, delay: Duration) -> Self {
        self.base_delay = delay;
        self
    }

    pub fn with_max_delay(mut self, delay: Duration) -> Self {
        self.max_delay = delay;
        self
    }

    pub fn with_attempt_timeout(mut self, timeout: Duration) -> Self {
        self.attempt_timeout = timeout;
        self
    }

    /// Delay before retry number `attempt` (1-based), honouring a provider hint.
    fn delay_for(&self, attempt: u32, error: &GenerationError) -> Duration {
        let exponential = self
            .base_delay
            .saturating_mul(2u32.saturating_pow(attempt.saturating_sub(1)));
        let hinted = match error {
            GenerationError::RateLimited { retry_after_secs } => {
                Duration::from_secs(*retry_after_secs)
            }
            _ => Duration::ZERO,
        };
        exponential.max(hinted).min(self.max_delay)
    }
}

#[async_trait]
impl TextGenerator for RetryingGenerator {
    fn name(&self) -> &str {
        &self.name
    }

    async fn generate(&self, request: GenerationRequest) -> Result<Generation, GenerationError> {
        let mut attempt = 0;

        loop {
            attempt += 1;
            debug!(
                generator = %self.inner.name(),
                attempt,
                max_attempts = self.max_attempts,
                "Generation attempt"
            );

            let error = match tokio::time::timeout(
                self.attempt_timeout,
                self.inner.generate(request.clone()),
            )
            .await
            {
                Ok(Ok(generation)) if generation.text.trim().is_empty() => {
                    GenerationError::EmptyResponse
                }
                Ok(Ok(generation)) => return Ok(generation),
                Ok(Err(e)) => e,
                Err(_) => GenerationError::Timeout(format!(
                    "'{}' did not respond within {}s",
                    self.inner.name(),
                    self.attempt_timeout.as_secs()
                )),
            };

            if !error.is_transient() || attempt >= self.max_attempts {
                warn!(
                    generator = %self.inner.name(),
                    attempt,
                    error = %error,
                    "Generation failed, giving up"
                );
                return Err(error);
            }

            let delay = self.delay_for(attempt, &error);
            warn!(
                generator = %self.inner.name(),
                attempt,
                delay_ms = delay.as_millis() as u64,
                error = %error,
                "Generation failed, retrying"
            );
            tokio::time::sleep(delay).await;
        }
    }

    async fn health_check(&self) -> Result<bool, GenerationError> {
        self.inner.health_check().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    /// Returns queued results in order, then succeeds.
    struct ScriptedGenerator {
        script: Mutex<Vec<Result<String, GenerationError>>>,
        call_count: Mutex<usize>,
    }

    impl ScriptedGenerator {
        fn new(script: Vec<Result<String, GenerationError>>) -> Self {
            Self {
                script: Mutex::new(script),
                call_count: Mutex::new(0),
            }
        }

        fn calls(&self) -> usize {
            *self.call_count.lock().unwrap()
        }
    }

    #[async_trait]
    impl TextGenerator for ScriptedGenerator {
        fn name(&self) -> &str {
            "scripted"
        }

        async fn generate(
            &self,
            _request: GenerationRequest,
        ) -> Result<Generation, GenerationError> {
            *self.call_count.lock().unwrap() += 1;
            let mut script = self.script.lock().unwrap();
            let next = if script.is_empty() {
                Ok("done".to_string())
            } else {
                script.remove(0)
            };
            next.map(|text| Generation {
                text,
                usage: None,
                model: "test-model".into(),
            })
        }
    }

    /// Never answers.
    struct HangingGenerator;

    #[async_trait]
    impl TextGenerator for HangingGenerator {
        fn name(&self) -> &str {
            "hanging"
        }

        async fn generate(
            &self,
            _request: GenerationRequest,
        ) -> Result<Generation, GenerationError> {
            tokio::time::sleep(Duration::from_secs(3600)).await;
            Err(GenerationError::EmptyResponse)
        }
    }

    fn request() -> GenerationRequest {
        GenerationRequest::new("test", "system", "user")
    }

    fn fast(inner: Arc<dyn TextGenerator>) -> RetryingGenerator {
        RetryingGenerator::new(inner).with_base_delay(Duration::from_millis(1))
    }

    #[tokio::test]
    async fn first_attempt_succeeds() {
        let inner = Arc::new(ScriptedGenerator::new(vec![Ok("hello".into())]));
        let generator = fast(inner.clone());
        let result = generator.generate(request()).await.unwrap();
        assert_eq!(result.text, "hello");
        assert_eq!(inner.calls(), 1);
    }

    #[tokio::test]
    async fn retries_transient_then_succeeds() {
        let inner = Arc::new(ScriptedGenerator::new(vec![
            Err(GenerationError::Network("reset".into())),
            Err(GenerationError::ApiError {
                status_code: 502,
                message: "bad gateway".into(),
            }),
            Ok("third time".into()),
        ]));
        let generator = fast(inner.clone());
        let result = generator.generate(request()).await.unwrap();
        assert_eq!(result.text, "third time");
        assert_eq!(inner.calls(), 3);
    }

    #[tokio::test]
    async fn gives_up_after_max_attempts() {
        let inner = Arc::new(ScriptedGenerator::new(vec![
            Err(GenerationError::Network("a".into())),
            Err(GenerationError::Network("b".into())),
            Err(GenerationError::Network("c".into())),
            Ok("too late".into()),
        ]));
        let generator = fast(inner.clone());
        let err = generator.generate(request()).await.unwrap_err();
        assert!(matches!(err, GenerationError::Network(ref m) if m == "c"));
        assert_eq!(inner.calls(), 3);
    }

    #[tokio::test]
    async fn permanent_errors_not_retried() {
        let inner = Arc::new(ScriptedGenerator::new(vec![Err(
            GenerationError::AuthenticationFailed("bad key".into()),
        )]));
        let generator = fast(inner.clone());
        let err = generator.generate(request()).await.unwrap_err();
        assert!(matches!(err, GenerationError::AuthenticationFailed(_)));
        assert_eq!(inner.calls(), 1);
    }

    #[tokio::test]
    async fn blank_text_counts_as_empty_response() {
        let inner = Arc::new(ScriptedGenerator::new(vec![Ok("   ".into()), Ok("real".into())]));
        let generator = fast(inner.clone());
        let result = generator.generate(request()).await.unwrap();
        assert_eq!(result.text, "real");
        assert_eq!(inner.calls(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn attempt_timeout_is_retried_then_reported() {
        let generator = RetryingGenerator::new(Arc::new(HangingGenerator))
            .with_attempt_timeout(Duration::from_millis(50))
            .with_max_attempts(2);
        let err = generator.generate(request()).await.unwrap_err();
        assert!(matches!(err, GenerationError::Timeout(_)));
    }

    #[test]
    fn backoff_doubles_and_caps() {
        let generator = RetryingGenerator::new(Arc::new(HangingGenerator))
            .with_base_delay(Duration::from_secs(1))
            .with_max_delay(Duration::from_secs(5));
        let err = GenerationError::Network("x".into());
        assert_eq!(generator.delay_for(1, &err), Duration::from_secs(1));
        assert_eq!(generator.delay_for(2, &err), Duration::from_secs(2));
        assert_eq!(generator.delay_for(3, &err), Duration::from_secs(4));
        assert_eq!(generator.delay_for(4, &err), Duration::from_secs(5));
    }

    #[test]
    fn rate_limit_hint_raises_delay() {
        let generator = RetryingGenerator::new(Arc::new(HangingGenerator));
        let err = GenerationError::RateLimited {
            retry_after_secs: 10,
        };
        assert_eq!(generator.delay_for(1, &err), Duration::from_secs(10));
    }
}
